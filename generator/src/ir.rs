// ir.rs — In-memory model of a materialized IR module
//
// Holds exactly what harness generation consumes: functions with typed
// formal parameters and basic blocks of classified instructions, plus the
// module's numbered metadata nodes. Built by `loader::materialize`.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::IrType;

pub type Span = chumsky::span::SimpleSpan;

// ── Module ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Module {
    /// Position of this module in its container (0-based).
    pub index: usize,
    pub source_filename: Option<String>,
    pub target_triple: Option<String>,
    pub functions: Vec<Function>,
    pub metadata: BTreeMap<u32, MetadataNode>,
}

impl Module {
    /// Look up a function (definition or declaration) by name.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn metadata_node(&self, id: u32) -> Option<&MetadataNode> {
        self.metadata.get(&id)
    }

    pub fn set_target_triple(&mut self, triple: impl Into<String>) {
        self.target_triple = Some(triple.into());
    }
}

// ── Functions ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub variadic: bool,
    /// Empty for declarations. The first block is the entry block.
    pub blocks: Vec<BasicBlock>,
    pub span: Span,
}

impl Function {
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn entry_block(&self) -> Option<&BasicBlock> {
        self.blocks.first()
    }
}

/// A formal parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: IrType,
    /// Parameter attributes in source order (`noundef`, `byval`, ...).
    pub attrs: Vec<String>,
    /// The IR value name (`%a`), when the parameter is named.
    pub name: Option<String>,
    pub span: Span,
}

impl Param {
    pub fn has_attr(&self, attr: &str) -> bool {
        self.attrs.iter().any(|a| a == attr)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    pub label: Option<String>,
    pub instructions: Vec<Instruction>,
}

// ── Instructions ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// A `call` instruction; `callee` is `None` for indirect calls.
    Call {
        callee: Option<String>,
        args: Vec<Operand>,
        span: Span,
    },
    /// A non-instruction debug record: `#dbg_declare(...)`, `#dbg_value(...)`.
    DebugRecord {
        kind: String,
        operands: Vec<Operand>,
        span: Span,
    },
    Other {
        opcode: String,
        span: Span,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `!N`, with or without a leading `metadata` type.
    MetadataRef(u32),
    /// Inline metadata such as `!DIExpression()` or `!{}`; holds the node kind.
    InlineMetadata(String),
    /// Any other value, rendered as source text (`i32 %x`, `metadata ptr %p`).
    Value(String),
}

/// Which debug intrinsic or record bound a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugKind {
    Declare,
    Value,
}

/// A debug-declare or debug-value record found in a function body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugDeclaration<'a> {
    pub kind: DebugKind,
    /// The variable operand (the second operand), if present.
    pub variable: Option<&'a Operand>,
    pub span: Span,
}

impl Instruction {
    pub fn span(&self) -> Span {
        match self {
            Instruction::Call { span, .. }
            | Instruction::DebugRecord { span, .. }
            | Instruction::Other { span, .. } => *span,
        }
    }

    /// Classify this instruction as a debug declaration.
    ///
    /// Qualifying forms are calls to `llvm.dbg.declare` / `llvm.dbg.value`
    /// and the `#dbg_declare` / `#dbg_value` records that replace them in
    /// newer IR. `llvm.dbg.assign` and `llvm.dbg.label` do not qualify.
    pub fn debug_declaration(&self) -> Option<DebugDeclaration<'_>> {
        let (kind, operands) = match self {
            Instruction::Call {
                callee: Some(callee),
                args,
                ..
            } => {
                let kind = match callee.as_str() {
                    "llvm.dbg.declare" => DebugKind::Declare,
                    "llvm.dbg.value" => DebugKind::Value,
                    _ => return None,
                };
                (kind, args)
            }
            Instruction::DebugRecord { kind, operands, .. } => {
                let kind = match kind.as_str() {
                    "declare" => DebugKind::Declare,
                    "value" => DebugKind::Value,
                    _ => return None,
                };
                (kind, operands)
            }
            Instruction::Other { .. } | Instruction::Call { callee: None, .. } => return None,
        };
        Some(DebugDeclaration {
            kind,
            variable: operands.get(1),
            span: self.span(),
        })
    }
}

// ── Metadata ────────────────────────────────────────────────────────────────

/// A numbered metadata node (`!N = ...`).
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataNode {
    pub id: u32,
    pub distinct: bool,
    /// Specialized node kind (`DILocalVariable`), or `None` for tuples and
    /// other generic nodes.
    pub kind: Option<String>,
    pub fields: Vec<MetadataField>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataField {
    pub name: String,
    pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(String),
    Ref(u32),
    /// Anything else (`DW_TAG_*`, flag sets, `null`, nested nodes), as text.
    Other(String),
}

/// A `!DILocalVariable` viewed through its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVariable<'a> {
    pub name: &'a str,
    /// 1-based argument number for parameters; absent for locals.
    pub arg: Option<u32>,
}

impl MetadataNode {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// View this node as a named local variable, if it is one.
    pub fn as_local_variable(&self) -> Option<LocalVariable<'_>> {
        if self.kind.as_deref() != Some("DILocalVariable") {
            return None;
        }
        let name = match self.field("name")? {
            FieldValue::Str(name) if !name.is_empty() => name.as_str(),
            _ => return None,
        };
        let arg = match self.field("arg") {
            Some(FieldValue::Int(n)) => n.parse().ok(),
            _ => None,
        };
        Some(LocalVariable { name, arg })
    }
}
