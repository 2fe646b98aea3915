// loader.rs — Module loader for textual LLVM IR containers
//
// Reads the input (file or standard input), rejects bitcode, splits the
// container into one source per module and materializes each source into
// an `ir::Module`: function signatures, basic blocks of classified
// instructions, and specialized metadata nodes.
//
// Preconditions: none.
// Postconditions: `materialize` returns a module whose functions keep
//                 source order and whose blocks keep program order.
// Failure modes: unreadable input, bitcode, empty containers, syntax errors
//                and malformed signatures produce error diagnostics.
// Side effects: `read_input` reads the filesystem or standard input.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use crate::diag::{codes, Diagnostic};
use crate::ir::{BasicBlock, Function, Module, Span};
use crate::parser::{self, BodyLine, FunctionKind, Item, Signature};

const BITCODE_MAGIC: [u8; 4] = [b'B', b'C', 0xC0, 0xDE];
const BITCODE_WRAPPER_MAGIC: [u8; 4] = [0xDE, 0xC0, 0x17, 0x0B];
const MODULE_HEADER: &str = "; ModuleID";

// ── Input ───────────────────────────────────────────────────────────────────

/// Read the raw container bytes. `-` reads standard input.
pub fn read_input(path: &Path) -> Result<Vec<u8>, Diagnostic> {
    if path.as_os_str() == "-" {
        let mut bytes = Vec::new();
        std::io::stdin().read_to_end(&mut bytes).map_err(|e| {
            Diagnostic::error(
                codes::E_INPUT_UNREADABLE,
                format!("cannot read standard input: {e}"),
            )
        })?;
        return Ok(bytes);
    }
    std::fs::read(path).map_err(|e| {
        Diagnostic::error(
            codes::E_INPUT_UNREADABLE,
            format!("{}: {}", path.display(), e),
        )
    })
}

// ── Container ───────────────────────────────────────────────────────────────

/// The text of one module inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    pub index: usize,
    pub text: String,
    /// 1-based line of `text`'s first line within the whole input.
    pub first_line: usize,
}

impl ModuleSource {
    /// 1-based (line, column) of a byte offset, relative to the whole input.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.text.len());
        let before = &self.text[..offset];
        let line = before.matches('\n').count();
        let col = before.rfind('\n').map_or(offset, |nl| offset - nl - 1);
        (self.first_line + line, col + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub modules: Vec<ModuleSource>,
}

impl Container {
    /// `LINE:COL` of a diagnostic's primary span, when it has one.
    pub fn location(&self, diag: &Diagnostic) -> Option<(usize, usize)> {
        let source = self.modules.get(diag.module?)?;
        Some(source.line_col(diag.span?.start))
    }
}

/// Split raw input into module sources.
///
/// A `; ModuleID` header that follows other content starts a new module,
/// so concatenated `.ll` files form a multi-module container.
pub fn split_container(bytes: &[u8]) -> Result<Container, Diagnostic> {
    if bytes.starts_with(&BITCODE_MAGIC) || bytes.starts_with(&BITCODE_WRAPPER_MAGIC) {
        return Err(Diagnostic::error(
            codes::E_BITCODE,
            "input is an LLVM bitcode container; only textual IR is supported",
        )
        .with_hint("disassemble it first: llvm-dis input.bc -o input.ll"));
    }
    let text = std::str::from_utf8(bytes).map_err(|e| {
        Diagnostic::error(codes::E_SYNTAX, format!("input is not valid UTF-8 text: {e}"))
    })?;

    let mut modules: Vec<ModuleSource> = Vec::new();
    let mut current = String::new();
    let mut first_line = 1;
    for (line_no, line) in text.split_inclusive('\n').enumerate() {
        if line.starts_with(MODULE_HEADER) && has_content(&current) {
            modules.push(ModuleSource {
                index: modules.len(),
                text: std::mem::take(&mut current),
                first_line,
            });
            first_line = line_no + 1;
        }
        current.push_str(line);
    }
    if has_content(&current) {
        modules.push(ModuleSource {
            index: modules.len(),
            text: current,
            first_line,
        });
    }

    if modules.is_empty() {
        return Err(Diagnostic::error(
            codes::E_EMPTY_CONTAINER,
            "input contains no modules",
        ));
    }
    Ok(Container { modules })
}

/// True when `text` has a line that is neither blank nor a comment.
fn has_content(text: &str) -> bool {
    text.lines().any(|line| {
        let line = line.trim_start();
        !line.is_empty() && !line.starts_with(';')
    })
}

// ── Materialization ─────────────────────────────────────────────────────────

/// Parse one module source into the in-memory model.
///
/// All diagnostics are attributed to `source.index`.
pub fn materialize(source: &ModuleSource) -> Result<Module, Vec<Diagnostic>> {
    let parsed = parser::parse(&source.text);
    if !parsed.errors.is_empty() {
        return Err(parsed
            .errors
            .iter()
            .map(|e| {
                Diagnostic::error(codes::E_SYNTAX, e.to_string())
                    .with_span(*e.span())
                    .in_module(source.index)
            })
            .collect());
    }
    let items = parsed.items.unwrap_or_default();

    let mut module = Module {
        index: source.index,
        source_filename: None,
        target_triple: None,
        functions: Vec::new(),
        metadata: BTreeMap::new(),
    };
    let mut errors = Vec::new();

    for item in items {
        match item {
            Item::SourceFilename(name) => module.source_filename = Some(name),
            Item::TargetTriple(triple) => module.target_triple = Some(triple),
            Item::Function {
                kind,
                signature: Some(signature),
                span,
                body,
            } => module
                .functions
                .push(build_function(kind, signature, span, body)),
            Item::Function {
                signature: None,
                span,
                ..
            } => {
                let header = source.text.get(span.start..span.end).unwrap_or_default();
                errors.push(
                    Diagnostic::error(
                        codes::E_SIGNATURE,
                        format!("cannot parse function header `{}`", header.trim()),
                    )
                    .with_span(span)
                    .with_hint("expected `@name(<type> [attributes] [%name], ...)`")
                    .in_module(source.index),
                );
            }
            Item::Metadata(node) => {
                module.metadata.insert(node.id, node);
            }
            Item::Other => {}
        }
    }

    if errors.is_empty() {
        Ok(module)
    } else {
        Err(errors)
    }
}

fn build_function(
    kind: FunctionKind,
    signature: Signature,
    span: Span,
    body: Option<Vec<BodyLine>>,
) -> Function {
    let blocks = match (kind, body) {
        (FunctionKind::Define, Some(lines)) => build_blocks(lines),
        _ => Vec::new(),
    };
    Function {
        name: signature.name,
        params: signature.params,
        variadic: signature.variadic,
        blocks,
        span,
    }
}

/// Split body lines into basic blocks at labels.
fn build_blocks(lines: Vec<BodyLine>) -> Vec<BasicBlock> {
    let mut blocks = Vec::new();
    let mut current = BasicBlock::default();
    for line in lines {
        match line {
            BodyLine::Label(label) => {
                if current.label.is_some() || !current.instructions.is_empty() {
                    blocks.push(std::mem::take(&mut current));
                }
                current.label = Some(label);
            }
            BodyLine::Instruction(inst) => current.instructions.push(inst),
        }
    }
    if current.label.is_some() || !current.instructions.is_empty() {
        blocks.push(current);
    }
    blocks
}

// ── Tests ───────────────────────────────────────────────────────────────────
