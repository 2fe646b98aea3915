// bind.rs — Parameter binding resolution
//
// Recovers the source-level name of each formal parameter from the debug
// declarations in the function's entry block.
//
// Binding policy: the Nth qualifying debug record in the entry block binds
// formal parameter N. The record's address operand is never consulted; the
// scan stops once every parameter is bound.
//
// Preconditions: the function has a body.
// Postconditions: bindings are indexed 0.. in scan order, at most one per
//                 parameter.
// Failure modes: malformed variable metadata aborts the scan (E0201);
//                undercount and unusable names are rejected by the checks.
// Side effects: none.

use std::collections::HashMap;

use serde::Serialize;

use crate::diag::{codes, Diagnostic};
use crate::ir::{DebugDeclaration, DebugKind, Function, LocalVariable, Module, Operand, Span};

/// C keywords through C23. `_Bool`-style keywords fall under the
/// implementation-reserved rule in `is_implementation_reserved`.
const C_KEYWORDS: &[&str] = &[
    "alignas", "alignof", "auto", "bool", "break", "case", "char", "const", "constexpr",
    "continue", "default", "do", "double", "else", "enum", "extern", "false", "float", "for",
    "goto", "if", "inline", "int", "long", "nullptr", "register", "restrict", "return", "short",
    "signed", "sizeof", "static", "static_assert", "struct", "switch", "thread_local", "true",
    "typedef", "typeof", "typeof_unqual", "union", "unsigned", "void", "volatile", "while",
];

/// Names the generated harness already uses: its own declarations, the
/// preamble's aliases and the types they expand to, and object-like macros
/// from `<stdint.h>` and `<stdlib.h>`.
const HARNESS_RESERVED: &[&str] = &[
    "argc",
    "argv",
    "main",
    "klee_make_symbolic",
    "i8",
    "i16",
    "i32",
    "i64",
    "i128",
    "int8_t",
    "int16_t",
    "int32_t",
    "int64_t",
    "NULL",
    "EXIT_SUCCESS",
    "EXIT_FAILURE",
    "RAND_MAX",
    "MB_CUR_MAX",
    "INT8_MIN",
    "INT16_MIN",
    "INT32_MIN",
    "INT64_MIN",
    "INT8_MAX",
    "INT16_MAX",
    "INT32_MAX",
    "INT64_MAX",
    "UINT8_MAX",
    "UINT16_MAX",
    "UINT32_MAX",
    "UINT64_MAX",
    "INTPTR_MIN",
    "INTPTR_MAX",
    "UINTPTR_MAX",
    "INTMAX_MIN",
    "INTMAX_MAX",
    "UINTMAX_MAX",
    "PTRDIFF_MIN",
    "PTRDIFF_MAX",
    "SIZE_MAX",
    "SIG_ATOMIC_MIN",
    "SIG_ATOMIC_MAX",
    "WCHAR_MIN",
    "WCHAR_MAX",
    "WINT_MIN",
    "WINT_MAX",
];

/// A recovered parameter name bound to a formal-parameter slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterBinding {
    /// 0-based formal-parameter index.
    pub index: usize,
    pub name: String,
    /// The variable's own `arg:` field (1-based), when it has one.
    pub arg: Option<u32>,
    /// The kind of debug record that supplied the name.
    pub record: DebugKind,
    #[serde(skip)]
    pub span: Span,
}

/// Result of binding: bindings in index order plus non-fatal warnings.
#[derive(Debug, Clone, Default)]
pub struct BindingSet {
    pub bindings: Vec<ParameterBinding>,
    pub warnings: Vec<Diagnostic>,
}

/// Scan `function`'s entry block and bind parameter names by position.
pub fn resolve_bindings(module: &Module, function: &Function) -> Result<BindingSet, Diagnostic> {
    let param_count = function.params.len();
    let mut set = BindingSet::default();

    let Some(entry) = function.entry_block() else {
        return Ok(set);
    };

    for inst in &entry.instructions {
        if set.bindings.len() >= param_count {
            break;
        }
        let Some(decl) = inst.debug_declaration() else {
            continue;
        };
        let variable = local_variable(module, &decl)?;
        let index = set.bindings.len();

        match variable.arg {
            Some(arg) if arg as usize != index + 1 => set.warnings.push(
                Diagnostic::warning(
                    codes::W_ARG_MISMATCH,
                    format!(
                        "debug record for `{}` describes argument {} but binds parameter {} by position",
                        variable.name,
                        arg,
                        index + 1
                    ),
                )
                .with_span(decl.span),
            ),
            None => set.warnings.push(
                Diagnostic::warning(
                    codes::W_NON_PARAMETER,
                    format!(
                        "debug record for local variable `{}` binds parameter {} by position",
                        variable.name,
                        index + 1
                    ),
                )
                .with_span(decl.span),
            ),
            Some(_) => {}
        }

        set.bindings.push(ParameterBinding {
            index,
            name: variable.name.to_string(),
            arg: variable.arg,
            record: decl.kind,
            span: decl.span,
        });
    }

    Ok(set)
}

/// Resolve a record's variable operand to its `!DILocalVariable`.
fn local_variable<'m>(
    module: &'m Module,
    decl: &DebugDeclaration<'_>,
) -> Result<LocalVariable<'m>, Diagnostic> {
    let shape_error = |message: String| {
        Diagnostic::error(codes::E_METADATA_SHAPE, message).with_span(decl.span)
    };
    let id = match decl.variable {
        Some(Operand::MetadataRef(id)) => *id,
        Some(Operand::InlineMetadata(kind)) => {
            return Err(shape_error(format!(
                "debug record variable is inline `!{kind}` metadata, expected a reference to a !DILocalVariable"
            )))
        }
        Some(Operand::Value(text)) => {
            return Err(shape_error(format!(
                "debug record variable `{text}` is not a metadata reference"
            )))
        }
        None => return Err(shape_error("debug record has no variable operand".to_string())),
    };
    let node = module
        .metadata_node(id)
        .ok_or_else(|| shape_error(format!("debug record refers to undefined metadata !{id}")))?;
    node.as_local_variable().ok_or_else(|| {
        let found = node.kind.as_deref().unwrap_or("tuple");
        shape_error(format!(
            "debug record refers to !{id}, a !{found}; expected a named !DILocalVariable"
        ))
        .with_related(node.span, format!("!{id} defined here"))
    })
}

impl BindingSet {
    /// Require a binding for every formal parameter.
    pub fn require_complete(&self, function: &Function) -> Result<(), Diagnostic> {
        let expected = function.params.len();
        let found = self.bindings.len();
        if found == expected {
            return Ok(());
        }
        let unbound: Vec<String> = (found..expected).map(|i| (i + 1).to_string()).collect();
        Err(Diagnostic::error(
            codes::E_BINDING_UNDERCOUNT,
            format!(
                "`{}` has {} parameter{} but its entry block holds {} debug declaration record{}; parameter{} {} would be unbound",
                function.name,
                expected,
                plural(expected),
                found,
                plural(found),
                plural(unbound.len()),
                unbound.join(", "),
            ),
        )
        .with_span(function.span)
        .with_hint("compile the source with `-g -O0` so every parameter gets a debug declaration"))
    }

    /// Require every recovered name to be a usable, distinct C identifier
    /// that does not collide with the harness's own names.
    pub fn validate_names(&self, function_name: &str) -> Result<(), Diagnostic> {
        let mut seen: HashMap<&str, &ParameterBinding> = HashMap::new();
        for binding in &self.bindings {
            let name = binding.name.as_str();
            let name_error = |message: String| {
                Diagnostic::error(codes::E_PARAM_NAME, message).with_span(binding.span)
            };
            if !is_c_identifier(name) {
                return Err(name_error(format!(
                    "parameter {} is named `{}`, which is not a C identifier",
                    binding.index + 1,
                    name
                )));
            }
            if let Some(reason) = reserved_reason(name, function_name) {
                return Err(name_error(format!(
                    "parameter {} is named `{}`, which {}",
                    binding.index + 1,
                    name,
                    reason
                )));
            }
            if let Some(first) = seen.insert(name, binding) {
                return Err(name_error(format!(
                    "parameters {} and {} are both named `{}`",
                    first.index + 1,
                    binding.index + 1,
                    name
                ))
                .with_related(first.span, "first bound here"));
            }
        }
        Ok(())
    }
}

/// Why `name` cannot name a variable in the harness, if it cannot.
fn reserved_reason(name: &str, function_name: &str) -> Option<&'static str> {
    if C_KEYWORDS.contains(&name) {
        Some("is a C keyword")
    } else if is_implementation_reserved(name) {
        Some("is reserved for the C implementation")
    } else if HARNESS_RESERVED.contains(&name) || name == function_name {
        Some("the harness already uses")
    } else {
        None
    }
}

/// `__x` and `_X` identifiers belong to the compiler and standard library.
fn is_implementation_reserved(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next() == Some('_') && chars.next().is_some_and(|c| c == '_' || c.is_ascii_uppercase())
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_c_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{materialize, split_container};

    fn load(text: &str) -> Module {
        let container = split_container(text.as_bytes()).unwrap();
        materialize(&container.modules[0]).unwrap()
    }

    fn bind(text: &str, name: &str) -> Result<BindingSet, Diagnostic> {
        let module = load(text);
        let function = module.function(name).unwrap().clone();
        resolve_bindings(&module, &function)
    }

    fn names(set: &BindingSet) -> Vec<(usize, &str)> {
        set.bindings
            .iter()
            .map(|b| (b.index, b.name.as_str()))
            .collect()
    }

    const TWO_PARAMS: &str = r#"
define i32 @add(i32 %a, i32 %b) {
entry:
  %a.addr = alloca i32
  %b.addr = alloca i32
  store i32 %a, ptr %a.addr
  call void @llvm.dbg.declare(metadata ptr %a.addr, metadata !1, metadata !DIExpression()), !dbg !9
  store i32 %b, ptr %b.addr
  call void @llvm.dbg.declare(metadata ptr %b.addr, metadata !2, metadata !DIExpression()), !dbg !9
  call void @llvm.dbg.declare(metadata ptr %sum, metadata !3, metadata !DIExpression()), !dbg !9
  ret i32 0
}
!1 = !DILocalVariable(name: "a", arg: 1, scope: !8)
!2 = !DILocalVariable(name: "b", arg: 2, scope: !8)
!3 = !DILocalVariable(name: "sum", scope: !8)
"#;

    #[test]
    fn binds_in_scan_order_and_stops_at_param_count() {
        let set = bind(TWO_PARAMS, "add").unwrap();
        assert_eq!(names(&set), vec![(0, "a"), (1, "b")]);
        assert_eq!(set.bindings[1].arg, Some(2));
        assert!(set.warnings.is_empty());
    }

    #[test]
    fn binding_is_positional_not_structural() {
        // Records appear in reverse parameter order; slot follows the scan.
        let text = r#"
define void @f(i32 %x, i32 %y) {
  #dbg_declare(ptr %y.addr, !2, !DIExpression(), !9)
  #dbg_declare(ptr %x.addr, !1, !DIExpression(), !9)
  ret void
}
!1 = !DILocalVariable(name: "x", arg: 1, scope: !8)
!2 = !DILocalVariable(name: "y", arg: 2, scope: !8)
"#;
        let set = bind(text, "f").unwrap();
        assert_eq!(names(&set), vec![(0, "y"), (1, "x")]);
        assert_eq!(set.warnings.len(), 2);
        assert!(set
            .warnings
            .iter()
            .all(|w| w.code == Some(codes::W_ARG_MISMATCH)));
    }

    #[test]
    fn non_qualifying_instructions_skipped() {
        let text = r#"
define void @f(ptr %p) {
entry:
  call void @llvm.dbg.assign(metadata i1 undef, metadata !3, metadata !DIExpression(), metadata !4, metadata ptr %p, metadata !DIExpression())
  call void @helper(ptr %p)
  #dbg_label(!5, !9)
  call void @llvm.dbg.value(metadata ptr %p, metadata !1, metadata !DIExpression()), !dbg !9
  ret void
}
!1 = !DILocalVariable(name: "buf", arg: 1, scope: !8)
"#;
        let set = bind(text, "f").unwrap();
        assert_eq!(names(&set), vec![(0, "buf")]);
    }

    #[test]
    fn only_entry_block_is_scanned() {
        let text = r#"
define void @f(i32 %x) {
entry:
  br label %next
next:
  call void @llvm.dbg.declare(metadata ptr %x.addr, metadata !1, metadata !DIExpression())
  ret void
}
!1 = !DILocalVariable(name: "x", arg: 1, scope: !8)
"#;
        let set = bind(text, "f").unwrap();
        assert!(set.bindings.is_empty());
    }

    #[test]
    fn local_variable_record_warns() {
        let text = r#"
define void @f(i32 %x) {
  call void @llvm.dbg.declare(metadata ptr %tmp, metadata !3, metadata !DIExpression())
  ret void
}
!3 = !DILocalVariable(name: "tmp", scope: !8)
"#;
        let set = bind(text, "f").unwrap();
        assert_eq!(names(&set), vec![(0, "tmp")]);
        assert_eq!(set.warnings[0].code, Some(codes::W_NON_PARAMETER));
    }

    #[test]
    fn wrong_metadata_kind_is_fatal() {
        let text = r#"
define void @f(i32 %x) {
  call void @llvm.dbg.declare(metadata ptr %x.addr, metadata !9, metadata !DIExpression())
  ret void
}
!9 = !DILocation(line: 1, column: 1, scope: !8)
"#;
        let err = bind(text, "f").unwrap_err();
        assert_eq!(err.code, Some(codes::E_METADATA_SHAPE));
        assert!(err.message.contains("!DILocation"), "{}", err.message);
        assert_eq!(err.related_spans.len(), 1);
    }

    #[test]
    fn undefined_metadata_is_fatal() {
        let text = "define void @f(i32 %x) {\n  #dbg_declare(ptr %x.addr, !42, !DIExpression(), !9)\n  ret void\n}\n";
        let err = bind(text, "f").unwrap_err();
        assert_eq!(err.code, Some(codes::E_METADATA_SHAPE));
        assert!(err.message.contains("!42"));
    }

    #[test]
    fn nameless_variable_is_fatal() {
        let text = r#"
define void @f(i32 %x) {
  #dbg_declare(ptr %x.addr, !1, !DIExpression(), !9)
  ret void
}
!1 = !DILocalVariable(arg: 1, scope: !8)
"#;
        assert_eq!(
            bind(text, "f").unwrap_err().code,
            Some(codes::E_METADATA_SHAPE)
        );
    }

    #[test]
    fn non_reference_variable_is_fatal() {
        let text = "define void @f(i32 %x) {\n  call void @llvm.dbg.value(metadata i32 %x, metadata i32 0, metadata !DIExpression())\n  ret void\n}\n";
        assert_eq!(
            bind(text, "f").unwrap_err().code,
            Some(codes::E_METADATA_SHAPE)
        );
    }

    #[test]
    fn undercount_rejected() {
        let text = "define void @f(i32 %x) {\n  ret void\n}\n";
        let module = load(text);
        let function = module.function("f").unwrap();
        let set = resolve_bindings(&module, function).unwrap();
        assert!(set.bindings.is_empty());
        let err = set.require_complete(function).unwrap_err();
        assert_eq!(err.code, Some(codes::E_BINDING_UNDERCOUNT));
        assert!(err.message.contains("parameter 1 would be unbound"), "{}", err.message);
    }

    #[test]
    fn zero_params_zero_records_is_complete() {
        let text = "define void @f() {\n  ret void\n}\n";
        let module = load(text);
        let function = module.function("f").unwrap();
        let set = resolve_bindings(&module, function).unwrap();
        assert!(set.require_complete(function).is_ok());
    }

    fn binding(index: usize, name: &str) -> ParameterBinding {
        ParameterBinding {
            index,
            name: name.into(),
            arg: Some(index as u32 + 1),
            record: DebugKind::Declare,
            span: (0..0).into(),
        }
    }

    #[test]
    fn name_validation() {
        let ok = BindingSet {
            bindings: vec![binding(0, "buf"), binding(1, "_len2")],
            warnings: vec![],
        };
        assert!(ok.validate_names("fill").is_ok());

        let dup = BindingSet {
            bindings: vec![binding(0, "x"), binding(1, "x")],
            warnings: vec![],
        };
        let err = dup.validate_names("f").unwrap_err();
        assert_eq!(err.code, Some(codes::E_PARAM_NAME));
        assert_eq!(err.related_spans.len(), 1);

        for bad in ["argc", "i32", "f", "2x", "a.b", ""] {
            let set = BindingSet {
                bindings: vec![binding(0, bad)],
                warnings: vec![],
            };
            assert!(set.validate_names("f").is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn c_keywords_and_preamble_names_rejected() {
        let cases = [
            ("char", "is a C keyword"),
            ("double", "is a C keyword"),
            ("default", "is a C keyword"),
            ("int", "is a C keyword"),
            ("__KLEE__", "is reserved for the C implementation"),
            ("_Bool", "is reserved for the C implementation"),
            ("__int128", "is reserved for the C implementation"),
            ("int8_t", "the harness already uses"),
            ("NULL", "the harness already uses"),
            ("INT32_MAX", "the harness already uses"),
        ];
        for (name, reason) in cases {
            let set = BindingSet {
                bindings: vec![binding(0, name)],
                warnings: vec![],
            };
            let err = set.validate_names("f").unwrap_err();
            assert_eq!(err.code, Some(codes::E_PARAM_NAME), "{name}");
            assert!(err.message.ends_with(reason), "{name}: {}", err.message);
        }
    }

    #[test]
    fn ordinary_underscore_names_accepted() {
        let set = BindingSet {
            bindings: vec![binding(0, "_len"), binding(1, "chars"), binding(2, "null")],
            warnings: vec![],
        };
        assert!(set.validate_names("f").is_ok());
    }

    #[test]
    fn binding_records_the_debug_kind() {
        let text = r#"
define void @f(i32 %x, i32 %y) {
  #dbg_declare(ptr %x.addr, !1, !DIExpression(), !9)
  call void @llvm.dbg.value(metadata i32 %y, metadata !2, metadata !DIExpression()), !dbg !9
  ret void
}
!1 = !DILocalVariable(name: "x", arg: 1, scope: !8)
!2 = !DILocalVariable(name: "y", arg: 2, scope: !8)
"#;
        let set = bind(text, "f").unwrap();
        let kinds: Vec<DebugKind> = set.bindings.iter().map(|b| b.record).collect();
        assert_eq!(kinds, vec![DebugKind::Declare, DebugKind::Value]);
    }
}
