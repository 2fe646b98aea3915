// pipeline.rs — Per-module generation orchestration
//
// Walks the modules of a container in order: materialize, retarget, look up
// the function, bind parameter names, plan and emit. Each document is written
// to the output stream before the next module is materialized.
//
// Preconditions: the container came from `loader::split_container`.
// Postconditions: one document per module defining the function, or
//                 `has_error` is set and processing stopped at the first
//                 fatal diagnostic.
// Failure modes: invalid function name, syntax errors, declaration-only
//                function, binding or representation errors, write failure,
//                function defined nowhere.
// Side effects: writes documents to `out`; progress on stderr when verbose.

use std::io::Write;

use serde::Serialize;

use crate::bind::{is_c_identifier, resolve_bindings};
use crate::codegen::{emit_harness, plan_harness, HarnessPlan};
use crate::diag::{codes, Diagnostic};
use crate::ir::Module;
use crate::loader::{materialize, Container};

pub const DEFAULT_BUFFER_SIZE: u32 = 1024;
pub const DEFAULT_TARGET_TRIPLE: &str = "x86_64-pc-linux-gnu";

// ── Configuration ──────────────────────────────────────────────────────────

/// Explicit generation settings. Nothing here is read from global state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarnessOptions {
    /// Target function name, without the `@` sigil.
    pub function: String,
    /// Byte size of the symbolic buffer declared for each pointer parameter.
    pub buffer_size: u32,
    /// Triple applied to every module before processing; `None` keeps each
    /// module's own.
    pub target_triple: Option<String>,
}

impl HarnessOptions {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            target_triple: Some(DEFAULT_TARGET_TRIPLE.to_string()),
        }
    }
}

/// What to write for each module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitKind {
    /// The C harness document.
    Harness,
    /// A pretty JSON description of the bindings and representations.
    Bindings,
}

// ── Reports ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ModuleReport {
    pub index: usize,
    pub plan: HarnessPlan,
}

#[derive(Debug, Default)]
pub struct GenerationReport {
    pub modules: Vec<ModuleReport>,
    pub diagnostics: Vec<Diagnostic>,
    pub has_error: bool,
}

impl GenerationReport {
    fn fail(&mut self, diag: Diagnostic) {
        self.has_error = true;
        self.diagnostics.push(diag);
    }
}

#[derive(Serialize)]
struct BindingsDocument<'a> {
    module: usize,
    source_filename: Option<&'a str>,
    target_triple: Option<&'a str>,
    #[serde(flatten)]
    plan: &'a HarnessPlan,
}

// ── Entry point ────────────────────────────────────────────────────────────

/// Generate one document per module of `container` that defines
/// `options.function`, writing each to `out` as soon as it is ready.
pub fn generate<W: Write>(
    container: &Container,
    options: &HarnessOptions,
    emit: EmitKind,
    out: &mut W,
    verbose: bool,
) -> GenerationReport {
    let mut report = GenerationReport::default();

    if !is_c_identifier(&options.function) {
        report.fail(
            Diagnostic::error(
                codes::E_FUNCTION_NAME,
                format!(
                    "`{}` cannot be called from a C harness; the function name must be a C identifier",
                    options.function
                ),
            )
            .with_hint("pass the function name without the `@` sigil"),
        );
        return report;
    }

    for source in &container.modules {
        let mut module = match materialize(source) {
            Ok(module) => module,
            Err(diags) => {
                report.has_error = true;
                report.diagnostics.extend(diags);
                return report;
            }
        };
        if let Some(triple) = &options.target_triple {
            module.set_target_triple(triple.as_str());
        }

        match generate_module(&module, options, &mut report.diagnostics, verbose) {
            Ok(Some(plan)) => {
                if let Err(diag) = write_document(&module, &plan, emit, out) {
                    report.fail(diag.in_module(module.index));
                    return report;
                }
                report.modules.push(ModuleReport {
                    index: module.index,
                    plan,
                });
            }
            Ok(None) => {}
            Err(diag) => {
                report.fail(diag.in_module(module.index));
                return report;
            }
        }
    }

    if report.modules.is_empty() {
        report
            .diagnostics
            .retain(|d| d.code != Some(codes::W_MODULE_SKIPPED));
        report.fail(Diagnostic::error(
            codes::E_FUNCTION_NOT_FOUND,
            format!(
                "no module in the input defines `{}` ({} module{} searched)",
                options.function,
                container.modules.len(),
                if container.modules.len() == 1 { "" } else { "s" }
            ),
        ));
    }
    report
}

/// Process one module. `Ok(None)` means the module does not contain the
/// function and was skipped.
fn generate_module(
    module: &Module,
    options: &HarnessOptions,
    diagnostics: &mut Vec<Diagnostic>,
    verbose: bool,
) -> Result<Option<HarnessPlan>, Diagnostic> {
    let Some(function) = module.function(&options.function) else {
        diagnostics.push(
            Diagnostic::warning(
                codes::W_MODULE_SKIPPED,
                format!(
                    "module {} does not contain `{}`; skipped",
                    module.index, options.function
                ),
            )
            .in_module(module.index),
        );
        if verbose {
            eprintln!("llvm-klee: module {}: skipped", module.index);
        }
        return Ok(None);
    };
    if function.is_declaration() {
        return Err(Diagnostic::error(
            codes::E_FUNCTION_DECLARED_ONLY,
            format!(
                "`{}` is only declared in module {}; a harness needs its body",
                function.name, module.index
            ),
        )
        .with_span(function.span));
    }

    let bindings = resolve_bindings(module, function)?;
    diagnostics.extend(
        bindings
            .warnings
            .iter()
            .cloned()
            .map(|w| w.in_module(module.index)),
    );
    if verbose {
        let names: Vec<&str> = bindings.bindings.iter().map(|b| b.name.as_str()).collect();
        eprintln!(
            "llvm-klee: module {}: `{}` has {} parameter(s){}, bound [{}]",
            module.index,
            function.name,
            function.params.len(),
            if function.variadic { " and varargs" } else { "" },
            names.join(", ")
        );
    }

    plan_harness(function, &bindings, options.buffer_size).map(Some)
}

fn write_document<W: Write>(
    module: &Module,
    plan: &HarnessPlan,
    emit: EmitKind,
    out: &mut W,
) -> Result<(), Diagnostic> {
    let text = match emit {
        EmitKind::Harness => emit_harness(plan).source,
        EmitKind::Bindings => {
            let doc = BindingsDocument {
                module: module.index,
                source_filename: module.source_filename.as_deref(),
                target_triple: module.target_triple.as_deref(),
                plan,
            };
            let mut json = serde_json::to_string_pretty(&doc).map_err(|e| {
                Diagnostic::error(codes::E_OUTPUT, format!("cannot serialize bindings: {e}"))
            })?;
            json.push('\n');
            json
        }
    };
    out.write_all(text.as_bytes())
        .and_then(|()| out.flush())
        .map_err(|e| Diagnostic::error(codes::E_OUTPUT, format!("cannot write output: {e}")))
}

// ── Provenance ─────────────────────────────────────────────────────────────

/// Provenance record for `--emit build-info`.
///
/// `input_hash`: SHA-256 of the raw input bytes.
/// `tool_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone, Serialize)]
pub struct Provenance {
    #[serde(serialize_with = "serialize_hex")]
    pub input_hash: [u8; 32],
    pub tool_version: &'static str,
    pub module_count: usize,
    pub options: HarnessOptions,
}

impl Provenance {
    /// Hex string of the input hash (64 characters).
    pub fn input_hash_hex(&self) -> String {
        bytes_to_hex(&self.input_hash)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }
}

fn serialize_hex<S: serde::Serializer>(bytes: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&bytes_to_hex(bytes))
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    use std::fmt::Write as _;
    let mut s = String::with_capacity(64);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

pub fn compute_provenance(
    input: &[u8],
    container: &Container,
    options: &HarnessOptions,
) -> Provenance {
    use sha2::{Digest, Sha256};

    let input_hash = {
        let mut hasher = Sha256::new();
        hasher.update(input);
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    };

    Provenance {
        input_hash,
        tool_version: env!("CARGO_PKG_VERSION"),
        module_count: container.modules.len(),
        options: options.clone(),
    }
}
