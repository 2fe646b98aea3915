// codegen.rs — KLEE harness generation
//
// Turns a function plus its recovered parameter bindings into a standalone C
// `main` that declares one symbolic object per parameter and calls the
// function with them.
//
// Preconditions: every formal parameter has a binding (checked by
//                `plan_harness`).
// Postconditions: `emit_harness` output is a pure function of the plan;
//                 identical plans produce byte-identical documents.
// Failure modes: planning fails on binding undercount or on a parameter
//                without a symbolic representation.
// Side effects: none.

use std::fmt::Write as _;

use serde::Serialize;

use crate::bind::BindingSet;
use crate::diag::Diagnostic;
use crate::ir::{DebugKind, Function};
use crate::repr::{select_representation, Representation};
use crate::types::IrType;

// ── Public types ────────────────────────────────────────────────────────────

/// Everything emission needs for one function, in formal-parameter order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarnessPlan {
    pub function: String,
    /// The call passes only the fixed parameters of a variadic function.
    pub variadic: bool,
    pub parameters: Vec<PlannedParameter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedParameter {
    pub index: usize,
    pub name: String,
    #[serde(serialize_with = "serialize_display")]
    pub ty: IrType,
    pub representation: Representation,
    /// Bytes `klee_make_symbolic` marks symbolic.
    pub extent: u32,
    pub record: DebugKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedHarness {
    pub source: String,
}

fn serialize_display<S: serde::Serializer>(ty: &IrType, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(ty)
}

// ── Planning ────────────────────────────────────────────────────────────────

/// Pair each parameter with its binding and representation.
pub fn plan_harness(
    function: &Function,
    bindings: &BindingSet,
    buffer_size: u32,
) -> Result<HarnessPlan, Diagnostic> {
    bindings.require_complete(function)?;
    bindings.validate_names(&function.name)?;

    let parameters = function
        .params
        .iter()
        .zip(&bindings.bindings)
        .map(|(param, binding)| {
            let representation = select_representation(&binding.name, param, buffer_size)?;
            Ok(PlannedParameter {
                index: binding.index,
                name: binding.name.clone(),
                ty: param.ty.clone(),
                extent: representation.extent(),
                representation,
                record: binding.record,
            })
        })
        .collect::<Result<Vec<_>, Diagnostic>>()?;

    Ok(HarnessPlan {
        function: function.name.clone(),
        variadic: function.variadic,
        parameters,
    })
}

// ── Emission ────────────────────────────────────────────────────────────────

const PREAMBLE: &str = "\
#include <stdint.h>
#include <stdlib.h>

#ifdef __KLEE__
#include <klee/klee.h>
#endif

#define i8 int8_t
#define i16 int16_t
#define i32 int32_t
#define i64 int64_t
#define i128 __int128

";

pub fn emit_harness(plan: &HarnessPlan) -> GeneratedHarness {
    let mut ctx = HarnessCtx::new();
    ctx.out.push_str(PREAMBLE);
    ctx.emit_main(plan);
    GeneratedHarness { source: ctx.out }
}

struct HarnessCtx {
    out: String,
}

impl HarnessCtx {
    fn new() -> Self {
        HarnessCtx {
            out: String::with_capacity(PREAMBLE.len() + 256),
        }
    }

    fn emit_main(&mut self, plan: &HarnessPlan) {
        self.out.push_str("int main(int argc, char** argv) {\n");
        self.out.push_str("#ifdef __KLEE__\n");
        for param in &plan.parameters {
            self.emit_symbolic(param);
        }
        self.emit_call(plan);
        self.out.push_str("#endif\n");
        self.out.push('\n');
        self.out.push_str("  return 0;\n");
        self.out.push_str("}\n");
    }

    fn emit_symbolic(&mut self, param: &PlannedParameter) {
        let name = &param.name;
        let repr = &param.representation;
        let _ = writeln!(self.out, "  {};", repr.declarator(name));
        let _ = writeln!(
            self.out,
            "  klee_make_symbolic({}, sizeof({}), \"{}\");",
            repr.address_of(name),
            name,
            name
        );
    }

    fn emit_call(&mut self, plan: &HarnessPlan) {
        let args: Vec<&str> = plan.parameters.iter().map(|p| p.name.as_str()).collect();
        let _ = writeln!(self.out, "  {}({});", plan.function, args.join(", "));
    }
}
