// Property-based tests for harness generation invariants.
//
// Functions are generated as textual IR with one debug declaration per
// parameter (or deliberately fewer), then run through the library pipeline.
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use llvm_klee::diag::codes;
use llvm_klee::loader::split_container;
use llvm_klee::pipeline::{generate, EmitKind, GenerationReport, HarnessOptions};
use proptest::prelude::*;

// ── IR generator ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct GenParam {
    ty: &'static str,
    name: String,
}

fn arb_type() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("i8"),
        Just("i16"),
        Just("i32"),
        Just("i64"),
        Just("i128"),
        Just("ptr"),
    ]
}

/// Parameters with distinct source names `v<i>_<suffix>`.
fn arb_params(max: usize) -> impl Strategy<Value = Vec<GenParam>> {
    prop::collection::vec((arb_type(), "[a-z]{1,6}"), 0..=max).prop_map(|raw| {
        raw.into_iter()
            .enumerate()
            .map(|(i, (ty, suffix))| GenParam {
                ty,
                name: format!("v{}_{}", i, suffix),
            })
            .collect()
    })
}

/// A `-g -O0`-shaped function whose entry block declares the first
/// `recorded` parameters.
fn render_function(params: &[GenParam], recorded: usize) -> String {
    let signature: Vec<String> = params
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{} noundef %{}", p.ty, i))
        .collect();
    let mut ir = format!(
        "; ModuleID = 'gen.c'\nsource_filename = \"gen.c\"\n\ndefine dso_local void @target({}) #0 !dbg !8 {{\nentry:\n",
        signature.join(", ")
    );
    for p in params {
        ir.push_str(&format!("  %{}.addr = alloca {}, align 8\n", p.name, p.ty));
    }
    for (i, p) in params.iter().enumerate().take(recorded) {
        ir.push_str(&format!("  store {} %{}, ptr %{}.addr, align 8\n", p.ty, i, p.name));
        ir.push_str(&format!(
            "  call void @llvm.dbg.declare(metadata ptr %{}.addr, metadata !{}, metadata !DIExpression()), !dbg !9\n",
            p.name,
            100 + i
        ));
    }
    ir.push_str("  ret void\n}\n\n");
    for (i, p) in params.iter().enumerate() {
        ir.push_str(&format!(
            "!{} = !DILocalVariable(name: \"{}\", arg: {}, scope: !8, file: !1, line: 1)\n",
            100 + i,
            p.name,
            i + 1
        ));
    }
    ir
}

fn run(ir: &str, buffer_size: u32) -> (GenerationReport, String) {
    let container = split_container(ir.as_bytes()).unwrap();
    let options = HarnessOptions {
        buffer_size,
        ..HarnessOptions::new("target")
    };
    let mut out = Vec::new();
    let report = generate(&container, &options, EmitKind::Harness, &mut out, false);
    (report, String::from_utf8(out).unwrap())
}

// ── Properties ──────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn complete_records_declare_and_pass_every_parameter(
        params in arb_params(6),
        buffer_size in 1u32..4096,
    ) {
        let ir = render_function(&params, params.len());
        let (report, harness) = run(&ir, buffer_size);
        prop_assert!(!report.has_error, "{:?}", report.diagnostics);

        let main_body = harness.split("int main(int argc, char** argv) {\n#ifdef __KLEE__\n").nth(1).unwrap();
        let lines: Vec<&str> = main_body.lines().collect();
        prop_assert_eq!(lines.len(), 2 * params.len() + 5);

        for (i, p) in params.iter().enumerate() {
            let decl = lines[2 * i];
            let symbolic = lines[2 * i + 1];
            if p.ty == "ptr" {
                prop_assert_eq!(decl.to_string(), format!("  char {}[{}];", p.name, buffer_size));
                prop_assert_eq!(
                    symbolic.to_string(),
                    format!("  klee_make_symbolic({0}, sizeof({0}), \"{0}\");", p.name)
                );
            } else {
                prop_assert_eq!(decl.to_string(), format!("  {} {};", p.ty, p.name));
                prop_assert_eq!(
                    symbolic.to_string(),
                    format!("  klee_make_symbolic(&{0}, sizeof({0}), \"{0}\");", p.name)
                );
            }
        }

        let args: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        prop_assert_eq!(lines[2 * params.len()].to_string(), format!("  target({});", args.join(", ")));
    }

    #[test]
    fn missing_records_are_rejected(
        params in arb_params(6).prop_filter("needs a parameter", |p| !p.is_empty()),
        missing in 1usize..=6,
    ) {
        let recorded = params.len().saturating_sub(missing);
        let ir = render_function(&params, recorded);
        let (report, harness) = run(&ir, 1024);
        prop_assert!(report.has_error);
        prop_assert!(harness.is_empty());
        prop_assert_eq!(report.diagnostics.last().unwrap().code, Some(codes::E_BINDING_UNDERCOUNT));
    }

    #[test]
    fn output_is_deterministic(params in arb_params(4)) {
        let ir = render_function(&params, params.len());
        let (_, first) = run(&ir, 1024);
        let (_, second) = run(&ir, 1024);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn buffer_size_only_affects_pointer_extents(
        params in arb_params(5),
        a in 1u32..100_000,
        b in 1u32..100_000,
    ) {
        let ir = render_function(&params, params.len());
        let (_, with_a) = run(&ir, a);
        let (_, with_b) = run(&ir, b);
        let normalized_a = with_a.replace(&format!("[{a}];"), "[N];");
        let normalized_b = with_b.replace(&format!("[{b}];"), "[N];");
        prop_assert_eq!(normalized_a, normalized_b);
    }
}

#[test]
fn generator_produces_loadable_ir() {
    let params = vec![
        GenParam { ty: "i32", name: "v0_a".into() },
        GenParam { ty: "ptr", name: "v1_b".into() },
    ];
    let (report, harness) = run(&render_function(&params, 2), 16);
    assert!(!report.has_error, "{:?}", report.diagnostics);
    assert!(harness.contains("  target(v0_a, v1_b);\n"));
}
