use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};

use llvm_klee::diag::Diagnostic;
use llvm_klee::loader::{self, Container};
use llvm_klee::pipeline::{self, EmitKind, HarnessOptions};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EmitStage {
    Harness,
    Bindings,
    BuildInfo,
}

#[derive(Parser, Debug)]
#[command(
    name = "llvm-klee",
    version,
    about = "Generates KLEE symbolic-execution harnesses for functions in LLVM IR modules"
)]
struct Cli {
    /// Input textual IR file (`-` for standard input)
    input: PathBuf,

    /// Function to build a harness for, without the `@` sigil
    function: String,

    /// Byte size of the symbolic buffer declared for pointer parameters
    #[arg(
        short = 's',
        long,
        default_value_t = pipeline::DEFAULT_BUFFER_SIZE,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    array_size: u32,

    /// Target triple applied to every module before processing
    #[arg(short = 't', long, default_value = pipeline::DEFAULT_TARGET_TRIPLE)]
    target_triple: String,

    /// Output kind
    #[arg(long, value_enum, default_value_t = EmitStage::Harness)]
    emit: EmitStage,

    /// Print stage progress
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    let display_path = if is_stdin(&cli.input) {
        "<stdin>".to_string()
    } else {
        cli.input.display().to_string()
    };

    if cli.verbose {
        eprintln!("llvm-klee: input    = {}", display_path);
        eprintln!("llvm-klee: function = {}", cli.function);
        eprintln!("llvm-klee: emit     = {:?}", cli.emit);
    }

    // ── Read and split the container ──
    let bytes = match loader::read_input(&cli.input) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("llvm-klee: {}", e);
            std::process::exit(2);
        }
    };
    let container = match loader::split_container(&bytes) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("llvm-klee: {}: {}", display_path, e);
            std::process::exit(1);
        }
    };

    if cli.verbose {
        eprintln!(
            "llvm-klee: {} bytes, {} module(s)",
            bytes.len(),
            container.modules.len()
        );
    }

    let options = HarnessOptions {
        function: cli.function.clone(),
        buffer_size: cli.array_size,
        target_triple: Some(cli.target_triple.clone()),
    };

    let emit = match cli.emit {
        EmitStage::Harness => EmitKind::Harness,
        EmitStage::Bindings => EmitKind::Bindings,
        EmitStage::BuildInfo => {
            let provenance = pipeline::compute_provenance(&bytes, &container, &options);
            if cli.verbose {
                eprintln!("llvm-klee: sha256   = {}", provenance.input_hash_hex());
            }
            let written = provenance
                .to_json()
                .map_err(|e| e.to_string())
                .and_then(|json| {
                    let mut stdout = std::io::stdout().lock();
                    stdout
                        .write_all(json.as_bytes())
                        .and_then(|()| stdout.flush())
                        .map_err(|e| e.to_string())
                });
            if let Err(e) = written {
                eprintln!("llvm-klee: error: cannot write build info: {}", e);
                std::process::exit(1);
            }
            return;
        }
    };

    // ── Generate ──
    let mut stdout = std::io::stdout().lock();
    let report = pipeline::generate(&container, &options, emit, &mut stdout, cli.verbose);
    drop(stdout);

    for diag in &report.diagnostics {
        print_diagnostic(&display_path, &container, diag);
    }

    if cli.verbose {
        let errors = report.diagnostics.iter().filter(|d| d.is_error()).count();
        eprintln!(
            "llvm-klee: generated {} document(s), {} error(s), {} warning(s)",
            report.modules.len(),
            errors,
            report.diagnostics.len() - errors
        );
    }

    if report.has_error {
        std::process::exit(1);
    }
}

fn print_diagnostic(path: &str, container: &Container, diag: &Diagnostic) {
    match container.location(diag) {
        Some((line, col)) => eprintln!("llvm-klee: {}:{}:{}: {}", path, line, col, diag),
        None => eprintln!("llvm-klee: {}: {}", path, diag),
    }
    for related in &diag.related_spans {
        let location = diag
            .module
            .and_then(|m| container.modules.get(m))
            .map(|source| source.line_col(related.span.start));
        if let Some((line, col)) = location {
            eprintln!("  note: {}:{}:{}: {}", path, line, col, related.label);
        }
    }
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}
