// llvm-klee — KLEE harness generation from LLVM IR
//
// Library root. Loading (lexer, parser, types, loader, ir) feeds the
// generation stages (bind, repr, codegen) driven by `pipeline`.

pub mod bind;
pub mod codegen;
pub mod diag;
pub mod ir;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod pipeline;
pub mod repr;
pub mod types;
