//! enoki compiler: parser, middle-end passes, and assembly emitter.
//!
//! The compilation pipeline:
//! - `parser` - lexer and recursive-descent parser producing the IR tree
//! - `analyze` - AST passes (tail-call rewrite, symbols, closure lowering)
//! - `compile` - CFG passes (flattening, reduction, dataflow analyses,
//!   inlining, structural optimisation, i386 normalisation, register
//!   allocation) and the pass driver
//! - `emit` - CFG linearisation and i386 AT&T assembly output
//! - `diagnostics` - user-facing error reporting

pub mod analyze;
pub mod ast;
pub mod compile;
pub mod diagnostics;
pub mod emit;
pub mod parser;

#[cfg(test)]
pub mod test_utils;

pub use ast::Cx;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};

/// Errors that end a compilation early.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("parsing failed with {} errors", .0.error_count())]
    Parse(Diagnostics),

    #[error("analysis failed with {} errors", .0.error_count())]
    Analyze(Diagnostics),
}

/// Result type for compilation entry points.
pub type Result<T> = std::result::Result<T, Error>;

/// A finished compilation: the context holding the transformed module, plus
/// any diagnostics the passes produced.
pub struct Compilation {
    pub cx: Cx,
    pub diagnostics: Diagnostics,
}

/// Parse `source` and run the whole middle-end over it.
///
/// Parse errors abort before any pass runs. The passes themselves collect
/// diagnostics and keep going, so one compile reports as many issues as
/// feasible; but a pass error (say, a `break` outside any loop) still makes
/// the program ill-formed, and an ill-formed program never reaches code
/// generation. Warnings alone do not fail the compilation.
pub fn compile_source(filename: &str, source: &str) -> Result<Compilation> {
    let mut cx = Cx::new(filename);
    let mut diagnostics = parser::parse(&mut cx, source);
    if diagnostics.has_errors() {
        return Err(Error::Parse(diagnostics));
    }

    compile::driver::run(&mut cx, &mut diagnostics);
    if diagnostics.has_errors() {
        return Err(Error::Analyze(diagnostics));
    }

    Ok(Compilation { cx, diagnostics })
}
