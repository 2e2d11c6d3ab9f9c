//! Assembly emission.
//!
//! `linearize` walks a finished graph in execution order, deciding where
//! labels and jumps are needed, and drives an [`EmitBackend`] for the
//! actual instructions. `asm` is the i386 AT&T backend.

mod asm;
mod linearize;

#[cfg(test)]
mod emit_tests;

pub use asm::generate_asm;
pub use linearize::{emit_function, EmitBackend};
