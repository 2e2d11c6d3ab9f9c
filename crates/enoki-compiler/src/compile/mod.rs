//! CFG-level passes and the pass driver.
//!
//! The passes here run in the order `driver::run` sequences them:
//! flattening builds each function's graph, reduction brings expressions
//! into three-address atomic form, the dataflow instances check definite
//! assignment and compute liveness, then inlining, structural optimisation,
//! i386 normalisation and register allocation rewrite the graph until it is
//! ready for emission.

pub mod def_assign;
pub mod driver;
pub mod flatten;
pub mod frame;
pub mod i386;
pub mod inline;
pub mod liveness;
pub mod opt;
pub mod reduce;
pub mod regalloc;

#[cfg(test)]
mod compile_tests;

/// Take a function's graph out of the arena for a pass to work on.
/// Pairs with `restore_graph`; a missing graph is the caller's signal that
/// the pass does not apply.
macro_rules! take_graph {
    ($cx:expr, $func:expr) => {
        $cx.arena[$func].func_mut().graph.take()
    };
}

macro_rules! restore_graph {
    ($cx:expr, $func:expr, $graph:expr) => {
        $cx.arena[$func].func_mut().graph = Some($graph)
    };
}

pub(crate) use restore_graph;
pub(crate) use take_graph;
