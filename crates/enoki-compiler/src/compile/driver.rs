//! The pass driver.
//!
//! Sequences the middle-end over every module function that has a body:
//! AST passes first (tail calls, symbols, closures), then the graph is
//! built and transformed until the code is in register-allocated,
//! two-operand form. The Graphviz dump of every function's finished CFG
//! lives here too.

use enoki_ir::dot;
use enoki_ir::node::{Kind, NodeId};

use crate::analyze::{analyse_symbols, analyse_tail_recursion, process_closures};
use crate::ast::Cx;
use crate::diagnostics::Diagnostics;

use super::def_assign::definite_assignment;
use super::flatten::flatten;
use super::frame::analyse_function_size;
use super::i386::i386ify;
use super::inline::analyse_inlining;
use super::opt::optimise;
use super::reduce::reduce;
use super::regalloc::register_allocation;

/// A pass over one function. Returns whether it changed anything.
pub type FunctionPass = fn(&mut Cx, NodeId, &mut Diagnostics) -> bool;

/// Apply a pass to every module function that has a body.
pub fn process_functions(cx: &mut Cx, diags: &mut Diagnostics, pass: FunctionPass) -> bool {
    let mut changed = false;
    let count = cx.arena.num_children(cx.module);
    for i in 0..count {
        let Some(node) = cx.arena.child(cx.module, i) else {
            continue;
        };
        if !cx.arena[node].is(Kind::Function) {
            continue;
        }
        if cx.arena.child(node, 0).is_none() {
            continue;
        }
        changed |= pass(cx, node, diags);
    }
    changed
}

/// Run the full middle-end. An error diagnostic from any stage means the
/// program is ill-formed; later stages assume well-formed graphs, so the
/// pipeline stops there and the caller skips code generation.
pub fn run(cx: &mut Cx, diags: &mut Diagnostics) {
    let passes: [FunctionPass; 11] = [
        analyse_tail_recursion,
        analyse_symbols,
        process_closures,
        flatten,
        reduce,
        definite_assignment,
        analyse_inlining,
        optimise,
        i386ify,
        register_allocation,
        analyse_function_size,
    ];
    for pass in passes {
        process_functions(cx, diags, pass);
        if diags.has_errors() {
            return;
        }
    }
}

/// Render every function's CFG as one Graphviz digraph.
pub fn print_graphs(cx: &Cx) -> String {
    let mut out = String::from("digraph G {\n");
    let mut sequence = 0;
    for i in 0..cx.arena.num_children(cx.module) {
        let Some(func) = cx.arena.child(cx.module, i) else {
            continue;
        };
        if !cx.arena[func].is(Kind::Function) {
            continue;
        }
        let Some(graph) = cx.arena[func].func().graph.as_ref() else {
            continue;
        };
        sequence += 1;
        let name = cx.interner.resolve(cx.arena[func].decl().name);
        dot::print_graph(&mut out, &cx.arena, &cx.interner, graph, name, sequence);
    }
    out.push_str("}\n");
    out
}
