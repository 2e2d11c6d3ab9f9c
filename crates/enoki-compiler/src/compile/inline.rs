//! Function inlining: graph-level copy-and-splice.
//!
//! A function is inlinable when it has a CFG of at most 500 vertex slots
//! containing no call expressions. At an inlinable call site, the callee's
//! graph is copied into the caller with labels offset by the caller's
//! vertex count, every copied variable gets a `$n<offset>` prefix (and is
//! rebound to the copied declarations) to avoid capture, the copied enter
//! becomes an assignment of the call's arguments into the callee's inputs,
//! the copied returns become assignments to the call's destination, and the
//! call vertex disappears. The callee's use count drops by one.

use enoki_core::ice;
use enoki_ir::graph::{EdgeKind, Graph};
use enoki_ir::node::{DeclFlags, Kind, NodeId};

use crate::ast::Cx;
use crate::diagnostics::Diagnostics;

use super::{restore_graph, take_graph};

const INLINE_THRESHOLD: usize = 500;

pub fn analyse_inlining(cx: &mut Cx, func: NodeId, _diags: &mut Diagnostics) -> bool {
    let Some(mut graph) = take_graph!(cx, func) else {
        return false;
    };

    let mut changed = false;
    let original_count = graph.vertex_count();
    for label in 0..original_count {
        let Some(vertex) = graph.vertex_at(label) else {
            continue;
        };
        changed |= analyse_vertex(cx, func, &mut graph, vertex);
    }

    restore_graph!(cx, func, graph);
    changed
}

fn node_contains_call(cx: &Cx, node: NodeId) -> bool {
    if cx.arena[node].is(Kind::Call) {
        return true;
    }
    (0..cx.arena.num_children(node)).any(|i| {
        cx.arena
            .child(node, i)
            .is_some_and(|child| node_contains_call(cx, child))
    })
}

/// Can this function be inlined into another (and is it potentially worth
/// it)? It must have a CFG, the CFG must be under the size threshold, and
/// it must not itself contain calls.
pub fn is_inlinable(cx: &Cx, func: Option<NodeId>) -> bool {
    let Some(func) = func else {
        return false;
    };
    let Some(graph) = cx.arena[func].func().graph.as_ref() else {
        return false;
    };
    if graph.vertex_count() > INLINE_THRESHOLD {
        return false;
    }
    for label in 0..graph.vertex_count() {
        if let Some(vertex) = graph.vertex_at(label) {
            if node_contains_call(cx, vertex) {
                return false;
            }
        }
    }
    true
}

/// Give every variable under `node` the per-copy prefix and rebind it to
/// the renamed declaration copied into the caller's table.
fn rename_variables(cx: &mut Cx, func: NodeId, node: NodeId, base: usize) {
    if cx.arena[node].is(Kind::Variable) {
        let old_name = cx.arena[node].var().name;
        let renamed = format!("$n{base}{}", cx.interner.resolve(old_name));
        let new_name = cx.interner.intern_owned(renamed);
        cx.arena[node].var_mut().name = new_name;
        if let Some(&decl) = cx.arena[func].func().table.get(&new_name) {
            cx.arena[node].var_mut().decl = Some(decl);
        }
        return;
    }
    for i in 0..cx.arena.num_children(node) {
        if let Some(child) = cx.arena.child(node, i) {
            rename_variables(cx, func, child, base);
        }
    }
}

/// Copy the callee's CFG into the caller's graph. Empty slots are copied
/// too, so a callee label `l` maps to caller label `base + l`. Returns the
/// per-label copies.
fn add_cfg(
    cx: &mut Cx,
    graph: &mut Graph,
    func: NodeId,
    callee: NodeId,
    callee_graph: &Graph,
) -> Vec<Option<NodeId>> {
    let base = graph.vertex_count();

    let mut copied = Vec::with_capacity(callee_graph.vertex_count());
    for label in 0..callee_graph.vertex_count() {
        match callee_graph.vertex_at(label) {
            Some(src) => {
                let copy = cx.arena.copy(src);
                graph.add_vertex(copy);
                copied.push(Some(copy));
            }
            None => {
                graph.add_empty_slot();
                copied.push(None);
            }
        }
    }

    for label in 0..callee_graph.vertex_count() {
        let Some(src) = callee_graph.vertex_at(label) else {
            continue;
        };
        let Some(dest) = copied[label] else {
            continue;
        };
        let Some(succs) = callee_graph.successors(src) else {
            continue;
        };
        let succ_edges: Vec<(usize, EdgeKind)> = succs
            .iter()
            .filter_map(|(succ, kind)| callee_graph.label_of(*succ).map(|l| (l, *kind)))
            .collect();
        for (succ_label, kind) in succ_edges {
            if let Some(dest_succ) = copied[succ_label] {
                graph.add_edge(dest, dest_succ, kind);
            }
        }
    }

    // Copy the callee's declarations under prefixed names; the copies stop
    // being arguments, they are plain locals of the caller now.
    let entries: Vec<(enoki_core::interner::Symbol, NodeId)> = cx.arena[callee]
        .func()
        .table
        .iter()
        .map(|(name, decl)| (*name, *decl))
        .collect();
    for (name, decl) in entries {
        let renamed = format!("$n{base}{}", cx.interner.resolve(name));
        let new_name = cx.interner.intern_owned(renamed);
        let copy = cx.arena.copy(decl);
        cx.arena[copy].decl_mut().flags -= DeclFlags::ARGUMENT;
        cx.arena[copy].decl_mut().name = new_name;
        cx.arena[func].func_mut().table.insert(new_name, copy);
    }

    copied
}

fn analyse_vertex(cx: &mut Cx, func: NodeId, graph: &mut Graph, vertex: NodeId) -> bool {
    if !cx.arena[vertex].is(Kind::Assign) {
        return false;
    }
    let expr = cx.arena.child_req(vertex, 1);
    if !cx.arena[expr].is(Kind::Call) {
        return false;
    }

    let fvar = cx.arena.child_req(expr, 0);
    let fname = cx.arena[fvar].var().name;
    let callee = cx.module_function(fname);
    if !is_inlinable(cx, callee) {
        eprintln!(
            "Call to '{}' in '{}' is not inlinable",
            cx.interner.resolve(fname),
            cx.interner.resolve(cx.arena[func].decl().name)
        );
        return false;
    }
    let Some(callee) = callee else {
        return false;
    };
    eprintln!(
        "Call to '{}' in '{}' is inlinable",
        cx.interner.resolve(fname),
        cx.interner.resolve(cx.arena[func].decl().name)
    );

    let callee_graph = take_graph!(cx, callee).unwrap_or_else(|| ice!("inlinable callee lost its graph"));
    let base = graph.vertex_count();
    let copied = add_cfg(cx, graph, func, callee, &callee_graph);

    let entry = copied[0].unwrap_or_else(|| ice!("copied graph has no enter vertex"));
    let exit = copied[1].unwrap_or_else(|| ice!("copied graph has no exit vertex"));

    let in_tuple = cx.input_tuple(callee);
    rename_variables(cx, func, in_tuple, base);
    for label in base..graph.vertex_count() {
        if let Some(v) = graph.vertex_at(label) {
            rename_variables(cx, func, v, base);
        }
    }

    // The entry becomes an assignment of the call's arguments into the
    // callee's (renamed) input tuple.
    let args = cx.arena.child_req(expr, 1);
    let new_assign = cx.make_assignment(Some(in_tuple), args, cx.arena[vertex].line);
    graph.add_vertex(new_assign);
    graph.replace_forward(entry, Some(new_assign), EdgeKind::empty());
    graph.remove_vertex(entry);

    // Predecessors of the call are repointed at the new assignment.
    graph.replace_backward(vertex, new_assign, EdgeKind::empty());

    // The call's single successor takes over from the copied exit.
    let Some((succ, _)) = graph.first_successor(vertex) else {
        ice!("call vertex has no successor");
    };
    graph.remove_edge(vertex, succ);
    graph.replace_backward(exit, succ, EdgeKind::empty());

    // Copied returns become assignments to the call's destination.
    let dest = cx.arena.child(vertex, 0);
    for ret in graph.predecessor_list(succ) {
        if !cx.arena[ret].is(Kind::Return) {
            continue;
        }
        let dest_copy = dest.map(|d| cx.arena.copy(d));
        let ret_expr = cx.arena.child_req(ret, 0);
        let ret_assign = cx.make_assignment(dest_copy, ret_expr, cx.arena[ret].line);
        graph.add_vertex(ret_assign);
        graph.replace_forward(ret, Some(ret_assign), EdgeKind::empty());
        graph.replace_backward(ret, ret_assign, EdgeKind::empty());
        graph.remove_vertex(ret);
    }

    graph.remove_vertex(vertex);
    graph.remove_vertex(exit);

    cx.arena[callee].decl_mut().use_count -= 1;
    restore_graph!(cx, callee, callee_graph);
    true
}
