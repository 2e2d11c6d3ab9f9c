//! Register allocation by interference-graph colouring.
//!
//! Build an interference graph with a vertex for each integer-typed
//! declaration in the function. Using the liveness result, connect every
//! pair of declarations simultaneously live at some program point. Colour
//! greedily; a colour beyond the target's register count means the
//! declaration is spilled to memory (colour 0). Statements that would then
//! need two memory operands get a register-eligible temporary spliced in,
//! and liveness plus colouring rerun until nothing changes.

use enoki_core::ice;
use enoki_ir::flow::SetRef;
use enoki_ir::graph::{EdgeKind, Graph};
use enoki_ir::node::{Kind, NodeId};
use enoki_ir::ops;

use crate::ast::Cx;
use crate::diagnostics::Diagnostics;

use super::liveness::liveness_analysis;
use super::{restore_graph, take_graph};

pub fn register_allocation(cx: &mut Cx, func: NodeId, diags: &mut Diagnostics) -> bool {
    loop {
        liveness_analysis(cx, func, diags);
        graph_colouring(cx, func);
        if !check_validity(cx, func) {
            break;
        }
    }
    true
}

fn graph_colouring(cx: &mut Cx, func: NodeId) {
    let interference = build_interference_graph(cx, func);
    colour_graph(cx, &interference);
    assign_registers(cx, func);
}

fn build_interference_graph(cx: &mut Cx, func: NodeId) -> Graph {
    let mut interference = Graph::new();

    let decls: Vec<NodeId> = cx.arena[func].func().table.values().copied().collect();
    for decl in decls {
        let int_typed = cx.arena[decl]
            .decl()
            .ty
            .is_some_and(|ty| cx.arena[ty].is(Kind::IntType));
        if int_typed {
            interference.add_vertex(decl);
        }
    }

    let Some(info) = cx.arena[func].func().liveness.as_ref() else {
        ice!("register allocation without a liveness result");
    };
    let sets: Vec<SetRef> = info
        .inputs
        .values()
        .flat_map(|slots| slots.iter().cloned())
        .collect();
    for set in sets {
        add_interference_edges(cx, &mut interference, &set);
    }

    interference
}

/// Connect every pair of declarations in one live set. The name ordering
/// keeps each unordered pair to a single forward edge plus its symmetrical
/// twin.
fn add_interference_edges(cx: &Cx, interference: &mut Graph, set: &SetRef) {
    let decls: Vec<NodeId> = set.borrow().vars.values().copied().collect();
    for &d1 in &decls {
        for &d2 in &decls {
            let n1 = cx.interner.resolve(cx.arena[d1].decl().name);
            let n2 = cx.interner.resolve(cx.arena[d2].decl().name);
            if n1 > n2 && interference.contains(d1) && interference.contains(d2) {
                interference.add_edge(d1, d2, EdgeKind::empty());
                interference.add_edge(d2, d1, EdgeKind::SYMMETRICAL);
            }
        }
    }
}

/// Smallest positive colour distinct from every neighbour's.
fn find_new_colour(cx: &Cx, graph: &Graph, vertex: NodeId) -> i32 {
    let mut colour = 1;
    'restart: loop {
        if let Some(neighbours) = graph.successors(vertex) {
            for neighbour in neighbours.keys() {
                if cx.arena[*neighbour].decl().colour == colour {
                    colour += 1;
                    continue 'restart;
                }
            }
        }
        return colour;
    }
}

fn colour_graph_search(cx: &mut Cx, graph: &Graph, vertex: NodeId) {
    for neighbour in graph.successor_list(vertex) {
        let neighbour_colour = cx.arena[neighbour].decl().colour;
        if neighbour_colour == 0 {
            let colour = find_new_colour(cx, graph, neighbour);
            cx.arena[neighbour].decl_mut().colour = colour;
            colour_graph_search(cx, graph, neighbour);
        } else if cx.arena[vertex].decl().colour == neighbour_colour {
            eprintln!(
                "conflicting edge between {} and {}!",
                cx.interner.resolve(cx.arena[vertex].decl().name),
                cx.interner.resolve(cx.arena[neighbour].decl().name)
            );
        }
    }
}

fn colour_graph(cx: &mut Cx, graph: &Graph) {
    for label in 0..graph.vertex_count() {
        let Some(vertex) = graph.vertex_at(label) else {
            continue;
        };
        if cx.arena[vertex].decl().colour != 0 {
            continue;
        }
        cx.arena[vertex].decl_mut().colour = 1;
        colour_graph_search(cx, graph, vertex);
    }
}

/// Colours beyond the register count mean memory residency.
fn assign_registers(cx: &mut Cx, func: NodeId) {
    let max_registers = cx.arena[cx.module].module().max_registers;
    let decls: Vec<NodeId> = cx.arena[func].func().table.values().copied().collect();
    for decl in decls {
        if cx.arena[decl].decl().colour > max_registers {
            eprintln!(
                "Variable {} spilled!",
                cx.interner.resolve(cx.arena[decl].decl().name)
            );
            cx.arena[decl].decl_mut().colour = 0;
        }
    }
}

fn is_register(cx: &Cx, expr: NodeId) -> bool {
    if !cx.arena[expr].is(Kind::Variable) {
        return false;
    }
    let Some(decl) = cx.arena[expr].var().decl else {
        return false;
    };
    cx.arena[decl].decl().colour != 0
}

/// Splice `t = <child>; ... t ...` in front of the vertex so the operand
/// can receive a register on the next allocation round.
fn replace_child_with_temporary(
    cx: &mut Cx,
    func: NodeId,
    graph: &mut Graph,
    vertex: NodeId,
    expr: NodeId,
    child_index: usize,
) {
    let child = cx.arena.child_req(expr, child_index);
    let ty = match cx.arena[child].ty {
        Some(ty) => ty,
        None => ice!("temporary for an untyped operand"),
    };
    let line = cx.arena[child].line;
    let temp = cx.new_temp(func, ty, line);
    let new_assign = cx.make_assignment(Some(temp), child, line);
    let temp_use = cx.arena.copy(temp);
    cx.arena.set_child(expr, child_index, Some(temp_use));
    graph.add_vertex(new_assign);
    graph.replace_backward(vertex, new_assign, EdgeKind::empty());
    graph.add_edge(new_assign, vertex, EdgeKind::empty());
}

/// A binary assignment whose destination and variable second operand are
/// both memory-resident needs a temporary.
fn check_assignment(cx: &mut Cx, func: NodeId, graph: &mut Graph, vertex: NodeId) -> bool {
    let expr = cx.arena.child_req(vertex, 1);
    if !ops::is_binary_op(cx.arena[expr].kind()) {
        return false;
    }
    let arg1 = cx.arena.child_req(expr, 1);
    if !cx.arena[arg1].is(Kind::Variable) {
        return false;
    }

    let dest_in_register = cx
        .arena
        .child(vertex, 0)
        .is_some_and(|dest| is_register(cx, dest));
    if dest_in_register || is_register(cx, arg1) {
        return false;
    }

    replace_child_with_temporary(cx, func, graph, vertex, expr, 1);
    true
}

/// A comparison needs at least its second operand in a register.
fn check_test(cx: &mut Cx, func: NodeId, graph: &mut Graph, vertex: NodeId) -> bool {
    let expr = cx.arena.child_req(vertex, 0);
    if !ops::is_binary_op(cx.arena[expr].kind()) {
        return false;
    }
    let arg1 = cx.arena.child_req(expr, 1);
    if is_register(cx, arg1) {
        return false;
    }
    replace_child_with_temporary(cx, func, graph, vertex, expr, 1);
    true
}

/// Rewrite statements the colouring left with incompatible operands.
/// Returns whether anything changed, which restarts the allocation loop.
fn check_validity(cx: &mut Cx, func: NodeId) -> bool {
    let Some(mut graph) = take_graph!(cx, func) else {
        return false;
    };

    let mut changed = false;
    for label in 0..graph.vertex_count() {
        let Some(vertex) = graph.vertex_at(label) else {
            continue;
        };
        if cx.arena[vertex].is(Kind::Assign) {
            changed |= check_assignment(cx, func, &mut graph, vertex);
        }
        if cx.arena[vertex].is(Kind::Test) {
            changed |= check_test(cx, func, &mut graph, vertex);
        }
    }

    restore_graph!(cx, func, graph);
    changed
}
