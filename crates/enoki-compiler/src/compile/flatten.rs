//! Flattening: structured statements to a control-flow graph.
//!
//! The graph gets one enter vertex (label 0) and one exit vertex (label 1).
//! Statement vertices chain with NORMAL edges; the first edge of a lowered
//! block inherits the caller-supplied edge kind, which is how YES/NO branch
//! arms attach to their test. Returns link straight to the exit, loops close
//! with BACK edges, and a restart (from tail-call rewriting) becomes a BACK
//! edge to the entry's successor.

use enoki_core::ice;
use enoki_ir::graph::{EdgeKind, Graph};
use enoki_ir::node::{Kind, NodeId};

use crate::ast::Cx;
use crate::diagnostics::Diagnostics;

use super::restore_graph;

pub fn flatten(cx: &mut Cx, func: NodeId, diags: &mut Diagnostics) -> bool {
    let body = cx.arena.child_req(func, 0);
    let line = cx.arena[body].line;

    let mut graph = Graph::new();
    let enter = cx.arena.alloc_simple(Kind::Enter, line);
    let exit = cx.arena.alloc_simple(Kind::Exit, line);
    graph.add_vertex(enter);
    graph.add_vertex(exit);

    let predecessor = flatten_block(
        cx,
        func,
        &mut graph,
        Some(body),
        Some(enter),
        exit,
        None,
        None,
        EdgeKind::NORMAL,
        diags,
    );
    if let Some(predecessor) = predecessor {
        graph.add_edge(predecessor, exit, EdgeKind::NORMAL);
    }

    graph.cleanup(&cx.arena);
    restore_graph!(cx, func, graph);
    true
}

fn link(graph: &mut Graph, predecessor: Option<NodeId>, vertex: NodeId, kind: EdgeKind) {
    if let Some(predecessor) = predecessor {
        graph.add_edge(predecessor, vertex, kind);
    }
}

/// Lower one block. Returns the new dangling predecessor, or `None` when
/// control cannot fall out of the block (return, break, continue, restart).
#[allow(clippy::too_many_arguments)]
fn flatten_block(
    cx: &mut Cx,
    func: NodeId,
    graph: &mut Graph,
    block: Option<NodeId>,
    mut predecessor: Option<NodeId>,
    exit: NodeId,
    loop_start: Option<NodeId>,
    loop_end: Option<NodeId>,
    edge_kind: EdgeKind,
    diags: &mut Diagnostics,
) -> Option<NodeId> {
    let Some(block) = block else {
        return predecessor;
    };
    if !cx.arena[block].is(Kind::Block) {
        ice!(
            "attempt to flatten non-block node of kind {}",
            cx.arena[block].kind().name()
        );
    }

    for i in 0..cx.arena.num_children(block) {
        let kind = if i == 0 { edge_kind } else { EdgeKind::NORMAL };

        let Some(stmt) = cx.arena.child(block, i) else {
            // An empty statement slot becomes a pass-through vertex.
            let pass = cx.arena.alloc_simple(Kind::Pass, cx.arena[block].line);
            graph.add_vertex(pass);
            link(graph, predecessor, pass, kind);
            predecessor = Some(pass);
            continue;
        };

        match cx.arena[stmt].kind() {
            Kind::If => {
                let cond = cx.arena.child_req(stmt, 0);
                let test = cx.make_test(cond, 0);
                graph.add_vertex(test);
                link(graph, predecessor, test, kind);

                let join = cx.arena.alloc_simple(Kind::Pass, cx.arena[stmt].line);
                graph.add_vertex(join);

                let then_end = flatten_block(
                    cx,
                    func,
                    graph,
                    cx.arena.child(stmt, 1),
                    Some(test),
                    exit,
                    loop_start,
                    loop_end,
                    EdgeKind::YES,
                    diags,
                );
                if let Some(then_end) = then_end {
                    graph.add_edge(then_end, join, EdgeKind::NORMAL);
                }

                let else_end = flatten_block(
                    cx,
                    func,
                    graph,
                    cx.arena.child(stmt, 2),
                    Some(test),
                    exit,
                    loop_start,
                    loop_end,
                    EdgeKind::NO,
                    diags,
                );
                if let Some(else_end) = else_end {
                    graph.add_edge(else_end, join, EdgeKind::NORMAL);
                }

                predecessor = Some(join);
            }
            Kind::While => {
                let cond = cx.arena.child_req(stmt, 0);
                let test = cx.make_test(cond, 0);
                graph.add_vertex(test);
                link(graph, predecessor, test, kind);

                let join = cx.arena.alloc_simple(Kind::Pass, cx.arena[stmt].line);
                graph.add_vertex(join);

                let body_end = flatten_block(
                    cx,
                    func,
                    graph,
                    cx.arena.child(stmt, 1),
                    Some(test),
                    exit,
                    Some(test),
                    Some(join),
                    EdgeKind::YES | EdgeKind::LOOP,
                    diags,
                );
                if let Some(body_end) = body_end {
                    graph.add_edge(body_end, test, EdgeKind::BACK);
                }
                graph.add_edge(test, join, EdgeKind::NO);

                predecessor = Some(join);
            }
            Kind::Return => {
                graph.add_vertex(stmt);
                link(graph, predecessor, stmt, kind);
                graph.add_edge(stmt, exit, EdgeKind::NORMAL);
                predecessor = None;
            }
            Kind::Continue => {
                match loop_start {
                    Some(target) => {
                        if let Some(p) = predecessor {
                            graph.add_edge(p, target, kind | EdgeKind::BACK);
                        }
                    }
                    None => diags.error(
                        cx.arena[stmt].line,
                        format!(
                            "continue outside loop in '{}'",
                            cx.interner.resolve(cx.arena[func].decl().name)
                        ),
                    ),
                }
                predecessor = None;
            }
            Kind::Break => {
                match loop_end {
                    Some(target) => {
                        if let Some(p) = predecessor {
                            graph.add_edge(p, target, kind);
                        }
                    }
                    None => diags.error(
                        cx.arena[stmt].line,
                        format!(
                            "break outside loop in '{}'",
                            cx.interner.resolve(cx.arena[func].decl().name)
                        ),
                    ),
                }
                predecessor = None;
            }
            Kind::Assign => {
                graph.add_vertex(stmt);
                link(graph, predecessor, stmt, kind);
                predecessor = Some(stmt);
            }
            Kind::Restart => {
                let enter = graph
                    .vertex_at(0)
                    .unwrap_or_else(|| ice!("graph has no enter vertex"));
                let Some((entry_succ, _)) = graph.first_successor(enter) else {
                    ice!("restart with no entry successor");
                };
                if let Some(p) = predecessor {
                    graph.add_edge(p, entry_succ, EdgeKind::BACK | kind);
                }
                predecessor = None;
            }
            Kind::Block => {
                predecessor = flatten_block(
                    cx,
                    func,
                    graph,
                    Some(stmt),
                    predecessor,
                    exit,
                    loop_start,
                    loop_end,
                    kind,
                    diags,
                );
            }
            other => ice!("don't know how to flatten {} node", other.name()),
        }
    }

    predecessor
}
