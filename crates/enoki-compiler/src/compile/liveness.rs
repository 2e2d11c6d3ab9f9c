//! Liveness analysis.
//!
//! Backward dataflow instance. Sets hold the declarations live at each
//! point: an assignment kills its destinations and gens its sources,
//! returns and tests gen the variables their expression reads. A call
//! contributes only its argument tuple: the callee is a global name, not a
//! register-level source.
//!
//! The result stays cached on the function; register allocation reads the
//! per-vertex input sets to build the interference graph.

use enoki_ir::flow::{self, Direction, FlowClient, FlowSet, SetRef};
use enoki_ir::graph::{EdgeKind, Graph};
use enoki_ir::node::{Arena, Kind, NodeId};

use crate::ast::Cx;
use crate::diagnostics::Diagnostics;

use super::{restore_graph, take_graph};

pub fn liveness_analysis(cx: &mut Cx, func: NodeId, _diags: &mut Diagnostics) -> bool {
    let Some(mut graph) = take_graph!(cx, func) else {
        return false;
    };

    let mut client = Liveness;
    let (_ok, info) = flow::run(
        &mut cx.arena,
        &mut graph,
        Direction::Backward,
        false,
        &mut client,
    );

    restore_graph!(cx, func, graph);
    cx.arena[func].func_mut().liveness = Some(info);
    true
}

struct Liveness;

fn update_set(set: &mut FlowSet, decl: NodeId, arena: &Arena) -> bool {
    let name = arena[decl].decl().name;
    if set.vars.contains_key(&name) {
        return false;
    }
    set.vars.insert(name, decl);
    true
}

fn update_output(outputs: &[SetRef], decl: NodeId, arena: &Arena) -> bool {
    let mut changed = false;
    for set in outputs {
        changed |= update_set(&mut set.borrow_mut(), decl, arena);
    }
    changed
}

/// Kill the destinations of an assignment target, by name.
fn remove_destinations(arena: &Arena, outputs: &[SetRef], expr: Option<NodeId>) -> bool {
    let Some(expr) = expr else {
        return false;
    };
    let mut changed = false;
    match arena[expr].kind() {
        Kind::Variable => {
            let name = arena[expr].var().name;
            for set in outputs {
                changed |= set.borrow_mut().vars.shift_remove(&name).is_some();
            }
        }
        Kind::Tuple => {
            for i in 0..arena.num_children(expr) {
                changed |= remove_destinations(arena, outputs, arena.child(expr, i));
            }
        }
        _ => {}
    }
    changed
}

/// Gen every declaration an expression reads.
fn add_sources(arena: &Arena, outputs: &[SetRef], expr: NodeId) -> bool {
    let mut changed = false;
    match arena[expr].kind() {
        Kind::Variable => {
            if let Some(decl) = arena[expr].var().decl {
                changed |= update_output(outputs, decl, arena);
            }
        }
        Kind::Call => {
            changed |= add_sources(arena, outputs, arena.child_req(expr, 1));
        }
        _ => {
            for i in 0..arena.num_children(expr) {
                if let Some(child) = arena.child(expr, i) {
                    changed |= add_sources(arena, outputs, child);
                }
            }
        }
    }
    changed
}

impl FlowClient for Liveness {
    fn start_set(&mut self, _arena: &Arena, kind: EdgeKind) -> FlowSet {
        FlowSet::empty(kind)
    }

    fn analyse(
        &mut self,
        arena: &Arena,
        _graph: &Graph,
        vertex: NodeId,
        inputs: &mut Vec<SetRef>,
        outputs: &mut Vec<SetRef>,
    ) -> bool {
        let mut changed = false;

        for set in outputs.iter() {
            let mut set = set.borrow_mut();
            if set.first_time {
                set.first_time = false;
                changed = true;
            }
        }

        match arena[vertex].kind() {
            Kind::Enter | Kind::Exit => return changed,
            Kind::Join => {
                for set in inputs.iter() {
                    let decls: Vec<NodeId> = set.borrow().vars.values().copied().collect();
                    for decl in decls {
                        changed |= update_output(outputs, decl, arena);
                    }
                }
                return changed;
            }
            _ => {}
        }

        for set in inputs.iter() {
            let decls: Vec<NodeId> = set.borrow().vars.values().copied().collect();
            for decl in decls {
                changed |= update_output(outputs, decl, arena);
            }
        }

        match arena[vertex].kind() {
            Kind::Return | Kind::Test => {
                changed |= add_sources(arena, outputs, arena.child_req(vertex, 0));
            }
            Kind::Assign => {
                changed |= remove_destinations(arena, outputs, arena.child(vertex, 0));
                changed |= add_sources(arena, outputs, arena.child_req(vertex, 1));
            }
            _ => {}
        }

        changed
    }

    fn verify(
        &mut self,
        _arena: &Arena,
        _graph: &Graph,
        _vertex: NodeId,
        _inputs: &[SetRef],
        _outputs: &[SetRef],
    ) -> bool {
        true
    }
}
