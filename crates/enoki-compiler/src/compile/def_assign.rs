//! Definite-assignment analysis.
//!
//! Forward dataflow instance with join insertion. The lattice element is
//! the set of declarations known to be assigned on every path to a point:
//! the enter vertex contributes the arguments, assignments add their
//! destinations, and joins intersect. A first-time input slot is replaced
//! by the universe (every declaration in the function), which is the
//! identity for the intersection, so joins stay correct before both arms
//! have been analysed.
//!
//! A use of a possibly-undefined variable is reported as a warning and
//! compilation continues, so later passes can surface further issues.

use enoki_core::ice;
use enoki_core::interner::Interner;
use enoki_ir::flow::{self, Direction, FlowClient, FlowSet, SetRef};
use enoki_ir::graph::{EdgeKind, Graph};
use enoki_ir::node::{Arena, Kind, NodeId};

use crate::ast::Cx;
use crate::diagnostics::Diagnostics;

use super::{restore_graph, take_graph};

pub fn definite_assignment(cx: &mut Cx, func: NodeId, diags: &mut Diagnostics) -> bool {
    let Some(mut graph) = take_graph!(cx, func) else {
        return false;
    };

    let mut client = DefAssign {
        func,
        interner: &cx.interner,
        diags,
    };
    flow::run(
        &mut cx.arena,
        &mut graph,
        Direction::Forward,
        true,
        &mut client,
    );

    graph.cleanup(&cx.arena);
    restore_graph!(cx, func, graph);
    true
}

struct DefAssign<'a> {
    func: NodeId,
    interner: &'a Interner,
    diags: &'a mut Diagnostics,
}

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

/// Add every destination of an assignment target (recursively through
/// tuples) to the output sets.
fn update_output_destinations(
    arena: &Arena,
    func: NodeId,
    outputs: &[SetRef],
    expr: Option<NodeId>,
    interner: &Interner,
) -> bool {
    let Some(expr) = expr else {
        return false;
    };
    let mut changed = false;
    match arena[expr].kind() {
        Kind::Variable => {
            let name = arena[expr].var().name;
            let Some(&decl) = arena[func].func().table.get(&name) else {
                ice!(
                    "no declaration of variable called '{}'",
                    interner.resolve(name)
                );
            };
            changed |= update_output(outputs, decl, arena);
        }
        Kind::Tuple => {
            for i in 0..arena.num_children(expr) {
                changed |= update_output_destinations(
                    arena,
                    func,
                    outputs,
                    arena.child(expr, i),
                    interner,
                );
            }
        }
        _ => {}
    }
    changed
}

/// Check that every variable in `expr` is in the definitely-assigned set.
/// With a diagnostics sink, failures are reported as warnings.
fn verify_expression(
    arena: &Arena,
    interner: &Interner,
    set: &FlowSet,
    expr: NodeId,
    vertex_label: usize,
    func_name: &str,
    diags: &mut Option<&mut Diagnostics>,
) -> bool {
    match arena[expr].kind() {
        Kind::Integer => true,
        Kind::Variable => {
            let name = arena[expr].var().name;
            if set.vars.contains_key(&name) {
                return true;
            }
            if let Some(diags) = diags {
                diags.warning(
                    arena[expr].line,
                    format!(
                        "variable '{}' may not be defined at vertex {} in '{}'",
                        interner.resolve(name),
                        vertex_label,
                        func_name
                    ),
                );
            }
            false
        }
        Kind::Call => verify_expression(
            arena,
            interner,
            set,
            arena.child_req(expr, 1),
            vertex_label,
            func_name,
            diags,
        ),
        _ => {
            let mut ok = true;
            for i in 0..arena.num_children(expr) {
                if let Some(child) = arena.child(expr, i) {
                    ok &= verify_expression(
                        arena, interner, set, child, vertex_label, func_name, diags,
                    );
                }
            }
            ok
        }
    }
}

impl<'a> DefAssign<'a> {
    /// The shared body of the in-analysis check and the final verify sweep;
    /// only the latter reports.
    fn verify_vertex(
        &mut self,
        arena: &Arena,
        graph: &Graph,
        vertex: NodeId,
        inputs: &[SetRef],
        report: bool,
    ) -> bool {
        let kind = arena[vertex].kind();
        if matches!(kind, Kind::Pass | Kind::Join | Kind::Enter | Kind::Exit) {
            return true;
        }

        let Some(input) = inputs.first() else {
            return true;
        };
        let input = input.borrow();

        let vertex_label = graph.label_of(vertex).unwrap_or(0);
        let func_name = self.interner.resolve(arena[self.func].decl().name);
        let mut sink: Option<&mut Diagnostics> = if report {
            Some(&mut *self.diags)
        } else {
            None
        };

        let expr = match kind {
            Kind::Assign => arena.child_req(vertex, 1),
            Kind::Return | Kind::Test => arena.child_req(vertex, 0),
            _ => return true,
        };
        verify_expression(
            arena,
            self.interner,
            &input,
            expr,
            vertex_label,
            func_name,
            &mut sink,
        )
    }
}

impl<'a> FlowClient for DefAssign<'a> {
    fn start_set(&mut self, _arena: &Arena, kind: EdgeKind) -> FlowSet {
        FlowSet::empty(kind)
    }

    /// The universe: every declaration in the function.
    fn default_set(&mut self, arena: &Arena, kind: EdgeKind) -> FlowSet {
        let mut set = FlowSet::empty(kind);
        for (name, decl) in &arena[self.func].func().table {
            set.vars.insert(*name, *decl);
        }
        set
    }

    fn analyse(
        &mut self,
        arena: &Arena,
        graph: &Graph,
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

        // A first-time input has no analysed upstream yet; substitute the
        // universe so the join intersection below starts unconstrained.
        for slot in inputs.iter_mut() {
            let (first_time, kind) = {
                let set = slot.borrow();
                (set.first_time, set.kind)
            };
            if first_time {
                let default = self.default_set(arena, kind);
                *slot = std::rc::Rc::new(std::cell::RefCell::new(default));
            }
        }

        match arena[vertex].kind() {
            Kind::Enter => {
                if let Some(args) = arena.child(self.func, 1) {
                    for i in 0..arena.num_children(args) {
                        if let Some(arg) = arena.child(args, i) {
                            changed |= update_output(outputs, arg, arena);
                        }
                    }
                }
                return changed;
            }
            Kind::Join => {
                let Some(first) = inputs.first() else {
                    return changed;
                };
                let first = first.borrow();
                for (name, decl) in &first.vars {
                    let in_all = inputs[1..]
                        .iter()
                        .all(|set| set.borrow().vars.contains_key(name));
                    if in_all {
                        changed |= update_output(outputs, *decl, arena);
                    }
                }
                return changed;
            }
            Kind::Assign => {
                if self.verify_vertex(arena, graph, vertex, inputs, false) {
                    changed |= update_output_destinations(
                        arena,
                        self.func,
                        outputs,
                        arena.child(vertex, 0),
                        self.interner,
                    );
                }
            }
            _ => {}
        }

        for set in inputs.iter() {
            let decls: Vec<NodeId> = set.borrow().vars.values().copied().collect();
            for decl in decls {
                changed |= update_output(outputs, decl, arena);
            }
        }

        changed
    }

    fn verify(
        &mut self,
        arena: &Arena,
        graph: &Graph,
        vertex: NodeId,
        inputs: &[SetRef],
        _outputs: &[SetRef],
    ) -> bool {
        self.verify_vertex(arena, graph, vertex, inputs, true)
    }
}
