use enoki_core::interner::Interner;

use crate::flow::{self, Direction, FlowClient, FlowSet, SetRef};
use crate::graph::{EdgeKind, Graph};
use crate::node::{Arena, Kind, Node, NodeId};

fn stmt(arena: &mut Arena, kind: Kind) -> NodeId {
    arena.alloc(Node::new(kind, 0))
}

/// Enter -> v -> Exit skeleton used by most tests.
fn skeleton(arena: &mut Arena) -> (Graph, NodeId, NodeId) {
    let mut graph = Graph::new();
    let enter = stmt(arena, Kind::Enter);
    let exit = stmt(arena, Kind::Exit);
    graph.add_vertex(enter);
    graph.add_vertex(exit);
    (graph, enter, exit)
}

fn assert_symmetric(graph: &Graph) {
    for (from, succs) in graph.forward_iter() {
        for (to, kind) in succs {
            let back = graph
                .predecessors(*to)
                .and_then(|m| m.get(&from))
                .copied();
            assert_eq!(back, Some(*kind), "missing or mismatched backward twin");
        }
    }
}

#[test]
fn enter_and_exit_take_labels_zero_and_one() {
    let mut arena = Arena::new();
    let (graph, enter, exit) = skeleton(&mut arena);
    assert_eq!(graph.label_of(enter), Some(0));
    assert_eq!(graph.label_of(exit), Some(1));
}

#[test]
fn add_edge_is_symmetric_and_unions_flags() {
    let mut arena = Arena::new();
    let (mut graph, enter, exit) = skeleton(&mut arena);

    graph.add_edge(enter, exit, EdgeKind::NORMAL);
    graph.add_edge(enter, exit, EdgeKind::BACK);

    let kind = graph.successors(enter).unwrap()[&exit];
    assert_eq!(kind, EdgeKind::NORMAL | EdgeKind::BACK);
    assert_symmetric(&graph);
}

#[test]
fn remove_edge_drops_empty_successor_sets() {
    let mut arena = Arena::new();
    let (mut graph, enter, exit) = skeleton(&mut arena);

    graph.add_edge(enter, exit, EdgeKind::NORMAL);
    graph.remove_edge(enter, exit);

    assert!(graph.successors(enter).is_none());
    assert!(graph.predecessors(exit).is_none());
}

#[test]
fn labels_stay_bijective_with_nonempty_slots() {
    let mut arena = Arena::new();
    let (mut graph, _enter, _exit) = skeleton(&mut arena);
    let a = stmt(&mut arena, Kind::Assign);
    let b = stmt(&mut arena, Kind::Assign);
    graph.add_vertex(a);
    graph.add_vertex(b);
    graph.remove_vertex(a);

    // Slot 2 is empty, slot 3 still holds b.
    assert_eq!(graph.vertex_at(2), None);
    assert_eq!(graph.vertex_at(3), Some(b));
    assert_eq!(graph.label_of(b), Some(3));
    assert_eq!(graph.label_of(a), None);

    let labelled: Vec<NodeId> = (0..graph.vertex_count())
        .filter_map(|l| graph.vertex_at(l))
        .collect();
    for v in &labelled {
        assert_eq!(graph.vertex_at(graph.label_of(*v).unwrap()), Some(*v));
    }
}

#[test]
fn inject_before_rewires_predecessors() {
    let mut arena = Arena::new();
    let (mut graph, enter, exit) = skeleton(&mut arena);
    let target = stmt(&mut arena, Kind::Assign);
    let injected = stmt(&mut arena, Kind::Assign);
    graph.add_vertex(target);
    graph.add_vertex(injected);
    graph.add_edge(enter, target, EdgeKind::YES);
    graph.add_edge(target, exit, EdgeKind::NORMAL);

    graph.inject_before(injected, target, EdgeKind::empty());

    // enter -> injected keeps the YES kind, injected -> target is NORMAL.
    assert_eq!(graph.successors(enter).unwrap()[&injected], EdgeKind::YES);
    assert!(graph.successors(enter).unwrap().get(&target).is_none());
    assert_eq!(
        graph.successors(injected).unwrap()[&target],
        EdgeKind::NORMAL
    );
    assert_symmetric(&graph);
}

#[test]
fn replace_forward_with_none_drops_edges() {
    let mut arena = Arena::new();
    let (mut graph, enter, exit) = skeleton(&mut arena);
    let v = stmt(&mut arena, Kind::Assign);
    graph.add_vertex(v);
    graph.add_edge(enter, v, EdgeKind::NORMAL);
    graph.add_edge(v, exit, EdgeKind::NORMAL);

    graph.replace_forward(v, None, EdgeKind::empty());

    assert!(graph.successors(v).is_none());
    assert!(graph.predecessors(exit).is_none());
    assert_symmetric(&graph);
}

#[test]
fn cleanup_splices_pass_vertices_and_is_idempotent() {
    let mut arena = Arena::new();
    let (mut graph, enter, exit) = skeleton(&mut arena);
    let assign = stmt(&mut arena, Kind::Assign);
    let pass = stmt(&mut arena, Kind::Pass);
    graph.add_vertex(assign);
    graph.add_vertex(pass);
    graph.add_edge(enter, assign, EdgeKind::NORMAL);
    graph.add_edge(assign, pass, EdgeKind::YES);
    graph.add_edge(pass, exit, EdgeKind::NORMAL);

    graph.cleanup(&arena);

    // Pass is gone; assign links straight to exit with the kinds OR'd.
    assert_eq!(graph.label_of(pass), None);
    assert_eq!(
        graph.successors(assign).unwrap()[&exit],
        EdgeKind::YES | EdgeKind::NORMAL
    );

    let before = graph.vertex_count();
    graph.cleanup(&arena);
    assert_eq!(graph.vertex_count(), before);
    assert_eq!(
        graph.successors(assign).unwrap()[&exit],
        EdgeKind::YES | EdgeKind::NORMAL
    );
    assert_symmetric(&graph);
}

#[test]
fn dot_output_skips_symmetrical_edges() {
    let mut arena = Arena::new();
    let interner = Interner::new();
    let (mut graph, enter, exit) = skeleton(&mut arena);
    graph.add_edge(enter, exit, EdgeKind::NORMAL);
    graph.add_edge(exit, enter, EdgeKind::SYMMETRICAL);

    let mut out = String::new();
    crate::dot::print_graph(&mut out, &arena, &interner, &graph, "main", 1);

    assert!(out.contains("subgraph cluster_main_1"));
    assert!(out.contains("main_1_0 -> main_1_1"));
    assert!(!out.contains("main_1_1 -> main_1_0"));
}

/// Client that records visit order and never changes anything after the
/// first sweep; used to exercise the framework mechanics.
struct TouchClient {
    visited: Vec<NodeId>,
}

impl FlowClient for TouchClient {
    fn start_set(&mut self, _arena: &Arena, kind: EdgeKind) -> FlowSet {
        FlowSet::empty(kind)
    }

    fn analyse(
        &mut self,
        _arena: &Arena,
        _graph: &Graph,
        vertex: NodeId,
        _inputs: &mut Vec<SetRef>,
        outputs: &mut Vec<SetRef>,
    ) -> bool {
        self.visited.push(vertex);
        let mut changed = false;
        for set in outputs.iter() {
            let mut set = set.borrow_mut();
            if set.first_time {
                set.first_time = false;
                changed = true;
            }
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

#[test]
fn flow_visits_every_reachable_vertex_and_inserts_joins() {
    let mut arena = Arena::new();
    let (mut graph, enter, exit) = skeleton(&mut arena);
    let test = stmt(&mut arena, Kind::Test);
    let then_arm = stmt(&mut arena, Kind::Assign);
    let else_arm = stmt(&mut arena, Kind::Assign);
    graph.add_vertex(test);
    graph.add_vertex(then_arm);
    graph.add_vertex(else_arm);
    graph.add_edge(enter, test, EdgeKind::NORMAL);
    graph.add_edge(test, then_arm, EdgeKind::YES);
    graph.add_edge(test, else_arm, EdgeKind::NO);
    graph.add_edge(then_arm, exit, EdgeKind::NORMAL);
    graph.add_edge(else_arm, exit, EdgeKind::NORMAL);

    let mut client = TouchClient { visited: vec![] };
    let (ok, info) = flow::run(
        &mut arena,
        &mut graph,
        Direction::Forward,
        true,
        &mut client,
    );
    assert!(ok);

    // Exit had two predecessors, so a join was spliced in front of it and
    // the rerouted edges kept their kinds.
    let join = graph
        .predecessor_list(exit)
        .into_iter()
        .find(|v| arena[*v].is(Kind::Join))
        .expect("join inserted before exit");
    assert_eq!(graph.predecessors(join).unwrap().len(), 2);
    assert_eq!(graph.successors(join).unwrap()[&exit], EdgeKind::NORMAL);

    for vertex in [enter, test, then_arm, else_arm, join, exit] {
        assert!(client.visited.contains(&vertex), "vertex not analysed");
        assert!(info.inputs.contains_key(&vertex));
        assert!(info.outputs.contains_key(&vertex));
    }

    // Forward flow: the set on edge (enter, test) is shared between
    // enter's outputs and test's inputs.
    let enter_out = &info.outputs[&enter][0];
    let test_in = &info.inputs[&test][0];
    assert!(std::rc::Rc::ptr_eq(enter_out, test_in));
}
