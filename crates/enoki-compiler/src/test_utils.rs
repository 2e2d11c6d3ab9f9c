//! Shared helpers for the pass and emitter tests.

use enoki_ir::node::{Kind, NodeId};

use crate::{Compilation, Cx};

/// Compile a source snippet through the whole middle-end, panicking when
/// the program turns out to be ill-formed.
pub fn compile(source: &str) -> Compilation {
    match crate::compile_source("<test>", source) {
        Ok(compilation) => compilation,
        Err(crate::Error::Parse(diags) | crate::Error::Analyze(diags)) => {
            let messages: Vec<String> = diags.iter().map(|d| d.message.clone()).collect();
            panic!("compilation failed: {messages:?}");
        }
    }
}

/// Parse only, returning the diagnostics alongside the context.
pub fn parse(source: &str) -> (Cx, crate::Diagnostics) {
    let mut cx = Cx::new("<test>");
    let diags = crate::parser::parse(&mut cx, source);
    (cx, diags)
}

/// Find a module function by name.
pub fn function(cx: &Cx, name: &str) -> NodeId {
    for i in 0..cx.arena.num_children(cx.module) {
        let Some(node) = cx.arena.child(cx.module, i) else {
            continue;
        };
        if !cx.arena[node].is(Kind::Function) {
            continue;
        }
        if cx.interner.resolve(cx.arena[node].decl().name) == name {
            return node;
        }
    }
    panic!("no function named '{name}' in the module");
}

/// All non-empty vertices of a function's graph.
pub fn vertices(cx: &Cx, func: NodeId) -> Vec<NodeId> {
    let graph = cx.arena[func].func().graph.as_ref().expect("function has no graph");
    (0..graph.vertex_count())
        .filter_map(|label| graph.vertex_at(label))
        .collect()
}

/// Does any node under `node` (inclusive) have the given kind?
pub fn contains_kind(cx: &Cx, node: NodeId, kind: Kind) -> bool {
    if cx.arena[node].is(kind) {
        return true;
    }
    (0..cx.arena.num_children(node)).any(|i| {
        cx.arena
            .child(node, i)
            .is_some_and(|child| contains_kind(cx, child, kind))
    })
}
