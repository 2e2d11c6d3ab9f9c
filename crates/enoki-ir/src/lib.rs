//! Intermediate representation for the enoki compiler.
//!
//! - `node` - the IR node arena: kind lattice, children, payloads
//! - `ops` - operator classification over node kinds
//! - `graph` - control-flow graphs with typed edges
//! - `flow` - worklist dataflow framework over graphs
//! - `dot` - Graphviz rendering of graphs

pub mod dot;
pub mod flow;
pub mod graph;
pub mod node;
pub mod ops;

#[cfg(test)]
mod graph_tests;

pub use flow::{Direction, FlowClient, FlowInfo, FlowSet, SetRef};
pub use graph::{EdgeKind, Graph};
pub use node::{Arena, DeclData, DeclFlags, FuncData, Kind, Node, NodeId, Payload};
