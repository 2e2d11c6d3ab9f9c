//! The IR node model.
//!
//! Every entity the compiler manipulates (module, functions, statements,
//! expressions, declarations, types) is a [`Node`] stored in an [`Arena`]
//! and addressed by a stable [`NodeId`]. Nodes carry a [`Kind`] tag, an
//! ordered child list (slots may be empty), an optional source line, and a
//! kind-specific payload.
//!
//! Kinds form a lattice for classification only: a node "is of" an interface
//! kind (Statement, Expression, Declaration, Type) when its concrete kind
//! transitively derives from it. Payload accessors double as the checked
//! casts: asking a non-declaration node for its declaration data is an
//! internal compiler error, not a user diagnostic.

use enoki_core::ice;
use enoki_core::interner::Symbol;
use indexmap::IndexMap;

use crate::flow::FlowInfo;
use crate::graph::Graph;

/// Stable handle to a node in an [`Arena`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Node kind tag. Interface kinds classify; concrete kinds are instantiated.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Kind {
    // Interface kinds - never instantiated, lattice roots only.
    Ast,
    Statement,
    Expression,
    Declaration,
    Type,

    // Definitions.
    Module,
    Function,
    VarDecl,
    Args,

    // Statements.
    Block,
    If,
    While,
    For,
    Return,
    Continue,
    Break,
    Pass,
    Join,
    Enter,
    Exit,
    Restart,
    Test,
    Assign,
    Sequence,

    // Expressions.
    Integer,
    Str,
    Variable,
    Call,
    Closure,
    Tuple,
    Sum,
    Product,
    Difference,
    Ratio,
    Negation,
    Not,
    Leq,
    Lt,
    Geq,
    Gt,
    Eq,
    Neq,
    And,
    Or,

    // Types.
    IntType,
    VoidType,
    MapType,
    TupleType,
}

impl Kind {
    /// Parent kind in the classification lattice, `None` at the root.
    pub fn parent(self) -> Option<Kind> {
        use Kind::*;
        match self {
            Ast => None,
            Statement | Expression | Declaration | Type | Module => Some(Ast),
            Function | VarDecl | Args => Some(Declaration),
            Block | If | While | For | Return | Continue | Break | Pass | Join | Enter | Exit
            | Restart | Test | Assign | Sequence => Some(Statement),
            Integer | Str | Variable | Call | Closure | Tuple | Sum | Product | Difference
            | Ratio | Negation | Not | Leq | Lt | Geq | Gt | Eq | Neq | And | Or => {
                Some(Expression)
            }
            IntType | VoidType | MapType | TupleType => Some(Type),
        }
    }

    /// Printable name for diagnostics and dumps.
    pub fn name(self) -> &'static str {
        use Kind::*;
        match self {
            Ast => "ast",
            Statement => "statement",
            Expression => "expression",
            Declaration => "declaration",
            Type => "type",
            Module => "module",
            Function => "function",
            VarDecl => "variable declaration",
            Args => "argument list",
            Block => "block",
            If => "if",
            While => "while",
            For => "for",
            Return => "return",
            Continue => "continue",
            Break => "break",
            Pass => "pass",
            Join => "join",
            Enter => "enter",
            Exit => "exit",
            Restart => "restart",
            Test => "test",
            Assign => "assign",
            Sequence => "sequence",
            Integer => "integer",
            Str => "string",
            Variable => "variable",
            Call => "call",
            Closure => "closure",
            Tuple => "tuple",
            Sum => "sum",
            Product => "product",
            Difference => "difference",
            Ratio => "ratio",
            Negation => "negation",
            Not => "not",
            Leq => "leq",
            Lt => "lt",
            Geq => "geq",
            Gt => "gt",
            Eq => "eq",
            Neq => "neq",
            And => "and",
            Or => "or",
            IntType => "int type",
            VoidType => "void type",
            MapType => "map type",
            TupleType => "tuple type",
        }
    }

    /// Lattice membership: does this kind transitively derive from `base`?
    pub fn derives_from(self, base: Kind) -> bool {
        let mut kind = Some(self);
        while let Some(k) = kind {
            if k == base {
                return true;
            }
            kind = k.parent();
        }
        false
    }
}

bitflags::bitflags! {
    /// Declaration attribute flags.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct DeclFlags: u32 {
        const ARGUMENT = 0x01;
        const PUBLIC   = 0x02;
        const STATIC   = 0x04;
        const ENCLOSED = 0x08;
        const CONST    = 0x10;
    }
}

/// Payload of a declaration (and of the declaration half of a function).
#[derive(Clone, Debug)]
pub struct DeclData {
    pub name: Symbol,
    pub flags: DeclFlags,
    /// Number of expressions referencing this declaration; zero means the
    /// definition may be dropped.
    pub use_count: i32,
    pub stack_position: i32,
    pub depth: i32,
    /// Register colour: 0 = memory, 1..=max = register number.
    pub colour: i32,
    pub ty: Option<NodeId>,
}

impl DeclData {
    pub fn new(name: Symbol, ty: Option<NodeId>) -> Self {
        Self {
            name,
            flags: DeclFlags::empty(),
            use_count: 0,
            stack_position: 0,
            depth: 0,
            colour: 0,
            ty,
        }
    }
}

/// Payload of a function definition. Children: `[body-block, argument-list]`.
#[derive(Debug)]
pub struct FuncData {
    pub decl: DeclData,
    /// Flattened per-function symbol table, filled by symbol analysis.
    pub table: IndexMap<Symbol, NodeId>,
    pub input_size: i32,
    pub stack_size: i32,
    pub output_size: i32,
    /// Control-flow graph, attached by flattening.
    pub graph: Option<Graph>,
    /// Cached liveness result, refreshed by register allocation.
    pub liveness: Option<FlowInfo>,
}

impl FuncData {
    pub fn new(decl: DeclData) -> Self {
        Self {
            decl,
            table: IndexMap::new(),
            input_size: 0,
            stack_size: 0,
            output_size: 0,
            graph: None,
            liveness: None,
        }
    }
}

/// Payload of the module root. Children: function definitions.
#[derive(Debug)]
pub struct ModuleData {
    pub filename: String,
    /// Top-level symbol table: function name to function node.
    pub table: IndexMap<Symbol, NodeId>,
    pub max_registers: i32,
}

/// Payload of a variable reference.
#[derive(Clone, Copy, Debug)]
pub struct VarData {
    pub name: Symbol,
    /// Resolved declaration, if resolution has happened.
    pub decl: Option<NodeId>,
}

/// Kind-specific payload.
#[derive(Debug)]
pub enum Payload {
    None,
    Int(i32),
    Str(Symbol),
    Var(VarData),
    Decl(DeclData),
    Func(Box<FuncData>),
    Block {
        table: IndexMap<Symbol, NodeId>,
    },
    Module(Box<ModuleData>),
}

/// A single IR node.
#[derive(Debug)]
pub struct Node {
    kind: Kind,
    /// Source line for diagnostics; 0 when synthetic.
    pub line: u32,
    /// Expression type reference; `None` on non-expressions.
    pub ty: Option<NodeId>,
    /// Ordered children. Empty slots are permitted (e.g. a function without
    /// a body, an absent else-branch statement).
    pub children: Vec<Option<NodeId>>,
    pub payload: Payload,
}

impl Node {
    pub fn new(kind: Kind, line: u32) -> Self {
        Self {
            kind,
            line,
            ty: None,
            children: Vec::new(),
            payload: Payload::None,
        }
    }

    pub fn with_payload(kind: Kind, line: u32, payload: Payload) -> Self {
        Self {
            kind,
            line,
            ty: None,
            children: Vec::new(),
            payload,
        }
    }

    #[inline]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Exact kind check.
    #[inline]
    pub fn is(&self, kind: Kind) -> bool {
        self.kind == kind
    }

    /// Lattice kind check: concrete kind derives from `base`.
    #[inline]
    pub fn is_of(&self, base: Kind) -> bool {
        self.kind.derives_from(base)
    }

    /// Declaration payload; functions expose their declaration half.
    pub fn decl(&self) -> &DeclData {
        match &self.payload {
            Payload::Decl(d) => d,
            Payload::Func(f) => &f.decl,
            _ => ice!("cast of {} node to declaration", self.kind.name()),
        }
    }

    pub fn decl_mut(&mut self) -> &mut DeclData {
        match &mut self.payload {
            Payload::Decl(d) => d,
            Payload::Func(f) => &mut f.decl,
            _ => ice!("cast of {} node to declaration", self.kind.name()),
        }
    }

    pub fn func(&self) -> &FuncData {
        match &self.payload {
            Payload::Func(f) => f,
            _ => ice!("cast of {} node to function", self.kind.name()),
        }
    }

    pub fn func_mut(&mut self) -> &mut FuncData {
        match &mut self.payload {
            Payload::Func(f) => f,
            _ => ice!("cast of {} node to function", self.kind.name()),
        }
    }

    pub fn module(&self) -> &ModuleData {
        match &self.payload {
            Payload::Module(m) => m,
            _ => ice!("cast of {} node to module", self.kind.name()),
        }
    }

    pub fn module_mut(&mut self) -> &mut ModuleData {
        match &mut self.payload {
            Payload::Module(m) => m,
            _ => ice!("cast of {} node to module", self.kind.name()),
        }
    }

    pub fn var(&self) -> &VarData {
        match &self.payload {
            Payload::Var(v) => v,
            _ => ice!("cast of {} node to variable", self.kind.name()),
        }
    }

    pub fn var_mut(&mut self) -> &mut VarData {
        match &mut self.payload {
            Payload::Var(v) => v,
            _ => ice!("cast of {} node to variable", self.kind.name()),
        }
    }

    pub fn int_value(&self) -> i32 {
        match &self.payload {
            Payload::Int(v) => *v,
            _ => ice!("cast of {} node to integer", self.kind.name()),
        }
    }

    pub fn str_value(&self) -> Symbol {
        match &self.payload {
            Payload::Str(s) => *s,
            _ => ice!("cast of {} node to string", self.kind.name()),
        }
    }

    pub fn block_table(&self) -> &IndexMap<Symbol, NodeId> {
        match &self.payload {
            Payload::Block { table } => table,
            _ => ice!("cast of {} node to block", self.kind.name()),
        }
    }

    pub fn block_table_mut(&mut self) -> &mut IndexMap<Symbol, NodeId> {
        match &mut self.payload {
            Payload::Block { table } => table,
            _ => ice!("cast of {} node to block", self.kind.name()),
        }
    }
}

/// Arena of IR nodes. Nodes are never freed individually; structural edits
/// only detach references and the whole arena dies with the compilation.
#[derive(Debug, Default)]
pub struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Shorthand for allocating a payload-free node.
    pub fn alloc_simple(&mut self, kind: Kind, line: u32) -> NodeId {
        self.alloc(Node::new(kind, line))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Exact kind check through an optional handle, false for empty slots.
    #[inline]
    pub fn node_is(&self, id: Option<NodeId>, kind: Kind) -> bool {
        id.is_some_and(|id| self[id].is(kind))
    }

    /// Child slot access. Panics (ICE) when the slot index is out of range;
    /// returns `None` for an empty slot.
    #[inline]
    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self[id].children[index]
    }

    /// Child access that treats an empty slot as an internal error.
    pub fn child_req(&self, id: NodeId, index: usize) -> NodeId {
        match self[id].children[index] {
            Some(c) => c,
            None => ice!(
                "{} node missing required child {index}",
                self[id].kind().name()
            ),
        }
    }

    pub fn num_children(&self, id: NodeId) -> usize {
        self[id].children.len()
    }

    pub fn add_child(&mut self, parent: NodeId, child: Option<NodeId>) {
        self[parent].children.push(child);
    }

    pub fn set_child(&mut self, parent: NodeId, index: usize, child: Option<NodeId>) {
        self[parent].children[index] = child;
    }

    /// Insert `child` immediately before the sibling `before`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, before: NodeId) {
        let pos = self[parent]
            .children
            .iter()
            .position(|c| *c == Some(before));
        match pos {
            Some(pos) => self[parent].children.insert(pos, Some(child)),
            None => ice!("insert-before target is not a child of the parent"),
        }
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        self[parent].children.retain(|c| *c != Some(child));
    }

    /// Deep copy. Payload and source lines are preserved; parent links are
    /// not (the copy starts unattached). A copied function drops its graph
    /// and cached liveness.
    pub fn copy(&mut self, id: NodeId) -> NodeId {
        let node = &self[id];
        let kind = node.kind;
        let line = node.line;
        let ty = node.ty;
        let payload = copy_payload(&node.payload);
        let children = node.children.clone();

        let mut copied = Vec::with_capacity(children.len());
        for child in children {
            copied.push(child.map(|c| self.copy(c)));
        }

        let mut new_node = Node::with_payload(kind, line, payload);
        new_node.ty = ty;
        new_node.children = copied;
        self.alloc(new_node)
    }
}

fn copy_payload(payload: &Payload) -> Payload {
    match payload {
        Payload::None => Payload::None,
        Payload::Int(v) => Payload::Int(*v),
        Payload::Str(s) => Payload::Str(*s),
        Payload::Var(v) => Payload::Var(*v),
        Payload::Decl(d) => Payload::Decl(d.clone()),
        Payload::Func(f) => {
            let mut copy = FuncData::new(f.decl.clone());
            copy.table = f.table.clone();
            copy.input_size = f.input_size;
            copy.stack_size = f.stack_size;
            copy.output_size = f.output_size;
            Payload::Func(Box::new(copy))
        }
        Payload::Block { table } => Payload::Block {
            table: table.clone(),
        },
        Payload::Module(_) => ice!("deep copy of a module node"),
    }
}

impl std::ops::Index<NodeId> for Arena {
    type Output = Node;

    #[inline]
    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}

impl std::ops::IndexMut<NodeId> for Arena {
    #[inline]
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }
}

/// Size in bytes of a value of the given type: scalars and function
/// references occupy one 4-byte slot, tuples the sum of their members.
pub fn type_size(arena: &Arena, ty: NodeId) -> i32 {
    match arena[ty].kind() {
        Kind::IntType => 4,
        Kind::MapType => 4,
        Kind::VoidType => 0,
        Kind::TupleType => {
            let mut size = 0;
            for i in 0..arena.num_children(ty) {
                if let Some(member) = arena.child(ty, i) {
                    size += type_size(arena, member);
                }
            }
            size
        }
        kind => ice!("size of non-type node {}", kind.name()),
    }
}
