//! Compiler context and IR node constructors.
//!
//! [`Cx`] carries everything that would otherwise be global state: the node
//! arena, the interner, the module handle, and the counters behind generated
//! names. The constructor methods build well-formed nodes for each kind;
//! passes never assemble node payloads by hand.
//!
//! Generated names are prefixed with `$` and can never collide with user
//! identifiers: `$t<n>` for temporaries, `closure<n>` functions get their
//! numbered names here too.

use enoki_core::interner::{Interner, Symbol};
use enoki_ir::node::{
    Arena, DeclData, DeclFlags, FuncData, Kind, ModuleData, Node, NodeId, Payload,
};
use indexmap::IndexMap;

/// Compiler context: arena, interner, module, and generator counters.
pub struct Cx {
    pub arena: Arena,
    pub interner: Interner,
    pub module: NodeId,
    next_temp: u32,
    next_closure: u32,
}

impl Cx {
    pub fn new(filename: &str) -> Self {
        let mut arena = Arena::new();
        let interner = Interner::new();
        let module = arena.alloc(Node::with_payload(
            Kind::Module,
            0,
            Payload::Module(Box::new(ModuleData {
                filename: filename.to_string(),
                table: IndexMap::new(),
                max_registers: 6,
            })),
        ));
        Self {
            arena,
            interner,
            module,
            next_temp: 0,
            next_closure: 0,
        }
    }

    // ---- statements ----

    /// Wrap a statement in a block, flattening statement sequences. An
    /// existing block is returned unchanged.
    pub fn make_block(
        &mut self,
        table: Option<IndexMap<Symbol, NodeId>>,
        stmt: Option<NodeId>,
        line: u32,
    ) -> NodeId {
        if let Some(stmt) = stmt {
            if self.arena[stmt].is(Kind::Block) {
                return stmt;
            }
        }

        let line = match (line, stmt) {
            (0, Some(stmt)) => self.arena[stmt].line,
            _ => line,
        };

        let block = self.arena.alloc(Node::with_payload(
            Kind::Block,
            line,
            Payload::Block {
                table: table.unwrap_or_default(),
            },
        ));
        match stmt {
            Some(stmt) if self.arena[stmt].is(Kind::Sequence) => {
                let children = self.arena[stmt].children.clone();
                for child in children {
                    self.arena.add_child(block, child);
                }
            }
            other => self.arena.add_child(block, other),
        }
        block
    }

    pub fn make_if(
        &mut self,
        cond: NodeId,
        then_stmt: Option<NodeId>,
        else_stmt: Option<NodeId>,
        line: u32,
    ) -> NodeId {
        let line = if line == 0 { self.arena[cond].line } else { line };
        let then_block = self.make_block(None, then_stmt, 0);
        let else_block = self.make_block(None, else_stmt, 0);
        let node = self.arena.alloc_simple(Kind::If, line);
        self.arena.add_child(node, Some(cond));
        self.arena.add_child(node, Some(then_block));
        self.arena.add_child(node, Some(else_block));
        node
    }

    pub fn make_while(&mut self, cond: NodeId, body: Option<NodeId>, line: u32) -> NodeId {
        let line = if line == 0 { self.arena[cond].line } else { line };
        let body = self.make_block(None, body, 0);
        let node = self.arena.alloc_simple(Kind::While, line);
        self.arena.add_child(node, Some(cond));
        self.arena.add_child(node, Some(body));
        node
    }

    pub fn make_for(
        &mut self,
        init: Option<NodeId>,
        cond: NodeId,
        step: Option<NodeId>,
        body: Option<NodeId>,
        line: u32,
    ) -> NodeId {
        let node = self.arena.alloc_simple(Kind::For, line);
        self.arena.add_child(node, init);
        self.arena.add_child(node, Some(cond));
        self.arena.add_child(node, step);
        self.arena.add_child(node, body);
        node
    }

    /// `dest` may be empty for bare expression statements.
    pub fn make_assignment(&mut self, dest: Option<NodeId>, value: NodeId, line: u32) -> NodeId {
        let node = self.arena.alloc_simple(Kind::Assign, line);
        self.arena.add_child(node, dest);
        self.arena.add_child(node, Some(value));
        node
    }

    pub fn make_return(&mut self, expr: NodeId, line: u32) -> NodeId {
        let node = self.arena.alloc_simple(Kind::Return, line);
        self.arena.add_child(node, Some(expr));
        node
    }

    pub fn make_test(&mut self, expr: NodeId, line: u32) -> NodeId {
        let line = if line == 0 { self.arena[expr].line } else { line };
        let node = self.arena.alloc_simple(Kind::Test, line);
        self.arena.add_child(node, Some(expr));
        node
    }

    /// Append `s2` to a statement sequence, starting one if needed.
    pub fn make_statements(&mut self, s1: NodeId, s2: NodeId, line: u32) -> NodeId {
        let node = if self.arena[s1].is(Kind::Sequence) {
            s1
        } else {
            let node = self.arena.alloc_simple(Kind::Sequence, line);
            self.arena.add_child(node, Some(s1));
            node
        };
        self.arena.add_child(node, Some(s2));
        node
    }

    // ---- definitions ----

    /// A function definition. Children: `[body, args]`; the body starts
    /// empty. The declaration type is `args -> return`.
    pub fn make_function(
        &mut self,
        return_ty: NodeId,
        name: Symbol,
        args: NodeId,
        line: u32,
    ) -> NodeId {
        let args_ty = self.arena[args].ty.unwrap_or_else(|| self.void_type(line));
        let fn_ty = self.make_map_type(args_ty, return_ty, line);
        let mut decl = DeclData::new(name, Some(fn_ty));
        decl.flags |= DeclFlags::STATIC;
        let func = self
            .arena
            .alloc(Node::with_payload(Kind::Function, line, Payload::Func(Box::new(FuncData::new(decl)))));
        self.arena.add_child(func, None);
        self.arena.add_child(func, Some(args));
        func
    }

    pub fn make_declaration(&mut self, ty: NodeId, name: Symbol, line: u32) -> NodeId {
        self.arena.alloc(Node::with_payload(
            Kind::VarDecl,
            line,
            Payload::Decl(DeclData::new(name, Some(ty))),
        ))
    }

    /// An argument list node. Children: argument declarations; the node's
    /// type is the tuple of argument types (or a single type, or void).
    pub fn make_args(&mut self, params: &[NodeId], line: u32) -> NodeId {
        let node = self.arena.alloc_simple(Kind::Args, line);
        let mut member_types = Vec::new();
        for &param in params {
            self.arena.add_child(node, Some(param));
            if let Some(ty) = self.arena[param].decl().ty {
                member_types.push(ty);
            }
        }
        let ty = match member_types.len() {
            0 => self.void_type(line),
            1 => member_types[0],
            _ => {
                let tuple = self.arena.alloc_simple(Kind::TupleType, line);
                for ty in member_types {
                    self.arena.add_child(tuple, Some(ty));
                }
                tuple
            }
        };
        self.arena[node].ty = Some(ty);
        node
    }

    // ---- expressions ----

    pub fn make_binary_expression(
        &mut self,
        kind: Kind,
        a: NodeId,
        b: NodeId,
        line: u32,
    ) -> NodeId {
        let node = self.arena.alloc_simple(kind, line);
        self.arena.add_child(node, Some(a));
        self.arena.add_child(node, Some(b));
        self.arena[node].ty = self.arena[a].ty;
        node
    }

    pub fn make_unary_expression(&mut self, kind: Kind, a: NodeId, line: u32) -> NodeId {
        let node = self.arena.alloc_simple(kind, line);
        self.arena.add_child(node, Some(a));
        self.arena[node].ty = self.arena[a].ty;
        node
    }

    /// A call expression. Children: `[callee variable, argument expression]`.
    /// The call's type is the codomain of the callee's map type.
    pub fn make_call(&mut self, callee: NodeId, args: NodeId, line: u32) -> NodeId {
        let node = self.arena.alloc_simple(Kind::Call, line);
        self.arena.add_child(node, Some(callee));
        self.arena.add_child(node, Some(args));
        self.arena[node].ty = self.arena[callee].ty.and_then(|ty| self.arena.child(ty, 1));
        node
    }

    /// A closure expression wrapping a freshly named function that is also
    /// registered as a module member.
    pub fn make_closure(
        &mut self,
        return_ty: NodeId,
        args: NodeId,
        body: NodeId,
        line: u32,
    ) -> NodeId {
        let name = self
            .interner
            .intern_owned(format!("closure{}", self.next_closure));
        self.next_closure += 1;

        let func = self.make_function(return_ty, name, args, line);
        self.arena.set_child(func, 0, Some(body));

        let expr = self.arena.alloc_simple(Kind::Closure, line);
        self.arena.add_child(expr, Some(func));
        self.arena[expr].ty = self.arena[func].decl().ty;

        self.arena.add_child(self.module, Some(func));
        self.arena[self.module]
            .module_mut()
            .table
            .insert(name, func);
        expr
    }

    pub fn make_integer_direct(&mut self, value: i32, line: u32) -> NodeId {
        let ty = self.int_type(line);
        let node = self
            .arena
            .alloc(Node::with_payload(Kind::Integer, line, Payload::Int(value)));
        self.arena[node].ty = Some(ty);
        node
    }

    pub fn make_string(&mut self, value: Symbol, line: u32) -> NodeId {
        self.arena
            .alloc(Node::with_payload(Kind::Str, line, Payload::Str(value)))
    }

    pub fn make_variable(&mut self, name: Symbol, line: u32) -> NodeId {
        self.arena.alloc(Node::with_payload(
            Kind::Variable,
            line,
            Payload::Var(enoki_ir::node::VarData { name, decl: None }),
        ))
    }

    /// Append to a tuple expression, starting one if needed.
    pub fn make_tuple(&mut self, e1: NodeId, e2: NodeId, line: u32) -> NodeId {
        let node = if self.arena[e1].is(Kind::Tuple) {
            e1
        } else {
            let node = self.arena.alloc_simple(Kind::Tuple, line);
            self.arena.add_child(node, Some(e1));
            let ty = self.arena.alloc_simple(Kind::TupleType, line);
            if let Some(t1) = self.arena[e1].ty {
                self.arena.add_child(ty, Some(t1));
            }
            self.arena[node].ty = Some(ty);
            node
        };
        self.arena.add_child(node, Some(e2));
        if let (Some(ty), Some(t2)) = (self.arena[node].ty, self.arena[e2].ty) {
            self.arena.add_child(ty, Some(t2));
        }
        node
    }

    pub fn make_empty_tuple(&mut self, line: u32) -> NodeId {
        self.arena.alloc_simple(Kind::Tuple, line)
    }

    // ---- types ----

    pub fn int_type(&mut self, line: u32) -> NodeId {
        self.arena.alloc_simple(Kind::IntType, line)
    }

    pub fn void_type(&mut self, line: u32) -> NodeId {
        self.arena.alloc_simple(Kind::VoidType, line)
    }

    pub fn make_map_type(&mut self, domain: NodeId, codomain: NodeId, line: u32) -> NodeId {
        let node = self.arena.alloc_simple(Kind::MapType, line);
        self.arena.add_child(node, Some(domain));
        self.arena.add_child(node, Some(codomain));
        node
    }

    /// Append to a tuple type, starting one if needed.
    pub fn make_tuple_type(&mut self, t1: NodeId, t2: NodeId, line: u32) -> NodeId {
        let node = if self.arena[t1].is(Kind::TupleType) {
            t1
        } else {
            let node = self.arena.alloc_simple(Kind::TupleType, line);
            self.arena.add_child(node, Some(t1));
            node
        };
        self.arena.add_child(node, Some(t2));
        node
    }

    // ---- derived helpers ----

    /// The function's input as an expression: a variable per argument, a
    /// tuple when there is more than one.
    pub fn input_tuple(&mut self, func: NodeId) -> NodeId {
        let line = self.arena[func].line;
        let Some(args) = self.arena.child(func, 1) else {
            return self.make_empty_tuple(line);
        };

        let arg_decls: Vec<NodeId> = (0..self.arena.num_children(args))
            .filter_map(|i| self.arena.child(args, i))
            .collect();

        let mut vars = Vec::with_capacity(arg_decls.len());
        for decl in arg_decls {
            let name = self.arena[decl].decl().name;
            let decl_line = self.arena[decl].line;
            let var = self.make_variable(name, decl_line);
            self.arena[var].ty = self.arena[decl].decl().ty;
            self.arena[var].var_mut().decl = Some(decl);
            vars.push(var);
        }

        match vars.len() {
            0 => self.make_empty_tuple(line),
            1 => vars[0],
            _ => {
                let tuple = self.arena.alloc_simple(Kind::Tuple, line);
                for var in vars {
                    self.arena.add_child(tuple, Some(var));
                }
                tuple
            }
        }
    }

    /// Synthesise a fresh `$t<n>` temporary in the function's table and
    /// return a variable referencing it.
    pub fn new_temp(&mut self, func: NodeId, ty: NodeId, line: u32) -> NodeId {
        let name = self.interner.intern_owned(format!("$t{}", self.next_temp));
        self.next_temp += 1;

        let decl = self.make_declaration(ty, name, line);
        self.arena[func].func_mut().table.insert(name, decl);

        let var = self.make_variable(name, line);
        self.arena[var].var_mut().decl = Some(decl);
        self.arena[var].ty = Some(ty);
        var
    }

    /// Look a function up in the module table.
    pub fn module_function(&self, name: Symbol) -> Option<NodeId> {
        self.arena[self.module].module().table.get(&name).copied()
    }
}
