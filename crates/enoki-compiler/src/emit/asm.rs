//! i386 AT&T assembly backend.
//!
//! Registers eax, ebx, ecx, edx, esi, edi back colours 1 through 6;
//! colour 0 means the declaration lives in its stack slot. Arguments sit
//! above the saved frame pointer (8 + position), locals below it. String
//! literals pool into `.rodata` under `.LC<n>` labels.

use std::fmt::Write;

use enoki_core::ice;
use enoki_core::interner::Symbol;
use enoki_ir::dot;
use enoki_ir::graph::EdgeKind;
use enoki_ir::node::{DeclFlags, Kind, NodeId};
use enoki_ir::ops;

use crate::ast::Cx;

use super::linearize::{emit_function, EmitBackend};

fn reg_name(colour: i32) -> &'static str {
    match colour {
        1 => "%eax",
        2 => "%ebx",
        3 => "%ecx",
        4 => "%edx",
        5 => "%esi",
        6 => "%edi",
        _ => "?reg?",
    }
}

fn mnemonic(kind: Kind) -> &'static str {
    match kind {
        Kind::Sum => "addl",
        Kind::Product => "imull",
        Kind::Difference => "subl",
        Kind::Ratio => "idivl",
        Kind::Negation => "negl",
        _ => "?op?",
    }
}

fn jump_mnemonic(kind: Kind, branch_kind: EdgeKind) -> &'static str {
    let kind = if branch_kind.contains(EdgeKind::NO) {
        ops::negate_comparison(kind)
    } else {
        kind
    };
    match kind {
        Kind::Gt => "jg",
        Kind::Lt => "jl",
        Kind::Geq => "jge",
        Kind::Leq => "jle",
        Kind::Eq => "jz",
        Kind::Neq => "jnz",
        _ => "?jump?",
    }
}

fn symbol_prefix() -> &'static str {
    if cfg!(windows) { "_" } else { "" }
}

struct AsmBackend<'a> {
    cx: &'a Cx,
    func: NodeId,
    strings: &'a mut Vec<Symbol>,
    label_offset: usize,
    label_max: usize,
}

impl<'a> AsmBackend<'a> {
    fn translate_label(&mut self, label: usize) -> usize {
        if label > self.label_max {
            self.label_max = label;
        }
        self.label_offset + label
    }

    fn queue_string(&mut self, value: Symbol) -> usize {
        self.strings.push(value);
        self.strings.len() - 1
    }

    /// Where a declaration's value lives: `$name` for functions, a register
    /// when coloured (unless the home slot is wanted), else the stack slot.
    fn decl_location(&self, decl: NodeId, from_memory: bool) -> String {
        let node = &self.cx.arena[decl];
        if node.is(Kind::Function) {
            return format!(
                "${}{}",
                symbol_prefix(),
                self.cx.interner.resolve(node.decl().name)
            );
        }

        let data = node.decl();
        if data.colour != 0 && !from_memory {
            return reg_name(data.colour).to_string();
        }

        let func_data = self.cx.arena[self.func].func();
        let offset = if data.flags.contains(DeclFlags::ARGUMENT) {
            8 + data.stack_position
        } else {
            func_data.input_size - data.stack_position - 4
        };
        format!("{offset}(%ebp)")
    }

    fn location(&self, expr: NodeId) -> String {
        let node = &self.cx.arena[expr];
        match node.kind() {
            Kind::Integer => return format!("${}", node.int_value()),
            Kind::Variable => {}
            other => ice!(
                "can't get the location of a {} expression",
                other.name()
            ),
        }

        let name = node.var().name;
        let decl = self.cx.arena[self.func]
            .func()
            .table
            .get(&name)
            .copied()
            .or_else(|| self.cx.arena[self.cx.module].module().table.get(&name).copied());
        let Some(decl) = decl else {
            ice!(
                "unable to look up declaration of '{}' in symbol table",
                self.cx.interner.resolve(name)
            );
        };
        self.decl_location(decl, false)
    }

    fn load(&mut self, out: &mut String, expr: NodeId, reg: &str) {
        match self.cx.arena[expr].kind() {
            Kind::Variable => {
                let loc = self.location(expr);
                let _ = writeln!(out, "    movl {loc}, {reg}");
            }
            Kind::Integer => {
                let _ = writeln!(out, "    movl ${}, {reg}", self.cx.arena[expr].int_value());
            }
            Kind::Str => {
                let index = self.queue_string(self.cx.arena[expr].str_value());
                let _ = writeln!(out, "    movl $.LC{index}, {reg}");
            }
            _ => {
                let _ = writeln!(out, "   # load");
            }
        }
    }

    fn store(&mut self, out: &mut String, expr: NodeId, reg: &str) {
        match self.cx.arena[expr].kind() {
            Kind::Variable => {
                let loc = self.location(expr);
                let _ = writeln!(out, "    movl {reg}, {loc}");
            }
            _ => {
                let _ = writeln!(out, "   # store");
            }
        }
    }
}

impl<'a> EmitBackend for AsmBackend<'a> {
    fn comment(&mut self, out: &mut String, vertex: NodeId) {
        let Some(label) = self.graph_label(vertex) else {
            return;
        };
        let text = dot::vertex_text(&self.cx.arena, &self.cx.interner, vertex);
        let _ = writeln!(out, "#{label} {text}");
    }

    fn enter(&mut self, out: &mut String, _vertex: NodeId) {
        let decl = self.cx.arena[self.func].decl();
        let name = self.cx.interner.resolve(decl.name);
        let prefix = symbol_prefix();
        if decl.flags.contains(DeclFlags::PUBLIC) {
            let _ = writeln!(out, ".globl {prefix}{name}");
        }
        let _ = writeln!(out, "{prefix}{name}:");
        let _ = writeln!(out, "    pushl %ebp");
        let _ = writeln!(out, "    movl %esp, %ebp");
        let _ = writeln!(out, "    pushl %ebx");
        let func_data = self.cx.arena[self.func].func();
        let _ = writeln!(
            out,
            "    subl ${}, %esp",
            func_data.stack_size - func_data.input_size
        );

        // Coloured arguments move from their stack homes into registers.
        let decls: Vec<NodeId> = func_data.table.values().copied().collect();
        for decl in decls {
            let data = self.cx.arena[decl].decl();
            if !data.flags.contains(DeclFlags::ARGUMENT) || data.colour == 0 {
                continue;
            }
            let home = self.decl_location(decl, true);
            let _ = writeln!(out, "    movl {home}, {}", reg_name(data.colour));
        }
    }

    fn exit(&mut self, out: &mut String, _vertex: NodeId) {
        let _ = writeln!(out, "    popl %ebx");
        let _ = writeln!(out, "    leave");
        let _ = writeln!(out, "    ret");
    }

    fn end(&mut self, out: &mut String) {
        out.push('\n');
    }

    fn label(&mut self, out: &mut String, label: usize) {
        let translated = self.translate_label(label);
        let _ = writeln!(out, "L{translated}:");
    }

    fn jump(&mut self, out: &mut String, label: usize) {
        let translated = self.translate_label(label);
        let _ = writeln!(out, "    jmp L{translated}");
    }

    fn ret(&mut self, out: &mut String, vertex: NodeId) {
        let expr = self.cx.arena.child_req(vertex, 0);
        self.load(out, expr, "%eax");
    }

    fn assign(&mut self, out: &mut String, vertex: NodeId) {
        let dest = self.cx.arena.child(vertex, 0);
        let expr = self.cx.arena.child_req(vertex, 1);
        let kind = self.cx.arena[expr].kind();

        match kind {
            Kind::Integer => {
                if let Some(dest) = dest {
                    let loc = self.location(dest);
                    let _ = writeln!(out, "    movl ${}, {loc}", self.cx.arena[expr].int_value());
                }
            }
            Kind::Variable => {
                if let Some(dest) = dest {
                    let dest_loc = self.location(dest);
                    let src_loc = self.location(expr);
                    if dest_loc != src_loc {
                        let _ = writeln!(out, "    movl {src_loc}, {dest_loc}");
                    }
                }
            }
            Kind::Ratio => {
                let arg0 = self.cx.arena.child_req(expr, 0);
                let arg1 = self.cx.arena.child_req(expr, 1);
                self.load(out, arg0, "%eax");
                let _ = writeln!(out, "    cltd");
                self.load(out, arg1, "%ebx");
                let _ = writeln!(out, "    idivl %ebx");
                if let Some(dest) = dest {
                    self.store(out, dest, "%eax");
                }
            }
            Kind::Call => {
                let callee = self.cx.arena.child_req(expr, 0);
                let args = self.cx.arena.child_req(expr, 1);
                match self.cx.arena[args].kind() {
                    Kind::Integer | Kind::Str | Kind::Variable => {
                        self.load(out, args, "%eax");
                        let _ = writeln!(out, "    pushl %eax");
                    }
                    Kind::Tuple => {
                        for i in (0..self.cx.arena.num_children(args)).rev() {
                            let arg = self.cx.arena.child_req(args, i);
                            self.load(out, arg, "%eax");
                            let _ = writeln!(out, "    pushl %eax");
                        }
                    }
                    _ => {
                        let _ = writeln!(out, "   # push args");
                    }
                }

                let callee_data = self.cx.arena[callee].var();
                let is_static = callee_data
                    .decl
                    .map(|d| self.cx.arena[d].decl().flags.contains(DeclFlags::STATIC));
                match is_static {
                    None | Some(true) => {
                        let name = self.cx.interner.resolve(callee_data.name);
                        let _ = writeln!(out, "    call {}{name}", symbol_prefix());
                    }
                    Some(false) => {
                        self.load(out, callee, "%eax");
                        let _ = writeln!(out, "    call *%eax");
                    }
                }

                if let Some(dest) = dest {
                    self.store(out, dest, "%eax");
                }
            }
            _ if ops::is_binary_op(kind) => {
                if let Some(dest) = dest {
                    let src = self.cx.arena.child_req(expr, 1);
                    let dest_loc = self.location(dest);
                    let src_loc = self.location(src);
                    let _ = writeln!(out, "    {} {src_loc}, {dest_loc}", mnemonic(kind));
                }
            }
            _ if ops::is_unary_op(kind) => {
                let arg0 = self.cx.arena.child_req(expr, 0);
                let loc = self.location(arg0);
                let _ = writeln!(out, "    {} {loc}", mnemonic(kind));
            }
            _ => {
                let _ = writeln!(out, "   # statement?");
            }
        }
    }

    fn test(&mut self, out: &mut String, vertex: NodeId, branch_kind: EdgeKind, label: usize) {
        let expr = self.cx.arena.child_req(vertex, 0);
        let kind = self.cx.arena[expr].kind();
        if !ops::is_comparison_op(kind) {
            let _ = writeln!(out, "   # test");
            return;
        }

        let arg0 = self.cx.arena.child_req(expr, 0);
        let arg1 = self.cx.arena.child_req(expr, 1);
        let loc0 = self.location(arg0);
        let loc1 = self.location(arg1);
        let _ = writeln!(out, "    cmpl {loc1}, {loc0}");

        let translated = self.translate_label(label);
        let _ = writeln!(out, "    {} L{translated}", jump_mnemonic(kind, branch_kind));
    }
}

impl<'a> AsmBackend<'a> {
    fn graph_label(&self, vertex: NodeId) -> Option<usize> {
        self.cx.arena[self.func]
            .func()
            .graph
            .as_ref()
            .and_then(|g| g.label_of(vertex))
    }
}

/// Emit the whole module: every function with a body whose use count is
/// positive or that is public, then the pooled string literals.
pub fn generate_asm(cx: &Cx) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "    .file \"{}\"", cx.arena[cx.module].module().filename);
    let _ = writeln!(out, "    .text");
    out.push('\n');

    let mut strings: Vec<Symbol> = Vec::new();
    let mut label_offset = 0;

    for i in 0..cx.arena.num_children(cx.module) {
        let Some(func) = cx.arena.child(cx.module, i) else {
            continue;
        };
        if !cx.arena[func].is(Kind::Function) {
            continue;
        }
        if cx.arena.child(func, 0).is_none() {
            continue;
        }
        let decl = cx.arena[func].decl();
        if decl.use_count <= 0 && !decl.flags.contains(DeclFlags::PUBLIC) {
            continue;
        }
        let Some(graph) = cx.arena[func].func().graph.as_ref() else {
            ice!("emitting a function without a graph");
        };

        let mut backend = AsmBackend {
            cx,
            func,
            strings: &mut strings,
            label_offset,
            label_max: 0,
        };
        emit_function(cx, graph, &mut backend, &mut out);
        label_offset += backend.label_max + 1;
    }

    let _ = writeln!(out, "    .section .rodata");
    for (index, sym) in strings.iter().enumerate() {
        let _ = writeln!(out, ".LC{index}:\n    .string \"{}\"", cx.interner.resolve(*sym));
    }

    out
}
