//! The parse tree, stored in typed arenas
//!
//! Nodes are held in one vector per category and referenced by copyable
//! ids, so parent back-pointers and declaration back-references are plain
//! indices rather than owning links. Ownership flows downward from the
//! [Ast] arena; the passes annotate nodes in place (`expr_type` after
//! checking, `emit_loc` during TAC emission).

pub mod printer;

use crate::compiler::codegen::tac::Location;
use crate::compiler::common::token::{Span, Token};
use crate::compiler::common::types::Ty;
use std::rc::Rc;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DeclId(pub usize);
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct StmtId(pub usize);
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ExprId(pub usize);
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TypeId(pub usize);

/// Non-owning reference to any node, used for parent back-pointers.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum NodeRef {
    Program,
    Decl(DeclId),
    Stmt(StmtId),
    Expr(ExprId),
    Type(TypeId),
}

/// A name occurrence. `decl` is filled in by the declaration-binding pass.
#[derive(Clone, PartialEq, Debug)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
    pub decl: Option<DeclId>,
}
impl Identifier {
    pub fn new(name: String, span: Span) -> Identifier {
        Identifier { name, span, decl: None }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum TypeKind {
    Primitive(Ty),
    Named(Identifier),
    Array(TypeId),
}

#[derive(Clone, Debug)]
pub struct TypeNode {
    pub kind: TypeKind,
    pub span: Span,
    pub parent: Option<NodeRef>,
    /// Resolved semantic type, set by the declaration-binding pass.
    pub expr_type: Option<Ty>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct VarDecl {
    pub ty: TypeId,
}

#[derive(Clone, PartialEq, Debug)]
pub struct FnDecl {
    pub return_type: TypeId,
    pub formals: Vec<DeclId>,
    pub body: Option<StmtId>,
    /// Byte offset into the owning class's v-table, assigned pre-emit.
    pub vtable_offset: Option<i32>,
    /// Mangled code label (`Class.method`, `_free_fn`, or `main`).
    pub label: Option<String>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct ClassDecl {
    pub extends: Option<TypeId>,
    pub implements: Vec<TypeId>,
    pub members: Vec<DeclId>,
    /// Filled in by offset assignment: members flattened in inheritance
    /// order with overridden methods replaced in their parent's slot.
    pub var_members: Vec<DeclId>,
    pub methods: Vec<DeclId>,
    pub instance_size: i32,
    pub vtable_size: i32,
}

#[derive(Clone, PartialEq, Debug)]
pub struct InterfaceDecl {
    pub members: Vec<DeclId>,
}

#[derive(Clone, PartialEq, Debug)]
pub enum DeclKind {
    Var(VarDecl),
    Fn(FnDecl),
    Class(ClassDecl),
    Interface(InterfaceDecl),
}

#[derive(Clone, Debug)]
pub struct DeclNode {
    pub id: Identifier,
    pub kind: DeclKind,
    pub span: Span,
    pub parent: Option<NodeRef>,
    /// Global symbol index assigned on insertion into the symbol table.
    pub idx: Option<usize>,
    pub expr_type: Option<Ty>,
    pub emit_loc: Option<Rc<Location>>,
}

#[derive(Clone, PartialEq, Debug)]
pub enum StmtKind {
    Block {
        decls: Vec<DeclId>,
        stmts: Vec<StmtId>,
    },
    If {
        test: ExprId,
        then_body: StmtId,
        else_body: Option<StmtId>,
    },
    While {
        test: ExprId,
        body: StmtId,
    },
    For {
        init: ExprId,
        test: ExprId,
        step: ExprId,
        body: StmtId,
    },
    Switch {
        expr: ExprId,
        cases: Vec<StmtId>,
    },
    /// `value` is `None` for the `default` arm.
    Case {
        value: Option<i32>,
        stmts: Vec<StmtId>,
    },
    Break,
    Return {
        expr: ExprId,
    },
    Print {
        args: Vec<ExprId>,
    },
    Expr(ExprId),
}

#[derive(Clone, Debug)]
pub struct StmtNode {
    pub kind: StmtKind,
    pub span: Span,
    pub parent: Option<NodeRef>,
    /// End label of a loop or switch, set during emission so a nested
    /// `break` can find it on the parent chain.
    pub end_label: Option<String>,
}

#[derive(Clone, PartialEq, Debug)]
pub enum ExprKind {
    Empty,
    IntConstant(i32),
    DoubleConstant(f64),
    BoolConstant(bool),
    /// Lexeme with its surrounding quotes.
    StringConstant(String),
    NullConstant,
    This,
    ReadInteger,
    ReadLine,
    Arithmetic {
        left: Option<ExprId>,
        op: Token,
        right: ExprId,
    },
    Relational {
        left: ExprId,
        op: Token,
        right: ExprId,
    },
    Equality {
        left: ExprId,
        op: Token,
        right: ExprId,
    },
    Logical {
        left: Option<ExprId>,
        op: Token,
        right: ExprId,
    },
    Assign {
        left: ExprId,
        right: ExprId,
    },
    ArrayAccess {
        base: ExprId,
        subscript: ExprId,
    },
    FieldAccess {
        base: Option<ExprId>,
        field: Identifier,
    },
    Call {
        base: Option<ExprId>,
        field: Identifier,
        actuals: Vec<ExprId>,
    },
    New {
        class: TypeId,
    },
    NewArray {
        size: ExprId,
        elem_type: TypeId,
    },
    Postfix {
        lvalue: ExprId,
        op: Token,
    },
}

#[derive(Clone, Debug)]
pub struct ExprNode {
    pub kind: ExprKind,
    pub span: Span,
    pub parent: Option<NodeRef>,
    pub expr_type: Option<Ty>,
    pub emit_loc: Option<Rc<Location>>,
}

#[derive(Debug, Default)]
pub struct Ast {
    pub decls: Vec<DeclNode>,
    pub stmts: Vec<StmtNode>,
    pub exprs: Vec<ExprNode>,
    pub types: Vec<TypeNode>,
    /// Top-level declarations in source order.
    pub program: Vec<DeclId>,
}

impl Ast {
    pub fn new() -> Ast {
        Ast::default()
    }

    pub fn add_decl(&mut self, id: Identifier, kind: DeclKind, span: Span) -> DeclId {
        self.decls.push(DeclNode {
            id,
            kind,
            span,
            parent: None,
            idx: None,
            expr_type: None,
            emit_loc: None,
        });
        DeclId(self.decls.len() - 1)
    }
    pub fn add_stmt(&mut self, kind: StmtKind, span: Span) -> StmtId {
        self.stmts.push(StmtNode {
            kind,
            span,
            parent: None,
            end_label: None,
        });
        StmtId(self.stmts.len() - 1)
    }
    pub fn add_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        self.exprs.push(ExprNode {
            kind,
            span,
            parent: None,
            expr_type: None,
            emit_loc: None,
        });
        ExprId(self.exprs.len() - 1)
    }
    pub fn add_type(&mut self, kind: TypeKind, span: Span) -> TypeId {
        self.types.push(TypeNode {
            kind,
            span,
            parent: None,
            expr_type: None,
        });
        TypeId(self.types.len() - 1)
    }

    pub fn decl(&self, id: DeclId) -> &DeclNode {
        &self.decls[id.0]
    }
    pub fn decl_mut(&mut self, id: DeclId) -> &mut DeclNode {
        &mut self.decls[id.0]
    }
    pub fn stmt(&self, id: StmtId) -> &StmtNode {
        &self.stmts[id.0]
    }
    pub fn stmt_mut(&mut self, id: StmtId) -> &mut StmtNode {
        &mut self.stmts[id.0]
    }
    pub fn expr(&self, id: ExprId) -> &ExprNode {
        &self.exprs[id.0]
    }
    pub fn expr_mut(&mut self, id: ExprId) -> &mut ExprNode {
        &mut self.exprs[id.0]
    }
    pub fn type_node(&self, id: TypeId) -> &TypeNode {
        &self.types[id.0]
    }
    pub fn type_mut(&mut self, id: TypeId) -> &mut TypeNode {
        &mut self.types[id.0]
    }

    pub fn decl_name(&self, id: DeclId) -> &str {
        &self.decl(id).id.name
    }
    /// Resolved semantic type of a type expression.
    pub fn type_of(&self, id: TypeId) -> Option<Ty> {
        self.type_node(id).expr_type.clone()
    }
    /// The name inside a `Named` type expression.
    pub fn named_type_name(&self, id: TypeId) -> Option<&str> {
        match &self.type_node(id).kind {
            TypeKind::Named(ident) => Some(&ident.name),
            _ => None,
        }
    }

    /// Assigns parent back-pointers across the whole tree. Run once after
    /// parsing; passes rely on the links (enclosing function for `return`,
    /// enclosing loop for `break`, owning class for methods).
    pub fn link_parents(&mut self) {
        for decl in self.program.clone() {
            self.link_decl(decl, NodeRef::Program);
        }
    }
    fn link_decl(&mut self, id: DeclId, parent: NodeRef) {
        self.decl_mut(id).parent = Some(parent);
        let me = NodeRef::Decl(id);
        match self.decl(id).kind.clone() {
            DeclKind::Var(v) => self.link_type(v.ty, me),
            DeclKind::Fn(f) => {
                self.link_type(f.return_type, me);
                for formal in f.formals {
                    self.link_decl(formal, me);
                }
                if let Some(body) = f.body {
                    self.link_stmt(body, me);
                }
            }
            DeclKind::Class(c) => {
                if let Some(extends) = c.extends {
                    self.link_type(extends, me);
                }
                for implement in c.implements {
                    self.link_type(implement, me);
                }
                for member in c.members {
                    self.link_decl(member, me);
                }
            }
            DeclKind::Interface(i) => {
                for member in i.members {
                    self.link_decl(member, me);
                }
            }
        }
    }
    fn link_stmt(&mut self, id: StmtId, parent: NodeRef) {
        self.stmt_mut(id).parent = Some(parent);
        let me = NodeRef::Stmt(id);
        match self.stmt(id).kind.clone() {
            StmtKind::Block { decls, stmts } => {
                for decl in decls {
                    self.link_decl(decl, me);
                }
                for stmt in stmts {
                    self.link_stmt(stmt, me);
                }
            }
            StmtKind::If { test, then_body, else_body } => {
                self.link_expr(test, me);
                self.link_stmt(then_body, me);
                if let Some(else_body) = else_body {
                    self.link_stmt(else_body, me);
                }
            }
            StmtKind::While { test, body } => {
                self.link_expr(test, me);
                self.link_stmt(body, me);
            }
            StmtKind::For { init, test, step, body } => {
                self.link_expr(init, me);
                self.link_expr(test, me);
                self.link_expr(step, me);
                self.link_stmt(body, me);
            }
            StmtKind::Switch { expr, cases } => {
                self.link_expr(expr, me);
                for case in cases {
                    self.link_stmt(case, me);
                }
            }
            StmtKind::Case { stmts, .. } => {
                for stmt in stmts {
                    self.link_stmt(stmt, me);
                }
            }
            StmtKind::Break => {}
            StmtKind::Return { expr } => self.link_expr(expr, me),
            StmtKind::Print { args } => {
                for arg in args {
                    self.link_expr(arg, me);
                }
            }
            StmtKind::Expr(expr) => self.link_expr(expr, me),
        }
    }
    fn link_expr(&mut self, id: ExprId, parent: NodeRef) {
        self.expr_mut(id).parent = Some(parent);
        let me = NodeRef::Expr(id);
        match self.expr(id).kind.clone() {
            ExprKind::Arithmetic { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                if let Some(left) = left {
                    self.link_expr(left, me);
                }
                self.link_expr(right, me);
            }
            ExprKind::Relational { left, right, .. }
            | ExprKind::Equality { left, right, .. }
            | ExprKind::Assign { left, right } => {
                self.link_expr(left, me);
                self.link_expr(right, me);
            }
            ExprKind::ArrayAccess { base, subscript } => {
                self.link_expr(base, me);
                self.link_expr(subscript, me);
            }
            ExprKind::FieldAccess { base, .. } => {
                if let Some(base) = base {
                    self.link_expr(base, me);
                }
            }
            ExprKind::Call { base, actuals, .. } => {
                if let Some(base) = base {
                    self.link_expr(base, me);
                }
                for actual in actuals {
                    self.link_expr(actual, me);
                }
            }
            ExprKind::New { class } => self.link_type(class, me),
            ExprKind::NewArray { size, elem_type } => {
                self.link_expr(size, me);
                self.link_type(elem_type, me);
            }
            ExprKind::Postfix { lvalue, .. } => self.link_expr(lvalue, me),
            _ => {}
        }
    }
    fn link_type(&mut self, id: TypeId, parent: NodeRef) {
        self.type_mut(id).parent = Some(parent);
        let me = NodeRef::Type(id);
        if let TypeKind::Array(elem) = self.type_node(id).kind.clone() {
            self.link_type(elem, me);
        }
    }

    /// True when the declaration is a direct member of a class.
    pub fn is_class_member(&self, id: DeclId) -> bool {
        matches!(
            self.decl(id).parent,
            Some(NodeRef::Decl(p)) if matches!(self.decl(p).kind, DeclKind::Class(_))
        )
    }
    /// True when the declaration is a direct member of an interface.
    pub fn is_interface_member(&self, id: DeclId) -> bool {
        matches!(
            self.decl(id).parent,
            Some(NodeRef::Decl(p)) if matches!(self.decl(p).kind, DeclKind::Interface(_))
        )
    }
    /// The class a member declaration belongs to.
    pub fn owning_class(&self, id: DeclId) -> Option<DeclId> {
        match self.decl(id).parent {
            Some(NodeRef::Decl(p)) if matches!(self.decl(p).kind, DeclKind::Class(_)) => Some(p),
            _ => None,
        }
    }
    /// The function enclosing a statement, found on the parent chain.
    pub fn enclosing_fn(&self, stmt: StmtId) -> Option<DeclId> {
        let mut cur = self.stmt(stmt).parent;
        loop {
            match cur {
                Some(NodeRef::Stmt(s)) => cur = self.stmt(s).parent,
                Some(NodeRef::Decl(d)) => {
                    return match self.decl(d).kind {
                        DeclKind::Fn(_) => Some(d),
                        _ => None,
                    }
                }
                _ => return None,
            }
        }
    }
}
