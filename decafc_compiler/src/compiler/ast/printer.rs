//! Parse-tree dump for the `ast`/`ast+` debug tags
//!
//! Each line starts with the node's source line (when it has one), then
//! indentation, an optional role label, and the node name. With `ast+`
//! the resolved type is appended in angle brackets.

use super::{Ast, DeclId, DeclKind, ExprId, ExprKind, Identifier, StmtId, StmtKind, TypeId, TypeKind};
use crate::compiler::common::types::Ty;

const INDENT: usize = 3;

pub fn dump(ast: &Ast, show_types: bool) -> String {
    let mut p = Printer {
        ast,
        show_types,
        out: String::from("Program:"),
    };
    for decl in &ast.program {
        p.decl(*decl, 1, "");
    }
    p.out.push('\n');
    p.out
}

struct Printer<'a> {
    ast: &'a Ast,
    show_types: bool,
    out: String,
}

impl Printer<'_> {
    fn line(&mut self, src_line: Option<i32>, level: usize, text: &str) {
        self.out.push('\n');
        match src_line {
            Some(n) => self.out.push_str(&format!("{:>3}", n)),
            None => self.out.push_str("   "),
        }
        self.out.push_str(&" ".repeat(level * INDENT));
        self.out.push_str(text);
    }
    fn annotate(&mut self, ty: &Option<Ty>) {
        if self.show_types {
            if let Some(ty) = ty {
                self.out.push_str(&format!(" <{}>", ty));
            }
        }
    }
    fn ident(&mut self, id: &Identifier, level: usize) {
        let mut text = format!("Identifier: {}", id.name);
        if let Some(decl) = id.decl {
            if let Some(idx) = self.ast.decl(decl).idx {
                text.push_str(&format!(" {{{}}}", idx));
            }
        }
        self.line(Some(id.span.line), level, &text);
    }

    fn decl(&mut self, id: DeclId, level: usize, label: &str) {
        let node = self.ast.decl(id);
        let name = match node.kind {
            DeclKind::Var(_) => "VarDecl:",
            DeclKind::Fn(_) => "FnDecl:",
            DeclKind::Class(_) => "ClassDecl:",
            DeclKind::Interface(_) => "InterfaceDecl:",
        };
        self.line(Some(node.span.line), level, &format!("{}{}", label, name));
        self.annotate(&node.expr_type.clone());
        let ident = node.id.clone();
        match node.kind.clone() {
            DeclKind::Var(v) => {
                self.type_node(v.ty, level + 1, "");
                self.ident(&ident, level + 1);
            }
            DeclKind::Fn(f) => {
                self.type_node(f.return_type, level + 1, "(return type) ");
                self.ident(&ident, level + 1);
                for formal in f.formals {
                    self.decl(formal, level + 1, "(formals) ");
                }
                if let Some(body) = f.body {
                    self.stmt(body, level + 1, "(body) ");
                }
            }
            DeclKind::Class(c) => {
                self.ident(&ident, level + 1);
                if let Some(extends) = c.extends {
                    self.type_node(extends, level + 1, "(extends) ");
                }
                for implement in c.implements {
                    self.type_node(implement, level + 1, "(implements) ");
                }
                for member in c.members {
                    self.decl(member, level + 1, "");
                }
            }
            DeclKind::Interface(i) => {
                self.ident(&ident, level + 1);
                for member in i.members {
                    self.decl(member, level + 1, "");
                }
            }
        }
    }

    fn stmt(&mut self, id: StmtId, level: usize, label: &str) {
        let node = self.ast.stmt(id);
        let src_line = Some(node.span.line);
        match node.kind.clone() {
            StmtKind::Block { decls, stmts } => {
                self.line(None, level, &format!("{}StmtBlock:", label));
                for decl in decls {
                    self.decl(decl, level + 1, "");
                }
                for stmt in stmts {
                    self.stmt(stmt, level + 1, "");
                }
            }
            StmtKind::If { test, then_body, else_body } => {
                self.line(src_line, level, &format!("{}IfStmt:", label));
                self.expr(test, level + 1, "(test) ");
                self.stmt(then_body, level + 1, "(then) ");
                if let Some(else_body) = else_body {
                    self.stmt(else_body, level + 1, "(else) ");
                }
            }
            StmtKind::While { test, body } => {
                self.line(src_line, level, &format!("{}WhileStmt:", label));
                self.expr(test, level + 1, "(test) ");
                self.stmt(body, level + 1, "(body) ");
            }
            StmtKind::For { init, test, step, body } => {
                self.line(src_line, level, &format!("{}ForStmt:", label));
                self.expr(init, level + 1, "(init) ");
                self.expr(test, level + 1, "(test) ");
                self.expr(step, level + 1, "(step) ");
                self.stmt(body, level + 1, "(body) ");
            }
            StmtKind::Switch { expr, cases } => {
                self.line(src_line, level, &format!("{}SwitchStmt:", label));
                self.expr(expr, level + 1, "");
                for case in cases {
                    self.stmt(case, level + 1, "");
                }
            }
            StmtKind::Case { value, stmts } => {
                let text = match value {
                    Some(v) => format!("CaseStmt: {}", v),
                    None => "DefaultStmt:".to_string(),
                };
                self.line(src_line, level, &format!("{}{}", label, text));
                for stmt in stmts {
                    self.stmt(stmt, level + 1, "");
                }
            }
            StmtKind::Break => self.line(src_line, level, &format!("{}BreakStmt:", label)),
            StmtKind::Return { expr } => {
                self.line(src_line, level, &format!("{}ReturnStmt:", label));
                self.expr(expr, level + 1, "");
            }
            StmtKind::Print { args } => {
                self.line(src_line, level, &format!("{}PrintStmt:", label));
                for arg in args {
                    self.expr(arg, level + 1, "(args) ");
                }
            }
            StmtKind::Expr(expr) => self.expr(expr, level, label),
        }
    }

    fn expr(&mut self, id: ExprId, level: usize, label: &str) {
        let node = self.ast.expr(id);
        let src_line = Some(node.span.line);
        let ty = node.expr_type.clone();
        match node.kind.clone() {
            ExprKind::Empty => {
                self.line(None, level, &format!("{}Empty:", label));
            }
            ExprKind::IntConstant(v) => {
                self.line(src_line, level, &format!("{}IntConstant: {}", label, v));
                self.annotate(&ty);
            }
            ExprKind::DoubleConstant(v) => {
                self.line(src_line, level, &format!("{}DoubleConstant: {}", label, v));
                self.annotate(&ty);
            }
            ExprKind::BoolConstant(v) => {
                self.line(src_line, level, &format!("{}BoolConstant: {}", label, v));
                self.annotate(&ty);
            }
            ExprKind::StringConstant(s) => {
                self.line(src_line, level, &format!("{}StringConstant: {}", label, s));
                self.annotate(&ty);
            }
            ExprKind::NullConstant => {
                self.line(src_line, level, &format!("{}NullConstant:", label));
                self.annotate(&ty);
            }
            ExprKind::This => {
                self.line(src_line, level, &format!("{}This:", label));
                self.annotate(&ty);
            }
            ExprKind::ReadInteger => {
                self.line(src_line, level, &format!("{}ReadIntegerExpr:", label));
                self.annotate(&ty);
            }
            ExprKind::ReadLine => {
                self.line(src_line, level, &format!("{}ReadLineExpr:", label));
                self.annotate(&ty);
            }
            ExprKind::Arithmetic { left, op, right } => {
                self.line(src_line, level, &format!("{}ArithmeticExpr:", label));
                self.annotate(&ty);
                if let Some(left) = left {
                    self.expr(left, level + 1, "");
                }
                self.line(Some(op.span.line), level + 1, &format!("Operator: {}", op.kind));
                self.expr(right, level + 1, "");
            }
            ExprKind::Relational { left, op, right } => {
                self.line(src_line, level, &format!("{}RelationalExpr:", label));
                self.annotate(&ty);
                self.expr(left, level + 1, "");
                self.line(Some(op.span.line), level + 1, &format!("Operator: {}", op.kind));
                self.expr(right, level + 1, "");
            }
            ExprKind::Equality { left, op, right } => {
                self.line(src_line, level, &format!("{}EqualityExpr:", label));
                self.annotate(&ty);
                self.expr(left, level + 1, "");
                self.line(Some(op.span.line), level + 1, &format!("Operator: {}", op.kind));
                self.expr(right, level + 1, "");
            }
            ExprKind::Logical { left, op, right } => {
                self.line(src_line, level, &format!("{}LogicalExpr:", label));
                self.annotate(&ty);
                if let Some(left) = left {
                    self.expr(left, level + 1, "");
                }
                self.line(Some(op.span.line), level + 1, &format!("Operator: {}", op.kind));
                self.expr(right, level + 1, "");
            }
            ExprKind::Assign { left, right } => {
                self.line(src_line, level, &format!("{}AssignExpr:", label));
                self.annotate(&ty);
                self.expr(left, level + 1, "");
                self.expr(right, level + 1, "");
            }
            ExprKind::ArrayAccess { base, subscript } => {
                self.line(src_line, level, &format!("{}ArrayAccess:", label));
                self.annotate(&ty);
                self.expr(base, level + 1, "");
                self.expr(subscript, level + 1, "(subscript) ");
            }
            ExprKind::FieldAccess { base, field } => {
                self.line(src_line, level, &format!("{}FieldAccess:", label));
                self.annotate(&ty);
                if let Some(base) = base {
                    self.expr(base, level + 1, "");
                }
                self.ident(&field, level + 1);
            }
            ExprKind::Call { base, field, actuals } => {
                self.line(src_line, level, &format!("{}Call:", label));
                self.annotate(&ty);
                if let Some(base) = base {
                    self.expr(base, level + 1, "");
                }
                self.ident(&field, level + 1);
                for actual in actuals {
                    self.expr(actual, level + 1, "(actuals) ");
                }
            }
            ExprKind::New { class } => {
                self.line(src_line, level, &format!("{}NewExpr:", label));
                self.annotate(&ty);
                self.type_node(class, level + 1, "");
            }
            ExprKind::NewArray { size, elem_type } => {
                self.line(src_line, level, &format!("{}NewArrayExpr:", label));
                self.annotate(&ty);
                self.expr(size, level + 1, "");
                self.type_node(elem_type, level + 1, "");
            }
            ExprKind::Postfix { lvalue, op } => {
                self.line(src_line, level, &format!("{}PostfixExpr:", label));
                self.annotate(&ty);
                self.expr(lvalue, level + 1, "");
                self.line(Some(op.span.line), level + 1, &format!("Operator: {}", op.kind));
            }
        }
    }

    fn type_node(&mut self, id: TypeId, level: usize, label: &str) {
        let node = self.ast.type_node(id);
        match node.kind.clone() {
            TypeKind::Primitive(ty) => {
                self.line(None, level, &format!("{}Type: {}", label, ty));
            }
            TypeKind::Named(ident) => {
                self.line(Some(node.span.line), level, &format!("{}NamedType:", label));
                self.ident(&ident, level + 1);
            }
            TypeKind::Array(elem) => {
                self.line(Some(node.span.line), level, &format!("{}ArrayType:", label));
                self.type_node(elem, level + 1, "");
            }
        }
    }
}
