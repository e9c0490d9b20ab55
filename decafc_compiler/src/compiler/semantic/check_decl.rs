//! Pass 2: resolve type names and plain identifier references
//!
//! Declaration back-pointers are set here; expression types that are
//! statically known (constants, declarations, resolved type names) are
//! recorded as well. Field accesses and calls with an explicit base are
//! left for the type-checking pass, which knows the base's class.

use super::Analyzer;
use crate::compiler::ast::{DeclId, DeclKind, ExprId, ExprKind, StmtId, StmtKind, TypeId, TypeKind};
use crate::compiler::common::error::{ErrorKind, Reason};
use crate::compiler::common::types::Ty;

impl Analyzer<'_> {
    pub(super) fn pass_check_decl(&mut self) {
        for decl in self.ast.program.clone() {
            self.check_decl_decl(decl);
        }
    }

    /// Resolves the declaration's own name occurrence.
    fn check_own_ident(&mut self, decl: DeclId) {
        let ident = self.ast.decl(decl).id.clone();
        match self.symtab.lookup(&ident.name) {
            Some(found) => self.ast.decl_mut(decl).id.decl = Some(found),
            None => self.report(ident.span, ErrorKind::NotDeclared(ident.name, Reason::Variable)),
        }
    }

    fn set_field_decl(&mut self, expr: ExprId, target: DeclId) {
        match &mut self.ast.expr_mut(expr).kind {
            ExprKind::FieldAccess { field, .. } | ExprKind::Call { field, .. } => {
                field.decl = Some(target)
            }
            _ => unreachable!("only field accesses and calls carry a field"),
        }
    }

    pub(super) fn check_decl_type(&mut self, ty: TypeId, reason: Reason) {
        match self.ast.type_node(ty).kind.clone() {
            TypeKind::Primitive(primitive) => {
                self.ast.type_mut(ty).expr_type = Some(primitive);
            }
            TypeKind::Named(ident) => {
                let found = self.symtab.lookup(&ident.name);
                let resolved = found.filter(|d| {
                    let is_class = matches!(self.ast.decl(*d).kind, DeclKind::Class(_));
                    let is_interface = matches!(self.ast.decl(*d).kind, DeclKind::Interface(_));
                    match reason {
                        Reason::Class => is_class,
                        Reason::Interface => is_interface,
                        _ => is_class || is_interface,
                    }
                });
                match resolved {
                    Some(decl) => {
                        let node = self.ast.type_mut(ty);
                        if let TypeKind::Named(ident) = &mut node.kind {
                            ident.decl = Some(decl);
                        }
                        node.expr_type = Some(Ty::Named(ident.name));
                    }
                    None => self.report(ident.span, ErrorKind::NotDeclared(ident.name, reason)),
                }
            }
            TypeKind::Array(elem) => {
                self.check_decl_type(elem, Reason::Type);
                if let Some(elem_ty) = self.ast.type_of(elem) {
                    self.ast.type_mut(ty).expr_type = Some(elem_ty.array_of());
                }
            }
        }
    }

    fn check_decl_decl(&mut self, decl: DeclId) {
        match self.ast.decl(decl).kind.clone() {
            DeclKind::Var(var) => {
                self.check_decl_type(var.ty, Reason::Type);
                self.check_own_ident(decl);
                let ty = self.ast.type_of(var.ty);
                self.ast.decl_mut(decl).expr_type = ty;
            }
            DeclKind::Fn(func) => {
                self.check_decl_type(func.return_type, Reason::Type);
                self.check_own_ident(decl);
                self.symtab.enter_scope();
                for formal in func.formals {
                    self.check_decl_decl(formal);
                }
                if let Some(body) = func.body {
                    self.check_decl_stmt(body);
                }
                self.symtab.exit_scope();
                let ty = self.ast.type_of(func.return_type);
                self.ast.decl_mut(decl).expr_type = ty;
            }
            DeclKind::Class(class) => {
                self.check_own_ident(decl);
                if let Some(extends) = class.extends {
                    self.check_decl_type(extends, Reason::Class);
                }
                for implement in class.implements {
                    self.check_decl_type(implement, Reason::Interface);
                }
                self.symtab.enter_scope();
                for member in class.members {
                    self.check_decl_decl(member);
                }
                self.symtab.exit_scope();
                let name = self.ast.decl_name(decl).to_string();
                self.ast.decl_mut(decl).expr_type = Some(Ty::Named(name));
            }
            DeclKind::Interface(interface) => {
                let name = self.ast.decl_name(decl).to_string();
                self.ast.decl_mut(decl).expr_type = Some(Ty::Named(name));
                self.check_own_ident(decl);
                self.symtab.enter_scope();
                for member in interface.members {
                    self.check_decl_decl(member);
                }
                self.symtab.exit_scope();
            }
        }
    }

    fn check_decl_stmt(&mut self, stmt: StmtId) {
        match self.ast.stmt(stmt).kind.clone() {
            StmtKind::Block { decls, stmts } => {
                self.symtab.enter_scope();
                for decl in decls {
                    self.check_decl_decl(decl);
                }
                for stmt in stmts {
                    self.check_decl_stmt(stmt);
                }
                self.symtab.exit_scope();
            }
            StmtKind::If { test, then_body, else_body } => {
                self.check_decl_expr(test);
                self.symtab.enter_scope();
                self.check_decl_stmt(then_body);
                self.symtab.exit_scope();
                if let Some(else_body) = else_body {
                    self.symtab.enter_scope();
                    self.check_decl_stmt(else_body);
                    self.symtab.exit_scope();
                }
            }
            StmtKind::While { test, body } => {
                self.check_decl_expr(test);
                self.symtab.enter_scope();
                self.check_decl_stmt(body);
                self.symtab.exit_scope();
            }
            StmtKind::For { init, test, step, body } => {
                self.check_decl_expr(init);
                self.check_decl_expr(test);
                self.check_decl_expr(step);
                self.symtab.enter_scope();
                self.check_decl_stmt(body);
                self.symtab.exit_scope();
            }
            StmtKind::Switch { expr, cases } => {
                self.check_decl_expr(expr);
                self.symtab.enter_scope();
                for case in cases {
                    self.check_decl_stmt(case);
                }
                self.symtab.exit_scope();
            }
            StmtKind::Case { stmts, .. } => {
                self.symtab.enter_scope();
                for stmt in stmts {
                    self.check_decl_stmt(stmt);
                }
                self.symtab.exit_scope();
            }
            StmtKind::Break => {}
            StmtKind::Return { expr } => self.check_decl_expr(expr),
            StmtKind::Print { args } => {
                for arg in args {
                    self.check_decl_expr(arg);
                }
            }
            StmtKind::Expr(expr) => self.check_decl_expr(expr),
        }
    }

    fn check_decl_expr(&mut self, expr: ExprId) {
        match self.ast.expr(expr).kind.clone() {
            ExprKind::Empty => {}
            ExprKind::IntConstant(_) => self.ast.expr_mut(expr).expr_type = Some(Ty::Int),
            ExprKind::DoubleConstant(_) => self.ast.expr_mut(expr).expr_type = Some(Ty::Double),
            ExprKind::BoolConstant(_) => self.ast.expr_mut(expr).expr_type = Some(Ty::Bool),
            ExprKind::StringConstant(_) => self.ast.expr_mut(expr).expr_type = Some(Ty::String),
            ExprKind::NullConstant => self.ast.expr_mut(expr).expr_type = Some(Ty::Null),
            // legality of `this` is established by the type-checking pass
            ExprKind::This | ExprKind::ReadInteger | ExprKind::ReadLine => {}
            ExprKind::FieldAccess { base: None, field } => {
                match self.symtab.lookup(&field.name) {
                    Some(found) => self.set_field_decl(expr, found),
                    None => self.report(
                        field.span,
                        ErrorKind::NotDeclared(field.name, Reason::Variable),
                    ),
                }
            }
            ExprKind::FieldAccess { base: Some(base), .. } => {
                // resolution against the base's class happens in pass 4
                self.check_decl_expr(base);
            }
            ExprKind::Call { base: None, field, actuals } => {
                match self.symtab.lookup(&field.name) {
                    Some(found) if matches!(self.ast.decl(found).kind, DeclKind::Fn(_)) => {
                        self.set_field_decl(expr, found);
                        // stays unset if the callee is declared further down;
                        // pass 4 fills it in
                        let ty = self.ast.decl(found).expr_type.clone();
                        self.ast.expr_mut(expr).expr_type = ty;
                    }
                    _ => self.report(
                        field.span,
                        ErrorKind::NotDeclared(field.name, Reason::Function),
                    ),
                }
                for actual in actuals {
                    self.check_decl_expr(actual);
                }
            }
            ExprKind::Call { base: Some(base), actuals, .. } => {
                self.check_decl_expr(base);
                for actual in actuals {
                    self.check_decl_expr(actual);
                }
            }
            ExprKind::New { class } => self.check_decl_type(class, Reason::Class),
            ExprKind::NewArray { size, elem_type } => {
                self.check_decl_expr(size);
                self.check_decl_type(elem_type, Reason::Type);
            }
            ExprKind::Arithmetic { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                if let Some(left) = left {
                    self.check_decl_expr(left);
                }
                self.check_decl_expr(right);
            }
            ExprKind::Relational { left, right, .. }
            | ExprKind::Equality { left, right, .. }
            | ExprKind::Assign { left, right } => {
                self.check_decl_expr(left);
                self.check_decl_expr(right);
            }
            ExprKind::ArrayAccess { base, subscript } => {
                self.check_decl_expr(base);
                self.check_decl_expr(subscript);
            }
            ExprKind::Postfix { lvalue, .. } => self.check_decl_expr(lvalue),
        }
    }
}
