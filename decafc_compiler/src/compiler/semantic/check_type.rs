//! Pass 4: compute expression types and check operand compatibility
//!
//! A rule whose operand type is still unresolved stays silent; the
//! earlier pass already reported the cause and `None` simply propagates
//! upward.

use super::Analyzer;
use crate::compiler::ast::{DeclId, DeclKind, ExprId, ExprKind, NodeRef, StmtId, StmtKind};
use crate::compiler::common::error::{ErrorKind, Reason};
use crate::compiler::common::token::Span;
use crate::compiler::common::types::Ty;

impl Analyzer<'_> {
    pub(super) fn pass_check_type(&mut self) {
        for decl in self.ast.program.clone() {
            self.type_decl(decl);
        }
    }

    fn type_decl(&mut self, decl: DeclId) {
        match self.ast.decl(decl).kind.clone() {
            DeclKind::Var(_) => {}
            DeclKind::Fn(func) => {
                self.symtab.enter_scope();
                for formal in func.formals {
                    self.type_decl(formal);
                }
                if let Some(body) = func.body {
                    self.type_stmt(body);
                }
                self.symtab.exit_scope();
            }
            DeclKind::Class(class) => {
                self.symtab.enter_scope();
                for member in class.members {
                    self.type_decl(member);
                }
                self.symtab.exit_scope();
            }
            DeclKind::Interface(interface) => {
                self.symtab.enter_scope();
                for member in interface.members {
                    self.type_decl(member);
                }
                self.symtab.exit_scope();
            }
        }
    }

    fn type_stmt(&mut self, stmt: StmtId) {
        match self.ast.stmt(stmt).kind.clone() {
            StmtKind::Block { decls, stmts } => {
                self.symtab.enter_scope();
                for decl in decls {
                    self.type_decl(decl);
                }
                for stmt in stmts {
                    self.type_stmt(stmt);
                }
                self.symtab.exit_scope();
            }
            StmtKind::If { test, then_body, else_body } => {
                self.check_test(test);
                self.symtab.enter_scope();
                self.type_stmt(then_body);
                self.symtab.exit_scope();
                if let Some(else_body) = else_body {
                    self.symtab.enter_scope();
                    self.type_stmt(else_body);
                    self.symtab.exit_scope();
                }
            }
            StmtKind::While { test, body } => {
                self.check_test(test);
                self.symtab.enter_scope();
                self.type_stmt(body);
                self.symtab.exit_scope();
            }
            StmtKind::For { init, test, step, body } => {
                self.type_expr(init);
                self.check_test(test);
                self.type_expr(step);
                self.symtab.enter_scope();
                self.type_stmt(body);
                self.symtab.exit_scope();
            }
            StmtKind::Switch { expr, cases } => {
                self.type_expr(expr);
                self.symtab.enter_scope();
                for case in cases {
                    self.type_stmt(case);
                }
                self.symtab.exit_scope();
            }
            StmtKind::Case { stmts, .. } => {
                self.symtab.enter_scope();
                for stmt in stmts {
                    self.type_stmt(stmt);
                }
                self.symtab.exit_scope();
            }
            StmtKind::Break => self.check_break(stmt),
            StmtKind::Return { expr } => {
                self.type_expr(expr);
                self.check_return(stmt, expr);
            }
            StmtKind::Print { args } => {
                for (i, arg) in args.into_iter().enumerate() {
                    self.type_expr(arg);
                    if let Some(ty) = self.ty_of_expr(arg) {
                        if !matches!(ty, Ty::Int | Ty::Bool | Ty::String) {
                            self.report(
                                self.ast.expr(arg).span,
                                ErrorKind::PrintArgMismatch(i + 1, ty),
                            );
                        }
                    }
                }
            }
            StmtKind::Expr(expr) => self.type_expr(expr),
        }
    }

    fn check_test(&mut self, test: ExprId) {
        self.type_expr(test);
        if let Some(ty) = self.ty_of_expr(test) {
            if ty != Ty::Bool {
                self.report(self.ast.expr(test).span, ErrorKind::TestNotBoolean);
            }
        }
    }

    /// `break` must sit inside a loop body or a switch case.
    fn check_break(&mut self, stmt: StmtId) {
        let mut cur = self.ast.stmt(stmt).parent;
        while let Some(NodeRef::Stmt(parent)) = cur {
            match self.ast.stmt(parent).kind {
                StmtKind::While { .. } | StmtKind::For { .. } | StmtKind::Case { .. } => return,
                _ => cur = self.ast.stmt(parent).parent,
            }
        }
        self.report(self.ast.stmt(stmt).span, ErrorKind::BreakOutsideLoop);
    }

    fn check_return(&mut self, stmt: StmtId, expr: ExprId) {
        let Some(func) = self.ast.enclosing_fn(stmt) else {
            return;
        };
        let expected = self.ast.decl(func).expr_type.clone();
        let given = self.ty_of_expr(expr);
        if let (Some(expected), Some(given)) = (expected, given) {
            if !self.is_compatible(&expected, &given) {
                self.report(
                    self.ast.expr(expr).span,
                    ErrorKind::ReturnMismatch(given, expected),
                );
            }
        }
    }

    fn set_expr_ty(&mut self, expr: ExprId, ty: Ty) {
        self.ast.expr_mut(expr).expr_type = Some(ty);
    }

    fn type_expr(&mut self, expr: ExprId) {
        match self.ast.expr(expr).kind.clone() {
            ExprKind::Empty => self.set_expr_ty(expr, Ty::Void),
            ExprKind::IntConstant(_)
            | ExprKind::DoubleConstant(_)
            | ExprKind::BoolConstant(_)
            | ExprKind::StringConstant(_)
            | ExprKind::NullConstant => {} // typed in the binding pass
            ExprKind::ReadInteger => self.set_expr_ty(expr, Ty::Int),
            ExprKind::ReadLine => self.set_expr_ty(expr, Ty::String),
            ExprKind::This => match self.symtab.lookup_this() {
                Some(class) if matches!(self.ast.decl(class).kind, DeclKind::Class(_)) => {
                    let name = self.ast.decl_name(class).to_string();
                    self.set_expr_ty(expr, Ty::Named(name));
                }
                _ => self.report(self.ast.expr(expr).span, ErrorKind::ThisOutsideClass),
            },
            ExprKind::Arithmetic { left, op, right } => {
                if let Some(left) = left {
                    self.type_expr(left);
                }
                self.type_expr(right);
                let right_ty = self.ty_of_expr(right);
                match left {
                    None => match right_ty {
                        None => {}
                        Some(Ty::Int) => self.set_expr_ty(expr, Ty::Int),
                        Some(Ty::Double) => self.set_expr_ty(expr, Ty::Double),
                        Some(ty) => self.report(
                            op.span,
                            ErrorKind::IncompatibleOperand(op.kind.to_string(), ty),
                        ),
                    },
                    Some(left) => match (self.ty_of_expr(left), right_ty) {
                        (None, _) | (_, None) => {}
                        (Some(Ty::Int), Some(Ty::Int)) => self.set_expr_ty(expr, Ty::Int),
                        (Some(Ty::Double), Some(Ty::Double)) => {
                            self.set_expr_ty(expr, Ty::Double)
                        }
                        (Some(left_ty), Some(right_ty)) => self.report(
                            op.span,
                            ErrorKind::IncompatibleOperands(
                                op.kind.to_string(),
                                left_ty,
                                right_ty,
                            ),
                        ),
                    },
                }
            }
            ExprKind::Relational { left, op, right } => {
                self.type_expr(left);
                self.type_expr(right);
                self.set_expr_ty(expr, Ty::Bool);
                if let (Some(left_ty), Some(right_ty)) =
                    (self.ty_of_expr(left), self.ty_of_expr(right))
                {
                    let both_int = left_ty == Ty::Int && right_ty == Ty::Int;
                    let both_double = left_ty == Ty::Double && right_ty == Ty::Double;
                    if !both_int && !both_double {
                        self.report(
                            op.span,
                            ErrorKind::IncompatibleOperands(
                                op.kind.to_string(),
                                left_ty,
                                right_ty,
                            ),
                        );
                    }
                }
            }
            ExprKind::Equality { left, op, right } => {
                self.type_expr(left);
                self.type_expr(right);
                self.set_expr_ty(expr, Ty::Bool);
                if let (Some(left_ty), Some(right_ty)) =
                    (self.ty_of_expr(left), self.ty_of_expr(right))
                {
                    if !self.is_compatible(&left_ty, &right_ty)
                        && !self.is_compatible(&right_ty, &left_ty)
                    {
                        self.report(
                            op.span,
                            ErrorKind::IncompatibleOperands(
                                op.kind.to_string(),
                                left_ty,
                                right_ty,
                            ),
                        );
                    }
                }
            }
            ExprKind::Logical { left, op, right } => {
                if let Some(left) = left {
                    self.type_expr(left);
                }
                self.type_expr(right);
                self.set_expr_ty(expr, Ty::Bool);
                match left {
                    None => {
                        if let Some(ty) = self.ty_of_expr(right) {
                            if ty != Ty::Bool {
                                self.report(
                                    op.span,
                                    ErrorKind::IncompatibleOperand(op.kind.to_string(), ty),
                                );
                            }
                        }
                    }
                    Some(left) => {
                        if let (Some(left_ty), Some(right_ty)) =
                            (self.ty_of_expr(left), self.ty_of_expr(right))
                        {
                            if left_ty != Ty::Bool || right_ty != Ty::Bool {
                                self.report(
                                    op.span,
                                    ErrorKind::IncompatibleOperands(
                                        op.kind.to_string(),
                                        left_ty,
                                        right_ty,
                                    ),
                                );
                            }
                        }
                    }
                }
            }
            ExprKind::Assign { left, right } => {
                self.type_expr(left);
                self.type_expr(right);
                if let (Some(left_ty), Some(right_ty)) =
                    (self.ty_of_expr(left), self.ty_of_expr(right))
                {
                    if !self.is_compatible(&left_ty, &right_ty) {
                        self.report(
                            self.ast.expr(expr).span,
                            ErrorKind::IncompatibleOperands("=".to_string(), left_ty, right_ty),
                        );
                    }
                }
            }
            ExprKind::ArrayAccess { base, subscript } => {
                self.type_expr(subscript);
                if let Some(ty) = self.ty_of_expr(subscript) {
                    if ty != Ty::Int {
                        self.report(
                            self.ast.expr(subscript).span,
                            ErrorKind::SubscriptNotInteger,
                        );
                    }
                }
                self.type_expr(base);
                // a bad subscript alone doesn't suppress the element type
                match self.ty_of_expr(base) {
                    None => {}
                    Some(Ty::Array(elem)) => self.set_expr_ty(expr, *elem),
                    Some(_) => {
                        self.report(self.ast.expr(base).span, ErrorKind::BracketsOnNonArray)
                    }
                }
            }
            ExprKind::FieldAccess { base: None, field } => {
                let Some(decl) = field.decl else {
                    return; // unresolved, already reported
                };
                if matches!(self.ast.decl(decl).kind, DeclKind::Var(_)) {
                    let ty = self.ast.decl(decl).expr_type.clone();
                    self.ast.expr_mut(expr).expr_type = ty;
                } else {
                    self.report(
                        field.span,
                        ErrorKind::NotDeclared(field.name, Reason::Variable),
                    );
                }
            }
            ExprKind::FieldAccess { base: Some(base), field } => {
                self.type_expr(base);
                self.check_based_field_access(expr, base, field.name, field.span);
            }
            ExprKind::Call { base: None, field, actuals } => {
                if let Some(callee) = field.decl {
                    if self.ast.expr(expr).expr_type.is_none() {
                        // the callee was declared further down in the file
                        let ty = self.ast.decl(callee).expr_type.clone();
                        self.ast.expr_mut(expr).expr_type = ty;
                    }
                }
                for actual in &actuals {
                    self.type_expr(*actual);
                }
                self.check_call_args(field.decl, &field.name, field.span, &actuals);
            }
            ExprKind::Call { base: Some(base), field, actuals } => {
                self.type_expr(base);
                let mut callee = field.decl;
                match self.ty_of_expr(base) {
                    None => {}
                    Some(base_ty) if base_ty.is_array() && field.name == "length" => {
                        if !actuals.is_empty() {
                            self.report(
                                field.span,
                                ErrorKind::NumArgsMismatch(
                                    "length".to_string(),
                                    0,
                                    actuals.len(),
                                ),
                            );
                        }
                        self.set_expr_ty(expr, Ty::Int);
                    }
                    Some(base_ty) => match base_ty.named() {
                        None => self.report(
                            field.span,
                            ErrorKind::FieldNotFound(field.name.clone(), base_ty.clone()),
                        ),
                        Some(class_name) => {
                            let found = self.symtab.lookup_field(class_name, &field.name);
                            match found {
                                Some(found)
                                    if matches!(self.ast.decl(found).kind, DeclKind::Fn(_)) =>
                                {
                                    self.set_call_decl(expr, found);
                                    callee = Some(found);
                                    let ty = self.ast.decl(found).expr_type.clone();
                                    self.ast.expr_mut(expr).expr_type = ty;
                                }
                                _ => self.report(
                                    field.span,
                                    ErrorKind::FieldNotFound(
                                        field.name.clone(),
                                        base_ty.clone(),
                                    ),
                                ),
                            }
                        }
                    },
                }
                for actual in &actuals {
                    self.type_expr(*actual);
                }
                self.check_call_args(callee, &field.name, field.span, &actuals);
            }
            ExprKind::New { class } => {
                if let Some(ty) = self.ast.type_of(class) {
                    self.set_expr_ty(expr, ty);
                }
            }
            ExprKind::NewArray { size, elem_type } => {
                self.type_expr(size);
                if let Some(ty) = self.ty_of_expr(size) {
                    if ty != Ty::Int {
                        self.report(
                            self.ast.expr(size).span,
                            ErrorKind::NewArraySizeNotInteger,
                        );
                    }
                }
                // a bad size doesn't suppress the array type
                if let Some(elem) = self.ast.type_of(elem_type) {
                    self.set_expr_ty(expr, elem.array_of());
                }
            }
            ExprKind::Postfix { lvalue, op } => {
                self.type_expr(lvalue);
                match self.ty_of_expr(lvalue) {
                    None => {}
                    Some(Ty::Int) => self.set_expr_ty(expr, Ty::Int),
                    Some(ty) => self.report(
                        op.span,
                        ErrorKind::IncompatibleOperand(op.kind.to_string(), ty),
                    ),
                }
            }
        }
    }

    fn set_call_decl(&mut self, expr: ExprId, target: DeclId) {
        match &mut self.ast.expr_mut(expr).kind {
            ExprKind::Call { field, .. } | ExprKind::FieldAccess { field, .. } => {
                field.decl = Some(target)
            }
            _ => unreachable!("only calls and field accesses carry a field"),
        }
    }

    /// Field access through an explicit base. Members are only reachable
    /// from inside a class whose type is compatible with the base's, and
    /// the member is then resolved against the current class so a subclass
    /// sees its own view of the field.
    fn check_based_field_access(
        &mut self,
        expr: ExprId,
        base: ExprId,
        field_name: String,
        field_span: Span,
    ) {
        let Some(base_ty) = self.ty_of_expr(base) else {
            return;
        };
        let Some(base_class) = base_ty.named().map(str::to_string) else {
            self.report(field_span, ErrorKind::FieldNotFound(field_name, base_ty));
            return;
        };
        let found = self.symtab.lookup_field(&base_class, &field_name);
        if !matches!(found, Some(d) if matches!(self.ast.decl(d).kind, DeclKind::Var(_))) {
            self.report(field_span, ErrorKind::FieldNotFound(field_name, base_ty));
            return;
        }
        let current = self.symtab.lookup_this();
        let Some(current) =
            current.filter(|d| matches!(self.ast.decl(*d).kind, DeclKind::Class(_)))
        else {
            self.report(field_span, ErrorKind::InaccessibleField(field_name, base_ty));
            return;
        };
        let current_name = self.ast.decl_name(current).to_string();
        let current_ty = Ty::Named(current_name.clone());
        let own_view = self.symtab.lookup_field(&current_name, &field_name);
        let Some(own_view) =
            own_view.filter(|d| matches!(self.ast.decl(*d).kind, DeclKind::Var(_)))
        else {
            self.report(field_span, ErrorKind::FieldNotFound(field_name, current_ty));
            return;
        };
        if self.is_compatible(&current_ty, &base_ty) || self.is_compatible(&base_ty, &current_ty) {
            self.set_call_decl(expr, own_view);
            let ty = self.ast.decl(own_view).expr_type.clone();
            self.ast.expr_mut(expr).expr_type = ty;
        } else {
            self.report(field_span, ErrorKind::InaccessibleField(field_name, base_ty));
        }
    }

    /// Arity and per-argument compatibility against the callee's formals.
    fn check_call_args(
        &mut self,
        callee: Option<DeclId>,
        name: &str,
        span: Span,
        actuals: &[ExprId],
    ) {
        let Some(callee) = callee else { return };
        let DeclKind::Fn(func) = self.ast.decl(callee).kind.clone() else {
            return;
        };
        if actuals.len() != func.formals.len() {
            self.report(
                span,
                ErrorKind::NumArgsMismatch(name.to_string(), func.formals.len(), actuals.len()),
            );
            return;
        }
        for (i, (actual, formal)) in actuals.iter().zip(func.formals.iter()).enumerate() {
            let given = self.ty_of_expr(*actual);
            let expected = self.formal_ty(*formal);
            if let (Some(given), Some(expected)) = (given, expected) {
                if !self.is_compatible(&expected, &given) {
                    self.report(
                        self.ast.expr(*actual).span,
                        ErrorKind::ArgMismatch(i + 1, given, expected),
                    );
                }
            }
        }
    }
}
