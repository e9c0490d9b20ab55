//! Pass 3: verify override signatures and interface implementations
//!
//! Only class bodies carry real work here; everything else is walked with
//! the default scope-entering traversal so the shared scope counter stays
//! aligned with the build pass.

use super::Analyzer;
use crate::compiler::ast::{DeclId, DeclKind, StmtId, StmtKind};
use crate::compiler::common::error::ErrorKind;

impl Analyzer<'_> {
    pub(super) fn pass_check_inherit(&mut self) {
        for decl in self.ast.program.clone() {
            self.inherit_decl(decl);
        }
    }

    fn inherit_decl(&mut self, decl: DeclId) {
        match self.ast.decl(decl).kind.clone() {
            DeclKind::Var(_) => {}
            DeclKind::Fn(func) => {
                self.symtab.enter_scope();
                if let Some(body) = func.body {
                    self.inherit_stmt(body);
                }
                self.symtab.exit_scope();
            }
            DeclKind::Class(class) => {
                self.symtab.enter_scope();
                for member in &class.members {
                    self.inherit_member(*member);
                }
                self.check_interfaces_implemented(decl);
                self.symtab.exit_scope();
            }
            DeclKind::Interface(interface) => {
                self.symtab.enter_scope();
                for member in interface.members {
                    self.inherit_decl(member);
                }
                self.symtab.exit_scope();
            }
        }
    }

    fn inherit_member(&mut self, member: DeclId) {
        let name = self.ast.decl_name(member).to_string();
        let span = self.ast.decl(member).span;
        match self.ast.decl(member).kind {
            DeclKind::Var(_) => {
                // inherited fields cannot be overridden, nor may a field
                // collide with an interface method name
                if let Some(found) = self.symtab.lookup_parent(&name) {
                    let line = self.ast.decl(found).span.line;
                    self.report(span, ErrorKind::DeclConflict(name.clone(), line));
                }
                if let Some(found) = self.symtab.lookup_interface(&name) {
                    let line = self.ast.decl(found).span.line;
                    self.report(span, ErrorKind::DeclConflict(name, line));
                }
            }
            DeclKind::Fn(_) => {
                if let Some(found) = self.symtab.lookup_parent(&name) {
                    if !matches!(self.ast.decl(found).kind, DeclKind::Fn(_)) {
                        let line = self.ast.decl(found).span.line;
                        self.report(span, ErrorKind::DeclConflict(name.clone(), line));
                    } else if !self.fn_signatures_match(member, found) {
                        self.report(span, ErrorKind::OverrideMismatch(name.clone()));
                    }
                }
                if let Some(found) = self.symtab.lookup_interface(&name) {
                    if !self.fn_signatures_match(member, found) {
                        self.report(span, ErrorKind::OverrideMismatch(name.clone()));
                    }
                }
                self.inherit_decl(member);
            }
            _ => unreachable!("class members are fields or methods"),
        }
    }

    /// Every method of every implemented interface must be present with an
    /// equivalent signature, directly or inherited. The first missing
    /// method of an interface ends that interface's check; the remaining
    /// interfaces are still verified.
    fn check_interfaces_implemented(&mut self, class: DeclId) {
        let class_name = self.ast.decl_name(class).to_string();
        let class_span = self.ast.decl(class).span;
        let DeclKind::Class(class_kind) = self.ast.decl(class).kind.clone() else {
            unreachable!("caller matched a class");
        };
        for implement in class_kind.implements {
            let Some(interface_name) = self.ast.named_type_name(implement).map(str::to_string)
            else {
                continue;
            };
            let Some(interface_decl) = self.symtab.global_lookup(&interface_name) else {
                continue;
            };
            let DeclKind::Interface(interface) = self.ast.decl(interface_decl).kind.clone() else {
                continue;
            };
            for required in interface.members {
                let method_name = self.ast.decl_name(required).to_string();
                let found = self.symtab.lookup_field(&class_name, &method_name);
                let implemented = match found {
                    Some(found) => {
                        matches!(self.ast.decl(found).kind, DeclKind::Fn(_))
                            && self.fn_signatures_match(required, found)
                    }
                    None => false,
                };
                if !implemented {
                    self.report(
                        class_span,
                        ErrorKind::InterfaceNotImplemented(
                            class_name.clone(),
                            interface_name.clone(),
                        ),
                    );
                    break;
                }
            }
        }
    }

    fn inherit_stmt(&mut self, stmt: StmtId) {
        match self.ast.stmt(stmt).kind.clone() {
            StmtKind::Block { decls, stmts } => {
                self.symtab.enter_scope();
                for decl in decls {
                    self.inherit_decl(decl);
                }
                for stmt in stmts {
                    self.inherit_stmt(stmt);
                }
                self.symtab.exit_scope();
            }
            StmtKind::If { then_body, else_body, .. } => {
                self.symtab.enter_scope();
                self.inherit_stmt(then_body);
                self.symtab.exit_scope();
                if let Some(else_body) = else_body {
                    self.symtab.enter_scope();
                    self.inherit_stmt(else_body);
                    self.symtab.exit_scope();
                }
            }
            StmtKind::While { body, .. } | StmtKind::For { body, .. } => {
                self.symtab.enter_scope();
                self.inherit_stmt(body);
                self.symtab.exit_scope();
            }
            StmtKind::Switch { cases, .. } => {
                self.symtab.enter_scope();
                for case in cases {
                    self.inherit_stmt(case);
                }
                self.symtab.exit_scope();
            }
            StmtKind::Case { stmts, .. } => {
                self.symtab.enter_scope();
                for stmt in stmts {
                    self.inherit_stmt(stmt);
                }
                self.symtab.exit_scope();
            }
            StmtKind::Break
            | StmtKind::Return { .. }
            | StmtKind::Print { .. }
            | StmtKind::Expr(_) => {}
        }
    }
}
