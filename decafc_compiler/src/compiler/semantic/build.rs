//! Pass 1: allocate every scope and insert every declaration

use super::Analyzer;
use crate::compiler::ast::{DeclId, DeclKind, StmtId, StmtKind};
use crate::compiler::common::error::ErrorKind;

impl Analyzer<'_> {
    pub(super) fn build_program(&mut self) {
        for decl in self.ast.program.clone() {
            self.build_decl(decl);
        }
    }

    /// Inserts the declaration into the current scope, flagging a conflict
    /// when the name is already taken there. The conflicting declaration
    /// keeps no symbol index.
    fn declare(&mut self, decl: DeclId) {
        let name = self.ast.decl_name(decl).to_string();
        if let Some(previous) = self.symtab.local_lookup(&name) {
            let previous_line = self.ast.decl(previous).span.line;
            self.report(
                self.ast.decl(decl).span,
                ErrorKind::DeclConflict(name, previous_line),
            );
        } else {
            let idx = self.symtab.insert(&name, decl);
            let node = self.ast.decl_mut(decl);
            node.idx = Some(idx);
            node.id.decl = Some(decl);
        }
    }

    fn build_decl(&mut self, decl: DeclId) {
        self.declare(decl);
        match self.ast.decl(decl).kind.clone() {
            DeclKind::Var(_) => {}
            DeclKind::Fn(func) => {
                self.symtab.build_scope();
                for formal in func.formals {
                    self.build_decl(formal);
                }
                if let Some(body) = func.body {
                    self.build_stmt(body);
                }
                self.symtab.exit_scope();
            }
            DeclKind::Class(class) => {
                let name = self.ast.decl_name(decl).to_string();
                self.symtab.build_scope_owned(&name);
                if let Some(extends) = class.extends {
                    if let Some(parent) = self.ast.named_type_name(extends) {
                        let parent = parent.to_string();
                        self.symtab.set_parent(&parent);
                    }
                }
                for implement in class.implements {
                    if let Some(interface) = self.ast.named_type_name(implement) {
                        let interface = interface.to_string();
                        self.symtab.add_interface(&interface);
                    }
                }
                for member in class.members {
                    self.build_decl(member);
                }
                self.symtab.exit_scope();
            }
            DeclKind::Interface(interface) => {
                let name = self.ast.decl_name(decl).to_string();
                self.symtab.build_scope_owned(&name);
                for member in interface.members {
                    self.build_decl(member);
                }
                self.symtab.exit_scope();
            }
        }
    }

    fn build_stmt(&mut self, stmt: StmtId) {
        match self.ast.stmt(stmt).kind.clone() {
            StmtKind::Block { decls, stmts } => {
                self.symtab.build_scope();
                for decl in decls {
                    self.build_decl(decl);
                }
                for stmt in stmts {
                    self.build_stmt(stmt);
                }
                self.symtab.exit_scope();
            }
            StmtKind::If { then_body, else_body, .. } => {
                self.symtab.build_scope();
                self.build_stmt(then_body);
                self.symtab.exit_scope();
                if let Some(else_body) = else_body {
                    self.symtab.build_scope();
                    self.build_stmt(else_body);
                    self.symtab.exit_scope();
                }
            }
            StmtKind::While { body, .. } | StmtKind::For { body, .. } => {
                self.symtab.build_scope();
                self.build_stmt(body);
                self.symtab.exit_scope();
            }
            StmtKind::Switch { cases, .. } => {
                self.symtab.build_scope();
                for case in cases {
                    self.build_stmt(case);
                }
                self.symtab.exit_scope();
            }
            StmtKind::Case { stmts, .. } => {
                self.symtab.build_scope();
                for stmt in stmts {
                    self.build_stmt(stmt);
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
