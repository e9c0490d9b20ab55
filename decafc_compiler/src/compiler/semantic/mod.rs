//! Semantic analysis: symbol-table build plus three checking passes
//!
//! The build pass allocates every scope; the later passes re-enter the
//! same scopes by replaying the shared scope counter, so all four walks
//! must enter and exit scopes in the identical order. Diagnostics are
//! collected and never abort a pass; a rule whose operand type is still
//! unresolved is skipped instead of cascading.

mod build;
mod check_decl;
mod check_inherit;
mod check_type;

use crate::compiler::ast::{Ast, DeclId, DeclKind, ExprId};
use crate::compiler::common::environment::SymbolTable;
use crate::compiler::common::error::{Error, ErrorKind};
use crate::compiler::common::token::Span;
use crate::compiler::common::types::Ty;
use crate::Config;
use std::collections::HashSet;

pub struct Analyzer<'a> {
    ast: &'a mut Ast,
    symtab: SymbolTable,
    errors: Vec<Error>,
    print_symbol_table: bool,
}

impl<'a> Analyzer<'a> {
    pub fn new(ast: &'a mut Ast, config: &Config) -> Self {
        Analyzer {
            ast,
            symtab: SymbolTable::new(config.debug_on("sttrace")),
            errors: Vec::new(),
            print_symbol_table: config.debug_on("st"),
        }
    }

    pub fn check(mut self) -> Result<(), Vec<Error>> {
        self.build_program();
        if self.print_symbol_table {
            self.symtab.print(self.ast);
        }

        self.symtab.reset();
        self.pass_check_decl();
        self.symtab.reset();
        self.pass_check_inherit();
        self.symtab.reset();
        self.pass_check_type();

        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    fn report(&mut self, span: Span, kind: ErrorKind) {
        self.errors.push(Error::new(span, kind));
    }

    fn ty_of_expr(&self, expr: ExprId) -> Option<Ty> {
        self.ast.expr(expr).expr_type.clone()
    }

    /// Declared type of a formal parameter.
    fn formal_ty(&self, decl: DeclId) -> Option<Ty> {
        match &self.ast.decl(decl).kind {
            DeclKind::Var(var) => self.ast.type_of(var.ty),
            _ => None,
        }
    }

    /// `source` may flow into `target`: equivalence, `null` into any
    /// reference type, or a subclass/implementor into its ancestor.
    fn is_compatible(&self, target: &Ty, source: &Ty) -> bool {
        if target == source {
            return true;
        }
        match (target, source) {
            (target, Ty::Null) => target.accepts_null(),
            (Ty::Named(ancestor), Ty::Named(child)) => self.is_child_of(child, ancestor),
            _ => false,
        }
    }

    /// Class `child` equals `ancestor`, extends it transitively, or
    /// implements it (directly or through a parent class).
    fn is_child_of(&self, child: &str, ancestor: &str) -> bool {
        let mut visited = HashSet::new();
        let mut cur = child.to_string();
        loop {
            if cur == ancestor {
                return true;
            }
            if !visited.insert(cur.clone()) {
                return false;
            }
            let Some(decl) = self.symtab.global_lookup(&cur) else {
                return false;
            };
            let DeclKind::Class(class) = self.ast.decl(decl).kind.clone() else {
                return false;
            };
            if class
                .implements
                .iter()
                .any(|i| self.ast.named_type_name(*i) == Some(ancestor))
            {
                return true;
            }
            match class
                .extends
                .and_then(|t| self.ast.named_type_name(t).map(str::to_string))
            {
                Some(parent) => cur = parent,
                None => return false,
            }
        }
    }

    /// Return-type equivalence plus per-position formal-type equivalence.
    /// Positions whose types never resolved are skipped so earlier errors
    /// don't cascade into override mismatches.
    fn fn_signatures_match(&self, a: DeclId, b: DeclId) -> bool {
        let (DeclKind::Fn(fn_a), DeclKind::Fn(fn_b)) =
            (&self.ast.decl(a).kind, &self.ast.decl(b).kind)
        else {
            return false;
        };
        match (self.ast.type_of(fn_a.return_type), self.ast.type_of(fn_b.return_type)) {
            (Some(ret_a), Some(ret_b)) if !ret_a.is_equivalent_to(&ret_b) => return false,
            (None, _) | (_, None) => return true,
            _ => {}
        }
        if fn_a.formals.len() != fn_b.formals.len() {
            return false;
        }
        for (formal_a, formal_b) in fn_a.formals.iter().zip(fn_b.formals.iter()) {
            match (self.formal_ty(*formal_a), self.formal_ty(*formal_b)) {
                (Some(ty_a), Some(ty_b)) if !ty_a.is_equivalent_to(&ty_b) => return false,
                _ => {}
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::common::error::Reason;
    use crate::compiler::parser::Parser;
    use crate::compiler::scanner::Scanner;

    fn setup(input: &str) -> Vec<ErrorKind> {
        let config = Config::default();
        let tokens = Scanner::new(input).scan().unwrap();
        let mut ast = Parser::new(tokens).parse().unwrap();
        ast.link_parents();
        match Analyzer::new(&mut ast, &config).check() {
            Ok(()) => Vec::new(),
            Err(errors) => errors.into_iter().map(|e| e.kind).collect(),
        }
    }

    fn assert_clean(input: &str) {
        assert_eq!(setup(input), Vec::new());
    }

    #[test]
    fn accepts_valid_program() {
        assert_clean(
            "int g;
             class Shape {
                 int area;
                 int getArea() { return area; }
             }
             void main() {
                 Shape s;
                 s = new Shape();
                 g = s.getArea();
             }",
        );
    }

    #[test]
    fn reports_local_decl_conflict() {
        let errors = setup("int a; bool a;");
        assert_eq!(errors, vec![ErrorKind::DeclConflict("a".to_string(), 1)]);
    }

    #[test]
    fn reports_undeclared_identifier() {
        let errors = setup("void main() { x = 1; }");
        assert_eq!(
            errors,
            vec![ErrorKind::NotDeclared("x".to_string(), Reason::Variable)]
        );
    }

    #[test]
    fn reports_undeclared_type_with_reason() {
        let errors = setup("void main() { Shape s; }");
        assert_eq!(
            errors,
            vec![ErrorKind::NotDeclared("Shape".to_string(), Reason::Type)]
        );
    }

    #[test]
    fn extends_requires_a_class() {
        let errors = setup("interface I { } class C extends I { }");
        assert_eq!(
            errors,
            vec![ErrorKind::NotDeclared("I".to_string(), Reason::Class)]
        );
    }

    #[test]
    fn reports_field_override_conflict() {
        let errors = setup("class A { int x; } class B extends A { bool x; }");
        assert!(matches!(errors.as_slice(), [ErrorKind::DeclConflict(name, _)] if name == "x"));
    }

    #[test]
    fn reports_override_mismatch() {
        let errors = setup(
            "class A { int f(int x) { return x; } }
             class B extends A { int f(string x) { return 0; } }",
        );
        assert_eq!(errors, vec![ErrorKind::OverrideMismatch("f".to_string())]);
    }

    #[test]
    fn allows_exact_override() {
        assert_clean(
            "class A { int f(int x) { return x; } }
             class B extends A { int f(int x) { return x + 1; } }
             void main() { }",
        );
    }

    #[test]
    fn reports_missing_interface_method() {
        let errors = setup("interface I { void g(); } class C implements I { }");
        assert_eq!(
            errors,
            vec![ErrorKind::InterfaceNotImplemented(
                "C".to_string(),
                "I".to_string()
            )]
        );
    }

    #[test]
    fn accepts_complete_interface_implementation() {
        assert_clean("interface I { void g(); } class C implements I { void g() { } } void main() { }");
    }

    #[test]
    fn interface_method_inherited_from_parent_counts() {
        assert_clean(
            "interface I { void g(); }
             class A { void g() { } }
             class C extends A implements I { }
             void main() { }",
        );
    }

    #[test]
    fn reports_incompatible_operands() {
        let errors = setup("void main() { int a; a = 1 + true; }");
        assert_eq!(
            errors,
            vec![ErrorKind::IncompatibleOperands(
                "+".to_string(),
                Ty::Int,
                Ty::Bool
            )]
        );
    }

    #[test]
    fn errors_do_not_cascade() {
        // `x` is undeclared; the enclosing operand rules stay silent
        let errors = setup("void main() { int a; a = x + 1 * 2; }");
        assert_eq!(
            errors,
            vec![ErrorKind::NotDeclared("x".to_string(), Reason::Variable)]
        );
    }

    #[test]
    fn relational_requires_matching_numbers() {
        let errors = setup("void main() { bool b; b = 1 < true; }");
        assert_eq!(
            errors,
            vec![ErrorKind::IncompatibleOperands(
                "<".to_string(),
                Ty::Int,
                Ty::Bool
            )]
        );
    }

    #[test]
    fn equality_accepts_subclass_and_null() {
        assert_clean(
            "class A { }
             class B extends A { }
             void main() {
                 A a; B b; bool r;
                 a = new B();
                 r = a == b;
                 r = a == null;
             }",
        );
    }

    #[test]
    fn assignment_compatibility_is_directional() {
        let errors = setup(
            "class A { }
             class B extends A { }
             void main() { B b; b = new A(); }",
        );
        assert_eq!(
            errors,
            vec![ErrorKind::IncompatibleOperands(
                "=".to_string(),
                Ty::Named("B".to_string()),
                Ty::Named("A".to_string())
            )]
        );
    }

    #[test]
    fn null_not_assignable_to_primitive() {
        let errors = setup("void main() { int a; a = null; }");
        assert_eq!(
            errors,
            vec![ErrorKind::IncompatibleOperands(
                "=".to_string(),
                Ty::Int,
                Ty::Null
            )]
        );
    }

    #[test]
    fn array_access_rules() {
        let errors = setup("void main() { int a; int b; b = a[0]; }");
        assert_eq!(errors, vec![ErrorKind::BracketsOnNonArray]);

        let errors = setup("void main() { int[] a; int b; a = NewArray(3, int); b = a[true]; }");
        assert_eq!(errors, vec![ErrorKind::SubscriptNotInteger]);
    }

    #[test]
    fn subscript_error_keeps_element_type() {
        // the bad subscript alone; element type survives so no second error
        let errors = setup("void main() { int[] a; int b; a = NewArray(3, int); b = a[false]; }");
        assert_eq!(errors, vec![ErrorKind::SubscriptNotInteger]);
    }

    #[test]
    fn new_array_size_must_be_integer() {
        let errors = setup("void main() { int[] a; a = NewArray(true, int); }");
        assert_eq!(errors, vec![ErrorKind::NewArraySizeNotInteger]);
    }

    #[test]
    fn this_outside_class_scope() {
        let errors = setup("void main() { this.x = 1; }");
        assert_eq!(errors, vec![ErrorKind::ThisOutsideClass]);
    }

    #[test]
    fn field_access_outside_class_is_inaccessible() {
        let errors = setup(
            "class A { int x; }
             void main() { A a; a = new A(); a.x = 1; }",
        );
        assert_eq!(
            errors,
            vec![ErrorKind::InaccessibleField(
                "x".to_string(),
                Ty::Named("A".to_string())
            )]
        );
    }

    #[test]
    fn field_access_inside_class_scope() {
        assert_clean(
            "class A {
                 int x;
                 int get(A other) { return other.x; }
             }
             void main() { }",
        );
    }

    #[test]
    fn method_call_checks_args() {
        let errors = setup(
            "class A { int f(int x) { return x; } }
             void main() { A a; int r; a = new A(); r = a.f(1, 2); }",
        );
        assert_eq!(
            errors,
            vec![ErrorKind::NumArgsMismatch("f".to_string(), 1, 2)]
        );

        let errors = setup(
            "class A { int f(int x) { return x; } }
             void main() { A a; int r; a = new A(); r = a.f(true); }",
        );
        assert_eq!(errors, vec![ErrorKind::ArgMismatch(1, Ty::Bool, Ty::Int)]);
    }

    #[test]
    fn array_length_takes_no_args() {
        assert_clean(
            "void main() { int[] a; int n; a = NewArray(3, int); n = a.length(); }",
        );
        let errors = setup(
            "void main() { int[] a; int n; a = NewArray(3, int); n = a.length(7); }",
        );
        assert_eq!(
            errors,
            vec![ErrorKind::NumArgsMismatch("length".to_string(), 0, 1)]
        );
    }

    #[test]
    fn control_statement_checks() {
        assert_eq!(
            setup("void main() { if (1) Print(1); }"),
            vec![ErrorKind::TestNotBoolean]
        );
        assert_eq!(
            setup("void main() { while (ReadInteger()) Print(1); }"),
            vec![ErrorKind::TestNotBoolean]
        );
        assert_eq!(
            setup("void main() { break; }"),
            vec![ErrorKind::BreakOutsideLoop]
        );
        assert_clean("void main() { while (true) break; }");
        assert_clean("void main() { switch (1) { case 1: break; } }");
    }

    #[test]
    fn return_type_must_be_compatible() {
        let errors = setup("int f() { return true; } void main() { }");
        assert_eq!(errors, vec![ErrorKind::ReturnMismatch(Ty::Bool, Ty::Int)]);
        assert_clean("int f() { return 3; } void main() { }");
        assert_clean("void f() { return; } void main() { }");
    }

    #[test]
    fn print_args_must_be_printable() {
        let errors = setup("class A { } void main() { A a; a = new A(); Print(1, a); }");
        assert_eq!(
            errors,
            vec![ErrorKind::PrintArgMismatch(2, Ty::Named("A".to_string()))]
        );
    }

    #[test]
    fn postfix_operand_must_be_int() {
        let errors = setup("void main() { bool b; b++; }");
        assert_eq!(
            errors,
            vec![ErrorKind::IncompatibleOperand("++".to_string(), Ty::Bool)]
        );
    }

    #[test]
    fn checking_is_idempotent() {
        let config = Config::default();
        let source = "class A { int x; int f() { return x; } }
                      void main() { A a; a = new A(); Print(a.f()); }";
        let tokens = Scanner::new(source).scan().unwrap();
        let mut ast = Parser::new(tokens).parse().unwrap();
        ast.link_parents();
        assert!(Analyzer::new(&mut ast, &config).check().is_ok());
        // a second full run over the already-annotated tree stays clean
        assert!(Analyzer::new(&mut ast, &config).check().is_ok());
    }

    #[test]
    fn decl_backrefs_set_after_checking() {
        let config = Config::default();
        let source = "int g; void main() { g = 2; }";
        let tokens = Scanner::new(source).scan().unwrap();
        let mut ast = Parser::new(tokens).parse().unwrap();
        ast.link_parents();
        Analyzer::new(&mut ast, &config).check().unwrap();
        for expr in &ast.exprs {
            if let crate::compiler::ast::ExprKind::FieldAccess { field, .. } = &expr.kind {
                assert!(field.decl.is_some(), "use of '{}' was not resolved", field.name);
            }
        }
    }
}
