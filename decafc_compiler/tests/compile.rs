//! End-to-end scenarios driving the whole pipeline from source text to
//! assembly (or diagnostics).

use decafc_compiler::{compile, Config, Error, ErrorKind};

fn assemble(source: &str) -> String {
    compile(source, &Config::default()).expect("program should compile")
}
fn diagnostics(source: &str) -> Vec<Error> {
    compile(source, &Config::default()).expect_err("program should be rejected")
}

#[test]
fn hello_world() {
    let asm = assemble("void main() { Print(\"Hello, world\"); }");
    assert!(asm.contains(".globl main"));
    assert!(asm.contains("_string1: .asciiz \"Hello, world\""));
    assert!(asm.contains("jal _PrintString"));
    assert!(asm.lines().any(|l| l == "main:"));
}

#[test]
fn missing_main_emits_nothing() {
    let errors = diagnostics("int f() { return 0; }");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::NoMainFound);
}

#[test]
fn main_signature_must_be_void_and_nullary() {
    let errors = diagnostics("int main() { return 0; }");
    assert_eq!(errors[0].kind, ErrorKind::NoMainFound);
    let errors = diagnostics("void main(int argc) { }");
    assert_eq!(errors[0].kind, ErrorKind::NoMainFound);
}

#[test]
fn override_mismatch_blocks_assembly() {
    let errors = diagnostics(
        "class A { int f(int x) { return x; } }
         class B extends A { int f(string x) { return 0; } }
         void main() { }",
    );
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::OverrideMismatch("f".to_string()));
}

#[test]
fn interface_implementation() {
    // complete implementation is accepted
    assemble(
        "interface I { void g(); }
         class C implements I { void g() { } }
         void main() { }",
    );
    // omitting g is reported
    let errors = diagnostics(
        "interface I { void g(); }
         class C implements I { }
         void main() { }",
    );
    assert_eq!(
        errors[0].kind,
        ErrorKind::InterfaceNotImplemented("C".to_string(), "I".to_string())
    );
}

#[test]
fn array_access_emits_bounds_check() {
    let asm = assemble(
        "void main() {
             int[] a;
             a = NewArray(3, int);
             a[5] = 0;
         }",
    );
    assert!(asm.contains(".asciiz \"Decaf runtime error: Array subscript out of bounds\\n\""));
    assert!(asm.contains(".asciiz \"Decaf runtime error: Array size is <= 0\\n\""));
    assert!(asm.contains("jal _PrintString"));
    assert!(asm.contains("jal _Halt"));
    assert!(asm.contains("jal _Alloc"));
}

#[test]
fn inheritance_dispatch_goes_through_the_vtable() {
    let asm = assemble(
        "class A { void m() { Print(\"A\"); } }
         class B extends A { void m() { Print(\"B\"); } }
         void main() { A x; x = new B(); x.m(); }",
    );
    // the call is indirect
    assert!(asm.contains("jalr $t0"));
    // both vtables exist, and B's slot for m holds the override at the
    // same index A uses (first slot in both)
    let lines: Vec<&str> = asm.lines().map(str::trim).collect();
    let a_table = lines.iter().position(|l| l.starts_with("A:")).unwrap();
    let b_table = lines.iter().position(|l| l.starts_with("B:")).unwrap();
    assert_eq!(lines[a_table + 1], ".word A.m");
    assert_eq!(lines[b_table + 1], ".word B.m");
}

#[test]
fn inherited_method_keeps_parent_slot_and_label() {
    let asm = assemble(
        "class A { void m() { } void n() { } }
         class B extends A { void n() { } }
         void main() { }",
    );
    let lines: Vec<&str> = asm.lines().map(str::trim).collect();
    let b_table = lines.iter().position(|l| l.starts_with("B:")).unwrap();
    // m is inherited (parent's label), n overridden in place at slot 1
    assert_eq!(lines[b_table + 1], ".word A.m");
    assert_eq!(lines[b_table + 2], ".word B.n");
}

#[test]
fn free_functions_are_mangled_with_an_underscore() {
    let asm = assemble("int f() { return 1; } void main() { Print(f()); }");
    assert!(asm.lines().any(|l| l == "_f:"));
    assert!(asm.contains("jal _f"));
    assert!(asm.lines().any(|l| l == "main:"));
}

#[test]
fn tac_listing_mode() {
    let config = Config::new(["tac".to_string()]);
    let tac = compile("void main() { Print(1 + 2); }", &config).unwrap();
    assert!(tac.lines().any(|l| l == "main:"));
    assert!(tac.contains("BeginFunc"));
    assert!(tac.contains("_tmp2 = _tmp0 + _tmp1"));
    assert!(tac.contains("PushParam"));
    assert!(tac.contains("LCall _PrintInt"));
    assert!(tac.contains("PopParams 4"));
    assert!(tac.contains("EndFunc"));
    // no assembly in this mode
    assert!(!tac.contains(".globl"));
}

#[test]
fn pushed_and_popped_param_bytes_balance() {
    let config = Config::new(["tac".to_string()]);
    let tac = compile(
        "class A { int f(int x, int y) { return x + y; } }
         void main() {
             A a;
             a = new A();
             Print(a.f(1, 2), \"done\");
         }",
        &config,
    )
    .unwrap();
    let pushes = tac.lines().filter(|l| l.contains("PushParam")).count() * 4;
    let pops: usize = tac
        .lines()
        .filter_map(|l| l.trim().strip_prefix("PopParams "))
        .map(|n| n.parse::<usize>().unwrap())
        .sum();
    assert_eq!(pushes, pops);
}

#[test]
fn method_call_pushes_receiver_last() {
    let config = Config::new(["tac".to_string()]);
    let tac = compile(
        "class A { int f(int x) { return x; } }
         void main() { A a; a = new A(); Print(a.f(7)); }",
        &config,
    )
    .unwrap();
    // receiver sits at +4 in the callee, so it is pushed after the actuals
    // and the dynamic call pops actuals plus receiver
    assert!(tac.contains("ACall"));
    assert!(tac.contains("PopParams 8"));
}

#[test]
fn while_loop_with_break_jumps_to_the_end_label() {
    let config = Config::new(["tac".to_string()]);
    let tac = compile(
        "void main() { while (true) { break; } Print(0); }",
        &config,
    )
    .unwrap();
    // the break's Goto targets the loop's bottom label
    let break_target = tac
        .lines()
        .filter(|l| l.trim().starts_with("Goto"))
        .nth(0)
        .unwrap()
        .trim()
        .strip_prefix("Goto ")
        .unwrap()
        .to_string();
    assert!(tac.contains(&format!("{}:", break_target)));
}

#[test]
fn double_is_rejected_by_the_back_end() {
    let errors = diagnostics("void main() { double d; }");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::DoubleUnsupported);
}

#[test]
fn interface_dispatch_is_rejected_by_the_back_end() {
    let errors = diagnostics(
        "interface I { void g(); }
         class C implements I { void g() { } }
         void main() { I i; i = new C(); i.g(); }",
    );
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0].kind,
        ErrorKind::InterfaceDispatchUnsupported(name) if name == "g"
    ));
}

#[test]
fn semantic_errors_suppress_all_output() {
    let errors = diagnostics("void main() { undeclared = 1; }");
    assert_eq!(errors.len(), 1);
}

#[test]
fn globals_live_in_the_gp_segment() {
    let asm = assemble("int g; void main() { g = 3; }");
    assert!(asm.contains("0($gp)"));
}

#[test]
fn string_equality_calls_the_runtime() {
    let asm = assemble(
        "void main() { bool b; b = ReadLine() == \"quit\"; }",
    );
    assert!(asm.contains("jal _StringEqual"));
    assert!(asm.contains("jal _ReadLine"));
}
