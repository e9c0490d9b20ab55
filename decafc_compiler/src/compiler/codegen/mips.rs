//! Deterministic TAC→MIPS translation
//!
//! Three fixed scratch registers; every operand is filled from memory and
//! every result spilled straight back, so no register is live across
//! instructions. Labels are flush left, everything else gets a tab;
//! spill/fill lines carry a trailing comment naming the variable.

use super::tac::{BinOp, Location, Segment, Tac};
use std::fmt::Write;

const RS: &str = "$t0";
const RT: &str = "$t1";
const RD: &str = "$t2";

pub struct Mips {
    output: String,
    string_count: usize,
}

impl Mips {
    pub fn new() -> Mips {
        Mips {
            output: String::new(),
            string_count: 0,
        }
    }

    pub fn translate(mut self, code: &[Tac]) -> String {
        self.emit_preamble();
        for instr in code {
            self.emit_instr(instr);
        }
        self.output
    }

    fn emit(&mut self, text: &str) {
        if text.ends_with(':') {
            writeln!(self.output, "{}", text).expect("writing to a string");
        } else {
            writeln!(self.output, "\t{}", text).expect("writing to a string");
        }
    }

    fn emit_preamble(&mut self) {
        self.emit("# standard Decaf preamble");
        self.emit(".text");
        self.emit(".align 2");
        self.emit(".globl main");
    }

    fn base_reg(location: &Location) -> &'static str {
        match location.segment {
            Segment::FpRelative => "$fp",
            Segment::GpRelative => "$gp",
        }
    }

    /// Loads a variable from its home slot into a register.
    fn fill(&mut self, src: &Location, reg: &str) {
        let base = Self::base_reg(src);
        self.emit(&format!(
            "lw {}, {}({})\t# fill {} to {} from {}{:+}",
            reg, src.offset, base, src.name, reg, base, src.offset
        ));
    }

    /// Stores a register back into a variable's home slot.
    fn spill(&mut self, dst: &Location, reg: &str) {
        let base = Self::base_reg(dst);
        self.emit(&format!(
            "sw {}, {}({})\t# spill {} from {} to {}{:+}",
            reg, dst.offset, base, dst.name, reg, base, dst.offset
        ));
    }

    fn emit_instr(&mut self, instr: &Tac) {
        match instr {
            Tac::LoadConstant(dst, value) => {
                self.emit(&format!("li {}, {}\t\t# load constant value {}", RD, value, value));
                self.spill(dst, RD);
            }
            Tac::LoadStringConstant(dst, string) => {
                self.string_count += 1;
                let label = format!("_string{}", self.string_count);
                self.emit(".data\t\t\t# create string constant marked with label");
                self.emit(&format!("{}: .asciiz {}", label, string));
                self.emit(".text");
                self.emit(&format!("la {}, {}\t# load label", RD, label));
                self.spill(dst, RD);
            }
            Tac::LoadLabel(dst, label) => {
                self.emit(&format!("la {}, {}\t# load label", RD, label));
                self.spill(dst, RD);
            }
            Tac::Assign(dst, src) => {
                self.fill(src, RD);
                self.spill(dst, RD);
            }
            Tac::Load(dst, reference, offset) => {
                self.fill(reference, RS);
                self.emit(&format!("lw {}, {}({})\t# load with offset", RD, offset, RS));
                self.spill(dst, RD);
            }
            Tac::Store(reference, value, offset) => {
                self.fill(value, RS);
                self.fill(reference, RD);
                self.emit(&format!("sw {}, {}({})\t# store with offset", RS, offset, RD));
            }
            Tac::BinaryOp(op, dst, left, right) => {
                self.fill(left, RS);
                self.fill(right, RT);
                self.emit(&format!("{} {}, {}, {}", op.mips_name(), RD, RS, RT));
                self.spill(dst, RD);
            }
            Tac::Label(label) => self.emit(&format!("{}:", label)),
            Tac::Goto(label) => self.emit(&format!("b {}\t\t# unconditional branch", label)),
            Tac::IfZ(test, label) => {
                self.fill(test, RS);
                self.emit(&format!(
                    "beqz {}, {}\t# branch if {} is zero",
                    RS, label, test.name
                ));
            }
            Tac::BeginFunc(frame_size) => {
                self.emit("subu $sp, $sp, 8\t# decrement sp to make space to save ra, fp");
                self.emit("sw $fp, 8($sp)\t# save fp");
                self.emit("sw $ra, 4($sp)\t# save ra");
                self.emit("addiu $fp, $sp, 8\t# set up new fp");
                if *frame_size != 0 {
                    self.emit(&format!(
                        "subu $sp, $sp, {}\t# decrement sp to make space for locals/temps",
                        frame_size
                    ));
                }
            }
            Tac::EndFunc => {
                self.emit("# (below handles reaching end of fn body with no explicit return)");
                self.emit_return(&None);
            }
            Tac::Return(value) => self.emit_return(value),
            Tac::PushParam(param) => {
                self.emit("subu $sp, $sp, 4\t# decrement sp to make space for param");
                self.fill(param, RS);
                self.emit(&format!("sw {}, 4($sp)\t# copy param value to stack", RS));
            }
            Tac::PopParams(bytes) => {
                self.emit(&format!("add $sp, $sp, {}\t# pop params off stack", bytes));
            }
            Tac::LCall(label, dst) => {
                self.emit(&format!("jal {}\t\t# jump to function", label));
                self.emit_call_result(dst);
            }
            Tac::ACall(address, dst) => {
                self.fill(address, RS);
                self.emit(&format!("jalr {}\t\t# jump to function", RS));
                self.emit_call_result(dst);
            }
            Tac::VTable(class, methods) => {
                self.emit(".data");
                self.emit(".align 2");
                self.emit(&format!("{}:\t\t# label for class {} vtable", class, class));
                for method in methods {
                    self.emit(&format!(".word {}", method));
                }
                self.emit(".text");
            }
        }
    }

    fn emit_call_result(&mut self, dst: &Option<std::rc::Rc<Location>>) {
        if let Some(dst) = dst {
            self.emit(&format!(
                "move {}, $v0\t\t# copy function return value from $v0",
                RD
            ));
            self.spill(dst, RD);
        }
    }

    fn emit_return(&mut self, value: &Option<std::rc::Rc<Location>>) {
        if let Some(value) = value {
            self.fill(value, RD);
            self.emit(&format!("move $v0, {}\t\t# assign return value into $v0", RD));
        }
        self.emit("move $sp, $fp\t\t# pop callee frame off stack");
        self.emit("lw $ra, -4($fp)\t# restore saved ra");
        self.emit("lw $fp, 0($fp)\t# restore saved fp");
        self.emit("jr $ra\t\t# return from function");
    }
}

impl Default for Mips {
    fn default() -> Self {
        Mips::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::codegen::tac::CodeGenerator;

    #[test]
    fn preamble_declares_main_global() {
        let asm = Mips::new().translate(&[]);
        assert!(asm.contains(".globl main"));
        assert!(asm.contains(".text"));
        assert!(asm.contains(".align 2"));
    }

    #[test]
    fn binary_op_fills_both_operands_and_spills() {
        let mut cg = CodeGenerator::new();
        let a = cg.gen_load_constant(1);
        let b = cg.gen_load_constant(2);
        cg.gen_binary_op(crate::compiler::codegen::tac::BinOp::Add, a, b);
        let asm = Mips::new().translate(&cg.code);
        assert!(asm.contains("add $t2, $t0, $t1"));
        assert!(asm.contains("fill _tmp0 to $t0"));
        assert!(asm.contains("fill _tmp1 to $t1"));
        assert!(asm.contains("spill _tmp2 from $t2"));
    }

    #[test]
    fn string_constants_get_fresh_labels_from_one() {
        let mut cg = CodeGenerator::new();
        cg.gen_load_string_constant("\"a\"");
        cg.gen_load_string_constant("\"b\"");
        let asm = Mips::new().translate(&cg.code);
        assert!(asm.contains("_string1: .asciiz \"a\""));
        assert!(asm.contains("_string2: .asciiz \"b\""));
    }

    #[test]
    fn labels_are_flush_left() {
        let mut cg = CodeGenerator::new();
        cg.gen_label("main");
        let asm = Mips::new().translate(&cg.code);
        assert!(asm.lines().any(|l| l == "main:"));
    }

    #[test]
    fn begin_func_sets_up_frame() {
        let asm = Mips::new().translate(&[Tac::BeginFunc(16)]);
        assert!(asm.contains("subu $sp, $sp, 8"));
        assert!(asm.contains("sw $fp, 8($sp)"));
        assert!(asm.contains("sw $ra, 4($sp)"));
        assert!(asm.contains("addiu $fp, $sp, 8"));
        assert!(asm.contains("subu $sp, $sp, 16"));
    }

    #[test]
    fn zero_sized_frame_skips_the_adjustment() {
        let asm = Mips::new().translate(&[Tac::BeginFunc(0)]);
        assert!(!asm.contains("subu $sp, $sp, 0"));
    }

    #[test]
    fn globals_address_through_gp() {
        let mut cg = CodeGenerator::new();
        let global = std::rc::Rc::new(Location::gp("g", 0));
        let value = cg.gen_load_constant(1);
        cg.code.push(Tac::Assign(global, value));
        let asm = Mips::new().translate(&cg.code);
        assert!(asm.contains("sw $t2, 0($gp)"));
    }
}
