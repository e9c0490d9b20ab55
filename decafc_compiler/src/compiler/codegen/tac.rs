//! Three-address code: instructions, locations, and the builder that
//! appends them
//!
//! Locations are shared by reference counting: a declaration's frame slot
//! is referenced by every instruction touching it, and a field-access
//! location points at the base location holding the object pointer.

use std::fmt::Display;
use std::rc::Rc;

pub const VAR_SIZE: i32 = 4;
pub const OFFSET_FIRST_LOCAL: i32 = -8;
pub const OFFSET_FIRST_PARAM: i32 = 4;
pub const OFFSET_FIRST_GLOBAL: i32 = 0;

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Segment {
    FpRelative,
    GpRelative,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Location {
    pub segment: Segment,
    pub offset: i32,
    pub name: String,
    /// When set, `offset` is relative to the object pointer held in the
    /// base location rather than to a register.
    pub base: Option<Rc<Location>>,
}

impl Location {
    pub fn fp(name: impl Into<String>, offset: i32) -> Location {
        Location {
            segment: Segment::FpRelative,
            offset,
            name: name.into(),
            base: None,
        }
    }
    pub fn gp(name: impl Into<String>, offset: i32) -> Location {
        Location {
            segment: Segment::GpRelative,
            offset,
            name: name.into(),
            base: None,
        }
    }
    pub fn with_base(name: impl Into<String>, offset: i32, base: Rc<Location>) -> Location {
        Location {
            segment: Segment::FpRelative,
            offset,
            name: name.into(),
            base: Some(base),
        }
    }
    /// Two locations denote the same storage iff segment, offset, and name
    /// all match.
    pub fn is_same(&self, other: &Location) -> bool {
        self.segment == other.segment && self.offset == other.offset && self.name == other.name
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    /// Operator spelling used in the TAC listing.
    pub fn tac_name(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
    /// MIPS instruction implementing the operator.
    pub fn mips_name(&self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
            BinOp::Mod => "rem",
            BinOp::Eq => "seq",
            BinOp::Ne => "sne",
            BinOp::Lt => "slt",
            BinOp::Le => "sle",
            BinOp::Gt => "sgt",
            BinOp::Ge => "sge",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}

#[derive(Clone, Debug)]
pub enum Tac {
    LoadConstant(Rc<Location>, i32),
    LoadStringConstant(Rc<Location>, String),
    LoadLabel(Rc<Location>, String),
    Assign(Rc<Location>, Rc<Location>),
    /// dst, reference, offset
    Load(Rc<Location>, Rc<Location>, i32),
    /// reference, value, offset
    Store(Rc<Location>, Rc<Location>, i32),
    BinaryOp(BinOp, Rc<Location>, Rc<Location>, Rc<Location>),
    Label(String),
    Goto(String),
    IfZ(Rc<Location>, String),
    /// Frame size, back-patched once the function body is emitted.
    BeginFunc(i32),
    EndFunc,
    Return(Option<Rc<Location>>),
    PushParam(Rc<Location>),
    PopParams(i32),
    LCall(String, Option<Rc<Location>>),
    ACall(Rc<Location>, Option<Rc<Location>>),
    VTable(String, Vec<String>),
}

impl Display for Tac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn deref(location: &Location, offset: i32) -> String {
            if offset == 0 {
                format!("*({})", location)
            } else {
                format!("*({} + {})", location, offset)
            }
        }
        match self {
            Tac::LoadConstant(dst, value) => write!(f, "  {} = {}", dst, value),
            Tac::LoadStringConstant(dst, s) => write!(f, "  {} = {}", dst, s),
            Tac::LoadLabel(dst, label) => write!(f, "  {} = {}", dst, label),
            Tac::Assign(dst, src) => write!(f, "  {} = {}", dst, src),
            Tac::Load(dst, reference, offset) => {
                write!(f, "  {} = {}", dst, deref(reference, *offset))
            }
            Tac::Store(reference, value, offset) => {
                write!(f, "  {} = {}", deref(reference, *offset), value)
            }
            Tac::BinaryOp(op, dst, a, b) => {
                write!(f, "  {} = {} {} {}", dst, a, op.tac_name(), b)
            }
            Tac::Label(label) => write!(f, "{}:", label),
            Tac::Goto(label) => write!(f, "  Goto {}", label),
            Tac::IfZ(test, label) => write!(f, "  IfZ {} Goto {}", test, label),
            Tac::BeginFunc(size) => write!(f, "  BeginFunc {}", size),
            Tac::EndFunc => write!(f, "  EndFunc"),
            Tac::Return(Some(value)) => write!(f, "  Return {}", value),
            Tac::Return(None) => write!(f, "  Return"),
            Tac::PushParam(param) => write!(f, "  PushParam {}", param),
            Tac::PopParams(bytes) => write!(f, "  PopParams {}", bytes),
            Tac::LCall(label, Some(dst)) => write!(f, "  {} = LCall {}", dst, label),
            Tac::LCall(label, None) => write!(f, "  LCall {}", label),
            Tac::ACall(addr, Some(dst)) => write!(f, "  {} = ACall {}", dst, addr),
            Tac::ACall(addr, None) => write!(f, "  ACall {}", addr),
            Tac::VTable(class, methods) => {
                write!(f, "VTable {} =", class)?;
                for method in methods {
                    write!(f, "\n  {},", method)?;
                }
                Ok(())
            }
        }
    }
}

/// Built-in runtime routines linked by the simulator's standard library.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Builtin {
    Alloc,
    ReadLine,
    ReadInteger,
    StringEqual,
    PrintInt,
    PrintString,
    PrintBool,
    Halt,
}

impl Builtin {
    pub fn label(&self) -> &'static str {
        match self {
            Builtin::Alloc => "_Alloc",
            Builtin::ReadLine => "_ReadLine",
            Builtin::ReadInteger => "_ReadInteger",
            Builtin::StringEqual => "_StringEqual",
            Builtin::PrintInt => "_PrintInt",
            Builtin::PrintString => "_PrintString",
            Builtin::PrintBool => "_PrintBool",
            Builtin::Halt => "_Halt",
        }
    }
    pub fn num_args(&self) -> i32 {
        match self {
            Builtin::ReadLine | Builtin::ReadInteger | Builtin::Halt => 0,
            Builtin::StringEqual => 2,
            _ => 1,
        }
    }
    pub fn has_return(&self) -> bool {
        matches!(
            self,
            Builtin::Alloc | Builtin::ReadLine | Builtin::ReadInteger | Builtin::StringEqual
        )
    }
}

pub const ERR_ARR_OUT_OF_BOUNDS: &str =
    "\"Decaf runtime error: Array subscript out of bounds\\n\"";
pub const ERR_ARR_BAD_SIZE: &str = "\"Decaf runtime error: Array size is <= 0\\n\"";

/// Appends TAC instructions and models the frame/global offset counters.
pub struct CodeGenerator {
    pub code: Vec<Tac>,
    local_loc: i32,
    param_loc: i32,
    global_loc: i32,
    label_count: usize,
    temp_count: usize,
    this_ptr: Rc<Location>,
}

impl CodeGenerator {
    pub fn new() -> CodeGenerator {
        CodeGenerator {
            code: Vec::new(),
            local_loc: OFFSET_FIRST_LOCAL,
            param_loc: OFFSET_FIRST_PARAM,
            global_loc: OFFSET_FIRST_GLOBAL,
            label_count: 0,
            temp_count: 0,
            this_ptr: Rc::new(Location::fp("this", OFFSET_FIRST_PARAM)),
        }
    }

    /// The implicit receiver slot at +4($fp).
    pub fn this_ptr(&self) -> Rc<Location> {
        Rc::clone(&self.this_ptr)
    }

    pub fn next_local_loc(&mut self) -> i32 {
        let offset = self.local_loc;
        self.local_loc -= VAR_SIZE;
        offset
    }
    pub fn next_param_loc(&mut self) -> i32 {
        let offset = self.param_loc;
        self.param_loc += VAR_SIZE;
        offset
    }
    pub fn next_global_loc(&mut self) -> i32 {
        let offset = self.global_loc;
        self.global_loc += VAR_SIZE;
        offset
    }
    fn frame_size(&self) -> i32 {
        OFFSET_FIRST_LOCAL - self.local_loc
    }
    fn reset_frame(&mut self) {
        self.local_loc = OFFSET_FIRST_LOCAL;
        self.param_loc = OFFSET_FIRST_PARAM;
    }

    pub fn new_label(&mut self) -> String {
        let label = format!("_L{}", self.label_count);
        self.label_count += 1;
        label
    }
    pub fn gen_temp_var(&mut self) -> Rc<Location> {
        let name = format!("_tmp{}", self.temp_count);
        self.temp_count += 1;
        let offset = self.next_local_loc();
        Rc::new(Location::fp(name, offset))
    }

    pub fn gen_load_constant(&mut self, value: i32) -> Rc<Location> {
        let result = self.gen_temp_var();
        self.code.push(Tac::LoadConstant(Rc::clone(&result), value));
        result
    }
    pub fn gen_load_string_constant(&mut self, value: &str) -> Rc<Location> {
        let result = self.gen_temp_var();
        self.code
            .push(Tac::LoadStringConstant(Rc::clone(&result), value.to_string()));
        result
    }
    pub fn gen_load_label(&mut self, label: &str) -> Rc<Location> {
        let result = self.gen_temp_var();
        self.code
            .push(Tac::LoadLabel(Rc::clone(&result), label.to_string()));
        result
    }
    pub fn gen_assign(&mut self, dst: Rc<Location>, src: Rc<Location>) {
        self.code.push(Tac::Assign(dst, src));
    }
    pub fn gen_load(&mut self, reference: Rc<Location>, offset: i32) -> Rc<Location> {
        let result = self.gen_temp_var();
        self.code
            .push(Tac::Load(Rc::clone(&result), reference, offset));
        result
    }
    pub fn gen_store(&mut self, reference: Rc<Location>, value: Rc<Location>, offset: i32) {
        self.code.push(Tac::Store(reference, value, offset));
    }
    pub fn gen_binary_op(
        &mut self,
        op: BinOp,
        left: Rc<Location>,
        right: Rc<Location>,
    ) -> Rc<Location> {
        let result = self.gen_temp_var();
        self.code
            .push(Tac::BinaryOp(op, Rc::clone(&result), left, right));
        result
    }
    pub fn gen_label(&mut self, label: &str) {
        self.code.push(Tac::Label(label.to_string()));
    }
    pub fn gen_if_z(&mut self, test: Rc<Location>, label: &str) {
        self.code.push(Tac::IfZ(test, label.to_string()));
    }
    pub fn gen_goto(&mut self, label: &str) {
        self.code.push(Tac::Goto(label.to_string()));
    }
    pub fn gen_return(&mut self, value: Option<Rc<Location>>) {
        self.code.push(Tac::Return(value));
    }

    /// Emits a `BeginFunc` placeholder and resets the frame counters.
    /// Returns its index for [back-patching](Self::backpatch_frame_size).
    pub fn gen_begin_func(&mut self) -> usize {
        self.reset_frame();
        self.code.push(Tac::BeginFunc(0));
        self.code.len() - 1
    }
    pub fn backpatch_frame_size(&mut self, begin_index: usize) {
        let size = self.frame_size();
        match &mut self.code[begin_index] {
            Tac::BeginFunc(frame_size) => *frame_size = size,
            _ => unreachable!("index came from gen_begin_func"),
        }
    }
    pub fn gen_end_func(&mut self) {
        self.code.push(Tac::EndFunc);
    }

    pub fn gen_push_param(&mut self, param: Rc<Location>) {
        self.code.push(Tac::PushParam(param));
    }
    pub fn gen_pop_params(&mut self, bytes: i32) {
        if bytes > 0 {
            self.code.push(Tac::PopParams(bytes));
        }
    }
    pub fn gen_l_call(&mut self, label: &str, has_return: bool) -> Option<Rc<Location>> {
        let result = has_return.then(|| self.gen_temp_var());
        self.code
            .push(Tac::LCall(label.to_string(), result.clone()));
        result
    }
    pub fn gen_a_call(&mut self, addr: Rc<Location>, has_return: bool) -> Option<Rc<Location>> {
        let result = has_return.then(|| self.gen_temp_var());
        self.code.push(Tac::ACall(addr, result.clone()));
        result
    }

    /// Pushes the arguments in reverse, calls the built-in's label, and
    /// pops the argument bytes.
    pub fn gen_builtin_call(
        &mut self,
        builtin: Builtin,
        arg1: Option<Rc<Location>>,
        arg2: Option<Rc<Location>>,
    ) -> Option<Rc<Location>> {
        if let Some(arg2) = arg2 {
            self.gen_push_param(arg2);
        }
        if let Some(arg1) = arg1 {
            self.gen_push_param(arg1);
        }
        let result = self.gen_l_call(builtin.label(), builtin.has_return());
        self.gen_pop_params(VAR_SIZE * builtin.num_args());
        result
    }

    pub fn gen_vtable(&mut self, class: &str, methods: Vec<String>) {
        self.code.push(Tac::VTable(class.to_string(), methods));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_vars_descend_from_first_local() {
        let mut cg = CodeGenerator::new();
        let t0 = cg.gen_temp_var();
        let t1 = cg.gen_temp_var();
        assert_eq!((t0.name.as_str(), t0.offset), ("_tmp0", -8));
        assert_eq!((t1.name.as_str(), t1.offset), ("_tmp1", -12));
    }

    #[test]
    fn frame_size_counts_locals_and_is_backpatched() {
        let mut cg = CodeGenerator::new();
        let begin = cg.gen_begin_func();
        cg.gen_load_constant(1);
        cg.gen_load_constant(2);
        cg.backpatch_frame_size(begin);
        assert!(matches!(cg.code[begin], Tac::BeginFunc(8)));
    }

    #[test]
    fn begin_func_resets_counters() {
        let mut cg = CodeGenerator::new();
        cg.gen_temp_var();
        assert_eq!(cg.next_param_loc(), 4);
        let begin = cg.gen_begin_func();
        assert_eq!(cg.next_param_loc(), 4);
        assert_eq!(cg.next_param_loc(), 8);
        cg.backpatch_frame_size(begin);
        assert!(matches!(cg.code[begin], Tac::BeginFunc(0)));
    }

    #[test]
    fn builtin_call_balances_params() {
        let mut cg = CodeGenerator::new();
        let a = cg.gen_load_constant(1);
        let b = cg.gen_load_constant(2);
        let result = cg.gen_builtin_call(Builtin::StringEqual, Some(a), Some(b));
        assert!(result.is_some());
        let pushed = cg
            .code
            .iter()
            .filter(|i| matches!(i, Tac::PushParam(_)))
            .count() as i32;
        let popped: i32 = cg
            .code
            .iter()
            .filter_map(|i| match i {
                Tac::PopParams(n) => Some(*n),
                _ => None,
            })
            .sum();
        assert_eq!(pushed * VAR_SIZE, popped);
    }

    #[test]
    fn labels_are_unique() {
        let mut cg = CodeGenerator::new();
        assert_eq!(cg.new_label(), "_L0");
        assert_eq!(cg.new_label(), "_L1");
    }

    #[test]
    fn tac_listing_format() {
        let mut cg = CodeGenerator::new();
        let t = cg.gen_load_constant(42);
        cg.gen_if_z(t, "_L0");
        cg.gen_label("_L0");
        let listing: Vec<String> = cg.code.iter().map(|i| i.to_string()).collect();
        assert_eq!(listing, vec!["  _tmp0 = 42", "  IfZ _tmp0 Goto _L0", "_L0:"]);
    }

    #[test]
    fn location_identity() {
        let a = Location::fp("x", -8);
        let b = Location::fp("x", -8);
        let c = Location::fp("x", -12);
        let d = Location::gp("x", -8);
        assert!(a.is_same(&b));
        assert!(!a.is_same(&c));
        assert!(!a.is_same(&d));
    }
}
