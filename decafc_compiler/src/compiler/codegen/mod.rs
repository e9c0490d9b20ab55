//! Lowers the checked tree to [TAC](tac) and finally to [MIPS](mips)
//!
//! Offset assignment runs first: globals get `gpRelative` slots, classes
//! flatten their members in inheritance order (overrides replace the
//! parent's v-table slot in place) and every function receives its mangled
//! code label. Emission then walks the tree once, appending instructions
//! through the [CodeGenerator] builders. Back-end limitations (`double`,
//! interface dispatch) surface as errors the moment emission reaches them.

pub mod mips;
pub mod tac;

use crate::compiler::ast::*;
use crate::compiler::common::error::{Error, ErrorKind};
use crate::compiler::common::token::TokenKind;
use crate::compiler::common::types::Ty;
use crate::Config;
use std::collections::HashSet;
use std::rc::Rc;
use tac::*;

pub fn emit(ast: &mut Ast, config: &Config) -> Result<Vec<Tac>, Vec<Error>> {
    let mut emitter = Emitter {
        ast,
        cg: CodeGenerator::new(),
        trace: config.debug_on("tac+"),
    };
    match emitter.emit_program() {
        Ok(()) => Ok(emitter.cg.code),
        Err(error) => Err(vec![error]),
    }
}

struct Emitter<'a> {
    ast: &'a mut Ast,
    cg: CodeGenerator,
    trace: bool,
}

impl Emitter<'_> {
    fn emit_program(&mut self) -> Result<(), Error> {
        if !self.has_valid_main() {
            return Err(Error::without_loc(ErrorKind::NoMainFound));
        }
        self.assign_offsets()?;
        for decl in self.ast.program.clone() {
            match self.ast.decl(decl).kind {
                DeclKind::Fn(_) => self.emit_fn(decl)?,
                DeclKind::Class(_) => self.emit_class(decl)?,
                DeclKind::Var(_) | DeclKind::Interface(_) => {}
            }
        }
        Ok(())
    }

    /// `main` must exist at global scope, return void, and take nothing.
    fn has_valid_main(&self) -> bool {
        self.ast.program.iter().any(|decl| {
            self.ast.decl_name(*decl) == "main"
                && matches!(&self.ast.decl(*decl).kind, DeclKind::Fn(func)
                    if func.formals.is_empty()
                        && self.ast.type_of(func.return_type) == Some(Ty::Void))
        })
    }

    fn reject_double(&self, decl: DeclId) -> Result<(), Error> {
        if let DeclKind::Var(var) = &self.ast.decl(decl).kind {
            if self.ast.type_of(var.ty) == Some(Ty::Double) {
                return Err(Error::new(
                    self.ast.decl(decl).span,
                    ErrorKind::DoubleUnsupported,
                ));
            }
        }
        Ok(())
    }

    // ----------------------------------------------------- offset assignment

    fn assign_offsets(&mut self) -> Result<(), Error> {
        // code labels first: flattening reads inherited methods' labels
        for decl in self.ast.program.clone() {
            match self.ast.decl(decl).kind.clone() {
                DeclKind::Fn(_) => {
                    let name = self.ast.decl_name(decl).to_string();
                    let label = if name == "main" {
                        name
                    } else {
                        format!("_{}", name)
                    };
                    self.set_fn_label(decl, label);
                }
                DeclKind::Class(class) => {
                    let class_name = self.ast.decl_name(decl).to_string();
                    for member in class.members {
                        if matches!(self.ast.decl(member).kind, DeclKind::Fn(_)) {
                            let label =
                                format!("{}.{}", class_name, self.ast.decl_name(member));
                            self.set_fn_label(member, label);
                        }
                    }
                }
                _ => {}
            }
        }
        for decl in self.ast.program.clone() {
            match self.ast.decl(decl).kind {
                DeclKind::Var(_) => {
                    self.reject_double(decl)?;
                    let name = self.ast.decl_name(decl).to_string();
                    let offset = self.cg.next_global_loc();
                    self.ast.decl_mut(decl).emit_loc =
                        Some(Rc::new(Location::gp(name, offset)));
                }
                DeclKind::Class(_) => self.assign_class_layout(decl)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn set_fn_label(&mut self, decl: DeclId, label: String) {
        if let DeclKind::Fn(func) = &mut self.ast.decl_mut(decl).kind {
            func.label = Some(label);
        }
    }

    /// Flattens members in inheritance order. An overriding method takes
    /// the slot index of the method it overrides, so every subclass
    /// v-table stays index-compatible with its parent's.
    fn collect_members(
        &self,
        class: DeclId,
        vars: &mut Vec<DeclId>,
        fns: &mut Vec<DeclId>,
        visited: &mut HashSet<usize>,
    ) {
        if !visited.insert(class.0) {
            return;
        }
        let DeclKind::Class(kind) = self.ast.decl(class).kind.clone() else {
            return;
        };
        if let Some(extends) = kind.extends {
            if let TypeKind::Named(ident) = &self.ast.type_node(extends).kind {
                if let Some(parent) = ident.decl {
                    self.collect_members(parent, vars, fns, visited);
                }
            }
        }
        for member in kind.members {
            match self.ast.decl(member).kind {
                DeclKind::Var(_) => vars.push(member),
                DeclKind::Fn(_) => {
                    let name = self.ast.decl_name(member);
                    match fns.iter().position(|f| self.ast.decl_name(*f) == name) {
                        Some(slot) => fns[slot] = member,
                        None => fns.push(member),
                    }
                }
                _ => {}
            }
        }
    }

    fn assign_class_layout(&mut self, class: DeclId) -> Result<(), Error> {
        let mut vars = Vec::new();
        let mut fns = Vec::new();
        self.collect_members(class, &mut vars, &mut fns, &mut HashSet::new());

        // v-table pointer sits at offset 0; fields follow
        for (i, var) in vars.iter().enumerate() {
            self.reject_double(*var)?;
            let name = self.ast.decl_name(*var).to_string();
            let offset = VAR_SIZE + i as i32 * VAR_SIZE;
            let location = Location::with_base(name, offset, self.cg.this_ptr());
            self.ast.decl_mut(*var).emit_loc = Some(Rc::new(location));
        }
        for (i, func) in fns.iter().enumerate() {
            if let DeclKind::Fn(kind) = &mut self.ast.decl_mut(*func).kind {
                kind.vtable_offset = Some(i as i32 * VAR_SIZE);
            }
        }

        let instance_size = vars.len() as i32 * VAR_SIZE + VAR_SIZE;
        let vtable_size = fns.len() as i32 * VAR_SIZE;
        if let DeclKind::Class(kind) = &mut self.ast.decl_mut(class).kind {
            kind.var_members = vars;
            kind.methods = fns;
            kind.instance_size = instance_size;
            kind.vtable_size = vtable_size;
        }
        Ok(())
    }

    // ------------------------------------------------------------- emission

    fn emit_class(&mut self, class: DeclId) -> Result<(), Error> {
        let DeclKind::Class(kind) = self.ast.decl(class).kind.clone() else {
            unreachable!("caller matched a class");
        };
        for member in kind.members {
            if matches!(self.ast.decl(member).kind, DeclKind::Fn(_)) {
                self.emit_fn(member)?;
            }
        }
        let labels = kind
            .methods
            .iter()
            .map(|m| match &self.ast.decl(*m).kind {
                DeclKind::Fn(f) => f.label.clone().expect("labels assigned pre-emit"),
                _ => unreachable!("flattened methods are functions"),
            })
            .collect();
        let name = self.ast.decl_name(class).to_string();
        self.cg.gen_vtable(&name, labels);
        Ok(())
    }

    fn emit_fn(&mut self, decl: DeclId) -> Result<(), Error> {
        let DeclKind::Fn(func) = self.ast.decl(decl).kind.clone() else {
            unreachable!("caller matched a function");
        };
        let Some(body) = func.body else {
            return Ok(());
        };
        let label = func.label.clone().expect("labels assigned pre-emit");
        if self.trace {
            eprintln!("tac+: emit function {}", label);
        }
        self.cg.gen_label(&label);
        let begin = self.cg.gen_begin_func();
        if self.ast.is_class_member(decl) {
            self.cg.next_param_loc(); // `this` takes +4
        }
        for formal in func.formals {
            self.reject_double(formal)?;
            let name = self.ast.decl_name(formal).to_string();
            let offset = self.cg.next_param_loc();
            self.ast.decl_mut(formal).emit_loc = Some(Rc::new(Location::fp(name, offset)));
        }
        self.emit_stmt(body)?;
        self.cg.backpatch_frame_size(begin);
        self.cg.gen_end_func();
        Ok(())
    }

    fn emit_stmt(&mut self, stmt: StmtId) -> Result<(), Error> {
        match self.ast.stmt(stmt).kind.clone() {
            StmtKind::Block { decls, stmts } => {
                for decl in decls {
                    self.reject_double(decl)?;
                    let name = self.ast.decl_name(decl).to_string();
                    let offset = self.cg.next_local_loc();
                    self.ast.decl_mut(decl).emit_loc =
                        Some(Rc::new(Location::fp(name, offset)));
                }
                for stmt in stmts {
                    self.emit_stmt(stmt)?;
                }
            }
            StmtKind::If { test, then_body, else_body } => {
                self.emit_expr(test)?;
                let test_value = self.rvalue(test);
                let else_label = self.cg.new_label();
                let end_label = self.cg.new_label();
                self.cg.gen_if_z(test_value, &else_label);
                self.emit_stmt(then_body)?;
                self.cg.gen_goto(&end_label);
                self.cg.gen_label(&else_label);
                if let Some(else_body) = else_body {
                    self.emit_stmt(else_body)?;
                }
                self.cg.gen_label(&end_label);
            }
            StmtKind::While { test, body } => {
                let top_label = self.cg.new_label();
                let end_label = self.cg.new_label();
                self.ast.stmt_mut(stmt).end_label = Some(end_label.clone());
                self.cg.gen_label(&top_label);
                self.emit_expr(test)?;
                let test_value = self.rvalue(test);
                self.cg.gen_if_z(test_value, &end_label);
                self.emit_stmt(body)?;
                self.cg.gen_goto(&top_label);
                self.cg.gen_label(&end_label);
            }
            StmtKind::For { init, test, step, body } => {
                self.emit_expr(init)?;
                let top_label = self.cg.new_label();
                let end_label = self.cg.new_label();
                self.ast.stmt_mut(stmt).end_label = Some(end_label.clone());
                self.cg.gen_label(&top_label);
                self.emit_expr(test)?;
                let test_value = self.rvalue(test);
                self.cg.gen_if_z(test_value, &end_label);
                self.emit_stmt(body)?;
                self.emit_expr(step)?;
                self.cg.gen_goto(&top_label);
                self.cg.gen_label(&end_label);
            }
            StmtKind::Switch { expr, cases } => self.emit_switch(stmt, expr, cases)?,
            StmtKind::Case { stmts, .. } => {
                for stmt in stmts {
                    self.emit_stmt(stmt)?;
                }
            }
            StmtKind::Break => self.emit_break(stmt),
            StmtKind::Return { expr } => {
                if matches!(self.ast.expr(expr).kind, ExprKind::Empty) {
                    self.cg.gen_return(None);
                } else {
                    self.emit_expr(expr)?;
                    let value = self.rvalue(expr);
                    self.cg.gen_return(Some(value));
                }
            }
            StmtKind::Print { args } => {
                for arg in args {
                    self.emit_expr(arg)?;
                    let value = self.rvalue(arg);
                    let builtin = match self.ast.expr(arg).expr_type {
                        Some(Ty::Int) => Builtin::PrintInt,
                        Some(Ty::Bool) => Builtin::PrintBool,
                        Some(Ty::String) => Builtin::PrintString,
                        _ => unreachable!("print arguments were checked"),
                    };
                    self.cg.gen_builtin_call(builtin, Some(value), None);
                }
            }
            StmtKind::Expr(expr) => self.emit_expr(expr)?,
        }
        Ok(())
    }

    /// The compare chain branches to each case label in order; a `default`
    /// arm contributes its unconditional branch at its textual position.
    fn emit_switch(
        &mut self,
        stmt: StmtId,
        expr: ExprId,
        cases: Vec<StmtId>,
    ) -> Result<(), Error> {
        self.emit_expr(expr)?;
        let switch_value = self.rvalue(expr);
        let end_label = self.cg.new_label();
        self.ast.stmt_mut(stmt).end_label = Some(end_label.clone());

        let case_labels: Vec<String> = cases.iter().map(|_| self.cg.new_label()).collect();
        for (case, label) in cases.iter().zip(case_labels.iter()) {
            match self.ast.stmt(*case).kind {
                StmtKind::Case { value: Some(value), .. } => {
                    let case_value = self.cg.gen_load_constant(value);
                    let matched =
                        self.cg
                            .gen_binary_op(BinOp::Eq, Rc::clone(&switch_value), case_value);
                    let zero = self.cg.gen_load_constant(0);
                    let missed = self.cg.gen_binary_op(BinOp::Eq, matched, zero);
                    self.cg.gen_if_z(missed, label);
                }
                StmtKind::Case { value: None, .. } => self.cg.gen_goto(label),
                _ => unreachable!("switch bodies hold case arms"),
            }
        }
        self.cg.gen_goto(&end_label);

        for (case, label) in cases.iter().zip(case_labels.iter()) {
            self.cg.gen_label(label);
            self.emit_stmt(*case)?;
        }
        self.cg.gen_label(&end_label);
        Ok(())
    }

    /// Jumps to the end label of the nearest enclosing loop or switch,
    /// found by walking the parent chain.
    fn emit_break(&mut self, stmt: StmtId) {
        let mut cur = self.ast.stmt(stmt).parent;
        while let Some(NodeRef::Stmt(parent)) = cur {
            if matches!(
                self.ast.stmt(parent).kind,
                StmtKind::While { .. } | StmtKind::For { .. } | StmtKind::Switch { .. }
            ) {
                let label = self
                    .ast
                    .stmt(parent)
                    .end_label
                    .clone()
                    .expect("enclosing loop is mid-emission");
                self.cg.gen_goto(&label);
                return;
            }
            cur = self.ast.stmt(parent).parent;
        }
        unreachable!("checker verified break sits inside a loop or case");
    }

    // -------------------------------------------------------------- rvalues

    /// The value of an already-emitted expression. Array accesses and
    /// based field accesses hold an address; using their value emits the
    /// dereferencing load.
    fn rvalue(&mut self, expr: ExprId) -> Rc<Location> {
        let location = self
            .ast
            .expr(expr)
            .emit_loc
            .clone()
            .expect("expression emitted before use");
        match &self.ast.expr(expr).kind {
            ExprKind::ArrayAccess { .. } => self.cg.gen_load(location, 0),
            ExprKind::FieldAccess { .. } => match location.base.clone() {
                Some(base) => self.cg.gen_load(base, location.offset),
                None => location,
            },
            _ => location,
        }
    }

    fn set_emit_loc(&mut self, expr: ExprId, location: Rc<Location>) {
        self.ast.expr_mut(expr).emit_loc = Some(location);
    }

    fn bin_op(kind: &TokenKind) -> BinOp {
        match kind {
            TokenKind::Plus => BinOp::Add,
            TokenKind::Minus => BinOp::Sub,
            TokenKind::Star => BinOp::Mul,
            TokenKind::Slash => BinOp::Div,
            TokenKind::Percent => BinOp::Mod,
            TokenKind::Less => BinOp::Lt,
            TokenKind::LessEqual => BinOp::Le,
            TokenKind::Greater => BinOp::Gt,
            TokenKind::GreaterEqual => BinOp::Ge,
            TokenKind::Equal => BinOp::Eq,
            TokenKind::NotEqual => BinOp::Ne,
            TokenKind::AmpAmp => BinOp::And,
            TokenKind::PipePipe => BinOp::Or,
            _ => unreachable!("parser only builds operators"),
        }
    }

    fn emit_expr(&mut self, expr: ExprId) -> Result<(), Error> {
        match self.ast.expr(expr).kind.clone() {
            ExprKind::Empty => {}
            ExprKind::IntConstant(value) => {
                let location = self.cg.gen_load_constant(value);
                self.set_emit_loc(expr, location);
            }
            ExprKind::BoolConstant(value) => {
                let location = self.cg.gen_load_constant(if value { 1 } else { 0 });
                self.set_emit_loc(expr, location);
            }
            ExprKind::NullConstant => {
                let location = self.cg.gen_load_constant(0);
                self.set_emit_loc(expr, location);
            }
            ExprKind::StringConstant(value) => {
                let location = self.cg.gen_load_string_constant(&value);
                self.set_emit_loc(expr, location);
            }
            ExprKind::DoubleConstant(_) => {
                return Err(Error::new(
                    self.ast.expr(expr).span,
                    ErrorKind::DoubleUnsupported,
                ));
            }
            ExprKind::This => {
                let location = self.cg.this_ptr();
                self.set_emit_loc(expr, location);
            }
            ExprKind::ReadInteger => {
                let location = self
                    .cg
                    .gen_builtin_call(Builtin::ReadInteger, None, None)
                    .expect("ReadInteger returns");
                self.set_emit_loc(expr, location);
            }
            ExprKind::ReadLine => {
                let location = self
                    .cg
                    .gen_builtin_call(Builtin::ReadLine, None, None)
                    .expect("ReadLine returns");
                self.set_emit_loc(expr, location);
            }
            ExprKind::Arithmetic { left, op, right } => {
                if let Some(left) = left {
                    self.emit_expr(left)?;
                }
                self.emit_expr(right)?;
                // unary minus lowers to 0 - operand
                let left_value = match left {
                    Some(left) => self.rvalue(left),
                    None => self.cg.gen_load_constant(0),
                };
                let right_value = self.rvalue(right);
                let result = self
                    .cg
                    .gen_binary_op(Self::bin_op(&op.kind), left_value, right_value);
                self.set_emit_loc(expr, result);
            }
            ExprKind::Relational { left, op, right } => {
                self.emit_expr(left)?;
                self.emit_expr(right)?;
                let left_value = self.rvalue(left);
                let right_value = self.rvalue(right);
                let result = self
                    .cg
                    .gen_binary_op(Self::bin_op(&op.kind), left_value, right_value);
                self.set_emit_loc(expr, result);
            }
            ExprKind::Equality { left, op, right } => {
                self.emit_expr(left)?;
                self.emit_expr(right)?;
                let left_value = self.rvalue(left);
                let right_value = self.rvalue(right);
                let both_strings = self.ast.expr(left).expr_type == Some(Ty::String)
                    && self.ast.expr(right).expr_type == Some(Ty::String);
                let result = if both_strings {
                    let equal = self
                        .cg
                        .gen_builtin_call(Builtin::StringEqual, Some(left_value), Some(right_value))
                        .expect("_StringEqual returns");
                    if op.kind == TokenKind::NotEqual {
                        let zero = self.cg.gen_load_constant(0);
                        self.cg.gen_binary_op(BinOp::Eq, zero, equal)
                    } else {
                        equal
                    }
                } else {
                    // references compare by identity
                    self.cg
                        .gen_binary_op(Self::bin_op(&op.kind), left_value, right_value)
                };
                self.set_emit_loc(expr, result);
            }
            ExprKind::Logical { left, op, right } => {
                if let Some(left) = left {
                    self.emit_expr(left)?;
                }
                self.emit_expr(right)?;
                let result = match left {
                    Some(left) => {
                        let left_value = self.rvalue(left);
                        let right_value = self.rvalue(right);
                        self.cg
                            .gen_binary_op(Self::bin_op(&op.kind), left_value, right_value)
                    }
                    None => {
                        // !b lowers to 0 == b
                        let right_value = self.rvalue(right);
                        let zero = self.cg.gen_load_constant(0);
                        self.cg.gen_binary_op(BinOp::Eq, zero, right_value)
                    }
                };
                self.set_emit_loc(expr, result);
            }
            ExprKind::Assign { left, right } => {
                self.emit_expr(right)?;
                self.emit_expr(left)?;
                let value = self.rvalue(right);
                let target = self
                    .ast
                    .expr(left)
                    .emit_loc
                    .clone()
                    .expect("lvalue emitted");
                if let Some(base) = target.base.clone() {
                    self.cg.gen_store(base, value, target.offset);
                } else if matches!(self.ast.expr(left).kind, ExprKind::ArrayAccess { .. }) {
                    self.cg.gen_store(target, value, 0);
                } else {
                    self.cg.gen_assign(target, value);
                }
                let result = self.rvalue(left);
                self.set_emit_loc(expr, result);
            }
            ExprKind::ArrayAccess { base, subscript } => {
                self.emit_array_access(expr, base, subscript)?;
            }
            ExprKind::FieldAccess { base, field } => {
                if let Some(base) = base {
                    self.emit_expr(base)?;
                }
                let decl = field.decl.expect("checker resolved the field");
                let decl_loc = self
                    .ast
                    .decl(decl)
                    .emit_loc
                    .clone()
                    .expect("offsets assigned pre-emit");
                let location = match base {
                    Some(base) => {
                        let object = self.rvalue(base);
                        Rc::new(Location::with_base(
                            decl_loc.name.clone(),
                            decl_loc.offset,
                            object,
                        ))
                    }
                    None => decl_loc,
                };
                self.set_emit_loc(expr, location);
            }
            ExprKind::Call { base, field, actuals } => {
                self.emit_call(expr, base, field, actuals)?;
            }
            ExprKind::New { class } => {
                let class_decl = match &self.ast.type_node(class).kind {
                    TypeKind::Named(ident) => ident.decl.expect("checker resolved the class"),
                    _ => unreachable!("new takes a named type"),
                };
                let DeclKind::Class(kind) = &self.ast.decl(class_decl).kind else {
                    unreachable!("checker verified a class");
                };
                let instance_size = kind.instance_size;
                let class_name = self.ast.decl_name(class_decl).to_string();
                let size = self.cg.gen_load_constant(instance_size);
                let object = self
                    .cg
                    .gen_builtin_call(Builtin::Alloc, Some(size), None)
                    .expect("_Alloc returns");
                let vtable = self.cg.gen_load_label(&class_name);
                self.cg.gen_store(Rc::clone(&object), vtable, 0);
                self.set_emit_loc(expr, object);
            }
            ExprKind::NewArray { size, .. } => {
                self.emit_new_array(expr, size)?;
            }
            ExprKind::Postfix { lvalue, op } => {
                self.emit_expr(lvalue)?;
                let target = self
                    .ast
                    .expr(lvalue)
                    .emit_loc
                    .clone()
                    .expect("lvalue emitted");
                let old_value = self.rvalue(lvalue);
                // the expression's value is the lvalue before the bump
                let saved = self.cg.gen_temp_var();
                self.cg.gen_assign(Rc::clone(&saved), Rc::clone(&old_value));
                let one = self.cg.gen_load_constant(1);
                let op = if op.kind == TokenKind::PlusPlus {
                    BinOp::Add
                } else {
                    BinOp::Sub
                };
                let bumped = self.cg.gen_binary_op(op, old_value, one);
                if let Some(base) = target.base.clone() {
                    self.cg.gen_store(base, bumped, target.offset);
                } else if matches!(self.ast.expr(lvalue).kind, ExprKind::ArrayAccess { .. }) {
                    self.cg.gen_store(target, bumped, 0);
                } else {
                    self.cg.gen_assign(target, bumped);
                }
                self.set_emit_loc(expr, saved);
            }
        }
        Ok(())
    }

    /// Bounds-checked element address: `subscript < 0 || !(subscript <
    /// length)` prints the runtime error and halts; otherwise the element
    /// address is `base + subscript * elemSize`.
    fn emit_array_access(
        &mut self,
        expr: ExprId,
        base: ExprId,
        subscript: ExprId,
    ) -> Result<(), Error> {
        self.emit_expr(base)?;
        self.emit_expr(subscript)?;
        let index = self.rvalue(subscript);

        let zero = self.cg.gen_load_constant(0);
        let negative = self
            .cg
            .gen_binary_op(BinOp::Lt, Rc::clone(&index), Rc::clone(&zero));
        let array = self.rvalue(base);
        let length = self.cg.gen_load(Rc::clone(&array), -VAR_SIZE);
        let in_range = self.cg.gen_binary_op(BinOp::Lt, Rc::clone(&index), length);
        let past_end = self.cg.gen_binary_op(BinOp::Eq, in_range, zero);
        let out_of_bounds = self.cg.gen_binary_op(BinOp::Or, negative, past_end);
        let ok_label = self.cg.new_label();
        self.cg.gen_if_z(out_of_bounds, &ok_label);
        let message = self.cg.gen_load_string_constant(ERR_ARR_OUT_OF_BOUNDS);
        self.cg
            .gen_builtin_call(Builtin::PrintString, Some(message), None);
        self.cg.gen_builtin_call(Builtin::Halt, None, None);
        self.cg.gen_label(&ok_label);

        let elem_size = self.cg.gen_load_constant(VAR_SIZE);
        let byte_offset = self.cg.gen_binary_op(BinOp::Mul, elem_size, index);
        let address = self.cg.gen_binary_op(BinOp::Add, array, byte_offset);
        self.set_emit_loc(expr, address);
        Ok(())
    }

    /// `(size + 1) * elemSize` bytes, the length word in front, and the
    /// returned address one element past it.
    fn emit_new_array(&mut self, expr: ExprId, size: ExprId) -> Result<(), Error> {
        self.emit_expr(size)?;
        let count = self.rvalue(size);
        let zero = self.cg.gen_load_constant(0);
        let bad_size = self.cg.gen_binary_op(BinOp::Le, Rc::clone(&count), zero);
        let ok_label = self.cg.new_label();
        self.cg.gen_if_z(bad_size, &ok_label);
        let message = self.cg.gen_load_string_constant(ERR_ARR_BAD_SIZE);
        self.cg
            .gen_builtin_call(Builtin::PrintString, Some(message), None);
        self.cg.gen_builtin_call(Builtin::Halt, None, None);
        self.cg.gen_label(&ok_label);

        let one = self.cg.gen_load_constant(1);
        let words = self.cg.gen_binary_op(BinOp::Add, one, Rc::clone(&count));
        let elem_size = self.cg.gen_load_constant(VAR_SIZE);
        let bytes = self.cg.gen_binary_op(BinOp::Mul, words, Rc::clone(&elem_size));
        let block = self
            .cg
            .gen_builtin_call(Builtin::Alloc, Some(bytes), None)
            .expect("_Alloc returns");
        self.cg.gen_store(Rc::clone(&block), count, 0);
        let array = self.cg.gen_binary_op(BinOp::Add, block, elem_size);
        self.set_emit_loc(expr, array);
        Ok(())
    }

    fn emit_call(
        &mut self,
        expr: ExprId,
        base: Option<ExprId>,
        field: Identifier,
        actuals: Vec<ExprId>,
    ) -> Result<(), Error> {
        if self.trace {
            eprintln!("tac+: emit call {}", field.name);
        }
        if let Some(base) = base {
            self.emit_expr(base)?;
        }
        for actual in &actuals {
            self.emit_expr(*actual)?;
        }

        // arr.length() reads the length word in front of the elements
        if let Some(base) = base {
            if matches!(self.ast.expr(base).expr_type, Some(Ty::Array(_)))
                && field.name == "length"
            {
                let array = self.rvalue(base);
                let length = self.cg.gen_load(array, -VAR_SIZE);
                self.set_emit_loc(expr, length);
                return Ok(());
            }
        }

        let callee = field.decl.expect("checker resolved the callee");
        if self.ast.is_interface_member(callee) {
            return Err(Error::new(
                self.ast.expr(expr).span,
                ErrorKind::InterfaceDispatchUnsupported(field.name),
            ));
        }
        let DeclKind::Fn(func) = self.ast.decl(callee).kind.clone() else {
            unreachable!("checker verified the callee is a function");
        };
        let has_return = self.ast.type_of(func.return_type) != Some(Ty::Void);
        let dynamic = base.is_some() || self.ast.is_class_member(callee);

        let receiver = match base {
            Some(base) => Some(self.rvalue(base)),
            None if dynamic => Some(self.cg.this_ptr()),
            None => None,
        };
        let fn_address = if dynamic {
            let receiver = receiver.clone().expect("dynamic calls have a receiver");
            let vtable = self.cg.gen_load(receiver, 0);
            let offset = func.vtable_offset.expect("offsets assigned pre-emit");
            Some(self.cg.gen_load(vtable, offset))
        } else {
            None
        };

        for actual in actuals.iter().rev() {
            let value = self.rvalue(*actual);
            self.cg.gen_push_param(value);
        }

        let result = if dynamic {
            // `this` goes last so it lands at +4 in the callee's frame
            self.cg
                .gen_push_param(receiver.expect("dynamic calls have a receiver"));
            let result = self
                .cg
                .gen_a_call(fn_address.expect("loaded above"), has_return);
            self.cg
                .gen_pop_params(actuals.len() as i32 * VAR_SIZE + VAR_SIZE);
            result
        } else {
            let label = func.label.clone().expect("labels assigned pre-emit");
            let result = self.cg.gen_l_call(&label, has_return);
            self.cg.gen_pop_params(actuals.len() as i32 * VAR_SIZE);
            result
        };
        if let Some(result) = result {
            self.set_emit_loc(expr, result);
        }
        Ok(())
    }
}
