// ABOUTME: The stack-based virtual machine that dispatches assembled code vectors (§4.5)

use crate::context::Context;
use crate::env::Environment;
use crate::error::{self, CoreError};
use crate::opcode::{CodeObject, Instr, Op};
use crate::value::{Function, LispException, Pair, Retaddr, RetaddrData, Value};
use std::rc::Rc;

/// A `CATCH`-installed handler: the retaddr depth and VM state to restore
/// when an exception unwinds to it, plus the absolute pc of its `Lhandler`
/// label. Stored directly rather than reconstructed from the retaddr chain
/// because a catch's body need not make any calls before raising.
struct Handler {
    retaddr_depth: usize,
    handler_pc: usize,
    code: Rc<CodeObject>,
    env: Environment,
    current_fn: Option<Function>,
}

/// Interpreter state (§4.5): the running code vector, program counter,
/// value stack, current environment and function (for backtraces), the
/// logical retaddr stack, and the installed-handler stack. `arg_count` is
/// the bookkeeping `CALL` leaves behind so a callee's `CHKARITY`/
/// `MOVEARGS`/`RESTARGS` prologue knows how many arguments this particular
/// invocation actually supplied.
pub struct Vm<'ctx> {
    pub ctx: &'ctx Context,
    code: Rc<CodeObject>,
    pc: usize,
    stack: Vec<Value>,
    env: Environment,
    current_fn: Option<Function>,
    call_stack: Vec<Retaddr>,
    handlers: Vec<Handler>,
    arg_count: usize,
    halted: bool,
}

impl<'ctx> Vm<'ctx> {
    fn new(ctx: &'ctx Context, code: Rc<CodeObject>, env: Environment) -> Self {
        Vm {
            ctx,
            code,
            pc: 0,
            stack: Vec::new(),
            env,
            current_fn: None,
            call_stack: Vec::new(),
            handlers: Vec::new(),
            arg_count: 0,
            halted: false,
        }
    }

    fn run_to_halt(&mut self) {
        loop {
            self.drain_stale_handlers();
            if self.halted {
                break;
            }
            let Some(instr) = self.code.get(self.pc).cloned() else {
                panic!("{}", CoreError::InvalidBytecode(self.pc));
            };
            self.pc += 1;
            self.execute(&instr);
        }
    }

    /// A handler whose body has fallen through to its own `Lhandler` (no
    /// exception raised) is no longer active; a handler consumed by an
    /// unwind is already gone. Either way, once control reaches exactly
    /// the pc/depth/code a handler names, it is done.
    fn drain_stale_handlers(&mut self) {
        while let Some(h) = self.handlers.last() {
            if h.retaddr_depth == self.call_stack.len()
                && Rc::ptr_eq(&h.code, &self.code)
                && h.handler_pc == self.pc
            {
                self.handlers.pop();
            } else {
                break;
            }
        }
    }

    fn execute(&mut self, instr: &Instr) {
        match instr.op {
            Op::Const => self.stack.push(instr.operands[0].clone()),
            Op::Lvar => {
                let i = fixnum_operand(instr, 0) as usize;
                let j = fixnum_operand(instr, 1) as usize;
                self.stack.push(self.env.lvar(i, j));
            }
            Op::Lset => {
                let i = fixnum_operand(instr, 0) as usize;
                let j = fixnum_operand(instr, 1) as usize;
                let x = self.stack.pop().expect("LSET: stack underflow");
                self.env.lset(i, j, x.clone());
                self.stack.push(x);
            }
            Op::Gvar => {
                let Value::Symbol(sym) = &instr.operands[0] else {
                    panic!("{}", CoreError::InvalidBytecode(self.pc));
                };
                if sym.is_bound() {
                    self.stack.push(sym.get_value());
                } else {
                    self.stack.push(error::unbound_error(self.ctx, sym.name()));
                    self.check_for_exception();
                }
            }
            Op::Gset => {
                let Value::Symbol(sym) = &instr.operands[0] else {
                    panic!("{}", CoreError::InvalidBytecode(self.pc));
                };
                let x = self.stack.pop().expect("GSET: stack underflow");
                sym.set_value(x.clone());
                self.stack.push(x);
            }
            Op::Fjump => {
                let idx = fixnum_operand(instr, 0) as usize;
                let x = self.stack.pop().expect("FJUMP: stack underflow");
                if !x.is_truthy() {
                    self.pc = idx;
                }
            }
            Op::Jump => {
                self.pc = fixnum_operand(instr, 0) as usize;
            }
            Op::Pop => {
                self.stack.pop();
            }
            Op::Fn => {
                let Value::Function(template) = &instr.operands[0] else {
                    panic!("{}", CoreError::InvalidBytecode(self.pc));
                };
                self.stack
                    .push(Value::Function(template.close_over(self.env.clone())));
            }
            Op::Call => {
                let n = fixnum_operand(instr, 0) as usize;
                self.do_call(n, true);
            }
            Op::Prim => {
                let n = fixnum_operand(instr, 0) as usize;
                self.do_call(n, true);
            }
            Op::Return => self.do_return(),
            Op::Extenv => {
                let n = fixnum_operand(instr, 0) as usize;
                let values = self.pop_n(n);
                self.env = self.env.extend(values);
            }
            Op::Popenv => self.env = self.env.pop(),
            Op::Moveargs => {
                let n = fixnum_operand(instr, 0) as usize;
                let values = self.pop_n(n);
                self.env = self.env.extend(values);
            }
            Op::Restargs => self.do_restargs(fixnum_operand(instr, 0) as usize),
            Op::Chkarity => self.do_chkarity(fixnum_operand(instr, 0) as usize),
            Op::Chktype => {
                if self.ctx.check_types.get() {
                    self.do_chktype(instr);
                }
            }
            Op::Catch => {
                let handler_pc = fixnum_operand(instr, 0) as usize;
                // The tag expression is compiled and evaluated (§4.3) but this
                // core's exception mechanism has no `throw`-style tag matching;
                // unwinding always targets the nearest installed handler.
                self.stack.pop();
                self.handlers.push(Handler {
                    retaddr_depth: self.call_stack.len(),
                    handler_pc,
                    code: Rc::clone(&self.code),
                    env: self.env.clone(),
                    current_fn: self.current_fn.clone(),
                });
            }
            Op::Checkex => {
                if self.ctx.check_exceptions.get() {
                    self.check_for_exception();
                }
            }
            Op::Addi => self.do_fixnum_binop("fx+", |a, b| a.checked_add(b)),
            Op::Subi => self.do_fixnum_binop("fx-", |a, b| a.checked_sub(b)),
            Op::Muli => self.do_fixnum_binop("fx*", |a, b| a.checked_mul(b)),
            Op::Divi => self.do_divi(),
            Op::Cons => {
                let tail = self.stack.pop().expect("CONS: stack underflow");
                let head = self.stack.pop().expect("CONS: stack underflow");
                self.stack.push(Value::Pair(Pair::new(head, tail)));
            }
        }
    }

    fn pop_n(&mut self, n: usize) -> Vec<Value> {
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            values.push(self.stack.pop().expect("stack underflow popping args"));
        }
        values.reverse();
        values
    }

    fn do_call(&mut self, n: usize, allow_tco: bool) {
        let callee = self.stack.pop().expect("CALL: missing callee");
        match callee {
            Value::Primitive(prim) => {
                let mut args = self.pop_n(n);
                if prim.0.restp {
                    let fixed = prim.0.arity.min(args.len());
                    let rest = args.split_off(fixed);
                    args.push(build_list(rest));
                }
                let result = (prim.0.func)(self, &args);
                self.stack.push(result);
                self.check_for_exception();
            }
            Value::Function(f) => {
                let tail_call =
                    allow_tco && matches!(self.code.get(self.pc).map(|i| i.op), Some(Op::Return));
                if !tail_call {
                    self.call_stack.push(Retaddr(Rc::new(RetaddrData {
                        code: Rc::clone(&self.code),
                        env: self.env.clone(),
                        caller: self.current_fn.clone(),
                        pc: self.pc,
                    })));
                }
                self.code = Rc::clone(&f.0.code);
                self.pc = 0;
                self.env = f.0.env.clone();
                self.arg_count = n;
                self.current_fn = Some(f);
            }
            other => {
                self.stack.push(error::type_error(
                    self.ctx,
                    "CALL",
                    "function or primitive-function",
                    &other,
                ));
                self.check_for_exception();
            }
        }
    }

    fn do_return(&mut self) {
        match self.call_stack.pop() {
            Some(r) => {
                self.code = Rc::clone(&r.0.code);
                self.pc = r.0.pc;
                self.env = r.0.env.clone();
                self.current_fn = r.0.caller.clone();
            }
            None => self.halted = true,
        }
    }

    fn do_chkarity(&mut self, n: usize) {
        if self.arg_count != n {
            let name = self.current_fn_name();
            self.stack
                .push(error::arity_error(self.ctx, &name, &n.to_string(), self.arg_count));
            self.check_for_exception();
        }
    }

    fn do_restargs(&mut self, n: usize) {
        if self.arg_count < n {
            let name = self.current_fn_name();
            self.stack
                .push(error::arity_error(self.ctx, &name, &format!("at least {n}"), self.arg_count));
            self.check_for_exception();
            return;
        }
        let extra = self.arg_count - n;
        let mut rest_values = Vec::with_capacity(extra);
        for _ in 0..extra {
            rest_values.push(self.stack.pop().expect("RESTARGS: stack underflow"));
        }
        rest_values.reverse();
        let mut values = self.pop_n(n);
        values.push(build_list(rest_values));
        self.env = self.env.extend(values);
    }

    fn do_chktype(&mut self, instr: &Instr) {
        let pos = fixnum_operand(instr, 0) as usize;
        let Value::Type(expected) = instr.operands[1].clone() else {
            panic!("{}", CoreError::InvalidBytecode(self.pc));
        };
        let nargs = fixnum_operand(instr, 2) as usize;
        let idx_from_top = nargs - 1 - pos;
        let len = self.stack.len();
        let v = self.stack[len - 1 - idx_from_top].clone();
        if v.type_tag() != expected {
            self.stack
                .push(error::type_error(self.ctx, "CHKTYPE", expected.name(), &v));
            self.check_for_exception();
        }
    }

    fn do_fixnum_binop(&mut self, name: &str, op: impl Fn(i64, i64) -> Option<i64>) {
        let b = self.stack.pop().expect("binop: stack underflow");
        let a = self.stack.pop().expect("binop: stack underflow");
        match (&a, &b) {
            (Value::Fixnum(x), Value::Fixnum(y)) => match op(*x, *y) {
                Some(r) => self.stack.push(Value::Fixnum(r)),
                None => {
                    self.stack.push(error::arith_error(self.ctx, format!("{name}: overflow")));
                    self.check_for_exception();
                }
            },
            (Value::Fixnum(_), other) | (other, _) => {
                self.stack
                    .push(error::type_error(self.ctx, name, "fixnum", other));
                self.check_for_exception();
            }
        }
    }

    fn do_divi(&mut self) {
        let b = self.stack.pop().expect("DIVI: stack underflow");
        let a = self.stack.pop().expect("DIVI: stack underflow");
        match (&a, &b) {
            (Value::Fixnum(_), Value::Fixnum(0)) => {
                self.stack
                    .push(error::arith_error(self.ctx, "fx/: division by zero"));
                self.check_for_exception();
            }
            (Value::Fixnum(x), Value::Fixnum(y)) => self.stack.push(Value::Fixnum(x / y)),
            (Value::Fixnum(_), other) | (other, _) => {
                self.stack
                    .push(error::type_error(self.ctx, "fx/", "fixnum", other));
                self.check_for_exception();
            }
        }
    }

    fn current_fn_name(&self) -> String {
        self.current_fn
            .as_ref()
            .and_then(|f| f.0.name.borrow().clone())
            .unwrap_or_else(|| "#<anonymous>".to_string())
    }

    /// Called whenever the top of the stack may be a freshly raised
    /// exception: a primitive/fused-opcode result, a `GVAR` on an unbound
    /// symbol, or a failed `CHKARITY`/`CHKTYPE`. Finds the nearest handler
    /// at or above the current retaddr depth and unwinds to it, or halts
    /// the VM and lets the exception propagate to the embedder.
    fn check_for_exception(&mut self) {
        let Some(Value::Exception(exc)) = self.stack.last().cloned() else {
            return;
        };
        if !exc.is_signalled() {
            return;
        }
        loop {
            let Some(h) = self.handlers.last() else {
                self.record_backtrace(&exc);
                self.halted = true;
                return;
            };
            if h.retaddr_depth > self.call_stack.len() {
                // Stale: the frame that installed it is already gone.
                self.handlers.pop();
                continue;
            }
            let h = self.handlers.pop().unwrap();
            while self.call_stack.len() > h.retaddr_depth {
                let frame = self.call_stack.pop().unwrap();
                if let Some(f) = &frame.0.caller {
                    exc.push_backtrace(name_of(f));
                }
            }
            exc.clear_flag();
            self.code = h.code;
            self.pc = h.handler_pc;
            self.env = h.env;
            self.current_fn = h.current_fn;
            return;
        }
    }

    fn record_backtrace(&self, exc: &LispException) {
        if let Some(f) = &self.current_fn {
            exc.push_backtrace(name_of(f));
        }
        for r in self.call_stack.iter().rev() {
            if let Some(f) = &r.0.caller {
                exc.push_backtrace(name_of(f));
            }
        }
    }

    /// Run a function or primitive value to completion from within a
    /// primitive's native implementation (`apply`, `map`, `for-each`...).
    /// Never eligible for tail-call elimination: the nested call must
    /// return control to this method's loop rather than skip straight to
    /// whatever instruction sits at the caller's real `pc`.
    pub fn call_value(&mut self, callee: Value, args: Vec<Value>) -> Value {
        let depth_before = self.call_stack.len();
        let n = args.len();
        for a in args {
            self.stack.push(a);
        }
        self.stack.push(callee);
        self.do_call(n, false);
        while self.call_stack.len() > depth_before && !self.halted {
            self.drain_stale_handlers();
            if self.halted {
                break;
            }
            let Some(instr) = self.code.get(self.pc).cloned() else {
                panic!("{}", CoreError::InvalidBytecode(self.pc));
            };
            self.pc += 1;
            self.execute(&instr);
        }
        self.stack.pop().unwrap_or(Value::Undefined)
    }
}

#[cfg(test)]
impl<'ctx> Vm<'ctx> {
    /// A bare VM for unit-testing primitive functions directly, without
    /// compiling or running any bytecode.
    pub(crate) fn for_tests(ctx: &'ctx Context) -> Self {
        Vm::new(ctx, Rc::new(CodeObject { instrs: Vec::new() }), ctx.null_env.clone())
    }
}

fn name_of(f: &Function) -> String {
    f.0.name.borrow().clone().unwrap_or_else(|| "#<anonymous>".to_string())
}

fn fixnum_operand(instr: &Instr, idx: usize) -> i64 {
    match &instr.operands[idx] {
        Value::Fixnum(n) => *n,
        _ => panic!("{}", CoreError::InvalidBytecode(idx)),
    }
}

fn build_list(values: Vec<Value>) -> Value {
    let mut out = Value::EmptyList;
    for v in values.into_iter().rev() {
        out = Value::Pair(Pair::new(v, out));
    }
    out
}

/// Run `code` to completion starting from `env` and return the final
/// value on top of the stack (or the uncaught exception that halted the
/// VM). This is the `run(code) -> value` interface of §6.
pub fn run(ctx: &Context, code: Rc<CodeObject>, env: Environment) -> Value {
    let mut vm = Vm::new(ctx, code, env);
    vm.run_to_halt();
    vm.stack.pop().unwrap_or(Value::Undefined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_toplevel;
    use crate::port::InputPort;
    use crate::reader::read;

    fn eval_str(ctx: &Context, s: &str) -> Value {
        let expr = read(ctx, &InputPort::from_str(s));
        let code = compile_toplevel(ctx, expr).unwrap_or_else(|e| panic!("compile error: {e:?}"));
        run(ctx, code, ctx.null_env.clone())
    }

    #[test]
    fn self_evaluating_form_runs_to_itself() {
        let ctx = Context::init();
        assert!(matches!(eval_str(&ctx, "42"), Value::Fixnum(42)));
    }

    #[test]
    fn if_selects_the_right_branch() {
        let ctx = Context::init();
        assert!(matches!(eval_str(&ctx, "(if #t 1 2)"), Value::Fixnum(1)));
        assert!(matches!(eval_str(&ctx, "(if #f 1 2)"), Value::Fixnum(2)));
    }

    #[test]
    fn lambda_application_and_lexical_scope() {
        let ctx = Context::init();
        let v = eval_str(&ctx, "((lambda (x) ((lambda (y) x) 2)) 1)");
        assert!(matches!(v, Value::Fixnum(1)));
    }

    #[test]
    fn rest_parameter_collects_overflow_args() {
        let ctx = Context::init();
        let v = eval_str(&ctx, "((lambda (x . y) y) 1 2 3)");
        assert_eq!(crate::writer::write_to_string(&v), "(2 3)");
    }

    #[test]
    fn fixed_arity_mismatch_raises_arity_exception() {
        let ctx = Context::init();
        let v = eval_str(&ctx, "((lambda (x y) x) 1)");
        assert!(v.is_signalled_exception());
    }

    #[test]
    fn catch_clears_the_flag_on_a_signalled_exception() {
        let ctx = Context::init();
        let v = eval_str(&ctx, "(catch 'e (quote not-an-exception))");
        assert!(!v.is_signalled_exception());
    }

    #[test]
    fn chktype_raises_a_type_error_ahead_of_the_call() {
        let ctx = Context::init();
        let v = eval_str(&ctx, "(catch 'ignored (head 5))");
        assert!(!v.is_signalled_exception());
        let Value::Exception(e) = v else {
            panic!("expected an exception value, got something else");
        };
        assert_eq!(e.0.tag.name(), "TYPE-ERROR");
    }

    #[test]
    fn disabling_check_types_skips_chktype_but_the_primitive_still_catches_the_mismatch() {
        let ctx = Context::init();
        ctx.check_types.set(false);
        let v = eval_str(&ctx, "(catch 'ignored (head 5))");
        assert!(!v.is_signalled_exception());
        let Value::Exception(e) = v else {
            panic!("expected an exception value, got something else");
        };
        assert_eq!(e.0.tag.name(), "TYPE-ERROR");
    }
}
