// ABOUTME: The macro expander: runs a macro function at compile time (§4.6)

use crate::context::Context;
use crate::opcode::{CodeObject, Instr, Op};
use crate::value::{Function, Value};
use std::rc::Rc;

/// Expand one macro call. Per §4.6, macros are ordinary compiled functions
/// stored in a symbol's macro cell; expansion builds the minimal bytecode
/// sequence `CONST arg1 … CONST argn CONST fn CALL n`, assembles it, and
/// runs it on the VM. The compiler feeds the result back through
/// `compile_expr`, which re-checks `is_macro()` on the new head — iterating
/// to a fixpoint without any loop here.
pub fn expand_once(ctx: &Context, macro_fn: &Function, args: &[Value]) -> Value {
    let mut instrs = Vec::with_capacity(args.len() + 3);
    for a in args {
        instrs.push(Rc::new(Instr::new(Op::Const, vec![a.clone()])));
    }
    instrs.push(Rc::new(Instr::new(
        Op::Const,
        vec![Value::Function(macro_fn.clone())],
    )));
    instrs.push(Rc::new(Instr::new(
        Op::Call,
        vec![Value::Fixnum(args.len() as i64)],
    )));
    instrs.push(Rc::new(Instr::new(Op::Return, vec![])));
    let code = Rc::new(CodeObject { instrs });
    crate::vm::run(ctx, code, ctx.null_env.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_toplevel;
    use crate::reader::read;
    use crate::port::InputPort;

    fn eval_str(ctx: &Context, s: &str) -> Value {
        let code = compile_toplevel(ctx, read(ctx, &InputPort::from_str(s))).unwrap();
        crate::vm::run(ctx, code, ctx.null_env.clone())
    }

    #[test]
    fn expand_once_runs_the_macro_function_on_its_unevaluated_arguments() {
        let ctx = Context::init();
        // A macro that ignores its argument and always expands to 42.
        let code = compile_toplevel(&ctx, read(&ctx, &InputPort::from_str("(lambda (x) 42)")))
            .unwrap();
        let template = match crate::vm::run(&ctx, code, ctx.null_env.clone()) {
            Value::Function(f) => f,
            other => panic!("expected function, got {other:?}"),
        };
        let closed = template.close_over(ctx.null_env.clone());
        let result = expand_once(&ctx, &closed, &[Value::Fixnum(99)]);
        assert!(matches!(result, Value::Fixnum(42)));
    }

    #[test]
    fn defmacro_defined_macro_expands_at_compile_time() {
        let ctx = Context::init();
        // defmacro itself is bootstrap-library sugar, out of core scope; so
        // this test wires the macro cell directly the way `defmacro` would.
        let sym = ctx.user_package.find_or_create_symbol("my-macro");
        let code = compile_toplevel(
            &ctx,
            read(&ctx, &InputPort::from_str("(lambda (a) (list 'quote (cons 'got a)))")),
        )
        .unwrap();
        let template = match crate::vm::run(&ctx, code, ctx.null_env.clone()) {
            Value::Function(f) => f,
            other => panic!("expected function, got {other:?}"),
        };
        sym.set_macro(Value::Function(template.close_over(ctx.null_env.clone())));
        let v = eval_str(&ctx, "(my-macro 1)");
        assert_eq!(crate::writer::write_to_string(&v), "(got . 1)");
    }
}
