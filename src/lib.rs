// ABOUTME: Library module exposing the host-facing API: init, read, compile, run, eval

pub mod compiler;
pub mod config;
pub mod context;
pub mod env;
pub mod error;
pub mod macroexpand;
pub mod opcode;
pub mod port;
pub mod primitives;
pub mod reader;
pub mod value;
pub mod vm;
pub mod writer;

pub use compiler::{compile_toplevel as compile, CompileError};
pub use context::Context;
pub use value::Value;

/// Build a fresh, independent interpreter context: packages, pre-interned
/// special-form symbols, standard ports and the primitive catalogue.
pub fn init() -> Context {
    Context::init()
}

/// Read a single form from `source`. Returns `Value::Eof` at end of input
/// and a raised `Value::Exception` on malformed syntax (§4.1).
pub fn read(ctx: &Context, source: &str) -> Value {
    reader::read(ctx, &port::InputPort::from_str(source))
}

/// Run a compiled code object to completion in the given environment.
pub fn run(ctx: &Context, code: std::rc::Rc<opcode::CodeObject>, env: env::Environment) -> Value {
    vm::run(ctx, code, env)
}

/// Read, compile and run every form in `source`, returning the value of
/// the last one (or `Value::Eof` if `source` contains no forms).
pub fn eval(ctx: &Context, source: &str) -> Value {
    let in_port = port::InputPort::from_str(source);
    let mut result = Value::Eof;
    loop {
        let form = reader::read(ctx, &in_port);
        if matches!(form, Value::Eof) {
            return result;
        }
        if form.is_signalled_exception() {
            return form;
        }
        match compiler::compile_toplevel(ctx, form) {
            Ok(code) => result = vm::run(ctx, code, ctx.null_env.clone()),
            Err(CompileError::Signalled(v)) => return v,
            Err(CompileError::Fatal(e)) => {
                return error::raise(ctx, error::TAG_TYPE_ERROR, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_runs_every_top_level_form_and_returns_the_last_value() {
        let ctx = init();
        let result = eval(&ctx, "(set x 1) (fx+ x 41)");
        assert!(matches!(result, Value::Fixnum(42)));
    }

    #[test]
    fn eval_surfaces_a_raised_exception_as_the_result() {
        let ctx = init();
        let result = eval(&ctx, "(signal \"boom\")");
        assert!(result.is_signalled_exception());
    }
}
