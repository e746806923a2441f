// ABOUTME: User-facing exception primitives (prims.c init_prim_exception: signal/exception-tag)

use crate::error;
use crate::value::Value;
use crate::vm::Vm;
use lisp_macros::primitive;

/// `(signal message)`: raise a user exception tagged `USER`. Grounds the
/// `(catch 'e (signal "boom"))` end-to-end scenario.
#[primitive(name = "signal", arity = 1)]
pub fn signal(vm: &mut Vm, args: &[Value]) -> Value {
    let message = match &args[0] {
        Value::String(s) => s.to_string(),
        other => crate::writer::write_to_string(other),
    };
    error::signal_user(vm.ctx, message)
}

#[primitive(name = "exception-tag", arity = 1)]
pub fn exception_tag(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::Exception(e) => Value::Symbol(e.0.tag.clone()),
        other => error::type_error(vm.ctx, "exception-tag", "exception", other),
    }
}

#[primitive(name = "exception-message", arity = 1)]
pub fn exception_message(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::Exception(e) => Value::string(e.0.message.clone()),
        other => error::type_error(vm.ctx, "exception-message", "exception", other),
    }
}

#[primitive(name = "error?", arity = 1)]
pub fn error_p(_vm: &mut Vm, args: &[Value]) -> Value {
    Value::boolean(matches!(&args[0], Value::Exception(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn signal_raises_a_user_tagged_exception() {
        let ctx = Context::init();
        let mut vm = crate::vm::Vm::for_tests(&ctx);
        let v = signal(&mut vm, &[Value::string("boom")]);
        assert!(v.is_signalled_exception());
        let tag = exception_tag(&mut vm, &[v]);
        assert_eq!(crate::writer::write_to_string(&tag), "USER");
    }
}
