// ABOUTME: Reflection, package/symbol, vector, string and apply/eval primitives (prims.c misc groups)

use crate::compiler::{compile_toplevel, CompileError};
use crate::error;
use crate::value::{LispVector, Value};
use crate::vm::Vm;
use lisp_macros::primitive;

/// `(apply f args)`: dispatch `f` over a Lisp list of arguments without
/// going through the compiler (`prims.c` `lt_simple_apply`); grounds the
/// macro expander's and higher-order bootstrap functions' need to invoke a
/// first-class function value from native code.
#[primitive(name = "apply", arity = 2)]
pub fn apply(vm: &mut Vm, args: &[Value]) -> Value {
    let mut list = Vec::new();
    let mut cur = args[1].clone();
    loop {
        match cur {
            Value::EmptyList => break,
            Value::Pair(p) => {
                list.push(p.head());
                cur = p.tail();
            }
            other => return error::type_error(vm.ctx, "apply", "proper list", &other),
        }
    }
    vm.call_value(args[0].clone(), list)
}

/// `(eval expr)`: compile `expr` fresh (in the null environment, no
/// lexical frame) and run it to completion.
#[primitive(name = "eval", arity = 1)]
pub fn eval(vm: &mut Vm, args: &[Value]) -> Value {
    match compile_toplevel(vm.ctx, args[0].clone()) {
        Ok(code) => crate::vm::run(vm.ctx, code, vm.ctx.null_env.clone()),
        Err(CompileError::Signalled(v)) => v,
        Err(CompileError::Fatal(e)) => error::raise(vm.ctx, error::TAG_TYPE_ERROR, e.to_string()),
    }
}

/// `(expand-macro form)`: one step of macro expansion, exposed so the
/// bootstrap library can inspect what a macro call compiles to.
#[primitive(name = "expand-macro", arity = 1)]
pub fn expand_macro(vm: &mut Vm, args: &[Value]) -> Value {
    let Value::Pair(p) = &args[0] else {
        return args[0].clone();
    };
    let Value::Symbol(s) = p.head() else {
        return args[0].clone();
    };
    if !s.is_macro() {
        return args[0].clone();
    }
    let Value::Function(macro_fn) = s.get_macro() else {
        return error::type_error(vm.ctx, "expand-macro", "function", &s.get_macro());
    };
    let mut call_args = Vec::new();
    let mut cur = p.tail();
    while let Value::Pair(cp) = cur {
        call_args.push(cp.head());
        cur = cp.tail();
    }
    crate::macroexpand::expand_once(vm.ctx, &macro_fn, &call_args)
}

#[primitive(name = "gensym", arity = 0, restp = true)]
pub fn gensym(vm: &mut Vm, _args: &[Value]) -> Value {
    Value::Symbol(vm.ctx.gensym("G"))
}

#[primitive(name = "bound?", arity = 1)]
pub fn bound_p(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::Symbol(s) => Value::boolean(s.is_bound()),
        other => error::type_error(vm.ctx, "bound?", "symbol", other),
    }
}

#[primitive(name = "symbol-value", arity = 1)]
pub fn symbol_value(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::Symbol(s) if s.is_bound() => s.get_value(),
        Value::Symbol(s) => error::unbound_error(vm.ctx, s.name()),
        other => error::type_error(vm.ctx, "symbol-value", "symbol", other),
    }
}

#[primitive(name = "set-symbol-value!", arity = 2)]
pub fn set_symbol_value(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::Symbol(s) => {
            s.set_value(args[1].clone());
            args[1].clone()
        }
        other => error::type_error(vm.ctx, "set-symbol-value!", "symbol", other),
    }
}

#[primitive(name = "symbol-name", arity = 1)]
pub fn symbol_name(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::Symbol(s) => Value::string(s.name()),
        other => error::type_error(vm.ctx, "symbol-name", "symbol", other),
    }
}

#[primitive(name = "symbol-package", arity = 1)]
pub fn symbol_package(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::Symbol(s) => s
            .0
            .package
            .borrow()
            .clone()
            .unwrap_or(Value::False),
        other => error::type_error(vm.ctx, "symbol-package", "symbol", other),
    }
}

#[primitive(name = "intern", arity = 1)]
pub fn intern(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::String(s) => Value::Symbol(vm.ctx.current_package().find_or_create_symbol(s)),
        other => error::type_error(vm.ctx, "intern", "string", other),
    }
}

#[primitive(name = "in-package", arity = 1)]
pub fn in_package(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::Package(p) => {
            vm.ctx.set_current_package(p.clone());
            args[0].clone()
        }
        other => error::type_error(vm.ctx, "in-package", "package", other),
    }
}

#[primitive(name = "make-package", arity = 1)]
pub fn make_package(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::String(s) => Value::Package(crate::value::Package::new(s.to_string())),
        other => error::type_error(vm.ctx, "make-package", "string", other),
    }
}

#[primitive(name = "package-name", arity = 1)]
pub fn package_name(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::Package(p) => Value::string(p.name()),
        other => error::type_error(vm.ctx, "package-name", "package", other),
    }
}

#[primitive(name = "function-name", arity = 1)]
pub fn function_name(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::Function(f) => f
            .0
            .name
            .borrow()
            .clone()
            .map(Value::string)
            .unwrap_or(Value::False),
        other => error::type_error(vm.ctx, "function-name", "function", other),
    }
}

#[primitive(name = "set-function-name!", arity = 2)]
pub fn set_function_name(vm: &mut Vm, args: &[Value]) -> Value {
    let (Value::Function(f), Value::String(name)) = (&args[0], &args[1]) else {
        return error::type_error(vm.ctx, "set-function-name!", "function, string", &args[0]);
    };
    *f.0.name.borrow_mut() = Some(name.to_string());
    args[0].clone()
}

#[primitive(name = "function-arity", arity = 1)]
pub fn function_arity(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::Function(f) => Value::Fixnum(f.0.params.arity() as i64),
        other => error::type_error(vm.ctx, "function-arity", "function", other),
    }
}

#[primitive(name = "vector-ref", arity = 2)]
pub fn vector_ref(vm: &mut Vm, args: &[Value]) -> Value {
    let (Value::Vector(v), Value::Fixnum(i)) = (&args[0], &args[1]) else {
        return error::type_error(vm.ctx, "vector-ref", "vector, fixnum", &args[0]);
    };
    v.get(*i as usize)
        .unwrap_or_else(|| error::raise(vm.ctx, error::TAG_TYPE_ERROR, "vector-ref: index out of range"))
}

#[primitive(name = "vector-set!", arity = 3)]
pub fn vector_set(vm: &mut Vm, args: &[Value]) -> Value {
    let (Value::Vector(v), Value::Fixnum(i)) = (&args[0], &args[1]) else {
        return error::type_error(vm.ctx, "vector-set!", "vector, fixnum", &args[0]);
    };
    if v.set(*i as usize, args[2].clone()) {
        args[2].clone()
    } else {
        error::raise(vm.ctx, error::TAG_TYPE_ERROR, "vector-set!: index out of range")
    }
}

#[primitive(name = "vector-length", arity = 1)]
pub fn vector_length(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::Vector(v) => Value::Fixnum(v.len() as i64),
        other => error::type_error(vm.ctx, "vector-length", "vector", other),
    }
}

#[primitive(name = "vector-push", arity = 2)]
pub fn vector_push(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::Vector(v) => {
            v.push_extend(args[1].clone());
            args[0].clone()
        }
        other => error::type_error(vm.ctx, "vector-push", "vector", other),
    }
}

#[primitive(name = "vector-push-extend", arity = 2)]
pub fn vector_push_extend(vm: &mut Vm, args: &[Value]) -> Value {
    vector_push(vm, args)
}

#[primitive(name = "vector-pop", arity = 1)]
pub fn vector_pop(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::Vector(v) => v
            .pop()
            .unwrap_or_else(|| error::raise(vm.ctx, error::TAG_TYPE_ERROR, "vector-pop: empty vector")),
        other => error::type_error(vm.ctx, "vector-pop", "vector", other),
    }
}

#[primitive(name = "string-length", arity = 1)]
pub fn string_length(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::String(s) => Value::Fixnum(s.len() as i64),
        other => error::type_error(vm.ctx, "string-length", "string", other),
    }
}

#[primitive(name = "char-at", arity = 2)]
pub fn char_at(vm: &mut Vm, args: &[Value]) -> Value {
    let (Value::String(s), Value::Fixnum(i)) = (&args[0], &args[1]) else {
        return error::type_error(vm.ctx, "char-at", "string, fixnum", &args[0]);
    };
    s.as_bytes()
        .get(*i as usize)
        .map(|b| Value::Character(*b))
        .unwrap_or_else(|| error::raise(vm.ctx, error::TAG_TYPE_ERROR, "char-at: index out of range"))
}

#[primitive(name = "char-code", arity = 1)]
pub fn char_code(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::Character(c) => Value::Fixnum(*c as i64),
        other => error::type_error(vm.ctx, "char-code", "character", other),
    }
}

#[primitive(name = "code-char", arity = 1)]
pub fn code_char(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::Fixnum(n) if (0..=255).contains(n) => Value::Character(*n as u8),
        other => error::type_error(vm.ctx, "code-char", "fixnum in 0..255", other),
    }
}

#[primitive(name = "read-from-string", arity = 1)]
pub fn read_from_string(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::String(s) => crate::reader::read(vm.ctx, &crate::port::InputPort::from_str(s)),
        other => error::type_error(vm.ctx, "read-from-string", "string", other),
    }
}

#[primitive(name = "make-vector", arity = 1)]
pub fn make_vector(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::Fixnum(n) if *n >= 0 => Value::Vector(LispVector::new(*n as usize)),
        other => error::type_error(vm.ctx, "make-vector", "non-negative fixnum", other),
    }
}

#[primitive(name = "switch-debug", arity = 1)]
pub fn switch_debug(vm: &mut Vm, args: &[Value]) -> Value {
    vm.ctx.debug.set(args[0].is_truthy());
    args[0].clone()
}

#[primitive(name = "switch-type-check", arity = 1)]
pub fn switch_type_check(vm: &mut Vm, args: &[Value]) -> Value {
    vm.ctx.check_types.set(args[0].is_truthy());
    args[0].clone()
}

#[primitive(name = "switch-exception-check", arity = 1)]
pub fn switch_exception_check(vm: &mut Vm, args: &[Value]) -> Value {
    vm.ctx.check_exceptions.set(args[0].is_truthy());
    args[0].clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::value::Pair;

    #[test]
    fn apply_dispatches_a_closure_over_a_lisp_list() {
        let ctx = Context::init();
        let code = compile_toplevel(&ctx, crate::reader::read(&ctx, &crate::port::InputPort::from_str("(lambda (x y) (fx+ x y))"))).unwrap();
        let template = match crate::vm::run(&ctx, code, ctx.null_env.clone()) {
            Value::Function(f) => f,
            other => panic!("expected function, got {other:?}"),
        };
        let closed = Value::Function(template.close_over(ctx.null_env.clone()));
        let mut vm = crate::vm::Vm::for_tests(&ctx);
        let list = Value::Pair(Pair::new(
            Value::Fixnum(2),
            Value::Pair(Pair::new(Value::Fixnum(3), Value::EmptyList)),
        ));
        let result = apply(&mut vm, &[closed, list]);
        assert!(matches!(result, Value::Fixnum(5)));
    }

    #[test]
    fn vector_ref_out_of_range_raises_exception() {
        let ctx = Context::init();
        let mut vm = crate::vm::Vm::for_tests(&ctx);
        let v = Value::Vector(LispVector::new(1));
        let r = vector_ref(&mut vm, &[v, Value::Fixnum(5)]);
        assert!(r.is_signalled_exception());
    }
}
