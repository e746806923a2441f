// ABOUTME: Type predicates and reflection primitives (prims.c type-of/of-type?/type-name)

use crate::error;
use crate::value::{TypeTag, Value};
use crate::vm::Vm;
use lisp_macros::primitive;

#[primitive(name = "type-of", arity = 1)]
pub fn type_of(_vm: &mut Vm, args: &[Value]) -> Value {
    Value::Type(args[0].type_tag())
}

#[primitive(name = "type-name", arity = 1)]
pub fn type_name(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::Type(t) => Value::string(t.name()),
        other => error::type_error(vm.ctx, "type-name", "type", other),
    }
}

#[primitive(name = "of-type?", arity = 2)]
pub fn of_type_p(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[1] {
        Value::Type(t) => Value::boolean(args[0].type_tag() == *t),
        other => error::type_error(vm.ctx, "of-type?", "type", other),
    }
}

#[primitive(name = "number?", arity = 1)]
pub fn number_p(_vm: &mut Vm, args: &[Value]) -> Value {
    Value::boolean(args[0].is_number())
}

#[primitive(name = "fixnum?", arity = 1)]
pub fn fixnum_p(_vm: &mut Vm, args: &[Value]) -> Value {
    Value::boolean(matches!(args[0].type_tag(), TypeTag::Fixnum))
}

#[primitive(name = "flonum?", arity = 1)]
pub fn flonum_p(_vm: &mut Vm, args: &[Value]) -> Value {
    Value::boolean(matches!(args[0].type_tag(), TypeTag::Float))
}

#[primitive(name = "string?", arity = 1)]
pub fn string_p(_vm: &mut Vm, args: &[Value]) -> Value {
    Value::boolean(matches!(args[0].type_tag(), TypeTag::String))
}

#[primitive(name = "symbol?", arity = 1)]
pub fn symbol_p(_vm: &mut Vm, args: &[Value]) -> Value {
    Value::boolean(matches!(args[0].type_tag(), TypeTag::Symbol))
}

#[primitive(name = "pair?", arity = 1)]
pub fn pair_p(_vm: &mut Vm, args: &[Value]) -> Value {
    Value::boolean(args[0].is_pair())
}

/// `(list? v)`: true for a proper cons or the empty list — not merely
/// `pair?`, which excludes `()`.
#[primitive(name = "list?", arity = 1)]
pub fn list_p(_vm: &mut Vm, args: &[Value]) -> Value {
    Value::boolean(args[0].is_pair() || args[0].is_null())
}

#[primitive(name = "nil?", arity = 1)]
pub fn nil_p(_vm: &mut Vm, args: &[Value]) -> Value {
    Value::boolean(args[0].is_null())
}

#[primitive(name = "bool?", arity = 1)]
pub fn bool_p(_vm: &mut Vm, args: &[Value]) -> Value {
    Value::boolean(matches!(args[0].type_tag(), TypeTag::Bool))
}

#[primitive(name = "function?", arity = 1)]
pub fn function_p(_vm: &mut Vm, args: &[Value]) -> Value {
    Value::boolean(matches!(
        args[0].type_tag(),
        TypeTag::Function | TypeTag::Primitive
    ))
}

#[primitive(name = "vector?", arity = 1)]
pub fn vector_p(_vm: &mut Vm, args: &[Value]) -> Value {
    Value::boolean(matches!(args[0].type_tag(), TypeTag::Vector))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn of_type_p_matches_type_of_result() {
        let ctx = Context::init();
        let mut vm = crate::vm::Vm::for_tests(&ctx);
        let t = type_of(&mut vm, &[Value::Fixnum(1)]);
        assert!(matches!(
            of_type_p(&mut vm, &[Value::Fixnum(7), t]),
            Value::True
        ));
    }

    #[test]
    fn list_p_accepts_empty_list_but_not_pair_exclusively() {
        let ctx = Context::init();
        let mut vm = crate::vm::Vm::for_tests(&ctx);
        assert!(matches!(list_p(&mut vm, &[Value::EmptyList]), Value::True));
        assert!(matches!(pair_p(&mut vm, &[Value::EmptyList]), Value::False));
    }
}
