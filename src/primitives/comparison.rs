// ABOUTME: Cross-type equality and mixed-numeric ordering primitives

use crate::error;
use crate::value::Value;
use crate::vm::Vm;
use lisp_macros::primitive;

fn numeric_value(v: &Value) -> Option<f64> {
    match v {
        Value::Fixnum(n) => Some(*n as f64),
        Value::Float(f) => Some(**f),
        _ => None,
    }
}

/// `(eq? a b)`: pointer/word identity (§3.3).
#[primitive(name = "eq?", arity = 2)]
pub fn eq_p(_vm: &mut Vm, args: &[Value]) -> Value {
    Value::boolean(args[0].eq_identity(&args[1]))
}

/// `(eql? a b)`: identical to `eq?` in this core (no bignums to box
/// distinctly from small fixnums); kept as a separate primitive because
/// the original catalogue names both.
#[primitive(name = "eql?", arity = 2)]
pub fn eql_p(_vm: &mut Vm, args: &[Value]) -> Value {
    Value::boolean(args[0].eq_identity(&args[1]))
}

/// `(equal? a b)`: structural equality, recursing into pairs/vectors/strings.
#[primitive(name = "equal?", arity = 2)]
pub fn equal_p(_vm: &mut Vm, args: &[Value]) -> Value {
    Value::boolean(args[0].equal(&args[1]))
}

/// `(> a b)`: mixed fixnum/float ordering, coercing rather than requiring
/// matching numeric types (`prims.c` `lt_gt`).
#[primitive(name = ">", arity = 2)]
pub fn num_gt(vm: &mut Vm, args: &[Value]) -> Value {
    match (numeric_value(&args[0]), numeric_value(&args[1])) {
        (Some(a), Some(b)) => Value::boolean(a > b),
        _ => error::type_error(vm.ctx, ">", "number", &args[0]),
    }
}

#[primitive(name = "<", arity = 2)]
pub fn num_lt(vm: &mut Vm, args: &[Value]) -> Value {
    match (numeric_value(&args[0]), numeric_value(&args[1])) {
        (Some(a), Some(b)) => Value::boolean(a < b),
        _ => error::type_error(vm.ctx, "<", "number", &args[0]),
    }
}

#[primitive(name = ">=", arity = 2)]
pub fn num_ge(vm: &mut Vm, args: &[Value]) -> Value {
    match (numeric_value(&args[0]), numeric_value(&args[1])) {
        (Some(a), Some(b)) => Value::boolean(a >= b),
        _ => error::type_error(vm.ctx, ">=", "number", &args[0]),
    }
}

#[primitive(name = "<=", arity = 2)]
pub fn num_le(vm: &mut Vm, args: &[Value]) -> Value {
    match (numeric_value(&args[0]), numeric_value(&args[1])) {
        (Some(a), Some(b)) => Value::boolean(a <= b),
        _ => error::type_error(vm.ctx, "<=", "number", &args[0]),
    }
}

/// `(= a b)`: mixed-numeric equality (`prims.c` `lt_numeric_eq`), distinct
/// from `eq?`/`equal?` in that it coerces fixnum/float.
#[primitive(name = "=", arity = 2)]
pub fn num_eq(vm: &mut Vm, args: &[Value]) -> Value {
    match (numeric_value(&args[0]), numeric_value(&args[1])) {
        (Some(a), Some(b)) => Value::boolean(a == b),
        _ => error::type_error(vm.ctx, "=", "number", &args[0]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn mixed_numeric_equality_coerces_fixnum_and_float() {
        let ctx = Context::init();
        let mut vm = crate::vm::Vm::for_tests(&ctx);
        let r = num_eq(&mut vm, &[Value::Fixnum(2), Value::Float(std::rc::Rc::new(2.0))]);
        assert!(matches!(r, Value::True));
    }

    #[test]
    fn equal_p_recurses_structurally() {
        let ctx = Context::init();
        let mut vm = crate::vm::Vm::for_tests(&ctx);
        let a = Value::string("hi");
        let b = Value::string("hi");
        assert!(matches!(equal_p(&mut vm, &[a, b]), Value::True));
    }
}
