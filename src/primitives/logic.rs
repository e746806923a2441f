// ABOUTME: Boolean primitives (prims.c `or`; no short-circuiting: arguments are ordinary calls, already evaluated)

use crate::value::Value;
use crate::vm::Vm;
use lisp_macros::primitive;

fn to_vec(list: &Value) -> Vec<Value> {
    let mut out = Vec::new();
    let mut cur = list.clone();
    while let Value::Pair(p) = cur {
        out.push(p.head());
        cur = p.tail();
    }
    out
}

/// `(and a b c...)`: every argument is an ordinary call argument and is
/// therefore already evaluated before `and` runs (this core's `and`/`or`
/// are primitives, not short-circuiting special forms; the compiler's
/// special-form table in §4.3 does not list them). Returns `#f` if any
/// argument is false, else the last argument.
#[primitive(name = "and", arity = 0, restp = true)]
pub fn and(_vm: &mut Vm, args: &[Value]) -> Value {
    let items = to_vec(&args[0]);
    if items.is_empty() {
        return Value::True;
    }
    if items.iter().any(|v| !v.is_truthy()) {
        return Value::False;
    }
    items.last().cloned().unwrap()
}

/// `(or a b c...)`: returns the first truthy argument, or `#f`.
#[primitive(name = "or", arity = 0, restp = true)]
pub fn or(_vm: &mut Vm, args: &[Value]) -> Value {
    let items = to_vec(&args[0]);
    items
        .into_iter()
        .find(|v| v.is_truthy())
        .unwrap_or(Value::False)
}

#[primitive(name = "not", arity = 1)]
pub fn not(_vm: &mut Vm, args: &[Value]) -> Value {
    Value::boolean(!args[0].is_truthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn not_negates_truthiness() {
        let ctx = Context::init();
        let mut vm = crate::vm::Vm::for_tests(&ctx);
        assert!(matches!(not(&mut vm, &[Value::False]), Value::True));
        assert!(matches!(not(&mut vm, &[Value::Fixnum(0)]), Value::False));
    }
}
