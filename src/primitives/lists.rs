// ABOUTME: Pair/list primitives (prims.c head/tail/cons family; object.c Pair field names)

use crate::error;
use crate::value::{Pair, Value};
use crate::vm::Vm;
use lisp_macros::primitive;

fn as_pair<'a>(vm: &Vm, name: &str, v: &'a Value) -> Result<&'a Pair, Value> {
    match v {
        Value::Pair(p) => Ok(p),
        _ => Err(error::type_error(vm.ctx, name, "pair", v)),
    }
}

#[primitive(name = "cons", arity = 2, shortcut = "Cons")]
pub fn cons(_vm: &mut Vm, args: &[Value]) -> Value {
    Value::Pair(Pair::new(args[0].clone(), args[1].clone()))
}

/// `(head p)`: the original's name for `car`, matching `PairData.head`.
/// Declares its signature so the compiler front-loads a CHKTYPE ahead of
/// the call (§4.3); `as_pair` below still guards the body, so disabling
/// type-checking (`switch-type-check`) loses only the earlier failure
/// point, not the check itself.
#[primitive(name = "head", arity = 1, signature(Pair))]
pub fn head(vm: &mut Vm, args: &[Value]) -> Value {
    match as_pair(vm, "head", &args[0]) {
        Ok(p) => p.head(),
        Err(e) => e,
    }
}

#[primitive(name = "tail", arity = 1, signature(Pair))]
pub fn tail(vm: &mut Vm, args: &[Value]) -> Value {
    match as_pair(vm, "tail", &args[0]) {
        Ok(p) => p.tail(),
        Err(e) => e,
    }
}

#[primitive(name = "set-head", arity = 2, signature(Pair))]
pub fn set_head(vm: &mut Vm, args: &[Value]) -> Value {
    match as_pair(vm, "set-head", &args[0]) {
        Ok(p) => {
            p.set_head(args[1].clone());
            args[0].clone()
        }
        Err(e) => e,
    }
}

#[primitive(name = "set-tail", arity = 2, signature(Pair))]
pub fn set_tail(vm: &mut Vm, args: &[Value]) -> Value {
    match as_pair(vm, "set-tail", &args[0]) {
        Ok(p) => {
            p.set_tail(args[1].clone());
            args[0].clone()
        }
        Err(e) => e,
    }
}

/// `(list a b c...)`: the rest-packing machinery in `Vm::do_call` (arity 0,
/// `restp`) already builds the proper list out of every supplied argument;
/// this function only needs to hand it back.
#[primitive(name = "list", arity = 0, restp = true)]
pub fn list(_vm: &mut Vm, args: &[Value]) -> Value {
    args[0].clone()
}

#[primitive(name = "length", arity = 1)]
pub fn length(vm: &mut Vm, args: &[Value]) -> Value {
    let mut n = 0i64;
    let mut cur = args[0].clone();
    loop {
        match cur {
            Value::EmptyList => return Value::Fixnum(n),
            Value::Pair(p) => {
                n += 1;
                cur = p.tail();
            }
            other => return error::type_error(vm.ctx, "length", "pair or empty-list", &other),
        }
    }
}

/// `(append a b)`: copies the spine of `a`, ending in `b`. Used directly by
/// the compiler's quasiquote desugaring for `,@`.
#[primitive(name = "append", arity = 2)]
pub fn append(vm: &mut Vm, args: &[Value]) -> Value {
    let items = match list_to_vec(vm, &args[0]) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut result = args[1].clone();
    for item in items.into_iter().rev() {
        result = Value::Pair(Pair::new(item, result));
    }
    result
}

fn list_to_vec(vm: &Vm, v: &Value) -> Result<Vec<Value>, Value> {
    let mut out = Vec::new();
    let mut cur = v.clone();
    loop {
        match cur {
            Value::EmptyList => return Ok(out),
            Value::Pair(p) => {
                out.push(p.head());
                cur = p.tail();
            }
            other => return Err(error::type_error(vm.ctx, "append", "proper list", &other)),
        }
    }
}

/// `(list-reverse! l)`: destructive in-place reversal (`prims.c`
/// `lt_list_reverse`), returning the new head.
#[primitive(name = "list-reverse!", arity = 1)]
pub fn list_reverse_bang(_vm: &mut Vm, args: &[Value]) -> Value {
    let mut prev = Value::EmptyList;
    let mut cur = args[0].clone();
    while let Value::Pair(p) = cur {
        let next = p.tail();
        p.set_tail(prev);
        prev = Value::Pair(p);
        cur = next;
    }
    prev
}

#[primitive(name = "list->vector", arity = 1)]
pub fn list_to_vector(vm: &mut Vm, args: &[Value]) -> Value {
    match list_to_vec(vm, &args[0]) {
        Ok(items) => Value::Vector(crate::value::LispVector::from_values(items)),
        Err(e) => e,
    }
}

#[primitive(name = "vector->list", arity = 1)]
pub fn vector_to_list(vm: &mut Vm, args: &[Value]) -> Value {
    match &args[0] {
        Value::Vector(vec) => {
            let mut out = Value::EmptyList;
            for i in (0..vec.len()).rev() {
                out = Value::Pair(Pair::new(vec.get(i).unwrap(), out));
            }
            out
        }
        other => error::type_error(vm.ctx, "vector->list", "vector", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn head_and_tail_read_the_pair() {
        let ctx = Context::init();
        let mut vm = crate::vm::Vm::for_tests(&ctx);
        let p = Value::Pair(Pair::new(Value::Fixnum(1), Value::Fixnum(2)));
        assert!(matches!(head(&mut vm, &[p.clone()]), Value::Fixnum(1)));
        assert!(matches!(tail(&mut vm, &[p]), Value::Fixnum(2)));
    }

    #[test]
    fn list_reverse_bang_reverses_in_place() {
        let ctx = Context::init();
        let mut vm = crate::vm::Vm::for_tests(&ctx);
        let l = Value::Pair(Pair::new(
            Value::Fixnum(1),
            Value::Pair(Pair::new(Value::Fixnum(2), Value::EmptyList)),
        ));
        let r = list_reverse_bang(&mut vm, &[l]);
        assert_eq!(crate::writer::write_to_string(&r), "(2 1)");
    }

    #[test]
    fn append_copies_first_list_onto_second() {
        let ctx = Context::init();
        let mut vm = crate::vm::Vm::for_tests(&ctx);
        let a = Value::Pair(Pair::new(Value::Fixnum(1), Value::EmptyList));
        let b = Value::Pair(Pair::new(Value::Fixnum(2), Value::EmptyList));
        let r = append(&mut vm, &[a, b]);
        assert_eq!(crate::writer::write_to_string(&r), "(1 2)");
    }
}
