// ABOUTME: Fixnum/float arithmetic primitives (prims.c fx*/fp* families)

use crate::error;
use crate::value::Value;
use crate::vm::Vm;
use lisp_macros::primitive;

fn as_fixnum(vm: &Vm, name: &str, v: &Value) -> Result<i64, Value> {
    match v {
        Value::Fixnum(n) => Ok(*n),
        _ => Err(error::type_error(vm.ctx, name, "fixnum", v)),
    }
}

fn as_float(vm: &Vm, name: &str, v: &Value) -> Result<f64, Value> {
    match v {
        Value::Float(f) => Ok(**f),
        _ => Err(error::type_error(vm.ctx, name, "float", v)),
    }
}

/// `(fx+ a b)`: fixnum addition. The compiler may shortcut this to `ADDI`
/// directly at a saturated two-argument call site; this function is the
/// out-of-line fallback reached via a general `CALL`.
#[primitive(name = "fx+", arity = 2, shortcut = "Addi")]
pub fn fx_add(vm: &mut Vm, args: &[Value]) -> Value {
    let a = match as_fixnum(vm, "fx+", &args[0]) {
        Ok(n) => n,
        Err(e) => return e,
    };
    let b = match as_fixnum(vm, "fx+", &args[1]) {
        Ok(n) => n,
        Err(e) => return e,
    };
    match a.checked_add(b) {
        Some(r) => Value::Fixnum(r),
        None => error::arith_error(vm.ctx, "fx+: overflow"),
    }
}

#[primitive(name = "fx-", arity = 2, shortcut = "Subi")]
pub fn fx_sub(vm: &mut Vm, args: &[Value]) -> Value {
    let a = match as_fixnum(vm, "fx-", &args[0]) {
        Ok(n) => n,
        Err(e) => return e,
    };
    let b = match as_fixnum(vm, "fx-", &args[1]) {
        Ok(n) => n,
        Err(e) => return e,
    };
    match a.checked_sub(b) {
        Some(r) => Value::Fixnum(r),
        None => error::arith_error(vm.ctx, "fx-: overflow"),
    }
}

#[primitive(name = "fx*", arity = 2, shortcut = "Muli")]
pub fn fx_mul(vm: &mut Vm, args: &[Value]) -> Value {
    let a = match as_fixnum(vm, "fx*", &args[0]) {
        Ok(n) => n,
        Err(e) => return e,
    };
    let b = match as_fixnum(vm, "fx*", &args[1]) {
        Ok(n) => n,
        Err(e) => return e,
    };
    match a.checked_mul(b) {
        Some(r) => Value::Fixnum(r),
        None => error::arith_error(vm.ctx, "fx*: overflow"),
    }
}

#[primitive(name = "fx/", arity = 2, shortcut = "Divi")]
pub fn fx_div(vm: &mut Vm, args: &[Value]) -> Value {
    let a = match as_fixnum(vm, "fx/", &args[0]) {
        Ok(n) => n,
        Err(e) => return e,
    };
    let b = match as_fixnum(vm, "fx/", &args[1]) {
        Ok(n) => n,
        Err(e) => return e,
    };
    if b == 0 {
        return error::arith_error(vm.ctx, "fx/: division by zero");
    }
    Value::Fixnum(a / b)
}

#[primitive(name = "fx=", arity = 2)]
pub fn fx_eq(vm: &mut Vm, args: &[Value]) -> Value {
    let a = match as_fixnum(vm, "fx=", &args[0]) {
        Ok(n) => n,
        Err(e) => return e,
    };
    let b = match as_fixnum(vm, "fx=", &args[1]) {
        Ok(n) => n,
        Err(e) => return e,
    };
    Value::boolean(a == b)
}

#[primitive(name = "mod", arity = 2)]
pub fn fx_mod(vm: &mut Vm, args: &[Value]) -> Value {
    let a = match as_fixnum(vm, "mod", &args[0]) {
        Ok(n) => n,
        Err(e) => return e,
    };
    let b = match as_fixnum(vm, "mod", &args[1]) {
        Ok(n) => n,
        Err(e) => return e,
    };
    if b == 0 {
        return error::arith_error(vm.ctx, "mod: division by zero");
    }
    Value::Fixnum(a.rem_euclid(b))
}

#[primitive(name = "fp+", arity = 2)]
pub fn fp_add(vm: &mut Vm, args: &[Value]) -> Value {
    let a = match as_float(vm, "fp+", &args[0]) {
        Ok(n) => n,
        Err(e) => return e,
    };
    let b = match as_float(vm, "fp+", &args[1]) {
        Ok(n) => n,
        Err(e) => return e,
    };
    Value::Float(std::rc::Rc::new(a + b))
}

#[primitive(name = "fp-", arity = 2)]
pub fn fp_sub(vm: &mut Vm, args: &[Value]) -> Value {
    let a = match as_float(vm, "fp-", &args[0]) {
        Ok(n) => n,
        Err(e) => return e,
    };
    let b = match as_float(vm, "fp-", &args[1]) {
        Ok(n) => n,
        Err(e) => return e,
    };
    Value::Float(std::rc::Rc::new(a - b))
}

#[primitive(name = "fp*", arity = 2)]
pub fn fp_mul(vm: &mut Vm, args: &[Value]) -> Value {
    let a = match as_float(vm, "fp*", &args[0]) {
        Ok(n) => n,
        Err(e) => return e,
    };
    let b = match as_float(vm, "fp*", &args[1]) {
        Ok(n) => n,
        Err(e) => return e,
    };
    Value::Float(std::rc::Rc::new(a * b))
}

#[primitive(name = "fp/", arity = 2)]
pub fn fp_div(vm: &mut Vm, args: &[Value]) -> Value {
    let a = match as_float(vm, "fp/", &args[0]) {
        Ok(n) => n,
        Err(e) => return e,
    };
    let b = match as_float(vm, "fp/", &args[1]) {
        Ok(n) => n,
        Err(e) => return e,
    };
    if b == 0.0 {
        return error::arith_error(vm.ctx, "fp/: division by zero");
    }
    Value::Float(std::rc::Rc::new(a / b))
}

#[primitive(name = "fp=", arity = 2)]
pub fn fp_eq(vm: &mut Vm, args: &[Value]) -> Value {
    let a = match as_float(vm, "fp=", &args[0]) {
        Ok(n) => n,
        Err(e) => return e,
    };
    let b = match as_float(vm, "fp=", &args[1]) {
        Ok(n) => n,
        Err(e) => return e,
    };
    Value::boolean(a == b)
}

/// Numeric tower boundary (`prims.c` `lt_nt_convert`): promotes a fixnum
/// to a float; this is the only automatic conversion the core performs.
#[primitive(name = "fx->fp", arity = 1)]
pub fn fx_to_fp(vm: &mut Vm, args: &[Value]) -> Value {
    match as_fixnum(vm, "fx->fp", &args[0]) {
        Ok(n) => Value::Float(std::rc::Rc::new(n as f64)),
        Err(e) => e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn fx_add_adds_two_fixnums() {
        let ctx = Context::init();
        let mut vm = crate::vm::Vm::for_tests(&ctx);
        let r = fx_add(&mut vm, &[Value::Fixnum(2), Value::Fixnum(3)]);
        assert!(matches!(r, Value::Fixnum(5)));
    }

    #[test]
    fn fx_div_by_zero_raises_arith_exception() {
        let ctx = Context::init();
        let mut vm = crate::vm::Vm::for_tests(&ctx);
        let r = fx_div(&mut vm, &[Value::Fixnum(1), Value::Fixnum(0)]);
        assert!(r.is_signalled_exception());
    }
}
