// ABOUTME: Output primitives over the standard output port (prims.c write-object/write-string/write-char)

use crate::error;
use crate::value::Value;
use crate::vm::Vm;
use crate::writer::write_to_string;
use lisp_macros::primitive;

fn as_output_port<'a>(vm: &Vm, name: &str, v: &'a Value) -> Result<&'a crate::port::OutputPort, Value> {
    match v {
        Value::OutputPort(p) => Ok(p),
        _ => Err(error::type_error(vm.ctx, name, "output-file", v)),
    }
}

/// `(write-object v port)`: print `v` in re-readable form (§6 writer).
#[primitive(name = "write-object", arity = 2)]
pub fn write_object(vm: &mut Vm, args: &[Value]) -> Value {
    match as_output_port(vm, "write-object", &args[1]) {
        Ok(port) => {
            port.write_str(&write_to_string(&args[0]));
            args[0].clone()
        }
        Err(e) => e,
    }
}

#[primitive(name = "write-string", arity = 2)]
pub fn write_string(vm: &mut Vm, args: &[Value]) -> Value {
    let Value::String(s) = &args[0] else {
        return error::type_error(vm.ctx, "write-string", "string", &args[0]);
    };
    match as_output_port(vm, "write-string", &args[1]) {
        Ok(port) => {
            port.write_str(s);
            args[0].clone()
        }
        Err(e) => e,
    }
}

#[primitive(name = "write-char", arity = 2)]
pub fn write_char(vm: &mut Vm, args: &[Value]) -> Value {
    let Value::Character(c) = &args[0] else {
        return error::type_error(vm.ctx, "write-char", "character", &args[0]);
    };
    match as_output_port(vm, "write-char", &args[1]) {
        Ok(port) => {
            port.write_str(&(*c as char).to_string());
            args[0].clone()
        }
        Err(e) => e,
    }
}

#[primitive(name = "newline", arity = 1)]
pub fn newline(vm: &mut Vm, args: &[Value]) -> Value {
    match as_output_port(vm, "newline", &args[0]) {
        Ok(port) => {
            port.write_str("\n");
            Value::Undefined
        }
        Err(e) => e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::port::OutputPort;

    #[test]
    fn write_object_writes_the_readable_form() {
        let ctx = Context::init();
        let mut vm = crate::vm::Vm::for_tests(&ctx);
        let port = OutputPort::buffer();
        write_object(&mut vm, &[Value::Fixnum(42), Value::OutputPort(port.clone())]);
        assert_eq!(port.contents(), "42");
    }
}
