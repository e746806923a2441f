// ABOUTME: The primitive catalogue (out of core scope per spec, required to run): registration and dispatch plumbing

use crate::context::Context;
use crate::opcode::Op;
use crate::value::{Primitive, PrimitiveData, TypeTag, Value};
use std::rc::Rc;

/// Static description of one primitive, submitted by `#[primitive]` at
/// every definition site and collected by `inventory` so `install` needs
/// no hand-maintained list of every category/function.
pub struct PrimitiveDescriptor {
    pub name: &'static str,
    pub arity: usize,
    pub restp: bool,
    pub func: fn(&mut crate::vm::Vm<'_>, &[Value]) -> Value,
    pub signature: &'static [TypeTag],
    pub shortcut: Option<Op>,
}

inventory::collect!(PrimitiveDescriptor);

pub mod arithmetic;
pub mod comparison;
pub mod console;
pub mod exceptions;
pub mod lists;
pub mod logic;
pub mod system;
pub mod types;

/// Bind every collected primitive into the `Lisp` package (§6: "install
/// primitives and their... bindings"). A primitive lives in its symbol's
/// *value* cell, exactly like any other global binding — `GVAR`/`CALL`
/// dispatch and the compiler's opcode-shortcut lookup both read it there.
pub fn install(ctx: &Context) {
    for d in inventory::iter::<PrimitiveDescriptor> {
        let sym = ctx.lisp_package.find_or_create_symbol(d.name);
        sym.set_value(Value::Primitive(Primitive(Rc::new(PrimitiveData {
            name: d.name,
            arity: d.arity,
            restp: d.restp,
            func: d.func,
            signature: d.signature.to_vec(),
            shortcut: d.shortcut,
        }))));
    }
}
