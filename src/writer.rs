// ABOUTME: The writer: prints values in a form the reader can read back (§6)

use crate::value::Value;
use std::fmt::Write as _;

/// Print `v` in re-readable form, except for closures, ports, exceptions,
/// retaddrs and opcodes, which print in `#<...>` form.
pub fn write_to_string(v: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, v);
    out
}

fn write_value(out: &mut String, v: &Value) {
    match v {
        Value::Fixnum(n) => {
            let _ = write!(out, "{n}");
        }
        Value::Float(f) => {
            let _ = write!(out, "{f}");
        }
        Value::Character(c) => write_character(out, *c),
        Value::False => out.push_str("#f"),
        Value::True => out.push_str("#t"),
        Value::EmptyList => out.push_str("()"),
        Value::Eof => out.push_str("#<eof>"),
        Value::Undefined => out.push_str("#<undefined>"),
        Value::CloseParen => out.push_str("#<close-paren>"),
        Value::String(s) => write_string(out, s),
        Value::Symbol(s) => out.push_str(s.name()),
        Value::Package(p) => {
            let _ = write!(out, "#<package {}>", p.name());
        }
        Value::Pair(_) => write_pair(out, v),
        Value::Vector(vec) => {
            out.push('[');
            for i in 0..vec.len() {
                if i > 0 {
                    out.push(' ');
                }
                write_value(out, &vec.get(i).unwrap());
            }
            out.push(']');
        }
        Value::Function(f) => {
            let name = f.0.name.borrow();
            match name.as_deref() {
                Some(n) => {
                    let _ = write!(out, "#<function {n}>");
                }
                None => out.push_str("#<function>"),
            }
        }
        Value::Primitive(p) => {
            let _ = write!(out, "#<primitive-function {}>", p.0.name);
        }
        Value::Environment(_) => out.push_str("#<environment>"),
        Value::Exception(e) => {
            let _ = write!(out, "#<exception {}: {}>", e.0.tag.name(), e.0.message);
        }
        Value::Retaddr(_) => out.push_str("#<retaddr>"),
        Value::Opcode(instr) => {
            let _ = write!(out, "#<opcode {}>", instr.op.mnemonic());
        }
        Value::Type(t) => {
            let _ = write!(out, "#<type {}>", t.name());
        }
        Value::InputPort(_) => out.push_str("#<input-file>"),
        Value::OutputPort(_) => out.push_str("#<output-file>"),
    }
}

fn write_character(out: &mut String, c: u8) {
    match c {
        b' ' => out.push_str("#\\space"),
        b'\n' => out.push_str("#\\newline"),
        _ => {
            out.push_str("#\\");
            out.push(c as char);
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
}

/// Pair printing handles improper lists with ` . ` before the non-pair tail.
fn write_pair(out: &mut String, v: &Value) {
    out.push('(');
    let mut cur = v.clone();
    let mut first = true;
    loop {
        match cur {
            Value::Pair(p) => {
                if !first {
                    out.push(' ');
                }
                first = false;
                write_value(out, &p.head());
                cur = p.tail();
            }
            Value::EmptyList => break,
            other => {
                out.push_str(" . ");
                write_value(out, &other);
                break;
            }
        }
    }
    out.push(')');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Pair;

    #[test]
    fn writes_proper_list() {
        let v = Value::Pair(Pair::new(
            Value::Fixnum(1),
            Value::Pair(Pair::new(Value::Fixnum(2), Value::EmptyList)),
        ));
        assert_eq!(write_to_string(&v), "(1 2)");
    }

    #[test]
    fn writes_improper_list_with_dot() {
        let v = Value::Pair(Pair::new(Value::Fixnum(1), Value::Fixnum(2)));
        assert_eq!(write_to_string(&v), "(1 . 2)");
    }

    #[test]
    fn writes_string_with_escapes() {
        assert_eq!(write_to_string(&Value::string("a\nb")), "\"a\\nb\"");
    }

    #[test]
    fn writes_named_characters() {
        assert_eq!(write_to_string(&Value::Character(b' ')), "#\\space");
        assert_eq!(write_to_string(&Value::Character(b'z')), "#\\z");
    }
}
