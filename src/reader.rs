// ABOUTME: The reader: lifts a character stream into a single value (§4.1)

use crate::context::Context;
use crate::error::reader_error;
use crate::port::InputPort;
use crate::value::{Pair, Value};

const DELIMITERS: &[char] = &['(', ')', '"', '[', ']', ';'];

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || DELIMITERS.contains(&c)
}

fn skip_whitespace_and_comments(port: &InputPort) {
    loop {
        match port.peek_char() {
            Some(c) if c.is_whitespace() => {
                port.get_char();
            }
            Some(';') => {
                while let Some(c) = port.get_char() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            _ => break,
        }
    }
}

/// Read a single value from `port`, or `Value::Eof` at end of input, or a
/// raised `Value::Exception` on malformed syntax.
pub fn read(ctx: &Context, port: &InputPort) -> Value {
    skip_whitespace_and_comments(port);
    let Some(c) = port.peek_char() else {
        return Value::Eof;
    };
    match c {
        '(' => {
            port.get_char();
            read_list(ctx, port, ')')
        }
        '[' => {
            port.get_char();
            read_vector(ctx, port)
        }
        ')' | ']' => {
            port.get_char();
            Value::CloseParen
        }
        '\'' => {
            port.get_char();
            wrap_one(ctx, port, &ctx.sym_quote)
        }
        '`' => {
            port.get_char();
            wrap_one(ctx, port, &ctx.sym_quasiquote)
        }
        ',' => {
            port.get_char();
            if port.peek_char() == Some('@') {
                port.get_char();
                wrap_one(ctx, port, &ctx.sym_splicing)
            } else {
                wrap_one(ctx, port, &ctx.sym_unquote)
            }
        }
        '"' => read_string(ctx, port),
        '#' => {
            port.get_char();
            read_hash(ctx, port)
        }
        _ => read_atom(ctx, port),
    }
}

fn wrap_one(ctx: &Context, port: &InputPort, head: &crate::value::Symbol) -> Value {
    let inner = read(ctx, port);
    if inner.is_signalled_exception() {
        return inner;
    }
    Value::Pair(Pair::new(
        Value::Symbol(head.clone()),
        Value::Pair(Pair::new(inner, Value::EmptyList)),
    ))
}

fn read_list(ctx: &Context, port: &InputPort, close: char) -> Value {
    let mut items: Vec<Value> = Vec::new();
    loop {
        skip_whitespace_and_comments(port);
        match port.peek_char() {
            None => {
                return reader_error(
                    ctx,
                    format!(
                        "unexpected EOF inside list at line {}",
                        port.line()
                    ),
                )
            }
            Some(c) if c == close => {
                port.get_char();
                return build_list(items, Value::EmptyList);
            }
            _ => {}
        }

        // Dotted tail: `.` followed by one expression then the closing paren.
        if close == ')' && starts_dot_token(port) {
            port.get_char();
            let tail = read(ctx, port);
            if tail.is_signalled_exception() {
                return tail;
            }
            skip_whitespace_and_comments(port);
            let next = read(ctx, port);
            if !matches!(next, Value::CloseParen) {
                return reader_error(ctx, "multiple tokens after a dot in list");
            }
            return build_list(items, tail);
        }

        let v = read(ctx, port);
        if v.is_signalled_exception() {
            return v;
        }
        if matches!(v, Value::CloseParen) {
            return build_list(items, Value::EmptyList);
        }
        items.push(v);
    }
}

/// Peek whether the reader is sitting on a lone `.` token (the dotted-pair
/// separator) without consuming anything. A `.` that begins a longer
/// symbol (e.g. `.foo`) is not the dotted separator; only a lone `.`
/// followed by a delimiter or EOF counts.
fn starts_dot_token(port: &InputPort) -> bool {
    if port.peek_char() != Some('.') {
        return false;
    }
    port.get_char();
    let next = port.peek_char();
    port.unread_char();
    next.is_none() || next.is_some_and(is_delimiter)
}

fn read_vector(ctx: &Context, port: &InputPort) -> Value {
    let mut items = Vec::new();
    loop {
        skip_whitespace_and_comments(port);
        match port.peek_char() {
            None => {
                return reader_error(
                    ctx,
                    format!("unexpected EOF inside vector at line {}", port.line()),
                )
            }
            Some(']') => {
                port.get_char();
                return Value::Vector(crate::value::LispVector::from_values(items));
            }
            _ => {}
        }
        let v = read(ctx, port);
        if v.is_signalled_exception() {
            return v;
        }
        if matches!(v, Value::CloseParen) {
            return Value::Vector(crate::value::LispVector::from_values(items));
        }
        items.push(v);
    }
}

fn build_list(items: Vec<Value>, tail: Value) -> Value {
    let mut result = tail;
    for item in items.into_iter().rev() {
        result = Value::Pair(Pair::new(item, result));
    }
    result
}

fn read_string(ctx: &Context, port: &InputPort) -> Value {
    port.get_char(); // opening quote
    let mut s = String::new();
    loop {
        match port.get_char() {
            None => {
                return reader_error(
                    ctx,
                    format!("unexpected EOF inside string at line {}", port.line()),
                )
            }
            Some('"') => return Value::string(s),
            Some('\\') => match port.get_char() {
                Some('n') => s.push('\n'),
                Some('t') => s.push('\t'),
                Some('"') => s.push('"'),
                Some('\\') => s.push('\\'),
                Some(other) => s.push(other),
                None => {
                    return reader_error(ctx, "unexpected EOF after escape in string")
                }
            },
            Some(c) => s.push(c),
        }
    }
}

fn read_hash(ctx: &Context, port: &InputPort) -> Value {
    match port.peek_char() {
        Some('t') => {
            port.get_char();
            Value::True
        }
        Some('f') => {
            port.get_char();
            Value::False
        }
        Some('\\') => {
            port.get_char();
            read_character(ctx, port)
        }
        Some(c) => reader_error(ctx, format!("invalid #-form: #{c}")),
        None => reader_error(ctx, "unexpected EOF after #"),
    }
}

fn read_character(ctx: &Context, port: &InputPort) -> Value {
    let Some(first) = port.get_char() else {
        return reader_error(ctx, "unexpected EOF inside character literal");
    };
    if !first.is_ascii_alphabetic() {
        return Value::Character(first as u8);
    }
    let mut token = String::new();
    token.push(first);
    while let Some(c) = port.peek_char() {
        if c.is_ascii_alphabetic() {
            token.push(c);
            port.get_char();
        } else {
            break;
        }
    }
    if token.len() == 1 {
        return Value::Character(token.as_bytes()[0]);
    }
    match token.as_str() {
        "space" => Value::Character(b' '),
        "newline" => Value::Character(b'\n'),
        _ => reader_error(ctx, format!("invalid #-form: #\\{token}")),
    }
}

fn read_atom(ctx: &Context, port: &InputPort) -> Value {
    let mut token = String::new();
    while let Some(c) = port.peek_char() {
        if is_delimiter(c) {
            break;
        }
        token.push(c);
        port.get_char();
    }
    classify_atom(ctx, &token)
}

fn classify_atom(ctx: &Context, token: &str) -> Value {
    if let Some(fixnum) = parse_integer(token) {
        return Value::Fixnum(fixnum);
    }
    if let Some(float) = parse_float(token) {
        return Value::Float(std::rc::Rc::new(float));
    }
    Value::Symbol(ctx.current_package().find_or_create_symbol(token))
}

fn parse_integer(token: &str) -> Option<i64> {
    if token.is_empty() {
        return None;
    }
    let digits = token.strip_prefix('-').unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse::<i64>().ok()
}

fn parse_float(token: &str) -> Option<f64> {
    let rest = token.strip_prefix('-').unwrap_or(token);
    let (int_part, frac_part) = rest.split_once('.')?;
    if int_part.is_empty()
        || frac_part.is_empty()
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    token.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::write_to_string;

    fn read_str(ctx: &Context, s: &str) -> Value {
        read(ctx, &InputPort::from_str(s))
    }

    #[test]
    fn reads_fixnum_and_float() {
        let ctx = Context::init();
        assert!(matches!(read_str(&ctx, "42"), Value::Fixnum(42)));
        assert!(matches!(read_str(&ctx, "-7"), Value::Fixnum(-7)));
        match read_str(&ctx, "3.5") {
            Value::Float(f) => assert_eq!(*f, 3.5),
            other => panic!("expected float, got {other:?}"),
        }
    }

    #[test]
    fn reads_booleans_and_characters() {
        let ctx = Context::init();
        assert!(matches!(read_str(&ctx, "#t"), Value::True));
        assert!(matches!(read_str(&ctx, "#f"), Value::False));
        assert!(matches!(read_str(&ctx, "#\\a"), Value::Character(b'a')));
        assert!(matches!(read_str(&ctx, "#\\space"), Value::Character(b' ')));
        assert!(matches!(
            read_str(&ctx, "#\\newline"),
            Value::Character(b'\n')
        ));
    }

    #[test]
    fn reads_string_with_escapes() {
        let ctx = Context::init();
        let v = read_str(&ctx, "\"a\\nb\"");
        match v {
            Value::String(s) => assert_eq!(*s, "a\nb"),
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn reads_proper_and_dotted_lists() {
        let ctx = Context::init();
        let v = read_str(&ctx, "(1 2 3)");
        assert_eq!(write_to_string(&v), "(1 2 3)");
        let dotted = read_str(&ctx, "(a b . c)");
        assert_eq!(write_to_string(&dotted), "(a b . c)");
    }

    #[test]
    fn reads_quote_family() {
        let ctx = Context::init();
        assert_eq!(write_to_string(&read_str(&ctx, "'x")), "(quote x)");
        assert_eq!(
            write_to_string(&read_str(&ctx, "`(1 ,x ,@y)")),
            "(quasiquote (1 (unquote x) (unquote-splicing y)))"
        );
    }

    #[test]
    fn reads_vector() {
        let ctx = Context::init();
        let v = read_str(&ctx, "[1 2 3]");
        match v {
            Value::Vector(vec) => assert_eq!(vec.len(), 3),
            other => panic!("expected vector, got {other:?}"),
        }
    }

    #[test]
    fn skips_comments() {
        let ctx = Context::init();
        let v = read_str(&ctx, "; a comment\n42");
        assert!(matches!(v, Value::Fixnum(42)));
    }

    #[test]
    fn unexpected_eof_in_list_raises_reader_error() {
        let ctx = Context::init();
        let v = read_str(&ctx, "(1 2");
        assert!(v.is_signalled_exception());
    }

    #[test]
    fn read_from_string_matches_end_to_end_scenario() {
        let ctx = Context::init();
        let v = read_str(&ctx, "(a b . c)");
        if let Value::Pair(p) = &v {
            assert_eq!(write_to_string(&p.head()), "a");
            assert_eq!(write_to_string(&p.tail()), "(b . c)");
        } else {
            panic!("expected pair");
        }
    }
}
