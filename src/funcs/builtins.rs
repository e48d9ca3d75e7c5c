//! 内置函数：逻辑、比较、索引、格式化与转义

use crate::error::BoxError;
use crate::funcs::{FuncResult, FunctionRegistry, arity, min_arity};
use crate::value::{Value, format_float};
use std::cmp::Ordering;

pub fn register(registry: &mut FunctionRegistry) {
    registry
        .register("and", and)
        .register("or", or)
        .register("not", not)
        .register("len", len)
        .register("index", index)
        .register("slice", slice)
        .register("print", print)
        .register("printf", printf)
        .register("println", println)
        .register("eq", eq)
        .register("ne", ne)
        .register("lt", lt)
        .register("le", le)
        .register("gt", gt)
        .register("ge", ge)
        .register("html", html)
        .register("js", js)
        .register("urlquery", urlquery);
}

/// First falsy argument, or the last one.
fn and(args: &[Value]) -> FuncResult {
    min_arity("and", args, 1)?;
    Ok(args
        .iter()
        .find(|a| !a.is_truthy())
        .unwrap_or(&args[args.len() - 1])
        .clone())
}

/// First truthy argument, or the last one.
fn or(args: &[Value]) -> FuncResult {
    min_arity("or", args, 1)?;
    Ok(args
        .iter()
        .find(|a| a.is_truthy())
        .unwrap_or(&args[args.len() - 1])
        .clone())
}

fn not(args: &[Value]) -> FuncResult {
    arity("not", args, 1)?;
    Ok(Value::Bool(!args[0].is_truthy()))
}

fn len(args: &[Value]) -> FuncResult {
    arity("len", args, 1)?;
    match &args[0] {
        Value::Record(r) => Ok(Value::from(r.iter().count())),
        v => v
            .len()
            .map(Value::from)
            .ok_or_else(|| format!("len of type {}", v.type_name()).into()),
    }
}

fn index_of(v: &Value, len: usize) -> Result<usize, BoxError> {
    let i = v
        .as_i64()
        .ok_or_else(|| format!("cannot index slice/array with type {}", v.type_name()))?;
    if i < 0 || i as usize >= len {
        return Err(format!("index out of range: {}", i).into());
    }
    Ok(i as usize)
}

/// `index m "k"`, `index l 1 2`: successive subscripts.
fn index(args: &[Value]) -> FuncResult {
    min_arity("index", args, 1)?;
    let mut item = args[0].clone();
    for key in &args[1..] {
        item = match &item {
            Value::List(items) => items[index_of(key, items.len())?].clone(),
            Value::Str(s) => Value::I64(s.as_bytes()[index_of(key, s.len())?] as i64),
            Value::Bytes(b) => Value::I64(b[index_of(key, b.len())?] as i64),
            Value::Map(m) => {
                let k = match key {
                    Value::Str(k) => k.clone(),
                    Value::Null | Value::List(_) | Value::Map(_) => {
                        return Err(format!("value has type {}; should be string", key.type_name()).into());
                    }
                    other => other.to_string(),
                };
                m.get(&k).cloned().unwrap_or(Value::Null)
            }
            Value::Record(r) => match key {
                Value::Str(k) => r.get(k).cloned().unwrap_or(Value::Null),
                other => return Err(format!("can't index struct with {}", other.type_name()).into()),
            },
            Value::Null => return Err("index of untyped nil".into()),
            other => return Err(format!("can't index item of type {}", other.type_name()).into()),
        };
    }
    Ok(item)
}

/// `slice x 1 2` is `x[1:2]`.
fn slice(args: &[Value]) -> FuncResult {
    min_arity("slice", args, 1)?;
    let item = &args[0];
    let len = match item {
        Value::Str(s) => s.len(),
        Value::List(l) => l.len(),
        Value::Bytes(b) => b.len(),
        Value::Null => return Err("slice of untyped nil".into()),
        other => return Err(format!("can't slice item of type {}", other.type_name()).into()),
    };
    if args.len() > 3 {
        return Err(format!("too many slice indexes: {}", args.len() - 1).into());
    }
    let mut bounds = [0, len];
    for (slot, v) in bounds.iter_mut().zip(&args[1..]) {
        let i = v
            .as_i64()
            .ok_or_else(|| format!("cannot index slice/array with type {}", v.type_name()))?;
        if i < 0 || i as usize > len {
            return Err(format!("index out of range: {}", i).into());
        }
        *slot = i as usize;
    }
    let [from, to] = bounds;
    if from > to {
        return Err(format!("invalid slice index: {} > {}", from, to).into());
    }
    Ok(match item {
        Value::Str(s) => Value::from(
            s.get(from..to)
                .ok_or("slice index is not on a character boundary")?,
        ),
        Value::List(l) => Value::list(l[from..to].iter().cloned()),
        Value::Bytes(b) => Value::Bytes(b[from..to].to_vec()),
        _ => Value::Null,
    })
}

/// Operands joined with a space where neither side is a string.
pub(crate) fn sprint(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 && !matches!(arg, Value::Str(_)) && !matches!(args[i - 1], Value::Str(_)) {
            out.push(' ');
        }
        out.push_str(&arg.to_string());
    }
    out
}

fn print(args: &[Value]) -> FuncResult {
    Ok(Value::from(sprint(args)))
}

fn println(args: &[Value]) -> FuncResult {
    let mut out = args.iter().map(Value::to_string).collect::<Vec<_>>().join(" ");
    out.push('\n');
    Ok(Value::from(out))
}

fn printf(args: &[Value]) -> FuncResult {
    min_arity("printf", args, 1)?;
    let format = match &args[0] {
        Value::Str(s) => s.as_str(),
        other => return Err(format!("printf: format must be a string, got {}", other.type_name()).into()),
    };
    Ok(Value::from(sprintf(format, &args[1..])))
}

#[derive(Default)]
struct Spec {
    minus: bool,
    plus: bool,
    zero: bool,
    space: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

impl Spec {
    fn pad(&self, s: String) -> String {
        let Some(width) = self.width else {
            return s;
        };
        let len = s.chars().count();
        if len >= width {
            return s;
        }
        let fill = width - len;
        if self.minus {
            format!("{}{}", s, " ".repeat(fill))
        } else if self.zero {
            // zeros go after the sign
            let (sign, digits) = match s.strip_prefix(['-', '+']) {
                Some(rest) => (&s[..1], rest),
                None => ("", s.as_str()),
            };
            format!("{}{}{}", sign, "0".repeat(fill), digits)
        } else {
            format!("{}{}", " ".repeat(fill), s)
        }
    }

    fn sign(&self, s: String, negative: bool) -> String {
        if negative {
            s
        } else if self.plus {
            format!("+{}", s)
        } else if self.space {
            format!(" {}", s)
        } else {
            s
        }
    }
}

/// Exponent written the way `1e+21` is: explicit sign, at least two digits.
fn long_exponent(s: String) -> String {
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            format!("{}e{}{:02}", mantissa, if exp < 0 { '-' } else { '+' }, exp.abs())
        }
        None => s,
    }
}

/// Go `%q` quoting: `q` is `"` for strings and `'` for runes.
pub(crate) fn quoted(s: &str, q: char) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push(q);
    for c in s.chars() {
        match c {
            c if c == q || c == '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\u{07}' => out.push_str("\\a"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0b}' => out.push_str("\\v"),
            c if c < ' ' || c == '\u{7f}' => out.push_str(&format!("\\x{:02x}", c as u32)),
            c if is_printable(c) => out.push(c),
            c if (c as u32) < 0x10000 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push_str(&format!("\\U{:08x}", c as u32)),
        }
    }
    out.push(q);
    out
}

/// Graphic characters and the ASCII space; other spaces and format
/// characters are escaped.
fn is_printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    !(c.is_control()
        || c.is_whitespace()
        || matches!(
            c,
            '\u{ad}'
                | '\u{200b}'..='\u{200f}'
                | '\u{202a}'..='\u{202e}'
                | '\u{2060}'..='\u{2064}'
                | '\u{feff}'
                | '\u{fff9}'..='\u{fffb}'
                | '\u{e000}'..='\u{f8ff}'
        ))
}

fn bad_verb(verb: char, arg: &Value) -> String {
    format!("%!{}({}={})", verb, arg.type_name(), arg)
}

fn format_one(verb: char, spec: &Spec, arg: &Value) -> String {
    let body = match verb {
        'v' => match arg {
            Value::F64(f) if spec.precision.is_some() => {
                format!("{:.*}", spec.precision.unwrap_or(6), f)
            }
            _ => arg.to_string(),
        },
        's' => {
            let s = match arg {
                Value::Str(s) => s.clone(),
                other => other.to_string(),
            };
            match spec.precision {
                Some(p) => s.chars().take(p).collect(),
                None => s,
            }
        }
        'q' => match arg {
            Value::Str(s) => quoted(s, '"'),
            Value::I64(i) => match u32::try_from(*i).ok().and_then(char::from_u32) {
                Some(c) => quoted(c.encode_utf8(&mut [0; 4]), '\''),
                None => bad_verb(verb, arg),
            },
            other => quoted(&other.to_string(), '"'),
        },
        'd' => match arg {
            Value::I64(i) => spec.sign(i.to_string(), *i < 0),
            Value::U64(u) => spec.sign(u.to_string(), false),
            _ => bad_verb(verb, arg),
        },
        'b' | 'o' | 'x' | 'X' => match (arg, arg.as_i64()) {
            (Value::Str(s), _) if matches!(verb, 'x' | 'X') => {
                let hex = hex::encode(s.as_bytes());
                if verb == 'X' { hex.to_uppercase() } else { hex }
            }
            (Value::I64(_) | Value::U64(_), Some(i)) => {
                let (negative, magnitude) = (i < 0, i.unsigned_abs());
                let digits = match verb {
                    'b' => format!("{:b}", magnitude),
                    'o' => format!("{:o}", magnitude),
                    'x' => format!("{:x}", magnitude),
                    _ => format!("{:X}", magnitude),
                };
                spec.sign(format!("{}{}", if negative { "-" } else { "" }, digits), negative)
            }
            (Value::U64(u), None) => match verb {
                'b' => format!("{:b}", u),
                'o' => format!("{:o}", u),
                'x' => format!("{:x}", u),
                _ => format!("{:X}", u),
            },
            _ => bad_verb(verb, arg),
        },
        'c' => match arg.as_i64().and_then(|i| u32::try_from(i).ok()).and_then(char::from_u32) {
            Some(c) if !matches!(arg, Value::Str(_)) => c.to_string(),
            _ => bad_verb(verb, arg),
        },
        't' => match arg {
            Value::Bool(b) => b.to_string(),
            _ => bad_verb(verb, arg),
        },
        'f' | 'F' | 'e' | 'E' | 'g' | 'G' => match arg.as_f64() {
            Some(f) if arg.is_number() => {
                let precision = spec.precision.unwrap_or(6);
                let s = match verb {
                    'f' | 'F' => format!("{:.*}", precision, f),
                    'e' => long_exponent(format!("{:.*e}", precision, f)),
                    'E' => long_exponent(format!("{:.*e}", precision, f)).to_uppercase(),
                    'g' => format_float(f),
                    _ => format_float(f).to_uppercase(),
                };
                spec.sign(s, f.is_sign_negative())
            }
            _ => bad_verb(verb, arg),
        },
        'T' => arg.type_name().to_string(),
        _ => format!("%!{}(BADVERB)", verb),
    };
    spec.pad(body)
}

/// `printf`-style formatting over template values.
pub(crate) fn sprintf(format: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();
    let mut next_arg = 0;
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut spec = Spec::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.minus = true,
                '+' => spec.plus = true,
                '0' => spec.zero = true,
                ' ' => spec.space = true,
                '#' => {}
                _ => break,
            }
            chars.next();
        }
        let mut width = String::new();
        while let Some(d) = chars.next_if(|c| c.is_ascii_digit()) {
            width.push(d);
        }
        spec.width = width.parse().ok();
        if chars.next_if_eq(&'.').is_some() {
            let mut precision = String::new();
            while let Some(d) = chars.next_if(|c| c.is_ascii_digit()) {
                precision.push(d);
            }
            spec.precision = Some(precision.parse().unwrap_or(0));
        }
        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        match args.get(next_arg) {
            Some(arg) => out.push_str(&format_one(verb, &spec, arg)),
            None => out.push_str(&format!("%!{}(MISSING)", verb)),
        }
        next_arg += 1;
    }
    if next_arg < args.len() {
        let extra: Vec<String> = args[next_arg..]
            .iter()
            .map(|a| format!("{}={}", a.type_name(), a))
            .collect();
        out.push_str(&format!("%!(EXTRA {})", extra.join(", ")));
    }
    out
}

fn numeric_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::I64(x), Value::I64(y)) => Some(x.cmp(y)),
        (Value::U64(x), Value::U64(y)) => Some(x.cmp(y)),
        (Value::I64(x), Value::U64(y)) => Some(match u64::try_from(*x) {
            Ok(x) => x.cmp(y),
            Err(_) => Ordering::Less,
        }),
        (Value::U64(_), Value::I64(_)) => numeric_cmp(b, a).map(Ordering::reverse),
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

fn equal(a: &Value, b: &Value) -> Result<bool, BoxError> {
    match (a, b) {
        (Value::Complex(..), _) | (_, Value::Complex(..)) => Ok(a == b),
        _ if a.is_number() && b.is_number() => Ok(numeric_cmp(a, b) == Some(Ordering::Equal)),
        (Value::Null, _) | (_, Value::Null) => Ok(a.is_null() && b.is_null()),
        (Value::List(_) | Value::Map(_), _) => Err(format!("non-comparable type {}", a.type_name()).into()),
        (_, Value::List(_) | Value::Map(_)) => Err(format!("non-comparable type {}", b.type_name()).into()),
        (Value::Str(_), Value::Str(_))
        | (Value::Bool(_), Value::Bool(_))
        | (Value::Bytes(_), Value::Bytes(_))
        | (Value::DateTime(_), Value::DateTime(_))
        | (Value::Record(_), Value::Record(_))
        | (Value::Object(_), Value::Object(_)) => Ok(a == b),
        _ => Err(format!(
            "incompatible types for comparison: {} and {}",
            a.type_name(),
            b.type_name()
        )
        .into()),
    }
}

/// `eq a b c` is true when `a` equals any of the rest.
fn eq(args: &[Value]) -> FuncResult {
    min_arity("eq", args, 2)?;
    for other in &args[1..] {
        if equal(&args[0], other)? {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

fn ne(args: &[Value]) -> FuncResult {
    arity("ne", args, 2)?;
    Ok(Value::Bool(!equal(&args[0], &args[1])?))
}

fn order(name: &str, args: &[Value]) -> Result<Ordering, BoxError> {
    arity(name, args, 2)?;
    let (a, b) = (&args[0], &args[1]);
    let ordering = match (a, b) {
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
        (Value::Complex(..), _) | (_, Value::Complex(..)) => None,
        _ if a.is_number() && b.is_number() => numeric_cmp(a, b),
        _ if a.type_name() != b.type_name() => {
            return Err(format!(
                "incompatible types for comparison: {} and {}",
                a.type_name(),
                b.type_name()
            )
            .into());
        }
        _ => None,
    };
    ordering.ok_or_else(|| format!("invalid type for comparison: {}", a.type_name()).into())
}

fn lt(args: &[Value]) -> FuncResult {
    Ok(Value::Bool(order("lt", args)? == Ordering::Less))
}

fn le(args: &[Value]) -> FuncResult {
    Ok(Value::Bool(order("le", args)? != Ordering::Greater))
}

fn gt(args: &[Value]) -> FuncResult {
    Ok(Value::Bool(order("gt", args)? == Ordering::Greater))
}

fn ge(args: &[Value]) -> FuncResult {
    Ok(Value::Bool(order("ge", args)? != Ordering::Less))
}

fn escape_input(args: &[Value]) -> String {
    match args {
        [Value::Str(s)] => s.clone(),
        _ => sprint(args),
    }
}

pub(crate) fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\0' => out.push('\u{FFFD}'),
            c => out.push(c),
        }
    }
    out
}

fn html(args: &[Value]) -> FuncResult {
    Ok(Value::from(html_escape(&escape_input(args))))
}

pub(crate) fn js_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '<' => out.push_str("\\u003C"),
            '>' => out.push_str("\\u003E"),
            '&' => out.push_str("\\u0026"),
            '=' => out.push_str("\\u003D"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn js(args: &[Value]) -> FuncResult {
    Ok(Value::from(js_escape(&escape_input(args))))
}

/// Query-string escaping: space becomes `+`.
pub(crate) fn query_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            b' ' => out.push('+'),
            b => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

fn urlquery(args: &[Value]) -> FuncResult {
    Ok(Value::from(query_escape(&escape_input(args))))
}
