//! Built-in functions and methods available to expressions.
//!
//! The name tables below are the complete callable surface of the
//! interpreter. The sanitizer admits an identifier only if it is a column
//! reference or appears in one of these tables, and every listed name is
//! implemented here.

use std::cmp::Ordering;

use crate::expression::eval::{add, compare_values, floor_div, modulo, power};
use crate::expression::{ExpressionError, ExpressionResult};
use crate::value::{parse_float, Number, Value};

/// Built-in numeric and utility functions
pub const FUNCTIONS: &[&str] = &[
    "abs", "all", "any", "bin", "bool", "ceil", "chr", "divmod", "exp", "float", "floor", "hex",
    "int", "len", "log", "max", "min", "oct", "ord", "pow", "range", "reversed", "round", "sorted",
    "sqrt", "str", "sum",
];

/// Methods callable on string values
pub const STRING_METHODS: &[&str] = &[
    "capitalize",
    "casefold",
    "center",
    "count",
    "endswith",
    "find",
    "index",
    "isalnum",
    "isalpha",
    "isascii",
    "isdecimal",
    "isdigit",
    "islower",
    "isnumeric",
    "isspace",
    "istitle",
    "isupper",
    "join",
    "ljust",
    "lower",
    "lstrip",
    "partition",
    "removeprefix",
    "removesuffix",
    "replace",
    "rfind",
    "rindex",
    "rjust",
    "rpartition",
    "rsplit",
    "rstrip",
    "split",
    "splitlines",
    "startswith",
    "strip",
    "swapcase",
    "title",
    "upper",
    "zfill",
];

/// Methods callable on list and tuple values (`copy` on lists only)
pub const SEQUENCE_METHODS: &[&str] = &["copy", "count", "index"];

/// Upper bound on the length of any string or sequence an expression builds
pub const MAX_SEQUENCE_LEN: usize = 1_000_000;

/// Whether `name` may appear as a function or method name in an expression
pub fn is_allowed_name(name: &str) -> bool {
    FUNCTIONS.contains(&name) || STRING_METHODS.contains(&name) || SEQUENCE_METHODS.contains(&name)
}

pub fn check_len(length: usize) -> ExpressionResult<()> {
    if length > MAX_SEQUENCE_LEN {
        Err(ExpressionError::SequenceTooLarge {
            length,
            limit: MAX_SEQUENCE_LEN,
        })
    } else {
        Ok(())
    }
}

fn expect_args(function: &str, args: &[Value], min: usize, max: usize) -> ExpressionResult<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{} to {}", min, max)
        };
        return Err(ExpressionError::FunctionArgumentCount {
            function: function.to_string(),
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}

fn type_mismatch(context: &str, expected: &'static str, actual: &Value) -> ExpressionError {
    ExpressionError::TypeMismatch {
        expected,
        actual: actual.type_name(),
        context: context.to_string(),
    }
}

fn invalid_value(message: impl Into<String>) -> ExpressionError {
    ExpressionError::InvalidValue {
        message: message.into(),
    }
}

fn expect_int(context: &str, value: &Value) -> ExpressionResult<i64> {
    match value {
        Value::Int(n) => Ok(*n),
        Value::Bool(b) => Ok(i64::from(*b)),
        other => Err(type_mismatch(context, "int", other)),
    }
}

fn expect_number(context: &str, value: &Value) -> ExpressionResult<Number> {
    value
        .as_number()
        .ok_or_else(|| type_mismatch(context, "number", value))
}

fn expect_str<'v>(context: &str, value: &'v Value) -> ExpressionResult<&'v str> {
    match value {
        Value::Str(s) => Ok(s.as_str()),
        other => Err(type_mismatch(context, "str", other)),
    }
}

fn iterate(context: &str, value: &Value) -> ExpressionResult<Vec<Value>> {
    value
        .items()
        .ok_or_else(|| type_mismatch(context, "iterable", value))
}

/// Convert a float to an integer, truncating towards zero
fn float_to_int(context: &str, f: f64) -> ExpressionResult<i64> {
    if !f.is_finite() {
        return Err(invalid_value(format!(
            "cannot convert float {} to integer",
            Value::Float(f)
        )));
    }
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
    if f < -9_223_372_036_854_775_808.0 || f >= 9_223_372_036_854_775_808.0 {
        return Err(ExpressionError::Overflow {
            context: context.to_string(),
        });
    }
    Ok(f as i64)
}

/// Call a built-in function with already evaluated arguments
pub fn call_function(name: &str, args: Vec<Value>) -> ExpressionResult<Value> {
    match name {
        "abs" => {
            expect_args(name, &args, 1, 1)?;
            match expect_number(name, &args[0])? {
                Number::Int(n) => n.checked_abs().map(Value::Int).ok_or(ExpressionError::Overflow {
                    context: name.to_string(),
                }),
                Number::Float(f) => Ok(Value::Float(f.abs())),
            }
        }
        "all" => {
            expect_args(name, &args, 1, 1)?;
            Ok(Value::Bool(iterate(name, &args[0])?.iter().all(Value::is_truthy)))
        }
        "any" => {
            expect_args(name, &args, 1, 1)?;
            Ok(Value::Bool(iterate(name, &args[0])?.iter().any(Value::is_truthy)))
        }
        "bin" => radix(name, &args, "0b", |n| format!("{:b}", n)),
        "oct" => radix(name, &args, "0o", |n| format!("{:o}", n)),
        "hex" => radix(name, &args, "0x", |n| format!("{:x}", n)),
        "bool" => {
            expect_args(name, &args, 0, 1)?;
            Ok(Value::Bool(args.first().map_or(false, Value::is_truthy)))
        }
        "chr" => {
            expect_args(name, &args, 1, 1)?;
            let code = expect_int(name, &args[0])?;
            u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .map(|c| Value::Str(c.to_string()))
                .ok_or_else(|| invalid_value("chr() arg not in range"))
        }
        "ord" => {
            expect_args(name, &args, 1, 1)?;
            let text = expect_str(name, &args[0])?;
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Int(i64::from(u32::from(c)))),
                _ => Err(invalid_value(format!(
                    "ord() expected a character, but string of length {} found",
                    text.chars().count()
                ))),
            }
        }
        "divmod" => {
            expect_args(name, &args, 2, 2)?;
            Ok(Value::Tuple(vec![
                floor_div(&args[0], &args[1])?,
                modulo(&args[0], &args[1])?,
            ]))
        }
        "float" => {
            expect_args(name, &args, 0, 1)?;
            match args.first() {
                None => Ok(Value::Float(0.0)),
                Some(Value::Str(s)) => parse_float(s).map(Value::Float).ok_or_else(|| {
                    invalid_value(format!(
                        "could not convert string to float: {}",
                        Value::Str(s.clone()).repr()
                    ))
                }),
                Some(other) => Ok(Value::Float(expect_number(name, other)?.as_f64())),
            }
        }
        "int" => {
            expect_args(name, &args, 0, 1)?;
            match args.first() {
                None => Ok(Value::Int(0)),
                Some(Value::Str(s)) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
                    invalid_value(format!(
                        "invalid literal for int() with base 10: {}",
                        Value::Str(s.clone()).repr()
                    ))
                }),
                Some(other) => match expect_number(name, other)? {
                    Number::Int(n) => Ok(Value::Int(n)),
                    Number::Float(f) => float_to_int(name, f).map(Value::Int),
                },
            }
        }
        "len" => {
            expect_args(name, &args, 1, 1)?;
            let length = match &args[0] {
                Value::Str(s) => s.chars().count(),
                Value::List(items) | Value::Tuple(items) => items.len(),
                other => return Err(type_mismatch(name, "sized value", other)),
            };
            Ok(Value::Int(length as i64))
        }
        "max" => extremum(name, args, Ordering::Greater),
        "min" => extremum(name, args, Ordering::Less),
        "pow" => {
            expect_args(name, &args, 2, 2)?;
            power(&args[0], &args[1])
        }
        "range" => range(&args),
        "reversed" => {
            expect_args(name, &args, 1, 1)?;
            let mut items = iterate(name, &args[0])?;
            items.reverse();
            Ok(Value::List(items))
        }
        "round" => round(&args),
        "sorted" => {
            expect_args(name, &args, 1, 1)?;
            let mut items = iterate(name, &args[0])?;
            let mut failure = None;
            items.sort_by(|a, b| match compare_values("<", a, b) {
                Ok(ordering) => ordering.unwrap_or(Ordering::Equal),
                Err(err) => {
                    failure.get_or_insert(err);
                    Ordering::Equal
                }
            });
            match failure {
                Some(err) => Err(err),
                None => Ok(Value::List(items)),
            }
        }
        "str" => {
            expect_args(name, &args, 0, 1)?;
            Ok(Value::Str(args.first().map(Value::to_string).unwrap_or_default()))
        }
        "sum" => {
            expect_args(name, &args, 1, 2)?;
            let start = args.get(1).cloned().unwrap_or(Value::Int(0));
            if matches!(start, Value::Str(_)) {
                return Err(type_mismatch(name, "number", &start));
            }
            iterate(name, &args[0])?.into_iter().try_fold(start, add)
        }
        "log" => {
            expect_args(name, &args, 1, 2)?;
            let x = expect_number(name, &args[0])?.as_f64();
            if x <= 0.0 {
                return Err(invalid_value("math domain error"));
            }
            match args.get(1) {
                None => Ok(Value::Float(x.ln())),
                Some(base) => {
                    let base = expect_number(name, base)?.as_f64();
                    if base <= 0.0 {
                        return Err(invalid_value("math domain error"));
                    }
                    let divisor = base.ln();
                    if divisor == 0.0 {
                        return Err(ExpressionError::DivisionByZero);
                    }
                    Ok(Value::Float(x.ln() / divisor))
                }
            }
        }
        "exp" => {
            expect_args(name, &args, 1, 1)?;
            let x = expect_number(name, &args[0])?.as_f64();
            let result = x.exp();
            if result.is_infinite() && x.is_finite() {
                return Err(invalid_value("math range error"));
            }
            Ok(Value::Float(result))
        }
        "sqrt" => {
            expect_args(name, &args, 1, 1)?;
            let x = expect_number(name, &args[0])?.as_f64();
            if x < 0.0 {
                return Err(invalid_value("math domain error"));
            }
            Ok(Value::Float(x.sqrt()))
        }
        "ceil" | "floor" => {
            expect_args(name, &args, 1, 1)?;
            match expect_number(name, &args[0])? {
                Number::Int(n) => Ok(Value::Int(n)),
                Number::Float(f) => {
                    let rounded = if name == "ceil" { f.ceil() } else { f.floor() };
                    float_to_int(name, rounded).map(Value::Int)
                }
            }
        }
        _ => Err(ExpressionError::UnknownFunction {
            name: name.to_string(),
        }),
    }
}

fn radix(
    name: &str,
    args: &[Value],
    prefix: &str,
    digits: impl Fn(u64) -> String,
) -> ExpressionResult<Value> {
    expect_args(name, args, 1, 1)?;
    let n = expect_int(name, &args[0])?;
    let sign = if n < 0 { "-" } else { "" };
    Ok(Value::Str(format!("{}{}{}", sign, prefix, digits(n.unsigned_abs()))))
}

/// `max`/`min` over either one iterable argument or several arguments
fn extremum(name: &str, args: Vec<Value>, wanted: Ordering) -> ExpressionResult<Value> {
    if args.is_empty() {
        return Err(ExpressionError::FunctionArgumentCount {
            function: name.to_string(),
            expected: "at least 1".to_string(),
            actual: 0,
        });
    }
    let candidates = if args.len() == 1 {
        iterate(name, &args[0])?
    } else {
        args
    };

    let mut candidates = candidates.into_iter();
    let mut best = candidates
        .next()
        .ok_or_else(|| invalid_value(format!("{}() arg is an empty sequence", name)))?;
    for candidate in candidates {
        if compare_values(name, &candidate, &best)? == Some(wanted) {
            best = candidate;
        }
    }
    Ok(best)
}

fn range(args: &[Value]) -> ExpressionResult<Value> {
    expect_args("range", args, 1, 3)?;
    let ints = args
        .iter()
        .map(|arg| expect_int("range", arg))
        .collect::<ExpressionResult<Vec<i64>>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => unreachable!("argument count checked above"),
    };
    if step == 0 {
        return Err(invalid_value("range() arg 3 must not be zero"));
    }

    let span = if step > 0 {
        i128::from(stop) - i128::from(start)
    } else {
        i128::from(start) - i128::from(stop)
    };
    let step_size = i128::from(step).abs();
    let length = if span <= 0 {
        0
    } else {
        (span + step_size - 1) / step_size
    };
    check_len(usize::try_from(length).unwrap_or(usize::MAX))?;

    let items = (0..length)
        .map(|i| Value::Int((i128::from(start) + i * i128::from(step)) as i64))
        .collect();
    Ok(Value::List(items))
}

fn round_half_even(x: f64) -> f64 {
    if (x - x.trunc()).abs() == 0.5 {
        2.0 * (x / 2.0).round()
    } else {
        x.round()
    }
}

/// `round(x)` gives an int with ties to even; `round(x, n)` keeps the type of `x`
fn round(args: &[Value]) -> ExpressionResult<Value> {
    expect_args("round", args, 1, 2)?;
    let number = expect_number("round", &args[0])?;
    let digits = match args.get(1) {
        None => None,
        Some(Value::None) => None,
        Some(digits) => Some(expect_int("round", digits)?),
    };

    match (number, digits) {
        (Number::Int(n), None) => Ok(Value::Int(n)),
        (Number::Float(f), None) => float_to_int("round", round_half_even(f)).map(Value::Int),
        (Number::Int(n), Some(d)) if d >= 0 => Ok(Value::Int(n)),
        (Number::Int(n), Some(d)) => {
            let exponent = u32::try_from(d.unsigned_abs()).ok();
            let factor = match exponent.and_then(|e| 10i128.checked_pow(e)) {
                Some(factor) => factor,
                None => return Ok(Value::Int(0)),
            };
            let n = i128::from(n);
            let quotient = n.div_euclid(factor);
            let remainder = n.rem_euclid(factor);
            let doubled = remainder * 2;
            let quotient = if doubled > factor || (doubled == factor && quotient % 2 != 0) {
                quotient + 1
            } else {
                quotient
            };
            i64::try_from(quotient * factor)
                .map(Value::Int)
                .map_err(|_| ExpressionError::Overflow {
                    context: "round".to_string(),
                })
        }
        (Number::Float(f), Some(_)) if !f.is_finite() => Ok(Value::Float(f)),
        (Number::Float(f), Some(d)) if d >= 0 => {
            // Formatting rounds the exact binary value to nearest, ties to even
            let precision = usize::try_from(d.min(340)).unwrap_or(340);
            let text = format!("{:.*}", precision, f);
            Ok(Value::Float(text.parse::<f64>().unwrap_or(f)))
        }
        (Number::Float(f), Some(d)) => {
            let factor = 10f64.powi(i32::try_from(d.unsigned_abs()).unwrap_or(i32::MAX));
            if factor.is_infinite() {
                return Ok(Value::Float(0.0 * f));
            }
            Ok(Value::Float(round_half_even(f / factor) * factor))
        }
    }
}

/// Call a method on an already evaluated receiver
pub fn call_method(receiver: Value, method: &str, args: Vec<Value>) -> ExpressionResult<Value> {
    match receiver {
        Value::Str(s) => string_method(&s, method, &args),
        Value::List(items) => sequence_method(items, "list", method, &args),
        Value::Tuple(items) => sequence_method(items, "tuple", method, &args),
        other => Err(ExpressionError::UnknownMethod {
            type_name: other.type_name(),
            method: method.to_string(),
        }),
    }
}

fn sequence_method(
    items: Vec<Value>,
    type_name: &'static str,
    method: &str,
    args: &[Value],
) -> ExpressionResult<Value> {
    let context = format!("{}.{}", type_name, method);
    match method {
        "copy" if type_name == "list" => {
            expect_args(&context, args, 0, 0)?;
            Ok(Value::List(items))
        }
        "count" => {
            expect_args(&context, args, 1, 1)?;
            let count = items.iter().filter(|item| item.equals(&args[0])).count();
            Ok(Value::Int(count as i64))
        }
        "index" => {
            expect_args(&context, args, 1, 1)?;
            items
                .iter()
                .position(|item| item.equals(&args[0]))
                .map(|i| Value::Int(i as i64))
                .ok_or_else(|| invalid_value(format!("{} is not in {}", args[0].repr(), type_name)))
        }
        _ => Err(ExpressionError::UnknownMethod {
            type_name,
            method: method.to_string(),
        }),
    }
}

fn str_arg<'v>(context: &str, args: &'v [Value], index: usize) -> ExpressionResult<&'v str> {
    expect_str(context, &args[index])
}

/// Optional `chars` argument of the strip family; `None` means whitespace
fn strip_chars<'v>(context: &str, args: &'v [Value]) -> ExpressionResult<Option<&'v str>> {
    match args.first() {
        None | Some(Value::None) => Ok(None),
        Some(value) => expect_str(context, value).map(Some),
    }
}

fn char_index(s: &str, byte_index: usize) -> i64 {
    s[..byte_index].chars().count() as i64
}

fn pad(
    context: &str,
    s: &str,
    args: &[Value],
    align: impl Fn(usize, usize) -> usize,
) -> ExpressionResult<Value> {
    expect_args(context, args, 1, 2)?;
    let width = expect_int(context, &args[0])?;
    let fill = match args.get(1) {
        None => ' ',
        Some(value) => {
            let fill = expect_str(context, value)?;
            let mut chars = fill.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => c,
                _ => {
                    return Err(invalid_value(
                        "The fill character must be exactly one character long",
                    ))
                }
            }
        }
    };

    let length = s.chars().count();
    let width = usize::try_from(width).unwrap_or(0);
    if width <= length {
        return Ok(Value::Str(s.to_string()));
    }
    check_len(width)?;
    let total = width - length;
    let left = align(total, width);
    let right = total - left;
    let mut out = String::with_capacity(width);
    out.extend(std::iter::repeat(fill).take(left));
    out.push_str(s);
    out.extend(std::iter::repeat(fill).take(right));
    Ok(Value::Str(out))
}

fn affix_match(
    context: &str,
    s: &str,
    args: &[Value],
    test: impl Fn(&str, &str) -> bool,
) -> ExpressionResult<Value> {
    expect_args(context, args, 1, 1)?;
    match &args[0] {
        Value::Str(affix) => Ok(Value::Bool(test(s, affix.as_str()))),
        Value::Tuple(options) => {
            for option in options {
                if test(s, expect_str(context, option)?) {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        other => Err(type_mismatch(context, "str or tuple", other)),
    }
}

fn optional_maxsplit(
    context: &str,
    args: &[Value],
    index: usize,
) -> ExpressionResult<Option<usize>> {
    match args.get(index) {
        None => Ok(None),
        Some(value) => {
            let n = expect_int(context, value)?;
            Ok(usize::try_from(n).ok())
        }
    }
}

/// Split on runs of whitespace, at most `maxsplit` times from the left
fn split_whitespace(s: &str, maxsplit: Option<usize>) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = s.trim_start();
    while !rest.is_empty() {
        if maxsplit.map_or(false, |max| parts.len() >= max) {
            parts.push(rest.to_string());
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                parts.push(rest[..end].to_string());
                rest = rest[end..].trim_start();
            }
            None => {
                parts.push(rest.to_string());
                break;
            }
        }
    }
    parts
}

fn split_method(
    context: &str,
    s: &str,
    args: &[Value],
    from_right: bool,
) -> ExpressionResult<Value> {
    expect_args(context, args, 0, 2)?;
    let maxsplit = optional_maxsplit(context, args, 1)?;
    let separator = match args.first() {
        None | Some(Value::None) => None,
        Some(value) => Some(expect_str(context, value)?),
    };

    let parts: Vec<String> = match separator {
        None if from_right => {
            let reversed: String = s.chars().rev().collect();
            let mut parts: Vec<String> = split_whitespace(&reversed, maxsplit)
                .into_iter()
                .map(|part| part.chars().rev().collect())
                .collect();
            parts.reverse();
            parts
        }
        None => split_whitespace(s, maxsplit),
        Some("") => return Err(invalid_value("empty separator")),
        Some(sep) => match (maxsplit, from_right) {
            (None, _) => s.split(sep).map(str::to_string).collect(),
            (Some(max), false) => s.splitn(max + 1, sep).map(str::to_string).collect(),
            (Some(max), true) => {
                let mut parts: Vec<String> = s.rsplitn(max + 1, sep).map(str::to_string).collect();
                parts.reverse();
                parts
            }
        },
    };
    Ok(Value::List(parts.into_iter().map(Value::Str).collect()))
}

fn partition(context: &str, s: &str, args: &[Value], from_right: bool) -> ExpressionResult<Value> {
    expect_args(context, args, 1, 1)?;
    let sep = str_arg(context, args, 0)?;
    if sep.is_empty() {
        return Err(invalid_value("empty separator"));
    }
    let found = if from_right { s.rfind(sep) } else { s.find(sep) };
    let (head, mid, tail) = match found {
        Some(at) => (&s[..at], sep, &s[at + sep.len()..]),
        None if from_right => ("", "", s),
        None => (s, "", ""),
    };
    Ok(Value::Tuple(vec![
        Value::Str(head.to_string()),
        Value::Str(mid.to_string()),
        Value::Str(tail.to_string()),
    ]))
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut previous_cased = false;
    for c in s.chars() {
        if previous_cased {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        previous_cased = c.is_alphabetic();
    }
    out
}

fn is_title(s: &str) -> bool {
    let mut previous_cased = false;
    let mut any_cased = false;
    for c in s.chars() {
        if c.is_uppercase() {
            if previous_cased {
                return false;
            }
            previous_cased = true;
            any_cased = true;
        } else if c.is_lowercase() {
            if !previous_cased {
                return false;
            }
            previous_cased = true;
            any_cased = true;
        } else {
            previous_cased = false;
        }
    }
    any_cased
}

fn predicate(
    context: &str,
    s: &str,
    args: &[Value],
    empty: bool,
    test: impl Fn(char) -> bool,
) -> ExpressionResult<Value> {
    expect_args(context, args, 0, 0)?;
    if s.is_empty() {
        return Ok(Value::Bool(empty));
    }
    Ok(Value::Bool(s.chars().all(test)))
}

fn string_method(s: &str, method: &str, args: &[Value]) -> ExpressionResult<Value> {
    let context = format!("str.{}", method);
    let context = context.as_str();
    let text = |value: String| -> ExpressionResult<Value> { Ok(Value::Str(value)) };

    match method {
        "capitalize" => {
            expect_args(context, args, 0, 0)?;
            let mut chars = s.chars();
            let out = match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.as_str().to_lowercase().chars())
                    .collect(),
                None => String::new(),
            };
            text(out)
        }
        "casefold" | "lower" => {
            expect_args(context, args, 0, 0)?;
            text(s.to_lowercase())
        }
        "upper" => {
            expect_args(context, args, 0, 0)?;
            text(s.to_uppercase())
        }
        "swapcase" => {
            expect_args(context, args, 0, 0)?;
            let out = s
                .chars()
                .flat_map(|c| -> Vec<char> {
                    if c.is_uppercase() {
                        c.to_lowercase().collect()
                    } else if c.is_lowercase() {
                        c.to_uppercase().collect()
                    } else {
                        vec![c]
                    }
                })
                .collect();
            text(out)
        }
        "title" => {
            expect_args(context, args, 0, 0)?;
            text(title_case(s))
        }
        "center" => pad(context, s, args, |total, width| total / 2 + (total & width & 1)),
        "ljust" => pad(context, s, args, |_, _| 0),
        "rjust" => pad(context, s, args, |total, _| total),
        "zfill" => {
            expect_args(context, args, 1, 1)?;
            let width = usize::try_from(expect_int(context, &args[0])?).unwrap_or(0);
            let length = s.chars().count();
            if width <= length {
                return text(s.to_string());
            }
            check_len(width)?;
            let (sign, digits) = match s.chars().next() {
                Some(c @ ('+' | '-')) => (Some(c), &s[1..]),
                _ => (None, s),
            };
            let mut out = String::with_capacity(width);
            out.extend(sign);
            out.extend(std::iter::repeat('0').take(width - length));
            out.push_str(digits);
            text(out)
        }
        "count" => {
            expect_args(context, args, 1, 1)?;
            let sub = str_arg(context, args, 0)?;
            let count = if sub.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(sub).count()
            };
            Ok(Value::Int(count as i64))
        }
        "find" | "rfind" | "index" | "rindex" => {
            expect_args(context, args, 1, 1)?;
            let sub = str_arg(context, args, 0)?;
            let found = if method.starts_with('r') {
                s.rfind(sub)
            } else {
                s.find(sub)
            };
            match found {
                Some(at) => Ok(Value::Int(char_index(s, at))),
                None if method.ends_with("find") => Ok(Value::Int(-1)),
                None => Err(invalid_value("substring not found")),
            }
        }
        "startswith" => affix_match(context, s, args, |s, affix| s.starts_with(affix)),
        "endswith" => affix_match(context, s, args, |s, affix| s.ends_with(affix)),
        "isalnum" => predicate(context, s, args, false, char::is_alphanumeric),
        "isalpha" => predicate(context, s, args, false, char::is_alphabetic),
        "isascii" => predicate(context, s, args, true, |c| c.is_ascii()),
        "isdecimal" | "isdigit" => predicate(context, s, args, false, |c| c.is_ascii_digit()),
        "isnumeric" => predicate(context, s, args, false, char::is_numeric),
        "isspace" => predicate(context, s, args, false, char::is_whitespace),
        "islower" => {
            expect_args(context, args, 0, 0)?;
            Ok(Value::Bool(
                s.chars().any(char::is_lowercase) && !s.chars().any(char::is_uppercase),
            ))
        }
        "isupper" => {
            expect_args(context, args, 0, 0)?;
            Ok(Value::Bool(
                s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase),
            ))
        }
        "istitle" => {
            expect_args(context, args, 0, 0)?;
            Ok(Value::Bool(is_title(s)))
        }
        "join" => {
            expect_args(context, args, 1, 1)?;
            let parts = iterate(context, &args[0])?
                .iter()
                .map(|part| expect_str(context, part).map(str::to_string))
                .collect::<ExpressionResult<Vec<String>>>()?;
            let separators = s.len().saturating_mul(parts.len().saturating_sub(1));
            check_len(
                parts
                    .iter()
                    .map(String::len)
                    .fold(separators, usize::saturating_add),
            )?;
            text(parts.join(s))
        }
        "strip" | "lstrip" | "rstrip" => {
            expect_args(context, args, 0, 1)?;
            let chars = strip_chars(context, args)?;
            let matches = |c: char| match chars {
                Some(set) => set.contains(c),
                None => c.is_whitespace(),
            };
            let out = match method {
                "strip" => s.trim_matches(matches),
                "lstrip" => s.trim_start_matches(matches),
                _ => s.trim_end_matches(matches),
            };
            text(out.to_string())
        }
        "removeprefix" => {
            expect_args(context, args, 1, 1)?;
            let prefix = str_arg(context, args, 0)?;
            text(s.strip_prefix(prefix).unwrap_or(s).to_string())
        }
        "removesuffix" => {
            expect_args(context, args, 1, 1)?;
            let suffix = str_arg(context, args, 0)?;
            text(s.strip_suffix(suffix).unwrap_or(s).to_string())
        }
        "replace" => {
            expect_args(context, args, 2, 3)?;
            let old = str_arg(context, args, 0)?;
            let new = str_arg(context, args, 1)?;
            let occurrences = if old.is_empty() {
                s.chars().count() + 1
            } else {
                s.matches(old).count()
            };
            let limit = optional_maxsplit(context, args, 2)?;
            let replaced = limit.map_or(occurrences, |limit| limit.min(occurrences));
            check_len(s.len() + replaced.saturating_mul(new.len()))?;
            match limit {
                None => text(s.replace(old, new)),
                Some(limit) => text(s.replacen(old, new, limit)),
            }
        }
        "split" => split_method(context, s, args, false),
        "rsplit" => split_method(context, s, args, true),
        "splitlines" => {
            expect_args(context, args, 0, 0)?;
            Ok(Value::List(
                s.lines().map(|line| Value::Str(line.to_string())).collect(),
            ))
        }
        "partition" => partition(context, s, args, false),
        "rpartition" => partition(context, s, args, true),
        _ => Err(ExpressionError::UnknownMethod {
            type_name: "str",
            method: method.to_string(),
        }),
    }
}
