//! Free builtin functions callable by bare name, plus the method set
//! available on string receivers. Dialog and database builtins live in
//! the interpreter because they need the host or the context.

use crate::runtime::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    CInt,
    CDbl,
    CStr,
    Val,
    Len,
    Mid,
    Left,
    Right,
    UCase,
    LCase,
    Trim,
    Str,
    Abs,
    Int,
    Rnd,
    Sqr,
    EvaluateExpression,
}

impl Builtin {
    /// Resolve a lowercased call name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "cint" => Self::CInt,
            "cdbl" => Self::CDbl,
            "cstr" => Self::CStr,
            "val" => Self::Val,
            "len" => Self::Len,
            "mid" => Self::Mid,
            "left" => Self::Left,
            "right" => Self::Right,
            "ucase" => Self::UCase,
            "lcase" => Self::LCase,
            "trim" => Self::Trim,
            "str" => Self::Str,
            "abs" => Self::Abs,
            "int" => Self::Int,
            "rnd" => Self::Rnd,
            "sqr" => Self::Sqr,
            "evaluateexpression" => Self::EvaluateExpression,
            _ => return None,
        })
    }
}

pub fn apply(builtin: Builtin, args: &[Value]) -> Value {
    match builtin {
        Builtin::CInt => Value::Number(number_or_zero(arg_number(args, 0, 0.0)).floor()),
        Builtin::CDbl => Value::Number(number_or_zero(arg_number(args, 0, 0.0))),
        Builtin::CStr => Value::Str(arg_display(args, 0)),
        Builtin::Val => Value::Number(parse_number_prefix(&arg_display(args, 0))),
        Builtin::Len => Value::Number(arg_display(args, 0).chars().count() as f64),
        Builtin::Mid => {
            let text = arg_display(args, 0);
            // 1-based start position.
            let start = arg_number(args, 1, 1.0) - 1.0;
            match args.get(2) {
                Some(length) => {
                    let length = length.as_number();
                    Value::Str(substring(&text, start, Some(start + length)))
                }
                None => Value::Str(substring(&text, start, None)),
            }
        }
        Builtin::Left => {
            let text = arg_display(args, 0);
            let count = arg_number(args, 1, 0.0);
            Value::Str(substring(&text, 0.0, Some(count)))
        }
        Builtin::Right => {
            let text = arg_display(args, 0);
            let count = arg_number(args, 1, 0.0);
            let len = text.chars().count() as f64;
            Value::Str(substring(&text, len - count, None))
        }
        Builtin::UCase => Value::Str(arg_display(args, 0).to_uppercase()),
        Builtin::LCase => Value::Str(arg_display(args, 0).to_lowercase()),
        Builtin::Trim => Value::Str(arg_display(args, 0).trim().to_string()),
        Builtin::Str => Value::Str(arg_display(args, 0)),
        Builtin::Abs => Value::Number(arg_number(args, 0, 0.0).abs()),
        Builtin::Int => Value::Number(arg_number(args, 0, 0.0).floor()),
        Builtin::Rnd => Value::Number(rand::random::<f64>()),
        Builtin::Sqr => Value::Number(arg_number(args, 0, 0.0).sqrt()),
        Builtin::EvaluateExpression => {
            Value::Number(evaluate_math_expression(&arg_display(args, 0)))
        }
    }
}

/// Methods callable on a string receiver (`text.ToUpper()` and friends).
/// Unknown methods return the receiver unchanged.
pub fn call_string_method(receiver: &str, method: &str, args: &[Value]) -> Value {
    match method.to_ascii_lowercase().as_str() {
        "length" => Value::Number(receiver.chars().count() as f64),
        "toupper" => Value::Str(receiver.to_uppercase()),
        "tolower" => Value::Str(receiver.to_lowercase()),
        "trim" => Value::Str(receiver.trim().to_string()),
        "substring" => {
            let start = arg_number(args, 0, 0.0);
            match args.get(1) {
                Some(length) => {
                    let length = length.as_number();
                    Value::Str(substring(receiver, start, Some(start + length)))
                }
                None => Value::Str(substring(receiver, start, None)),
            }
        }
        "contains" => Value::Bool(receiver.contains(&arg_display(args, 0))),
        "indexof" => {
            let needle = arg_display(args, 0);
            match receiver.find(&needle) {
                Some(byte_index) => {
                    Value::Number(receiver[..byte_index].chars().count() as f64)
                }
                None => Value::Number(-1.0),
            }
        }
        "replace" => Value::Str(receiver.replacen(
            &arg_display(args, 0),
            &arg_display(args, 1),
            1,
        )),
        "split" => {
            let separator = match args.first() {
                Some(value) => value.display(),
                None => ",".to_string(),
            };
            let parts: Vec<Value> = if separator.is_empty() {
                receiver
                    .chars()
                    .map(|c| Value::Str(c.to_string()))
                    .collect()
            } else {
                receiver
                    .split(separator.as_str())
                    .map(|part| Value::Str(part.to_string()))
                    .collect()
            };
            Value::List(parts)
        }
        "startswith" => Value::Bool(receiver.starts_with(&arg_display(args, 0))),
        "endswith" => Value::Bool(receiver.ends_with(&arg_display(args, 0))),
        _ => Value::Str(receiver.to_string()),
    }
}

/// Two-pass evaluator for the textual arithmetic accepted by
/// `EvaluateExpression`: numbers and `+ - * /`, multiplicative operators
/// first. Unknown characters are skipped; anything malformed yields 0.
pub fn evaluate_math_expression(text: &str) -> f64 {
    #[derive(Clone, Copy)]
    enum Tok {
        Num(f64),
        Op(char),
    }

    let mut tokens: Vec<Tok> = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() || c == '.' {
            let mut number = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    number.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Tok::Num(number.parse().unwrap_or(0.0)));
        } else {
            if matches!(c, '+' | '-' | '*' | '/') {
                tokens.push(Tok::Op(c));
            }
            chars.next();
        }
    }

    fn reduce(tokens: &mut Vec<Tok>, ops: &[char]) {
        let mut i = 1;
        while i < tokens.len() {
            let op = match tokens[i] {
                Tok::Op(op) if ops.contains(&op) => op,
                _ => {
                    i += 2;
                    continue;
                }
            };
            if i + 1 >= tokens.len() {
                break;
            }
            let left = match tokens[i - 1] {
                Tok::Num(n) => n,
                Tok::Op(_) => 0.0,
            };
            let right = match tokens[i + 1] {
                Tok::Num(n) => n,
                Tok::Op(_) => 0.0,
            };
            let result = match op {
                '*' => left * right,
                '/' => left / right,
                '+' => left + right,
                _ => left - right,
            };
            tokens.splice(i - 1..=i + 1, [Tok::Num(result)]);
        }
    }

    reduce(&mut tokens, &['*', '/']);
    reduce(&mut tokens, &['+', '-']);

    match tokens.first() {
        Some(Tok::Num(n)) => *n,
        _ => 0.0,
    }
}

fn arg_display(args: &[Value], index: usize) -> String {
    args.get(index).map(Value::display).unwrap_or_default()
}

fn arg_number(args: &[Value], index: usize, default: f64) -> f64 {
    args.get(index).map(Value::as_number).unwrap_or(default)
}

fn number_or_zero(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value }
}

/// `Val`-style parsing: the longest numeric prefix, 0 when there is none.
fn parse_number_prefix(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (i, c) in trimmed.char_indices() {
        if c.is_ascii_digit() {
            seen_digit = true;
        } else if c == '.' && !seen_dot {
            seen_dot = true;
        } else if (c == '+' || c == '-') && i == 0 {
            // leading sign
        } else {
            break;
        }
        end = i + c.len_utf8();
    }
    if !seen_digit {
        return 0.0;
    }
    trimmed[..end].parse().unwrap_or(0.0)
}

/// Character-indexed substring with lenient clamping: bounds are truncated
/// into range, NaN counts as 0, and reversed bounds are swapped.
fn substring(text: &str, start: f64, end: Option<f64>) -> String {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len() as f64;
    let clamp = |v: f64| -> usize {
        if v.is_nan() {
            0
        } else {
            v.trunc().clamp(0.0, len) as usize
        }
    };
    let mut a = clamp(start);
    let mut b = clamp(end.unwrap_or(len));
    if a > b {
        std::mem::swap(&mut a, &mut b);
    }
    chars[a..b].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(value: f64) -> Value {
        Value::Number(value)
    }

    fn text(value: &str) -> Value {
        Value::Str(value.to_string())
    }

    #[test]
    fn conversions_follow_lenient_coercion() {
        assert_eq!(apply(Builtin::CInt, &[text("3.7")]), number(3.0));
        assert_eq!(apply(Builtin::CInt, &[text("abc")]), number(0.0));
        assert_eq!(apply(Builtin::CDbl, &[text("2.5")]), number(2.5));
        assert_eq!(apply(Builtin::CStr, &[number(4.0)]), text("4"));
        assert_eq!(apply(Builtin::Val, &[text("12abc")]), number(12.0));
        assert_eq!(apply(Builtin::Val, &[text("-3.5x")]), number(-3.5));
        assert_eq!(apply(Builtin::Val, &[text("abc")]), number(0.0));
    }

    #[test]
    fn string_helpers_use_one_based_positions() {
        assert_eq!(apply(Builtin::Len, &[text("hello")]), number(5.0));
        assert_eq!(
            apply(Builtin::Mid, &[text("hello"), number(2.0), number(3.0)]),
            text("ell")
        );
        assert_eq!(apply(Builtin::Mid, &[text("hello"), number(3.0)]), text("llo"));
        assert_eq!(apply(Builtin::Left, &[text("hello"), number(2.0)]), text("he"));
        assert_eq!(apply(Builtin::Right, &[text("hello"), number(2.0)]), text("lo"));
        assert_eq!(apply(Builtin::Right, &[text("hi"), number(10.0)]), text("hi"));
        assert_eq!(apply(Builtin::UCase, &[text("abc")]), text("ABC"));
        assert_eq!(apply(Builtin::Trim, &[text("  x  ")]), text("x"));
    }

    #[test]
    fn math_helpers_cover_the_usual_suspects() {
        assert_eq!(apply(Builtin::Abs, &[number(-4.0)]), number(4.0));
        assert_eq!(apply(Builtin::Int, &[number(3.9)]), number(3.0));
        assert_eq!(apply(Builtin::Sqr, &[number(9.0)]), number(3.0));
        let Value::Number(random) = apply(Builtin::Rnd, &[]) else {
            panic!("Rnd must produce a number");
        };
        assert!((0.0..1.0).contains(&random));
    }

    #[test]
    fn string_methods_cover_search_and_slicing() {
        assert_eq!(
            call_string_method("Hello", "ToUpper", &[]),
            text("HELLO")
        );
        assert_eq!(
            call_string_method("hello", "IndexOf", &[text("ll")]),
            number(2.0)
        );
        assert_eq!(
            call_string_method("hello", "IndexOf", &[text("z")]),
            number(-1.0)
        );
        assert_eq!(
            call_string_method("a-b-c", "Replace", &[text("-"), text("+")]),
            text("a+b-c")
        );
        assert_eq!(
            call_string_method("a,b,c", "Split", &[text(",")]),
            Value::List(vec![text("a"), text("b"), text("c")])
        );
        assert_eq!(
            call_string_method("hello", "Substring", &[number(1.0), number(3.0)]),
            text("ell")
        );
        assert_eq!(
            call_string_method("hello", "StartsWith", &[text("he")]),
            Value::Bool(true)
        );
        assert_eq!(
            call_string_method("hello", "Unknown", &[]),
            text("hello")
        );
    }

    #[test]
    fn textual_expressions_respect_precedence() {
        assert_eq!(evaluate_math_expression("2 + 3 * 4"), 14.0);
        assert_eq!(evaluate_math_expression("10 / 4"), 2.5);
        assert_eq!(evaluate_math_expression("1 + 2 - 3"), 0.0);
        assert_eq!(evaluate_math_expression("42"), 42.0);
        assert_eq!(evaluate_math_expression(""), 0.0);
        assert_eq!(evaluate_math_expression("x + y"), 0.0);
    }
}
