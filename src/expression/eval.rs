//! Expression evaluation implementation.

use std::cmp::Ordering;

use crate::expression::builtins::{self, check_len};
use crate::expression::{
    BinaryOperator, ColumnRef, CompareOperator, Expression, ExpressionError, ExpressionResult,
    UnaryOperator,
};
use crate::value::{Number, Value};

/// Evaluator for expressions
pub struct ExpressionEvaluator<'a> {
    /// The bound column values of the current row
    row_values: &'a [Value],
}

impl<'a> ExpressionEvaluator<'a> {
    /// Create a new evaluator over a row's bound values
    pub fn new(row_values: &'a [Value]) -> Self {
        Self { row_values }
    }

    /// Evaluate an expression and return the result
    pub fn evaluate(&self, expr: &Expression) -> ExpressionResult<Value> {
        match expr {
            Expression::Literal(lit) => Ok(lit.value.clone()),

            Expression::ColumnRef(col) => self.evaluate_column_ref(col),

            Expression::Name(name) => Err(ExpressionError::UnknownName { name: name.clone() }),

            Expression::BinaryOp { op, left, right } if op.is_short_circuit() => {
                let left_val = self.evaluate(left)?;
                let take_left = match op {
                    BinaryOperator::And => !left_val.is_truthy(),
                    _ => left_val.is_truthy(),
                };
                if take_left {
                    Ok(left_val)
                } else {
                    self.evaluate(right)
                }
            }

            Expression::BinaryOp { op, left, right } => {
                let left_val = self.evaluate(left)?;
                let right_val = self.evaluate(right)?;
                evaluate_binary_op(*op, left_val, right_val)
            }

            Expression::UnaryOp { op, operand } => {
                let operand_val = self.evaluate(operand)?;
                evaluate_unary_op(*op, operand_val)
            }

            Expression::Compare { left, comparisons } => {
                let mut current = self.evaluate(left)?;
                for (op, expr) in comparisons {
                    let next = self.evaluate(expr)?;
                    if !compare(*op, &current, &next)? {
                        return Ok(Value::Bool(false));
                    }
                    current = next;
                }
                Ok(Value::Bool(true))
            }

            Expression::FunctionCall { name, args } => {
                let args = self.evaluate_all(args)?;
                builtins::call_function(name, args)
            }

            Expression::MethodCall {
                receiver,
                method,
                args,
            } => {
                let receiver = self.evaluate(receiver)?;
                let args = self.evaluate_all(args)?;
                builtins::call_method(receiver, method, args)
            }

            Expression::Tuple(items) => Ok(Value::Tuple(self.evaluate_all(items)?)),
        }
    }

    fn evaluate_all(&self, exprs: &[Expression]) -> ExpressionResult<Vec<Value>> {
        exprs.iter().map(|e| self.evaluate(e)).collect()
    }

    /// Evaluate a column reference
    fn evaluate_column_ref(&self, col: &ColumnRef) -> ExpressionResult<Value> {
        self.row_values
            .get(col.index)
            .cloned()
            .ok_or(ExpressionError::ColumnIndexOutOfBounds {
                index: col.index,
                row_size: self.row_values.len(),
            })
    }
}

/// Helper function to evaluate an expression against a row's values
pub fn evaluate_expression(expr: &Expression, row_values: &[Value]) -> ExpressionResult<Value> {
    ExpressionEvaluator::new(row_values).evaluate(expr)
}

fn invalid_operands(op: &str, left: &Value, right: &Value) -> ExpressionError {
    ExpressionError::InvalidOperandTypes {
        operator: op.to_string(),
        left_type: left.type_name(),
        right_type: Some(right.type_name()),
    }
}

fn overflow(context: &str) -> ExpressionError {
    ExpressionError::Overflow {
        context: context.to_string(),
    }
}

/// Evaluate a non-short-circuit binary operation
pub fn evaluate_binary_op(
    op: BinaryOperator,
    left: Value,
    right: Value,
) -> ExpressionResult<Value> {
    match op {
        BinaryOperator::Add => add(left, right),
        BinaryOperator::Sub => sub(left, right),
        BinaryOperator::Mul => mul(left, right),
        BinaryOperator::Div => true_div(&left, &right),
        BinaryOperator::FloorDiv => floor_div(&left, &right),
        BinaryOperator::Pow => power(&left, &right),
        // Only reachable when called directly; the evaluator short-circuits these
        BinaryOperator::And => Ok(if left.is_truthy() { right } else { left }),
        BinaryOperator::Or => Ok(if left.is_truthy() { left } else { right }),
    }
}

fn numbers(op: &str, left: &Value, right: &Value) -> ExpressionResult<(Number, Number)> {
    match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(invalid_operands(op, left, right)),
    }
}

fn concat(mut a: Vec<Value>, b: Vec<Value>) -> ExpressionResult<Vec<Value>> {
    check_len(a.len() + b.len())?;
    a.extend(b);
    Ok(a)
}

pub fn add(left: Value, right: Value) -> ExpressionResult<Value> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => {
            check_len(a.len() + b.len())?;
            Ok(Value::Str(a + &b))
        }
        (Value::List(a), Value::List(b)) => Ok(Value::List(concat(a, b)?)),
        (Value::Tuple(a), Value::Tuple(b)) => Ok(Value::Tuple(concat(a, b)?)),
        (left, right) => match numbers("+", &left, &right)? {
            (Number::Int(a), Number::Int(b)) => {
                a.checked_add(b).map(Value::Int).ok_or_else(|| overflow("+"))
            }
            (a, b) => Ok(Value::Float(a.as_f64() + b.as_f64())),
        },
    }
}

pub fn sub(left: Value, right: Value) -> ExpressionResult<Value> {
    match numbers("-", &left, &right)? {
        (Number::Int(a), Number::Int(b)) => {
            a.checked_sub(b).map(Value::Int).ok_or_else(|| overflow("-"))
        }
        (a, b) => Ok(Value::Float(a.as_f64() - b.as_f64())),
    }
}

pub fn mul(left: Value, right: Value) -> ExpressionResult<Value> {
    match (left, right) {
        (Value::Str(s), count) | (count, Value::Str(s))
            if matches!(count, Value::Int(_) | Value::Bool(_)) =>
        {
            let times = repeat_count(&count);
            check_len(s.len().saturating_mul(times))?;
            Ok(Value::Str(s.repeat(times)))
        }
        (Value::List(items), count) | (count, Value::List(items))
            if matches!(count, Value::Int(_) | Value::Bool(_)) =>
        {
            Ok(Value::List(repeat_items(&items, repeat_count(&count))?))
        }
        (Value::Tuple(items), count) | (count, Value::Tuple(items))
            if matches!(count, Value::Int(_) | Value::Bool(_)) =>
        {
            Ok(Value::Tuple(repeat_items(&items, repeat_count(&count))?))
        }
        (left, right) => match numbers("*", &left, &right)? {
            (Number::Int(a), Number::Int(b)) => {
                a.checked_mul(b).map(Value::Int).ok_or_else(|| overflow("*"))
            }
            (a, b) => Ok(Value::Float(a.as_f64() * b.as_f64())),
        },
    }
}

fn repeat_count(count: &Value) -> usize {
    match count.as_number() {
        Some(Number::Int(n)) if n > 0 => usize::try_from(n).unwrap_or(usize::MAX),
        _ => 0,
    }
}

fn repeat_items(items: &[Value], times: usize) -> ExpressionResult<Vec<Value>> {
    if items.is_empty() || times == 0 {
        return Ok(Vec::new());
    }
    check_len(copy_weight(items).saturating_mul(times))?;
    Ok(std::iter::repeat(items).take(times).flatten().cloned().collect())
}

/// Elements and string bytes cloned when `items` is copied once
fn copy_weight(items: &[Value]) -> usize {
    items
        .iter()
        .map(|item| match item {
            Value::Str(s) => 1 + s.len(),
            Value::List(inner) | Value::Tuple(inner) => 1 + copy_weight(inner),
            _ => 1,
        })
        .fold(0, usize::saturating_add)
}

/// `/` always produces a float
pub fn true_div(left: &Value, right: &Value) -> ExpressionResult<Value> {
    let (a, b) = numbers("/", left, right)?;
    let divisor = b.as_f64();
    if divisor == 0.0 {
        return Err(ExpressionError::DivisionByZero);
    }
    Ok(Value::Float(a.as_f64() / divisor))
}

/// `//` rounds the quotient towards negative infinity
pub fn floor_div(left: &Value, right: &Value) -> ExpressionResult<Value> {
    match numbers("//", left, right)? {
        (Number::Int(a), Number::Int(b)) => {
            if b == 0 {
                return Err(ExpressionError::DivisionByZero);
            }
            let quotient = a.checked_div(b).ok_or_else(|| overflow("//"))?;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                Ok(Value::Int(quotient - 1))
            } else {
                Ok(Value::Int(quotient))
            }
        }
        (a, b) => {
            let divisor = b.as_f64();
            if divisor == 0.0 {
                return Err(ExpressionError::DivisionByZero);
            }
            Ok(Value::Float((a.as_f64() / divisor).floor()))
        }
    }
}

/// Remainder with the sign of the divisor
pub fn modulo(left: &Value, right: &Value) -> ExpressionResult<Value> {
    match numbers("%", left, right)? {
        (Number::Int(a), Number::Int(b)) => {
            if b == 0 {
                return Err(ExpressionError::DivisionByZero);
            }
            let rem = a.checked_rem(b).ok_or_else(|| overflow("%"))?;
            if rem != 0 && ((rem < 0) != (b < 0)) {
                Ok(Value::Int(rem + b))
            } else {
                Ok(Value::Int(rem))
            }
        }
        (a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            if b == 0.0 {
                return Err(ExpressionError::DivisionByZero);
            }
            let rem = a % b;
            if rem != 0.0 && ((rem < 0.0) != (b < 0.0)) {
                Ok(Value::Float(rem + b))
            } else {
                Ok(Value::Float(rem))
            }
        }
    }
}

/// `**`; a negative integer exponent yields a float
pub fn power(left: &Value, right: &Value) -> ExpressionResult<Value> {
    match numbers("**", left, right)? {
        (Number::Int(base), Number::Int(exponent)) if exponent >= 0 => {
            let exponent = u32::try_from(exponent).map_err(|_| overflow("**"))?;
            base.checked_pow(exponent)
                .map(Value::Int)
                .ok_or_else(|| overflow("**"))
        }
        (base, exponent) => {
            let (base, exponent) = (base.as_f64(), exponent.as_f64());
            if base == 0.0 && exponent < 0.0 {
                return Err(ExpressionError::DivisionByZero);
            }
            let result = base.powf(exponent);
            if result.is_nan() && !base.is_nan() && !exponent.is_nan() {
                return Err(ExpressionError::InvalidValue {
                    message: "math domain error".to_string(),
                });
            }
            Ok(Value::Float(result))
        }
    }
}

/// Evaluate a unary operation
pub fn evaluate_unary_op(op: UnaryOperator, operand: Value) -> ExpressionResult<Value> {
    match op {
        UnaryOperator::Not => Ok(Value::Bool(!operand.is_truthy())),

        UnaryOperator::Plus => match operand.as_number() {
            Some(n) => Ok(n.into()),
            None => Err(ExpressionError::InvalidOperandTypes {
                operator: op.as_str().to_string(),
                left_type: operand.type_name(),
                right_type: None,
            }),
        },

        UnaryOperator::Minus => match operand.as_number() {
            Some(Number::Int(n)) => n
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| overflow("unary -")),
            Some(Number::Float(f)) => Ok(Value::Float(-f)),
            None => Err(ExpressionError::InvalidOperandTypes {
                operator: op.as_str().to_string(),
                left_type: operand.type_name(),
                right_type: None,
            }),
        },
    }
}

/// Order two values; `Ok(None)` means the values are unordered (NaN).
///
/// Numbers order numerically, strings lexicographically, and lists or
/// tuples element-wise. Any other pairing is a type error.
pub fn compare_values(op: &str, left: &Value, right: &Value) -> ExpressionResult<Option<Ordering>> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
            for (x, y) in a.iter().zip(b) {
                if !x.equals(y) {
                    return compare_values(op, x, y);
                }
            }
            Ok(Some(a.len().cmp(&b.len())))
        }
        _ => match (left.as_number(), right.as_number()) {
            (Some(Number::Int(a)), Some(Number::Int(b))) => Ok(Some(a.cmp(&b))),
            (Some(a), Some(b)) => Ok(a.as_f64().partial_cmp(&b.as_f64())),
            _ => Err(invalid_operands(op, left, right)),
        },
    }
}

/// Apply one link of a comparison chain
pub fn compare(op: CompareOperator, left: &Value, right: &Value) -> ExpressionResult<bool> {
    match op {
        CompareOperator::Eq => Ok(left.equals(right)),
        CompareOperator::Ne => Ok(!left.equals(right)),
        CompareOperator::Is => Ok(left.is_identical(right)),
        CompareOperator::IsNot => Ok(!left.is_identical(right)),
        CompareOperator::Lt | CompareOperator::Le | CompareOperator::Gt | CompareOperator::Ge => {
            let ordering = match compare_values(op.as_str(), left, right)? {
                Some(ordering) => ordering,
                None => return Ok(false),
            };
            Ok(match op {
                CompareOperator::Lt => ordering == Ordering::Less,
                CompareOperator::Le => ordering != Ordering::Greater,
                CompareOperator::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::Parser;

    /// Parse `source`, bind `c1..cN` to `row`, and evaluate
    fn eval(source: &str, row: &[Value]) -> ExpressionResult<Value> {
        let expr = Parser::new(source).parse().unwrap();
        let expr = expr.resolve_columns(&|name: &str| {
            name.strip_prefix('c')
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|n| *n >= 1 && *n <= row.len())
                .map(|n| n - 1)
        });
        evaluate_expression(&expr, row)
    }

    fn s(text: &str) -> Value {
        Value::Str(text.to_string())
    }

    #[test]
    fn test_literal_evaluation() {
        assert_eq!(eval("42", &[]).unwrap(), Value::Int(42));
        assert_eq!(eval("2.5", &[]).unwrap(), Value::Float(2.5));
        assert_eq!(eval("'hello'", &[]).unwrap(), s("hello"));
        assert_eq!(
            eval("(1, 'a')", &[]).unwrap(),
            Value::Tuple(vec![Value::Int(1), s("a")])
        );
    }

    #[test]
    fn test_column_ref_evaluation() {
        let row = vec![Value::Int(1), s("test"), Value::Float(0.5)];
        assert_eq!(eval("c1", &row).unwrap(), Value::Int(1));
        assert_eq!(eval("c2", &row).unwrap(), s("test"));
        assert_eq!(eval("c3", &row).unwrap(), Value::Float(0.5));

        // Not bound
        assert!(matches!(
            eval("c4", &row),
            Err(ExpressionError::UnknownName { .. })
        ));

        // Out of bounds when the row is shorter than the binding
        let expr = Expression::column(3);
        assert!(matches!(
            evaluate_expression(&expr, &row),
            Err(ExpressionError::ColumnIndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_arithmetic_operations() {
        assert_eq!(eval("10 + 5", &[]).unwrap(), Value::Int(15));
        assert_eq!(eval("10 - 5.5", &[]).unwrap(), Value::Float(4.5));
        assert_eq!(eval("4 * 3", &[]).unwrap(), Value::Int(12));
        assert_eq!(eval("7 / 2", &[]).unwrap(), Value::Float(3.5));
        assert_eq!(eval("7 // 2", &[]).unwrap(), Value::Int(3));
        assert_eq!(eval("-7 // 2", &[]).unwrap(), Value::Int(-4));
        assert_eq!(eval("7.5 // 2", &[]).unwrap(), Value::Float(3.0));
        assert_eq!(eval("2 ** 10", &[]).unwrap(), Value::Int(1024));
        assert_eq!(eval("2 ** -1", &[]).unwrap(), Value::Float(0.5));
        assert_eq!(eval("-2 ** 2", &[]).unwrap(), Value::Int(-4));
        assert_eq!(eval("2 * (3 + 4)", &[]).unwrap(), Value::Int(14));

        // Booleans behave as integers
        let row = vec![Value::Bool(true)];
        assert_eq!(eval("c1 + 1", &row).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_arithmetic_errors() {
        assert!(matches!(
            eval("10 / 0", &[]),
            Err(ExpressionError::DivisionByZero)
        ));
        assert!(matches!(
            eval("10 // 0", &[]),
            Err(ExpressionError::DivisionByZero)
        ));
        assert!(matches!(
            eval("0 ** -1", &[]),
            Err(ExpressionError::DivisionByZero)
        ));
        assert!(matches!(
            eval("10 + '5'", &[]),
            Err(ExpressionError::InvalidOperandTypes { .. })
        ));
        assert!(matches!(
            eval("-'a'", &[]),
            Err(ExpressionError::InvalidOperandTypes { .. })
        ));
        assert!(matches!(
            eval("9223372036854775807 + 1", &[]),
            Err(ExpressionError::Overflow { .. })
        ));
        assert!(matches!(
            eval("(-8) ** 0.5", &[]),
            Err(ExpressionError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_sequence_operations() {
        assert_eq!(eval("'ab' + 'cd'", &[]).unwrap(), s("abcd"));
        assert_eq!(eval("'ab' * 3", &[]).unwrap(), s("ababab"));
        assert_eq!(eval("2 * 'x'", &[]).unwrap(), s("xx"));
        assert_eq!(eval("'x' * -1", &[]).unwrap(), s(""));
        assert_eq!(
            eval("(1,) * 2 + (2,)", &[]).unwrap(),
            Value::Tuple(vec![Value::Int(1), Value::Int(1), Value::Int(2)])
        );
        assert!(matches!(
            eval("'x' * 100000000", &[]),
            Err(ExpressionError::SequenceTooLarge { .. })
        ));
    }

    #[test]
    fn test_repeat_empty_sequence() {
        assert_eq!(
            eval("() * 9223372036854775807", &[]).unwrap(),
            Value::Tuple(vec![])
        );
        assert_eq!(
            eval("c1 * 9223372036854775807", &[Value::List(vec![])]).unwrap(),
            Value::List(vec![])
        );
        assert_eq!(eval("'' * 9223372036854775807", &[]).unwrap(), s(""));
        assert_eq!(eval("(1, 2) * 0", &[]).unwrap(), Value::Tuple(vec![]));
    }

    #[test]
    fn test_repeat_counts_nested_contents() {
        let row = [s(&"x".repeat(1_000))];
        assert!(matches!(
            eval("(c1,) * 10000", &row),
            Err(ExpressionError::SequenceTooLarge { .. })
        ));
        assert!(matches!(
            eval("((1, 2, 3),) * 400000", &[]),
            Err(ExpressionError::SequenceTooLarge { .. })
        ));
        assert_eq!(
            eval("(c1,) * 3", &row).unwrap(),
            Value::Tuple(vec![row[0].clone(), row[0].clone(), row[0].clone()])
        );
    }

    #[test]
    fn test_comparison_operations() {
        assert_eq!(eval("5 == 5.0", &[]).unwrap(), Value::Bool(true));
        assert_eq!(eval("5 != 3", &[]).unwrap(), Value::Bool(true));
        assert_eq!(eval("3 < 5", &[]).unwrap(), Value::Bool(true));
        assert_eq!(eval("5 >= 5", &[]).unwrap(), Value::Bool(true));
        assert_eq!(eval("'abc' < 'abd'", &[]).unwrap(), Value::Bool(true));
        assert_eq!(eval("(1, 2) < (1, 3)", &[]).unwrap(), Value::Bool(true));
        assert_eq!(eval("1 == 'a'", &[]).unwrap(), Value::Bool(false));
        assert!(matches!(
            eval("1 < 'a'", &[]),
            Err(ExpressionError::InvalidOperandTypes { .. })
        ));
    }

    #[test]
    fn test_comparison_chain() {
        let row = vec![Value::Int(5)];
        assert_eq!(eval("0 < c1 <= 5", &row).unwrap(), Value::Bool(true));
        assert_eq!(eval("0 < c1 < 5", &row).unwrap(), Value::Bool(false));
        // The chain stops at the first false link
        assert_eq!(eval("1 > 2 < 'a'", &[]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_identity_operations() {
        assert_eq!(eval("1 is 1", &[]).unwrap(), Value::Bool(true));
        assert_eq!(eval("1 is 1.0", &[]).unwrap(), Value::Bool(false));
        assert_eq!(eval("'a' is not 'b'", &[]).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_logical_operations() {
        assert_eq!(eval("1 and 2", &[]).unwrap(), Value::Int(2));
        assert_eq!(eval("0 and 2", &[]).unwrap(), Value::Int(0));
        assert_eq!(eval("0 or 'x'", &[]).unwrap(), s("x"));
        assert_eq!(eval("not ''", &[]).unwrap(), Value::Bool(true));
        assert_eq!(eval("not 3", &[]).unwrap(), Value::Bool(false));

        // Short-circuit skips the failing right operand
        assert_eq!(eval("0 and 1 / 0", &[]).unwrap(), Value::Int(0));
        assert_eq!(eval("1 or 1 / 0", &[]).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_complex_expressions() {
        let row = vec![Value::Float(10.0), Value::Float(5.0), s("yes")];
        assert_eq!(
            eval("(c1 + c2) > 12 and c3 == 'yes'", &row).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval("(c1 - c2) * 2 == 10", &row).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(eval("c1 / c2", &row).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn test_modulo() {
        assert_eq!(modulo(&Value::Int(-7), &Value::Int(2)).unwrap(), Value::Int(1));
        assert_eq!(modulo(&Value::Int(7), &Value::Int(-2)).unwrap(), Value::Int(-1));
        assert_eq!(
            modulo(&Value::Float(5.5), &Value::Int(2)).unwrap(),
            Value::Float(1.5)
        );
        assert!(matches!(
            modulo(&Value::Int(1), &Value::Int(0)),
            Err(ExpressionError::DivisionByZero)
        ));
    }
}
