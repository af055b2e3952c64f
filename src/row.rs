//! Per-line evaluation.

use thiserror::Error;

use crate::binding::Binding;
use crate::expression::{builtins, ExpressionError};
use crate::sanitize::CompiledExpression;
use crate::value::{DataType, Value};

/// Skip categories, counted separately for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    BlankOrComment,
    Coercion,
    Evaluation,
}

/// Result of evaluating one input line
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// Output line including the trailing newline
    Emit(String),
    Skip(SkipReason),
}

/// Why a line was not emitted
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("blank line")]
    Blank,

    #[error("comment line")]
    Comment,

    #[error("line is not valid UTF-8")]
    InvalidUtf8,

    #[error("expected {expected} tab-separated fields, found {actual}")]
    FieldCount { expected: usize, actual: usize },

    #[error("cannot read {field:?} as {expected} for column {column}")]
    Coercion {
        column: String,
        expected: DataType,
        field: String,
    },

    #[error("{0}")]
    Evaluation(#[from] ExpressionError),
}

impl RowError {
    pub fn reason(&self) -> SkipReason {
        match self {
            RowError::Blank | RowError::Comment => SkipReason::BlankOrComment,
            RowError::InvalidUtf8 | RowError::FieldCount { .. } | RowError::Coercion { .. } => {
                SkipReason::Coercion
            }
            RowError::Evaluation(_) => SkipReason::Evaluation,
        }
    }
}

/// Drop trailing `\r` and `\n` characters
pub fn strip_line_ending(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

/// Evaluates the compiled expression against input lines
pub struct RowEvaluator<'a> {
    binding: &'a Binding,
    expression: &'a CompiledExpression,
    round_result: bool,
}

impl<'a> RowEvaluator<'a> {
    pub fn new(
        binding: &'a Binding,
        expression: &'a CompiledExpression,
        round_result: bool,
    ) -> Self {
        Self {
            binding,
            expression,
            round_result,
        }
    }

    /// Evaluate one line, line ending included or not
    pub fn evaluate(&self, line: &str) -> RowOutcome {
        match self.try_evaluate(line) {
            Ok(output) => RowOutcome::Emit(output),
            Err(err) => RowOutcome::Skip(err.reason()),
        }
    }

    /// Like [`RowEvaluator::evaluate`], keeping the error detail
    pub fn try_evaluate(&self, line: &str) -> Result<String, RowError> {
        let line = strip_line_ending(line);
        if line.is_empty() {
            return Err(RowError::Blank);
        }
        if line.starts_with('#') {
            return Err(RowError::Comment);
        }

        let values = self.binding.bind(line)?;
        let mut value = self.expression.evaluate(&values)?;

        if self.round_result {
            value = round_to_int(value)?;
        }

        let rendered = if self.expression.fixed_point() {
            value
                .to_positional()
                .ok_or_else(|| ExpressionError::TypeMismatch {
                    expected: "number",
                    actual: value.type_name(),
                    context: "positional formatting".to_string(),
                })?
        } else {
            value.to_string()
        };

        Ok(format!("{}\t{}\n", line, rendered))
    }
}

/// Round a result to the nearest integer, ties to even
fn round_to_int(value: Value) -> Result<Value, ExpressionError> {
    match value {
        Value::Bool(_) | Value::Int(_) | Value::Float(_) => {
            builtins::call_function("round", vec![value])
        }
        other => Err(ExpressionError::TypeMismatch {
            expected: "number",
            actual: other.type_name(),
            context: "round".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::sanitize;

    fn compile(
        expr: &str,
        types: &[&str],
        round: bool,
        fixed_point: bool,
    ) -> (Binding, CompiledExpression) {
        let binding = Binding::build(types.len(), types, round).unwrap();
        let compiled = sanitize(expr, fixed_point)
            .unwrap()
            .compile(&binding)
            .unwrap();
        (binding, compiled)
    }

    #[test]
    fn test_strip_line_ending() {
        assert_eq!(strip_line_ending("a\tb\n"), "a\tb");
        assert_eq!(strip_line_ending("a\tb\r\n"), "a\tb");
        assert_eq!(strip_line_ending("a\tb"), "a\tb");
        assert_eq!(strip_line_ending("\n"), "");
    }

    #[test]
    fn test_emit() {
        let (binding, expr) = compile("c1 + c2", &["int", "int"], false, false);
        let evaluator = RowEvaluator::new(&binding, &expr, false);
        assert_eq!(
            evaluator.evaluate("3\t4\n"),
            RowOutcome::Emit("3\t4\t7\n".to_string())
        );
        assert_eq!(
            evaluator.evaluate("1.5\t4\r\n"),
            RowOutcome::Emit("1.5\t4\t5.5\n".to_string())
        );
    }

    #[test]
    fn test_no_premature_truncation() {
        let (binding, expr) = compile("c1 / c2", &["int", "int"], false, false);
        let evaluator = RowEvaluator::new(&binding, &expr, false);
        assert_eq!(
            evaluator.evaluate("7\t2"),
            RowOutcome::Emit("7\t2\t3.5\n".to_string())
        );
    }

    #[test]
    fn test_rounding() {
        let (binding, expr) = compile("c1 / c2", &["int", "int"], true, false);
        let evaluator = RowEvaluator::new(&binding, &expr, true);
        // Integer columns stay integers, so 7 / 2 is 3.5 and rounds to even
        assert_eq!(
            evaluator.evaluate("7\t2"),
            RowOutcome::Emit("7\t2\t4\n".to_string())
        );
        assert_eq!(
            evaluator.evaluate("5\t2"),
            RowOutcome::Emit("5\t2\t2\n".to_string())
        );

        let (binding, expr) = compile("c1 > c2", &["int", "int"], true, false);
        let evaluator = RowEvaluator::new(&binding, &expr, true);
        assert_eq!(
            evaluator.evaluate("7\t2"),
            RowOutcome::Emit("7\t2\t1\n".to_string())
        );

        let (binding, expr) = compile("c1.upper()", &["str", "int"], true, false);
        let evaluator = RowEvaluator::new(&binding, &expr, true);
        assert_eq!(
            evaluator.evaluate("a\t2"),
            RowOutcome::Skip(SkipReason::Evaluation)
        );

        let (binding, expr) = compile("c1 / c2", &["float", "float"], true, false);
        let evaluator = RowEvaluator::new(&binding, &expr, true);
        assert_eq!(
            evaluator.evaluate("inf\t2"),
            RowOutcome::Skip(SkipReason::Evaluation)
        );
    }

    #[test]
    fn test_fixed_point() {
        let (binding, expr) = compile("c1 / c2", &["float", "float"], false, true);
        let evaluator = RowEvaluator::new(&binding, &expr, false);
        assert_eq!(
            evaluator.evaluate("1\t100000"),
            RowOutcome::Emit("1\t100000\t0.00001\n".to_string())
        );

        let (binding, expr) = compile("c1 / c2", &["float", "float"], false, false);
        let evaluator = RowEvaluator::new(&binding, &expr, false);
        assert_eq!(
            evaluator.evaluate("1\t100000"),
            RowOutcome::Emit("1\t100000\t1e-05\n".to_string())
        );

        let (binding, expr) = compile("c1", &["str", "str"], false, true);
        let evaluator = RowEvaluator::new(&binding, &expr, false);
        assert_eq!(
            evaluator.evaluate("a\tb"),
            RowOutcome::Skip(SkipReason::Evaluation)
        );
    }

    #[test]
    fn test_skip_reasons() {
        let (binding, expr) = compile("c1 / c2", &["int", "int"], false, false);
        let evaluator = RowEvaluator::new(&binding, &expr, false);

        assert_eq!(evaluator.try_evaluate("\n"), Err(RowError::Blank));
        assert_eq!(evaluator.try_evaluate("# header\n"), Err(RowError::Comment));
        assert_eq!(
            evaluator.evaluate("1\t2\t3"),
            RowOutcome::Skip(SkipReason::Coercion)
        );
        assert_eq!(
            evaluator.evaluate("one\t2"),
            RowOutcome::Skip(SkipReason::Coercion)
        );
        assert_eq!(
            evaluator.try_evaluate("1\t0"),
            Err(RowError::Evaluation(ExpressionError::DivisionByZero))
        );
        assert_eq!(RowError::InvalidUtf8.reason(), SkipReason::Coercion);
    }

    #[test]
    fn test_string_columns() {
        let (binding, expr) = compile(
            "c1.replace('chr', '') + ':' + str(len(c2))",
            &["str", "list"],
            false,
            false,
        );
        let evaluator = RowEvaluator::new(&binding, &expr, false);
        assert_eq!(
            evaluator.evaluate("chr7\tACGT"),
            RowOutcome::Emit("chr7\tACGT\t7:4\n".to_string())
        );
    }
}
