//! Error types for expression evaluation.

use std::fmt;

/// Errors that can occur while evaluating an expression against a row
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionError {
    /// Value of the wrong type passed to a function or method
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
        context: String,
    },

    /// Invalid operand types for operator
    InvalidOperandTypes {
        operator: String,
        left_type: &'static str,
        right_type: Option<&'static str>,
    },

    /// Column index out of bounds
    ColumnIndexOutOfBounds { index: usize, row_size: usize },

    /// Identifier that is neither a bound column nor callable here
    UnknownName { name: String },

    /// Division or modulo by zero
    DivisionByZero,

    /// Integer result does not fit in 64 bits
    Overflow { context: String },

    /// Invalid function name
    UnknownFunction { name: String },

    /// Method not available on the receiver's type
    UnknownMethod {
        type_name: &'static str,
        method: String,
    },

    /// Wrong number of function arguments
    FunctionArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Argument of the right type but an unacceptable value
    InvalidValue { message: String },

    /// Generated sequence above the evaluation limit
    SequenceTooLarge { length: usize, limit: usize },
}

impl fmt::Display for ExpressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionError::TypeMismatch {
                expected,
                actual,
                context,
            } => {
                write!(
                    f,
                    "Type mismatch in {}: expected {}, got {}",
                    context, expected, actual
                )
            }

            ExpressionError::InvalidOperandTypes {
                operator,
                left_type,
                right_type: Some(right_type),
            } => {
                write!(
                    f,
                    "Invalid operand types for operator {}: '{}' and '{}'",
                    operator, left_type, right_type
                )
            }

            ExpressionError::InvalidOperandTypes {
                operator,
                left_type,
                right_type: None,
            } => {
                write!(
                    f,
                    "Invalid operand type for unary operator {}: '{}'",
                    operator, left_type
                )
            }

            ExpressionError::ColumnIndexOutOfBounds { index, row_size } => {
                write!(
                    f,
                    "Column index {} out of bounds for row with {} columns",
                    index, row_size
                )
            }

            ExpressionError::UnknownName { name } => {
                write!(f, "Name '{}' is not defined", name)
            }

            ExpressionError::DivisionByZero => write!(f, "Division by zero"),

            ExpressionError::Overflow { context } => {
                write!(f, "Integer overflow in {}", context)
            }

            ExpressionError::UnknownFunction { name } => {
                write!(f, "Unknown function: {}", name)
            }

            ExpressionError::UnknownMethod { type_name, method } => {
                write!(f, "'{}' object has no method '{}'", type_name, method)
            }

            ExpressionError::FunctionArgumentCount {
                function,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Function {} expects {} arguments, got {}",
                    function, expected, actual
                )
            }

            ExpressionError::InvalidValue { message } => write!(f, "{}", message),

            ExpressionError::SequenceTooLarge { length, limit } => {
                write!(
                    f,
                    "Sequence of {} elements exceeds the limit of {}",
                    length, limit
                )
            }
        }
    }
}

impl std::error::Error for ExpressionError {}

/// Result type for expression operations
pub type ExpressionResult<T> = Result<T, ExpressionError>;
