//! Expression evaluation for computed columns.
//!
//! This module provides:
//! - Expression AST representation
//! - The built-in function and method tables
//! - Expression evaluation against a row's bound values

pub mod builtins;
pub mod error;
pub mod eval;
pub mod expr;
pub mod operator;

pub use error::{ExpressionError, ExpressionResult};
pub use eval::{evaluate_expression, ExpressionEvaluator};
pub use expr::{ColumnRef, Expression, Literal};
pub use operator::{BinaryOperator, CompareOperator, UnaryOperator};
