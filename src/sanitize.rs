//! Expression sanitizer: placeholder unescaping, the token whitelist and
//! one-time compilation against the column binding.

use std::fmt;

use log::{debug, warn};

use crate::binding::Binding;
use crate::error::{Error, RunResult};
use crate::expression::builtins;
use crate::expression::{evaluate_expression, Expression, ExpressionResult};
use crate::syntax::{Lexer, Parser, Token};
use crate::value::Value;

/// Escaped spellings of characters that cannot travel through the caller
/// unescaped, applied in this order
pub const PLACEHOLDERS: &[(&str, &str)] = &[
    ("__lt__", "<"),
    ("__le__", "<="),
    ("__eq__", "=="),
    ("__ne__", "!="),
    ("__gt__", ">"),
    ("__ge__", ">="),
    ("__sq__", "'"),
    ("__dq__", "\""),
];

/// Name of the wrapper shown when positional rendering is requested
pub const POSITIONAL_WRAPPER: &str = "format_float_positional";

/// Replace every placeholder with the character it stands for
pub fn unescape(raw: &str) -> String {
    PLACEHOLDERS
        .iter()
        .fold(raw.to_string(), |text, (placeholder, replacement)| {
            text.replace(placeholder, replacement)
        })
}

/// Expression text that passed the whitelist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeExpression {
    source: String,
    fixed_point: bool,
}

impl SafeExpression {
    /// The unescaped expression without the positional wrapper
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn fixed_point(&self) -> bool {
        self.fixed_point
    }

    /// Parse the expression and resolve column names against the binding
    pub fn compile(&self, binding: &Binding) -> RunResult<CompiledExpression> {
        let ast = Parser::new(&self.source)
            .parse()
            .map_err(|err| {
                debug!("Parse error in {:?}: {:#}", self.source, err);
                Error::ExpressionSyntax {
                    expression: self.to_string(),
                    reason: format!("{:#}", err),
                }
            })?
            .resolve_columns(&|name: &str| binding.column_index(name));

        let unresolved = ast.unresolved_names();
        if !unresolved.is_empty() {
            warn!(
                "Expression references {} which {} not bound to any of the {} columns; every row will be skipped",
                unresolved.join(", "),
                if unresolved.len() == 1 { "is" } else { "are" },
                binding.len()
            );
        } else if ast.is_constant() {
            warn!("Expression does not reference any column");
        }

        Ok(CompiledExpression {
            ast,
            fixed_point: self.fixed_point,
            display: self.to_string(),
        })
    }
}

impl fmt::Display for SafeExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fixed_point {
            write!(f, "{}({})", POSITIONAL_WRAPPER, self.source)
        } else {
            f.write_str(&self.source)
        }
    }
}

/// Whether an identifier token may appear in an expression
fn is_allowed_identifier(name: &str) -> bool {
    let is_column = name
        .strip_prefix('c')
        .map_or(false, |digits| {
            !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
        });
    is_column || builtins::is_allowed_name(name)
}

/// Unescape `raw` and check it against the whitelist.
///
/// String literal contents are data and are not checked. Any character
/// outside the expression alphabet and any identifier that is neither a
/// column reference nor an allowed function or method name rejects the
/// whole expression.
pub fn sanitize(raw: &str, avoid_scientific_notation: bool) -> RunResult<SafeExpression> {
    let source = unescape(raw);
    let rejected = || Error::InvalidExpression {
        expression: source.clone(),
    };

    for token in Lexer::new(&source).tokenize() {
        match token {
            Token::Invalid(c) => {
                debug!("Rejected character {:?} in expression", c);
                return Err(rejected());
            }
            Token::Identifier(ref name) if !is_allowed_identifier(name) => {
                debug!("Rejected identifier {:?} in expression", name);
                return Err(rejected());
            }
            _ => {}
        }
    }

    Ok(SafeExpression {
        source,
        fixed_point: avoid_scientific_notation,
    })
}

/// A parsed expression ready to be evaluated against every row
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    ast: Expression,
    fixed_point: bool,
    display: String,
}

impl CompiledExpression {
    pub fn ast(&self) -> &Expression {
        &self.ast
    }

    /// Whether results are rendered in positional notation
    pub fn fixed_point(&self) -> bool {
        self.fixed_point
    }

    /// Evaluate against one row's bound values
    pub fn evaluate(&self, row_values: &[Value]) -> ExpressionResult<Value> {
        evaluate_expression(&self.ast, row_values)
    }
}

impl fmt::Display for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}
