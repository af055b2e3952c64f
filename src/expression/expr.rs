//! Expression AST definitions.

use crate::expression::operator::{BinaryOperator, CompareOperator, UnaryOperator};
use crate::value::Value;

/// Column reference in an expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// Column index in the row (0-based)
    pub index: usize,
    /// Binding name (`c1`, `c2`, ...)
    pub name: String,
}

impl ColumnRef {
    #[cfg(test)]
    pub fn new(index: usize) -> Self {
        Self {
            index,
            name: format!("c{}", index + 1),
        }
    }
}

/// Literal value in an expression
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: Value,
}

impl Literal {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    #[cfg(test)]
    pub fn int(val: i64) -> Self {
        Self {
            value: Value::Int(val),
        }
    }

    #[cfg(test)]
    pub fn string(val: impl Into<String>) -> Self {
        Self {
            value: Value::Str(val.into()),
        }
    }
}

/// Expression tree node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal constant value
    Literal(Literal),

    /// Column reference resolved against the row binding
    ColumnRef(ColumnRef),

    /// Identifier that does not name a bound column
    Name(String),

    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },

    /// Comparison chain: `left op1 e1 op2 e2 ...`
    Compare {
        left: Box<Expression>,
        comparisons: Vec<(CompareOperator, Expression)>,
    },

    /// Call of an allowed built-in function
    FunctionCall { name: String, args: Vec<Expression> },

    /// Call of an allowed string or sequence method
    MethodCall {
        receiver: Box<Expression>,
        method: String,
        args: Vec<Expression>,
    },

    /// Parenthesized, comma-separated values
    Tuple(Vec<Expression>),
}

impl Expression {
    /// Create a literal expression
    pub fn literal(value: Value) -> Self {
        Expression::Literal(Literal::new(value))
    }

    /// Create a column reference expression
    #[cfg(test)]
    pub fn column(index: usize) -> Self {
        Expression::ColumnRef(ColumnRef::new(index))
    }

    /// Create a binary operation expression
    pub fn binary_op(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Create a unary operation expression
    pub fn unary_op(op: UnaryOperator, operand: Expression) -> Self {
        Expression::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    /// Create a single comparison
    #[cfg(test)]
    pub fn compare(op: CompareOperator, left: Expression, right: Expression) -> Self {
        Expression::Compare {
            left: Box::new(left),
            comparisons: vec![(op, right)],
        }
    }

    pub fn not_expr(operand: Expression) -> Self {
        Self::unary_op(UnaryOperator::Not, operand)
    }

    #[cfg(test)]
    pub fn add_expr(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Add, left, right)
    }

    #[cfg(test)]
    pub fn mul_expr(left: Expression, right: Expression) -> Self {
        Self::binary_op(BinaryOperator::Mul, left, right)
    }

    /// Create a function call expression
    #[cfg(test)]
    pub fn call(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::FunctionCall {
            name: name.into(),
            args,
        }
    }

    /// Create a method call expression
    pub fn method_call(
        receiver: Expression,
        method: impl Into<String>,
        args: Vec<Expression>,
    ) -> Self {
        Expression::MethodCall {
            receiver: Box::new(receiver),
            method: method.into(),
            args,
        }
    }

    /// Direct subexpressions, left to right
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Literal(_) | Expression::ColumnRef(_) | Expression::Name(_) => vec![],
            Expression::BinaryOp { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expression::UnaryOp { operand, .. } => vec![operand.as_ref()],
            Expression::Compare { left, comparisons } => std::iter::once(left.as_ref())
                .chain(comparisons.iter().map(|(_, e)| e))
                .collect(),
            Expression::FunctionCall { args, .. } | Expression::Tuple(args) => {
                args.iter().collect()
            }
            Expression::MethodCall { receiver, args, .. } => std::iter::once(receiver.as_ref())
                .chain(args.iter())
                .collect(),
        }
    }

    /// Height of the tree; a leaf has depth 1. Walks with an explicit stack.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((expr, level)) = stack.pop() {
            deepest = deepest.max(level);
            stack.extend(expr.children().into_iter().map(|child| (child, level + 1)));
        }
        deepest
    }

    /// Replace names that denote bound columns with column references
    pub fn resolve_columns<F>(self, lookup: &F) -> Expression
    where
        F: Fn(&str) -> Option<usize>,
    {
        let resolve_all = |exprs: Vec<Expression>| -> Vec<Expression> {
            exprs
                .into_iter()
                .map(|e| e.resolve_columns(lookup))
                .collect()
        };

        match self {
            Expression::Name(name) => match lookup(&name) {
                Some(index) => Expression::ColumnRef(ColumnRef { index, name }),
                None => Expression::Name(name),
            },
            Expression::BinaryOp { op, left, right } => Expression::BinaryOp {
                op,
                left: Box::new(left.resolve_columns(lookup)),
                right: Box::new(right.resolve_columns(lookup)),
            },
            Expression::UnaryOp { op, operand } => Expression::UnaryOp {
                op,
                operand: Box::new(operand.resolve_columns(lookup)),
            },
            Expression::Compare { left, comparisons } => Expression::Compare {
                left: Box::new(left.resolve_columns(lookup)),
                comparisons: comparisons
                    .into_iter()
                    .map(|(op, e)| (op, e.resolve_columns(lookup)))
                    .collect(),
            },
            Expression::FunctionCall { name, args } => Expression::FunctionCall {
                name,
                args: resolve_all(args),
            },
            Expression::MethodCall {
                receiver,
                method,
                args,
            } => Expression::MethodCall {
                receiver: Box::new(receiver.resolve_columns(lookup)),
                method,
                args: resolve_all(args),
            },
            Expression::Tuple(items) => Expression::Tuple(resolve_all(items)),
            other => other,
        }
    }

    /// Check if this expression is a constant (contains no column references or names)
    pub fn is_constant(&self) -> bool {
        match self {
            Expression::Literal(_) => true,
            Expression::ColumnRef(_) | Expression::Name(_) => false,
            Expression::BinaryOp { left, right, .. } => left.is_constant() && right.is_constant(),
            Expression::UnaryOp { operand, .. } => operand.is_constant(),
            Expression::Compare { left, comparisons } => {
                left.is_constant() && comparisons.iter().all(|(_, e)| e.is_constant())
            }
            Expression::FunctionCall { args, .. } => args.iter().all(|arg| arg.is_constant()),
            Expression::MethodCall { receiver, args, .. } => {
                receiver.is_constant() && args.iter().all(|arg| arg.is_constant())
            }
            Expression::Tuple(items) => items.iter().all(|e| e.is_constant()),
        }
    }

    /// Identifiers left unresolved, in order of first appearance
    pub fn unresolved_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, names: &mut Vec<String>) {
        match self {
            Expression::Name(name) => {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            Expression::Literal(_) | Expression::ColumnRef(_) => {}
            Expression::BinaryOp { left, right, .. } => {
                left.collect_names(names);
                right.collect_names(names);
            }
            Expression::UnaryOp { operand, .. } => operand.collect_names(names),
            Expression::Compare { left, comparisons } => {
                left.collect_names(names);
                for (_, e) in comparisons {
                    e.collect_names(names);
                }
            }
            Expression::FunctionCall { args, .. } => {
                for arg in args {
                    arg.collect_names(names);
                }
            }
            Expression::MethodCall { receiver, args, .. } => {
                receiver.collect_names(names);
                for arg in args {
                    arg.collect_names(names);
                }
            }
            Expression::Tuple(items) => {
                for item in items {
                    item.collect_names(names);
                }
            }
        }
    }
}
