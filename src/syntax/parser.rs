// Expression parser - converts tokens to an expression tree

use super::lexer::Lexer;
use super::token::Token;
use crate::expression::{BinaryOperator, CompareOperator, Expression, UnaryOperator};
use crate::value::Value;
use anyhow::{bail, Result};

/// Deepest allowed nesting of parentheses, calls and prefix operators,
/// and the tallest allowed expression tree
pub const MAX_NESTING_DEPTH: usize = 100;

/// Longest accepted token stream
pub const MAX_TOKENS: usize = 4096;

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        let mut lexer = Lexer::new(source);
        Self::from_tokens(lexer.tokenize())
    }

    pub fn from_tokens(mut tokens: Vec<Token>) -> Self {
        if tokens.last() != Some(&Token::Eof) {
            tokens.push(Token::Eof);
        }
        Parser {
            tokens,
            position: 0,
            depth: 0,
        }
    }

    /// Parse a complete expression; trailing tokens are an error
    pub fn parse(&mut self) -> Result<Expression> {
        if self.tokens.len() > MAX_TOKENS {
            bail!(
                "Expression too long: {} tokens, at most {} allowed",
                self.tokens.len(),
                MAX_TOKENS
            );
        }

        let expr = self.parse_expression()?;
        let token = self.current_token();
        if token != Token::Eof {
            bail!("Unexpected token after expression: {:?}", token);
        }

        // Operator chains are built iteratively, so check the finished tree too
        let depth = expr.depth();
        if depth > MAX_NESTING_DEPTH {
            bail!(
                "Expression nested too deeply: depth {}, at most {} allowed",
                depth,
                MAX_NESTING_DEPTH
            );
        }
        Ok(expr)
    }

    fn parse_expression(&mut self) -> Result<Expression> {
        self.nested(Self::parse_or)
    }

    /// Run `parse` one nesting level deeper
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            bail!(
                "Expression nested too deeply: more than {} levels",
                MAX_NESTING_DEPTH
            );
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Parse OR expression
    fn parse_or(&mut self) -> Result<Expression> {
        let mut left = self.parse_and()?;

        while self.match_token(&Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expression::binary_op(BinaryOperator::Or, left, right);
        }

        Ok(left)
    }

    /// Parse AND expression
    fn parse_and(&mut self) -> Result<Expression> {
        let mut left = self.parse_not()?;

        while self.match_token(&Token::And) {
            self.advance();
            let right = self.parse_not()?;
            left = Expression::binary_op(BinaryOperator::And, left, right);
        }

        Ok(left)
    }

    /// Parse NOT expression
    fn parse_not(&mut self) -> Result<Expression> {
        if self.match_token(&Token::Not) {
            self.advance();
            let operand = self.nested(Self::parse_not)?;
            Ok(Expression::not_expr(operand))
        } else {
            self.parse_comparison()
        }
    }

    /// Parse a comparison chain such as `0 < c1 <= 10`
    fn parse_comparison(&mut self) -> Result<Expression> {
        let left = self.parse_addition()?;
        let mut comparisons = vec![];

        loop {
            let op = match self.current_token() {
                Token::Equal => CompareOperator::Eq,
                Token::NotEqual => CompareOperator::Ne,
                Token::Less => CompareOperator::Lt,
                Token::LessEqual => CompareOperator::Le,
                Token::Greater => CompareOperator::Gt,
                Token::GreaterEqual => CompareOperator::Ge,
                Token::Is => {
                    self.advance();
                    if self.match_token(&Token::Not) {
                        self.advance();
                        comparisons.push((CompareOperator::IsNot, self.parse_addition()?));
                    } else {
                        comparisons.push((CompareOperator::Is, self.parse_addition()?));
                    }
                    continue;
                }
                _ => break,
            };
            self.advance();
            comparisons.push((op, self.parse_addition()?));
        }

        if comparisons.is_empty() {
            Ok(left)
        } else {
            Ok(Expression::Compare {
                left: Box::new(left),
                comparisons,
            })
        }
    }

    /// Parse addition/subtraction expression
    fn parse_addition(&mut self) -> Result<Expression> {
        let mut left = self.parse_multiplication()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.advance();

            let right = self.parse_multiplication()?;
            left = Expression::binary_op(op, left, right);
        }

        Ok(left)
    }

    /// Parse multiplication/division expression
    fn parse_multiplication(&mut self) -> Result<Expression> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Mul,
                Token::Slash => BinaryOperator::Div,
                Token::DoubleSlash => BinaryOperator::FloorDiv,
                _ => break,
            };
            self.advance();

            let right = self.parse_unary()?;
            left = Expression::binary_op(op, left, right);
        }

        Ok(left)
    }

    /// Parse unary expression
    fn parse_unary(&mut self) -> Result<Expression> {
        match self.current_token() {
            Token::Plus => {
                self.advance();
                let operand = self.nested(Self::parse_unary)?;
                Ok(Expression::unary_op(UnaryOperator::Plus, operand))
            }
            Token::Minus => {
                self.advance();
                let operand = self.nested(Self::parse_unary)?;
                Ok(Expression::unary_op(UnaryOperator::Minus, operand))
            }
            _ => self.parse_power(),
        }
    }

    /// Parse exponentiation; right-associative, `-2 ** 2` is `-(2 ** 2)`
    fn parse_power(&mut self) -> Result<Expression> {
        let base = self.parse_postfix()?;

        if self.match_token(&Token::DoubleStar) {
            self.advance();
            let exponent = self.nested(Self::parse_unary)?;
            Ok(Expression::binary_op(BinaryOperator::Pow, base, exponent))
        } else {
            Ok(base)
        }
    }

    /// Parse method calls chained onto a primary expression
    fn parse_postfix(&mut self) -> Result<Expression> {
        let mut expr = self.parse_primary()?;

        while self.match_token(&Token::Dot) {
            self.advance();
            let method = self.expect_identifier()?;
            if !self.match_token(&Token::LeftParen) {
                bail!("Method '{}' must be called", method);
            }
            self.advance();
            let args = self.parse_arguments()?;
            expr = Expression::method_call(expr, method, args);
        }

        Ok(expr)
    }

    /// Parse primary expression
    fn parse_primary(&mut self) -> Result<Expression> {
        match self.current_token() {
            Token::Number(n) => {
                self.advance();
                if n.contains('.') {
                    match n.parse::<f64>() {
                        Ok(f) => Ok(Expression::literal(Value::Float(f))),
                        Err(_) => bail!("Invalid number: {}", n),
                    }
                } else {
                    match n.parse::<i64>() {
                        Ok(i) => Ok(Expression::literal(Value::Int(i))),
                        Err(_) => bail!("Integer literal out of range: {}", n),
                    }
                }
            }
            Token::String(s) => {
                self.advance();
                Ok(Expression::literal(Value::Str(s)))
            }
            Token::UnterminatedString(_) => bail!("Unterminated string literal"),
            Token::Identifier(name) => {
                self.advance();

                if self.match_token(&Token::LeftParen) {
                    self.advance();
                    let args = self.parse_arguments()?;
                    Ok(Expression::FunctionCall { name, args })
                } else {
                    Ok(Expression::Name(name))
                }
            }
            Token::LeftParen => {
                self.advance();

                // `()` is the empty tuple
                if self.match_token(&Token::RightParen) {
                    self.advance();
                    return Ok(Expression::Tuple(vec![]));
                }

                let first = self.parse_expression()?;
                if !self.match_token(&Token::Comma) {
                    self.expect_token(Token::RightParen)?;
                    return Ok(first);
                }

                let mut items = vec![first];
                while self.match_token(&Token::Comma) {
                    self.advance();
                    if self.match_token(&Token::RightParen) {
                        break;
                    }
                    items.push(self.parse_expression()?);
                }
                self.expect_token(Token::RightParen)?;
                Ok(Expression::Tuple(items))
            }
            Token::Eof => bail!("Unexpected end of expression"),
            token => bail!("Unexpected token: {:?}", token),
        }
    }

    /// Parse call arguments after the opening parenthesis, through the closing one
    fn parse_arguments(&mut self) -> Result<Vec<Expression>> {
        let mut args = vec![];

        while !self.match_token(&Token::RightParen) {
            args.push(self.parse_expression()?);
            if self.match_token(&Token::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        self.expect_token(Token::RightParen)?;

        Ok(args)
    }

    // Helper methods

    /// Get current token
    fn current_token(&self) -> Token {
        self.tokens
            .get(self.position)
            .cloned()
            .unwrap_or(Token::Eof)
    }

    /// Advance to next token
    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    /// Check if current token matches
    fn match_token(&self, token: &Token) -> bool {
        self.current_token() == *token
    }

    /// Expect a specific token
    fn expect_token(&mut self, token: Token) -> Result<()> {
        if self.current_token() == token {
            self.advance();
            Ok(())
        } else {
            bail!("Expected {:?}, found {:?}", token, self.current_token())
        }
    }

    /// Expect an identifier
    fn expect_identifier(&mut self) -> Result<String> {
        match self.current_token() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => bail!("Expected identifier"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Expression {
        Parser::new(source).parse().unwrap()
    }

    #[test]
    fn test_parse_arithmetic_precedence() {
        let expr = parse("c1 + c2 * 2");
        assert_eq!(
            expr,
            Expression::add_expr(
                Expression::Name("c1".to_string()),
                Expression::mul_expr(
                    Expression::Name("c2".to_string()),
                    Expression::literal(Value::Int(2))
                )
            )
        );
    }

    #[test]
    fn test_parse_power_binds_tighter_than_unary_minus() {
        let expr = parse("-2 ** 2");
        assert_eq!(
            expr,
            Expression::unary_op(
                UnaryOperator::Minus,
                Expression::binary_op(
                    BinaryOperator::Pow,
                    Expression::literal(Value::Int(2)),
                    Expression::literal(Value::Int(2))
                )
            )
        );

        // Right-associative
        let expr = parse("2 ** 3 ** 2");
        match expr {
            Expression::BinaryOp { op, right, .. } => {
                assert_eq!(op, BinaryOperator::Pow);
                assert!(matches!(
                    *right,
                    Expression::BinaryOp {
                        op: BinaryOperator::Pow,
                        ..
                    }
                ));
            }
            _ => panic!("Expected power expression"),
        }
    }

    #[test]
    fn test_parse_comparison_chain() {
        let expr = parse("0 < c1 <= 10");
        match expr {
            Expression::Compare { comparisons, .. } => {
                assert_eq!(comparisons.len(), 2);
                assert_eq!(comparisons[0].0, CompareOperator::Lt);
                assert_eq!(comparisons[1].0, CompareOperator::Le);
            }
            _ => panic!("Expected comparison"),
        }
    }

    #[test]
    fn test_parse_is_not() {
        let expr = parse("c1 is not c2");
        match expr {
            Expression::Compare { comparisons, .. } => {
                assert_eq!(comparisons[0].0, CompareOperator::IsNot);
            }
            _ => panic!("Expected comparison"),
        }
    }

    #[test]
    fn test_parse_boolean_operators() {
        let expr = parse("not c1 == 1 and c2 or c3");
        match expr {
            Expression::BinaryOp { op, left, .. } => {
                assert_eq!(op, BinaryOperator::Or);
                assert!(matches!(
                    *left,
                    Expression::BinaryOp {
                        op: BinaryOperator::And,
                        ..
                    }
                ));
            }
            _ => panic!("Expected OR expression"),
        }
    }

    #[test]
    fn test_parse_calls() {
        let expr = parse("max(c1, c2, 3)");
        match expr {
            Expression::FunctionCall { name, args } => {
                assert_eq!(name, "max");
                assert_eq!(args.len(), 3);
            }
            _ => panic!("Expected function call"),
        }

        let expr = parse("c1.strip().upper()");
        match expr {
            Expression::MethodCall {
                receiver, method, ..
            } => {
                assert_eq!(method, "upper");
                assert!(matches!(*receiver, Expression::MethodCall { .. }));
            }
            _ => panic!("Expected method call"),
        }

        let expr = parse("'-'.join((c1, c2))");
        match expr {
            Expression::MethodCall { args, .. } => {
                assert!(matches!(&args[0], Expression::Tuple(items) if items.len() == 2));
            }
            _ => panic!("Expected method call"),
        }
    }

    #[test]
    fn test_parse_tuples() {
        assert_eq!(parse("()"), Expression::Tuple(vec![]));
        assert!(matches!(parse("(1,)"), Expression::Tuple(items) if items.len() == 1));
        assert_eq!(parse("(1)"), Expression::literal(Value::Int(1)));
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse("2.5"), Expression::literal(Value::Float(2.5)));
        assert_eq!(parse("7."), Expression::literal(Value::Float(7.0)));
        assert_eq!(
            parse("'abc'"),
            Expression::literal(Value::Str("abc".to_string()))
        );
    }

    #[test]
    fn test_parse_errors() {
        for source in [
            "",
            "c1 +",
            "(c1",
            "c1 = 2",
            "c1 ! c2",
            "c1.upper",
            "c1 c2",
            "'open",
            "c1: c2",
            "99999999999999999999",
        ] {
            assert!(
                Parser::new(source).parse().is_err(),
                "expected parse error for {:?}",
                source
            );
        }
    }

    fn error_message(source: &str) -> String {
        format!("{:#}", Parser::new(source).parse().unwrap_err())
    }

    #[test]
    fn test_parse_deep_parentheses() {
        let source = format!("{}c1{}", "(".repeat(20_000), ")".repeat(20_000));
        assert!(error_message(&source).starts_with("Expression too long"));

        let source = format!("{}c1{}", "(".repeat(1_000), ")".repeat(1_000));
        assert!(error_message(&source).starts_with("Expression nested too deeply"));

        let source = format!("{}c1{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(parse(&source), Expression::Name("c1".to_string()));
    }

    #[test]
    fn test_parse_deep_prefix_operators() {
        let source = format!("{}c1", "-".repeat(1_000));
        assert!(error_message(&source).starts_with("Expression nested too deeply"));

        let source = format!("{}c1", "not ".repeat(1_000));
        assert!(error_message(&source).starts_with("Expression nested too deeply"));

        let source = format!("{}c1{}", "abs(".repeat(1_000), ")".repeat(1_000));
        assert!(error_message(&source).starts_with("Expression nested too deeply"));

        let source = vec!["2"; 1_000].join(" ** ");
        assert!(error_message(&source).starts_with("Expression nested too deeply"));
    }

    #[test]
    fn test_parse_long_operator_chain() {
        let source = vec!["c1"; 1_000].join(" + ");
        assert!(error_message(&source).starts_with("Expression nested too deeply"));

        let source = vec!["c1"; 50].join(" + ");
        assert_eq!(parse(&source).depth(), 50);
    }
}
