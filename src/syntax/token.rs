// Expression tokens for lexical analysis

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Identifier(String),
    Number(String),
    String(String),
    /// String literal that reached the end of input without its closing quote
    UnterminatedString(String),

    // Keyword operators
    And,
    Or,
    Not,
    Is,

    // Operators
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Assign,
    Bang,

    // Delimiters
    LeftParen,
    RightParen,
    Comma,
    Dot,
    Colon,

    /// Character outside the expression alphabet
    Invalid(char),

    // Special
    Eof,
}

impl Token {
    /// Check if the token is a keyword operator
    pub fn is_keyword(&self) -> bool {
        matches!(self, Token::And | Token::Or | Token::Not | Token::Is)
    }

    /// Convert a word to its keyword token, if it is one
    pub fn keyword_from_str(s: &str) -> Option<Token> {
        match s {
            "and" => Some(Token::And),
            "or" => Some(Token::Or),
            "not" => Some(Token::Not),
            "is" => Some(Token::Is),
            _ => None,
        }
    }
}
