//! Expression parser
//!
//! A recursive descent parser with the usual scripting-language
//! operator precedence. The parser accepts more than the restricted evaluator
//! runs (bitwise operators, membership tests, tuples, slices); rejecting those
//! is the evaluator's job, so the opt-in fallback can reuse the same tree.

use crate::ast::{BinaryOperator, BoolOperator, CompareOperator, Expr, UnaryOperator};
use crate::error::{EvalError, EvalResult};
use crate::value::Value;

/// Reserved words that can never appear in an expression
const RESERVED_KEYWORDS: &[&str] = &[
    "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "except", "finally", "for", "from", "global", "import", "lambda", "nonlocal", "pass",
    "raise", "return", "try", "while", "with", "yield",
];

/// Deepest nesting of brackets, operators and chains a parse accepts
pub const MAX_NESTING_DEPTH: usize = 100;

/// Parse an expression string into an AST
///
/// # Example
/// ```rust
/// use xcelsql_expr::parse_expression;
///
/// let ast = parse_expression("price * 1.2").unwrap();
/// let ast = parse_expression("'high' if score > 90 else 'low'").unwrap();
/// let ast = parse_expression("coalesce(nickname, name)").unwrap();
/// ```
pub fn parse_expression(source: &str) -> EvalResult<Expr> {
    let mut parser = ExprParser::new(source)?;
    let expr = parser.parse_conditional()?;

    // Make sure we consumed all input
    if !matches!(parser.current_token(), Token::Eof) {
        return Err(parser.unexpected());
    }

    Ok(expr)
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Int(i64),
    Float(f64),
    String(String),

    // Names and keywords
    Name(String),
    True,
    False,
    None,
    And,
    Or,
    Not,
    In,
    Is,
    If,
    Else,
    Reserved(String),

    // Operators
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    At,
    Ampersand,
    Pipe,
    Caret,
    Tilde,
    LeftShift,
    RightShift,
    EqualEqual,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Assign,
    Comma,
    Colon,
    Dot,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,

    // End of input
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Int(i) => format!("number {}", i),
            Token::Float(f) => format!("number {}", f),
            Token::String(_) => "string literal".to_string(),
            Token::Name(n) => format!("name '{}'", n),
            Token::Reserved(k) => format!("keyword '{}'", k),
            Token::Eof => "end of expression".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::True => "True",
            Token::False => "False",
            Token::None => "None",
            Token::And => "and",
            Token::Or => "or",
            Token::Not => "not",
            Token::In => "in",
            Token::Is => "is",
            Token::If => "if",
            Token::Else => "else",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::DoubleStar => "**",
            Token::Slash => "/",
            Token::DoubleSlash => "//",
            Token::Percent => "%",
            Token::At => "@",
            Token::Ampersand => "&",
            Token::Pipe => "|",
            Token::Caret => "^",
            Token::Tilde => "~",
            Token::LeftShift => "<<",
            Token::RightShift => ">>",
            Token::EqualEqual => "==",
            Token::NotEqual => "!=",
            Token::LessThan => "<",
            Token::LessEqual => "<=",
            Token::GreaterThan => ">",
            Token::GreaterEqual => ">=",
            Token::Assign => "=",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Dot => ".",
            Token::LeftParen => "(",
            Token::RightParen => ")",
            Token::LeftBracket => "[",
            Token::RightBracket => "]",
            Token::LeftBrace => "{",
            Token::RightBrace => "}",
            _ => "?",
        }
    }
}

/// Expression parser
struct ExprParser<'a> {
    input: &'a str,
    pos: usize,
    token_start: usize,
    current_token: Option<Token>,
    depth: usize,
}

impl<'a> ExprParser<'a> {
    fn new(input: &'a str) -> EvalResult<Self> {
        let mut parser = Self {
            input,
            pos: 0,
            token_start: 0,
            current_token: None,
            depth: 0,
        };
        parser.advance_token()?;
        Ok(parser)
    }

    // === Token scanning ===

    fn advance_token(&mut self) -> EvalResult<()> {
        self.skip_whitespace();
        self.token_start = self.pos;
        self.current_token = Some(self.scan_token()?);
        Ok(())
    }

    fn scan_token(&mut self) -> EvalResult<Token> {
        let c = match self.peek_char() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };

        // Single-character tokens
        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '%' => Some(Token::Percent),
            '@' => Some(Token::At),
            '&' => Some(Token::Ampersand),
            '|' => Some(Token::Pipe),
            '^' => Some(Token::Caret),
            '~' => Some(Token::Tilde),
            ',' => Some(Token::Comma),
            ':' => Some(Token::Colon),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '[' => Some(Token::LeftBracket),
            ']' => Some(Token::RightBracket),
            '{' => Some(Token::LeftBrace),
            '}' => Some(Token::RightBrace),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        // One- or two-character operators
        match c {
            '*' => return Ok(self.scan_operator('*', Token::Star, Token::DoubleStar)),
            '/' => return Ok(self.scan_operator('/', Token::Slash, Token::DoubleSlash)),
            '=' => return Ok(self.scan_operator('=', Token::Assign, Token::EqualEqual)),
            '<' => {
                self.advance();
                return Ok(match self.peek_char() {
                    Some('=') => {
                        self.advance();
                        Token::LessEqual
                    }
                    Some('<') => {
                        self.advance();
                        Token::LeftShift
                    }
                    _ => Token::LessThan,
                });
            }
            '>' => {
                self.advance();
                return Ok(match self.peek_char() {
                    Some('=') => {
                        self.advance();
                        Token::GreaterEqual
                    }
                    Some('>') => {
                        self.advance();
                        Token::RightShift
                    }
                    _ => Token::GreaterThan,
                });
            }
            '!' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    return Ok(Token::NotEqual);
                }
                return Err(self.error_at(self.token_start, "invalid character '!'"));
            }
            _ => {}
        }

        // String literal
        if c == '\'' || c == '"' {
            return self.scan_string(false);
        }

        // Number
        if c.is_ascii_digit()
            || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit()))
        {
            return self.scan_number();
        }

        if c == '.' {
            self.advance();
            return Ok(Token::Dot);
        }

        // Name, keyword, or prefixed string
        if c.is_alphabetic() || c == '_' {
            return self.scan_name();
        }

        Err(self.error_at(self.pos, &format!("invalid character '{}'", c)))
    }

    fn scan_operator(&mut self, second: char, one: Token, two: Token) -> Token {
        self.advance();
        if self.peek_char() == Some(second) {
            self.advance();
            two
        } else {
            one
        }
    }

    fn scan_string(&mut self, raw: bool) -> EvalResult<Token> {
        let start = self.pos;
        let quote = self.peek_char().unwrap_or('"');
        self.advance(); // Skip opening quote

        let mut s = String::new();
        loop {
            let c = match self.peek_char() {
                Some(c) if c != '\n' => c,
                _ => return Err(self.error_at(start, "unterminated string literal")),
            };
            self.advance();

            if c == quote {
                break;
            }
            if c != '\\' {
                s.push(c);
                continue;
            }

            let escaped = match self.peek_char() {
                Some(e) => e,
                None => return Err(self.error_at(start, "unterminated string literal")),
            };
            self.advance();

            if raw {
                s.push('\\');
                s.push(escaped);
                continue;
            }

            match escaped {
                'n' => s.push('\n'),
                't' => s.push('\t'),
                'r' => s.push('\r'),
                '0' => s.push('\0'),
                '\\' | '\'' | '"' => s.push(escaped),
                'x' => s.push(self.scan_code_point(2, start)?),
                'u' => s.push(self.scan_code_point(4, start)?),
                'U' => s.push(self.scan_code_point(8, start)?),
                other => {
                    // Unknown escapes keep their backslash
                    s.push('\\');
                    s.push(other);
                }
            }
        }

        Ok(Token::String(s))
    }

    fn scan_code_point(&mut self, digits: usize, start: usize) -> EvalResult<char> {
        let hex: String = self.input[self.pos..].chars().take(digits).collect();
        if hex.len() != digits || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(self.error_at(start, "truncated escape sequence"));
        }
        self.pos += digits;
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error_at(start, "invalid escape sequence"))
    }

    fn scan_number(&mut self) -> EvalResult<Token> {
        let start = self.pos;

        // Prefixed integers: 0x, 0o, 0b
        if self.peek_char() == Some('0') {
            let radix = match self.peek_char_at(1) {
                Some('x') | Some('X') => Some(16),
                Some('o') | Some('O') => Some(8),
                Some('b') | Some('B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance();
                self.advance();
                let digits_start = self.pos;
                while self
                    .peek_char()
                    .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_')
                {
                    self.advance();
                }
                let digits = self.input[digits_start..self.pos].replace('_', "");
                return i64::from_str_radix(&digits, radix)
                    .map(Token::Int)
                    .map_err(|_| self.error_at(start, "invalid integer literal"));
            }
        }

        let mut is_float = false;

        // Integer part
        self.skip_digits();

        // Decimal part
        if self.peek_char() == Some('.') {
            is_float = true;
            self.advance();
            self.skip_digits();
        }

        // Exponent part
        if self.peek_char().map_or(false, |c| c == 'e' || c == 'E') {
            let exponent_ok = match self.peek_char_at(1) {
                Some('+') | Some('-') => self.peek_char_at(2).map_or(false, |c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if exponent_ok {
                is_float = true;
                self.advance();
                if self.peek_char().map_or(false, |c| c == '+' || c == '-') {
                    self.advance();
                }
                self.skip_digits();
            }
        }

        if self.peek_char().map_or(false, |c| c.is_alphanumeric() || c == '_') {
            return Err(self.error_at(start, "invalid decimal literal"));
        }

        let num_str = self.input[start..self.pos].replace('_', "");
        if is_float {
            num_str
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| self.error_at(start, "invalid decimal literal"))
        } else {
            num_str
                .parse::<i64>()
                .map(Token::Int)
                .map_err(|_| self.error_at(start, "integer literal too large"))
        }
    }

    fn skip_digits(&mut self) {
        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_digit() || c == '_')
        {
            self.advance();
        }
    }

    fn scan_name(&mut self) -> EvalResult<Token> {
        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }
        let text = &self.input[start..self.pos];

        // String prefixes
        if matches!(self.peek_char(), Some('\'') | Some('"')) {
            match text {
                "r" | "R" => return self.scan_string(true),
                "u" | "U" => return self.scan_string(false),
                _ if text.len() <= 2 && text.chars().all(|c| "bBfFrR".contains(c)) => {
                    return Err(self.error_at(start, "bytes and f-string literals are not supported"));
                }
                _ => {}
            }
        }

        Ok(match text {
            "True" => Token::True,
            "False" => Token::False,
            "None" => Token::None,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "in" => Token::In,
            "is" => Token::Is,
            "if" => Token::If,
            "else" => Token::Else,
            _ if RESERVED_KEYWORDS.contains(&text) => Token::Reserved(text.to_string()),
            _ => Token::Name(text.to_string()),
        })
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn error_at(&self, pos: usize, message: &str) -> EvalError {
        EvalError::Syntax(format!("{} at position {}", message, pos))
    }

    /// Count one more level of nesting
    fn deepen(&mut self) -> EvalResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(self.error_at(self.token_start, "expression is nested too deeply"));
        }
        Ok(())
    }

    fn unexpected(&self) -> EvalError {
        self.error_at(
            self.token_start,
            &format!("unexpected {}", self.current_token().describe()),
        )
    }

    fn current_token(&self) -> &Token {
        self.current_token.as_ref().unwrap_or(&Token::Eof)
    }

    fn consume(&mut self) -> EvalResult<Token> {
        let token = self.current_token.take().unwrap_or(Token::Eof);
        self.advance_token()?;
        Ok(token)
    }

    fn expect(&mut self, expected: &Token) -> EvalResult<()> {
        if self.current_token() == expected {
            self.consume()?;
            Ok(())
        } else {
            Err(self.error_at(
                self.token_start,
                &format!(
                    "expected '{}', got {}",
                    expected.symbol(),
                    self.current_token().describe()
                ),
            ))
        }
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Conditional: x if c else y
    // 2. or
    // 3. and
    // 4. not
    // 5. Comparison: ==, !=, <, <=, >, >=, in, not in, is, is not
    // 6. |
    // 7. ^
    // 8. &
    // 9. <<, >>
    // 10. +, -
    // 11. *, /, //, %, @
    // 12. Unary: -, +, ~
    // 13. ** (right associative, binds tighter than a unary on its left)
    // 14. Postfix: call, subscript, attribute
    // 15. Primary: literals, names, parentheses, displays

    fn parse_conditional(&mut self) -> EvalResult<Expr> {
        let depth = self.depth;
        self.deepen()?;
        let body = self.parse_or()?;

        let expr = if matches!(self.current_token(), Token::If) {
            self.consume()?;
            let test = self.parse_or()?;
            self.expect(&Token::Else)?;
            let orelse = self.parse_conditional()?;
            Expr::Conditional {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            }
        } else {
            body
        };

        self.depth = depth;
        Ok(expr)
    }

    fn parse_or(&mut self) -> EvalResult<Expr> {
        let first = self.parse_and()?;
        let mut values = vec![first];

        while matches!(self.current_token(), Token::Or) {
            self.consume()?;
            values.push(self.parse_and()?);
        }

        Ok(Self::bool_op(BoolOperator::Or, values))
    }

    fn parse_and(&mut self) -> EvalResult<Expr> {
        let first = self.parse_not()?;
        let mut values = vec![first];

        while matches!(self.current_token(), Token::And) {
            self.consume()?;
            values.push(self.parse_not()?);
        }

        Ok(Self::bool_op(BoolOperator::And, values))
    }

    fn bool_op(op: BoolOperator, mut values: Vec<Expr>) -> Expr {
        if values.len() == 1 {
            if let Some(only) = values.pop() {
                return only;
            }
        }
        Expr::BoolOp { op, values }
    }

    fn parse_not(&mut self) -> EvalResult<Expr> {
        if matches!(self.current_token(), Token::Not) {
            self.consume()?;
            self.deepen()?;
            let operand = self.parse_not()?;
            self.depth -= 1;
            return Ok(Expr::UnaryOp {
                op: UnaryOperator::Not,
                operand: Box::new(operand),
            });
        }

        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> EvalResult<Expr> {
        let left = self.parse_bit_or()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();

        loop {
            let op = match self.current_token() {
                Token::EqualEqual => CompareOperator::Equal,
                Token::NotEqual => CompareOperator::NotEqual,
                Token::LessThan => CompareOperator::LessThan,
                Token::LessEqual => CompareOperator::LessEqual,
                Token::GreaterThan => CompareOperator::GreaterThan,
                Token::GreaterEqual => CompareOperator::GreaterEqual,
                Token::In => CompareOperator::In,
                Token::Not => {
                    // `not` here can only start `not in`
                    self.consume()?;
                    if !matches!(self.current_token(), Token::In) {
                        return Err(self.unexpected());
                    }
                    CompareOperator::NotIn
                }
                Token::Is => {
                    self.consume()?;
                    if matches!(self.current_token(), Token::Not) {
                        CompareOperator::IsNot
                    } else {
                        ops.push(CompareOperator::Is);
                        comparators.push(self.parse_bit_or()?);
                        continue;
                    }
                }
                _ => break,
            };

            self.consume()?;
            ops.push(op);
            comparators.push(self.parse_bit_or()?);
        }

        if ops.is_empty() {
            return Ok(left);
        }

        Ok(Expr::Compare {
            left: Box::new(left),
            ops,
            comparators,
        })
    }

    fn parse_bit_or(&mut self) -> EvalResult<Expr> {
        let depth = self.depth;
        let mut left = self.parse_bit_xor()?;

        while matches!(self.current_token(), Token::Pipe) {
            self.consume()?;
            self.deepen()?;
            let right = self.parse_bit_xor()?;
            left = Self::binary(BinaryOperator::BitOr, left, right);
        }

        self.depth = depth;
        Ok(left)
    }

    fn parse_bit_xor(&mut self) -> EvalResult<Expr> {
        let depth = self.depth;
        let mut left = self.parse_bit_and()?;

        while matches!(self.current_token(), Token::Caret) {
            self.consume()?;
            self.deepen()?;
            let right = self.parse_bit_and()?;
            left = Self::binary(BinaryOperator::BitXor, left, right);
        }

        self.depth = depth;
        Ok(left)
    }

    fn parse_bit_and(&mut self) -> EvalResult<Expr> {
        let depth = self.depth;
        let mut left = self.parse_shift()?;

        while matches!(self.current_token(), Token::Ampersand) {
            self.consume()?;
            self.deepen()?;
            let right = self.parse_shift()?;
            left = Self::binary(BinaryOperator::BitAnd, left, right);
        }

        self.depth = depth;
        Ok(left)
    }

    fn parse_shift(&mut self) -> EvalResult<Expr> {
        let depth = self.depth;
        let mut left = self.parse_additive()?;

        loop {
            let op = match self.current_token() {
                Token::LeftShift => BinaryOperator::LeftShift,
                Token::RightShift => BinaryOperator::RightShift,
                _ => break,
            };

            self.consume()?;
            self.deepen()?;
            let right = self.parse_additive()?;
            left = Self::binary(op, left, right);
        }

        self.depth = depth;
        Ok(left)
    }

    fn parse_additive(&mut self) -> EvalResult<Expr> {
        let depth = self.depth;
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume()?;
            self.deepen()?;
            let right = self.parse_multiplicative()?;
            left = Self::binary(op, left, right);
        }

        self.depth = depth;
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> EvalResult<Expr> {
        let depth = self.depth;
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::DoubleSlash => BinaryOperator::FloorDivide,
                Token::Percent => BinaryOperator::Modulo,
                Token::At => BinaryOperator::MatMul,
                _ => break,
            };

            self.consume()?;
            self.deepen()?;
            let right = self.parse_unary()?;
            left = Self::binary(op, left, right);
        }

        self.depth = depth;
        Ok(left)
    }

    fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Expr {
        Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn parse_unary(&mut self) -> EvalResult<Expr> {
        let op = match self.current_token() {
            Token::Minus => UnaryOperator::Negate,
            Token::Plus => UnaryOperator::Plus,
            Token::Tilde => UnaryOperator::Invert,
            _ => return self.parse_power(),
        };

        self.consume()?;
        self.deepen()?;
        let operand = self.parse_unary()?;
        self.depth -= 1;
        Ok(Expr::UnaryOp {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_power(&mut self) -> EvalResult<Expr> {
        let left = self.parse_postfix()?;

        if matches!(self.current_token(), Token::DoubleStar) {
            self.consume()?;
            self.deepen()?;
            let right = self.parse_unary()?; // Right associative
            self.depth -= 1;
            return Ok(Self::binary(BinaryOperator::Power, left, right));
        }

        Ok(left)
    }

    fn parse_postfix(&mut self) -> EvalResult<Expr> {
        let depth = self.depth;
        let mut expr = self.parse_primary()?;

        loop {
            if matches!(self.current_token(), Token::LeftParen | Token::LeftBracket | Token::Dot) {
                self.deepen()?;
            }
            match self.current_token() {
                Token::LeftParen => expr = self.parse_call(expr)?,
                Token::LeftBracket => expr = self.parse_subscript(expr)?,
                Token::Dot => {
                    self.consume()?;
                    let name = match self.consume()? {
                        Token::Name(name) => name,
                        other => {
                            return Err(self.error_at(
                                self.token_start,
                                &format!("expected attribute name, got {}", other.describe()),
                            ))
                        }
                    };
                    expr = Expr::Attribute {
                        target: Box::new(expr),
                        name,
                    };
                }
                _ => break,
            }
        }

        self.depth = depth;
        Ok(expr)
    }

    fn parse_primary(&mut self) -> EvalResult<Expr> {
        match self.current_token().clone() {
            Token::Int(i) => {
                self.consume()?;
                Ok(Expr::Literal(Value::Int(i)))
            }

            Token::Float(f) => {
                self.consume()?;
                Ok(Expr::Literal(Value::Float(f)))
            }

            Token::String(mut s) => {
                self.consume()?;
                // Adjacent literals concatenate
                while let Token::String(next) = self.current_token() {
                    s.push_str(next);
                    self.consume()?;
                }
                Ok(Expr::Literal(Value::Str(s)))
            }

            Token::True => {
                self.consume()?;
                Ok(Expr::Literal(Value::Bool(true)))
            }

            Token::False => {
                self.consume()?;
                Ok(Expr::Literal(Value::Bool(false)))
            }

            Token::None => {
                self.consume()?;
                Ok(Expr::Literal(Value::None))
            }

            Token::Name(name) => {
                self.consume()?;
                Ok(Expr::Name(name))
            }

            Token::LeftParen => self.parse_parenthesized(),
            Token::LeftBracket => self.parse_list(),
            Token::LeftBrace => self.parse_brace_display(),

            _ => Err(self.unexpected()),
        }
    }

    fn parse_parenthesized(&mut self) -> EvalResult<Expr> {
        self.expect(&Token::LeftParen)?;

        if matches!(self.current_token(), Token::RightParen) {
            self.consume()?;
            return Ok(Expr::Tuple(Vec::new()));
        }

        let first = self.parse_conditional()?;
        if !matches!(self.current_token(), Token::Comma) {
            self.expect(&Token::RightParen)?;
            return Ok(first);
        }

        let items = self.parse_items(first, &Token::RightParen)?;
        Ok(Expr::Tuple(items))
    }

    fn parse_list(&mut self) -> EvalResult<Expr> {
        self.expect(&Token::LeftBracket)?;

        if matches!(self.current_token(), Token::RightBracket) {
            self.consume()?;
            return Ok(Expr::List(Vec::new()));
        }

        let first = self.parse_conditional()?;
        let items = self.parse_items(first, &Token::RightBracket)?;
        Ok(Expr::List(items))
    }

    /// Remaining comma-separated items after `first`, through `close`
    fn parse_items(&mut self, first: Expr, close: &Token) -> EvalResult<Vec<Expr>> {
        let mut items = vec![first];

        while matches!(self.current_token(), Token::Comma) {
            self.consume()?;
            if self.current_token() == close {
                break;
            }
            items.push(self.parse_conditional()?);
        }

        self.expect(close)?;
        Ok(items)
    }

    fn parse_brace_display(&mut self) -> EvalResult<Expr> {
        self.expect(&Token::LeftBrace)?;

        if matches!(self.current_token(), Token::RightBrace) {
            self.consume()?;
            return Ok(Expr::Map(Vec::new()));
        }

        let first = self.parse_conditional()?;
        if !matches!(self.current_token(), Token::Colon) {
            let items = self.parse_items(first, &Token::RightBrace)?;
            return Ok(Expr::Set(items));
        }

        self.consume()?;
        let mut pairs = vec![(first, self.parse_conditional()?)];

        while matches!(self.current_token(), Token::Comma) {
            self.consume()?;
            if matches!(self.current_token(), Token::RightBrace) {
                break;
            }
            let key = self.parse_conditional()?;
            self.expect(&Token::Colon)?;
            let value = self.parse_conditional()?;
            pairs.push((key, value));
        }

        self.expect(&Token::RightBrace)?;
        Ok(Expr::Map(pairs))
    }

    fn parse_call(&mut self, func: Expr) -> EvalResult<Expr> {
        self.expect(&Token::LeftParen)?;

        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expr)> = Vec::new();

        while !matches!(self.current_token(), Token::RightParen) {
            let start = self.token_start;
            let arg = self.parse_conditional()?;

            if matches!(self.current_token(), Token::Assign) {
                let name = match arg {
                    Expr::Name(name) => name,
                    _ => return Err(self.error_at(start, "expression cannot contain assignment")),
                };
                self.consume()?;
                if kwargs.iter().any(|(k, _)| *k == name) {
                    return Err(self.error_at(start, &format!("keyword argument repeated: {}", name)));
                }
                let value = self.parse_conditional()?;
                kwargs.push((name, value));
            } else if !kwargs.is_empty() {
                return Err(self.error_at(start, "positional argument follows keyword argument"));
            } else {
                args.push(arg);
            }

            if matches!(self.current_token(), Token::Comma) {
                self.consume()?;
            } else {
                break;
            }
        }

        self.expect(&Token::RightParen)?;

        Ok(Expr::Call {
            func: Box::new(func),
            args,
            kwargs,
        })
    }

    fn parse_subscript(&mut self, target: Expr) -> EvalResult<Expr> {
        self.expect(&Token::LeftBracket)?;

        let first = if matches!(self.current_token(), Token::Colon) {
            None
        } else {
            Some(self.parse_conditional()?)
        };

        if matches!(self.current_token(), Token::Colon) {
            self.consume()?;
            let upper = self.parse_slice_bound()?;
            let step = if matches!(self.current_token(), Token::Colon) {
                self.consume()?;
                self.parse_slice_bound()?
            } else {
                None
            };
            self.expect(&Token::RightBracket)?;
            return Ok(Expr::Slice {
                target: Box::new(target),
                lower: first.map(Box::new),
                upper,
                step,
            });
        }

        let key = match first {
            Some(key) if matches!(self.current_token(), Token::Comma) => {
                Expr::Tuple(self.parse_items(key, &Token::RightBracket)?)
            }
            Some(key) => {
                self.expect(&Token::RightBracket)?;
                key
            }
            None => return Err(self.unexpected()),
        };

        Ok(Expr::Index {
            target: Box::new(target),
            key: Box::new(key),
        })
    }

    fn parse_slice_bound(&mut self) -> EvalResult<Option<Box<Expr>>> {
        if matches!(self.current_token(), Token::Colon | Token::RightBracket) {
            Ok(None)
        } else {
            Ok(Some(Box::new(self.parse_conditional()?)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lit(v: impl Into<Value>) -> Expr {
        Expr::Literal(v.into())
    }

    fn name(n: &str) -> Expr {
        Expr::Name(n.to_string())
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_expression("42").unwrap(), lit(42i64));
        assert_eq!(parse_expression("3.14").unwrap(), lit(3.14));
        assert_eq!(parse_expression("1e3").unwrap(), lit(1000.0));
        assert_eq!(parse_expression("1_000").unwrap(), lit(1000i64));
        assert_eq!(parse_expression("0xff").unwrap(), lit(255i64));
        assert_eq!(parse_expression(".5").unwrap(), lit(0.5));
    }

    #[test]
    fn test_parse_strings() {
        assert_eq!(parse_expression("'abc'").unwrap(), lit("abc"));
        assert_eq!(parse_expression(r#""a\"b""#).unwrap(), lit("a\"b"));
        assert_eq!(parse_expression(r"'line\nbreak'").unwrap(), lit("line\nbreak"));
        assert_eq!(parse_expression(r"r'\d+'").unwrap(), lit(r"\d+"));
        assert_eq!(parse_expression("'a' 'b'").unwrap(), lit("ab"));
        assert_eq!(parse_expression(r"'é'").unwrap(), lit("é"));
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(parse_expression("True").unwrap(), lit(true));
        assert_eq!(parse_expression("None").unwrap(), Expr::Literal(Value::None));
        assert_eq!(parse_expression("true").unwrap(), name("true"));
    }

    #[test]
    fn test_parse_precedence() {
        // 1 + 2 * 3
        assert_eq!(
            parse_expression("1 + 2 * 3").unwrap(),
            Expr::BinaryOp {
                op: BinaryOperator::Add,
                left: Box::new(lit(1i64)),
                right: Box::new(Expr::BinaryOp {
                    op: BinaryOperator::Multiply,
                    left: Box::new(lit(2i64)),
                    right: Box::new(lit(3i64)),
                }),
            }
        );

        // -2 ** 2 is -(2 ** 2)
        assert_eq!(
            parse_expression("-2 ** 2").unwrap(),
            Expr::UnaryOp {
                op: UnaryOperator::Negate,
                operand: Box::new(Expr::BinaryOp {
                    op: BinaryOperator::Power,
                    left: Box::new(lit(2i64)),
                    right: Box::new(lit(2i64)),
                }),
            }
        );
    }

    #[test]
    fn test_parse_power_right_associative() {
        assert_eq!(
            parse_expression("2 ** 3 ** 2").unwrap(),
            Expr::BinaryOp {
                op: BinaryOperator::Power,
                left: Box::new(lit(2i64)),
                right: Box::new(Expr::BinaryOp {
                    op: BinaryOperator::Power,
                    left: Box::new(lit(3i64)),
                    right: Box::new(lit(2i64)),
                }),
            }
        );
    }

    #[test]
    fn test_parse_chained_comparison() {
        assert_eq!(
            parse_expression("a < b <= c").unwrap(),
            Expr::Compare {
                left: Box::new(name("a")),
                ops: vec![CompareOperator::LessThan, CompareOperator::LessEqual],
                comparators: vec![name("b"), name("c")],
            }
        );
        assert_eq!(
            parse_expression("a not in b").unwrap(),
            Expr::Compare {
                left: Box::new(name("a")),
                ops: vec![CompareOperator::NotIn],
                comparators: vec![name("b")],
            }
        );
        assert_eq!(
            parse_expression("a is not None").unwrap(),
            Expr::Compare {
                left: Box::new(name("a")),
                ops: vec![CompareOperator::IsNot],
                comparators: vec![Expr::Literal(Value::None)],
            }
        );
    }

    #[test]
    fn test_parse_bool_ops() {
        assert_eq!(
            parse_expression("a or b and not c").unwrap(),
            Expr::BoolOp {
                op: BoolOperator::Or,
                values: vec![
                    name("a"),
                    Expr::BoolOp {
                        op: BoolOperator::And,
                        values: vec![
                            name("b"),
                            Expr::UnaryOp {
                                op: UnaryOperator::Not,
                                operand: Box::new(name("c")),
                            },
                        ],
                    },
                ],
            }
        );
    }

    #[test]
    fn test_parse_conditional() {
        assert_eq!(
            parse_expression("x if c else y").unwrap(),
            Expr::Conditional {
                test: Box::new(name("c")),
                body: Box::new(name("x")),
                orelse: Box::new(name("y")),
            }
        );
    }

    #[test]
    fn test_parse_call() {
        assert_eq!(
            parse_expression("format_date(d, fmt='%Y')").unwrap(),
            Expr::Call {
                func: Box::new(name("format_date")),
                args: vec![name("d")],
                kwargs: vec![("fmt".to_string(), lit("%Y"))],
            }
        );
        assert_eq!(
            parse_expression("today()").unwrap(),
            Expr::Call {
                func: Box::new(name("today")),
                args: vec![],
                kwargs: vec![],
            }
        );
    }

    #[test]
    fn test_parse_displays() {
        assert_eq!(
            parse_expression("[1, 2,]").unwrap(),
            Expr::List(vec![lit(1i64), lit(2i64)])
        );
        assert_eq!(
            parse_expression("{'a': 1, 'b': 2}").unwrap(),
            Expr::Map(vec![(lit("a"), lit(1i64)), (lit("b"), lit(2i64))])
        );
        assert_eq!(parse_expression("{}").unwrap(), Expr::Map(vec![]));
        assert_eq!(parse_expression("{1, 2}").unwrap(), Expr::Set(vec![lit(1i64), lit(2i64)]));
        assert_eq!(parse_expression("(1, 2)").unwrap(), Expr::Tuple(vec![lit(1i64), lit(2i64)]));
        assert_eq!(parse_expression("(1)").unwrap(), lit(1i64));
    }

    #[test]
    fn test_parse_postfix() {
        assert_eq!(
            parse_expression("row['a'].year").unwrap(),
            Expr::Attribute {
                target: Box::new(Expr::Index {
                    target: Box::new(name("row")),
                    key: Box::new(lit("a")),
                }),
                name: "year".to_string(),
            }
        );
        assert_eq!(
            parse_expression("s[1:]").unwrap(),
            Expr::Slice {
                target: Box::new(name("s")),
                lower: Some(Box::new(lit(1i64))),
                upper: None,
                step: None,
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        for src in [
            "",
            "1 +",
            "(1",
            "'open",
            "lambda: 1",
            "a = 1",
            "f(a=1, 2)",
            "f(a=1, a=2)",
            "1 $ 2",
            "x if y",
            "12abc",
            "f'{x}'",
            "99999999999999999999",
        ] {
            assert!(
                matches!(parse_expression(src), Err(EvalError::Syntax(_))),
                "expected syntax error for {:?}",
                src
            );
        }
    }

    #[test]
    fn test_nesting_limit() {
        let deep = 10_000;
        for src in [
            format!("{}1{}", "(".repeat(deep), ")".repeat(deep)),
            format!("{}1{}", "[".repeat(deep), "]".repeat(deep)),
            format!("{}1", "-".repeat(deep)),
            format!("{}x", "not ".repeat(deep)),
            format!("x{}", ".a".repeat(deep)),
            format!("x{}", "[0]".repeat(deep)),
            format!("1{}", " + 1".repeat(deep)),
            format!("2{}", " ** 2".repeat(deep)),
            format!("1{}", " if x else 1".repeat(deep)),
        ] {
            match parse_expression(&src) {
                Err(EvalError::Syntax(message)) => {
                    assert!(message.contains("nested too deeply"), "{}", message)
                }
                other => panic!("expected nesting error for {:.20}..., got {:?}", src, other),
            }
        }
    }

    #[test]
    fn test_nesting_below_limit_parses() {
        let depth = MAX_NESTING_DEPTH / 2;
        let src = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(parse_expression(&src).unwrap(), Expr::Literal(Value::Int(1)));
        assert!(parse_expression(&format!("x{}", ".a".repeat(depth))).is_ok());
        assert!(parse_expression(&format!("1{}", " + 1".repeat(depth))).is_ok());
        // Siblings do not accumulate depth
        let wide = vec!["(1)"; MAX_NESTING_DEPTH * 2].join(", ");
        assert!(parse_expression(&format!("f({})", wide)).is_ok());
    }
}
