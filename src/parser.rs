use crate::ast::{BlockStatement, Expr, InfixOp, PrefixOp, Program, Stmt};
use crate::error::{MonkeyError, Span};
use crate::lexer::{Lexer, Token, TokenType};
use log::debug;

/// Deepest nesting of expressions a program may have. Past this the parse
/// fails with an error rather than building a tree too deep to walk.
pub const MAX_NESTING_DEPTH: usize = 1_000;

// Grow the host stack by 1MB whenever less than 64KB is left.
const STACK_RED_ZONE: usize = 64 * 1024;
const STACK_GROW_SIZE: usize = 1024 * 1024;

/// Binding power of infix operators, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
    Index,
}

impl Precedence {
    fn of(token_type: TokenType) -> Self {
        match token_type {
            TokenType::EqualEqual | TokenType::BangEqual => Precedence::Equals,
            TokenType::Less
            | TokenType::LessEqual
            | TokenType::Greater
            | TokenType::GreaterEqual => Precedence::LessGreater,
            TokenType::Plus | TokenType::Minus => Precedence::Sum,
            TokenType::Star | TokenType::Slash => Precedence::Product,
            TokenType::LeftParen => Precedence::Call,
            TokenType::LeftBracket => Precedence::Index,
            _ => Precedence::Lowest,
        }
    }
}

/// Pratt parser pulling tokens from the lexer one at a time.
///
/// Errors do not stop the parse: each failed statement is recorded and the
/// parser skips ahead to the next statement boundary.
pub struct Parser {
    lexer: Lexer,
    current: Token,
    previous: Token,
    errors: Vec<MonkeyError>,
    depth: usize,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> Self {
        let current = lexer.next_token();
        Self {
            lexer,
            previous: Token::new(TokenType::Eof, String::new(), Span::single(0)),
            current,
            errors: Vec::new(),
            depth: 0,
        }
    }

    pub fn parse(mut self) -> Result<Program, Vec<MonkeyError>> {
        let program = self.parse_program();
        if self.errors.is_empty() {
            Ok(program)
        } else {
            Err(self.errors)
        }
    }

    /// Parse every statement that can be parsed. Failed statements are left out of
    /// the program and their errors are available through [`Parser::errors`].
    pub fn parse_program(&mut self) -> Program {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            match self.statement() {
                Ok(statement) => statements.push(statement),
                Err(error) => {
                    debug!("parse error at {:?}: {}", error.span, error.message);
                    self.errors.push(error);
                    self.synchronize();
                }
            }
        }

        Program { statements }
    }

    pub fn errors(&self) -> &[MonkeyError] {
        &self.errors
    }

    fn statement(&mut self) -> Result<Stmt, MonkeyError> {
        let token_type = self.peek().token_type;
        match token_type {
            TokenType::Let => self.let_statement(),
            TokenType::Return => self.return_statement(),
            _ => self.expression_statement(),
        }
    }

    fn let_statement(&mut self) -> Result<Stmt, MonkeyError> {
        let start = self.advance().span.start;

        let name = self
            .consume_with_help(
                TokenType::Identifier,
                "A let binding needs a name: let x = 5;".to_string(),
            )?
            .lexeme;
        self.consume_with_help(
            TokenType::Equal,
            "A let binding needs '=' between the name and the value: let x = 5;".to_string(),
        )?;
        let value = self.expression(Precedence::Lowest)?;
        self.match_type(TokenType::Semicolon);

        Ok(Stmt::Let {
            name,
            value,
            span: Span::new(start, self.previous().span.end),
        })
    }

    fn return_statement(&mut self) -> Result<Stmt, MonkeyError> {
        let start = self.advance().span.start;
        let value = self.expression(Precedence::Lowest)?;
        self.match_type(TokenType::Semicolon);

        Ok(Stmt::Return {
            value,
            span: Span::new(start, self.previous().span.end),
        })
    }

    fn expression_statement(&mut self) -> Result<Stmt, MonkeyError> {
        let start = self.peek().span.start;
        let expr = self.expression(Precedence::Lowest)?;

        // Make semicolon optional
        self.match_type(TokenType::Semicolon);

        Ok(Stmt::Expression {
            expr,
            span: Span::new(start, self.previous().span.end),
        })
    }

    /// Statements up to the closing brace. The opening brace has been consumed.
    fn block(&mut self, open: &Span) -> Result<BlockStatement, MonkeyError> {
        let mut statements = Vec::new();

        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            statements.push(self.statement()?);
        }

        let close = self.consume_with_help(
            TokenType::RightBrace,
            "Blocks must be closed with '}' after the opening '{'.".to_string(),
        )?;

        Ok(BlockStatement {
            statements,
            span: open.to(&close.span),
        })
    }

    fn expression(&mut self, precedence: Precedence) -> Result<Expr, MonkeyError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(MonkeyError::parse(
                self.error_span(),
                format!("expression nested more than {} levels deep", MAX_NESTING_DEPTH),
            )
            .with_help("Split the expression up with let bindings."));
        }

        self.depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.expression_inner(precedence)
        });
        self.depth -= 1;
        result
    }

    fn expression_inner(&mut self, precedence: Precedence) -> Result<Expr, MonkeyError> {
        let mut left = self.prefix()?;

        while precedence < Precedence::of(self.peek().token_type) {
            left = self.infix(left)?;
        }

        Ok(left)
    }

    /// Dispatch on a token that starts an expression. The token is only consumed
    /// when a rule exists for it, so recovery can resume at that token.
    fn prefix(&mut self) -> Result<Expr, MonkeyError> {
        let token_type = self.peek().token_type;
        match token_type {
            TokenType::Identifier => {
                let token = self.advance();
                Ok(Expr::Identifier {
                    name: token.lexeme,
                    span: token.span,
                })
            }
            TokenType::Integer => self.integer_literal(),
            TokenType::String => {
                let token = self.advance();
                Ok(Expr::StringLiteral {
                    value: token.lexeme,
                    span: token.span,
                })
            }
            TokenType::True | TokenType::False => {
                let token = self.advance();
                Ok(Expr::BooleanLiteral {
                    value: token.token_type == TokenType::True,
                    span: token.span,
                })
            }
            TokenType::Bang | TokenType::Minus => self.prefix_expression(),
            TokenType::LeftParen => self.grouped_expression(),
            TokenType::If => self.if_expression(),
            TokenType::Fn => self.function_literal(),
            TokenType::LeftBracket => {
                let open = self.advance();
                let (elements, close) = self.expression_list(TokenType::RightBracket)?;
                Ok(Expr::ArrayLiteral {
                    elements,
                    span: open.span.to(&close),
                })
            }
            TokenType::LeftBrace => self.hash_literal(),
            TokenType::Illegal => Err(self.illegal_token_error()),
            other => {
                let help_msg = match other {
                    TokenType::RightParen => "Found ')' without matching '('. Check for unbalanced parentheses.",
                    TokenType::RightBrace => "Found '}' without matching '{'. Check for unbalanced braces.",
                    TokenType::RightBracket => "Found ']' without matching '['. Check for unbalanced brackets.",
                    TokenType::Eof => "Reached end of input while expecting an expression.",
                    _ => "Expected a literal, identifier, or parenthesized expression here.",
                };
                Err(MonkeyError::parse(
                    self.error_span(),
                    format!("no prefix parse function for {} found", other),
                )
                .with_help(help_msg))
            }
        }
    }

    fn infix(&mut self, left: Expr) -> Result<Expr, MonkeyError> {
        let token = self.advance();

        let operator = match token.token_type {
            TokenType::LeftParen => {
                let (arguments, close) = self.expression_list(TokenType::RightParen)?;
                let span = left.span().to(&close);
                return Ok(Expr::Call {
                    function: Box::new(left),
                    arguments,
                    span,
                });
            }
            TokenType::LeftBracket => {
                let index = self.expression(Precedence::Lowest)?;
                let close = self.consume_with_help(
                    TokenType::RightBracket,
                    "Index expressions must be closed with ']': items[0]".to_string(),
                )?;
                let span = left.span().to(&close.span);
                return Ok(Expr::Index {
                    left: Box::new(left),
                    index: Box::new(index),
                    span,
                });
            }
            TokenType::Plus => InfixOp::Add,
            TokenType::Minus => InfixOp::Subtract,
            TokenType::Star => InfixOp::Multiply,
            TokenType::Slash => InfixOp::Divide,
            TokenType::EqualEqual => InfixOp::Equal,
            TokenType::BangEqual => InfixOp::NotEqual,
            TokenType::Less => InfixOp::Less,
            TokenType::LessEqual => InfixOp::LessEqual,
            TokenType::Greater => InfixOp::Greater,
            TokenType::GreaterEqual => InfixOp::GreaterEqual,
            // `expression` only calls in here for tokens with an infix precedence.
            _ => unreachable!("no infix rule for {}", token.token_type),
        };

        let right = self.expression(Precedence::of(token.token_type))?;
        let span = left.span().to(right.span());

        Ok(Expr::Infix {
            left: Box::new(left),
            operator,
            right: Box::new(right),
            span,
        })
    }

    fn integer_literal(&mut self) -> Result<Expr, MonkeyError> {
        let token = self.advance();
        let value = token.lexeme.parse::<i64>().map_err(|_| {
            MonkeyError::parse(
                token.span.clone(),
                format!("could not parse {} as integer", token.lexeme),
            )
            .with_help(format!("Integers must lie between {} and {}.", i64::MIN, i64::MAX))
        })?;

        Ok(Expr::IntegerLiteral {
            value,
            span: token.span,
        })
    }

    fn prefix_expression(&mut self) -> Result<Expr, MonkeyError> {
        let token = self.advance();
        let operator = match token.token_type {
            TokenType::Bang => PrefixOp::Not,
            _ => PrefixOp::Negate,
        };

        let right = self.expression(Precedence::Prefix)?;
        let span = token.span.to(right.span());

        Ok(Expr::Prefix {
            operator,
            right: Box::new(right),
            span,
        })
    }

    fn grouped_expression(&mut self) -> Result<Expr, MonkeyError> {
        self.advance();
        let expr = self.expression(Precedence::Lowest)?;
        self.consume_with_help(
            TokenType::RightParen,
            "Every opening parenthesis '(' must have a matching closing parenthesis ')'.".to_string(),
        )?;
        Ok(expr)
    }

    fn if_expression(&mut self) -> Result<Expr, MonkeyError> {
        let start = self.advance().span;

        self.consume_with_help(
            TokenType::LeftParen,
            "If expressions require parentheses around the condition: if (x) { ... }".to_string(),
        )?;
        let condition = self.expression(Precedence::Lowest)?;
        self.consume_with_help(
            TokenType::RightParen,
            "If conditions must be enclosed in parentheses: if (x) { ... }".to_string(),
        )?;

        let open = self.consume_with_help(
            TokenType::LeftBrace,
            "The body of an if expression is a block: if (x) { ... }".to_string(),
        )?;
        let consequence = self.block(&open.span)?;

        let alternative = if self.match_type(TokenType::Else) {
            if self.check(TokenType::If) {
                // `else if` nests the next if expression inside the alternative block.
                let nested = self.if_expression()?;
                let span = nested.span().clone();
                Some(BlockStatement {
                    statements: vec![Stmt::Expression {
                        expr: nested,
                        span: span.clone(),
                    }],
                    span,
                })
            } else {
                let open = self.consume_with_help(
                    TokenType::LeftBrace,
                    "'else' must be followed by a block or another if expression.".to_string(),
                )?;
                Some(self.block(&open.span)?)
            }
        } else {
            None
        };

        let end = alternative
            .as_ref()
            .map_or(&consequence.span, |block| &block.span)
            .clone();

        Ok(Expr::If {
            condition: Box::new(condition),
            consequence,
            alternative,
            span: start.to(&end),
        })
    }

    fn function_literal(&mut self) -> Result<Expr, MonkeyError> {
        let start = self.advance().span;

        self.consume_with_help(
            TokenType::LeftParen,
            "Function literals list their parameters in parentheses: fn(x, y) { ... }".to_string(),
        )?;

        let mut parameters = Vec::new();
        if !self.check(TokenType::RightParen) {
            loop {
                let parameter = self.consume_with_help(
                    TokenType::Identifier,
                    "Function parameters must be identifiers separated by commas.".to_string(),
                )?;
                parameters.push(parameter.lexeme);
                if !self.match_type(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume_with_help(
            TokenType::RightParen,
            "Function parameter lists must be closed with ')'.".to_string(),
        )?;

        let open = self.consume_with_help(
            TokenType::LeftBrace,
            "The body of a function is a block: fn(x) { x }".to_string(),
        )?;
        let body = self.block(&open.span)?;
        let span = start.to(&body.span);

        Ok(Expr::FunctionLiteral {
            parameters,
            body,
            span,
        })
    }

    fn hash_literal(&mut self) -> Result<Expr, MonkeyError> {
        let start = self.advance().span;
        let mut pairs = Vec::new();

        if !self.check(TokenType::RightBrace) {
            loop {
                let key = self.expression(Precedence::Lowest)?;
                self.consume_with_help(
                    TokenType::Colon,
                    "Hash entries put a colon ':' between key and value: {\"key\": 1}".to_string(),
                )?;
                let value = self.expression(Precedence::Lowest)?;
                pairs.push((key, value));

                if !self.match_type(TokenType::Comma) {
                    break;
                }
            }
        }

        let close = self.consume_with_help(
            TokenType::RightBrace,
            "Hash literals must be closed with '}': {\"key\": 1}".to_string(),
        )?;

        Ok(Expr::HashLiteral {
            pairs,
            span: start.to(&close.span),
        })
    }

    /// Comma-separated expressions up to `end`. The opening token has been consumed.
    fn expression_list(&mut self, end: TokenType) -> Result<(Vec<Expr>, Span), MonkeyError> {
        let mut list = Vec::new();

        if !self.check(end) {
            loop {
                list.push(self.expression(Precedence::Lowest)?);
                if !self.match_type(TokenType::Comma) {
                    break;
                }
            }
        }

        let close = self.consume_with_help(
            end,
            format!("Lists of expressions must be separated by ',' and closed with '{}'.", end),
        )?;
        Ok((list, close.span))
    }

    fn illegal_token_error(&self) -> MonkeyError {
        let token = self.peek();
        if token.lexeme.starts_with('"') {
            MonkeyError::lex(token.span.clone(), "unterminated string")
                .with_help("Close the string with a double quote.")
        } else {
            MonkeyError::lex(token.span.clone(), format!("illegal token '{}'", token.lexeme))
        }
    }

    /// Skip the rest of a failed statement: through the next `;`, or up to the next
    /// `let`/`return`, or to the end of input.
    fn synchronize(&mut self) {
        while !self.is_at_end() {
            if self.advance().token_type == TokenType::Semicolon {
                return;
            }
            if matches!(
                self.peek().token_type,
                TokenType::Let | TokenType::Return
            ) {
                return;
            }
        }
    }

    fn match_type(&mut self, token_type: TokenType) -> bool {
        if self.check(token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, token_type: TokenType) -> bool {
        self.peek().token_type == token_type
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            let next = self.lexer.next_token();
            self.previous = std::mem::replace(&mut self.current, next);
            self.previous.clone()
        } else {
            self.current.clone()
        }
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        &self.current
    }

    fn previous(&self) -> &Token {
        &self.previous
    }

    fn consume_with_help(&mut self, token_type: TokenType, help: String) -> Result<Token, MonkeyError> {
        if self.check(token_type) {
            Ok(self.advance())
        } else {
            Err(MonkeyError::parse(
                self.error_span(),
                format!(
                    "expected next token to be {}, got {} instead",
                    token_type,
                    self.peek().token_type
                ),
            )
            .with_help(help))
        }
    }

    fn error_span(&self) -> Span {
        if self.is_at_end() {
            // If we're at EOF, point just past the last real token
            Span::single(self.previous().span.end)
        } else {
            self.peek().span.clone()
        }
    }
}
