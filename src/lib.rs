// Monkey Language Interpreter Library
//
// Lexer, Pratt parser and tree-walking evaluator for the Monkey language:
// integers, booleans, strings, arrays, hashes, first-class functions and
// closures, with diagnostics that point at the offending source.

// Public modules
pub mod ast;
pub mod builtins;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod value;

// Re-export commonly used items
pub use ast::{Expr, Program, Stmt};
pub use environment::{Env, Environment};
pub use error::{MonkeyError, Span};
pub use evaluator::Evaluator;
pub use lexer::{Lexer, Token, TokenType};
pub use parser::Parser;
pub use repl::{Repl, ReplConfig};
pub use value::Value;

use std::rc::Rc;

/// Lazily tokenize `source`. The iterator ends after yielding `Eof`.
pub fn tokenize(source: &str) -> Lexer {
    Lexer::new(source)
}

/// Parse `source`, returning whatever statements parsed plus every syntax error.
pub fn parse(source: &str) -> (Program, Vec<MonkeyError>) {
    let mut parser = Parser::new(Lexer::new(source));
    let program = parser.parse_program();
    let errors = parser.errors().to_vec();
    (program, errors)
}

/// Evaluate `program` in `env`. Runtime failures come back as `Value::Error`.
pub fn evaluate(program: &Program, env: &Env) -> Value {
    Evaluator::with_environment(Rc::clone(env))
        .evaluate_program(program)
        .unwrap_or_else(|error| Value::Error(error.message))
}
