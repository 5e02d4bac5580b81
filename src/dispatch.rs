use crate::ast::Span;
use crate::host::Host;
use crate::interpreter::{self, Env, Value};
use crate::lexer::{self, Token};
use crate::parser;

/// How a piece of input was dispatched.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// The input parsed as one expression; its value was routed to `echo`.
    Expression(Value),
    /// The input was executed as a statement sequence, for effect only.
    Statements,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Lex(#[from] lexer::LexError),
    #[error(transparent)]
    Parse(#[from] parser::ParseError),
    #[error(transparent)]
    Runtime(#[from] interpreter::RuntimeError),
}

/// Join code fragments with newlines and run the result: first as a single
/// expression, falling back to statement execution when the text does not
/// parse as one expression.
///
/// Only the expression *parse* failing triggers the fallback. A runtime error
/// on either path propagates. Each call evaluates in a fresh environment; the
/// host namespace is the only thing shared between calls, and it must provide
/// an `echo` function for the expression path to report through.
pub fn run(fragments: &[String], host: &mut Host) -> Result<Outcome, DispatchError> {
    let source = fragments.join("\n");
    let tokens = lex_spanned(&source)?;

    match parser::parse_expression(tokens.clone()) {
        Ok(expr) => {
            let value = {
                let mut env = Env::new(host);
                interpreter::eval_expr(&mut env, &expr)?
            };
            host.call("echo", std::slice::from_ref(&value))?;
            Ok(Outcome::Expression(value))
        }
        Err(_not_an_expression) => {
            let stmts = parser::parse_statements(tokens)?;
            let mut env = Env::new(host);
            interpreter::exec_stmts(&mut env, &stmts)?;
            Ok(Outcome::Statements)
        }
    }
}

fn lex_spanned(source: &str) -> Result<Vec<(Token, Span)>, lexer::LexError> {
    Ok(lexer::lex(source)?
        .into_iter()
        .map(|(t, r)| (t, Span { start: r.start, end: r.end }))
        .collect())
}
