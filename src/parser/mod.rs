use crate::ast::*;
use crate::lexer::Token;

pub struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
}

#[derive(Debug, thiserror::Error)]
#[error("Parse error at token {position} (bytes {}..{}): {message}", .span.start, .span.end)]
pub struct ParseError {
    pub code: &'static str,
    pub position: usize,
    pub span: Span,
    pub message: String,
}

type Result<T> = std::result::Result<T, ParseError>;

/// Parse the whole token stream as exactly one expression.
///
/// Trailing tokens (beyond newlines) are a parse error. This strictness is the
/// signal the dispatcher branches on: input that is not a single expression
/// falls back to statement execution.
pub fn parse_expression(tokens: Vec<(Token, Span)>) -> Result<Expr> {
    let mut parser = Parser::new(tokens);
    parser.skip_newlines();
    let expr = parser.parse_expr()?;
    parser.skip_newlines();
    if !parser.at_end() {
        return Err(parser.error(
            "EVL-P001",
            format!("expected end of input, got {:?}", parser.peek().unwrap()),
        ));
    }
    Ok(expr)
}

/// Parse the token stream as a newline/semicolon-separated statement sequence.
pub fn parse_statements(tokens: Vec<(Token, Span)>) -> Result<Vec<Stmt>> {
    let mut parser = Parser::new(tokens);
    let stmts = parser.parse_stmt_sequence(None)?;
    if !parser.at_end() {
        return Err(parser.error(
            "EVL-P002",
            format!("expected end of input, got {:?}", parser.peek().unwrap()),
        ));
    }
    Ok(stmts)
}

impl Parser {
    pub fn new(tokens: Vec<(Token, Span)>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|(_, s)| *s)
            .unwrap_or(Span::UNKNOWN)
    }

    fn advance(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: &Token) -> Result<Span> {
        match self.peek() {
            Some(tok) if tok == expected => {
                let span = self.peek_span();
                self.advance();
                Ok(span)
            }
            Some(tok) => Err(self.error("EVL-P003", format!("expected {:?}, got {:?}", expected, tok))),
            None => Err(self.error("EVL-P004", format!("expected {:?}, got EOF", expected))),
        }
    }

    fn error(&self, code: &'static str, message: String) -> ParseError {
        ParseError {
            code,
            position: self.pos,
            span: self.peek_span(),
            message,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Access raw token (for lookahead). Returns just the Token reference.
    fn token_at(&self, idx: usize) -> Option<&Token> {
        self.tokens.get(idx).map(|(t, _)| t)
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), Some(Token::Newline)) {
            self.advance();
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(Token::Newline | Token::Semicolon)) {
            self.advance();
        }
    }

    // ---- Statements ----

    /// Parse statements until `terminator` (or EOF when `None`).
    /// The terminator itself is not consumed.
    fn parse_stmt_sequence(&mut self, terminator: Option<&Token>) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            match (self.peek(), terminator) {
                (None, _) => break,
                (Some(tok), Some(term)) if tok == term => break,
                _ => {}
            }
            stmts.push(self.parse_stmt()?);
            // A statement ends at a separator, a block terminator, or EOF.
            match (self.peek(), terminator) {
                (None, _) => {}
                (Some(Token::Newline | Token::Semicolon), _) => {}
                (Some(tok), Some(term)) if tok == term => {}
                (Some(tok), _) => {
                    return Err(self.error(
                        "EVL-P005",
                        format!("expected newline or ';' after statement, got {:?}", tok),
                    ));
                }
            }
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        match self.peek() {
            Some(Token::If) => self.parse_if(),
            Some(Token::While) => self.parse_while(),
            // `name = ...` is an assignment; `name ==` and every other shape
            // of leading identifier is an expression statement.
            Some(Token::Ident(_)) if matches!(self.token_at(self.pos + 1), Some(Token::Assign)) => {
                let name = match self.advance() {
                    Some(Token::Ident(name)) => name.clone(),
                    _ => unreachable!("peeked an identifier"),
                };
                self.expect(&Token::Assign)?;
                let value = self.parse_expr()?;
                Ok(Stmt::Assign { name, value })
            }
            Some(_) => Ok(Stmt::Expr(self.parse_expr()?)),
            None => Err(self.error("EVL-P006", "expected statement, got EOF".into())),
        }
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        self.expect(&Token::If)?;
        let condition = self.parse_expr()?;
        let then_body = self.parse_block()?;
        let else_body = if matches!(self.peek(), Some(Token::Else)) {
            self.advance();
            if matches!(self.peek(), Some(Token::If)) {
                // `else if` chains as a single nested statement
                vec![self.parse_if()?]
            } else {
                self.parse_block()?
            }
        } else {
            Vec::new()
        };
        Ok(Stmt::If { condition, then_body, else_body })
    }

    fn parse_while(&mut self) -> Result<Stmt> {
        self.expect(&Token::While)?;
        let condition = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::While { condition, body })
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.expect(&Token::LBrace)?;
        let stmts = self.parse_stmt_sequence(Some(&Token::RBrace))?;
        self.expect(&Token::RBrace)?;
        Ok(stmts)
    }

    // ---- Expressions (precedence climbing) ----

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::BinOp {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_equality()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let right = self.parse_equality()?;
            left = Expr::BinOp {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqualsEquals) => BinOp::Equals,
                Some(Token::NotEquals) => BinOp::NotEquals,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Greater) => BinOp::GreaterThan,
                Some(Token::Less) => BinOp::LessThan,
                Some(Token::GreaterOrEqual) => BinOp::GreaterOrEqual,
                Some(Token::LessOrEqual) => BinOp::LessOrEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expr::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            left = Expr::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Multiply,
                Some(Token::Slash) => BinOp::Divide,
                Some(Token::Percent) => BinOp::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Not) => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::UnaryOp {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                })
            }
            Some(Token::Minus) => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::UnaryOp {
                    op: UnaryOp::Negate,
                    operand: Box::new(operand),
                })
            }
            _ => self.parse_postfix(),
        }
    }

    /// Calls and indexing bind tighter than any operator and chain left-to-right.
    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::LParen) => {
                    self.advance();
                    let args = self.parse_args()?;
                    self.expect(&Token::RParen)?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                Some(Token::LBracket) => {
                    self.advance();
                    self.skip_newlines();
                    let index = self.parse_expr()?;
                    self.skip_newlines();
                    self.expect(&Token::RBracket)?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// Comma-separated argument list; newlines inside the parens are ignored.
    fn parse_args(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        self.skip_newlines();
        if matches!(self.peek(), Some(Token::RParen)) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            self.skip_newlines();
            if matches!(self.peek(), Some(Token::Comma)) {
                self.advance();
                self.skip_newlines();
            } else {
                break;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.peek().cloned() {
            Some(Token::Number(n)) => {
                self.advance();
                Ok(Expr::Literal(Literal::Number(n)))
            }
            Some(Token::Text(s)) => {
                self.advance();
                Ok(Expr::Literal(Literal::Text(s)))
            }
            Some(Token::True) => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(true)))
            }
            Some(Token::False) => {
                self.advance();
                Ok(Expr::Literal(Literal::Bool(false)))
            }
            Some(Token::Nil) => {
                self.advance();
                Ok(Expr::Literal(Literal::Nil))
            }
            Some(Token::Ident(name)) => {
                self.advance();
                Ok(Expr::Ref(name))
            }
            Some(Token::LParen) => {
                self.advance();
                self.skip_newlines();
                let expr = self.parse_expr()?;
                self.skip_newlines();
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(Token::LBracket) => {
                self.advance();
                self.skip_newlines();
                let mut items = Vec::new();
                if !matches!(self.peek(), Some(Token::RBracket)) {
                    loop {
                        items.push(self.parse_expr()?);
                        self.skip_newlines();
                        if matches!(self.peek(), Some(Token::Comma)) {
                            self.advance();
                            self.skip_newlines();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(&Token::RBracket)?;
                Ok(Expr::List(items))
            }
            Some(tok) => Err(self.error("EVL-P007", format!("expected expression, got {:?}", tok))),
            None => Err(self.error("EVL-P008", "expected expression, got EOF".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;

    fn toks(source: &str) -> Vec<(Token, Span)> {
        lexer::lex(source)
            .unwrap()
            .into_iter()
            .map(|(t, r)| (t, Span { start: r.start, end: r.end }))
            .collect()
    }

    #[test]
    fn expression_arithmetic() {
        let expr = parse_expression(toks("1+1")).unwrap();
        assert_eq!(
            expr,
            Expr::BinOp {
                op: BinOp::Add,
                left: Box::new(Expr::Literal(Literal::Number(1.0))),
                right: Box::new(Expr::Literal(Literal::Number(1.0))),
            }
        );
    }

    #[test]
    fn expression_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let expr = parse_expression(toks("1 + 2 * 3")).unwrap();
        match expr {
            Expr::BinOp { op: BinOp::Add, right, .. } => {
                assert!(matches!(*right, Expr::BinOp { op: BinOp::Multiply, .. }));
            }
            other => panic!("expected Add at top, got {:?}", other),
        }
    }

    #[test]
    fn assignment_is_not_an_expression() {
        let err = parse_expression(toks("x = 5")).unwrap_err();
        assert_eq!(err.code, "EVL-P001");
    }

    #[test]
    fn multiple_lines_are_not_one_expression() {
        assert!(parse_expression(toks("a=1\na+1")).is_err());
        assert!(parse_expression(toks("1+1\n2+2")).is_err());
    }

    #[test]
    fn trailing_newline_tolerated_in_expression() {
        assert!(parse_expression(toks("1+1\n")).is_ok());
    }

    #[test]
    fn statements_assignment_then_expression() {
        let stmts = parse_statements(toks("a=1\na+1")).unwrap();
        assert_eq!(stmts.len(), 2);
        assert!(matches!(&stmts[0], Stmt::Assign { name, .. } if name == "a"));
        assert!(matches!(&stmts[1], Stmt::Expr(_)));
    }

    #[test]
    fn statements_semicolon_separated() {
        let stmts = parse_statements(toks("a = 1; b = 2; echo(a + b)")).unwrap();
        assert_eq!(stmts.len(), 3);
    }

    #[test]
    fn if_else_chain() {
        let stmts = parse_statements(toks("if x > 0 { echo(1) } else if x < 0 { echo(2) } else { echo(3) }")).unwrap();
        assert_eq!(stmts.len(), 1);
        match &stmts[0] {
            Stmt::If { else_body, .. } => {
                assert!(matches!(else_body[0], Stmt::If { .. }));
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn while_loop() {
        let stmts = parse_statements(toks("i = 0\nwhile i < 3 { i = i + 1 }")).unwrap();
        assert_eq!(stmts.len(), 2);
        assert!(matches!(&stmts[1], Stmt::While { .. }));
    }

    #[test]
    fn call_and_index_chain() {
        let expr = parse_expression(toks("f(1, 2)[0]")).unwrap();
        assert!(matches!(expr, Expr::Index { .. }));
    }

    #[test]
    fn list_literal() {
        let expr = parse_expression(toks("[1, 2, 3]")).unwrap();
        match expr {
            Expr::List(items) => assert_eq!(items.len(), 3),
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn equality_is_an_expression() {
        assert!(parse_expression(toks("x == 5")).is_ok());
    }

    #[test]
    fn garbage_fails_both_entry_points() {
        assert!(parse_expression(toks(") (")).is_err());
        assert!(parse_statements(toks(") (")).is_err());
    }

    #[test]
    fn two_expressions_without_separator_rejected() {
        let err = parse_statements(toks("1 2")).unwrap_err();
        assert_eq!(err.code, "EVL-P005");
    }
}
