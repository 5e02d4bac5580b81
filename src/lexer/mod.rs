use logos::Logos;

#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip(r"#[^\n]*", allow_greedy = true))]
pub enum Token {
    // Keywords
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("nil")]
    Nil,

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("==")]
    EqualsEquals,
    #[token("!=")]
    NotEquals,
    #[token(">=")]
    GreaterOrEqual,
    #[token("<=")]
    LessOrEqual,
    #[token(">")]
    Greater,
    #[token("<")]
    Less,
    // Assignment only — equality is `==`.
    #[token("=")]
    Assign,

    // Punctuation
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,

    // Literals
    #[regex(r"[0-9]+(\.[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r#""[^"]*""#, |lex| {
        let s = lex.slice();
        Some(s[1..s.len()-1].to_string())
    })]
    Text(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Newlines are significant (statement terminators)
    #[token("\n")]
    Newline,
}

/// Lex source code into a stream of tokens with positions.
pub fn lex(source: &str) -> Result<Vec<(Token, std::ops::Range<usize>)>, LexError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => {
                let span = lexer.span();
                return Err(LexError {
                    position: span.start,
                    snippet: source[span.clone()].to_string(),
                });
            }
        }
    }

    Ok(tokens)
}

#[derive(Debug, thiserror::Error)]
#[error("Syntax error at position {position}: unexpected character(s) '{snippet}'")]
pub struct LexError {
    pub position: usize,
    pub snippet: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_arithmetic() {
        let tokens = lex("1+1").unwrap();
        assert_eq!(tokens[0].0, Token::Number(1.0));
        assert_eq!(tokens[1].0, Token::Plus);
        assert_eq!(tokens[2].0, Token::Number(1.0));
    }

    #[test]
    fn lex_assign_vs_equality() {
        let tokens = lex("x = 5 == 5").unwrap();
        assert_eq!(tokens[1].0, Token::Assign);
        assert_eq!(tokens[3].0, Token::EqualsEquals);
    }

    #[test]
    fn lex_string_literal() {
        let tokens = lex(r#""hello world""#).unwrap();
        assert_eq!(tokens[0].0, Token::Text("hello world".to_string()));
    }

    #[test]
    fn lex_newline_significant() {
        let tokens = lex("a\nb").unwrap();
        assert_eq!(tokens[1].0, Token::Newline);
    }

    #[test]
    fn lex_comment_ignored() {
        let tokens = lex("# a comment\necho").unwrap();
        assert!(tokens.iter().any(|(t, _)| *t == Token::Ident("echo".to_string())));
    }

    #[test]
    fn lex_bad_character_errors() {
        let err = lex("1 + @").unwrap_err();
        assert_eq!(err.position, 4);
        assert_eq!(err.snippet, "@");
    }
}
