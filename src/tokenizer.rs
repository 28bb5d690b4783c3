use logos::Logos;
use crate::error::RshError;

/// One classified token of an input line. The end of the stream is the end of
/// the returned vector; there is no explicit terminator variant.
#[derive(Logos, Debug, PartialEq, Eq, Clone)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    #[token("|")] Pipe,
    #[token("<")] RedirectIn,
    #[token(">")] RedirectOut,
    #[token(">>")] RedirectOutAppend,

    #[regex(r"[^ \t\r\n\f|<>]+", |lex| lex.slice().to_string())]
    Word(String),
}

impl Token {
    /// Operator spelling, used in syntax error messages.
    pub fn describe(&self) -> &str {
        match self {
            Token::Pipe => "|",
            Token::RedirectIn => "<",
            Token::RedirectOut => ">",
            Token::RedirectOutAppend => ">>",
            Token::Word(w) => w,
        }
    }
}

pub fn tokenize(line: &str) -> Result<Vec<Token>, RshError> {
    let mut lexer = Token::lexer(line);
    let mut tokens = Vec::new();
    while let Some(next) = lexer.next() {
        match next {
            Ok(token) => tokens.push(token),
            Err(()) => {
                return Err(RshError::Syntax(format!(
                    "unrecognized input '{}' at offset {}",
                    lexer.slice(),
                    lexer.span().start
                )))
            }
        }
    }
    Ok(tokens)
}
