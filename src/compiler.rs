use std::path::PathBuf;

use crate::environment::Environment;
use crate::error::RshError;
use crate::tokenizer::Token;
use crate::types::*;

/// Groups a token stream into pipeline segments. Pure: no I/O, nothing spawned.
pub struct Compiler<'a> {
    tokens: std::iter::Peekable<std::vec::IntoIter<Token>>,
    env: &'a Environment,
}

impl<'a> Compiler<'a> {
    pub fn new(tokens: Vec<Token>, env: &'a Environment) -> Self {
        Compiler { tokens: tokens.into_iter().peekable(), env }
    }

    fn next(&mut self) -> Option<Token> { self.tokens.next() }

    pub fn compile(mut self) -> Result<Pipeline, RshError> {
        let mut segments = Vec::new();
        let mut current = Segment::new(Link::None);

        while let Some(token) = self.next() {
            match token {
                Token::Word(word) => current.args.push(self.env.resolve(&word).into_owned()),
                Token::Pipe => {
                    if current.is_blank() {
                        return Err(RshError::Syntax("missing command before '|'".into()));
                    }
                    if segments.len() + 1 >= MAX_SEGMENTS {
                        return Err(RshError::CapacityExceeded { limit: MAX_SEGMENTS });
                    }
                    segments.push(std::mem::replace(&mut current, Segment::new(Link::Pipe)));
                    if self.tokens.peek().is_none() {
                        return Err(RshError::Syntax("missing command after '|'".into()));
                    }
                }
                Token::RedirectIn => {
                    current.redirect_in = Some(self.redirect_target(&token)?);
                }
                Token::RedirectOut | Token::RedirectOutAppend => {
                    let mode = if token == Token::RedirectOut { RedirectMode::Truncate } else { RedirectMode::Append };
                    let path = self.redirect_target(&token)?;
                    current.redirect_out = Some(OutputRedirect { path, mode });
                }
            }
        }

        if current.is_blank() && current.link == Link::Pipe {
            return Err(RshError::Syntax("missing command after '|'".into()));
        }
        segments.push(current);
        Ok(Pipeline::from_segments(segments))
    }

    /// Consumes the word following a redirect operator.
    fn redirect_target(&mut self, operator: &Token) -> Result<PathBuf, RshError> {
        match self.next() {
            Some(Token::Word(word)) => Ok(PathBuf::from(self.env.resolve(&word).into_owned())),
            Some(other) => Err(RshError::Syntax(format!(
                "expected a file name after '{}', found '{}'",
                operator.describe(),
                other.describe()
            ))),
            None => Err(RshError::Syntax(format!("expected a file name after '{}'", operator.describe()))),
        }
    }
}

pub fn compile(tokens: Vec<Token>, env: &Environment) -> Result<Pipeline, RshError> {
    let pipeline = Compiler::new(tokens, env).compile()?;
    tracing::debug!(stages = pipeline.len(), "compiled pipeline");
    Ok(pipeline)
}
