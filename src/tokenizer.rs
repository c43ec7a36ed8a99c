use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Any run of non-delimiter characters that doesn't start with a digit:
    /// opcode keywords, variable names, and label names all arrive as symbols.
    Symbol(String),
    Semicolon,
    Colon,
    Number(i64),
    /// Never produced by `tokens`; the parser materializes this when it reads
    /// past the last token.
    Eof,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Symbol(s) => write!(f, "{}", s),
            Token::Semicolon => write!(f, ";"),
            Token::Colon => write!(f, ":"),
            Token::Number(n) => write!(f, "#{}", n),
            Token::Eof => write!(f, "<eof>"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenizeError {
    #[error("Invalid number literal \"{0}\"")]
    InvalidNumber(String),
}

pub fn tokens(source: &str) -> Result<Vec<Token>, TokenizeError> {
    let mut tokens = Vec::new();
    let mut buffer = String::new();
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ';' => {
                flush(&mut buffer, &mut tokens)?;
                tokens.push(Token::Semicolon);
            }
            ':' => {
                flush(&mut buffer, &mut tokens)?;
                tokens.push(Token::Colon);
            }
            '/' if chars.peek() == Some(&'/') => {
                flush(&mut buffer, &mut tokens)?;
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            c if c.is_whitespace() => {
                flush(&mut buffer, &mut tokens)?;
            }
            c => buffer.push(c),
        }
    }
    flush(&mut buffer, &mut tokens)?;

    Ok(tokens)
}

fn flush(buffer: &mut String, tokens: &mut Vec<Token>) -> Result<(), TokenizeError> {
    if buffer.is_empty() {
        return Ok(());
    }
    tokens.push(reify(buffer)?);
    buffer.clear();
    Ok(())
}

fn reify(buffer: &str) -> Result<Token, TokenizeError> {
    let first = buffer
        .chars()
        .next()
        .expect("reify is only called on a non-empty buffer");
    if first.is_ascii_digit() {
        let value = buffer
            .parse()
            .map_err(|_| TokenizeError::InvalidNumber(buffer.to_string()))?;
        Ok(Token::Number(value))
    } else {
        Ok(Token::Symbol(buffer.to_string()))
    }
}
