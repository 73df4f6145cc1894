use aggkit_core::Value;

use crate::error::UdfError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(Value),
    Str(String),
    Name(String),
    Nil,
    True,
    False,
    And,
    Or,
    Not,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Eof,
}

#[derive(Debug, Clone)]
pub(crate) struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, UdfError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        let start = pos;

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let token = match c {
            b'0'..=b'9' => {
                let (value, end) = number(source, pos)?;
                pos = end;
                Token::Number(value)
            }
            b'.' if bytes.get(pos + 1).is_some_and(u8::is_ascii_digit) => {
                let (value, end) = number(source, pos)?;
                pos = end;
                Token::Number(value)
            }
            b'\'' | b'"' => {
                let (s, end) = string(source, pos)?;
                pos = end;
                Token::Str(s)
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_')
                {
                    pos += 1;
                }
                keyword_or_name(&source[start..pos])
            }
            _ => {
                let (token, len) = operator(bytes, pos)?;
                pos += len;
                token
            }
        };

        tokens.push(Spanned {
            token,
            offset: start,
        });
    }

    tokens.push(Spanned {
        token: Token::Eof,
        offset: bytes.len(),
    });
    Ok(tokens)
}

fn keyword_or_name(word: &str) -> Token {
    match word {
        "nil" => Token::Nil,
        "true" => Token::True,
        "false" => Token::False,
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        _ => Token::Name(word.to_string()),
    }
}

fn operator(bytes: &[u8], pos: usize) -> Result<(Token, usize), UdfError> {
    let next = bytes.get(pos + 1).copied();
    let pair = match (bytes[pos], next) {
        (b'=', Some(b'=')) => Some(Token::Eq),
        (b'~', Some(b'=')) => Some(Token::Ne),
        (b'<', Some(b'=')) => Some(Token::Le),
        (b'>', Some(b'=')) => Some(Token::Ge),
        (b'.', Some(b'.')) => Some(Token::Concat),
        _ => None,
    };
    if let Some(token) = pair {
        return Ok((token, 2));
    }

    let single = match bytes[pos] {
        b'+' => Token::Plus,
        b'-' => Token::Minus,
        b'*' => Token::Star,
        b'/' => Token::Slash,
        b'%' => Token::Percent,
        b'^' => Token::Caret,
        b'<' => Token::Lt,
        b'>' => Token::Gt,
        b'(' => Token::LParen,
        b')' => Token::RParen,
        b'[' => Token::LBracket,
        b']' => Token::RBracket,
        b'.' => Token::Dot,
        b'=' => {
            return Err(UdfError::syntax(
                pos,
                "assignment is not allowed in an expression",
            ));
        }
        other => {
            return Err(UdfError::syntax(
                pos,
                format!("unexpected character {:?}", other as char),
            ));
        }
    };
    Ok((single, 1))
}

fn number(source: &str, start: usize) -> Result<(Value, usize), UdfError> {
    let bytes = source.as_bytes();
    let mut pos = start;
    let mut is_float = false;

    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    // `1..2` is a concatenation, not a fraction.
    if pos < bytes.len() && bytes[pos] == b'.' && bytes.get(pos + 1) != Some(&b'.') {
        is_float = true;
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        is_float = true;
        pos += 1;
        if pos < bytes.len() && (bytes[pos] == b'+' || bytes[pos] == b'-') {
            pos += 1;
        }
        let digits = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        if digits == pos {
            return Err(UdfError::syntax(start, "malformed number exponent"));
        }
    }

    let text = &source[start..pos];
    let value = if is_float {
        text.parse::<f64>().map(Value::Float).ok()
    } else {
        text.parse::<i64>()
            .map(Value::Int)
            .or_else(|_| text.parse::<f64>().map(Value::Float))
            .ok()
    };
    value
        .map(|v| (v, pos))
        .ok_or_else(|| UdfError::syntax(start, format!("malformed number {text}")))
}

fn string(source: &str, start: usize) -> Result<(String, usize), UdfError> {
    let quote = source.as_bytes()[start] as char;
    let mut out = String::new();
    let mut chars = source[start + 1..].char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            c if c == quote => return Ok((out, start + 1 + i + 1)),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, '\'')) => out.push('\''),
                Some((_, '"')) => out.push('"'),
                Some((j, other)) => {
                    return Err(UdfError::syntax(
                        start + 1 + j,
                        format!("unknown escape \\{other}"),
                    ));
                }
                None => break,
            },
            '\n' => break,
            c => out.push(c),
        }
    }
    Err(UdfError::syntax(start, "unfinished string"))
}
