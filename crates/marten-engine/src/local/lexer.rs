//! Tokenizer for the local scripting dialect.

use marten_value::num_bigint::BigInt;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Big(BigInt),
    Str(String),

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Dot,
    Colon,

    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    Bang,

    Let,
    Function,
    Return,
    Throw,
    Try,
    Catch,
    While,
    If,
    Else,
    True,
    False,
    Null,
    Undefined,
    New,

    Eof,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
}

pub fn tokenize(source: &str) -> EngineResult<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line: u32 = 1;

    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '/' => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    while let Some(&n) = chars.peek() {
                        if n == '\n' {
                            break;
                        }
                        chars.next();
                    }
                } else {
                    tokens.push(Spanned {
                        token: Token::Slash,
                        line,
                    });
                }
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                while let Some(n) = chars.next() {
                    match n {
                        c if c == quote => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some('\\') => text.push('\\'),
                            Some('\'') => text.push('\''),
                            Some('"') => text.push('"'),
                            Some(other) => text.push(other),
                            None => break,
                        },
                        '\n' => {
                            return Err(EngineError::Syntax(format!(
                                "unterminated string at line {line}"
                            )));
                        }
                        other => text.push(other),
                    }
                }
                if !closed {
                    return Err(EngineError::Syntax(format!(
                        "unterminated string at line {line}"
                    )));
                }
                tokens.push(Spanned {
                    token: Token::Str(text),
                    line,
                });
            }
            c if c.is_ascii_digit() => {
                let mut text = String::new();
                let mut is_float = false;
                while let Some(&n) = chars.peek() {
                    if n.is_ascii_digit() {
                        text.push(n);
                        chars.next();
                    } else if n == '.' && !is_float {
                        is_float = true;
                        text.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if chars.peek() == Some(&'n') && !is_float {
                    chars.next();
                    let big = text
                        .parse::<BigInt>()
                        .map_err(|_| EngineError::Syntax(format!("bad bigint at line {line}")))?;
                    tokens.push(Spanned {
                        token: Token::Big(big),
                        line,
                    });
                } else if is_float {
                    let value = text
                        .parse::<f64>()
                        .map_err(|_| EngineError::Syntax(format!("bad number at line {line}")))?;
                    tokens.push(Spanned {
                        token: Token::Float(value),
                        line,
                    });
                } else {
                    match text.parse::<i64>() {
                        Ok(value) => tokens.push(Spanned {
                            token: Token::Int(value),
                            line,
                        }),
                        Err(_) => {
                            let value = text.parse::<f64>().map_err(|_| {
                                EngineError::Syntax(format!("bad number at line {line}"))
                            })?;
                            tokens.push(Spanned {
                                token: Token::Float(value),
                                line,
                            });
                        }
                    }
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&n) = chars.peek() {
                    if n.is_alphanumeric() || n == '_' {
                        word.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let token = match word.as_str() {
                    "let" => Token::Let,
                    "function" => Token::Function,
                    "return" => Token::Return,
                    "throw" => Token::Throw,
                    "try" => Token::Try,
                    "catch" => Token::Catch,
                    "while" => Token::While,
                    "if" => Token::If,
                    "else" => Token::Else,
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    "undefined" => Token::Undefined,
                    "new" => Token::New,
                    _ => Token::Ident(word),
                };
                tokens.push(Spanned { token, line });
            }
            _ => {
                chars.next();
                let token = match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    ',' => Token::Comma,
                    ';' => Token::Semi,
                    '.' => Token::Dot,
                    ':' => Token::Colon,
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '%' => Token::Percent,
                    '=' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            Token::EqEq
                        } else {
                            Token::Assign
                        }
                    }
                    '!' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            Token::NotEq
                        } else {
                            Token::Bang
                        }
                    }
                    '<' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            Token::LtEq
                        } else {
                            Token::Lt
                        }
                    }
                    '>' => {
                        if chars.peek() == Some(&'=') {
                            chars.next();
                            Token::GtEq
                        } else {
                            Token::Gt
                        }
                    }
                    '&' => {
                        if chars.peek() == Some(&'&') {
                            chars.next();
                            Token::AndAnd
                        } else {
                            return Err(EngineError::Syntax(format!(
                                "unexpected character '&' at line {line}"
                            )));
                        }
                    }
                    '|' => {
                        if chars.peek() == Some(&'|') {
                            chars.next();
                            Token::OrOr
                        } else {
                            return Err(EngineError::Syntax(format!(
                                "unexpected character '|' at line {line}"
                            )));
                        }
                    }
                    other => {
                        return Err(EngineError::Syntax(format!(
                            "unexpected character '{other}' at line {line}"
                        )));
                    }
                };
                tokens.push(Spanned { token, line });
            }
        }
    }

    tokens.push(Spanned {
        token: Token::Eof,
        line,
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenizes_assignment() {
        let tokens = tokenize("let x = 1;").unwrap();
        let kinds: Vec<&Token> = tokens.iter().map(|t| &t.token).collect();
        assert!(matches!(kinds[0], Token::Let));
        assert!(matches!(kinds[1], Token::Ident(n) if n == "x"));
        assert!(matches!(kinds[2], Token::Assign));
        assert!(matches!(kinds[3], Token::Int(1)));
    }

    #[test]
    fn test_bigint_suffix() {
        let tokens = tokenize("9007199254740993n").unwrap();
        assert!(matches!(&tokens[0].token, Token::Big(_)));
    }

    #[test]
    fn test_line_numbers_advance() {
        let tokens = tokenize("1;\n2;").unwrap();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[2].line, 2);
    }

    #[test]
    fn test_unterminated_string_is_syntax_error() {
        assert!(matches!(
            tokenize("'open"),
            Err(EngineError::Syntax(_))
        ));
    }
}
