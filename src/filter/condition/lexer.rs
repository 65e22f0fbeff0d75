// SPDX-License-Identifier: MIT

//! Tokenizer for condition expressions

use crate::error::ParseError;

/// A lexical token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    /// Bare identifier or keyword
    Ident(String),
    /// `$name`: explicit attribute reference
    Attr(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    End,
}

/// Token plus its byte offset in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

/// Split an expression into tokens, terminated by `Token::End`
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, ParseError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() {
            let (token, next) = lex_number(input, &chars, i)?;
            tokens.push(Spanned {
                token,
                position: pos,
            });
            i = next;
            continue;
        }

        if c == '\'' || c == '"' {
            let (value, next) = lex_string(&chars, i)?;
            tokens.push(Spanned {
                token: Token::Str(value),
                position: pos,
            });
            i = next;
            continue;
        }

        if is_ident_start(c) {
            let (name, next) = lex_ident(&chars, i);
            tokens.push(Spanned {
                token: Token::Ident(name),
                position: pos,
            });
            i = next;
            continue;
        }

        if c == '$' {
            match chars.get(i + 1) {
                Some((_, n)) if is_ident_start(*n) => {
                    let (name, next) = lex_ident(&chars, i + 1);
                    tokens.push(Spanned {
                        token: Token::Attr(name),
                        position: pos,
                    });
                    i = next;
                    continue;
                }
                _ => return Err(ParseError::new("Expected attribute name after '$'", pos)),
            }
        }

        let next_char = chars.get(i + 1).map(|(_, c)| *c);
        let (token, width) = match (c, next_char) {
            ('*', Some('*')) => (Token::StarStar, 2),
            ('/', Some('/')) => (Token::SlashSlash, 2),
            ('=', Some('=')) => (Token::EqEq, 2),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('<', Some('=')) => (Token::Lte, 2),
            ('>', Some('=')) => (Token::Gte, 2),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            (',', _) => (Token::Comma, 1),
            ('.', _) => (Token::Dot, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            _ => return Err(ParseError::new(format!("Unexpected character '{}'", c), pos)),
        };
        tokens.push(Spanned {
            token,
            position: pos,
        });
        i += width;
    }

    tokens.push(Spanned {
        token: Token::End,
        position: input.len(),
    });
    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn lex_ident(chars: &[(usize, char)], start: usize) -> (String, usize) {
    let mut i = start;
    let mut name = String::new();
    while let Some((_, c)) = chars.get(i) {
        if c.is_alphanumeric() || *c == '_' {
            name.push(*c);
            i += 1;
        } else {
            break;
        }
    }
    (name, i)
}

fn lex_number(
    input: &str,
    chars: &[(usize, char)],
    start: usize,
) -> Result<(Token, usize), ParseError> {
    let position = chars[start].0;
    let mut i = start;
    let mut is_float = false;

    let digits = |i: &mut usize| {
        while let Some((_, c)) = chars.get(*i) {
            if c.is_ascii_digit() || *c == '_' {
                *i += 1;
            } else {
                break;
            }
        }
    };

    digits(&mut i);

    // A dot is a decimal point only when a digit follows, so `1.x` stays member access
    if let (Some((_, '.')), Some((_, d))) = (chars.get(i), chars.get(i + 1)) {
        if d.is_ascii_digit() {
            is_float = true;
            i += 1;
            digits(&mut i);
        }
    }

    if let Some((_, 'e' | 'E')) = chars.get(i) {
        let mut j = i + 1;
        if let Some((_, '+' | '-')) = chars.get(j) {
            j += 1;
        }
        if chars.get(j).is_some_and(|(_, c)| c.is_ascii_digit()) {
            is_float = true;
            i = j;
            digits(&mut i);
        }
    }

    let end = chars.get(i).map(|(p, _)| *p).unwrap_or(input.len());
    let text: String = input[position..end].chars().filter(|c| *c != '_').collect();

    let token = if is_float {
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|_| ParseError::new(format!("Invalid number '{}'", text), position))?
    } else {
        text.parse::<i64>()
            .map(Token::Int)
            .map_err(|_| ParseError::new(format!("Integer literal '{}' out of range", text), position))?
    };
    Ok((token, i))
}

fn lex_string(chars: &[(usize, char)], start: usize) -> Result<(String, usize), ParseError> {
    let (position, quote) = chars[start];
    let mut value = String::new();
    let mut i = start + 1;

    while let Some((pos, c)) = chars.get(i) {
        match *c {
            c if c == quote => return Ok((value, i + 1)),
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .map(|(_, e)| *e)
                    .ok_or_else(|| ParseError::new("Unterminated escape sequence", *pos))?;
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '0' => value.push('\0'),
                    '\\' | '\'' | '"' => value.push(escaped),
                    // Regex escapes like `\d` pass through untouched
                    other => {
                        value.push('\\');
                        value.push(other);
                    }
                }
                i += 2;
            }
            other => {
                value.push(other);
                i += 1;
            }
        }
    }

    Err(ParseError::new("Unterminated string literal", position))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_tokenize_comparison() {
        assert_eq!(
            tokens("val % 2 == 0"),
            vec![
                Token::Ident("val".to_string()),
                Token::Percent,
                Token::Int(2),
                Token::EqEq,
                Token::Int(0),
                Token::End,
            ]
        );
    }

    #[test]
    fn test_tokenize_explicit_attribute() {
        assert_eq!(
            tokens("$val != 23"),
            vec![
                Token::Attr("val".to_string()),
                Token::NotEq,
                Token::Int(23),
                Token::End,
            ]
        );
    }

    #[test]
    fn test_tokenize_numbers() {
        assert_eq!(
            tokens("1.5 2e3 1_000 3"),
            vec![
                Token::Float(1.5),
                Token::Float(2000.0),
                Token::Int(1000),
                Token::Int(3),
                Token::End,
            ]
        );
    }

    #[test]
    fn test_tokenize_two_char_operators() {
        assert_eq!(
            tokens("** // <= >= != =="),
            vec![
                Token::StarStar,
                Token::SlashSlash,
                Token::Lte,
                Token::Gte,
                Token::NotEq,
                Token::EqEq,
                Token::End,
            ]
        );
    }

    #[test]
    fn test_tokenize_strings_and_escapes() {
        assert_eq!(
            tokens(r#"'it\'s' "a\"b" '\d+'"#),
            vec![
                Token::Str("it's".to_string()),
                Token::Str("a\"b".to_string()),
                Token::Str("\\d+".to_string()),
                Token::End,
            ]
        );
    }

    #[test]
    fn test_tokenize_positions() {
        let spanned = tokenize("a  == 'x'").unwrap();
        assert_eq!(spanned[0].position, 0);
        assert_eq!(spanned[1].position, 3);
        assert_eq!(spanned[2].position, 6);
        assert_eq!(spanned[3].position, 9);
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("name == 'abc").unwrap_err();
        assert_eq!(err.position, 8);
    }

    #[test]
    fn test_unexpected_character() {
        assert!(tokenize("val = 3").is_err());
        assert!(tokenize("val ; 3").is_err());
        assert!(tokenize("$ 3").is_err());
    }

    #[test]
    fn test_integer_out_of_range() {
        assert!(tokenize("99999999999999999999").is_err());
    }
}
