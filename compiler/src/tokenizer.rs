use crate::{
    error::{CddlError, Location},
    utils::quote,
};

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    pub static ref TOKEN_REGEX: Regex = Regex::new(concat!(
        r#"(?P<comment>;[^\n]*)"#,
        r#"|(?P<space>\s+)"#,
        r#"|(?P<text>"(?:[^"\\]|\\.)*")"#,
        r#"|(?P<bytes>h?'(?:[^'\\]|\\.)*')"#,
        r#"|(?P<tag>\#6\.\d+)"#,
        r#"|(?P<hash>\#)"#,
        r#"|(?P<float>-?\d+\.\d+(?:[eE][+-]?\d+)?)"#,
        r#"|(?P<hex>-?0x[0-9a-fA-F]+)"#,
        r#"|(?P<int>-?\d+)"#,
        r#"|(?P<ctrl>\.[a-z][a-z0-9]*)"#,
        r#"|(?P<range>\.\.\.?)"#,
        r#"|(?P<punct>//=|/=|//|=>|[=/{}\[\]()<>,:?*+^&~])"#,
        r#"|(?P<ident>[A-Za-z@_$](?:[A-Za-z0-9@_$.\-]*[A-Za-z0-9@_$])?)"#,
    ))
    .unwrap();
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Int,
    Float,
    Text,
    Bytes,
    Tag,
    Hash,
    Control,
    Range,
    Punct,
    Eof,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind:              TokenKind,
    pub text:              String,
    pub line:              usize,
    pub column:            usize,
    /// Comments on the lines directly above this token.
    pub leading_comments:  Vec<String>,
    /// Comments that follow this token on the same line.
    pub trailing_comments: Vec<String>,
}

impl Token {
    pub fn is(&self, text: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == text
    }
}

fn comment_text(raw: &str) -> String {
    let body = &raw[1..];
    body.strip_prefix(' ').unwrap_or(body).trim_end().to_owned()
}

/// Splits `text` into tokens. Comments are not tokens: they are attached to
/// the token they document (see [Token]).
pub fn tokenize_schema(source: &str, text: &str) -> Result<Vec<Token>, CddlError> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut pending = Vec::new();
    let mut line = 1;
    let mut column = 1;
    let mut last_end = 0;
    let mut last_token_line = 0;

    let unexpected = |fragment: &str, line, column| CddlError::SyntaxError {
        location: Location { source: source.to_owned(), line, column },
        expected: "a token".to_owned(),
        found:    quote(fragment.chars().take(16).collect::<String>().as_str()),
    };

    for caps in TOKEN_REGEX.captures_iter(text) {
        let mat = match caps.get(0) {
            Some(mat) => mat,
            None => continue,
        };
        let part = mat.as_str();

        if mat.start() > last_end {
            return Err(unexpected(&text[last_end..mat.start()], line, column));
        }

        let kind = if caps.name("comment").is_some() {
            None
        } else if caps.name("space").is_some() {
            // A blank line detaches the comment block above it.
            if part.matches('\n').count() >= 2 {
                pending.clear();
            }
            None
        } else if caps.name("text").is_some() {
            Some(TokenKind::Text)
        } else if caps.name("bytes").is_some() {
            Some(TokenKind::Bytes)
        } else if caps.name("tag").is_some() {
            Some(TokenKind::Tag)
        } else if caps.name("hash").is_some() {
            Some(TokenKind::Hash)
        } else if caps.name("float").is_some() {
            Some(TokenKind::Float)
        } else if caps.name("hex").is_some() || caps.name("int").is_some() {
            Some(TokenKind::Int)
        } else if caps.name("ctrl").is_some() {
            Some(TokenKind::Control)
        } else if caps.name("range").is_some() {
            Some(TokenKind::Range)
        } else if caps.name("punct").is_some() {
            Some(TokenKind::Punct)
        } else {
            Some(TokenKind::Ident)
        };

        if caps.name("comment").is_some() {
            let comment = comment_text(part);
            match tokens.last_mut() {
                Some(previous) if last_token_line == line && pending.is_empty() => {
                    previous.trailing_comments.push(comment)
                }
                _ => pending.push(comment),
            }
        }

        if let Some(kind) = kind {
            tokens.push(Token {
                kind,
                text: part.to_string(),
                line,
                column,
                leading_comments: std::mem::take(&mut pending),
                trailing_comments: vec![],
            });
            last_token_line = line;
        }

        // Update line/column
        let newline_count = part.matches('\n').count();
        if newline_count > 0 {
            line += newline_count;
            if let Some(last_line_part) = part.split('\n').last() {
                column = last_line_part.chars().count() + 1;
            }
        } else {
            column += part.chars().count();
        }

        last_end = mat.end();
    }

    if last_end != text.len() {
        return Err(unexpected(&text[last_end..], line, column));
    }

    // Append EOF token
    tokens.push(Token {
        kind: TokenKind::Eof,
        text: "".to_string(),
        line,
        column,
        leading_comments: pending,
        trailing_comments: vec![],
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(input: &str) -> Vec<(TokenKind, String)> {
        tokenize_schema("test.cddl", input)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_tokenize_simple() {
        let got = tokenize_schema("test.cddl", "point = { x: int }").unwrap();
        let positions: Vec<_> = got.iter().map(|t| (t.text.as_str(), t.line, t.column)).collect();
        assert_eq!(
            positions,
            vec![
                ("point", 1, 1),
                ("=", 1, 7),
                ("{", 1, 9),
                ("x", 1, 11),
                (":", 1, 12),
                ("int", 1, 14),
                ("}", 1, 18),
                ("", 1, 19),
            ]
        );
    }

    #[test]
    fn test_tokenize_literals_and_operators() {
        use TokenKind::*;
        assert_eq!(
            texts(r#"a /= 0..255 / -1.5 / "t" / h'00ff' / #6.24(bstr .cbor b) // 0x10"#),
            vec![
                (Ident, "a".into()),
                (Punct, "/=".into()),
                (Int, "0".into()),
                (Range, "..".into()),
                (Int, "255".into()),
                (Punct, "/".into()),
                (Float, "-1.5".into()),
                (Punct, "/".into()),
                (Text, "\"t\"".into()),
                (Punct, "/".into()),
                (Bytes, "h'00ff'".into()),
                (Punct, "/".into()),
                (Tag, "#6.24".into()),
                (Punct, "(".into()),
                (Ident, "bstr".into()),
                (Control, ".cbor".into()),
                (Ident, "b".into()),
                (Punct, ")".into()),
                (Punct, "//".into()),
                (Int, "0x10".into()),
                (Eof, "".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_identifiers() {
        use TokenKind::*;
        assert_eq!(
            texts("$$ext @x tx.body key-hash"),
            vec![
                (Ident, "$$ext".into()),
                (Ident, "@x".into()),
                (Ident, "tx.body".into()),
                (Ident, "key-hash".into()),
                (Eof, "".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_comments() {
        let input = "; detached\n\n; a point\n;   indented\npoint = { ; trailing\n  x: int, ; the x\n}\n";
        let tokens = tokenize_schema("test.cddl", input).unwrap();
        assert_eq!(tokens[0].text, "point");
        assert_eq!(tokens[0].leading_comments, vec!["a point", "  indented"]);
        assert_eq!(tokens[2].text, "{");
        assert_eq!(tokens[2].trailing_comments, vec!["trailing"]);
        assert_eq!(tokens[6].text, ",");
        assert_eq!(tokens[6].trailing_comments, vec!["the x"]);
        assert!(tokens[3].leading_comments.is_empty());
    }

    #[test]
    fn test_tokenize_rejects_garbage() {
        match tokenize_schema("bad.cddl", "a = |") {
            Err(CddlError::SyntaxError { location, .. }) => {
                assert_eq!(location, Location { source: "bad.cddl".into(), line: 1, column: 5 })
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
