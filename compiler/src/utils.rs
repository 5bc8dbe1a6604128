pub fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text))
}

fn is_separator(c: char) -> bool {
    matches!(c, '_' | '-' | '.' | '$' | '@' | '<' | '>' | ',' | ' ' | '/')
}

/// `pair<uint, text>` becomes `PairUintText`, `transaction_body` becomes
/// `TransactionBody`. Casing inside a word is preserved unless the word is
/// fully uppercase.
pub fn to_pascal_case(s: &str) -> String {
    let ident: String = s
        .split(is_separator)
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) if word == word.to_uppercase() => {
                    first.to_uppercase().to_string() + &chars.as_str().to_lowercase()
                }
                Some(first) => first.to_uppercase().to_string() + chars.as_str(),
            }
        })
        .collect();
    match ident.chars().next() {
        Some(first) if first.is_ascii_digit() => format!("V{}", ident),
        None => "Unnamed".to_owned(),
        _ => ident,
    }
}

pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut snake = String::new();
    for i in 0..chars.len() {
        let c = chars[i];
        if is_separator(c) {
            if !snake.is_empty() && !snake.ends_with('_') {
                snake.push('_');
            }
        } else if c.is_uppercase() {
            if i > 0 && !snake.ends_with('_') {
                let prev = chars[i - 1];
                // Insert an underscore if the previous character is not uppercase,
                // or if the next character exists and is lowercase.
                if !prev.is_uppercase() || (i + 1 < chars.len() && chars[i + 1].is_lowercase()) {
                    snake.push('_');
                }
            }
            snake.extend(c.to_lowercase());
        } else {
            snake.push(c);
        }
    }
    let snake = snake.trim_end_matches('_').to_owned();
    match snake.chars().next() {
        Some(first) if first.is_ascii_digit() => format!("f_{}", snake),
        None => "field".to_owned(),
        _ => snake,
    }
}

pub fn escape_rust_keyword(s: &str) -> String {
    let keywords = [
        "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else",
        "enum", "extern", "false", "fn", "for", "if", "impl",
        "in", "let", "loop", "match", "mod", "move", "mut",
        "pub", "ref", "return", "self", "Self", "static",
        "struct", "super", "trait", "true", "type", "unsafe",
        "use", "where", "while", "yield",
    ];
    if keywords.contains(&s) {
        format!("{}_", s)
    } else {
        s.to_string()
    }
}

/// Field name as a Rust identifier.
pub fn field_ident(name: &str) -> String {
    escape_rust_keyword(&to_snake_case(name))
}

/// Appends `2`, `3`, ... to `name` until it is not in `taken`.
pub fn append_number_if_duplicate(taken: &[String], name: String) -> String {
    if !taken.contains(&name) {
        return name;
    }
    (2..)
        .map(|n| format!("{}{}", name, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_pascal_case() {
        assert_eq!(to_pascal_case("point"), "Point");
        assert_eq!(to_pascal_case("transaction_body"), "TransactionBody");
        assert_eq!(to_pascal_case("pair<uint, text>"), "PairUintText");
        assert_eq!(to_pascal_case("$cert"), "Cert");
        assert_eq!(to_pascal_case("HTTP"), "Http");
        assert_eq!(to_pascal_case("addr-v2"), "AddrV2");
        assert_eq!(to_pascal_case("5"), "V5");
    }

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("radius"), "radius");
        assert_eq!(to_snake_case("createdAt"), "created_at");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("key-hash"), "key_hash");
        assert_eq!(to_snake_case("0"), "f_0");
    }

    #[test]
    fn test_field_ident_escapes_keywords() {
        assert_eq!(field_ident("type"), "type_");
        assert_eq!(field_ident("Self"), "self_");
    }

    #[test]
    fn test_append_number_if_duplicate() {
        let taken = vec!["uint".to_owned(), "uint2".to_owned()];
        assert_eq!(append_number_if_duplicate(&taken, "uint".to_owned()), "uint3");
        assert_eq!(append_number_if_duplicate(&taken, "text".to_owned()), "text");
    }
}
