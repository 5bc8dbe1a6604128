use crate::{
    ast::{
        Assign, EntryValue, Group, GroupChoice, GroupEntry, Literal, MemberKey, Occurrence, Operator, Rule, RuleBody,
        SchemaDoc, Type1, Type2, TypeExpr,
    },
    error::{CddlError, Location},
    tokenizer::{tokenize_schema, Token, TokenKind},
    utils::quote,
};

use tracing::debug;

/// Tokenize and parse one schema document.
pub fn parse_document(source: &str, text: &str) -> Result<SchemaDoc, CddlError> {
    let tokens = tokenize_schema(source, text)?;
    let rules = Parser { source, tokens: &tokens, index: 0 }.parse_rules()?;
    debug!(source, rules = rules.len(), "parsed schema document");
    Ok(SchemaDoc { name: source.to_owned(), rules })
}

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    index:  usize,
}

enum EntryHead {
    Key(MemberKey),
    /// No key; the value's first choice.
    Value(Type1),
    /// No key before an inline group.
    Empty,
}

impl<'a> Parser<'a> {
    fn current(&self) -> &'a Token {
        // The tokenizer always ends the stream with an EOF token.
        let last = self.tokens.len() - 1;
        &self.tokens[self.index.min(last)]
    }

    fn peek(&self, offset: usize) -> &'a Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.index + offset).min(last)]
    }

    fn previous(&self) -> &'a Token {
        &self.tokens[self.index.saturating_sub(1)]
    }

    fn at_eof(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn location(&self, token: &Token) -> Location {
        Location { source: self.source.to_owned(), line: token.line, column: token.column }
    }

    fn eat(&mut self, punct: &str) -> bool {
        if self.current().is(punct) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<&'a Token, CddlError> {
        let token = self.current();
        if self.eat(punct) {
            Ok(token)
        } else {
            Err(self.unexpected(&quote(punct)))
        }
    }

    fn expect_kind(&mut self, kind: TokenKind, expected: &str) -> Result<&'a Token, CddlError> {
        let token = self.current();
        if token.kind == kind {
            self.index += 1;
            Ok(token)
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &str) -> CddlError {
        let token = self.current();
        let found = match token.kind {
            TokenKind::Eof => "end of file".to_owned(),
            _ => quote(&token.text),
        };
        CddlError::SyntaxError { location: self.location(token), expected: expected.to_owned(), found }
    }

    /// Does a rule definition (`name =`, `name /=`, `name<T> =`) start at the
    /// current token?
    fn is_rule_start(&self) -> bool {
        if self.current().kind != TokenKind::Ident {
            return false;
        }
        let mut offset = 1;
        if self.peek(offset).is("<") {
            offset += 1;
            loop {
                let token = self.peek(offset);
                if token.is(">") {
                    offset += 1;
                    break;
                }
                if token.kind != TokenKind::Ident && !token.is(",") {
                    return false;
                }
                offset += 1;
            }
        }
        let assign = self.peek(offset);
        assign.is("=") || assign.is("/=") || assign.is("//=")
    }

    fn parse_rules(&mut self) -> Result<Vec<Rule>, CddlError> {
        let mut rules = Vec::new();
        while !self.at_eof() {
            rules.push(self.parse_rule()?);
        }
        Ok(rules)
    }

    fn parse_rule(&mut self) -> Result<Rule, CddlError> {
        if !self.is_rule_start() {
            return Err(self.unexpected("a rule definition"));
        }
        let name_token = self.expect_kind(TokenKind::Ident, "rule name")?;

        let mut generic_params = Vec::new();
        if self.eat("<") {
            loop {
                generic_params.push(self.expect_kind(TokenKind::Ident, "generic parameter")?.text.clone());
                if !self.eat(",") {
                    break;
                }
            }
            self.expect(">")?;
        }

        let assign = if self.eat("=") {
            Assign::Define
        } else if self.eat("/=") {
            Assign::TypeAlternative
        } else {
            self.expect("//=")?;
            Assign::GroupAlternative
        };

        let body = match assign {
            Assign::TypeAlternative => RuleBody::Type(self.parse_type()?),
            Assign::GroupAlternative => RuleBody::Group(self.parse_group(None)?),
            Assign::Define => {
                // A rule is a type unless its body only makes sense as a group.
                let start = self.index;
                match self.parse_type() {
                    Ok(ty) if self.at_eof() || self.is_rule_start() => RuleBody::Type(ty),
                    _ => {
                        self.index = start;
                        RuleBody::Group(self.parse_group(None)?)
                    }
                }
            }
        };

        if !self.at_eof() && !self.is_rule_start() {
            return Err(self.unexpected("a rule definition"));
        }

        let mut comments = name_token.leading_comments.clone();
        comments.extend(name_token.trailing_comments.iter().cloned());
        let last = self.previous();
        if !std::ptr::eq(last, name_token) {
            comments.extend(last.trailing_comments.iter().cloned());
        }

        Ok(Rule {
            name: name_token.text.clone(),
            generic_params,
            assign,
            body,
            comments,
            location: self.location(name_token),
        })
    }

    fn parse_type(&mut self) -> Result<TypeExpr, CddlError> {
        let first = self.parse_type1()?;
        self.parse_type_from(first)
    }

    /// The rest of a type whose first choice is already parsed.
    fn parse_type_from(&mut self, first: Type1) -> Result<TypeExpr, CddlError> {
        let mut choices = vec![first];
        while self.eat("/") {
            choices.push(self.parse_type1()?);
        }
        Ok(TypeExpr { choices })
    }

    fn parse_type1(&mut self) -> Result<Type1, CddlError> {
        let first = self.current();
        let base = self.parse_type2()?;
        let operator = match self.current().kind {
            TokenKind::Range => {
                let inclusive = self.current().text == "..";
                self.index += 1;
                Some(Operator::Range { end: self.parse_type2()?, inclusive })
            }
            TokenKind::Control => {
                let name = self.current().text[1..].to_owned();
                self.index += 1;
                Some(Operator::Control { name, arg: self.parse_type2()? })
            }
            _ => None,
        };
        let mut comments = first.leading_comments.clone();
        comments.extend(self.previous().trailing_comments.iter().cloned());
        Ok(Type1 { base, operator, comments })
    }

    fn parse_generic_args(&mut self) -> Result<Vec<TypeExpr>, CddlError> {
        let mut args = Vec::new();
        if self.eat("<") {
            loop {
                args.push(self.parse_type()?);
                if !self.eat(",") {
                    break;
                }
            }
            self.expect(">")?;
        }
        Ok(args)
    }

    fn parse_type2(&mut self) -> Result<Type2, CddlError> {
        let token = self.current();
        match token.kind {
            TokenKind::Int | TokenKind::Float | TokenKind::Text | TokenKind::Bytes => {
                Ok(Type2::Literal(self.parse_literal()?))
            }
            TokenKind::Ident if token.text.starts_with('$') => {
                self.index += 1;
                Ok(Type2::Socket(token.text.clone()))
            }
            TokenKind::Ident => {
                self.index += 1;
                let args = self.parse_generic_args()?;
                Ok(Type2::TypeRef { name: token.text.clone(), args })
            }
            TokenKind::Tag => {
                self.index += 1;
                let tag = token.text[3..]
                    .parse::<u64>()
                    .map_err(|_| CddlError::SyntaxError {
                        location: self.location(token),
                        expected: "a tag number".to_owned(),
                        found:    quote(&token.text),
                    })?;
                self.expect("(")?;
                let inner = self.parse_type()?;
                self.expect(")")?;
                Ok(Type2::Tagged { tag, inner: Box::new(inner) })
            }
            TokenKind::Hash => {
                self.index += 1;
                Ok(Type2::Any)
            }
            TokenKind::Punct if token.text == "(" => {
                self.index += 1;
                let inner = self.parse_type()?;
                self.expect(")")?;
                Ok(Type2::Paren(Box::new(inner)))
            }
            TokenKind::Punct if token.text == "{" => {
                self.index += 1;
                let group = self.parse_group(Some("}"))?;
                self.expect("}")?;
                Ok(Type2::Map(group))
            }
            TokenKind::Punct if token.text == "[" => {
                self.index += 1;
                let group = self.parse_group(Some("]"))?;
                self.expect("]")?;
                Ok(Type2::Array(group))
            }
            TokenKind::Punct if token.text == "~" => {
                self.index += 1;
                let name = self.expect_kind(TokenKind::Ident, "rule name")?.text.clone();
                let args = self.parse_generic_args()?;
                Ok(Type2::Unwrap { name, args })
            }
            TokenKind::Punct if token.text == "&" => {
                self.index += 1;
                if self.eat("(") {
                    let group = self.parse_group(Some(")"))?;
                    self.expect(")")?;
                    Ok(Type2::ChoiceFromGroup(group))
                } else {
                    let name = self.expect_kind(TokenKind::Ident, "group name")?.text.clone();
                    let args = self.parse_generic_args()?;
                    Ok(Type2::ChoiceFromRule { name, args })
                }
            }
            _ => Err(self.unexpected("a type")),
        }
    }

    fn parse_literal(&mut self) -> Result<Literal, CddlError> {
        let token = self.current();
        let invalid = |what: &str| CddlError::SyntaxError {
            location: self.location(token),
            expected: what.to_owned(),
            found:    quote(&token.text),
        };
        let literal = match token.kind {
            TokenKind::Int => Literal::Int(parse_int(&token.text).ok_or_else(|| invalid("an integer"))?),
            TokenKind::Float => Literal::Float(token.text.parse::<f64>().map_err(|_| invalid("a float"))?),
            TokenKind::Text => {
                Literal::Text(serde_json::from_str::<String>(&token.text).map_err(|_| invalid("a text string"))?)
            }
            TokenKind::Bytes => Literal::Bytes(parse_bytes(&token.text).ok_or_else(|| invalid("a byte string"))?),
            _ => return Err(self.unexpected("a literal")),
        };
        self.index += 1;
        Ok(literal)
    }

    fn at_group_end(&self, closer: Option<&str>) -> bool {
        let token = self.current();
        match closer {
            Some(closer) => token.is(closer) || token.kind == TokenKind::Eof,
            None => self.at_eof() || self.is_rule_start(),
        }
    }

    /// Parses group choices up to (not including) `closer`. Without a closer
    /// the group runs until the next rule.
    fn parse_group(&mut self, closer: Option<&str>) -> Result<Group, CddlError> {
        let mut choices = Vec::new();
        let mut comments = self.previous().trailing_comments.clone();
        loop {
            let mut entries = Vec::new();
            while !self.at_group_end(closer) && !self.current().is("//") {
                entries.push(self.parse_entry(closer)?);
            }
            choices.push(GroupChoice { entries, comments });
            if !self.eat("//") {
                break;
            }
            comments = self.previous().trailing_comments.clone();
        }
        Ok(Group { choices })
    }

    fn parse_occurrence(&mut self) -> Result<Occurrence, CddlError> {
        if self.eat("?") {
            return Ok(Occurrence::OPTIONAL);
        }
        if self.eat("+") {
            return Ok(Occurrence::ONE_OR_MORE);
        }

        let bound = |token: &Token| -> Option<u64> {
            match token.kind {
                TokenKind::Int => parse_int(&token.text).and_then(|v| u64::try_from(v).ok()),
                _ => None,
            }
        };

        let min = match bound(self.current()) {
            Some(min) if self.peek(1).is("*") => {
                self.index += 1;
                min
            }
            _ if self.current().is("*") => 0,
            _ => return Ok(Occurrence::ONE),
        };
        self.expect("*")?;
        let max = match bound(self.current()) {
            // `n*m` only when the bound is not itself the start of the value.
            Some(max) if !self.peek(1).is(":") && !self.peek(1).is("=>") => {
                self.index += 1;
                Some(max)
            }
            _ => None,
        };
        if max.map_or(false, |max| max < min) {
            return Err(self.unexpected("an occurrence with min <= max"));
        }
        Ok(Occurrence { min, max })
    }

    fn parse_entry(&mut self, closer: Option<&str>) -> Result<GroupEntry, CddlError> {
        let first = self.current();
        let location = self.location(first);
        let occurrence = self.parse_occurrence()?;

        let start = self.index;
        let parenthesized = self.current().is("(");
        let (key, value) = match self.parse_entry_head()? {
            EntryHead::Key(key) => (Some(key), EntryValue::Type(self.parse_type()?)),
            EntryHead::Value(type1) if !parenthesized => (None, EntryValue::Type(self.parse_type_from(type1)?)),
            EntryHead::Value(type1) => match self.parse_type_from(type1) {
                Ok(ty) if self.at_entry_end(closer) => (None, EntryValue::Type(ty)),
                _ => {
                    self.index = start;
                    (None, self.parse_inline_group()?)
                }
            },
            EntryHead::Empty => (None, self.parse_inline_group()?),
        };

        if !self.at_entry_end(closer) {
            return Err(self.unexpected("\",\" or the end of the group"));
        }
        self.eat(",");

        let mut comments = first.leading_comments.clone();
        comments.extend(self.previous().trailing_comments.iter().cloned());
        Ok(GroupEntry { occurrence, key, value, comments, location })
    }

    fn parse_inline_group(&mut self) -> Result<EntryValue, CddlError> {
        self.expect("(")?;
        let group = self.parse_group(Some(")"))?;
        self.expect(")")?;
        Ok(EntryValue::InlineGroup(group))
    }

    fn at_entry_end(&self, closer: Option<&str>) -> bool {
        self.current().is(",") || self.current().is("//") || self.at_group_end(closer)
    }

    /// Reads a member key. A type1 that is not followed by `=>` is handed
    /// back as the start of the value so it is only parsed once.
    fn parse_entry_head(&mut self) -> Result<EntryHead, CddlError> {
        let token = self.current();
        if self.peek(1).is(":") {
            match token.kind {
                TokenKind::Ident => {
                    self.index += 2;
                    return Ok(EntryHead::Key(MemberKey::Bareword(token.text.clone())));
                }
                TokenKind::Int | TokenKind::Float | TokenKind::Text | TokenKind::Bytes => {
                    let literal = self.parse_literal()?;
                    self.expect(":")?;
                    return Ok(EntryHead::Key(MemberKey::Literal(literal)));
                }
                _ => {}
            }
        }

        // `type1 [^] =>`, otherwise the type1 starts the value.
        let start = self.index;
        let type1 = match self.parse_type1() {
            Ok(type1) => type1,
            // `(` may open an inline group rather than a type.
            Err(_) if token.is("(") => {
                self.index = start;
                return Ok(EntryHead::Empty);
            }
            Err(e) => return Err(e),
        };
        let before_cut = self.index;
        let cut = self.eat("^");
        if self.eat("=>") {
            return Ok(EntryHead::Key(MemberKey::Type { key: Box::new(type1), cut }));
        }
        self.index = before_cut;
        Ok(EntryHead::Value(type1))
    }
}

fn parse_int(text: &str) -> Option<i128> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = match digits.strip_prefix("0x") {
        Some(hex) => i128::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i128>().ok()?,
    };
    Some(if negative { -value } else { value })
}

fn parse_bytes(text: &str) -> Option<Vec<u8>> {
    match text.strip_prefix('h') {
        Some(quoted) => {
            let hex: Vec<char> = quoted.trim_matches('\'').chars().filter(|c| !c.is_whitespace()).collect();
            if hex.len() % 2 != 0 {
                return None;
            }
            hex.chunks(2)
                .map(|pair| u8::from_str_radix(&pair.iter().collect::<String>(), 16).ok())
                .collect()
        }
        None => Some(text.trim_matches('\'').replace("\\'", "'").into_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Vec<Rule> {
        parse_document("test.cddl", text).unwrap().rules
    }

    fn type_ref(name: &str) -> Type2 {
        Type2::TypeRef { name: name.to_owned(), args: vec![] }
    }

    #[test]
    fn test_parse_map_record() {
        let rules = parse("point = { x: int, y: int }");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "point");
        assert_eq!(rules[0].assign, Assign::Define);
        let RuleBody::Type(ty) = &rules[0].body else { panic!("expected a type rule") };
        let Type2::Map(group) = &ty.choices[0].base else { panic!("expected a map") };
        let entries = &group.choices[0].entries;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, Some(MemberKey::Bareword("x".into())));
        assert_eq!(entries[0].value, EntryValue::Type(TypeExpr::single(type_ref("int"))));
        assert_eq!(entries[1].occurrence, Occurrence::ONE);
    }

    #[test]
    fn test_parse_choices_and_ranges() {
        let rules = parse("shape = circle / square\nsmall = 0..255\nneg = -10...-1\nsized = bstr .size 32");
        let RuleBody::Type(shape) = &rules[0].body else { panic!() };
        assert_eq!(shape.choices.len(), 2);
        assert_eq!(shape.choices[1].base, type_ref("square"));

        let RuleBody::Type(small) = &rules[1].body else { panic!() };
        assert_eq!(small.choices[0].base, Type2::Literal(Literal::Int(0)));
        assert_eq!(
            small.choices[0].operator,
            Some(Operator::Range { end: Type2::Literal(Literal::Int(255)), inclusive: true })
        );

        let RuleBody::Type(neg) = &rules[2].body else { panic!() };
        assert_eq!(
            neg.choices[0].operator,
            Some(Operator::Range { end: Type2::Literal(Literal::Int(-1)), inclusive: false })
        );

        let RuleBody::Type(sized) = &rules[3].body else { panic!() };
        assert_eq!(
            sized.choices[0].operator,
            Some(Operator::Control { name: "size".into(), arg: Type2::Literal(Literal::Int(32)) })
        );
    }

    #[test]
    fn test_parse_occurrences_and_keys() {
        let rules = parse(r#"r = { ? 0: uint, * tstr => any, "k": bytes, 1*3 "a" => int, + x: [2*2 uint] }"#);
        let RuleBody::Type(ty) = &rules[0].body else { panic!() };
        let Type2::Map(group) = &ty.choices[0].base else { panic!() };
        let entries = &group.choices[0].entries;
        assert_eq!(entries[0].occurrence, Occurrence::OPTIONAL);
        assert_eq!(entries[0].key, Some(MemberKey::Literal(Literal::Int(0))));
        assert_eq!(entries[1].occurrence, Occurrence::ZERO_OR_MORE);
        assert!(matches!(&entries[1].key, Some(MemberKey::Type { cut: false, .. })));
        assert_eq!(entries[2].key, Some(MemberKey::Literal(Literal::Text("k".into()))));
        assert_eq!(entries[3].occurrence, Occurrence { min: 1, max: Some(3) });
        assert_eq!(entries[4].occurrence, Occurrence::ONE_OR_MORE);
        let EntryValue::Type(array) = &entries[4].value else { panic!() };
        let Type2::Array(inner) = &array.choices[0].base else { panic!() };
        assert_eq!(inner.choices[0].entries[0].occurrence, Occurrence { min: 2, max: Some(2) });
    }

    #[test]
    fn test_parse_group_rules() {
        let rules = parse("header = (id: uint, name: tstr)\nbare = a: uint, b: tstr\nmsg = [header, body: bytes]");
        assert!(matches!(rules[0].body, RuleBody::Group(_)));
        let RuleBody::Group(bare) = &rules[1].body else { panic!() };
        assert_eq!(bare.choices[0].entries.len(), 2);
        assert!(matches!(rules[2].body, RuleBody::Type(_)));
    }

    #[test]
    fn test_parse_generics_and_sockets() {
        let rules = parse("pair<a, b> = [a, b]\nuse = pair<uint, tstr>\n$ext /= uint\n$$grp //= (x: int)\nopen = { $$grp }");
        assert_eq!(rules[0].generic_params, vec!["a", "b"]);
        let RuleBody::Type(ty) = &rules[1].body else { panic!() };
        let Type2::TypeRef { name, args } = &ty.choices[0].base else { panic!() };
        assert_eq!(name, "pair");
        assert_eq!(args.len(), 2);
        assert_eq!(rules[2].assign, Assign::TypeAlternative);
        assert_eq!(rules[3].assign, Assign::GroupAlternative);
        let RuleBody::Type(open) = &rules[4].body else { panic!() };
        let Type2::Map(group) = &open.choices[0].base else { panic!() };
        assert_eq!(group.choices[0].entries[0].value, EntryValue::Type(TypeExpr::single(Type2::Socket("$$grp".into()))));
    }

    #[test]
    fn test_parse_tags_and_literals() {
        let rules = parse("t = #6.30([uint, tstr])\nb = h'0a0b' / 'ab' / \"x\\\"y\" / 0x10 / 1.5 / #");
        let RuleBody::Type(t) = &rules[0].body else { panic!() };
        assert!(matches!(t.choices[0].base, Type2::Tagged { tag: 30, .. }));
        let RuleBody::Type(b) = &rules[1].body else { panic!() };
        let bases: Vec<_> = b.choices.iter().map(|c| c.base.clone()).collect();
        assert_eq!(
            bases,
            vec![
                Type2::Literal(Literal::Bytes(vec![0x0a, 0x0b])),
                Type2::Literal(Literal::Bytes(b"ab".to_vec())),
                Type2::Literal(Literal::Text("x\"y".into())),
                Type2::Literal(Literal::Int(16)),
                Type2::Literal(Literal::Float(1.5)),
                Type2::Any,
            ]
        );
    }

    #[test]
    fn test_parse_group_choices() {
        let rules = parse("cert = [ ; @name reg\n 0, uint //  ; @name dereg\n 1, tstr ]");
        let RuleBody::Type(ty) = &rules[0].body else { panic!() };
        let Type2::Array(group) = &ty.choices[0].base else { panic!() };
        assert_eq!(group.choices.len(), 2);
        assert_eq!(group.choices[0].comments, vec!["@name reg"]);
        assert_eq!(group.choices[1].comments, vec!["@name dereg"]);
        assert_eq!(group.choices[1].entries.len(), 2);
    }

    #[test]
    fn test_parse_captures_comments() {
        let text = "; A point on the plane.\n; @newtype\npoint = {\n  x: int, ; horizontal\n  ; vertical\n  y: int,\n} ; end\n";
        let rules = parse(text);
        assert_eq!(rules[0].comments, vec!["A point on the plane.", "@newtype", "end"]);
        let RuleBody::Type(ty) = &rules[0].body else { panic!() };
        let Type2::Map(group) = &ty.choices[0].base else { panic!() };
        assert_eq!(group.choices[0].entries[0].comments, vec!["horizontal"]);
        assert_eq!(group.choices[0].entries[1].comments, vec!["vertical"]);
    }

    #[test]
    fn test_parse_deeply_nested_entries() {
        let depth = 48;
        let text = format!("deep = {}uint{}", "[".repeat(depth), "]".repeat(depth));
        let rules = parse(&text);
        let RuleBody::Type(mut ty) = rules[0].body.clone() else { panic!() };
        let mut levels = 0;
        while let Type2::Array(group) = &ty.choices[0].base {
            let EntryValue::Type(inner) = &group.choices[0].entries[0].value else { panic!() };
            ty = inner.clone();
            levels += 1;
        }
        assert_eq!(levels, depth);
        assert_eq!(ty.choices[0].base, type_ref("uint"));

        let text = format!("deep = {{ {}a: uint{} }}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(parse(&text).len(), 1);

        let rules = parse("r = [ tstr / uint, (x: int), (uint) ]");
        let RuleBody::Type(ty) = &rules[0].body else { panic!() };
        let Type2::Array(group) = &ty.choices[0].base else { panic!() };
        let entries = &group.choices[0].entries;
        assert!(matches!(&entries[0].value, EntryValue::Type(t) if t.choices.len() == 2));
        assert!(matches!(entries[1].value, EntryValue::InlineGroup(_)));
        assert!(matches!(&entries[2].value, EntryValue::Type(t) if matches!(t.choices[0].base, Type2::Paren(_))));
    }

    #[test]
    fn test_parse_syntax_errors() {
        let err = parse_document("bad.cddl", "point = { x: }").unwrap_err();
        match err {
            CddlError::SyntaxError { location, expected, found } => {
                assert_eq!(location.line, 1);
                assert_eq!(location.column, 14);
                assert_eq!(expected, "a type");
                assert_eq!(found, "\"}\"");
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(parse_document("bad.cddl", "point").is_err());
        assert!(parse_document("bad.cddl", "a = [uint").is_err());
        assert!(parse_document("bad.cddl", "a = uint uint").is_err());
    }
}
