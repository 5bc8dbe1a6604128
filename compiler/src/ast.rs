use serde::Serialize;

use crate::error::Location;

/// One parsed schema document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaDoc {
    pub name:  String,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Assign {
    /// `=`
    Define,
    /// `/=`, adds type alternatives (plugs into a `$socket`).
    TypeAlternative,
    /// `//=`, adds group alternatives (plugs into a `$$socket`).
    GroupAlternative,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RuleBody {
    Type(TypeExpr),
    Group(Group),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub name:           String,
    pub generic_params: Vec<String>,
    pub assign:         Assign,
    pub body:           RuleBody,
    /// Verbatim comment lines attached to the rule.
    pub comments:       Vec<String>,
    pub location:       Location,
}

/// `type1 / type1 / ...`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeExpr {
    pub choices: Vec<Type1>,
}

impl TypeExpr {
    pub fn single(base: Type2) -> TypeExpr {
        TypeExpr { choices: vec![Type1 { base, operator: None, comments: vec![] }] }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Type1 {
    pub base:     Type2,
    pub operator: Option<Operator>,
    pub comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Operator {
    /// `a..b` (inclusive) or `a...b` (exclusive).
    Range { end: Type2, inclusive: bool },
    /// `.size`, `.cbor`, `.le`, ...
    Control { name: String, arg: Type2 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Type2 {
    Literal(Literal),
    TypeRef { name: String, args: Vec<TypeExpr> },
    /// `$name` or `$$name`.
    Socket(String),
    Paren(Box<TypeExpr>),
    Map(Group),
    Array(Group),
    Tagged { tag: u64, inner: Box<TypeExpr> },
    /// `~name`
    Unwrap { name: String, args: Vec<TypeExpr> },
    /// `&( group )`
    ChoiceFromGroup(Group),
    /// `&name`
    ChoiceFromRule { name: String, args: Vec<TypeExpr> },
    /// `#`
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    Int(i128),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

/// `choice // choice // ...`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub choices: Vec<GroupChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupChoice {
    pub entries:  Vec<GroupEntry>,
    pub comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupEntry {
    pub occurrence: Occurrence,
    pub key:        Option<MemberKey>,
    pub value:      EntryValue,
    pub comments:   Vec<String>,
    pub location:   Location,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EntryValue {
    Type(TypeExpr),
    /// `( group )` spliced into the enclosing group.
    InlineGroup(Group),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MemberKey {
    /// `name:`, always a text key.
    Bareword(String),
    /// `"name":` or `0:`
    Literal(Literal),
    /// `type =>` or `type ^ =>`
    Type { key: Box<Type1>, cut: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Occurrence {
    pub min: u64,
    pub max: Option<u64>,
}

impl Occurrence {
    pub const ONE: Occurrence = Occurrence { min: 1, max: Some(1) };
    pub const OPTIONAL: Occurrence = Occurrence { min: 0, max: Some(1) };
    pub const ZERO_OR_MORE: Occurrence = Occurrence { min: 0, max: None };
    pub const ONE_OR_MORE: Occurrence = Occurrence { min: 1, max: None };

    pub fn is_one(&self) -> bool {
        *self == Occurrence::ONE
    }

    pub fn is_optional(&self) -> bool {
        *self == Occurrence::OPTIONAL
    }

    /// Anything that may appear more than once.
    pub fn is_repeated(&self) -> bool {
        self.max != Some(1) && self.max != Some(0)
    }
}
