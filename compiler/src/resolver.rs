//! Turns parsed documents into the closed type graph.
//!
//! Resolution happens in two passes. The first pass collects every rule of
//! every document, merging `/=` and `//=` alternatives (socket plugs) onto
//! their rule in declaration order. The second pass resolves lazily from the
//! roots, memoizing on `(rule, args)` so each generic instantiation becomes
//! exactly one node, and recording a back-reference whenever it meets a node
//! that is still being built.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    ast::{
        Assign, EntryValue, Group, GroupChoice, GroupEntry, Literal, MemberKey, Operator, RuleBody, SchemaDoc, Type1,
        Type2, TypeExpr,
    },
    comments::RuleMetadata,
    error::{CddlError, Location},
    types::{
        BackReference, Bounds, Field, FixedValue, GenericInstantiation, Occurrence, Primitive, Record, ResolvedType,
        Shape, TypeGraph, TypeRef, Variant,
    },
    utils::{append_number_if_duplicate, field_ident, quote, to_pascal_case, to_snake_case},
    verifier::{verify_graph, RESERVED_NAMES},
};

/// Nesting limit for group splicing, which only recursive groups exceed.
const MAX_SPLICE_DEPTH: usize = 64;

/// Instantiations of one generic rule that may be under construction at once.
/// Deeper nesting means the rule instantiates itself with ever larger arguments.
const MAX_GENERIC_DEPTH: usize = 16;

type Env = HashMap<String, TypeRef>;

struct RuleDef<'a> {
    name:           &'a str,
    generic_params: &'a [String],
    bodies:         Vec<&'a RuleBody>,
    defined:        bool,
    is_group:       bool,
    comments:       Vec<String>,
    location:       &'a Location,
}

/// The rule being resolved and the bindings of its generic parameters.
struct Scope<'s> {
    rule: &'s str,
    env:  &'s Env,
}

/// A group entry after splicing, with the scope it has to be resolved in.
struct FlatEntry<'a> {
    entry:      &'a GroupEntry,
    occurrence: Occurrence,
    rule:       String,
    env:        Env,
}

struct Splice<'a> {
    choices: Vec<&'a GroupChoice>,
    rule:    String,
    env:     Env,
}

/// A type with bounds that do not line up with a native width needs a
/// wrapper node.
enum Constrained {
    Ref(TypeRef),
    Bounded(Primitive, Bounds),
}

/// Build, verify and return the type graph for `docs`. With no `roots`
/// every non-generic type rule is a root.
pub fn build_graph(docs: &[SchemaDoc], roots: &[String]) -> Result<TypeGraph, CddlError> {
    let mut builder = GraphBuilder::new(docs)?;
    let roots = builder.resolve_roots(roots)?;
    let mut graph = TypeGraph {
        types: builder.types,
        roots,
        back_references: builder.back_references,
        instantiations: builder.instantiations,
        components: HashMap::new(),
    };
    verify_graph(&mut graph)?;
    debug!(types = graph.len(), back_references = graph.back_references.len(), "built type graph");
    Ok(graph)
}

pub struct GraphBuilder<'a> {
    rules:           IndexMap<&'a str, RuleDef<'a>>,
    types:           IndexMap<String, ResolvedType>,
    memo:            HashMap<GenericInstantiation, String>,
    instantiations:  Vec<(GenericInstantiation, String)>,
    idents:          HashMap<String, String>,
    taken_idents:    HashSet<String>,
    in_progress:     Vec<String>,
    back_references: Vec<BackReference>,
    inline_choices:  HashMap<Vec<TypeRef>, String>,
}

impl<'a> GraphBuilder<'a> {
    /// Pass 1: collect rules across all documents.
    pub fn new(docs: &'a [SchemaDoc]) -> Result<GraphBuilder<'a>, CddlError> {
        let mut rules: IndexMap<&'a str, RuleDef<'a>> = IndexMap::new();

        for doc in docs {
            for rule in &doc.rules {
                let def = rules.entry(rule.name.as_str()).or_insert_with(|| RuleDef {
                    name:           rule.name.as_str(),
                    generic_params: &[],
                    bodies:         vec![],
                    defined:        false,
                    is_group:       false,
                    comments:       vec![],
                    location:       &rule.location,
                });
                match rule.assign {
                    Assign::Define => {
                        if def.defined {
                            return Err(CddlError::VerifierError(format!(
                                "The rule {} is defined twice (again at {})",
                                quote(&rule.name),
                                rule.location
                            )));
                        }
                        def.defined = true;
                        def.generic_params = &rule.generic_params;
                        // The definition comes first, plugs follow in declaration order.
                        def.bodies.insert(0, &rule.body);
                        def.is_group = def.is_group || matches!(rule.body, RuleBody::Group(_));
                        let mut comments = rule.comments.clone();
                        comments.append(&mut def.comments);
                        def.comments = comments;
                    }
                    Assign::TypeAlternative => {
                        def.bodies.push(&rule.body);
                        def.comments.extend(rule.comments.iter().cloned());
                    }
                    Assign::GroupAlternative => {
                        def.bodies.push(&rule.body);
                        def.is_group = true;
                        def.comments.extend(rule.comments.iter().cloned());
                    }
                }
            }
        }

        let taken_idents = rules
            .values()
            .filter(|rule| rule.generic_params.is_empty() && !rule.is_group)
            .map(|rule| to_pascal_case(rule.name))
            .chain(RESERVED_NAMES.iter().map(|name| name.to_string()))
            .collect();

        Ok(GraphBuilder {
            rules,
            types: IndexMap::new(),
            memo: HashMap::new(),
            instantiations: vec![],
            idents: HashMap::new(),
            taken_idents,
            in_progress: vec![],
            back_references: vec![],
            inline_choices: HashMap::new(),
        })
    }

    /// Pass 2: resolve from the roots. Returns the roots' stable names.
    pub fn resolve_roots(&mut self, roots: &[String]) -> Result<Vec<String>, CddlError> {
        let names: Vec<&str> = if roots.is_empty() {
            self.rules
                .values()
                .filter(|rule| rule.generic_params.is_empty() && !rule.is_group)
                .map(|rule| rule.name)
                .collect()
        } else {
            roots.iter().map(String::as_str).collect()
        };

        let mut resolved = Vec::new();
        for name in names {
            match self.resolve_rule(name, vec![], "<roots>")? {
                TypeRef::Named(stable) => resolved.push(stable),
                _ => return Err(CddlError::unsupported(name, "a root must be a rule")),
            }
        }
        Ok(resolved)
    }

    fn reserve_ident(&mut self, base: String) -> String {
        let ident = if self.taken_idents.contains(&base) {
            (2..)
                .map(|n| format!("{}{}", base, n))
                .find(|candidate| !self.taken_idents.contains(candidate))
                .unwrap_or(base)
        } else {
            base
        };
        self.taken_idents.insert(ident.clone());
        ident
    }

    fn is_group_rule(&self, name: &str) -> bool {
        self.rules.get(name).map_or(false, |rule| rule.is_group)
    }

    /// Name fragment for a reference, used to derive identifiers.
    fn label(&self, ty: &TypeRef) -> String {
        match ty {
            TypeRef::Primitive(p) => p.schema_name().to_owned(),
            TypeRef::Fixed(value) => value.label(),
            TypeRef::Named(name) => self.idents.get(name).cloned().unwrap_or_else(|| name.clone()),
            TypeRef::Optional(inner) => format!("opt_{}", self.label(inner)),
            TypeRef::Array { element, .. } => format!("{}_list", self.label(element)),
            TypeRef::Map { key, value } => format!("{}_to_{}", self.label(key), self.label(value)),
            TypeRef::Tagged { tag, inner } => format!("tagged{}_{}", tag, self.label(inner)),
            TypeRef::CborBytes(inner) => format!("cbor_{}", self.label(inner)),
        }
    }

    fn insert_node(&mut self, ident: String, shape: Shape, tag: Option<u64>, doc: Option<String>) -> TypeRef {
        debug!(name = %ident, shape = shape.kind(), "resolved inline type");
        self.idents.insert(ident.clone(), ident.clone());
        self.types.insert(
            ident.clone(),
            ResolvedType { name: ident.clone(), ident: ident.clone(), shape, tag, doc, instance_of: None, recursive: false },
        );
        TypeRef::Named(ident)
    }

    /// Resolve a reference to rule `name` with already-resolved `args`.
    fn resolve_rule(&mut self, name: &str, args: Vec<TypeRef>, from_rule: &str) -> Result<TypeRef, CddlError> {
        let (params, bodies, comments, location) = match self.rules.get(name) {
            Some(rule) if rule.is_group => {
                return Err(CddlError::unsupported(from_rule, format!("group {} is used as a type", name)))
            }
            Some(rule) => (rule.generic_params, rule.bodies.clone(), rule.comments.clone(), rule.location),
            None => {
                return Err(CddlError::UnresolvedReference { name: name.to_owned(), rule: from_rule.to_owned() })
            }
        };
        if params.len() != args.len() {
            return Err(CddlError::GenericArityMismatch {
                rule:     name.to_owned(),
                expected: params.len(),
                found:    args.len(),
            });
        }

        let key = GenericInstantiation { rule: name.to_owned(), args };
        if let Some(stable) = self.memo.get(&key) {
            if self.in_progress.contains(stable) {
                let from = self.in_progress.last().cloned().unwrap_or_default();
                debug!(from = %from, to = %stable, "recorded back-reference");
                self.back_references.push(BackReference { from, to: stable.clone() });
            }
            return Ok(TypeRef::Named(stable.clone()));
        }

        let prefix = format!("{}<", name);
        if !key.args.is_empty() && self.in_progress.iter().filter(|n| n.starts_with(&prefix)).count() >= MAX_GENERIC_DEPTH {
            return Err(CddlError::unsupported(
                name,
                format!(
                    "generic rule defined at {} instantiates itself more than {} levels deep",
                    location, MAX_GENERIC_DEPTH
                ),
            ));
        }

        let stable = if key.args.is_empty() {
            name.to_owned()
        } else {
            let labels: Vec<String> = key.args.iter().map(|arg| self.label(arg)).collect();
            format!("{}<{}>", name, labels.join(", "))
        };
        let ident = to_pascal_case(&stable);
        self.taken_idents.insert(ident.clone());
        self.idents.insert(stable.clone(), ident.clone());
        self.memo.insert(key.clone(), stable.clone());
        if !key.args.is_empty() {
            self.instantiations.push((key.clone(), stable.clone()));
        }

        self.in_progress.push(stable.clone());
        let env: Env = params.iter().cloned().zip(key.args.iter().cloned()).collect();
        let result = self.build_rule(name, &ident, &bodies, &comments, &env);
        self.in_progress.pop();
        let (shape, tag, doc) = result?;

        debug!(name = %stable, shape = shape.kind(), "resolved rule");
        self.types.insert(
            stable.clone(),
            ResolvedType {
                name: stable.clone(),
                ident,
                shape,
                tag,
                doc,
                instance_of: if key.args.is_empty() { None } else { Some(key) },
                recursive: false,
            },
        );
        Ok(TypeRef::Named(stable))
    }

    fn build_rule(
        &mut self,
        name: &str,
        ident: &str,
        bodies: &[&'a RuleBody],
        comments: &[String],
        env: &Env,
    ) -> Result<(Shape, Option<u64>, Option<String>), CddlError> {
        let scope = Scope { rule: name, env };
        let meta = RuleMetadata::from_comments(comments);

        let mut exprs: Vec<&'a TypeExpr> = Vec::new();
        for body in bodies.iter().copied() {
            match body {
                RuleBody::Type(expr) => exprs.push(expr),
                RuleBody::Group(_) => return Err(CddlError::unsupported(name, "mixes type and group alternatives")),
            }
        }

        let (shape, tag) = match exprs.as_slice() {
            [] => return Err(CddlError::unsupported(name, "rule has no definition")),
            [expr] if !name.starts_with('$') => self.type_expr_shape(&scope, *expr, ident, &meta)?,
            _ => {
                // Sockets and extended rules are always choices.
                let choices: Vec<&'a Type1> = exprs.iter().copied().flat_map(|expr| expr.choices.iter()).collect();
                (self.choice_shape(&scope, &choices, ident)?, None)
            }
        };
        Ok((shape, tag, meta.doc_text()))
    }

    fn nullable<'e>(&self, expr: &'e TypeExpr) -> Option<&'e Type1> {
        let is_null = |t: &Type1| {
            t.operator.is_none()
                && matches!(&t.base, Type2::TypeRef { name, args }
                    if args.is_empty() && (name == "null" || name == "nil") && !self.rules.contains_key(name.as_str()))
        };
        match expr.choices.as_slice() {
            [a, b] if is_null(b) && !is_null(a) => Some(a),
            [a, b] if is_null(a) && !is_null(b) => Some(b),
            _ => None,
        }
    }

    /// Shape of a rule defined as `expr`.
    fn type_expr_shape(
        &mut self,
        scope: &Scope,
        expr: &'a TypeExpr,
        ident: &str,
        meta: &RuleMetadata,
    ) -> Result<(Shape, Option<u64>), CddlError> {
        if expr.choices.len() > 1 {
            if let Some(inner) = self.nullable(expr) {
                let inner = self.type1_ref(scope, inner, &format!("{}Value", ident))?;
                return Ok((Shape::Alias(TypeRef::Optional(Box::new(inner))), None));
            }
            let choices: Vec<&'a Type1> = expr.choices.iter().collect();
            return Ok((self.choice_shape(scope, &choices, ident)?, None));
        }

        let type1 = &expr.choices[0];
        if type1.operator.is_none() {
            match &type1.base {
                Type2::Map(group) => return Ok((self.structure_shape(scope, group, ident, true)?, None)),
                Type2::Array(group) => return Ok((self.structure_shape(scope, group, ident, false)?, None)),
                Type2::Paren(inner) => return self.type_expr_shape(scope, inner, ident, meta),
                Type2::Tagged { tag, inner } if is_structure(inner) => {
                    let (shape, _) = self.type_expr_shape(scope, inner, ident, meta)?;
                    return Ok((shape, Some(*tag)));
                }
                Type2::ChoiceFromGroup(group) => {
                    let choices: Vec<&'a GroupChoice> = group.choices.iter().collect();
                    let splice = Splice { choices, rule: scope.rule.to_owned(), env: scope.env.clone() };
                    return Ok((self.enum_from_group(splice)?, None));
                }
                Type2::ChoiceFromRule { name, args } => {
                    let splice = self.group_rule_splice(scope, name, args)?;
                    return Ok((self.enum_from_group(splice)?, None));
                }
                _ => {}
            }
        }

        Ok(match self.constrained(scope, type1, ident)? {
            Constrained::Bounded(primitive, bounds) => {
                (Shape::Wrapper { inner: TypeRef::Primitive(primitive), bounds }, None)
            }
            Constrained::Ref(ty) if meta.is_newtype => (Shape::Wrapper { inner: ty, bounds: Bounds::default() }, None),
            Constrained::Ref(ty) => (Shape::Alias(ty), None),
        })
    }

    fn choice_shape(&mut self, scope: &Scope, choices: &[&'a Type1], ident: &str) -> Result<Shape, CddlError> {
        let mut variants = Vec::new();
        let mut taken: Vec<String> = Vec::new();
        for (i, type1) in choices.iter().copied().enumerate() {
            let meta = RuleMetadata::from_comments(&type1.comments);
            let hint = meta.name.as_deref().map(to_pascal_case).unwrap_or_else(|| format!("{}{}", ident, i));
            let ty = self.type1_ref(scope, type1, &hint)?;
            let name = match &meta.name {
                Some(name) => to_pascal_case(name),
                None => to_pascal_case(&self.label(&ty)),
            };
            let name = append_number_if_duplicate(&taken, name);
            taken.push(name.clone());
            variants.push(Variant { name, ty, doc: meta.doc_text() });
        }
        Ok(Shape::Choice { variants })
    }

    fn type_expr_ref(&mut self, scope: &Scope, expr: &'a TypeExpr, hint: &str) -> Result<TypeRef, CddlError> {
        if expr.choices.len() == 1 {
            return self.type1_ref(scope, &expr.choices[0], hint);
        }
        if let Some(inner) = self.nullable(expr) {
            return Ok(TypeRef::Optional(Box::new(self.type1_ref(scope, inner, hint)?)));
        }

        let mut refs = Vec::new();
        for (i, type1) in expr.choices.iter().enumerate() {
            refs.push(self.type1_ref(scope, type1, &format!("{}{}", hint, i))?);
        }
        if let Some(existing) = self.inline_choices.get(&refs) {
            return Ok(TypeRef::Named(existing.clone()));
        }

        let meta = RuleMetadata::from_comments(&expr.choices[0].comments);
        let base = match &meta.name {
            Some(name) => to_pascal_case(name),
            None => {
                let labels: Vec<String> = refs.iter().map(|r| self.label(r)).collect();
                to_pascal_case(&labels.join("_or_"))
            }
        };
        let ident = self.reserve_ident(base);

        let mut variants = Vec::new();
        let mut taken: Vec<String> = Vec::new();
        for (type1, ty) in expr.choices.iter().zip(refs.iter()) {
            let variant_meta = RuleMetadata::from_comments(&type1.comments);
            let name = to_pascal_case(&self.label(ty));
            let name = append_number_if_duplicate(&taken, name);
            taken.push(name.clone());
            variants.push(Variant { name, ty: ty.clone(), doc: variant_meta.doc_text() });
        }

        let node = self.insert_node(ident.clone(), Shape::Choice { variants }, None, None);
        self.inline_choices.insert(refs, ident);
        Ok(node)
    }

    fn type1_ref(&mut self, scope: &Scope, type1: &'a Type1, hint: &str) -> Result<TypeRef, CddlError> {
        match self.constrained(scope, type1, hint)? {
            Constrained::Ref(ty) => Ok(ty),
            Constrained::Bounded(primitive, bounds) => {
                let meta = RuleMetadata::from_comments(&type1.comments);
                let ident = self.reserve_ident(meta.name.as_deref().map(to_pascal_case).unwrap_or_else(|| hint.to_owned()));
                Ok(self.insert_node(ident, Shape::Wrapper { inner: TypeRef::Primitive(primitive), bounds }, None, None))
            }
        }
    }

    fn constrained(&mut self, scope: &Scope, type1: &'a Type1, hint: &str) -> Result<Constrained, CddlError> {
        match &type1.operator {
            None => Ok(Constrained::Ref(self.type2_ref(scope, &type1.base, hint, &type1.comments)?)),
            Some(Operator::Range { end, inclusive }) => {
                let lo = self.int_literal(scope, &type1.base)?;
                let hi = self.int_literal(scope, end)?;
                let hi = exclusive_end(scope, hi, *inclusive)?;
                int_range(scope, lo, hi)
            }
            Some(Operator::Control { name, arg }) => self.control(scope, &type1.base, name, arg, hint),
        }
    }

    fn control(
        &mut self,
        scope: &Scope,
        base: &'a Type2,
        name: &str,
        arg: &'a Type2,
        hint: &str,
    ) -> Result<Constrained, CddlError> {
        let base_ref = self.type2_ref(scope, base, hint, &[])?;
        let primitive = self.primitive_of(&base_ref);

        match (name, primitive) {
            ("cbor", Some(Primitive::Bytes)) => {
                let inner = self.type2_ref(scope, arg, &format!("{}Inner", hint), &[])?;
                Ok(Constrained::Ref(TypeRef::CborBytes(Box::new(inner))))
            }
            ("size", Some(p @ (Primitive::Text | Primitive::Bytes))) => {
                let (min, max) = self.size_bounds(scope, arg)?;
                Ok(Constrained::Bounded(p, Bounds { min: Some(min), max: Some(max) }))
            }
            ("size", Some(Primitive::U64)) => {
                let bytes = self.int_literal(scope, arg)?;
                if !(1..=8).contains(&bytes) {
                    return Err(CddlError::unsupported(scope.rule, format!("uint .size {}", bytes)));
                }
                int_range(scope, 0, (1i128 << (8 * bytes)) - 1)
            }
            ("size", Some(Primitive::I64)) => {
                let bytes = self.int_literal(scope, arg)?;
                if !(1..=8).contains(&bytes) {
                    return Err(CddlError::unsupported(scope.rule, format!("int .size {}", bytes)));
                }
                let half = 1i128 << (8 * bytes - 1);
                int_range(scope, -half, half - 1)
            }
            ("le" | "lt" | "ge" | "gt", Some(p)) if p.is_integer() => {
                let (mut lo, mut hi) = p.int_bounds().unwrap_or((0, 0));
                let value = self.int_literal(scope, arg)?;
                match name {
                    "le" => hi = hi.min(value),
                    "lt" => hi = hi.min(step(scope, value, -1, name)?),
                    "ge" => lo = lo.max(value),
                    _ => lo = lo.max(step(scope, value, 1, name)?),
                }
                int_range(scope, lo, hi)
            }
            ("eq", _) => match arg {
                Type2::Literal(literal) => Ok(Constrained::Ref(TypeRef::Fixed(fixed(scope, literal)?))),
                _ => Err(CddlError::unsupported(scope.rule, ".eq needs a literal")),
            },
            ("default", _) => Ok(Constrained::Ref(base_ref)),
            _ => Err(CddlError::unsupported(scope.rule, format!("control operator .{} on {}", name, self.label(&base_ref)))),
        }
    }

    fn size_bounds(&mut self, scope: &Scope, arg: &'a Type2) -> Result<(i128, i128), CddlError> {
        if let Type2::Paren(inner) = arg {
            if let [Type1 { base, operator: Some(Operator::Range { end, inclusive }), .. }] = inner.choices.as_slice() {
                let lo = self.int_literal(scope, base)?;
                let hi = self.int_literal(scope, end)?;
                return Ok((lo, exclusive_end(scope, hi, *inclusive)?));
            }
        }
        let exact = self.int_literal(scope, arg)?;
        Ok((exact, exact))
    }

    /// An integer literal, or a rule defined as one.
    fn int_literal(&self, scope: &Scope, t2: &Type2) -> Result<i128, CddlError> {
        match t2 {
            Type2::Literal(Literal::Int(value)) => Ok(*value),
            Type2::TypeRef { name, args } if args.is_empty() => {
                let body = self.rules.get(name.as_str()).and_then(|rule| match rule.bodies.as_slice() {
                    [RuleBody::Type(expr)] => match expr.choices.as_slice() {
                        [Type1 { base: Type2::Literal(Literal::Int(value)), operator: None, .. }] => Some(*value),
                        _ => None,
                    },
                    _ => None,
                });
                body.ok_or_else(|| CddlError::unsupported(scope.rule, format!("{} is not an integer constant", name)))
            }
            _ => Err(CddlError::unsupported(scope.rule, "bounds must be integer literals")),
        }
    }

    /// The primitive behind a reference, looking through resolved aliases.
    fn primitive_of(&self, ty: &TypeRef) -> Option<Primitive> {
        match ty {
            TypeRef::Primitive(p) => Some(*p),
            TypeRef::Named(name) => match self.types.get(name).map(|t| &t.shape) {
                Some(Shape::Alias(inner)) => self.primitive_of(inner),
                _ => None,
            },
            _ => None,
        }
    }

    fn type2_ref(&mut self, scope: &Scope, t2: &'a Type2, hint: &str, comments: &[String]) -> Result<TypeRef, CddlError> {
        match t2 {
            Type2::Literal(literal) => Ok(TypeRef::Fixed(fixed(scope, literal)?)),
            Type2::TypeRef { name, args } => self.name_ref(scope, name, args, hint),
            Type2::Socket(name) if name.starts_with("$$") => {
                Err(CddlError::unsupported(scope.rule, format!("group socket {} is used as a type", name)))
            }
            Type2::Socket(name) => {
                if !self.rules.contains_key(name.as_str()) {
                    return Err(CddlError::unsupported(scope.rule, format!("socket {} has no plugs", name)));
                }
                self.resolve_rule(name, vec![], scope.rule)
            }
            Type2::Paren(inner) => self.type_expr_ref(scope, inner, hint),
            Type2::Tagged { tag, inner } if !is_structure(inner) => {
                let inner = self.type_expr_ref(scope, inner, hint)?;
                Ok(TypeRef::Tagged { tag: *tag, inner: Box::new(inner) })
            }
            Type2::Map(_) | Type2::Array(_) | Type2::Tagged { .. } | Type2::ChoiceFromGroup(_) | Type2::ChoiceFromRule { .. } => {
                let meta = RuleMetadata::from_comments(comments);
                let ident = self.reserve_ident(meta.name.as_deref().map(to_pascal_case).unwrap_or_else(|| hint.to_owned()));
                let (shape, tag) = match t2 {
                    Type2::Map(group) => (self.structure_shape(scope, group, &ident, true)?, None),
                    Type2::Array(group) => (self.structure_shape(scope, group, &ident, false)?, None),
                    Type2::Tagged { tag, inner } => {
                        let (shape, _) = self.type_expr_shape(scope, inner, &ident, &RuleMetadata::default())?;
                        (shape, Some(*tag))
                    }
                    Type2::ChoiceFromGroup(group) => {
                        let choices: Vec<&'a GroupChoice> = group.choices.iter().collect();
                        let splice = Splice { choices, rule: scope.rule.to_owned(), env: scope.env.clone() };
                        (self.enum_from_group(splice)?, None)
                    }
                    Type2::ChoiceFromRule { name, args } => {
                        let splice = self.group_rule_splice(scope, name, args)?;
                        (self.enum_from_group(splice)?, None)
                    }
                    _ => return Err(CddlError::unsupported(scope.rule, "unexpected inline type")),
                };
                // Homogeneous arrays and tables need no node of their own.
                Ok(match (shape, tag) {
                    (Shape::Alias(ty), None) => ty,
                    (Shape::MapVariableKeys { key, value }, None) => {
                        TypeRef::Map { key: Box::new(key), value: Box::new(value) }
                    }
                    (shape, tag) => self.insert_node(ident, shape, tag, meta.doc_text()),
                })
            }
            Type2::Unwrap { name, .. } => {
                Err(CddlError::unsupported(scope.rule, format!("~{} outside of a map or array", name)))
            }
            Type2::Any => Ok(TypeRef::Primitive(Primitive::Any)),
        }
    }

    fn name_ref(&mut self, scope: &Scope, name: &str, args: &'a [TypeExpr], hint: &str) -> Result<TypeRef, CddlError> {
        if args.is_empty() {
            if let Some(bound) = scope.env.get(name) {
                return Ok(bound.clone());
            }
            if !self.rules.contains_key(name) {
                if let Some(ty) = prelude(name) {
                    return Ok(ty);
                }
            }
        }
        let mut resolved = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            resolved.push(self.type_expr_ref(scope, arg, &format!("{}Arg{}", hint, i))?);
        }
        self.resolve_rule(name, resolved, scope.rule)
    }

    /// Where a key-less entry pulls in a whole group, return that group.
    fn splice_target(&mut self, scope: &Scope, entry: &'a GroupEntry) -> Result<Option<Splice<'a>>, CddlError> {
        if entry.key.is_some() {
            return Ok(None);
        }
        let expr = match &entry.value {
            EntryValue::InlineGroup(group) => {
                return Ok(Some(Splice {
                    choices: unparen(group.choices.iter().collect()),
                    rule:    scope.rule.to_owned(),
                    env:     scope.env.clone(),
                }))
            }
            EntryValue::Type(expr) => expr,
        };
        let type1 = match expr.choices.as_slice() {
            [type1] if type1.operator.is_none() => type1,
            _ => return Ok(None),
        };
        match &type1.base {
            Type2::TypeRef { name, args } if self.is_group_rule(name) && !scope.env.contains_key(name) => {
                Ok(Some(self.group_rule_splice(scope, name, args)?))
            }
            Type2::Socket(name) if name.starts_with("$$") => {
                if self.rules.contains_key(name.as_str()) {
                    Ok(Some(self.group_rule_splice(scope, name, &[])?))
                } else {
                    // A group socket nobody plugs into contributes nothing.
                    Ok(Some(Splice { choices: vec![], rule: scope.rule.to_owned(), env: Env::new() }))
                }
            }
            Type2::Unwrap { name, args } => Ok(Some(self.unwrap_splice(scope, name, args)?)),
            _ => Ok(None),
        }
    }

    fn rule_env(&mut self, scope: &Scope, name: &str, args: &'a [TypeExpr]) -> Result<(Vec<&'a RuleBody>, Env), CddlError> {
        let (params, bodies) = match self.rules.get(name) {
            Some(rule) => (rule.generic_params, rule.bodies.clone()),
            None => {
                return Err(CddlError::UnresolvedReference { name: name.to_owned(), rule: scope.rule.to_owned() })
            }
        };
        if params.len() != args.len() {
            return Err(CddlError::GenericArityMismatch { rule: name.to_owned(), expected: params.len(), found: args.len() });
        }
        let mut env = Env::new();
        for (i, (param, arg)) in params.iter().zip(args).enumerate() {
            let hint = format!("{}Arg{}", to_pascal_case(name), i);
            env.insert(param.clone(), self.type_expr_ref(scope, arg, &hint)?);
        }
        Ok((bodies, env))
    }

    fn group_rule_splice(&mut self, scope: &Scope, name: &str, args: &'a [TypeExpr]) -> Result<Splice<'a>, CddlError> {
        let (bodies, env) = self.rule_env(scope, name, args)?;
        let mut choices = Vec::new();
        for body in bodies {
            match body {
                RuleBody::Group(group) => choices.extend(group.choices.iter()),
                RuleBody::Type(_) => return Err(CddlError::unsupported(name, "mixes type and group alternatives")),
            }
        }
        Ok(Splice { choices: unparen(choices), rule: name.to_owned(), env })
    }

    fn unwrap_splice(&mut self, scope: &Scope, name: &str, args: &'a [TypeExpr]) -> Result<Splice<'a>, CddlError> {
        let (bodies, env) = self.rule_env(scope, name, args)?;
        if let [body] = bodies.as_slice() {
            if let RuleBody::Type(expr) = *body {
                if let [Type1 { base: Type2::Map(group) | Type2::Array(group), operator: None, .. }] = expr.choices.as_slice() {
                    return Ok(Splice { choices: unparen(group.choices.iter().collect()), rule: name.to_owned(), env });
                }
            }
        }
        Err(CddlError::unsupported(scope.rule, format!("~{} needs a map or array rule", name)))
    }

    fn flatten(
        &mut self,
        scope: &Scope,
        choice: &'a GroupChoice,
        optional: bool,
        depth: usize,
        out: &mut Vec<FlatEntry<'a>>,
    ) -> Result<(), CddlError> {
        if depth > MAX_SPLICE_DEPTH {
            return Err(CddlError::unsupported(scope.rule, "recursive group"));
        }
        for entry in &choice.entries {
            match self.splice_target(scope, entry)? {
                Some(splice) => {
                    let optional = if entry.occurrence.is_one() {
                        optional
                    } else if entry.occurrence.is_optional() {
                        true
                    } else {
                        return Err(CddlError::unsupported(scope.rule, "repeated group"));
                    };
                    match splice.choices.as_slice() {
                        [] => {}
                        [inner] => {
                            let inner_scope = Scope { rule: &splice.rule, env: &splice.env };
                            self.flatten(&inner_scope, *inner, optional, depth + 1, out)?;
                        }
                        _ => {
                            return Err(CddlError::unsupported(
                                scope.rule,
                                "a group with several choices is spliced next to other entries",
                            ))
                        }
                    }
                }
                None => out.push(FlatEntry {
                    entry,
                    occurrence: if optional && entry.occurrence.is_one() { Occurrence::OPTIONAL } else { entry.occurrence },
                    rule: scope.rule.to_owned(),
                    env: scope.env.clone(),
                }),
            }
        }
        Ok(())
    }

    /// The group choices of a map or array body, flattened.
    fn group_choices(
        &mut self,
        scope: &Scope,
        group: &'a Group,
    ) -> Result<Vec<(Vec<FlatEntry<'a>>, Vec<String>)>, CddlError> {
        // `{ grp }` where `grp` has several choices behaves like the choices
        // were written inline.
        if let [choice] = group.choices.as_slice() {
            if let [entry] = choice.entries.as_slice() {
                if entry.occurrence.is_one() {
                    if let Some(splice) = self.splice_target(scope, entry)? {
                        if splice.choices.len() > 1 {
                            let inner_scope = Scope { rule: &splice.rule, env: &splice.env };
                            let mut out = Vec::new();
                            for inner in &splice.choices {
                                let mut flat = Vec::new();
                                self.flatten(&inner_scope, *inner, false, 1, &mut flat)?;
                                out.push((flat, inner.comments.clone()));
                            }
                            return Ok(out);
                        }
                    }
                }
            }
        }

        let mut out = Vec::new();
        for choice in &group.choices {
            let mut flat = Vec::new();
            self.flatten(scope, choice, false, 0, &mut flat)?;
            out.push((flat, choice.comments.clone()));
        }
        Ok(out)
    }

    fn structure_shape(&mut self, scope: &Scope, group: &'a Group, ident: &str, is_map: bool) -> Result<Shape, CddlError> {
        let mut choices = self.group_choices(scope, group)?;
        if choices.len() == 1 {
            let (flat, _) = choices.remove(0);
            return if is_map { self.map_shape(flat, ident) } else { self.array_shape(flat, ident) };
        }

        let mut variants = Vec::new();
        let mut taken: Vec<String> = Vec::new();
        for (i, (flat, comments)) in choices.into_iter().enumerate() {
            let meta = RuleMetadata::from_comments(&comments);
            let base = match &meta.name {
                Some(name) => to_pascal_case(name),
                None => format!("{}{}", ident, i),
            };
            let variant_ident = self.reserve_ident(base);
            let shape = if is_map { self.map_shape(flat, &variant_ident)? } else { self.array_shape(flat, &variant_ident)? };
            let ty = self.insert_node(variant_ident.clone(), shape, None, meta.doc_text());
            let name = append_number_if_duplicate(&taken, variant_ident);
            taken.push(name.clone());
            variants.push(Variant { name, ty, doc: None });
        }
        Ok(Shape::Choice { variants })
    }

    fn map_shape(&mut self, entries: Vec<FlatEntry<'a>>, ident: &str) -> Result<Shape, CddlError> {
        if let [flat] = entries.as_slice() {
            if let Some(MemberKey::Type { key, .. }) = &flat.entry.key {
                if literal_key(key).is_none() {
                    let scope = Scope { rule: &flat.rule, env: &flat.env };
                    let key = self.type1_ref(&scope, key, &format!("{}Key", ident))?;
                    let value = self.entry_type(&scope, flat.entry, &format!("{}Value", ident))?;
                    return Ok(Shape::MapVariableKeys { key, value });
                }
            }
        }

        let mut fields = Vec::new();
        let mut names: Vec<String> = Vec::new();
        let mut all_bareword = true;
        for flat in &entries {
            let scope = Scope { rule: &flat.rule, env: &flat.env };
            let meta = RuleMetadata::from_comments(&flat.entry.comments);
            let (key, label) = match &flat.entry.key {
                None => {
                    return Err(CddlError::unsupported(
                        &flat.rule,
                        format!("map entry at {} has no key", flat.entry.location),
                    ))
                }
                Some(MemberKey::Bareword(word)) => (FixedValue::Text(word.clone()), word.clone()),
                Some(MemberKey::Literal(literal)) => {
                    all_bareword = false;
                    let key = fixed(&scope, literal)?;
                    let label = format!("key_{}", key.label());
                    (key, label)
                }
                Some(MemberKey::Type { key, .. }) => match literal_key(key) {
                    Some(literal) => {
                        all_bareword = false;
                        let key = fixed(&scope, literal)?;
                        let label = format!("key_{}", key.label());
                        (key, label)
                    }
                    None => {
                        return Err(CddlError::unsupported(&flat.rule, "a computed key is mixed with fixed keys"))
                    }
                },
            };
            let name = field_ident(meta.name.as_deref().unwrap_or(&label));
            let name = append_number_if_duplicate(&names, name);
            names.push(name.clone());

            let hint = format!("{}{}", ident, to_pascal_case(&name));
            let ty = self.entry_type(&scope, flat.entry, &hint)?;
            fields.push(Field { name, key: Some(key), ty, occurrence: flat.occurrence, doc: meta.doc_text() });
        }

        let record = Record { fields };
        Ok(if all_bareword { Shape::Record(record) } else { Shape::MapFixedKeys(record) })
    }

    fn array_shape(&mut self, entries: Vec<FlatEntry<'a>>, ident: &str) -> Result<Shape, CddlError> {
        if let [flat] = entries.as_slice() {
            if flat.occurrence.is_repeated() {
                let scope = Scope { rule: &flat.rule, env: &flat.env };
                let element = self.entry_type(&scope, flat.entry, &format!("{}Item", ident))?;
                return Ok(Shape::Alias(TypeRef::Array { element: Box::new(element), occurrence: flat.occurrence }));
            }
        }

        let mut fields = Vec::new();
        let mut names: Vec<String> = Vec::new();
        for (i, flat) in entries.iter().enumerate() {
            let scope = Scope { rule: &flat.rule, env: &flat.env };
            let meta = RuleMetadata::from_comments(&flat.entry.comments);
            let label = match (&meta.name, &flat.entry.key) {
                (Some(name), _) => name.clone(),
                (None, Some(MemberKey::Bareword(word))) => word.clone(),
                (None, Some(MemberKey::Literal(literal))) => format!("key_{}", fixed(&scope, literal)?.label()),
                _ => type_derived_name(flat.entry).unwrap_or_else(|| format!("index_{}", i)),
            };
            let name = append_number_if_duplicate(&names, field_ident(&label));
            names.push(name.clone());

            let hint = format!("{}{}", ident, to_pascal_case(&name));
            let ty = self.entry_type(&scope, flat.entry, &hint)?;
            fields.push(Field { name, key: None, ty, occurrence: flat.occurrence, doc: meta.doc_text() });
        }
        Ok(Shape::Array(Record { fields }))
    }

    fn entry_type(&mut self, scope: &Scope, entry: &'a GroupEntry, hint: &str) -> Result<TypeRef, CddlError> {
        match &entry.value {
            EntryValue::Type(expr) => {
                let meta = RuleMetadata::from_comments(&entry.comments);
                match (&meta.name, expr.choices.as_slice()) {
                    // `@name` on an entry with an inline type names that type.
                    (Some(name), [type1]) if is_inline_structure(&type1.base) => {
                        let hint = to_pascal_case(name);
                        self.type_expr_ref(scope, expr, &hint)
                    }
                    _ => self.type_expr_ref(scope, expr, hint),
                }
            }
            EntryValue::InlineGroup(_) => Err(CddlError::unsupported(scope.rule, "a keyed entry holds a group")),
        }
    }

    fn enum_from_group(&mut self, splice: Splice<'a>) -> Result<Shape, CddlError> {
        let choice = match splice.choices.as_slice() {
            [choice] => *choice,
            _ => return Err(CddlError::unsupported(&splice.rule, "& needs a group without choices")),
        };
        let scope = Scope { rule: &splice.rule, env: &splice.env };
        let mut flat = Vec::new();
        self.flatten(&scope, choice, false, 0, &mut flat)?;

        let mut variants = Vec::new();
        let mut taken: Vec<String> = Vec::new();
        for entry in flat {
            let entry_scope = Scope { rule: &entry.rule, env: &entry.env };
            let ty = self.entry_type(&entry_scope, entry.entry, "Unused")?;
            let value = match ty {
                TypeRef::Fixed(value) => value,
                _ => return Err(CddlError::unsupported(&entry.rule, "& needs literal values")),
            };
            let meta = RuleMetadata::from_comments(&entry.entry.comments);
            let label = match (&meta.name, &entry.entry.key) {
                (Some(name), _) => name.clone(),
                (None, Some(MemberKey::Bareword(word))) => word.clone(),
                _ => value.label(),
            };
            let name = append_number_if_duplicate(&taken, to_pascal_case(&label));
            taken.push(name.clone());
            variants.push(Variant { name, ty: TypeRef::Fixed(value), doc: meta.doc_text() });
        }
        Ok(Shape::Choice { variants })
    }
}

fn exclusive_end(scope: &Scope, hi: i128, inclusive: bool) -> Result<i128, CddlError> {
    match inclusive {
        true => Ok(hi),
        false => hi
            .checked_sub(1)
            .ok_or_else(|| CddlError::invalid_range(scope.rule, format!("exclusive end {} has no predecessor", hi))),
    }
}

/// `value + delta` for the strict comparison controls.
fn step(scope: &Scope, value: i128, delta: i128, control: &str) -> Result<i128, CddlError> {
    value
        .checked_add(delta)
        .ok_or_else(|| CddlError::invalid_range(scope.rule, format!(".{} {} is outside every integer type", control, value)))
}

fn int_range(scope: &Scope, lo: i128, hi: i128) -> Result<Constrained, CddlError> {
    if lo > hi {
        return Err(CddlError::unsupported(scope.rule, format!("empty range {}..{}", lo, hi)));
    }
    if let Some(primitive) = Primitive::exact_integer(lo, hi) {
        return Ok(Constrained::Ref(TypeRef::Primitive(primitive)));
    }
    match Primitive::covering_integer(lo, hi) {
        Some(primitive) => Ok(Constrained::Bounded(primitive, Bounds { min: Some(lo), max: Some(hi) })),
        None => Err(CddlError::unsupported(scope.rule, format!("range {}..{} has no native integer type", lo, hi))),
    }
}

fn fixed(scope: &Scope, literal: &Literal) -> Result<FixedValue, CddlError> {
    match literal {
        Literal::Int(value) => Ok(FixedValue::Int(*value)),
        Literal::Text(value) => Ok(FixedValue::Text(value.clone())),
        Literal::Bytes(value) => Ok(FixedValue::Bytes(value.clone())),
        Literal::Float(value) => Err(CddlError::unsupported(scope.rule, format!("float literal {}", value))),
    }
}

/// `(a // b)` written as a group's only entry stands for its choices.
fn unparen<'a>(mut choices: Vec<&'a GroupChoice>) -> Vec<&'a GroupChoice> {
    while let [choice] = choices.as_slice() {
        let choice: &'a GroupChoice = *choice;
        match choice.entries.as_slice() {
            [GroupEntry { key: None, value: EntryValue::InlineGroup(group), occurrence, .. }] if occurrence.is_one() => {
                choices = group.choices.iter().collect();
            }
            _ => break,
        }
    }
    choices
}

fn literal_key(key: &Type1) -> Option<&Literal> {
    match key {
        Type1 { base: Type2::Literal(literal), operator: None, .. } => Some(literal),
        _ => None,
    }
}

fn is_structure(expr: &TypeExpr) -> bool {
    matches!(
        expr.choices.as_slice(),
        [Type1 { base: Type2::Map(_) | Type2::Array(_), operator: None, .. }]
    )
}

fn is_inline_structure(t2: &Type2) -> bool {
    matches!(t2, Type2::Map(_) | Type2::Array(_) | Type2::ChoiceFromGroup(_))
}

/// `[uint, point]` names its fields after their types.
fn type_derived_name(entry: &GroupEntry) -> Option<String> {
    match &entry.value {
        EntryValue::Type(TypeExpr { choices }) => match choices.as_slice() {
            [Type1 { base: Type2::TypeRef { name, .. } | Type2::Socket(name), operator: None, .. }] => {
                Some(to_snake_case(name.trim_start_matches('$')))
            }
            _ => None,
        },
        _ => None,
    }
}

/// Names every schema may use without defining them.
pub fn prelude(name: &str) -> Option<TypeRef> {
    let primitive = match name {
        "bool" => Primitive::Bool,
        "uint" | "u64" => Primitive::U64,
        "u8" => Primitive::U8,
        "u16" => Primitive::U16,
        "u32" => Primitive::U32,
        "nint" => Primitive::Nint,
        "int" | "i64" => Primitive::I64,
        "i8" => Primitive::I8,
        "i16" => Primitive::I16,
        "i32" => Primitive::I32,
        "float16" | "float32" | "float16-32" => Primitive::F32,
        "float64" | "float" | "float32-64" | "float16-32-64" => Primitive::F64,
        "tstr" | "text" => Primitive::Text,
        "bstr" | "bytes" => Primitive::Bytes,
        "any" => Primitive::Any,
        "true" => return Some(TypeRef::Fixed(FixedValue::Bool(true))),
        "false" => return Some(TypeRef::Fixed(FixedValue::Bool(false))),
        "null" | "nil" => return Some(TypeRef::Fixed(FixedValue::Null)),
        "undefined" => return Some(TypeRef::Fixed(FixedValue::Undefined)),
        _ => return None,
    };
    Some(TypeRef::Primitive(primitive))
}
