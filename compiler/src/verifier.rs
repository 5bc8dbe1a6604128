use std::collections::{HashMap, HashSet};

use crate::{
    error::CddlError,
    types::{Shape, TypeGraph, TypeRef},
    utils::quote,
};

/// Identifiers the generated crates already use.
pub const RESERVED_NAMES: [&str; 6] = ["Value", "DecodeError", "ToCbor", "FromCbor", "Option", "Vec"];

/// Returns `Ok(())` if the graph is closed and every type can be generated.
/// Also fills in the strongly connected components and the `recursive`
/// flags, which code generation uses to place boxes.
pub fn verify_graph(graph: &mut TypeGraph) -> Result<(), CddlError> {
    // 1) Every reference points at a node
    for ty in graph.iter() {
        for name in ty.references() {
            if graph.get(name).is_none() {
                return Err(CddlError::VerifierError(format!(
                    "The type {} references {}, which is not defined",
                    quote(&ty.name),
                    quote(name)
                )));
            }
        }
    }
    for root in graph.roots() {
        if graph.get(root).is_none() {
            return Err(CddlError::VerifierError(format!("The root {} is not defined", quote(root))));
        }
    }

    // 2) Identifiers are unique and not reserved
    let mut idents: HashMap<&str, &str> = HashMap::new();
    for ty in graph.iter() {
        if RESERVED_NAMES.contains(&ty.ident.as_str()) {
            return Err(CddlError::VerifierError(format!(
                "The type name {} (from {}) is reserved",
                quote(&ty.ident),
                quote(&ty.name)
            )));
        }
        if let Some(other) = idents.insert(&ty.ident, &ty.name) {
            return Err(CddlError::VerifierError(format!(
                "The types {} and {} both map to {}",
                quote(other),
                quote(&ty.name),
                quote(&ty.ident)
            )));
        }
        if let Shape::Choice { variants } = &ty.shape {
            let mut seen = HashSet::new();
            for variant in variants {
                if !seen.insert(variant.name.as_str()) {
                    return Err(CddlError::VerifierError(format!(
                        "The variant {} is used twice in {}",
                        quote(&variant.name),
                        quote(&ty.name)
                    )));
                }
            }
        }
    }

    // 3) Every type has a finite instance
    let inhabited = inhabited_types(graph);
    if let Some(ty) = graph.iter().find(|ty| !inhabited.contains(ty.name.as_str())) {
        let detail = if matches!(ty.shape, Shape::Alias(_)) {
            "alias cycle".to_owned()
        } else {
            "type has no finite instance; make a recursive field optional or repeated".to_owned()
        };
        return Err(CddlError::UnsupportedConstruct { rule: ty.name.clone(), detail });
    }

    // 4) Mark recursion
    let components = strongly_connected_components(graph);
    let mut sizes: HashMap<usize, usize> = HashMap::new();
    for component in components.values() {
        *sizes.entry(*component).or_default() += 1;
    }
    let recursive: Vec<String> = graph
        .iter()
        .filter(|ty| sizes.get(&components[&ty.name]).map_or(false, |n| *n > 1) || ty.references().contains(&ty.name.as_str()))
        .map(|ty| ty.name.clone())
        .collect();
    for name in recursive {
        if let Some(ty) = graph.types.get_mut(&name) {
            ty.recursive = true;
        }
    }
    graph.components = components;

    Ok(())
}

/// Least fixpoint of "has a finite instance".
fn inhabited_types(graph: &TypeGraph) -> HashSet<&str> {
    let mut inhabited: HashSet<&str> = HashSet::new();
    loop {
        let before = inhabited.len();
        for ty in graph.iter() {
            if inhabited.contains(ty.name.as_str()) {
                continue;
            }
            let ok = match &ty.shape {
                Shape::Record(record) | Shape::Array(record) | Shape::MapFixedKeys(record) => record
                    .fields
                    .iter()
                    .all(|field| field.occurrence.min == 0 || ref_inhabited(&field.ty, &inhabited)),
                Shape::Choice { variants } => variants.iter().any(|v| ref_inhabited(&v.ty, &inhabited)),
                Shape::Wrapper { inner, .. } | Shape::Alias(inner) => ref_inhabited(inner, &inhabited),
                Shape::MapVariableKeys { .. } => true,
            };
            if ok {
                inhabited.insert(ty.name.as_str());
            }
        }
        if inhabited.len() == before {
            return inhabited;
        }
    }
}

fn ref_inhabited(ty: &TypeRef, inhabited: &HashSet<&str>) -> bool {
    match ty {
        TypeRef::Primitive(_) | TypeRef::Fixed(_) | TypeRef::Optional(_) | TypeRef::Map { .. } => true,
        TypeRef::Named(name) => inhabited.contains(name.as_str()),
        TypeRef::Array { element, occurrence } => occurrence.min == 0 || ref_inhabited(element, inhabited),
        TypeRef::Tagged { inner, .. } | TypeRef::CborBytes(inner) => ref_inhabited(inner, inhabited),
    }
}

/// Tarjan's algorithm. Maps every node to the index of its component.
fn strongly_connected_components(graph: &TypeGraph) -> HashMap<String, usize> {
    struct Tarjan<'g> {
        graph:      &'g TypeGraph,
        index:      HashMap<&'g str, usize>,
        low:        HashMap<&'g str, usize>,
        stack:      Vec<&'g str>,
        on_stack:   HashSet<&'g str>,
        next:       usize,
        components: HashMap<String, usize>,
        count:      usize,
    }

    impl<'g> Tarjan<'g> {
        fn visit(&mut self, name: &'g str) {
            self.index.insert(name, self.next);
            self.low.insert(name, self.next);
            self.next += 1;
            self.stack.push(name);
            self.on_stack.insert(name);

            let successors = self.graph.get(name).map(|ty| ty.references()).unwrap_or_default();
            for next in successors {
                if !self.index.contains_key(next) {
                    self.visit(next);
                    let low = self.low[name].min(self.low[next]);
                    self.low.insert(name, low);
                } else if self.on_stack.contains(next) {
                    let low = self.low[name].min(self.index[next]);
                    self.low.insert(name, low);
                }
            }

            if self.low[name] == self.index[name] {
                while let Some(member) = self.stack.pop() {
                    self.on_stack.remove(member);
                    self.components.insert(member.to_owned(), self.count);
                    if member == name {
                        break;
                    }
                }
                self.count += 1;
            }
        }
    }

    let mut tarjan = Tarjan {
        graph,
        index: HashMap::new(),
        low: HashMap::new(),
        stack: vec![],
        on_stack: HashSet::new(),
        next: 0,
        components: HashMap::new(),
        count: 0,
    };
    for ty in graph.iter() {
        if !tarjan.index.contains_key(ty.name.as_str()) {
            tarjan.visit(&ty.name);
        }
    }
    tarjan.components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, Occurrence, Primitive, Record, ResolvedType, Variant};

    fn node(name: &str, shape: Shape) -> ResolvedType {
        ResolvedType {
            name: name.to_owned(),
            ident: crate::utils::to_pascal_case(name),
            shape,
            tag: None,
            doc: None,
            instance_of: None,
            recursive: false,
        }
    }

    fn record(fields: &[(&str, TypeRef, Occurrence)]) -> Shape {
        Shape::Record(Record {
            fields: fields
                .iter()
                .map(|(name, ty, occurrence)| Field {
                    name:       name.to_string(),
                    key:        None,
                    ty:         ty.clone(),
                    occurrence: *occurrence,
                    doc:        None,
                })
                .collect(),
        })
    }

    fn graph(nodes: Vec<ResolvedType>) -> TypeGraph {
        let mut graph = TypeGraph::default();
        for node in nodes {
            graph.roots.push(node.name.clone());
            graph.types.insert(node.name.clone(), node);
        }
        graph
    }

    #[test]
    fn test_dangling_reference() {
        let mut g = graph(vec![node("a", Shape::Alias(TypeRef::named("b")))]);
        assert!(matches!(
            verify_graph(&mut g),
            Err(CddlError::VerifierError(msg)) if msg == "The type \"a\" references \"b\", which is not defined"
        ));
    }

    #[test]
    fn test_ident_collisions_and_reserved_names() {
        let mut g = graph(vec![
            node("foo_bar", Shape::Alias(TypeRef::Primitive(Primitive::U8))),
            node("foo-bar", Shape::Alias(TypeRef::Primitive(Primitive::U8))),
        ]);
        assert!(matches!(verify_graph(&mut g), Err(CddlError::VerifierError(msg)) if msg.contains("both map to \"FooBar\"")));

        let mut g = graph(vec![node("value", Shape::Alias(TypeRef::Primitive(Primitive::U8)))]);
        assert!(matches!(verify_graph(&mut g), Err(CddlError::VerifierError(msg)) if msg.contains("reserved")));
    }

    #[test]
    fn test_recursion_is_marked() {
        let list = record(&[
            ("head", TypeRef::Primitive(Primitive::U64), Occurrence::ONE),
            ("tail", TypeRef::named("list"), Occurrence::OPTIONAL),
        ]);
        let ping = record(&[("pong", TypeRef::Optional(Box::new(TypeRef::named("pong"))), Occurrence::ONE)]);
        let pong = Shape::Choice {
            variants: vec![
                Variant { name: "Ping".into(), ty: TypeRef::named("ping"), doc: None },
                Variant { name: "End".into(), ty: TypeRef::Primitive(Primitive::Bool), doc: None },
            ],
        };
        let mut g = graph(vec![
            node("list", list),
            node("ping", ping),
            node("pong", pong),
            node("leaf", Shape::Alias(TypeRef::Primitive(Primitive::Text))),
        ]);
        verify_graph(&mut g).unwrap();
        assert!(g.get("list").unwrap().recursive);
        assert!(g.get("ping").unwrap().recursive);
        assert!(g.get("pong").unwrap().recursive);
        assert!(!g.get("leaf").unwrap().recursive);
        assert!(g.needs_box("ping", "pong"));
        assert!(!g.needs_box("list", "leaf"));
    }

    #[test]
    fn test_uninhabited_types_are_rejected() {
        let mut g = graph(vec![node(
            "loop",
            record(&[("next", TypeRef::named("loop"), Occurrence::ONE)]),
        )]);
        assert!(matches!(
            verify_graph(&mut g),
            Err(CddlError::UnsupportedConstruct { rule, .. }) if rule == "loop"
        ));

        let mut g = graph(vec![
            node("a", Shape::Alias(TypeRef::named("b"))),
            node("b", Shape::Alias(TypeRef::named("a"))),
        ]);
        assert!(matches!(
            verify_graph(&mut g),
            Err(CddlError::UnsupportedConstruct { detail, .. }) if detail == "alias cycle"
        ));
    }
}
