//! Building a [`StructTree`] from `StructTreeRoot`
//!
//! Structure records in real files are often non-conforming, so a
//! malformed element is logged and dropped together with its subtree while
//! its parent and siblings are still built. Only a malformed root fails.

use crate::attribute::Attribute;
use crate::parent_index::ParentIndex;
use crate::parsing::{
    get_dictionary, get_integer, get_name, get_string, parse_attrib_class, parse_attributes,
    required, resolve, type_name,
};
use crate::struct_type::StructType;
use crate::structtree::{ContentLeaf, ElementData, NodeId, NodeKind, ObjectRefLeaf, StructTree};
use crate::tree_map::{NameTree, NumberTree};
use crate::TaggedPdfError;
use log::{debug, warn};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{HashMap, HashSet};

/// Deepest element nesting accepted before a branch is treated as broken.
const MAX_DEPTH: usize = 512;

/// Mapping from custom structure types to standard ones (`RoleMap`).
///
/// Lookups are single-level: the mapped name is not mapped again.
#[derive(Debug, Clone, Default)]
pub struct RoleMap {
    mapping: HashMap<String, String>,
}

impl RoleMap {
    pub fn parse(doc: &Document, dict: &Dictionary) -> Self {
        let mut mapping = HashMap::new();
        for (key, value) in dict.iter() {
            match resolve(doc, value) {
                Ok((_, Object::Name(name))) => {
                    mapping.insert(
                        String::from_utf8_lossy(key).into_owned(),
                        String::from_utf8_lossy(name).into_owned(),
                    );
                }
                Ok((_, other)) => warn!(
                    "unexpected type {} in role map entry {}",
                    type_name(other),
                    String::from_utf8_lossy(key)
                ),
                Err(e) => warn!("skip role map entry: {}", e),
            }
        }
        Self { mapping }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            mapping: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.mapping.get(name).map(String::as_str)
    }

    /// Standard type for a type name, falling back to
    /// [`StructType::Unknown`].
    pub fn resolve_type(&self, name: &str) -> StructType {
        let mapped = self.get(name).unwrap_or(name);
        StructType::from_standard_name(mapped).unwrap_or_else(|| {
            warn!("mapping nonstandard structure type \"{}\" to Unknown", mapped);
            StructType::Unknown
        })
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

/// Named attribute sets that elements inherit through `/C` (`ClassMap`).
#[derive(Debug, Clone, Default)]
pub struct ClassMap {
    mapping: HashMap<String, Vec<Attribute>>,
}

impl ClassMap {
    pub fn parse(doc: &Document, dict: &Dictionary) -> Self {
        let mut mapping = HashMap::new();
        for (key, value) in dict.iter() {
            let name = String::from_utf8_lossy(key).into_owned();
            match parse_attributes(doc, value) {
                Ok(attributes) => {
                    mapping.insert(name, attributes);
                }
                Err(e) => warn!("skip attribute class {}: {}", name, e),
            }
        }
        Self { mapping }
    }

    pub fn get(&self, class: &str) -> Option<&[Attribute]> {
        self.mapping.get(class).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Add the attributes of `class` whose names are not yet present.
    pub fn apply(&self, attributes: &mut Vec<Attribute>, class: &str) -> Result<(), TaggedPdfError> {
        let inherited = self
            .get(class)
            .ok_or_else(|| TaggedPdfError::MissingAttributeClass(class.to_string()))?;
        for attr in inherited {
            if attributes.iter().any(|a| a.name == attr.name) {
                debug!("not overwriting attribute {} from class {}", attr.name, class);
            } else {
                attributes.push(attr.clone());
            }
        }
        Ok(())
    }
}

/// A node built but not yet placed in the arena.
struct PendingNode {
    kind: NodeKind,
    children: Vec<PendingNode>,
}

struct TreeBuilder<'a> {
    doc: &'a Document,
    role_map: &'a RoleMap,
    class_map: Option<&'a ClassMap>,
    claimed: HashSet<ObjectId>,
    claim_log: Vec<ObjectId>,
}

impl<'a> TreeBuilder<'a> {
    /// Build a top-level element or an element reached through `/K`.
    fn build_struct_elem(
        &mut self,
        obj: &Object,
        parent_page: Option<ObjectId>,
        depth: usize,
    ) -> Result<PendingNode, TaggedPdfError> {
        let (object_id, target) = resolve(self.doc, obj)?;
        let Object::Dictionary(dict) = target else {
            return Err(TaggedPdfError::Structure(format!(
                "StructElem is {}, not dictionary",
                type_name(target)
            )));
        };
        if let Some(t) = get_name(self.doc, dict, b"Type")? {
            if t != "StructElem" {
                return Err(TaggedPdfError::Structure(format!(
                    "StructElem has wrong /Type {}",
                    t
                )));
            }
        }
        self.build_claimed(object_id, dict, parent_page, depth)
    }

    /// Claim the element's identity for the duration of the build and
    /// release everything claimed inside a subtree that fails.
    fn build_claimed(
        &mut self,
        object_id: Option<ObjectId>,
        dict: &Dictionary,
        parent_page: Option<ObjectId>,
        depth: usize,
    ) -> Result<PendingNode, TaggedPdfError> {
        let mark = self.claim_log.len();
        if let Some(id) = object_id {
            if !self.claimed.insert(id) {
                return Err(TaggedPdfError::Structure(format!(
                    "StructElem {} {} R reached twice",
                    id.0, id.1
                )));
            }
            self.claim_log.push(id);
        }
        let result = self.build_element(object_id, dict, parent_page, depth);
        if result.is_err() {
            for id in self.claim_log.drain(mark..) {
                self.claimed.remove(&id);
            }
        }
        result
    }

    fn build_element(
        &mut self,
        object_id: Option<ObjectId>,
        dict: &Dictionary,
        parent_page: Option<ObjectId>,
        depth: usize,
    ) -> Result<PendingNode, TaggedPdfError> {
        if depth > MAX_DEPTH {
            return Err(TaggedPdfError::Structure(format!(
                "structure nested deeper than {} levels",
                MAX_DEPTH
            )));
        }
        let doc = self.doc;

        let original_type = required(b"S", get_name(doc, dict, b"S")?)?;
        let struct_type = self.role_map.resolve_type(&original_type);

        match dict.get(b"P") {
            Ok(Object::Reference(_)) => {}
            Ok(other) => {
                return Err(TaggedPdfError::Structure(format!(
                    "/P is {}, not an indirect reference",
                    type_name(other)
                )))
            }
            Err(_) => return Err(TaggedPdfError::Structure("missing /P in StructElem".into())),
        }

        let page_object = match dict.get(b"Pg") {
            Ok(Object::Reference(id)) => Some(*id),
            Ok(Object::Null) | Err(_) => parent_page,
            Ok(other) => {
                return Err(TaggedPdfError::Structure(format!(
                    "/Pg is {}, not an indirect reference",
                    type_name(other)
                )))
            }
        };

        let mut attributes = match dict.get(b"A") {
            Ok(a) => parse_attributes(doc, a)?,
            Err(_) => Vec::new(),
        };
        let attribute_classes = match dict.get(b"C") {
            Ok(c) => parse_attrib_class(doc, c)?,
            Err(_) => Vec::new(),
        };
        for class in &attribute_classes {
            match self.class_map {
                Some(class_map) => class_map.apply(&mut attributes, class)?,
                None => return Err(TaggedPdfError::MissingAttributeClass(class.clone())),
            }
        }

        let elem = ElementData {
            object_id,
            struct_type,
            original_type,
            attributes,
            attribute_classes,
            page_object,
            id: get_string(doc, dict, b"ID")?,
            revision: get_integer(doc, dict, b"R")?,
            title: get_string(doc, dict, b"T")?,
            lang: get_string(doc, dict, b"Lang")?,
            alt: get_string(doc, dict, b"Alt")?,
            expanded: get_string(doc, dict, b"E")?,
            actual_text: get_string(doc, dict, b"ActualText")?,
        };

        let mut children = Vec::new();
        if let Ok(kids) = dict.get(b"K") {
            match resolve(doc, kids)?.1 {
                Object::Array(items) => {
                    for item in items {
                        self.add_child(&mut children, item, page_object, depth);
                    }
                }
                Object::Null => {}
                _ => self.add_child(&mut children, kids, page_object, depth),
            }
        }

        Ok(PendingNode {
            kind: NodeKind::Element(elem),
            children,
        })
    }

    fn add_child(
        &mut self,
        children: &mut Vec<PendingNode>,
        obj: &Object,
        page_object: Option<ObjectId>,
        depth: usize,
    ) {
        match self.build_child(obj, page_object, depth) {
            Ok(child) => children.push(child),
            Err(e) => warn!("skip StructElem child with error: {}", e),
        }
    }

    fn build_child(
        &mut self,
        obj: &Object,
        page_object: Option<ObjectId>,
        depth: usize,
    ) -> Result<PendingNode, TaggedPdfError> {
        let doc = self.doc;
        let (object_id, target) = resolve(doc, obj)?;
        match target {
            Object::Integer(mcid) => Ok(leaf(NodeKind::Content(ContentLeaf::new(
                *mcid,
                page_object,
                None,
            )))),
            Object::Dictionary(dict) => match get_name(doc, dict, b"Type")?.as_deref() {
                None | Some("StructElem") => {
                    self.build_claimed(object_id, dict, page_object, depth + 1)
                }
                Some("MCR") => {
                    let mcid = required(b"MCID", get_integer(doc, dict, b"MCID")?)?;
                    let page = optional_reference(dict, b"Pg")?.or(page_object);
                    let stream = optional_reference(dict, b"Stm")?;
                    Ok(leaf(NodeKind::Content(ContentLeaf::new(mcid, page, stream))))
                }
                Some("OBJR") => {
                    let object = optional_reference(dict, b"Obj")?.ok_or_else(|| {
                        TaggedPdfError::Structure("missing /Obj in object reference".into())
                    })?;
                    let page = optional_reference(dict, b"Pg")?.or(page_object);
                    Ok(leaf(NodeKind::ObjectRef(ObjectRefLeaf {
                        object,
                        page_object: page,
                    })))
                }
                Some(other) => Err(TaggedPdfError::Structure(format!(
                    "StructElem child has unknown /Type {}",
                    other
                ))),
            },
            other => Err(TaggedPdfError::Structure(format!(
                "unsupported StructElem child of type {}",
                type_name(other)
            ))),
        }
    }
}

fn leaf(kind: NodeKind) -> PendingNode {
    PendingNode {
        kind,
        children: Vec::new(),
    }
}

fn optional_reference(dict: &Dictionary, key: &[u8]) -> Result<Option<ObjectId>, TaggedPdfError> {
    match dict.get(key) {
        Ok(Object::Reference(id)) => Ok(Some(*id)),
        Ok(Object::Null) | Err(_) => Ok(None),
        Ok(other) => Err(TaggedPdfError::Structure(format!(
            "/{} is {}, not an indirect reference",
            String::from_utf8_lossy(key),
            type_name(other)
        ))),
    }
}

impl StructTree {
    /// Build the tree from the `StructTreeRoot` dictionary.
    ///
    /// Fails if the root or one of its kids is not a dictionary, or one of
    /// the root's maps has the wrong kind. Kids that fail to build are
    /// logged and left out.
    pub fn parse(doc: &Document, root: &Dictionary) -> Result<StructTree, TaggedPdfError> {
        if let Some(t) = get_name(doc, root, b"Type")? {
            if t != "StructTreeRoot" {
                warn!("StructTreeRoot has /Type {}", t);
            }
        }

        let role_map = get_dictionary(doc, root, b"RoleMap")?
            .map(|d| RoleMap::parse(doc, d))
            .unwrap_or_default();
        let class_map = get_dictionary(doc, root, b"ClassMap")?.map(|d| ClassMap::parse(doc, d));
        let parent_index = get_dictionary(doc, root, b"ParentTree")?
            .map(|d| ParentIndex::from_number_tree(doc, &NumberTree::parse(doc, d)));
        let id_tree = get_dictionary(doc, root, b"IDTree")?.map(|d| NameTree::parse(doc, d));

        let kids: Vec<&Object> = match root.get(b"K") {
            Err(_) => Vec::new(),
            Ok(raw) => match resolve(doc, raw)?.1 {
                Object::Null => Vec::new(),
                Object::Dictionary(_) => vec![raw],
                Object::Array(items) => {
                    for (i, item) in items.iter().enumerate() {
                        let target = resolve(doc, item)?.1;
                        if !matches!(target, Object::Dictionary(_)) {
                            return Err(TaggedPdfError::Structure(format!(
                                "StructTreeRoot /K[{}] is {}, not dictionary",
                                i,
                                type_name(target)
                            )));
                        }
                    }
                    items.iter().collect()
                }
                other => {
                    return Err(TaggedPdfError::Structure(format!(
                        "StructTreeRoot /K is {}",
                        type_name(other)
                    )))
                }
            },
        };

        let mut builder = TreeBuilder {
            doc,
            role_map: &role_map,
            class_map: class_map.as_ref(),
            claimed: HashSet::new(),
            claim_log: Vec::new(),
        };
        let mut pending = Vec::with_capacity(kids.len());
        for kid in kids {
            match builder.build_struct_elem(kid, None, 0) {
                Ok(node) => pending.push(node),
                Err(e) => warn!("skip top-level StructElem with error: {}", e),
            }
        }

        let mut tree = StructTree::default();
        for node in pending {
            tree.insert(None, node);
        }

        if let Some(id_tree) = id_tree {
            for (key, value) in id_tree.iter() {
                match value {
                    Object::Reference(id) => {
                        tree.id_index.insert(key.clone(), *id);
                    }
                    other => warn!(
                        "IDTree entry {} is {}, not a reference",
                        String::from_utf8_lossy(key),
                        type_name(other)
                    ),
                }
            }
        }

        tree.role_map = role_map;
        tree.class_map = class_map;
        tree.parent_index = parent_index;
        Ok(tree)
    }

    fn insert(&mut self, parent: Option<NodeId>, pending: PendingNode) -> NodeId {
        let id = self.push_node(parent, pending.kind);
        for child in pending.children {
            self.insert(Some(id), child);
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::PdfValue;
    use lopdf::{dictionary, StringFormat};

    /// Document with a root whose kids are filled by `build`.
    struct Fixture {
        doc: Document,
        root_id: ObjectId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut doc = Document::with_version("1.7");
            let root_id = doc.new_object_id();
            Self { doc, root_id }
        }

        fn elem(&mut self, s: &str, parent: ObjectId, extra: Dictionary) -> ObjectId {
            let mut dict = dictionary! {
                "Type" => "StructElem",
                "S" => s,
                "P" => Object::Reference(parent),
            };
            for (k, v) in extra.iter() {
                dict.set(k.clone(), v.clone());
            }
            self.doc.add_object(dict)
        }

        fn tree(&self, root: Dictionary) -> StructTree {
            StructTree::parse(&self.doc, &root).unwrap()
        }
    }

    fn refs(ids: &[ObjectId]) -> Object {
        Object::Array(ids.iter().map(|&id| Object::Reference(id)).collect())
    }

    #[test]
    fn test_children_kinds() {
        let mut fx = Fixture::new();
        let page = fx.doc.add_object(dictionary! { "Type" => "Page" });
        let annot = fx.doc.add_object(dictionary! { "Type" => "Annot" });
        let root_id = fx.root_id;
        let p = fx.elem(
            "P",
            root_id,
            dictionary! {
                "Pg" => Object::Reference(page),
                "K" => Object::Array(vec![
                    Object::Integer(0),
                    Object::Dictionary(dictionary! { "Type" => "MCR", "MCID" => Object::Integer(1) }),
                    Object::Dictionary(dictionary! { "Type" => "OBJR", "Obj" => Object::Reference(annot) }),
                ]),
            },
        );
        let tree = fx.tree(dictionary! { "K" => refs(&[p]) });
        assert_eq!(tree.roots().len(), 1);
        let root = tree.roots()[0];
        assert_eq!(tree.element_by_object(p), Some(root));
        let children = tree.node(root).children();
        assert_eq!(children.len(), 3);

        let first = tree.node(children[0]).as_content().unwrap();
        assert_eq!(first.mcid, 0);
        assert_eq!(first.page_object, Some(page));
        let second = tree.node(children[1]).as_content().unwrap();
        assert_eq!(second.mcid, 1);
        assert_eq!(second.page_object, Some(page));
        assert!(matches!(
            tree.node(children[2]).kind(),
            NodeKind::ObjectRef(ObjectRefLeaf { object, .. }) if *object == annot
        ));
    }

    #[test]
    fn test_role_map_and_unknown_types() {
        let mut fx = Fixture::new();
        let root_id = fx.root_id;
        let heading = fx.elem("Heading1", root_id, Dictionary::new());
        let custom = fx.elem("Fancy", root_id, Dictionary::new());
        let tree = fx.tree(dictionary! {
            "RoleMap" => dictionary! { "Heading1" => "H1", "Fancy" => "NotStandard" },
            "K" => refs(&[heading, custom]),
        });
        let roots = tree.roots();
        assert_eq!(tree.struct_type(roots[0]), Some(StructType::H1));
        assert_eq!(tree.struct_type(roots[1]), Some(StructType::Unknown));
        let elem = tree.node(roots[0]).as_element().unwrap();
        assert_eq!(elem.original_type, "Heading1");
    }

    #[test]
    fn test_malformed_children_are_dropped() {
        let mut fx = Fixture::new();
        let root_id = fx.root_id;
        let good = fx.elem("Span", root_id, Dictionary::new());
        // Missing /S
        let no_type = fx.doc.add_object(dictionary! { "P" => Object::Reference(root_id) });
        // /P not indirect
        let bad_parent = fx.doc.add_object(dictionary! { "S" => "Span", "P" => Object::Integer(1) });
        // Wrong kind for /T
        let bad_title = fx.elem("Span", root_id, dictionary! { "T" => Object::Integer(3) });
        let sect = fx.elem(
            "Sect",
            root_id,
            dictionary! {
                "K" => Object::Array(vec![
                    Object::Reference(no_type),
                    Object::Reference(good),
                    Object::Reference(bad_parent),
                    Object::Real(2.5),
                    Object::Reference(bad_title),
                    Object::Dictionary(dictionary! { "Type" => "MCR" }),
                ]),
            },
        );
        let tree = fx.tree(dictionary! { "K" => refs(&[sect]) });
        let children = tree.node(tree.roots()[0]).children();
        assert_eq!(children.len(), 1);
        assert_eq!(tree.struct_type(children[0]), Some(StructType::Span));
        assert_eq!(tree.element_by_object(no_type), None);
    }

    #[test]
    fn test_element_reached_twice() {
        let mut fx = Fixture::new();
        let root_id = fx.root_id;
        let shared = fx.elem("Span", root_id, Dictionary::new());
        let loop_id = fx.doc.new_object_id();
        fx.doc.objects.insert(
            loop_id,
            Object::Dictionary(dictionary! {
                "S" => "Div",
                "P" => Object::Reference(root_id),
                "K" => Object::Array(vec![Object::Reference(shared), Object::Reference(shared), Object::Reference(loop_id)]),
            }),
        );
        let tree = fx.tree(dictionary! { "K" => refs(&[loop_id]) });
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.node(tree.roots()[0]).children().len(), 1);
    }

    #[test]
    fn test_attribute_classes() {
        let mut fx = Fixture::new();
        let root_id = fx.root_id;
        let table = fx.elem(
            "Table",
            root_id,
            dictionary! {
                "A" => dictionary! { "O" => "Table", "Summary" => Object::String(b"own".to_vec(), StringFormat::Literal) },
                "C" => "Boxed",
            },
        );
        let missing = fx.elem("P", root_id, dictionary! { "C" => "Nope" });
        let tree = fx.tree(dictionary! {
            "ClassMap" => dictionary! {
                "Boxed" => dictionary! {
                    "O" => "Layout",
                    "Summary" => Object::String(b"class".to_vec(), StringFormat::Literal),
                    "BorderStyle" => "Solid",
                },
            },
            "K" => refs(&[table, missing]),
        });

        // The element with an undeclared class is dropped
        assert_eq!(tree.roots().len(), 1);
        let elem = tree.node(tree.roots()[0]).as_element().unwrap();
        assert_eq!(elem.attribute_classes, vec!["Boxed".to_string()]);
        let summary: Vec<_> = elem.attributes.iter().filter(|a| a.name == "Summary").collect();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].value, PdfValue::String("own".into()));
        assert!(elem.attributes.iter().any(|a| a.name == "BorderStyle" && a.owner == "Layout"));
    }

    #[test]
    fn test_text_fields_and_id_tree() {
        let mut fx = Fixture::new();
        let root_id = fx.root_id;
        let fig = fx.elem(
            "Figure",
            root_id,
            dictionary! {
                "ID" => Object::String(b"fig-1".to_vec(), StringFormat::Literal),
                "Alt" => Object::String(vec![0xFE, 0xFF, 0x00, 0x41], StringFormat::Hexadecimal),
                "Lang" => Object::String(b"en".to_vec(), StringFormat::Literal),
                "R" => Object::Integer(2),
            },
        );
        let tree = fx.tree(dictionary! {
            "IDTree" => dictionary! {
                "Names" => Object::Array(vec![
                    Object::String(b"fig-1".to_vec(), StringFormat::Literal),
                    Object::Reference(fig),
                ]),
            },
            "K" => Object::Reference(fig),
        });
        let node = tree.element_by_id(b"fig-1").unwrap();
        let elem = tree.node(node).as_element().unwrap();
        assert_eq!(elem.id.as_deref(), Some("fig-1"));
        assert_eq!(elem.alt.as_deref(), Some("A"));
        assert_eq!(elem.lang.as_deref(), Some("en"));
        assert_eq!(elem.revision, Some(2));
        assert_eq!(tree.element_by_id(b"missing"), None);
    }

    #[test]
    fn test_malformed_root_is_fatal() {
        let fx = Fixture::new();
        assert!(StructTree::parse(&fx.doc, &dictionary! { "K" => Object::Integer(1) }).is_err());
        assert!(StructTree::parse(
            &fx.doc,
            &dictionary! { "K" => Object::Array(vec![Object::Integer(0)]) }
        )
        .is_err());
        assert!(StructTree::parse(&fx.doc, &dictionary! { "RoleMap" => Object::Integer(0) }).is_err());
        let empty = StructTree::parse(&fx.doc, &Dictionary::new()).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_class_map_apply() {
        let class_map = ClassMap {
            mapping: HashMap::from([(
                "Wide".to_string(),
                vec![Attribute::new("Width", PdfValue::Integer(500), "Layout")],
            )]),
        };
        let mut attributes = vec![];
        class_map.apply(&mut attributes, "Wide").unwrap();
        class_map.apply(&mut attributes, "Wide").unwrap();
        assert_eq!(attributes.len(), 1);
        assert!(matches!(
            class_map.apply(&mut attributes, "Narrow"),
            Err(TaggedPdfError::MissingAttributeClass(name)) if name == "Narrow"
        ));
    }
}
