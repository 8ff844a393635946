//! Logical structure tree (ISO 32000-1:2008, Section 14.7)
//!
//! Nodes live in an arena owned by [`StructTree`] and refer to each other
//! by [`NodeId`]. Children are owned in document order; the parent link
//! is only followed upward to propagate pages and invalidate cached
//! bounding boxes.

use crate::attribute::Attribute;
use crate::bbox::BBox;
use crate::builder::{ClassMap, RoleMap};
use crate::cache::BBoxCache;
use crate::content::{items_text, LayoutItem};
use crate::parent_index::ParentIndex;
use crate::struct_type::StructType;
use crate::TaggedPdfError;
use log::{error, warn};
use lopdf::ObjectId;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

/// Index of a node in its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A structure element (`StructElem`).
#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    /// Indirect object the element was read from
    pub object_id: Option<ObjectId>,
    /// Type after role mapping
    pub struct_type: StructType,
    /// Type as written in `/S`
    pub original_type: String,
    pub attributes: Vec<Attribute>,
    pub attribute_classes: Vec<String>,
    /// Page object from `/Pg`
    pub page_object: Option<ObjectId>,
    pub id: Option<String>,
    pub revision: Option<i64>,
    pub title: Option<String>,
    pub lang: Option<String>,
    pub alt: Option<String>,
    pub expanded: Option<String>,
    pub actual_text: Option<String>,
}

impl ElementData {
    /// Attributes with repeated names removed, first occurrence winning.
    pub fn deduplicated_attributes(&self) -> Vec<&Attribute> {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(self.attributes.len());
        for attr in &self.attributes {
            if seen.insert(attr.name.as_str()) {
                unique.push(attr);
            } else {
                warn!(
                    "dropping duplicate attribute {} of {}",
                    attr.name, self.struct_type
                );
            }
        }
        unique
    }
}

/// Marked content identified by an MCID, either written as a bare integer
/// or as a marked-content reference (`MCR`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentLeaf {
    pub mcid: i64,
    /// Page object whose content stream holds the MCID
    pub page_object: Option<ObjectId>,
    /// Content stream from `/Stm`, when not the page's own
    pub stream: Option<ObjectId>,
    content_by_page: BTreeMap<usize, Vec<LayoutItem>>,
}

impl ContentLeaf {
    pub fn new(mcid: i64, page_object: Option<ObjectId>, stream: Option<ObjectId>) -> Self {
        Self {
            mcid,
            page_object,
            stream,
            content_by_page: BTreeMap::new(),
        }
    }

    /// Items attached on `page`, in extraction order.
    pub fn items(&self, page: usize) -> &[LayoutItem] {
        self.content_by_page
            .get(&page)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Items of every page, pages in ascending order.
    pub fn all_items(&self) -> impl Iterator<Item = &LayoutItem> {
        self.content_by_page.values().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.content_by_page.values().all(Vec::is_empty)
    }
}

/// Reference to a non-structure object (`OBJR`), such as an annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRefLeaf {
    pub object: ObjectId,
    pub page_object: Option<ObjectId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element(ElementData),
    Content(ContentLeaf),
    ObjectRef(ObjectRefLeaf),
}

#[derive(Debug)]
pub struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    pages: BTreeSet<usize>,
    cache: BBoxCache,
    kind: NodeKind,
}

impl Node {
    pub(crate) fn new(parent: Option<NodeId>, kind: NodeKind) -> Self {
        Self {
            parent,
            children: Vec::new(),
            pages: BTreeSet::new(),
            cache: BBoxCache::default(),
            kind,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Pages on which content of this subtree has been seen.
    pub fn pages(&self) -> &BTreeSet<usize> {
        &self.pages
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.kind {
            NodeKind::Element(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn as_content(&self) -> Option<&ContentLeaf> {
        match &self.kind {
            NodeKind::Content(leaf) => Some(leaf),
            _ => None,
        }
    }

    /// Resolved type for elements, `None` for leaves.
    pub fn struct_type(&self) -> Option<StructType> {
        self.as_element().map(|e| e.struct_type)
    }
}

/// Structure tree of one document.
#[derive(Debug, Default)]
pub struct StructTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) roots: Vec<NodeId>,
    pub(crate) element_map: HashMap<ObjectId, NodeId>,
    pub(crate) id_index: BTreeMap<Vec<u8>, ObjectId>,
    pub(crate) parent_index: Option<ParentIndex>,
    pub(crate) role_map: RoleMap,
    pub(crate) class_map: Option<ClassMap>,
}

impl StructTree {
    /// Append a node to the arena, linking it under `parent`.
    pub(crate) fn push_node(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        if let NodeKind::Element(ElementData {
            object_id: Some(object_id),
            ..
        }) = &kind
        {
            self.element_map.insert(*object_id, id);
        }
        self.nodes.push(Node::new(parent, kind));
        match parent {
            Some(p) => self.nodes[p.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Top-level elements (the kids of `StructTreeRoot`).
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node in document order.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.roots.iter().flat_map(move |&root| self.subtree(root))
    }

    /// `id` and its descendants in document order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            order.push(current);
            stack.extend(self.nodes[current.0].children.iter().rev());
        }
        order
    }

    pub fn struct_type(&self, id: NodeId) -> Option<StructType> {
        self.nodes[id.0].struct_type()
    }

    /// Element read from the indirect object `object_id`.
    pub fn element_by_object(&self, object_id: ObjectId) -> Option<NodeId> {
        self.element_map.get(&object_id).copied()
    }

    /// Element with the given `/ID`, looked up through `IDTree`.
    pub fn element_by_id(&self, id: &[u8]) -> Option<NodeId> {
        self.id_index
            .get(id)
            .and_then(|object_id| self.element_by_object(*object_id))
    }

    pub fn parent_index(&self) -> Option<&ParentIndex> {
        self.parent_index.as_ref()
    }

    pub fn role_map(&self) -> &RoleMap {
        &self.role_map
    }

    pub fn class_map(&self) -> Option<&ClassMap> {
        self.class_map.as_ref()
    }

    /// Record that content of `id` appears on `page`, propagating upward
    /// until an ancestor already knows the page.
    pub fn add_page(&mut self, id: NodeId, page: usize) {
        let mut current = Some(id);
        let mut changed = false;
        while let Some(n) = current {
            let node = &mut self.nodes[n.0];
            if !node.pages.insert(page) {
                break;
            }
            changed = true;
            current = node.parent;
        }
        // Page counts feed the explicit BBox rule
        if changed {
            self.invalidate(id);
        }
    }

    /// Clear cached bounding boxes of `id` and all its ancestors.
    fn invalidate(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(n) = current {
            let node = &mut self.nodes[n.0];
            node.cache.clear();
            current = node.parent;
        }
    }

    /// Child leaf of `element` holding `mcid`.
    ///
    /// MCIDs are unique per content stream only, so a leaf whose page
    /// matches `page_object` is preferred over the first MCID match.
    pub fn find_content_leaf(
        &self,
        element: NodeId,
        mcid: i64,
        page_object: Option<ObjectId>,
    ) -> Option<NodeId> {
        let mut first = None;
        for &child in &self.nodes[element.0].children {
            let Some(leaf) = self.nodes[child.0].as_content() else {
                continue;
            };
            if leaf.mcid != mcid {
                continue;
            }
            if page_object.is_some() && leaf.page_object == page_object {
                return Some(child);
            }
            first.get_or_insert(child);
        }
        first
    }

    /// Attach an item to a content leaf on `page`.
    pub fn add_content_item(
        &mut self,
        leaf: NodeId,
        page: usize,
        item: LayoutItem,
    ) -> Result<(), TaggedPdfError> {
        match &mut self.nodes[leaf.0].kind {
            NodeKind::Content(content) => {
                content.content_by_page.entry(page).or_default().push(item)
            }
            _ => {
                return Err(TaggedPdfError::Structure(
                    "content can only be attached to marked-content leaves".to_string(),
                ))
            }
        }
        self.add_page(leaf, page);
        self.invalidate(leaf);
        Ok(())
    }

    /// Items attached directly to `id`, for one page or all pages.
    pub fn content(&self, id: NodeId, page: Option<usize>) -> Vec<&LayoutItem> {
        match (&self.nodes[id.0].kind, page) {
            (NodeKind::Content(leaf), Some(page)) => leaf.items(page).iter().collect(),
            (NodeKind::Content(leaf), None) => leaf.all_items().collect(),
            _ => Vec::new(),
        }
    }

    /// Items attached anywhere in the subtree of `id`, in document order.
    pub fn subtree_content(&self, id: NodeId, page: Option<usize>) -> Vec<&LayoutItem> {
        self.subtree(id)
            .into_iter()
            .flat_map(|n| self.content(n, page))
            .collect()
    }

    pub fn has_content(&self, id: NodeId, page: Option<usize>) -> bool {
        self.subtree(id)
            .into_iter()
            .any(|n| !self.content(n, page).is_empty())
    }

    /// Concatenated text of the items of `id` (and its subtree when
    /// `recursive`).
    pub fn text(&self, id: NodeId, page: Option<usize>, recursive: bool) -> String {
        if recursive {
            items_text(self.subtree_content(id, page))
        } else {
            items_text(self.content(id, page))
        }
    }

    /// Bounding box of the content of `id` on `page`.
    ///
    /// Computed on first request and cached until content is attached
    /// somewhere in the subtree.
    pub fn bbox(&self, id: NodeId, page: usize) -> Option<BBox> {
        let node = &self.nodes[id.0];
        if let Some(cached) = node.cache.get(page) {
            return cached;
        }
        let computed = self.compute_bbox(id, page);
        node.cache.fill(page, computed)
    }

    fn compute_bbox(&self, id: NodeId, page: usize) -> Option<BBox> {
        let node = &self.nodes[id.0];
        if !node.pages.contains(&page) {
            return None;
        }

        let mut boxes = Vec::new();
        if let NodeKind::Content(leaf) = &node.kind {
            boxes.extend(
                leaf.items(page)
                    .iter()
                    .filter(|item| !item.is_space_text())
                    .map(|item| item.bbox),
            );
        }
        boxes.extend(node.children.iter().filter_map(|&c| self.bbox(c, page)));

        if let NodeKind::Element(elem) = &node.kind {
            let explicit: Vec<BBox> = elem.attributes.iter().filter_map(Attribute::as_bbox).collect();
            if !explicit.is_empty() {
                if node.pages.len() == 1 {
                    boxes.extend(explicit);
                } else {
                    error!(
                        "{} spans {} pages, ignoring its /BBox attribute",
                        elem.struct_type,
                        node.pages.len()
                    );
                }
            }
        }

        BBox::union_all(&boxes)
    }

    #[cfg(test)]
    pub(crate) fn is_cached(&self, id: NodeId) -> bool {
        !self.nodes[id.0].cache.is_empty()
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        let node = &self.nodes[id.0];
        match &node.kind {
            NodeKind::Element(elem) => {
                write!(f, "{}{}", indent, elem.original_type)?;
                if elem.struct_type.as_str() != elem.original_type {
                    write!(f, " [{}]", elem.struct_type)?;
                }
                if let Some(elem_id) = &elem.id {
                    write!(f, " <{}>", elem_id)?;
                }
                if let Some(title) = &elem.title {
                    write!(f, " \"{}\"", title)?;
                }
                let category = elem.struct_type.category();
                if elem.struct_type.is_block() || elem.struct_type.is_inline() {
                    write!(f, " ({})", category.as_str())?;
                }
                let attributes = elem.deduplicated_attributes();
                if attributes.is_empty() {
                    writeln!(f)?;
                } else {
                    writeln!(f, ":")?;
                    for attr in attributes {
                        writeln!(f, "{}   {}", indent, attr)?;
                    }
                }
                for &child in &node.children {
                    self.fmt_node(f, child, depth + 1)?;
                }
            }
            NodeKind::Content(leaf) => {
                let text = items_text(leaf.all_items());
                if !text.is_empty() {
                    writeln!(f, "{}\"{}\"", indent, text)?;
                }
            }
            NodeKind::ObjectRef(objr) => {
                writeln!(f, "{}Object {} {}", indent, objr.object.0, objr.object.1)?;
            }
        }
        Ok(())
    }
}

/// Indented outline of the tree, one element per line with its
/// attributes and attached text.
impl fmt::Display for StructTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &root in &self.roots {
            self.fmt_node(f, root, 0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::PdfValue;

    fn element(struct_type: StructType) -> NodeKind {
        NodeKind::Element(ElementData {
            object_id: None,
            struct_type,
            original_type: struct_type.as_str().to_string(),
            attributes: Vec::new(),
            attribute_classes: Vec::new(),
            page_object: None,
            id: None,
            revision: None,
            title: None,
            lang: None,
            alt: None,
            expanded: None,
            actual_text: None,
        })
    }

    fn leaf(mcid: i64) -> NodeKind {
        NodeKind::Content(ContentLeaf::new(mcid, None, None))
    }

    fn bbox_attr(coords: [f32; 4]) -> Attribute {
        Attribute::new(
            "BBox",
            PdfValue::Array(coords.iter().map(|&c| PdfValue::Real(c)).collect()),
            "Layout",
        )
    }

    /// Document > Sect > P > [mcid 0, mcid 1]
    fn sample() -> (StructTree, NodeId, NodeId, NodeId, NodeId, NodeId) {
        let mut tree = StructTree::default();
        let doc = tree.push_node(None, element(StructType::Document));
        let sect = tree.push_node(Some(doc), element(StructType::Sect));
        let p = tree.push_node(Some(sect), element(StructType::P));
        let a = tree.push_node(Some(p), leaf(0));
        let b = tree.push_node(Some(p), leaf(1));
        (tree, doc, sect, p, a, b)
    }

    #[test]
    fn test_document_order() {
        let (tree, doc, sect, p, a, b) = sample();
        assert_eq!(tree.iter().collect::<Vec<_>>(), vec![doc, sect, p, a, b]);
        assert_eq!(tree.subtree(p), vec![p, a, b]);
        assert_eq!(tree.node(a).parent(), Some(p));
    }

    #[test]
    fn test_pages_propagate_to_ancestors() {
        let (mut tree, doc, sect, p, a, _) = sample();
        tree.add_content_item(a, 2, LayoutItem::char("x", BBox::new(0.0, 0.0, 5.0, 10.0)))
            .unwrap();
        for id in [doc, sect, p, a] {
            assert!(tree.node(id).pages().contains(&2));
        }
        assert!(!tree.node(doc).pages().contains(&0));
    }

    #[test]
    fn test_bbox_is_union_of_descendants() {
        let (mut tree, doc, _, p, a, b) = sample();
        tree.add_content_item(a, 0, LayoutItem::char("a", BBox::new(10.0, 10.0, 20.0, 20.0)))
            .unwrap();
        tree.add_content_item(b, 0, LayoutItem::char("b", BBox::new(30.0, 5.0, 40.0, 15.0)))
            .unwrap();
        let expected = Some(BBox::new(10.0, 5.0, 40.0, 20.0));
        assert_eq!(tree.bbox(p, 0), expected);
        assert_eq!(tree.bbox(doc, 0), expected);
        assert_eq!(tree.bbox(doc, 1), None);
        assert_eq!(tree.text(doc, Some(0), true), "ab");
        assert_eq!(tree.text(doc, Some(0), false), "");
    }

    #[test]
    fn test_whitespace_items_do_not_count() {
        let (mut tree, _, _, p, a, _) = sample();
        tree.add_content_item(a, 0, LayoutItem::char("a", BBox::new(0.0, 0.0, 5.0, 10.0)))
            .unwrap();
        tree.add_content_item(a, 0, LayoutItem::char(" ", BBox::new(100.0, 0.0, 105.0, 10.0)))
            .unwrap();
        assert_eq!(tree.bbox(p, 0), Some(BBox::new(0.0, 0.0, 5.0, 10.0)));
    }

    #[test]
    fn test_attach_invalidates_ancestors() {
        let (mut tree, doc, sect, p, a, b) = sample();
        tree.add_content_item(a, 0, LayoutItem::char("a", BBox::new(0.0, 0.0, 5.0, 10.0)))
            .unwrap();
        assert_eq!(tree.bbox(doc, 0), Some(BBox::new(0.0, 0.0, 5.0, 10.0)));
        assert!(tree.is_cached(doc) && tree.is_cached(sect) && tree.is_cached(p));

        tree.add_content_item(b, 0, LayoutItem::char("b", BBox::new(50.0, 50.0, 55.0, 60.0)))
            .unwrap();
        assert!(!tree.is_cached(doc) && !tree.is_cached(sect) && !tree.is_cached(p));
        assert_eq!(tree.bbox(doc, 0), Some(BBox::new(0.0, 0.0, 55.0, 60.0)));
    }

    #[test]
    fn test_explicit_bbox_only_on_single_page() {
        let mut tree = StructTree::default();
        let mut figure = element(StructType::Figure);
        if let NodeKind::Element(elem) = &mut figure {
            elem.attributes.push(bbox_attr([0.0, 0.0, 100.0, 100.0]));
        }
        let fig = tree.push_node(None, figure);
        let mc = tree.push_node(Some(fig), leaf(0));

        // No content on any page yet
        assert_eq!(tree.bbox(fig, 0), None);

        tree.add_content_item(mc, 0, LayoutItem::char("x", BBox::new(10.0, 10.0, 20.0, 20.0)))
            .unwrap();
        assert_eq!(tree.bbox(fig, 0), Some(BBox::new(0.0, 0.0, 100.0, 100.0)));

        tree.add_content_item(mc, 1, LayoutItem::char("y", BBox::new(10.0, 10.0, 20.0, 20.0)))
            .unwrap();
        assert_eq!(tree.bbox(fig, 0), Some(BBox::new(10.0, 10.0, 20.0, 20.0)));
    }

    #[test]
    fn test_find_content_leaf_prefers_page_match() {
        let mut tree = StructTree::default();
        let p = tree.push_node(None, element(StructType::P));
        let first = tree.push_node(
            Some(p),
            NodeKind::Content(ContentLeaf::new(0, Some((1, 0)), None)),
        );
        let second = tree.push_node(
            Some(p),
            NodeKind::Content(ContentLeaf::new(0, Some((2, 0)), None)),
        );
        assert_eq!(tree.find_content_leaf(p, 0, Some((2, 0))), Some(second));
        assert_eq!(tree.find_content_leaf(p, 0, Some((9, 0))), Some(first));
        assert_eq!(tree.find_content_leaf(p, 0, None), Some(first));
        assert_eq!(tree.find_content_leaf(p, 1, None), None);
    }

    #[test]
    fn test_content_only_on_leaves() {
        let (mut tree, _, _, p, _, _) = sample();
        let item = LayoutItem::char("x", BBox::new(0.0, 0.0, 1.0, 1.0));
        assert!(tree.add_content_item(p, 0, item).is_err());
    }

    #[test]
    fn test_deduplicated_attributes() {
        let mut elem = match element(StructType::Table) {
            NodeKind::Element(e) => e,
            _ => unreachable!(),
        };
        elem.attributes.push(Attribute::new("Summary", PdfValue::String("a".into()), "Table"));
        elem.attributes.push(Attribute::new("Summary", PdfValue::String("b".into()), "Table"));
        let unique = elem.deduplicated_attributes();
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].value, PdfValue::String("a".into()));
    }

    #[test]
    fn test_outline() {
        let (mut tree, ..) = sample();
        let a = NodeId(3);
        tree.add_content_item(a, 0, LayoutItem::char("H", BBox::new(0.0, 0.0, 1.0, 1.0)))
            .unwrap();
        let outline = tree.to_string();
        assert_eq!(outline, "Document\n  Sect\n    P (block)\n      \"H\"\n");
    }
}
