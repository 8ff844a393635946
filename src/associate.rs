//! Attaching extracted content to structure leaves
//!
//! A marked-content sequence is found from its page's `StructParents` key:
//! the parent tree maps the key to an array indexed by MCID, whose entry
//! references the structure element that owns the sequence (ISO
//! 32000-1:2008, Section 14.7.4.4). Items that cannot be resolved are kept
//! as non-marked content.

use crate::content::{LayoutItem, TaggedItem};
use crate::document::PageInfo;
use crate::parent_index::{LookupMiss, ParentEntry};
use crate::structtree::{NodeId, StructTree};
use crate::TaggedPdfError;
use log::{error, warn};
use std::collections::BTreeMap;

/// Outcome of attaching a sequence of tagged items.
#[derive(Debug, Default)]
pub struct Association {
    /// Items attached to structure leaves
    pub attached: usize,
    /// Items outside marked content or whose owner could not be resolved
    pub nonmarked_by_page: BTreeMap<usize, Vec<LayoutItem>>,
}

impl Association {
    pub fn nonmarked(&self, page: usize) -> &[LayoutItem] {
        self.nonmarked_by_page
            .get(&page)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn nonmarked_count(&self) -> usize {
        self.nonmarked_by_page.values().map(Vec::len).sum()
    }
}

/// Attach `items` to the leaves of `tree`, in order.
///
/// Fails only when an item carries more than one MCID; every other miss
/// is logged and the item recorded as non-marked.
pub fn associate_content<I>(
    tree: &mut StructTree,
    pages: &[PageInfo],
    items: I,
) -> Result<Association, TaggedPdfError>
where
    I: IntoIterator<Item = TaggedItem>,
{
    let mut association = Association::default();
    for tagged in items {
        let page = tagged.page;
        let leaf = match tagged.mcid()? {
            Some(mcid) => find_leaf(tree, pages, page, mcid),
            None => None,
        };
        match leaf {
            Some(leaf) => {
                tree.add_content_item(leaf, page, tagged.item)?;
                association.attached += 1;
            }
            None => association
                .nonmarked_by_page
                .entry(page)
                .or_default()
                .push(tagged.item),
        }
    }
    Ok(association)
}

/// Content leaf owning `mcid` on `page`.
pub fn find_leaf(tree: &StructTree, pages: &[PageInfo], page: usize, mcid: i64) -> Option<NodeId> {
    let Some(info) = pages.get(page) else {
        error!("failed to find parent tree index for page {}", page);
        return None;
    };
    let Some(key) = info.struct_parents else {
        warn!("StructParents for page {} is missing", page);
        return None;
    };
    let Some(index) = tree.parent_index() else {
        warn!("no parent tree for MCID {} on page {}", mcid, page);
        return None;
    };
    let object_id = match index.lookup(key, mcid) {
        Ok(id) => id,
        Err(LookupMiss::OutOfRange { len }) => {
            error!(
                "invalid reference {} to parent tree of {} items",
                mcid, len
            );
            return None;
        }
        Err(miss) => {
            warn!(
                "no parent tree entry for MCID {} on page {} ({:?})",
                mcid, page, miss
            );
            return None;
        }
    };
    let Some(element) = tree.element_by_object(object_id) else {
        warn!(
            "parent tree entry {} {} R is not a known StructElem",
            object_id.0, object_id.1
        );
        return None;
    };
    let leaf = tree.find_content_leaf(element, mcid, Some(info.object_id));
    if leaf.is_none() {
        warn!(
            "StructElem {} {} R has no child with MCID {}",
            object_id.0, object_id.1, mcid
        );
    }
    leaf
}

/// Record on every element listed in a page's parent tree array that it
/// has content on that page.
pub fn mark_pages(tree: &mut StructTree, pages: &[PageInfo]) {
    let mut marks = Vec::new();
    if let Some(index) = tree.parent_index() {
        for (page, info) in pages.iter().enumerate() {
            let Some(key) = info.struct_parents else {
                continue;
            };
            let parents = match index.get(key) {
                Some(ParentEntry::MarkedContent(parents)) => parents,
                Some(ParentEntry::Object(_)) => {
                    warn!("parent tree entry {} of page {} is not an array", key, page);
                    continue;
                }
                None => {
                    warn!("parent tree has no entry {} for page {}", key, page);
                    continue;
                }
            };
            marks.extend(
                parents
                    .iter()
                    .flatten()
                    .filter_map(|id| tree.element_by_object(*id))
                    .map(|element| (element, page)),
            );
        }
    }
    for (element, page) in marks {
        tree.add_page(element, page);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use crate::content::ContentTag;
    use lopdf::{dictionary, Document, Object, ObjectId};

    /// One page whose StructParents 0 maps MCIDs 0 and 1 to a P element
    /// under a Document root.
    fn fixture() -> (StructTree, Vec<PageInfo>, ObjectId) {
        let mut doc = Document::with_version("1.7");
        let root_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! { "Type" => "Page" });
        let document_id = doc.new_object_id();
        let p_id = doc.add_object(dictionary! {
            "S" => "P",
            "P" => Object::Reference(document_id),
            "Pg" => Object::Reference(page_id),
            "K" => Object::Array(vec![Object::Integer(0), Object::Integer(1)]),
        });
        doc.objects.insert(
            document_id,
            Object::Dictionary(dictionary! {
                "S" => "Document",
                "P" => Object::Reference(root_id),
                "K" => Object::Reference(p_id),
            }),
        );
        let root = dictionary! {
            "K" => Object::Reference(document_id),
            "ParentTree" => dictionary! {
                "Nums" => Object::Array(vec![
                    Object::Integer(0),
                    Object::Array(vec![Object::Reference(p_id), Object::Reference(p_id), Object::Null]),
                ]),
            },
        };
        let tree = StructTree::parse(&doc, &root).unwrap();
        let pages = vec![PageInfo {
            object_id: page_id,
            struct_parents: Some(0),
            crop_box: None,
        }];
        (tree, pages, p_id)
    }

    fn glyph(x: f32) -> LayoutItem {
        LayoutItem::char("a", BBox::new(x, 0.0, x + 5.0, 10.0))
    }

    #[test]
    fn test_round_trip() {
        let (mut tree, pages, p_id) = fixture();
        let items = vec![
            TaggedItem::marked(0, 1, glyph(10.0)),
            TaggedItem::marked(0, 0, glyph(0.0)),
        ];
        let association = associate_content(&mut tree, &pages, items).unwrap();
        assert_eq!(association.attached, 2);
        assert_eq!(association.nonmarked_count(), 0);

        let p = tree.element_by_object(p_id).unwrap();
        let leaf = tree.find_content_leaf(p, 1, None).unwrap();
        assert_eq!(tree.content(leaf, Some(0)), vec![&glyph(10.0)]);
        let expected = Some(BBox::new(0.0, 0.0, 15.0, 10.0));
        assert_eq!(tree.bbox(p, 0), expected);
        assert_eq!(tree.bbox(tree.roots()[0], 0), expected);
    }

    #[test]
    fn test_misses_become_nonmarked() {
        let (mut tree, pages, _) = fixture();
        let items = vec![
            // Null slot
            TaggedItem::marked(0, 2, glyph(0.0)),
            // Out of range
            TaggedItem::marked(0, 9, glyph(0.0)),
            // No such page
            TaggedItem::marked(3, 0, glyph(0.0)),
            TaggedItem::unmarked(0, LayoutItem::line(BBox::new(0.0, 0.0, 100.0, 0.0), 1.0)),
            TaggedItem::new(0, vec![ContentTag::new("Artifact")], glyph(0.0)),
        ];
        let association = associate_content(&mut tree, &pages, items).unwrap();
        assert_eq!(association.attached, 0);
        assert_eq!(association.nonmarked(0).len(), 4);
        assert_eq!(association.nonmarked(3).len(), 1);
    }

    #[test]
    fn test_nested_mcids_are_fatal() {
        let (mut tree, pages, _) = fixture();
        let items = vec![TaggedItem::new(
            0,
            vec![ContentTag::with_mcid("P", 0), ContentTag::with_mcid("Span", 1)],
            glyph(0.0),
        )];
        assert!(matches!(
            associate_content(&mut tree, &pages, items),
            Err(TaggedPdfError::NestedMarkedContent { page: 0 })
        ));
    }

    #[test]
    fn test_mark_pages() {
        let (mut tree, pages, p_id) = fixture();
        mark_pages(&mut tree, &pages);
        let p = tree.element_by_object(p_id).unwrap();
        assert!(tree.node(p).pages().contains(&0));
        assert!(tree.node(tree.roots()[0]).pages().contains(&0));
        // No content yet, so no geometry
        assert_eq!(tree.bbox(p, 0), None);
    }

    #[test]
    fn test_mark_pages_skips_unknown_keys() {
        let (mut tree, mut pages, p_id) = fixture();
        let page_id = pages[0].object_id;
        pages[0].struct_parents = Some(7);
        pages.push(PageInfo {
            object_id: page_id,
            struct_parents: Some(0),
            crop_box: None,
        });
        mark_pages(&mut tree, &pages);
        let p = tree.element_by_object(p_id).unwrap();
        // Page 0 has no parent tree entry; page 1 still gets marked
        assert!(!tree.node(p).pages().contains(&0));
        assert!(tree.node(p).pages().contains(&1));
    }
}
