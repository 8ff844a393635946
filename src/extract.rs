//! Per-page annotation extraction from the structure tree

use crate::annotation::{items_bbox, Annotation, Label};
use crate::layout::split_into_columns;
use crate::struct_type::StructType;
use crate::structtree::{NodeId, StructTree};
use log::{info, warn};

/// Types whose children are visited whether or not the type itself is
/// annotated.
fn recurses_into(struct_type: StructType) -> bool {
    matches!(
        struct_type,
        StructType::Document
            | StructType::NonStruct
            | StructType::Part
            | StructType::Art
            | StructType::Sect
            | StructType::Div
            | StructType::P
            | StructType::L
            | StructType::Unknown
    )
}

/// Types whose text may flow over several columns.
fn may_span_columns(struct_type: StructType) -> bool {
    matches!(struct_type, StructType::P | StructType::LI)
}

/// Annotations for `page`, in document order of the elements they come
/// from.
pub fn extract_annotations(tree: &StructTree, page: usize) -> Vec<Annotation> {
    let mut annotations = Vec::new();
    for &root in tree.roots() {
        visit(tree, root, page, &mut annotations);
    }
    annotations
}

fn visit(tree: &StructTree, id: NodeId, page: usize, out: &mut Vec<Annotation>) {
    let Some(struct_type) = tree.struct_type(id) else {
        return;
    };
    annotate_node(tree, id, struct_type, page, out);
    if recurses_into(struct_type) {
        for &child in tree.node(id).children() {
            visit(tree, child, page, out);
        }
    }
}

fn annotate_node(
    tree: &StructTree,
    id: NodeId,
    struct_type: StructType,
    page: usize,
    out: &mut Vec<Annotation>,
) {
    let Some(bbox) = tree.bbox(id, page) else {
        return;
    };
    let content: Vec<_> = tree
        .subtree_content(id, Some(page))
        .into_iter()
        .cloned()
        .collect();
    if content.is_empty() {
        warn!("no content for {} on page {}", struct_type, page);
        return;
    }
    let Some(label) = Label::from_struct_type(struct_type) else {
        return;
    };

    if !may_span_columns(struct_type) {
        out.push(Annotation::new(label, bbox, page, content).with_struct_type(struct_type));
        return;
    }

    let columns = split_into_columns(&content);
    if columns.len() > 1 {
        info!(
            "{} columns on page {} for {}: \"{}\"",
            columns.len(),
            page,
            struct_type,
            tree.text(id, Some(page), true)
        );
    }
    for items in columns {
        if let Some(bbox) = items_bbox(&items) {
            out.push(Annotation::new(label, bbox, page, items).with_struct_type(struct_type));
        }
    }
}
