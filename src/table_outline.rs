//! Growing table boxes to cover their ruling lines
//!
//! Tables often draw their borders as untagged graphics, so the box of a
//! tagged table covers only its cell text. Lines and rectangles outside
//! any marked content that touch exactly one table are merged into that
//! table's box until no table grows any more.

use crate::annotation::{Annotation, Label};
use crate::bbox::BBox;
use crate::content::{ItemKind, LayoutItem};
use log::warn;
use std::collections::BTreeMap;

/// Default distance within which a graphic counts as touching a table.
pub const DEFAULT_OUTLINE_MARGIN: f32 = 4.0;

/// Growth beyond which an extension is logged as suspicious.
const LARGE_EXTENSION: f32 = 1.5;

/// Area covered by a graphic including half its stroke width, so
/// hairlines drawn as zero-height paths still have extent. Only used to
/// decide which table a graphic touches.
fn stroke_extent(item: &LayoutItem) -> BBox {
    match item.kind {
        ItemKind::Line { line_width } | ItemKind::Rect { line_width } if line_width > 0.0 => {
            item.bbox.padded(line_width / 2.0)
        }
        _ => item.bbox,
    }
}

/// Extend the boxes of the table annotations on `page` with outline
/// graphics taken from `nonmarked`.
pub fn extend_table_outlines(
    annotations: &mut [Annotation],
    nonmarked: &[LayoutItem],
    margin: f32,
) {
    let tables: Vec<usize> = annotations
        .iter()
        .enumerate()
        .filter(|(_, a)| a.label == Label::Table)
        .map(|(i, _)| i)
        .collect();
    if tables.is_empty() {
        return;
    }

    // (stroke extent, geometric box)
    let mut candidates: Vec<(BBox, BBox)> = nonmarked
        .iter()
        .filter(|item| item.is_outline_graphic())
        .map(|item| (stroke_extent(item), item.bbox))
        .collect();

    loop {
        let mut outline_by_table: BTreeMap<usize, Vec<BBox>> = BTreeMap::new();
        let mut remaining = Vec::new();
        for candidate in candidates {
            let (extent, bbox) = candidate;
            let touching: Vec<usize> = tables
                .iter()
                .copied()
                .filter(|&t| extent.overlaps(&annotations[t].bbox.padded(margin)))
                .collect();
            match touching.as_slice() {
                [] => remaining.push(candidate),
                [table] => outline_by_table.entry(*table).or_default().push(bbox),
                // Ambiguous, and merging would create new overlaps
                _ => {}
            }
        }

        let mut extended = false;
        for (table, outline) in outline_by_table {
            let annotation = &mut annotations[table];
            let Some(outline_bbox) = BBox::union_all(&outline) else {
                continue;
            };
            let grown = annotation.bbox.union(&outline_bbox);
            let area = annotation.bbox.area();
            let relative_area = if area > 0.0 {
                grown.area() / area
            } else if grown.area() > 0.0 {
                f32::INFINITY
            } else {
                1.0
            };
            if relative_area > 1.0 {
                if relative_area > LARGE_EXTENSION {
                    warn!(
                        "extended table to {:.1}% on page {}",
                        relative_area * 100.0,
                        annotation.page
                    );
                }
                annotation.bbox = grown;
                extended = true;
            }
        }

        if !extended {
            break;
        }
        candidates = remaining;
    }
}
