//! Grouping glyphs into text lines and columns
//!
//! Uses only the geometry of the glyphs in extraction order; no reading
//! order analysis is attempted.

use crate::content::LayoutItem;
use log::{info, warn};
use std::collections::HashSet;

/// Minimum relative overlap for two spans to belong to the same group.
const SAME_GROUP_THRESHOLD: f32 = 0.5;

/// Overlap length of two spans relative to each span's own length.
///
/// A span of non-positive length yields a ratio of 0 on its side.
pub fn relative_overlaps(span1: (f32, f32), span2: (f32, f32)) -> (f32, f32) {
    let length1 = span1.1 - span1.0;
    let length2 = span2.1 - span2.0;
    let overlap = span1.1.min(span2.1) - span1.0.max(span2.0);
    if overlap < 0.0 {
        return (0.0, 0.0);
    }
    let ratio = |length: f32| if length > 0.0 { overlap / length } else { 0.0 };
    (ratio(length1), ratio(length2))
}

fn same_group(group_span: (f32, f32), span: (f32, f32)) -> bool {
    let (r1, r2) = relative_overlaps(group_span, span);
    r1.max(r2) >= SAME_GROUP_THRESHOLD
}

fn extend_span(span: (f32, f32), other: (f32, f32)) -> (f32, f32) {
    (span.0.min(other.0), span.1.max(other.1))
}

/// Group items into lines by vertical span, returning item indices.
///
/// An item continues the current line when its vertical span overlaps
/// the line's span by at least half of either length.
pub fn group_into_lines(items: &[&LayoutItem]) -> Vec<Vec<usize>> {
    let mut lines: Vec<Vec<usize>> = Vec::new();
    let mut line_span = (0.0, 0.0);
    for (i, item) in items.iter().enumerate() {
        let span = (item.bbox.lly, item.bbox.ury);
        match lines.last_mut() {
            Some(line) if same_group(line_span, span) => {
                line.push(i);
                line_span = extend_span(line_span, span);
            }
            _ => {
                lines.push(vec![i]);
                line_span = span;
            }
        }
    }
    lines
}

/// Split the items of a paragraph-like element into columns.
///
/// Glyphs are grouped into lines and consecutive lines into columns by
/// horizontal span. With fewer than two columns the input is returned
/// unchanged as a single column, graphics included; otherwise each column
/// holds its glyphs and non-glyph items are dropped with a warning.
pub fn split_into_columns(items: &[LayoutItem]) -> Vec<Vec<LayoutItem>> {
    let char_indices: Vec<usize> = (0..items.len()).filter(|&i| items[i].is_char()).collect();
    let chars: Vec<&LayoutItem> = char_indices.iter().map(|&i| &items[i]).collect();

    let mut columns: Vec<Vec<Vec<usize>>> = Vec::new();
    let mut column_span = (0.0, 0.0);
    for line in group_into_lines(&chars) {
        let (Some(&first), Some(&last)) = (line.first(), line.last()) else {
            continue;
        };
        let span = (chars[first].bbox.llx, chars[last].bbox.urx);
        match columns.last_mut() {
            Some(column) if same_group(column_span, span) => {
                column.push(line);
                column_span = extend_span(column_span, span);
            }
            _ => {
                columns.push(vec![line]);
                column_span = span;
            }
        }
    }

    if columns.len() < 2 {
        return vec![items.to_vec()];
    }

    info!("split {} items into {} columns", items.len(), columns.len());
    let mut assigned = HashSet::new();
    let split: Vec<Vec<LayoutItem>> = columns
        .iter()
        .map(|column| {
            column
                .iter()
                .flatten()
                .map(|&c| {
                    let original = char_indices[c];
                    assigned.insert(original);
                    items[original].clone()
                })
                .collect()
        })
        .collect();

    for (i, item) in items.iter().enumerate() {
        if !assigned.contains(&i) {
            warn!(
                "split_into_columns(): dropped {} at {}",
                item.kind_name(),
                item.bbox
            );
        }
    }
    split
}
