//! Removing duplicate and nested annotations

use crate::annotation::{Annotation, Label};
use log::debug;
use std::collections::HashSet;

/// Diagnostic record of two annotations that still overlap.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapReport {
    pub page: usize,
    pub first: Label,
    pub second: Label,
    pub jaccard: f32,
    /// Fraction of the first box covered by the second
    pub first_overlap: f32,
    pub first_contains_second: bool,
    /// Fraction of the second box covered by the first
    pub second_overlap: f32,
    pub second_contains_first: bool,
}

/// Index pairs `(i, j)`, `i < j`, of overlapping annotations.
fn find_overlaps(annotations: &[Annotation]) -> Vec<(usize, usize)> {
    let mut overlaps = Vec::new();
    for i in 0..annotations.len() {
        for j in i + 1..annotations.len() {
            if annotations[i].bbox.overlaps(&annotations[j].bbox) {
                overlaps.push((i, j));
            }
        }
    }
    overlaps
}

/// Later member of each pair with identical boxes. Which duplicate
/// survives is arbitrary; the earlier one is kept.
fn find_duplicates(annotations: &[Annotation], overlaps: &[(usize, usize)]) -> HashSet<usize> {
    overlaps
        .iter()
        .filter(|&&(i, j)| annotations[i].bbox == annotations[j].bbox)
        .map(|&(_, j)| j)
        .collect()
}

/// Annotations strictly inside another one that is not itself ignored.
fn find_contained(
    annotations: &[Annotation],
    overlaps: &[(usize, usize)],
    ignore: &HashSet<usize>,
) -> HashSet<usize> {
    let mut contained = HashSet::new();
    for &(i, j) in overlaps {
        let (a, b) = (&annotations[i].bbox, &annotations[j].bbox);
        if a == b {
            continue;
        }
        if a.contains(b) && !ignore.contains(&i) {
            contained.insert(j);
        } else if b.contains(a) && !ignore.contains(&j) {
            contained.insert(i);
        }
    }
    contained
}

/// Drop duplicates and annotations nested in others, keeping the order
/// of the survivors. Remaining overlaps are logged, not resolved.
pub fn eliminate_overlaps(annotations: Vec<Annotation>) -> Vec<Annotation> {
    let overlaps = find_overlaps(&annotations);
    let mut eliminated = find_duplicates(&annotations, &overlaps);
    let contained = find_contained(&annotations, &overlaps, &eliminated);
    eliminated.extend(contained);

    let remaining: Vec<Annotation> = annotations
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !eliminated.contains(i))
        .map(|(_, a)| a)
        .collect();

    for report in find_residual_overlaps(&remaining) {
        debug!(
            "OVERLAP: page {} {} {} {:.3} {:.3} {} {:.3} {}",
            report.page,
            report.first,
            report.second,
            report.jaccard,
            report.first_overlap,
            report.first_contains_second,
            report.second_overlap,
            report.second_contains_first
        );
    }
    remaining
}

/// Every overlapping pair in `annotations`.
pub fn find_residual_overlaps(annotations: &[Annotation]) -> Vec<OverlapReport> {
    find_overlaps(annotations)
        .into_iter()
        .map(|(i, j)| {
            let (a, b) = (&annotations[i], &annotations[j]);
            OverlapReport {
                page: a.page,
                first: a.label,
                second: b.label,
                jaccard: a.bbox.jaccard(&b.bbox),
                first_overlap: a.bbox.relative_overlap(&b.bbox),
                first_contains_second: a.bbox.contains(&b.bbox),
                second_overlap: b.bbox.relative_overlap(&a.bbox),
                second_contains_first: b.bbox.contains(&a.bbox),
            }
        })
        .collect()
}
