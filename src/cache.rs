//! Per-node, per-page memoized bounding boxes.

use crate::bbox::BBox;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Lazily filled bbox cells of one structure node, keyed by page index.
///
/// Cells are read and filled through a shared reference so pages can be
/// processed concurrently; clearing requires exclusive access and only
/// happens while content is being attached.
#[derive(Debug, Default)]
pub(crate) struct BBoxCache {
    cells: RwLock<HashMap<usize, Option<BBox>>>,
}

impl BBoxCache {
    /// Cached value for `page`: `None` on a miss, `Some(None)` for a page
    /// known to have no geometry.
    pub(crate) fn get(&self, page: usize) -> Option<Option<BBox>> {
        let cells = self.cells.read().unwrap_or_else(PoisonError::into_inner);
        cells.get(&page).copied()
    }

    /// Store a computed value unless another caller filled the cell first,
    /// returning whichever value ends up cached.
    pub(crate) fn fill(&self, page: usize, value: Option<BBox>) -> Option<BBox> {
        let mut cells = self.cells.write().unwrap_or_else(PoisonError::into_inner);
        *cells.entry(page).or_insert(value)
    }

    pub(crate) fn clear(&mut self) {
        self.cells
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        let cells = self.cells.read().unwrap_or_else(PoisonError::into_inner);
        cells.is_empty()
    }
}
