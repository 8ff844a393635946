//! Structure-tree reconstruction and layout annotation for tagged PDFs
//!
//! This crate provides:
//! - A logical structure tree built from `StructTreeRoot`, with role-map
//!   and attribute-class resolution
//! - Association of externally extracted, marked-content tagged items with
//!   the tree through the parent tree
//! - Lazily cached per-page bounding boxes of structure elements
//! - Per-page labelled regions (paragraphs, headings, tables, figures,
//!   captions, ...) derived from the tree

pub mod annotation;
pub mod associate;
pub mod attribute;
pub mod bbox;
pub mod builder;
mod cache;
pub mod caption;
pub mod content;
pub mod document;
pub mod extract;
pub mod layout;
pub mod overlap;
pub mod parent_index;
pub mod parsing;
pub mod struct_type;
pub mod structtree;
pub mod table_outline;
pub mod tree_map;

pub use annotation::{assign_tokens, Annotation, Label, Token};
pub use associate::{associate_content, Association};
pub use attribute::{Attribute, PdfValue};
pub use bbox::BBox;
pub use builder::{ClassMap, RoleMap};
pub use caption::{assign_captions, CaptionConfig, CaptionLanguage, CaptionMatcher};
pub use content::{ContentTag, ItemKind, LayoutItem, TagStack, TaggedItem};
pub use document::{AnnotateOptions, MarkInfo, PageInfo, TaggedPdf};
pub use extract::extract_annotations;
pub use overlap::{eliminate_overlaps, find_residual_overlaps, OverlapReport};
pub use parent_index::{ParentEntry, ParentIndex};
pub use struct_type::{ElementCategory, StructType};
pub use structtree::{NodeId, NodeKind, StructTree};
pub use table_outline::extend_table_outlines;
pub use tree_map::{NameTree, NumberTree};

use std::path::Path;

/// Annotations of every page of a document
#[derive(Debug)]
pub struct AnnotationResult {
    /// Annotations per page, indexed by zero-based page number
    pub pages: Vec<Vec<Annotation>>,
    /// Items that could not be attached to the structure tree
    pub nonmarked_count: usize,
    /// Page count
    pub page_count: usize,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

/// Annotate a tagged PDF file
///
/// This function will:
/// 1. Load the document and build its structure tree
/// 2. Attach the externally extracted `items` to the tree
/// 3. Derive the annotations of every page
pub fn annotate_pdf<P: AsRef<Path>>(
    path: P,
    items: Vec<TaggedItem>,
    options: &AnnotateOptions,
) -> Result<AnnotationResult, TaggedPdfError> {
    let start = std::time::Instant::now();
    let pdf = TaggedPdf::load(path)?;
    annotate_loaded(pdf, items, options, start)
}

/// Annotate a tagged PDF held in a memory buffer
pub fn annotate_pdf_mem(
    buffer: &[u8],
    items: Vec<TaggedItem>,
    options: &AnnotateOptions,
) -> Result<AnnotationResult, TaggedPdfError> {
    let start = std::time::Instant::now();
    let pdf = TaggedPdf::load_mem(buffer)?;
    annotate_loaded(pdf, items, options, start)
}

fn annotate_loaded(
    mut pdf: TaggedPdf,
    items: Vec<TaggedItem>,
    options: &AnnotateOptions,
    start: std::time::Instant,
) -> Result<AnnotationResult, TaggedPdfError> {
    if !pdf.can_annotate() {
        return Err(TaggedPdfError::NotTagged(
            "document has no usable structure tree".to_string(),
        ));
    }
    pdf.attach_content(items)?;
    let pages = pdf.annotate_all(options);

    Ok(AnnotationResult {
        nonmarked_count: pdf.nonmarked_count(),
        page_count: pdf.page_count(),
        pages,
        processing_time_ms: start.elapsed().as_millis() as u64,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum TaggedPdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Invalid structure: {0}")]
    Structure(String),
    #[error("Attribute class {0} not found in class map")]
    MissingAttributeClass(String),
    #[error("Nested marked content with multiple MCIDs on page {page}")]
    NestedMarkedContent { page: usize },
    #[error("PDF is not tagged: {0}")]
    NotTagged(String),
}

impl From<lopdf::Error> for TaggedPdfError {
    fn from(e: lopdf::Error) -> Self {
        TaggedPdfError::Parse(e.to_string())
    }
}
