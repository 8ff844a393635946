//! Tagged PDF documents and the per-page annotation pipeline

use crate::annotation::Annotation;
use crate::associate::{associate_content, mark_pages};
use crate::bbox::BBox;
use crate::caption::{assign_captions, CaptionConfig, CaptionMatcher};
use crate::content::{LayoutItem, TaggedItem};
use crate::extract::extract_annotations;
use crate::overlap::eliminate_overlaps;
use crate::parsing::{get_boolean, get_dictionary, get_integer, get_name, get_rectangle};
use crate::structtree::StructTree;
use crate::table_outline::{extend_table_outlines, DEFAULT_OUTLINE_MARGIN};
use crate::TaggedPdfError;
use log::{error, warn};
use lopdf::{Dictionary, Document, Object, ObjectId};
use rayon::prelude::*;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Steps of the annotation pipeline, applied in field order.
#[derive(Debug, Clone)]
pub struct AnnotateOptions {
    /// Shrink text annotations to their visible glyphs
    pub trim_text_bboxes: bool,
    /// Clip annotations to the page crop box
    pub crop_to_page: bool,
    /// Drop duplicate and nested annotations
    pub eliminate_overlaps: bool,
    /// Grow tables over their untagged ruling lines
    pub extend_table_outlines: bool,
    /// Distance within which a graphic counts as part of a table outline
    pub outline_margin: f32,
    /// Relabel captions of tables and figures
    pub assign_captions: bool,
    pub captions: CaptionConfig,
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self {
            trim_text_bboxes: true,
            crop_to_page: true,
            eliminate_overlaps: true,
            extend_table_outlines: true,
            outline_margin: DEFAULT_OUTLINE_MARGIN,
            assign_captions: true,
            captions: CaptionConfig::default(),
        }
    }
}

/// Mark information dictionary (`MarkInfo`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkInfo {
    pub marked: bool,
    pub suspects: bool,
    pub user_properties: bool,
}

impl MarkInfo {
    fn parse(doc: &Document, dict: &Dictionary) -> Result<Self, TaggedPdfError> {
        Ok(Self {
            marked: get_boolean(doc, dict, b"Marked")?.unwrap_or(false),
            suspects: get_boolean(doc, dict, b"Suspects")?.unwrap_or(false),
            user_properties: get_boolean(doc, dict, b"UserProperties")?.unwrap_or(false),
        })
    }
}

/// What the associator needs to know about a page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageInfo {
    pub object_id: ObjectId,
    /// Parent tree key of the page's content stream
    pub struct_parents: Option<i64>,
    /// `CropBox`, falling back to `MediaBox`
    pub crop_box: Option<BBox>,
}

impl PageInfo {
    fn parse(doc: &Document, object_id: ObjectId) -> Result<Self, TaggedPdfError> {
        let dict = match doc.get_object(object_id)? {
            Object::Dictionary(dict) => dict,
            _ => {
                return Err(TaggedPdfError::Structure(format!(
                    "page {} {} R is not a dictionary",
                    object_id.0, object_id.1
                )))
            }
        };
        let struct_parents = get_integer(doc, dict, b"StructParents")?;
        let crop_box = match inherited_rectangle(doc, dict, b"CropBox")? {
            Some(b) => Some(b),
            None => inherited_rectangle(doc, dict, b"MediaBox")?,
        };
        Ok(Self {
            object_id,
            struct_parents,
            crop_box,
        })
    }
}

/// Look up a rectangle on a page or the nearest ancestor in the page tree.
fn inherited_rectangle(
    doc: &Document,
    page: &Dictionary,
    key: &[u8],
) -> Result<Option<BBox>, TaggedPdfError> {
    let mut visited = HashSet::new();
    let mut current = page;
    loop {
        if let Some(rect) = get_rectangle(doc, current, key)? {
            return Ok(Some(rect));
        }
        let Ok(Object::Reference(parent_id)) = current.get(b"Parent") else {
            return Ok(None);
        };
        if !visited.insert(*parent_id) {
            return Ok(None);
        }
        match doc.get_object(*parent_id) {
            Ok(Object::Dictionary(parent)) => current = parent,
            _ => return Ok(None),
        }
    }
}

/// A tagged PDF: its structure tree, page list and attached content.
///
/// The underlying `lopdf::Document` is only read while loading.
#[derive(Debug)]
pub struct TaggedPdf {
    version: Option<String>,
    mark_info: Option<MarkInfo>,
    struct_tree: Option<StructTree>,
    pages: Vec<PageInfo>,
    nonmarked_by_page: BTreeMap<usize, Vec<LayoutItem>>,
}

impl TaggedPdf {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TaggedPdfError> {
        let doc = Document::load(path)?;
        Self::from_document(&doc)
    }

    pub fn load_mem(buffer: &[u8]) -> Result<Self, TaggedPdfError> {
        let doc = Document::load_mem(buffer)?;
        Self::from_document(&doc)
    }

    /// Read the catalog, build the structure tree and collect page
    /// information.
    pub fn from_document(doc: &Document) -> Result<Self, TaggedPdfError> {
        let catalog = get_dictionary(doc, &doc.trailer, b"Root")?
            .ok_or_else(|| TaggedPdfError::Parse("trailer has no /Root".to_string()))?;

        let version = get_name(doc, catalog, b"Version")?;
        let mark_info = get_dictionary(doc, catalog, b"MarkInfo")?
            .map(|d| MarkInfo::parse(doc, d))
            .transpose()?;
        let mut struct_tree = get_dictionary(doc, catalog, b"StructTreeRoot")?
            .map(|d| StructTree::parse(doc, d))
            .transpose()?;

        let pages = doc
            .get_pages()
            .into_values()
            .map(|id| PageInfo::parse(doc, id))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(tree) = struct_tree.as_mut() {
            mark_pages(tree, &pages);
        }

        Ok(Self {
            version,
            mark_info,
            struct_tree,
            pages,
            nonmarked_by_page: BTreeMap::new(),
        })
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn mark_info(&self) -> Option<&MarkInfo> {
        self.mark_info.as_ref()
    }

    pub fn struct_tree(&self) -> Option<&StructTree> {
        self.struct_tree.as_ref()
    }

    pub fn pages(&self) -> &[PageInfo] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn crop_box(&self, page: usize) -> Option<BBox> {
        self.pages.get(page).and_then(|p| p.crop_box)
    }

    /// True for documents with a structure tree, `Marked` set and a
    /// parent tree. The reason is logged otherwise.
    pub fn can_annotate(&self) -> bool {
        let Some(tree) = &self.struct_tree else {
            warn!("cannot annotate: no StructTreeRoot");
            return false;
        };
        match &self.mark_info {
            None => {
                warn!("cannot annotate: no MarkInfo");
                false
            }
            Some(info) if !info.marked => {
                warn!("cannot annotate: not marked");
                false
            }
            Some(_) if tree.parent_index().is_none() => {
                warn!("cannot annotate: no parent tree");
                false
            }
            Some(_) => true,
        }
    }

    /// Attach extracted content to the structure tree, keeping what
    /// cannot be attached as non-marked content. Returns the number of
    /// attached items.
    pub fn attach_content<I>(&mut self, items: I) -> Result<usize, TaggedPdfError>
    where
        I: IntoIterator<Item = TaggedItem>,
    {
        let Some(tree) = self.struct_tree.as_mut() else {
            return Err(TaggedPdfError::NotTagged("no StructTreeRoot".to_string()));
        };
        let association = associate_content(tree, &self.pages, items)?;
        for (page, items) in association.nonmarked_by_page {
            self.nonmarked_by_page.entry(page).or_default().extend(items);
        }
        Ok(association.attached)
    }

    /// Content of `page` outside the structure tree.
    pub fn nonmarked(&self, page: usize) -> &[LayoutItem] {
        self.nonmarked_by_page
            .get(&page)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn nonmarked_count(&self) -> usize {
        self.nonmarked_by_page.values().map(Vec::len).sum()
    }

    /// Annotations of one page.
    pub fn annotations(&self, page: usize, options: &AnnotateOptions) -> Vec<Annotation> {
        let matcher = caption_matcher(options);
        self.annotate_page(page, options, matcher.as_deref())
    }

    /// Annotations of every page, computed in parallel.
    pub fn annotate_all(&self, options: &AnnotateOptions) -> Vec<Vec<Annotation>> {
        let matcher = caption_matcher(options);
        (0..self.page_count())
            .into_par_iter()
            .map(|page| self.annotate_page(page, options, matcher.as_deref()))
            .collect()
    }

    fn annotate_page(
        &self,
        page: usize,
        options: &AnnotateOptions,
        matcher: Option<&CaptionMatcher>,
    ) -> Vec<Annotation> {
        let Some(tree) = &self.struct_tree else {
            return Vec::new();
        };
        let mut annotations = extract_annotations(tree, page);

        if options.trim_text_bboxes {
            annotations.retain_mut(|a| !a.is_trimmable() || a.trim_bbox());
        }

        if options.crop_to_page {
            match self.crop_box(page) {
                Some(cropbox) => annotations.retain_mut(|a| a.crop(&cropbox)),
                None => warn!("no crop box for page {}, not cropping", page),
            }
        }

        if options.eliminate_overlaps {
            annotations = eliminate_overlaps(annotations);
        }

        if options.extend_table_outlines {
            extend_table_outlines(&mut annotations, self.nonmarked(page), options.outline_margin);
        }

        if let Some(matcher) = matcher {
            assign_captions(&mut annotations, matcher);
        }

        annotations
    }
}

/// Matcher for the options' lexicon; the default lexicon is compiled once
/// per process.
fn caption_matcher(options: &AnnotateOptions) -> Option<Cow<'static, CaptionMatcher>> {
    if !options.assign_captions {
        return None;
    }
    if options.captions == CaptionConfig::default() {
        if let Some(matcher) = CaptionMatcher::default_matcher() {
            return Some(Cow::Borrowed(matcher));
        }
    }
    match CaptionMatcher::new(&options.captions) {
        Ok(matcher) => Some(Cow::Owned(matcher)),
        Err(e) => {
            error!("invalid caption keywords, not assigning captions: {}", e);
            None
        }
    }
}
