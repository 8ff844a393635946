//! Rendered content fragments and the marked-content tags active when
//! they were produced.
//!
//! Content-stream interpretation happens elsewhere; a producer drives a
//! [`TagStack`] while it walks a page and hands [`TaggedItem`]s to the
//! associator.

use crate::attribute::PdfValue;
use crate::bbox::BBox;
use crate::TaggedPdfError;
use std::collections::BTreeMap;

/// Kind-specific data of a layout item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    /// A single rendered glyph
    Char {
        text: String,
        font: String,
        colour_space: String,
        size: f32,
    },
    Line {
        line_width: f32,
    },
    Curve {
        line_width: f32,
    },
    Rect {
        line_width: f32,
    },
    /// Form XObject placement
    Figure {
        name: String,
    },
    /// Raster image with its pixel dimensions
    Image {
        name: String,
        width: u32,
        height: u32,
    },
}

/// A rendered fragment with its position on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutItem {
    pub bbox: BBox,
    pub kind: ItemKind,
}

impl LayoutItem {
    pub fn new(bbox: BBox, kind: ItemKind) -> Self {
        Self { bbox, kind }
    }

    /// A glyph with default font metadata.
    pub fn char(text: impl Into<String>, bbox: BBox) -> Self {
        Self {
            bbox,
            kind: ItemKind::Char {
                text: text.into(),
                font: String::new(),
                colour_space: "DeviceGray".to_string(),
                size: bbox.height(),
            },
        }
    }

    pub fn line(bbox: BBox, line_width: f32) -> Self {
        Self {
            bbox,
            kind: ItemKind::Line { line_width },
        }
    }

    pub fn rect(bbox: BBox, line_width: f32) -> Self {
        Self {
            bbox,
            kind: ItemKind::Rect { line_width },
        }
    }

    /// Text of the item; only glyphs carry text.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            ItemKind::Char { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn is_char(&self) -> bool {
        matches!(self.kind, ItemKind::Char { .. })
    }

    /// True for text that is present but consists only of whitespace.
    pub fn is_space_text(&self) -> bool {
        self.text()
            .is_some_and(|t| !t.is_empty() && t.chars().all(char::is_whitespace))
    }

    /// Straight lines and rectangles, which may outline a table.
    pub fn is_outline_graphic(&self) -> bool {
        matches!(self.kind, ItemKind::Line { .. } | ItemKind::Rect { .. })
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ItemKind::Char { .. } => "char",
            ItemKind::Line { .. } => "line",
            ItemKind::Curve { .. } => "curve",
            ItemKind::Rect { .. } => "rect",
            ItemKind::Figure { .. } => "figure",
            ItemKind::Image { .. } => "image",
        }
    }
}

/// Concatenated text of the text-bearing items.
pub fn items_text<'a, I>(items: I) -> String
where
    I: IntoIterator<Item = &'a LayoutItem>,
{
    items.into_iter().filter_map(LayoutItem::text).collect()
}

/// A marked-content tag (`BMC`/`BDC`) with its property list.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentTag {
    pub name: String,
    pub properties: BTreeMap<String, PdfValue>,
}

impl ContentTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Tag carrying a marked-content identifier.
    pub fn with_mcid(name: impl Into<String>, mcid: i64) -> Self {
        let mut tag = Self::new(name);
        tag.properties
            .insert("MCID".to_string(), PdfValue::Integer(mcid));
        tag
    }

    pub fn mcid(&self) -> Option<i64> {
        self.properties.get("MCID").and_then(PdfValue::as_i64)
    }
}

/// A layout item together with the tags that were open when it was drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedItem {
    /// Zero-based page index
    pub page: usize,
    pub tags: Vec<ContentTag>,
    pub item: LayoutItem,
}

impl TaggedItem {
    pub fn new(page: usize, tags: Vec<ContentTag>, item: LayoutItem) -> Self {
        Self { page, tags, item }
    }

    /// Item on `page` tagged with a single marked-content identifier.
    pub fn marked(page: usize, mcid: i64, item: LayoutItem) -> Self {
        Self::new(page, vec![ContentTag::with_mcid("P", mcid)], item)
    }

    /// Item on `page` outside any marked content.
    pub fn unmarked(page: usize, item: LayoutItem) -> Self {
        Self::new(page, Vec::new(), item)
    }

    /// The marked-content identifier in effect for the item.
    ///
    /// Tags nest but identifiers do not; more than one identifier in the
    /// stack means the producer is broken.
    pub fn mcid(&self) -> Result<Option<i64>, TaggedPdfError> {
        let mut found = None;
        for mcid in self.tags.iter().filter_map(ContentTag::mcid) {
            if found.is_some() {
                return Err(TaggedPdfError::NestedMarkedContent { page: self.page });
            }
            found = Some(mcid);
        }
        Ok(found)
    }
}

/// Stack of open marked-content tags for the page being interpreted.
#[derive(Debug, Default)]
pub struct TagStack {
    page: usize,
    tags: Vec<ContentTag>,
}

impl TagStack {
    pub fn new(page: usize) -> Self {
        Self {
            page,
            tags: Vec::new(),
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// Move on to the next page. Tags must not span pages.
    pub fn begin_page(&mut self, page: usize) -> Result<(), TaggedPdfError> {
        if !self.tags.is_empty() {
            return Err(TaggedPdfError::Structure(format!(
                "{} marked-content tags left open at end of page {}",
                self.tags.len(),
                self.page
            )));
        }
        self.page = page;
        Ok(())
    }

    /// Open a tag (`BMC`/`BDC`).
    pub fn begin_tag(&mut self, tag: ContentTag) -> Result<(), TaggedPdfError> {
        if tag.mcid().is_some() && self.current_mcid().is_some() {
            return Err(TaggedPdfError::NestedMarkedContent { page: self.page });
        }
        self.tags.push(tag);
        Ok(())
    }

    /// Close the innermost tag (`EMC`).
    pub fn end_tag(&mut self) -> Option<ContentTag> {
        self.tags.pop()
    }

    pub fn depth(&self) -> usize {
        self.tags.len()
    }

    pub fn current_mcid(&self) -> Option<i64> {
        self.tags.iter().find_map(ContentTag::mcid)
    }

    /// Attach the current tag stack to an item.
    pub fn tag(&self, item: LayoutItem) -> TaggedItem {
        TaggedItem::new(self.page, self.tags.clone(), item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox() -> BBox {
        BBox::new(0.0, 0.0, 5.0, 10.0)
    }

    #[test]
    fn test_space_text() {
        assert!(LayoutItem::char(" ", bbox()).is_space_text());
        assert!(!LayoutItem::char("a", bbox()).is_space_text());
        assert!(!LayoutItem::char("", bbox()).is_space_text());
        assert!(!LayoutItem::rect(bbox(), 1.0).is_space_text());
    }

    #[test]
    fn test_items_text_skips_graphics() {
        let items = vec![
            LayoutItem::char("a", bbox()),
            LayoutItem::line(bbox(), 0.5),
            LayoutItem::char("b", bbox()),
        ];
        assert_eq!(items_text(&items), "ab");
    }

    #[test]
    fn test_tag_stack_tracks_mcid() {
        let mut stack = TagStack::new(0);
        stack.begin_tag(ContentTag::new("Artifact")).unwrap();
        assert_eq!(stack.current_mcid(), None);
        stack.begin_tag(ContentTag::with_mcid("P", 4)).unwrap();
        stack.begin_tag(ContentTag::new("Span")).unwrap();
        let tagged = stack.tag(LayoutItem::char("x", bbox()));
        assert_eq!(tagged.mcid().unwrap(), Some(4));
        assert_eq!(stack.depth(), 3);

        // A second identifier inside the first is rejected
        assert!(stack.begin_tag(ContentTag::with_mcid("P", 5)).is_err());

        stack.end_tag();
        stack.end_tag();
        stack.end_tag();
        assert!(stack.begin_page(1).is_ok());
        assert_eq!(stack.page(), 1);
    }

    #[test]
    fn test_open_tags_at_page_end() {
        let mut stack = TagStack::new(0);
        stack.begin_tag(ContentTag::new("Artifact")).unwrap();
        assert!(stack.begin_page(1).is_err());
    }

    #[test]
    fn test_multiple_mcids_in_item_tags() {
        let item = TaggedItem::new(
            2,
            vec![ContentTag::with_mcid("P", 1), ContentTag::with_mcid("Span", 2)],
            LayoutItem::char("x", bbox()),
        );
        assert!(matches!(
            item.mcid(),
            Err(TaggedPdfError::NestedMarkedContent { page: 2 })
        ));
    }
}
