//! Labelled page regions derived from the structure tree

use crate::bbox::BBox;
use crate::content::{items_text, LayoutItem};
use crate::struct_type::StructType;
use log::warn;
use std::fmt;

/// Output label of an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Paragraph,
    ListItem,
    Title,
    TableOfContents,
    TocItem,
    Table,
    Figure,
    Footnote,
    Caption,
}

impl Label {
    /// Label for an annotated structure type, `None` for types that are
    /// not annotated.
    pub fn from_struct_type(struct_type: StructType) -> Option<Label> {
        let label = match struct_type {
            StructType::P => Label::Paragraph,
            StructType::LI => Label::ListItem,
            StructType::H1
            | StructType::H2
            | StructType::H3
            | StructType::H4
            | StructType::H5
            | StructType::H6 => Label::Title,
            StructType::TOC => Label::TableOfContents,
            StructType::TOCI => Label::TocItem,
            StructType::Table => Label::Table,
            StructType::Figure => Label::Figure,
            StructType::Note => Label::Footnote,
            _ => return None,
        };
        Some(label)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Paragraph => "Paragraph",
            Label::ListItem => "ListItem",
            Label::Title => "Title",
            Label::TableOfContents => "TableOfContents",
            Label::TocItem => "TocItem",
            Label::Table => "Table",
            Label::Figure => "Figure",
            Label::Footnote => "Footnote",
            Label::Caption => "Caption",
        }
    }

    /// Tables and figures can have captions.
    pub fn takes_caption(&self) -> bool {
        matches!(self, Label::Table | Label::Figure)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A word token from an external tokenizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    pub bbox: BBox,
    /// Position of the token on its page
    pub index: usize,
}

impl Token {
    pub fn new(text: impl Into<String>, bbox: BBox, index: usize) -> Self {
        Self {
            text: text.into(),
            bbox,
            index,
        }
    }
}

/// A labelled region of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub label: Label,
    /// Structure type the annotation was derived from
    pub struct_type: Option<StructType>,
    pub bbox: BBox,
    /// Zero-based page index
    pub page: usize,
    /// Content items inside the region
    pub items: Vec<LayoutItem>,
    /// Text of the items as extracted, whitespace included. Trimming and
    /// cropping leave it unchanged.
    pub text: String,
    pub tokens: Vec<Token>,
}

impl Annotation {
    pub fn new(label: Label, bbox: BBox, page: usize, items: Vec<LayoutItem>) -> Self {
        Self {
            label,
            struct_type: None,
            bbox,
            page,
            text: items_text(&items),
            items,
            tokens: Vec::new(),
        }
    }

    pub fn with_struct_type(mut self, struct_type: StructType) -> Self {
        self.struct_type = Some(struct_type);
        self
    }

    /// Concatenated text of the content items.
    pub fn text_content(&self) -> String {
        items_text(&self.items)
    }

    /// Text elements whose box may be trimmed to their visible glyphs.
    pub fn is_trimmable(&self) -> bool {
        matches!(
            self.struct_type,
            Some(
                StructType::P
                    | StructType::H1
                    | StructType::H2
                    | StructType::H3
                    | StructType::H4
                    | StructType::H5
                    | StructType::H6
                    | StructType::Note
            )
        )
    }

    /// Keep only items with visible text and shrink the box to them.
    ///
    /// Returns false if nothing is left, in which case the annotation
    /// should be dropped.
    pub fn trim_bbox(&mut self) -> bool {
        self.items.retain(|item| {
            item.text()
                .is_some_and(|t| !t.is_empty() && !t.chars().all(char::is_whitespace))
        });
        match items_bbox(&self.items) {
            Some(bbox) => {
                self.bbox = bbox;
                true
            }
            None => false,
        }
    }

    /// Restrict the annotation to `cropbox`.
    ///
    /// When every item touches the crop box only the box is clipped;
    /// otherwise items outside are removed and the box recomputed first.
    /// Returns false if nothing is left.
    pub fn crop(&mut self, cropbox: &BBox) -> bool {
        let before = self.items.len();
        self.items.retain(|item| cropbox.overlaps(&item.bbox));
        let cropped = if self.items.len() == before {
            cropbox.intersection(&self.bbox)
        } else {
            items_bbox(&self.items).and_then(|bbox| cropbox.intersection(&bbox))
        };
        match cropped {
            Some(bbox) => {
                self.bbox = bbox;
                true
            }
            None => false,
        }
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Annotation(page={} type={} bbox={})",
            self.page, self.label, self.bbox
        )
    }
}

/// Union of the boxes of `items`.
pub fn items_bbox(items: &[LayoutItem]) -> Option<BBox> {
    BBox::union_all(items.iter().map(|item| &item.bbox))
}

/// Give each token to the annotation covering the largest fraction of
/// it. Ties go to the earlier annotation; tokens no annotation overlaps
/// are returned.
pub fn assign_tokens(annotations: &mut [Annotation], tokens: Vec<Token>) -> Vec<Token> {
    let mut unassigned = Vec::new();
    for token in tokens {
        let mut best: Option<(usize, f32)> = None;
        for (i, annotation) in annotations.iter().enumerate() {
            let score = token.bbox.relative_overlap(&annotation.bbox);
            if score > best.map_or(0.0, |(_, s)| s) {
                best = Some((i, score));
            }
        }
        match best {
            Some((i, _)) => annotations[i].tokens.push(token),
            None => {
                warn!("no annotation selected for token \"{}\"", token.text);
                unassigned.push(token);
            }
        }
    }
    unassigned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyph(text: &str, x: f32) -> LayoutItem {
        LayoutItem::char(text, BBox::new(x, 0.0, x + 10.0, 10.0))
    }

    fn paragraph(items: Vec<LayoutItem>) -> Annotation {
        let bbox = items_bbox(&items).unwrap();
        Annotation::new(Label::Paragraph, bbox, 0, items).with_struct_type(StructType::P)
    }

    #[test]
    fn test_labels() {
        assert_eq!(Label::from_struct_type(StructType::H3), Some(Label::Title));
        assert_eq!(Label::from_struct_type(StructType::Note), Some(Label::Footnote));
        assert_eq!(Label::from_struct_type(StructType::TOCI), Some(Label::TocItem));
        assert_eq!(Label::from_struct_type(StructType::Span), None);
        assert_eq!(Label::from_struct_type(StructType::Unknown), None);
        assert!(Label::Figure.takes_caption());
        assert!(!Label::Caption.takes_caption());
    }

    #[test]
    fn test_trim_bbox() {
        let mut a = paragraph(vec![glyph(" ", 0.0), glyph("a", 10.0), glyph("b", 20.0)]);
        a.items.push(LayoutItem::rect(BBox::new(0.0, 0.0, 100.0, 100.0), 1.0));
        a.bbox = BBox::new(0.0, 0.0, 100.0, 100.0);
        assert!(a.is_trimmable());
        assert!(a.trim_bbox());
        assert_eq!(a.bbox, BBox::new(10.0, 0.0, 30.0, 10.0));
        assert_eq!(a.text_content(), "ab");
        assert_eq!(a.text, " ab");

        let mut blank = paragraph(vec![glyph(" ", 0.0)]);
        assert!(!blank.trim_bbox());
    }

    #[test]
    fn test_crop_clips_box_when_all_items_inside() {
        let mut a = paragraph(vec![glyph("a", 0.0), glyph("b", 10.0)]);
        a.bbox = BBox::new(-10.0, -10.0, 20.0, 10.0);
        assert!(a.crop(&BBox::new(0.0, 0.0, 100.0, 100.0)));
        assert_eq!(a.bbox, BBox::new(0.0, 0.0, 20.0, 10.0));
        assert_eq!(a.items.len(), 2);
    }

    #[test]
    fn test_crop_drops_items_outside() {
        let mut a = paragraph(vec![glyph("a", 0.0), glyph("b", 500.0)]);
        assert!(a.crop(&BBox::new(0.0, 0.0, 100.0, 100.0)));
        assert_eq!(a.items.len(), 1);
        assert_eq!(a.bbox, BBox::new(0.0, 0.0, 10.0, 10.0));

        let mut outside = paragraph(vec![glyph("c", 500.0)]);
        assert!(!outside.crop(&BBox::new(0.0, 0.0, 100.0, 100.0)));
    }

    #[test]
    fn test_assign_tokens() {
        let mut annotations = vec![
            paragraph(vec![glyph("a", 0.0), glyph("b", 10.0)]),
            paragraph(vec![glyph("c", 100.0), glyph("d", 110.0)]),
        ];
        let tokens = vec![
            Token::new("ab", BBox::new(0.0, 0.0, 20.0, 10.0), 0),
            // Mostly inside the second annotation
            Token::new("cd", BBox::new(95.0, 0.0, 120.0, 10.0), 1),
            Token::new("zz", BBox::new(300.0, 0.0, 320.0, 10.0), 2),
        ];
        let unassigned = assign_tokens(&mut annotations, tokens);
        assert_eq!(annotations[0].tokens.len(), 1);
        assert_eq!(annotations[1].tokens[0].index, 1);
        assert_eq!(unassigned.len(), 1);
        assert_eq!(unassigned[0].text, "zz");
    }
}
