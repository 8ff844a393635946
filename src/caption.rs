//! Caption detection for tables and figures
//!
//! A caption is an annotation directly above or below a table or figure
//! whose text starts with a caption keyword followed by a number, such as
//! "Figure 3" or "Taulukko 2".

use crate::annotation::{Annotation, Label};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

/// Languages with built-in caption keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionLanguage {
    English,
    Finnish,
    Swedish,
    German,
    French,
}

impl CaptionLanguage {
    pub const ALL: [CaptionLanguage; 5] = [
        CaptionLanguage::English,
        CaptionLanguage::Finnish,
        CaptionLanguage::Swedish,
        CaptionLanguage::German,
        CaptionLanguage::French,
    ];

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            CaptionLanguage::English => &["Figure", "Fig.", "Table", "Tab."],
            CaptionLanguage::Finnish => &["Kuva", "Taulukko"],
            CaptionLanguage::Swedish => &["Bild", "Figur", "Tabell"],
            CaptionLanguage::German => &["Abbildung", "Abb.", "Tabelle"],
            CaptionLanguage::French => &["Tableau"],
        }
    }
}

/// Keyword lexicon for caption detection
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionConfig {
    pub languages: Vec<CaptionLanguage>,
    /// Keywords in addition to those of `languages`
    pub extra_keywords: Vec<String>,
    pub case_insensitive: bool,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            languages: CaptionLanguage::ALL.to_vec(),
            extra_keywords: Vec::new(),
            case_insensitive: true,
        }
    }
}

/// Compiled caption pattern.
#[derive(Debug, Clone)]
pub struct CaptionMatcher {
    /// `None` when the lexicon is empty
    regex: Option<Regex>,
}

static DEFAULT_MATCHER: Lazy<Option<CaptionMatcher>> =
    Lazy::new(|| CaptionMatcher::new(&CaptionConfig::default()).ok());

impl CaptionMatcher {
    pub fn new(config: &CaptionConfig) -> Result<Self, regex::Error> {
        let keywords: Vec<String> = config
            .languages
            .iter()
            .flat_map(|lang| lang.keywords().iter().map(|k| regex::escape(k)))
            .chain(config.extra_keywords.iter().map(|k| regex::escape(k)))
            .collect();
        if keywords.is_empty() {
            return Ok(Self { regex: None });
        }
        let pattern = format!(r"^\s*(?:{})\s+\d", keywords.join("|"));
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(config.case_insensitive)
            .build()?;
        Ok(Self { regex: Some(regex) })
    }

    /// Matcher for [`CaptionConfig::default`], compiled once.
    pub fn default_matcher() -> Option<&'static CaptionMatcher> {
        DEFAULT_MATCHER.as_ref()
    }

    pub fn is_caption(&self, text: &str) -> bool {
        self.regex.as_ref().is_some_and(|re| re.is_match(text))
    }
}

/// Relabel captions of tables and figures.
///
/// For each table or figure the nearest horizontally overlapping
/// annotation above it is tested first; the nearest one below is tested
/// only when the one above is not a caption. At most one annotation is
/// relabelled per table or figure. Other tables and figures are never
/// candidates. The text tested is the extracted [`Annotation::text`], so
/// spaces delivered as separate glyphs still count.
pub fn assign_captions(annotations: &mut [Annotation], matcher: &CaptionMatcher) {
    for target in 0..annotations.len() {
        if !annotations[target].label.takes_caption() {
            continue;
        }
        let target_bbox = annotations[target].bbox;

        let mut above = Vec::new();
        let mut below = Vec::new();
        for (i, candidate) in annotations.iter().enumerate() {
            if i == target
                || candidate.label.takes_caption()
                || !candidate.bbox.horizontally_overlaps(&target_bbox)
            {
                continue;
            }
            let Some(distance) = candidate.bbox.vertical_distance(&target_bbox) else {
                continue;
            };
            if candidate.bbox.is_above(&target_bbox) {
                above.push((distance, i));
            } else {
                below.push((distance, i));
            }
        }
        above.sort_by(|a, b| a.0.total_cmp(&b.0));
        below.sort_by(|a, b| a.0.total_cmp(&b.0));

        for nearest in [above.first(), below.first()].into_iter().flatten() {
            let i = nearest.1;
            if matcher.is_caption(&annotations[i].text) {
                annotations[i].label = Label::Caption;
                break;
            }
        }
    }
}
