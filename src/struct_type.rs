//! Standard structure types (ISO 32000-1:2008, Section 14.8.4)

use std::fmt;

/// Category of a standard structure type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementCategory {
    Grouping,
    Block,
    Inline,
    Undefined,
}

impl ElementCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementCategory::Grouping => "grouping",
            ElementCategory::Block => "block",
            ElementCategory::Inline => "inline",
            ElementCategory::Undefined => "undefined",
        }
    }
}

/// Resolved type of a structure element.
///
/// Names that are neither standard nor role-mapped to a standard type
/// resolve to [`StructType::Unknown`].
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructType {
    // Grouping elements
    Document,
    Part,
    Art,
    Sect,
    Div,
    BlockQuote,
    Caption,
    TOC,
    TOCI,
    Index,
    NonStruct,
    Private,

    // Paragraphlike elements
    P,
    H,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,

    // List elements
    L,
    LI,
    Lbl,
    LBody,

    // Table elements
    Table,
    TR,
    TH,
    TD,
    THead,
    TBody,
    TFoot,

    // Inline elements
    Span,
    Quote,
    Note,
    Reference,
    BibEntry,
    Code,
    Link,
    Annot,
    Ruby,
    Warichu,
    RB,
    RT,
    RP,
    WT,
    WP,

    // Illustration elements
    Figure,
    Formula,
    Form,

    /// Sentinel for non-standard types.
    Unknown,
}

impl StructType {
    /// Look up a standard type by name. `Unknown` is not a standard name.
    pub fn from_standard_name(name: &str) -> Option<StructType> {
        use StructType::*;
        let t = match name {
            "Document" => Document,
            "Part" => Part,
            "Art" => Art,
            "Sect" => Sect,
            "Div" => Div,
            "BlockQuote" => BlockQuote,
            "Caption" => Caption,
            "TOC" => TOC,
            "TOCI" => TOCI,
            "Index" => Index,
            "NonStruct" => NonStruct,
            "Private" => Private,
            "P" => P,
            "H" => H,
            "H1" => H1,
            "H2" => H2,
            "H3" => H3,
            "H4" => H4,
            "H5" => H5,
            "H6" => H6,
            "L" => L,
            "LI" => LI,
            "Lbl" => Lbl,
            "LBody" => LBody,
            "Table" => Table,
            "TR" => TR,
            "TH" => TH,
            "TD" => TD,
            "THead" => THead,
            "TBody" => TBody,
            "TFoot" => TFoot,
            "Span" => Span,
            "Quote" => Quote,
            "Note" => Note,
            "Reference" => Reference,
            "BibEntry" => BibEntry,
            "Code" => Code,
            "Link" => Link,
            "Annot" => Annot,
            "Ruby" => Ruby,
            "Warichu" => Warichu,
            "RB" => RB,
            "RT" => RT,
            "RP" => RP,
            "WT" => WT,
            "WP" => WP,
            "Figure" => Figure,
            "Formula" => Formula,
            "Form" => Form,
            _ => return None,
        };
        Some(t)
    }

    pub fn is_standard_name(name: &str) -> bool {
        Self::from_standard_name(name).is_some()
    }

    pub fn as_str(&self) -> &'static str {
        use StructType::*;
        match self {
            Document => "Document",
            Part => "Part",
            Art => "Art",
            Sect => "Sect",
            Div => "Div",
            BlockQuote => "BlockQuote",
            Caption => "Caption",
            TOC => "TOC",
            TOCI => "TOCI",
            Index => "Index",
            NonStruct => "NonStruct",
            Private => "Private",
            P => "P",
            H => "H",
            H1 => "H1",
            H2 => "H2",
            H3 => "H3",
            H4 => "H4",
            H5 => "H5",
            H6 => "H6",
            L => "L",
            LI => "LI",
            Lbl => "Lbl",
            LBody => "LBody",
            Table => "Table",
            TR => "TR",
            TH => "TH",
            TD => "TD",
            THead => "THead",
            TBody => "TBody",
            TFoot => "TFoot",
            Span => "Span",
            Quote => "Quote",
            Note => "Note",
            Reference => "Reference",
            BibEntry => "BibEntry",
            Code => "Code",
            Link => "Link",
            Annot => "Annot",
            Ruby => "Ruby",
            Warichu => "Warichu",
            RB => "RB",
            RT => "RT",
            RP => "RP",
            WT => "WT",
            WP => "WP",
            Figure => "Figure",
            Formula => "Formula",
            Form => "Form",
            Unknown => "Unknown",
        }
    }

    pub fn category(&self) -> ElementCategory {
        use StructType::*;
        match self {
            Document | Part | Art | Sect | Div | BlockQuote | Caption | TOC | TOCI | Index
            | NonStruct | Private => ElementCategory::Grouping,
            P | H | H1 | H2 | H3 | H4 | H5 | H6 | L | LI | Lbl | LBody | Table => {
                ElementCategory::Block
            }
            Span | Quote | Note | Reference | BibEntry | Code | Link | Annot | Ruby | Warichu => {
                ElementCategory::Inline
            }
            _ => ElementCategory::Undefined,
        }
    }

    pub fn is_block(&self) -> bool {
        self.category() == ElementCategory::Block
    }

    pub fn is_inline(&self) -> bool {
        self.category() == ElementCategory::Inline
    }

    pub fn is_grouping(&self) -> bool {
        self.category() == ElementCategory::Grouping
    }

    /// Heading level for `H1`..`H6`.
    pub fn heading_level(&self) -> Option<u8> {
        match self {
            StructType::H1 => Some(1),
            StructType::H2 => Some(2),
            StructType::H3 => Some(3),
            StructType::H4 => Some(4),
            StructType::H5 => Some(5),
            StructType::H6 => Some(6),
            _ => None,
        }
    }
}

impl fmt::Display for StructType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
