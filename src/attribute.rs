//! Structure element attributes and the scalar values they carry.

use crate::bbox::BBox;
use crate::parsing::decode_text_string;
use lopdf::{Object, ObjectId};
use std::fmt;

/// A PDF value detached from the object graph.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f32),
    Name(String),
    String(String),
    Array(Vec<PdfValue>),
    Reference(ObjectId),
    /// Dictionaries and streams are kept opaque, by type name only.
    Other(&'static str),
}

impl PdfValue {
    pub fn from_object(obj: &Object) -> Self {
        match obj {
            Object::Null => PdfValue::Null,
            Object::Boolean(b) => PdfValue::Bool(*b),
            Object::Integer(i) => PdfValue::Integer(*i),
            Object::Real(r) => PdfValue::Real(*r as f32),
            Object::Name(n) => PdfValue::Name(String::from_utf8_lossy(n).into_owned()),
            Object::String(bytes, _) => PdfValue::String(decode_text_string(bytes)),
            Object::Array(items) => PdfValue::Array(items.iter().map(PdfValue::from_object).collect()),
            Object::Reference(id) => PdfValue::Reference(*id),
            Object::Dictionary(_) => PdfValue::Other("dictionary"),
            Object::Stream(_) => PdfValue::Other("stream"),
            #[allow(unreachable_patterns)]
            _ => PdfValue::Other("unknown"),
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            PdfValue::Integer(i) => Some(*i as f32),
            PdfValue::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PdfValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            PdfValue::Name(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for PdfValue {
    // Mirrors the value formatting of `pdfinfo -struct`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdfValue::Null => write!(f, "null"),
            PdfValue::Bool(b) => write!(f, "{}", b),
            PdfValue::Integer(i) => write!(f, "{}", i),
            PdfValue::Real(r) => {
                if r.fract() == 0.0 {
                    write!(f, "{}", *r as i64)
                } else {
                    write!(f, "{}", r)
                }
            }
            PdfValue::Name(n) => write!(f, "/{}", n),
            PdfValue::String(s) => write!(f, "({})", s),
            PdfValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            PdfValue::Reference((num, generation)) => write!(f, "{} {} R", num, generation),
            PdfValue::Other(kind) => write!(f, "<{}>", kind),
        }
    }
}

/// Structure attribute: a named value defined by an owner (`Layout`, `Table`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: PdfValue,
    pub owner: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: PdfValue, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            owner: owner.into(),
        }
    }

    /// Interpret a `BBox` attribute as a rectangle.
    ///
    /// Returns `None` for other attributes and for values that are not
    /// four numbers.
    pub fn as_bbox(&self) -> Option<BBox> {
        if self.name != "BBox" {
            return None;
        }
        let PdfValue::Array(items) = &self.value else {
            return None;
        };
        if items.len() != 4 {
            return None;
        }
        let coords: Option<Vec<f32>> = items.iter().map(PdfValue::as_f32).collect();
        let c = coords?;
        Some(BBox::normalized(c[0], c[1], c[2], c[3]))
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{} {}", self.name, self.value)
    }
}
