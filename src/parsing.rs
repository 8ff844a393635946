//! Typed access to fields of lopdf records
//!
//! Structure records in the wild are loosely validated, so every accessor
//! distinguishes "absent" (`Ok(None)`) from "present with the wrong kind"
//! (`Err`), leaving the decision to drop or tolerate to the caller.

use crate::attribute::{Attribute, PdfValue};
use crate::TaggedPdfError;
use log::warn;
use lopdf::{Dictionary, Document, Object, ObjectId};

/// A value looked up in a record, with the id of the indirect object it
/// was reached through (if any).
pub type Resolved<'a> = (Option<ObjectId>, &'a Object);

/// Follow one level of indirection.
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<Resolved<'a>, TaggedPdfError> {
    match obj {
        Object::Reference(id) => {
            let target = doc.get_object(*id).map_err(|e| {
                TaggedPdfError::Structure(format!(
                    "invalid reference {} {} R: {}",
                    id.0, id.1, e
                ))
            })?;
            Ok((Some(*id), target))
        }
        _ => Ok((None, obj)),
    }
}

/// Look up and dereference `key`. A null value counts as absent.
pub fn get_value<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Result<Option<Resolved<'a>>, TaggedPdfError> {
    let Ok(obj) = dict.get(key) else {
        return Ok(None);
    };
    let resolved = resolve(doc, obj)?;
    if matches!(resolved.1, Object::Null) {
        return Ok(None);
    }
    Ok(Some(resolved))
}

/// Short lowercase name of an object's kind, for diagnostics.
pub fn type_name(obj: &Object) -> &'static str {
    match obj {
        Object::Null => "null",
        Object::Boolean(_) => "boolean",
        Object::Integer(_) => "integer",
        Object::Real(_) => "real",
        Object::Name(_) => "name",
        Object::String(..) => "string",
        Object::Array(_) => "array",
        Object::Dictionary(_) => "dictionary",
        Object::Stream(_) => "stream",
        Object::Reference(_) => "reference",
        #[allow(unreachable_patterns)]
        _ => "unknown",
    }
}

fn wrong_kind(key: &[u8], obj: &Object, expected: &str) -> TaggedPdfError {
    TaggedPdfError::Structure(format!(
        "/{} has type \"{}\", expected \"{}\"",
        String::from_utf8_lossy(key),
        type_name(obj),
        expected
    ))
}

/// Turn an optional field into a required one.
pub fn required<T>(key: &[u8], value: Option<T>) -> Result<T, TaggedPdfError> {
    value.ok_or_else(|| {
        TaggedPdfError::Structure(format!(
            "missing /{} in dictionary",
            String::from_utf8_lossy(key)
        ))
    })
}

pub fn get_name(
    doc: &Document,
    dict: &Dictionary,
    key: &[u8],
) -> Result<Option<String>, TaggedPdfError> {
    match get_value(doc, dict, key)? {
        None => Ok(None),
        Some((_, Object::Name(name))) => Ok(Some(String::from_utf8_lossy(name).into_owned())),
        Some((_, other)) => Err(wrong_kind(key, other, "name")),
    }
}

pub fn get_integer(
    doc: &Document,
    dict: &Dictionary,
    key: &[u8],
) -> Result<Option<i64>, TaggedPdfError> {
    match get_value(doc, dict, key)? {
        None => Ok(None),
        Some((_, Object::Integer(i))) => Ok(Some(*i)),
        Some((_, other)) => Err(wrong_kind(key, other, "int")),
    }
}

pub fn get_boolean(
    doc: &Document,
    dict: &Dictionary,
    key: &[u8],
) -> Result<Option<bool>, TaggedPdfError> {
    match get_value(doc, dict, key)? {
        None => Ok(None),
        Some((_, Object::Boolean(b))) => Ok(Some(*b)),
        Some((_, other)) => Err(wrong_kind(key, other, "bool")),
    }
}

/// Text string value, decoded to UTF-8.
pub fn get_string(
    doc: &Document,
    dict: &Dictionary,
    key: &[u8],
) -> Result<Option<String>, TaggedPdfError> {
    match get_value(doc, dict, key)? {
        None => Ok(None),
        Some((_, Object::String(bytes, _))) => Ok(Some(decode_text_string(bytes))),
        Some((_, other)) => Err(wrong_kind(key, other, "string")),
    }
}

/// Dictionary value; a stream's dictionary is accepted too.
pub fn get_dictionary<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Result<Option<&'a Dictionary>, TaggedPdfError> {
    match get_value(doc, dict, key)? {
        None => Ok(None),
        Some((_, Object::Dictionary(d))) => Ok(Some(d)),
        Some((_, Object::Stream(s))) => Ok(Some(&s.dict)),
        Some((_, other)) => Err(wrong_kind(key, other, "dictionary")),
    }
}

pub fn get_array<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Result<Option<&'a Vec<Object>>, TaggedPdfError> {
    match get_value(doc, dict, key)? {
        None => Ok(None),
        Some((_, Object::Array(items))) => Ok(Some(items)),
        Some((_, other)) => Err(wrong_kind(key, other, "array")),
    }
}

/// Numeric rectangle value such as `CropBox`.
pub fn get_rectangle(
    doc: &Document,
    dict: &Dictionary,
    key: &[u8],
) -> Result<Option<crate::BBox>, TaggedPdfError> {
    let Some(items) = get_array(doc, dict, key)? else {
        return Ok(None);
    };
    let mut coords = Vec::with_capacity(4);
    for item in items {
        match resolve(doc, item)?.1 {
            Object::Integer(i) => coords.push(*i as f32),
            Object::Real(r) => coords.push(*r as f32),
            other => return Err(wrong_kind(key, other, "number")),
        }
    }
    if coords.len() != 4 {
        return Err(TaggedPdfError::Structure(format!(
            "/{} has {} coordinates, expected 4",
            String::from_utf8_lossy(key),
            coords.len()
        )));
    }
    Ok(Some(crate::BBox::normalized(
        coords[0], coords[1], coords[2], coords[3],
    )))
}

/// Decode a PDF text string.
///
/// UTF-16BE and UTF-8 are recognised by their byte order marks; anything
/// else is read as Latin-1, which agrees with PDFDocEncoding for the
/// printable ASCII range.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }
    if bytes.len() >= 3 && bytes[..3] == [0xEF, 0xBB, 0xBF] {
        return String::from_utf8_lossy(&bytes[3..]).into_owned();
    }

    // Latin-1 fallback
    bytes.iter().map(|&b| b as char).collect()
}

/// Parse the `A` entry of a structure element: a single attribute
/// object, a stream, or an array of attribute objects and revision numbers.
pub fn parse_attributes(doc: &Document, obj: &Object) -> Result<Vec<Attribute>, TaggedPdfError> {
    match resolve(doc, obj)?.1 {
        Object::Null => Ok(Vec::new()),
        Object::Dictionary(dict) => parse_attributes_from_dict(doc, dict),
        Object::Stream(stream) => parse_attributes_from_dict(doc, &stream.dict),
        Object::Array(items) => parse_attributes_from_array(doc, items),
        other => Err(TaggedPdfError::Structure(format!(
            "attributes from {}",
            type_name(other)
        ))),
    }
}

fn parse_attributes_from_array(
    doc: &Document,
    items: &[Object],
) -> Result<Vec<Attribute>, TaggedPdfError> {
    let mut attributes = Vec::new();
    for item in items {
        match resolve(doc, item)?.1 {
            Object::Dictionary(dict) => attributes.extend(parse_attributes_from_dict(doc, dict)?),
            Object::Stream(stream) => {
                attributes.extend(parse_attributes_from_dict(doc, &stream.dict)?)
            }
            Object::Integer(_) => warn!("attribute revisions not implemented"),
            Object::Null => {
                return Err(TaggedPdfError::Structure("null value in attributes".into()))
            }
            other => {
                return Err(TaggedPdfError::Structure(format!(
                    "wrong type in attributes: {}",
                    type_name(other)
                )))
            }
        }
    }
    Ok(attributes)
}

/// Parse one attribute object. Every entry other than the owner `O`
/// becomes an attribute; values are not checked against the standard
/// attribute set.
pub fn parse_attributes_from_dict(
    doc: &Document,
    dict: &Dictionary,
) -> Result<Vec<Attribute>, TaggedPdfError> {
    let owner = required(b"O", get_name(doc, dict, b"O")?)?;
    if owner == "UserProperties" {
        return parse_user_properties(doc, dict);
    }

    let mut attributes = Vec::new();
    for (key, value) in dict.iter() {
        if key.as_slice() == b"O" {
            continue;
        }
        let value = match resolve(doc, value) {
            Ok((_, target)) => PdfValue::from_object(target),
            Err(e) => {
                warn!("unresolved attribute value: {}", e);
                PdfValue::from_object(value)
            }
        };
        attributes.push(Attribute::new(
            String::from_utf8_lossy(key).into_owned(),
            value,
            owner.clone(),
        ));
    }
    Ok(attributes)
}

fn parse_user_properties(
    doc: &Document,
    dict: &Dictionary,
) -> Result<Vec<Attribute>, TaggedPdfError> {
    // The property array is required even though its entries are not decoded
    required(b"P", get_array(doc, dict, b"P")?)?;
    warn!("parsing of /UserProperties not implemented");
    Ok(Vec::new())
}

/// Parse the `C` entry: a class name or an array of class names, where
/// revision numbers may follow names.
pub fn parse_attrib_class(doc: &Document, obj: &Object) -> Result<Vec<String>, TaggedPdfError> {
    match resolve(doc, obj)?.1 {
        Object::Null => Ok(Vec::new()),
        Object::Name(name) => Ok(vec![String::from_utf8_lossy(name).into_owned()]),
        Object::Array(items) => {
            let mut classes = Vec::with_capacity(items.len());
            for item in items {
                match resolve(doc, item)?.1 {
                    Object::Name(name) => classes.push(String::from_utf8_lossy(name).into_owned()),
                    Object::Integer(_) => warn!("attribute class revisions not implemented"),
                    other => {
                        return Err(TaggedPdfError::Structure(format!(
                            "wrong type {} in attribute class",
                            type_name(other)
                        )))
                    }
                }
            }
            Ok(classes)
        }
        other => Err(TaggedPdfError::Structure(format!(
            "wrong type {} for attribute class",
            type_name(other)
        ))),
    }
}
