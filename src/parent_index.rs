//! The structure parent tree (`ParentTree`) as a two-level lookup index
//!
//! Pages and content streams declare a `StructParents` key. Its entry is an
//! array indexed by MCID whose elements point at the owning structure
//! elements. Objects with a `StructParent` key map to a single element.

use crate::parsing::{resolve, type_name};
use crate::tree_map::NumberTree;
use log::warn;
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;

/// One value of the parent tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ParentEntry {
    /// Per-MCID parents of a content stream; `None` for null slots
    MarkedContent(Vec<Option<ObjectId>>),
    /// Parent of a single object reference
    Object(ObjectId),
}

/// Why a parent lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMiss {
    NoSlot,
    NotAnArray,
    OutOfRange { len: usize },
    NullEntry,
}

#[derive(Debug, Clone, Default)]
pub struct ParentIndex {
    entries: BTreeMap<i64, ParentEntry>,
}

impl ParentIndex {
    /// Decode the values of a flattened parent tree. Entries of an
    /// unexpected kind are logged and skipped.
    pub fn from_number_tree(doc: &Document, tree: &NumberTree) -> Self {
        let mut entries = BTreeMap::new();
        for (&key, value) in tree.iter() {
            let resolved = match resolve(doc, value) {
                Ok(r) => r,
                Err(e) => {
                    warn!("skip parent tree entry {}: {}", key, e);
                    continue;
                }
            };
            let entry = match resolved {
                (_, Object::Array(items)) => ParentEntry::MarkedContent(
                    items
                        .iter()
                        .enumerate()
                        .map(|(mcid, item)| match item {
                            Object::Reference(id) => Some(*id),
                            Object::Null => None,
                            other => {
                                warn!(
                                    "parent tree entry {} has {} at MCID {}",
                                    key,
                                    type_name(other),
                                    mcid
                                );
                                None
                            }
                        })
                        .collect(),
                ),
                (Some(id), Object::Dictionary(_)) => ParentEntry::Object(id),
                (_, other) => {
                    warn!("skip parent tree entry {} of type {}", key, type_name(other));
                    continue;
                }
            };
            entries.insert(key, entry);
        }
        Self { entries }
    }

    pub fn get(&self, key: i64) -> Option<&ParentEntry> {
        self.entries.get(&key)
    }

    /// Resolve `(StructParents, MCID)` to the id of the owning element.
    pub fn lookup(&self, key: i64, mcid: i64) -> Result<ObjectId, LookupMiss> {
        let parents = match self.entries.get(&key) {
            None => return Err(LookupMiss::NoSlot),
            Some(ParentEntry::Object(_)) => return Err(LookupMiss::NotAnArray),
            Some(ParentEntry::MarkedContent(parents)) => parents,
        };
        let slot = usize::try_from(mcid)
            .ok()
            .and_then(|i| parents.get(i))
            .ok_or(LookupMiss::OutOfRange { len: parents.len() })?;
        slot.ok_or(LookupMiss::NullEntry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&i64, &ParentEntry)> {
        self.entries.iter()
    }
}
