//! Name trees and number trees (ISO 32000-1:2008, Sections 7.9.6 and 7.9.7)
//!
//! Both are flattened into an ordered map on construction. Structural
//! irregularities are logged rather than rejected.

use crate::parsing::{get_array, resolve, type_name};
use crate::TaggedPdfError;
use log::{error, warn};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Debug;

/// Key type of a flattened tree.
pub trait TreeKey: Ord + Clone + Debug {
    /// Entry holding the key/value pairs in leaf nodes (`Names` or `Nums`).
    const VALUES_KEY: &'static [u8];
    const TREE_KIND: &'static str;

    fn from_object(obj: &Object) -> Option<Self>;
}

impl TreeKey for i64 {
    const VALUES_KEY: &'static [u8] = b"Nums";
    const TREE_KIND: &'static str = "number";

    fn from_object(obj: &Object) -> Option<Self> {
        match obj {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl TreeKey for Vec<u8> {
    const VALUES_KEY: &'static [u8] = b"Names";
    const TREE_KIND: &'static str = "name";

    fn from_object(obj: &Object) -> Option<Self> {
        match obj {
            Object::String(bytes, _) => Some(bytes.clone()),
            _ => None,
        }
    }
}

/// Tree-structured ordered dictionary flattened into a sorted map.
///
/// Values are kept as they appear in the leaves (possibly references).
#[derive(Debug, Clone)]
pub struct KeyedTree<K: TreeKey> {
    entries: BTreeMap<K, Object>,
}

/// Tree with byte-string keys.
pub type NameTree = KeyedTree<Vec<u8>>;

/// Tree with integer keys.
pub type NumberTree = KeyedTree<i64>;

impl<K: TreeKey> KeyedTree<K> {
    /// Flatten the tree rooted at `root`.
    pub fn parse(doc: &Document, root: &Dictionary) -> Self {
        let mut tree = Self {
            entries: BTreeMap::new(),
        };
        let mut visited = HashSet::new();
        tree.add_node(doc, root, true, &mut visited);
        tree
    }

    pub fn get(&self, key: &K) -> Option<&Object> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &Object)> {
        self.entries.iter()
    }

    fn add_node(
        &mut self,
        doc: &Document,
        dict: &Dictionary,
        is_root: bool,
        visited: &mut HashSet<ObjectId>,
    ) {
        let kids = optional_array(doc, dict, b"Kids");
        let values = optional_array(doc, dict, K::VALUES_KEY);
        let limits = optional_array(doc, dict, b"Limits");

        // Limits is required in intermediate and leaf nodes and should
        // not appear in the root
        if is_root && limits.is_some() {
            error!("{} tree root has Limits", K::TREE_KIND);
        } else if !is_root && limits.is_none() {
            error!("missing Limits for non-root {} tree node", K::TREE_KIND);
        }

        match (&kids, &values) {
            (None, None) => error!("{} tree node has neither kids nor values", K::TREE_KIND),
            (Some(_), Some(_)) => error!("{} tree node has both kids and values", K::TREE_KIND),
            _ => {}
        }

        if let Some(kids) = kids {
            for kid in kids {
                match Self::parse_kid(doc, kid, visited) {
                    Ok(kid_dict) => self.add_node(doc, kid_dict, false, visited),
                    Err(e) => warn!("skip {} tree node with error: {}", K::TREE_KIND, e),
                }
            }
        }

        if let Some(values) = values {
            if values.len() % 2 != 0 {
                warn!("odd number of values: {}", values.len());
            }
            for pair in values.chunks_exact(2) {
                let key = match resolve(doc, &pair[0]) {
                    Ok((_, obj)) => K::from_object(obj),
                    Err(_) => None,
                };
                let Some(key) = key else {
                    warn!(
                        "skip {} tree entry with {} key",
                        K::TREE_KIND,
                        type_name(&pair[0])
                    );
                    continue;
                };
                if self.entries.contains_key(&key) {
                    warn!("duplicate key {:?} in {} tree, keeping first", key, K::TREE_KIND);
                    continue;
                }
                self.entries.insert(key, pair[1].clone());
            }
        }
    }

    fn parse_kid<'a>(
        doc: &'a Document,
        kid: &'a Object,
        visited: &mut HashSet<ObjectId>,
    ) -> Result<&'a Dictionary, TaggedPdfError> {
        let (id, obj) = resolve(doc, kid)?;
        let dict = match obj {
            Object::Dictionary(d) => d,
            other => {
                return Err(TaggedPdfError::Structure(format!(
                    "{} tree node child is {}, not dictionary",
                    K::TREE_KIND,
                    type_name(other)
                )))
            }
        };
        match id {
            Some(id) => {
                if !visited.insert(id) {
                    return Err(TaggedPdfError::Structure(format!(
                        "{} tree node {} {} R visited twice",
                        K::TREE_KIND,
                        id.0,
                        id.1
                    )));
                }
            }
            None => warn!("{} tree node child is not indirect", K::TREE_KIND),
        }
        Ok(dict)
    }
}

fn optional_array<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Vec<Object>> {
    match get_array(doc, dict, key) {
        Ok(value) => value,
        Err(e) => {
            error!("{}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, StringFormat};

    fn key(s: &str) -> Object {
        Object::String(s.as_bytes().to_vec(), StringFormat::Literal)
    }

    #[test]
    fn test_flat_number_tree() {
        let doc = Document::with_version("1.7");
        let root = dictionary! {
            "Nums" => Object::Array(vec![
                Object::Integer(0), Object::Array(vec![]),
                Object::Integer(3), Object::Null,
            ]),
        };
        let tree = NumberTree::parse(&doc, &root);
        assert_eq!(tree.len(), 2);
        assert!(tree.contains_key(&0));
        assert!(tree.contains_key(&3));
        assert!(!tree.contains_key(&1));
    }

    #[test]
    fn test_nested_name_tree() {
        let mut doc = Document::with_version("1.7");
        let leaf1 = doc.add_object(dictionary! {
            "Limits" => Object::Array(vec![key("a"), key("b")]),
            "Names" => Object::Array(vec![key("a"), Object::Integer(1), key("b"), Object::Integer(2)]),
        });
        let leaf2 = doc.add_object(dictionary! {
            "Limits" => Object::Array(vec![key("c"), key("c")]),
            "Names" => Object::Array(vec![key("c"), Object::Integer(3)]),
        });
        let root = dictionary! {
            "Kids" => Object::Array(vec![Object::Reference(leaf1), Object::Reference(leaf2)]),
        };
        let tree = NameTree::parse(&doc, &root);
        assert_eq!(tree.len(), 3);
        let keys: Vec<&Vec<u8>> = tree.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![&b"a".to_vec(), &b"b".to_vec(), &b"c".to_vec()]);
        assert_eq!(tree.get(&b"b".to_vec()), Some(&Object::Integer(2)));
    }

    #[test]
    fn test_duplicate_keys_keep_first_and_cycles_are_cut() {
        let mut doc = Document::with_version("1.7");
        let kid_id = doc.new_object_id();
        let kid = dictionary! {
            "Limits" => Object::Array(vec![Object::Integer(1), Object::Integer(1)]),
            "Nums" => Object::Array(vec![
                Object::Integer(1), Object::Integer(10),
                Object::Integer(1), Object::Integer(20),
            ]),
            // Points back at itself
            "Kids" => Object::Array(vec![Object::Reference(kid_id)]),
        };
        doc.objects.insert(kid_id, Object::Dictionary(kid));
        let root = dictionary! { "Kids" => Object::Array(vec![Object::Reference(kid_id)]) };
        let tree = NumberTree::parse(&doc, &root);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(&1), Some(&Object::Integer(10)));
    }

    #[test]
    fn test_bad_kids_are_skipped() {
        let doc = Document::with_version("1.7");
        let root = dictionary! {
            "Kids" => Object::Array(vec![Object::Integer(5), Object::Reference((42, 0))]),
        };
        let tree = NumberTree::parse(&doc, &root);
        assert!(tree.is_empty());
    }
}
