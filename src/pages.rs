//! Page tree traversal.
//!
//! Walks the page tree from the catalog's /Pages root and returns leaf
//! pages in document order, with the inheritable attributes (/Resources,
//! /MediaBox, /CropBox, /Rotate) resolved from ancestor nodes per
//! ISO 32000-1 section 7.7.3.3.

use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use std::collections::{HashMap, HashSet};

/// Attributes a page may inherit from ancestor Pages nodes.
const INHERITABLE_ATTRS: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// Page tree depth limit, guards against malformed trees
const MAX_TREE_DEPTH: usize = 50;

/// A leaf page extracted from the page tree.
#[derive(Debug, Clone)]
pub struct Page {
    /// The page dictionary with inherited attributes merged in
    pub dict: HashMap<String, Object>,
    /// Reference to the page object in its source document
    pub node_ref: ObjectRef,
}

/// Extract all pages in document order.
///
/// Intermediate nodes contribute their inheritable attributes to the pages
/// below them; a page's own value always wins over an inherited one.
/// Reference cycles in the tree are skipped with a warning.
pub fn extract_pages(doc: &mut Document) -> Result<Vec<Page>> {
    let root = doc.page_tree_root()?;

    let mut pages = Vec::new();
    let mut visited = HashSet::new();
    walk_node(doc, root, &HashMap::new(), &mut pages, &mut visited, 0)?;

    Ok(pages)
}

fn walk_node(
    doc: &mut Document,
    node_ref: ObjectRef,
    inherited: &HashMap<String, Object>,
    pages: &mut Vec<Page>,
    visited: &mut HashSet<ObjectRef>,
    depth: usize,
) -> Result<()> {
    if depth > MAX_TREE_DEPTH {
        log::warn!("Page tree depth exceeded {} levels, stopping branch", MAX_TREE_DEPTH);
        return Ok(());
    }
    if !visited.insert(node_ref) {
        log::warn!("Cycle in page tree at object {}, skipping", node_ref);
        return Ok(());
    }

    let node = doc.load_object(node_ref)?;
    let node_dict = match node.as_dict() {
        Some(d) => d.clone(),
        None => {
            return Err(Error::BrokenPageTree(format!(
                "page tree node {} is not a dictionary",
                node_ref
            )));
        },
    };

    // Missing /Type is tolerated: a node with /Kids acts as an
    // intermediate node, anything else as a leaf page
    let node_type = node_dict.get("Type").and_then(|o| o.as_name());
    let is_pages_node = match node_type {
        Some("Pages") => true,
        Some("Page") => false,
        _ => node_dict.contains_key("Kids"),
    };

    if !is_pages_node {
        let mut page_dict = node_dict;
        for attr in INHERITABLE_ATTRS {
            if !page_dict.contains_key(attr) {
                if let Some(value) = inherited.get(attr) {
                    page_dict.insert(attr.to_string(), value.clone());
                }
            }
        }
        pages.push(Page {
            dict: page_dict,
            node_ref,
        });
        return Ok(());
    }

    // Fold this node's own inheritable attributes over the ancestors'
    let mut child_inherited = inherited.clone();
    for attr in INHERITABLE_ATTRS {
        if let Some(value) = node_dict.get(attr) {
            child_inherited.insert(attr.to_string(), value.clone());
        }
    }

    let kids = match node_dict.get("Kids") {
        Some(kids_obj) => match doc.resolve(kids_obj)? {
            Object::Array(arr) => arr,
            other => {
                return Err(Error::BrokenPageTree(format!(
                    "/Kids of node {} is {}, not an array",
                    node_ref,
                    other.type_name()
                )));
            },
        },
        None => {
            log::warn!("Pages node {} has no /Kids array", node_ref);
            Vec::new()
        },
    };

    for kid in kids {
        match kid.as_reference() {
            Some(kid_ref) => {
                walk_node(doc, kid_ref, &child_inherited, pages, visited, depth + 1)?;
            },
            None => {
                log::warn!("Non-reference kid in Pages node {}, skipping", node_ref);
            },
        }
    }

    Ok(())
}
