//! PDF merge engine.
//!
//! Accumulates pages from an ordered list of source documents into a fresh
//! output graph. Every copied object gets a new ID allocated from 1, with
//! all internal references rewritten during the copy. References that occur
//! more than once within one page keep pointing at a single copy; pages
//! from different sources never share objects.
//!
//! Per-source failures follow a log-and-skip policy: an unreadable file or
//! an uncopyable page is logged and the merge continues. Only a merge that
//! produces zero pages overall is an error.

use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use crate::pages::Page;
use std::collections::{BTreeMap, HashMap};

/// Object ID of the output catalog.
pub const CATALOG_ID: u32 = 1;
/// Object ID of the output page tree root.
pub const PAGES_ROOT_ID: u32 = 2;

/// An inclusive, 1-based page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    start: usize,
    end: usize,
}

impl PageRange {
    /// Create a range covering pages `start` through `end` inclusive,
    /// numbered from 1.
    pub fn new(start: usize, end: usize) -> Result<Self> {
        if start == 0 || end < start {
            return Err(Error::InvalidPdf(format!("invalid page range {}-{}", start, end)));
        }
        Ok(Self { start, end })
    }

    /// Whether a 1-based page number falls inside this range.
    pub fn contains(&self, page_number: usize) -> bool {
        (self.start..=self.end).contains(&page_number)
    }
}

/// One input to a merge: raw PDF bytes plus an optional page range.
#[derive(Debug, Clone)]
pub struct MergeSource {
    /// Raw bytes of the source PDF
    pub data: Vec<u8>,
    /// Pages to take, or `None` for the whole document
    pub range: Option<PageRange>,
}

impl MergeSource {
    /// A source contributing all of its pages.
    pub fn all(data: Vec<u8>) -> Self {
        Self { data, range: None }
    }

    /// A source contributing only the given page range.
    pub fn with_range(data: Vec<u8>, range: PageRange) -> Self {
        Self {
            data,
            range: Some(range),
        }
    }
}

/// The finished output graph, ready for serialization.
#[derive(Debug)]
pub struct MergedDocument {
    /// Objects keyed by ID, ascending iteration order
    pub objects: BTreeMap<u32, Object>,
    /// ID of the catalog object the trailer's /Root must point at
    pub root_id: u32,
    /// Number of pages appended
    pub page_count: usize,
}

impl MergedDocument {
    /// Look up an object by ID.
    pub fn get(&self, id: u32) -> Option<&Object> {
        self.objects.get(&id)
    }
}

/// Accumulator that builds the merged output graph page by page.
pub struct Merger {
    objects: BTreeMap<u32, Object>,
    next_id: u32,
    page_refs: Vec<ObjectRef>,
}

impl Merger {
    /// Create an empty merger. IDs 1 and 2 are reserved for the catalog
    /// and the page tree root written by [`finish`](Self::finish).
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            next_id: PAGES_ROOT_ID + 1,
            page_refs: Vec::new(),
        }
    }

    /// Append the selected pages of a document, in document order.
    ///
    /// Pages that fail to copy are logged and skipped. Returns the number
    /// of pages actually appended.
    pub fn append_document(
        &mut self,
        doc: &mut Document,
        range: Option<&PageRange>,
    ) -> Result<usize> {
        let pages = doc.pages()?;

        let mut appended = 0;
        for (index, page) in pages.iter().enumerate() {
            let page_number = index + 1;
            if let Some(range) = range {
                if !range.contains(page_number) {
                    continue;
                }
            }

            match self.append_page(doc, page) {
                Ok(()) => appended += 1,
                Err(e) => {
                    log::warn!("Skipping page {}: failed to copy ({})", page_number, e);
                },
            }
        }

        Ok(appended)
    }

    /// Deep-copy one page and everything reachable from it into the
    /// output graph, then hang it under the output page tree root.
    pub fn append_page(&mut self, doc: &mut Document, page: &Page) -> Result<()> {
        // One remap table per page: references repeated within this page
        // land on a single copy, pages never share objects with each other
        let mut remap = HashMap::new();

        let new_page_id = self.alloc();
        remap.insert(page.node_ref, new_page_id);

        let mut new_dict = HashMap::new();
        for (key, value) in &page.dict {
            // The old parent link is meaningless in the output tree
            if key == "Parent" {
                continue;
            }
            new_dict.insert(key.clone(), self.copy_object(doc, value, &mut remap)?);
        }
        new_dict.insert("Type".to_string(), Object::Name("Page".to_string()));
        new_dict.insert(
            "Parent".to_string(),
            Object::Reference(ObjectRef::new(PAGES_ROOT_ID, 0)),
        );

        self.objects.insert(new_page_id, Object::Dictionary(new_dict));
        self.page_refs.push(ObjectRef::new(new_page_id, 0));

        Ok(())
    }

    /// Build the catalog and page tree root and hand over the graph.
    ///
    /// Fails with [`Error::NoValidPages`] if nothing was appended.
    pub fn finish(mut self) -> Result<MergedDocument> {
        if self.page_refs.is_empty() {
            return Err(Error::NoValidPages);
        }

        let page_count = self.page_refs.len();

        let mut pages_dict = HashMap::new();
        pages_dict.insert("Type".to_string(), Object::Name("Pages".to_string()));
        pages_dict.insert(
            "Kids".to_string(),
            Object::Array(self.page_refs.iter().map(|r| Object::Reference(*r)).collect()),
        );
        pages_dict.insert("Count".to_string(), Object::Integer(page_count as i64));
        self.objects.insert(PAGES_ROOT_ID, Object::Dictionary(pages_dict));

        let mut catalog_dict = HashMap::new();
        catalog_dict.insert("Type".to_string(), Object::Name("Catalog".to_string()));
        catalog_dict.insert(
            "Pages".to_string(),
            Object::Reference(ObjectRef::new(PAGES_ROOT_ID, 0)),
        );
        self.objects.insert(CATALOG_ID, Object::Dictionary(catalog_dict));

        Ok(MergedDocument {
            objects: self.objects,
            root_id: CATALOG_ID,
            page_count,
        })
    }

    fn alloc(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Copy an object into the output graph, rewriting references.
    ///
    /// The remap entry for a reference is inserted before recursing into
    /// the referenced object, so reference cycles terminate.
    fn copy_object(
        &mut self,
        doc: &mut Document,
        obj: &Object,
        remap: &mut HashMap<ObjectRef, u32>,
    ) -> Result<Object> {
        match obj {
            Object::Reference(obj_ref) => {
                if let Some(&new_id) = remap.get(obj_ref) {
                    return Ok(Object::Reference(ObjectRef::new(new_id, 0)));
                }

                let new_id = self.alloc();
                remap.insert(*obj_ref, new_id);

                let loaded = doc.load_object(*obj_ref)?;
                let copied = self.copy_object(doc, &loaded, remap)?;
                self.objects.insert(new_id, copied);

                Ok(Object::Reference(ObjectRef::new(new_id, 0)))
            },
            Object::Dictionary(dict) => {
                let mut copied = HashMap::new();
                for (key, value) in dict {
                    copied.insert(key.clone(), self.copy_object(doc, value, remap)?);
                }
                Ok(Object::Dictionary(copied))
            },
            Object::Array(arr) => {
                let copied = arr
                    .iter()
                    .map(|item| self.copy_object(doc, item, remap))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Object::Array(copied))
            },
            Object::Stream { dict, data } => {
                let mut copied_dict = HashMap::new();
                for (key, value) in dict {
                    copied_dict.insert(key.clone(), self.copy_object(doc, value, remap)?);
                }
                // Payload bytes are carried over untouched
                Ok(Object::Stream {
                    dict: copied_dict,
                    data: data.clone(),
                })
            },
            other => Ok(other.clone()),
        }
    }
}

impl Default for Merger {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge an ordered list of sources into one output graph.
///
/// Sources that fail to parse or yield no copyable pages are logged and
/// skipped; the merge only fails if no pages could be taken from any
/// source at all.
pub fn merge_sources(sources: Vec<MergeSource>) -> Result<MergedDocument> {
    let mut merger = Merger::new();

    for (index, source) in sources.into_iter().enumerate() {
        let mut doc = match Document::from_bytes(source.data) {
            Ok(doc) => doc,
            Err(e) => {
                log::error!("Skipping source {}: failed to parse ({})", index, e);
                continue;
            },
        };

        match merger.append_document(&mut doc, source.range.as_ref()) {
            Ok(count) => log::info!("Appended {} pages from source {}", count, index),
            Err(e) => log::error!("Skipping source {}: failed to extract pages ({})", index, e),
        }
    }

    merger.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::build_pdf;

    fn single_page_pdf(marker: &str) -> Vec<u8> {
        build_pdf(&[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>",
            &format!("<< /Type /Page /Parent 2 0 R /Contents 4 0 R /Marker /{} >>", marker),
            "<< /Length 11 >>\nstream\nBT ET Tf 12\nendstream",
        ])
    }

    fn three_page_pdf() -> Vec<u8> {
        build_pdf(&[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R 4 0 R 5 0 R] /Count 3 >>",
            "<< /Type /Page /Parent 2 0 R /Marker /One >>",
            "<< /Type /Page /Parent 2 0 R /Marker /Two >>",
            "<< /Type /Page /Parent 2 0 R /Marker /Three >>",
        ])
    }

    fn page_markers(merged: &MergedDocument) -> Vec<String> {
        let pages_root = merged.get(PAGES_ROOT_ID).unwrap().as_dict().unwrap();
        let kids = pages_root.get("Kids").unwrap().as_array().unwrap();
        kids.iter()
            .map(|kid| {
                let kid_ref = kid.as_reference().unwrap();
                let page = merged.get(kid_ref.id).unwrap().as_dict().unwrap();
                page.get("Marker").unwrap().as_name().unwrap().to_string()
            })
            .collect()
    }

    #[test]
    fn test_page_range_validation() {
        assert!(PageRange::new(1, 1).is_ok());
        assert!(PageRange::new(2, 5).is_ok());
        assert!(PageRange::new(0, 3).is_err());
        assert!(PageRange::new(4, 2).is_err());

        let range = PageRange::new(2, 3).unwrap();
        assert!(!range.contains(1));
        assert!(range.contains(2));
        assert!(range.contains(3));
        assert!(!range.contains(4));
    }

    #[test]
    fn test_merge_two_documents_in_order() {
        let merged = merge_sources(vec![
            MergeSource::all(single_page_pdf("Alpha")),
            MergeSource::all(single_page_pdf("Beta")),
        ])
        .unwrap();

        assert_eq!(merged.page_count, 2);
        assert_eq!(merged.root_id, CATALOG_ID);
        assert_eq!(page_markers(&merged), vec!["Alpha", "Beta"]);

        let pages_root = merged.get(PAGES_ROOT_ID).unwrap().as_dict().unwrap();
        assert_eq!(pages_root.get("Count").unwrap().as_integer(), Some(2));
    }

    #[test]
    fn test_merged_pages_point_at_new_root() {
        let merged = merge_sources(vec![MergeSource::all(single_page_pdf("Solo"))]).unwrap();

        let pages_root = merged.get(PAGES_ROOT_ID).unwrap().as_dict().unwrap();
        let kids = pages_root.get("Kids").unwrap().as_array().unwrap();
        let page_ref = kids[0].as_reference().unwrap();
        let page = merged.get(page_ref.id).unwrap().as_dict().unwrap();

        assert_eq!(
            page.get("Parent").unwrap().as_reference(),
            Some(ObjectRef::new(PAGES_ROOT_ID, 0))
        );
    }

    #[test]
    fn test_content_stream_copied_verbatim() {
        let merged = merge_sources(vec![MergeSource::all(single_page_pdf("Solo"))]).unwrap();

        let pages_root = merged.get(PAGES_ROOT_ID).unwrap().as_dict().unwrap();
        let kids = pages_root.get("Kids").unwrap().as_array().unwrap();
        let page_ref = kids[0].as_reference().unwrap();
        let page = merged.get(page_ref.id).unwrap().as_dict().unwrap();
        let contents_ref = page.get("Contents").unwrap().as_reference().unwrap();

        match merged.get(contents_ref.id).unwrap() {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"BT ET Tf 12"),
            other => panic!("expected stream, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_shared_reference_within_page_stays_shared() {
        // Both /F1 and /F2 point at the same font object
        let pdf = build_pdf(&[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R /Resources << /Font << /F1 4 0 R /F2 4 0 R >> >> >>",
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>",
        ]);

        let merged = merge_sources(vec![MergeSource::all(pdf)]).unwrap();

        let pages_root = merged.get(PAGES_ROOT_ID).unwrap().as_dict().unwrap();
        let kids = pages_root.get("Kids").unwrap().as_array().unwrap();
        let page_ref = kids[0].as_reference().unwrap();
        let page = merged.get(page_ref.id).unwrap().as_dict().unwrap();

        let resources = page.get("Resources").unwrap().as_dict().unwrap();
        let fonts = resources.get("Font").unwrap().as_dict().unwrap();
        let f1 = fonts.get("F1").unwrap().as_reference().unwrap();
        let f2 = fonts.get("F2").unwrap().as_reference().unwrap();
        assert_eq!(f1, f2);
    }

    #[test]
    fn test_pages_from_different_sources_get_separate_copies() {
        let pdf = single_page_pdf("Dup");
        let merged =
            merge_sources(vec![MergeSource::all(pdf.clone()), MergeSource::all(pdf)]).unwrap();

        let pages_root = merged.get(PAGES_ROOT_ID).unwrap().as_dict().unwrap();
        let kids = pages_root.get("Kids").unwrap().as_array().unwrap();
        let content_ref = |kid: &Object| {
            let page = merged.get(kid.as_reference().unwrap().id).unwrap();
            page.as_dict().unwrap().get("Contents").unwrap().as_reference().unwrap()
        };
        assert_ne!(content_ref(&kids[0]), content_ref(&kids[1]));
    }

    #[test]
    fn test_self_referencing_page_terminates() {
        // Annotation points back at its own page
        let pdf = build_pdf(&[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R /Annots [4 0 R] >>",
            "<< /Type /Annot /Subtype /Link /P 3 0 R >>",
        ]);

        let merged = merge_sources(vec![MergeSource::all(pdf)]).unwrap();
        assert_eq!(merged.page_count, 1);

        let pages_root = merged.get(PAGES_ROOT_ID).unwrap().as_dict().unwrap();
        let kids = pages_root.get("Kids").unwrap().as_array().unwrap();
        let page_ref = kids[0].as_reference().unwrap();
        let page = merged.get(page_ref.id).unwrap().as_dict().unwrap();
        let annots = page.get("Annots").unwrap().as_array().unwrap();
        let annot = merged
            .get(annots[0].as_reference().unwrap().id)
            .unwrap()
            .as_dict()
            .unwrap();

        // The back-reference lands on the copied page, not the source one
        assert_eq!(annot.get("P").unwrap().as_reference(), Some(page_ref));
    }

    #[test]
    fn test_range_selection() {
        let merged = merge_sources(vec![MergeSource::with_range(
            three_page_pdf(),
            PageRange::new(2, 3).unwrap(),
        )])
        .unwrap();

        assert_eq!(merged.page_count, 2);
        assert_eq!(page_markers(&merged), vec!["Two", "Three"]);
    }

    #[test]
    fn test_range_beyond_end_takes_what_exists() {
        let merged = merge_sources(vec![MergeSource::with_range(
            three_page_pdf(),
            PageRange::new(3, 10).unwrap(),
        )])
        .unwrap();

        assert_eq!(merged.page_count, 1);
        assert_eq!(page_markers(&merged), vec!["Three"]);
    }

    #[test]
    fn test_corrupt_source_skipped() {
        let merged = merge_sources(vec![
            MergeSource::all(single_page_pdf("Good1")),
            MergeSource::all(b"this is not a pdf at all".to_vec()),
            MergeSource::all(single_page_pdf("Good2")),
        ])
        .unwrap();

        assert_eq!(merged.page_count, 2);
        assert_eq!(page_markers(&merged), vec!["Good1", "Good2"]);
    }

    #[test]
    fn test_no_sources_fails() {
        assert!(matches!(merge_sources(vec![]), Err(Error::NoValidPages)));
    }

    #[test]
    fn test_all_sources_corrupt_fails() {
        let result = merge_sources(vec![
            MergeSource::all(b"garbage".to_vec()),
            MergeSource::all(b"%PDF-1.4\nno xref here".to_vec()),
        ]);
        assert!(matches!(result, Err(Error::NoValidPages)));
    }

    #[test]
    fn test_object_ids_are_contiguous_from_one() {
        let merged = merge_sources(vec![MergeSource::all(single_page_pdf("Solo"))]).unwrap();
        let ids: Vec<u32> = merged.objects.keys().copied().collect();
        let expected: Vec<u32> = (1..=ids.len() as u32).collect();
        assert_eq!(ids, expected);
    }
}
