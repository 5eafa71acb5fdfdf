//! End-to-end merge tests: build source PDFs, merge them, write the
//! result to bytes, and read it back with the parser.

use mergepdf::document::Document;
use mergepdf::merge::{MergeSource, PageRange, merge_sources};
use mergepdf::object::Object;
use mergepdf::writer::write_document;
use std::io::Write;

/// Build a PDF with consecutive object numbers from 1 and a correct
/// classic xref table. Object bodies may contain streams.
fn build_pdf(bodies: &[Vec<u8>]) -> Vec<u8> {
    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();

    for (i, body) in bodies.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", bodies.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            bodies.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );

    out
}

fn stream_body(dict: &str, data: &[u8]) -> Vec<u8> {
    let mut body = dict.as_bytes().to_vec();
    body.extend_from_slice(b"\nstream\n");
    body.extend_from_slice(data);
    body.extend_from_slice(b"\nendstream");
    body
}

/// A single-page PDF whose content stream is the given bytes.
fn single_page_pdf(content: &[u8]) -> Vec<u8> {
    build_pdf(&[
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>".to_vec(),
        b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>".to_vec(),
        stream_body(&format!("<< /Length {} >>", content.len()), content),
    ])
}

fn multi_page_pdf(contents: &[&[u8]]) -> Vec<u8> {
    let n = contents.len();
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 3 + i * 2)).collect();

    let mut bodies = vec![
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 612 792] >>",
            kids.join(" "),
            n
        )
        .into_bytes(),
    ];
    for (i, content) in contents.iter().enumerate() {
        let page_id = 3 + i * 2;
        bodies.push(
            format!("<< /Type /Page /Parent 2 0 R /Contents {} 0 R >>", page_id + 1).into_bytes(),
        );
        bodies.push(stream_body(&format!("<< /Length {} >>", content.len()), content));
    }
    build_pdf(&bodies)
}

/// Content stream bytes of every page, in order.
fn page_contents(data: Vec<u8>) -> Vec<Vec<u8>> {
    let mut doc = Document::from_bytes(data).unwrap();
    let pages = doc.pages().unwrap();
    pages
        .iter()
        .map(|page| {
            let contents_ref = page.dict.get("Contents").unwrap().as_reference().unwrap();
            match doc.load_object(contents_ref).unwrap() {
                Object::Stream { data, .. } => data.to_vec(),
                other => panic!("expected stream, got {}", other.type_name()),
            }
        })
        .collect()
}

#[test]
fn merge_two_single_page_documents() {
    let merged = merge_sources(vec![
        MergeSource::all(single_page_pdf(b"0 0 m 10 10 l S")),
        MergeSource::all(single_page_pdf(b"BT /F1 12 Tf ET")),
    ])
    .unwrap();

    assert_eq!(merged.page_count, 2);

    let bytes = write_document(&merged).unwrap();
    let contents = page_contents(bytes);
    assert_eq!(contents.len(), 2);
    assert_eq!(contents[0], b"0 0 m 10 10 l S");
    assert_eq!(contents[1], b"BT /F1 12 Tf ET");
}

#[test]
fn content_streams_survive_round_trip_byte_identical() {
    let originals: Vec<&[u8]> = vec![b"q 1 0 0 1 50 50 cm Q", b"0.5 g 0 0 100 100 re f"];
    let source = multi_page_pdf(&originals);

    let merged = merge_sources(vec![MergeSource::all(source)]).unwrap();
    let bytes = write_document(&merged).unwrap();

    // Parse the output, merge it again, and write it again
    let merged_twice = merge_sources(vec![MergeSource::all(bytes)]).unwrap();
    let bytes_twice = write_document(&merged_twice).unwrap();

    let contents = page_contents(bytes_twice);
    assert_eq!(contents.len(), originals.len());
    for (result, original) in contents.iter().zip(&originals) {
        assert_eq!(result.as_slice(), *original);
    }
}

#[test]
fn compressed_content_stream_copied_verbatim() {
    let plain = b"BT (Hello) Tj ET";
    let mut encoder =
        flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(plain).unwrap();
    let compressed = encoder.finish().unwrap();

    let source = build_pdf(&[
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>".to_vec(),
        b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>".to_vec(),
        stream_body(
            &format!("<< /Length {} /Filter /FlateDecode >>", compressed.len()),
            &compressed,
        ),
    ]);

    let merged = merge_sources(vec![MergeSource::all(source)]).unwrap();
    let bytes = write_document(&merged).unwrap();

    // The compressed payload passes through untouched and still inflates
    let contents = page_contents(bytes);
    assert_eq!(contents[0], compressed);

    let mut decoder = flate2::read::ZlibDecoder::new(contents[0].as_slice());
    let mut inflated = Vec::new();
    std::io::Read::read_to_end(&mut decoder, &mut inflated).unwrap();
    assert_eq!(inflated, plain);
}

#[test]
fn empty_input_fails_with_no_valid_pages() {
    assert!(matches!(
        merge_sources(vec![]),
        Err(mergepdf::Error::NoValidPages)
    ));
}

#[test]
fn corrupt_file_in_the_middle_is_skipped() {
    let merged = merge_sources(vec![
        MergeSource::all(single_page_pdf(b"1")),
        MergeSource::all(b"definitely not a pdf".to_vec()),
        MergeSource::all(single_page_pdf(b"2")),
    ])
    .unwrap();

    assert_eq!(merged.page_count, 2);

    let contents = page_contents(write_document(&merged).unwrap());
    assert_eq!(contents[0], b"1");
    assert_eq!(contents[1], b"2");
}

#[test]
fn range_selection_takes_pages_two_and_three() {
    let source = multi_page_pdf(&[b"one", b"two", b"three"]);
    let merged = merge_sources(vec![MergeSource::with_range(
        source,
        PageRange::new(2, 3).unwrap(),
    )])
    .unwrap();

    assert_eq!(merged.page_count, 2);

    let contents = page_contents(write_document(&merged).unwrap());
    assert_eq!(contents[0], b"two");
    assert_eq!(contents[1], b"three");
}

#[test]
fn declared_page_count_matches_appended_pages() {
    let merged = merge_sources(vec![
        MergeSource::all(multi_page_pdf(&[b"a", b"b"])),
        MergeSource::all(single_page_pdf(b"c")),
    ])
    .unwrap();

    let bytes = write_document(&merged).unwrap();
    let mut doc = Document::from_bytes(bytes).unwrap();

    let root = doc.page_tree_root().unwrap();
    let pages_node = doc.load_object(root).unwrap();
    let count = pages_node
        .as_dict()
        .unwrap()
        .get("Count")
        .unwrap()
        .as_integer()
        .unwrap();

    assert_eq!(count, 3);
    assert_eq!(doc.pages().unwrap().len(), 3);
}

#[test]
fn re_extraction_is_stable() {
    let merged = merge_sources(vec![MergeSource::all(multi_page_pdf(&[b"x", b"y"]))]).unwrap();
    let bytes = write_document(&merged).unwrap();

    let mut doc = Document::from_bytes(bytes).unwrap();
    let first: Vec<_> = doc.pages().unwrap().iter().map(|p| p.node_ref).collect();
    let second: Vec<_> = doc.pages().unwrap().iter().map(|p| p.node_ref).collect();
    assert_eq!(first, second);
}

#[test]
fn inherited_media_box_lands_on_copied_pages() {
    // Pages inherit MediaBox from the source root; the copies must carry
    // it themselves since the old parent link is severed
    let source = multi_page_pdf(&[b"p1"]);
    let merged = merge_sources(vec![MergeSource::all(source)]).unwrap();
    let bytes = write_document(&merged).unwrap();

    let mut doc = Document::from_bytes(bytes).unwrap();
    let pages = doc.pages().unwrap();
    let media_box = pages[0].dict.get("MediaBox").unwrap().as_array().unwrap();
    assert_eq!(media_box[2].as_integer(), Some(612));
    assert_eq!(media_box[3].as_integer(), Some(792));
}
