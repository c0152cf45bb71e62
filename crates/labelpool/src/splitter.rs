//! Splits a multi-page PDF into single-page PDFs.
//!
//! Each output page is a copy of the source with every other page removed
//! and unreferenced objects pruned, so fonts and images shared between pages
//! are carried along where needed.

use lopdf::Document;

use crate::error::SplitError;

const PDF_MAGIC: &[u8] = b"%PDF-";

fn load(bytes: &[u8]) -> Result<Document, SplitError> {
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(SplitError::MalformedDocument(
            "missing %PDF- header".to_string(),
        ));
    }
    Document::load_mem(bytes).map_err(|e| SplitError::MalformedDocument(e.to_string()))
}

/// Number of pages in the document.
pub fn page_count(bytes: &[u8]) -> Result<u32, SplitError> {
    let doc = load(bytes)?;
    let count = doc.get_pages().len() as u32;
    if count == 0 {
        return Err(SplitError::EmptyDocument);
    }
    Ok(count)
}

/// Returns one single-page document per source page, in page order.
pub fn split(bytes: &[u8]) -> Result<Vec<Vec<u8>>, SplitError> {
    let doc = load(bytes)?;
    let numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    if numbers.is_empty() {
        return Err(SplitError::EmptyDocument);
    }

    let _span = tracing::debug_span!("splitter.split", pages = numbers.len()).entered();

    numbers
        .iter()
        .map(|&page| extract_page(&doc, &numbers, page))
        .collect()
}

fn extract_page(doc: &Document, all: &[u32], keep: u32) -> Result<Vec<u8>, SplitError> {
    let others: Vec<u32> = all.iter().copied().filter(|&n| n != keep).collect();

    let mut single = doc.clone();
    single.delete_pages(&others);
    single.prune_objects();

    if single.get_pages().len() != 1 {
        return Err(SplitError::PageSave {
            page: keep,
            reason: "page tree did not reduce to a single page".to_string(),
        });
    }

    let mut out = Vec::new();
    single
        .save_to(&mut out)
        .map_err(|e| SplitError::PageSave {
            page: keep,
            reason: e.to_string(),
        })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Object, Stream};

    fn build_pdf(texts: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for text in texts {
            let content = format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", text);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 288.into(), 432.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_split_returns_one_document_per_page() {
        let source = build_pdf(&["REF:1 PAGE ONE", "REF:2 PAGE TWO", "REF:3 PAGE THREE"]);
        assert_eq!(page_count(&source).unwrap(), 3);

        let pages = split(&source).unwrap();
        assert_eq!(pages.len(), 3);
        for (i, page) in pages.iter().enumerate() {
            assert_eq!(page_count(page).unwrap(), 1);
            let doc = Document::load_mem(page).unwrap();
            let text = doc.extract_text(&[1]).unwrap();
            assert!(
                text.contains(&format!("REF:{}", i + 1)),
                "page {} text was {:?}",
                i + 1,
                text
            );
        }
    }

    #[test]
    fn test_split_is_deterministic() {
        let source = build_pdf(&["A", "B"]);
        assert_eq!(split(&source).unwrap(), split(&source).unwrap());
    }

    #[test]
    fn test_single_page_document() {
        let source = build_pdf(&["ONLY"]);
        let pages = split(&source).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(page_count(&pages[0]).unwrap(), 1);
    }

    #[test]
    fn test_non_pdf_is_malformed() {
        assert!(matches!(
            split(b"hello world"),
            Err(SplitError::MalformedDocument(_))
        ));
        assert!(matches!(
            page_count(b"%PDF-1.5 garbage"),
            Err(SplitError::MalformedDocument(_))
        ));
    }
}
