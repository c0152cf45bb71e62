//! Builders for test documents and records.

#![allow(dead_code)]

use std::io::Cursor;

use chrono::Utc;
use lopdf::{dictionary, Document, Object, Stream};

use labelpool::model::{BulkUpload, PageStatus, SplitPage, UploadStatus};

/// Builds an in-memory PDF with one text line per page.
///
/// Text must not contain parentheses; the scripted extractor reads it back
/// from the content stream.
pub struct PdfBuilder {
    pages: Vec<String>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self { pages: Vec::new() }
    }

    pub fn page(mut self, text: &str) -> Self {
        self.pages.push(text.to_string());
        self
    }

    /// A well-formed label page: reference, tracking number and recipient.
    pub fn label(self, reference: &str, tracking: &str) -> Self {
        let text = format!(
            "SHIP TO JANE DOE 12 HIGH STREET REF:{} TRACKING {}",
            reference, tracking
        );
        self.page(&text)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for text in &self.pages {
            let content = format!("BT /F1 10 Tf 20 400 Td ({}) Tj ET", text);
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

        let mut out = Vec::new();
        doc.save_to(&mut out).expect("Failed to serialise test PDF");
        out
    }
}

/// Ten label pages with distinct references `1001..=1010` and tracking
/// numbers `1000 0000 00NN`.
pub fn ten_label_pdf(broken_page: Option<(u32, &str)>) -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    for n in 1..=10u32 {
        builder = match broken_page {
            Some((page, marker)) if page == n => builder.page(&format!("PAGE {} {}", n, marker)),
            _ => builder.label(&format!("{}", 1000 + n), &format!("1000 0000 00{:02}", n)),
        };
    }
    builder.build()
}

/// Text of the first page's first string literal.
pub fn page_text(pdf: &[u8]) -> String {
    page_text_at(pdf, 1)
}

/// Text of page `number` (1-based).
pub fn page_text_at(pdf: &[u8], number: u32) -> String {
    let doc = Document::load_mem(pdf).expect("Page is not a PDF");
    let page_id = *doc
        .get_pages()
        .get(&number)
        .expect("Document has no such page");
    let content = doc.get_page_content(page_id).expect("Page has no content");
    let raw = String::from_utf8_lossy(&content);
    match (raw.find('('), raw.rfind(')')) {
        (Some(start), Some(end)) if end > start => raw[start + 1..end].to_string(),
        _ => String::new(),
    }
}

/// Concatenates documents page by page under a fresh page tree.
pub fn merge_pdfs(parts: &[Vec<u8>]) -> Vec<u8> {
    let mut merged = Document::with_version("1.5");
    let mut next_id = 1;
    let mut page_ids = Vec::new();

    for part in parts {
        let mut doc = Document::load_mem(part).expect("Part is not a PDF");
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;
        page_ids.extend(doc.get_pages().into_values());

        for (id, object) in doc.objects {
            let kind = object
                .as_dict()
                .ok()
                .and_then(|dict| dict.get(b"Type").ok())
                .and_then(|name| name.as_name().ok());
            if !matches!(kind, Some(b"Catalog" | b"Pages")) {
                merged.objects.insert(id, object);
            }
        }
    }

    merged.max_id = next_id;
    let pages_id = merged.new_object_id();
    for id in &page_ids {
        merged
            .get_object_mut(*id)
            .and_then(Object::as_dict_mut)
            .expect("Page is not a dictionary")
            .set("Parent", pages_id);
    }

    let kids: Vec<Object> = page_ids.iter().copied().map(Object::Reference).collect();
    let count = kids.len() as i64;
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    merged.save_to(&mut out).expect("Failed to serialise merged PDF");
    out
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([0, 0, 0]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("Failed to encode PNG");
    out.into_inner()
}

pub fn new_upload(id: &str, owner: &str, courier: &str) -> BulkUpload {
    BulkUpload {
        id: id.to_string(),
        owner_id: owner.to_string(),
        courier_service_id: courier.to_string(),
        original_file_name: "labels.pdf".to_string(),
        original_file_key: None,
        original_file_size: 0,
        total_pages: 0,
        status: UploadStatus::Uploaded,
        uploaded_at: Utc::now(),
        processing_started_at: None,
        processing_ended_at: None,
    }
}

pub fn new_page(id: &str, upload_id: &str, page_number: u32, reference: &str) -> SplitPage {
    SplitPage {
        id: id.to_string(),
        upload_id: upload_id.to_string(),
        page_number,
        document_key: format!("labels/2026/01/01/{}/page_{:03}.pdf", upload_id, page_number),
        raster_key: None,
        tracking_number: format!("9999 0000 {:04}", page_number).replace(' ', ""),
        order_reference: reference.to_string(),
        recipient_name: None,
        confidence: 90,
        status: PageStatus::Extracted,
        created_at: Utc::now(),
    }
}
