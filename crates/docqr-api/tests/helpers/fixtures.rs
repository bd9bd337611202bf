//! Test fixtures: document bytes, upload forms and QR scanning.

use axum_test::multipart::{MultipartForm, Part};

/// A tiny but well-formed PDF.
pub fn minimal_pdf() -> Vec<u8> {
    b"%PDF-1.4\n1 0 obj<</Type/Catalog/Pages 2 0 R>>endobj\n\
2 0 obj<</Type/Pages/Kids[]/Count 0>>endobj\n\
trailer<</Root 1 0 R>>\n%%EOF\n"
        .to_vec()
}

/// Multipart upload form with a file part and a title.
pub fn upload_form(title: &str, file_name: &str, mime: &str, data: Vec<u8>) -> MultipartForm {
    MultipartForm::new()
        .add_text("title", title.to_string())
        .add_part(
            "file",
            Part::bytes(data).file_name(file_name.to_string()).mime_type(mime.to_string()),
        )
}

/// Decode the first QR code found in a PNG.
pub fn scan_qr(png: &[u8]) -> Option<String> {
    let image = image::load_from_memory(png).ok()?.to_luma8();
    let (width, height) = image.dimensions();
    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
            image.get_pixel(x as u32, y as u32)[0]
        });
    let grid = prepared.detect_grids().into_iter().next()?;
    let (_meta, content) = grid.decode().ok()?;
    Some(content)
}
