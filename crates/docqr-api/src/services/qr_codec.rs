//! QR payloads bound to document ids.
//!
//! The payload is a link into the web app, `{app_base_url}/document/{id}`. Decoding
//! accepts that link, any text containing a hyphenated UUID, or a bare UUID.

use docqr_core::{AppError, QrErrorCorrection};
use image::{ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use regex::Regex;
use std::io::Cursor;
use uuid::Uuid;

/// First 8-4-4-4-12 hex group that is not part of a longer hex run.
const UUID_PATTERN: &str = r"(?i)(?:^|[^0-9a-f])([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})(?:$|[^0-9a-f])";

#[derive(Debug, Clone)]
pub struct QrCodecConfig {
    pub app_base_url: String,
    /// Minimum edge length of the rendered image.
    pub size_px: u32,
    pub error_correction: QrErrorCorrection,
}

/// A rendered code and the text it carries.
#[derive(Debug, Clone)]
pub struct EncodedQr {
    pub image_png: Vec<u8>,
    pub payload: String,
}

#[derive(Debug, Clone)]
pub struct QrCodec {
    base_url: String,
    size_px: u32,
    ec_level: EcLevel,
    uuid_pattern: Regex,
}

impl QrCodec {
    pub fn new(config: QrCodecConfig) -> Result<Self, AppError> {
        let uuid_pattern = Regex::new(UUID_PATTERN)
            .map_err(|e| AppError::Internal(format!("Invalid UUID pattern: {}", e)))?;

        Ok(Self {
            base_url: config.app_base_url.trim_end_matches('/').to_string(),
            size_px: config.size_px.max(21),
            ec_level: ec_level(config.error_correction),
            uuid_pattern,
        })
    }

    pub fn payload_for(&self, document_id: Uuid) -> String {
        format!("{}/document/{}", self.base_url, document_id.hyphenated())
    }

    /// Render the payload for `document_id` as a black-on-white PNG with a quiet zone.
    pub fn encode(&self, document_id: Uuid) -> Result<EncodedQr, AppError> {
        let payload = self.payload_for(document_id);

        let code = QrCode::with_error_correction_level(payload.as_bytes(), self.ec_level)
            .map_err(|e| AppError::QrCode(format!("QR generation failed: {}", e)))?;

        let image = code
            .render::<Luma<u8>>()
            .quiet_zone(true)
            .dark_color(Luma([0u8]))
            .light_color(Luma([255u8]))
            .min_dimensions(self.size_px, self.size_px)
            .build();

        let mut image_png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut image_png), ImageFormat::Png)
            .map_err(|e| AppError::QrCode(format!("QR generation failed: {}", e)))?;

        tracing::debug!(
            document_id = %document_id,
            width = image.width(),
            bytes = image_png.len(),
            "Rendered QR code"
        );

        Ok(EncodedQr { image_png, payload })
    }

    /// Document id carried by a scanned payload. Never panics; `None` when no UUID is
    /// present.
    pub fn decode(&self, raw: &str) -> Option<Uuid> {
        let candidate = self.uuid_pattern.captures(raw.trim())?.get(1)?;
        Uuid::parse_str(candidate.as_str()).ok()
    }
}

fn ec_level(level: QrErrorCorrection) -> EcLevel {
    match level {
        QrErrorCorrection::Low => EcLevel::L,
        QrErrorCorrection::Medium => EcLevel::M,
        QrErrorCorrection::Quartile => EcLevel::Q,
        QrErrorCorrection::High => EcLevel::H,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> QrCodec {
        QrCodec::new(QrCodecConfig {
            app_base_url: "https://docs.example.com/".to_string(),
            size_px: 300,
            error_correction: QrErrorCorrection::Medium,
        })
        .unwrap()
    }

    fn scan(png: &[u8]) -> String {
        let img = image::load_from_memory(png).unwrap().to_luma8();
        let (width, height) = (img.width() as usize, img.height() as usize);
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            img.get_pixel(x as u32, y as u32).0[0]
        });
        let grids = prepared.detect_grids();
        assert_eq!(grids.len(), 1);
        let (_, content) = grids[0].decode().unwrap();
        content
    }

    #[test]
    fn payload_is_a_document_link() {
        let id = Uuid::parse_str("3f1c5a8e-6d0b-4c1e-9a57-1b2f0c3d4e5f").unwrap();
        assert_eq!(
            codec().payload_for(id),
            "https://docs.example.com/document/3f1c5a8e-6d0b-4c1e-9a57-1b2f0c3d4e5f"
        );
    }

    #[test]
    fn payload_decodes_to_the_same_id() {
        let codec = codec();
        for _ in 0..32 {
            let id = Uuid::new_v4();
            assert_eq!(codec.decode(&codec.payload_for(id)), Some(id));
        }
    }

    #[test]
    fn rendered_image_scans_back_to_payload() {
        let codec = codec();
        let id = Uuid::new_v4();
        let encoded = codec.encode(id).unwrap();

        let img = image::load_from_memory(&encoded.image_png).unwrap();
        assert!(img.width() >= 300);
        assert_eq!(img.width(), img.height());

        let content = scan(&encoded.image_png);
        assert_eq!(content, encoded.payload);
        assert_eq!(codec.decode(&content), Some(id));
    }

    #[test]
    fn every_error_correction_level_renders() {
        for level in [
            QrErrorCorrection::Low,
            QrErrorCorrection::Quartile,
            QrErrorCorrection::High,
        ] {
            let codec = QrCodec::new(QrCodecConfig {
                app_base_url: "http://localhost:5173".to_string(),
                size_px: 120,
                error_correction: level,
            })
            .unwrap();
            let id = Uuid::new_v4();
            let encoded = codec.encode(id).unwrap();
            assert_eq!(codec.decode(&scan(&encoded.image_png)), Some(id));
        }
    }

    #[test]
    fn bare_and_uppercase_uuids_decode() {
        let codec = codec();
        let id = Uuid::new_v4();
        assert_eq!(codec.decode(&id.to_string()), Some(id));
        assert_eq!(codec.decode(&id.to_string().to_uppercase()), Some(id));
        assert_eq!(codec.decode(&format!("  {}\n", id)), Some(id));
    }

    #[test]
    fn first_uuid_wins() {
        let codec = codec();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let raw = format!("https://x/document/{}/related/{}", first, second);
        assert_eq!(codec.decode(&raw), Some(first));
    }

    #[test]
    fn malformed_input_is_none() {
        let codec = codec();
        for raw in [
            "",
            "   ",
            "https://docs.example.com/document/",
            "https://docs.example.com/document/not-a-uuid",
            "3f1c5a8e-6d0b-4c1e-9a57-1b2f0c3d4e5",
            "3f1c5a8e6d0b4c1e9a571b2f0c3d4e5f",
            "%%%://???",
        ] {
            assert_eq!(codec.decode(raw), None, "{:?}", raw);
        }
    }

    #[test]
    fn longer_hex_runs_are_not_uuids() {
        let codec = codec();
        assert_eq!(
            codec.decode("a3f1c5a8e-6d0b-4c1e-9a57-1b2f0c3d4e5f"),
            None
        );
        assert_eq!(
            codec.decode("3f1c5a8e-6d0b-4c1e-9a57-1b2f0c3d4e5f0"),
            None
        );
    }
}
