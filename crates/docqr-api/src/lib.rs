//! DOCQR API library
//!
//! HTTP handlers, middleware, services and application setup for the document service.

mod api_doc;
mod handlers;
mod middleware;
mod services;
mod utils;

pub mod auth;
pub mod error;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::ErrorResponse;
pub use services::qr_codec::{QrCodec, QrCodecConfig};
