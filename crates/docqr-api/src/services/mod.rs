pub mod audit;
pub mod documents;
pub mod qr_codec;
