//! Transport encoding: raw bytes ↔ standard base64.
//!
//! Two payloads cross a JSON boundary as base64: the uploaded problem file on
//! its way to the provider (Gemini `inlineData`), and the compiled PDF on its
//! way back to the caller (`pdfBase64`). Both use the standard alphabet with
//! padding, which is what browsers' `atob` and the provider APIs expect.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// Encode bytes for a JSON body.
pub fn to_base64(bytes: &[u8]) -> String {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} bytes → {} bytes base64", bytes.len(), b64.len());
    b64
}

/// Decode a base64 payload.
pub fn from_base64(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(data.trim())
}

/// True when `bytes` start with the PDF magic `%PDF`.
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}
