use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

const DATA_PREFIX: &str = "data:";

/// Wraps a base64 PNG payload as an inline image reference.
pub fn png_data_uri(base64_payload: &str) -> String {
    format!("data:image/png;base64,{}", base64_payload)
}

pub fn is_data_uri(reference: &str) -> bool {
    reference.starts_with(DATA_PREFIX)
}

/// Decodes a `data:<mime>;base64,<payload>` reference into its mime type and bytes.
pub fn decode_data_uri(reference: &str) -> Result<(String, Vec<u8>)> {
    let rest = reference
        .strip_prefix(DATA_PREFIX)
        .ok_or_else(|| anyhow!("Not a data URI"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| anyhow!("Malformed data URI: missing ','"))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| anyhow!("Only base64 data URIs are supported"))?;
    let bytes = STANDARD
        .decode(payload.trim())
        .context("Invalid base64 image payload")?;
    Ok((mime.to_string(), bytes))
}

/// Shortens inline payloads so they can be shown in a terminal.
pub fn display_reference(reference: &str, max_len: usize) -> String {
    if is_data_uri(reference) {
        let header = reference.split(',').next().unwrap_or(DATA_PREFIX);
        return format!("{},... ({} bytes inline)", header, reference.len());
    }
    if reference.chars().count() > max_len {
        let head: String = reference.chars().take(max_len).collect();
        return format!("{}...", head);
    }
    reference.to_string()
}
