use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("empty upload")] Empty,
    #[error("malformed data URI")] MalformedDataUri,
    #[error("invalid base64: {0}")] Base64(#[from] base64::DecodeError),
}

/// An uploaded file as it travels to the backend: raw base64 plus its MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub mime_type: String,
    pub base64: String,
}

impl Upload {
    pub fn bytes(&self) -> Result<Vec<u8>, UploadError> {
        decode_base64(&self.base64)
    }
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode_base64(data: &str) -> Result<Vec<u8>, UploadError> {
    Ok(STANDARD.decode(data.trim())?)
}

pub fn png_data_uri(base64: &str) -> String {
    format!("data:image/png;base64,{}", base64)
}

/// Splits `data:<mime>;base64,<payload>` into its MIME type and payload.
pub fn split_data_uri(uri: &str) -> Result<(&str, &str), UploadError> {
    let rest = uri.strip_prefix("data:").ok_or(UploadError::MalformedDataUri)?;
    let (header, payload) = rest.split_once(',').ok_or(UploadError::MalformedDataUri)?;
    let mime = header.strip_suffix(";base64").ok_or(UploadError::MalformedDataUri)?;
    Ok((mime, payload))
}

/// Accepts either a data URI or raw base64. The payload is checked to be valid
/// base64 but otherwise passed through untouched.
pub fn parse_upload(payload: &str, declared_mime: Option<&str>) -> Result<Upload, UploadError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(UploadError::Empty);
    }
    let (uri_mime, data) = if payload.starts_with("data:") {
        let (mime, data) = split_data_uri(payload)?;
        (Some(mime), data)
    } else {
        (None, payload)
    };
    let bytes = decode_base64(data)?;
    if bytes.is_empty() {
        return Err(UploadError::Empty);
    }
    let mime_type = uri_mime
        .filter(|m| !m.is_empty())
        .or(declared_mime.filter(|m| !m.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| sniff_mime(&bytes).to_string());
    Ok(Upload { mime_type, base64: data.to_string() })
}

pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type(),
        Err(_) => "application/octet-stream",
    }
}
