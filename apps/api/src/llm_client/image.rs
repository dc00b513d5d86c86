use base64::Engine;

/// MIME type assumed when neither the upload nor its file name says otherwise.
const DEFAULT_MEDIA_TYPE: &str = "image/jpeg";

/// Base64-encoded image ready to send to a vision model.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type (e.g., "image/jpeg", "image/png")
    pub media_type: String,
}

impl ImageInput {
    /// Encodes an uploaded file.
    ///
    /// The MIME type comes from the multipart content type when it names an
    /// image, then from the file extension, then defaults to `image/jpeg`.
    pub fn from_upload(bytes: &[u8], content_type: Option<&str>, file_name: Option<&str>) -> Self {
        let media_type = content_type
            .map(|ct| ct.trim().to_ascii_lowercase())
            .filter(|ct| ct.starts_with("image/"))
            .or_else(|| file_name.and_then(media_type_from_extension).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string());

        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            media_type,
        }
    }

    /// Return a data URL suitable for OpenAI-style APIs.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

fn media_type_from_extension(file_name: &str) -> Option<&'static str> {
    let (_, ext) = file_name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}
