use serde::{Deserialize, Serialize};

/// One caption parsed from a model completion, with its hashtags kept apart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionRecord {
    pub caption: String,
    /// Space-separated `#tag` tokens. Empty when the model gave none.
    pub hashtags: String,
}

impl CaptionRecord {
    pub fn new(caption: impl Into<String>, hashtags: impl Into<String>) -> Self {
        Self {
            caption: caption.into(),
            hashtags: hashtags.into(),
        }
    }

    pub fn caption_only(caption: impl Into<String>) -> Self {
        Self::new(caption, String::new())
    }
}

/// Response body of `POST /generate`. Errors use the same shape, carrying a
/// single record whose caption is the error message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionResponse {
    pub captions: Vec<CaptionRecord>,
}

impl CaptionResponse {
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            captions: vec![CaptionRecord::caption_only(text)],
        }
    }
}
