//! Caption language lookup. Maps the short codes sent by the front end to the
//! language name spelled out in the prompt.

/// Languages the prompt can ask for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Language {
    EnglishUs,
    EnglishUk,
    Malay,
    Chinese,
    Tamil,
    /// Fallback for any code not in the table.
    #[default]
    English,
}

impl Language {
    /// Resolves a language code. Matching ignores case and surrounding
    /// whitespace; unknown codes resolve to [`Language::English`].
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" | "en-us" => Language::EnglishUs,
            "en-gb" | "en-uk" => Language::EnglishUk,
            "ms" => Language::Malay,
            "zh" => Language::Chinese,
            "ta" => Language::Tamil,
            _ => Language::English,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Language::EnglishUs => "English (US)",
            Language::EnglishUk => "English (UK)",
            Language::Malay => "Malay",
            Language::Chinese => "Chinese",
            Language::Tamil => "Tamil",
            Language::English => "English",
        }
    }
}
