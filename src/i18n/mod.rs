//! Internationalization (i18n) support for report text
//!
//! Reports are rendered in the language configured under `monitor.language`.
//! Supported languages: Russian (ru) and English (en).
//!
//! Translations live in `locales/*.yml`. The locale is passed explicitly to
//! every lookup so that builders for different languages can coexist.
//!
//! # Usage
//!
//! ```rust,ignore
//! use serverwatch::i18n::{t, Locale};
//!
//! let locale = Locale::from_code("ru-RU");
//! let msg = t!("report.online", locale = locale.as_str());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

// Note: rust_i18n::i18n! macro is declared in lib.rs (crate root)

/// Language of rendered reports
///
/// Deserialized through [`Locale::from_code`], so `ru-RU` or `en_US` in the
/// config file are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Locale {
    En,
    #[default]
    Ru,
}

impl Locale {
    /// Locale code as used by the translation files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ru => "ru",
        }
    }

    /// Normalize a locale code to a supported locale
    ///
    /// - ru-RU, ru_RU, russian -> ru
    /// - anything else -> en
    pub fn from_code(code: &str) -> Self {
        let lower = code.to_lowercase();

        if lower.starts_with("ru") || lower == "russian" {
            Self::Ru
        } else {
            Self::En
        }
    }
}

impl From<String> for Locale {
    fn from(code: String) -> Self {
        Self::from_code(&code)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Translate a key with optional parameters
///
/// This is a re-export of rust_i18n::t! for convenience.
#[doc(inline)]
pub use rust_i18n::t;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_from_code() {
        assert_eq!(Locale::from_code("ru"), Locale::Ru);
        assert_eq!(Locale::from_code("ru-RU"), Locale::Ru);
        assert_eq!(Locale::from_code("ru_RU"), Locale::Ru);
        assert_eq!(Locale::from_code("russian"), Locale::Ru);

        assert_eq!(Locale::from_code("en"), Locale::En);
        assert_eq!(Locale::from_code("en-US"), Locale::En);
        assert_eq!(Locale::from_code("unknown"), Locale::En);
    }

    #[test]
    fn test_translation_per_locale() {
        assert_eq!(t!("report.map", locale = "en"), "Map");
        assert_eq!(t!("report.map", locale = "ru"), "Карта");
    }

    #[test]
    fn test_locale_serde() {
        let locale: Locale = serde_json::from_str("\"en\"").unwrap();
        assert_eq!(locale, Locale::En);
        let locale: Locale = serde_json::from_str("\"ru_RU\"").unwrap();
        assert_eq!(locale, Locale::Ru);
        let locale: Locale = serde_json::from_str("\"en-US\"").unwrap();
        assert_eq!(locale, Locale::En);
        assert_eq!(serde_json::to_string(&Locale::Ru).unwrap(), "\"ru\"");
    }
}
