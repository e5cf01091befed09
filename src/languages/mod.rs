use anyhow::{Result, anyhow};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Languages the model is asked to translate into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetLanguage {
    English,
    Spanish,
    French,
    German,
    Japanese,
    ChineseSimplified,
    Korean,
    Italian,
    Portuguese,
    Russian,
    Arabic,
    Hindi,
}

impl TargetLanguage {
    pub const ALL: [TargetLanguage; 12] = [
        TargetLanguage::English,
        TargetLanguage::Spanish,
        TargetLanguage::French,
        TargetLanguage::German,
        TargetLanguage::Japanese,
        TargetLanguage::ChineseSimplified,
        TargetLanguage::Korean,
        TargetLanguage::Italian,
        TargetLanguage::Portuguese,
        TargetLanguage::Russian,
        TargetLanguage::Arabic,
        TargetLanguage::Hindi,
    ];

    /// The name sent to the model and shown to users.
    pub fn name(&self) -> &'static str {
        match self {
            TargetLanguage::English => "English",
            TargetLanguage::Spanish => "Spanish",
            TargetLanguage::French => "French",
            TargetLanguage::German => "German",
            TargetLanguage::Japanese => "Japanese",
            TargetLanguage::ChineseSimplified => "Chinese (Simplified)",
            TargetLanguage::Korean => "Korean",
            TargetLanguage::Italian => "Italian",
            TargetLanguage::Portuguese => "Portuguese",
            TargetLanguage::Russian => "Russian",
            TargetLanguage::Arabic => "Arabic",
            TargetLanguage::Hindi => "Hindi",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            TargetLanguage::English => "en",
            TargetLanguage::Spanish => "es",
            TargetLanguage::French => "fr",
            TargetLanguage::German => "de",
            TargetLanguage::Japanese => "ja",
            TargetLanguage::ChineseSimplified => "zh-hans",
            TargetLanguage::Korean => "ko",
            TargetLanguage::Italian => "it",
            TargetLanguage::Portuguese => "pt",
            TargetLanguage::Russian => "ru",
            TargetLanguage::Arabic => "ar",
            TargetLanguage::Hindi => "hi",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            TargetLanguage::ChineseSimplified => &["zh", "chinese", "simplified chinese", "zho"],
            TargetLanguage::English => &["eng"],
            TargetLanguage::Spanish => &["spa"],
            TargetLanguage::French => &["fra", "fre"],
            TargetLanguage::German => &["deu", "ger"],
            TargetLanguage::Japanese => &["jpn"],
            TargetLanguage::Korean => &["kor"],
            TargetLanguage::Italian => &["ita"],
            TargetLanguage::Portuguese => &["por"],
            TargetLanguage::Russian => &["rus"],
            TargetLanguage::Arabic => &["ara"],
            TargetLanguage::Hindi => &["hin"],
        }
    }
}

impl FromStr for TargetLanguage {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let needle = value.trim().to_lowercase();
        if needle.is_empty() {
            return Err(anyhow!("target language is empty"));
        }
        TargetLanguage::ALL
            .into_iter()
            .find(|lang| {
                lang.name().eq_ignore_ascii_case(&needle)
                    || lang.code() == needle
                    || lang.aliases().contains(&needle.as_str())
            })
            .ok_or_else(|| {
                anyhow!(
                    "unsupported target language '{}' (expected one of: {})",
                    value.trim(),
                    supported_names().join(", ")
                )
            })
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for TargetLanguage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

pub fn supported_names() -> Vec<&'static str> {
    TargetLanguage::ALL.iter().map(|lang| lang.name()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_codes_and_aliases() {
        assert_eq!(
            "French".parse::<TargetLanguage>().unwrap(),
            TargetLanguage::French
        );
        assert_eq!(
            " chinese (simplified) ".parse::<TargetLanguage>().unwrap(),
            TargetLanguage::ChineseSimplified
        );
        assert_eq!(
            "zh".parse::<TargetLanguage>().unwrap(),
            TargetLanguage::ChineseSimplified
        );
        assert_eq!("JA".parse::<TargetLanguage>().unwrap(), TargetLanguage::Japanese);
    }

    #[test]
    fn rejects_unknown_language() {
        let err = "Klingon".parse::<TargetLanguage>().unwrap_err();
        assert!(err.to_string().contains("unsupported target language 'Klingon'"));
        assert!("".parse::<TargetLanguage>().is_err());
    }

    #[test]
    fn every_language_round_trips_through_its_name() {
        for lang in TargetLanguage::ALL {
            assert_eq!(lang.name().parse::<TargetLanguage>().unwrap(), lang);
        }
        assert_eq!(supported_names().len(), 12);
    }
}
