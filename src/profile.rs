//! Language profiles
//!
//! Every dependency label and tag the pattern compiler and projector rely
//! on lives here, so a new language or annotation scheme is a JSON file
//! rather than a code change.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Unknown language profile: {0}")]
    Unknown(String),

    #[error("Failed to read profile {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid profile JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageProfile {
    /// Short language code, used in logs
    pub lang: String,
    /// Part-of-speech tag of SOV anchors
    pub verb_pos: String,
    pub subject_deprels: Vec<String>,
    pub object_deprels: Vec<String>,
    pub negation_deprel: String,
    /// Labels accepted for descendants of a target lemma
    pub modifier_deprels: Vec<String>,
    /// A child whose label contains this is an adjectival modifier
    #[serde(default = "LanguageProfile::default_adjectival")]
    pub adjectival_fragment: String,
    /// A child whose label contains this is an appositional modifier
    #[serde(default = "LanguageProfile::default_appositional")]
    pub appositional_fragment: String,
}

impl LanguageProfile {
    fn default_adjectival() -> String {
        "amod".to_string()
    }

    fn default_appositional() -> String {
        "appos".to_string()
    }

    pub fn english() -> Self {
        Self {
            lang: "en".to_string(),
            verb_pos: "VERB".to_string(),
            subject_deprels: strings(&["nsubj", "nsubjpass", "nsubj:pass", "obl"]),
            object_deprels: strings(&["obj", "dobj", "iobj"]),
            negation_deprel: "neg".to_string(),
            modifier_deprels: strings(&["amod", "advmod", "appos", "acomp"]),
            adjectival_fragment: Self::default_adjectival(),
            appositional_fragment: Self::default_appositional(),
        }
    }

    /// French parses carry no oblique subjects and only adjectival and
    /// appositional modifiers are kept
    pub fn french() -> Self {
        Self {
            lang: "fr".to_string(),
            verb_pos: "VERB".to_string(),
            subject_deprels: strings(&["nsubj", "nsubj:pass"]),
            object_deprels: strings(&["obj", "dobj", "iobj"]),
            negation_deprel: "neg".to_string(),
            modifier_deprels: strings(&["amod", "appos"]),
            adjectival_fragment: Self::default_adjectival(),
            appositional_fragment: Self::default_appositional(),
        }
    }

    /// Look up a built-in profile by language code
    pub fn builtin(lang: &str) -> Result<Self, ProfileError> {
        match lang.to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Self::english()),
            "fr" | "french" => Ok(Self::french()),
            other => Err(ProfileError::Unknown(other.to_string())),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ProfileError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let text = fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }
}

impl Default for LanguageProfile {
    fn default() -> Self {
        Self::english()
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_profiles() {
        let en = LanguageProfile::builtin("en").unwrap();
        let fr = LanguageProfile::builtin("FR").unwrap();

        assert!(en.subject_deprels.contains(&"obl".to_string()));
        assert!(!fr.subject_deprels.contains(&"obl".to_string()));
        assert_eq!(fr.modifier_deprels, vec!["amod", "appos"]);
        assert!(LanguageProfile::builtin("de").is_err());
    }

    #[test]
    fn test_profile_from_json_uses_defaults() {
        let json = r#"{
            "lang": "ud",
            "verb_pos": "VERB",
            "subject_deprels": ["nsubj"],
            "object_deprels": ["obj"],
            "negation_deprel": "advmod:neg",
            "modifier_deprels": ["amod"]
        }"#;
        let profile = LanguageProfile::from_json(json).unwrap();

        assert_eq!(profile.negation_deprel, "advmod:neg");
        assert_eq!(profile.adjectival_fragment, "amod");
        assert_eq!(profile.appositional_fragment, "appos");
    }

    #[test]
    fn test_profile_json_round_trip() {
        let fr = LanguageProfile::french();
        let json = serde_json::to_string(&fr).unwrap();
        assert_eq!(LanguageProfile::from_json(&json).unwrap(), fr);
    }
}
