use std::path::PathBuf;

use serde::{
    Deserialize,
    Serialize,
};
use thiserror::Error;

use crate::dictionary::DictionaryError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Configuration error in '{field_path}': {message}")]
pub struct ValidationError {
    /// JSON path to the field (e.g., "mode.fixed.language")
    pub field_path: String,
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field_path: field_path.into(), message: message.into() }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    ValidationErrors(Vec<ValidationError>),

    #[error("Failed to load configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Failed to load dictionary bundle: {0}")]
    DictionaryError(#[from] DictionaryError),
}

/// Numbered list for multi-error validation failures.
fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, err)| format!("  {}. {} - {}", i + 1, err.field_path, err.message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Where the active language of a scope comes from.
///
/// All four variants are configuration of one registry type, not four
/// different systems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum LanguageMode {
    /// The scope supplies the active language; it may change between scopes.
    #[default]
    Provided,
    /// The language is fixed when the registry is built; scopes take none.
    Fixed {
        /// Language tag every scope of the registry displays.
        language: String,
    },
    /// The scope supplies the language and lookups may override it per call.
    Overridable,
    /// The dictionary carries exactly one translation per phrase; there is
    /// no language to supply.
    SingleLanguage,
}

/// Registry settings, loadable from a `.text-translate.json` workspace file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrySettings {
    /// Where the active language comes from.
    pub mode: LanguageMode,

    /// Dictionary bundle (JSON) to load, relative to the workspace root.
    pub dictionary_file: Option<PathBuf>,
}

impl RegistrySettings {
    /// # Errors
    /// - Fixed mode with an empty or malformed language tag
    /// - Empty dictionary file path
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let LanguageMode::Fixed { language } = &self.mode {
            if language.is_empty() {
                errors.push(ValidationError::new(
                    "mode.fixed.language",
                    "The language tag cannot be empty. Please specify a tag, for example: \"en\"",
                ));
            } else if !is_well_formed_tag(language) {
                errors.push(ValidationError::new(
                    "mode.fixed.language",
                    format!("Malformed language tag '{language}'"),
                ));
            }
        }

        if let Some(file) = &self.dictionary_file
            && file.as_os_str().is_empty()
        {
            errors.push(ValidationError::new(
                "dictionaryFile",
                "The path cannot be empty. Example: \"locales/app.json\"",
            ));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Light syntactic check for language tags: non-empty alphanumeric segments
/// joined by '-' or '_' (e.g., "en", "en-US", "zh_Hant").
fn is_well_formed_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag
            .split(['-', '_'])
            .all(|segment| !segment.is_empty() && segment.chars().all(|c| c.is_ascii_alphanumeric()))
}
