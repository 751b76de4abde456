//! Phrase dictionary construction and lookup.
//!
//! A [`Dictionary`] maps phrase keys to per-language texts. It is built once,
//! either in code through [`Dictionary::builder`] or from a JSON bundle, and
//! is immutable afterwards.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;

/// Defines errors that may occur while loading a dictionary bundle
#[derive(Error, Debug)]
pub enum DictionaryError {
    /// Error when failing to read a bundle file
    #[error("Failed to read dictionary file: {0}")]
    IoError(#[from] std::io::Error),
    /// Error when failing to parse bundle JSON
    #[error("Failed to parse dictionary JSON: {0}")]
    ParseError(#[from] serde_json::Error),
    /// Error when the JSON does not have the expected shape
    #[error("Invalid dictionary shape at '{path}': {message}")]
    InvalidShape {
        /// JSON path to the offending value (e.g., "greeting.en")
        path: String,
        /// What was expected there
        message: String,
    },
}

/// Physical storage for the phrase entries.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Entries {
    /// Each phrase maps to a `language → text` table.
    Tagged(HashMap<String, HashMap<String, String>>),
    /// Each phrase maps directly to its single text (no language tags).
    Untagged(HashMap<String, String>),
}

/// An immutable mapping of phrase keys to per-language texts.
///
/// # Examples
/// ```
/// use text_translate::dictionary::Dictionary;
///
/// let dictionary = Dictionary::builder()
///     .phrase("greeting", [("en", "Hello"), ("fr", "Bonjour")])
///     .phrase("farewell", [("en", "Goodbye")])
///     .build();
///
/// assert!(dictionary.is_valid_phrase("greeting"));
/// assert_eq!(dictionary.translation("greeting", "fr"), Some("Bonjour"));
/// assert_eq!(dictionary.languages(), ["en", "fr"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    /// Phrase entries, keyed for O(1) membership checks.
    entries: Entries,
    /// Phrase keys, in build-input order. Stable for the dictionary's lifetime.
    phrases: Vec<String>,
    /// Language tags, deduplicated in first-appearance order.
    languages: Vec<String>,
}

impl Dictionary {
    /// Starts building a dictionary with tagged (multi-language) entries.
    #[must_use]
    pub fn builder() -> DictionaryBuilder {
        DictionaryBuilder::default()
    }

    /// Builds a single-language dictionary: each phrase maps directly to its
    /// one text and no language tags exist.
    ///
    /// A phrase supplied more than once keeps the last text.
    #[must_use]
    pub fn single_language<K, T>(pairs: impl IntoIterator<Item = (K, T)>) -> Self
    where
        K: Into<String>,
        T: Into<String>,
    {
        let mut entries = HashMap::new();
        let mut phrases = Vec::new();
        for (key, text) in pairs {
            let key = key.into();
            if entries.contains_key(&key) {
                tracing::warn!("Phrase '{key}' supplied more than once; keeping the later text");
            } else {
                phrases.push(key.clone());
            }
            entries.insert(key, text.into());
        }
        tracing::debug!("Built single-language dictionary with {} phrases", phrases.len());
        Self { entries: Entries::Untagged(entries), phrases, languages: Vec::new() }
    }

    /// Parses a dictionary bundle from a JSON string.
    ///
    /// See [`Dictionary::from_json_value`] for the accepted shapes.
    pub fn from_json_str(json: &str) -> Result<Self, DictionaryError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_json_value(&value)
    }

    /// Reads and parses a dictionary bundle file.
    pub fn from_file(path: &Path) -> Result<Self, DictionaryError> {
        tracing::debug!("Loading dictionary bundle from: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Converts a parsed JSON value into a dictionary.
    ///
    /// Two shapes are accepted, decided by the first value of the root object:
    /// - `{"greeting": {"en": "Hello", "fr": "Bonjour"}}`: tagged entries;
    ///   every phrase must be a non-empty object of strings.
    /// - `{"greeting": "Hello"}`: a single-language bundle; every phrase
    ///   must be a string.
    ///
    /// An empty root object yields an empty tagged dictionary. Anything else
    /// is an [`DictionaryError::InvalidShape`] naming the offending path.
    pub fn from_json_value(value: &Value) -> Result<Self, DictionaryError> {
        let Value::Object(root) = value else {
            return Err(DictionaryError::InvalidShape {
                path: "$".to_string(),
                message: "dictionary root must be an object".to_string(),
            });
        };

        if root.values().next().is_some_and(Value::is_string) {
            return Self::untagged_from_object(root);
        }
        Self::tagged_from_object(root)
    }

    /// Parses the tagged bundle shape (`phrase → language → text`).
    fn tagged_from_object(root: &serde_json::Map<String, Value>) -> Result<Self, DictionaryError> {
        let mut builder = Self::builder();
        for (phrase, value) in root {
            let Value::Object(table) = value else {
                return Err(DictionaryError::InvalidShape {
                    path: phrase.clone(),
                    message: "expected an object of language → text".to_string(),
                });
            };
            if table.is_empty() {
                return Err(DictionaryError::InvalidShape {
                    path: phrase.clone(),
                    message: "phrase has no translations".to_string(),
                });
            }
            let mut translations = Vec::new();
            for (language, text) in table {
                let Value::String(text) = text else {
                    return Err(DictionaryError::InvalidShape {
                        path: format!("{phrase}.{language}"),
                        message: "translation text must be a string".to_string(),
                    });
                };
                translations.push((language.clone(), text.clone()));
            }
            builder = builder.phrase(phrase.clone(), translations);
        }
        Ok(builder.build())
    }

    /// Parses the single-language bundle shape (`phrase → text`).
    fn untagged_from_object(
        root: &serde_json::Map<String, Value>,
    ) -> Result<Self, DictionaryError> {
        let mut pairs = Vec::new();
        for (phrase, value) in root {
            let Value::String(text) = value else {
                return Err(DictionaryError::InvalidShape {
                    path: phrase.clone(),
                    message: "expected a string in a single-language bundle".to_string(),
                });
            };
            pairs.push((phrase.clone(), text.clone()));
        }
        Ok(Self::single_language(pairs))
    }

    /// Phrase keys, in a stable order.
    #[must_use]
    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// Language tags appearing in any phrase, deduplicated.
    ///
    /// The order is first appearance in the build input. It is stable for the
    /// dictionary's lifetime but not canonical; callers must not rely on it.
    /// Single-language dictionaries expose no tags.
    #[must_use]
    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    /// Checks if a given text is a valid phrase key. O(1).
    #[must_use]
    pub fn is_valid_phrase(&self, text: &str) -> bool {
        match &self.entries {
            Entries::Tagged(entries) => entries.contains_key(text),
            Entries::Untagged(entries) => entries.contains_key(text),
        }
    }

    /// Looks up the text of `phrase` for `language`.
    ///
    /// Single-language dictionaries carry no tagged entries and always return
    /// `None` here; use [`Dictionary::sole_translation`] for those.
    #[must_use]
    pub fn translation(&self, phrase: &str, language: &str) -> Option<&str> {
        match &self.entries {
            Entries::Tagged(entries) => {
                entries.get(phrase).and_then(|table| table.get(language)).map(String::as_str)
            }
            Entries::Untagged(_) => None,
        }
    }

    /// Returns the translation of `phrase` when exactly one exists.
    #[must_use]
    pub fn sole_translation(&self, phrase: &str) -> Option<&str> {
        match &self.entries {
            Entries::Untagged(entries) => entries.get(phrase).map(String::as_str),
            Entries::Tagged(entries) => entries.get(phrase).and_then(|table| {
                if table.len() == 1 { table.values().next().map(String::as_str) } else { None }
            }),
        }
    }

    /// Whether this dictionary was built without language tags.
    #[must_use]
    pub const fn is_single_language(&self) -> bool {
        matches!(self.entries, Entries::Untagged(_))
    }

    /// Number of phrase keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    /// Whether the dictionary has no phrases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

/// Collects phrases in call order before deriving the key and language sets.
#[derive(Debug, Default)]
pub struct DictionaryBuilder {
    /// Build input in call order.
    phrases: Vec<(String, Vec<(String, String)>)>,
}

impl DictionaryBuilder {
    /// Adds a phrase and its per-language texts.
    ///
    /// Re-supplying a phrase replaces the earlier entry; supplying a phrase
    /// with no translations skips it. Both are logged.
    #[must_use]
    pub fn phrase<K, L, T>(
        mut self,
        key: K,
        translations: impl IntoIterator<Item = (L, T)>,
    ) -> Self
    where
        K: Into<String>,
        L: Into<String>,
        T: Into<String>,
    {
        let translations =
            translations.into_iter().map(|(language, text)| (language.into(), text.into())).collect();
        self.phrases.push((key.into(), translations));
        self
    }

    /// Derives the phrase-key set and the deduplicated language set, once.
    #[must_use]
    pub fn build(self) -> Dictionary {
        // Collapse replaced phrases first so the language set only reflects
        // entries that survive.
        let mut ordered: Vec<(String, Vec<(String, String)>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for (key, translations) in self.phrases {
            if translations.is_empty() {
                tracing::warn!("Skipping phrase '{key}': no translations supplied");
                continue;
            }
            if let Some(&slot) = index.get(&key) {
                tracing::warn!("Phrase '{key}' supplied more than once; keeping the later entry");
                if let Some(entry) = ordered.get_mut(slot) {
                    entry.1 = translations;
                }
            } else {
                index.insert(key.clone(), ordered.len());
                ordered.push((key, translations));
            }
        }

        let mut entries = HashMap::new();
        let mut phrases = Vec::new();
        let mut languages: Vec<String> = Vec::new();
        for (key, translations) in ordered {
            let mut table = HashMap::new();
            for (language, text) in translations {
                if !languages.contains(&language) {
                    languages.push(language.clone());
                }
                table.insert(language, text);
            }
            phrases.push(key.clone());
            entries.insert(key, table);
        }

        tracing::debug!(
            "Built dictionary with {} phrases and {} languages",
            phrases.len(),
            languages.len()
        );
        Dictionary { entries: Entries::Tagged(entries), phrases, languages }
    }
}
