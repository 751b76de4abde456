//! Translation coverage reporting.
//!
//! Phrases may supply different subsets of the dictionary's languages. The
//! coverage report lists the gaps ahead of time so they can be fixed before
//! a lookup fails; resolution itself never consults it.

use crate::dictionary::Dictionary;

/// A `(phrase, language)` cell with no translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingEntry {
    /// The phrase lacking a translation.
    pub phrase: String,
    /// The language with no entry for the phrase.
    pub language: String,
}

/// Gaps in the phrase × language grid of a dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoverageReport {
    /// Missing cells, in phrase order then language order.
    missing: Vec<MissingEntry>,
}

impl CoverageReport {
    /// Whether every phrase supplies every language of the dictionary.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// Missing cells, in phrase order then language order.
    #[must_use]
    pub fn missing(&self) -> &[MissingEntry] {
        &self.missing
    }

    /// Missing cells of one language.
    pub fn missing_for_language<'a>(
        &'a self,
        language: &'a str,
    ) -> impl Iterator<Item = &'a MissingEntry> {
        self.missing.iter().filter(move |entry| entry.language == language)
    }
}

impl Dictionary {
    /// Reports every phrase lacking a translation for a language some other
    /// phrase provides. Single-language dictionaries are always complete.
    #[must_use]
    pub fn coverage(&self) -> CoverageReport {
        let mut missing = Vec::new();
        if self.is_single_language() {
            return CoverageReport { missing };
        }
        for phrase in self.phrases() {
            for language in self.languages() {
                if self.translation(phrase, language).is_none() {
                    missing
                        .push(MissingEntry { phrase: phrase.clone(), language: language.clone() });
                }
            }
        }
        CoverageReport { missing }
    }
}
