//! Translation registry: provider scopes and phrase resolution.
//!
//! A [`Registry`] owns one immutable [`Dictionary`] and a
//! [`LanguageMode`] deciding where the active language comes from. Callers
//! establish a scope with [`Registry::enter`] (or the closure form
//! [`Registry::with_scope`]) and resolve phrases anywhere inside it with
//! [`Registry::resolve`], without threading the dictionary or the language
//! through intermediate calls.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::atomic::{
    AtomicU64,
    Ordering,
};
use std::sync::{
    Arc,
    Mutex,
};

use thiserror::Error;

use crate::config::{
    ConfigError,
    LanguageMode,
    RegistrySettings,
    ValidationError,
};
use crate::context::{
    self,
    ContextValue,
    MissingProviderError,
};
use crate::dictionary::Dictionary;

/// Defines errors that may occur while resolving a phrase
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Resolution was attempted outside of any scope of the registry
    #[error(transparent)]
    MissingProvider(#[from] MissingProviderError),
    /// The supplied text is not a phrase key of the dictionary
    #[error("'{0}' is not a valid phrase key")]
    UnknownPhrase(String),
    /// The phrase exists but carries no translation for the effective language
    #[error("Phrase '{phrase}' has no translation for language '{language}'")]
    MissingTranslation {
        /// The phrase that was looked up
        phrase: String,
        /// The language that had no entry
        language: String,
    },
}

/// Defines errors that may occur while establishing a scope
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// The mode expects the scope to supply an active language
    #[error("The registry's language mode requires an active language when establishing a scope")]
    ActiveLanguageRequired,
    /// The mode supplies its own language and accepts none from the scope
    #[error("The registry's language mode supplies its own language; unexpected '{0}'")]
    ActiveLanguageNotAccepted(String),
}

/// Monotonic registry id source; distinguishes the scopes of coexisting
/// registries on the shared stack.
static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(0);

/// Associates a phrase dictionary with a language mode and resolves the
/// active-language text of a phrase inside an established scope.
///
/// # Examples
/// ```
/// use text_translate::{Dictionary, Registry};
///
/// let registry = Registry::build(
///     Dictionary::builder().phrase("greeting", [("en", "Hello"), ("fr", "Bonjour")]).build(),
/// );
///
/// let scope = registry.enter(Some("fr"))?;
/// assert_eq!(registry.resolve("greeting", None)?, "Bonjour");
/// drop(scope);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Registry {
    /// Distinguishes this registry's scopes from other registries' scopes.
    id: u64,
    /// The dictionary shared read-only with every snapshot.
    dictionary: Arc<Dictionary>,
    /// Where the active language comes from.
    mode: LanguageMode,
    /// Context snapshots memoized per active language, so re-entering with an
    /// unchanged language reuses the same allocation.
    snapshots: Mutex<HashMap<Option<String>, Arc<ContextValue>>>,
}

impl Registry {
    /// Builds a registry with the default mode for the dictionary's shape:
    /// [`LanguageMode::SingleLanguage`] for single-language dictionaries,
    /// [`LanguageMode::Provided`] otherwise.
    #[must_use]
    pub fn build(dictionary: Dictionary) -> Self {
        let mode = if dictionary.is_single_language() {
            LanguageMode::SingleLanguage
        } else {
            LanguageMode::Provided
        };
        Self::with_mode_unchecked(dictionary, mode)
    }

    /// Builds a registry with an explicit language mode.
    ///
    /// # Errors
    /// - The mode and the dictionary shape do not fit together
    /// - A fixed language tag is empty
    pub fn with_mode(dictionary: Dictionary, mode: LanguageMode) -> Result<Self, ConfigError> {
        let mut errors = Vec::new();
        match (&mode, dictionary.is_single_language()) {
            (LanguageMode::SingleLanguage, true)
            | (LanguageMode::Provided | LanguageMode::Overridable, false) => {}
            (LanguageMode::SingleLanguage, false) => {
                errors.push(ValidationError::new(
                    "mode",
                    "singleLanguage mode requires a single-language dictionary",
                ));
            }
            (_, true) => {
                errors.push(ValidationError::new(
                    "mode",
                    "a single-language dictionary only supports singleLanguage mode",
                ));
            }
            (LanguageMode::Fixed { language }, false) => {
                if language.is_empty() {
                    errors.push(ValidationError::new(
                        "mode.fixed.language",
                        "The fixed language tag cannot be empty",
                    ));
                } else if !dictionary.languages().iter().any(|known| known == language) {
                    tracing::warn!("Fixed language '{language}' does not appear in the dictionary");
                }
            }
        }
        if !errors.is_empty() {
            return Err(ConfigError::ValidationErrors(errors));
        }
        Ok(Self::with_mode_unchecked(dictionary, mode))
    }

    /// Builds a registry from validated settings, loading the dictionary
    /// bundle named there. Relative bundle paths resolve against `base_dir`.
    ///
    /// # Errors
    /// - Settings validation failed
    /// - No dictionary file is configured
    /// - The bundle could not be read or parsed
    pub fn from_settings(
        settings: &RegistrySettings,
        base_dir: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        settings.validate().map_err(ConfigError::ValidationErrors)?;
        let Some(file) = &settings.dictionary_file else {
            return Err(ConfigError::ValidationErrors(vec![ValidationError::new(
                "dictionaryFile",
                "A dictionary file is required to construct a registry from settings",
            )]));
        };
        let path = base_dir.map_or_else(|| file.clone(), |dir| dir.join(file));
        let dictionary = Dictionary::from_file(&path)?;
        Self::with_mode(dictionary, settings.mode.clone())
    }

    /// Wires the parts together once validation has passed.
    fn with_mode_unchecked(dictionary: Dictionary, mode: LanguageMode) -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            dictionary: Arc::new(dictionary),
            mode,
            snapshots: Mutex::new(HashMap::new()),
        }
    }

    /// Phrase keys of the dictionary, in a stable order.
    #[must_use]
    pub fn phrases(&self) -> &[String] {
        self.dictionary.phrases()
    }

    /// Deduplicated language tags of the dictionary.
    #[must_use]
    pub fn languages(&self) -> &[String] {
        self.dictionary.languages()
    }

    /// Checks if a given text is a valid phrase key. O(1); runs on every
    /// [`Registry::resolve`] call as well.
    #[must_use]
    pub fn is_valid_phrase(&self, text: &str) -> bool {
        self.dictionary.is_valid_phrase(text)
    }

    /// The dictionary this registry resolves from.
    #[must_use]
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Where the active language comes from.
    #[must_use]
    pub const fn mode(&self) -> &LanguageMode {
        &self.mode
    }

    /// Establishes a scope on the current thread and returns its guard.
    ///
    /// Whether `active_language` is required depends on the mode:
    /// [`LanguageMode::Provided`] and [`LanguageMode::Overridable`] expect
    /// `Some`, [`LanguageMode::Fixed`] and [`LanguageMode::SingleLanguage`]
    /// expect `None`. The scope ends when the guard drops.
    ///
    /// # Errors
    /// - [`ScopeError::ActiveLanguageRequired`]
    /// - [`ScopeError::ActiveLanguageNotAccepted`]
    pub fn enter(&self, active_language: Option<&str>) -> Result<Scope<'_>, ScopeError> {
        let effective = match (&self.mode, active_language) {
            (LanguageMode::Provided | LanguageMode::Overridable, Some(language)) => Some(language),
            (LanguageMode::Provided | LanguageMode::Overridable, None) => {
                return Err(ScopeError::ActiveLanguageRequired);
            }
            (LanguageMode::Fixed { language }, None) => Some(language.as_str()),
            (LanguageMode::SingleLanguage, None) => None,
            (LanguageMode::Fixed { .. } | LanguageMode::SingleLanguage, Some(language)) => {
                return Err(ScopeError::ActiveLanguageNotAccepted(language.to_string()));
            }
        };

        if let Some(language) = effective
            && !self.dictionary.languages().iter().any(|known| known == language)
        {
            // Legal, but every lookup inside the scope will fail precisely.
            tracing::warn!("Establishing scope with language '{language}' that no phrase provides");
        }

        let value = self.snapshot(effective);
        let scope_id = context::push(self.id, Arc::clone(&value));
        Ok(Scope { registry: self, scope_id, value, _not_send: PhantomData })
    }

    /// Establishes a scope around a closure. The scope ends when the closure
    /// returns.
    ///
    /// # Errors
    /// Same as [`Registry::enter`].
    pub fn with_scope<R>(
        &self,
        active_language: Option<&str>,
        f: impl FnOnce() -> R,
    ) -> Result<R, ScopeError> {
        let _scope = self.enter(active_language)?;
        Ok(f())
    }

    /// Resolves `key_or_text` to the translated text of the effective
    /// language.
    ///
    /// The effective language is `override_language` when the mode is
    /// [`LanguageMode::Overridable`] and one is given; otherwise the ambient
    /// scope's active language. An override under any other mode is ignored
    /// and logged.
    ///
    /// `key_or_text` is validated on every call; callers may pass raw text
    /// asserted to be a key.
    ///
    /// # Errors
    /// - [`ResolveError::MissingProvider`] outside any scope of the registry
    /// - [`ResolveError::UnknownPhrase`] when `key_or_text` is not a key
    /// - [`ResolveError::MissingTranslation`] when the phrase has no entry
    ///   for the effective language
    pub fn resolve(
        &self,
        key_or_text: &str,
        override_language: Option<&str>,
    ) -> Result<String, ResolveError> {
        let snapshot = context::current(self.id)?;
        let dictionary = snapshot.dictionary();

        if !dictionary.is_valid_phrase(key_or_text) {
            return Err(ResolveError::UnknownPhrase(key_or_text.to_string()));
        }

        // Single-language dictionaries resolve without a language tag.
        if dictionary.is_single_language() {
            if let Some(ignored) = override_language {
                tracing::warn!("Ignoring language override '{ignored}' on a single-language registry");
            }
            let text = dictionary
                .sole_translation(key_or_text)
                .ok_or_else(|| ResolveError::UnknownPhrase(key_or_text.to_string()))?;
            return Ok(text.to_string());
        }

        let allow_override = matches!(self.mode, LanguageMode::Overridable);
        if !allow_override && let Some(ignored) = override_language {
            tracing::warn!("Ignoring language override '{ignored}': the mode does not allow per-call overrides");
        }
        let effective = if allow_override {
            override_language.or_else(|| snapshot.active_language())
        } else {
            snapshot.active_language()
        };

        let Some(language) = effective else {
            // A scope over a tagged dictionary always carries a language.
            return Err(ResolveError::MissingTranslation {
                phrase: key_or_text.to_string(),
                language: String::new(),
            });
        };
        let text = dictionary.translation(key_or_text, language).ok_or_else(|| {
            ResolveError::MissingTranslation {
                phrase: key_or_text.to_string(),
                language: language.to_string(),
            }
        })?;
        Ok(text.to_string())
    }

    /// Returns the memoized snapshot for `language`, creating it on first
    /// use. Re-entering with an unchanged language yields the same
    /// allocation; only a changed language produces a new snapshot.
    fn snapshot(&self, language: Option<&str>) -> Arc<ContextValue> {
        let key = language.map(ToOwned::to_owned);
        if let Ok(mut snapshots) = self.snapshots.lock() {
            if let Some(existing) = snapshots.get(&key) {
                return Arc::clone(existing);
            }
            let value = Arc::new(ContextValue::new(Arc::clone(&self.dictionary), key.clone()));
            snapshots.insert(key, Arc::clone(&value));
            value
        } else {
            // A poisoned cache only costs the memoization.
            Arc::new(ContextValue::new(Arc::clone(&self.dictionary), key))
        }
    }
}

/// Guard for an established scope. Removes its snapshot from the ambient
/// stack when dropped.
#[derive(Debug)]
pub struct Scope<'a> {
    /// Registry the scope belongs to.
    registry: &'a Registry,
    /// Identifies the stack entry to remove on drop.
    scope_id: u64,
    /// Snapshot visible inside the scope.
    value: Arc<ContextValue>,
    /// Keeps the guard on the thread whose stack it entered.
    _not_send: PhantomData<*const ()>,
}

impl Scope<'_> {
    /// The snapshot consumers inside this scope read.
    #[must_use]
    pub const fn context(&self) -> &Arc<ContextValue> {
        &self.value
    }

    /// The language this scope displays, if the mode carries one.
    #[must_use]
    pub fn active_language(&self) -> Option<&str> {
        self.value.active_language()
    }

    /// The registry this scope belongs to.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        self.registry
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        context::remove(self.scope_id);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use googletest::prelude::*;
    use rstest::rstest;

    use super::*;

    fn sample_registry() -> Registry {
        Registry::build(
            Dictionary::builder()
                .phrase("greeting", [("en", "Hello"), ("fr", "Bonjour")])
                .phrase("farewell", [("en", "Goodbye")])
                .build(),
        )
    }

    #[googletest::test]
    fn build_picks_mode_from_dictionary_shape() {
        let tagged = sample_registry();
        let single = Registry::build(Dictionary::single_language([("greeting", "Hello")]));

        expect_that!(tagged.mode(), eq(&LanguageMode::Provided));
        expect_that!(single.mode(), eq(&LanguageMode::SingleLanguage));
    }

    #[googletest::test]
    fn accessors_delegate_to_the_dictionary() {
        let registry = sample_registry();

        expect_that!(registry.phrases(), elements_are![eq("greeting"), eq("farewell")]);
        expect_that!(registry.languages(), elements_are![eq("en"), eq("fr")]);
        expect_that!(registry.is_valid_phrase("greeting"), eq(true));
        expect_that!(registry.is_valid_phrase("missing"), eq(false));
    }

    #[googletest::test]
    fn resolve_uses_the_scope_language() {
        let registry = sample_registry();

        let scope = registry.enter(Some("fr")).unwrap();
        expect_that!(registry.resolve("greeting", None), ok(eq("Bonjour")));
        drop(scope);

        let scope = registry.enter(Some("en")).unwrap();
        expect_that!(registry.resolve("greeting", None), ok(eq("Hello")));
        drop(scope);
    }

    #[googletest::test]
    fn resolve_outside_scope_is_missing_provider() {
        let registry = sample_registry();

        expect_that!(
            registry.resolve("greeting", None),
            err(eq(&ResolveError::MissingProvider(MissingProviderError)))
        );
    }

    #[googletest::test]
    fn resolve_unknown_phrase_names_the_text() {
        let registry = sample_registry();
        let _scope = registry.enter(Some("en")).unwrap();

        expect_that!(
            registry.resolve("not-a-real-key", None),
            err(eq(&ResolveError::UnknownPhrase("not-a-real-key".to_string())))
        );
    }

    #[googletest::test]
    fn resolve_is_validated_on_every_call() {
        let registry = sample_registry();
        let _scope = registry.enter(Some("en")).unwrap();

        // Same invalid input twice: both calls run the membership check.
        for _ in 0..2 {
            expect_that!(
                registry.resolve("still-not-a-key", None),
                err(eq(&ResolveError::UnknownPhrase("still-not-a-key".to_string())))
            );
        }
    }

    #[googletest::test]
    fn resolve_missing_translation_is_a_hard_error() {
        let registry = sample_registry();
        let _scope = registry.enter(Some("fr")).unwrap();

        // "farewell" has no French entry; no fallback, no empty string.
        expect_that!(
            registry.resolve("farewell", None),
            err(eq(&ResolveError::MissingTranslation {
                phrase: "farewell".to_string(),
                language: "fr".to_string(),
            }))
        );
    }

    #[googletest::test]
    fn resolve_is_deterministic() {
        let registry = sample_registry();
        let _scope = registry.enter(Some("en")).unwrap();

        let first = registry.resolve("greeting", None).unwrap();
        let second = registry.resolve("greeting", None).unwrap();
        expect_that!(first, eq(&second));
    }

    #[googletest::test]
    fn override_wins_under_overridable_mode() {
        let registry = Registry::with_mode(
            Dictionary::builder().phrase("greeting", [("en", "Hello"), ("fr", "Bonjour")]).build(),
            LanguageMode::Overridable,
        )
        .unwrap();
        let _scope = registry.enter(Some("fr")).unwrap();

        expect_that!(registry.resolve("greeting", Some("en")), ok(eq("Hello")));
        expect_that!(registry.resolve("greeting", None), ok(eq("Bonjour")));
    }

    #[googletest::test]
    fn override_is_ignored_under_provided_mode() {
        let registry = sample_registry();
        let _scope = registry.enter(Some("fr")).unwrap();

        expect_that!(registry.resolve("greeting", Some("en")), ok(eq("Bonjour")));
    }

    #[googletest::test]
    fn fixed_mode_supplies_its_own_language() {
        let registry = Registry::with_mode(
            Dictionary::builder().phrase("greeting", [("en", "Hello"), ("fr", "Bonjour")]).build(),
            LanguageMode::Fixed { language: "en".to_string() },
        )
        .unwrap();

        let _scope = registry.enter(None).unwrap();
        expect_that!(registry.resolve("greeting", None), ok(eq("Hello")));
        expect_that!(registry.resolve("greeting", Some("fr")), ok(eq("Hello")));
    }

    #[googletest::test]
    fn single_language_mode_resolves_without_tags() {
        let registry = Registry::build(Dictionary::single_language([("greeting", "Hello")]));

        let _scope = registry.enter(None).unwrap();
        expect_that!(registry.resolve("greeting", None), ok(eq("Hello")));
        expect_that!(registry.resolve("greeting", Some("fr")), ok(eq("Hello")));
        expect_that!(
            registry.resolve("missing", None),
            err(eq(&ResolveError::UnknownPhrase("missing".to_string())))
        );
    }

    #[rstest]
    #[case::provided_requires_language(LanguageMode::Provided)]
    #[case::overridable_requires_language(LanguageMode::Overridable)]
    fn enter_without_language_is_rejected(#[case] mode: LanguageMode) {
        let registry = Registry::with_mode(
            Dictionary::builder().phrase("greeting", [("en", "Hello")]).build(),
            mode,
        )
        .unwrap();

        let result = registry.enter(None).map(|_| ());
        assert_that!(result, err(eq(&ScopeError::ActiveLanguageRequired)));
    }

    #[googletest::test]
    fn enter_with_language_is_rejected_when_the_mode_supplies_one() {
        let fixed = Registry::with_mode(
            Dictionary::builder().phrase("greeting", [("en", "Hello")]).build(),
            LanguageMode::Fixed { language: "en".to_string() },
        )
        .unwrap();
        let single = Registry::build(Dictionary::single_language([("greeting", "Hello")]));

        expect_that!(
            fixed.enter(Some("fr")).map(|_| ()),
            err(eq(&ScopeError::ActiveLanguageNotAccepted("fr".to_string())))
        );
        expect_that!(
            single.enter(Some("fr")).map(|_| ()),
            err(eq(&ScopeError::ActiveLanguageNotAccepted("fr".to_string())))
        );
    }

    #[googletest::test]
    fn with_mode_rejects_shape_mismatches() {
        let tagged = Dictionary::builder().phrase("greeting", [("en", "Hello")]).build();
        let single = Dictionary::single_language([("greeting", "Hello")]);

        let result = Registry::with_mode(tagged, LanguageMode::SingleLanguage).map(|_| ());
        expect_that!(result, err(anything()));

        let result = Registry::with_mode(single, LanguageMode::Provided).map(|_| ());
        expect_that!(result, err(anything()));
    }

    #[googletest::test]
    fn with_mode_rejects_empty_fixed_language() {
        let dictionary = Dictionary::builder().phrase("greeting", [("en", "Hello")]).build();

        let result =
            Registry::with_mode(dictionary, LanguageMode::Fixed { language: String::new() })
                .map(|_| ());
        expect_that!(result, err(anything()));
    }

    #[googletest::test]
    fn snapshots_are_stable_per_language() {
        let registry = sample_registry();

        let first = registry.enter(Some("fr")).unwrap();
        let first_value = Arc::clone(first.context());
        drop(first);

        let second = registry.enter(Some("fr")).unwrap();
        expect_that!(Arc::ptr_eq(&first_value, second.context()), eq(true));
        drop(second);

        let changed = registry.enter(Some("en")).unwrap();
        expect_that!(Arc::ptr_eq(&first_value, changed.context()), eq(false));
    }

    #[googletest::test]
    fn nested_scopes_shadow_innermost_first() {
        let registry = sample_registry();

        let _outer = registry.enter(Some("en")).unwrap();
        {
            let _inner = registry.enter(Some("fr")).unwrap();
            expect_that!(registry.resolve("greeting", None), ok(eq("Bonjour")));
        }
        expect_that!(registry.resolve("greeting", None), ok(eq("Hello")));
    }

    #[googletest::test]
    fn coexisting_registries_do_not_shadow_each_other() {
        let first = sample_registry();
        let second = Registry::build(
            Dictionary::builder().phrase("greeting", [("de", "Hallo")]).build(),
        );

        let _first_scope = first.enter(Some("en")).unwrap();
        let _second_scope = second.enter(Some("de")).unwrap();

        expect_that!(first.resolve("greeting", None), ok(eq("Hello")));
        expect_that!(second.resolve("greeting", None), ok(eq("Hallo")));
    }

    #[googletest::test]
    fn with_scope_runs_the_closure_inside_the_scope() {
        let registry = sample_registry();

        let resolved = registry.with_scope(Some("fr"), || registry.resolve("greeting", None));
        expect_that!(resolved, ok(ok(eq("Bonjour"))));

        // The scope ended with the closure.
        expect_that!(
            registry.resolve("greeting", None),
            err(eq(&ResolveError::MissingProvider(MissingProviderError)))
        );
    }

    #[googletest::test]
    fn scope_exposes_its_language_and_registry() {
        let registry = sample_registry();

        let scope = registry.enter(Some("fr")).unwrap();
        expect_that!(scope.active_language(), some(eq("fr")));
        expect_that!(scope.registry().is_valid_phrase("greeting"), eq(true));
    }
}
