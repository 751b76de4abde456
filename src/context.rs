//! 翻訳スコープの共有状態
//!
//! スレッドローカルなスコープスタックで、辞書とアクティブ言語を
//! 明示的に引き回さずに子孫へ伝播させます。
//!
//! # シャドーイング
//!
//! 同じレジストリのスコープがネストした場合は、最も内側のスコープが
//! 優先されます。別レジストリのスコープは互いに干渉しません。

use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{
    AtomicU64,
    Ordering,
};

use thiserror::Error;

use crate::dictionary::Dictionary;

/// Error raised when the ambient context is read outside of any scope
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("No translation scope found; establish one with Registry::enter or Registry::with_scope")]
pub struct MissingProviderError;

/// Immutable snapshot shared with every consumer inside a scope.
///
/// A snapshot pairs the dictionary with the scope's active language. It is
/// replaced wholesale when the active language changes and reused (same
/// allocation) when it does not, so consumers keyed on snapshot identity are
/// not spuriously invalidated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextValue {
    /// Shared read-only dictionary of the owning registry.
    dictionary: Arc<Dictionary>,
    /// Active language of the scope. `None` for single-language registries.
    active_language: Option<String>,
}

impl ContextValue {
    /// Pairs a dictionary with an active language.
    pub(crate) const fn new(dictionary: Arc<Dictionary>, active_language: Option<String>) -> Self {
        Self { dictionary, active_language }
    }

    /// The dictionary this snapshot reads from.
    #[must_use]
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// The language this scope displays, if the mode carries one.
    #[must_use]
    pub fn active_language(&self) -> Option<&str> {
        self.active_language.as_deref()
    }
}

/// One established scope on the current thread's stack.
#[derive(Debug)]
struct ScopeEntry {
    /// Registry the scope belongs to.
    registry_id: u64,
    /// Identifies this entry for removal on drop.
    scope_id: u64,
    /// Snapshot visible to consumers inside the scope.
    value: Arc<ContextValue>,
}

thread_local! {
    /// Established scopes of the current thread; the innermost is last.
    static SCOPE_STACK: RefCell<Vec<ScopeEntry>> = const { RefCell::new(Vec::new()) };
}

/// Monotonic scope id source, shared across threads.
static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(0);

/// Pushes a snapshot for `registry_id` and returns the id used to remove it.
pub(crate) fn push(registry_id: u64, value: Arc<ContextValue>) -> u64 {
    let scope_id = NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed);
    SCOPE_STACK.with(|stack| {
        stack.borrow_mut().push(ScopeEntry { registry_id, scope_id, value });
    });
    tracing::trace!("Entered translation scope {scope_id}");
    scope_id
}

/// Removes the entry pushed with `scope_id`, wherever it sits in the stack.
pub(crate) fn remove(scope_id: u64) {
    SCOPE_STACK.with(|stack| {
        stack.borrow_mut().retain(|entry| entry.scope_id != scope_id);
    });
    tracing::trace!("Left translation scope {scope_id}");
}

/// Reads the innermost snapshot established for `registry_id`.
pub(crate) fn current(registry_id: u64) -> Result<Arc<ContextValue>, MissingProviderError> {
    SCOPE_STACK.with(|stack| {
        stack
            .borrow()
            .iter()
            .rev()
            .find(|entry| entry.registry_id == registry_id)
            .map(|entry| Arc::clone(&entry.value))
            .ok_or(MissingProviderError)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use googletest::prelude::*;

    use super::*;

    fn snapshot(language: &str) -> Arc<ContextValue> {
        let dictionary =
            Arc::new(Dictionary::builder().phrase("greeting", [("en", "Hello")]).build());
        Arc::new(ContextValue::new(dictionary, Some(language.to_string())))
    }

    #[googletest::test]
    fn current_without_scope_is_missing_provider() {
        let result = current(9000);

        expect_that!(result, err(eq(&MissingProviderError)));
    }

    #[googletest::test]
    fn push_makes_snapshot_readable_until_removed() {
        let value = snapshot("en");

        let scope_id = push(9001, Arc::clone(&value));
        let read = current(9001).unwrap();
        expect_that!(Arc::ptr_eq(&read, &value), eq(true));

        remove(scope_id);
        expect_that!(current(9001), err(eq(&MissingProviderError)));
    }

    #[googletest::test]
    fn innermost_scope_shadows_outer_one() {
        let outer = snapshot("en");
        let inner = snapshot("fr");

        let outer_id = push(9002, Arc::clone(&outer));
        let inner_id = push(9002, Arc::clone(&inner));

        let read = current(9002).unwrap();
        expect_that!(read.active_language(), some(eq("fr")));

        remove(inner_id);
        let read = current(9002).unwrap();
        expect_that!(read.active_language(), some(eq("en")));
        remove(outer_id);
    }

    #[googletest::test]
    fn scopes_are_filtered_by_registry() {
        let mine = snapshot("en");
        let other = snapshot("fr");

        let mine_id = push(9003, mine);
        let other_id = push(9004, other);

        let read = current(9003).unwrap();
        expect_that!(read.active_language(), some(eq("en")));

        remove(mine_id);
        remove(other_id);
        expect_that!(current(9003), err(eq(&MissingProviderError)));
    }

    #[googletest::test]
    fn out_of_order_removal_is_tolerated() {
        let outer = snapshot("en");
        let inner = snapshot("fr");

        let outer_id = push(9005, outer);
        let inner_id = push(9005, inner);

        // Dropping the outer guard first must not disturb the inner scope.
        remove(outer_id);
        let read = current(9005).unwrap();
        expect_that!(read.active_language(), some(eq("fr")));
        remove(inner_id);
    }

    #[googletest::test]
    fn scopes_do_not_leak_across_threads() {
        let value = snapshot("en");
        let scope_id = push(9006, value);

        let seen = std::thread::spawn(|| current(9006).is_err()).join().unwrap();
        expect_that!(seen, eq(true));

        remove(scope_id);
    }
}
