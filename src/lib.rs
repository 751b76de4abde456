//! text-translate
//!
//! フレーズ辞書とスコープ付きアクティブ言語による UI テキスト翻訳ライブラリ

pub mod config;
pub mod context;
pub mod coverage;
pub mod dictionary;
pub mod registry;

// 主要な型を再エクスポート
pub use config::{
    ConfigError,
    LanguageMode,
    RegistrySettings,
    ValidationError,
};
pub use context::{
    ContextValue,
    MissingProviderError,
};
pub use coverage::{
    CoverageReport,
    MissingEntry,
};
pub use dictionary::{
    Dictionary,
    DictionaryBuilder,
    DictionaryError,
};
pub use registry::{
    Registry,
    ResolveError,
    Scope,
    ScopeError,
};
