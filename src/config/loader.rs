//! 設定ファイルの読み込み関数

use std::path::Path;

use super::{
    ConfigError,
    RegistrySettings,
};

/// ワークスペースから設定を読み込む
///
/// `.text-translate.json` ファイルを探して読み込む
///
/// # Arguments
/// * `workspace_root` - ワークスペースのルートパス
///
/// # Returns
/// - `Ok(Some(settings))`: 設定ファイルが見つかり、読み込みに成功
/// - `Ok(None)`: 設定ファイルが見つからない
/// - `Err(ConfigError)`: ファイル読み込みまたはパースエラー
///
/// # Errors
/// - ファイル読み込みエラー
/// - JSON パースエラー
pub(super) fn load_from_workspace(
    workspace_root: &Path,
) -> Result<Option<RegistrySettings>, ConfigError> {
    let config_path = workspace_root.join(".text-translate.json");

    if !config_path.exists() {
        tracing::debug!("Configuration file not found: {:?}", config_path);
        return Ok(None);
    }

    tracing::debug!("Loading configuration from: {:?}", config_path);

    let content = std::fs::read_to_string(&config_path)?;
    let settings: RegistrySettings = serde_json::from_str(&content)?;

    Ok(Some(settings))
}

/// Loads and validates settings for a workspace, falling back to defaults
/// when no root is given or no configuration file exists.
///
/// # Errors
/// - File read or JSON parse errors
/// - Validation errors in the loaded settings
pub fn load_or_default(workspace_root: Option<&Path>) -> Result<RegistrySettings, ConfigError> {
    tracing::debug!("Loading settings for workspace: {:?}", workspace_root);

    let settings = if let Some(root) = workspace_root {
        load_from_workspace(root)?.map_or_else(RegistrySettings::default, |loaded| {
            tracing::debug!("Loaded workspace settings: {:?}", loaded);
            loaded
        })
    } else {
        RegistrySettings::default()
    };

    settings.validate().map_err(ConfigError::ValidationErrors)?;

    Ok(settings)
}
