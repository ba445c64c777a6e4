//! 設定管理
//!
//! 比較ツール本体の設定ストアから受け取る値。JSONファイルから読み込めるが、
//! ファイルが無ければ既定値で動作する。

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 既定値
pub mod defaults {
    pub const ALLOW_MIXED_EOL: bool = false;
    /// Windows-1252
    pub const CODEPAGE: u32 = 1252;
    pub const CONFIG_DIR_NAME: &str = "altre-merge";
    pub const CONFIG_FILE_NAME: &str = "options.json";
}

/// コードページ推測の強さ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodepageDetectMode {
    /// BOMのみ見る
    None,
    /// BOMに加えてUTF-8として妥当かを調べる
    #[default]
    Heuristic,
}

/// 設定値
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// 保存時に行ごとの改行コードを保つか
    pub allow_mixed_eol: bool,
    /// コードページ推測モード
    pub cp_detect_mode: CodepageDetectMode,
    /// 一時ファイル用ディレクトリ（`~` と環境変数を展開する）
    pub temp_dir: Option<String>,
    /// BOMの無い8bitファイルに使うコードページ
    pub default_codepage: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            allow_mixed_eol: defaults::ALLOW_MIXED_EOL,
            cp_detect_mode: CodepageDetectMode::default(),
            temp_dir: None,
            default_codepage: defaults::CODEPAGE,
        }
    }
}

impl Options {
    /// 既定の設定ファイルパス
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| {
            dir.join(defaults::CONFIG_DIR_NAME)
                .join(defaults::CONFIG_FILE_NAME)
        })
    }

    /// 既定パスから読み込む。ファイルが無ければ既定値
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// 指定パスから読み込む。ファイルが無ければ既定値
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("options file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let options: Options =
            serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFile {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        options.validate()?;
        Ok(options)
    }

    /// 指定パスへ保存する
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::InvalidFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.default_codepage == 0 {
            return Err(ConfigError::InvalidValue {
                key: "default_codepage".to_string(),
                value: self.default_codepage.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// 一時ディレクトリを解決する
    pub fn resolve_temp_dir(&self) -> Result<PathBuf> {
        match &self.temp_dir {
            Some(raw) if !raw.trim().is_empty() => {
                let expanded =
                    shellexpand::full(raw).map_err(|e| ConfigError::InvalidValue {
                        key: "temp_dir".to_string(),
                        value: format!("{} ({})", raw, e),
                    })?;
                Ok(PathBuf::from(expanded.as_ref()))
            }
            _ => Ok(std::env::temp_dir()),
        }
    }
}
