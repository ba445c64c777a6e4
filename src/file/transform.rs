//! 展開/圧縮（アンパック/パック）変換
//!
//! 読み込み前にファイルを展開し、保存後に元の形式へ戻す外部プラグインの
//! インターフェース。プラグインの選択とサブコードは比較全体で共通。

use std::path::{Path, PathBuf};

/// プラグインの選択
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PluginChoice {
    /// 最初のペインの展開時に決める
    #[default]
    Automatic,
    /// 変換なし
    None,
    /// 名前付きプラグイン
    Named(String),
}

/// 比較全体で共有する変換情報
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackingInfo {
    pub plugin: PluginChoice,
    /// 展開時にプラグインが返すサブコード（パック時に同じ値を渡す）
    pub subcode: i32,
    /// 保存時に改行をバッファ既定値へ揃えることを強制する
    pub disallow_mixed_eol: bool,
}

impl PackingInfo {
    /// 変換なし
    pub fn none() -> Self {
        Self {
            plugin: PluginChoice::None,
            ..Self::default()
        }
    }

    pub fn plugin_name(&self) -> Option<&str> {
        match &self.plugin {
            PluginChoice::Named(name) => Some(name),
            _ => None,
        }
    }
}

/// 展開結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unpacked {
    /// 読み込むファイル（変換しない場合は元のパス）
    pub path: PathBuf,
    pub subcode: i32,
    /// 実際に使ったプラグイン名（変換しなかった場合は None）
    pub plugin_name: Option<String>,
}

/// 展開/圧縮プラグイン
pub trait FileTransform {
    /// `path` を展開した作業ファイルを返す
    fn unpack(&self, path: &Path, info: &PackingInfo) -> anyhow::Result<Unpacked>;

    /// `path` を元の形式へ戻し、最終的なファイル名を返す（名前が変わることがある）
    fn pack(&self, path: &Path, info: &PackingInfo) -> anyhow::Result<PathBuf>;
}

/// 何もしない変換
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl FileTransform for IdentityTransform {
    fn unpack(&self, path: &Path, info: &PackingInfo) -> anyhow::Result<Unpacked> {
        Ok(Unpacked {
            path: path.to_path_buf(),
            subcode: info.subcode,
            plugin_name: None,
        })
    }

    fn pack(&self, path: &Path, _info: &PackingInfo) -> anyhow::Result<PathBuf> {
        Ok(path.to_path_buf())
    }
}
