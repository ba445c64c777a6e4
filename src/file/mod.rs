//! ファイル入出力モジュール
//!
//! - 展開/圧縮プラグインを経由した読み込みと保存
//! - BOM・コードページによる符号化方式の判定
//! - 改行コードの統計と保存時の正規化
//! - 差分エンジン向け一時ファイルの制御文字エスケープ

pub mod encoding;
pub mod escape;
pub mod line_ending;
pub mod loader;
pub mod saver;
pub mod transform;

pub use encoding::{FileTextEncoding, UnicodeTransform};
pub use escape::{escape_control_chars, unescape_control_chars};
pub use line_ending::{EolStyle, Terminator, TextStats};
pub use loader::{FileLoader, LoadOutcome, LoadResult};
pub use saver::{FileSaver, SaveOutcome, SaveRequest, SaveResult};
pub use transform::{FileTransform, IdentityTransform, PackingInfo, PluginChoice, Unpacked};
