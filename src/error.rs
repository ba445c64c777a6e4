//! エラーハンドリングシステム
//!
//! バッファ・ファイル入出力・同期ポイントで共通に使うエラー型を定義する。
//! ロード/セーブの失敗はエラーではなく結果コードで返し、
//! ここでの `Err` は呼び出し側の誤用と下位I/Oの失敗に限る。

use thiserror::Error;

/// 全体のエラー型
#[derive(Error, Debug, Clone)]
pub enum MergeError {
    /// ファイル操作エラー
    #[error("File operation failed: {0}")]
    File(#[from] FileError),

    /// バッファ操作エラー
    #[error("Buffer operation failed: {0}")]
    Buffer(#[from] BufferError),

    /// 展開/圧縮プラグインのエラー
    #[error("Transform failed: {0}")]
    Transform(#[from] TransformError),

    /// 同期ポイントのエラー
    #[error("Sync point error: {0}")]
    SyncPoint(#[from] SyncPointError),

    /// 設定エラー
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// ファイル操作固有のエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileError {
    #[error("File not found: {path}")]
    NotFound { path: String },

    #[error("Permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("Invalid path: {path}")]
    InvalidPath { path: String },

    #[error("Encoding error: {message}")]
    Encoding { message: String },

    #[error("IO error: {message}")]
    Io { message: String },
}

impl FileError {
    /// I/Oエラーをパス付きで分類する
    pub fn from_io(error: &std::io::Error, path: &std::path::Path) -> Self {
        let path = path.display().to_string();
        match error.kind() {
            std::io::ErrorKind::NotFound => FileError::NotFound { path },
            std::io::ErrorKind::PermissionDenied => FileError::PermissionDenied { path },
            _ => FileError::Io {
                message: format!("{}: {}", path, error),
            },
        }
    }
}

/// バッファ操作固有のエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("Buffer is not initialized")]
    NotInitialized,

    #[error("Buffer is already initialized; create a new buffer to reload")]
    AlreadyInitialized,

    #[error("Buffer is read-only")]
    ReadOnly,

    #[error("Invalid line index: {line} (line count {count})")]
    InvalidLine { line: usize, count: usize },

    #[error("Invalid position: line {line}, column {column}")]
    InvalidPosition { line: usize, column: usize },

    #[error("Invalid range: {start_line}:{start_column} .. {end_line}:{end_column}")]
    InvalidRange {
        start_line: usize,
        start_column: usize,
        end_line: usize,
        end_column: usize,
    },

    #[error("Invalid pane index: {pane} (pane count {count})")]
    InvalidPane { pane: usize, count: usize },

    #[error("Unsupported pane count: {count}")]
    UnsupportedPaneCount { count: usize },
}

/// 展開/圧縮処理のエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("Unpack failed for {path}: {message}")]
    Unpack { path: String, message: String },

    #[error("Pack failed for {path}: {message}")]
    Pack { path: String, message: String },
}

/// 同期ポイント固有のエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncPointError {
    #[error("Sync point has {actual} anchors, expected {expected}")]
    WrongArity { expected: usize, actual: usize },

    #[error("Anchor {line} is out of range for pane {pane}")]
    OutOfRange { pane: usize, line: usize },

    #[error("Sync point crosses an existing sync point in pane {pane}")]
    NotMonotonic { pane: usize },
}

/// 設定固有のエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration file: {path}: {message}")]
    InvalidFile { path: String, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// プロジェクト標準のResult型
pub type Result<T> = std::result::Result<T, MergeError>;

/// 各モジュール固有のResult型
pub mod buffer {
    pub type Result<T> = std::result::Result<T, super::BufferError>;
}

// std::io::Error から MergeError への変換
impl From<std::io::Error> for MergeError {
    fn from(error: std::io::Error) -> Self {
        MergeError::File(FileError::Io {
            message: error.to_string(),
        })
    }
}

/// パニック時に場所とメッセージを記録して終了する（CLI用）
pub fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        let message: &str = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.as_str()
        } else {
            "Unknown panic payload"
        };

        match panic_info.location() {
            Some(location) => {
                log::error!("panic at {}:{}: {}", location.file(), location.line(), message);
                eprintln!("PANIC at {}:{}: {}", location.file(), location.line(), message);
            }
            None => {
                log::error!("panic: {}", message);
                eprintln!("PANIC: {}", message);
            }
        }
        std::process::exit(1);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_io_error_classification() {
        let not_found = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(
            FileError::from_io(&not_found, Path::new("a.txt")),
            FileError::NotFound {
                path: "a.txt".to_string()
            }
        );

        let other = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        match FileError::from_io(&other, Path::new("b.txt")) {
            FileError::Io { message } => {
                assert!(message.contains("b.txt"));
                assert!(message.contains("disk on fire"));
            }
            e => panic!("unexpected error: {:?}", e),
        }
    }

    #[test]
    fn test_buffer_error_conversion() {
        let error: MergeError = BufferError::NotInitialized.into();
        assert!(matches!(error, MergeError::Buffer(BufferError::NotInitialized)));
        assert!(error.to_string().contains("not initialized"));
    }
}
