//! altre-merge - 比較/マージ用の同期テキストバッファ
//!
//! 2〜3ペインのテキストバッファを読み込み、編集し、元の符号化方式と
//! 改行コードを保って保存する。

// コアモジュール
pub mod config;
pub mod error;
pub mod logging;

// データ層
pub mod buffer;
pub mod file;
pub mod sync_point;

// 文書
pub mod document;

// 公開API
pub use buffer::{EditAction, EditEvent, EditListener, LineFlags, NoopListener, TextBuffer, TextPosition};
pub use config::Options;
pub use document::{Annotation, DiffAnnotator, MergeDocument, UndoTargets};
pub use error::{MergeError, Result};
pub use file::{
    EolStyle, FileLoader, FileSaver, FileTextEncoding, FileTransform, IdentityTransform, LoadOutcome,
    LoadResult, PackingInfo, SaveOutcome, SaveRequest, SaveResult,
};
pub use sync_point::{SyncPoint, SyncPointList};
