//! ファイル読み込み
//!
//! 展開 → 読み込み → 符号化方式の判定 → 行分割 → 確定 の順に処理する。
//! どの段階で失敗しても、バッファは空だが有効な状態で初期化される。

use crate::buffer::TextBuffer;
use crate::config::Options;
use crate::error::{BufferError, FileError, Result, TransformError};
use crate::file::encoding::{self, FileTextEncoding};
use crate::file::line_ending::EolStyle;
use crate::file::transform::{FileTransform, PackingInfo, PluginChoice, Unpacked};
use std::path::{Path, PathBuf};

/// 読み込み結果コード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadResult {
    /// 改行コードが1種類
    Ok,
    /// 改行コードが混在
    OkImpure,
    /// 読み込み失敗
    Error,
    /// 展開失敗
    UnpackFailed,
    /// バイナリファイル
    Binary,
}

impl LoadResult {
    pub fn is_success(self) -> bool {
        matches!(self, LoadResult::Ok | LoadResult::OkImpure)
    }
}

/// 読み込み結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub code: LoadResult,
    /// 変換できないバイト列があった
    pub lossy: bool,
    /// 読み取り専用として開くべきか
    pub read_only: bool,
    pub error: Option<String>,
}

impl LoadOutcome {
    fn loaded(code: LoadResult, lossy: bool) -> Self {
        Self {
            code,
            lossy,
            read_only: lossy,
            error: None,
        }
    }

    fn failed(code: LoadResult, error: Option<String>) -> Self {
        Self {
            code,
            lossy: false,
            read_only: false,
            error,
        }
    }
}

/// 展開で作られた作業ファイル（破棄時に削除）
struct WorkingFile {
    path: PathBuf,
    owned: bool,
}

impl WorkingFile {
    fn new(unpacked: &Unpacked, original: &Path) -> Self {
        Self {
            path: unpacked.path.clone(),
            owned: unpacked.path != original,
        }
    }
}

impl Drop for WorkingFile {
    fn drop(&mut self) {
        if self.owned {
            if let Err(e) = std::fs::remove_file(&self.path) {
                log::warn!(
                    "failed to remove unpacked file {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}

/// ファイル読み込み処理
pub struct FileLoader<'a> {
    transform: &'a dyn FileTransform,
    options: &'a Options,
}

impl<'a> FileLoader<'a> {
    pub fn new(transform: &'a dyn FileTransform, options: &'a Options) -> Self {
        Self { transform, options }
    }

    /// `path` をバッファへ読み込む
    ///
    /// 読み込みの失敗は結果コードで返す。`Err` は初期化済みバッファへの
    /// 再読み込みのような誤用に限る。
    pub fn load(
        &self,
        buffer: &mut TextBuffer,
        path: &Path,
        packing: &mut PackingInfo,
        eol_style: EolStyle,
        hint: &FileTextEncoding,
    ) -> Result<LoadOutcome> {
        if buffer.is_initialized() {
            return Err(BufferError::AlreadyInitialized.into());
        }
        log::debug!("pane {}: loading {}", buffer.pane(), path.display());

        match self.options.resolve_temp_dir() {
            Ok(dir) => buffer.set_temp_dir(dir),
            Err(e) => log::warn!("{}; using system temp directory", e),
        }

        let unpacked = match self.unpack(path, packing) {
            Ok(unpacked) => unpacked,
            Err(message) => {
                log::warn!("{}", message);
                buffer.init_empty_after_failure();
                return Ok(LoadOutcome::failed(LoadResult::UnpackFailed, Some(message)));
            }
        };
        buffer.set_unpacker_subcode(unpacked.subcode);
        let working = WorkingFile::new(&unpacked, path);

        let bytes = match std::fs::read(&working.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                let error = FileError::from_io(&e, path);
                log::debug!("open failed: {}", error);
                buffer.init_empty_after_failure();
                return Ok(LoadOutcome::failed(LoadResult::Error, Some(error.to_string())));
            }
        };

        // 展開した内容にはヒントが当てはまらないので推測し直す
        let file_encoding = if unpacked.plugin_name.is_some() {
            encoding::guess_encoding(&bytes, self.options.cp_detect_mode, hint.codepage)
        } else {
            encoding::detect_encoding(&bytes, hint)
        };

        if encoding::is_binary(&bytes, &file_encoding) {
            log::debug!("{} looks binary", path.display());
            buffer.init_empty_after_failure();
            return Ok(LoadOutcome::failed(LoadResult::Binary, None));
        }

        let decoded = encoding::decode(&bytes, &file_encoding);
        let stats = buffer.populate(&decoded.text, file_encoding, eol_style);
        buffer.set_read_only(decoded.lossy);

        let code = if stats.is_pure() {
            LoadResult::Ok
        } else {
            LoadResult::OkImpure
        };
        log::debug!(
            "pane {}: {} lines, {}, {} ({:?})",
            buffer.pane(),
            buffer.line_count(),
            file_encoding.name(),
            buffer.eol_style().name(),
            code
        );
        Ok(LoadOutcome::loaded(code, decoded.lossy))
    }

    /// 展開する。自動選択は結果を `packing` に書き戻す
    fn unpack(&self, path: &Path, packing: &mut PackingInfo) -> std::result::Result<Unpacked, String> {
        if packing.plugin == PluginChoice::None {
            return Ok(Unpacked {
                path: path.to_path_buf(),
                subcode: packing.subcode,
                plugin_name: None,
            });
        }

        let unpacked = self
            .transform
            .unpack(path, packing)
            .map_err(|e| {
                TransformError::Unpack {
                    path: path.display().to_string(),
                    message: format!("{:#}", e),
                }
                .to_string()
            })?;

        packing.subcode = unpacked.subcode;
        if packing.plugin == PluginChoice::Automatic {
            packing.plugin = match &unpacked.plugin_name {
                Some(name) => PluginChoice::Named(name.clone()),
                None => PluginChoice::None,
            };
        }
        Ok(unpacked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::line_ending::Terminator;
    use crate::file::transform::IdentityTransform;
    use tempfile::TempDir;

    fn load_bytes(bytes: &[u8]) -> (TextBuffer, LoadOutcome) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("input.txt");
        std::fs::write(&path, bytes).unwrap();

        let options = Options::default();
        let loader = FileLoader::new(&IdentityTransform, &options);
        let mut buffer = TextBuffer::new(0);
        let mut packing = PackingInfo::default();
        let outcome = loader
            .load(
                &mut buffer,
                &path,
                &mut packing,
                EolStyle::Automatic,
                &FileTextEncoding::default(),
            )
            .unwrap();
        (buffer, outcome)
    }

    #[test]
    fn test_load_dos_file() {
        let (buffer, outcome) = load_bytes(b"a\r\nb\r\nc");
        assert_eq!(outcome.code, LoadResult::Ok);
        assert_eq!(buffer.line_count(), 3);
        assert_eq!(buffer.line_eol(2), Some(Terminator::None));
        assert_eq!(buffer.eol_style(), EolStyle::Dos);
        assert!(!buffer.is_modified());
    }

    #[test]
    fn test_trailing_terminator_adds_empty_line() {
        let (buffer, _) = load_bytes(b"a\nb\n");
        assert_eq!(buffer.line_count(), 3);
        assert_eq!(buffer.get_line(2), Some(""));
    }

    #[test]
    fn test_mixed_terminators_are_impure() {
        let (buffer, outcome) = load_bytes(b"a\nb\r\nc");
        assert_eq!(outcome.code, LoadResult::OkImpure);
        assert_eq!(buffer.eol_style(), EolStyle::Mixed);
    }

    #[test]
    fn test_binary_file() {
        let (buffer, outcome) = load_bytes(b"ab\x00cd");
        assert_eq!(outcome.code, LoadResult::Binary);
        assert!(buffer.is_initialized());
        assert_eq!(buffer.line_count(), 1);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let options = Options::default();
        let loader = FileLoader::new(&IdentityTransform, &options);
        let mut buffer = TextBuffer::new(1);
        let outcome = loader
            .load(
                &mut buffer,
                &dir.path().join("missing.txt"),
                &mut PackingInfo::default(),
                EolStyle::Automatic,
                &FileTextEncoding::default(),
            )
            .unwrap();
        assert_eq!(outcome.code, LoadResult::Error);
        assert!(outcome.error.unwrap().contains("missing.txt"));
        assert!(buffer.is_initialized());
    }

    #[test]
    fn test_second_load_is_rejected() {
        let (mut buffer, _) = load_bytes(b"x");
        let options = Options::default();
        let loader = FileLoader::new(&IdentityTransform, &options);
        let result = loader.load(
            &mut buffer,
            Path::new("whatever"),
            &mut PackingInfo::default(),
            EolStyle::Automatic,
            &FileTextEncoding::default(),
        );
        assert!(matches!(
            result,
            Err(crate::error::MergeError::Buffer(BufferError::AlreadyInitialized))
        ));
    }

    #[test]
    fn test_automatic_plugin_resolved_to_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.txt");
        std::fs::write(&path, b"text").unwrap();
        let options = Options::default();
        let loader = FileLoader::new(&IdentityTransform, &options);
        let mut packing = PackingInfo::default();
        loader
            .load(
                &mut TextBuffer::new(0),
                &path,
                &mut packing,
                EolStyle::Automatic,
                &FileTextEncoding::default(),
            )
            .unwrap();
        assert_eq!(packing.plugin, PluginChoice::None);
    }
}
