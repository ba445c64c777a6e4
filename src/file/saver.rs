//! ファイル保存
//!
//! ユーザーファイルは一時ディレクトリの `MRG_*` ファイルへ書き出し、
//! 必要ならパックしてから保存先と置き換える。差分エンジン用の一時保存は
//! 指定パスへ直接書き、制御文字をエスケープする。

use crate::buffer::TextBuffer;
use crate::config::Options;
use crate::error::{BufferError, FileError, Result, TransformError};
use crate::file::encoding;
use crate::file::escape::escape_control_chars;
use crate::file::line_ending::{EolStyle, Terminator};
use crate::file::transform::{FileTransform, PackingInfo, PluginChoice};
use std::io::Write;
use std::path::Path;
use tempfile::TempPath;

/// 中間ファイル名の接頭辞
pub const INTERMEDIATE_PREFIX: &str = "MRG_";

/// 保存結果コード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    Done,
    /// ファイル名なし、または書き込み失敗
    Failed,
    /// パック失敗（保存先は変更しない）
    PackFailed,
}

/// 保存結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub code: SaveResult,
    pub error: Option<String>,
}

impl SaveOutcome {
    fn done() -> Self {
        Self {
            code: SaveResult::Done,
            error: None,
        }
    }

    fn failed(code: SaveResult, error: impl Into<String>) -> Self {
        Self {
            code,
            error: Some(error.into()),
        }
    }

    pub fn is_done(&self) -> bool {
        self.code == SaveResult::Done
    }
}

/// 保存要求
#[derive(Clone, Copy)]
pub struct SaveRequest<'a> {
    pub path: &'a Path,
    /// 差分エンジン用の一時保存
    pub temp: bool,
    pub eol_style: EolStyle,
    pub start_line: usize,
    /// 書き出す行数（None なら最後まで）
    pub line_count: Option<usize>,
    pub transform: Option<(&'a dyn FileTransform, &'a PackingInfo)>,
    /// 成功時に変更フラグを消すか
    pub clear_modified: bool,
}

impl<'a> SaveRequest<'a> {
    pub fn new(path: &'a Path) -> Self {
        Self {
            path,
            temp: false,
            eol_style: EolStyle::Automatic,
            start_line: 0,
            line_count: None,
            transform: None,
            clear_modified: true,
        }
    }

    pub fn temp_file(mut self) -> Self {
        self.temp = true;
        self
    }

    pub fn with_eol(mut self, style: EolStyle) -> Self {
        self.eol_style = style;
        self
    }

    pub fn with_lines(mut self, start_line: usize, line_count: usize) -> Self {
        self.start_line = start_line;
        self.line_count = Some(line_count);
        self
    }

    pub fn with_transform(mut self, transform: &'a dyn FileTransform, packing: &'a PackingInfo) -> Self {
        self.transform = Some((transform, packing));
        self
    }

    pub fn keep_modified(mut self) -> Self {
        self.clear_modified = false;
        self
    }

    fn packing(&self) -> Option<&'a PackingInfo> {
        self.transform.map(|(_, packing)| packing)
    }
}

/// ファイル保存処理
pub struct FileSaver<'a> {
    options: &'a Options,
}

impl<'a> FileSaver<'a> {
    pub fn new(options: &'a Options) -> Self {
        Self { options }
    }

    /// バッファを保存する
    ///
    /// 保存の失敗は結果コードで返す。`Err` は未初期化バッファの保存に限る。
    /// 読み取り専用バッファはユーザーファイルへ保存しない（一時保存は可）。
    pub fn save(&self, buffer: &mut TextBuffer, request: &SaveRequest<'_>) -> Result<SaveOutcome> {
        buffer.ensure_initialized()?;

        if request.path.as_os_str().is_empty() {
            return Ok(SaveOutcome::failed(SaveResult::Failed, "no file name"));
        }
        if buffer.is_read_only() && !request.temp {
            log::warn!(
                "pane {}: refusing to save read-only buffer to {}",
                buffer.pane(),
                request.path.display()
            );
            return Ok(SaveOutcome::failed(
                SaveResult::Failed,
                BufferError::ReadOnly.to_string(),
            ));
        }
        log::debug!(
            "pane {}: saving {} (temp: {})",
            buffer.pane(),
            request.path.display(),
            request.temp
        );

        let bytes = self.render(buffer, request);

        let outcome = if request.temp {
            match std::fs::write(request.path, &bytes) {
                Ok(()) => SaveOutcome::done(),
                Err(e) => SaveOutcome::failed(
                    SaveResult::Failed,
                    FileError::from_io(&e, request.path).to_string(),
                ),
            }
        } else {
            self.save_via_intermediate(buffer, request, &bytes)
        };

        if outcome.is_done() {
            buffer.mark_saved(request.clear_modified, !request.temp);
        } else {
            log::error!(
                "saving {} failed: {}",
                request.path.display(),
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(outcome)
    }

    /// 保存に使う改行（None なら行ごとの改行を保つ）
    fn effective_terminator(&self, buffer: &TextBuffer, request: &SaveRequest<'_>) -> Option<Terminator> {
        let disallow_mixed = request.packing().is_some_and(|p| p.disallow_mixed_eol);
        let forced = (request.eol_style == EolStyle::Automatic && !self.options.allow_mixed_eol)
            || disallow_mixed;

        if forced {
            let style = match buffer.eol_style() {
                EolStyle::Mixed | EolStyle::Automatic => buffer.text_stats().dominant(),
                style => style,
            };
            style.terminator()
        } else {
            request.eol_style.terminator()
        }
    }

    /// 保存内容をバイト列にする（BOMを含む）
    fn render(&self, buffer: &TextBuffer, request: &SaveRequest<'_>) -> Vec<u8> {
        let terminator = self.effective_terminator(buffer, request);
        let line_count = buffer.line_count();
        let end = request
            .line_count
            .map(|count| request.start_line.saturating_add(count))
            .unwrap_or(line_count)
            .min(line_count);
        let last_real = buffer.apparent_last_real_line();

        let mut text = String::new();
        for (index, line) in buffer
            .lines()
            .iter()
            .enumerate()
            .take(end)
            .skip(request.start_line)
        {
            if line.is_ghost() {
                continue;
            }
            if request.temp {
                let mut escaped = line.text.clone();
                escape_control_chars(&mut escaped);
                text.push_str(&escaped);
            } else {
                text.push_str(&line.text);
            }
            if Some(index) == last_real {
                break;
            }
            text.push_str(terminator.unwrap_or(line.eol).as_str());
        }

        let file_encoding = buffer.encoding();
        let (body, unmappable) = encoding::encode(&text, &file_encoding);
        if unmappable {
            log::warn!(
                "{}: some characters cannot be represented in {}",
                request.path.display(),
                file_encoding.name()
            );
        }

        let mut bytes = file_encoding.bom_bytes().to_vec();
        bytes.extend_from_slice(&body);
        bytes
    }

    fn save_via_intermediate(
        &self,
        buffer: &TextBuffer,
        request: &SaveRequest<'_>,
        bytes: &[u8],
    ) -> SaveOutcome {
        let intermediate = match write_intermediate(buffer.temp_dir(), bytes) {
            Ok(path) => path,
            Err(e) => {
                return SaveOutcome::failed(
                    SaveResult::Failed,
                    FileError::from_io(&e, buffer.temp_dir()).to_string(),
                )
            }
        };

        let intermediate = match request.transform {
            Some((transform, packing)) if packing.plugin != PluginChoice::None => {
                match pack(transform, packing, intermediate) {
                    Ok(packed) => packed,
                    Err(message) => return SaveOutcome::failed(SaveResult::PackFailed, message),
                }
            }
            _ => intermediate,
        };

        match replace_file(intermediate, request.path) {
            Ok(()) => SaveOutcome::done(),
            Err(e) => SaveOutcome::failed(
                SaveResult::Failed,
                FileError::from_io(&e, request.path).to_string(),
            ),
        }
    }
}

fn write_intermediate(dir: &Path, bytes: &[u8]) -> std::io::Result<TempPath> {
    let mut file = tempfile::Builder::new()
        .prefix(INTERMEDIATE_PREFIX)
        .tempfile_in(dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file.into_temp_path())
}

/// 中間ファイルをパックする。失敗時は中間ファイルを削除する
fn pack(
    transform: &dyn FileTransform,
    packing: &PackingInfo,
    intermediate: TempPath,
) -> std::result::Result<TempPath, String> {
    let packed = transform.pack(&intermediate, packing).map_err(|e| {
        TransformError::Pack {
            path: intermediate.display().to_string(),
            message: format!("{:#}", e),
        }
        .to_string()
    })?;

    if packed.as_path() == &*intermediate {
        Ok(intermediate)
    } else {
        log::debug!(
            "pack renamed {} to {}",
            intermediate.display(),
            packed.display()
        );
        // 古い名前が残っていれば削除される
        drop(intermediate);
        TempPath::try_from_path(&packed).map_err(|e| {
            if let Err(remove_error) = std::fs::remove_file(&packed) {
                log::warn!("failed to remove {}: {}", packed.display(), remove_error);
            }
            FileError::from_io(&e, &packed).to_string()
        })
    }
}

/// 保存先を置き換える（別ファイルシステムならコピー）
fn replace_file(intermediate: TempPath, destination: &Path) -> std::io::Result<()> {
    match intermediate.persist(destination) {
        Ok(()) => Ok(()),
        Err(e) => {
            log::debug!("rename failed ({}), copying instead", e.error);
            std::fs::copy(&e.path, destination)?;
            Ok(())
        }
    }
}
