//! テキストバッファ
//!
//! 比較の1ペイン分の行列を保持する。行ごとに改行コードとフラグを持ち、
//! 編集は挿入/削除の2つの基本操作に分解して履歴に記録する。
//! 他ペインとの連携（同期ポイント、undo の対応付け）は編集ごとに渡す
//! [`EditListener`] への通知で行い、バッファ自身は文書を参照しない。

pub mod line;
pub mod undo;

pub use line::{Line, LineFlags};
pub use undo::{EditAction, UndoKind, UndoLog, UndoRecord};

use crate::error::{buffer::Result, BufferError};
use crate::file::encoding::FileTextEncoding;
use crate::file::line_ending::{EolStyle, LineSplitter, Terminator, TextStats};
use std::path::{Path, PathBuf};

/// バッファ内の位置（列は文字単位）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TextPosition {
    pub line: usize,
    pub column: usize,
}

impl TextPosition {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// 編集通知
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditEvent {
    /// 削除の直前（バッファはまだ変更されていない）
    BeforeDelete { start: TextPosition, end: TextPosition },
    /// 削除の直後
    Deleted { start: TextPosition, end: TextPosition },
    /// 挿入の直後（`end` は挿入したテキストの直後）
    Inserted { start: TextPosition, end: TextPosition },
    /// ゴースト行 `line` を取り除いた直後（`line_count` は残りの行数）
    GhostLineRemoved { line: usize, line_count: usize },
    /// 新しい undo グループの記録を追加した
    GroupBegin,
}

/// 編集通知の受け手
pub trait EditListener {
    fn on_edit(&mut self, pane: usize, event: &EditEvent);
}

/// 通知を捨てるリスナー（単独バッファ用）
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl EditListener for NoopListener {
    fn on_edit(&mut self, _pane: usize, _event: &EditEvent) {}
}

/// テキストバッファ
#[derive(Debug, Clone)]
pub struct TextBuffer {
    pane: usize,
    lines: Vec<Line>,
    encoding: FileTextEncoding,
    eol_style: EolStyle,
    text_stats: TextStats,
    modified: bool,
    read_only: bool,
    current_revision: u32,
    revision_on_save: u32,
    undo: UndoLog,
    initialized: bool,
    unpacker_subcode: i32,
    temp_dir: PathBuf,
}

impl TextBuffer {
    /// 未初期化のバッファを作成
    pub fn new(pane: usize) -> Self {
        Self {
            pane,
            lines: Vec::new(),
            encoding: FileTextEncoding::default(),
            eol_style: EolStyle::Automatic,
            text_stats: TextStats::default(),
            modified: false,
            read_only: false,
            current_revision: 0,
            revision_on_save: 0,
            undo: UndoLog::new(),
            initialized: false,
            unpacker_subcode: 0,
            temp_dir: std::env::temp_dir(),
        }
    }

    pub fn pane(&self) -> usize {
        self.pane
    }

    /// 空の新規文書として初期化
    pub fn init_new(&mut self) -> Result<()> {
        if self.initialized {
            return Err(BufferError::AlreadyInitialized);
        }
        self.reset_contents(vec![Line::new(String::new(), Terminator::None)]);
        self.eol_style = EolStyle::platform_default();
        self.text_stats = TextStats::default();
        self.initialized = true;
        Ok(())
    }

    /// 文字列から初期化する（符号化方式は UTF-8）
    pub fn init_from_str(&mut self, text: &str, eol_style: EolStyle) -> Result<()> {
        if self.initialized {
            return Err(BufferError::AlreadyInitialized);
        }
        self.populate(text, FileTextEncoding::utf8(false), eol_style);
        Ok(())
    }

    /// 読み込んだテキストで行列を構築する
    ///
    /// 最後に改行があれば空の最終行を追加する。
    pub(crate) fn populate(
        &mut self,
        text: &str,
        encoding: FileTextEncoding,
        eol_style: EolStyle,
    ) -> TextStats {
        let mut stats = TextStats::default();
        let lines: Vec<Line> = LineSplitter::new(text)
            .map(|(content, terminator)| {
                stats.record(terminator);
                Line::new(content, terminator)
            })
            .collect();

        self.reset_contents(lines);
        self.encoding = encoding;
        self.text_stats = stats;
        self.eol_style = match eol_style {
            EolStyle::Automatic => stats.classify(),
            explicit => explicit,
        };
        self.initialized = true;
        stats
    }

    /// 読み込み失敗時: 空だが有効なバッファにする
    pub(crate) fn init_empty_after_failure(&mut self) {
        self.reset_contents(vec![Line::new(String::new(), Terminator::None)]);
        self.text_stats = TextStats::default();
        self.initialized = true;
    }

    fn reset_contents(&mut self, lines: Vec<Line>) {
        self.lines = lines;
        self.modified = false;
        self.read_only = false;
        self.current_revision = 0;
        self.revision_on_save = 0;
        self.undo.reset();
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(BufferError::NotInitialized)
        }
    }

    fn ensure_writable(&self) -> Result<()> {
        self.ensure_initialized()?;
        if self.read_only {
            return Err(BufferError::ReadOnly);
        }
        Ok(())
    }

    // ---- 読み取り ----

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    /// 改行を含まない行内容
    pub fn get_line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(|line| line.text.as_str())
    }

    /// 改行を含む行内容
    ///
    /// 空文字列で `false` の場合は範囲外か長さ0の行。
    pub fn get_full_line(&self, index: usize) -> (String, bool) {
        match self.lines.get(index) {
            Some(line) if line.full_char_len() > 0 => {
                (format!("{}{}", line.text, line.eol.as_str()), true)
            }
            _ => (String::new(), false),
        }
    }

    /// 改行を含まない文字数
    pub fn line_length(&self, index: usize) -> Option<usize> {
        self.lines.get(index).map(Line::char_len)
    }

    /// 改行を含む文字数
    pub fn full_line_length(&self, index: usize) -> Option<usize> {
        self.lines.get(index).map(Line::full_char_len)
    }

    pub fn line_eol(&self, index: usize) -> Option<Terminator> {
        self.lines.get(index).map(|line| line.eol)
    }

    pub fn line_flags(&self, index: usize) -> Option<LineFlags> {
        self.lines.get(index).map(|line| line.flags)
    }

    pub fn flag_is_set(&self, index: usize, flags: LineFlags) -> bool {
        self.lines
            .get(index)
            .map(|line| line.flags.contains(flags))
            .unwrap_or(false)
    }

    pub fn set_line_flag(&mut self, index: usize, flags: LineFlags, on: bool) -> Result<()> {
        let count = self.lines.len();
        let line = self
            .lines
            .get_mut(index)
            .ok_or(BufferError::InvalidLine { line: index, count })?;
        line.flags.set(flags, on);
        Ok(())
    }

    pub fn is_ghost(&self, index: usize) -> bool {
        self.flag_is_set(index, LineFlags::GHOST)
    }

    /// 最後の実在行（全てゴースト行なら None）
    pub fn apparent_last_real_line(&self) -> Option<usize> {
        self.lines.iter().rposition(|line| !line.is_ghost())
    }

    /// `start` から `end` までのテキスト（改行を含む）
    pub fn get_text(&self, start: TextPosition, end: TextPosition) -> Result<String> {
        let (start_byte, end_byte) = self.check_range(start, end)?;

        if start.line == end.line {
            return Ok(self.lines[start.line].text[start_byte..end_byte].to_string());
        }

        let first = &self.lines[start.line];
        let mut text = String::new();
        text.push_str(&first.text[start_byte..]);
        text.push_str(first.eol.as_str());
        for line in &self.lines[start.line + 1..end.line] {
            text.push_str(&line.text);
            text.push_str(line.eol.as_str());
        }
        text.push_str(&self.lines[end.line].text[..end_byte]);
        Ok(text)
    }

    /// `begin` 行頭から `end` 行末（改行を除く）までのテキスト。ゴースト行は除く
    pub fn get_text_without_ghosts(&self, begin: usize, end: usize) -> Result<String> {
        self.check_line_range(begin, end)?;
        let mut text = String::new();
        for (index, line) in self.lines[begin..=end].iter().enumerate() {
            if line.is_ghost() {
                continue;
            }
            text.push_str(&line.text);
            if begin + index != end {
                text.push_str(line.eol.as_str());
            }
        }
        Ok(text)
    }

    // ---- 属性 ----

    pub fn encoding(&self) -> FileTextEncoding {
        self.encoding
    }

    pub fn set_encoding(&mut self, encoding: FileTextEncoding) {
        self.encoding = encoding;
    }

    pub fn eol_style(&self) -> EolStyle {
        self.eol_style
    }

    pub fn set_eol_style(&mut self, style: EolStyle) {
        self.eol_style = style;
    }

    /// 読み込み時の改行コード統計
    pub fn text_stats(&self) -> TextStats {
        self.text_stats
    }

    /// 新しい行に使う改行
    pub fn default_terminator(&self) -> Terminator {
        self.eol_style
            .terminator()
            .or_else(|| self.text_stats.dominant().terminator())
            .unwrap_or(Terminator::CrLf)
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn current_revision(&self) -> u32 {
        self.current_revision
    }

    pub fn revision_on_save(&self) -> u32 {
        self.revision_on_save
    }

    pub fn unpacker_subcode(&self) -> i32 {
        self.unpacker_subcode
    }

    pub(crate) fn set_unpacker_subcode(&mut self, subcode: i32) {
        self.unpacker_subcode = subcode;
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn set_temp_dir(&mut self, dir: impl Into<PathBuf>) {
        self.temp_dir = dir.into();
    }

    /// 保存成功後の状態更新
    pub(crate) fn mark_saved(&mut self, clear_modified: bool, stamp_revision: bool) {
        if clear_modified {
            self.modified = false;
            self.undo.mark_synced();
        }
        if stamp_revision {
            self.revision_on_save = self.current_revision;
        }
    }

    // ---- 履歴 ----

    pub fn undo_log(&self) -> &UndoLog {
        &self.undo
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    pub fn begin_undo_group(&mut self) {
        self.undo.begin_group();
    }

    pub fn flush_undo_group(&mut self) {
        self.undo.flush_group();
    }

    fn push_undo(&mut self, record: UndoRecord, listener: &mut dyn EditListener) {
        if self.undo.push(record) {
            listener.on_edit(self.pane, &EditEvent::GroupBegin);
        }
    }

    /// 直前のグループを取り消す。取り消すものが無ければ false
    pub fn undo(&mut self, listener: &mut dyn EditListener) -> Result<bool> {
        self.ensure_writable()?;
        let group = self.undo.take_undo_group();
        if group.is_empty() {
            return Ok(false);
        }
        for record in &group {
            let start = self.to_apparent(record.start);
            match record.kind {
                UndoKind::Insert => {
                    let end = self.to_apparent(record.end);
                    self.raw_delete(start, end, listener)?;
                }
                UndoKind::Delete => {
                    self.raw_insert(start, &record.text, listener)?;
                }
            }
        }
        self.modified = !self.undo.is_at_sync_position();
        log::debug!("pane {}: undo {} record(s)", self.pane, group.len());
        Ok(true)
    }

    /// 取り消したグループをやり直す。やり直すものが無ければ false
    pub fn redo(&mut self, listener: &mut dyn EditListener) -> Result<bool> {
        self.ensure_writable()?;
        let group = self.undo.take_redo_group();
        if group.is_empty() {
            return Ok(false);
        }
        for record in &group {
            let start = self.to_apparent(record.start);
            match record.kind {
                UndoKind::Insert => {
                    self.raw_insert(start, &record.text, listener)?;
                }
                UndoKind::Delete => {
                    let end = self.to_apparent(record.end);
                    self.raw_delete(start, end, listener)?;
                }
            }
        }
        self.modified = !self.undo.is_at_sync_position();
        log::debug!("pane {}: redo {} record(s)", self.pane, group.len());
        Ok(true)
    }

    // ---- 編集 ----

    /// テキストを挿入し、挿入したテキストの直後の位置を返す
    pub fn insert_text(
        &mut self,
        pos: TextPosition,
        text: &str,
        action: EditAction,
        listener: &mut dyn EditListener,
    ) -> Result<TextPosition> {
        self.ensure_writable()?;
        let end = self.raw_insert(pos, text, listener)?;
        if !text.is_empty() {
            let record = UndoRecord::insert(self.to_real(pos), self.to_real(end), text, action);
            self.push_undo(record, listener);
        }
        Ok(end)
    }

    /// `start` から `end` までを削除し、削除したテキストを返す
    pub fn delete_text(
        &mut self,
        start: TextPosition,
        end: TextPosition,
        action: EditAction,
        listener: &mut dyn EditListener,
    ) -> Result<String> {
        self.ensure_writable()?;
        let (real_start, real_end) = (self.to_real(start), self.to_real(end));
        let removed = self.raw_delete(start, end, listener)?;
        if !removed.is_empty() {
            let record = UndoRecord::delete(real_start, real_end, removed.clone(), action);
            self.push_undo(record, listener);
        }
        Ok(removed)
    }

    /// `begin..=end` 行を `source` の同じ行範囲で置き換える
    ///
    /// ゴースト行は複写しない。改行は挿入するブロックの最終行の分だけ付ける。
    pub fn replace_full_lines(
        &mut self,
        source: &TextBuffer,
        begin: usize,
        end: usize,
        action: EditAction,
        listener: &mut dyn EditListener,
    ) -> Result<()> {
        self.ensure_writable()?;
        source.check_line_range(begin, end)?;
        let count = self.lines.len();
        if begin >= count {
            return Err(BufferError::InvalidLine { line: begin, count });
        }

        let mut text = if begin != end || source.line_length(end).unwrap_or(0) > 0 {
            source.get_text_without_ghosts(begin, end)?
        } else {
            String::new()
        };
        text.push_str(source.lines[end].eol.as_str());

        let opened_group = !self.undo.in_group();
        if opened_group {
            self.undo.begin_group();
        }

        let result = self.replace_lines_with(begin, end, &text, action, listener);

        if opened_group {
            self.undo.flush_group();
        }
        result
    }

    fn replace_lines_with(
        &mut self,
        begin: usize,
        end: usize,
        text: &str,
        action: EditAction,
        listener: &mut dyn EditListener,
    ) -> Result<()> {
        let count = self.lines.len();
        let target_has_content = end < count && self.lines[end].full_char_len() > 0;
        if begin != end || target_has_content {
            let end_src = end.min(count - 1);
            let delete_end = if end + 1 < count {
                TextPosition::new(end_src + 1, 0)
            } else {
                TextPosition::new(end_src, self.lines[end_src].char_len())
            };
            self.delete_text(TextPosition::new(begin, 0), delete_end, action, listener)?;
        }

        if !text.is_empty() {
            self.insert_text(TextPosition::new(begin, 0), text, action, listener)?;
        }
        Ok(())
    }

    // ---- ゴースト行・再比較 ----

    /// `at` の前にゴースト行を `count` 行挿入する（履歴には残らない）
    pub fn insert_ghost_lines(
        &mut self,
        at: usize,
        count: usize,
        listener: &mut dyn EditListener,
    ) -> Result<()> {
        let line_count = self.lines.len();
        if at > line_count {
            return Err(BufferError::InvalidLine {
                line: at,
                count: line_count,
            });
        }
        if count == 0 {
            return Ok(());
        }

        self.lines
            .splice(at..at, std::iter::repeat_with(Line::ghost).take(count));
        listener.on_edit(
            self.pane,
            &EditEvent::Inserted {
                start: TextPosition::new(at, 0),
                end: TextPosition::new(at + count, 0),
            },
        );
        Ok(())
    }

    /// 全てのゴースト行を取り除く
    pub fn remove_all_ghost_lines(&mut self, listener: &mut dyn EditListener) {
        let mut index = self.lines.len();
        while index > 0 {
            index -= 1;
            if !self.lines[index].is_ghost() {
                continue;
            }
            self.lines.remove(index);
            if self.lines.is_empty() {
                self.lines.push(Line::new(String::new(), Terminator::None));
            }
            listener.on_edit(
                self.pane,
                &EditEvent::GhostLineRemoved {
                    line: index,
                    line_count: self.lines.len(),
                },
            );
        }
    }

    /// 再比較の準備: ゴースト行を除き、比較結果のフラグを消す
    pub fn prepare_for_rescan(&mut self, listener: &mut dyn EditListener) {
        self.remove_all_ghost_lines(listener);
        for line in &mut self.lines {
            line.flags.remove(LineFlags::RESCAN_CLEARED);
        }
    }

    // ---- 内部操作 ----

    /// 表示上の位置をゴースト行を除いた実在行の位置にする
    ///
    /// ゴースト行上の位置は次の実在行の行頭になる。履歴はこの座標で記録する。
    fn to_real(&self, pos: TextPosition) -> TextPosition {
        let end = pos.line.min(self.lines.len());
        let ghosts = self.lines[..end].iter().filter(|line| line.is_ghost()).count();
        let column = if self.is_ghost(pos.line) { 0 } else { pos.column };
        TextPosition::new(pos.line - ghosts, column)
    }

    /// 実在行の位置を現在の表示上の位置にする
    fn to_apparent(&self, pos: TextPosition) -> TextPosition {
        let mut real = 0;
        for (index, line) in self.lines.iter().enumerate() {
            if line.is_ghost() {
                continue;
            }
            if real == pos.line {
                return TextPosition::new(index, pos.column);
            }
            real += 1;
        }
        // 実在行の後ろ（末尾のゴースト行など）
        let line = self.apparent_last_real_line().map_or(0, |last| last + 1);
        TextPosition::new(line + (pos.line - real), pos.column)
    }

    fn check_position(&self, pos: TextPosition) -> Result<usize> {
        self.lines
            .get(pos.line)
            .and_then(|line| line.byte_index(pos.column))
            .ok_or(BufferError::InvalidPosition {
                line: pos.line,
                column: pos.column,
            })
    }

    fn check_range(&self, start: TextPosition, end: TextPosition) -> Result<(usize, usize)> {
        let invalid = BufferError::InvalidRange {
            start_line: start.line,
            start_column: start.column,
            end_line: end.line,
            end_column: end.column,
        };
        if start > end {
            return Err(invalid);
        }
        let start_byte = self.check_position(start).map_err(|_| invalid.clone())?;
        let end_byte = self.check_position(end).map_err(|_| invalid)?;
        Ok((start_byte, end_byte))
    }

    fn check_line_range(&self, begin: usize, end: usize) -> Result<()> {
        let count = self.lines.len();
        if end >= count {
            return Err(BufferError::InvalidLine { line: end, count });
        }
        if begin > end {
            return Err(BufferError::InvalidLine { line: begin, count });
        }
        Ok(())
    }

    fn next_revision(&mut self) -> u32 {
        self.current_revision = self.current_revision.wrapping_add(1);
        self.current_revision
    }

    /// 編集された行の印を更新する。ゴースト行だった場合は true
    fn touch(line: &mut Line, revision: u32) -> bool {
        let was_ghost = line.is_ghost();
        line.flags.remove(LineFlags::EDIT_CLEARED);
        line.revision = revision;
        was_ghost
    }

    /// 実在行の途中に改行の無い行が残らないようにする
    fn repair_terminators(&mut self) {
        let Some(last_real) = self.apparent_last_real_line() else {
            return;
        };
        let terminator = self.default_terminator();
        for line in &mut self.lines[..last_real] {
            if !line.is_ghost() && line.eol.is_none() {
                line.eol = terminator;
            }
        }
    }

    fn raw_insert(
        &mut self,
        pos: TextPosition,
        text: &str,
        listener: &mut dyn EditListener,
    ) -> Result<TextPosition> {
        let byte = self.check_position(pos)?;
        if text.is_empty() {
            return Ok(pos);
        }
        let revision = self.next_revision();
        let segments: Vec<(&str, Terminator)> = LineSplitter::new(text).collect();

        let line = &mut self.lines[pos.line];
        let tail = line.text.split_off(byte);
        let tail_eol = line.eol;
        let converted_ghost = Self::touch(line, revision);

        let (first, first_eol) = segments[0];
        line.text.push_str(first);

        let end = if segments.len() == 1 {
            line.text.push_str(&tail);
            TextPosition::new(pos.line, pos.column + first.chars().count())
        } else {
            line.eol = first_eol;

            let last_index = segments.len() - 1;
            let mut new_lines: Vec<Line> = segments[1..last_index]
                .iter()
                .map(|&(content, eol)| {
                    let mut line = Line::new(content, eol);
                    line.revision = revision;
                    line
                })
                .collect();

            let (last, _) = segments[last_index];
            let mut last_line = Line::new(format!("{}{}", last, tail), tail_eol);
            last_line.revision = revision;
            new_lines.push(last_line);

            self.lines.splice(pos.line + 1..pos.line + 1, new_lines);
            TextPosition::new(pos.line + last_index, last.chars().count())
        };

        if converted_ghost {
            self.repair_terminators();
        }
        self.modified = true;
        listener.on_edit(self.pane, &EditEvent::Inserted { start: pos, end });
        Ok(end)
    }

    fn raw_delete(
        &mut self,
        start: TextPosition,
        end: TextPosition,
        listener: &mut dyn EditListener,
    ) -> Result<String> {
        let (start_byte, end_byte) = self.check_range(start, end)?;
        if start == end {
            return Ok(String::new());
        }

        listener.on_edit(self.pane, &EditEvent::BeforeDelete { start, end });
        let removed = self.get_text(start, end)?;
        let revision = self.next_revision();

        let converted_ghost = if start.line == end.line {
            let line = &mut self.lines[start.line];
            line.text.replace_range(start_byte..end_byte, "");
            Self::touch(line, revision)
        } else {
            let end_line = &self.lines[end.line];
            let tail = end_line.text[end_byte..].to_string();
            let tail_eol = end_line.eol;
            let tail_flags = end_line.flags;
            let tail_revision = end_line.revision;
            // 行頭から行頭までの削除は残る行の内容を変えない
            let whole_lines = start.column == 0 && end.column == 0;

            self.lines.drain(start.line + 1..=end.line);
            let line = &mut self.lines[start.line];
            line.text.truncate(start_byte);
            line.text.push_str(&tail);
            line.eol = tail_eol;

            if whole_lines {
                line.flags = tail_flags;
                line.revision = tail_revision;
                false
            } else {
                if start.column == 0 {
                    line.flags = tail_flags;
                }
                Self::touch(line, revision)
            }
        };

        if converted_ghost {
            self.repair_terminators();
        }
        self.modified = true;
        listener.on_edit(self.pane, &EditEvent::Deleted { start, end });
        Ok(removed)
    }
}
