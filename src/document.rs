//! マージ文書
//!
//! 2〜3ペインのテキストバッファ、同期ポイント、ペインをまたぐ undo の
//! 対応表、共有の展開/圧縮情報をまとめて所有する。

use crate::buffer::{EditAction, EditEvent, EditListener, LineFlags, TextBuffer, TextPosition};
use crate::config::Options;
use crate::error::{BufferError, FileError, Result};
use crate::file::encoding::FileTextEncoding;
use crate::file::line_ending::EolStyle;
use crate::file::loader::{FileLoader, LoadOutcome};
use crate::file::saver::{FileSaver, SaveOutcome, SaveRequest};
use crate::file::transform::{FileTransform, PackingInfo};
use crate::sync_point::{SyncPoint, SyncPointList};
use std::path::{Path, PathBuf};

/// 対応できるペイン数
pub const MIN_PANES: usize = 2;
pub const MAX_PANES: usize = 3;

/// undo グループを作ったペインの記録
///
/// 文書全体の undo は `current` の直前のペインを戻す。
#[derive(Debug, Clone, Default)]
pub struct UndoTargets {
    targets: Vec<usize>,
    current: usize,
}

impl UndoTargets {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新しいグループ: やり直し分を捨ててペインを追加
    pub fn record_group(&mut self, pane: usize) {
        self.targets.truncate(self.current);
        self.targets.push(pane);
        self.current = self.targets.len();
    }

    /// 次に undo するペインを返して位置を戻す
    pub fn step_back(&mut self) -> Option<usize> {
        if self.current == 0 {
            return None;
        }
        self.current -= 1;
        Some(self.targets[self.current])
    }

    /// 次に redo するペインを返して位置を進める
    pub fn step_forward(&mut self) -> Option<usize> {
        let pane = *self.targets.get(self.current)?;
        self.current += 1;
        Some(pane)
    }

    pub fn can_undo(&self) -> bool {
        self.current > 0
    }

    pub fn can_redo(&self) -> bool {
        self.current < self.targets.len()
    }

    pub fn targets(&self) -> &[usize] {
        &self.targets
    }

    pub fn position(&self) -> usize {
        self.current
    }

    pub fn clear(&mut self) {
        self.targets.clear();
        self.current = 0;
    }
}

/// 編集通知を同期ポイントと undo 対応表へ反映する
struct DocumentHooks<'a> {
    sync_points: &'a mut SyncPointList,
    undo_targets: Option<&'a mut UndoTargets>,
}

impl EditListener for DocumentHooks<'_> {
    fn on_edit(&mut self, pane: usize, event: &EditEvent) {
        match event {
            EditEvent::GroupBegin => {
                if let Some(targets) = self.undo_targets.as_deref_mut() {
                    targets.record_group(pane);
                }
            }
            other => self.sync_points.apply_edit(pane, other),
        }
    }
}

/// 差分エンジンからの注釈
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    /// 行にフラグを立てる
    SetFlags {
        pane: usize,
        line: usize,
        flags: LineFlags,
    },
    /// `at` の前にゴースト行を挿入する
    InsertGhostLines { pane: usize, at: usize, count: usize },
}

/// 差分エンジン
///
/// 再比較の準備が済んだバッファを受け取り、順に適用する注釈を返す。
pub trait DiffAnnotator {
    fn annotate(&mut self, buffers: &[TextBuffer]) -> Vec<Annotation>;
}

/// マージ文書
#[derive(Debug)]
pub struct MergeDocument {
    buffers: Vec<TextBuffer>,
    sync_points: SyncPointList,
    undo_targets: UndoTargets,
    packing: PackingInfo,
    options: Options,
}

impl MergeDocument {
    pub fn new(panes: usize, options: Options) -> Result<Self> {
        if !(MIN_PANES..=MAX_PANES).contains(&panes) {
            return Err(BufferError::UnsupportedPaneCount { count: panes }.into());
        }
        Ok(Self {
            buffers: (0..panes).map(TextBuffer::new).collect(),
            sync_points: SyncPointList::new(panes),
            undo_targets: UndoTargets::new(),
            packing: PackingInfo::default(),
            options,
        })
    }

    pub fn pane_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn buffers(&self) -> &[TextBuffer] {
        &self.buffers
    }

    pub fn buffer(&self, pane: usize) -> Result<&TextBuffer> {
        self.check_pane(pane)?;
        Ok(&self.buffers[pane])
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn packing(&self) -> &PackingInfo {
        &self.packing
    }

    pub fn set_packing(&mut self, packing: PackingInfo) {
        self.packing = packing;
    }

    pub fn undo_targets(&self) -> &UndoTargets {
        &self.undo_targets
    }

    fn check_pane(&self, pane: usize) -> Result<()> {
        if pane < self.buffers.len() {
            Ok(())
        } else {
            Err(BufferError::InvalidPane {
                pane,
                count: self.buffers.len(),
            }
            .into())
        }
    }

    /// 編集用のリスナーと対象バッファを取り出す
    fn split_for_edit(&mut self, pane: usize) -> (&mut TextBuffer, DocumentHooks<'_>) {
        let Self {
            buffers,
            sync_points,
            undo_targets,
            ..
        } = self;
        (
            &mut buffers[pane],
            DocumentHooks {
                sync_points,
                undo_targets: Some(undo_targets),
            },
        )
    }

    // ---- 読み込み・保存 ----

    /// ペインにファイルを読み込む
    ///
    /// `hint` が None なら設定の既定コードページを使う。
    pub fn load_pane(
        &mut self,
        pane: usize,
        path: &Path,
        transform: &dyn FileTransform,
        eol_style: EolStyle,
        hint: Option<FileTextEncoding>,
    ) -> Result<LoadOutcome> {
        self.check_pane(pane)?;
        let hint = hint.unwrap_or_else(|| FileTextEncoding::with_codepage(self.options.default_codepage));
        let loader = FileLoader::new(transform, &self.options);
        loader.load(&mut self.buffers[pane], path, &mut self.packing, eol_style, &hint)
    }

    /// ペインを空の新規文書にする
    pub fn init_new_pane(&mut self, pane: usize) -> Result<()> {
        self.check_pane(pane)?;
        self.buffers[pane].init_new()?;
        if let Ok(dir) = self.options.resolve_temp_dir() {
            self.buffers[pane].set_temp_dir(dir);
        }
        Ok(())
    }

    /// ペインをユーザーファイルとして保存する
    pub fn save_pane(
        &mut self,
        pane: usize,
        path: &Path,
        eol_style: EolStyle,
        transform: Option<&dyn FileTransform>,
    ) -> Result<SaveOutcome> {
        self.check_pane(pane)?;
        let mut request = SaveRequest::new(path).with_eol(eol_style);
        if let Some(transform) = transform {
            request = request.with_transform(transform, &self.packing);
        }
        FileSaver::new(&self.options).save(&mut self.buffers[pane], &request)
    }

    /// 差分エンジン用に全ペインを `dir` へ一時保存し、パスを返す
    pub fn save_temp_files(&mut self, dir: &Path) -> Result<Vec<PathBuf>> {
        let saver = FileSaver::new(&self.options);
        let mut paths = Vec::with_capacity(self.buffers.len());
        for buffer in &mut self.buffers {
            let path = dir.join(format!("pane{}.txt", buffer.pane()));
            let request = SaveRequest::new(&path).temp_file().keep_modified();
            let outcome = saver.save(buffer, &request)?;
            if !outcome.is_done() {
                return Err(FileError::Io {
                    message: outcome.error.unwrap_or_else(|| path.display().to_string()),
                }
                .into());
            }
            paths.push(path);
        }
        Ok(paths)
    }

    pub fn is_modified(&self) -> bool {
        self.buffers.iter().any(TextBuffer::is_modified)
    }

    // ---- 編集 ----

    pub fn insert_text(
        &mut self,
        pane: usize,
        pos: TextPosition,
        text: &str,
        action: EditAction,
    ) -> Result<TextPosition> {
        self.check_pane(pane)?;
        let (buffer, mut hooks) = self.split_for_edit(pane);
        Ok(buffer.insert_text(pos, text, action, &mut hooks)?)
    }

    pub fn delete_text(
        &mut self,
        pane: usize,
        start: TextPosition,
        end: TextPosition,
        action: EditAction,
    ) -> Result<String> {
        self.check_pane(pane)?;
        let (buffer, mut hooks) = self.split_for_edit(pane);
        Ok(buffer.delete_text(start, end, action, &mut hooks)?)
    }

    pub fn begin_undo_group(&mut self, pane: usize) -> Result<()> {
        self.check_pane(pane)?;
        self.buffers[pane].begin_undo_group();
        Ok(())
    }

    pub fn flush_undo_group(&mut self, pane: usize) -> Result<()> {
        self.check_pane(pane)?;
        self.buffers[pane].flush_undo_group();
        Ok(())
    }

    /// `source` の `begin..=end` 行を `target` へ複写する（1回の undo で戻る）
    pub fn copy_lines(&mut self, source: usize, target: usize, begin: usize, end: usize) -> Result<()> {
        self.check_pane(source)?;
        self.check_pane(target)?;
        if source == target {
            return Err(BufferError::InvalidPane {
                pane: target,
                count: self.buffers.len(),
            }
            .into());
        }

        let Self {
            buffers,
            sync_points,
            undo_targets,
            ..
        } = self;
        let (src, dst) = if source < target {
            let (head, tail) = buffers.split_at_mut(target);
            (&head[source], &mut tail[0])
        } else {
            let (head, tail) = buffers.split_at_mut(source);
            (&tail[0], &mut head[target])
        };
        let mut hooks = DocumentHooks {
            sync_points,
            undo_targets: Some(undo_targets),
        };

        log::debug!("copy lines {}..={} from pane {} to pane {}", begin, end, source, target);
        dst.begin_undo_group();
        let result = dst.replace_full_lines(src, begin, end, EditAction::Merge, &mut hooks);
        dst.flush_undo_group();
        Ok(result?)
    }

    /// 最後に編集されたペインのグループを取り消す
    pub fn undo(&mut self) -> Result<bool> {
        let Some(pane) = self.undo_targets.step_back() else {
            return Ok(false);
        };
        let mut hooks = DocumentHooks {
            sync_points: &mut self.sync_points,
            undo_targets: None,
        };
        let result = self.buffers[pane].undo(&mut hooks);
        if !matches!(result, Ok(true)) {
            self.undo_targets.step_forward();
        }
        Ok(result?)
    }

    /// 取り消したグループをやり直す
    pub fn redo(&mut self) -> Result<bool> {
        let Some(pane) = self.undo_targets.step_forward() else {
            return Ok(false);
        };
        let mut hooks = DocumentHooks {
            sync_points: &mut self.sync_points,
            undo_targets: None,
        };
        let result = self.buffers[pane].redo(&mut hooks);
        if !matches!(result, Ok(true)) {
            self.undo_targets.step_back();
        }
        Ok(result?)
    }

    pub fn can_undo(&self) -> bool {
        self.undo_targets.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo_targets.can_redo()
    }

    // ---- 再比較 ----

    /// ゴースト行と比較結果を消し、差分エンジンの注釈を適用する
    pub fn rescan(&mut self, annotator: &mut dyn DiffAnnotator) -> Result<()> {
        for buffer in &mut self.buffers {
            let mut hooks = DocumentHooks {
                sync_points: &mut self.sync_points,
                undo_targets: None,
            };
            buffer.prepare_for_rescan(&mut hooks);
        }

        let annotations = annotator.annotate(&self.buffers);
        log::debug!("applying {} annotation(s)", annotations.len());
        for annotation in annotations {
            match annotation {
                Annotation::SetFlags { pane, line, flags } => {
                    self.check_pane(pane)?;
                    self.buffers[pane].set_line_flag(line, flags, true)?;
                }
                Annotation::InsertGhostLines { pane, at, count } => {
                    self.check_pane(pane)?;
                    let mut hooks = DocumentHooks {
                        sync_points: &mut self.sync_points,
                        undo_targets: None,
                    };
                    self.buffers[pane].insert_ghost_lines(at, count, &mut hooks)?;
                }
            }
        }
        Ok(())
    }

    // ---- 同期ポイント ----

    /// 同期ポイントを追加する（ペインごとの行番号）
    pub fn add_sync_point(&mut self, anchors: Vec<usize>) -> Result<usize> {
        let line_counts: Vec<usize> = self.buffers.iter().map(TextBuffer::line_count).collect();
        Ok(self.sync_points.add(anchors, &line_counts)?)
    }

    pub fn delete_sync_point(&mut self, pane: usize, line: usize) -> bool {
        self.sync_points.delete_sync_point(pane, line)
    }

    pub fn clear_sync_points(&mut self) {
        self.sync_points.clear();
    }

    pub fn sync_points(&self) -> &[SyncPoint] {
        self.sync_points.sync_points()
    }
}
