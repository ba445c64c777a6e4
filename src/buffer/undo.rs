//! 編集履歴
//!
//! 記録の列とカーソル位置で undo/redo を管理する。グループの先頭記録に
//! `begin_group` を立て、undo/redo はグループ単位で行う。

use super::TextPosition;

/// 編集操作の種別（履歴表示用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditAction {
    #[default]
    Unknown,
    Typing,
    Paste,
    Delete,
    /// ペイン間のマージ
    Merge,
    Replace,
}

/// 履歴操作の最小単位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoKind {
    Insert,
    Delete,
}

/// 履歴エントリ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoRecord {
    pub kind: UndoKind,
    pub start: TextPosition,
    /// 挿入後の終端、または削除前の終端
    pub end: TextPosition,
    pub text: String,
    pub action: EditAction,
    /// グループ先頭
    pub begin_group: bool,
}

impl UndoRecord {
    pub fn insert(start: TextPosition, end: TextPosition, text: &str, action: EditAction) -> Self {
        Self {
            kind: UndoKind::Insert,
            start,
            end,
            text: text.to_string(),
            action,
            begin_group: false,
        }
    }

    pub fn delete(start: TextPosition, end: TextPosition, text: String, action: EditAction) -> Self {
        Self {
            kind: UndoKind::Delete,
            start,
            end,
            text,
            action,
            begin_group: false,
        }
    }
}

/// 編集履歴
#[derive(Debug, Clone, Default)]
pub struct UndoLog {
    records: Vec<UndoRecord>,
    /// これより前が undo 可能、以降が redo 可能
    position: usize,
    /// 最後に保存した時点の位置（到達不能になったら None）
    sync_position: Option<usize>,
    in_group: bool,
    group_pending: bool,
}

impl UndoLog {
    pub fn new() -> Self {
        Self {
            sync_position: Some(0),
            ..Self::default()
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn sync_position(&self) -> Option<usize> {
        self.sync_position
    }

    pub fn records(&self) -> &[UndoRecord] {
        &self.records
    }

    /// 現在位置を保存済みとして記録
    pub fn mark_synced(&mut self) {
        self.sync_position = Some(self.position);
    }

    pub fn is_at_sync_position(&self) -> bool {
        self.sync_position == Some(self.position)
    }

    pub fn can_undo(&self) -> bool {
        self.position > 0
    }

    pub fn can_redo(&self) -> bool {
        self.position < self.records.len()
    }

    pub fn in_group(&self) -> bool {
        self.in_group
    }

    /// グループ開始（次に追加する記録がグループ先頭になる）
    pub fn begin_group(&mut self) {
        self.in_group = true;
        self.group_pending = true;
    }

    /// グループ終了
    pub fn flush_group(&mut self) {
        self.in_group = false;
        self.group_pending = false;
    }

    /// 記録を追加する。新しいグループを開始した場合は true
    pub fn push(&mut self, mut record: UndoRecord) -> bool {
        // redo 履歴は破棄
        self.records.truncate(self.position);
        if matches!(self.sync_position, Some(sync) if sync > self.position) {
            self.sync_position = None;
        }

        let begins = !self.in_group || self.group_pending;
        record.begin_group = begins;
        self.group_pending = false;

        self.records.push(record);
        self.position = self.records.len();
        begins
    }

    /// undo するグループを新しい順に取り出し、位置を戻す
    pub fn take_undo_group(&mut self) -> Vec<UndoRecord> {
        let mut group = Vec::new();
        while self.position > 0 {
            self.position -= 1;
            let record = self.records[self.position].clone();
            let begins = record.begin_group;
            group.push(record);
            if begins {
                break;
            }
        }
        group
    }

    /// redo するグループを古い順に取り出し、位置を進める
    pub fn take_redo_group(&mut self) -> Vec<UndoRecord> {
        let mut group = Vec::new();
        while self.position < self.records.len() {
            let record = &self.records[self.position];
            if !group.is_empty() && record.begin_group {
                break;
            }
            group.push(record.clone());
            self.position += 1;
        }
        group
    }
}
