//! 同期ポイント
//!
//! 各ペインの行を対応付ける行番号の組。ペインごとに行番号が単調非減少に
//! なるよう順序付けて保持し、編集に合わせて削除・移動する。

use crate::buffer::{EditEvent, TextPosition};
use crate::error::SyncPointError;

/// 同期ポイント（ペインごとの行番号）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPoint {
    anchors: Vec<usize>,
}

impl SyncPoint {
    pub fn anchors(&self) -> &[usize] {
        &self.anchors
    }

    pub fn anchor(&self, pane: usize) -> Option<usize> {
        self.anchors.get(pane).copied()
    }

    fn all_le(&self, other: &[usize]) -> bool {
        self.anchors.iter().zip(other).all(|(a, b)| a <= b)
    }

    fn all_ge(&self, other: &[usize]) -> bool {
        self.anchors.iter().zip(other).all(|(a, b)| a >= b)
    }
}

/// 同期ポイントの一覧
#[derive(Debug, Clone, Default)]
pub struct SyncPointList {
    panes: usize,
    points: Vec<SyncPoint>,
}

impl SyncPointList {
    pub fn new(panes: usize) -> Self {
        Self {
            panes,
            points: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SyncPoint> {
        self.points.iter()
    }

    pub fn sync_points(&self) -> &[SyncPoint] {
        &self.points
    }

    /// 同期ポイントを追加し、一覧内の位置を返す
    ///
    /// `line_counts` は各ペインの行数。
    pub fn add(&mut self, anchors: Vec<usize>, line_counts: &[usize]) -> Result<usize, SyncPointError> {
        if anchors.len() != self.panes {
            return Err(SyncPointError::WrongArity {
                expected: self.panes,
                actual: anchors.len(),
            });
        }
        for (pane, (&line, &count)) in anchors.iter().zip(line_counts).enumerate() {
            if line >= count {
                return Err(SyncPointError::OutOfRange { pane, line });
            }
        }

        if let Some(existing) = self.points.iter().position(|p| p.anchors == anchors) {
            return Ok(existing);
        }

        let index = self
            .points
            .iter()
            .position(|p| p.anchors[0] > anchors[0])
            .unwrap_or(self.points.len());

        let before_ok = index == 0 || self.points[index - 1].all_le(&anchors);
        let after_ok = index == self.points.len() || self.points[index].all_ge(&anchors);
        if !(before_ok && after_ok) {
            let pane = self.crossing_pane(index, &anchors);
            return Err(SyncPointError::NotMonotonic { pane });
        }

        self.points.insert(index, SyncPoint { anchors });
        Ok(index)
    }

    fn crossing_pane(&self, index: usize, anchors: &[usize]) -> usize {
        (0..self.panes)
            .find(|&pane| {
                let before = index
                    .checked_sub(1)
                    .map(|i| self.points[i].anchors[pane] > anchors[pane])
                    .unwrap_or(false);
                let after = self
                    .points
                    .get(index)
                    .map(|p| p.anchors[pane] < anchors[pane])
                    .unwrap_or(false);
                before || after
            })
            .unwrap_or(0)
    }

    /// `pane` の `line` にある同期ポイントを削除する
    pub fn delete_sync_point(&mut self, pane: usize, line: usize) -> bool {
        let before = self.points.len();
        self.points.retain(|p| p.anchor(pane) != Some(line));
        before != self.points.len()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// 削除範囲に含まれる同期ポイントを組ごと取り除く（削除の直前に呼ぶ）
    pub fn invalidate_for_delete(&mut self, pane: usize, start: TextPosition, end: TextPosition) {
        let (sl, sc, el) = (start.line, start.column, end.line);
        let before = self.points.len();
        self.points.retain(|p| match p.anchor(pane) {
            Some(a) => !(((sc == 0 && sl == a) || sl < a) && a < el),
            None => true,
        });
        let removed = before - self.points.len();
        if removed > 0 {
            log::debug!("pane {}: removed {} sync point(s)", pane, removed);
        }
    }

    /// 削除後: 削除範囲より後ろの行番号を詰める
    pub fn shift_after_delete(&mut self, pane: usize, start: TextPosition, end: TextPosition) {
        let removed = end.line - start.line;
        if removed == 0 {
            return;
        }
        for point in &mut self.points {
            if let Some(a) = point.anchors.get_mut(pane) {
                if *a >= end.line {
                    *a -= removed;
                }
            }
        }
    }

    /// 挿入後: 挿入位置より後ろの行番号をずらす
    pub fn shift_after_insert(&mut self, pane: usize, start: TextPosition, end: TextPosition) {
        let added = end.line - start.line;
        if added == 0 {
            return;
        }
        for point in &mut self.points {
            if let Some(a) = point.anchors.get_mut(pane) {
                if *a > start.line || (*a == start.line && start.column == 0) {
                    *a += added;
                }
            }
        }
    }

    /// ゴースト行の除去後: 後ろの行番号を詰める
    ///
    /// ゴースト行上の行番号は次の実在行を指すようになる。同期ポイントは消さない。
    pub fn shift_after_ghost_removal(&mut self, pane: usize, line: usize, line_count: usize) {
        let last = line_count.saturating_sub(1);
        for point in &mut self.points {
            if let Some(a) = point.anchors.get_mut(pane) {
                if *a > line {
                    *a -= 1;
                }
                *a = (*a).min(last);
            }
        }
    }

    /// 編集通知を反映する
    pub fn apply_edit(&mut self, pane: usize, event: &EditEvent) {
        match *event {
            EditEvent::BeforeDelete { start, end } => self.invalidate_for_delete(pane, start, end),
            EditEvent::Deleted { start, end } => self.shift_after_delete(pane, start, end),
            EditEvent::Inserted { start, end } => self.shift_after_insert(pane, start, end),
            EditEvent::GhostLineRemoved { line, line_count } => {
                self.shift_after_ghost_removal(pane, line, line_count)
            }
            EditEvent::GroupBegin => {}
        }
    }
}
