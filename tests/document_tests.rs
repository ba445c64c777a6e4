//! マージ文書の結合テスト
//!
//! ファイルから読み込んだ複数ペインで、同期ポイント・ペイン間の複写・
//! 文書全体の undo/redo・一時保存を確認する。

use altre_merge::buffer::{EditAction, LineFlags, TextBuffer, TextPosition};
use altre_merge::document::{Annotation, DiffAnnotator, MergeDocument};
use altre_merge::error::{BufferError, MergeError, SyncPointError};
use altre_merge::file::{
    unescape_control_chars, EolStyle, FileTextEncoding, IdentityTransform, LoadResult, SaveResult,
};
use altre_merge::Options;
use std::path::PathBuf;
use tempfile::TempDir;

fn numbered_lines(count: usize) -> String {
    (0..count).map(|i| format!("line {}\n", i)).collect()
}

fn open_document(dir: &TempDir, contents: &[&str]) -> (MergeDocument, Vec<PathBuf>) {
    let options = Options {
        temp_dir: Some(dir.path().to_string_lossy().into_owned()),
        ..Options::default()
    };
    let mut document = MergeDocument::new(contents.len(), options).unwrap();
    let mut paths = Vec::new();
    for (pane, content) in contents.iter().enumerate() {
        let path = dir.path().join(format!("file{}.txt", pane));
        std::fs::write(&path, content).unwrap();
        let outcome = document
            .load_pane(pane, &path, &IdentityTransform, EolStyle::Automatic, None)
            .unwrap();
        assert!(outcome.code == LoadResult::Ok || outcome.code == LoadResult::OkImpure);
        paths.push(path);
    }
    (document, paths)
}

fn pane_text(document: &MergeDocument, pane: usize) -> String {
    let buffer = document.buffer(pane).unwrap();
    buffer
        .get_text_without_ghosts(0, buffer.line_count() - 1)
        .unwrap()
}

#[test]
fn deleting_lines_around_a_sync_point() {
    let dir = TempDir::new().unwrap();
    let text = numbered_lines(10);
    let (mut document, _) = open_document(&dir, &[&text, &text]);
    document.add_sync_point(vec![5, 5]).unwrap();

    // 6〜7行目の削除では残る
    document
        .delete_text(0, TextPosition::new(6, 0), TextPosition::new(7, 0), EditAction::Delete)
        .unwrap();
    assert_eq!(document.sync_points().len(), 1);
    assert_eq!(document.sync_points()[0].anchors(), &[5, 5]);

    // 3〜7行目の削除で組ごと消える
    document
        .delete_text(0, TextPosition::new(3, 0), TextPosition::new(7, 0), EditAction::Delete)
        .unwrap();
    assert!(document.sync_points().is_empty());
}

#[test]
fn sync_points_follow_inserted_lines() {
    let dir = TempDir::new().unwrap();
    let text = numbered_lines(6);
    let (mut document, _) = open_document(&dir, &[&text, &text, &text]);
    document.add_sync_point(vec![4, 4, 4]).unwrap();

    document
        .insert_text(1, TextPosition::new(2, 0), "new\nlines\n", EditAction::Paste)
        .unwrap();
    assert_eq!(document.sync_points()[0].anchors(), &[4, 6, 4]);

    // 取り消すと元の行に戻る
    assert!(document.undo().unwrap());
    assert_eq!(document.sync_points()[0].anchors(), &[4, 4, 4]);
}

#[test]
fn sync_point_validation_errors() {
    let dir = TempDir::new().unwrap();
    let (mut document, _) = open_document(&dir, &["a\nb\nc", "a\nb"]);

    assert!(matches!(
        document.add_sync_point(vec![0]),
        Err(MergeError::SyncPoint(SyncPointError::WrongArity { .. }))
    ));
    assert!(matches!(
        document.add_sync_point(vec![0, 2]),
        Err(MergeError::SyncPoint(SyncPointError::OutOfRange { pane: 1, line: 2 }))
    ));
    document.add_sync_point(vec![1, 1]).unwrap();
    assert!(matches!(
        document.add_sync_point(vec![2, 0]),
        Err(MergeError::SyncPoint(SyncPointError::NotMonotonic { .. }))
    ));
    assert!(document.delete_sync_point(0, 1));
}

#[test]
fn cross_pane_undo_and_redo() {
    let dir = TempDir::new().unwrap();
    let (mut document, _) = open_document(&dir, &["left\n", "right\n"]);

    document
        .insert_text(0, TextPosition::new(0, 4), "!", EditAction::Typing)
        .unwrap();
    document.begin_undo_group(1).unwrap();
    document
        .insert_text(1, TextPosition::new(0, 0), ">", EditAction::Typing)
        .unwrap();
    document
        .insert_text(1, TextPosition::new(0, 6), "<", EditAction::Typing)
        .unwrap();
    document.flush_undo_group(1).unwrap();
    assert_eq!(document.undo_targets().targets(), &[0, 1]);

    assert!(document.undo().unwrap());
    assert_eq!(pane_text(&document, 1), "right\n");
    assert_eq!(pane_text(&document, 0), "left!\n");
    assert!(document.can_redo());

    assert!(document.undo().unwrap());
    assert_eq!(pane_text(&document, 0), "left\n");
    assert!(!document.is_modified());
    assert!(!document.can_undo());

    assert!(document.redo().unwrap());
    assert!(document.redo().unwrap());
    assert_eq!(pane_text(&document, 1), ">right<\n");
    assert!(!document.redo().unwrap());
}

#[test]
fn new_edit_discards_redo_targets() {
    let dir = TempDir::new().unwrap();
    let (mut document, _) = open_document(&dir, &["a", "b"]);
    document
        .insert_text(0, TextPosition::new(0, 0), "1", EditAction::Typing)
        .unwrap();
    document
        .insert_text(1, TextPosition::new(0, 0), "2", EditAction::Typing)
        .unwrap();
    document.undo().unwrap();

    document
        .insert_text(0, TextPosition::new(0, 0), "3", EditAction::Typing)
        .unwrap();
    assert_eq!(document.undo_targets().targets(), &[0, 0]);
    assert!(!document.can_redo());
}

#[test]
fn copy_lines_then_save() {
    let dir = TempDir::new().unwrap();
    let (mut document, paths) = open_document(&dir, &["a\nB\nC\nd\n", "a\nb\nc\nd\n"]);

    document.copy_lines(0, 1, 1, 2).unwrap();
    assert_eq!(pane_text(&document, 1), "a\nB\nC\nd\n");
    assert!(document.is_modified());

    let outcome = document
        .save_pane(1, &paths[1], EolStyle::Automatic, None)
        .unwrap();
    assert_eq!(outcome.code, SaveResult::Done);
    assert!(!document.is_modified());
    assert_eq!(std::fs::read(&paths[1]).unwrap(), b"a\nB\nC\nd\n");
}

#[test]
fn temp_files_escape_control_characters() {
    let dir = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let (mut document, _) = open_document(&dir, &["tab\there\x07\n", "plain\n"]);

    let paths = document.save_temp_files(out.path()).unwrap();
    assert_eq!(paths.len(), 2);

    let written = std::fs::read_to_string(&paths[0]).unwrap();
    assert_eq!(written, "tab\there\x0f07\\\n");
    assert_eq!(unescape_control_chars(written.trim_end_matches('\n')), "tab\there\x07");
}

struct PadShorterPane;

impl DiffAnnotator for PadShorterPane {
    fn annotate(&mut self, buffers: &[TextBuffer]) -> Vec<Annotation> {
        let longest = buffers.iter().map(TextBuffer::line_count).max().unwrap_or(0);
        let mut annotations = Vec::new();
        for (pane, buffer) in buffers.iter().enumerate() {
            let missing = longest - buffer.line_count();
            if missing > 0 {
                annotations.push(Annotation::InsertGhostLines {
                    pane,
                    at: buffer.line_count(),
                    count: missing,
                });
            } else {
                annotations.push(Annotation::SetFlags {
                    pane,
                    line: 0,
                    flags: LineFlags::DIFF,
                });
            }
        }
        annotations
    }
}

#[test]
fn rescan_aligns_panes_and_save_skips_ghosts() {
    let dir = TempDir::new().unwrap();
    let (mut document, paths) = open_document(&dir, &["x\ny\nz", "x"]);

    document.rescan(&mut PadShorterPane).unwrap();
    assert_eq!(document.buffer(1).unwrap().line_count(), 3);
    assert!(document.buffer(1).unwrap().is_ghost(2));
    assert!(document.buffer(0).unwrap().flag_is_set(0, LineFlags::DIFF));

    document.rescan(&mut PadShorterPane).unwrap();
    assert_eq!(document.buffer(1).unwrap().line_count(), 3);

    document
        .save_pane(1, &paths[1], EolStyle::Automatic, None)
        .unwrap();
    assert_eq!(std::fs::read(&paths[1]).unwrap(), b"x");
}

/// 指定したペインの位置にゴースト行を入れる
struct GhostLinesAt(Vec<(usize, usize, usize)>);

impl DiffAnnotator for GhostLinesAt {
    fn annotate(&mut self, _buffers: &[TextBuffer]) -> Vec<Annotation> {
        self.0
            .iter()
            .map(|&(pane, at, count)| Annotation::InsertGhostLines { pane, at, count })
            .collect()
    }
}

#[test]
fn undo_after_rescan_edits_the_same_line() {
    let dir = TempDir::new().unwrap();
    let (mut document, _) = open_document(&dir, &["a\nb\nc", "x\na\nb\nc"]);

    document
        .insert_text(0, TextPosition::new(1, 0), "Z", EditAction::Typing)
        .unwrap();
    document.rescan(&mut GhostLinesAt(vec![(0, 0, 1)])).unwrap();
    assert!(document.buffer(0).unwrap().is_ghost(0));

    assert!(document.undo().unwrap());
    assert_eq!(pane_text(&document, 0), "a\nb\nc");
    assert!(!document.is_modified());

    document.rescan(&mut GhostLinesAt(vec![(0, 1, 2)])).unwrap();
    assert!(document.redo().unwrap());
    assert_eq!(pane_text(&document, 0), "a\nZb\nc");
}

#[test]
fn rescan_keeps_sync_point_on_ghost_line() {
    let dir = TempDir::new().unwrap();
    let (mut document, _) = open_document(&dir, &["a\nc", "a\nb\nc"]);
    let mut annotator = GhostLinesAt(vec![(0, 1, 1)]);

    document.rescan(&mut annotator).unwrap();
    assert!(document.buffer(0).unwrap().is_ghost(1));
    document.add_sync_point(vec![1, 1]).unwrap();

    document.rescan(&mut annotator).unwrap();
    assert_eq!(document.sync_points().len(), 1);
    // ゴースト行の次の実在行 "c" に付いたまま
    assert_eq!(document.sync_points()[0].anchors(), &[2, 1]);
    assert_eq!(document.buffer(0).unwrap().get_line(2), Some("c"));
}

#[test]
fn lossy_pane_is_read_only() {
    let dir = TempDir::new().unwrap();
    let options = Options {
        temp_dir: Some(dir.path().to_string_lossy().into_owned()),
        ..Options::default()
    };
    let mut document = MergeDocument::new(2, options).unwrap();
    let lossy = dir.path().join("latin1.txt");
    let plain = dir.path().join("plain.txt");
    std::fs::write(&lossy, b"caf\xE9\n").unwrap();
    std::fs::write(&plain, b"cafe\n").unwrap();

    let outcome = document
        .load_pane(
            0,
            &lossy,
            &IdentityTransform,
            EolStyle::Automatic,
            Some(FileTextEncoding::utf8(false)),
        )
        .unwrap();
    assert!(outcome.read_only);
    document
        .load_pane(1, &plain, &IdentityTransform, EolStyle::Automatic, None)
        .unwrap();

    assert!(matches!(
        document.insert_text(0, TextPosition::new(0, 0), "X", EditAction::Typing),
        Err(MergeError::Buffer(BufferError::ReadOnly))
    ));
    assert!(matches!(
        document.copy_lines(1, 0, 0, 0),
        Err(MergeError::Buffer(BufferError::ReadOnly))
    ));
    assert!(!document.is_modified());

    let outcome = document
        .save_pane(0, &lossy, EolStyle::Automatic, None)
        .unwrap();
    assert_eq!(outcome.code, SaveResult::Failed);
    assert_eq!(std::fs::read(&lossy).unwrap(), b"caf\xE9\n");

    // 比較用の一時保存はできる
    let out = TempDir::new().unwrap();
    assert_eq!(document.save_temp_files(out.path()).unwrap().len(), 2);
}

#[test]
fn invalid_pane_is_reported() {
    let dir = TempDir::new().unwrap();
    let (mut document, _) = open_document(&dir, &["a", "b"]);
    assert!(matches!(
        document.insert_text(2, TextPosition::new(0, 0), "x", EditAction::Typing),
        Err(MergeError::Buffer(BufferError::InvalidPane { pane: 2, count: 2 }))
    ));
    assert!(matches!(
        document.copy_lines(0, 0, 0, 0),
        Err(MergeError::Buffer(BufferError::InvalidPane { .. }))
    ));
}
