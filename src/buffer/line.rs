//! 行データ

use crate::file::line_ending::Terminator;
use bitflags::bitflags;

bitflags! {
    /// 行ごとの差分/マージ情報
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LineFlags: u32 {
        /// 差分あり
        const DIFF = 0b0000_0001;
        /// 無視できる差分
        const TRIVIAL = 0b0000_0010;
        /// 移動ブロック
        const MOVED = 0b0000_0100;
        /// スナップショットとの差分
        const SNP = 0b0000_1000;
        /// 非表示
        const INVISIBLE = 0b0001_0000;
        /// 位置合わせ用のゴースト行（保存されない）
        const GHOST = 0b0010_0000;
    }
}

impl std::fmt::Debug for LineFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        bitflags::parser::to_writer(self, f)
    }
}

impl LineFlags {
    /// 編集時にクリアするフラグ
    pub const EDIT_CLEARED: LineFlags = LineFlags::DIFF
        .union(LineFlags::TRIVIAL)
        .union(LineFlags::MOVED)
        .union(LineFlags::SNP)
        .union(LineFlags::GHOST);

    /// 再比較前にクリアするフラグ
    pub const RESCAN_CLEARED: LineFlags = LineFlags::INVISIBLE
        .union(LineFlags::DIFF)
        .union(LineFlags::TRIVIAL)
        .union(LineFlags::MOVED)
        .union(LineFlags::SNP);
}

/// 1行
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Line {
    /// 改行を含まない内容
    pub text: String,
    pub eol: Terminator,
    pub flags: LineFlags,
    /// 最後に編集されたリビジョン（0 は読み込み時のまま）
    pub revision: u32,
}

impl Line {
    pub fn new(text: impl Into<String>, eol: Terminator) -> Self {
        Self {
            text: text.into(),
            eol,
            flags: LineFlags::empty(),
            revision: 0,
        }
    }

    pub fn ghost() -> Self {
        Self {
            text: String::new(),
            eol: Terminator::None,
            flags: LineFlags::GHOST,
            revision: 0,
        }
    }

    pub fn is_ghost(&self) -> bool {
        self.flags.contains(LineFlags::GHOST)
    }

    /// 改行を含まない文字数
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// 改行を含む文字数
    pub fn full_char_len(&self) -> usize {
        self.char_len() + self.eol.len()
    }

    /// 文字位置をバイト位置へ変換する（行末を越える場合は None）
    pub fn byte_index(&self, column: usize) -> Option<usize> {
        if column == 0 {
            return Some(0);
        }
        match self.text.char_indices().nth(column) {
            Some((idx, _)) => Some(idx),
            None if self.char_len() == column => Some(self.text.len()),
            None => None,
        }
    }
}
