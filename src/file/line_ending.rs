//! 改行コード判定
//!
//! 読み込み中に数えた改行コードの統計から、ファイルの改行スタイルを決める。

/// 行末記号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Terminator {
    /// 改行なし（最終行）
    #[default]
    None,
    /// `\r\n`
    CrLf,
    /// `\n`
    Lf,
    /// `\r`
    Cr,
}

impl Terminator {
    pub fn as_str(self) -> &'static str {
        match self {
            Terminator::None => "",
            Terminator::CrLf => "\r\n",
            Terminator::Lf => "\n",
            Terminator::Cr => "\r",
        }
    }

    pub fn is_none(self) -> bool {
        self == Terminator::None
    }

    /// 文字数
    pub fn len(self) -> usize {
        self.as_str().len()
    }

    pub fn is_empty(self) -> bool {
        self.is_none()
    }
}

/// 改行スタイル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EolStyle {
    /// 自動（読み込み時に判定、保存時はバッファ既定値か行ごとの改行）
    #[default]
    Automatic,
    /// `\r\n`
    Dos,
    /// `\n`
    Unix,
    /// `\r`
    Mac,
    /// 混在
    Mixed,
}

impl EolStyle {
    /// スタイルに対応する行末記号（混在・自動は行ごとの改行を使う）
    pub fn terminator(self) -> Option<Terminator> {
        match self {
            EolStyle::Dos => Some(Terminator::CrLf),
            EolStyle::Unix => Some(Terminator::Lf),
            EolStyle::Mac => Some(Terminator::Cr),
            EolStyle::Automatic | EolStyle::Mixed => None,
        }
    }

    /// プラットフォーム既定
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            EolStyle::Dos
        } else {
            EolStyle::Unix
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EolStyle::Automatic => "auto",
            EolStyle::Dos => "dos",
            EolStyle::Unix => "unix",
            EolStyle::Mac => "mac",
            EolStyle::Mixed => "mixed",
        }
    }
}

impl std::str::FromStr for EolStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" | "automatic" => Ok(EolStyle::Automatic),
            "dos" | "crlf" => Ok(EolStyle::Dos),
            "unix" | "lf" => Ok(EolStyle::Unix),
            "mac" | "cr" => Ok(EolStyle::Mac),
            "mixed" => Ok(EolStyle::Mixed),
            _ => Err(format!("Unknown EOL style: {}", s)),
        }
    }
}

/// 読み込み時の統計
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextStats {
    pub crlfs: usize,
    pub lfs: usize,
    pub crs: usize,
}

impl TextStats {
    pub fn record(&mut self, terminator: Terminator) {
        match terminator {
            Terminator::CrLf => self.crlfs += 1,
            Terminator::Lf => self.lfs += 1,
            Terminator::Cr => self.crs += 1,
            Terminator::None => {}
        }
    }

    /// 改行の種類が高々1つか
    pub fn is_pure(&self) -> bool {
        [self.crlfs, self.crs, self.lfs]
            .iter()
            .filter(|&&count| count > 0)
            .count()
            <= 1
    }

    /// 最も多い改行スタイル（同数は DOS > Unix > Mac）
    pub fn dominant(&self) -> EolStyle {
        if self.crlfs >= self.lfs {
            if self.crlfs >= self.crs {
                EolStyle::Dos
            } else {
                EolStyle::Mac
            }
        } else if self.lfs >= self.crs {
            EolStyle::Unix
        } else {
            EolStyle::Mac
        }
    }

    /// ファイルの改行スタイル（混在なら Mixed）
    pub fn classify(&self) -> EolStyle {
        if self.is_pure() {
            self.dominant()
        } else {
            EolStyle::Mixed
        }
    }
}

/// 文字列を (行内容, 行末記号) に分割するイテレータ
///
/// 末尾が改行で終わる場合（空文字列を含む）は最後に空の行を1つ返す。
pub struct LineSplitter<'a> {
    rest: Option<&'a str>,
}

impl<'a> LineSplitter<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { rest: Some(text) }
    }
}

impl<'a> Iterator for LineSplitter<'a> {
    type Item = (&'a str, Terminator);

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.rest?;
        match rest.find(|c: char| c == '\r' || c == '\n') {
            Some(idx) => {
                let bytes = rest.as_bytes();
                let (terminator, len) = if bytes[idx] == b'\r' {
                    if bytes.get(idx + 1) == Some(&b'\n') {
                        (Terminator::CrLf, 2)
                    } else {
                        (Terminator::Cr, 1)
                    }
                } else {
                    (Terminator::Lf, 1)
                };
                self.rest = Some(&rest[idx + len..]);
                Some((&rest[..idx], terminator))
            }
            None => {
                self.rest = None;
                Some((rest, Terminator::None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(crlfs: usize, lfs: usize, crs: usize) -> TextStats {
        TextStats { crlfs, lfs, crs }
    }

    #[test]
    fn test_pure_detection() {
        assert!(stats(0, 0, 0).is_pure());
        assert!(stats(3, 0, 0).is_pure());
        assert!(!stats(3, 1, 0).is_pure());
        assert!(!stats(0, 1, 1).is_pure());
    }

    #[test]
    fn test_classify() {
        assert_eq!(stats(2, 0, 0).classify(), EolStyle::Dos);
        assert_eq!(stats(0, 2, 0).classify(), EolStyle::Unix);
        assert_eq!(stats(0, 0, 2).classify(), EolStyle::Mac);
        assert_eq!(stats(1, 1, 0).classify(), EolStyle::Mixed);
        assert_eq!(stats(0, 0, 0).classify(), EolStyle::Dos);
    }

    #[test]
    fn test_dominant_tie_breaking() {
        assert_eq!(stats(2, 2, 0).dominant(), EolStyle::Dos);
        assert_eq!(stats(1, 2, 0).dominant(), EolStyle::Unix);
        assert_eq!(stats(2, 0, 2).dominant(), EolStyle::Dos);
        assert_eq!(stats(0, 2, 2).dominant(), EolStyle::Unix);
        assert_eq!(stats(1, 1, 3).dominant(), EolStyle::Mac);
    }

    #[test]
    fn test_line_splitter() {
        let lines: Vec<_> = LineSplitter::new("a\r\nb\nc\rd").collect();
        assert_eq!(
            lines,
            vec![
                ("a", Terminator::CrLf),
                ("b", Terminator::Lf),
                ("c", Terminator::Cr),
                ("d", Terminator::None),
            ]
        );

        let trailing: Vec<_> = LineSplitter::new("x\n").collect();
        assert_eq!(trailing, vec![("x", Terminator::Lf), ("", Terminator::None)]);

        let empty: Vec<_> = LineSplitter::new("").collect();
        assert_eq!(empty, vec![("", Terminator::None)]);
    }

    #[test]
    fn test_eol_style_parse() {
        assert_eq!("CRLF".parse::<EolStyle>().unwrap(), EolStyle::Dos);
        assert_eq!("unix".parse::<EolStyle>().unwrap(), EolStyle::Unix);
        assert!("weird".parse::<EolStyle>().is_err());
    }
}
