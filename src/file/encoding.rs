//! 文字エンコーディング検出・変換
//!
//! BOM・呼び出し側のヒント・コードページからファイルの符号化方式を決め、
//! 読み込み時のデコードと保存時の再エンコードを行う。

use crate::config::CodepageDetectMode;
use encoding_rs::Encoding;

/// UTF-8 のコードページ番号
pub const CP_UTF8: u32 = 65001;
/// UTF-16LE のコードページ番号
pub const CP_UTF16LE: u32 = 1200;
/// UTF-16BE のコードページ番号
pub const CP_UTF16BE: u32 = 1201;

const BOM_UTF8: &[u8] = &[0xEF, 0xBB, 0xBF];
const BOM_UTF16LE: &[u8] = &[0xFF, 0xFE];
const BOM_UTF16BE: &[u8] = &[0xFE, 0xFF];

/// Unicode変換方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnicodeTransform {
    /// 8bitコードページ
    #[default]
    None,
    Utf8,
    Ucs2Le,
    Ucs2Be,
}

/// ファイルの符号化方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTextEncoding {
    pub unicoding: UnicodeTransform,
    pub bom: bool,
    pub codepage: u32,
}

impl Default for FileTextEncoding {
    fn default() -> Self {
        Self::with_codepage(crate::config::defaults::CODEPAGE)
    }
}

impl FileTextEncoding {
    /// 8bitコードページ指定
    pub fn with_codepage(codepage: u32) -> Self {
        Self {
            unicoding: UnicodeTransform::None,
            bom: false,
            codepage,
        }
    }

    /// UTF-8（BOM有無指定）
    pub fn utf8(bom: bool) -> Self {
        Self {
            unicoding: UnicodeTransform::Utf8,
            bom,
            codepage: CP_UTF8,
        }
    }

    /// UTF-16（BOM付き）
    pub fn utf16(transform: UnicodeTransform) -> Self {
        let codepage = match transform {
            UnicodeTransform::Ucs2Be => CP_UTF16BE,
            _ => CP_UTF16LE,
        };
        Self {
            unicoding: transform,
            bom: true,
            codepage,
        }
    }

    pub fn is_unicode(&self) -> bool {
        self.unicoding != UnicodeTransform::None
    }

    /// 保存時に書き出すBOM
    pub fn bom_bytes(&self) -> &'static [u8] {
        if !self.bom {
            return &[];
        }
        match self.unicoding {
            UnicodeTransform::Utf8 => BOM_UTF8,
            UnicodeTransform::Ucs2Le => BOM_UTF16LE,
            UnicodeTransform::Ucs2Be => BOM_UTF16BE,
            UnicodeTransform::None => &[],
        }
    }

    /// 表示用の名前
    pub fn name(&self) -> String {
        let base = match self.unicoding {
            UnicodeTransform::Utf8 => "UTF-8".to_string(),
            UnicodeTransform::Ucs2Le => "UCS-2 LE".to_string(),
            UnicodeTransform::Ucs2Be => "UCS-2 BE".to_string(),
            UnicodeTransform::None => format!("CP{} ({})", self.codepage, encoding_for_codepage(self.codepage).name()),
        };
        if self.bom {
            format!("{} BOM", base)
        } else {
            base
        }
    }
}

/// BOMを検出して (変換方式, BOM長) を返す
pub fn detect_bom(bytes: &[u8]) -> Option<(UnicodeTransform, usize)> {
    if bytes.starts_with(BOM_UTF8) {
        Some((UnicodeTransform::Utf8, BOM_UTF8.len()))
    } else if bytes.starts_with(BOM_UTF16LE) {
        Some((UnicodeTransform::Ucs2Le, BOM_UTF16LE.len()))
    } else if bytes.starts_with(BOM_UTF16BE) {
        Some((UnicodeTransform::Ucs2Be, BOM_UTF16BE.len()))
    } else {
        None
    }
}

fn from_bom(transform: UnicodeTransform) -> FileTextEncoding {
    match transform {
        UnicodeTransform::Utf8 => FileTextEncoding::utf8(true),
        other => FileTextEncoding::utf16(other),
    }
}

/// BOMとヒントから符号化方式を決める
///
/// BOMがあればヒントに関係なくファイル側を採用する。BOMが無く、
/// ヒントがUnicodeを強制していなければヒントのコードページを使う。
pub fn detect_encoding(bytes: &[u8], hint: &FileTextEncoding) -> FileTextEncoding {
    if let Some((transform, _)) = detect_bom(bytes) {
        return from_bom(transform);
    }

    if hint.is_unicode() {
        let codepage = match hint.unicoding {
            UnicodeTransform::Utf8 => CP_UTF8,
            UnicodeTransform::Ucs2Le => CP_UTF16LE,
            UnicodeTransform::Ucs2Be => CP_UTF16BE,
            UnicodeTransform::None => hint.codepage,
        };
        return FileTextEncoding {
            unicoding: hint.unicoding,
            bom: false,
            codepage,
        };
    }

    FileTextEncoding::with_codepage(hint.codepage)
}

/// ファイル内容からコードページを推測する
pub fn guess_encoding(
    bytes: &[u8],
    mode: CodepageDetectMode,
    fallback_codepage: u32,
) -> FileTextEncoding {
    if let Some((transform, _)) = detect_bom(bytes) {
        return from_bom(transform);
    }

    match mode {
        CodepageDetectMode::Heuristic if !bytes.is_ascii() && std::str::from_utf8(bytes).is_ok() => {
            FileTextEncoding::utf8(false)
        }
        _ => FileTextEncoding::with_codepage(fallback_codepage),
    }
}

/// コードページ番号から `encoding_rs` のエンコーディングを引く
pub fn encoding_for_codepage(codepage: u32) -> &'static Encoding {
    match codepage {
        CP_UTF8 => encoding_rs::UTF_8,
        874 => encoding_rs::WINDOWS_874,
        932 => encoding_rs::SHIFT_JIS,
        936 => encoding_rs::GBK,
        949 => encoding_rs::EUC_KR,
        950 => encoding_rs::BIG5,
        866 => encoding_rs::IBM866,
        1250 => encoding_rs::WINDOWS_1250,
        1251 => encoding_rs::WINDOWS_1251,
        1252 | 28591 => encoding_rs::WINDOWS_1252,
        1253 => encoding_rs::WINDOWS_1253,
        1254 | 28599 => encoding_rs::WINDOWS_1254,
        1255 => encoding_rs::WINDOWS_1255,
        1256 => encoding_rs::WINDOWS_1256,
        1257 => encoding_rs::WINDOWS_1257,
        1258 => encoding_rs::WINDOWS_1258,
        10000 => encoding_rs::MACINTOSH,
        20866 => encoding_rs::KOI8_R,
        21866 => encoding_rs::KOI8_U,
        28592 => encoding_rs::ISO_8859_2,
        28593 => encoding_rs::ISO_8859_3,
        28594 => encoding_rs::ISO_8859_4,
        28595 => encoding_rs::ISO_8859_5,
        28596 => encoding_rs::ISO_8859_6,
        28597 => encoding_rs::ISO_8859_7,
        28598 => encoding_rs::ISO_8859_8,
        28603 => encoding_rs::ISO_8859_13,
        28605 => encoding_rs::ISO_8859_15,
        20932 | 51932 => encoding_rs::EUC_JP,
        54936 => encoding_rs::GB18030,
        other => {
            log::warn!("unknown code page {}, falling back to windows-1252", other);
            encoding_rs::WINDOWS_1252
        }
    }
}

/// バイナリファイル判定
///
/// UTF-16 以外でNULバイトを含むものはテキストとして扱わない。
pub fn is_binary(bytes: &[u8], encoding: &FileTextEncoding) -> bool {
    match encoding.unicoding {
        UnicodeTransform::Ucs2Le | UnicodeTransform::Ucs2Be => false,
        _ => bytes.contains(&0),
    }
}

/// デコード結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    /// 変換できないバイト列があったか
    pub lossy: bool,
}

/// バイト列を文字列へ変換する（BOMは取り除く）
pub fn decode(bytes: &[u8], encoding: &FileTextEncoding) -> Decoded {
    let skip = match detect_bom(bytes) {
        Some((transform, len)) if encoding.bom && transform == encoding.unicoding => len,
        _ => 0,
    };
    let body = &bytes[skip..];

    let decoder = match encoding.unicoding {
        UnicodeTransform::Utf8 => encoding_rs::UTF_8,
        UnicodeTransform::Ucs2Le => encoding_rs::UTF_16LE,
        UnicodeTransform::Ucs2Be => encoding_rs::UTF_16BE,
        UnicodeTransform::None => encoding_for_codepage(encoding.codepage),
    };

    let (text, lossy) = decoder.decode_without_bom_handling(body);
    if lossy {
        log::warn!("lossy decode using {}", decoder.name());
    }

    Decoded {
        text: text.into_owned(),
        lossy,
    }
}

/// 文字列を保存用のバイト列へ変換する（BOMは含まない）
///
/// 2番目の値は表現できない文字があったかどうか。
pub fn encode(text: &str, encoding: &FileTextEncoding) -> (Vec<u8>, bool) {
    match encoding.unicoding {
        UnicodeTransform::Utf8 => (text.as_bytes().to_vec(), false),
        UnicodeTransform::Ucs2Le => (
            text.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect(),
            false,
        ),
        UnicodeTransform::Ucs2Be => (
            text.encode_utf16().flat_map(|unit| unit.to_be_bytes()).collect(),
            false,
        ),
        UnicodeTransform::None => {
            let (bytes, _, unmappable) = encoding_for_codepage(encoding.codepage).encode(text);
            (bytes.into_owned(), unmappable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bom_overrides_hint() {
        let hint = FileTextEncoding::with_codepage(932);
        let detected = detect_encoding(b"\xEF\xBB\xBFabc", &hint);
        assert_eq!(detected, FileTextEncoding::utf8(true));

        let detected = detect_encoding(b"\xFF\xFEa\x00", &hint);
        assert_eq!(detected.unicoding, UnicodeTransform::Ucs2Le);
        assert!(detected.bom);
    }

    #[test]
    fn test_hint_codepage_without_bom() {
        let hint = FileTextEncoding::with_codepage(1251);
        assert_eq!(detect_encoding(b"plain", &hint), hint);

        let forced = FileTextEncoding::utf8(false);
        assert_eq!(detect_encoding(b"plain", &forced), FileTextEncoding::utf8(false));
    }

    #[test]
    fn test_guess_encoding() {
        let utf8 = "héllo".as_bytes();
        assert_eq!(
            guess_encoding(utf8, CodepageDetectMode::Heuristic, 1252),
            FileTextEncoding::utf8(false)
        );
        assert_eq!(
            guess_encoding(utf8, CodepageDetectMode::None, 1252),
            FileTextEncoding::with_codepage(1252)
        );
        assert_eq!(
            guess_encoding(b"ascii only", CodepageDetectMode::Heuristic, 1252),
            FileTextEncoding::with_codepage(1252)
        );
    }

    #[test]
    fn test_decode_codepage_and_lossy() {
        let latin = decode(b"caf\xE9", &FileTextEncoding::with_codepage(1252));
        assert_eq!(latin.text, "café");
        assert!(!latin.lossy);

        let broken = decode(b"caf\xE9", &FileTextEncoding::utf8(false));
        assert!(broken.lossy);
    }

    #[test]
    fn test_decode_strips_bom() {
        let decoded = decode(b"\xFE\xFF\x00a\x00b", &FileTextEncoding::utf16(UnicodeTransform::Ucs2Be));
        assert_eq!(decoded.text, "ab");
        assert!(!decoded.lossy);
    }

    #[test]
    fn test_encode_reverses_decode() {
        let encodings = [
            FileTextEncoding::with_codepage(1252),
            FileTextEncoding::utf8(false),
            FileTextEncoding::utf16(UnicodeTransform::Ucs2Le),
            FileTextEncoding::utf16(UnicodeTransform::Ucs2Be),
        ];
        for encoding in encodings {
            let (bytes, unmappable) = encode("façade\r\n", &encoding);
            assert!(!unmappable);
            let mut with_bom = encoding.bom_bytes().to_vec();
            with_bom.extend_from_slice(&bytes);
            assert_eq!(decode(&with_bom, &encoding).text, "façade\r\n");
        }
    }

    #[test]
    fn test_binary_detection() {
        assert!(is_binary(b"ab\x00cd", &FileTextEncoding::default()));
        assert!(!is_binary(b"a\x00b\x00", &FileTextEncoding::utf16(UnicodeTransform::Ucs2Le)));
        assert!(!is_binary(b"text", &FileTextEncoding::utf8(false)));
    }
}
