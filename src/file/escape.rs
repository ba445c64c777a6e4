//! 制御文字エスケープ
//!
//! 差分エンジン向け一時ファイルに書く行から、TAB以外の制御文字
//! (0x00-0x1F) を `\x0F` + 16進2桁 + `\` の4文字に置き換える。
//! 実ファイルの保存では使わない。

/// エスケープ開始文字
pub const LEAD_IN: u8 = 0x0F;
/// エスケープ終了文字
pub const LEAD_OUT: u8 = b'\\';

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

fn needs_escape(c: u8) -> bool {
    c & !0x1F == 0 && c != b'\t'
}

/// バイト列をその場でエスケープする
///
/// 先に必要な長さ（1文字につき+3）まで伸ばし、末尾から書き戻す。
/// UTF-8の多バイト文字は0x80以上のバイトだけで構成されるので、
/// 文字列のバイト列にそのまま適用できる。
pub fn escape_control_bytes(buf: &mut Vec<u8>) {
    let escapes = buf.iter().filter(|&&c| needs_escape(c)).count();
    if escapes == 0 {
        return;
    }

    let mut read = buf.len();
    let mut write = read + 3 * escapes;
    buf.resize(write, 0);

    while read > 0 {
        read -= 1;
        let c = buf[read];
        if needs_escape(c) {
            write -= 4;
            // 0x100 | c を16進3桁にした先頭桁を LEAD_IN に置き換えた形
            buf[write] = LEAD_IN;
            buf[write + 1] = HEX_DIGITS[usize::from(c >> 4)];
            buf[write + 2] = HEX_DIGITS[usize::from(c & 0x0F)];
            buf[write + 3] = LEAD_OUT;
        } else {
            write -= 1;
            buf[write] = c;
        }
    }
    debug_assert_eq!(write, 0);
}

/// 1行（改行を含まない）をその場でエスケープする
pub fn escape_control_chars(line: &mut String) {
    if !line.bytes().any(needs_escape) {
        return;
    }
    let mut bytes = std::mem::take(line).into_bytes();
    escape_control_bytes(&mut bytes);
    *line = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    };
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// エスケープを元に戻す
///
/// 形式に合わない `\x0F` はそのまま残す。
pub fn unescape_control_chars(line: &str) -> String {
    let bytes = line.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == LEAD_IN && i + 3 < bytes.len() && bytes[i + 3] == LEAD_OUT {
            if let (Some(high), Some(low)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                let value = (high << 4) | low;
                if needs_escape(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    match String::from_utf8(out) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}
