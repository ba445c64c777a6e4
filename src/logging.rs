//! ロギングシステム
//!
//! `log` ファサードのバックエンド。stderr と任意のファイルへ
//! `LEVEL: message` 形式で出力する。

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// ロガー
#[derive(Debug, Clone)]
pub struct Logger {
    level: LevelFilter,
    output_stderr: bool,
    output_file: Option<PathBuf>,
}

impl Logger {
    /// デフォルト構築
    pub fn new(level: LevelFilter) -> Self {
        Self {
            level,
            output_stderr: true,
            output_file: None,
        }
    }

    /// 開発者向けロガー
    pub fn for_development() -> Self {
        Self::new(LevelFilter::Debug)
    }

    /// ログレベルを取得
    pub fn level(&self) -> LevelFilter {
        self.level
    }

    /// ログレベルを変更
    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    /// ファイル出力を設定
    pub fn with_file_output<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output_file = Some(path.into());
        self
    }

    /// 標準エラー出力を無効化（テスト向け）
    pub fn without_stderr(mut self) -> Self {
        self.output_stderr = false;
        self
    }

    fn tag(level: Level) -> &'static str {
        match level {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARNING",
            Level::Error => "ERROR",
        }
    }

    fn format(record: &Record) -> String {
        format!("{}: {} [{}]", Self::tag(record.level()), record.args(), record.target())
    }

    fn write_line(&self, message: &str) {
        if self.output_stderr {
            eprintln!("{}", message);
        }

        if let Some(path) = &self.output_file {
            if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
                let _ = writeln!(file, "{}", message);
            }
        }
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.write_line(&Self::format(record));
        }
    }

    fn flush(&self) {}
}

/// グローバルロガーを登録する
///
/// 既に登録済みの場合は何もしない（テストから複数回呼ばれる想定）。
pub fn init(logger: Logger) {
    let level = logger.level();
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(level);
    }
}

/// 環境変数 `ALTRE_MERGE_LOG` からレベルを決めて登録する
pub fn init_from_env() {
    let level = std::env::var("ALTRE_MERGE_LOG")
        .ok()
        .and_then(|value| value.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Warn);
    init(Logger::new(level));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logger_respects_log_level() {
        let logger = Logger::for_development().without_stderr();
        let debug = Metadata::builder().level(Level::Debug).build();
        let trace = Metadata::builder().level(Level::Trace).build();
        assert!(logger.enabled(&debug));
        assert!(!logger.enabled(&trace));

        let warn_logger = Logger::for_development()
            .with_level(LevelFilter::Warn)
            .without_stderr();
        assert!(!warn_logger.enabled(&debug));
        assert!(warn_logger.enabled(&Metadata::builder().level(Level::Error).build()));
    }

    #[test]
    fn init_registers_logger_once() {
        init(Logger::for_development().without_stderr());
        init(Logger::new(LevelFilter::Error).without_stderr());
        assert_eq!(log::max_level(), LevelFilter::Debug);
    }

    #[test]
    fn logger_appends_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merge.log");
        let logger = Logger::for_development()
            .without_stderr()
            .with_file_output(&path);

        logger.log(
            &Record::builder()
                .args(format_args!("pack failed"))
                .level(Level::Error)
                .target("altre_merge::file::saver")
                .build(),
        );

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("ERROR: pack failed"));
    }
}
