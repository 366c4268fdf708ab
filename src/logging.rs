use crate::config::LoggingSettings;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// ログファイル名のプレフィックス
const LOG_FILE_NAME: &str = "gdpr-ledger.log";

/// ログディレクトリの既定値
const DEFAULT_LOG_DIR: &str = "logs";

/// 出力先とフォーマットを解決済みのログ設定
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// EnvFilter 形式のディレクティブ（例: `info,gdpr_ledger=debug`）
    pub filter: String,
    pub directory: PathBuf,
    pub rotation: LogRotation,
    /// stderr への出力
    pub to_console: bool,
    /// ローテーションファイルへの出力
    pub to_file: bool,
    pub json: bool,
}

/// ログファイルの切り替え単位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Daily,
    Hourly,
    Never,
}

impl LogRotation {
    /// 設定値を解析（不明な値は日次）
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "hourly" => LogRotation::Hourly,
            "never" => LogRotation::Never,
            _ => LogRotation::Daily,
        }
    }

    fn appender(self, directory: &Path) -> rolling::RollingFileAppender {
        match self {
            LogRotation::Daily => rolling::daily(directory, LOG_FILE_NAME),
            LogRotation::Hourly => rolling::hourly(directory, LOG_FILE_NAME),
            LogRotation::Never => rolling::never(directory, LOG_FILE_NAME),
        }
    }
}

impl LogConfig {
    /// 設定ファイルの `[logging]` セクションから作成
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        Self {
            filter: settings.level.clone(),
            directory: settings
                .log_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            rotation: LogRotation::parse(&settings.rotation),
            to_console: settings.console,
            to_file: settings.file,
            json: settings.json,
        }
    }

    /// コマンドライン指定でフィルターを上書き
    pub fn with_level(mut self, level: Option<String>) -> Self {
        if let Some(level) = level {
            self.filter = level;
        }
        self
    }
}

/// ログディレクトリを作成（存在する場合は何もしない）
fn prepare_directory(directory: &Path) -> Result<()> {
    fs::create_dir_all(directory)
        .with_context(|| format!("failed to create log directory {}", directory.display()))
}

/// ログシステムを初期化
///
/// ファイル出力が有効な場合に返される `WorkerGuard` はプロセス終了まで保持すること。
/// 破棄するとバッファ済みのログが書き出されない。
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new("info"));

    if !config.to_console && !config.to_file {
        // 出力先が無い場合も警告以上は stderr に残す
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_max_level(tracing::Level::WARN)
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install subscriber: {}", e))?;
        return Ok(None);
    }

    let mut layers = Vec::new();
    let mut guard = None;

    if config.to_console {
        layers.push(fmt_layer(std::io::stderr, config.json, !config.json));
    }

    if config.to_file {
        prepare_directory(&config.directory)?;
        let (writer, file_guard) = non_blocking(config.rotation.appender(&config.directory));
        layers.push(fmt_layer(writer, config.json, false));
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()
        .context("failed to install subscriber")?;

    tracing::info!(
        filter = %config.filter,
        console = config.to_console,
        file = config.to_file,
        directory = %config.directory.display(),
        "logging initialised"
    );

    Ok(guard)
}

fn fmt_layer<S, W>(writer: W, json: bool, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}
