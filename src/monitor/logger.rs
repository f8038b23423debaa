// monitor/logger.rs - tracing 日誌初始化

use crate::config::LogConfig;
use crate::monitor::{MonitorError, MonitorResult};
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// 日誌輸出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 適合終端閱讀
    Pretty,
    /// 每行一個 JSON 物件
    Json,
}

impl LogFormat {
    /// 無法識別時使用 `Pretty`
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// 保持檔案輸出的背景寫入執行緒，drop 時寫出剩餘日誌
#[must_use = "日誌寫入器在 guard 被丟棄時關閉"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// 建立過濾器，`RUST_LOG` 優先於配置的級別
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 初始化日誌系統
pub fn init_logging(config: &LogConfig) -> MonitorResult<LoggingGuard> {
    let (writer, guard) = match &config.file {
        Some(path) => {
            let path = Path::new(path);
            let file_name = path
                .file_name()
                .ok_or_else(|| MonitorError::LoggerError(format!("無效的日誌檔案路徑: {}", path.display())))?;
            let dir = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };

    let layer = fmt::layer().with_writer(writer).with_ansi(config.file.is_none());
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match LogFormat::parse(&config.format) {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Pretty => layer.boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(build_filter(&config.level))
        .try_init()
        .map_err(|e| MonitorError::InitializationError(format!("設置日誌系統失敗: {}", e)))?;

    info!("日誌系統初始化完成，級別: {}, 格式: {}", config.level, config.format);
    Ok(LoggingGuard { _file: guard })
}
