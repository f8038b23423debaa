use crate::config::validation::{ValidationError, ValidationUtils, Validator};
use crate::redis::operations::lock::DEFAULT_LOCK_PREFIX;
use crate::redis::topology::ConnectionSpec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 應用程序配置結構
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub log: LogConfig,
    pub redis: RedisConfig,
}

impl Validator for ApplicationConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        self.log.validate()?;
        self.redis.validate()?;

        Ok(())
    }
}

/// 日誌配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `trace`/`debug`/`info`/`warn`/`error`，`RUST_LOG` 存在時以其為準
    pub level: String,
    /// `pretty` 或 `json`
    pub format: String,
    /// 輸出檔案路徑，未設定時輸出到標準輸出
    pub file: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

impl Validator for LogConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationUtils::one_of(
            &self.level,
            &["trace", "debug", "info", "warn", "error"],
            "log.level",
        )?;
        ValidationUtils::one_of(&self.format, &["pretty", "json"], "log.format")?;
        if let Some(file) = &self.file {
            ValidationUtils::not_empty(file, "log.file")?;
        }

        Ok(())
    }
}

/// Redis配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// 連接字串，決定單機、集群或哨兵模式
    pub url: String,
    /// 單機模式的連接池大小
    pub pool_size: u32,
    /// 建立連接的超時秒數，連接字串的 `connect_timeout` 優先
    pub connection_timeout_secs: u64,
    /// 等待命令回應的超時秒數，0 表示不限；連接字串的 `socket_timeout` 優先
    pub read_timeout_secs: u64,
    /// 連接錯誤時的重試次數
    pub reconnect_attempts: u32,
    pub reconnect_delay_secs: u64,
    /// 分散式鎖的鍵前綴
    pub lock_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            connection_timeout_secs: 5,
            read_timeout_secs: 5,
            reconnect_attempts: 3,
            reconnect_delay_secs: 1,
            lock_prefix: DEFAULT_LOCK_PREFIX.to_string(),
        }
    }
}

impl Validator for RedisConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationUtils::not_empty(&self.url, "redis.url")?;
        ValidationUtils::parses(&self.url, "redis.url", ConnectionSpec::parse)?;
        ValidationUtils::in_range(self.pool_size, 1, 100, "redis.pool_size")?;
        ValidationUtils::in_range(
            self.connection_timeout_secs,
            1,
            60,
            "redis.connection_timeout_secs",
        )?;
        ValidationUtils::in_range(self.read_timeout_secs, 0, 3600, "redis.read_timeout_secs")?;
        ValidationUtils::in_range(self.reconnect_attempts, 0, 10, "redis.reconnect_attempts")?;
        ValidationUtils::in_range(self.reconnect_delay_secs, 0, 60, "redis.reconnect_delay_secs")?;

        Ok(())
    }
}

impl RedisConfig {
    /// 建立連接超時
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_defaults_are_valid() {
        let config = ApplicationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.redis.lock_prefix, "redisz-lock:");
        assert_eq!(config.redis.connection_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let config = RedisConfig {
            url: "cluster://a:7000/3".to_string(),
            ..RedisConfig::default()
        };
        assert_matches!(
            config.validate(),
            Err(ValidationError::InvalidValue(msg)) if msg.starts_with("redis.url")
        );
    }

    #[test]
    fn test_range_checks() {
        let config = RedisConfig {
            pool_size: 0,
            ..RedisConfig::default()
        };
        assert_matches!(config.validate(), Err(ValidationError::RangeError { .. }));

        let log = LogConfig {
            format: "xml".to_string(),
            ..LogConfig::default()
        };
        assert_matches!(log.validate(), Err(ValidationError::InvalidValue(_)));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ApplicationConfig = serde_json::from_str(
            r#"{"redis": {"url": "sentinel://s1,s2/mymaster"}, "log": {"level": "debug"}}"#,
        )
        .unwrap();
        assert_eq!(config.redis.url, "sentinel://s1,s2/mymaster");
        assert_eq!(config.redis.pool_size, 10);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "pretty");
    }
}
