use crate::config::loader::{ConfigLoader, Environment};
use crate::config::types::ApplicationConfig;
use crate::config::validation::Validator;
use config::ConfigError;
use once_cell::sync::OnceCell;
use std::path::Path;
use tracing::{debug, warn};

// 全局配置實例
static CONFIG: OnceCell<ApplicationConfig> = OnceCell::new();

/// 獲取應用程序配置實例，第一次呼叫時載入
pub fn get_config() -> Result<&'static ApplicationConfig, ConfigError> {
    CONFIG.get_or_try_init(ApplicationConfig::load_from_env)
}

/// 初始化配置（在應用程序啟動時調用）
pub fn init_config() -> Result<&'static ApplicationConfig, ConfigError> {
    if let Some(existing) = CONFIG.get() {
        warn!("配置已經被初始化，跳過重複初始化");
        return Ok(existing);
    }

    let app_config = ApplicationConfig::load_from_env()?;
    if CONFIG.set(app_config).is_err() {
        warn!("配置已經被初始化，跳過重複初始化");
    } else {
        debug!("配置初始化成功，環境：{:?}", Environment::from_env());
    }

    get_config()
}

/// ApplicationConfig 加載方法實現
impl ApplicationConfig {
    /// 從環境變數指定的環境加載配置
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let env = Environment::from_env();
        debug!("從環境加載配置: {:?}", env);
        Self::load(env)
    }

    /// 從指定環境加載配置
    pub fn load(env: Environment) -> Result<Self, ConfigError> {
        Self::from_source(ConfigLoader::load(env)?)
    }

    /// 從指定目錄加載配置
    pub fn load_from_dir(dir: &Path, env: Environment) -> Result<Self, ConfigError> {
        Self::from_source(ConfigLoader::load_from_dir(dir, env)?)
    }

    fn from_source(source: config::Config) -> Result<Self, ConfigError> {
        // 使用 serde 反序列化配置
        let app_config: ApplicationConfig = source.try_deserialize()?;

        // 驗證失敗只記錄警告，實際錯誤在連接時回報
        if let Err(err) = app_config.validate() {
            warn!("配置驗證失敗: {}", err);
        } else {
            debug!("配置驗證通過");
        }

        Ok(app_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_load_from_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("development.toml"),
            r#"
[log]
level = "debug"
format = "json"

[redis]
url = "sentinel://:pw@s1:26379,s2:26379/mymaster/1"
reconnect_attempts = 5
"#,
        )
        .unwrap();

        let config = ApplicationConfig::load_from_dir(dir.path(), Environment::Development).unwrap();
        assert_eq!(config.log.format, "json");
        assert_eq!(config.redis.reconnect_attempts, 5);
        assert_eq!(config.redis.pool_size, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ApplicationConfig::load_from_dir(dir.path(), Environment::Production).unwrap();
        assert_eq!(config.redis.url, "redis://localhost:6379");
        assert_eq!(config.log.level, "info");
    }

    #[test]
    #[serial]
    fn test_global_config_is_shared() {
        let dir = TempDir::new().unwrap();
        std::env::set_var("CONFIG_DIR", dir.path());

        let first = init_config().unwrap();
        let second = get_config().unwrap();

        std::env::remove_var("CONFIG_DIR");
        assert!(std::ptr::eq(first, second));
    }
}
