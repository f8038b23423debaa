#![allow(dead_code)]

use redisz::config::RedisConfig;
use redisz::Client;

/// 測試用 Redis URL，Docker 環境使用服務名稱 "redis"
pub fn test_url() -> String {
    std::env::var("REDIS_TEST_URL").unwrap_or_else(|_| {
        if std::path::Path::new("/.dockerenv").exists() {
            "redis://redis:6379".to_string()
        } else {
            "redis://localhost:6379".to_string()
        }
    })
}

pub fn test_config() -> RedisConfig {
    RedisConfig {
        url: test_url(),
        pool_size: 3,
        connection_timeout_secs: 2,
        reconnect_attempts: 0,
        reconnect_delay_secs: 0,
        ..RedisConfig::default()
    }
}

/// Redis 可用時回傳客戶端，否則略過測試
pub async fn setup_client(test_name: &str) -> Option<Client> {
    match Client::new(test_config()).await {
        Ok(client) if client.test_connection().await => Some(client),
        _ => {
            eprintln!("略過 Redis 測試 '{}' - Redis 環境不可用", test_name);
            None
        }
    }
}

/// 每個測試獨立的鍵名
pub fn unique_key(name: &str) -> String {
    format!("redisz-it:{}:{}", name, uuid::Uuid::new_v4())
}
