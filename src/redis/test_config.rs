//! 集中化的 Redis 測試配置
//!
//! 提供一致的測試環境配置，支援不同部署環境（本地開發、Docker 容器），
//! 以及不需要 Redis 的離線測試工具：永遠連不上的連接池與簡易 RESP 伺服器。

use crate::config::types::RedisConfig;
use crate::redis::client::Client;
use crate::redis::pool::{ConnectionPool, RedisConnection, RedisPool, RedisPoolError};
use crate::redis::topology::ConnectionSpec;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::warn;

/// Redis 測試配置建構器
pub struct RedisTestConfig;

impl RedisTestConfig {
    /// 獲取測試用 Redis URL
    ///
    /// 優先級：
    /// 1. REDIS_TEST_URL 環境變數
    /// 2. 檢測 Docker 環境使用 redis:6379
    /// 3. 預設 localhost:6379
    pub fn get_test_url() -> String {
        // 首先檢查環境變數
        if let Ok(url) = std::env::var("REDIS_TEST_URL") {
            return url;
        }

        if Self::is_docker_environment() {
            "redis://redis:6379".to_string()
        } else {
            "redis://localhost:6379".to_string()
        }
    }

    /// 檢測是否在 Docker 環境中執行
    fn is_docker_environment() -> bool {
        std::env::var("DOCKER_CONTAINER").is_ok() || std::path::Path::new("/.dockerenv").exists()
    }

    /// 建立標準測試 Redis 配置
    pub fn create_test_config() -> RedisConfig {
        RedisConfig {
            url: Self::get_test_url(),
            pool_size: 3,
            connection_timeout_secs: 2,
            read_timeout_secs: 5,
            reconnect_attempts: 0,
            reconnect_delay_secs: 0,
            ..RedisConfig::default()
        }
    }

    /// 建立測試用 Redis 連接池
    pub async fn create_test_pool() -> Result<Arc<ConnectionPool>, RedisPoolError> {
        let config = Self::create_test_config();
        let pool = ConnectionPool::new(config).await?;
        Ok(Arc::new(pool))
    }

    /// 檢查 Redis 是否可用於測試
    pub async fn is_redis_available() -> bool {
        match Self::create_test_pool().await {
            Ok(pool) => pool.check_health().await,
            Err(_) => false,
        }
    }

    /// Redis 可用時回傳客戶端，否則記錄並略過測試
    pub async fn skip_if_redis_unavailable(test_name: &str) -> Option<Client> {
        if !Self::is_redis_available().await {
            warn!("略過 Redis 測試 '{}' - Redis 環境不可用", test_name);
            eprintln!("略過 Redis 測試 '{}' - Redis 環境不可用", test_name);
            return None;
        }
        Client::new(Self::create_test_config()).await.ok()
    }
}

/// 永遠無法取得連接的連接池，記錄嘗試次數
pub struct UnreachablePool {
    spec: ConnectionSpec,
    attempts: AtomicUsize,
    invalidations: AtomicUsize,
}

impl UnreachablePool {
    pub fn new() -> Self {
        Self::with_url("redis://unreachable:6379")
    }

    pub fn with_url(url: &str) -> Self {
        Self {
            spec: ConnectionSpec::parse(url).unwrap(),
            attempts: AtomicUsize::new(0),
            invalidations: AtomicUsize::new(0),
        }
    }

    /// 嘗試取得連接的次數，即送往伺服器的請求數
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    /// 使用此連接池且不重試的客戶端
    pub fn client(self: &Arc<Self>, reconnect_attempts: u32) -> Client {
        let config = RedisConfig {
            url: "redis://unreachable:6379".to_string(),
            reconnect_attempts,
            reconnect_delay_secs: 0,
            ..RedisConfig::default()
        };
        Client::with_pool(self.clone(), config)
    }
}

#[async_trait]
impl RedisPool for UnreachablePool {
    async fn get_conn(&self) -> Result<RedisConnection, RedisPoolError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(RedisPoolError::GetConnectionError("refused".to_string()))
    }

    async fn get_dedicated_conn(&self) -> Result<RedisConnection, RedisPoolError> {
        self.get_conn().await
    }

    async fn pubsub_client(&self) -> Result<redis::Client, RedisPoolError> {
        Err(RedisPoolError::Other("unreachable".to_string()))
    }

    async fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }

    async fn check_health(&self) -> bool {
        false
    }

    fn pool_size(&self) -> u32 {
        0
    }

    fn spec(&self) -> &ConnectionSpec {
        &self.spec
    }
}

/// 簡易 RESP 伺服器的回覆
#[derive(Debug, Clone)]
pub struct FakeReply {
    body: String,
    delay: Option<Duration>,
}

impl FakeReply {
    pub fn ok() -> Self {
        Self::raw("+OK\r\n")
    }

    pub fn nil() -> Self {
        Self::raw("$-1\r\n")
    }

    pub fn integer(value: i64) -> Self {
        Self::raw(format!(":{}\r\n", value))
    }

    pub fn bulk(value: &str) -> Self {
        Self::raw(format!("${}\r\n{}\r\n", value.len(), value))
    }

    pub fn array<S: AsRef<str>>(items: &[S]) -> Self {
        let mut body = format!("*{}\r\n", items.len());
        for item in items {
            let item = item.as_ref();
            body.push_str(&format!("${}\r\n{}\r\n", item.len(), item));
        }
        Self::raw(body)
    }

    fn raw(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            delay: None,
        }
    }

    /// 延遲送出回覆，命令本身已經生效
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

type Handler = dyn Fn(&[String]) -> Option<FakeReply> + Send + Sync;

/// 只懂 RESP2 陣列命令的本機伺服器，記錄收到的每個命令
///
/// `handler` 回傳 `None` 時使用預設回覆：`PING` 回應 `PONG` 或原樣回傳參數，其餘回 `+OK`。
pub struct FakeRedisServer {
    addr: SocketAddr,
    commands: Arc<Mutex<Vec<Vec<String>>>>,
    task: JoinHandle<()>,
}

impl FakeRedisServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&[String]) -> Option<FakeReply> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let log = commands.clone();
        let task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let log = log.clone();
                let handler = handler.clone();
                tokio::spawn(async move {
                    let (read, mut write) = socket.into_split();
                    let mut reader = BufReader::new(read);
                    while let Ok(Some(args)) = read_command(&mut reader).await {
                        log.lock().unwrap().push(args.clone());
                        let reply = handler(&args).unwrap_or_else(|| default_reply(&args));
                        if let Some(delay) = reply.delay {
                            tokio::time::sleep(delay).await;
                        }
                        if write.write_all(reply.body.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        Self {
            addr,
            commands,
            task,
        }
    }

    pub fn url(&self) -> String {
        format!("redis://{}", self.addr)
    }

    /// 連到此伺服器、回應超時 100 毫秒、最多重試兩次的客戶端
    pub async fn client(&self) -> Client {
        let config = RedisConfig {
            url: format!("{}?socket_timeout=0.1", self.url()),
            pool_size: 2,
            connection_timeout_secs: 1,
            reconnect_attempts: 2,
            reconnect_delay_secs: 0,
            ..RedisConfig::default()
        };
        Client::new(config).await.unwrap()
    }

    /// 收到指定命令的次數（不分大小寫）
    pub fn count(&self, command: &str) -> usize {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|args| args.first().is_some_and(|name| name.eq_ignore_ascii_case(command)))
            .count()
    }
}

impl Drop for FakeRedisServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn default_reply(args: &[String]) -> FakeReply {
    match args {
        [name] if name.eq_ignore_ascii_case("PING") => FakeReply::raw("+PONG\r\n"),
        [name, message] if name.eq_ignore_ascii_case("PING") => FakeReply::bulk(message),
        _ => FakeReply::ok(),
    }
}

async fn read_command<R: AsyncBufRead + Unpin>(reader: &mut R) -> io::Result<Option<Vec<String>>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let count = parse_header(&line, '*')?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        line.clear();
        reader.read_line(&mut line).await?;
        let len = parse_header(&line, '$')?;
        let mut buf = vec![0; len + 2];
        reader.read_exact(&mut buf).await?;
        buf.truncate(len);
        args.push(String::from_utf8_lossy(&buf).into_owned());
    }
    Ok(Some(args))
}

fn parse_header(line: &str, prefix: char) -> io::Result<usize> {
    line.trim_end()
        .strip_prefix(prefix)
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, line.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_get_test_url_with_env_var() {
        let previous = std::env::var("REDIS_TEST_URL").ok();
        std::env::set_var("REDIS_TEST_URL", "redis://custom:1234");

        let url = RedisTestConfig::get_test_url();
        assert_eq!(url, "redis://custom:1234");

        // 清理
        match previous {
            Some(value) => std::env::set_var("REDIS_TEST_URL", value),
            None => std::env::remove_var("REDIS_TEST_URL"),
        }
    }

    #[test]
    #[serial]
    fn test_create_test_config() {
        let config = RedisTestConfig::create_test_config();
        assert_eq!(config.pool_size, 3);
        assert_eq!(config.reconnect_attempts, 0);
        assert_eq!(config.lock_prefix, "redisz-lock:");
    }
}
