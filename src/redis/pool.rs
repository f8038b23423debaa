use super::topology::{ConnectionSpec, Topology, UrlError};
use crate::config::types::RedisConfig;
use async_trait::async_trait;
use deadpool::managed::QueueMode;
use deadpool_redis::{Config, CreatePoolError, Pool, PoolConfig, PoolError, Runtime, Timeouts};
use redis::aio::{ConnectionLike, MultiplexedConnection};
use redis::cluster::{ClusterClient, ClusterClientBuilder};
use redis::cluster_async::ClusterConnection;
use redis::sentinel::{Sentinel, SentinelNodeConnectionInfo};
use redis::{cmd, Cmd, IntoConnectionInfo, Pipeline, RedisError, RedisFuture, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Redis連接池錯誤
#[derive(Error, Debug)]
pub enum RedisPoolError {
    /// 連接池初始化錯誤
    #[error("Redis連接池初始化錯誤: {0}")]
    PoolInitError(String),

    /// 無法獲取連接
    #[error("無法從連接池獲取連接: {0}")]
    GetConnectionError(String),

    /// 建立連接超時
    #[error("Redis建立連接超時: {0}")]
    TimeoutError(String),

    /// 連接字串錯誤
    #[error("Redis連接字串錯誤: {0}")]
    UrlError(#[from] UrlError),

    /// Redis原生錯誤
    #[error("Redis原生錯誤: {0}")]
    NativeRedisError(#[from] RedisError),

    /// 其他錯誤
    #[error("Redis連接池其他錯誤: {0}")]
    Other(String),
}

/// 從deadpool-redis錯誤轉換為RedisPoolError
impl From<PoolError> for RedisPoolError {
    fn from(error: PoolError) -> Self {
        RedisPoolError::GetConnectionError(error.to_string())
    }
}

/// 從deadpool-redis創建錯誤轉換為RedisPoolError
impl From<CreatePoolError> for RedisPoolError {
    fn from(error: CreatePoolError) -> Self {
        RedisPoolError::PoolInitError(error.to_string())
    }
}

/// 任一拓撲下取得的連接
///
/// 實作 [`ConnectionLike`]，因此 `redis` 的命令、管道與腳本 API 可直接使用。
pub enum RedisConnection {
    /// 單機模式，來自 deadpool 連接池
    Pooled(deadpool_redis::Connection),
    /// 集群模式
    Cluster(ClusterConnection),
    /// 哨兵模式，連到當前主節點
    Multiplexed(MultiplexedConnection),
}

impl ConnectionLike for RedisConnection {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        match self {
            RedisConnection::Pooled(conn) => conn.req_packed_command(cmd),
            RedisConnection::Cluster(conn) => conn.req_packed_command(cmd),
            RedisConnection::Multiplexed(conn) => conn.req_packed_command(cmd),
        }
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a Pipeline,
        offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        match self {
            RedisConnection::Pooled(conn) => conn.req_packed_commands(cmd, offset, count),
            RedisConnection::Cluster(conn) => conn.req_packed_commands(cmd, offset, count),
            RedisConnection::Multiplexed(conn) => conn.req_packed_commands(cmd, offset, count),
        }
    }

    fn get_db(&self) -> i64 {
        match self {
            RedisConnection::Pooled(conn) => conn.get_db(),
            RedisConnection::Cluster(conn) => conn.get_db(),
            RedisConnection::Multiplexed(conn) => conn.get_db(),
        }
    }
}

/// Redis連接池接口
#[async_trait]
pub trait RedisPool: Send + Sync + 'static {
    /// 獲取連接
    async fn get_conn(&self) -> Result<RedisConnection, RedisPoolError>;

    /// 獲取不與其他請求共用的連接，供阻塞命令使用
    async fn get_dedicated_conn(&self) -> Result<RedisConnection, RedisPoolError>;

    /// 用於發布訂閱的驅動客戶端
    async fn pubsub_client(&self) -> Result<redis::Client, RedisPoolError>;

    /// 丟棄快取的連接，下次請求時重新建立
    async fn invalidate(&self) {}

    /// 檢查連接池健康狀態
    async fn check_health(&self) -> bool;

    /// 獲取連接池大小
    fn pool_size(&self) -> u32;

    /// 連接設定
    fn spec(&self) -> &ConnectionSpec;
}

enum Backend {
    Standalone { pool: Pool, client: redis::Client },
    Cluster { client: ClusterClient, conn: ClusterConnection },
    Sentinel(SentinelBackend),
}

/// 哨兵模式下的主節點解析與連接快取
struct SentinelBackend {
    sentinel: Mutex<Sentinel>,
    master_name: String,
    node_info: SentinelNodeConnectionInfo,
    connect_timeout: Duration,
    master: Mutex<Option<(redis::Client, MultiplexedConnection)>>,
}

impl SentinelBackend {
    async fn resolve(&self) -> Result<(redis::Client, MultiplexedConnection), RedisPoolError> {
        let mut cached = self.master.lock().await;
        if let Some(master) = cached.as_ref() {
            return Ok(master.clone());
        }

        let client = {
            let mut sentinel = self.sentinel.lock().await;
            sentinel
                .async_master_for(&self.master_name, Some(&self.node_info))
                .await?
        };
        let conn = with_timeout(
            self.connect_timeout,
            client.get_multiplexed_async_connection(),
        )
        .await?;
        info!("哨兵解析主節點 {} 成功", self.master_name);

        *cached = Some((client.clone(), conn.clone()));
        Ok((client, conn))
    }

    async fn reset(&self) {
        if self.master.lock().await.take().is_some() {
            warn!("丟棄主節點 {} 的連接，下次請求時重新解析", self.master_name);
        }
    }
}

/// Redis連接池實現
pub struct ConnectionPool {
    backend: Backend,
    spec: ConnectionSpec,
    config: RedisConfig,
    connect_timeout: Duration,
}

impl ConnectionPool {
    /// 依連接字串的拓撲創建連接池
    pub async fn new(config: RedisConfig) -> Result<Self, RedisPoolError> {
        let spec = ConnectionSpec::parse(&config.url)?;
        let connect_timeout = spec
            .connect_timeout
            .unwrap_or(Duration::from_secs(config.connection_timeout_secs));

        let backend = match &spec.topology {
            Topology::Standalone => Self::standalone(&spec, &config, connect_timeout)?,
            Topology::Cluster => Self::cluster(&spec, connect_timeout).await?,
            Topology::Sentinel { master_name } => {
                Self::sentinel(&spec, master_name, connect_timeout).await?
            }
        };

        info!(
            "Redis連接池初始化完成，拓撲: {}, 位址: {}, 大小: {}",
            spec.topology, spec, config.pool_size
        );

        Ok(Self {
            backend,
            spec,
            config,
            connect_timeout,
        })
    }

    fn standalone(
        spec: &ConnectionSpec,
        config: &RedisConfig,
        connect_timeout: Duration,
    ) -> Result<Backend, RedisPoolError> {
        let url = spec.node_url(spec.primary_node().ok_or(UrlError::MissingHost)?);
        let client = redis::Client::open(url.as_str())?;

        // 創建連接池配置
        let mut cfg = Config::from_url(url);

        // 設置連接池大小和超時
        cfg.pool = Some(PoolConfig {
            max_size: config.pool_size as usize,
            timeouts: Timeouts {
                wait: Some(connect_timeout),
                create: Some(connect_timeout),
                recycle: Some(Duration::from_secs(60)),
            },
            queue_mode: QueueMode::Fifo,
        });

        let pool = cfg.create_pool(Some(Runtime::Tokio1))?;
        Ok(Backend::Standalone { pool, client })
    }

    async fn cluster(
        spec: &ConnectionSpec,
        connect_timeout: Duration,
    ) -> Result<Backend, RedisPoolError> {
        let client = ClusterClientBuilder::new(spec.node_urls())
            .connection_timeout(connect_timeout)
            .build()?;
        let conn = with_timeout(connect_timeout, client.get_async_connection()).await?;
        debug!("Redis集群連接建立成功，啟動節點數: {}", spec.nodes.len());
        Ok(Backend::Cluster { client, conn })
    }

    async fn sentinel(
        spec: &ConnectionSpec,
        master_name: &str,
        connect_timeout: Duration,
    ) -> Result<Backend, RedisPoolError> {
        let sentinel = Sentinel::build(spec.sentinel_urls())?;
        // 只取其中的帳密與資料庫設定，主節點位址由哨兵提供
        let master_info = spec
            .node_url(spec.primary_node().ok_or(UrlError::MissingHost)?)
            .into_connection_info()?;
        let backend = SentinelBackend {
            sentinel: Mutex::new(sentinel),
            master_name: master_name.to_string(),
            node_info: SentinelNodeConnectionInfo {
                tls_mode: None,
                redis_connection_info: Some(master_info.redis),
            },
            connect_timeout,
            master: Mutex::new(None),
        };
        backend.resolve().await?;
        Ok(Backend::Sentinel(backend))
    }
}

#[async_trait]
impl RedisPool for ConnectionPool {
    async fn get_conn(&self) -> Result<RedisConnection, RedisPoolError> {
        match &self.backend {
            Backend::Standalone { pool, .. } => match pool.get().await {
                Ok(conn) => {
                    debug!("從Redis連接池獲取連接成功");
                    Ok(RedisConnection::Pooled(conn))
                }
                Err(e) => {
                    error!("無法從Redis連接池獲取連接: {}", e);
                    Err(e.into())
                }
            },
            Backend::Cluster { conn, .. } => Ok(RedisConnection::Cluster(conn.clone())),
            Backend::Sentinel(sentinel) => {
                let (_, conn) = sentinel.resolve().await?;
                Ok(RedisConnection::Multiplexed(conn))
            }
        }
    }

    async fn get_dedicated_conn(&self) -> Result<RedisConnection, RedisPoolError> {
        match &self.backend {
            Backend::Standalone { .. } => self.get_conn().await,
            Backend::Cluster { client, .. } => {
                let conn = with_timeout(self.connect_timeout, client.get_async_connection()).await?;
                Ok(RedisConnection::Cluster(conn))
            }
            Backend::Sentinel(sentinel) => {
                let (client, _) = sentinel.resolve().await?;
                let conn = with_timeout(
                    self.connect_timeout,
                    client.get_multiplexed_async_connection(),
                )
                .await?;
                Ok(RedisConnection::Multiplexed(conn))
            }
        }
    }

    async fn pubsub_client(&self) -> Result<redis::Client, RedisPoolError> {
        match &self.backend {
            Backend::Standalone { client, .. } => Ok(client.clone()),
            // 集群中的一般發布訂閱會廣播到所有節點，連啟動節點即可
            Backend::Cluster { .. } => {
                let node = self.spec.primary_node().ok_or(UrlError::MissingHost)?;
                Ok(redis::Client::open(self.spec.node_url(node))?)
            }
            Backend::Sentinel(sentinel) => Ok(sentinel.resolve().await?.0),
        }
    }

    async fn invalidate(&self) {
        if let Backend::Sentinel(sentinel) = &self.backend {
            sentinel.reset().await;
        }
    }

    async fn check_health(&self) -> bool {
        match self.get_conn().await {
            Ok(mut conn) => {
                // 直接執行 PING 命令
                let result: Result<String, RedisError> = cmd("PING").query_async(&mut conn).await;
                match result {
                    Ok(pong) => pong == "PONG",
                    Err(e) => {
                        error!("Redis健康檢查錯誤: {}", e);
                        false
                    }
                }
            }
            Err(e) => {
                error!("Redis健康檢查無法獲取連接: {}", e);
                false
            }
        }
    }

    fn pool_size(&self) -> u32 {
        match self.backend {
            Backend::Standalone { .. } => self.config.pool_size,
            // 多工連接
            _ => 1,
        }
    }

    fn spec(&self) -> &ConnectionSpec {
        &self.spec
    }
}

/// Arc<ConnectionPool> 也實現 RedisPool trait，便於共享連接池
#[async_trait]
impl RedisPool for Arc<ConnectionPool> {
    async fn get_conn(&self) -> Result<RedisConnection, RedisPoolError> {
        (**self).get_conn().await
    }

    async fn get_dedicated_conn(&self) -> Result<RedisConnection, RedisPoolError> {
        (**self).get_dedicated_conn().await
    }

    async fn pubsub_client(&self) -> Result<redis::Client, RedisPoolError> {
        (**self).pubsub_client().await
    }

    async fn invalidate(&self) {
        (**self).invalidate().await
    }

    async fn check_health(&self) -> bool {
        (**self).check_health().await
    }

    fn pool_size(&self) -> u32 {
        (**self).pool_size()
    }

    fn spec(&self) -> &ConnectionSpec {
        (**self).spec()
    }
}

async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, RedisPoolError>
where
    F: Future<Output = Result<T, RedisError>>,
{
    match timeout(limit, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(RedisPoolError::TimeoutError(format!(
            "超過 {:?} 仍未建立連接",
            limit
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redis::test_config::RedisTestConfig;
    use assert_matches::assert_matches;
    use redis::AsyncCommands;

    #[tokio::test]
    async fn test_invalid_url_fails_before_connecting() {
        let config = RedisConfig {
            url: "memcached://localhost".to_string(),
            ..RedisConfig::default()
        };
        let result = ConnectionPool::new(config).await.map(|_| ());
        assert_matches!(result, Err(RedisPoolError::UrlError(UrlError::UnsupportedScheme(_))));
    }

    #[tokio::test]
    async fn test_connection_pool() {
        if RedisTestConfig::skip_if_redis_unavailable("test_connection_pool")
            .await
            .is_none()
        {
            return;
        }

        // 創建連接池
        let config = RedisTestConfig::create_test_config();
        let pool = ConnectionPool::new(config)
            .await
            .expect("無法創建Redis連接池");

        // 測試連接池健康狀態
        assert!(pool.check_health().await);
        assert!(pool.pool_size() >= 1);

        // 測試獲取連接和基本操作
        let mut conn = pool.get_conn().await.expect("無法獲取連接");

        let key = format!("redisz:pool_test:{}", uuid::Uuid::new_v4());
        let value = "pool_test_value";

        let _: () = conn.set(&key, value).await.expect("SET失敗");
        let result: String = conn.get(&key).await.expect("GET失敗");
        assert_eq!(result, value);

        let mut dedicated = pool.get_dedicated_conn().await.expect("無法獲取獨立連接");
        let exists: bool = dedicated.exists(&key).await.expect("EXISTS失敗");
        assert!(exists);

        // 清理
        let _: i64 = conn.del(&key).await.expect("DEL失敗");
    }
}
