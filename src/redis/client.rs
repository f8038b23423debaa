use super::pool::{ConnectionPool, RedisConnection, RedisPool, RedisPoolError};
use super::topology::{ConnectionSpec, Topology};
use crate::config::types::RedisConfig;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use redis::{Cmd, ErrorKind, FromRedisValue, Pipeline, RedisError, RedisResult};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// Redis客戶端錯誤
#[derive(Error, Debug)]
pub enum RedisClientError {
    /// Redis連接錯誤
    #[error("Redis連接錯誤: {0}")]
    ConnectionError(#[from] RedisError),

    /// 連接池錯誤
    #[error("Redis連接池錯誤: {0}")]
    Pool(#[from] RedisPoolError),

    /// 操作超時錯誤
    #[error("Redis操作超時: {0}")]
    TimeoutError(String),

    /// 值類型錯誤
    #[error("Redis值類型錯誤: {0}")]
    TypeError(String),

    /// 目前拓撲不支援的操作
    #[error("Redis不支援的操作: {0}")]
    Unsupported(String),

    /// 其他錯誤
    #[error("Redis其他錯誤: {0}")]
    Other(String),
}

impl RedisClientError {
    /// 命令確定沒有送達伺服器，可在重新連接後安全重試
    ///
    /// 回應超時或連接在送出後中斷時，伺服器可能已執行命令，不重試。
    pub fn is_retryable(&self) -> bool {
        match self {
            RedisClientError::ConnectionError(err) => is_rejected_before_execution(err),
            RedisClientError::Pool(RedisPoolError::GetConnectionError(_))
            | RedisClientError::Pool(RedisPoolError::TimeoutError(_)) => true,
            RedisClientError::Pool(RedisPoolError::NativeRedisError(err)) => {
                is_connection_error(err)
            }
            _ => false,
        }
    }

    /// 命令可能已在伺服器執行，但沒有收到回覆
    pub fn is_ambiguous(&self) -> bool {
        match self {
            RedisClientError::TimeoutError(_) => true,
            RedisClientError::ConnectionError(err) => {
                is_connection_error(err) && !is_rejected_before_execution(err)
            }
            _ => false,
        }
    }

    /// 連接已不可用，應丟棄快取的連接
    fn breaks_connection(&self) -> bool {
        match self {
            RedisClientError::ConnectionError(err) => is_connection_error(err),
            RedisClientError::TimeoutError(_) => true,
            RedisClientError::Pool(_) => self.is_retryable(),
            _ => false,
        }
    }
}

fn is_connection_error(err: &RedisError) -> bool {
    err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.is_timeout()
        || err.kind() == ErrorKind::ReadOnly
}

fn is_rejected_before_execution(err: &RedisError) -> bool {
    // 哨兵切換後舊主節點變為唯讀，寫入命令會被拒絕
    err.is_connection_refusal() || err.kind() == ErrorKind::ReadOnly
}

#[derive(Clone, Copy)]
enum Request<'a> {
    Command(&'a Cmd),
    Pipeline(&'a Pipeline),
}

impl Request<'_> {
    async fn send<T: FromRedisValue>(self, conn: &mut RedisConnection) -> RedisResult<T> {
        match self {
            Request::Command(cmd) => cmd.query_async(conn).await,
            Request::Pipeline(pipe) => pipe.query_async(conn).await,
        }
    }
}

/// Redis客戶端
///
/// 內含共享的連接池，複製成本低，可在任務間傳遞。各資料類型的操作方法定義於
/// [`operations`](super::operations) 模組。
#[derive(Clone)]
pub struct Client {
    pool: Arc<dyn RedisPool>,
    config: Arc<RedisConfig>,
    response_timeout: Option<Duration>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("spec", &self.pool.spec().to_string())
            .field("response_timeout", &self.response_timeout)
            .finish()
    }
}

impl Client {
    /// 依配置創建客戶端，連接字串決定部署拓撲
    pub async fn new(config: RedisConfig) -> Result<Self, RedisClientError> {
        let pool = ConnectionPool::new(config.clone()).await?;
        Ok(Self::with_pool(Arc::new(pool), config))
    }

    /// 以預設配置連接指定位址
    pub async fn from_url(url: &str) -> Result<Self, RedisClientError> {
        Self::new(RedisConfig {
            url: url.to_string(),
            ..RedisConfig::default()
        })
        .await
    }

    /// 使用既有的連接池
    pub fn with_pool(pool: Arc<dyn RedisPool>, config: RedisConfig) -> Self {
        let response_timeout = pool.spec().socket_timeout.or_else(|| {
            (config.read_timeout_secs > 0).then(|| Duration::from_secs(config.read_timeout_secs))
        });
        Self {
            pool,
            config: Arc::new(config),
            response_timeout,
        }
    }

    /// 連接設定
    pub fn spec(&self) -> &ConnectionSpec {
        self.pool.spec()
    }

    /// 部署拓撲
    pub fn topology(&self) -> &Topology {
        &self.pool.spec().topology
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    pub(crate) fn pool(&self) -> &Arc<dyn RedisPool> {
        &self.pool
    }

    /// 取得底層連接，可直接使用 `redis` 的命令 API
    pub async fn get_connection(&self) -> Result<RedisConnection, RedisClientError> {
        Ok(self.pool.get_conn().await?)
    }

    /// 執行PING命令
    pub async fn ping(&self) -> Result<String, RedisClientError> {
        self.execute(&redis::cmd("PING")).await
    }

    /// 測試連接是否有效
    pub async fn test_connection(&self) -> bool {
        match self.ping().await {
            Ok(_) => true,
            Err(err) => {
                warn!("Redis連接測試失敗: {}", err);
                false
            }
        }
    }

    /// 執行任意命令，套用回應超時與重試策略
    pub async fn execute<T: FromRedisValue>(&self, cmd: &Cmd) -> Result<T, RedisClientError> {
        self.with_retry_connection(Request::Command(cmd)).await
    }

    /// 一次往返執行管道中的所有命令
    pub async fn execute_pipeline<T: FromRedisValue>(
        &self,
        pipe: &Pipeline,
    ) -> Result<T, RedisClientError> {
        self.with_retry_connection(Request::Pipeline(pipe)).await
    }

    /// 在獨立連接上執行阻塞命令，不設回應超時也不重試
    pub(crate) async fn execute_blocking<T: FromRedisValue>(
        &self,
        cmd: &Cmd,
    ) -> Result<T, RedisClientError> {
        let mut conn = self.pool.get_dedicated_conn().await?;
        match Request::Command(cmd).send(&mut conn).await {
            Ok(value) => Ok(value),
            Err(err) => {
                error!("Redis阻塞命令失敗: {}", err);
                Err(err.into())
            }
        }
    }

    /// 以游標分批讀取的命令轉為逐筆輸出的串流
    ///
    /// `build` 依游標產生命令，回覆須為 `[cursor, [items...]]`，游標回到 0 時結束。
    pub(crate) fn cursor_stream<'a, T, F>(
        &'a self,
        build: F,
    ) -> BoxStream<'a, Result<T, RedisClientError>>
    where
        T: FromRedisValue + Send + 'a,
        F: Fn(u64) -> Cmd + Send + Sync + 'a,
    {
        stream::try_unfold(Some(0u64), move |cursor| {
            let cmd = cursor.map(&build);
            async move {
                let Some(cmd) = cmd else {
                    return Ok::<_, RedisClientError>(None);
                };
                let (next, batch): (u64, Vec<T>) = self.execute(&cmd).await?;
                let next = (next != 0).then_some(next);
                let items = stream::iter(batch.into_iter().map(Ok::<T, RedisClientError>));
                Ok(Some((items, next)))
            }
        })
        .try_flatten()
        .boxed()
    }

    /// 使用重試策略執行Redis操作
    async fn with_retry_connection<T: FromRedisValue>(
        &self,
        request: Request<'_>,
    ) -> Result<T, RedisClientError> {
        let mut attempts = 0;
        let max_attempts = self.config.reconnect_attempts as usize + 1; // +1 for initial attempt
        let retry_delay = Duration::from_secs(self.config.reconnect_delay_secs);

        loop {
            attempts += 1;

            match self.attempt(request).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempts < max_attempts => {
                    warn!(
                        "Redis操作失敗 (嘗試 {}/{}): {}. 重試中...",
                        attempts, max_attempts, err
                    );
                    self.pool.invalidate().await;
                    tokio::time::sleep(retry_delay).await;
                }
                Err(err) => {
                    error!("Redis操作失敗: {}", err);
                    if err.breaks_connection() {
                        self.pool.invalidate().await;
                    }
                    return Err(err);
                }
            }
        }
    }

    /// 執行一次命令，不論錯誤類型都不重試
    pub(crate) async fn execute_once<T: FromRedisValue>(
        &self,
        cmd: &Cmd,
    ) -> Result<T, RedisClientError> {
        self.attempt(Request::Command(cmd)).await
    }

    async fn attempt<T: FromRedisValue>(
        &self,
        request: Request<'_>,
    ) -> Result<T, RedisClientError> {
        let mut conn = self.pool.get_conn().await?;
        match self.response_timeout {
            Some(limit) => match timeout(limit, request.send(&mut conn)).await {
                Ok(result) => Ok(result?),
                Err(_) => {
                    debug!("Redis回應超過 {:?}", limit);
                    Err(RedisClientError::TimeoutError(format!(
                        "回應超時 ({:?})",
                        limit
                    )))
                }
            },
            None => Ok(request.send(&mut conn).await?),
        }
    }
}
