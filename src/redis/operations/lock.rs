//! 分散式鎖
//!
//! 以 `SET key token NX PX` 取得鎖，釋放、延長與重新取得皆透過 Lua 腳本比對
//! 持有者的 token，避免誤刪他人持有的鎖。

use crate::redis::client::{Client, RedisClientError};
use once_cell::sync::Lazy;
use redis::Script;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// 預設鎖鍵前綴
pub const DEFAULT_LOCK_PREFIX: &str = "redisz-lock:";

// KEYS[1] 鎖鍵, ARGV[1] token
static RELEASE_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
local token = redis.call('get', KEYS[1])
if not token or token ~= ARGV[1] then
    return 0
end
redis.call('del', KEYS[1])
return 1
"#,
    )
});

// ARGV[2] 毫秒數, ARGV[3] 為 "1" 時取代剩餘時間，否則累加
static EXTEND_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
local token = redis.call('get', KEYS[1])
if not token or token ~= ARGV[1] then
    return 0
end
local expiration = redis.call('pttl', KEYS[1])
if not expiration then
    expiration = 0
end
if expiration < 0 then
    return 0
end
local newttl = ARGV[2]
if ARGV[3] == "0" then
    newttl = ARGV[2] + expiration
end
redis.call('pexpire', KEYS[1], newttl)
return 1
"#,
    )
});

static REACQUIRE_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
local token = redis.call('get', KEYS[1])
if not token or token ~= ARGV[1] then
    return 0
end
redis.call('pexpire', KEYS[1], ARGV[2])
return 1
"#,
    )
});

/// 鎖錯誤
#[derive(Error, Debug)]
pub enum LockError {
    /// 尚未取得就嘗試釋放或延長
    #[error("鎖 {0} 尚未取得")]
    NotAcquired(String),

    /// 鎖已過期或被他人持有
    #[error("鎖 {0} 已不屬於目前持有者")]
    NotOwned(String),

    /// 未設定過期時間的鎖無法延長
    #[error("鎖 {0} 沒有設定過期時間")]
    NoTimeout(String),

    /// 在等待時間內無法取得
    #[error("無法取得鎖 {0}")]
    AcquireFailed(String),

    #[error("鎖操作Redis錯誤: {0}")]
    Redis(#[from] RedisClientError),
}

/// 鎖選項
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOptions {
    /// 鎖的存活時間，`None` 表示不會自動過期
    pub timeout: Option<Duration>,
    /// 阻塞等待時的輪詢間隔
    pub sleep: Duration,
    /// 取不到鎖時是否等待
    pub blocking: bool,
    /// 最長等待時間，`None` 表示一直等待
    pub blocking_timeout: Option<Duration>,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            sleep: Duration::from_millis(100),
            blocking: true,
            blocking_timeout: None,
        }
    }
}

impl LockOptions {
    /// 指定存活時間
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// 分散式鎖
///
/// 由 [`Client::lock`] 建立。同一個 `RedisLock` 持有自己的 token，
/// 只有取得鎖的實例能釋放或延長它。
#[derive(Debug)]
pub struct RedisLock {
    client: Client,
    name: String,
    options: LockOptions,
    token: Option<String>,
}

impl RedisLock {
    /// 完整的鎖鍵名稱（含前綴）
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &LockOptions {
        &self.options
    }

    /// 目前持有的 token
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// 依建立時的選項取得鎖
    pub async fn acquire(&mut self) -> Result<bool, LockError> {
        let blocking = self.options.blocking;
        let blocking_timeout = self.options.blocking_timeout;
        self.acquire_with(blocking, blocking_timeout, None).await
    }

    /// 取得鎖，可覆寫阻塞設定與指定 token
    pub async fn acquire_with(
        &mut self,
        blocking: bool,
        blocking_timeout: Option<Duration>,
        token: Option<String>,
    ) -> Result<bool, LockError> {
        let token = token.unwrap_or_else(|| Uuid::new_v4().to_string());
        let deadline = blocking_timeout.map(|limit| Instant::now() + limit);

        loop {
            if self.try_acquire(&token).await? {
                debug!("取得鎖 {}", self.name);
                self.token = Some(token);
                return Ok(true);
            }
            if !blocking {
                return Ok(false);
            }
            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        debug!("等待鎖 {} 超時", self.name);
                        return Ok(false);
                    }
                    self.options.sleep.min(deadline - now)
                }
                None => self.options.sleep,
            };
            tokio::time::sleep(wait).await;
        }
    }

    async fn try_acquire(&self, token: &str) -> Result<bool, RedisClientError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(&self.name).arg(token).arg("NX");
        if let Some(timeout) = self.options.timeout {
            cmd.arg("PX").arg(millis(timeout));
        }
        // 重送 SET NX 會看到自己寫入的 token 而回報失敗
        match self.client.execute_once::<Option<String>>(&cmd).await {
            Ok(reply) => Ok(reply.is_some()),
            Err(err) if err.is_ambiguous() => {
                warn!("鎖 {} 的 SET 沒有收到回覆，檢查是否已寫入: {}", self.name, err);
                let current = self.client.str_get(&self.name).await?;
                Ok(current.as_deref() == Some(token))
            }
            Err(err) => Err(err),
        }
    }

    /// 釋放鎖
    pub async fn release(&mut self) -> Result<(), LockError> {
        let token = self
            .token
            .take()
            .ok_or_else(|| LockError::NotAcquired(self.name.clone()))?;

        let mut conn = self.client.get_connection().await?;
        let released: i64 = RELEASE_SCRIPT
            .key(&self.name)
            .arg(&token)
            .invoke_async(&mut conn)
            .await
            .map_err(RedisClientError::from)?;

        if released == 1 {
            debug!("釋放鎖 {}", self.name);
            Ok(())
        } else {
            warn!("鎖 {} 在釋放前已過期或被他人取得", self.name);
            Err(LockError::NotOwned(self.name.clone()))
        }
    }

    /// 延長存活時間；`replace_ttl` 為真時直接設為 `additional`，否則累加
    pub async fn extend(&mut self, additional: Duration, replace_ttl: bool) -> Result<(), LockError> {
        let token = self.owned_token()?;
        if self.options.timeout.is_none() {
            return Err(LockError::NoTimeout(self.name.clone()));
        }

        let mut conn = self.client.get_connection().await?;
        let extended: i64 = EXTEND_SCRIPT
            .key(&self.name)
            .arg(token)
            .arg(millis(additional))
            .arg(if replace_ttl { "1" } else { "0" })
            .invoke_async(&mut conn)
            .await
            .map_err(RedisClientError::from)?;

        if extended == 1 {
            Ok(())
        } else {
            Err(LockError::NotOwned(self.name.clone()))
        }
    }

    /// 將存活時間重設為建立時的 `timeout`
    pub async fn reacquire(&mut self) -> Result<(), LockError> {
        let token = self.owned_token()?;
        let Some(timeout) = self.options.timeout else {
            return Err(LockError::NoTimeout(self.name.clone()));
        };

        let mut conn = self.client.get_connection().await?;
        let renewed: i64 = REACQUIRE_SCRIPT
            .key(&self.name)
            .arg(token)
            .arg(millis(timeout))
            .invoke_async(&mut conn)
            .await
            .map_err(RedisClientError::from)?;

        if renewed == 1 {
            Ok(())
        } else {
            Err(LockError::NotOwned(self.name.clone()))
        }
    }

    /// 是否有任何人持有此鎖
    pub async fn locked(&self) -> Result<bool, LockError> {
        Ok(self.client.exists(&[self.name.as_str()]).await?)
    }

    /// 是否由此實例持有
    pub async fn owned(&self) -> Result<bool, LockError> {
        let Some(token) = self.token.as_deref() else {
            return Ok(false);
        };
        let current = self.client.str_get(&self.name).await?;
        Ok(current.as_deref() == Some(token))
    }

    /// 取得鎖後執行 `f`，結束後釋放
    pub async fn scoped<F, Fut, T>(&mut self, f: F) -> Result<T, LockError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if !self.acquire().await? {
            return Err(LockError::AcquireFailed(self.name.clone()));
        }
        let output = f().await;
        self.release().await?;
        Ok(output)
    }

    fn owned_token(&self) -> Result<&str, LockError> {
        self.token
            .as_deref()
            .ok_or_else(|| LockError::NotAcquired(self.name.clone()))
    }
}

impl Client {
    /// 建立分散式鎖，鍵名為設定的前綴加上 `name`
    pub fn lock(&self, name: &str, options: LockOptions) -> RedisLock {
        RedisLock {
            client: self.clone(),
            name: format!("{}{}", self.config().lock_prefix, name),
            options,
            token: None,
        }
    }
}
