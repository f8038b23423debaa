//! 字串操作

use crate::redis::client::{Client, RedisClientError};
use redis::{Cmd, ToRedisArgs};

/// `SET` 命令選項
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// 過期秒數
    pub ex: Option<u64>,
    /// 過期毫秒數
    pub px: Option<u64>,
    /// 僅在鍵不存在時設定
    pub nx: bool,
    /// 僅在鍵已存在時設定
    pub xx: bool,
}

impl SetOptions {
    pub fn ex(seconds: u64) -> Self {
        Self {
            ex: Some(seconds),
            ..Self::default()
        }
    }

    pub fn nx() -> Self {
        Self {
            nx: true,
            ..Self::default()
        }
    }

    fn build<V: ToRedisArgs>(&self, name: &str, value: V) -> Cmd {
        let mut cmd = redis::cmd("SET");
        cmd.arg(name).arg(value);
        if let Some(seconds) = self.ex {
            cmd.arg("EX").arg(seconds);
        }
        if let Some(millis) = self.px {
            cmd.arg("PX").arg(millis);
        }
        if self.nx {
            cmd.arg("NX");
        }
        if self.xx {
            cmd.arg("XX");
        }
        cmd
    }
}

impl Client {
    /// 設定字串值，`NX`/`XX` 條件不成立時回傳 `false`
    pub async fn str_set<V: ToRedisArgs + Send + Sync>(
        &self,
        name: &str,
        value: V,
        options: SetOptions,
    ) -> Result<bool, RedisClientError> {
        let reply: Option<String> = self.execute(&options.build(name, value)).await?;
        Ok(reply.is_some())
    }

    pub async fn str_get(&self, name: &str) -> Result<Option<String>, RedisClientError> {
        self.execute(redis::cmd("GET").arg(name)).await
    }

    /// 一次設定多個鍵，空映射不發送命令並回傳 `false`
    pub async fn str_mset<K, V>(&self, mapping: &[(K, V)]) -> Result<bool, RedisClientError>
    where
        K: ToRedisArgs + Sync,
        V: ToRedisArgs + Sync,
    {
        if mapping.is_empty() {
            return Ok(false);
        }
        let mut cmd = redis::cmd("MSET");
        for (key, value) in mapping {
            cmd.arg(key).arg(value);
        }
        let _: () = self.execute(&cmd).await?;
        Ok(true)
    }

    /// 一次讀取多個鍵，結果與輸入順序一致
    pub async fn str_mget<K: ToRedisArgs + Sync>(
        &self,
        names: &[K],
    ) -> Result<Vec<Option<String>>, RedisClientError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let mut cmd = redis::cmd("MGET");
        for name in names {
            cmd.arg(name);
        }
        self.execute(&cmd).await
    }

    /// 附加到字串尾端，回傳新長度；`value` 為 `None` 時只回傳目前長度
    pub async fn str_append<V: ToRedisArgs + Send + Sync>(
        &self,
        name: &str,
        value: Option<V>,
    ) -> Result<i64, RedisClientError> {
        match value {
            Some(value) => self.execute(redis::cmd("APPEND").arg(name).arg(value)).await,
            None => self.str_len(name).await,
        }
    }

    /// 設定新值並回傳舊值
    pub async fn str_getset<V: ToRedisArgs + Send + Sync>(
        &self,
        name: &str,
        value: V,
    ) -> Result<Option<String>, RedisClientError> {
        self.execute(redis::cmd("GETSET").arg(name).arg(value)).await
    }

    /// 從 `offset` 起覆寫，回傳新長度
    pub async fn str_setrange<V: ToRedisArgs + Send + Sync>(
        &self,
        name: &str,
        offset: usize,
        value: V,
    ) -> Result<i64, RedisClientError> {
        self.execute(redis::cmd("SETRANGE").arg(name).arg(offset).arg(value))
            .await
    }

    /// 子字串，`start` 與 `end` 皆為閉區間且可為負數
    pub async fn str_getrange(
        &self,
        name: &str,
        start: isize,
        end: isize,
    ) -> Result<String, RedisClientError> {
        self.execute(redis::cmd("GETRANGE").arg(name).arg(start).arg(end))
            .await
    }

    pub async fn str_len(&self, name: &str) -> Result<i64, RedisClientError> {
        self.execute(redis::cmd("STRLEN").arg(name)).await
    }

    pub async fn str_incr(&self, name: &str, amount: i64) -> Result<i64, RedisClientError> {
        self.execute(redis::cmd("INCRBY").arg(name).arg(amount)).await
    }

    pub async fn str_decr(&self, name: &str, amount: i64) -> Result<i64, RedisClientError> {
        self.execute(redis::cmd("DECRBY").arg(name).arg(amount)).await
    }

    pub async fn str_incrfloat(&self, name: &str, amount: f64) -> Result<f64, RedisClientError> {
        self.execute(redis::cmd("INCRBYFLOAT").arg(name).arg(amount))
            .await
    }

    pub async fn str_decrfloat(&self, name: &str, amount: f64) -> Result<f64, RedisClientError> {
        self.str_incrfloat(name, -amount).await
    }
}
