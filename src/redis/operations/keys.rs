//! 全域鍵操作

use crate::redis::client::{Client, RedisClientError};
use crate::redis::operations::scan_cmd;
use chrono::{DateTime, Utc};
use crate::redis::topology::Topology;
use futures::stream::{self, BoxStream, StreamExt};
use redis::{Cmd, ToRedisArgs};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// `TYPE` 命令回報的鍵類型
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    String,
    List,
    Hash,
    Set,
    ZSet,
    Stream,
    /// 鍵不存在
    None,
    /// 模組提供的其他類型
    Other(String),
}

impl KeyType {
    pub fn as_str(&self) -> &str {
        match self {
            KeyType::String => "string",
            KeyType::List => "list",
            KeyType::Hash => "hash",
            KeyType::Set => "set",
            KeyType::ZSet => "zset",
            KeyType::Stream => "stream",
            KeyType::None => "none",
            KeyType::Other(name) => name,
        }
    }
}

impl From<&str> for KeyType {
    fn from(value: &str) -> Self {
        match value {
            "string" => KeyType::String,
            "list" => KeyType::List,
            "hash" => KeyType::Hash,
            "set" => KeyType::Set,
            "zset" => KeyType::ZSet,
            "stream" => KeyType::Stream,
            "none" => KeyType::None,
            other => KeyType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `SORT` 命令選項
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortOptions {
    /// `(offset, count)`
    pub limit: Option<(i64, i64)>,
    /// 依外部鍵排序的模式，例如 `weight_*`
    pub by: Option<String>,
    /// 取回外部鍵的模式，可多個
    pub get: Vec<String>,
    pub desc: bool,
    /// 以字典序排序
    pub alpha: bool,
}

impl SortOptions {
    fn build(&self, name: &str, store: Option<&str>) -> Cmd {
        let mut cmd = redis::cmd("SORT");
        cmd.arg(name);
        if let Some(by) = &self.by {
            cmd.arg("BY").arg(by);
        }
        if let Some((offset, count)) = self.limit {
            cmd.arg("LIMIT").arg(offset).arg(count);
        }
        for pattern in &self.get {
            cmd.arg("GET").arg(pattern);
        }
        if self.desc {
            cmd.arg("DESC");
        }
        if self.alpha {
            cmd.arg("ALPHA");
        }
        if let Some(dest) = store {
            cmd.arg("STORE").arg(dest);
        }
        cmd
    }
}

impl Client {
    /// 鍵的類型
    pub async fn get_type(&self, name: &str) -> Result<KeyType, RedisClientError> {
        let kind: String = self.execute(redis::cmd("TYPE").arg(name)).await?;
        Ok(KeyType::from(kind.as_str()))
    }

    /// 所有鍵是否都存在，空列表回傳 `false`
    pub async fn exists<K: ToRedisArgs + Sync>(
        &self,
        names: &[K],
    ) -> Result<bool, RedisClientError> {
        if names.is_empty() {
            return Ok(false);
        }
        let count = self.exists_count(names).await?;
        Ok(count == names.len() as i64)
    }

    /// 存在的鍵數量，重複的鍵重複計算
    pub async fn exists_count<K: ToRedisArgs + Sync>(
        &self,
        names: &[K],
    ) -> Result<i64, RedisClientError> {
        if names.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("EXISTS");
        for name in names {
            cmd.arg(name);
        }
        self.execute(&cmd).await
    }

    /// 符合模式的所有鍵
    ///
    /// 會阻塞伺服器直到掃描完成，大量資料時請改用 [`Client::scan_iter`]。
    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>, RedisClientError> {
        self.execute(redis::cmd("KEYS").arg(pattern)).await
    }

    /// 以 `SCAN` 逐批讀取符合模式的鍵
    ///
    /// 集群模式下 `SCAN` 只會送到單一節點，串流直接回傳
    /// [`RedisClientError::Unsupported`]，請改用 [`Client::keys`]。
    pub fn scan_iter(
        &self,
        pattern: Option<&str>,
        count: Option<usize>,
    ) -> BoxStream<'_, Result<String, RedisClientError>> {
        if *self.topology() == Topology::Cluster {
            let err = RedisClientError::Unsupported("集群模式下 SCAN 無法涵蓋所有節點".to_string());
            return stream::iter([Err(err)]).boxed();
        }
        let pattern = pattern.map(str::to_string);
        self.cursor_stream(move |cursor| scan_cmd("SCAN", None, cursor, pattern.as_deref(), count))
    }

    /// 刪除鍵，回傳實際刪除的數量
    pub async fn delete<K: ToRedisArgs + Sync>(
        &self,
        names: &[K],
    ) -> Result<i64, RedisClientError> {
        if names.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("DEL");
        for name in names {
            cmd.arg(name);
        }
        let deleted: i64 = self.execute(&cmd).await?;
        debug!("刪除 {} 個鍵", deleted);
        Ok(deleted)
    }

    /// 重新命名鍵，`nx` 為真時目標已存在則不動作並回傳 `false`
    pub async fn rename(&self, src: &str, dst: &str, nx: bool) -> Result<bool, RedisClientError> {
        if nx {
            return self.execute(redis::cmd("RENAMENX").arg(src).arg(dst)).await;
        }
        let _: () = self.execute(redis::cmd("RENAME").arg(src).arg(dst)).await?;
        Ok(true)
    }

    /// 剩餘存活秒數，`-1` 表示沒有過期時間，`-2` 表示鍵不存在
    pub async fn ttl(&self, name: &str) -> Result<i64, RedisClientError> {
        self.execute(redis::cmd("TTL").arg(name)).await
    }

    /// 設定存活秒數
    pub async fn expire(&self, name: &str, seconds: i64) -> Result<bool, RedisClientError> {
        self.execute(redis::cmd("EXPIRE").arg(name).arg(seconds)).await
    }

    /// 設定過期時間點
    pub async fn expireat(
        &self,
        name: &str,
        when: DateTime<Utc>,
    ) -> Result<bool, RedisClientError> {
        self.execute(redis::cmd("EXPIREAT").arg(name).arg(when.timestamp()))
            .await
    }

    /// 移除過期時間
    pub async fn persist(&self, name: &str) -> Result<bool, RedisClientError> {
        self.execute(redis::cmd("PERSIST").arg(name)).await
    }

    /// 排序列表、集合或有序集合的元素
    pub async fn sort(
        &self,
        name: &str,
        options: &SortOptions,
    ) -> Result<Vec<String>, RedisClientError> {
        self.execute(&options.build(name, None)).await
    }

    /// 排序並將結果存入 `dest`，回傳結果數量
    pub async fn sort_store(
        &self,
        name: &str,
        dest: &str,
        options: &SortOptions,
    ) -> Result<i64, RedisClientError> {
        self.execute(&options.build(name, Some(dest))).await
    }
}
