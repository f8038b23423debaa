//! 雜湊操作

use crate::redis::client::{Client, RedisClientError};
use crate::redis::operations::scan_cmd;
use futures::stream::BoxStream;
use redis::ToRedisArgs;
use std::collections::HashMap;

impl Client {
    /// 設定欄位，回傳新增的欄位數；`nx` 為真時欄位已存在則不覆寫
    pub async fn hash_set<V: ToRedisArgs + Send + Sync>(
        &self,
        name: &str,
        key: &str,
        value: V,
        nx: bool,
    ) -> Result<i64, RedisClientError> {
        let command = if nx { "HSETNX" } else { "HSET" };
        self.execute(redis::cmd(command).arg(name).arg(key).arg(value))
            .await
    }

    /// 設定多個欄位，回傳新增的欄位數
    pub async fn hash_mset<K, V>(
        &self,
        name: &str,
        mapping: &[(K, V)],
    ) -> Result<i64, RedisClientError>
    where
        K: ToRedisArgs + Sync,
        V: ToRedisArgs + Sync,
    {
        if mapping.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("HSET");
        cmd.arg(name);
        for (key, value) in mapping {
            cmd.arg(key).arg(value);
        }
        self.execute(&cmd).await
    }

    pub async fn hash_del<K: ToRedisArgs + Sync>(
        &self,
        name: &str,
        keys: &[K],
    ) -> Result<i64, RedisClientError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("HDEL");
        cmd.arg(name);
        for key in keys {
            cmd.arg(key);
        }
        self.execute(&cmd).await
    }

    pub async fn hash_get(
        &self,
        name: &str,
        key: &str,
    ) -> Result<Option<String>, RedisClientError> {
        self.execute(redis::cmd("HGET").arg(name).arg(key)).await
    }

    /// 讀取多個欄位，結果與輸入順序一致
    pub async fn hash_mget<K: ToRedisArgs + Sync>(
        &self,
        name: &str,
        keys: &[K],
    ) -> Result<Vec<Option<String>>, RedisClientError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut cmd = redis::cmd("HMGET");
        cmd.arg(name);
        for key in keys {
            cmd.arg(key);
        }
        self.execute(&cmd).await
    }

    pub async fn hash_getall(
        &self,
        name: &str,
    ) -> Result<HashMap<String, String>, RedisClientError> {
        self.execute(redis::cmd("HGETALL").arg(name)).await
    }

    pub async fn hash_exists(&self, name: &str, key: &str) -> Result<bool, RedisClientError> {
        self.execute(redis::cmd("HEXISTS").arg(name).arg(key)).await
    }

    pub async fn hash_len(&self, name: &str) -> Result<i64, RedisClientError> {
        self.execute(redis::cmd("HLEN").arg(name)).await
    }

    pub async fn hash_keys(&self, name: &str) -> Result<Vec<String>, RedisClientError> {
        self.execute(redis::cmd("HKEYS").arg(name)).await
    }

    pub async fn hash_values(&self, name: &str) -> Result<Vec<String>, RedisClientError> {
        self.execute(redis::cmd("HVALS").arg(name)).await
    }

    pub async fn hash_incr(
        &self,
        name: &str,
        key: &str,
        amount: i64,
    ) -> Result<i64, RedisClientError> {
        self.execute(redis::cmd("HINCRBY").arg(name).arg(key).arg(amount))
            .await
    }

    pub async fn hash_decr(
        &self,
        name: &str,
        key: &str,
        amount: i64,
    ) -> Result<i64, RedisClientError> {
        self.hash_incr(name, key, -amount).await
    }

    pub async fn hash_incrfloat(
        &self,
        name: &str,
        key: &str,
        amount: f64,
    ) -> Result<f64, RedisClientError> {
        self.execute(
            redis::cmd("HINCRBYFLOAT")
                .arg(name)
                .arg(key)
                .arg(amount),
        )
        .await
    }

    pub async fn hash_decrfloat(
        &self,
        name: &str,
        key: &str,
        amount: f64,
    ) -> Result<f64, RedisClientError> {
        self.hash_incrfloat(name, key, -amount).await
    }

    /// 單次 `HSCAN`，回傳下一個游標與本批欄位
    pub async fn hash_scan(
        &self,
        name: &str,
        cursor: u64,
        pattern: Option<&str>,
        count: Option<usize>,
    ) -> Result<(u64, HashMap<String, String>), RedisClientError> {
        self.execute(&scan_cmd("HSCAN", Some(name), cursor, pattern, count))
            .await
    }

    /// 逐筆讀取所有欄位
    pub fn hash_scan_iter<'a>(
        &'a self,
        name: &str,
        pattern: Option<&str>,
        count: Option<usize>,
    ) -> BoxStream<'a, Result<(String, String), RedisClientError>> {
        let name = name.to_string();
        let pattern = pattern.map(str::to_string);
        self.cursor_stream(move |cursor| {
            scan_cmd("HSCAN", Some(&name), cursor, pattern.as_deref(), count)
        })
    }
}
