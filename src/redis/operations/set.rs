//! 集合操作

use crate::redis::client::{Client, RedisClientError};
use crate::redis::operations::scan_cmd;
use futures::stream::BoxStream;
use redis::{Cmd, ToRedisArgs};
use std::collections::HashSet;

fn multi_key_cmd<K: ToRedisArgs>(command: &str, dest: Option<&str>, names: &[K]) -> Cmd {
    let mut cmd = redis::cmd(command);
    if let Some(dest) = dest {
        cmd.arg(dest);
    }
    for name in names {
        cmd.arg(name);
    }
    cmd
}

impl Client {
    /// 加入成員，回傳新加入的數量
    pub async fn set_add<V: ToRedisArgs + Sync>(
        &self,
        name: &str,
        values: &[V],
    ) -> Result<i64, RedisClientError> {
        if values.is_empty() {
            return Ok(0);
        }
        self.execute(&multi_key_cmd("SADD", Some(name), values)).await
    }

    /// 移除成員，回傳實際移除的數量
    pub async fn set_rem<V: ToRedisArgs + Sync>(
        &self,
        name: &str,
        values: &[V],
    ) -> Result<i64, RedisClientError> {
        if values.is_empty() {
            return Ok(0);
        }
        self.execute(&multi_key_cmd("SREM", Some(name), values)).await
    }

    pub async fn set_card(&self, name: &str) -> Result<i64, RedisClientError> {
        self.execute(redis::cmd("SCARD").arg(name)).await
    }

    pub async fn set_ismember<V: ToRedisArgs + Send + Sync>(
        &self,
        name: &str,
        value: V,
    ) -> Result<bool, RedisClientError> {
        self.execute(redis::cmd("SISMEMBER").arg(name).arg(value)).await
    }

    pub async fn set_members(&self, name: &str) -> Result<HashSet<String>, RedisClientError> {
        self.execute(redis::cmd("SMEMBERS").arg(name)).await
    }

    /// 隨機彈出一個成員
    pub async fn set_pop(&self, name: &str) -> Result<Option<String>, RedisClientError> {
        self.execute(redis::cmd("SPOP").arg(name)).await
    }

    /// 隨機彈出至多 `count` 個成員
    pub async fn set_pop_count(
        &self,
        name: &str,
        count: usize,
    ) -> Result<Vec<String>, RedisClientError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.execute(redis::cmd("SPOP").arg(name).arg(count)).await
    }

    /// 單次 `SSCAN`
    pub async fn set_scan(
        &self,
        name: &str,
        cursor: u64,
        pattern: Option<&str>,
        count: Option<usize>,
    ) -> Result<(u64, Vec<String>), RedisClientError> {
        self.execute(&scan_cmd("SSCAN", Some(name), cursor, pattern, count))
            .await
    }

    /// 逐筆讀取所有成員，成員可能重複出現
    pub fn set_scan_iter<'a>(
        &'a self,
        name: &str,
        pattern: Option<&str>,
        count: Option<usize>,
    ) -> BoxStream<'a, Result<String, RedisClientError>> {
        let name = name.to_string();
        let pattern = pattern.map(str::to_string);
        self.cursor_stream(move |cursor| {
            scan_cmd("SSCAN", Some(&name), cursor, pattern.as_deref(), count)
        })
    }

    /// 將成員從 `src` 移到 `dst`
    pub async fn set_move<V: ToRedisArgs + Send + Sync>(
        &self,
        src: &str,
        dst: &str,
        value: V,
    ) -> Result<bool, RedisClientError> {
        self.execute(redis::cmd("SMOVE").arg(src).arg(dst).arg(value))
            .await
    }

    /// 第一個集合減去其餘集合
    pub async fn set_diff<K: ToRedisArgs + Sync>(
        &self,
        names: &[K],
    ) -> Result<HashSet<String>, RedisClientError> {
        self.set_algebra("SDIFF", names).await
    }

    /// 差集存入 `dest`，回傳結果數量
    pub async fn set_diff_store<K: ToRedisArgs + Sync>(
        &self,
        dest: &str,
        names: &[K],
    ) -> Result<i64, RedisClientError> {
        self.set_algebra_store("SDIFFSTORE", dest, names).await
    }

    pub async fn set_inter<K: ToRedisArgs + Sync>(
        &self,
        names: &[K],
    ) -> Result<HashSet<String>, RedisClientError> {
        self.set_algebra("SINTER", names).await
    }

    pub async fn set_inter_store<K: ToRedisArgs + Sync>(
        &self,
        dest: &str,
        names: &[K],
    ) -> Result<i64, RedisClientError> {
        self.set_algebra_store("SINTERSTORE", dest, names).await
    }

    pub async fn set_union<K: ToRedisArgs + Sync>(
        &self,
        names: &[K],
    ) -> Result<HashSet<String>, RedisClientError> {
        self.set_algebra("SUNION", names).await
    }

    pub async fn set_union_store<K: ToRedisArgs + Sync>(
        &self,
        dest: &str,
        names: &[K],
    ) -> Result<i64, RedisClientError> {
        self.set_algebra_store("SUNIONSTORE", dest, names).await
    }

    async fn set_algebra<K: ToRedisArgs + Sync>(
        &self,
        command: &str,
        names: &[K],
    ) -> Result<HashSet<String>, RedisClientError> {
        if names.is_empty() {
            return Ok(HashSet::new());
        }
        self.execute(&multi_key_cmd(command, None, names)).await
    }

    async fn set_algebra_store<K: ToRedisArgs + Sync>(
        &self,
        command: &str,
        dest: &str,
        names: &[K],
    ) -> Result<i64, RedisClientError> {
        if names.is_empty() {
            return Ok(0);
        }
        self.execute(&multi_key_cmd(command, Some(dest), names)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redis::operations::test_support::command_args;
    use crate::redis::test_config::UnreachablePool;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_empty_inputs_skip_round_trip() {
        let pool = Arc::new(UnreachablePool::new());
        let client = pool.client(0);
        let none: [&str; 0] = [];

        assert_eq!(client.set_add("tags", &none).await.unwrap(), 0);
        assert_eq!(client.set_diff_store("dst", &none).await.unwrap(), 0);
        assert_eq!(client.set_inter_store("dst", &none).await.unwrap(), 0);
        assert_eq!(client.set_union_store("dst", &none).await.unwrap(), 0);
        assert_eq!(pool.attempts(), 0);
    }

    #[test]
    fn test_multi_key_cmd() {
        let cmd = multi_key_cmd("SUNIONSTORE", Some("dst"), &["a", "b"]);
        assert_eq!(command_args(&cmd), vec!["SUNIONSTORE", "dst", "a", "b"]);

        let cmd = multi_key_cmd("SDIFF", None, &["a", "b", "c"]);
        assert_eq!(command_args(&cmd), vec!["SDIFF", "a", "b", "c"]);
    }
}
