//! 列表操作

use crate::redis::client::{Client, RedisClientError};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use redis::{Cmd, ToRedisArgs};
use std::time::Duration;

/// `list_iter` 每次讀取的元素數量
const LIST_ITER_PAGE: isize = 100;

/// `list_push` 選項
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListPushOptions {
    /// 從頭部推入（`LPUSH`），預設從尾部
    pub left: bool,
    /// 僅在列表已存在時推入（`LPUSHX`/`RPUSHX`）
    pub xx: bool,
}

impl ListPushOptions {
    pub fn left() -> Self {
        Self {
            left: true,
            xx: false,
        }
    }

    fn command(&self) -> &'static str {
        match (self.left, self.xx) {
            (true, false) => "LPUSH",
            (true, true) => "LPUSHX",
            (false, false) => "RPUSH",
            (false, true) => "RPUSHX",
        }
    }
}

fn bpop_cmd<K: ToRedisArgs>(names: &[K], timeout: Duration, left: bool) -> Cmd {
    let mut cmd = redis::cmd(if left { "BLPOP" } else { "BRPOP" });
    for name in names {
        cmd.arg(name);
    }
    cmd.arg(timeout.as_secs_f64());
    cmd
}

impl Client {
    /// 推入一個或多個值，回傳列表新長度
    ///
    /// `values` 為空時不推入，回傳目前長度。
    pub async fn list_push<V: ToRedisArgs + Sync>(
        &self,
        name: &str,
        values: &[V],
        options: ListPushOptions,
    ) -> Result<i64, RedisClientError> {
        if values.is_empty() {
            return self.list_len(name).await;
        }
        let mut cmd = redis::cmd(options.command());
        cmd.arg(name);
        for value in values {
            cmd.arg(value);
        }
        self.execute(&cmd).await
    }

    /// 在 `ref_value` 之前或之後插入，找不到參考值回傳 `-1`
    pub async fn list_insert<R, V>(
        &self,
        name: &str,
        ref_value: R,
        value: V,
        before: bool,
    ) -> Result<i64, RedisClientError>
    where
        R: ToRedisArgs + Send + Sync,
        V: ToRedisArgs + Send + Sync,
    {
        let position = if before { "BEFORE" } else { "AFTER" };
        self.execute(
            redis::cmd("LINSERT")
                .arg(name)
                .arg(position)
                .arg(ref_value)
                .arg(value),
        )
        .await
    }

    /// 設定指定索引的值
    pub async fn list_set<V: ToRedisArgs + Send + Sync>(
        &self,
        name: &str,
        index: isize,
        value: V,
    ) -> Result<bool, RedisClientError> {
        let _: () = self
            .execute(redis::cmd("LSET").arg(name).arg(index).arg(value))
            .await?;
        Ok(true)
    }

    /// 彈出一個元素
    pub async fn list_pop(
        &self,
        name: &str,
        left: bool,
    ) -> Result<Option<String>, RedisClientError> {
        let command = if left { "LPOP" } else { "RPOP" };
        self.execute(redis::cmd(command).arg(name)).await
    }

    /// 彈出多個元素，`count` 為 0 或列表不存在時回傳 `None`
    pub async fn list_pop_count(
        &self,
        name: &str,
        count: usize,
        left: bool,
    ) -> Result<Option<Vec<String>>, RedisClientError> {
        if count == 0 {
            return Ok(None);
        }
        let command = if left { "LPOP" } else { "RPOP" };
        self.execute(redis::cmd(command).arg(name).arg(count)).await
    }

    /// 移除等於 `value` 的元素；`count` 大於 0 從頭、小於 0 從尾、等於 0 全部
    pub async fn list_rem<V: ToRedisArgs + Send + Sync>(
        &self,
        name: &str,
        value: V,
        count: isize,
    ) -> Result<i64, RedisClientError> {
        self.execute(redis::cmd("LREM").arg(name).arg(count).arg(value))
            .await
    }

    /// 只保留區間內的元素
    pub async fn list_trim(
        &self,
        name: &str,
        start: isize,
        end: isize,
    ) -> Result<bool, RedisClientError> {
        let _: () = self
            .execute(redis::cmd("LTRIM").arg(name).arg(start).arg(end))
            .await?;
        Ok(true)
    }

    /// 整個列表，不存在時為空
    pub async fn list_get(&self, name: &str) -> Result<Vec<String>, RedisClientError> {
        self.list_range(name, 0, -1).await
    }

    /// 整個列表，不存在時為 `None`
    pub async fn list_get_or_none(
        &self,
        name: &str,
    ) -> Result<Option<Vec<String>>, RedisClientError> {
        // Redis 不保存空列表
        let items = self.list_get(name).await?;
        Ok((!items.is_empty()).then_some(items))
    }

    pub async fn list_index(
        &self,
        name: &str,
        index: isize,
    ) -> Result<Option<String>, RedisClientError> {
        self.execute(redis::cmd("LINDEX").arg(name).arg(index)).await
    }

    pub async fn list_len(&self, name: &str) -> Result<i64, RedisClientError> {
        self.execute(redis::cmd("LLEN").arg(name)).await
    }

    pub async fn list_range(
        &self,
        name: &str,
        start: isize,
        end: isize,
    ) -> Result<Vec<String>, RedisClientError> {
        self.execute(redis::cmd("LRANGE").arg(name).arg(start).arg(end))
            .await
    }

    /// 分頁讀取整個列表
    pub fn list_iter<'a>(&'a self, name: &str) -> BoxStream<'a, Result<String, RedisClientError>> {
        let name = name.to_string();
        stream::try_unfold(Some(0isize), move |start| {
            let name = name.clone();
            async move {
                let Some(start) = start else {
                    return Ok::<_, RedisClientError>(None);
                };
                let page = self
                    .list_range(&name, start, start + LIST_ITER_PAGE - 1)
                    .await?;
                let next = (page.len() as isize == LIST_ITER_PAGE).then_some(start + LIST_ITER_PAGE);
                let items = stream::iter(page.into_iter().map(Ok::<String, RedisClientError>));
                Ok(Some((items, next)))
            }
        })
        .try_flatten()
        .boxed()
    }

    /// 阻塞彈出，回傳 `(列表名, 值)`；`timeout` 為零表示無限等待，逾時回傳 `None`
    pub async fn list_bpop<K: ToRedisArgs + Sync>(
        &self,
        names: &[K],
        timeout: Duration,
        left: bool,
    ) -> Result<Option<(String, String)>, RedisClientError> {
        if names.is_empty() {
            return Ok(None);
        }
        self.execute_blocking(&bpop_cmd(names, timeout, left)).await
    }

    /// 從 `src` 尾端彈出並推入 `dst` 頭部
    ///
    /// 提供 `timeout` 時使用阻塞版本 `BRPOPLPUSH`。
    pub async fn list_rpoplpush(
        &self,
        src: &str,
        dst: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<String>, RedisClientError> {
        match timeout {
            Some(timeout) => {
                self.execute_blocking(
                    redis::cmd("BRPOPLPUSH")
                        .arg(src)
                        .arg(dst)
                        .arg(timeout.as_secs_f64()),
                )
                .await
            }
            None => self.execute(redis::cmd("RPOPLPUSH").arg(src).arg(dst)).await,
        }
    }

    /// 列表中是否有等於 `value` 的元素
    pub async fn list_exists<V: ToString>(
        &self,
        name: &str,
        value: V,
    ) -> Result<bool, RedisClientError> {
        let target = value.to_string();
        let mut items = self.list_iter(name);
        while let Some(item) = items.try_next().await? {
            if item == target {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
