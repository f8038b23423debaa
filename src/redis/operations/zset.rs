//! 有序集合操作
//!
//! 分數邊界參數接受任何可轉成 Redis 參數的值，例如 `1.5`、`"-inf"`、`"(10"`。

use crate::redis::client::{Client, RedisClientError};
use crate::redis::operations::scan_cmd;
use futures::stream::BoxStream;
use redis::{Cmd, ToRedisArgs};

/// `ZADD` 選項
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZAddOptions {
    /// 只新增不更新
    pub nx: bool,
    /// 只更新不新增
    pub xx: bool,
    /// 回傳值計入分數被修改的成員
    pub ch: bool,
    /// 只在新分數較大時更新
    pub gt: bool,
    /// 只在新分數較小時更新
    pub lt: bool,
}

/// `ZRANGE` 選項
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZRangeOptions {
    /// 由大到小
    pub desc: bool,
    /// 區間為分數而非索引
    pub byscore: bool,
}

fn zadd_cmd<M: ToRedisArgs>(name: &str, mapping: &[(M, f64)], options: ZAddOptions) -> Cmd {
    let mut cmd = redis::cmd("ZADD");
    cmd.arg(name);
    if options.nx {
        cmd.arg("NX");
    }
    if options.xx {
        cmd.arg("XX");
    }
    if options.gt {
        cmd.arg("GT");
    }
    if options.lt {
        cmd.arg("LT");
    }
    if options.ch {
        cmd.arg("CH");
    }
    for (member, score) in mapping {
        cmd.arg(*score).arg(member);
    }
    cmd
}

/// `desc` 與 `byscore` 同時成立時 Redis 要求先給上界，這裡自動對調
fn zrange_cmd<S, E>(name: &str, start: S, end: E, options: ZRangeOptions, withscores: bool) -> Cmd
where
    S: ToRedisArgs,
    E: ToRedisArgs,
{
    let mut cmd = redis::cmd("ZRANGE");
    cmd.arg(name);
    if options.desc && options.byscore {
        cmd.arg(end).arg(start);
    } else {
        cmd.arg(start).arg(end);
    }
    if options.byscore {
        cmd.arg("BYSCORE");
    }
    if options.desc {
        cmd.arg("REV");
    }
    if withscores {
        cmd.arg("WITHSCORES");
    }
    cmd
}

fn score_range_cmd<A, B>(
    command: &str,
    name: &str,
    first: A,
    second: B,
    limit: Option<(i64, i64)>,
    withscores: bool,
) -> Cmd
where
    A: ToRedisArgs,
    B: ToRedisArgs,
{
    let mut cmd = redis::cmd(command);
    cmd.arg(name).arg(first).arg(second);
    if withscores {
        cmd.arg("WITHSCORES");
    }
    if let Some((offset, count)) = limit {
        cmd.arg("LIMIT").arg(offset).arg(count);
    }
    cmd
}

impl Client {
    /// 加入或更新成員分數，`mapping` 為 `(成員, 分數)`
    pub async fn zset_add<M: ToRedisArgs + Sync>(
        &self,
        name: &str,
        mapping: &[(M, f64)],
        options: ZAddOptions,
    ) -> Result<i64, RedisClientError> {
        if mapping.is_empty() {
            return Ok(0);
        }
        self.execute(&zadd_cmd(name, mapping, options)).await
    }

    pub async fn zset_rem<M: ToRedisArgs + Sync>(
        &self,
        name: &str,
        members: &[M],
    ) -> Result<i64, RedisClientError> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("ZREM");
        cmd.arg(name);
        for member in members {
            cmd.arg(member);
        }
        self.execute(&cmd).await
    }

    pub async fn zset_score<M: ToRedisArgs + Send + Sync>(
        &self,
        name: &str,
        member: M,
    ) -> Result<Option<f64>, RedisClientError> {
        self.execute(redis::cmd("ZSCORE").arg(name).arg(member)).await
    }

    /// 由小到大的排名（從 0 起算）
    pub async fn zset_rank<M: ToRedisArgs + Send + Sync>(
        &self,
        name: &str,
        member: M,
    ) -> Result<Option<i64>, RedisClientError> {
        self.execute(redis::cmd("ZRANK").arg(name).arg(member)).await
    }

    /// 增加分數，回傳新分數
    pub async fn zset_incr<M: ToRedisArgs + Send + Sync>(
        &self,
        name: &str,
        amount: f64,
        member: M,
    ) -> Result<f64, RedisClientError> {
        self.execute(redis::cmd("ZINCRBY").arg(name).arg(amount).arg(member))
            .await
    }

    pub async fn zset_decr<M: ToRedisArgs + Send + Sync>(
        &self,
        name: &str,
        amount: f64,
        member: M,
    ) -> Result<f64, RedisClientError> {
        self.zset_incr(name, -amount, member).await
    }

    pub async fn zset_card(&self, name: &str) -> Result<i64, RedisClientError> {
        self.execute(redis::cmd("ZCARD").arg(name)).await
    }

    /// 分數介於 `min` 與 `max` 之間的成員數
    pub async fn zset_count<A, B>(&self, name: &str, min: A, max: B) -> Result<i64, RedisClientError>
    where
        A: ToRedisArgs + Send + Sync,
        B: ToRedisArgs + Send + Sync,
    {
        self.execute(redis::cmd("ZCOUNT").arg(name).arg(min).arg(max))
            .await
    }

    /// 區間內的成員
    ///
    /// 以索引取時 `start`/`end` 為排序後的位置；`byscore` 時為分數下界與上界，
    /// 即使 `desc` 也依序傳入下界、上界。
    pub async fn zset_range<S, E>(
        &self,
        name: &str,
        start: S,
        end: E,
        options: ZRangeOptions,
    ) -> Result<Vec<String>, RedisClientError>
    where
        S: ToRedisArgs + Send + Sync,
        E: ToRedisArgs + Send + Sync,
    {
        self.execute(&zrange_cmd(name, start, end, options, false))
            .await
    }

    /// 同 [`Client::zset_range`]，附帶分數
    pub async fn zset_range_withscores<S, E>(
        &self,
        name: &str,
        start: S,
        end: E,
        options: ZRangeOptions,
    ) -> Result<Vec<(String, f64)>, RedisClientError>
    where
        S: ToRedisArgs + Send + Sync,
        E: ToRedisArgs + Send + Sync,
    {
        self.execute(&zrange_cmd(name, start, end, options, true))
            .await
    }

    /// 由大到小依索引取區間
    pub async fn zset_revrange(
        &self,
        name: &str,
        start: isize,
        end: isize,
    ) -> Result<Vec<String>, RedisClientError> {
        self.execute(redis::cmd("ZREVRANGE").arg(name).arg(start).arg(end))
            .await
    }

    pub async fn zset_revrange_withscores(
        &self,
        name: &str,
        start: isize,
        end: isize,
    ) -> Result<Vec<(String, f64)>, RedisClientError> {
        self.execute(
            redis::cmd("ZREVRANGE")
                .arg(name)
                .arg(start)
                .arg(end)
                .arg("WITHSCORES"),
        )
        .await
    }

    /// 依分數由小到大，`limit` 為 `(offset, count)`
    pub async fn zset_rangebyscore<A, B>(
        &self,
        name: &str,
        min: A,
        max: B,
        limit: Option<(i64, i64)>,
    ) -> Result<Vec<String>, RedisClientError>
    where
        A: ToRedisArgs + Send + Sync,
        B: ToRedisArgs + Send + Sync,
    {
        self.execute(&score_range_cmd("ZRANGEBYSCORE", name, min, max, limit, false))
            .await
    }

    pub async fn zset_rangebyscore_withscores<A, B>(
        &self,
        name: &str,
        min: A,
        max: B,
        limit: Option<(i64, i64)>,
    ) -> Result<Vec<(String, f64)>, RedisClientError>
    where
        A: ToRedisArgs + Send + Sync,
        B: ToRedisArgs + Send + Sync,
    {
        self.execute(&score_range_cmd("ZRANGEBYSCORE", name, min, max, limit, true))
            .await
    }

    /// 依分數由大到小，先上界後下界
    pub async fn zset_revrangebyscore<A, B>(
        &self,
        name: &str,
        max: A,
        min: B,
        limit: Option<(i64, i64)>,
    ) -> Result<Vec<String>, RedisClientError>
    where
        A: ToRedisArgs + Send + Sync,
        B: ToRedisArgs + Send + Sync,
    {
        self.execute(&score_range_cmd("ZREVRANGEBYSCORE", name, max, min, limit, false))
            .await
    }

    pub async fn zset_revrangebyscore_withscores<A, B>(
        &self,
        name: &str,
        max: A,
        min: B,
        limit: Option<(i64, i64)>,
    ) -> Result<Vec<(String, f64)>, RedisClientError>
    where
        A: ToRedisArgs + Send + Sync,
        B: ToRedisArgs + Send + Sync,
    {
        self.execute(&score_range_cmd("ZREVRANGEBYSCORE", name, max, min, limit, true))
            .await
    }

    /// 單次 `ZSCAN`
    pub async fn zset_scan(
        &self,
        name: &str,
        cursor: u64,
        pattern: Option<&str>,
        count: Option<usize>,
    ) -> Result<(u64, Vec<(String, f64)>), RedisClientError> {
        self.execute(&scan_cmd("ZSCAN", Some(name), cursor, pattern, count))
            .await
    }

    /// 逐筆讀取所有成員與分數
    pub fn zset_scan_iter<'a>(
        &'a self,
        name: &str,
        pattern: Option<&str>,
        count: Option<usize>,
    ) -> BoxStream<'a, Result<(String, f64), RedisClientError>> {
        let name = name.to_string();
        let pattern = pattern.map(str::to_string);
        self.cursor_stream(move |cursor| {
            scan_cmd("ZSCAN", Some(&name), cursor, pattern.as_deref(), count)
        })
    }

    /// 依排名區間移除，回傳移除數量
    pub async fn zset_remrangebyrank(
        &self,
        name: &str,
        start: isize,
        stop: isize,
    ) -> Result<i64, RedisClientError> {
        self.execute(
            redis::cmd("ZREMRANGEBYRANK")
                .arg(name)
                .arg(start)
                .arg(stop),
        )
        .await
    }

    /// 依分數區間移除，回傳移除數量
    pub async fn zset_remrangebyscore<A, B>(
        &self,
        name: &str,
        min: A,
        max: B,
    ) -> Result<i64, RedisClientError>
    where
        A: ToRedisArgs + Send + Sync,
        B: ToRedisArgs + Send + Sync,
    {
        self.execute(redis::cmd("ZREMRANGEBYSCORE").arg(name).arg(min).arg(max))
            .await
    }

    /// 由小到大的所有成員
    pub async fn zset_getall(&self, name: &str) -> Result<Vec<String>, RedisClientError> {
        self.zset_range(name, 0, -1, ZRangeOptions::default()).await
    }

    /// 由小到大的所有成員與分數
    pub async fn zset_getall_withscores(
        &self,
        name: &str,
    ) -> Result<Vec<(String, f64)>, RedisClientError> {
        self.zset_range_withscores(name, 0, -1, ZRangeOptions::default())
            .await
    }

    pub async fn zset_exists<M: ToRedisArgs + Send + Sync>(
        &self,
        name: &str,
        member: M,
    ) -> Result<bool, RedisClientError> {
        Ok(self.zset_score(name, member).await?.is_some())
    }
}
