//! 管道與交易

use crate::redis::client::{Client, RedisClientError};
use redis::{FromRedisValue, Pipeline};

impl Client {
    /// 建立管道，`transaction` 為真時以 `MULTI`/`EXEC` 包裹
    pub fn pipeline(&self, transaction: bool) -> Pipeline {
        let mut pipe = redis::pipe();
        if transaction {
            pipe.atomic();
        }
        pipe
    }

    /// 建立並執行管道，回傳各命令回覆組成的值
    ///
    /// ```no_run
    /// # async fn demo(client: &redisz::Client) -> Result<(), redisz::RedisClientError> {
    /// let (count, members): (i64, Vec<String>) = client
    ///     .with_pipeline(true, |pipe| {
    ///         pipe.cmd("SADD").arg("tags").arg("rust");
    ///         pipe.cmd("SMEMBERS").arg("tags");
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with_pipeline<T, F>(
        &self,
        transaction: bool,
        build: F,
    ) -> Result<T, RedisClientError>
    where
        T: FromRedisValue,
        F: FnOnce(&mut Pipeline),
    {
        let mut pipe = self.pipeline(transaction);
        build(&mut pipe);
        self.execute_pipeline(&pipe).await
    }
}
