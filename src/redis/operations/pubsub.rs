//! 發布/訂閱

use crate::redis::client::{Client, RedisClientError};
use futures::StreamExt;
use redis::aio::PubSub;
use redis::{Msg, RedisError, ToRedisArgs};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 收到的訊息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PubSubMessage {
    pub channel: String,
    /// 模式訂閱時符合的模式
    pub pattern: Option<String>,
    pub payload: String,
}

impl PubSubMessage {
    fn from_msg(msg: &Msg) -> Result<Self, RedisError> {
        let payload: Vec<u8> = msg.get_payload()?;
        let pattern = if msg.from_pattern() {
            Some(msg.get_pattern::<String>()?)
        } else {
            None
        };
        Ok(Self {
            channel: msg.get_channel_name().to_string(),
            pattern,
            payload: String::from_utf8_lossy(&payload).into_owned(),
        })
    }
}

#[derive(Clone, Copy)]
enum Mode {
    Channel,
    Pattern,
}

impl Client {
    /// 發布訊息，回傳收到訊息的訂閱者數量
    pub async fn publish<M: ToRedisArgs + Send + Sync>(
        &self,
        channel: &str,
        message: M,
    ) -> Result<i64, RedisClientError> {
        self.execute(redis::cmd("PUBLISH").arg(channel).arg(message))
            .await
    }

    /// 取得獨立的發布訂閱連接
    pub async fn pubsub(&self) -> Result<PubSub, RedisClientError> {
        let client = self.pool().pubsub_client().await?;
        Ok(client.get_async_pubsub().await?)
    }

    /// 訂閱頻道並對每則訊息呼叫 `callback`
    ///
    /// `callback` 回傳 `false` 時取消訂閱並返回；連接中斷時同樣返回。
    pub async fn subscribe<C, F>(&self, channels: &[C], callback: F) -> Result<(), RedisClientError>
    where
        C: AsRef<str> + Sync,
        F: FnMut(PubSubMessage) -> bool + Send,
    {
        self.listen(Mode::Channel, channels, callback).await
    }

    /// 以模式訂閱，例如 `news.*`
    pub async fn psubscribe<C, F>(
        &self,
        patterns: &[C],
        callback: F,
    ) -> Result<(), RedisClientError>
    where
        C: AsRef<str> + Sync,
        F: FnMut(PubSubMessage) -> bool + Send,
    {
        self.listen(Mode::Pattern, patterns, callback).await
    }

    /// 在背景任務中訂閱頻道
    pub fn spawn_subscriber<F>(
        &self,
        channels: Vec<String>,
        callback: F,
    ) -> JoinHandle<Result<(), RedisClientError>>
    where
        F: FnMut(PubSubMessage) -> bool + Send + 'static,
    {
        let client = self.clone();
        tokio::spawn(async move { client.subscribe(&channels, callback).await })
    }

    async fn listen<C, F>(
        &self,
        mode: Mode,
        targets: &[C],
        mut callback: F,
    ) -> Result<(), RedisClientError>
    where
        C: AsRef<str> + Sync,
        F: FnMut(PubSubMessage) -> bool + Send,
    {
        if targets.is_empty() {
            return Err(RedisClientError::Other("至少需要一個訂閱目標".to_string()));
        }

        let mut pubsub = self.pubsub().await?;
        for target in targets {
            match mode {
                Mode::Channel => pubsub.subscribe(target.as_ref()).await?,
                Mode::Pattern => pubsub.psubscribe(target.as_ref()).await?,
            }
        }
        info!("已訂閱 {} 個目標", targets.len());

        let stopped = {
            let mut messages = pubsub.on_message();
            let mut stopped = false;
            while let Some(msg) = messages.next().await {
                let message = match PubSubMessage::from_msg(&msg) {
                    Ok(message) => message,
                    Err(err) => {
                        warn!("無法解析訂閱訊息: {}", err);
                        continue;
                    }
                };
                debug!("收到頻道 {} 的訊息", message.channel);
                if !callback(message) {
                    stopped = true;
                    break;
                }
            }
            stopped
        };

        if !stopped {
            warn!("訂閱連接已關閉");
            return Ok(());
        }

        for target in targets {
            match mode {
                Mode::Channel => pubsub.unsubscribe(target.as_ref()).await?,
                Mode::Pattern => pubsub.punsubscribe(target.as_ref()).await?,
            }
        }
        info!("已取消訂閱 {} 個目標", targets.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redis::operations::test_support::unique_prefix;
    use crate::redis::test_config::RedisTestConfig;
    use std::time::Duration;

    async fn publish_until_received(client: &Client, channel: &str, message: &str) {
        // 等待訂閱者就緒
        for _ in 0..50 {
            if client.publish(channel, message).await.unwrap() > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("沒有訂閱者收到 {}", channel);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let Some(client) =
            RedisTestConfig::skip_if_redis_unavailable("test_publish_without_subscribers").await
        else {
            return;
        };
        let channel = unique_prefix("nobody");
        assert_eq!(client.publish(&channel, "hello").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_spawned_subscriber_stops_on_false() {
        let Some(client) =
            RedisTestConfig::skip_if_redis_unavailable("test_spawned_subscriber_stops_on_false")
                .await
        else {
            return;
        };
        let channel = unique_prefix("channel");
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let handle = client.spawn_subscriber(vec![channel.clone()], move |message| {
            let keep_going = message.payload != "exit";
            let _ = tx.send(message);
            keep_going
        });

        publish_until_received(&client, &channel, "hello").await;
        client.publish(&channel, "exit").await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("訂閱任務沒有結束")
            .unwrap();
        assert!(result.is_ok());

        let mut payloads = Vec::new();
        while let Ok(message) = rx.try_recv() {
            assert_eq!(message.channel, channel);
            assert_eq!(message.pattern, None);
            payloads.push(message.payload);
        }
        assert_eq!(payloads.last().map(String::as_str), Some("exit"));
        assert!(payloads.iter().any(|p| p == "hello"));
    }

    #[tokio::test]
    async fn test_pattern_subscription() {
        let Some(client) =
            RedisTestConfig::skip_if_redis_unavailable("test_pattern_subscription").await
        else {
            return;
        };
        let prefix = unique_prefix("news");
        let pattern = format!("{}.*", prefix);
        let channel = format!("{}.sports", prefix);

        let subscriber = client.clone();
        let watched = pattern.clone();
        let handle = tokio::spawn(async move {
            let mut received = None;
            let result = subscriber
                .psubscribe(&[watched.as_str()], |message| {
                    received = Some(message);
                    false
                })
                .await;
            result.map(|_| received)
        });

        publish_until_received(&client, &channel, "goal").await;

        let received = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("訂閱任務沒有結束")
            .unwrap()
            .unwrap()
            .expect("沒有收到訊息");
        assert_eq!(received.channel, channel);
        assert_eq!(received.pattern.as_deref(), Some(pattern.as_str()));
        assert_eq!(received.payload, "goal");
    }

    #[tokio::test]
    async fn test_subscribe_requires_channels() {
        let Some(client) =
            RedisTestConfig::skip_if_redis_unavailable("test_subscribe_requires_channels").await
        else {
            return;
        };
        let channels: [&str; 0] = [];
        let result = client.subscribe(&channels, |_| true).await;
        assert!(result.is_err());
    }
}
