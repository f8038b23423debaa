//! redisz：支援單機、叢集與哨兵部署的 Redis 便利客戶端
//!
//! 以一個連接字串選擇部署拓撲，並在 [`Client`] 上提供各資料類型的操作方法。

// 模組定義
pub mod config;
pub mod monitor;
pub mod redis;

pub use crate::redis::{
    Client, ConnectionSpec, RedisClientError, RedisLock, RedisValue, Topology,
};
