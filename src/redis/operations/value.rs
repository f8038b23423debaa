//! 依值的形狀選擇 Redis 類型的讀寫

use super::keys::KeyType;
use super::list::ListPushOptions;
use super::string::SetOptions;
use super::zset::ZAddOptions;
use crate::redis::client::{Client, RedisClientError};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

/// `set_value`/`get_value` 使用的值
///
/// 由 Rust 原生值轉換時自動推斷類型：字串與數字為字串，`Vec` 為列表，
/// 映射為雜湊，集合為集合。有序集合需以 [`RedisValue::zset`] 明確建立。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RedisValue {
    String(String),
    List(Vec<String>),
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
    /// `(成員, 分數)`，由小到大
    ZSet(Vec<(String, f64)>),
}

impl RedisValue {
    /// 建立有序集合值
    pub fn zset<I, M>(items: I) -> Self
    where
        I: IntoIterator<Item = (M, f64)>,
        M: ToString,
    {
        RedisValue::ZSet(
            items
                .into_iter()
                .map(|(member, score)| (member.to_string(), score))
                .collect(),
        )
    }

    /// 對應的 Redis 類型
    pub fn kind(&self) -> KeyType {
        match self {
            RedisValue::String(_) => KeyType::String,
            RedisValue::List(_) => KeyType::List,
            RedisValue::Hash(_) => KeyType::Hash,
            RedisValue::Set(_) => KeyType::Set,
            RedisValue::ZSet(_) => KeyType::ZSet,
        }
    }
}

impl From<&str> for RedisValue {
    fn from(value: &str) -> Self {
        RedisValue::String(value.to_string())
    }
}

impl From<String> for RedisValue {
    fn from(value: String) -> Self {
        RedisValue::String(value)
    }
}

macro_rules! string_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for RedisValue {
                fn from(value: $ty) -> Self {
                    RedisValue::String(value.to_string())
                }
            }
        )*
    };
}

string_from_number!(i32, i64, u32, u64, usize);

impl From<f64> for RedisValue {
    // 保留小數點，1.0 寫成 "1.0"
    fn from(value: f64) -> Self {
        RedisValue::String(format!("{:?}", value))
    }
}

impl<T: ToString> From<Vec<T>> for RedisValue {
    fn from(items: Vec<T>) -> Self {
        RedisValue::List(items.iter().map(ToString::to_string).collect())
    }
}

impl<K: ToString, V: ToString> From<HashMap<K, V>> for RedisValue {
    fn from(map: HashMap<K, V>) -> Self {
        RedisValue::Hash(
            map.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl<K: ToString, V: ToString> From<BTreeMap<K, V>> for RedisValue {
    fn from(map: BTreeMap<K, V>) -> Self {
        RedisValue::Hash(
            map.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl<T: ToString> From<HashSet<T>> for RedisValue {
    fn from(items: HashSet<T>) -> Self {
        RedisValue::Set(items.iter().map(ToString::to_string).collect())
    }
}

impl<T: ToString> From<BTreeSet<T>> for RedisValue {
    fn from(items: BTreeSet<T>) -> Self {
        RedisValue::Set(items.iter().map(ToString::to_string).collect())
    }
}

impl Client {
    /// 依值的類型寫入
    ///
    /// 字串用 `SET` 並回傳 1；列表 `RPUSH`、雜湊 `HSET`、集合 `SADD`、有序集合 `ZADD`，
    /// 回傳各命令的回覆。已存在的集合類鍵會被擴充而非取代，空集合不發送命令並回傳 0。
    pub async fn set_value(
        &self,
        name: &str,
        value: impl Into<RedisValue>,
    ) -> Result<i64, RedisClientError> {
        let value = value.into();
        debug!("寫入 {} 類型的值到 {}", value.kind(), name);
        match value {
            RedisValue::String(text) => {
                let written = self.str_set(name, text, SetOptions::default()).await?;
                Ok(i64::from(written))
            }
            RedisValue::List(items) => {
                if items.is_empty() {
                    return Ok(0);
                }
                self.list_push(name, &items, ListPushOptions::default())
                    .await
            }
            RedisValue::Hash(map) => {
                let mapping: Vec<(String, String)> = map.into_iter().collect();
                self.hash_mset(name, &mapping).await
            }
            RedisValue::Set(items) => {
                let members: Vec<String> = items.into_iter().collect();
                self.set_add(name, &members).await
            }
            RedisValue::ZSet(items) => self.zset_add(name, &items, ZAddOptions::default()).await,
        }
    }

    /// 依鍵的類型讀取，鍵不存在時回傳 `None`
    pub async fn get_value(&self, name: &str) -> Result<Option<RedisValue>, RedisClientError> {
        let value = match self.get_type(name).await? {
            KeyType::None => None,
            KeyType::String => self.str_get(name).await?.map(RedisValue::String),
            KeyType::List => Some(RedisValue::List(self.list_get(name).await?)),
            KeyType::Hash => Some(RedisValue::Hash(self.hash_getall(name).await?)),
            KeyType::Set => Some(RedisValue::Set(self.set_members(name).await?)),
            KeyType::ZSet => Some(RedisValue::ZSet(self.zset_getall_withscores(name).await?)),
            other => {
                return Err(RedisClientError::TypeError(format!(
                    "不支援讀取 {} 類型的鍵 {}",
                    other, name
                )))
            }
        };
        Ok(value)
    }
}
