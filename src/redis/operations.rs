//! Redis操作模組
//!
//! 以 `Client` 的方法提供各資料類型的便利操作。每個方法對應一個 Redis 命令，
//! 只做少量的參數整理，回覆一律以字串解碼。

pub mod hash;
pub mod keys;
pub mod list;
pub mod lock;
pub mod pipeline;
pub mod pubsub;
pub mod set;
pub mod string;
pub mod value;
pub mod zset;

pub use keys::{KeyType, SortOptions};
pub use list::ListPushOptions;
pub use lock::{LockError, LockOptions, RedisLock, DEFAULT_LOCK_PREFIX};
pub use pubsub::PubSubMessage;
pub use string::SetOptions;
pub use value::RedisValue;
pub use zset::{ZAddOptions, ZRangeOptions};

use redis::Cmd;

/// 組出 SCAN 系列命令，`name` 為 `None` 時是全域的 SCAN
pub(crate) fn scan_cmd(
    command: &str,
    name: Option<&str>,
    cursor: u64,
    pattern: Option<&str>,
    count: Option<usize>,
) -> Cmd {
    let mut cmd = redis::cmd(command);
    if let Some(name) = name {
        cmd.arg(name);
    }
    cmd.arg(cursor);
    if let Some(pattern) = pattern {
        cmd.arg("MATCH").arg(pattern);
    }
    if let Some(count) = count {
        cmd.arg("COUNT").arg(count);
    }
    cmd
}
