//! Redis存儲模組
//!
//! 此模組提供Redis客戶端與連接池管理。連接字串決定部署拓撲（單機、叢集或哨兵），
//! 各資料類型的操作、管線、發布/訂閱與分散式鎖皆掛在 [`Client`] 上。

pub mod client;
pub mod operations;
pub mod pool;
pub mod topology;

#[cfg(test)]
pub mod test_config;

pub use client::*;
pub use operations::*;
pub use pool::*;
pub use topology::*;
