/// 配置管理模組
///
/// 本模組負責加載、驗證和管理系統配置。
/// 依 `REDISZ_ENV` 載入對應環境的 TOML 檔，再以 `REDISZ__` 開頭的環境變數覆寫。
// 宣告子模組
pub mod loader;
pub mod manager;
pub mod types;
pub mod validation;

// 重新導出常用組件
pub use loader::{ConfigExt, ConfigLoader, Environment};
pub use manager::{get_config, init_config};
pub use types::*;
pub use validation::{validate_config, ValidationError, ValidationUtils, Validator};
