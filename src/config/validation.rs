use thiserror::Error;

/// 配置驗證錯誤
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("缺少必要配置項: {0}")]
    MissingField(String),

    #[error("無效的配置值: {0}")]
    InvalidValue(String),

    #[error("配置範圍錯誤: {field} 的值 {value} 不在範圍 {min}..{max} 內")]
    RangeError {
        field: String,
        value: String,
        min: String,
        max: String,
    },
}

/// 配置驗證器trait
pub trait Validator {
    /// 驗證配置
    fn validate(&self) -> Result<(), ValidationError>;
}

/// 驗證配置區段
pub fn validate_config<T>(config: &T) -> Result<(), ValidationError>
where
    T: Validator,
{
    config.validate()
}

/// 驗證工具函數
pub struct ValidationUtils;

impl ValidationUtils {
    /// 驗證配置值是否在指定範圍內（含邊界）
    pub fn in_range<T>(value: T, min: T, max: T, field_name: &str) -> Result<(), ValidationError>
    where
        T: PartialOrd + ToString,
    {
        if value < min || value > max {
            return Err(ValidationError::RangeError {
                field: field_name.to_string(),
                value: value.to_string(),
                min: min.to_string(),
                max: max.to_string(),
            });
        }
        Ok(())
    }

    /// 不分大小寫比對字串是否為允許值之一
    pub fn one_of(value: &str, options: &[&str], field_name: &str) -> Result<(), ValidationError> {
        if !options.iter().any(|option| option.eq_ignore_ascii_case(value)) {
            return Err(ValidationError::InvalidValue(format!(
                "{} 的值 {} 不是有效選項: {:?}",
                field_name, value, options
            )));
        }
        Ok(())
    }

    /// 檢查必要的字串欄位是否有值
    pub fn not_empty(value: &str, field_name: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::MissingField(field_name.to_string()));
        }
        Ok(())
    }

    /// 以解析函數驗證欄位格式，錯誤訊息附上欄位名稱
    pub fn parses<T, E, F>(value: &str, field_name: &str, parse: F) -> Result<T, ValidationError>
    where
        E: std::fmt::Display,
        F: FnOnce(&str) -> Result<T, E>,
    {
        parse(value).map_err(|err| ValidationError::InvalidValue(format!("{}: {}", field_name, err)))
    }
}
