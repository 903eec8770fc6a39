//! 错误类型
//!
//! 每个组件边界都有自己的错误类型，作为值向上传递，由编排层统一归类。

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// 应用程序错误类型（只在二进制入口和服务端使用）
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 服务端错误
    #[error("服务启动失败 ({addr}): {source}")]
    Server {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 取值不合法
    #[error("配置项 {name} 的值 '{value}' 不合法: {expected}")]
    InvalidValue {
        name: String,
        value: String,
        expected: String,
    },
}

/// 页面获取错误
#[derive(Debug, Error)]
pub enum FetchError {
    /// 浏览器启动或连接失败
    #[error("浏览器错误: {message}")]
    Browser { message: String },
    /// 导航失败
    #[error("导航到 {locator} 失败: {message}")]
    NavigationFailed { locator: String, message: String },
    /// HTTP 请求失败
    #[error("请求 {locator} 失败: {message}")]
    RequestFailed { locator: String, message: String },
    /// 本地内容读取失败
    #[error("读取本地内容 {} 失败: {source}", path.display())]
    LocalRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 地址无法解析
    #[error("无法解析地址: {locator}")]
    InvalidLocator { locator: String },
    /// 超时
    #[error("获取 {locator} 超时 ({timeout:?})")]
    Timeout { locator: String, timeout: Duration },
}

/// 附件解码错误（单个文件，不致命）
#[derive(Debug, Error)]
pub enum DecodeError {
    /// 读取文件失败
    #[error("读取文件失败 ({}): {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 分隔符表格解析失败
    #[error("表格解析失败 ({}): {source}", path.display())]
    Delimited {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    /// 电子表格解析失败
    #[error("电子表格解析失败 ({}): {message}", path.display())]
    Spreadsheet { path: PathBuf, message: String },
    /// PDF 解析失败
    #[error("PDF解析失败 ({}): {message}", path.display())]
    Document { path: PathBuf, message: String },
}

/// 求解策略错误
#[derive(Debug, Clone, Error)]
pub enum SolveError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {message}")]
    ApiCallFailed { model: String, message: String },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 超时
    #[error("LLM调用超时 (模型: {model}, {timeout:?})")]
    Timeout { model: String, timeout: Duration },
}

/// 提交传输错误
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// 网络请求失败
    #[error("提交到 {address} 失败: {message}")]
    RequestFailed { address: String, message: String },
    /// 超时
    #[error("提交到 {address} 超时 ({timeout:?})")]
    Timeout { address: String, timeout: Duration },
}

// ========== 便捷构造函数 ==========

impl FetchError {
    /// 创建浏览器错误
    pub fn browser(message: impl std::fmt::Display) -> Self {
        FetchError::Browser {
            message: message.to_string(),
        }
    }

    /// 创建请求失败错误
    pub fn request_failed(locator: impl Into<String>, message: impl std::fmt::Display) -> Self {
        FetchError::RequestFailed {
            locator: locator.into(),
            message: message.to_string(),
        }
    }
}

impl TransportError {
    /// 创建请求失败错误
    pub fn request_failed(address: impl Into<String>, message: impl std::fmt::Display) -> Self {
        TransportError::RequestFailed {
            address: address.into(),
            message: message.to_string(),
        }
    }
}

impl SolveError {
    /// 创建 API 调用错误
    pub fn api_call_failed(model: impl Into<String>, message: impl std::fmt::Display) -> Self {
        SolveError::ApiCallFailed {
            model: model.into(),
            message: message.to_string(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
