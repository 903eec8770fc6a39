//! 基础设施层
//!
//! 外部协作者的能力边界：页面获取、文件格式解码、求解策略、提交传输。
//! 核心只依赖这里的 trait，具体实现位于 `browser/`、`clients/` 和 [`file_decoders`]。

pub mod file_decoders;
pub mod js_executor;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use crate::error::{DecodeError, FetchError, SolveError, TransportError};
use crate::models::TableData;

pub use file_decoders::FileDecoders;
pub use js_executor::JsExecutor;

/// 一次页面获取的结果
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    pub markup: String,
    /// 跳转后的最终地址
    pub final_locator: String,
    /// 脚本执行后读出的全局变量（保持读取顺序）
    pub prerendered_variables: Map<String, JsonValue>,
    /// 加载过程中已下载的文件
    pub downloaded_paths: Vec<PathBuf>,
}

/// 页面获取能力
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, locator: &str, timeout: Duration) -> Result<FetchedPage, FetchError>;

    /// 下载附件到 `dest_dir`，返回本地路径
    async fn download(
        &self,
        link: &str,
        dest_dir: &Path,
        timeout: Duration,
    ) -> Result<PathBuf, FetchError>;
}

/// 文件格式解码能力（每个文件独立失败）
pub trait FormatDecoder: Send + Sync {
    fn decode_tabular(&self, path: &Path) -> Result<TableData, DecodeError>;

    fn decode_document_text(&self, path: &Path) -> Result<String, DecodeError>;
}

/// 求解策略：输入提示词，返回自由文本，不关心对错
#[async_trait]
pub trait SolvingStrategy: Send + Sync {
    async fn solve(&self, prompt: &str) -> Result<String, SolveError>;
}

/// 传输层响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 提交传输能力
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(
        &self,
        address: &str,
        payload: &JsonValue,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError>;
}
