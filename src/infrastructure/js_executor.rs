//! JS 执行器 - 基础设施层
//!
//! 持有一个 page，只暴露"执行 JS / 读页面"的能力

use chromiumoxide::Page;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::error::FetchError;

/// 脚本渲染页面常用的全局变量名，按读取顺序排列
pub const PRERENDERED_VARIABLES: &[&str] =
    &["quizData", "quiz_data", "data", "questionData", "question_data"];

/// JS 执行器
///
/// 职责：
/// - 持有 Page 资源
/// - 暴露 eval() 能力
/// - 不认识题目
/// - 不处理业务流程
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue, FetchError> {
        let result = self
            .page
            .evaluate(js_code.into())
            .await
            .map_err(FetchError::browser)?;
        result.into_value().map_err(FetchError::browser)
    }

    /// 读取一个全局变量；未定义、为 null 或无法序列化时返回 None
    pub async fn read_global(&self, name: &str) -> Option<JsonValue> {
        let script = format!(
            "(() => {{ try {{ const v = window[{}]; return v === undefined ? null : JSON.parse(JSON.stringify(v)); }} catch (e) {{ return null; }} }})()",
            JsonValue::String(name.to_string())
        );
        match self.eval(script).await {
            Ok(JsonValue::Null) => None,
            Ok(value) => Some(value),
            Err(e) => {
                debug!("读取全局变量 {} 失败: {}", name, e);
                None
            }
        }
    }

    /// 依次读取 [`PRERENDERED_VARIABLES`]，只保留有值的
    pub async fn read_prerendered_variables(&self) -> Map<String, JsonValue> {
        let mut variables = Map::new();
        for name in PRERENDERED_VARIABLES {
            if let Some(value) = self.read_global(name).await {
                debug!("读取到全局变量: {}", name);
                variables.insert((*name).to_string(), value);
            }
        }
        variables
    }

    /// 当前页面 HTML
    pub async fn content(&self) -> Result<String, FetchError> {
        self.page.content().await.map_err(FetchError::browser)
    }

    /// 当前页面地址
    pub async fn current_url(&self) -> Option<String> {
        self.page.url().await.ok().flatten()
    }
}
