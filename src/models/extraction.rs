//! 页面规范化结果

use serde::Serialize;
use serde_json::Value as JsonValue;
use url::Url;

/// 题目文本的来源（级联中命中的那一级）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ProblemSource {
    /// 脚本渲染出的全局变量
    Prerendered { variable: String },
    /// CSS 选择器命中的元素
    Selector { selector: String },
    /// 全部可见文本的前 500 个字符
    VisibleText,
}

/// 结构化数据的来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PayloadSource {
    Prerendered { variable: String },
    InlineScript { index: usize },
    Table { index: usize },
}

/// 一组松散类型的记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredPayload {
    pub source: PayloadSource,
    /// 数组表示多条记录，其他值视为单条记录
    pub value: JsonValue,
}

impl StructuredPayload {
    pub fn new(source: PayloadSource, value: JsonValue) -> Self {
        Self { source, value }
    }

    /// 记录总数
    pub fn len(&self) -> usize {
        match &self.value {
            JsonValue::Array(items) => items.len(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 前 `limit` 条记录
    pub fn head(&self, limit: usize) -> Vec<&JsonValue> {
        match &self.value {
            JsonValue::Array(items) => items.iter().take(limit).collect(),
            other => std::iter::once(other).take(limit).collect(),
        }
    }
}

/// Content Normalizer 的输出
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    /// 题目文本；为空表示提取失败
    pub problem_text: String,
    pub problem_source: ProblemSource,
    /// 页面给出的原始提交地址（可能是相对地址）；缺失时由 [`Self::resolve_submission_target`] 推断
    pub submission_target: Option<String>,
    pub structured_payloads: Vec<StructuredPayload>,
    pub attachment_links: Vec<String>,
}

impl ExtractionResult {
    pub fn has_problem(&self) -> bool {
        !self.problem_text.trim().is_empty()
    }

    /// 得到可直接提交的绝对地址
    ///
    /// 页面给出的地址按任务地址解析相对路径；没有给出时：
    /// 路径含 `/demo` 换成 `/submit`，含 `/quiz/` 换成 `/submit/`，否则取 origin + `/submit`。
    pub fn resolve_submission_target(&self, locator: &str) -> String {
        match &self.submission_target {
            Some(target) => resolve_against(locator, target),
            None => infer_submission_target(locator),
        }
    }
}

/// 按基准地址解析相对地址，失败时原样返回
pub fn resolve_against(base: &str, reference: &str) -> String {
    if let Ok(absolute) = Url::parse(reference) {
        return absolute.to_string();
    }
    Url::parse(base)
        .and_then(|base| base.join(reference))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| reference.to_string())
}

/// 是否为本地地址（`file://`）
pub fn is_local_locator(locator: &str) -> bool {
    Url::parse(locator).is_ok_and(|url| url.scheme() == "file")
}

/// 本地内容只能由本地任务引用，远程页面不能读取本机文件
pub fn local_reference_allowed(task_locator: &str, reference: &str) -> bool {
    !is_local_locator(reference) || is_local_locator(task_locator)
}

/// 两个地址按同一基准解析后是否指向同一处
pub fn same_locator(base: &str, reference: &str) -> bool {
    resolve_against(base, reference) == resolve_against(base, base)
}

/// 页面没有给出提交地址时的推断规则
pub fn infer_submission_target(locator: &str) -> String {
    let Ok(mut url) = Url::parse(locator) else {
        return "/submit".to_string();
    };

    let path = url.path().to_string();
    if let Some(pos) = path.find("/demo") {
        let replaced = format!("{}/submit{}", &path[..pos], &path[pos + "/demo".len()..]);
        url.set_path(&replaced);
        return url.to_string();
    }
    if let Some(pos) = path.find("/quiz/") {
        let replaced = format!("{}/submit/{}", &path[..pos], &path[pos + "/quiz/".len()..]);
        url.set_path(&replaced);
        return url.to_string();
    }

    match url.origin() {
        origin @ url::Origin::Tuple(..) => format!("{}/submit", origin.ascii_serialization()),
        url::Origin::Opaque(_) => {
            url.set_query(None);
            url.set_fragment(None);
            url.join("submit")
                .map(|u| u.to_string())
                .unwrap_or_else(|_| "/submit".to_string())
        }
    }
}
