//! 答案合成服务 - 业务能力层
//!
//! 职责：
//! - 用题目、结构化数据、附件拼出求解提示词
//! - 调用求解策略，把自由文本回答转换成类型化的值
//! - 求解失败时按 [`SolveFailurePolicy`] 决定给出占位答案还是报错

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, warn};

use crate::config::SolveFailurePolicy;
use crate::error::SolveError;
use crate::infrastructure::SolvingStrategy;
use crate::models::{
    AttachmentContent, Confidence, DecodedAttachment, StructuredPayload, SynthesizedAnswer,
    TypedValue,
};
use crate::utils::logging::truncate_text;

/// 每组结构化数据最多放入的记录数
pub const MAX_PAYLOAD_RECORDS: usize = 10;
/// 每个表格附件最多放入的行数
pub const MAX_TABLE_ROWS: usize = 20;
/// 每个文档附件最多放入的字符数
pub const MAX_DOCUMENT_CHARS: usize = 2000;

const ANSWER_INSTRUCTION: &str = "Analyze the data and answer the question. If the answer is a number, return just the number. If it's a boolean, return true or false. If it's JSON, return valid JSON. Be precise and concise.";

/// 重试时附带的上一次答案信息
#[derive(Debug, Clone, PartialEq)]
pub struct RefinementHint {
    pub previous_answer: String,
    /// 提交端给出的原因（如果有）
    pub reason: Option<String>,
}

impl RefinementHint {
    pub fn new(previous_answer: impl Into<String>, reason: Option<String>) -> Self {
        Self {
            previous_answer: previous_answer.into(),
            reason,
        }
    }
}

/// 答案合成服务
#[derive(Clone)]
pub struct AnswerSynthesizer {
    solver: Arc<dyn SolvingStrategy>,
    failure_policy: SolveFailurePolicy,
    sentinel_answer: String,
}

impl AnswerSynthesizer {
    pub fn new(
        solver: Arc<dyn SolvingStrategy>,
        failure_policy: SolveFailurePolicy,
        sentinel_answer: impl Into<String>,
    ) -> Self {
        Self {
            solver,
            failure_policy,
            sentinel_answer: sentinel_answer.into(),
        }
    }

    /// 合成候选答案
    ///
    /// 只有策略为 [`SolveFailurePolicy::FailTask`] 且求解失败时才返回错误。
    pub async fn synthesize(
        &self,
        problem_text: &str,
        payloads: &[StructuredPayload],
        attachments: &[DecodedAttachment],
        hint: Option<&RefinementHint>,
    ) -> Result<SynthesizedAnswer, SolveError> {
        let prompt = build_prompt(problem_text, payloads, attachments, hint);
        debug!("提示词长度: {} 字符", prompt.len());

        match self.solver.solve(&prompt).await {
            Ok(raw_response) => {
                let answer = interpret_response(raw_response);
                debug!(
                    "求解器回答: {} → {:?}",
                    truncate_text(&answer.raw_response, 100),
                    answer.typed_value
                );
                Ok(answer)
            }
            Err(e) => match self.failure_policy {
                SolveFailurePolicy::SubmitSentinel => {
                    warn!("⚠️ 求解失败，改用占位答案: {}", e);
                    Ok(SynthesizedAnswer::sentinel(&self.sentinel_answer))
                }
                SolveFailurePolicy::FailTask => Err(e),
            },
        }
    }
}

/// 拼接求解提示词，顺序固定
pub fn build_prompt(
    problem_text: &str,
    payloads: &[StructuredPayload],
    attachments: &[DecodedAttachment],
    hint: Option<&RefinementHint>,
) -> String {
    let mut parts = vec![format!("Question: {}\n", problem_text)];

    if !payloads.is_empty() {
        parts.push("Available data:".to_string());
        for (i, payload) in payloads.iter().enumerate() {
            parts.push(format!("\nData {}:", i + 1));
            let head = payload.head(MAX_PAYLOAD_RECORDS);
            parts.push(serde_json::to_string_pretty(&head).unwrap_or_default());
        }
    }

    let tables: Vec<_> = attachments
        .iter()
        .filter_map(|a| match &a.content {
            Some(AttachmentContent::Table(table)) => Some((a.name.as_str(), table)),
            _ => None,
        })
        .collect();
    if !tables.is_empty() {
        parts.push("\nTabular attachments:".to_string());
        for (name, table) in tables {
            parts.push(format!("\n{}:", name));
            parts.push(table.render_head(MAX_TABLE_ROWS));
        }
    }

    let documents: Vec<_> = attachments
        .iter()
        .filter_map(|a| match &a.content {
            Some(AttachmentContent::Text(text)) => Some((a.name.as_str(), text)),
            _ => None,
        })
        .collect();
    if !documents.is_empty() {
        parts.push("\nDocument content (excerpt):".to_string());
        for (name, text) in documents {
            parts.push(format!("\n{}:", name));
            parts.push(text.chars().take(MAX_DOCUMENT_CHARS).collect());
        }
    }

    if let Some(hint) = hint {
        let mut clause = format!("\nPrevious answer was incorrect: {}", hint.previous_answer);
        if let Some(reason) = hint.reason.as_deref().filter(|r| !r.trim().is_empty()) {
            clause.push_str(&format!("\nReason given: {}", reason));
        }
        clause.push_str("\nPlease reconsider and provide a different answer.");
        parts.push(clause);
    }

    parts.push(format!("\n\n{}", ANSWER_INSTRUCTION));
    parts.join("\n")
}

static CODE_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*\s*(.*?)\s*```$").ok());

/// 去掉回答外层的 Markdown 代码块
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(re) = CODE_FENCE.as_ref() {
        if let Some(inner) = re.captures(trimmed).and_then(|c| c.get(1)) {
            return inner.as_str();
        }
    }
    trimmed
}

fn interpret_response(raw_response: String) -> SynthesizedAnswer {
    let typed_value = TypedValue::coerce(strip_code_fence(&raw_response));
    SynthesizedAnswer {
        raw_response,
        typed_value,
        confidence: Confidence::Solved,
    }
}
