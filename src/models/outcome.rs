//! 提交结果

use serde::Serialize;
use serde_json::Value as JsonValue;

/// 提交结果的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// 答案正确，链到此结束
    AcceptedTerminal,
    /// 响应给出了下一个任务地址
    AcceptedWithContinuation,
    /// 答案错误，时间预算内可重试
    RejectedRetryable,
    /// 答案错误，不再重试
    RejectedTerminal,
    /// 网络不可达、超时、或非 2xx 且响应体不可解析
    TransportError,
}

impl Classification {
    pub fn is_accepted(self) -> bool {
        matches!(
            self,
            Classification::AcceptedTerminal | Classification::AcceptedWithContinuation
        )
    }
}

/// 单次提交的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionOutcome {
    pub classification: Classification,
    /// 仅在 AcceptedWithContinuation 时存在
    pub continuation_locator: Option<String>,
    /// 端点给出的错误原因（如果有）
    pub reason: Option<String>,
    /// 原始响应（诊断用）
    pub raw_payload: String,
    /// 可解析时的 JSON 响应
    pub body: Option<JsonValue>,
}

impl SubmissionOutcome {
    pub fn transport_error(message: impl Into<String>) -> Self {
        Self {
            classification: Classification::TransportError,
            continuation_locator: None,
            reason: None,
            raw_payload: message.into(),
            body: None,
        }
    }
}
