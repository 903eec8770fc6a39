//! 提交服务 - 业务能力层
//!
//! 把答案连同身份信息提交到目标地址，并把响应归类为 [`Classification`]。
//!
//! 归类顺序（先命中者胜出）：
//! 1. 传输失败、超时、非 2xx 且响应体不是 JSON → `TransportError`
//! 2. 响应体不是 JSON 但状态 2xx → `AcceptedTerminal`
//! 3. 原样回显提交内容的端点 → `AcceptedTerminal`
//! 4. 2xx 且给出了另一个任务地址 → `AcceptedWithContinuation`
//! 5. 正确标记或成功状态 → `AcceptedTerminal`
//! 6. 其余 → 时间预算内 `RejectedRetryable`，否则 `RejectedTerminal`

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value as JsonValue};
use tracing::{debug, info, warn};

use crate::infrastructure::{Transport, TransportResponse};
use crate::models::extraction::same_locator;
use crate::models::{Classification, Identity, SubmissionOutcome, TypedValue};
use crate::utils::logging::truncate_text;

/// 下一个任务地址的字段名，按优先级
const CONTINUATION_FIELDS: &[&str] = &["next_url", "url"];
/// 错误原因的字段名，按优先级
const REASON_FIELDS: &[&str] = &["reason", "message", "error"];
/// 回显端点放回提交内容的字段
const ECHO_FIELD: &str = "json";

/// 提交服务
#[derive(Clone)]
pub struct SubmissionInterpreter {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl SubmissionInterpreter {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// 提交一次答案
    ///
    /// # 参数
    /// - `target`: 提交地址（绝对地址）
    /// - `answer`: 类型化的答案
    /// - `identity`: 身份信息
    /// - `task_locator`: 当前任务地址，随答案一起提交
    /// - `budget_remaining`: 时间预算是否还有剩余，决定答案错误时能否重试
    pub async fn submit(
        &self,
        target: &str,
        answer: &TypedValue,
        identity: &Identity,
        task_locator: &str,
        budget_remaining: bool,
    ) -> SubmissionOutcome {
        let payload = build_payload(answer, identity, task_locator);
        info!(
            "提交答案到 {}: {}",
            target,
            truncate_text(&answer.to_string(), 100)
        );

        match self.transport.post_json(target, &payload, self.timeout).await {
            Ok(response) => {
                let outcome = classify(&response, &payload, task_locator, budget_remaining);
                debug!(
                    "提交响应 {} → {:?}: {}",
                    response.status,
                    outcome.classification,
                    truncate_text(&response.body, 200)
                );
                outcome
            }
            Err(e) => {
                warn!("⚠️ 提交失败: {}", e);
                SubmissionOutcome::transport_error(e.to_string())
            }
        }
    }
}

/// 提交内容：`{email, secret, url, answer}`
pub fn build_payload(answer: &TypedValue, identity: &Identity, task_locator: &str) -> JsonValue {
    json!({
        "email": identity.email,
        "secret": identity.secret,
        "url": task_locator,
        "answer": answer.to_json(),
    })
}

/// 按固定顺序归类一次响应
pub fn classify(
    response: &TransportResponse,
    payload: &JsonValue,
    task_locator: &str,
    budget_remaining: bool,
) -> SubmissionOutcome {
    let raw_payload = response.body.clone();

    let Ok(body) = serde_json::from_str::<JsonValue>(&response.body) else {
        let classification = if response.is_success() {
            Classification::AcceptedTerminal
        } else {
            Classification::TransportError
        };
        return SubmissionOutcome {
            classification,
            continuation_locator: None,
            reason: (!response.is_success()).then(|| format!("HTTP {}", response.status)),
            raw_payload,
            body: None,
        };
    };

    let empty = Map::new();
    let fields = body.as_object().unwrap_or(&empty);
    let reason = first_text(fields, REASON_FIELDS);

    let outcome = |classification, continuation_locator| SubmissionOutcome {
        classification,
        continuation_locator,
        reason: reason.clone(),
        raw_payload: raw_payload.clone(),
        body: Some(body.clone()),
    };

    if is_echo(fields, payload) {
        debug!("检测到回显端点，按成功处理");
        return outcome(Classification::AcceptedTerminal, None);
    }

    if response.is_success() {
        if let Some(next) = first_text(fields, CONTINUATION_FIELDS)
            .filter(|next| !same_locator(task_locator, next))
        {
            return outcome(Classification::AcceptedWithContinuation, Some(next));
        }
    }

    let accepted = match (fields.get("correct"), fields.get("status")) {
        (Some(JsonValue::Bool(correct)), _) if *correct => true,
        (_, Some(JsonValue::String(status))) if status.eq_ignore_ascii_case("success") => true,
        (None, None) => response.is_success(),
        _ => false,
    };

    if accepted {
        outcome(Classification::AcceptedTerminal, None)
    } else if budget_remaining {
        outcome(Classification::RejectedRetryable, None)
    } else {
        outcome(Classification::RejectedTerminal, None)
    }
}

fn first_text(fields: &Map<String, JsonValue>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        fields
            .get(*name)
            .and_then(JsonValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// 响应在 `json` 字段里原样带回了提交内容
fn is_echo(fields: &Map<String, JsonValue>, payload: &JsonValue) -> bool {
    fields.get(ECHO_FIELD).is_some_and(|echoed| echoed == payload)
}
