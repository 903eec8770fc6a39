//! 整条链的结果

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::models::answer::{SynthesizedAnswer, TypedValue};
use crate::models::outcome::Classification;

/// 控制器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChainState {
    Fetching,
    Extracting,
    Decoding,
    Synthesizing,
    Submitting,
    Retrying,
    Continuing,
    Done,
    Failed,
}

/// 失败分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    FetchError,
    ExtractionEmpty,
    DecodeError,
    SolveError,
    TransportError,
    RejectedAnswer,
    DepthExceeded,
    TimeBudgetExceeded,
}

/// 任务内被吸收、没有中断任务的失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbsorbedFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl AbsorbedFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// 单个任务的执行记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub depth: u32,
    pub locator: String,
    /// 任务最后到达的状态，结束时为 `Continuing`、`Done` 或 `Failed`
    pub state: ChainState,
    pub problem_snippet: Option<String>,
    pub submission_target: Option<String>,
    pub answer: Option<SynthesizedAnswer>,
    pub attempts: u32,
    pub classification: Option<Classification>,
    pub absorbed: Vec<AbsorbedFailure>,
}

impl TaskReport {
    pub fn new(depth: u32, locator: impl Into<String>) -> Self {
        Self {
            depth,
            locator: locator.into(),
            state: ChainState::Fetching,
            problem_snippet: None,
            submission_target: None,
            answer: None,
            attempts: 0,
            classification: None,
            absorbed: Vec::new(),
        }
    }
}

/// 链成功结束
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainSuccess {
    pub answer: TypedValue,
    /// 最后一次被接受的响应
    pub payload: JsonValue,
    pub trace: Vec<TaskReport>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// 链失败结束
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainFailure {
    pub kind: FailureKind,
    pub reason: String,
    /// 失败时所处的状态
    pub state: ChainState,
    pub depth: u32,
    pub locator: String,
    pub problem_snippet: Option<String>,
    pub last_answer: Option<TypedValue>,
    pub trace: Vec<TaskReport>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// `resolve_chain` 的返回值，调用方总能拿到一个结构化结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChainResult {
    Accepted(ChainSuccess),
    Failed(ChainFailure),
}

impl ChainResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ChainResult::Accepted(_))
    }

    pub fn trace(&self) -> &[TaskReport] {
        match self {
            ChainResult::Accepted(success) => &success.trace,
            ChainResult::Failed(failure) => &failure.trace,
        }
    }

    pub fn failure(&self) -> Option<&ChainFailure> {
        match self {
            ChainResult::Failed(failure) => Some(failure),
            ChainResult::Accepted(_) => None,
        }
    }
}
