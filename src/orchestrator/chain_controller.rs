//! 任务链控制器 - 编排层
//!
//! ## 职责
//!
//! 1. **续链**：以显式循环驱动 `(locator, depth)`，不使用递归
//! 2. **深度上限**：续链将超过最大深度时以 `DepthExceeded` 结束
//! 3. **时间预算**：整条链共享同一个起始时间，每个任务开始前与每次续链前检查
//! 4. **资源管理**：每条链一个临时下载目录，链结束即删除
//! 5. **结果汇总**：任何退出路径都产生一个 [`ChainResult`]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tempfile::TempDir;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::browser::{BrowserFetcher, BrowserOptions};
use crate::clients::{HttpFetcher, HttpTransport, LlmClient};
use crate::config::{ChainLimits, Config, FetchMode};
use crate::infrastructure::Fetcher;
use crate::models::extraction::{local_reference_allowed, resolve_against};
use crate::models::{
    ChainFailure, ChainResult, ChainState, ChainSuccess, FailureKind, Identity, Task, TaskReport,
    TypedValue,
};
use crate::services::{AnswerSynthesizer, AttachmentDecoder, SubmissionInterpreter};
use crate::utils::logging::log_chain_complete;
use crate::workflow::{TaskFailure, TaskFlow, TaskOutcome};

/// 任务链控制器
///
/// 不持有任何可变状态，多条链可以同时使用同一个控制器。
#[derive(Clone)]
pub struct ChainController {
    flow: TaskFlow,
    download_root: PathBuf,
}

impl ChainController {
    pub fn new(flow: TaskFlow, download_root: impl Into<PathBuf>) -> Self {
        Self {
            flow,
            download_root: download_root.into(),
        }
    }

    /// 按配置组装所有协作者
    pub fn from_config(config: &Config) -> Self {
        let timeouts = config.timeouts();

        let fetcher: Arc<dyn Fetcher> = match config.fetch_mode {
            FetchMode::Browser => Arc::new(BrowserFetcher::new(BrowserOptions::from_config(config))),
            FetchMode::Http => Arc::new(HttpFetcher::new()),
        };
        let synthesizer = AnswerSynthesizer::new(
            Arc::new(LlmClient::new(config)),
            config.solve_failure_policy,
            config.sentinel_answer.clone(),
        );
        let interpreter = SubmissionInterpreter::new(Arc::new(HttpTransport::new()), timeouts.submit);

        let flow = TaskFlow::new(
            fetcher,
            AttachmentDecoder::default(),
            synthesizer,
            interpreter,
            config.limits(),
            timeouts,
        );
        Self::new(flow, config.download_dir.clone())
    }

    pub fn limits(&self) -> &ChainLimits {
        self.flow.limits()
    }

    /// 从 `locator` 开始求解整条链
    ///
    /// 不会返回错误：所有失败都归类为 [`ChainResult::Failed`]。
    pub async fn resolve_chain(&self, locator: &str, identity: &Identity) -> ChainResult {
        let mut run = ChainRun::start(locator);
        info!("🔗 开始求解任务链: {}", locator);

        let downloads = match self.download_dir().await {
            Ok(dir) => dir,
            Err(e) => {
                let result = run.fail(TaskFailure::new(
                    FailureKind::FetchError,
                    ChainState::Fetching,
                    format!("无法创建下载目录: {}", e),
                ));
                log_chain_complete(&result);
                return result;
            }
        };

        let result = self.drive(&mut run, identity, downloads.path()).await;
        log_chain_complete(&result);

        if let Err(e) = downloads.close() {
            warn!("清理下载目录失败: {}", e);
        }
        result
    }

    async fn drive(&self, run: &mut ChainRun, identity: &Identity, download_dir: &Path) -> ChainResult {
        let limits = *self.flow.limits();

        loop {
            let task = run.task.clone();

            if !self.flow.budget_remaining(&task) {
                warn!("{} ⏰ 时间预算已用完，不再开始新任务", task);
                return run.fail(TaskFailure::new(
                    FailureKind::TimeBudgetExceeded,
                    ChainState::Fetching,
                    format!("时间预算 {:?} 已用完", limits.time_budget),
                ));
            }

            let mut report = TaskReport::new(task.depth(), task.locator());
            let outcome = self.flow.run(&task, identity, download_dir, &mut report).await;
            report.state = match &outcome {
                TaskOutcome::Failed(_) => ChainState::Failed,
                TaskOutcome::Accepted { submission, .. } if submission.continuation_locator.is_some() => {
                    ChainState::Continuing
                }
                TaskOutcome::Accepted { .. } => ChainState::Done,
            };
            run.trace.push(report);

            let (answer, submission, final_locator) = match outcome {
                TaskOutcome::Failed(failure) => return run.fail(failure),
                TaskOutcome::Accepted {
                    answer,
                    submission,
                    final_locator,
                } => (answer, submission, final_locator),
            };

            let Some(next) = submission.continuation_locator.clone() else {
                let payload = submission
                    .body
                    .unwrap_or(JsonValue::String(submission.raw_payload));
                return run.succeed(answer.typed_value, payload);
            };

            // ========== 续链 ==========
            let next = resolve_against(&final_locator, &next);
            info!("{} ➡️ 下一个任务: {}", task, next);

            if !local_reference_allowed(task.locator(), &next) {
                warn!("{} ⚠️ 远程任务给出了本地续链地址，拒绝: {}", task, next);
                return run.fail_continuation(TaskFailure::new(
                    FailureKind::FetchError,
                    ChainState::Continuing,
                    format!("远程任务不能续链到本地地址: {}", next),
                ));
            }

            if task.depth() >= limits.max_depth {
                warn!("{} 已达到最大深度 {}", task, limits.max_depth);
                return run.fail_continuation(TaskFailure::new(
                    FailureKind::DepthExceeded,
                    ChainState::Continuing,
                    format!("续链将超过最大深度 {}: {}", limits.max_depth, next),
                ));
            }

            if !self.flow.budget_remaining(&task) {
                warn!("{} ⏰ 时间预算已用完，不再续链", task);
                return run.fail_continuation(TaskFailure::new(
                    FailureKind::TimeBudgetExceeded,
                    ChainState::Continuing,
                    format!("续链前时间预算 {:?} 已用完: {}", limits.time_budget, next),
                ));
            }

            run.task = task.continuation(next);
        }
    }

    async fn download_dir(&self) -> std::io::Result<TempDir> {
        tokio::fs::create_dir_all(&self.download_root).await?;
        tempfile::Builder::new()
            .prefix("chain-")
            .tempdir_in(&self.download_root)
    }
}

/// 一条链的运行状态
struct ChainRun {
    task: Task,
    trace: Vec<TaskReport>,
    started_at: chrono::DateTime<Utc>,
}

impl ChainRun {
    fn start(locator: &str) -> Self {
        Self {
            task: Task::root(locator, Instant::now()),
            trace: Vec::new(),
            started_at: Utc::now(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.task.chain_start().elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn succeed(&mut self, answer: TypedValue, payload: JsonValue) -> ChainResult {
        ChainResult::Accepted(ChainSuccess {
            answer,
            payload,
            trace: std::mem::take(&mut self.trace),
            started_at: self.started_at,
            elapsed_ms: self.elapsed_ms(),
        })
    }

    /// 续链被拒绝时，最后一个任务也记为失败
    fn fail_continuation(&mut self, failure: TaskFailure) -> ChainResult {
        if let Some(last) = self.trace.last_mut() {
            last.state = ChainState::Failed;
        }
        self.fail(failure)
    }

    fn fail(&mut self, failure: TaskFailure) -> ChainResult {
        // 最近一次已知的题目和答案
        let problem_snippet = self.trace.iter().rev().find_map(|r| r.problem_snippet.clone());
        let last_answer = self
            .trace
            .iter()
            .rev()
            .find_map(|r| r.answer.as_ref())
            .map(|a| a.typed_value.clone());
        ChainResult::Failed(ChainFailure {
            kind: failure.kind,
            reason: failure.reason,
            state: failure.state,
            depth: self.task.depth(),
            locator: self.task.locator().to_string(),
            problem_snippet,
            last_answer,
            trace: std::mem::take(&mut self.trace),
            started_at: self.started_at,
            elapsed_ms: self.elapsed_ms(),
        })
    }
}
