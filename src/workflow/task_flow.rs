//! 单个任务的处理流程 - 流程层
//!
//! 核心职责：定义"一个任务"的完整处理流程
//!
//! 流程顺序：
//! 1. 获取页面 → 规范化 → 下载并解码附件 → 合成答案
//! 2. 提交，按结果决定：接受 / 重新提交同一答案 / 带提示重新合成后提交
//! 3. 超出重试次数或时间预算时失败
//!
//! 续链和深度上限由编排层负责，这里只处理一个任务。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::{ChainLimits, Timeouts};
use crate::infrastructure::{FetchedPage, Fetcher};
use crate::models::extraction::{local_reference_allowed, resolve_against};
use crate::models::{
    AbsorbedFailure, ChainState, Classification, ExtractionResult, FailureKind, Identity,
    SubmissionOutcome, SynthesizedAnswer, Task, TaskReport, TypedValue,
};
use crate::services::{
    normalize, AnswerSynthesizer, AttachmentDecoder, RefinementHint, SubmissionInterpreter,
};
use crate::utils::logging::truncate_text;

/// 题目摘要的最大长度
const SNIPPET_LEN: usize = 100;

/// 任务失败的详情
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub reason: String,
    /// 失败时所处的状态
    pub state: ChainState,
}

impl TaskFailure {
    pub fn new(kind: FailureKind, state: ChainState, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            state,
        }
    }
}

/// 任务处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// 答案被接受（可能带有下一个任务地址）
    Accepted {
        answer: SynthesizedAnswer,
        submission: SubmissionOutcome,
        /// 页面跳转后的最终地址，用于解析相对的续链地址
        final_locator: String,
    },
    Failed(TaskFailure),
}

/// 单个任务的处理流程
///
/// - 编排一个任务从获取到提交的全过程
/// - 拥有重试循环，不负责续链
/// - 只依赖业务能力（services）和基础设施 trait
#[derive(Clone)]
pub struct TaskFlow {
    fetcher: Arc<dyn Fetcher>,
    decoder: AttachmentDecoder,
    synthesizer: AnswerSynthesizer,
    interpreter: SubmissionInterpreter,
    limits: ChainLimits,
    timeouts: Timeouts,
}

impl TaskFlow {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        decoder: AttachmentDecoder,
        synthesizer: AnswerSynthesizer,
        interpreter: SubmissionInterpreter,
        limits: ChainLimits,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            fetcher,
            decoder,
            synthesizer,
            interpreter,
            limits,
            timeouts,
        }
    }

    pub fn limits(&self) -> &ChainLimits {
        &self.limits
    }

    /// 链的时间预算是否还有剩余
    pub fn budget_remaining(&self, task: &Task) -> bool {
        task.chain_start().elapsed() < self.limits.time_budget
    }

    /// 处理一个任务
    ///
    /// # 参数
    /// - `task`: 当前任务
    /// - `identity`: 提交时附带的身份
    /// - `download_dir`: 附件下载目录（整条链共用）
    /// - `report`: 执行记录，处理过程中逐步填充
    pub async fn run(
        &self,
        task: &Task,
        identity: &Identity,
        download_dir: &Path,
        report: &mut TaskReport,
    ) -> TaskOutcome {
        // ========== 获取 ==========
        report.state = ChainState::Fetching;
        info!("{} 🌐 获取任务页面: {}", task, task.locator());
        let page = match self.fetcher.fetch(task.locator(), self.timeouts.fetch).await {
            Ok(page) => page,
            Err(e) => {
                error!("{} 页面获取失败: {}", task, e);
                return TaskOutcome::Failed(TaskFailure::new(
                    FailureKind::FetchError,
                    ChainState::Fetching,
                    e.to_string(),
                ));
            }
        };
        let final_locator = if page.final_locator.is_empty() {
            task.locator().to_string()
        } else {
            page.final_locator.clone()
        };

        // ========== 规范化 ==========
        report.state = ChainState::Extracting;
        let extraction = normalize(&page.markup, &page.prerendered_variables);
        if !extraction.has_problem() {
            warn!("{} ⚠️ 页面中没有找到题目", task);
            return TaskOutcome::Failed(TaskFailure::new(
                FailureKind::ExtractionEmpty,
                ChainState::Extracting,
                format!("页面中没有找到题目: {}", final_locator),
            ));
        }
        let target = extraction.resolve_submission_target(&final_locator);
        report.problem_snippet = Some(truncate_text(&extraction.problem_text, SNIPPET_LEN));
        report.submission_target = Some(target.clone());
        info!(
            "{} 📝 题目: {}",
            task,
            truncate_text(&extraction.problem_text, SNIPPET_LEN)
        );
        debug!("{} 提交地址: {}", task, target);

        // ========== 附件 ==========
        report.state = ChainState::Decoding;
        let paths = self
            .collect_attachments(task, &page, &extraction, &final_locator, download_dir, report)
            .await;
        let attachments = self.decoder.decode(&paths);
        for attachment in &attachments {
            if let Some(e) = &attachment.decode_error {
                report.absorbed.push(AbsorbedFailure::new(
                    FailureKind::DecodeError,
                    format!("{}: {}", attachment.name, e),
                ));
            }
        }
        if !attachments.is_empty() {
            info!(
                "{} 📎 解码附件 {} 个（失败 {} 个）",
                task,
                attachments.len(),
                attachments.iter().filter(|a| a.decode_error.is_some()).count()
            );
        }

        // ========== 合成 ==========
        report.state = ChainState::Synthesizing;
        let mut answer = match self
            .synthesizer
            .synthesize(
                &extraction.problem_text,
                &extraction.structured_payloads,
                &attachments,
                None,
            )
            .await
        {
            Ok(answer) => answer,
            Err(e) => {
                error!("{} 求解失败: {}", task, e);
                return TaskOutcome::Failed(TaskFailure::new(
                    FailureKind::SolveError,
                    ChainState::Synthesizing,
                    e.to_string(),
                ));
            }
        };
        note_sentinel(&answer, report);
        report.answer = Some(answer.clone());

        // ========== 提交与重试 ==========
        let mut pending_hint: Option<RefinementHint> = None;
        let mut last_failure = TaskFailure::new(
            FailureKind::RejectedAnswer,
            ChainState::Submitting,
            "没有进行任何提交",
        );

        for attempt in 1..=self.limits.max_attempts {
            if attempt > 1 {
                report.state = ChainState::Retrying;
                if !self.budget_remaining(task) {
                    warn!("{} ⏰ 时间预算已用完，停止重试", task);
                    return TaskOutcome::Failed(TaskFailure::new(
                        FailureKind::TimeBudgetExceeded,
                        ChainState::Retrying,
                        format!("第 {} 次提交前时间预算已用完", attempt),
                    ));
                }

                if let Some(hint) = pending_hint.take() {
                    info!("{} 🔁 带提示重新求解", task);
                    answer = match self
                        .synthesizer
                        .synthesize(
                            &extraction.problem_text,
                            &extraction.structured_payloads,
                            &attachments,
                            Some(&hint),
                        )
                        .await
                    {
                        Ok(answer) => answer,
                        Err(e) => {
                            error!("{} 重新求解失败: {}", task, e);
                            return TaskOutcome::Failed(TaskFailure::new(
                                FailureKind::SolveError,
                                ChainState::Retrying,
                                e.to_string(),
                            ));
                        }
                    };
                    note_sentinel(&answer, report);
                    report.answer = Some(answer.clone());
                }
            }

            report.state = ChainState::Submitting;

            info!(
                "{} 📤 提交答案（第 {}/{} 次）",
                task, attempt, self.limits.max_attempts
            );
            let submission = self
                .interpreter
                .submit(
                    &target,
                    &answer.typed_value,
                    identity,
                    task.locator(),
                    self.budget_remaining(task),
                )
                .await;
            report.attempts = attempt;
            report.classification = Some(submission.classification);

            match submission.classification {
                Classification::AcceptedTerminal | Classification::AcceptedWithContinuation => {
                    info!("{} ✓ 答案被接受", task);
                    return TaskOutcome::Accepted {
                        answer,
                        submission,
                        final_locator,
                    };
                }
                Classification::TransportError => {
                    warn!("{} ⚠️ 提交不可达: {}", task, truncate_text(&submission.raw_payload, 200));
                    last_failure = TaskFailure::new(
                        FailureKind::TransportError,
                        ChainState::Submitting,
                        submission.raw_payload,
                    );
                }
                Classification::RejectedRetryable => {
                    warn!("{} ✗ 答案错误: {}", task, answer.typed_value);
                    last_failure = rejection(&answer.typed_value, &submission);
                    pending_hint = Some(RefinementHint::new(
                        answer.typed_value.to_string(),
                        submission.reason,
                    ));
                }
                Classification::RejectedTerminal => {
                    warn!("{} ✗ 答案错误且无法重试: {}", task, answer.typed_value);
                    return TaskOutcome::Failed(rejection(&answer.typed_value, &submission));
                }
            }
        }

        error!(
            "{} 已达到最大提交次数 {}",
            task, self.limits.max_attempts
        );
        TaskOutcome::Failed(last_failure)
    }

    /// 页面加载时已下载的文件，加上下载所有附件链接得到的文件
    async fn collect_attachments(
        &self,
        task: &Task,
        page: &FetchedPage,
        extraction: &ExtractionResult,
        final_locator: &str,
        download_dir: &Path,
        report: &mut TaskReport,
    ) -> Vec<PathBuf> {
        let mut paths = page.downloaded_paths.clone();

        for link in &extraction.attachment_links {
            let absolute = resolve_against(final_locator, link);
            if !local_reference_allowed(task.locator(), &absolute) {
                warn!("{} ⚠️ 远程页面引用了本地文件，跳过: {}", task, absolute);
                report.absorbed.push(AbsorbedFailure::new(
                    FailureKind::FetchError,
                    format!("拒绝读取本地附件: {}", absolute),
                ));
                continue;
            }
            match self
                .fetcher
                .download(&absolute, download_dir, self.timeouts.download)
                .await
            {
                Ok(path) => paths.push(path),
                Err(e) => {
                    warn!("{} ⚠️ 附件下载失败，跳过: {}", task, e);
                    report
                        .absorbed
                        .push(AbsorbedFailure::new(FailureKind::FetchError, e.to_string()));
                }
            }
        }

        paths
    }
}

/// 求解失败被占位答案吸收时记一笔
fn note_sentinel(answer: &SynthesizedAnswer, report: &mut TaskReport) {
    if answer.is_sentinel() {
        report.absorbed.push(AbsorbedFailure::new(
            FailureKind::SolveError,
            format!("求解失败，提交占位答案: {}", answer.raw_response),
        ));
    }
}

fn rejection(answer: &TypedValue, submission: &SubmissionOutcome) -> TaskFailure {
    let reason = match &submission.reason {
        Some(reason) => format!("答案 {} 被拒绝: {}", answer, reason),
        None => format!("答案 {} 被拒绝", answer),
    };
    TaskFailure::new(FailureKind::RejectedAnswer, ChainState::Submitting, reason)
}
