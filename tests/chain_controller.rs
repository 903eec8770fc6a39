//! 任务链控制器集成测试
//!
//! 用桩实现替换页面获取、求解和提交，验证重试、续链、深度上限和时间预算。

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value as JsonValue};

use quiz_chain_solver::error::{FetchError, SolveError, TransportError};
use quiz_chain_solver::infrastructure::{
    FetchedPage, Fetcher, SolvingStrategy, Transport, TransportResponse,
};
use quiz_chain_solver::models::{ChainResult, ChainState, FailureKind, Identity, TypedValue};
use quiz_chain_solver::services::{AnswerSynthesizer, AttachmentDecoder, SubmissionInterpreter};
use quiz_chain_solver::{ChainController, ChainLimits, SolveFailurePolicy, TaskFlow, Timeouts};

const ROOT: &str = "https://quiz.test/quiz/1";
const QUESTION_PAGE: &str =
    r#"<html><body><h1>What is the answer to everything?</h1><form action="/submit"></form></body></html>"#;

// ========== 桩实现 ==========

type FetchFn = dyn Fn(&str) -> Result<FetchedPage, FetchError> + Send + Sync;

struct StubFetcher {
    respond: Box<FetchFn>,
    fetched: Mutex<Vec<String>>,
}

impl StubFetcher {
    fn new(respond: impl Fn(&str) -> Result<FetchedPage, FetchError> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            fetched: Mutex::new(Vec::new()),
        })
    }

    /// 每个地址都返回同一个题目页面
    fn question_page() -> Arc<Self> {
        Self::new(|locator| Ok(page(locator, QUESTION_PAGE)))
    }

    fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, locator: &str, _timeout: Duration) -> Result<FetchedPage, FetchError> {
        self.fetched.lock().unwrap().push(locator.to_string());
        (self.respond)(locator)
    }

    async fn download(&self, link: &str, _dest_dir: &Path, _timeout: Duration) -> Result<PathBuf, FetchError> {
        Err(FetchError::request_failed(link, "downloads are not stubbed"))
    }
}

fn page(locator: &str, markup: &str) -> FetchedPage {
    FetchedPage {
        markup: markup.to_string(),
        final_locator: locator.to_string(),
        prerendered_variables: Map::new(),
        downloaded_paths: Vec::new(),
    }
}

struct StubSolver {
    reply: Result<String, SolveError>,
    prompts: Mutex<Vec<String>>,
}

impl StubSolver {
    fn answering(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: Err(SolveError::api_call_failed("stub-model", "service unavailable")),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SolvingStrategy for StubSolver {
    async fn solve(&self, prompt: &str) -> Result<String, SolveError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone()
    }
}

type RespondFn = dyn Fn(usize, &JsonValue) -> Result<TransportResponse, TransportError> + Send + Sync;

struct StubTransport {
    respond: Box<RespondFn>,
    /// 每次提交前等待的时间（配合暂停的时钟使用）
    delay: Duration,
    calls: AtomicUsize,
    payloads: Mutex<Vec<JsonValue>>,
}

impl StubTransport {
    fn new(
        respond: impl Fn(usize, &JsonValue) -> Result<TransportResponse, TransportError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Self::delayed(Duration::ZERO, respond)
    }

    fn delayed(
        delay: Duration,
        respond: impl Fn(usize, &JsonValue) -> Result<TransportResponse, TransportError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            delay,
            calls: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn payloads(&self) -> Vec<JsonValue> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn post_json(
        &self,
        _address: &str,
        payload: &JsonValue,
        _timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload.clone());
        (self.respond)(call, payload)
    }
}

fn reply(status: u16, body: JsonValue) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse {
        status,
        body: body.to_string(),
    })
}

fn unreachable_endpoint() -> Result<TransportResponse, TransportError> {
    Err(TransportError::request_failed("https://quiz.test/submit", "connection refused"))
}

// ========== 组装 ==========

struct Harness {
    controller: ChainController,
    _downloads: tempfile::TempDir,
}

fn harness(
    fetcher: Arc<StubFetcher>,
    solver: Arc<StubSolver>,
    transport: Arc<StubTransport>,
    policy: SolveFailurePolicy,
) -> Harness {
    let downloads = tempfile::tempdir().unwrap();
    let flow = TaskFlow::new(
        fetcher,
        AttachmentDecoder::default(),
        AnswerSynthesizer::new(solver, policy, "Unable to solve"),
        SubmissionInterpreter::new(transport, Duration::from_secs(5)),
        ChainLimits::default(),
        Timeouts::default(),
    );
    Harness {
        controller: ChainController::new(flow, downloads.path()),
        _downloads: downloads,
    }
}

fn identity() -> Identity {
    Identity::new("student@example.com", "s3cret")
}

fn expect_failure(result: &ChainResult) -> (FailureKind, ChainState) {
    let failure = result.failure().expect("chain should fail");
    (failure.kind, failure.state)
}

// ========== 测试 ==========

#[tokio::test]
async fn test_single_task_accepted() {
    let fetcher = StubFetcher::question_page();
    let solver = StubSolver::answering("42");
    let transport = StubTransport::new(|_, _| reply(200, json!({"correct": true})));
    let h = harness(fetcher.clone(), solver, transport.clone(), SolveFailurePolicy::SubmitSentinel);

    let result = h.controller.resolve_chain(ROOT, &identity()).await;

    let ChainResult::Accepted(success) = result else {
        panic!("expected acceptance");
    };
    assert_eq!(success.answer, TypedValue::Integer(42));
    assert_eq!(success.payload, json!({"correct": true}));
    assert_eq!(success.trace.len(), 1);
    assert_eq!(
        success.trace[0].submission_target.as_deref(),
        Some("https://quiz.test/submit")
    );
    assert_eq!(
        transport.payloads()[0],
        json!({"email": "student@example.com", "secret": "s3cret", "url": ROOT, "answer": 42})
    );
    assert_eq!(fetcher.fetched(), vec![ROOT]);
}

#[tokio::test]
async fn test_retry_bound_is_three_attempts() {
    let fetcher = StubFetcher::question_page();
    let solver = StubSolver::answering("42");
    let transport = StubTransport::new(|_, _| reply(200, json!({"correct": false, "reason": "Wrong"})));
    let h = harness(fetcher, solver.clone(), transport.clone(), SolveFailurePolicy::SubmitSentinel);

    let result = h.controller.resolve_chain(ROOT, &identity()).await;

    assert_eq!(expect_failure(&result), (FailureKind::RejectedAnswer, ChainState::Submitting));
    assert_eq!(transport.calls(), 3);
    assert_eq!(result.trace()[0].attempts, 3);

    // 第一次正常求解，之后每次重试都带着上一次的答案重新求解
    let prompts = solver.prompts();
    assert_eq!(prompts.len(), 3);
    assert!(!prompts[0].contains("Previous answer was incorrect"));
    assert!(prompts[1].contains("Previous answer was incorrect: 42"));
    assert!(prompts[1].contains("Reason given: Wrong"));

    let failure = result.failure().unwrap();
    assert_eq!(failure.last_answer, Some(TypedValue::Integer(42)));
    assert!(failure.problem_snippet.as_deref().unwrap().contains("answer to everything"));
}

#[tokio::test]
async fn test_second_attempt_accepted() {
    let transport = StubTransport::new(|call, _| {
        if call == 0 {
            reply(200, json!({"correct": false}))
        } else {
            reply(200, json!({"correct": true}))
        }
    });
    let h = harness(
        StubFetcher::question_page(),
        StubSolver::answering("7"),
        transport.clone(),
        SolveFailurePolicy::SubmitSentinel,
    );

    let result = h.controller.resolve_chain(ROOT, &identity()).await;

    assert!(result.is_accepted());
    assert_eq!(transport.calls(), 2);
    assert_eq!(result.trace()[0].attempts, 2);
}

#[tokio::test]
async fn test_transport_error_resubmits_same_answer() {
    let solver = StubSolver::answering("42");
    let transport = StubTransport::new(|call, _| {
        if call < 2 {
            unreachable_endpoint()
        } else {
            reply(200, json!({"status": "success"}))
        }
    });
    let h = harness(
        StubFetcher::question_page(),
        solver.clone(),
        transport.clone(),
        SolveFailurePolicy::SubmitSentinel,
    );

    let result = h.controller.resolve_chain(ROOT, &identity()).await;

    assert!(result.is_accepted());
    assert_eq!(transport.calls(), 3);
    assert_eq!(solver.prompts().len(), 1);
}

#[tokio::test]
async fn test_persistent_transport_error_is_terminal() {
    let transport = StubTransport::new(|_, _| unreachable_endpoint());
    let h = harness(
        StubFetcher::question_page(),
        StubSolver::answering("42"),
        transport.clone(),
        SolveFailurePolicy::SubmitSentinel,
    );

    let result = h.controller.resolve_chain(ROOT, &identity()).await;

    assert_eq!(expect_failure(&result), (FailureKind::TransportError, ChainState::Submitting));
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn test_continuation_chain() {
    let fetcher = StubFetcher::question_page();
    let transport = StubTransport::new(|call, _| {
        if call == 0 {
            reply(200, json!({"correct": true, "url": "/quiz/2"}))
        } else {
            reply(200, json!({"correct": true}))
        }
    });
    let h = harness(
        fetcher.clone(),
        StubSolver::answering("42"),
        transport.clone(),
        SolveFailurePolicy::SubmitSentinel,
    );

    let result = h.controller.resolve_chain(ROOT, &identity()).await;

    assert!(result.is_accepted());
    assert_eq!(fetcher.fetched(), vec![ROOT, "https://quiz.test/quiz/2"]);
    let depths: Vec<u32> = result.trace().iter().map(|r| r.depth).collect();
    assert_eq!(depths, vec![0, 1]);
    let states: Vec<ChainState> = result.trace().iter().map(|r| r.state).collect();
    assert_eq!(states, vec![ChainState::Continuing, ChainState::Done]);
    assert_eq!(transport.payloads()[1]["url"], "https://quiz.test/quiz/2");
}

#[tokio::test]
async fn test_relative_self_continuation_ends_chain() {
    let fetcher = StubFetcher::question_page();
    let transport = StubTransport::new(|_, _| reply(200, json!({"correct": true, "url": "/quiz/1"})));
    let h = harness(
        fetcher.clone(),
        StubSolver::answering("42"),
        transport.clone(),
        SolveFailurePolicy::SubmitSentinel,
    );

    let result = h.controller.resolve_chain(ROOT, &identity()).await;

    assert!(result.is_accepted());
    assert_eq!(fetcher.fetched(), vec![ROOT]);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_remote_task_cannot_continue_to_local_file() {
    let fetcher = StubFetcher::question_page();
    let transport =
        StubTransport::new(|_, _| reply(200, json!({"correct": true, "url": "file:///etc/passwd"})));
    let h = harness(
        fetcher.clone(),
        StubSolver::answering("42"),
        transport,
        SolveFailurePolicy::SubmitSentinel,
    );

    let result = h.controller.resolve_chain(ROOT, &identity()).await;

    assert_eq!(expect_failure(&result), (FailureKind::FetchError, ChainState::Continuing));
    assert_eq!(fetcher.fetched(), vec![ROOT]);
    assert_eq!(result.trace()[0].state, ChainState::Failed);
}

#[tokio::test]
async fn test_local_task_may_continue_to_local_file() {
    let fetcher = StubFetcher::question_page();
    let transport = StubTransport::new(|call, _| {
        if call == 0 {
            reply(200, json!({"correct": true, "url": "file:///tmp/quiz/2.html"}))
        } else {
            reply(200, json!({"correct": true}))
        }
    });
    let h = harness(
        fetcher.clone(),
        StubSolver::answering("42"),
        transport,
        SolveFailurePolicy::SubmitSentinel,
    );

    let result = h.controller.resolve_chain("file:///tmp/quiz/1.html", &identity()).await;

    assert!(result.is_accepted());
    assert_eq!(
        fetcher.fetched(),
        vec!["file:///tmp/quiz/1.html", "file:///tmp/quiz/2.html"]
    );
}

#[tokio::test]
async fn test_depth_ceiling() {
    let fetcher = StubFetcher::question_page();
    // 每次都给出下一个任务
    let transport = StubTransport::new(|_, payload| {
        let current = payload["url"].as_str().unwrap_or_default();
        reply(200, json!({"correct": true, "url": format!("{}/next", current)}))
    });
    let h = harness(
        fetcher.clone(),
        StubSolver::answering("42"),
        transport,
        SolveFailurePolicy::SubmitSentinel,
    );

    let result = h.controller.resolve_chain(ROOT, &identity()).await;

    assert_eq!(expect_failure(&result), (FailureKind::DepthExceeded, ChainState::Continuing));
    // depth 0..=10 都执行过，没有获取 depth 11
    assert_eq!(fetcher.fetched().len(), 11);
    assert_eq!(result.failure().unwrap().depth, 10);
    assert_eq!(result.trace().len(), 11);
}

#[tokio::test(start_paused = true)]
async fn test_time_budget_stops_continuation() {
    let fetcher = StubFetcher::question_page();
    // 提交耗时超过整条链的时间预算，然后给出下一个任务
    let transport = StubTransport::delayed(Duration::from_secs(200), |_, _| {
        reply(200, json!({"correct": true, "url": "https://quiz.test/quiz/2"}))
    });
    let h = harness(
        fetcher.clone(),
        StubSolver::answering("42"),
        transport,
        SolveFailurePolicy::SubmitSentinel,
    );

    let result = h.controller.resolve_chain(ROOT, &identity()).await;

    assert_eq!(
        expect_failure(&result),
        (FailureKind::TimeBudgetExceeded, ChainState::Continuing)
    );
    assert_eq!(fetcher.fetched(), vec![ROOT]);
    assert_eq!(result.failure().unwrap().last_answer, Some(TypedValue::Integer(42)));
}

#[tokio::test(start_paused = true)]
async fn test_time_budget_stops_retry() {
    let transport = StubTransport::delayed(Duration::from_secs(200), |_, _| {
        reply(200, json!({"correct": false}))
    });
    let h = harness(
        StubFetcher::question_page(),
        StubSolver::answering("42"),
        transport.clone(),
        SolveFailurePolicy::SubmitSentinel,
    );

    let result = h.controller.resolve_chain(ROOT, &identity()).await;

    assert_eq!(
        expect_failure(&result),
        (FailureKind::TimeBudgetExceeded, ChainState::Retrying)
    );
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_fetch_error_is_terminal() {
    let fetcher = StubFetcher::new(|locator| {
        Err(FetchError::NavigationFailed {
            locator: locator.to_string(),
            message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
        })
    });
    let transport = StubTransport::new(|_, _| reply(200, json!({"correct": true})));
    let h = harness(
        fetcher,
        StubSolver::answering("42"),
        transport.clone(),
        SolveFailurePolicy::SubmitSentinel,
    );

    let result = h.controller.resolve_chain(ROOT, &identity()).await;

    assert_eq!(expect_failure(&result), (FailureKind::FetchError, ChainState::Fetching));
    assert_eq!(transport.calls(), 0);
    assert!(result.failure().unwrap().reason.contains("ERR_NAME_NOT_RESOLVED"));
}

#[tokio::test]
async fn test_empty_page_is_extraction_failure() {
    let fetcher = StubFetcher::new(|locator| Ok(page(locator, "<html><body>  </body></html>")));
    let solver = StubSolver::answering("42");
    let h = harness(
        fetcher,
        solver.clone(),
        StubTransport::new(|_, _| reply(200, json!({"correct": true}))),
        SolveFailurePolicy::SubmitSentinel,
    );

    let result = h.controller.resolve_chain(ROOT, &identity()).await;

    assert_eq!(expect_failure(&result), (FailureKind::ExtractionEmpty, ChainState::Extracting));
    assert!(solver.prompts().is_empty());
}

#[tokio::test]
async fn test_solver_failure_submits_sentinel() {
    let transport = StubTransport::new(|_, _| reply(200, json!({"correct": true})));
    let h = harness(
        StubFetcher::question_page(),
        StubSolver::failing(),
        transport.clone(),
        SolveFailurePolicy::SubmitSentinel,
    );

    let result = h.controller.resolve_chain(ROOT, &identity()).await;

    let ChainResult::Accepted(success) = result else {
        panic!("sentinel answer should still be submitted");
    };
    assert_eq!(success.answer, TypedValue::Text("Unable to solve".to_string()));
    assert!(success.trace[0].answer.as_ref().unwrap().is_sentinel());
    assert_eq!(transport.payloads()[0]["answer"], "Unable to solve");
    let absorbed: Vec<FailureKind> = success.trace[0].absorbed.iter().map(|a| a.kind).collect();
    assert_eq!(absorbed, vec![FailureKind::SolveError]);
}

#[tokio::test]
async fn test_solver_failure_with_fail_policy() {
    let transport = StubTransport::new(|_, _| reply(200, json!({"correct": true})));
    let h = harness(
        StubFetcher::question_page(),
        StubSolver::failing(),
        transport.clone(),
        SolveFailurePolicy::FailTask,
    );

    let result = h.controller.resolve_chain(ROOT, &identity()).await;

    assert_eq!(expect_failure(&result), (FailureKind::SolveError, ChainState::Synthesizing));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_failure_serializes_with_status_tag() {
    let fetcher = StubFetcher::new(|locator| Err(FetchError::request_failed(locator, "boom")));
    let h = harness(
        fetcher,
        StubSolver::answering("1"),
        StubTransport::new(|_, _| reply(200, json!({}))),
        SolveFailurePolicy::SubmitSentinel,
    );

    let result = h.controller.resolve_chain(ROOT, &identity()).await;
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(value["status"], "failed");
    assert_eq!(value["kind"], "FetchError");
    assert_eq!(value["state"], "FETCHING");
}
