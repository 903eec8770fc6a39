//! HTTP 路由
//!
//! - `GET /`：服务信息
//! - `GET /healthz`：健康检查
//! - `POST /solving`：校验请求后求解一整条任务链

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::Identity;
use crate::orchestrator::ChainController;

/// 允许的任务地址前缀
const ALLOWED_SCHEMES: &[&str] = &["http://", "https://", "file://"];

/// 所有请求共享的状态
pub struct AppState {
    pub config: Arc<Config>,
    pub controller: ChainController,
}

impl AppState {
    pub fn new(config: Arc<Config>, controller: ChainController) -> Self {
        Self { config, controller }
    }
}

/// `POST /solving` 的请求体
#[derive(Debug, Clone, Deserialize)]
pub struct SolveRequest {
    pub email: String,
    pub secret: String,
    pub url: String,
}

impl SolveRequest {
    /// 字段校验，返回第一个不合法字段的说明
    fn validate(&self) -> Result<(), String> {
        if self.email.trim().is_empty() {
            return Err("email 不能为空".to_string());
        }
        if self.secret.trim().is_empty() {
            return Err("secret 不能为空".to_string());
        }
        if !ALLOWED_SCHEMES.iter().any(|scheme| self.url.starts_with(scheme)) {
            return Err("url 必须以 http://、https:// 或 file:// 开头".to_string());
        }
        Ok(())
    }
}

/// 构建路由
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/solving", post(solving))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "LLM Quiz Solver API",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

fn detail(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": message.into() }))).into_response()
}

async fn solving(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SolveRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return detail(StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text());
        }
    };

    if let Err(message) = request.validate() {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, message);
    }

    if request.secret != state.config.secret {
        warn!("⚠️ secret 校验失败: {}", request.email);
        return detail(StatusCode::FORBIDDEN, "invalid secret");
    }

    info!("收到求解请求: {} ({})", request.url, request.email);
    let identity = Identity::new(request.email, request.secret);
    let result = state.controller.resolve_chain(&request.url, &identity).await;

    Json(result).into_response()
}
