//! 应用入口
//!
//! 负责组装共享状态、绑定监听地址、启动 HTTP 服务

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::api::{router, AppState};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::orchestrator::ChainController;
use crate::utils::logging::log_startup;

/// 应用主结构
pub struct App {
    config: Arc<Config>,
    state: Arc<AppState>,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> AppResult<Self> {
        config.validate()?;
        log_startup(&config);

        let config = Arc::new(config);
        let controller = ChainController::from_config(&config);
        let state = Arc::new(AppState::new(Arc::clone(&config), controller));

        Ok(Self { config, state })
    }

    /// 运行 HTTP 服务直到进程退出
    pub async fn run(self) -> AppResult<()> {
        let addr = self.config.bind_addr.clone();
        let to_server_error = |source| AppError::Server {
            addr: addr.clone(),
            source,
        };

        let listener = TcpListener::bind(&addr).await.map_err(to_server_error)?;
        info!("✓ 服务已启动: http://{}", addr);

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(to_server_error)?;

        info!("👋 服务已停止");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("无法监听退出信号: {}", e);
        std::future::pending::<()>().await;
    }
}
