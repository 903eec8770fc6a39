/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::ChainResult;

/// 初始化日志
///
/// 优先使用 `RUST_LOG`，否则 `info`（详细模式下为 `debug`）。重复调用不会 panic。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    let limits = config.limits();
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 任务链求解服务");
    info!("🌐 监听地址: {}", config.bind_addr);
    info!("📄 页面获取方式: {:?}", config.fetch_mode);
    info!("🤖 模型: {}", config.llm_model_name);
    info!(
        "⏱️ 限制: 深度 {} / 重试 {} 次 / 时间预算 {:?}",
        limits.max_depth, limits.max_attempts, limits.time_budget
    );
    info!("{}", "=".repeat(60));
}

/// 记录链结束信息
pub fn log_chain_complete(result: &ChainResult) {
    info!("{}", "─".repeat(60));
    match result {
        ChainResult::Accepted(success) => {
            info!(
                "✅ 链完成: {} 个任务, 最终答案: {}, 用时 {} ms",
                success.trace.len(),
                truncate_text(&success.answer.to_string(), 100),
                success.elapsed_ms
            );
        }
        ChainResult::Failed(failure) => {
            info!(
                "❌ 链失败: {:?} @ {:?} (depth {}), 原因: {}, 用时 {} ms",
                failure.kind, failure.state, failure.depth, failure.reason, failure.elapsed_ms
            );
        }
    }
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（字符数）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
