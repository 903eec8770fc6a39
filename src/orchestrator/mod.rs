//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责整条任务链的调度，是整个系统的"指挥中心"。
//!
//! ### `chain_controller` - 任务链控制器
//! - 以显式循环驱动续链，执行深度上限和时间预算
//! - 管理每条链的下载目录
//! - 把所有失败归类为结构化结果
//!
//! ## 层次关系
//!
//! ```text
//! chain_controller (处理一条链：Vec<Task>)
//!     ↓
//! workflow::TaskFlow (处理单个 Task，含重试)
//!     ↓
//! services (能力层：normalize / decode / synthesize / submit)
//!     ↓
//! infrastructure (能力边界：Fetcher / FormatDecoder / SolvingStrategy / Transport)
//! ```
//!
//! ## 设计原则
//!
//! 1. **向下依赖**：编排层 → workflow → services → infrastructure
//! 2. **无业务逻辑**：只做调度和限制，不做具体业务判断

pub mod chain_controller;

pub use chain_controller::ChainController;
