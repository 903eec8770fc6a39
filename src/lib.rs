//! # Quiz Chain Solver
//!
//! 自动求解一串远程托管的任务页面：获取页面、提取题目和数据、求解、提交，
//! 根据提交结果续链，整条链共享同一个时间预算。
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 外部协作者的能力边界（trait），只暴露能力
//! - `Fetcher` / `FormatDecoder` / `SolvingStrategy` / `Transport`
//! - 具体实现：`browser/`（chromiumoxide）、`clients/`（reqwest、async-openai）、`FileDecoders`
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个任务的一个步骤
//! - `normalize` - 页面规范化（题目、提交地址、结构化数据、附件链接）
//! - `AttachmentDecoder` - 附件解码
//! - `AnswerSynthesizer` - 提示词拼接、求解、类型转换
//! - `SubmissionInterpreter` - 提交并归类结果
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个任务"的完整处理流程
//! - `TaskFlow` - 获取 → 规范化 → 解码 → 合成 → 提交，含重试循环
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/chain_controller` - 续链循环、深度上限、时间预算
//!
//! 对外接口在 `api/`（axum），入口在 [`App`]。
//!
//! ## 模块结构

pub mod api;
pub mod app;
pub mod browser;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use config::{ChainLimits, Config, SolveFailurePolicy, Timeouts};
pub use error::{AppError, AppResult};
pub use models::{ChainResult, Identity};
pub use orchestrator::ChainController;
pub use workflow::TaskFlow;
