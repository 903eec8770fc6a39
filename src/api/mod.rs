//! 对外 HTTP 接口
//!
//! 负责请求校验和结果序列化，求解逻辑全部委托给编排层

pub mod routes;

pub use routes::{router, AppState, SolveRequest};
