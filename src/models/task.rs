//! 任务与身份

use std::fmt::Display;

use serde::Deserialize;
use tokio::time::Instant;

/// 一次任务：对单个地址的一次求解
///
/// 创建后不可变；续链时通过 [`Task::continuation`] 生成下一层任务。
#[derive(Debug, Clone)]
pub struct Task {
    /// 任务地址（网络地址或 `file://` 本地地址）
    locator: String,
    /// 从链起点开始的递归深度
    depth: u32,
    /// 链的起始时间，整条链共享
    chain_start: Instant,
}

impl Task {
    /// 链的第一个任务（depth 0）
    pub fn root(locator: impl Into<String>, chain_start: Instant) -> Self {
        Self {
            locator: locator.into(),
            depth: 0,
            chain_start,
        }
    }

    /// 下一层任务：深度 +1，沿用同一个起始时间
    pub fn continuation(&self, locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            depth: self.depth + 1,
            chain_start: self.chain_start,
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn chain_start(&self) -> Instant {
        self.chain_start
    }
}

impl Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[链 depth={}]", self.depth)
    }
}

/// 提交时附带的身份字段
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    pub email: String,
    pub secret: String,
}

impl Identity {
    pub fn new(email: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            secret: secret.into(),
        }
    }
}
