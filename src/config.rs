//! 程序配置
//!
//! 启动时构建一次，之后以 `Arc<Config>` 只读共享，不存在全局可变状态。

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// 页面获取方式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// 无头浏览器（执行页面脚本）
    Browser,
    /// 普通 HTTP GET
    Http,
}

impl FromStr for FetchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "browser" => Ok(FetchMode::Browser),
            "http" => Ok(FetchMode::Http),
            other => Err(ConfigError::InvalidValue {
                name: "FETCH_MODE".to_string(),
                value: other.to_string(),
                expected: "browser | http".to_string(),
            }),
        }
    }
}

/// 求解策略失败时的处理方式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolveFailurePolicy {
    /// 提交占位答案（低置信度），继续流程
    #[serde(alias = "sentinel")]
    SubmitSentinel,
    /// 当前任务直接失败
    #[serde(alias = "fail")]
    FailTask,
}

impl FromStr for SolveFailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sentinel" | "submitsentinel" => Ok(SolveFailurePolicy::SubmitSentinel),
            "fail" | "failtask" => Ok(SolveFailurePolicy::FailTask),
            other => Err(ConfigError::InvalidValue {
                name: "SOLVE_FAILURE_POLICY".to_string(),
                value: other.to_string(),
                expected: "sentinel | fail".to_string(),
            }),
        }
    }
}

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 共享密钥（请求鉴权 + 提交身份）
    pub secret: String,
    /// 服务监听地址
    pub bind_addr: String,
    /// 页面获取方式
    pub fetch_mode: FetchMode,
    /// 是否无头模式
    pub browser_headless: bool,
    /// 浏览器可执行文件路径（不设置则自动查找）
    pub chrome_executable: Option<PathBuf>,
    /// 已运行浏览器的调试端口（设置后不再自行启动浏览器）
    pub browser_debug_port: Option<u16>,
    /// 附件下载根目录
    pub download_dir: PathBuf,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- 超时（秒） ---
    pub fetch_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub solve_timeout_secs: u64,
    pub submit_timeout_secs: u64,
    // --- 链路限制 ---
    pub max_retries: u32,
    pub retry_window_secs: u64,
    pub max_depth: u32,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    // --- 求解失败策略 ---
    pub solve_failure_policy: SolveFailurePolicy,
    pub sentinel_answer: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            secret: "changeme".to_string(),
            bind_addr: "0.0.0.0:8000".to_string(),
            fetch_mode: FetchMode::Browser,
            browser_headless: true,
            chrome_executable: None,
            browser_debug_port: None,
            download_dir: PathBuf::from(".downloads"),
            verbose_logging: false,
            fetch_timeout_secs: 30,
            download_timeout_secs: 30,
            solve_timeout_secs: 60,
            submit_timeout_secs: 30,
            max_retries: 3,
            retry_window_secs: 180,
            max_depth: 10,
            llm_api_key: String::new(),
            llm_api_base_url: "https://aipipe.org/openrouter/v1".to_string(),
            llm_model_name: "openai/gpt-4o".to_string(),
            llm_temperature: 0.1,
            llm_max_tokens: 1024,
            solve_failure_policy: SolveFailurePolicy::SubmitSentinel,
            sentinel_answer: "Unable to solve".to_string(),
        }
    }
}

/// 链路限制（深度、重试次数、总时间预算）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainLimits {
    pub max_depth: u32,
    pub max_attempts: u32,
    pub time_budget: Duration,
}

impl Default for ChainLimits {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_attempts: 3,
            time_budget: Duration::from_secs(180),
        }
    }
}

/// 各外部调用的超时
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
    pub fetch: Duration,
    pub download: Duration,
    pub solve: Duration,
    pub submit: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            fetch: Duration::from_secs(30),
            download: Duration::from_secs(30),
            solve: Duration::from_secs(60),
            submit: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            secret: env_string("QUIZ_SECRET").unwrap_or(default.secret),
            bind_addr: env_string("BIND_ADDR").unwrap_or(default.bind_addr),
            fetch_mode: env_parse("FETCH_MODE").unwrap_or(default.fetch_mode),
            browser_headless: env_bool("PLAYWRIGHT_HEADLESS")
                .or_else(|| env_bool("BROWSER_HEADLESS"))
                .unwrap_or(default.browser_headless),
            chrome_executable: env_string("CHROME_EXECUTABLE")
                .map(PathBuf::from)
                .or(default.chrome_executable),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT").or(default.browser_debug_port),
            download_dir: env_string("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.download_dir),
            verbose_logging: env_bool("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
            fetch_timeout_secs: env_parse("FETCH_TIMEOUT")
                .or_else(|| env_parse("REQUEST_TIMEOUT"))
                .unwrap_or(default.fetch_timeout_secs),
            download_timeout_secs: env_parse("DOWNLOAD_TIMEOUT")
                .or_else(|| env_parse("REQUEST_TIMEOUT"))
                .unwrap_or(default.download_timeout_secs),
            solve_timeout_secs: env_parse("SOLVE_TIMEOUT").unwrap_or(default.solve_timeout_secs),
            submit_timeout_secs: env_parse("SUBMIT_TIMEOUT")
                .or_else(|| env_parse("REQUEST_TIMEOUT"))
                .unwrap_or(default.submit_timeout_secs),
            max_retries: env_parse("MAX_RETRIES").unwrap_or(default.max_retries),
            retry_window_secs: env_parse("RETRY_WINDOW_SECONDS")
                .unwrap_or(default.retry_window_secs),
            max_depth: env_parse("MAX_DEPTH").unwrap_or(default.max_depth),
            llm_api_key: env_string("LLM_API_KEY")
                .or_else(|| env_string("OPENAI_API_KEY"))
                .unwrap_or(default.llm_api_key),
            llm_api_base_url: env_string("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: env_string("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            llm_temperature: env_parse("LLM_TEMPERATURE").unwrap_or(default.llm_temperature),
            llm_max_tokens: env_parse("LLM_MAX_TOKENS").unwrap_or(default.llm_max_tokens),
            solve_failure_policy: env_parse("SOLVE_FAILURE_POLICY")
                .unwrap_or(default.solve_failure_policy),
            sentinel_answer: env_string("SENTINEL_ANSWER").unwrap_or(default.sentinel_answer),
        }
    }

    /// 从 TOML 文件加载，缺失的键使用默认值
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// `QUIZ_CONFIG_FILE` 指定了文件则读文件，否则读环境变量
    pub fn load() -> Result<Self, ConfigError> {
        match env_string("QUIZ_CONFIG_FILE") {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::from_env()),
        }
    }

    /// 启动前检查取值是否可用
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "secret".to_string(),
                value: self.secret.clone(),
                expected: "非空字符串".to_string(),
            });
        }
        if self.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::InvalidValue {
                name: "bind_addr".to_string(),
                value: self.bind_addr.clone(),
                expected: "host:port".to_string(),
            });
        }
        if self.retry_window_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "retry_window_secs".to_string(),
                value: self.retry_window_secs.to_string(),
                expected: "大于 0 的秒数".to_string(),
            });
        }
        Ok(())
    }

    pub fn limits(&self) -> ChainLimits {
        ChainLimits {
            max_depth: self.max_depth,
            max_attempts: self.max_retries.max(1),
            time_budget: Duration::from_secs(self.retry_window_secs),
        }
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            fetch: Duration::from_secs(self.fetch_timeout_secs),
            download: Duration::from_secs(self.download_timeout_secs),
            solve: Duration::from_secs(self.solve_timeout_secs),
            submit: Duration::from_secs(self.submit_timeout_secs),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|v| v.trim().parse().ok())
}

fn env_bool(name: &str) -> Option<bool> {
    env_string(name).map(|v| matches!(v.trim(), "1" | "true" | "True" | "TRUE" | "yes"))
}
