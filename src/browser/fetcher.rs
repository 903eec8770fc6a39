//! 基于浏览器的页面获取
//!
//! 每次获取使用一个新页面：导航、读取 HTML 和脚本渲染出的全局变量，然后关闭。

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Browser;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::browser::{connect_to_browser, launch_headless_browser};
use crate::clients::http_client::download_to;
use crate::config::Config;
use crate::error::FetchError;
use crate::infrastructure::{FetchedPage, Fetcher, JsExecutor};

/// 浏览器选项
#[derive(Debug, Clone, Default)]
pub struct BrowserOptions {
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    /// 设置后连接已运行的浏览器，而不是自行启动
    pub debug_port: Option<u16>,
}

impl BrowserOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            headless: config.browser_headless,
            chrome_executable: config.chrome_executable.clone(),
            debug_port: config.browser_debug_port,
        }
    }
}

/// 浏览器页面获取器
pub struct BrowserFetcher {
    options: BrowserOptions,
    http: reqwest::Client,
}

/// 一次获取期间持有的浏览器
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    /// 自行启动的浏览器用完要关闭
    owned: bool,
}

impl BrowserSession {
    async fn open(options: &BrowserOptions) -> anyhow::Result<Self> {
        let (browser, handler, owned) = match options.debug_port {
            Some(port) => {
                let (browser, handler) = connect_to_browser(port).await?;
                (browser, handler, false)
            }
            None => {
                let (browser, handler) =
                    launch_headless_browser(options.headless, options.chrome_executable.as_deref())
                        .await?;
                (browser, handler, true)
            }
        };
        Ok(Self {
            browser,
            handler,
            owned,
        })
    }

    async fn close(mut self) {
        if self.owned {
            if let Err(e) = self.browser.close().await {
                debug!("关闭浏览器失败: {}", e);
            }
            let _ = self.browser.wait().await;
        }
        self.handler.abort();
    }
}

impl BrowserFetcher {
    pub fn new(options: BrowserOptions) -> Self {
        Self {
            options,
            http: reqwest::Client::new(),
        }
    }

    async fn capture(&self, session: &BrowserSession, locator: &str) -> Result<FetchedPage, FetchError> {
        let page = session
            .browser
            .new_page("about:blank")
            .await
            .map_err(FetchError::browser)?;
        let executor = JsExecutor::new(page);

        info!("正在导航到: {}", locator);
        if let Err(e) = executor.page().goto(locator).await {
            // 导航出错时沿用已加载的内容；什么都没加载则视为失败
            let current = executor.current_url().await.unwrap_or_default();
            if current.is_empty() || current == "about:blank" {
                let _ = executor.page().clone().close().await;
                return Err(FetchError::NavigationFailed {
                    locator: locator.to_string(),
                    message: e.to_string(),
                });
            }
            warn!("页面导航出错，继续使用已加载内容: {}", e);
        }

        if let Err(e) = executor.page().wait_for_navigation().await {
            debug!("等待页面加载完成失败: {}", e);
        }

        let markup = executor.content().await?;
        let final_locator = executor
            .current_url()
            .await
            .unwrap_or_else(|| locator.to_string());
        let prerendered_variables = executor.read_prerendered_variables().await;

        debug!(
            "页面获取完成: {} ({} 字节, {} 个全局变量)",
            final_locator,
            markup.len(),
            prerendered_variables.len()
        );

        if let Err(e) = executor.page().clone().close().await {
            debug!("关闭页面失败: {}", e);
        }

        Ok(FetchedPage {
            markup,
            final_locator,
            prerendered_variables,
            downloaded_paths: Vec::new(),
        })
    }
}

#[async_trait]
impl Fetcher for BrowserFetcher {
    async fn fetch(&self, locator: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
        let work = async {
            let session = BrowserSession::open(&self.options)
                .await
                .map_err(FetchError::browser)?;
            let result = self.capture(&session, locator).await;
            session.close().await;
            result
        };

        tokio::time::timeout(timeout, work)
            .await
            .map_err(|_| FetchError::Timeout {
                locator: locator.to_string(),
                timeout,
            })?
    }

    async fn download(
        &self,
        link: &str,
        dest_dir: &Path,
        timeout: Duration,
    ) -> Result<PathBuf, FetchError> {
        download_to(&self.http, link, dest_dir, timeout).await
    }
}
