/// HTTP 客户端
///
/// 普通 HTTP 页面获取、附件下载、提交传输，均基于 reqwest。
/// `file://` 地址直接读本地文件。
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info};
use url::Url;

use crate::error::{FetchError, TransportError};
use crate::infrastructure::{FetchedPage, Fetcher, Transport, TransportResponse};

/// 本地地址对应的路径
fn local_path(locator: &str) -> Option<PathBuf> {
    let url = Url::parse(locator).ok()?;
    if url.scheme() == "file" {
        url.to_file_path().ok()
    } else {
        None
    }
}

fn map_reqwest_error(locator: &str, timeout: Duration, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            locator: locator.to_string(),
            timeout,
        }
    } else {
        FetchError::request_failed(locator, err)
    }
}

/// 下载附件到目录，返回本地路径；本地文件直接返回原路径
pub async fn download_to(
    client: &reqwest::Client,
    link: &str,
    dest_dir: &Path,
    timeout: Duration,
) -> Result<PathBuf, FetchError> {
    if let Some(path) = local_path(link) {
        return Ok(path);
    }

    let url = Url::parse(link).map_err(|_| FetchError::InvalidLocator {
        locator: link.to_string(),
    })?;
    let file_name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .unwrap_or("attachment")
        .to_string();

    debug!("下载附件: {}", link);
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| map_reqwest_error(link, timeout, e))?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| map_reqwest_error(link, timeout, e))?;

    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|source| FetchError::LocalRead {
            path: dest_dir.to_path_buf(),
            source,
        })?;
    let dest = unique_destination(dest_dir, &file_name);
    tokio::fs::write(&dest, &bytes)
        .await
        .map_err(|source| FetchError::LocalRead {
            path: dest.clone(),
            source,
        })?;

    info!("已保存附件: {} ({} 字节)", dest.display(), bytes.len());
    Ok(dest)
}

/// 同名文件已存在时追加序号
fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{}", ext)),
        None => (file_name, String::new()),
    };
    (1..)
        .map(|n| dir.join(format!("{}-{}{}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// 普通 HTTP 页面获取器（不执行脚本，没有全局变量）
#[derive(Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, locator: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
        if let Some(path) = local_path(locator) {
            let markup = tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| FetchError::LocalRead { path, source })?;
            return Ok(FetchedPage {
                markup,
                final_locator: locator.to_string(),
                prerendered_variables: Map::new(),
                downloaded_paths: Vec::new(),
            });
        }

        info!("正在获取页面: {}", locator);
        let response = self
            .client
            .get(locator)
            .timeout(timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| map_reqwest_error(locator, timeout, e))?;
        let final_locator = response.url().to_string();
        let markup = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(locator, timeout, e))?;

        Ok(FetchedPage {
            markup,
            final_locator,
            prerendered_variables: Map::new(),
            downloaded_paths: Vec::new(),
        })
    }

    async fn download(
        &self,
        link: &str,
        dest_dir: &Path,
        timeout: Duration,
    ) -> Result<PathBuf, FetchError> {
        download_to(&self.client, link, dest_dir, timeout).await
    }
}

/// 提交传输
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(
        &self,
        address: &str,
        payload: &JsonValue,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        debug!("POST {}", address);
        let response = self
            .client
            .post(address)
            .timeout(timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        address: address.to_string(),
                        timeout,
                    }
                } else {
                    TransportError::request_failed(address, e)
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::request_failed(address, e))?;

        Ok(TransportResponse { status, body })
    }
}
