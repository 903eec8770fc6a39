pub mod http_client;
pub mod llm_client;

pub use http_client::{HttpFetcher, HttpTransport};
pub use llm_client::LlmClient;
