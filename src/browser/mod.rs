pub mod connection;
pub mod fetcher;
pub mod headless;

pub use connection::connect_to_browser;
pub use fetcher::{BrowserFetcher, BrowserOptions};
pub use headless::launch_headless_browser;
