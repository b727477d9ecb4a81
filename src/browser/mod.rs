mod cdp;

pub use cdp::CdpDriver;

use crate::error::Result;
use crate::session::SessionCookie;
use async_trait::async_trait;
use std::time::Duration;

/// Thin capability surface over a browser page. The feed engine depends only
/// on this trait, never on the concrete page structure, so site changes stay
/// isolated in one adapter and tests can script a fake driver.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Polls until the selector matches or the timeout elapses.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;

    async fn selector_exists(&self, selector: &str) -> Result<bool>;

    /// Clicks the first visible match. Returns `false` when nothing matched.
    async fn click(&self, selector: &str) -> Result<bool>;

    /// Sets an input's value and fires the framework-visible input events.
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// Evaluates a JS expression and returns its JSON value.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Scrolls to the bottom of the page and returns the new scroll height.
    async fn scroll_to_bottom(&self) -> Result<i64>;

    async fn current_url(&self) -> Result<String>;

    async fn read_text(&self, selector: &str) -> Result<Option<String>>;

    async fn read_attribute(&self, selector: &str, attribute: &str) -> Result<Option<String>>;

    async fn get_cookies(&self) -> Result<Vec<SessionCookie>>;

    async fn set_cookies(&self, cookies: &[SessionCookie]) -> Result<()>;

    async fn local_storage_entries(&self) -> Result<Vec<(String, String)>>;

    async fn set_local_storage(&self, entries: &[(String, String)]) -> Result<()>;

    /// Releases the underlying browser. Must be called on every exit path.
    async fn close(&mut self) -> Result<()>;
}
