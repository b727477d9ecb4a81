use crate::browser::BrowserDriver;
use crate::error::{AppError, Result};
use crate::session::SessionCookie;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, TimeSinceEpoch};
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Chrome DevTools Protocol driver. One browser, one page, scoped to a run.
pub struct CdpDriver {
    browser: Option<Browser>,
    page: Option<Page>,
}

impl CdpDriver {
    /// Launches Chrome with automation-detection friction reduced. Retries
    /// the launch a few times; Chrome occasionally fails to bind its
    /// debugging port on a cold start.
    pub async fn launch(headless: bool) -> Result<Self> {
        tracing::info!(headless, "Launching browser");

        let mut builder = BrowserConfig::builder()
            .window_size(1280, 800)
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg(format!("--user-agent={}", USER_AGENT));

        if !headless {
            builder = builder.with_head();
        } else {
            builder = builder.arg("--headless").arg("--disable-gpu");
        }

        let config = builder
            .build()
            .map_err(|e| AppError::Browser(format!("Failed to build browser config: {}", e)))?;

        let mut last_error = None;
        for attempt in 1..=3u64 {
            match Browser::launch(config.clone()).await {
                Ok((browser, mut handler)) => {
                    tokio::spawn(async move {
                        while let Some(event) = handler.next().await {
                            if let Err(e) = event {
                                let msg = format!("{:?}", e);
                                // Protocol deserialization mismatches are noise
                                if !msg.contains("data did not match any variant") {
                                    tracing::debug!("Browser handler event: {}", msg);
                                }
                            }
                        }
                    });

                    let page = browser
                        .new_page("about:blank")
                        .await
                        .map_err(|e| AppError::Browser(format!("Failed to create page: {}", e)))?;

                    tracing::debug!("Browser launched, page ready");
                    return Ok(Self {
                        browser: Some(browser),
                        page: Some(page),
                    });
                }
                Err(e) => {
                    tracing::warn!(attempt, "Browser launch failed: {}", e);
                    last_error = Some(e);
                    if attempt < 3 {
                        tokio::time::sleep(Duration::from_millis(1000 * attempt)).await;
                    }
                }
            }
        }

        Err(AppError::Browser(format!(
            "Failed to launch browser after 3 attempts: {}",
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string())
        )))
    }

    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| AppError::Browser("No page available".into()))
    }

    async fn eval(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|e| AppError::Browser(format!("Failed to evaluate script: {}", e)))?;
        result
            .into_value()
            .map_err(|e| AppError::Browser(format!("Failed to read script result: {}", e)))
    }
}

/// Escape a CSS selector or string literal for embedding in single quotes.
fn js_escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
impl BrowserDriver for CdpDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        tracing::debug!(url, "Navigating");
        let page = self.page()?;
        page.goto(url)
            .await
            .map_err(|e| AppError::Navigation(format!("Failed to navigate to {}: {}", url, e)))?;

        // Heavy feeds keep loading long after domcontentloaded; a bounded
        // wait is enough, the selector waits do the real synchronization.
        match tokio::time::timeout(Duration::from_secs(10), page.wait_for_navigation()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::debug!("Navigation wait ended early: {}", e),
            Err(_) => tracing::debug!("Navigation wait timed out, continuing"),
        }
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let start = std::time::Instant::now();
        loop {
            if self.selector_exists(selector).await? {
                return Ok(());
            }
            if start.elapsed() > timeout {
                return Err(AppError::Browser(format!(
                    "Timeout waiting for selector: {}",
                    selector
                )));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn selector_exists(&self, selector: &str) -> Result<bool> {
        let script = format!(
            "document.querySelector('{}') !== null",
            js_escape(selector)
        );
        Ok(self.eval(&script).await?.as_bool().unwrap_or(false))
    }

    async fn click(&self, selector: &str) -> Result<bool> {
        let script = format!(
            r#"(() => {{
                const matches = Array.from(document.querySelectorAll('{}'));
                for (const el of matches) {{
                    const rect = el.getBoundingClientRect();
                    if (rect.width > 0 && rect.height > 0) {{
                        el.click();
                        return true;
                    }}
                }}
                return false;
            }})()"#,
            js_escape(selector)
        );
        Ok(self.eval(&script).await?.as_bool().unwrap_or(false))
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector('{}');
                if (!el) return false;
                el.focus();
                el.value = '{}';
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()"#,
            js_escape(selector),
            js_escape(value)
        );
        let filled = self.eval(&script).await?.as_bool().unwrap_or(false);
        if !filled {
            return Err(AppError::Browser(format!(
                "Input element not found: {}",
                selector
            )));
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        self.eval(script).await
    }

    async fn scroll_to_bottom(&self) -> Result<i64> {
        let value = self
            .eval(
                r#"(() => {
                    window.scrollTo(0, document.body.scrollHeight);
                    return document.body.scrollHeight;
                })()"#,
            )
            .await?;
        Ok(value.as_i64().unwrap_or(0))
    }

    async fn current_url(&self) -> Result<String> {
        let url = self
            .page()?
            .url()
            .await
            .map_err(|e| AppError::Browser(format!("Failed to get URL: {}", e)))?;
        Ok(url.unwrap_or_default())
    }

    async fn read_text(&self, selector: &str) -> Result<Option<String>> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector('{}');
                return el ? (el.innerText || el.textContent || '').trim() : null;
            }})()"#,
            js_escape(selector)
        );
        Ok(self
            .eval(&script)
            .await?
            .as_str()
            .map(|s| s.to_string()))
    }

    async fn read_attribute(&self, selector: &str, attribute: &str) -> Result<Option<String>> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector('{}');
                return el ? el.getAttribute('{}') : null;
            }})()"#,
            js_escape(selector),
            js_escape(attribute)
        );
        Ok(self
            .eval(&script)
            .await?
            .as_str()
            .map(|s| s.to_string()))
    }

    async fn get_cookies(&self) -> Result<Vec<SessionCookie>> {
        let cookies = self
            .page()?
            .get_cookies()
            .await
            .map_err(|e| AppError::Browser(format!("Failed to read cookies: {}", e)))?;
        // Round-trip through JSON: the protocol structs serialize to the
        // same camelCase shape SessionCookie parses.
        let value = serde_json::to_value(&cookies)?;
        Ok(serde_json::from_value(value)?)
    }

    async fn set_cookies(&self, cookies: &[SessionCookie]) -> Result<()> {
        let mut params = Vec::with_capacity(cookies.len());
        for cookie in cookies {
            let mut builder = CookieParam::builder()
                .name(cookie.name.clone())
                .value(cookie.value.clone())
                .domain(cookie.domain.clone())
                .path(cookie.path.clone())
                .secure(cookie.secure)
                .http_only(cookie.http_only);
            if let Some(expires) = cookie.expires {
                builder = builder.expires(TimeSinceEpoch::new(expires));
            }
            params.push(
                builder
                    .build()
                    .map_err(|e| AppError::Browser(format!("Invalid cookie: {}", e)))?,
            );
        }
        self.page()?
            .set_cookies(params)
            .await
            .map_err(|e| AppError::Browser(format!("Failed to set cookies: {}", e)))?;
        Ok(())
    }

    async fn local_storage_entries(&self) -> Result<Vec<(String, String)>> {
        let value = self
            .eval("(() => Object.entries(window.localStorage))()")
            .await
            .unwrap_or(serde_json::Value::Null);
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    async fn set_local_storage(&self, entries: &[(String, String)]) -> Result<()> {
        for (key, val) in entries {
            let script = format!(
                "window.localStorage.setItem({}, {})",
                serde_json::to_string(key)?,
                serde_json::to_string(val)?
            );
            self.eval(&script).await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        tracing::debug!("Closing browser");
        self.page = None;
        if let Some(mut browser) = self.browser.take() {
            browser
                .close()
                .await
                .map_err(|e| AppError::Browser(format!("Failed to close browser: {}", e)))?;
        }
        Ok(())
    }
}

impl Drop for CdpDriver {
    fn drop(&mut self) {
        // Backstop for error paths that skipped close(); never leak a
        // browser process across runs.
        if let Some(mut browser) = self.browser.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = browser.close().await;
                });
            }
        }
    }
}
