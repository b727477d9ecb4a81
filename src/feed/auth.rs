use crate::browser::BrowserDriver;
use crate::error::{AppError, Result};
use crate::models::RunPhase;
use crate::session::SessionSnapshot;
use std::time::{Duration, Instant};

use super::engine::FeedEngine;
use super::selectors;

impl<'a, D: BrowserDriver> FeedEngine<'a, D> {
    /// Moves the engine from `Unauthenticated` to `Authenticated`, restoring
    /// a saved session when configured and valid, otherwise submitting
    /// credentials through the login form. The session store is touched only
    /// here.
    pub(crate) async fn authenticate(&mut self) -> Result<()> {
        self.phase = RunPhase::Authenticating;
        self.send_status("Authenticating").await;

        if self.config.restore_session {
            if self.try_restore_session().await? {
                return Ok(());
            }
        }

        if self.config.email.is_empty() || self.config.password.is_empty() {
            return Err(AppError::AuthFailed(
                "no credentials provided and no valid saved session".to_string(),
            ));
        }

        self.login().await?;

        self.phase = RunPhase::Authenticated;
        self.send_status("Logged in").await;

        if self.config.save_session {
            self.save_session_snapshot().await;
        }
        Ok(())
    }

    /// Returns true when a saved session was applied and still works.
    async fn try_restore_session(&mut self) -> Result<bool> {
        let Some(snapshot) = self.store.load(&self.site, &self.config.email) else {
            return Ok(false);
        };
        self.send_status("Restoring saved session").await;

        if let Err(e) = self.driver.set_cookies(&snapshot.cookies).await {
            tracing::warn!("Failed to apply saved cookies: {}", e);
            return Ok(false);
        }
        self.navigate_with_retry(selectors::BASE_URL).await?;
        if !snapshot.local_storage.is_empty() {
            if let Err(e) = self.driver.set_local_storage(&snapshot.local_storage).await {
                tracing::debug!("Could not restore local storage: {}", e);
            }
        }

        if self.probe_authenticated().await {
            self.phase = RunPhase::Authenticated;
            self.send_status("Saved session still valid, skipping login").await;
            return Ok(true);
        }
        self.send_status("Saved session expired, logging in fresh").await;
        Ok(false)
    }

    /// Probe for the authenticated marker rather than assuming a fixed wait.
    async fn probe_authenticated(&self) -> bool {
        if self
            .driver
            .wait_for_selector(selectors::AUTH_MARKER, Duration::from_secs(8))
            .await
            .is_err()
        {
            return false;
        }
        // A login form on an "authenticated" page means the marker lied.
        !self
            .driver
            .selector_exists(selectors::EMAIL_INPUT)
            .await
            .unwrap_or(true)
    }

    async fn login(&mut self) -> Result<()> {
        let timing = self.config.timing.clone();

        self.send_status("Opening login page").await;
        self.navigate_with_retry(selectors::LOGIN_URL).await?;
        self.sleep_ms(timing.settle_wait_ms).await;

        self.accept_cookie_consent().await;

        self.send_status("Submitting credentials").await;
        self.driver
            .fill(selectors::EMAIL_INPUT, &self.config.email)
            .await
            .map_err(|e| AppError::AuthFailed(format!("login form unrecognized: {}", e)))?;
        self.sleep_ms(timing.settle_wait_ms / 4).await;
        self.driver
            .fill(selectors::PASSWORD_INPUT, &self.config.password)
            .await
            .map_err(|e| AppError::AuthFailed(format!("login form unrecognized: {}", e)))?;
        self.sleep_ms(timing.settle_wait_ms / 4).await;

        let mut clicked = false;
        for selector in selectors::LOGIN_BUTTONS {
            if self.driver.click(selector).await.unwrap_or(false) {
                clicked = true;
                break;
            }
        }
        if !clicked {
            tracing::debug!("No login button matched, submitting the form directly");
            let _ = self.driver.evaluate(selectors::SUBMIT_LOGIN_FORM_JS).await;
        }

        self.send_status("Waiting for login redirect").await;
        let mut checkpoint = false;
        for _ in 0..timing.login_poll_rounds {
            self.sleep_ms(timing.login_poll_ms).await;
            let url = self.current_url_lower().await;
            if has_marker(&url, selectors::CHECKPOINT_MARKERS) {
                checkpoint = true;
                break;
            }
            if !url.is_empty() && !has_marker(&url, selectors::LOGIN_STUCK_MARKERS) {
                break;
            }
        }

        if checkpoint {
            self.complete_manual_verification().await?;
        }

        let url = self.current_url_lower().await;
        if has_marker(&url, selectors::LOGIN_STUCK_MARKERS) {
            return Err(AppError::AuthFailed(format!(
                "credentials rejected or login stuck at {}",
                url
            )));
        }
        Ok(())
    }

    /// Human-in-the-loop wait for a secondary verification step: poll the
    /// URL until the checkpoint marker clears or the bounded timeout ends.
    async fn complete_manual_verification(&mut self) -> Result<()> {
        if self.config.headless {
            return Err(AppError::AuthRequiresInteraction);
        }

        let timing = self.config.timing.clone();
        self.send_status(
            "Verification required: approve the login in the browser window",
        )
        .await;

        let deadline =
            Instant::now() + Duration::from_millis(timing.verification_timeout_ms.max(1));
        loop {
            self.check_cancelled()?;
            self.sleep_ms(timing.login_poll_ms).await;
            let url = self.current_url_lower().await;
            if !has_marker(&url, selectors::CHECKPOINT_MARKERS) {
                self.send_status("Verification completed").await;
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AppError::AuthFailed(
                    "manual verification timed out".to_string(),
                ));
            }
        }
    }

    async fn accept_cookie_consent(&self) {
        for selector in selectors::CONSENT_BUTTONS {
            if self.driver.click(selector).await.unwrap_or(false) {
                tracing::debug!(selector, "Cookie consent accepted");
                self.sleep_ms(self.config.timing.settle_wait_ms / 2).await;
                break;
            }
        }
    }

    async fn save_session_snapshot(&self) {
        let cookies = match self.driver.get_cookies().await {
            Ok(cookies) => cookies,
            Err(e) => {
                tracing::warn!("Could not read cookies for session save: {}", e);
                return;
            }
        };
        let local_storage = self.driver.local_storage_entries().await.unwrap_or_default();
        let snapshot = SessionSnapshot {
            site: self.site.clone(),
            saved_at: chrono::Utc::now(),
            cookies,
            local_storage,
        };
        match self.store.save(&snapshot, &self.config.email) {
            Ok(()) => self.send_status("Session saved for next run").await,
            Err(e) => tracing::warn!("Could not save session: {}", e),
        }
    }

    async fn current_url_lower(&self) -> String {
        self.driver
            .current_url()
            .await
            .unwrap_or_default()
            .to_lowercase()
    }
}

fn has_marker(url: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| url.contains(m))
}

#[cfg(test)]
mod tests {
    use super::super::engine::tests::{temp_session_store, test_config, MockDriver};
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn fresh_login_submits_credentials_and_saves_session() {
        let driver = MockDriver::new();
        driver.mark_present(selectors::EMAIL_INPUT);
        driver.mark_present(selectors::LOGIN_BUTTONS[0]);
        // Clean post-login URL, no stuck markers.
        driver.set_url("https://www.facebook.com/");

        let mut config = test_config(5);
        config.save_session = true;
        let store = temp_session_store();
        let (tx, _rx) = mpsc::channel(64);
        let cancel = Arc::new(AtomicBool::new(false));
        let mut engine = FeedEngine::new(&driver, &config, &store, tx, cancel);

        engine.acquire().await.unwrap();

        let fills = driver.fills.lock().unwrap();
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[0].0, selectors::EMAIL_INPUT);
        assert_eq!(fills[1].0, selectors::PASSWORD_INPUT);
        drop(fills);
        assert!(store.exists("facebook.com", "user@example.com"));
    }

    #[tokio::test]
    async fn visible_checkpoint_resolves_once_marker_clears() {
        let driver = MockDriver::new();
        driver.mark_present(selectors::EMAIL_INPUT);
        driver.mark_present(selectors::LOGIN_BUTTONS[0]);
        driver.set_url("https://www.facebook.com/checkpoint/123");

        let mut config = test_config(5);
        config.headless = false;
        config.timing.verification_timeout_ms = 2000;
        config.timing.login_poll_ms = 1;
        let store = temp_session_store();
        let (tx, _rx) = mpsc::channel(64);
        let cancel = Arc::new(AtomicBool::new(false));

        // Clear the checkpoint shortly after the engine starts waiting,
        // as an operator approving the login would.
        let mut engine = FeedEngine::new(&driver, &config, &store, tx, cancel);
        let urls = &driver.urls;
        tokio::join!(
            async {
                engine.acquire().await.unwrap();
            },
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                urls.lock().unwrap().push("https://www.facebook.com/".to_string());
            }
        );
    }

    #[test]
    fn marker_matching_is_substring_based() {
        assert!(has_marker(
            "https://www.facebook.com/checkpoint/x",
            selectors::CHECKPOINT_MARKERS
        ));
        assert!(!has_marker(
            "https://www.facebook.com/groups/keto",
            selectors::CHECKPOINT_MARKERS
        ));
    }
}
