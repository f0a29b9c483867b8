//! Actor session manager
//!
//! One isolated browser context per role per step. Sessions are never
//! reused across steps; each one is closed exactly once, including on
//! error paths.

use std::time::Instant;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::browser::{BrowserSession, Confidence, Lookup, PageHandle};
use crate::config::{Credentials, HarnessConfig};
use crate::error::{HarnessError, HarnessResult};
use crate::state::Role;

/// Prioritized credential-field selectors: field type first, then name
/// attribute, then id.
pub const EMAIL_FIELD_SELECTORS: [&str; 3] =
    ["input[type='email']", "input[name*='email']", "#email"];
pub const PASSWORD_FIELD_SELECTORS: [&str; 3] =
    ["input[type='password']", "input[name*='password']", "#password"];
pub const SUBMIT_SELECTORS: [&str; 3] =
    ["button[type='submit']", "button[name*='login']", "#login-btn"];

const LOGIN_ERROR_SELECTORS: &str = ".error, .alert-danger, [class*='login-error']";

/// Build a lookup list from a selector priority list. Only the first
/// (most specific) entry counts as an exact match.
pub fn field_lookups(selectors: &[&str]) -> Vec<Lookup> {
    selectors
        .iter()
        .enumerate()
        .map(|(i, selector)| {
            let confidence = if i == 0 { Confidence::Exact } else { Confidence::Heuristic };
            Lookup::css(*selector, confidence)
        })
        .collect()
}

/// An authenticated (or anonymous, for customer/verifier roles) page
/// bound to one role.
pub struct Session {
    role: Role,
    browser: BrowserSession,
}

impl Session {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn page(&self) -> &PageHandle {
        self.browser.page()
    }
}

/// Opens and closes role sessions.
pub struct SessionManager {
    config: HarnessConfig,
}

enum LoginOutcome {
    Dashboard,
    ErrorSurface,
    StillOnLogin,
}

impl SessionManager {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Launch an isolated context and, for staff roles, perform the role
    /// login. On any failure the context is released before the error
    /// surfaces.
    pub async fn open_session(&self, role: Role) -> HarnessResult<Session> {
        let viewport = if role.is_staff() {
            self.config.browser.desktop_viewport
        } else {
            self.config.browser.mobile_viewport
        };
        let browser =
            BrowserSession::launch(&self.config.browser, viewport, self.config.timeouts).await?;

        let prepared = if role.is_staff() {
            self.login(browser.page(), role).await
        } else {
            browser.page().goto(&self.config.client_url).await
        };
        if let Err(e) = prepared {
            let _ = browser.close().await;
            return Err(e);
        }

        info!(%role, "session ready");
        Ok(Session { role, browser })
    }

    pub async fn close_session(&self, session: Session) -> HarnessResult<()> {
        debug!(role = %session.role, "closing session");
        session.browser.close().await
    }

    fn credentials_for(&self, role: Role) -> Option<&Credentials> {
        match role {
            Role::Waiter => Some(&self.config.credentials.waiter),
            Role::Chef => Some(&self.config.credentials.chef),
            Role::Cashier => Some(&self.config.credentials.cashier),
            _ => None,
        }
    }

    async fn login(&self, page: &PageHandle, role: Role) -> HarnessResult<()> {
        let (Some(login_path), Some(dashboard_path), Some(credentials)) =
            (role.login_path(), role.dashboard_path(), self.credentials_for(role))
        else {
            return Ok(());
        };

        page.goto(&format!("{}{}", self.config.staff_url, login_path)).await?;

        let element_wait = self.config.timeouts.element();
        let email_field =
            page.wait_for(&field_lookups(&EMAIL_FIELD_SELECTORS), element_wait).await?;
        let password_field =
            page.wait_for(&field_lookups(&PASSWORD_FIELD_SELECTORS), element_wait).await?;
        let (Some((email_field, _)), Some((password_field, _))) = (email_field, password_field)
        else {
            return Err(HarnessError::Authentication {
                role,
                url: page.current_url().await.unwrap_or_default(),
            });
        };

        page.fill(&email_field, &credentials.email).await?;
        page.fill(&password_field, &credentials.password).await?;

        let Some((submit, _)) = page.find_first(&field_lookups(&SUBMIT_SELECTORS)).await? else {
            return Err(HarnessError::Authentication {
                role,
                url: page.current_url().await.unwrap_or_default(),
            });
        };
        page.click(&submit).await?;

        match self.wait_login_outcome(page, dashboard_path).await? {
            LoginOutcome::Dashboard => Ok(()),
            LoginOutcome::ErrorSurface => Err(HarnessError::Authentication {
                role,
                url: page.current_url().await?,
            }),
            LoginOutcome::StillOnLogin => {
                // soft failure, retryable once: go straight to the
                // dashboard path before giving up
                warn!(%role, "login did not redirect, retrying via direct dashboard navigation");
                page.goto(&format!("{}{}", self.config.staff_url, dashboard_path)).await?;
                sleep(self.config.timeouts.poll_interval()).await;
                let url = page.current_url().await?;
                if url.contains(dashboard_path) && !url.contains("login") {
                    Ok(())
                } else {
                    Err(HarnessError::Authentication { role, url })
                }
            }
        }
    }

    /// Poll until the dashboard URL is reached, an error surface shows,
    /// or the login timeout elapses.
    async fn wait_login_outcome(
        &self,
        page: &PageHandle,
        dashboard_path: &str,
    ) -> HarnessResult<LoginOutcome> {
        let error_lookup = [Lookup::css(LOGIN_ERROR_SELECTORS, Confidence::Heuristic)];
        let start = Instant::now();
        while start.elapsed() < self.config.timeouts.login() {
            let url = page.current_url().await?;
            if url.contains(dashboard_path) {
                return Ok(LoginOutcome::Dashboard);
            }
            if page.find_first(&error_lookup).await?.is_some() {
                return Ok(LoginOutcome::ErrorSurface);
            }
            sleep(self.config.timeouts.poll_interval()).await;
        }
        Ok(LoginOutcome::StillOnLogin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::Strategy;

    #[test]
    fn credential_selectors_prioritize_type_then_name_then_id() {
        assert!(EMAIL_FIELD_SELECTORS[0].starts_with("input[type="));
        assert!(EMAIL_FIELD_SELECTORS[1].starts_with("input[name"));
        assert!(EMAIL_FIELD_SELECTORS[2].starts_with('#'));
        assert!(PASSWORD_FIELD_SELECTORS[0].starts_with("input[type="));
        assert!(PASSWORD_FIELD_SELECTORS[2].starts_with('#'));
    }

    #[test]
    fn only_the_first_field_lookup_is_exact() {
        let lookups = field_lookups(&EMAIL_FIELD_SELECTORS);
        assert_eq!(lookups.len(), 3);
        assert_eq!(lookups[0].confidence, Confidence::Exact);
        assert_eq!(lookups[1].confidence, Confidence::Heuristic);
        assert_eq!(lookups[2].confidence, Confidence::Heuristic);
        assert!(
            matches!(lookups[0].strategy, Strategy::Css(ref s) if s == "input[type='email']")
        );
    }
}
