//! Harness configuration
//!
//! Everything the source scripts hard-coded and disagreed on (timeouts,
//! slow-mo speed, selector verbosity, creation mode) lives here instead
//! of in separate code paths.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::HarnessResult;

/// Top-level configuration for one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Customer-facing app (menu, cart, checkout).
    pub client_url: String,

    /// Employee-facing app (waiter/chef/cashier dashboards).
    pub staff_url: String,

    /// Backend API base, used for the read-endpoint resolution strategy
    /// and for API-mode order creation.
    pub api_url: String,

    /// How the shared order is created.
    pub creation: CreationMode,

    /// Identity the order is created under; also the heuristic
    /// re-resolution hint.
    pub customer: CustomerProfile,

    /// Staff credentials per role.
    pub credentials: RoleCredentials,

    pub browser: BrowserOptions,

    pub timeouts: Timeouts,

    /// Directory the run report is written to.
    pub output_dir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            client_url: "http://localhost:6080".to_string(),
            staff_url: "http://localhost:6081".to_string(),
            api_url: "http://localhost:6082".to_string(),
            creation: CreationMode::Ui,
            customer: CustomerProfile::default(),
            credentials: RoleCredentials::default(),
            browser: BrowserOptions::default(),
            timeouts: Timeouts::default(),
            output_dir: PathBuf::from("test-results"),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a YAML file; missing keys fall back to
    /// defaults.
    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

/// How the order-creation step produces the creation signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CreationMode {
    /// Drive the client menu and checkout through the browser. Yields no
    /// acknowledgment payload, so order resolution starts at the read
    /// endpoint.
    #[default]
    Ui,
    /// POST the order to the API and capture the acknowledgment payload.
    Api,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerProfile {
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl Default for CustomerProfile {
    fn default() -> Self {
        Self {
            name: "QA Tester 1234".to_string(),
            email: "luartx@gmail.com".to_string(),
            phone: "5551234567".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleCredentials {
    pub waiter: Credentials,
    pub chef: Credentials,
    pub cashier: Credentials,
}

impl Default for RoleCredentials {
    fn default() -> Self {
        Self {
            waiter: Credentials {
                email: "waiter@pronto.test".to_string(),
                password: "waiter123".to_string(),
            },
            chef: Credentials {
                email: "chef@pronto.test".to_string(),
                password: "chef123".to_string(),
            },
            cashier: Credentials {
                email: "cashier@pronto.test".to_string(),
                password: "cashier123".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserOptions {
    pub headless: bool,

    /// Pause inserted after each interaction, mirroring the source
    /// scripts' slowMo. Zero disables it.
    pub slow_mo_ms: u64,

    /// Customer and verifier sessions use a mobile viewport.
    pub mobile_viewport: Viewport,

    /// Staff sessions use a desktop viewport.
    pub desktop_viewport: Viewport,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            slow_mo_ms: 0,
            mobile_viewport: Viewport { width: 375, height: 812 },
            desktop_viewport: Viewport { width: 1366, height: 768 },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Bounded waits. The source scripts scattered 1500/3000/5000 ms sleeps;
/// every wait here is a condition poll with one of these upper bounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub poll_interval_ms: u64,
    pub element_ms: u64,
    pub login_ms: u64,
    pub transition_ms: u64,
    pub modal_ms: u64,
    /// Whole-run upper bound; takes priority over any per-step wait.
    pub run_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
            element_ms: 5_000,
            login_ms: 10_000,
            transition_ms: 10_000,
            modal_ms: 5_000,
            run_secs: 180,
        }
    }
}

impl Timeouts {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn element(&self) -> Duration {
        Duration::from_millis(self.element_ms)
    }

    pub fn login(&self) -> Duration {
        Duration::from_millis(self.login_ms)
    }

    pub fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    pub fn modal(&self) -> Duration {
        Duration::from_millis(self.modal_ms)
    }

    pub fn run(&self) -> Duration {
        Duration::from_secs(self.run_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_thresholds() {
        let config = HarnessConfig::default();
        assert_eq!(config.timeouts.poll_interval_ms, 250);
        assert_eq!(config.timeouts.transition_ms, 10_000);
        assert_eq!(config.timeouts.run_secs, 180);
        assert_eq!(config.creation, CreationMode::Ui);
        assert_eq!(config.customer.name, "QA Tester 1234");
        assert!(config.browser.headless);
    }

    #[test]
    fn partial_yaml_overrides_keep_defaults_elsewhere() {
        let yaml = r#"
client_url: http://10.0.0.5:6080
creation: api
timeouts:
  transition_ms: 4000
"#;
        let config: HarnessConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.client_url, "http://10.0.0.5:6080");
        assert_eq!(config.creation, CreationMode::Api);
        assert_eq!(config.timeouts.transition_ms, 4_000);
        // untouched keys fall back
        assert_eq!(config.staff_url, "http://localhost:6081");
        assert_eq!(config.timeouts.poll_interval_ms, 250);
        assert_eq!(config.credentials.chef.email, "chef@pronto.test");
    }
}
