//! Error types for the PRONTO QA harness

use thiserror::Error;

use crate::browser::Confidence;
use crate::state::{Role, WorkflowState};

pub type HarnessResult<T> = Result<T, HarnessError>;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("authentication failed for role {role}: still at {url}")]
    Authentication { role: Role, url: String },

    #[error("order could not be resolved by any strategy (customer hint: {hint})")]
    OrderNotResolved { hint: String },

    #[error("no control found for transition {transition}")]
    TransitionNotAvailable {
        transition: String,
        /// Confidence of the row lookup that preceded the control search.
        /// Exact means the row was found and the control is genuinely
        /// missing; heuristic means the search had already degraded.
        confidence: Confidence,
    },

    #[error(
        "transition {transition} not confirmed: expected {expected}, observed {observed} after {waited_ms} ms"
    )]
    TransitionNotConfirmed {
        transition: String,
        expected: WorkflowState,
        observed: String,
        waited_ms: u64,
    },

    #[error("order creation failed: {0}")]
    OrderCreation(String),

    #[error("run exceeded the whole-run timeout of {seconds}s")]
    RunTimeout { seconds: u64 },

    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("browser error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
