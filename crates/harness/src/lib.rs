//! PRONTO QA harness
//!
//! Drives a full order lifecycle through the PRONTO cafeteria apps with
//! real browser sessions, one isolated Chromium profile per actor, and
//! reports every deviation as a severity-ranked finding instead of
//! aborting on first failure.
//!
//! ```text
//!             +-------------+
//!             | coordinator |
//!             +------+------+
//!                    |
//!     +---------+----+----+----------+
//!     |         |         |          |
//! +---+----+ +--+---+ +---+----+ +---+----+
//! | session| |locator| | driver | |creation|
//! +---+----+ +--+---+ +---+----+ +---+----+
//!     |         |         |          |
//!     +---------+----+----+----------+
//!                    |
//!               +----+----+
//!               | browser |
//!               +---------+
//! ```
//!
//! The order advances new -> accepted -> kitchen_in_progress ->
//! ready_for_delivery -> delivered -> paid, with waiter, chef, and
//! cashier sessions each driving their stage and a final anonymous pass
//! confirming the customer-facing terminal state.

pub mod browser;
pub mod config;
pub mod coordinator;
pub mod creation;
pub mod driver;
pub mod error;
pub mod findings;
pub mod locator;
pub mod report;
pub mod session;
pub mod state;

pub use browser::Confidence;
pub use config::{CreationMode, HarnessConfig};
pub use coordinator::WorkflowCoordinator;
pub use error::{HarnessError, HarnessResult};
pub use findings::{Finding, FindingsCollector, Severity};
pub use report::RunReport;
pub use state::{Role, Transition, WorkflowState};
