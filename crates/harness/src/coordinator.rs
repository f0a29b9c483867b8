//! Workflow coordinator
//!
//! Runs the whole order lifecycle end to end: creation, resolution,
//! the five actor transitions in causal order, and the final customer
//! verification pass. A step failure degrades the run into findings
//! instead of aborting it; only the whole-run timeout hard-stops.

use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Instant;

use regex::Regex;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::browser::{Confidence, Lookup};
use crate::config::HarnessConfig;
use crate::creation::OrderCreator;
use crate::driver::TransitionDriver;
use crate::error::{HarnessError, HarnessResult};
use crate::findings::{Finding, FindingsCollector, Severity};
use crate::locator::{OrderLocator, OrderReference};
use crate::report::RunReport;
use crate::session::SessionManager;
use crate::state::{Role, Transition, WorkflowState};

fn paid_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)pagad[ao]|paid|completad[ao]").expect("hard-coded pattern"))
}

pub struct WorkflowCoordinator {
    config: HarnessConfig,
    sessions: SessionManager,
    locator: OrderLocator,
    driver: TransitionDriver,
    creator: OrderCreator,
}

impl WorkflowCoordinator {
    pub fn new(config: HarnessConfig) -> HarnessResult<Self> {
        let locator = OrderLocator::new(&config.api_url)?;
        let driver = TransitionDriver::new(config.timeouts);
        let creator = OrderCreator::new(config.clone())?;
        let sessions = SessionManager::new(config.clone());
        Ok(Self { config, sessions, locator, driver, creator })
    }

    /// Execute the full cycle under the whole-run timeout and produce
    /// the report. The report is also written to the configured output
    /// directory.
    pub async fn run_full_cycle(&self) -> HarnessResult<RunReport> {
        let started = Instant::now();
        let mut findings = FindingsCollector::new();

        info!(
            client = %self.config.client_url,
            staff = %self.config.staff_url,
            "starting full order lifecycle run"
        );

        match timeout(self.config.timeouts.run(), self.run_steps(&mut findings)).await {
            Ok(()) => {}
            Err(_) => {
                warn!(seconds = self.config.timeouts.run_secs, "whole-run timeout exceeded");
                findings.record(Finding::new(
                    Severity::Critical,
                    format!(
                        "run exceeded the {}s budget; in-flight sessions were dropped",
                        self.config.timeouts.run_secs
                    ),
                    "run",
                    "the workflow never reached a terminal state within the time budget",
                    "investigate the slowest step in the log and raise its timeout if legitimate",
                ));
            }
        }

        let report = RunReport::new(findings.into_sorted(), started.elapsed());
        report.write_json(&self.config.output_dir)?;
        Ok(report)
    }

    /// The step sequence. Every step error is converted to a finding
    /// here; nothing propagates, so the report is always produced.
    async fn run_steps(&self, findings: &mut FindingsCollector) {
        let signal = match self.creator.create_order(&self.sessions, findings).await {
            Ok(signal) => signal,
            Err(e) => {
                findings.record(Finding::new(
                    Severity::Critical,
                    format!("order creation failed: {e}"),
                    "order creation",
                    "no order exists, nothing downstream can run",
                    "fix the client checkout or the backend create endpoint",
                ));
                return;
            }
        };

        let mut order: Option<OrderReference> = None;
        let mut last_confirmed = WorkflowState::New;
        let mut failed_roles: HashSet<Role> = HashSet::new();
        let mut resolution_failed = false;

        for transition in Transition::full_cycle() {
            let role = transition.actor();
            match Self::plan_step(transition, &failed_roles, resolution_failed) {
                StepPlan::Abort => break,
                StepPlan::SkipFailedRole => {
                    info!(%transition, %role, "skipping, role session previously failed");
                    continue;
                }
                StepPlan::Run => {}
            }

            let session = match self.sessions.open_session(role).await {
                Ok(session) => session,
                Err(e @ HarnessError::Authentication { .. }) => {
                    findings.record(Finding::new(
                        Severity::Critical,
                        format!("{e}"),
                        format!("{role} login"),
                        format!("every {role} step is skipped for the rest of the run"),
                        "verify the staff credentials and the login form",
                    ));
                    failed_roles.insert(role);
                    continue;
                }
                Err(e) => {
                    findings.record(Finding::new(
                        Severity::High,
                        format!("session for {role} could not be opened: {e}"),
                        format!("{role} session"),
                        format!("the {transition} step did not run"),
                        "check browser launch and app availability",
                    ));
                    continue;
                }
            };

            let step = self
                .run_transition(
                    session.page(),
                    transition,
                    &signal,
                    &mut order,
                    &mut last_confirmed,
                    findings,
                )
                .await;
            if let Err(e) = self.sessions.close_session(session).await {
                warn!(%role, error = %e, "session did not close cleanly");
            }

            match step {
                Ok(()) => {}
                Err(HarnessError::OrderNotResolved { hint }) => {
                    findings.record(Finding::new(
                        Severity::Critical,
                        format!("order could not be resolved by any strategy (hint: {hint})"),
                        "order resolution",
                        "no later step can target the order; the run cannot continue",
                        "expose the order id in the creation acknowledgment or on dashboard rows",
                    ));
                    resolution_failed = true;
                }
                Err(e) => Self::record_step_error(transition, e, findings),
            }
        }

        if let Some(order) = &order {
            self.verify_paid(order, findings).await;
        }
    }

    /// Whether a step runs. A failed order resolution ends the run; a
    /// failed role login skips only that role's steps, other roles still
    /// attempt theirs.
    fn plan_step(
        transition: Transition,
        failed_roles: &HashSet<Role>,
        resolution_failed: bool,
    ) -> StepPlan {
        if resolution_failed {
            return StepPlan::Abort;
        }
        if failed_roles.contains(&transition.actor()) {
            return StepPlan::SkipFailedRole;
        }
        StepPlan::Run
    }

    async fn run_transition(
        &self,
        page: &crate::browser::PageHandle,
        transition: Transition,
        signal: &crate::locator::CreationSignal,
        order: &mut Option<OrderReference>,
        last_confirmed: &mut WorkflowState,
        findings: &mut FindingsCollector,
    ) -> HarnessResult<()> {
        // resolution is lazy: the first order-dependent step runs it
        // against its own dashboard
        if order.is_none() {
            *order = Some(self.locator.resolve_order(signal, Some(page)).await?);
        }
        let current = order.as_ref().map(|o| o.id.clone()).unwrap_or_default();

        // the resolved order must be visible in this actor's view;
        // otherwise re-resolve by the checkout customer name
        let row_present =
            page.wait_for(&TransitionDriver::row_lookups(&current), self.config.timeouts.element())
                .await?
                .is_some();
        let order_id = if row_present {
            current
        } else {
            match self.locator.re_resolve(page, &signal.customer_name).await {
                Ok(replacement) => {
                    if replacement.id != current {
                        warn!(
                            old = %current,
                            new = %replacement.id,
                            %transition,
                            "switching to a re-resolved order identifier"
                        );
                    }
                    let id = replacement.id.clone();
                    *order = Some(replacement);
                    id
                }
                Err(_) => {
                    findings.record(Finding::new(
                        Severity::High,
                        format!(
                            "order {current} not visible on the {} dashboard",
                            transition.actor()
                        ),
                        format!("{} dashboard", transition.actor()),
                        format!("the {transition} step cannot be attempted"),
                        "check dashboard filtering for the order's current state",
                    ));
                    return Ok(());
                }
            }
        };

        // any pre-state other than the expected one is a desync between
        // actors and is recorded, ahead or behind
        if let Some(observed) = self.driver.observe_state(page, &order_id).await? {
            if observed != transition.from_state() {
                findings.record(Finding::new(
                    Severity::Medium,
                    format!(
                        "order {order_id} shows {observed} where {} was expected before {transition}",
                        transition.from_state()
                    ),
                    format!("{} dashboard", transition.actor()),
                    "actors disagree about the order's current stage",
                    "check state propagation between backend and dashboards",
                ));
            }
        }

        self.driver.apply_transition(page, &order_id, transition, findings).await?;

        // causal monotonicity check against what was confirmed before
        let reached = transition.to_state();
        if reached < *last_confirmed {
            findings.record(Finding::new(
                Severity::High,
                format!(
                    "order {order_id} regressed from {last_confirmed} to {reached} after {transition}"
                ),
                "workflow",
                "the lifecycle moved backwards, earlier confirmations are suspect",
                "audit the backend transition guards",
            ));
        } else {
            *last_confirmed = reached;
        }
        Ok(())
    }

    fn record_step_error(
        transition: Transition,
        error: HarnessError,
        findings: &mut FindingsCollector,
    ) {
        match error {
            HarnessError::TransitionNotAvailable { transition: name, confidence } => {
                let severity = match confidence {
                    Confidence::Exact => Severity::High,
                    Confidence::Heuristic => Severity::Medium,
                };
                findings.record(Finding::new(
                    severity,
                    format!("no control found for {name}"),
                    format!("{} dashboard", transition.actor()),
                    "the order cannot be advanced past this stage by its actor",
                    "restore the action control or its identifying attributes",
                ));
            }
            HarnessError::TransitionNotConfirmed { transition: name, expected, observed, waited_ms } => {
                findings.record(Finding::new(
                    Severity::High,
                    format!(
                        "{name} clicked but not confirmed: expected {expected}, observed {observed} after {waited_ms} ms"
                    ),
                    format!("{} dashboard", transition.actor()),
                    "the backend state and the attempted action disagree",
                    "check the transition endpoint and dashboard refresh",
                ));
            }
            other => {
                findings.record(Finding::new(
                    Severity::High,
                    format!("{transition} failed: {other}"),
                    format!("{} dashboard", transition.actor()),
                    "the step did not complete",
                    "see the run log for the underlying error",
                ));
            }
        }
    }

    /// Final customer-side pass: the order history must show the order
    /// as paid. Never propagates; whatever goes wrong here becomes a
    /// finding so the report is still produced.
    async fn verify_paid(&self, order: &OrderReference, findings: &mut FindingsCollector) {
        let session = match self.sessions.open_session(Role::Verifier).await {
            Ok(session) => session,
            Err(e) => {
                findings.record(Finding::new(
                    Severity::High,
                    format!("verification session could not be opened: {e}"),
                    "customer verification",
                    "the customer-facing terminal state was not checked",
                    "check browser launch and client app availability",
                ));
                return;
            }
        };

        let result = self.check_paid_status(session.page(), order, findings).await;
        if let Err(e) = self.sessions.close_session(session).await {
            warn!(error = %e, "verification session did not close cleanly");
        }

        match result {
            Ok(PaidCheck::Paid) => {
                info!(id = %order.id, "customer view confirms the order as paid")
            }
            Ok(PaidCheck::WrongStatus(text)) => findings.record(Finding::new(
                Severity::High,
                format!("customer view shows order {} as '{}', not paid", order.id, text.trim()),
                "customer order history",
                "the customer never sees the lifecycle complete",
                "check status propagation to the client app",
            )),
            Ok(PaidCheck::NotVisible) => findings.record(Finding::new(
                Severity::High,
                format!("order {} does not appear in the customer order history", order.id),
                "customer order history",
                "the customer cannot confirm their order at all",
                "check the client app's order listing",
            )),
            Err(e) => findings.record(Self::verification_failure_finding(&e)),
        }
    }

    fn verification_failure_finding(error: &HarnessError) -> Finding {
        Finding::new(
            Severity::High,
            format!("customer verification did not complete: {error}"),
            "customer order history",
            "the customer-facing terminal state was not checked",
            "see the run log for the underlying error",
        )
    }

    async fn check_paid_status(
        &self,
        page: &crate::browser::PageHandle,
        order: &OrderReference,
        findings: &mut FindingsCollector,
    ) -> HarnessResult<PaidCheck> {
        let url = format!("{}/orders", self.config.client_url.trim_end_matches('/'));
        page.goto(&url).await?;

        let row = page
            .wait_for(&TransitionDriver::row_lookups(&order.id), self.config.timeouts.element())
            .await?;
        let Some((row, _)) = row else {
            return Ok(PaidCheck::NotVisible);
        };

        let text = page.inner_text(&row).await?.unwrap_or_default();
        if paid_pattern().is_match(&text) {
            // follow-on conveniences on the paid order, absence is LOW
            if page.find_first(&Self::receipt_lookups()).await?.is_none() {
                findings.record(Self::missing_indicator_finding("receipt or ticket control"));
            }
            if page.find_first(&Self::email_confirmation_lookups()).await?.is_none() {
                findings.record(Self::missing_indicator_finding("email confirmation indicator"));
            }
            return Ok(PaidCheck::Paid);
        }
        Ok(PaidCheck::WrongStatus(text))
    }

    fn receipt_lookups() -> Vec<Lookup> {
        vec![
            Lookup::css("[class*='receipt'], [class*='ticket']", Confidence::Heuristic),
            Lookup::text("a, button", "recibo", Confidence::Heuristic),
        ]
    }

    fn email_confirmation_lookups() -> Vec<Lookup> {
        vec![
            Lookup::css("[class*='email-confirm'], [class*='confirmation']", Confidence::Heuristic),
            Lookup::text("p, span, .notice", "correo", Confidence::Heuristic),
        ]
    }

    fn missing_indicator_finding(what: &str) -> Finding {
        Finding::new(
            Severity::Low,
            format!("paid order shows no {what}"),
            "customer order history",
            "follow-up conveniences are unavailable after payment",
            "expose the control on the paid order view",
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepPlan {
    Run,
    SkipFailedRole,
    Abort,
}

enum PaidCheck {
    Paid,
    WrongStatus(String),
    NotVisible,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paid_pattern_covers_both_languages() {
        for text in ["Pagada", "PAID", "pagado", "Completado", "Orden #3 - pagada"] {
            assert!(paid_pattern().is_match(text), "{text} should read as paid");
        }
        for text in ["Entregado", "pending", "En cocina"] {
            assert!(!paid_pattern().is_match(text), "{text} should not read as paid");
        }
    }

    #[test]
    fn missing_control_severity_follows_lookup_confidence() {
        let mut findings = FindingsCollector::new();
        WorkflowCoordinator::record_step_error(
            Transition::Accept,
            HarnessError::TransitionNotAvailable {
                transition: "accept".into(),
                confidence: Confidence::Exact,
            },
            &mut findings,
        );
        WorkflowCoordinator::record_step_error(
            Transition::StartKitchen,
            HarnessError::TransitionNotAvailable {
                transition: "start_kitchen".into(),
                confidence: Confidence::Heuristic,
            },
            &mut findings,
        );
        assert_eq!(findings.count(Severity::High), 1);
        assert_eq!(findings.count(Severity::Medium), 1);
    }

    #[test]
    fn unconfirmed_transition_is_a_high_finding() {
        let mut findings = FindingsCollector::new();
        WorkflowCoordinator::record_step_error(
            Transition::Deliver,
            HarnessError::TransitionNotConfirmed {
                transition: "deliver".into(),
                expected: WorkflowState::Delivered,
                observed: "ready_for_delivery".into(),
                waited_ms: 10_000,
            },
            &mut findings,
        );
        assert_eq!(findings.count(Severity::High), 1);
        let finding = &findings.findings()[0];
        assert!(finding.description().contains("expected delivered"));
    }

    #[test]
    fn waiter_auth_failure_skips_only_waiter_steps() {
        let mut failed_roles = HashSet::new();
        failed_roles.insert(Role::Waiter);

        let plans: Vec<StepPlan> = Transition::full_cycle()
            .into_iter()
            .map(|t| WorkflowCoordinator::plan_step(t, &failed_roles, false))
            .collect();
        assert_eq!(
            plans,
            vec![
                StepPlan::SkipFailedRole, // accept
                StepPlan::Run,            // start_kitchen
                StepPlan::Run,            // mark_ready
                StepPlan::SkipFailedRole, // deliver
                StepPlan::Run,            // collect_payment
            ]
        );
    }

    #[test]
    fn failed_resolution_aborts_every_remaining_step() {
        let failed_roles = HashSet::new();
        for transition in Transition::full_cycle() {
            assert_eq!(
                WorkflowCoordinator::plan_step(transition, &failed_roles, true),
                StepPlan::Abort
            );
        }
    }

    #[test]
    fn clean_slate_runs_every_step() {
        let failed_roles = HashSet::new();
        for transition in Transition::full_cycle() {
            assert_eq!(
                WorkflowCoordinator::plan_step(transition, &failed_roles, false),
                StepPlan::Run
            );
        }
    }

    #[test]
    fn verification_errors_become_high_findings() {
        let finding = WorkflowCoordinator::verification_failure_finding(
            &HarnessError::OrderCreation("connection reset".into()),
        );
        assert_eq!(finding.severity(), Severity::High);
        assert_eq!(finding.location(), "customer order history");
        assert!(finding.description().contains("did not complete"));
    }

    #[test]
    fn missing_followup_indicators_are_low_findings() {
        let finding = WorkflowCoordinator::missing_indicator_finding("receipt or ticket control");
        assert_eq!(finding.severity(), Severity::Low);
        assert!(finding.description().contains("receipt"));

        // discovery of follow-on conveniences is heuristic by nature
        for lookup in WorkflowCoordinator::receipt_lookups()
            .iter()
            .chain(WorkflowCoordinator::email_confirmation_lookups().iter())
        {
            assert_eq!(lookup.confidence, Confidence::Heuristic);
        }
    }
}
