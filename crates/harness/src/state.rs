//! Order workflow states, actor roles, and the transition table

use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend-authoritative lifecycle stage of an order.
///
/// Variant order is causal order; `causal_index` drives the
/// no-regression check in the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    New,
    Accepted,
    KitchenInProgress,
    ReadyForDelivery,
    Delivered,
    Paid,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::New => "new",
            WorkflowState::Accepted => "accepted",
            WorkflowState::KitchenInProgress => "kitchen_in_progress",
            WorkflowState::ReadyForDelivery => "ready_for_delivery",
            WorkflowState::Delivered => "delivered",
            WorkflowState::Paid => "paid",
        }
    }

    /// Position in the causal chain, 0-based.
    pub fn causal_index(&self) -> usize {
        *self as usize
    }

    /// Parse a backend workflow token. Accepts both the canonical names
    /// and the legacy tokens still emitted by older PRONTO services
    /// (`queued`, `preparing`, `ready`).
    pub fn from_backend_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "new" => Some(WorkflowState::New),
            "accepted" | "queued" => Some(WorkflowState::Accepted),
            "kitchen_in_progress" | "preparing" => Some(WorkflowState::KitchenInProgress),
            "ready_for_delivery" | "ready" => Some(WorkflowState::ReadyForDelivery),
            "delivered" => Some(WorkflowState::Delivered),
            "paid" => Some(WorkflowState::Paid),
            _ => None,
        }
    }

    /// Parse the descriptive status text shown on staff dashboards.
    /// The UI went through a renaming pass, so both generations of
    /// display strings are accepted.
    pub fn from_display_text(text: &str) -> Option<Self> {
        let t = text.trim().to_lowercase();
        if t.is_empty() {
            return None;
        }
        let table: &[(&[&str], WorkflowState)] = &[
            (&["esperando mesero", "solicitada"], WorkflowState::New),
            (&["enviando a cocina", "en cola", "mesero asignado"], WorkflowState::Accepted),
            (&["en cocina", "cocinando"], WorkflowState::KitchenInProgress),
            (&["listo entrega", "listo para entregar"], WorkflowState::ReadyForDelivery),
            (&["entregado", "entregada"], WorkflowState::Delivered),
            (&["pagada", "pagado"], WorkflowState::Paid),
        ];
        for (synonyms, state) in table {
            if synonyms.iter().any(|s| t.contains(s)) {
                return Some(*state);
            }
        }
        Self::from_backend_token(&t)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role-bound automated user driving one isolated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Waiter,
    Chef,
    Cashier,
    /// Anonymous customer-side session used for the final verification pass.
    Verifier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Waiter => "waiter",
            Role::Chef => "chef",
            Role::Cashier => "cashier",
            Role::Verifier => "verifier",
        }
    }

    /// Staff roles authenticate against the employee app; customer and
    /// verifier sessions are anonymous on the client app.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Waiter | Role::Chef | Role::Cashier)
    }

    /// Login entry point path on the staff app, if this role has one.
    pub fn login_path(&self) -> Option<&'static str> {
        match self {
            Role::Waiter => Some("/waiter/login"),
            Role::Chef => Some("/chef/login"),
            Role::Cashier => Some("/cashier/login"),
            _ => None,
        }
    }

    /// Role-scoped dashboard path reached after a successful login.
    pub fn dashboard_path(&self) -> Option<&'static str> {
        match self {
            Role::Waiter => Some("/waiter/dashboard"),
            Role::Chef => Some("/chef/dashboard"),
            Role::Cashier => Some("/cashier/dashboard"),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An actor-initiated action intended to advance the order by exactly
/// one causal step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Accept,
    StartKitchen,
    MarkReady,
    Deliver,
    CollectPayment,
}

impl Transition {
    /// The full cycle in strict causal order.
    pub fn full_cycle() -> [Transition; 5] {
        [
            Transition::Accept,
            Transition::StartKitchen,
            Transition::MarkReady,
            Transition::Deliver,
            Transition::CollectPayment,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Accept => "accept",
            Transition::StartKitchen => "start_kitchen",
            Transition::MarkReady => "mark_ready",
            Transition::Deliver => "deliver",
            Transition::CollectPayment => "collect_payment",
        }
    }

    /// The role whose dashboard exposes the control for this transition.
    pub fn actor(&self) -> Role {
        match self {
            Transition::Accept | Transition::Deliver => Role::Waiter,
            Transition::StartKitchen | Transition::MarkReady => Role::Chef,
            Transition::CollectPayment => Role::Cashier,
        }
    }

    /// State the order must be in for this transition to be valid.
    pub fn from_state(&self) -> WorkflowState {
        match self {
            Transition::Accept => WorkflowState::New,
            Transition::StartKitchen => WorkflowState::Accepted,
            Transition::MarkReady => WorkflowState::KitchenInProgress,
            Transition::Deliver => WorkflowState::ReadyForDelivery,
            Transition::CollectPayment => WorkflowState::Delivered,
        }
    }

    /// State the backend must report once this transition is confirmed.
    pub fn to_state(&self) -> WorkflowState {
        match self {
            Transition::Accept => WorkflowState::Accepted,
            Transition::StartKitchen => WorkflowState::KitchenInProgress,
            Transition::MarkReady => WorkflowState::ReadyForDelivery,
            Transition::Deliver => WorkflowState::Delivered,
            Transition::CollectPayment => WorkflowState::Paid,
        }
    }

    /// Accessible-name fragments for the action control, Spanish first
    /// since the staff UI ships es-MX.
    pub fn control_labels(&self) -> &'static [&'static str] {
        match self {
            Transition::Accept => &["aceptar", "accept"],
            Transition::StartKitchen => &["iniciar", "start"],
            Transition::MarkReady => &["listo", "ready"],
            Transition::Deliver => &["entregar", "deliver"],
            Transition::CollectPayment => &["cobrar", "pay"],
        }
    }

    /// Fragment expected in the control's `data-endpoint` attribute.
    pub fn endpoint_fragment(&self) -> &'static str {
        match self {
            Transition::Accept => "accept",
            Transition::StartKitchen => "start",
            Transition::MarkReady => "ready",
            Transition::Deliver => "deliver",
            Transition::CollectPayment => "pay",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn causal_order_is_monotonic() {
        let states = [
            WorkflowState::New,
            WorkflowState::Accepted,
            WorkflowState::KitchenInProgress,
            WorkflowState::ReadyForDelivery,
            WorkflowState::Delivered,
            WorkflowState::Paid,
        ];
        for pair in states.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].causal_index() + 1, pair[1].causal_index());
        }
    }

    #[test]
    fn full_cycle_chains_new_to_paid() {
        let mut current = WorkflowState::New;
        for transition in Transition::full_cycle() {
            assert_eq!(transition.from_state(), current);
            current = transition.to_state();
        }
        assert_eq!(current, WorkflowState::Paid);
    }

    #[test]
    fn backend_tokens_parse_including_legacy_aliases() {
        assert_eq!(WorkflowState::from_backend_token("new"), Some(WorkflowState::New));
        assert_eq!(WorkflowState::from_backend_token("queued"), Some(WorkflowState::Accepted));
        assert_eq!(
            WorkflowState::from_backend_token("preparing"),
            Some(WorkflowState::KitchenInProgress)
        );
        assert_eq!(
            WorkflowState::from_backend_token("ready_for_delivery"),
            Some(WorkflowState::ReadyForDelivery)
        );
        assert_eq!(WorkflowState::from_backend_token(" PAID "), Some(WorkflowState::Paid));
        assert_eq!(WorkflowState::from_backend_token("cancelled"), None);
    }

    #[test]
    fn display_text_synonyms_cover_both_ui_generations() {
        assert_eq!(
            WorkflowState::from_display_text("Esperando mesero"),
            Some(WorkflowState::New)
        );
        assert_eq!(
            WorkflowState::from_display_text("Enviando a cocina"),
            Some(WorkflowState::Accepted)
        );
        assert_eq!(
            WorkflowState::from_display_text("En cocina"),
            Some(WorkflowState::KitchenInProgress)
        );
        assert_eq!(
            WorkflowState::from_display_text("Listo para entregar"),
            Some(WorkflowState::ReadyForDelivery)
        );
        assert_eq!(WorkflowState::from_display_text("Entregado"), Some(WorkflowState::Delivered));
        assert_eq!(WorkflowState::from_display_text("Pagada"), Some(WorkflowState::Paid));
        assert_eq!(WorkflowState::from_display_text(""), None);
    }

    #[test]
    fn transitions_map_to_expected_actors() {
        assert_eq!(Transition::Accept.actor(), Role::Waiter);
        assert_eq!(Transition::StartKitchen.actor(), Role::Chef);
        assert_eq!(Transition::MarkReady.actor(), Role::Chef);
        assert_eq!(Transition::Deliver.actor(), Role::Waiter);
        assert_eq!(Transition::CollectPayment.actor(), Role::Cashier);
    }

    #[test]
    fn serde_tokens_are_snake_case() {
        let json = serde_json::to_string(&WorkflowState::KitchenInProgress).unwrap();
        assert_eq!(json, "\"kitchen_in_progress\"");
        let back: WorkflowState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, WorkflowState::KitchenInProgress);
    }
}
