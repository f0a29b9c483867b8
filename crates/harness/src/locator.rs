//! Order locator
//!
//! Resolves the shared order's identifier through layered fallback
//! strategies and keeps later actors on the same order. Once resolved,
//! the identifier is authoritative; a heuristic re-resolution replaces
//! it only with an announced switch (the coordinator logs it).

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::browser::{Confidence, Lookup, PageHandle};
use crate::driver::ROW_SELECTORS;
use crate::error::{HarnessError, HarnessResult};

/// Which strategy produced the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    /// Parsed from the order-creation acknowledgment payload.
    AckPayload,
    /// Most recent entry of the recent/active orders read endpoint.
    ApiPoll,
    /// `data-order-id` attribute on a row/card element.
    DomAttribute,
    /// Numeric-after-hash order-number text, or a customer-name match.
    TextMatch,
}

/// The shared unit of coordination across actors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReference {
    pub id: String,
    pub method: ResolutionMethod,
    pub confidence: Confidence,
}

/// What the creation step hands to the locator.
#[derive(Debug, Clone)]
pub struct CreationSignal {
    /// Acknowledgment payload captured during API-mode creation; UI-mode
    /// creation yields none.
    pub ack_payload: Option<Value>,
    /// Customer name used at checkout; the heuristic fallback hint.
    pub customer_name: String,
}

fn order_number_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#\s*(\d+)").expect("hard-coded pattern"))
}

pub struct OrderLocator {
    http: reqwest::Client,
    orders_endpoint: String,
}

impl OrderLocator {
    pub fn new(api_url: &str) -> HarnessResult<Self> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(5)).build()?;
        Ok(Self {
            http,
            orders_endpoint: format!("{}/orders/active", api_url.trim_end_matches('/')),
        })
    }

    /// Extract an identifier from the creation acknowledgment. The API
    /// answers with the id under `order_id` or `id`, sometimes nested in
    /// a `data` wrapper.
    pub fn id_from_ack(payload: &Value) -> Option<String> {
        let body = payload.get("data").unwrap_or(payload);
        for key in ["order_id", "id"] {
            match body.get(key) {
                Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
                Some(Value::Number(n)) => return Some(n.to_string()),
                _ => {}
            }
        }
        None
    }

    /// Extract an identifier from visible order-number text ("Orden #42").
    pub fn id_from_text(text: &str) -> Option<String> {
        order_number_pattern().captures(text).map(|c| c[1].to_string())
    }

    /// Resolution priority, first success wins: (a) acknowledgment
    /// payload, (b) recent-orders read endpoint, (c) DOM data attribute,
    /// (d) visible order-number text. DOM strategies need a page handle;
    /// without one only (a) and (b) run.
    pub async fn resolve_order(
        &self,
        signal: &CreationSignal,
        page: Option<&PageHandle>,
    ) -> HarnessResult<OrderReference> {
        if let Some(payload) = &signal.ack_payload {
            if let Some(id) = Self::id_from_ack(payload) {
                info!(id, "order resolved from creation acknowledgment");
                return Ok(OrderReference {
                    id,
                    method: ResolutionMethod::AckPayload,
                    confidence: Confidence::Exact,
                });
            }
            debug!("acknowledgment payload carried no recognizable identifier");
        }

        match self.latest_order_from_api().await {
            Ok(Some(id)) => {
                info!(id, "order resolved from recent-orders endpoint");
                return Ok(OrderReference {
                    id,
                    method: ResolutionMethod::ApiPoll,
                    confidence: Confidence::Exact,
                });
            }
            Ok(None) => debug!("recent-orders endpoint returned no usable entries"),
            Err(e) => debug!(error = %e, "recent-orders endpoint unavailable"),
        }

        if let Some(page) = page {
            if let Some(id) = Self::id_from_dom_attribute(page).await? {
                info!(id, "order resolved from DOM data attribute");
                return Ok(OrderReference {
                    id,
                    method: ResolutionMethod::DomAttribute,
                    confidence: Confidence::Exact,
                });
            }
            if let Some(id) = Self::id_from_visible_text(page).await? {
                info!(id, "order resolved from visible order-number text");
                return Ok(OrderReference {
                    id,
                    method: ResolutionMethod::TextMatch,
                    confidence: Confidence::Exact,
                });
            }
        }

        Err(HarnessError::OrderNotResolved { hint: signal.customer_name.clone() })
    }

    /// Locate the order in the current actor's view by the creation-time
    /// customer name. Heuristic by definition.
    pub async fn re_resolve(&self, page: &PageHandle, hint: &str) -> HarnessResult<OrderReference> {
        let needle = hint.to_lowercase();
        for row in page.find_all(ROW_SELECTORS).await? {
            let text = page.inner_text(&row).await?.unwrap_or_default();
            if !text.to_lowercase().contains(&needle) {
                continue;
            }
            let id = match page.attribute(&row, "data-order-id").await? {
                Some(id) => id,
                None => match Self::id_from_text(&text) {
                    Some(id) => id,
                    None => continue,
                },
            };
            info!(id, hint, "order re-resolved by customer-name match");
            return Ok(OrderReference {
                id,
                method: ResolutionMethod::TextMatch,
                confidence: Confidence::Heuristic,
            });
        }
        Err(HarnessError::OrderNotResolved { hint: hint.to_string() })
    }

    async fn latest_order_from_api(&self) -> HarnessResult<Option<String>> {
        let response = self.http.get(&self.orders_endpoint).send().await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let body: Value = response.json().await?;
        let list = body.get("data").and_then(Value::as_array).or_else(|| body.as_array());
        let Some(list) = list else {
            return Ok(None);
        };

        // most recent entry wins; numeric ids are compared, anything
        // else falls back to last-listed
        let mut best: Option<String> = None;
        let mut best_num: Option<i64> = None;
        for entry in list {
            let Some(id) = Self::id_from_ack(entry) else { continue };
            match id.parse::<i64>() {
                Ok(n) if best_num.map_or(true, |b| n > b) => {
                    best_num = Some(n);
                    best = Some(id);
                }
                Ok(_) => {}
                Err(_) => {
                    if best_num.is_none() {
                        best = Some(id);
                    }
                }
            }
        }
        Ok(best)
    }

    async fn id_from_dom_attribute(page: &PageHandle) -> HarnessResult<Option<String>> {
        let lookups = [Lookup::css("[data-order-id]", Confidence::Exact)];
        if let Some((element, _)) = page.find_first(&lookups).await? {
            return page.attribute(&element, "data-order-id").await;
        }
        Ok(None)
    }

    async fn id_from_visible_text(page: &PageHandle) -> HarnessResult<Option<String>> {
        for element in page.find_all(&format!(".order-number, {ROW_SELECTORS}")).await? {
            if let Some(text) = page.inner_text(&element).await? {
                if let Some(id) = Self::id_from_text(&text) {
                    return Ok(Some(id));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ack_identifier_under_both_key_names() {
        assert_eq!(OrderLocator::id_from_ack(&json!({"order_id": 42})), Some("42".to_string()));
        assert_eq!(OrderLocator::id_from_ack(&json!({"id": "abc-7"})), Some("abc-7".to_string()));
        // order_id beats id when both are present
        assert_eq!(
            OrderLocator::id_from_ack(&json!({"order_id": 9, "id": 1})),
            Some("9".to_string())
        );
    }

    #[test]
    fn ack_identifier_inside_data_wrapper() {
        let payload = json!({"data": {"order_id": 17, "session_id": 3}});
        assert_eq!(OrderLocator::id_from_ack(&payload), Some("17".to_string()));
    }

    #[test]
    fn ack_without_identifier_yields_none() {
        assert_eq!(OrderLocator::id_from_ack(&json!({"status": "ok"})), None);
        assert_eq!(OrderLocator::id_from_ack(&json!({"id": ""})), None);
    }

    #[test]
    fn ack_resolution_is_idempotent() {
        let payload = json!({"data": {"order_id": 1234}});
        let first = OrderLocator::id_from_ack(&payload);
        let second = OrderLocator::id_from_ack(&payload);
        assert_eq!(first, second);
        assert_eq!(first, Some("1234".to_string()));
    }

    #[test]
    fn order_number_text_extraction() {
        assert_eq!(OrderLocator::id_from_text("Orden #1234"), Some("1234".to_string()));
        assert_eq!(OrderLocator::id_from_text("# 56 - QA Tester"), Some("56".to_string()));
        assert_eq!(OrderLocator::id_from_text("sin numero"), None);
    }
}
