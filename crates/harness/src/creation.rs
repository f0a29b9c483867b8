//! Order creation
//!
//! Produces the shared order the workflow runs against, either by
//! driving the client app's menu and checkout or by posting directly to
//! the backend. Both paths yield a `CreationSignal` for the locator.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::browser::{Confidence, Lookup};
use crate::config::{CreationMode, HarnessConfig};
use crate::error::{HarnessError, HarnessResult};
use crate::findings::{Finding, FindingsCollector, Severity};
use crate::locator::CreationSignal;
use crate::session::SessionManager;
use crate::state::Role;

const MENU_SECTIONS: &str = "#menu-sections";
const MENU_ITEM_CARDS: &str = ".menu-item-card";
const ITEM_MODAL_OPEN: &str = "#item-modal.open, .modal--item-customization.active";
const ADD_TO_CART: &str = "#modal-add-to-cart-btn";
const CART_BADGE: &str = "#cart-items-count";
const CART_TOGGLE: &str = "[data-toggle-cart], .cart-btn";
const CHECKOUT_BUTTON: &str = "#checkout-btn";
const CHECKOUT_FORM: &str = "#checkout-form";

pub struct OrderCreator {
    config: HarnessConfig,
    http: reqwest::Client,
}

impl OrderCreator {
    pub fn new(config: HarnessConfig) -> HarnessResult<Self> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { config, http })
    }

    pub async fn create_order(
        &self,
        sessions: &SessionManager,
        findings: &mut FindingsCollector,
    ) -> HarnessResult<CreationSignal> {
        match self.config.creation {
            CreationMode::Api => self.create_via_api().await,
            CreationMode::Ui => self.create_via_ui(sessions, findings).await,
        }
    }

    /// Post the order directly, capturing the acknowledgment payload for
    /// the highest-confidence resolution strategy.
    async fn create_via_api(&self) -> HarnessResult<CreationSignal> {
        let customer = &self.config.customer;
        let body = json!({
            "customer": {
                "name": customer.name,
                "email": customer.email,
                "phone": customer.phone,
            },
            "items": [{ "menu_item": "first_available", "quantity": 1 }],
            "pay_later": true,
        });

        let url = format!("{}/orders", self.config.api_url.trim_end_matches('/'));
        let response = self.http.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(HarnessError::OrderCreation(format!(
                "backend answered {} for {url}",
                response.status()
            )));
        }
        let ack: Value = response.json().await?;
        info!("order created via backend API");
        Ok(CreationSignal { ack_payload: Some(ack), customer_name: customer.name.clone() })
    }

    /// Drive menu, cart, and checkout in a real customer session. The
    /// session is closed whatever the outcome.
    async fn create_via_ui(
        &self,
        sessions: &SessionManager,
        findings: &mut FindingsCollector,
    ) -> HarnessResult<CreationSignal> {
        let session = sessions.open_session(Role::Customer).await?;
        let outcome = self.drive_checkout(session.page(), findings).await;
        if let Err(e) = sessions.close_session(session).await {
            warn!(error = %e, "customer session did not close cleanly");
        }
        outcome?;
        info!("order created via client checkout");
        Ok(CreationSignal {
            ack_payload: None,
            customer_name: self.config.customer.name.clone(),
        })
    }

    async fn drive_checkout(
        &self,
        page: &crate::browser::PageHandle,
        findings: &mut FindingsCollector,
    ) -> HarnessResult<()> {
        let timeouts = self.config.timeouts;

        let menu = [Lookup::css(MENU_SECTIONS, Confidence::Exact)];
        if page.wait_for(&menu, timeouts.element()).await?.is_none() {
            return Err(HarnessError::OrderCreation("menu did not render".into()));
        }

        // two products, matching a realistic multi-item ticket
        let card = [Lookup::css(MENU_ITEM_CARDS, Confidence::Exact)];
        if page.wait_for(&card, timeouts.element()).await?.is_none() {
            return Err(HarnessError::OrderCreation("no menu items listed".into()));
        }
        for index in 0..2 {
            self.add_menu_item(page, index).await?;
        }

        // cart badge is informational; its absence degrades but does not fail
        let badge = [Lookup::css(CART_BADGE, Confidence::Exact)];
        match page.wait_for(&badge, timeouts.modal()).await? {
            Some((badge_el, _)) => {
                let count = page.inner_text(&badge_el).await?.unwrap_or_default();
                debug!(count, "cart badge updated");
            }
            None => findings.record(Finding::new(
                Severity::Low,
                "cart badge did not reflect the added items",
                "client app, cart",
                "customers get no visual confirmation the items landed in the cart",
                "update #cart-items-count when items are added",
            )),
        }

        let cart_toggle = [Lookup::css(CART_TOGGLE, Confidence::Exact)];
        let Some((toggle, _)) = page.wait_for(&cart_toggle, timeouts.element()).await? else {
            return Err(HarnessError::OrderCreation("cart toggle not found".into()));
        };
        page.click(&toggle).await?;

        let checkout = [Lookup::css(CHECKOUT_BUTTON, Confidence::Exact)];
        let Some((checkout_btn, _)) = page.wait_for(&checkout, timeouts.element()).await? else {
            return Err(HarnessError::OrderCreation("checkout button not found".into()));
        };
        page.click(&checkout_btn).await?;

        self.fill_checkout_form(page).await?;

        // confirmation is a redirect to a thank-you or orders view
        let redirected = self.wait_for_confirmation(page).await?;
        if !redirected {
            findings.record(Finding::new(
                Severity::High,
                "checkout submission produced no recognizable confirmation",
                "client app, checkout",
                "the order may or may not exist; later resolution decides",
                "redirect to a confirmation view after checkout",
            ));
        }
        Ok(())
    }

    /// Open the card at `index` (or the last card when fewer are
    /// listed), add it through the customization modal with defaults,
    /// and close the modal.
    async fn add_menu_item(
        &self,
        page: &crate::browser::PageHandle,
        index: usize,
    ) -> HarnessResult<()> {
        let timeouts = self.config.timeouts;
        let cards = page.find_all(MENU_ITEM_CARDS).await?;
        let Some(card) = cards.get(index.min(cards.len().saturating_sub(1))) else {
            return Err(HarnessError::OrderCreation("no menu items listed".into()));
        };
        page.click(card).await?;

        let modal = [Lookup::css(ITEM_MODAL_OPEN, Confidence::Exact)];
        if page.wait_for(&modal, timeouts.modal()).await?.is_none() {
            return Err(HarnessError::OrderCreation("item modal did not open".into()));
        }
        let add = [Lookup::css(ADD_TO_CART, Confidence::Exact)];
        let Some((add_btn, _)) = page.wait_for(&add, timeouts.element()).await? else {
            return Err(HarnessError::OrderCreation("add-to-cart control missing".into()));
        };
        page.click(&add_btn).await?;

        let close = [
            Lookup::css(".modal-close", Confidence::Exact),
            Lookup::css("[class*='close']", Confidence::Heuristic),
        ];
        if let Some((close_btn, _)) = page.find_first(&close).await? {
            page.click(&close_btn).await?;
        }
        Ok(())
    }

    async fn fill_checkout_form(&self, page: &crate::browser::PageHandle) -> HarnessResult<()> {
        let timeouts = self.config.timeouts;
        let form = [Lookup::css(CHECKOUT_FORM, Confidence::Exact)];
        if page.wait_for(&form, timeouts.element()).await?.is_none() {
            return Err(HarnessError::OrderCreation("checkout form did not render".into()));
        }

        let customer = &self.config.customer;
        for (selector, value) in [
            ("#customer-name", customer.name.as_str()),
            ("#customer-email", customer.email.as_str()),
            ("#customer-phone", customer.phone.as_str()),
        ] {
            let field = [Lookup::css(selector, Confidence::Exact)];
            let Some((el, _)) = page.wait_for(&field, timeouts.element()).await? else {
                return Err(HarnessError::OrderCreation(format!(
                    "checkout field {selector} missing"
                )));
            };
            page.fill(&el, value).await?;
        }

        // pay-later keeps the cashier step meaningful
        let pay_later = [
            Lookup::css("input[value='pay_later']", Confidence::Exact),
            Lookup::text("button, label", "pagar despu", Confidence::Heuristic),
        ];
        if let Some((option, _)) = page.find_first(&pay_later).await? {
            page.click(&option).await?;
        } else {
            debug!("no explicit pay-later option, default payment terms apply");
        }

        let submit = [
            Lookup::css("#checkout-form button[type='submit']", Confidence::Exact),
            Lookup::css("#place-order-btn", Confidence::Exact),
        ];
        let Some((submit_btn, _)) = page.wait_for(&submit, timeouts.element()).await? else {
            return Err(HarnessError::OrderCreation("checkout submit control missing".into()));
        };
        page.click(&submit_btn).await?;
        Ok(())
    }

    async fn wait_for_confirmation(
        &self,
        page: &crate::browser::PageHandle,
    ) -> HarnessResult<bool> {
        let deadline = std::time::Instant::now() + self.config.timeouts.transition();
        loop {
            let url = page.current_url().await?;
            let lowered = url.to_lowercase();
            if ["thank-you", "thankyou", "feedback", "orders", "confirmacion"]
                .iter()
                .any(|marker| lowered.contains(marker))
            {
                return Ok(true);
            }
            if std::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(self.config.timeouts.poll_interval()).await;
        }
    }
}
