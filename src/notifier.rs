//! Ledger event notifications.
//!
//! Keeps a bounded in-memory buffer of recent events for the admin feed and
//! optionally forwards each event to a webhook. Delivery is fire-and-forget;
//! a dead webhook never blocks or fails a financial operation.

use crate::money::{from_amount, Amount};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::Client;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

const BUFFER_LIMIT: usize = 256;

#[derive(Debug, Clone, Serialize)]
pub struct LedgerEvent {
    pub id: String,
    pub kind: String,
    pub account_id: String,
    pub entity_id: String,
    pub amount: f64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEvent {
    pub fn new(kind: &str, account_id: &str, entity_id: &str, amount: Amount, message: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            account_id: account_id.to_string(),
            entity_id: entity_id.to_string(),
            amount: from_amount(amount),
            message,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    recent: Arc<Mutex<VecDeque<LedgerEvent>>>,
    webhook_url: Option<String>,
    client: Client,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("YieldVault/1.0 (Ledger Notifier)")
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            recent: Arc::new(Mutex::new(VecDeque::with_capacity(BUFFER_LIMIT))),
            webhook_url,
            client,
        }
    }

    /// Record an event and forward it to the webhook if one is configured.
    pub fn publish(&self, event: LedgerEvent) {
        debug!(
            "🔔 {} account={} entity={} amount={}",
            event.kind, event.account_id, event.entity_id, event.amount
        );

        {
            let mut recent = self.recent.lock();
            if recent.len() >= BUFFER_LIMIT {
                recent.pop_front();
            }
            recent.push_back(event.clone());
        }

        if let Some(url) = self.webhook_url.clone() {
            let client = self.client.clone();
            tokio::spawn(async move {
                let result = client.post(&url).json(&event).send().await;
                match result {
                    Ok(resp) if !resp.status().is_success() => {
                        warn!("⚠️  Webhook returned {} for event {}", resp.status(), event.id);
                    }
                    Err(e) => warn!("⚠️  Webhook delivery failed for event {}: {}", event.id, e),
                    _ => {}
                }
            });
        }
    }

    /// Most recent events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<LedgerEvent> {
        let recent = self.recent.lock();
        recent.iter().rev().take(limit.clamp(1, BUFFER_LIMIT)).cloned().collect()
    }
}
