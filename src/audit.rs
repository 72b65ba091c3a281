use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{models::OrderStatus, state::AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failed,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Success => "success",
            AuditOutcome::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource: Option<String>,
    pub metadata: Option<Value>,
    pub outcome: AuditOutcome,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(user_id: Option<Uuid>, action: impl Into<String>) -> Self {
        Self {
            user_id,
            action: action.into(),
            resource: None,
            metadata: None,
            outcome: AuditOutcome::Success,
            at: Utc::now(),
        }
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn failed(mut self) -> Self {
        self.outcome = AuditOutcome::Failed;
        self
    }

    /// Event for a lifecycle transition of an order.
    pub fn order_transition(
        actor: Uuid,
        action: &str,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Self {
        Self::new(Some(actor), action)
            .resource("orders")
            .metadata(serde_json::json!({
                "order_id": order_id,
                "from": from,
                "to": to,
            }))
    }
}

/// Hands the event to the audit sink. A failing sink never fails the caller.
pub async fn log_audit(state: &AppState, event: AuditEvent) {
    let action = event.action.clone();
    if let Err(err) = state.audit.record(event).await {
        tracing::warn!(error = %err, action = %action, "audit log failed");
    }
}
