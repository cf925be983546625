use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{ProductId, ServiceId};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuyerId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SellerId(pub String);

/// Negotiation path tag on a conversation. Contexts are immutable once
/// messages begin, except `Quote`, which a buyer may add by requesting a
/// quote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowContext {
    Product,
    Service,
    Quote,
}

impl WorkflowContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Service => "service",
            Self::Quote => "quote",
        }
    }
}

impl std::str::FromStr for WorkflowContext {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "product" => Ok(Self::Product),
            "service" => Ok(Self::Service),
            "quote" => Ok(Self::Quote),
            other => Err(DomainError::Validation {
                field: "workflow_context",
                message: format!("unknown workflow context `{other}` (expected product|service|quote)"),
            }),
        }
    }
}

/// Buyer-seller thread, the aggregate root for quotes and design approvals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub buyer_id: BuyerId,
    pub seller_id: SellerId,
    pub product_id: Option<ProductId>,
    pub service_id: Option<ServiceId>,
    pub contexts: Vec<WorkflowContext>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_context(&self, context: WorkflowContext) -> bool {
        self.contexts.contains(&context)
    }

    /// The one legal context mutation: a buyer initiating a quote request
    /// adds the `quote` flag. Returns whether the set changed.
    pub fn enable_quote_context(&mut self) -> bool {
        if self.has_context(WorkflowContext::Quote) {
            return false;
        }
        self.contexts.push(WorkflowContext::Quote);
        true
    }
}
