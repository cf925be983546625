use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{PackageId, VariantId};
use crate::domain::conversation::ConversationId;
use crate::domain::design::DesignApprovalId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Pending,
    Sent,
    Accepted,
    Rejected,
    Expired,
}

impl QuoteStatus {
    /// A quote still awaiting the buyer's decision.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Sent)
    }
}

/// How an accepted quote is turned into a purchase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchasePath {
    /// Variant bound: direct add-to-cart at the quoted price/quantity.
    CartLine(VariantId),
    /// Package bound: booking path for the service package.
    PackageBooking(PackageId),
    /// Pure custom quote: separate checkout (shipping address + payment),
    /// never the cart.
    DirectCheckout,
}

/// Seller-proposed price/quantity offer. Rows are append-only per
/// conversation; the newest row by creation time is the active quote and a
/// new insert supersedes (never deletes) the prior one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub conversation_id: ConversationId,
    pub quoted_price: Decimal,
    pub quantity: u32,
    pub product_variant_id: Option<VariantId>,
    pub service_package_id: Option<PackageId>,
    pub design_approval_id: Option<DesignApprovalId>,
    pub notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub fn can_transition_to(&self, next: QuoteStatus) -> bool {
        use QuoteStatus::{Accepted, Expired, Pending, Rejected, Sent};
        matches!(
            (&self.status, next),
            (Pending, Sent)
                | (Pending, Accepted)
                | (Sent, Accepted)
                | (Pending, Rejected)
                | (Sent, Rejected)
                | (Pending, Expired)
                | (Sent, Expired)
        )
    }

    pub fn transition_to(&mut self, next: QuoteStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidQuoteTransition { from: self.status, to: next })
    }

    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|deadline| deadline <= now).unwrap_or(false)
    }

    /// Purchase eligibility: only an accepted quote unlocks a path.
    pub fn purchase_path(&self) -> Option<PurchasePath> {
        if self.status != QuoteStatus::Accepted {
            return None;
        }
        if let Some(variant) = &self.product_variant_id {
            return Some(PurchasePath::CartLine(variant.clone()));
        }
        if let Some(package) = &self.service_package_id {
            return Some(PurchasePath::PackageBooking(package.clone()));
        }
        Some(PurchasePath::DirectCheckout)
    }
}

/// Validated input for quote creation.
#[derive(Clone, Debug, PartialEq)]
pub struct NewQuote {
    pub conversation_id: ConversationId,
    pub quoted_price: Decimal,
    pub quantity: u32,
    pub product_variant_id: Option<VariantId>,
    pub service_package_id: Option<PackageId>,
    pub design_approval_id: Option<DesignApprovalId>,
    pub notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewQuote {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.quoted_price <= Decimal::ZERO {
            return Err(DomainError::Validation {
                field: "quoted_price",
                message: format!("must be positive, got {}", self.quoted_price),
            });
        }
        if self.quantity < 1 {
            return Err(DomainError::Validation {
                field: "quantity",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn build(self, id: QuoteId, now: DateTime<Utc>) -> Result<Quote, DomainError> {
        self.validate()?;
        Ok(Quote {
            id,
            conversation_id: self.conversation_id,
            quoted_price: self.quoted_price,
            quantity: self.quantity,
            product_variant_id: self.product_variant_id,
            service_package_id: self.service_package_id,
            design_approval_id: self.design_approval_id,
            notes: self.notes,
            expires_at: self.expires_at,
            status: QuoteStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }
}
