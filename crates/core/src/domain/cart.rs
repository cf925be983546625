use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{ProductVariant, VariantId};
use crate::domain::conversation::BuyerId;
use crate::domain::design::DesignApprovalId;
use crate::domain::quote::{Quote, QuoteId, QuoteStatus};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartLineId(pub String);

/// Cart line as the bridge stores it. `effective_unit_price` is the locked
/// price for quote-sourced lines; checkout never recomputes it from the live
/// variant price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub buyer_id: BuyerId,
    pub product_variant_id: VariantId,
    pub design_approval_id: Option<DesignApprovalId>,
    pub quote_id: Option<QuoteId>,
    pub quantity: u32,
    pub effective_unit_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Resolved (variant, quantity, price, design reference) tuple handed to the
/// cart/order bridge.
#[derive(Clone, Debug, PartialEq)]
pub struct CartIntent {
    pub buyer_id: BuyerId,
    pub product_variant_id: VariantId,
    pub design_approval_id: Option<DesignApprovalId>,
    pub quote_id: Option<QuoteId>,
    pub quantity: u32,
    pub effective_unit_price: Decimal,
}

impl CartIntent {
    /// Lock an accepted quote into a cart intent. Variant, quantity, and
    /// price are copied verbatim; the buyer must never be charged a price
    /// other than the one accepted.
    pub fn from_accepted_quote(quote: &Quote, buyer_id: BuyerId) -> Result<Self, DomainError> {
        if quote.status != QuoteStatus::Accepted {
            return Err(DomainError::InvalidState {
                entity: "quote",
                state: format!("{:?}", quote.status).to_ascii_lowercase(),
                action: "add to cart",
            });
        }
        let variant = quote.product_variant_id.clone().ok_or(DomainError::Validation {
            field: "product_variant_id",
            message: "quote has no bound variant; use the direct checkout path".to_string(),
        })?;

        Ok(Self {
            buyer_id,
            product_variant_id: variant,
            design_approval_id: quote.design_approval_id.clone(),
            quote_id: Some(quote.id.clone()),
            quantity: quote.quantity,
            effective_unit_price: quote.quoted_price,
        })
    }

    /// Ordinary add-to-cart at the live variant price.
    pub fn from_variant(
        variant: &ProductVariant,
        buyer_id: BuyerId,
        quantity: u32,
        design_approval_id: Option<DesignApprovalId>,
    ) -> Result<Self, DomainError> {
        if quantity < 1 {
            return Err(DomainError::Validation {
                field: "quantity",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(Self {
            buyer_id,
            product_variant_id: variant.id.clone(),
            design_approval_id,
            quote_id: None,
            quantity,
            effective_unit_price: variant.unit_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::catalog::{ProductId, ProductVariant, VariantId};
    use crate::domain::conversation::{BuyerId, ConversationId};
    use crate::domain::quote::{NewQuote, QuoteId, QuoteStatus};
    use crate::errors::DomainError;

    use super::CartIntent;

    fn accepted_quote() -> crate::domain::quote::Quote {
        let mut quote = NewQuote {
            conversation_id: ConversationId("conv-1".to_string()),
            quoted_price: Decimal::new(1200, 2),
            quantity: 3,
            product_variant_id: Some(VariantId("variant-1".to_string())),
            service_package_id: None,
            design_approval_id: None,
            notes: None,
            expires_at: None,
        }
        .build(QuoteId("quote-1".to_string()), Utc::now())
        .expect("valid quote");
        quote.status = QuoteStatus::Accepted;
        quote
    }

    #[test]
    fn accepted_quote_locks_price_and_quantity_verbatim() {
        let intent = CartIntent::from_accepted_quote(&accepted_quote(), BuyerId("buyer-1".into()))
            .expect("accepted quote converts");

        assert_eq!(intent.effective_unit_price, Decimal::new(1200, 2));
        assert_eq!(intent.quantity, 3);
        assert_eq!(intent.quote_id, Some(QuoteId("quote-1".to_string())));
    }

    #[test]
    fn open_quote_cannot_reach_the_cart() {
        let mut quote = accepted_quote();
        quote.status = QuoteStatus::Sent;

        let error = CartIntent::from_accepted_quote(&quote, BuyerId("buyer-1".into()))
            .expect_err("unaccepted quote must not convert");
        assert!(matches!(error, DomainError::InvalidState { entity: "quote", .. }));
    }

    #[test]
    fn variantless_quote_is_steered_to_direct_checkout() {
        let mut quote = accepted_quote();
        quote.product_variant_id = None;

        let error = CartIntent::from_accepted_quote(&quote, BuyerId("buyer-1".into()))
            .expect_err("pure custom quote must not convert");
        assert!(matches!(error, DomainError::Validation { field: "product_variant_id", .. }));
    }

    #[test]
    fn live_price_path_uses_the_variant_price() {
        let now = Utc::now();
        let variant = ProductVariant {
            id: VariantId("variant-1".to_string()),
            product_id: ProductId("prod-1".to_string()),
            label: "Large".to_string(),
            unit_price: Decimal::new(1999, 2),
            active: true,
            created_at: now,
            updated_at: now,
        };

        let intent = CartIntent::from_variant(&variant, BuyerId("buyer-1".into()), 2, None)
            .expect("live path converts");
        assert_eq!(intent.effective_unit_price, Decimal::new(1999, 2));
        assert_eq!(intent.quote_id, None);

        assert!(CartIntent::from_variant(&variant, BuyerId("buyer-1".into()), 0, None).is_err());
    }
}
