use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{PackageId, ProductId, ProductVariant, ServiceId, VariantId};
use crate::domain::conversation::{BuyerId, ConversationId};
use crate::errors::DomainError;

pub const MAX_DESIGN_FILE_BYTES: u64 = 10 * 1024 * 1024;

pub const ALLOWED_DESIGN_MIME_TYPES: [&str; 5] =
    ["image/jpeg", "image/png", "image/gif", "image/svg+xml", "application/pdf"];

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DesignApprovalId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignStatus {
    Pending,
    Approved,
    Rejected,
    ChangesRequested,
}

impl DesignStatus {
    /// Pending and approved records are "active" for their slot; rejected and
    /// changes_requested rows are history.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }
}

/// Which negotiation path the upload belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignContext {
    Product,
    Quote,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignFile {
    pub url: String,
    pub filename: String,
    pub size_bytes: u64,
    pub mime_type: String,
}

impl DesignFile {
    pub fn validate(&self) -> Result<(), DomainError> {
        if !ALLOWED_DESIGN_MIME_TYPES.contains(&self.mime_type.as_str()) {
            return Err(DomainError::Validation {
                field: "design_files",
                message: format!(
                    "unsupported file type `{}` for `{}` (expected jpeg|png|gif|svg|pdf)",
                    self.mime_type, self.filename
                ),
            });
        }
        if self.size_bytes > MAX_DESIGN_FILE_BYTES {
            return Err(DomainError::Validation {
                field: "design_files",
                message: format!(
                    "`{}` is {} bytes, above the {} byte limit",
                    self.filename, self.size_bytes, MAX_DESIGN_FILE_BYTES
                ),
            });
        }
        Ok(())
    }
}

/// Supersession key: at most one pending-or-approved record is active per
/// (conversation, variant-or-package) pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DesignSlot {
    Variant(VariantId),
    Package(PackageId),
    Unbound,
}

/// Buyer-submitted artifact requiring seller sign-off before purchase.
/// Append-only per conversation: a re-upload after changes_requested creates
/// a fresh pending record and the prior row stays for history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DesignApproval {
    pub id: DesignApprovalId,
    pub conversation_id: ConversationId,
    pub product_id: Option<ProductId>,
    pub service_id: Option<ServiceId>,
    pub buyer_id: BuyerId,
    pub variant_id: Option<VariantId>,
    pub package_id: Option<PackageId>,
    pub context: DesignContext,
    pub status: DesignStatus,
    pub files: Vec<DesignFile>,
    pub seller_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DesignApproval {
    pub fn can_transition_to(&self, next: DesignStatus) -> bool {
        use DesignStatus::{Approved, ChangesRequested, Pending, Rejected};
        matches!(
            (&self.status, next),
            (Pending, Approved) | (Pending, Rejected) | (Pending, ChangesRequested)
        )
    }

    pub fn transition_to(&mut self, next: DesignStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidDesignTransition { from: self.status, to: next })
    }

    /// Approval is the sole trigger that unlocks the purchase path.
    pub fn approve(&mut self) -> Result<(), DomainError> {
        self.transition_to(DesignStatus::Approved)
    }

    pub fn reject(&mut self, reason: Option<String>) -> Result<(), DomainError> {
        self.transition_to(DesignStatus::Rejected)?;
        if reason.is_some() {
            self.seller_notes = reason;
        }
        Ok(())
    }

    pub fn request_changes(&mut self, notes: &str) -> Result<(), DomainError> {
        if notes.trim().is_empty() {
            return Err(DomainError::Validation {
                field: "seller_notes",
                message: "change request feedback must not be empty".to_string(),
            });
        }
        self.transition_to(DesignStatus::ChangesRequested)?;
        self.seller_notes = Some(notes.to_string());
        Ok(())
    }

    pub fn unlocks_purchase(&self) -> bool {
        self.status == DesignStatus::Approved
    }

    pub fn slot(&self) -> DesignSlot {
        if let Some(variant) = &self.variant_id {
            return DesignSlot::Variant(variant.clone());
        }
        if let Some(package) = &self.package_id {
            return DesignSlot::Package(package.clone());
        }
        DesignSlot::Unbound
    }
}

/// Variant resolution fallback: a design approved without a bound variant
/// auto-binds to the product's sole active variant. Callers must log the
/// bind; it is never applied silently.
pub fn sole_variant_binding(
    design: &DesignApproval,
    variants: &[ProductVariant],
) -> Option<VariantId> {
    if design.variant_id.is_some() {
        return None;
    }
    let mut active = variants.iter().filter(|variant| variant.active);
    match (active.next(), active.next()) {
        (Some(sole), None) => Some(sole.id.clone()),
        _ => None,
    }
}

/// Validated input for a design upload.
#[derive(Clone, Debug, PartialEq)]
pub struct NewDesignApproval {
    pub conversation_id: ConversationId,
    pub product_id: Option<ProductId>,
    pub service_id: Option<ServiceId>,
    pub buyer_id: BuyerId,
    pub variant_id: Option<VariantId>,
    pub package_id: Option<PackageId>,
    pub context: DesignContext,
    pub files: Vec<DesignFile>,
}

impl NewDesignApproval {
    /// `binding_options` is the number of variants (product) or packages
    /// (service) the buyer could have picked; a product-context upload with
    /// several options and no binding is rejected.
    pub fn validate(&self, binding_options: usize) -> Result<(), DomainError> {
        if self.files.is_empty() {
            return Err(DomainError::Validation {
                field: "design_files",
                message: "at least one design file is required".to_string(),
            });
        }
        for file in &self.files {
            file.validate()?;
        }
        if self.context == DesignContext::Product
            && self.variant_id.is_none()
            && self.package_id.is_none()
            && binding_options > 1
        {
            return Err(DomainError::Validation {
                field: "variant_id",
                message: "variant/package required".to_string(),
            });
        }
        Ok(())
    }

    pub fn build(
        self,
        id: DesignApprovalId,
        binding_options: usize,
        now: DateTime<Utc>,
    ) -> Result<DesignApproval, DomainError> {
        self.validate(binding_options)?;
        Ok(DesignApproval {
            id,
            conversation_id: self.conversation_id,
            product_id: self.product_id,
            service_id: self.service_id,
            buyer_id: self.buyer_id,
            variant_id: self.variant_id,
            package_id: self.package_id,
            context: self.context,
            status: DesignStatus::Pending,
            files: self.files,
            seller_notes: None,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::catalog::{ProductId, ProductVariant, VariantId};
    use crate::domain::conversation::{BuyerId, ConversationId};
    use crate::errors::DomainError;

    use super::{
        sole_variant_binding, DesignApproval, DesignApprovalId, DesignContext, DesignFile,
        DesignSlot, DesignStatus, NewDesignApproval, MAX_DESIGN_FILE_BYTES,
    };

    fn png(size_bytes: u64) -> DesignFile {
        DesignFile {
            url: "https://cdn.example.com/designs/mock-up.png".to_string(),
            filename: "mock-up.png".to_string(),
            size_bytes,
            mime_type: "image/png".to_string(),
        }
    }

    fn upload(files: Vec<DesignFile>) -> NewDesignApproval {
        NewDesignApproval {
            conversation_id: ConversationId("conv-1".to_string()),
            product_id: Some(ProductId("prod-1".to_string())),
            service_id: None,
            buyer_id: BuyerId("buyer-1".to_string()),
            variant_id: None,
            package_id: None,
            context: DesignContext::Product,
            files,
        }
    }

    fn pending_design() -> DesignApproval {
        upload(vec![png(2048)])
            .build(DesignApprovalId("design-1".to_string()), 1, Utc::now())
            .expect("valid upload")
    }

    fn variant(id: &str, active: bool) -> ProductVariant {
        let now = Utc::now();
        ProductVariant {
            id: VariantId(id.to_string()),
            product_id: ProductId("prod-1".to_string()),
            label: id.to_string(),
            unit_price: Decimal::new(2500, 2),
            active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn oversized_file_is_rejected_and_creates_nothing() {
        let error = upload(vec![png(15 * 1024 * 1024)])
            .build(DesignApprovalId("design-1".to_string()), 1, Utc::now())
            .expect_err("15MB upload must fail");

        assert!(matches!(error, DomainError::Validation { field: "design_files", .. }));
    }

    #[test]
    fn file_at_limit_is_accepted() {
        assert!(png(MAX_DESIGN_FILE_BYTES).validate().is_ok());
    }

    #[test]
    fn unsupported_mime_type_is_rejected() {
        let mut file = png(1024);
        file.mime_type = "application/zip".to_string();
        file.filename = "mock-up.zip".to_string();

        assert!(file.validate().is_err());
    }

    #[test]
    fn product_context_with_multiple_options_requires_binding() {
        let error = upload(vec![png(1024)])
            .build(DesignApprovalId("design-1".to_string()), 3, Utc::now())
            .expect_err("unbound upload with 3 variants must fail");

        assert!(matches!(
            error,
            DomainError::Validation { field: "variant_id", message } if message == "variant/package required"
        ));
    }

    #[test]
    fn sole_option_allows_unbound_upload() {
        let design = upload(vec![png(1024)])
            .build(DesignApprovalId("design-1".to_string()), 1, Utc::now())
            .expect("sole-variant product accepts unbound upload");

        assert_eq!(design.status, DesignStatus::Pending);
        assert_eq!(design.slot(), DesignSlot::Unbound);
    }

    #[test]
    fn pending_design_moves_to_each_seller_decision() {
        let mut design = pending_design();
        design.approve().expect("pending -> approved");
        assert!(design.unlocks_purchase());

        let mut design = pending_design();
        design.reject(Some("off-brand colors".to_string())).expect("pending -> rejected");
        assert_eq!(design.seller_notes.as_deref(), Some("off-brand colors"));

        let mut design = pending_design();
        design.request_changes("move the logo left").expect("pending -> changes_requested");
        assert_eq!(design.status, DesignStatus::ChangesRequested);
    }

    #[test]
    fn approve_then_reject_fails_and_leaves_state_untouched() {
        let mut design = pending_design();
        design.approve().expect("first decision");

        let error = design.reject(None).expect_err("second decision must fail");
        assert!(matches!(error, DomainError::InvalidDesignTransition { .. }));
        assert_eq!(design.status, DesignStatus::Approved);
    }

    #[test]
    fn request_changes_requires_feedback_text() {
        let mut design = pending_design();
        let error = design.request_changes("   ").expect_err("empty notes must fail");

        assert!(matches!(error, DomainError::Validation { field: "seller_notes", .. }));
        assert_eq!(design.status, DesignStatus::Pending);
    }

    #[test]
    fn sole_variant_fallback_binds_only_unambiguous_cases() {
        let design = pending_design();

        let sole = [variant("variant-a", true), variant("variant-b", false)];
        assert_eq!(sole_variant_binding(&design, &sole), Some(VariantId("variant-a".to_string())));

        let several = [variant("variant-a", true), variant("variant-b", true)];
        assert_eq!(sole_variant_binding(&design, &several), None);

        let mut bound = pending_design();
        bound.variant_id = Some(VariantId("variant-a".to_string()));
        assert_eq!(sole_variant_binding(&bound, &sole), None);
    }
}
