//! Client-persisted variant/package selection, treated as a cache with
//! explicit invalidation. A stored choice is only honored after revalidation
//! against the server's current option list; stale selections are discarded
//! rather than trusted.

use serde::{Deserialize, Serialize};

use crate::domain::catalog::{PackageId, VariantId};
use crate::domain::conversation::ConversationId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSelection {
    pub conversation_id: ConversationId,
    pub variant_id: Option<VariantId>,
    pub package_id: Option<PackageId>,
    /// Option ids that were valid when the selection was stored.
    pub valid_against: Vec<String>,
}

impl PersistedSelection {
    pub fn variant(
        conversation_id: ConversationId,
        variant_id: VariantId,
        valid_against: Vec<String>,
    ) -> Self {
        Self { conversation_id, variant_id: Some(variant_id), package_id: None, valid_against }
    }

    pub fn package(
        conversation_id: ConversationId,
        package_id: PackageId,
        valid_against: Vec<String>,
    ) -> Self {
        Self { conversation_id, variant_id: None, package_id: Some(package_id), valid_against }
    }

    fn chosen_id(&self) -> Option<&str> {
        self.variant_id
            .as_ref()
            .map(|id| id.0.as_str())
            .or_else(|| self.package_id.as_ref().map(|id| id.0.as_str()))
    }

    /// Revalidate against the ids currently offered by the server. Returns
    /// the selection with a refreshed `valid_against` set when the choice is
    /// still offered, `None` when it must be discarded.
    pub fn revalidate(self, current_ids: &[String]) -> Option<Self> {
        let chosen = self.chosen_id()?;
        if !current_ids.iter().any(|id| id == chosen) {
            return None;
        }
        Some(Self { valid_against: current_ids.to_vec(), ..self })
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::catalog::VariantId;
    use crate::domain::conversation::ConversationId;

    use super::PersistedSelection;

    fn selection(variant: &str, valid: &[&str]) -> PersistedSelection {
        PersistedSelection::variant(
            ConversationId("conv-1".to_string()),
            VariantId(variant.to_string()),
            valid.iter().map(ToString::to_string).collect(),
        )
    }

    #[test]
    fn surviving_selection_refreshes_its_valid_set() {
        let current = vec!["variant-a".to_string(), "variant-c".to_string()];
        let revalidated = selection("variant-a", &["variant-a", "variant-b"])
            .revalidate(&current)
            .expect("still offered");

        assert_eq!(revalidated.valid_against, current);
    }

    #[test]
    fn removed_option_discards_the_selection() {
        let current = vec!["variant-b".to_string(), "variant-c".to_string()];
        assert_eq!(selection("variant-a", &["variant-a", "variant-b"]).revalidate(&current), None);
    }

    #[test]
    fn empty_selection_is_never_honored() {
        let empty = PersistedSelection {
            conversation_id: ConversationId("conv-1".to_string()),
            variant_id: None,
            package_id: None,
            valid_against: Vec::new(),
        };
        assert_eq!(empty.revalidate(&["variant-a".to_string()]), None);
    }
}
