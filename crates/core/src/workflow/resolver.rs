//! Panel visibility resolution for a conversation's negotiation state.
//!
//! The resolver is a pure function over the conversation's declared workflow
//! contexts plus the latest quote/design records. It holds no state and is
//! re-evaluated fresh after every mutation; callers never cache the booleans.

use serde::{Deserialize, Serialize};

use crate::domain::conversation::WorkflowContext;
use crate::domain::quote::QuoteStatus;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolveInput {
    pub contexts: Vec<WorkflowContext>,
    /// Declared by the product/service, not by the conversation.
    pub requires_quote: bool,
    pub requires_design_approval: bool,
    /// Status of the newest quote for the conversation, if any.
    pub latest_quote_status: Option<QuoteStatus>,
    pub has_approved_design: bool,
    pub pending_design_count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    Quote,
    Design,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelVisibility {
    pub show_quote: bool,
    pub show_design: bool,
    /// Intended sequence when both panels show: quote settles the price
    /// before designs are uploaded. A hint for ordering, not an enforced
    /// gate.
    pub steps: Vec<PanelKind>,
}

pub fn resolve(input: &ResolveInput) -> PanelVisibility {
    let is_quote_workflow = input.contexts.contains(&WorkflowContext::Quote);
    // A conversation with no declared contexts falls back to the plain
    // product/service path.
    let is_product_workflow = input.contexts.contains(&WorkflowContext::Product)
        || input.contexts.contains(&WorkflowContext::Service)
        || input.contexts.is_empty();

    let show_quote = input.requires_quote && is_quote_workflow;

    // A quote-workflow conversation must not surface the design panel until
    // the price is settled; otherwise buyers upload designs for specs that
    // have not been priced.
    let quote_settled = input.latest_quote_status == Some(QuoteStatus::Accepted);
    let show_design = input.requires_design_approval
        && ((is_product_workflow && !is_quote_workflow) || (is_quote_workflow && quote_settled));

    let mut steps = Vec::new();
    if show_quote {
        steps.push(PanelKind::Quote);
    }
    if show_design {
        steps.push(PanelKind::Design);
    }

    PanelVisibility { show_quote, show_design, steps }
}

/// Collapsed-state badge for the quote panel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteBadge {
    Accepted,
    Status(QuoteStatus),
    NoQuote,
}

impl QuoteBadge {
    pub fn label(&self) -> String {
        match self {
            Self::Accepted => "Quote Accepted".to_string(),
            Self::Status(status) => {
                format!("Quote {}", format!("{status:?}").to_ascii_lowercase())
            }
            Self::NoQuote => "No Quote".to_string(),
        }
    }
}

pub fn quote_badge(latest_quote_status: Option<QuoteStatus>) -> QuoteBadge {
    match latest_quote_status {
        Some(QuoteStatus::Accepted) => QuoteBadge::Accepted,
        Some(status) => QuoteBadge::Status(status),
        None => QuoteBadge::NoQuote,
    }
}

/// Collapsed-state badge for the design panel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DesignBadge {
    Approved,
    Pending(u32),
    NoDesign,
}

impl DesignBadge {
    pub fn label(&self) -> String {
        match self {
            Self::Approved => "Design Approved".to_string(),
            Self::Pending(count) => format!("{count} Pending"),
            Self::NoDesign => "No Design".to_string(),
        }
    }
}

pub fn design_badge(has_approved_design: bool, pending_design_count: u32) -> DesignBadge {
    if has_approved_design {
        DesignBadge::Approved
    } else if pending_design_count > 0 {
        DesignBadge::Pending(pending_design_count)
    } else {
        DesignBadge::NoDesign
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::conversation::WorkflowContext;
    use crate::domain::quote::QuoteStatus;

    use super::{design_badge, quote_badge, resolve, PanelKind, ResolveInput};

    fn input(contexts: Vec<WorkflowContext>) -> ResolveInput {
        ResolveInput {
            contexts,
            requires_quote: false,
            requires_design_approval: false,
            latest_quote_status: None,
            has_approved_design: false,
            pending_design_count: 0,
        }
    }

    #[test]
    fn nothing_declared_shows_no_panel() {
        let resolved = resolve(&input(Vec::new()));

        assert!(!resolved.show_quote);
        assert!(!resolved.show_design);
        assert!(resolved.steps.is_empty());
    }

    #[test]
    fn quote_panel_needs_both_requirement_and_context() {
        let mut with_context = input(vec![WorkflowContext::Quote]);
        with_context.requires_quote = true;
        assert!(resolve(&with_context).show_quote);

        let mut without_context = input(vec![WorkflowContext::Product]);
        without_context.requires_quote = true;
        assert!(!resolve(&without_context).show_quote);

        let without_requirement = input(vec![WorkflowContext::Quote]);
        assert!(!resolve(&without_requirement).show_quote);
    }

    #[test]
    fn quote_workflow_hides_design_panel_until_acceptance() {
        let mut state = input(vec![WorkflowContext::Quote]);
        state.requires_quote = true;
        state.requires_design_approval = true;

        assert!(!resolve(&state).show_design, "no quote yet");

        state.latest_quote_status = Some(QuoteStatus::Sent);
        assert!(!resolve(&state).show_design, "price not settled yet");

        state.latest_quote_status = Some(QuoteStatus::Accepted);
        let resolved = resolve(&state);
        assert!(resolved.show_design, "accepted quote unlocks the design panel");
        assert_eq!(resolved.steps, vec![PanelKind::Quote, PanelKind::Design]);
    }

    #[test]
    fn product_workflow_shows_design_panel_regardless_of_quote_state() {
        let mut state = input(vec![WorkflowContext::Product]);
        state.requires_design_approval = true;

        let resolved = resolve(&state);
        assert!(!resolved.show_quote);
        assert!(resolved.show_design);

        // A stray quote record on a product-workflow conversation changes
        // nothing.
        state.latest_quote_status = Some(QuoteStatus::Rejected);
        assert!(resolve(&state).show_design);
    }

    #[test]
    fn empty_context_set_behaves_as_product_workflow() {
        let mut state = input(Vec::new());
        state.requires_design_approval = true;

        assert!(resolve(&state).show_design);
    }

    #[test]
    fn service_context_counts_as_product_workflow() {
        let mut state = input(vec![WorkflowContext::Service]);
        state.requires_design_approval = true;

        assert!(resolve(&state).show_design);
    }

    #[test]
    fn mixed_contexts_defer_to_the_quote_gate() {
        let mut state = input(vec![WorkflowContext::Product, WorkflowContext::Quote]);
        state.requires_design_approval = true;

        assert!(!resolve(&state).show_design, "quote context takes precedence until accepted");

        state.latest_quote_status = Some(QuoteStatus::Accepted);
        assert!(resolve(&state).show_design);
    }

    #[test]
    fn quote_badges_cover_every_state() {
        assert_eq!(quote_badge(None).label(), "No Quote");
        assert_eq!(quote_badge(Some(QuoteStatus::Accepted)).label(), "Quote Accepted");
        assert_eq!(quote_badge(Some(QuoteStatus::Sent)).label(), "Quote sent");
        assert_eq!(quote_badge(Some(QuoteStatus::Rejected)).label(), "Quote rejected");
    }

    #[test]
    fn design_badges_prefer_approval_over_pending_count() {
        assert_eq!(design_badge(false, 0).label(), "No Design");
        assert_eq!(design_badge(false, 2).label(), "2 Pending");
        assert_eq!(design_badge(true, 2).label(), "Design Approved");
    }
}
