pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod selection;
pub mod workflow;

pub use domain::cart::{CartIntent, CartLine, CartLineId};
pub use domain::catalog::{
    PackageId, Product, ProductId, ProductVariant, Service, ServiceId, ServicePackage, VariantId,
};
pub use domain::conversation::{BuyerId, Conversation, ConversationId, SellerId, WorkflowContext};
pub use domain::design::{
    DesignApproval, DesignApprovalId, DesignContext, DesignFile, DesignSlot, DesignStatus,
    NewDesignApproval,
};
pub use domain::quote::{NewQuote, PurchasePath, Quote, QuoteId, QuoteStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use selection::PersistedSelection;
pub use workflow::resolver::{
    design_badge, quote_badge, resolve, DesignBadge, PanelKind, PanelVisibility, QuoteBadge,
    ResolveInput,
};
