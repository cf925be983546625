pub mod resolver;

pub use resolver::{
    design_badge, quote_badge, resolve, DesignBadge, PanelKind, PanelVisibility, QuoteBadge,
    ResolveInput,
};
