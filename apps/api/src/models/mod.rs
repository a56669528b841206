pub mod change;
pub mod span;

pub use change::{normalize_changes, ChangeType, ProposedChange, RawProposedChange};
pub use span::TextSpan;
