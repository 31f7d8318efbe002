//! Check framework and built-in checks
//!
//! A check is a named, pure function over an already-fetched page plus a few
//! site-level signals. The registry is a static table; the runner evaluates
//! entries against a `CheckContext` and persists one result per execution.

mod ai;
mod registry;
mod runner;
mod seo;
mod signals;
mod technical;
mod types;

pub use registry::{CheckRegistry, DuplicateCheck};
pub use runner::{evaluate, CheckRunner};
pub use signals::collect_signals;
pub use types::{
    Category, CheckContext, CheckDefinition, CheckError, CheckFn, CheckOutcome, CheckStatus,
    PageFacts, PageSummary, Priority, Scope, SiteSignals,
};
