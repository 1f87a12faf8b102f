//! Safety layers around the pipeline: injection screening on the way in,
//! PII scrubbing on the way out.

pub mod guard;
pub mod pii;

pub use guard::{GuardVerdict, InjectionGuard, RiskLevel};
pub use pii::{PiiScrubber, ScrubResult};
