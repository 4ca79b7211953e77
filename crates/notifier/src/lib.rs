//! IndexNow notification dispatch.
//!
//! Callers hand URLs to a [`NotificationQueue`], which deduplicates them by
//! canonical form and submits them in batches to the IndexNow endpoint.
//! Failed batches are retried with exponential backoff until a bounded
//! number of attempts is reached, after which entries are dropped.
//!
//! Delivery is best-effort: the pending set lives in memory only and
//! `enqueue` never reports failures back to its caller.

pub mod backoff;
pub mod normalize;
pub mod queue;
pub mod submitter;

pub use normalize::TargetFilter;
pub use queue::{FlushReport, NotificationQueue, PendingNotification};
pub use submitter::{HttpSubmitter, SubmitError, Submitter};
