//! The bounded-concurrency fetch-and-match core.
//!
//! # Task lifecycle
//!
//! Every target read from the source becomes exactly one task:
//!
//! ```text
//! Queued ──permit──▶ Fetching ──ok──▶ Matching ──▶ Completed
//!                        └────────error─────────────▶ Completed
//! ```
//!
//! * [`Dispatcher`] owns the permits. At most `limit` tasks hold one at any
//!   instant; when all are taken the dispatcher stops reading the source
//!   until a task finishes.
//! * [`TargetProcessor`] runs a single task. It never fails: fetch and decode
//!   errors are folded into the outcome.
//! * [`PatternMatcher`] is compiled once, before any task starts, and shared
//!   read-only by all of them.
//!
//! Outcomes leave the dispatcher in completion order, not input order.
//!
//! ```rust,ignore
//! let processor = TargetProcessor::new(Arc::new(fetcher), Arc::new(matcher));
//! let dispatcher = Dispatcher::new(processor, NonZeroUsize::new(20).unwrap());
//! let mut dispatch = dispatcher.dispatch(targets);
//! while let Some(outcome) = dispatch.next().await {
//!     sink.record(&outcome).await?;
//! }
//! let dispatched = dispatch.finish().await?;
//! ```
pub mod engine;
pub mod matcher;
pub mod processor;

pub use engine::{Dispatch, Dispatcher};
pub use matcher::{MatchOptions, MatchStrategy, PatternMatcher};
pub use processor::TargetProcessor;
