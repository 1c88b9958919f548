//! Core coordination primitives for the nimbus provisioning service.
//!
//! A provisioning attempt is modelled as a [`JobSession`]: an append-only
//! [`EventLog`], a [`PromptRegistry`] for questions the worker needs a human
//! to answer, and a [`SubscriptionSet`] that fans events out to any number of
//! independently-paced observers. The worker itself is abstract (the
//! [`Provisioner`] trait); this crate only cares about the ordering and
//! wake-up guarantees between the worker, the log, and the observers.

pub mod error;
pub mod event;
pub mod prompt;
pub mod session;
pub mod subscription;
pub mod types;

pub use error::CoreError;
pub use event::{Event, EventKind, EventLog};
pub use prompt::{Prompt, PromptAnswer, PromptKind, PromptRegistry};
pub use session::{JobOutcome, JobSession, Provisioner, SessionResult};
pub use subscription::{EventSink, SubscriptionSet};
