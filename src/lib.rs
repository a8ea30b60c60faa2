//! # Event Hub
//!
//! A registry of named event channels for observer-style callbacks, with
//! three dispatch strategies that differ in how they tolerate reentrant
//! mutation of the handler list.
//!
//! ## Overview
//!
//! [`EventHub`] maps event names to ordered lists of (callback, receiver)
//! pairs. Handlers run in registration order and may call back into the hub
//! from inside their own invocation; the dispatch strategy decides what such
//! reentrant removal means for the pass in flight:
//!
//! * **Live** ([`EventHub::trigger`]): iterates the mutable channel, so
//!   removals made by an earlier handler take effect immediately.
//! * **Snapshot** ([`EventHub::safe_trigger`]): freezes the handler list
//!   before any handler runs; every handler present at dispatch start is
//!   invoked exactly once.
//! * **Deferred** ([`EventHub::async_trigger`]): same snapshot, invoked as one
//!   batch on the next Tokio scheduler turn.
//!
//! ## Features
//!
//! * **Reentrancy-safe**: no lock is held while a handler runs.
//! * **Explicit receivers**: handlers are (callable, optional receiver) pairs;
//!   the receiver is passed back on every invocation.
//! * **Identity-based removal**: [`EventHub::off`] matches by pointer
//!   identity, with four call shapes from "this exact pair" to "everything".
//! * **Fail-fast lifecycle**: after [`EventHub::destroy`], every operation
//!   returns [`EventHubError::InvalidState`].
//!
//! # Example
//!
//! ```rust
//! use event_hub::{Callback, EventHub};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! # fn main() -> Result<(), event_hub::EventHubError> {
//! let hub = EventHub::new();
//! let hits = Arc::new(AtomicUsize::new(0));
//!
//! let counter = hits.clone();
//! hub.register(
//!     "document.changed",
//!     Callback::new(move |_ctx, payload| {
//!         if payload.downcast_ref::<u64>().is_some() {
//!             counter.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }),
//!     None,
//! )?;
//!
//! let invoked = hub.trigger("document.changed", Arc::new(7u64))?;
//! assert_eq!(invoked, 1);
//! assert_eq!(hits.load(Ordering::SeqCst), 1);
//! # Ok(())
//! # }
//! ```

mod error;
mod handler;
mod hub;

pub use error::{EventHubError, EventHubErrorExt};
pub use handler::{Callback, Context, Payload};
pub use hub::EventHub;
