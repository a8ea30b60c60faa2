use crate::error::EventHubError;
use crate::handler::{Callback, Context, HandlerEntry, Payload};
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::any::Any;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum LifecycleState {
    #[default]
    Ready,
    Destroyed,
}

#[derive(Default)]
struct Inner {
    state: LifecycleState,
    channels: FxHashMap<String, Vec<HandlerEntry>>,
}

impl Inner {
    fn ensure_ready(&self, operation: &'static str) -> Result<(), EventHubError> {
        if self.state == LifecycleState::Ready {
            Ok(())
        } else {
            Err(EventHubError::destroyed(operation))
        }
    }
}

/// A registry of named event channels with three dispatch strategies.
///
/// Each channel holds an ordered list of (callback, receiver) pairs; dispatch
/// invokes them in registration order. The hub is `Clone` and shares one
/// underlying registry, so handlers can capture a clone and call back into it
/// (`off`, `register`, even another trigger) from inside a running dispatch
/// pass. No lock is ever held while a handler runs.
///
/// The three strategies differ only in how they tolerate such reentrant
/// mutation:
///
/// * [`trigger`](Self::trigger) walks the live channel, so removals made by an
///   earlier handler take effect within the same pass;
/// * [`safe_trigger`](Self::safe_trigger) freezes a snapshot first, isolating
///   the in-flight pass from removals;
/// * [`async_trigger`](Self::async_trigger) freezes the same snapshot but
///   defers the whole batch to the next scheduler turn.
#[derive(Clone, Default)]
pub struct EventHub {
    inner: Arc<RwLock<Inner>>,
}

impl EventHub {
    /// Creates a new hub in the `Ready` state with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler to the channel for `event`, creating the channel if
    /// it does not exist yet.
    ///
    /// Registering the same (callback, context) pair twice yields two entries
    /// and two invocations per dispatch; one matching [`off`](Self::off) call
    /// removes both.
    ///
    /// # Errors
    /// Returns [`EventHubError::InvalidState`] after [`destroy`](Self::destroy).
    ///
    /// # Examples
    /// ```rust
    /// use event_hub::{Callback, EventHub};
    ///
    /// # fn main() -> Result<(), event_hub::EventHubError> {
    /// let hub = EventHub::new();
    /// hub.register("user.created", Callback::new(|_ctx, _payload| {}), None)?;
    /// assert!(hub.has_handlers("user.created")?);
    /// # Ok(())
    /// # }
    /// ```
    pub fn register(
        &self,
        event: &str,
        callback: Callback,
        context: Option<Context>,
    ) -> Result<(), EventHubError> {
        let mut inner = self.inner.write();
        inner.ensure_ready("register")?;
        inner
            .channels
            .entry(event.to_owned())
            .or_default()
            .push(HandlerEntry { callback, context });
        trace!(event, "Handler registered");
        Ok(())
    }

    /// Permissive registration surface for dynamically supplied values.
    ///
    /// Downcasts `value` to [`Callback`] and registers it; anything else is
    /// silently ignored. The lifecycle guard still applies either way.
    ///
    /// # Errors
    /// Returns [`EventHubError::InvalidState`] after [`destroy`](Self::destroy).
    ///
    /// # Examples
    /// ```rust
    /// use event_hub::EventHub;
    /// use std::sync::Arc;
    ///
    /// # fn main() -> Result<(), event_hub::EventHubError> {
    /// let hub = EventHub::new();
    /// hub.register_any("user.created", Arc::new(42), None)?;
    /// assert!(!hub.has_handlers("user.created")?);
    /// # Ok(())
    /// # }
    /// ```
    pub fn register_any(
        &self,
        event: &str,
        value: Arc<dyn Any + Send + Sync>,
        context: Option<Context>,
    ) -> Result<(), EventHubError> {
        let Some(callback) = value.downcast_ref::<Callback>() else {
            self.inner.read().ensure_ready("register")?;
            trace!(event, "Ignoring non-callable registration value");
            return Ok(());
        };
        self.register(event, callback.clone(), context)
    }

    /// Returns `true` when the channel for `event` exists and is non-empty.
    ///
    /// # Errors
    /// Returns [`EventHubError::InvalidState`] after [`destroy`](Self::destroy).
    pub fn has_handlers(&self, event: &str) -> Result<bool, EventHubError> {
        let inner = self.inner.read();
        inner.ensure_ready("has_handlers")?;
        Ok(inner.channels.get(event).is_some_and(|channel| !channel.is_empty()))
    }

    /// Live dispatch: invokes the handlers of `event` in registration order,
    /// synchronously, iterating the live channel.
    ///
    /// If an earlier handler removes entries in this same pass, the removed
    /// entries are skipped. Entries appended during the pass are picked up.
    /// A panicking handler unwinds through this call and aborts the rest of
    /// the pass.
    ///
    /// Returns the number of handlers invoked; dispatching to an unknown or
    /// empty channel is a no-op.
    ///
    /// # Errors
    /// Returns [`EventHubError::InvalidState`] after [`destroy`](Self::destroy).
    ///
    /// # Examples
    /// ```rust
    /// use event_hub::{Callback, EventHub};
    /// use std::sync::Arc;
    ///
    /// # fn main() -> Result<(), event_hub::EventHubError> {
    /// let hub = EventHub::new();
    /// hub.register("tick", Callback::new(|_ctx, _payload| {}), None)?;
    /// assert_eq!(hub.trigger("tick", Arc::new(()))?, 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn trigger(&self, event: &str, payload: Payload) -> Result<usize, EventHubError> {
        self.inner.read().ensure_ready("trigger")?;

        // Index walk over the live channel, releasing the lock around each
        // invocation so handlers can reenter the hub without deadlocking.
        let mut index = 0;
        loop {
            let entry = {
                let inner = self.inner.read();
                inner.channels.get(event).and_then(|channel| channel.get(index)).cloned()
            };
            match entry {
                Some(entry) => {
                    entry.invoke(&payload);
                    index += 1;
                },
                None => break,
            }
        }

        trace!(event, invoked = index, "Live dispatch complete");
        Ok(index)
    }

    /// Snapshot dispatch: freezes the channel's entry list, then invokes every
    /// frozen entry in order, synchronously.
    ///
    /// Every handler present when the call starts is invoked exactly once,
    /// even if an earlier handler removes it (or anything else) from the live
    /// channel mid-pass; removal only affects future dispatches. A panicking
    /// handler still aborts the remainder of the snapshot.
    ///
    /// Returns the number of handlers invoked.
    ///
    /// # Errors
    /// Returns [`EventHubError::InvalidState`] after [`destroy`](Self::destroy).
    ///
    /// # Examples
    /// ```rust
    /// use event_hub::{Callback, EventHub};
    /// use std::sync::Arc;
    ///
    /// # fn main() -> Result<(), event_hub::EventHubError> {
    /// let hub = EventHub::new();
    /// let remover = {
    ///     let hub = hub.clone();
    ///     Callback::new(move |_ctx, _payload| {
    ///         hub.off(Some("save"), None, None).unwrap();
    ///     })
    /// };
    /// hub.register("save", remover, None)?;
    /// hub.register("save", Callback::new(|_ctx, _payload| {}), None)?;
    ///
    /// // Both handlers run even though the first one clears the channel.
    /// assert_eq!(hub.safe_trigger("save", Arc::new(()))?, 2);
    /// # Ok(())
    /// # }
    /// ```
    pub fn safe_trigger(&self, event: &str, payload: Payload) -> Result<usize, EventHubError> {
        let snapshot = self.snapshot(event, "safe_trigger")?;
        for entry in &snapshot {
            entry.invoke(&payload);
        }
        trace!(event, invoked = snapshot.len(), "Snapshot dispatch complete");
        Ok(snapshot.len())
    }

    /// Deferred snapshot dispatch: freezes the channel's entry list now and
    /// invokes the whole batch, in order, on the next scheduler turn.
    ///
    /// Handlers present at call time are always part of the batch even if
    /// removed before the deferred turn runs; handlers registered after this
    /// call are not. Delivery is best-effort: the spawned task owns the
    /// snapshot and runs it even if the hub is destroyed in between. The
    /// lifecycle state is checked at call time only.
    ///
    /// Must be called from within a Tokio runtime when the channel is
    /// non-empty; an empty or unknown channel is a no-op that schedules
    /// nothing.
    ///
    /// Returns the number of handlers scheduled.
    ///
    /// # Errors
    /// Returns [`EventHubError::InvalidState`] after [`destroy`](Self::destroy).
    ///
    /// # Examples
    /// ```rust
    /// use event_hub::{Callback, EventHub};
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), event_hub::EventHubError> {
    /// let hub = EventHub::new();
    /// let hits = Arc::new(AtomicUsize::new(0));
    ///
    /// let counter = hits.clone();
    /// hub.register(
    ///     "flush",
    ///     Callback::new(move |_ctx, _payload| {
    ///         counter.fetch_add(1, Ordering::SeqCst);
    ///     }),
    ///     None,
    /// )?;
    ///
    /// hub.async_trigger("flush", Arc::new(()))?;
    /// assert_eq!(hits.load(Ordering::SeqCst), 0);
    ///
    /// tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    /// assert_eq!(hits.load(Ordering::SeqCst), 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn async_trigger(&self, event: &str, payload: Payload) -> Result<usize, EventHubError> {
        let snapshot = self.snapshot(event, "async_trigger")?;
        if snapshot.is_empty() {
            return Ok(0);
        }

        let scheduled = snapshot.len();
        let event = event.to_owned();
        tokio::spawn(async move {
            for entry in &snapshot {
                entry.invoke(&payload);
            }
            trace!(event = %event, invoked = snapshot.len(), "Deferred dispatch complete");
        });
        Ok(scheduled)
    }

    /// Removes handlers from the live registry. Four call shapes:
    ///
    /// 1. `off(None, _, _)` clears every channel;
    /// 2. `off(Some(event), None, _)` clears that one channel;
    /// 3. `off(Some(event), Some(callback), None)` removes every entry with a
    ///    matching callback, under any receiver;
    /// 4. `off(Some(event), Some(callback), Some(context))` removes entries
    ///    matching both.
    ///
    /// Matching is by identity ([`Callback::ptr_eq`] / `Arc::ptr_eq`). Removal
    /// never affects snapshots already captured by an in-flight
    /// [`safe_trigger`](Self::safe_trigger) or
    /// [`async_trigger`](Self::async_trigger). Unknown channels are a no-op.
    ///
    /// # Errors
    /// Returns [`EventHubError::InvalidState`] after [`destroy`](Self::destroy).
    ///
    /// # Examples
    /// ```rust
    /// use event_hub::{Callback, EventHub};
    ///
    /// # fn main() -> Result<(), event_hub::EventHubError> {
    /// let hub = EventHub::new();
    /// let callback = Callback::new(|_ctx, _payload| {});
    /// hub.register("sync", callback.clone(), None)?;
    ///
    /// hub.off(Some("sync"), Some(&callback), None)?;
    /// assert!(!hub.has_handlers("sync")?);
    /// # Ok(())
    /// # }
    /// ```
    pub fn off(
        &self,
        event: Option<&str>,
        callback: Option<&Callback>,
        context: Option<&Context>,
    ) -> Result<(), EventHubError> {
        let mut inner = self.inner.write();
        inner.ensure_ready("off")?;
        match (event, callback) {
            (None, _) => {
                inner.channels.clear();
                trace!("Registry cleared");
            },
            (Some(event), None) => {
                inner.channels.remove(event);
                trace!(event, "Channel cleared");
            },
            (Some(event), Some(callback)) => {
                if let Some(channel) = inner.channels.get_mut(event) {
                    let before = channel.len();
                    channel.retain(|entry| !entry.matches(callback, context));
                    trace!(event, removed = before - channel.len(), "Handlers removed");
                }
            },
        }
        Ok(())
    }

    /// Tears the hub down: transitions to `Destroyed` and discards the
    /// registry. Every subsequent call, including a second `destroy`, fails
    /// with [`EventHubError::InvalidState`].
    ///
    /// Returns the number of channels dropped.
    ///
    /// # Errors
    /// Returns [`EventHubError::InvalidState`] when already destroyed.
    ///
    /// # Examples
    /// ```rust
    /// use event_hub::{Callback, EventHub};
    ///
    /// # fn main() -> Result<(), event_hub::EventHubError> {
    /// let hub = EventHub::new();
    /// hub.register("shutdown", Callback::new(|_ctx, _payload| {}), None)?;
    ///
    /// assert_eq!(hub.destroy()?, 1);
    /// assert!(hub.destroy().is_err());
    /// # Ok(())
    /// # }
    /// ```
    pub fn destroy(&self) -> Result<usize, EventHubError> {
        let mut inner = self.inner.write();
        inner.ensure_ready("destroy")?;
        inner.state = LifecycleState::Destroyed;
        let count = inner.channels.len();
        inner.channels.clear();
        trace!(channels = count, "Event hub destroyed");
        Ok(count)
    }

    /// Point-in-time copy of a channel's entries, decoupled from the live
    /// registry.
    fn snapshot(
        &self,
        event: &str,
        operation: &'static str,
    ) -> Result<Vec<HandlerEntry>, EventHubError> {
        let inner = self.inner.read();
        inner.ensure_ready(operation)?;
        Ok(inner.channels.get(event).cloned().unwrap_or_default())
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("EventHub")
            .field("state", &inner.state)
            .field("channels", &inner.channels.len())
            .finish()
    }
}
