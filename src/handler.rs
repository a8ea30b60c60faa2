use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// The argument bundle handed to every handler of one dispatch call.
///
/// Dispatch passes one shared dynamic value to all handlers; callbacks recover
/// concrete data with [`Any::downcast_ref`].
pub type Payload = Arc<dyn Any + Send + Sync>;

/// An optional receiver bound to a handler at registration time and passed
/// back explicitly on every invocation.
///
/// Identity (`Arc::ptr_eq`) is part of the removal key: the same closure
/// registered under two different receivers forms two independent entries.
pub type Context = Arc<dyn Any + Send + Sync>;

type HandlerFn = dyn Fn(Option<&Context>, &Payload) + Send + Sync;

/// A cloneable, shareable event callback.
///
/// Clones are identical for removal purposes: [`Callback::ptr_eq`] compares
/// the underlying allocation, so a handler can be unregistered with any clone
/// of the value it was registered with.
#[derive(Clone)]
pub struct Callback(Arc<HandlerFn>);

impl Callback {
    /// Wraps a closure as a registrable callback.
    ///
    /// # Examples
    /// ```rust
    /// use event_hub::Callback;
    ///
    /// let callback = Callback::new(|_ctx, _payload| {});
    /// assert!(callback.ptr_eq(&callback.clone()));
    /// ```
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Option<&Context>, &Payload) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Returns `true` when both values share one underlying closure.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn invoke(&self, context: Option<&Context>, payload: &Payload) {
        (self.0)(context, payload);
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callback").field(&Arc::as_ptr(&self.0)).finish()
    }
}

/// One (callback, optional receiver) pair in a channel. Immutable once
/// created; the pair is the sole key used for removal matching.
#[derive(Clone)]
pub(crate) struct HandlerEntry {
    pub(crate) callback: Callback,
    pub(crate) context: Option<Context>,
}

impl HandlerEntry {
    pub(crate) fn invoke(&self, payload: &Payload) {
        self.callback.invoke(self.context.as_ref(), payload);
    }

    /// Removal predicate: the callback must match by identity; a `None`
    /// context filter matches entries under any receiver.
    pub(crate) fn matches(&self, callback: &Callback, context: Option<&Context>) -> bool {
        if !self.callback.ptr_eq(callback) {
            return false;
        }
        match context {
            None => true,
            Some(wanted) => self.context.as_ref().is_some_and(|own| Arc::ptr_eq(own, wanted)),
        }
    }
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("callback", &self.callback)
            .field("has_context", &self.context.is_some())
            .finish()
    }
}
