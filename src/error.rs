use std::borrow::Cow;

/// Errors that can occur during event hub operations.
#[derive(Debug, thiserror::Error)]
pub enum EventHubError {
    /// The hub is no longer in the `Ready` state; every public operation
    /// fails fast once [`destroy`](crate::EventHub::destroy) has run.
    #[error("Invalid state{}: {message}", format_context(.context))]
    InvalidState { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl EventHubError {
    pub(crate) fn destroyed(operation: &'static str) -> Self {
        Self::InvalidState {
            message: "event hub has been destroyed".into(),
            context: Some(operation.into()),
        }
    }
}

/// Attaches call-site context to an [`EventHubError`] result.
pub trait EventHubErrorExt<T> {
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, EventHubError>;
}

impl<T> EventHubErrorExt<T> for Result<T, EventHubError> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Self {
        self.map_err(|mut e| {
            match &mut e {
                EventHubError::InvalidState { context: c, .. } => *c = Some(context.into()),
            }
            e
        })
    }
}

fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}
