// Copyright 2026 Tierdesk contributors
// Licensed under the Apache License, Version 2.0

use std::fmt;

/// A service failure carrying one message per violated record or rule, the
/// shape bulk endpoints report partial failures in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFailure {
    pub messages: Vec<String>,
}

impl ServiceFailure {
    pub fn new(messages: Vec<String>) -> Self {
        Self { messages }
    }

    pub fn single(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
        }
    }
}

impl fmt::Display for ServiceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.messages.is_empty() {
            f.write_str("unknown service failure")
        } else {
            f.write_str(&self.messages.join("; "))
        }
    }
}

impl std::error::Error for ServiceFailure {}

/// Collapses any remote-call failure into one human-readable line. A
/// [`ServiceFailure`] anywhere in the chain wins; otherwise the chain's
/// messages are joined outermost first.
pub fn format_remote_error(error: &anyhow::Error) -> String {
    if let Some(failure) = error.chain().find_map(|cause| {
        cause
            .downcast_ref::<ServiceFailure>()
            .filter(|failure| !failure.messages.is_empty())
    }) {
        return failure.messages.join("; ");
    }

    let parts: Vec<String> = error.chain().map(ToString::to_string).collect();
    if parts.is_empty() {
        "unknown error".to_owned()
    } else {
        parts.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::{ServiceFailure, format_remote_error};
    use anyhow::{Context, anyhow};

    #[test]
    fn multi_message_failures_join_with_semicolons() {
        let error = anyhow::Error::new(ServiceFailure::new(vec![
            "row 3: missing phone".to_owned(),
            "row 9: locked".to_owned(),
        ]));
        assert_eq!(
            format_remote_error(&error),
            "row 3: missing phone; row 9: locked"
        );
    }

    #[test]
    fn wrapped_service_failure_is_still_found() {
        let error =
            anyhow::Error::new(ServiceFailure::single("tier update rejected")).context("promote");
        assert_eq!(format_remote_error(&error), "tier update rejected");
    }

    #[test]
    fn plain_errors_use_the_context_chain() {
        let error = anyhow!("connection refused").context("count accounts");
        assert_eq!(
            format_remote_error(&error),
            "count accounts; connection refused"
        );
    }

    #[test]
    fn single_message_is_used_as_is() {
        let error = anyhow!("boom");
        assert_eq!(format_remote_error(&error), "boom");
    }

    #[test]
    fn empty_message_list_falls_back_to_display() {
        let error = anyhow::Error::new(ServiceFailure::new(Vec::new()));
        assert_eq!(format_remote_error(&error), "unknown service failure");
    }
}
