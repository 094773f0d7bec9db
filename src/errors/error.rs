use std::{any::Any, collections::BTreeMap, panic::Location};

use super::{CyclePath, ErrorKind};
use crate::{any::TypeInfo, dependency::Dependency};

/// Free-form context attached to an error, keyed by short names like `type`, `group` or `provider`
pub type Details = BTreeMap<String, String>;

/// Error returned by every public operation of the container.
///
/// Carries its [`ErrorKind`], a map of [`Details`] and an optional wrapped cause,
/// exposed through [`std::error::Error::source`].
#[derive(thiserror::Error, Debug)]
#[error("{kind}")]
pub struct Error {
    kind: ErrorKind,
    details: Details,
    #[source]
    cause: Option<anyhow::Error>,
}

impl Error {
    #[inline]
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            details: Details::new(),
            cause: None,
        }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation { message: message.into() })
    }

    #[must_use]
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Provider { message: message.into() })
    }

    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration { message: message.into() })
    }

    #[must_use]
    pub fn cyclic(path: CyclePath) -> Self {
        let rendered = path.to_string();
        Self::new(ErrorKind::Cyclic { path }).with_detail("path", rendered)
    }

    #[must_use]
    pub fn not_found(dependency: &Dependency) -> Self {
        Self::new(ErrorKind::NotFound {
            type_info: dependency.type_info,
            multiplicity: dependency.multiplicity,
            group: dependency.group.to_string(),
        })
        .with_detail("type", dependency.type_info)
        .with_detail("group", &dependency.group)
    }

    #[must_use]
    pub fn invocation(type_info: TypeInfo, location: &'static Location<'static>, cause: anyhow::Error) -> Self {
        Self::new(ErrorKind::Invocation { type_info, location })
            .with_detail("type", type_info)
            .with_detail("location", location)
            .with_cause(cause)
    }

    /// Converts a payload caught at the public boundary into a provider error
    #[must_use]
    pub(crate) fn panicked(operation: &'static str, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_owned()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic payload".to_owned()
        };

        Self::provider(format!("panic during `{operation}`"))
            .with_detail("operation", operation)
            .with_cause(anyhow::Error::msg(message))
    }

    /// Adds a detail unless the key is already present, so the innermost context is kept
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.details.entry(key.into()).or_insert_with(|| value.to_string());
        self
    }

    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<anyhow::Error>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    #[inline]
    #[must_use]
    pub fn details(&self) -> &Details {
        &self.details
    }

    #[inline]
    #[must_use]
    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(String::as_str)
    }

    #[inline]
    #[must_use]
    pub fn cause(&self) -> Option<&anyhow::Error> {
        self.cause.as_ref()
    }
}
