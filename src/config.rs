use std::borrow::Cow;

use crate::errors::Error;

/// Name prefix of the record methods called on injection
pub const DEFAULT_METHOD_PREFIX: &str = "dix_inject";

/// Config of a container
/// ## Fields
/// - `allow_values_null`:
///   If `true`, a missing value resolves to its zero value instead of failing.
///   Only nullable handles (`Option<Arc<T>>`), lists and mappings have a zero value.
///
/// - `method_prefix`:
///   Record methods whose names start with it are called when the record is injected in place.
///   Has to be a valid identifier prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub allow_values_null: bool,
    pub method_prefix: Cow<'static, str>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allow_values_null: false,
            method_prefix: Cow::Borrowed(DEFAULT_METHOD_PREFIX),
        }
    }
}

impl Config {
    /// # Errors
    /// Returns a configuration error if the method prefix is empty or can't start an identifier.
    pub fn validate(&self) -> Result<(), Error> {
        let mut chars = self.method_prefix.chars();
        let Some(first) = chars.next() else {
            return Err(Error::configuration("method prefix can't be empty"));
        };
        if !(first == '_' || first.is_alphabetic()) || !chars.all(|ch| ch == '_' || ch.is_alphanumeric()) {
            return Err(Error::configuration(format!(
                "method prefix `{}` isn't a valid identifier",
                self.method_prefix
            ))
            .with_detail("method_prefix", &self.method_prefix));
        }
        Ok(())
    }

    /// Per-call options widened by the container config
    #[inline]
    #[must_use]
    pub(crate) fn merge(&self, options: Options) -> Options {
        Options {
            allow_values_null: self.allow_values_null || options.allow_values_null,
        }
    }
}

/// Options of a single `get` or `inject` call, merged with the container [`Config`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    pub allow_values_null: bool,
}

impl Options {
    #[inline]
    #[must_use]
    pub const fn allow_values_null(mut self, allow: bool) -> Self {
        self.allow_values_null = allow;
        self
    }
}
