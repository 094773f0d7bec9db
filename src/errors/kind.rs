use std::panic::Location;

use super::CyclePath;
use crate::{any::TypeInfo, dependency::Multiplicity};

#[derive(thiserror::Error, Debug, Clone)]
pub enum ErrorKind {
    #[error("Validation failed: {message}")]
    Validation { message: String },
    #[error("Provider failed: {message}")]
    Provider { message: String },
    #[error("Cyclic dependency detected: {path}")]
    Cyclic { path: CyclePath },
    #[error("Value of {type_info} not found ({multiplicity}, group `{group}`)")]
    NotFound {
        type_info: TypeInfo,
        multiplicity: Multiplicity,
        group: String,
    },
    #[error("Invocation of {type_info} at {location} failed")]
    Invocation {
        type_info: TypeInfo,
        location: &'static Location<'static>,
    },
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },
}
