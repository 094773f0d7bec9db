#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate self as dix;

#[macro_use]
pub(crate) mod macros;

pub(crate) mod any;
pub(crate) mod config;
pub(crate) mod container;
pub(crate) mod dependency;
pub(crate) mod errors;
pub(crate) mod graph;
pub(crate) mod injector;
pub(crate) mod method;
pub(crate) mod provider;
pub(crate) mod reflect;
pub(crate) mod registry;
pub(crate) mod resolver;
pub(crate) mod service;
pub(crate) mod store;

pub mod utils;

pub use any::TypeInfo;
pub use config::{Config, Options, DEFAULT_METHOD_PREFIX};
pub use container::{AltType, Container};
pub use dependency::{Dependency, Multiplicity, DEFAULT_GROUP};
pub use errors::{CyclePath, Details, Error, ErrorKind};
pub use graph::Graph;
pub use injector::{Injector, Target};
pub use method::{InjectMethods, Method, MethodFn};
pub use provider::{FromArgs, Provider};
pub use reflect::{AnyBox, Field, FieldValues, Mapping, Record, Reflect, Shape, Shared, Stored};

/// Markers telling apart the callable shapes accepted by [`Provider`], [`Target`] and [`MethodFn`]
pub mod marker {
    pub use crate::provider::{RecordMarker, ResultMarker, UnitMarker, ValueMarker};
}

#[cfg(feature = "macros")]
#[cfg_attr(docsrs, doc(cfg(feature = "macros")))]
pub use dix_macros::{inject_methods, Record};
