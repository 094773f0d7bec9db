mod cyclic;
mod error;
mod kind;

pub use cyclic::CyclePath;
pub use error::{Details, Error};
pub use kind::ErrorKind;
