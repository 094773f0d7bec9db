use std::fmt::{self, Display, Formatter};

use crate::any::TypeInfo;

/// Closed path of the type graph, the first type is repeated at the end when rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CyclePath(pub(crate) Box<[TypeInfo]>);

impl CyclePath {
    /// Members of the cycle, each one exactly once
    #[inline]
    #[must_use]
    pub fn types(&self) -> &[TypeInfo] {
        &self.0
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, type_info: &TypeInfo) -> bool {
        self.0.contains(type_info)
    }
}

impl Display for CyclePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Some(first) = self.0.first() else {
            return Ok(());
        };
        for type_info in self.0.iter() {
            write!(f, "{type_info} -> ")?;
        }
        write!(f, "{first}")
    }
}
