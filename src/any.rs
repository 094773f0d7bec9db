use std::{
    any::{type_name, TypeId},
    cmp::Ordering,
    fmt::{self, Display, Formatter},
};

/// Type key of the container: every map of the registry and the object store is keyed by it.
///
/// Equality and ordering only look at the [`TypeId`], the name is kept for messages and graphs.
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    pub name: &'static str,
    pub id: TypeId,
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl PartialOrd for TypeInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl TypeInfo {
    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            name: type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    /// Type name with module paths stripped from every segment,
    /// `alloc::sync::Arc<app::Config>` becomes `Arc<Config>`.
    #[must_use]
    pub fn short_name(&self) -> String {
        let mut short = String::with_capacity(self.name.len());
        let mut start = 0;
        for (index, ch) in self.name.char_indices() {
            if matches!(ch, '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' | ';' | '*') {
                push_segment(&mut short, &self.name[start..index]);
                short.push(ch);
                start = index + ch.len_utf8();
            }
        }
        push_segment(&mut short, &self.name[start..]);
        short
    }
}

fn push_segment(short: &mut String, segment: &str) {
    short.push_str(segment.rsplit("::").next().unwrap_or(segment));
}

impl Display for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::TypeInfo;

    use std::{collections::BTreeMap, sync::Arc};

    mod app {
        pub struct Config;
    }

    #[test]
    fn test_short_name() {
        assert_eq!(TypeInfo::of::<Arc<app::Config>>().short_name(), "Arc<Config>");
        assert_eq!(
            TypeInfo::of::<BTreeMap<String, Vec<Arc<app::Config>>>>().short_name(),
            "BTreeMap<String, Vec<Arc<Config>>>"
        );
    }

    #[test]
    fn test_eq_by_id() {
        assert_eq!(TypeInfo::of::<Arc<app::Config>>(), TypeInfo::of::<Arc<app::Config>>());
        assert_ne!(TypeInfo::of::<Arc<app::Config>>(), TypeInfo::of::<app::Config>());
    }
}
