use std::collections::BTreeMap;
use tracing::debug;

use crate::{
    any::TypeInfo,
    dependency::normalize_group,
    reflect::{AnyBox, Kind, Shape, Stored},
};

/// Values produced so far: type key, then group label, then values in insertion order
#[derive(Default)]
pub(crate) struct ObjectStore {
    map: BTreeMap<TypeInfo, BTreeMap<String, Vec<Stored>>>,
}

impl ObjectStore {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, key: TypeInfo, group: &str, value: Stored) {
        self.map
            .entry(key)
            .or_default()
            .entry(group.to_owned())
            .or_default()
            .push(value);
    }

    #[must_use]
    pub(crate) fn last(&self, key: &TypeInfo, group: &str) -> Option<Stored> {
        self.map
            .get(key)
            .and_then(|groups| groups.get(group))
            .and_then(|values| values.last())
            .cloned()
    }

    #[must_use]
    pub(crate) fn all(&self, key: &TypeInfo, group: &str) -> Vec<Stored> {
        self.map
            .get(key)
            .and_then(|groups| groups.get(group))
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub(crate) fn groups(&self, key: &TypeInfo) -> Vec<(String, Vec<Stored>)> {
        self.map
            .get(key)
            .map(|groups| {
                groups
                    .iter()
                    .map(|(group, values)| (group.clone(), values.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Keys with the number of values stored under each group
    pub(crate) fn counts(&self) -> impl Iterator<Item = (&TypeInfo, &str, usize)> {
        self.map.iter().flat_map(|(key, groups)| {
            groups
                .iter()
                .map(move |(group, values)| (key, group.as_str(), values.len()))
        })
    }

    /// Stores a produced value under every key its shape describes, returning how many values were stored.
    ///
    /// Null handles are skipped, mapping labels are normalized and tagged record fields
    /// go to their own group.
    pub(crate) fn distribute(&mut self, value: AnyBox, shape: &Shape, group: &str) -> usize {
        match &shape.kind {
            Kind::Shared(shared) => match (shared.store)(value) {
                Some(stored) => {
                    self.push(shared.key, group, stored);
                    1
                }
                None => {
                    debug!(key = %shape.type_info, group, "Null value skipped");
                    0
                }
            },
            Kind::Sequence(sequence) => (sequence.explode)(value)
                .into_iter()
                .map(|item| self.distribute(item, &sequence.elem, group))
                .sum(),
            Kind::Mapping(mapping) => (mapping.explode)(value)
                .into_iter()
                .map(|(label, item)| self.distribute(item, &mapping.elem, &normalize_group(&label)))
                .sum(),
            Kind::Record(record) => record
                .fields
                .iter()
                .zip((record.explode)(value))
                .map(|(field, item)| self.distribute(item, &field.shape, field.group.as_deref().unwrap_or(group)))
                .sum(),
            Kind::Scalar { .. } | Kind::Unit => 0,
        }
    }
}
