use std::thread;
use tracing::{debug, debug_span, error};

use crate::{
    container::ContainerInner,
    dependency::{Dependency, Multiplicity, DEFAULT_GROUP},
    errors::{CyclePath, Error},
    provider::{CallError, ProviderNode, ProviderState},
    reflect::{AnyBox, FieldValues, Kind, MappingShape, RecordShape, SequenceShape, Shape, SharedShape},
    service::Service as _,
};

/// Resolves parameter shapes against the object store, evaluating providers on demand.
///
/// Locks of the registry and the store are never held while a provider runs,
/// so providers may call back into the container.
pub(crate) struct Resolver<'a> {
    inner: &'a ContainerInner,
    allow_values_null: bool,
}

impl<'a> Resolver<'a> {
    #[inline]
    #[must_use]
    pub(crate) fn new(inner: &'a ContainerInner, allow_values_null: bool) -> Self {
        Self {
            inner,
            allow_values_null,
        }
    }

    pub(crate) fn resolve(&self, shape: &Shape, group: &str) -> Result<AnyBox, Error> {
        match &shape.kind {
            Kind::Shared(shared) => self.singular(shared, group),
            Kind::Sequence(sequence) => self.listed(shape, sequence, group),
            Kind::Mapping(mapping) => self.keyed(shape, mapping),
            Kind::Record(record) => self.record(shape, record),
            Kind::Scalar { .. } | Kind::Unit => Err(Error::validation(format!(
                "{} has unsupported {} kind",
                shape.type_info,
                shape.kind_name()
            ))),
        }
    }

    fn singular(&self, shared: &SharedShape, group: &str) -> Result<AnyBox, Error> {
        self.evaluate(shared)?;

        let last = self.inner.store.lock().last(&shared.key, group);
        if let Some(value) = last.as_ref().and_then(|stored| (shared.load)(stored)) {
            debug!(key = %shared.key, group, "Found in store");
            return Ok(value);
        }

        match shared.zero {
            Some(zero) if self.allow_values_null => {
                debug!(key = %shared.key, group, "Resolved to zero value");
                Ok(zero())
            }
            _ => Err(not_found(Dependency::new(shared.key, Multiplicity::Singular), group)),
        }
    }

    fn listed(&self, shape: &Shape, sequence: &SequenceShape, group: &str) -> Result<AnyBox, Error> {
        let Kind::Shared(elem) = &sequence.elem.kind else {
            return Err(Error::validation(format!("{} must hold shared handles", shape.type_info)));
        };
        self.evaluate(elem)?;

        let values = self.inner.store.lock().all(&elem.key, group);
        if values.is_empty() && !self.allow_values_null {
            return Err(not_found(Dependency::new(elem.key, Multiplicity::Listed), group));
        }

        let items = values.iter().filter_map(|stored| (elem.load)(stored)).collect();
        debug!(key = %elem.key, group, "Collected listed values");
        (sequence.collect)(items).ok_or_else(|| mismatch(shape))
    }

    fn keyed(&self, shape: &Shape, mapping: &MappingShape) -> Result<AnyBox, Error> {
        let (key, multiplicity, entries) = match &mapping.elem.kind {
            Kind::Shared(elem) => {
                self.evaluate(elem)?;

                let groups = self.inner.store.lock().groups(&elem.key);
                let entries = groups
                    .into_iter()
                    .filter_map(|(group, values)| values.last().and_then(|stored| (elem.load)(stored)).map(|value| (group, value)))
                    .collect::<Vec<_>>();
                (elem.key, Multiplicity::Keyed, entries)
            }
            Kind::Sequence(sequence) => {
                let Kind::Shared(elem) = &sequence.elem.kind else {
                    return Err(Error::validation(format!(
                        "{} must hold lists of shared handles",
                        shape.type_info
                    )));
                };
                self.evaluate(elem)?;

                let groups = self.inner.store.lock().groups(&elem.key);
                let mut entries = Vec::with_capacity(groups.len());
                for (group, values) in groups {
                    let items = values.iter().filter_map(|stored| (elem.load)(stored)).collect();
                    let list = (sequence.collect)(items).ok_or_else(|| mismatch(&sequence.elem))?;
                    entries.push((group, list));
                }
                (elem.key, Multiplicity::KeyedList, entries)
            }
            _ => {
                return Err(Error::validation(format!(
                    "{} must hold shared handles or lists of them",
                    shape.type_info
                )))
            }
        };

        if entries.is_empty() && !self.allow_values_null {
            return Err(not_found(Dependency::new(key, multiplicity), DEFAULT_GROUP));
        }

        debug!(%key, groups = entries.len(), "Collected keyed values");
        (mapping.collect)(entries).ok_or_else(|| mismatch(shape))
    }

    /// Builds a fresh record, unexported and scalar fields keep their zero value
    fn record(&self, shape: &Shape, record: &RecordShape) -> Result<AnyBox, Error> {
        let mut values = Vec::with_capacity(record.fields.len());
        for field in &record.fields {
            let value = match &field.shape.kind {
                Kind::Scalar { .. } | Kind::Unit if field.is_tagged() => {
                    return Err(Error::validation(format!(
                        "field `{}` of {} has unsupported {} kind",
                        field.name,
                        shape.type_info,
                        field.shape.kind_name()
                    )));
                }
                Kind::Scalar { zero } => zero(),
                Kind::Unit => Box::new(()) as AnyBox,
                _ => self
                    .resolve(&field.shape, field.group.as_deref().unwrap_or(DEFAULT_GROUP))
                    .map_err(|err| err.with_detail("field", format!("{}.{}", shape.type_info, field.name)))?,
            };
            values.push((field.name, value));
        }

        (record.build)(&mut FieldValues::new(shape.type_info, values))
    }

    /// Runs every provider of the key that hasn't run yet, in registration order
    fn evaluate(&self, shared: &SharedShape) -> Result<(), Error> {
        let nodes = self.inner.registry.lock().providers(&shared.key);
        for node in nodes {
            self.invoke(&node)?;
        }
        Ok(())
    }

    fn invoke(&self, node: &ProviderNode) -> Result<(), Error> {
        let mut evaluation = match node.begin() {
            Ok(evaluation) => evaluation,
            Err(ProviderState::Done) => return Ok(()),
            Err(ProviderState::Evaluating(owner)) if owner == thread::current().id() => {
                let path = CyclePath(node.outputs.iter().map(|output| output.type_info).take(1).collect());
                let err = Error::cyclic(path).with_detail("provider", node.location);
                error!("{}", err);
                return Err(err);
            }
            Err(ProviderState::Evaluating(_)) => {
                let err = Error::provider(format!("provider at {} is being evaluated concurrently", node.location))
                    .with_detail("provider", node.location);
                error!("{}", err);
                return Err(err);
            }
            Err(ProviderState::Poisoned | ProviderState::Pending) => {
                let err = Error::provider(format!("provider at {} failed earlier", node.location))
                    .with_detail("provider", node.location);
                error!("{}", err);
                return Err(err);
            }
        };

        let span = debug_span!("invoke", provider = %node.location, output = %node.output.type_info);
        let _guard = span.enter();

        let mut args = Vec::with_capacity(node.inputs.len());
        for (index, input) in node.inputs.iter().enumerate() {
            match self.resolve(input, DEFAULT_GROUP) {
                Ok(arg) => args.push(arg),
                Err(err) => {
                    evaluation.abandon();
                    return Err(err.with_detail("provider", node.location).with_detail("input", index));
                }
            }
        }

        evaluation.invoking();
        let output = match node.callable.clone().call(args) {
            Ok(output) => output,
            Err(CallError::Arguments(err)) => {
                evaluation.abandon();
                let err = err.with_detail("provider", node.location);
                error!("{}", err);
                return Err(err);
            }
            Err(CallError::Failed(cause)) => {
                let err = Error::invocation(node.output.type_info, node.location, cause).with_detail("provider", node.location);
                error!("{}", err);
                return Err(err);
            }
        };

        let stored = self.inner.store.lock().distribute(output, &node.output, DEFAULT_GROUP);
        evaluation.finish();

        debug!(stored, "Evaluated");
        Ok(())
    }
}

fn not_found(dependency: Dependency, group: &str) -> Error {
    let err = Error::not_found(&dependency.with_group(group.to_owned()));
    error!("{}", err);
    err
}

fn mismatch(shape: &Shape) -> Error {
    Error::provider(format!("stored values don't match {}", shape.type_info))
}
