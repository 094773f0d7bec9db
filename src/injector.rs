use std::{any::Any, borrow::Cow, panic::Location};
use tracing::{debug, error};

use crate::{
    any::TypeInfo,
    dependency::{Input, DEFAULT_GROUP},
    errors::Error,
    method::Method,
    provider::{CallError, FromArgs, RecordMarker, ResultMarker, UnitMarker},
    reflect::{AnyBox, Kind, Record, RecordShape, Reflect, Shape},
    resolver::Resolver,
};

/// Resolution context handed to a [`Target`] by [`crate::Container::inject`]
pub struct Injector<'a> {
    resolver: Resolver<'a>,
    method_prefix: &'a str,
    location: &'static Location<'static>,
}

/// Value the container can inject into.
///
/// Implemented for records borrowed mutably, which get their injection methods called and
/// their fields set in place, and for callables of 1 to 12 parameters returning `()` or `Result<(), E>`,
/// which are called with resolved arguments.
///
/// An `Err` returned by the target becomes an [`crate::ErrorKind::Invocation`] error whose cause is
/// the original error, reachable with `err.cause().and_then(|cause| cause.downcast_ref::<E>())`.
pub trait Target<Marker> {
    /// # Errors
    /// Returns an error if an argument can't be resolved or the target itself fails.
    fn inject_target(&mut self, injector: &Injector<'_>) -> Result<(), Error>;
}

impl<'a> Injector<'a> {
    pub(crate) fn new(resolver: Resolver<'a>, method_prefix: &'a str, location: &'static Location<'static>) -> Self {
        Self {
            resolver,
            method_prefix,
            location,
        }
    }

    fn resolve_all(&self, shapes: &[Shape], callable: &str) -> Result<Vec<AnyBox>, Error> {
        if shapes.is_empty() {
            return Err(Error::validation(format!("{callable} must accept at least one parameter"))
                .with_detail("location", self.location));
        }

        for (index, shape) in shapes.iter().enumerate() {
            Input::derive(shape, Cow::Borrowed(DEFAULT_GROUP)).map_err(|message| {
                Error::validation(format!("parameter #{index} of {callable}: {message}"))
                    .with_detail("location", self.location)
                    .with_detail("input", index)
            })?;
        }

        shapes
            .iter()
            .enumerate()
            .map(|(index, shape)| {
                self.resolver
                    .resolve(shape, DEFAULT_GROUP)
                    .map_err(|err| err.with_detail("input", index))
            })
            .collect()
    }

    fn arguments<Args: FromArgs>(&self) -> Result<Args, Error> {
        let args = self.resolve_all(&Args::shapes(), "injection callable")?;
        Args::from_args(args)
    }

    fn target_failed(&self, type_info: TypeInfo, cause: anyhow::Error) -> Error {
        let err = Error::invocation(type_info, self.location, cause);
        error!("{}", err);
        err
    }

    fn inject_record<R: Record>(&self, target: &mut R) -> Result<(), Error> {
        for mut method in R::methods() {
            if method.name.starts_with(self.method_prefix) {
                self.inject_method(target, &mut method)?;
            } else {
                debug!(method = method.name, "Method skipped");
            }
        }

        let shape = R::shape();
        let Kind::Record(record) = &shape.kind else {
            return Err(Error::validation(format!("{} isn't a record", shape.type_info)));
        };
        self.inject_fields(target, &shape, record)
    }

    fn inject_method<R: 'static>(&self, target: &mut R, method: &mut Method<R>) -> Result<(), Error> {
        let callable = format!("method `{}` of {}", method.name, TypeInfo::of::<R>());
        let args = self
            .resolve_all(&(method.inputs)(), &callable)
            .map_err(|err| err.with_detail("method", method.name))?;

        match (method.call)(target, args) {
            Ok(()) => {
                debug!(method = method.name, "Method injected");
                Ok(())
            }
            Err(CallError::Arguments(err)) => Err(err.with_detail("method", method.name)),
            Err(CallError::Failed(cause)) => {
                let err = Error::invocation(TypeInfo::of::<R>(), self.location, cause).with_detail("method", method.name);
                error!("{}", err);
                Err(err)
            }
        }
    }

    /// Sets every supported field in place, nested records are walked instead of replaced
    fn inject_fields(&self, target: &mut dyn Any, shape: &Shape, record: &RecordShape) -> Result<(), Error> {
        for (index, field) in record.fields.iter().enumerate() {
            match &field.shape.kind {
                Kind::Record(nested) => {
                    let Some(slot) = (record.field_mut)(target, index) else {
                        continue;
                    };
                    self.inject_fields(slot, &field.shape, nested)?;
                }
                Kind::Scalar { .. } | Kind::Unit if field.is_tagged() => {
                    return Err(Error::validation(format!(
                        "field `{}` of {} has unsupported {} kind",
                        field.name,
                        shape.type_info,
                        field.shape.kind_name()
                    )));
                }
                Kind::Scalar { .. } | Kind::Unit => {
                    debug!(field = field.name, "Field skipped");
                }
                _ => {
                    let value = self
                        .resolver
                        .resolve(&field.shape, field.group.as_deref().unwrap_or(DEFAULT_GROUP))
                        .map_err(|err| err.with_detail("field", format!("{}.{}", shape.type_info, field.name)))?;
                    let Some(slot) = (record.field_mut)(target, index) else {
                        continue;
                    };
                    if !(field.shape.assign)(slot, value) {
                        return Err(Error::provider(format!(
                            "field `{}` of {} can't hold {}",
                            field.name, shape.type_info, field.shape.type_info
                        )));
                    }
                    debug!(field = field.name, "Field injected");
                }
            }
        }
        Ok(())
    }
}

impl<R: Record> Target<RecordMarker> for &mut R {
    #[inline]
    fn inject_target(&mut self, injector: &Injector<'_>) -> Result<(), Error> {
        injector.inject_record::<R>(self)
    }
}

macro_rules! impl_target {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, $($ty,)*> Target<(($($ty,)*), UnitMarker)> for F
        where
            F: FnMut($($ty,)*),
            $( $ty: Reflect, )*
        {
            fn inject_target(&mut self, injector: &Injector<'_>) -> Result<(), Error> {
                let ($($ty,)*) = injector.arguments::<($($ty,)*)>()?;
                self($($ty,)*);
                Ok(())
            }
        }

        #[allow(non_snake_case)]
        impl<F, Err, $($ty,)*> Target<(($($ty,)*), ResultMarker)> for F
        where
            F: FnMut($($ty,)*) -> Result<(), Err>,
            Err: Into<anyhow::Error>,
            $( $ty: Reflect, )*
        {
            fn inject_target(&mut self, injector: &Injector<'_>) -> Result<(), Error> {
                let ($($ty,)*) = injector.arguments::<($($ty,)*)>()?;
                self($($ty,)*).map_err(|err| injector.target_failed(TypeInfo::of::<fn($($ty,)*)>(), err.into()))
            }
        }
    };
}

all_the_tuples!(impl_target);
