use std::fmt::{self, Debug, Formatter};

use crate::{
    provider::{CallError, FromArgs, ResultMarker, UnitMarker},
    reflect::{AnyBox, Reflect, Shape},
};

/// Injection method of a record, called with resolved arguments when the record is injected in place.
///
/// Usually generated by `#[dix::inject_methods]` for every method of an `impl` block
/// whose name starts with the method prefix.
pub struct Method<R> {
    pub(crate) name: &'static str,
    pub(crate) inputs: fn() -> Vec<Shape>,
    pub(crate) call: Box<dyn FnMut(&mut R, Vec<AnyBox>) -> Result<(), CallError>>,
}

impl<R: 'static> Method<R> {
    #[must_use]
    pub fn new<F, Args, M>(name: &'static str, mut method: F) -> Self
    where
        F: MethodFn<R, Args, M>,
        Args: FromArgs,
        M: 'static,
    {
        Self {
            name,
            inputs: Args::shapes,
            call: Box::new(move |record: &mut R, args: Vec<AnyBox>| {
                let args = Args::from_args(args).map_err(CallError::Arguments)?;
                method.call_method(record, args).map_err(CallError::Failed)
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<R> Debug for Method<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Methods generated by `#[dix::inject_methods]`
pub trait InjectMethods: Sized {
    fn inject_methods() -> Vec<Method<Self>>;
}

/// Callable taking the record as first parameter, then up to 12 reflected parameters,
/// and returning `()` or `Result<(), E>`
pub trait MethodFn<R, Args, Marker>: 'static {
    fn call_method(&mut self, record: &mut R, args: Args) -> Result<(), anyhow::Error>;
}

macro_rules! impl_method_fn {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, R, $($ty,)*> MethodFn<R, ($($ty,)*), UnitMarker> for F
        where
            F: FnMut(&mut R, $($ty,)*) + 'static,
            $( $ty: Reflect, )*
        {
            #[inline]
            fn call_method(&mut self, record: &mut R, ($($ty,)*): ($($ty,)*)) -> Result<(), anyhow::Error> {
                self(record, $($ty,)*);
                Ok(())
            }
        }

        #[allow(non_snake_case)]
        impl<F, R, Err, $($ty,)*> MethodFn<R, ($($ty,)*), ResultMarker> for F
        where
            F: FnMut(&mut R, $($ty,)*) -> Result<(), Err> + 'static,
            Err: Into<anyhow::Error>,
            $( $ty: Reflect, )*
        {
            #[inline]
            fn call_method(&mut self, record: &mut R, ($($ty,)*): ($($ty,)*)) -> Result<(), anyhow::Error> {
                self(record, $($ty,)*).map_err(Into::into)
            }
        }
    };
}

all_the_tuples!(impl_method_fn);
