use parking_lot::Mutex;
use std::{
    borrow::Cow,
    panic::Location,
    thread::{self, ThreadId},
    vec,
};
use tracing::debug;

use crate::{
    any::TypeInfo,
    dependency::{outputs, Dependency, Input, DEFAULT_GROUP},
    errors::Error,
    reflect::{AnyBox, Reflect, Shape},
    service::{BoxCloneService, FnService},
    utils::thread_safety::{SendSafety, SyncSafety},
};

/// Marker of callables returning their value directly
pub struct ValueMarker;

/// Marker of callables returning `Result<_, E>`
pub struct ResultMarker;

/// Marker of injection targets returning nothing
pub struct UnitMarker;

/// Marker of records injected in place
pub struct RecordMarker;

/// Argument tuple of a provider, a target callable or an injection method
pub trait FromArgs: Sized + 'static {
    /// Shapes of the parameters in order
    fn shapes() -> Vec<Shape>;

    /// Converts resolved values, one per parameter in order
    ///
    /// # Errors
    /// Returns a provider error when a value is missing or has another type.
    fn from_args(args: Vec<AnyBox>) -> Result<Self, Error>;
}

fn take_arg<T: 'static>(args: &mut vec::IntoIter<AnyBox>) -> Result<T, Error> {
    let Some(arg) = args.next() else {
        return Err(Error::provider(format!("missing argument of {}", TypeInfo::of::<T>())));
    };
    arg.downcast::<T>()
        .map(|arg| *arg)
        .map_err(|_| Error::provider(format!("argument is not {}", TypeInfo::of::<T>())))
}

macro_rules! impl_from_args {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<$($ty,)*> FromArgs for ($($ty,)*)
        where
            $( $ty: Reflect, )*
        {
            #[inline]
            fn shapes() -> Vec<Shape> {
                vec![$($ty::shape(),)*]
            }

            #[inline]
            fn from_args(args: Vec<AnyBox>) -> Result<Self, Error> {
                let mut args = args.into_iter();
                Ok(($(take_arg::<$ty>(&mut args)?,)*))
            }
        }
    };
}

all_the_tuples!(impl_from_args);

/// Callable registered with [`crate::Container::provide`].
///
/// Implemented for closures and functions of up to 12 parameters returning a reflected value
/// or a `Result` of one. Parameter types of closures have to be written out.
pub trait Provider<Args: FromArgs, Marker>: Clone + SendSafety + SyncSafety + 'static {
    type Output: Reflect;

    /// Whether the callable reports failures through its result
    const MAY_FAIL: bool;

    fn provide(&mut self, args: Args) -> Result<Self::Output, anyhow::Error>;
}

macro_rules! impl_provider {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Response, $($ty,)*> Provider<($($ty,)*), ValueMarker> for F
        where
            F: FnMut($($ty,)*) -> Response + Clone + SendSafety + SyncSafety + 'static,
            Response: Reflect,
            $( $ty: Reflect, )*
        {
            type Output = Response;

            const MAY_FAIL: bool = false;

            #[inline]
            fn provide(&mut self, ($($ty,)*): ($($ty,)*)) -> Result<Self::Output, anyhow::Error> {
                Ok(self($($ty,)*))
            }
        }

        #[allow(non_snake_case)]
        impl<F, Response, Err, $($ty,)*> Provider<($($ty,)*), ResultMarker> for F
        where
            F: FnMut($($ty,)*) -> Result<Response, Err> + Clone + SendSafety + SyncSafety + 'static,
            Response: Reflect,
            Err: Into<anyhow::Error>,
            $( $ty: Reflect, )*
        {
            type Output = Response;

            const MAY_FAIL: bool = true;

            #[inline]
            fn provide(&mut self, ($($ty,)*): ($($ty,)*)) -> Result<Self::Output, anyhow::Error> {
                self($($ty,)*).map_err(Into::into)
            }
        }
    };
}

all_the_tuples!(impl_provider);

pub(crate) enum CallError {
    /// Resolved values didn't match the parameters
    Arguments(Error),
    /// The callable itself reported a failure
    Failed(anyhow::Error),
}

pub(crate) type BoxedCloneProvider = BoxCloneService<Vec<AnyBox>, AnyBox, CallError>;

#[must_use]
pub(crate) fn boxed_provider<P, Args, M>(mut provider: P) -> BoxedCloneProvider
where
    P: Provider<Args, M>,
    Args: FromArgs,
    M: 'static,
{
    BoxCloneService(Box::new(FnService(move |args: Vec<AnyBox>| {
        let args = Args::from_args(args).map_err(CallError::Arguments)?;
        let output = provider.provide(args).map_err(CallError::Failed)?;

        debug!("Provided");

        Ok::<_, CallError>(Box::new(output) as AnyBox)
    })))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProviderState {
    Pending,
    /// Evaluated by the given thread
    Evaluating(ThreadId),
    Done,
    Poisoned,
}

/// Registered provider, shared under every key it produces
pub(crate) struct ProviderNode {
    pub(crate) callable: BoxedCloneProvider,
    pub(crate) inputs: Vec<Shape>,
    pub(crate) descriptors: Vec<Input>,
    pub(crate) output: Shape,
    pub(crate) outputs: Vec<Dependency>,
    pub(crate) may_fail: bool,
    pub(crate) location: &'static Location<'static>,
    state: Mutex<ProviderState>,
}

impl ProviderNode {
    pub(crate) fn new<P, Args, M>(provider: P, location: &'static Location<'static>) -> Result<Self, Error>
    where
        P: Provider<Args, M>,
        Args: FromArgs,
        M: 'static,
    {
        let inputs = Args::shapes();
        let descriptors = inputs
            .iter()
            .enumerate()
            .map(|(index, shape)| {
                Input::derive(shape, Cow::Borrowed(DEFAULT_GROUP)).map_err(|message| {
                    Error::validation(format!("parameter #{index} of provider at {location}: {message}"))
                        .with_detail("provider", location)
                        .with_detail("input", index)
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = <P::Output as Reflect>::shape();
        let outputs = outputs(&output).map_err(|message| {
            Error::validation(format!("output of provider at {location}: {message}")).with_detail("provider", location)
        })?;

        Ok(Self::from_parts(
            boxed_provider(provider),
            inputs,
            descriptors,
            output,
            outputs,
            P::MAY_FAIL,
            location,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        callable: BoxedCloneProvider,
        inputs: Vec<Shape>,
        descriptors: Vec<Input>,
        output: Shape,
        outputs: Vec<Dependency>,
        may_fail: bool,
        location: &'static Location<'static>,
    ) -> Self {
        Self {
            callable,
            inputs,
            descriptors,
            output,
            outputs,
            may_fail,
            location,
            state: Mutex::new(ProviderState::Pending),
        }
    }

    /// Store keys of every parameter, record fields flattened
    pub(crate) fn input_keys(&self) -> Vec<TypeInfo> {
        let mut keys = Vec::new();
        for descriptor in &self.descriptors {
            descriptor.keys(&mut keys);
        }
        keys
    }

    /// Moves a pending node to evaluation, returning the state it was found in otherwise
    pub(crate) fn begin(&self) -> Result<Evaluation<'_>, ProviderState> {
        let mut state = self.state.lock();
        match *state {
            ProviderState::Pending => {
                *state = ProviderState::Evaluating(thread::current().id());
                Ok(Evaluation {
                    node: self,
                    outcome: ProviderState::Pending,
                })
            }
            other => Err(other),
        }
    }
}

/// Evaluation in progress, the node gets the outcome state when it's dropped.
///
/// The node goes back to pending unless the callable was entered, so a failure while resolving
/// arguments doesn't block later requests.
pub(crate) struct Evaluation<'a> {
    node: &'a ProviderNode,
    outcome: ProviderState,
}

impl Evaluation<'_> {
    /// Marks the callable as entered, the node is poisoned if it fails or panics from here on
    pub(crate) fn invoking(&mut self) {
        self.outcome = ProviderState::Poisoned;
    }

    /// Gives the node back as pending, like it was never evaluated
    pub(crate) fn abandon(mut self) {
        self.outcome = ProviderState::Pending;
    }

    pub(crate) fn finish(mut self) {
        self.outcome = ProviderState::Done;
    }
}

impl Drop for Evaluation<'_> {
    fn drop(&mut self) {
        *self.node.state.lock() = self.outcome;
    }
}

#[cfg(test)]
mod tests {
    use super::{boxed_provider, CallError, FromArgs, Provider, ProviderNode, ProviderState};
    use crate::{errors::ErrorKind, reflect::AnyBox, service::Service as _};

    use std::{
        panic::Location,
        sync::{
            atomic::{AtomicU8, Ordering},
            Arc,
        },
    };
    use tracing::debug;
    use tracing_test::traced_test;

    struct Config(u8);
    struct Server(u8);

    #[test]
    #[allow(dead_code)]
    fn test_provider_helper() {
        fn provider<Args: FromArgs, M, P: Provider<Args, M>>(_: P) {}

        provider(|| Arc::new(Config(1)));
        provider(|config: Arc<Config>| Arc::new(Server(config.0)));
        provider(|| Ok::<_, std::io::Error>(Arc::new(Config(1))));
        provider(|config: Option<Arc<Config>>| Ok::<_, anyhow::Error>(config.map(|config| Arc::new(Server(config.0)))));
    }

    #[test]
    #[traced_test]
    fn test_boxed_provider() {
        let call_count = Arc::new(AtomicU8::new(0));
        let mut provider = boxed_provider({
            let call_count = call_count.clone();
            move |config: Arc<Config>| {
                call_count.fetch_add(1, Ordering::SeqCst);

                debug!("Call provider");
                Arc::new(Server(config.0))
            }
        });

        let args: Vec<AnyBox> = vec![Box::new(Arc::new(Config(7)))];
        let Ok(server) = provider.call(args) else {
            panic!("provider failed");
        };

        assert_eq!(server.downcast::<Arc<Server>>().unwrap().0, 7);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_boxed_provider_errors() {
        let mut provider = boxed_provider(|_: Arc<Config>| Err::<Arc<Server>, _>(anyhow::anyhow!("boom")));

        let args: Vec<AnyBox> = vec![Box::new(Arc::new(Config(7)))];
        assert!(matches!(provider.call(args), Err(CallError::Failed(err)) if err.to_string() == "boom"));

        let args: Vec<AnyBox> = vec![Box::new(1u8)];
        assert!(matches!(
            provider.call(args),
            Err(CallError::Arguments(err)) if matches!(err.kind(), ErrorKind::Provider { .. })
        ));
    }

    #[test]
    fn test_node_validation() {
        let err = ProviderNode::new(|| 42u32, Location::caller()).err().unwrap();
        assert!(matches!(err.kind(), ErrorKind::Validation { .. }));

        let err = ProviderNode::new(|_: String| Arc::new(Config(1)), Location::caller()).err().unwrap();
        assert!(matches!(err.kind(), ErrorKind::Validation { .. }));
        assert_eq!(err.detail("input"), Some("0"));
    }

    #[test]
    fn test_evaluation_outcome() {
        let node = ProviderNode::new(|| Arc::new(Config(1)), Location::caller()).unwrap();

        drop(node.begin().ok().unwrap());
        assert!(node.begin().is_ok());

        let node = ProviderNode::new(|| Arc::new(Config(1)), Location::caller()).unwrap();
        let mut evaluation = node.begin().ok().unwrap();
        evaluation.invoking();
        drop(evaluation);
        assert!(matches!(node.begin(), Err(ProviderState::Poisoned)));

        let node = ProviderNode::new(|| Arc::new(Config(1)), Location::caller()).unwrap();
        let evaluation = node.begin().ok().unwrap();
        assert!(matches!(
            node.begin(),
            Err(ProviderState::Evaluating(owner)) if owner == std::thread::current().id()
        ));

        evaluation.finish();
        assert!(matches!(node.begin(), Err(ProviderState::Done)));
    }
}
