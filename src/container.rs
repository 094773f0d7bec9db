use parking_lot::Mutex;
use std::{
    any::type_name,
    borrow::Cow,
    panic::{self, AssertUnwindSafe, Location},
};
use tracing::{debug, error, info_span};

use crate::{
    any::TypeInfo,
    config::{Config, Options},
    dependency::{outputs, Dependency, Input, Multiplicity, DEFAULT_GROUP},
    errors::Error,
    graph::{self, Graph},
    injector::{Injector, Target},
    provider::{boxed_provider, FromArgs, Provider, ProviderNode},
    reflect::{AnyBox, Kind, Reflect, Shape, Shared, Stored},
    registry::Registry,
    resolver::Resolver,
    store::ObjectStore,
    utils::thread_safety::{RcThreadSafety, WeakThreadSafety},
};

/// Dependency injection container.
///
/// Cheap to clone, every clone shares the same providers and stored values.
/// A container can be requested as a dependency itself, as `Container` or `Option<Container>`.
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: RcThreadSafety<ContainerInner>,
}

pub(crate) struct ContainerInner {
    pub(crate) config: Config,
    pub(crate) registry: Mutex<Registry>,
    pub(crate) store: Mutex<ObjectStore>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// Creates container with the default [`Config`]
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::build(Config::default())
    }

    /// # Errors
    /// Returns a configuration error if the config isn't valid, see [`Config::validate`].
    pub fn with_config(config: Config) -> Result<Self, Error> {
        if let Err(err) = config.validate() {
            error!("{}", err);
            return Err(err);
        }
        Ok(Self::build(config))
    }

    fn build(config: Config) -> Self {
        let container = Self {
            inner: RcThreadSafety::new(ContainerInner {
                config,
                registry: Mutex::new(Registry::new()),
                store: Mutex::new(ObjectStore::new()),
            }),
        };
        container.provide_self();
        container
    }

    /// Registers the provider of the container itself, holding only a weak handle
    fn provide_self(&self) {
        let weak = RcThreadSafety::downgrade(&self.inner);
        let callable = boxed_provider(move || weak.upgrade().map(|inner| Container { inner }));
        let node = ProviderNode::from_parts(
            callable,
            Vec::new(),
            Vec::new(),
            Option::<Container>::shape(),
            vec![Dependency::new(TypeInfo::of::<Container>(), Multiplicity::Singular)],
            false,
            Location::caller(),
        );
        self.inner.registry.lock().add(&RcThreadSafety::new(node));
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Registers a provider under every type its output describes.
    ///
    /// The provider runs at most once, the first time one of its outputs is requested.
    ///
    /// # Errors
    /// - Returns a validation error if a parameter or the output has an unsupported kind.
    /// - Returns a cyclic error if the provider closes a cycle, the registration is rolled back then.
    #[track_caller]
    pub fn provide<P, Args, M>(&self, provider: P) -> Result<(), Error>
    where
        P: Provider<Args, M>,
        Args: FromArgs,
        M: 'static,
    {
        let location = Location::caller();
        let span = info_span!("provide", provider = %location, output = type_name::<P::Output>());
        let _guard = span.enter();

        Self::guarded("provide", || {
            let node = match ProviderNode::new(provider, location) {
                Ok(node) => RcThreadSafety::new(node),
                Err(err) => {
                    error!("{}", err);
                    return Err(err);
                }
            };

            let mut registry = self.inner.registry.lock();
            registry.add(&node);
            if let Err(path) = registry.dfs_detect() {
                registry.rollback(&node);

                let err = Error::cyclic(path).with_detail("provider", location);
                error!("{}", err);
                return Err(err);
            }

            debug!(outputs = node.outputs.len(), "Registered");
            Ok(())
        })
    }

    /// Resolves a value of `T` with default [`Options`]
    ///
    /// # Errors
    /// See [`Container::get_with`].
    #[inline]
    pub fn get<T: Reflect>(&self) -> Result<T, Error> {
        self.get_with(Options::default())
    }

    /// Resolves a value of `T`, evaluating the providers it depends on
    ///
    /// # Errors
    /// - Returns a validation error if `T` has an unsupported kind.
    /// - Returns a not found error if nothing provides `T` and null values aren't allowed.
    /// - Returns an invocation error if a provider fails.
    pub fn get_with<T: Reflect>(&self, options: Options) -> Result<T, Error> {
        let span = info_span!("get", dependency = type_name::<T>());
        let _guard = span.enter();

        Self::guarded("get", || {
            let shape = T::shape();
            if let Err(message) = Input::derive(&shape, Cow::Borrowed(DEFAULT_GROUP)) {
                let err = Error::validation(message).with_detail("type", shape.type_info);
                error!("{}", err);
                return Err(err);
            }

            let options = self.inner.config.merge(options);
            let value = Resolver::new(&self.inner, options.allow_values_null).resolve(&shape, DEFAULT_GROUP)?;
            value
                .downcast::<T>()
                .map(|value| *value)
                .map_err(|_| Error::provider(format!("resolved value isn't {}", shape.type_info)))
        })
    }

    /// Injects into a target with default [`Options`] and gives it back
    ///
    /// # Errors
    /// See [`Container::inject_with`].
    #[inline]
    #[track_caller]
    pub fn inject<T, M>(&self, target: T) -> Result<T, Error>
    where
        T: Target<M>,
    {
        self.inject_with(target, Options::default())
    }

    /// Injects into a target and gives it back.
    ///
    /// A callable is called with resolved arguments. A record borrowed mutably gets its injection
    /// methods called, then its fields set in place.
    ///
    /// # Errors
    /// - Returns a validation error if the target has no parameters or one with an unsupported kind.
    /// - Returns a not found error if a value can't be resolved.
    /// - Returns an invocation error if a provider or the target itself fails.
    #[track_caller]
    pub fn inject_with<T, M>(&self, mut target: T, options: Options) -> Result<T, Error>
    where
        T: Target<M>,
    {
        let location = Location::caller();
        let span = info_span!("inject", target = type_name::<T>(), location = %location);
        let _guard = span.enter();

        Self::guarded("inject", || {
            let options = self.inner.config.merge(options);
            let injector = Injector::new(
                Resolver::new(&self.inner, options.allow_values_null),
                &self.inner.config.method_prefix,
                location,
            );
            target.inject_target(&injector)?;

            debug!("Injected");
            Ok(target)
        })
    }

    /// Stores a constructed value under every type it describes, and under each alternative type.
    ///
    /// Values are appended like provider outputs, so a provider evaluated later for the same type
    /// wins for singular requests.
    ///
    /// # Errors
    /// Returns a validation error if the value or an alternative type has an unsupported kind.
    pub fn set_value<T: Reflect>(&self, value: T, alt_types: impl IntoIterator<Item = AltType<T>>) -> Result<(), Error> {
        let span = info_span!("set_value", value = type_name::<T>());
        let _guard = span.enter();

        Self::guarded("set_value", || {
            let shape = T::shape();
            if let Err(message) = outputs(&shape) {
                let err = Error::validation(message).with_detail("type", shape.type_info);
                error!("{}", err);
                return Err(err);
            }

            let mut alt_values = Vec::new();
            for alt_type in alt_types {
                if !matches!(alt_type.shape.kind, Kind::Shared(_)) {
                    let err = Error::validation(format!(
                        "alternative type {} has unsupported {} kind",
                        alt_type.shape.type_info,
                        alt_type.shape.kind_name()
                    ))
                    .with_detail("type", alt_type.shape.type_info);
                    error!("{}", err);
                    return Err(err);
                }
                alt_values.push(((alt_type.convert)(&value), alt_type.shape));
            }

            let mut store = self.inner.store.lock();
            let mut stored = store.distribute(Box::new(value), &shape, DEFAULT_GROUP);
            for (alt_value, alt_shape) in alt_values {
                stored += store.distribute(alt_value, &alt_shape, DEFAULT_GROUP);
            }

            debug!(stored, "Value set");
            Ok(())
        })
    }

    /// Renders the provider graph and the stored values as DOT
    #[must_use]
    pub fn graph(&self) -> Graph {
        let registry = self.inner.registry.lock();
        let store = self.inner.store.lock();
        graph::render(&registry, &store)
    }

    /// Runs a public operation, turning a panic into a provider error
    fn guarded<R>(operation: &'static str, f: impl FnOnce() -> Result<R, Error>) -> Result<R, Error> {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => result,
            Err(payload) => {
                let err = Error::panicked(operation, payload);
                error!("{}", err);
                Err(err)
            }
        }
    }
}

/// Extra type a value set with [`Container::set_value`] satisfies, like a trait object of it
pub struct AltType<T> {
    shape: Shape,
    convert: Box<dyn Fn(&T) -> AnyBox>,
}

impl<T: 'static> AltType<T> {
    /// # Examples
    /// ```rust
    /// use dix::{AltType, Container};
    /// use std::sync::Arc;
    ///
    /// trait Repo: Send + Sync {}
    ///
    /// struct PostgresRepo;
    ///
    /// impl Repo for PostgresRepo {}
    ///
    /// let container = Container::new();
    /// container
    ///     .set_value(Arc::new(PostgresRepo), [AltType::new(|repo: &Arc<PostgresRepo>| repo.clone() as Arc<dyn Repo>)])
    ///     .unwrap();
    ///
    /// assert!(container.get::<Arc<dyn Repo>>().is_ok());
    /// ```
    #[must_use]
    pub fn new<U: Reflect>(convert: impl Fn(&T) -> U + 'static) -> Self {
        Self {
            shape: U::shape(),
            convert: Box::new(move |value: &T| Box::new(convert(value)) as AnyBox),
        }
    }
}

#[derive(Clone)]
struct WeakContainer(WeakThreadSafety<ContainerInner>);

impl Shared for Container {
    #[inline]
    fn into_stored(self) -> Stored {
        RcThreadSafety::new(WeakContainer(RcThreadSafety::downgrade(&self.inner)))
    }

    #[inline]
    fn from_stored(stored: &Stored) -> Option<Self> {
        stored
            .downcast_ref::<WeakContainer>()?
            .0
            .upgrade()
            .map(|inner| Self { inner })
    }
}

impl Reflect for Container {
    #[inline]
    fn shape() -> Shape {
        Shape::shared::<Self>()
    }
}
