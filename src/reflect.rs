//! Runtime type descriptors.
//!
//! Every type that crosses the container boundary implements [`Reflect`] and describes itself
//! with a [`Shape`]: its kind, its element or field shapes, and the function pointers the resolver
//! uses to build, take apart and assign values it only knows as [`AnyBox`].

use std::{
    any::Any,
    borrow::Cow,
    collections::{BTreeMap, HashMap},
    fmt::{self, Debug, Formatter},
    hash::BuildHasher,
    sync::Arc,
    vec,
};

use crate::{
    any::TypeInfo,
    errors::Error,
    method::Method,
    utils::thread_safety::{RcAnyThreadSafety, RcThreadSafety, SendSafety, SyncSafety},
};

/// Value moving between the resolver, providers and targets
pub type AnyBox = Box<dyn Any>;

/// Value kept by the object store
pub type Stored = RcAnyThreadSafety;

pub trait Reflect: Sized + 'static {
    fn shape() -> Shape;
}

/// Handle types stored in the object store: pointers, interfaces and callables.
///
/// Loading a handle back must return the same identity that was stored, so implementors are
/// cheap-clone handles like [`Arc`].
pub trait Shared: Sized + 'static {
    fn into_stored(self) -> Stored;

    fn from_stored(stored: &Stored) -> Option<Self>;
}

impl<T> Shared for Arc<T>
where
    T: ?Sized + SendSafety + SyncSafety + 'static,
{
    #[inline]
    fn into_stored(self) -> Stored {
        RcThreadSafety::new(self)
    }

    #[inline]
    fn from_stored(stored: &Stored) -> Option<Self> {
        stored.downcast_ref::<Self>().cloned()
    }
}

#[cfg(not(feature = "thread_safe"))]
impl<T: ?Sized + 'static> Shared for std::rc::Rc<T> {
    #[inline]
    fn into_stored(self) -> Stored {
        RcThreadSafety::new(self)
    }

    #[inline]
    fn from_stored(stored: &Stored) -> Option<Self> {
        stored.downcast_ref::<Self>().cloned()
    }
}

/// Structs whose fields are resolved, destructured or injected one by one.
///
/// Usually derived with `#[derive(Record)]`. Field indexes follow the order of [`Shape::record`] fields.
pub trait Record: Reflect {
    /// Builds a fresh record, taking one value per described field in order
    fn from_fields(fields: &mut FieldValues) -> Result<Self, Error>;

    /// Splits the record into one value per described field in order
    fn into_fields(self) -> Vec<AnyBox>;

    fn field_mut(&mut self, index: usize) -> Option<&mut dyn Any>;

    /// Injection methods invoked before the fields when the record is injected in place
    fn methods() -> Vec<Method<Self>> {
        Vec::new()
    }
}

/// Keyed mappings from a group label to values
pub trait Mapping: Sized + 'static {
    type Value: Reflect;

    fn into_entries(self) -> Vec<(String, Self::Value)>;

    fn from_entries(entries: Vec<(String, Self::Value)>) -> Self;
}

impl<T: Reflect> Mapping for BTreeMap<String, T> {
    type Value = T;

    fn into_entries(self) -> Vec<(String, T)> {
        self.into_iter().collect()
    }

    fn from_entries(entries: Vec<(String, T)>) -> Self {
        entries.into_iter().collect()
    }
}

impl<T, S> Mapping for HashMap<String, T, S>
where
    T: Reflect,
    S: BuildHasher + Default + 'static,
{
    type Value = T;

    fn into_entries(self) -> Vec<(String, T)> {
        self.into_iter().collect()
    }

    fn from_entries(entries: Vec<(String, T)>) -> Self {
        entries.into_iter().collect()
    }
}

#[derive(Clone)]
pub struct Shape {
    pub(crate) type_info: TypeInfo,
    pub(crate) kind: Kind,
    pub(crate) assign: fn(&mut dyn Any, AnyBox) -> bool,
}

#[derive(Clone)]
pub(crate) enum Kind {
    Shared(SharedShape),
    Sequence(SequenceShape),
    Mapping(MappingShape),
    Record(RecordShape),
    Scalar { zero: fn() -> AnyBox },
    Unit,
}

#[derive(Clone)]
pub(crate) struct SharedShape {
    /// Key of the stored handle, `Option<Arc<T>>` and `Arc<T>` share the key of `Arc<T>`
    pub(crate) key: TypeInfo,
    pub(crate) store: fn(AnyBox) -> Option<Stored>,
    pub(crate) load: fn(&Stored) -> Option<AnyBox>,
    pub(crate) zero: Option<fn() -> AnyBox>,
}

#[derive(Clone)]
pub(crate) struct SequenceShape {
    pub(crate) elem: Box<Shape>,
    pub(crate) explode: fn(AnyBox) -> Vec<AnyBox>,
    pub(crate) collect: fn(Vec<AnyBox>) -> Option<AnyBox>,
}

#[derive(Clone)]
pub(crate) struct MappingShape {
    pub(crate) elem: Box<Shape>,
    pub(crate) explode: fn(AnyBox) -> Vec<(String, AnyBox)>,
    pub(crate) collect: fn(Vec<(String, AnyBox)>) -> Option<AnyBox>,
}

#[derive(Clone)]
pub(crate) struct RecordShape {
    pub(crate) fields: Vec<Field>,
    pub(crate) build: fn(&mut FieldValues) -> Result<AnyBox, Error>,
    pub(crate) explode: fn(AnyBox) -> Vec<AnyBox>,
    pub(crate) field_mut: fn(&mut dyn Any, usize) -> Option<&mut dyn Any>,
}

impl Shape {
    #[must_use]
    pub fn shared<S: Shared>() -> Self {
        Self {
            type_info: TypeInfo::of::<S>(),
            kind: Kind::Shared(SharedShape {
                key: TypeInfo::of::<S>(),
                store: store_shared::<S>,
                load: load_shared::<S>,
                zero: None,
            }),
            assign: assign_value::<S>,
        }
    }

    /// Shape of `Option<S>`, the null handle is the zero value
    #[must_use]
    pub fn nullable<S: Shared>() -> Self {
        Self {
            type_info: TypeInfo::of::<Option<S>>(),
            kind: Kind::Shared(SharedShape {
                key: TypeInfo::of::<S>(),
                store: store_nullable::<S>,
                load: load_nullable::<S>,
                zero: Some(zero_nullable::<S>),
            }),
            assign: assign_value::<Option<S>>,
        }
    }

    #[must_use]
    pub fn sequence<T: Reflect>() -> Self {
        Self {
            type_info: TypeInfo::of::<Vec<T>>(),
            kind: Kind::Sequence(SequenceShape {
                elem: Box::new(T::shape()),
                explode: explode_vec::<T>,
                collect: collect_vec::<T>,
            }),
            assign: assign_value::<Vec<T>>,
        }
    }

    #[must_use]
    pub fn mapping<M: Mapping>() -> Self {
        Self {
            type_info: TypeInfo::of::<M>(),
            kind: Kind::Mapping(MappingShape {
                elem: Box::new(M::Value::shape()),
                explode: explode_mapping::<M>,
                collect: collect_mapping::<M>,
            }),
            assign: assign_value::<M>,
        }
    }

    #[must_use]
    pub fn record<R: Record>(fields: Vec<Field>) -> Self {
        Self {
            type_info: TypeInfo::of::<R>(),
            kind: Kind::Record(RecordShape {
                fields,
                build: build_record::<R>,
                explode: explode_record::<R>,
                field_mut: record_field_mut::<R>,
            }),
            assign: assign_value::<R>,
        }
    }

    /// Shape of values the container never resolves, like numbers and strings
    #[must_use]
    pub fn scalar<T: Default + 'static>() -> Self {
        Self {
            type_info: TypeInfo::of::<T>(),
            kind: Kind::Scalar { zero: zero_default::<T> },
            assign: assign_value::<T>,
        }
    }

    #[must_use]
    pub fn unit() -> Self {
        Self {
            type_info: TypeInfo::of::<()>(),
            kind: Kind::Unit,
            assign: assign_value::<()>,
        }
    }

    #[inline]
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            Kind::Shared(_) => "shared",
            Kind::Sequence(_) => "sequence",
            Kind::Mapping(_) => "mapping",
            Kind::Record(_) => "record",
            Kind::Scalar { .. } => "scalar",
            Kind::Unit => "unit",
        }
    }

    /// Described fields of a record shape, empty for other kinds
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        match &self.kind {
            Kind::Record(record) => &record.fields,
            _ => &[],
        }
    }
}

impl Debug for Shape {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shape")
            .field("type", &self.type_info.name)
            .field("kind", &self.kind_name())
            .finish_non_exhaustive()
    }
}

/// Field of a record shape
#[derive(Debug, Clone)]
pub struct Field {
    pub(crate) name: &'static str,
    pub(crate) shape: Shape,
    pub(crate) group: Option<Cow<'static, str>>,
}

impl Field {
    #[inline]
    #[must_use]
    pub fn new<T: Reflect>(name: &'static str) -> Self {
        Self {
            name,
            shape: T::shape(),
            group: None,
        }
    }

    /// Binds the field to a group instead of the default one
    #[inline]
    #[must_use]
    pub fn group(mut self, group: &'static str) -> Self {
        self.group = Some(Cow::Borrowed(group));
        self
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    #[must_use]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub(crate) fn is_tagged(&self) -> bool {
        self.group.is_some()
    }
}

/// Values for a fresh record, consumed in field order by [`Record::from_fields`]
pub struct FieldValues {
    record: TypeInfo,
    values: vec::IntoIter<(&'static str, AnyBox)>,
}

impl FieldValues {
    pub(crate) fn new(record: TypeInfo, values: Vec<(&'static str, AnyBox)>) -> Self {
        Self {
            record,
            values: values.into_iter(),
        }
    }

    /// Takes the value of the next field
    ///
    /// # Errors
    /// Returns a provider error when the values run out or the next one has another type.
    pub fn take<T: 'static>(&mut self) -> Result<T, Error> {
        let Some((name, value)) = self.values.next() else {
            return Err(Error::provider(format!("record {} received fewer values than fields", self.record)));
        };
        value.downcast::<T>().map(|value| *value).map_err(|_| {
            Error::provider(format!("field `{name}` of {} received a value of another type", self.record))
                .with_detail("field", name)
        })
    }
}

fn assign_value<T: 'static>(slot: &mut dyn Any, value: AnyBox) -> bool {
    match (slot.downcast_mut::<T>(), value.downcast::<T>()) {
        (Some(slot), Ok(value)) => {
            *slot = *value;
            true
        }
        _ => false,
    }
}

fn store_shared<S: Shared>(value: AnyBox) -> Option<Stored> {
    value.downcast::<S>().ok().map(|value| (*value).into_stored())
}

fn load_shared<S: Shared>(stored: &Stored) -> Option<AnyBox> {
    S::from_stored(stored).map(|value| Box::new(value) as AnyBox)
}

fn store_nullable<S: Shared>(value: AnyBox) -> Option<Stored> {
    value.downcast::<Option<S>>().ok().and_then(|value| (*value).map(S::into_stored))
}

fn load_nullable<S: Shared>(stored: &Stored) -> Option<AnyBox> {
    S::from_stored(stored).map(|value| Box::new(Some(value)) as AnyBox)
}

fn zero_nullable<S: Shared>() -> AnyBox {
    Box::new(None::<S>)
}

fn zero_default<T: Default + 'static>() -> AnyBox {
    Box::new(T::default())
}

fn explode_vec<T: Reflect>(value: AnyBox) -> Vec<AnyBox> {
    match value.downcast::<Vec<T>>() {
        Ok(items) => items.into_iter().map(|item| Box::new(item) as AnyBox).collect(),
        Err(_) => Vec::new(),
    }
}

fn collect_vec<T: Reflect>(items: Vec<AnyBox>) -> Option<AnyBox> {
    items
        .into_iter()
        .map(|item| item.downcast::<T>().ok().map(|item| *item))
        .collect::<Option<Vec<T>>>()
        .map(|items| Box::new(items) as AnyBox)
}

fn explode_mapping<M: Mapping>(value: AnyBox) -> Vec<(String, AnyBox)> {
    match value.downcast::<M>() {
        Ok(mapping) => mapping
            .into_entries()
            .into_iter()
            .map(|(group, item)| (group, Box::new(item) as AnyBox))
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn collect_mapping<M: Mapping>(entries: Vec<(String, AnyBox)>) -> Option<AnyBox> {
    entries
        .into_iter()
        .map(|(group, item)| item.downcast::<M::Value>().ok().map(|item| (group, *item)))
        .collect::<Option<Vec<_>>>()
        .map(|entries| Box::new(M::from_entries(entries)) as AnyBox)
}

fn build_record<R: Record>(fields: &mut FieldValues) -> Result<AnyBox, Error> {
    R::from_fields(fields).map(|record| Box::new(record) as AnyBox)
}

fn explode_record<R: Record>(value: AnyBox) -> Vec<AnyBox> {
    match value.downcast::<R>() {
        Ok(record) => record.into_fields(),
        Err(_) => Vec::new(),
    }
}

fn record_field_mut<R: Record>(record: &mut dyn Any, index: usize) -> Option<&mut dyn Any> {
    record.downcast_mut::<R>()?.field_mut(index)
}

impl<T> Reflect for Arc<T>
where
    T: ?Sized + SendSafety + SyncSafety + 'static,
{
    #[inline]
    fn shape() -> Shape {
        Shape::shared::<Self>()
    }
}

#[cfg(not(feature = "thread_safe"))]
impl<T: ?Sized + 'static> Reflect for std::rc::Rc<T> {
    #[inline]
    fn shape() -> Shape {
        Shape::shared::<Self>()
    }
}

impl<S: Shared> Reflect for Option<S> {
    #[inline]
    fn shape() -> Shape {
        Shape::nullable::<S>()
    }
}

impl<T: Reflect> Reflect for Vec<T> {
    #[inline]
    fn shape() -> Shape {
        Shape::sequence::<T>()
    }
}

impl<T: Reflect> Reflect for BTreeMap<String, T> {
    #[inline]
    fn shape() -> Shape {
        Shape::mapping::<Self>()
    }
}

impl<T, S> Reflect for HashMap<String, T, S>
where
    T: Reflect,
    S: BuildHasher + Default + 'static,
{
    #[inline]
    fn shape() -> Shape {
        Shape::mapping::<Self>()
    }
}

impl Reflect for () {
    #[inline]
    fn shape() -> Shape {
        Shape::unit()
    }
}

macro_rules! impl_reflect_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Reflect for $ty {
                #[inline]
                fn shape() -> Shape {
                    Shape::scalar::<$ty>()
                }
            }
        )*
    };
}

impl_reflect_scalar!(
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
    String,
    &'static str,
);

#[cfg(test)]
mod tests {
    use super::{Kind, Reflect, Shape, Shared as _};
    use crate::any::TypeInfo;

    use std::{
        any::Any,
        collections::{BTreeMap, HashMap},
        sync::Arc,
    };

    struct Config;

    #[test]
    fn test_kinds() {
        assert_eq!(Arc::<Config>::shape().kind_name(), "shared");
        assert_eq!(Option::<Arc<Config>>::shape().kind_name(), "shared");
        assert_eq!(Vec::<Arc<Config>>::shape().kind_name(), "sequence");
        assert_eq!(BTreeMap::<String, Arc<Config>>::shape().kind_name(), "mapping");
        assert_eq!(HashMap::<String, Vec<Arc<Config>>>::shape().kind_name(), "mapping");
        assert_eq!(String::shape().kind_name(), "scalar");
        assert_eq!(<()>::shape().kind_name(), "unit");
    }

    #[test]
    fn test_nullable_shares_key() {
        let Kind::Shared(plain) = Arc::<Config>::shape().kind else {
            panic!("expected shared kind");
        };
        let Kind::Shared(nullable) = Option::<Arc<Config>>::shape().kind else {
            panic!("expected shared kind");
        };

        assert_eq!(plain.key, nullable.key);
        assert_eq!(plain.key, TypeInfo::of::<Arc<Config>>());
        assert!(plain.zero.is_none());
        assert!(nullable.zero.is_some());
    }

    #[test]
    fn test_shared_identity() {
        let config = Arc::new(Config);
        let stored = config.clone().into_stored();
        let loaded = Arc::<Config>::from_stored(&stored).unwrap();

        assert!(Arc::ptr_eq(&config, &loaded));
    }

    #[test]
    fn test_nullable_skips_none() {
        let Kind::Shared(nullable) = Option::<Arc<Config>>::shape().kind else {
            panic!("expected shared kind");
        };

        assert!((nullable.store)(Box::new(None::<Arc<Config>>)).is_none());
        assert!((nullable.store)(Box::new(Some(Arc::new(Config)))).is_some());
    }

    #[test]
    fn test_sequence_round() {
        let shape = Vec::<Arc<Config>>::shape();
        let Kind::Sequence(sequence) = &shape.kind else {
            panic!("expected sequence kind");
        };

        let first = Arc::new(Config);
        let items = (sequence.explode)(Box::new(vec![first.clone(), Arc::new(Config)]));
        assert_eq!(items.len(), 2);

        let collected = (sequence.collect)(items).unwrap().downcast::<Vec<Arc<Config>>>().unwrap();
        assert!(Arc::ptr_eq(&collected[0], &first));
    }

    #[test]
    fn test_assign() {
        let shape = Shape::shared::<Arc<Config>>();
        let mut slot = Arc::new(Config);
        let replacement = Arc::new(Config);

        assert!((shape.assign)(&mut slot as &mut dyn Any, Box::new(replacement.clone())));
        assert!(Arc::ptr_eq(&slot, &replacement));
        assert!(!(shape.assign)(&mut slot as &mut dyn Any, Box::new(1u8)));
    }
}
