use std::{
    borrow::Cow,
    fmt::{self, Display, Formatter},
};

use crate::{
    any::TypeInfo,
    reflect::{Field, Kind, Shape},
};

/// Group of every value that wasn't stored under an explicit label
pub const DEFAULT_GROUP: &str = "default";

/// How a parameter or an output relates to the object store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Multiplicity {
    /// Last value of the group, `Arc<T>` or `Option<Arc<T>>`
    Singular,
    /// Every value of the group, `Vec<Arc<T>>`
    Listed,
    /// Last value of every group, `BTreeMap<String, Arc<T>>`
    Keyed,
    /// Every value of every group, `BTreeMap<String, Vec<Arc<T>>>`
    KeyedList,
}

impl Display for Multiplicity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Singular => "singular",
            Self::Listed => "listed",
            Self::Keyed => "keyed",
            Self::KeyedList => "keyed list",
        })
    }
}

/// Key a value is resolved or stored under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub type_info: TypeInfo,
    pub multiplicity: Multiplicity,
    pub group: Cow<'static, str>,
}

impl Dependency {
    #[inline]
    #[must_use]
    pub const fn new(type_info: TypeInfo, multiplicity: Multiplicity) -> Self {
        Self {
            type_info,
            multiplicity,
            group: Cow::Borrowed(DEFAULT_GROUP),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_group(mut self, group: impl Into<Cow<'static, str>>) -> Self {
        self.group = group.into();
        self
    }
}

impl Display for Dependency {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, group `{}`)", self.type_info, self.multiplicity, self.group)
    }
}

/// Descriptor of a provider parameter or a resolution request
#[derive(Debug, Clone)]
pub(crate) enum Input {
    Dependency(Dependency),
    /// Fresh record built field by field, unsupported untagged fields are left out
    Record { type_info: TypeInfo, fields: Vec<(&'static str, Input)> },
}

impl Input {
    pub(crate) fn derive(shape: &Shape, group: Cow<'static, str>) -> Result<Self, String> {
        let Kind::Record(record) = &shape.kind else {
            return dependency(shape, group).map(Self::Dependency);
        };

        let mut fields = Vec::with_capacity(record.fields.len());
        for field in &record.fields {
            match &field.shape.kind {
                Kind::Scalar { .. } | Kind::Unit if field.is_tagged() => {
                    return Err(unsupported_field(shape, field));
                }
                Kind::Scalar { .. } | Kind::Unit => {}
                _ => {
                    let input = Self::derive(&field.shape, field_group(field))
                        .map_err(|message| format!("field `{}` of {}: {message}", field.name, shape.type_info))?;
                    fields.push((field.name, input));
                }
            }
        }

        Ok(Self::Record {
            type_info: shape.type_info,
            fields,
        })
    }

    /// Collects the store keys this input depends on
    pub(crate) fn keys(&self, keys: &mut Vec<TypeInfo>) {
        match self {
            Self::Dependency(dependency) => keys.push(dependency.type_info),
            Self::Record { fields, .. } => {
                for (_, input) in fields {
                    input.keys(keys);
                }
            }
        }
    }
}

/// Derives the keys a value of `shape` is stored under
pub(crate) fn outputs(shape: &Shape) -> Result<Vec<Dependency>, String> {
    let mut outputs = Vec::new();
    collect_outputs(shape, Cow::Borrowed(DEFAULT_GROUP), &mut outputs)?;
    if outputs.is_empty() {
        return Err(format!("{} doesn't provide any value", shape.type_info));
    }
    Ok(outputs)
}

fn collect_outputs(shape: &Shape, group: Cow<'static, str>, outputs: &mut Vec<Dependency>) -> Result<(), String> {
    match &shape.kind {
        Kind::Record(record) => {
            for field in &record.fields {
                match &field.shape.kind {
                    Kind::Scalar { .. } | Kind::Unit => return Err(unsupported_field(shape, field)),
                    _ => collect_outputs(&field.shape, field_group(field), outputs)
                        .map_err(|message| format!("field `{}` of {}: {message}", field.name, shape.type_info))?,
                }
            }
            Ok(())
        }
        _ => {
            outputs.push(dependency(shape, group)?);
            Ok(())
        }
    }
}

fn dependency(shape: &Shape, group: Cow<'static, str>) -> Result<Dependency, String> {
    let (key, multiplicity) = match &shape.kind {
        Kind::Shared(shared) => (shared.key, Multiplicity::Singular),
        Kind::Sequence(sequence) => match &sequence.elem.kind {
            Kind::Shared(shared) => (shared.key, Multiplicity::Listed),
            _ => {
                return Err(format!(
                    "{} must hold shared handles, found {} elements",
                    shape.type_info,
                    sequence.elem.kind_name()
                ))
            }
        },
        Kind::Mapping(mapping) => match &mapping.elem.kind {
            Kind::Shared(shared) => (shared.key, Multiplicity::Keyed),
            Kind::Sequence(sequence) => match &sequence.elem.kind {
                Kind::Shared(shared) => (shared.key, Multiplicity::KeyedList),
                _ => {
                    return Err(format!(
                        "{} must hold lists of shared handles, found {} elements",
                        shape.type_info,
                        sequence.elem.kind_name()
                    ))
                }
            },
            _ => {
                return Err(format!(
                    "{} must hold shared handles or lists of them, found {} values",
                    shape.type_info,
                    mapping.elem.kind_name()
                ))
            }
        },
        Kind::Record(_) => return Err(format!("{} is a record and can't be stored as one value", shape.type_info)),
        Kind::Scalar { .. } | Kind::Unit => {
            return Err(format!("{} has unsupported {} kind", shape.type_info, shape.kind_name()));
        }
    };

    Ok(Dependency {
        type_info: key,
        multiplicity,
        group,
    })
}

fn field_group(field: &Field) -> Cow<'static, str> {
    field.group.clone().unwrap_or(Cow::Borrowed(DEFAULT_GROUP))
}

fn unsupported_field(shape: &Shape, field: &Field) -> String {
    format!(
        "field `{}` of {} has unsupported {} kind",
        field.name,
        shape.type_info,
        field.shape.kind_name()
    )
}

/// Trims a group label, an empty label falls back to [`DEFAULT_GROUP`]
pub(crate) fn normalize_group(group: &str) -> Cow<'_, str> {
    let group = group.trim();
    if group.is_empty() {
        Cow::Borrowed(DEFAULT_GROUP)
    } else {
        Cow::Borrowed(group)
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_group, outputs, Input, Multiplicity, DEFAULT_GROUP};
    use crate::{
        any::TypeInfo,
        reflect::{Field, Reflect as _, Shape},
    };

    use std::{borrow::Cow, collections::BTreeMap, sync::Arc};

    struct Config;
    struct Listener;

    #[test]
    fn test_multiplicity_of_inputs() {
        let cases = [
            (Arc::<Config>::shape(), Multiplicity::Singular),
            (Option::<Arc<Config>>::shape(), Multiplicity::Singular),
            (Vec::<Arc<Config>>::shape(), Multiplicity::Listed),
            (BTreeMap::<String, Arc<Config>>::shape(), Multiplicity::Keyed),
            (BTreeMap::<String, Vec<Arc<Config>>>::shape(), Multiplicity::KeyedList),
        ];

        for (shape, multiplicity) in cases {
            let Input::Dependency(dependency) = Input::derive(&shape, Cow::Borrowed(DEFAULT_GROUP)).unwrap() else {
                panic!("expected dependency input");
            };
            assert_eq!(dependency.multiplicity, multiplicity);
            assert_eq!(dependency.type_info, TypeInfo::of::<Arc<Config>>());
        }
    }

    #[test]
    fn test_unsupported_inputs() {
        assert!(Input::derive(&String::shape(), Cow::Borrowed(DEFAULT_GROUP)).is_err());
        assert!(Input::derive(&Vec::<u8>::shape(), Cow::Borrowed(DEFAULT_GROUP)).is_err());
        assert!(Input::derive(&Vec::<Vec<Arc<Config>>>::shape(), Cow::Borrowed(DEFAULT_GROUP)).is_err());
        assert!(outputs(&<()>::shape()).is_err());
    }

    #[test]
    fn test_outputs_of_tagged_fields() {
        let shape = Shape::record::<Pair>(vec![
            Field::new::<Arc<Config>>("config"),
            Field::new::<Vec<Arc<Listener>>>("listeners").group("http"),
        ]);
        let outputs = outputs(&shape).unwrap();

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].group, DEFAULT_GROUP);
        assert_eq!(outputs[1].group, "http");
        assert_eq!(outputs[1].multiplicity, Multiplicity::Listed);
    }

    #[test]
    fn test_record_input_skips_scalars() {
        let shape = Shape::record::<Pair>(vec![Field::new::<Arc<Config>>("config"), Field::new::<u32>("retries")]);
        let Input::Record { fields, .. } = Input::derive(&shape, Cow::Borrowed(DEFAULT_GROUP)).unwrap() else {
            panic!("expected record input");
        };
        assert_eq!(fields.len(), 1);

        let tagged = Shape::record::<Pair>(vec![Field::new::<u32>("retries").group("http")]);
        assert!(Input::derive(&tagged, Cow::Borrowed(DEFAULT_GROUP)).is_err());
        assert!(outputs(&shape).is_err());
    }

    #[test]
    fn test_normalize_group() {
        assert_eq!(normalize_group("  http "), "http");
        assert_eq!(normalize_group("   "), DEFAULT_GROUP);
        assert_eq!(normalize_group(""), DEFAULT_GROUP);
    }

    // Stand-in record, shapes above are written by hand
    struct Pair;

    impl crate::reflect::Reflect for Pair {
        fn shape() -> Shape {
            Shape::record::<Self>(Vec::new())
        }
    }

    impl crate::reflect::Record for Pair {
        fn from_fields(_: &mut crate::reflect::FieldValues) -> Result<Self, crate::errors::Error> {
            Ok(Self)
        }

        fn into_fields(self) -> Vec<crate::reflect::AnyBox> {
            Vec::new()
        }

        fn field_mut(&mut self, _: usize) -> Option<&mut dyn std::any::Any> {
            None
        }
    }
}
