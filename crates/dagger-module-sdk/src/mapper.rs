//! Native type to engine type definition mapping.

use crate::error::MappingError;
use crate::native::NativeType;
use dagger_module_core::TypeDescriptor;

/// Map a native type to its engine descriptor.
///
/// Returns the descriptor together with whether the native type was
/// nullable. The descriptor's own `optional` flag is only set for void;
/// callers decide optionality from the returned flag and their own rules.
pub fn map_type(native: &NativeType) -> Result<(TypeDescriptor, bool), MappingError> {
    let (inner, nullable) = match native {
        NativeType::Nullable(inner) => (inner.as_ref(), true),
        other => (other, false),
    };

    let descriptor = match inner {
        NativeType::String => TypeDescriptor::string(),
        NativeType::Int(_) => TypeDescriptor::integer(),
        NativeType::Float(_) => TypeDescriptor::float(),
        NativeType::Bool => TypeDescriptor::boolean(),
        NativeType::Scalar(name) => TypeDescriptor::scalar(name.clone()),
        NativeType::Enum(name) => TypeDescriptor::enumeration(name.clone()),
        NativeType::Remote(name) | NativeType::Object(name) => TypeDescriptor::object(name.clone()),
        NativeType::Json => TypeDescriptor::scalar("JSON"),
        NativeType::Void => TypeDescriptor::void().with_optional(true),
        NativeType::List(element) => {
            let (element, _) = map_type(element)?;
            TypeDescriptor::list_of(element)
        }
        NativeType::Nullable(_) => return map_type(inner),
        NativeType::Map(_) | NativeType::CancellationToken | NativeType::Unsupported(_) => {
            return Err(MappingError::unsupported(native.to_string()));
        }
    };

    Ok((descriptor, nullable))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{FloatWidth, IntWidth, NativeTyped};
    use dagger_module_core::TypeDefKind;
    use rstest::rstest;

    #[rstest]
    #[case(NativeType::Int(IntWidth::I8))]
    #[case(NativeType::Int(IntWidth::U16))]
    #[case(NativeType::Int(IntWidth::I64))]
    fn test_every_integer_width_is_integer(#[case] native: NativeType) {
        let (ty, nullable) = map_type(&native).unwrap();
        assert_eq!(ty, TypeDescriptor::integer());
        assert!(!nullable);
    }

    #[test]
    fn test_nullable_is_reported_not_applied() {
        let (ty, nullable) = map_type(&<Option<String>>::native_type()).unwrap();
        assert_eq!(ty, TypeDescriptor::string());
        assert!(nullable);
    }

    #[test]
    fn test_list_drops_element_nullability() {
        let native = NativeType::list_of(NativeType::nullable(NativeType::Float(FloatWidth::F32)));
        let (ty, _) = map_type(&native).unwrap();
        assert_eq!(ty, TypeDescriptor::list_of(TypeDescriptor::float()));
    }

    #[test]
    fn test_void_is_forced_optional() {
        let (ty, nullable) = map_type(&NativeType::Void).unwrap();
        assert_eq!(ty.kind, TypeDefKind::Void);
        assert!(ty.optional);
        assert!(!nullable);
    }

    #[test]
    fn test_json_is_named_scalar() {
        let (ty, _) = map_type(&NativeType::Json).unwrap();
        assert_eq!(ty, TypeDescriptor::scalar("JSON"));
    }

    #[test]
    fn test_remote_and_module_objects_are_objects() {
        let (remote, _) = map_type(&NativeType::Remote("Container".into())).unwrap();
        let (local, _) = map_type(&NativeType::Object("Test".into())).unwrap();
        assert_eq!(remote, TypeDescriptor::object("Container"));
        assert_eq!(local, TypeDescriptor::object("Test"));
    }

    #[rstest]
    #[case(NativeType::Map(Box::new(NativeType::String)))]
    #[case(NativeType::CancellationToken)]
    #[case(NativeType::Unsupported("Socket".into()))]
    #[case(NativeType::list_of(NativeType::Unsupported("Socket".into())))]
    fn test_unsupported_types_fail(#[case] native: NativeType) {
        let err = map_type(&native).unwrap_err();
        assert!(err.to_string().starts_with("Unsupported type:"));
    }
}
