//! Declaration macros for module types.

/// Mark a struct as a module object so it can be registered, passed as an
/// argument and returned from functions.
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct Test {
///     name: String,
/// }
///
/// dagger_module_sdk::module_object!(Test);
/// ```
#[macro_export]
macro_rules! module_object {
    ($ty:ident) => {
        $crate::module_object!($ty => stringify!($ty));
    };
    ($ty:ty => $name:expr) => {
        impl $crate::native::ModuleObject for $ty {
            const NAME: &'static str = $name;
        }

        impl $crate::native::NativeTyped for $ty {
            fn native_type() -> $crate::native::NativeType {
                $crate::native::NativeType::Object($name.to_string())
            }
        }

        impl $crate::native::IntoNative for $ty {
            fn into_native(self) -> $crate::native::Native {
                $crate::native::Native::Object($crate::native::ObjectValue::new($name, self))
            }
        }

        impl $crate::native::FromNative for $ty {
            fn from_native(
                value: $crate::native::Native,
            ) -> ::std::result::Result<Self, $crate::error::ConvertError> {
                match value {
                    $crate::native::Native::Object(object) => {
                        object.downcast::<$ty>().map_err(|object| {
                            $crate::error::ConvertError::mismatch($name, object.type_name())
                        })
                    }
                    other => Err($crate::error::ConvertError::mismatch($name, other.kind())),
                }
            }
        }
    };
}

/// Define a module enum.
///
/// The member identifiers are the names registered with the engine; they
/// are not case converted.
///
/// ```rust,ignore
/// dagger_module_sdk::module_enum! {
///     /// Deployment status
///     pub enum Status {
///         ACTIVE,
///         INACTIVE,
///     }
/// }
/// ```
#[macro_export]
macro_rules! module_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$member_meta:meta])* $member:ident),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[allow(non_camel_case_types, clippy::upper_case_acronyms)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($(#[$member_meta])* $member),*
        }

        impl $crate::native::ModuleEnum for $name {
            const NAME: &'static str = stringify!($name);

            fn members() -> &'static [Self] {
                &[$($name::$member),*]
            }

            fn member_name(self) -> &'static str {
                match self {
                    $($name::$member => stringify!($member)),*
                }
            }
        }

        impl $crate::native::NativeTyped for $name {
            fn native_type() -> $crate::native::NativeType {
                $crate::native::NativeType::Enum(stringify!($name).to_string())
            }
        }

        impl $crate::native::IntoNative for $name {
            fn into_native(self) -> $crate::native::Native {
                $crate::native::Native::Enum {
                    type_name: stringify!($name).to_string(),
                    member: <$name as $crate::native::ModuleEnum>::member_name(self).to_string(),
                }
            }
        }

        impl $crate::native::FromNative for $name {
            fn from_native(
                value: $crate::native::Native,
            ) -> ::std::result::Result<Self, $crate::error::ConvertError> {
                match value {
                    $crate::native::Native::Enum { member, .. } => {
                        <$name as $crate::native::ModuleEnum>::from_member_name(&member)
                            .ok_or_else(|| {
                                $crate::error::ConvertError::mismatch(stringify!($name), member)
                            })
                    }
                    other => Err($crate::error::ConvertError::mismatch(
                        stringify!($name),
                        other.kind(),
                    )),
                }
            }
        }
    };
}

/// Define an opaque scalar: a string newtype registered as a named scalar.
#[macro_export]
macro_rules! module_scalar {
    ($(#[$meta:meta])* $vis:vis $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        $vis struct $name(pub String);

        impl $crate::native::NativeTyped for $name {
            fn native_type() -> $crate::native::NativeType {
                $crate::native::NativeType::Scalar(stringify!($name).to_string())
            }
        }

        impl $crate::native::IntoNative for $name {
            fn into_native(self) -> $crate::native::Native {
                $crate::native::Native::Scalar {
                    type_name: stringify!($name).to_string(),
                    value: self.0,
                }
            }
        }

        impl $crate::native::FromNative for $name {
            fn from_native(
                value: $crate::native::Native,
            ) -> ::std::result::Result<Self, $crate::error::ConvertError> {
                match value {
                    $crate::native::Native::Scalar { value, .. } => Ok($name(value)),
                    $crate::native::Native::String(value) => Ok($name(value)),
                    other => Err($crate::error::ConvertError::mismatch(
                        stringify!($name),
                        other.kind(),
                    )),
                }
            }
        }
    };
}

/// Define a handle on an engine-side object type.
///
/// Values of these types cross the wire by ID only.
#[macro_export]
macro_rules! remote_object {
    ($(#[$meta:meta])* $vis:vis $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        $vis struct $name {
            handle: $crate::ObjectHandle,
        }

        impl $name {
            /// Wrap an existing handle.
            pub fn from_id(id: impl Into<String>) -> Self {
                Self {
                    handle: $crate::ObjectHandle::new(stringify!($name), $crate::ObjectId::new(id)),
                }
            }

            pub fn handle(&self) -> &$crate::ObjectHandle {
                &self.handle
            }

            pub fn id(&self) -> &$crate::ObjectId {
                &self.handle.id
            }
        }

        impl $crate::native::NativeTyped for $name {
            fn native_type() -> $crate::native::NativeType {
                $crate::native::NativeType::Remote(stringify!($name).to_string())
            }
        }

        impl $crate::native::IntoNative for $name {
            fn into_native(self) -> $crate::native::Native {
                $crate::native::Native::Remote(self.handle)
            }
        }

        impl $crate::native::FromNative for $name {
            fn from_native(
                value: $crate::native::Native,
            ) -> ::std::result::Result<Self, $crate::error::ConvertError> {
                match value {
                    $crate::native::Native::Remote(handle)
                        if handle.type_name == stringify!($name) =>
                    {
                        Ok(Self { handle })
                    }
                    $crate::native::Native::Remote(handle) => {
                        Err($crate::error::ConvertError::mismatch(
                            stringify!($name),
                            handle.type_name,
                        ))
                    }
                    other => Err($crate::error::ConvertError::mismatch(
                        stringify!($name),
                        other.kind(),
                    )),
                }
            }
        }
    };
}

/// Generate the process entry point for a module.
///
/// ```rust,ignore
/// dagger_module_sdk::export_module!(my_module::module());
/// ```
#[macro_export]
macro_rules! export_module {
    ($module:expr) => {
        fn main() -> ::std::process::ExitCode {
            $crate::run($module)
        }
    };
}
