//! Macros for defining integer row id types.

/// Macro to define a typed id around an `i64` row id.
///
/// This generates a newtype with:
/// - `new()` / `value()` accessors
/// - `Display` and `FromStr` (plain decimal)
/// - `From<i64>` in both directions
/// - transparent `Serialize` and `Deserialize` as a number
///
/// # Example
///
/// ```ignore
/// define_row_id!(ImageId);
///
/// let id = ImageId::new(12);
/// assert_eq!(id.to_string(), "12");
/// ```
#[macro_export]
macro_rules! define_row_id {
    ($name:ident) => {
        /// A typed row id assigned by the metadata store.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(i64);

        impl $name {
            /// Creates an id from a raw row id.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the underlying row id.
            #[must_use]
            pub const fn value(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.is_empty() {
                    return Err($crate::IdError::Empty);
                }
                if !s.bytes().all(|b| b.is_ascii_digit()) {
                    return Err($crate::IdError::InvalidId {
                        value: s.to_string(),
                    });
                }
                s.parse::<i64>()
                    .map(Self)
                    .map_err(|_| $crate::IdError::InvalidId {
                        value: s.to_string(),
                    })
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_i64(self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let id = i64::deserialize(deserializer)?;
                Ok(Self(id))
            }
        }
    };
}
