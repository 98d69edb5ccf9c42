//! Macros for reducing boilerplate when defining entities
//!
//! These macros generate the repetitive trait implementations needed
//! for each stored record type.

/// Complete macro to create a Data entity with automatic trait implementations
///
/// Generates the struct (base fields `id`, `type`, `createdAt`, `updatedAt`
/// plus the listed fields, serialized camelCase), the `Entity` and `Data`
/// impls and a `new(...)` constructor taking the listed fields in order.
///
/// Every listed field is reachable through `Data::field_value` under its
/// snake_case name, so list endpoints can filter on any of them.
///
/// # Example
///
/// ```rust,ignore
/// use campus::prelude::*;
///
/// impl_data_entity!(
///     Section,
///     "section",
///     ["class_id"],
///     {
///         name: String,
///         class_id: Uuid,
///         #[serde(default)]
///         capacity: Option<i32>,
///     }
/// );
///
/// let section = Section::new("A".to_string(), class_id, Some(40));
/// ```
#[macro_export]
macro_rules! impl_data_entity {
    (
        $type:ident,
        $type_name:expr,
        [ $( $indexed_field:expr ),* $(,)? ],
        {
            $( $(#[$field_attr:meta])* $specific_field:ident : $specific_type:ty ),* $(,)?
        }
    ) => {
        #[derive(Debug, Clone, ::serde::Serialize, ::serde::Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $type {
            /// Unique identifier for this entity
            pub id: ::uuid::Uuid,

            /// Type of the entity
            #[serde(rename = "type")]
            pub entity_type: String,

            /// When this entity was created
            pub created_at: ::chrono::DateTime<::chrono::Utc>,

            /// When this entity was last updated
            pub updated_at: ::chrono::DateTime<::chrono::Utc>,

            $( $(#[$field_attr])* pub $specific_field : $specific_type ),*
        }

        impl $crate::core::entity::Entity for $type {
            fn resource_name() -> &'static str {
                use std::sync::OnceLock;
                static PLURAL: OnceLock<String> = OnceLock::new();
                PLURAL.get_or_init(|| {
                    $crate::core::pluralize::Pluralizer::pluralize($type_name)
                }).as_str()
            }

            fn resource_name_singular() -> &'static str {
                $type_name
            }

            fn id(&self) -> ::uuid::Uuid {
                self.id
            }

            fn entity_type(&self) -> &str {
                &self.entity_type
            }

            fn created_at(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.created_at
            }

            fn updated_at(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.updated_at
            }

            fn touch(&mut self) {
                self.updated_at = ::chrono::Utc::now();
            }
        }

        impl $crate::core::entity::Data for $type {
            fn indexed_fields() -> &'static [&'static str] {
                &[ $( $indexed_field ),* ]
            }

            fn field_names() -> &'static [&'static str] {
                &["id", "created_at", "updated_at" $( , stringify!($specific_field) )* ]
            }

            fn field_value(&self, field: &str) -> Option<$crate::core::field::FieldValue> {
                use $crate::core::field::IntoFieldValue;
                match field {
                    "id" => return Some(self.id.to_field_value()),
                    "created_at" => return Some(self.created_at.to_field_value()),
                    "updated_at" => return Some(self.updated_at.to_field_value()),
                    _ => {}
                }
                $(
                    if field == stringify!($specific_field) {
                        return Some(self.$specific_field.to_field_value());
                    }
                )*
                None
            }
        }

        impl $type {
            /// Create a new instance of this entity with a fresh id and timestamps
            #[allow(clippy::too_many_arguments)]
            pub fn new($( $specific_field: $specific_type ),*) -> Self {
                let now = ::chrono::Utc::now();
                Self {
                    id: ::uuid::Uuid::new_v4(),
                    entity_type: $type_name.to_string(),
                    created_at: now,
                    updated_at: now,
                    $( $specific_field ),*
                }
            }
        }
    };
}

/// Define a string-valued status enum usable as an entity field
///
/// Generates serde (de)serialization using the wire names, `as_str()`,
/// `Display`, `FromStr` and an `IntoFieldValue` impl so the enum can be
/// filtered on like any other field.
///
/// # Example
///
/// ```rust,ignore
/// impl_field_enum!(
///     /// Invoice lifecycle
///     InvoiceStatus {
///         Pending => "pending",
///         Paid => "paid",
///     }
/// );
///
/// assert_eq!("paid".parse::<InvoiceStatus>()?, InvoiceStatus::Paid);
/// ```
#[macro_export]
macro_rules! impl_field_enum {
    (
        $(#[$enum_attr:meta])*
        $name:ident {
            $( $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$enum_attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant
            ),+
        }

        impl $name {
            /// Wire representation of this value
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $wire ),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::core::error::ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $wire => Ok($name::$variant), )+
                    other => Err($crate::core::error::ValidationError::field(
                        stringify!($name),
                        format!("unknown value '{}'", other),
                    )),
                }
            }
        }

        impl $crate::core::field::IntoFieldValue for $name {
            fn to_field_value(&self) -> $crate::core::field::FieldValue {
                $crate::core::field::FieldValue::String(self.as_str().to_string())
            }
        }
    };
}
