//! Newtype IDs for Shopify global identifiers.
//!
//! Shopify identifies every object with an opaque global id string such as
//! `gid://shopify/ProductVariant/42`. Use the `define_gid!` macro to create
//! type-safe wrappers that prevent accidentally mixing a cart line id with a
//! variant id.

/// Macro to define a type-safe Shopify id wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`, `is_blank()`
/// - `From<String>`, `From<&str>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use chargecart_core::define_gid;
/// define_gid!(OrderGid);
/// define_gid!(CustomerGid);
///
/// let order = OrderGid::new("gid://shopify/Order/1");
/// let customer = CustomerGid::new("gid://shopify/Customer/1");
///
/// // These are different types, so this won't compile:
/// // let _: OrderGid = customer;
/// assert_eq!(order.as_str(), "gid://shopify/Order/1");
/// ```
#[macro_export]
macro_rules! define_gid {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new id from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the id as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the id and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }

            /// Whether the id is empty or whitespace only.
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_gid!(ProductId);
define_gid!(VariantId);
define_gid!(CartId);
define_gid!(LineId);
