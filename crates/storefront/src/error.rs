//! Cart operation errors with Sentry integration.
//!
//! Store operations return [`CartError`]. Failures are reported as Sentry
//! breadcrumbs so the trail of cart actions shows up on any later event.

use thiserror::Error;

use crate::cart::remote::RemoteError;

/// Error returned by cart store operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Malformed input, rejected before any remote call.
    #[error("Invalid cart input: {0}")]
    Validation(String),

    /// The remote cart could not be updated.
    #[error("Cart service unavailable: {0}")]
    RemoteUnavailable(#[source] RemoteError),
}

impl CartError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

/// Add a breadcrumb for cart actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("variant_id", "gid://shopify/ProductVariant/1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
