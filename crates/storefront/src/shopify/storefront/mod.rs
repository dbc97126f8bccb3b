//! Shopify Storefront API client implementation.
//!
//! Uses `graphql_client` envelopes with `reqwest` 0.13 for HTTP.
//! Caches products using `moka` (5-minute TTL).

mod backend;
mod conversions;
pub mod queries;

use std::sync::Arc;
use std::time::Duration;

use chargecart_core::{CartId, LineId};
use graphql_client::{QueryBody, Response};
use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::config::ShopifyStorefrontConfig;
use crate::shopify::types::{Cart, CartLineInput, CartLineUpdateInput, Product};
use crate::shopify::{GraphQLError, GraphQLErrorLocation, ShopifyError};

use conversions::{convert_cart, convert_product, convert_user_error};
use queries::{
    CartMutationPayload, add_to_cart, build_query, create_cart, get_cart, get_product_by_handle,
    remove_from_cart, update_cart_lines,
};

const PRODUCT_CACHE_TTL: Duration = Duration::from_secs(300);

// =============================================================================
// StorefrontClient
// =============================================================================

/// Client for the Shopify Storefront API.
///
/// Provides type-safe access to products and cart operations.
/// Products are cached for 5 minutes.
#[derive(Clone)]
pub struct StorefrontClient {
    inner: Arc<StorefrontClientInner>,
}

struct StorefrontClientInner {
    client: reqwest::Client,
    endpoint: String,
    access_token: SecretString,
    cache: Cache<String, Product>,
}

impl StorefrontClient {
    /// Create a new Storefront API client.
    ///
    /// `timeout` bounds each HTTP request.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &ShopifyStorefrontConfig, timeout: Duration) -> Result<Self, ShopifyError> {
        Self::with_endpoint(
            config.endpoint(),
            config.storefront_private_token.clone(),
            timeout,
        )
    }

    /// Create a client against an explicit GraphQL endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn with_endpoint(
        endpoint: impl Into<String>,
        access_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, ShopifyError> {
        let cache = Cache::builder()
            .max_capacity(200)
            .time_to_live(PRODUCT_CACHE_TTL)
            .build();

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            inner: Arc::new(StorefrontClientInner {
                client,
                endpoint: endpoint.into(),
                access_token,
                cache,
            }),
        })
    }

    /// Execute a GraphQL operation.
    async fn execute<V, D>(&self, body: QueryBody<V>) -> Result<D, ShopifyError>
    where
        V: Serialize,
        D: DeserializeOwned,
    {
        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            // Private access tokens use a different header than public tokens
            .header(
                "Shopify-Storefront-Private-Token",
                self.inner.access_token.expose_secret(),
            )
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ShopifyError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                operation = body.operation_name,
                body = %response_text.chars().take(500).collect::<String>(),
                "Shopify API returned non-success status"
            );
            return Err(ShopifyError::graphql(format!(
                "HTTP {status}: {}",
                response_text.chars().take(200).collect::<String>()
            )));
        }

        let response: Response<D> = serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                operation = body.operation_name,
                body = %response_text.chars().take(500).collect::<String>(),
                "Failed to parse Shopify GraphQL response"
            );
            ShopifyError::Parse(e)
        })?;

        if let Some(errors) = response.errors
            && !errors.is_empty()
        {
            debug!(errors = ?errors, "GraphQL errors in response");

            return Err(ShopifyError::GraphQL(
                errors
                    .into_iter()
                    .map(|e| GraphQLError {
                        message: e.message,
                        locations: e.locations.map_or_else(Vec::new, |locs| {
                            locs.into_iter()
                                .map(|l| GraphQLErrorLocation {
                                    line: i64::from(l.line),
                                    column: i64::from(l.column),
                                })
                                .collect()
                        }),
                        path: e.path.map_or_else(Vec::new, |p| {
                            p.into_iter()
                                .map(|fragment| match fragment {
                                    graphql_client::PathFragment::Key(s) => {
                                        serde_json::Value::String(s)
                                    }
                                    graphql_client::PathFragment::Index(i) => {
                                        serde_json::Value::Number(i.into())
                                    }
                                })
                                .collect()
                        }),
                    })
                    .collect(),
            ));
        }

        response.data.ok_or_else(|| {
            tracing::error!(
                operation = body.operation_name,
                "Shopify GraphQL response has no data and no errors"
            );
            ShopifyError::graphql("No data in response")
        })
    }

    // =========================================================================
    // Product Methods
    // =========================================================================

    /// Get a product by its handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found or the API request fails.
    #[instrument(skip(self), fields(handle = %handle))]
    pub async fn get_product_by_handle(&self, handle: &str) -> Result<Product, ShopifyError> {
        let cache_key = format!("product:{handle}");

        if let Some(product) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(product);
        }

        let data: get_product_by_handle::ResponseData = self
            .execute(build_query(
                get_product_by_handle::QUERY,
                get_product_by_handle::OPERATION_NAME,
                get_product_by_handle::Variables {
                    handle: handle.to_string(),
                },
            ))
            .await?;

        let product = data
            .product
            .map(convert_product)
            .ok_or_else(|| ShopifyError::NotFound(format!("Product not found: {handle}")))?;

        self.inner.cache.insert(cache_key, product.clone()).await;

        Ok(product)
    }

    // =========================================================================
    // Cart Methods (not cached - mutable state)
    // =========================================================================

    /// Create a new cart, optionally seeded with lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart creation fails or user errors are returned.
    #[instrument(skip(self, lines), fields(line_count = lines.len()))]
    pub async fn create_cart(&self, lines: Vec<CartLineInput>) -> Result<Cart, ShopifyError> {
        let data: create_cart::ResponseData = self
            .execute(build_query(
                create_cart::QUERY,
                create_cart::OPERATION_NAME,
                create_cart::Variables {
                    input: create_cart::CartInput {
                        lines: lines.into_iter().map(raw_line_input).collect(),
                    },
                },
            ))
            .await?;

        take_cart(data.cart_create, "create cart")
    }

    /// Get an existing cart.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::NotFound` if the cart has expired, or an error
    /// if the API request fails.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn get_cart(&self, cart_id: &CartId) -> Result<Cart, ShopifyError> {
        let data: get_cart::ResponseData = self
            .execute(build_query(
                get_cart::QUERY,
                get_cart::OPERATION_NAME,
                get_cart::Variables {
                    cart_id: cart_id.clone(),
                },
            ))
            .await?;

        data.cart
            .map(convert_cart)
            .ok_or_else(|| ShopifyError::NotFound(format!("Cart not found: {cart_id}")))
    }

    /// Add lines to a cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart update fails or user errors are returned.
    #[instrument(skip(self, lines), fields(cart_id = %cart_id, line_count = lines.len()))]
    pub async fn add_to_cart(
        &self,
        cart_id: &CartId,
        lines: Vec<CartLineInput>,
    ) -> Result<Cart, ShopifyError> {
        let data: add_to_cart::ResponseData = self
            .execute(build_query(
                add_to_cart::QUERY,
                add_to_cart::OPERATION_NAME,
                add_to_cart::Variables {
                    cart_id: cart_id.clone(),
                    lines: lines.into_iter().map(raw_line_input).collect(),
                },
            ))
            .await?;

        take_cart(data.cart_lines_add, "add to cart")
    }

    /// Update cart line quantities.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart update fails or user errors are returned.
    #[instrument(skip(self, lines), fields(cart_id = %cart_id))]
    pub async fn update_cart(
        &self,
        cart_id: &CartId,
        lines: Vec<CartLineUpdateInput>,
    ) -> Result<Cart, ShopifyError> {
        let data: update_cart_lines::ResponseData = self
            .execute(build_query(
                update_cart_lines::QUERY,
                update_cart_lines::OPERATION_NAME,
                update_cart_lines::Variables {
                    cart_id: cart_id.clone(),
                    lines: lines
                        .into_iter()
                        .map(|line| queries::CartLineUpdateInput {
                            id: line.id,
                            quantity: line.quantity,
                        })
                        .collect(),
                },
            ))
            .await?;

        take_cart(data.cart_lines_update, "update cart")
    }

    /// Remove lines from a cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart update fails or user errors are returned.
    #[instrument(skip(self, line_ids), fields(cart_id = %cart_id))]
    pub async fn remove_from_cart(
        &self,
        cart_id: &CartId,
        line_ids: Vec<LineId>,
    ) -> Result<Cart, ShopifyError> {
        let data: remove_from_cart::ResponseData = self
            .execute(build_query(
                remove_from_cart::QUERY,
                remove_from_cart::OPERATION_NAME,
                remove_from_cart::Variables {
                    cart_id: cart_id.clone(),
                    line_ids,
                },
            ))
            .await?;

        take_cart(data.cart_lines_remove, "remove from cart")
    }
}

fn raw_line_input(line: CartLineInput) -> queries::CartLineInput {
    queries::CartLineInput {
        merchandise_id: line.merchandise_id,
        quantity: line.quantity,
    }
}

/// Unwrap a cart mutation payload, surfacing user errors.
///
/// A user error on `cartId` reporting a missing cart becomes `NotFound` so
/// callers can recreate the cart.
fn take_cart(payload: Option<CartMutationPayload>, action: &str) -> Result<Cart, ShopifyError> {
    let Some(payload) = payload else {
        return Err(ShopifyError::graphql(format!("Failed to {action}")));
    };

    if !payload.user_errors.is_empty() {
        let errors: Vec<_> = payload
            .user_errors
            .into_iter()
            .map(convert_user_error)
            .collect();

        if errors.iter().any(|e| e.is_missing_cart()) {
            return Err(ShopifyError::NotFound("Cart not found".to_string()));
        }

        return Err(ShopifyError::UserError(
            errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; "),
        ));
    }

    payload
        .cart
        .map(convert_cart)
        .ok_or_else(|| ShopifyError::graphql(format!("Failed to {action}")))
}
