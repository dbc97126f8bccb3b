//! GraphQL documents and raw response shapes for the Shopify Storefront API.
//!
//! Each operation lives in its own module with a `QUERY` document, an
//! `OPERATION_NAME`, serializable `Variables` and a deserializable
//! `ResponseData`, mirroring the layout `graphql_client` generates.

use chargecart_core::{CartId, LineId, Money, ProductId, SelectedOption, VariantId};
use graphql_client::QueryBody;
use serde::{Deserialize, Serialize};

/// Selection set shared by every cart query and mutation.
macro_rules! cart_fields {
    () => {
        r"
fragment CartFields on Cart {
  id
  checkoutUrl
  totalQuantity
  cost {
    subtotalAmount { amount currencyCode }
    totalAmount { amount currencyCode }
  }
  lines(first: 100) {
    edges {
      node {
        id
        quantity
        cost {
          amountPerQuantity { amount currencyCode }
          totalAmount { amount currencyCode }
        }
        merchandise {
          ... on ProductVariant {
            id
            title
            availableForSale
            price { amount currencyCode }
            selectedOptions { name value }
            image { url altText }
            product {
              id
              handle
              title
              tags
              featuredImage { url altText }
            }
          }
        }
      }
    }
  }
}
"
    };
}

/// Build a request body for an operation module.
pub fn build_query<V: Serialize>(
    query: &'static str,
    operation_name: &'static str,
    variables: V,
) -> QueryBody<V> {
    QueryBody {
        variables,
        query,
        operation_name,
    }
}

// =============================================================================
// Shared raw shapes
// =============================================================================

/// Relay connection wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
}

/// Relay edge wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct Edge<T> {
    pub node: T,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawImage {
    pub url: String,
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCartCost {
    pub subtotal_amount: Money,
    pub total_amount: Money,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCartLineCost {
    pub amount_per_quantity: Money,
    pub total_amount: Money,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMerchandiseProduct {
    pub id: ProductId,
    pub handle: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub featured_image: Option<RawImage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMerchandise {
    pub id: VariantId,
    pub title: String,
    pub available_for_sale: bool,
    pub price: Money,
    #[serde(default)]
    pub selected_options: Vec<SelectedOption>,
    pub image: Option<RawImage>,
    pub product: RawMerchandiseProduct,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCartLine {
    pub id: LineId,
    pub quantity: i64,
    pub cost: RawCartLineCost,
    pub merchandise: RawMerchandise,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCart {
    pub id: CartId,
    pub checkout_url: String,
    pub total_quantity: i64,
    pub cost: RawCartCost,
    pub lines: Connection<RawCartLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUserError {
    pub code: Option<String>,
    pub field: Option<Vec<String>>,
    pub message: String,
}

/// Payload shared by every cart mutation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartMutationPayload {
    pub cart: Option<RawCart>,
    #[serde(default)]
    pub user_errors: Vec<RawUserError>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineInput {
    pub merchandise_id: VariantId,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartLineUpdateInput {
    pub id: LineId,
    pub quantity: i64,
}

// =============================================================================
// Product queries
// =============================================================================

pub mod get_product_by_handle {
    use super::{Connection, Deserialize, Money, ProductId, RawImage, SelectedOption, Serialize, VariantId};

    pub const OPERATION_NAME: &str = "GetProductByHandle";
    pub const QUERY: &str = r"
query GetProductByHandle($handle: String!) {
  product(handle: $handle) {
    id
    handle
    title
    description
    productType
    tags
    featuredImage { url altText }
    variants(first: 25) {
      edges {
        node {
          id
          title
          availableForSale
          price { amount currencyCode }
          compareAtPrice { amount currencyCode }
          selectedOptions { name value }
          image { url altText }
        }
      }
    }
  }
}
";

    #[derive(Debug, Clone, Serialize)]
    pub struct Variables {
        pub handle: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ResponseData {
        pub product: Option<RawProduct>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RawProduct {
        pub id: ProductId,
        pub handle: String,
        pub title: String,
        #[serde(default)]
        pub description: String,
        #[serde(default)]
        pub product_type: String,
        #[serde(default)]
        pub tags: Vec<String>,
        pub featured_image: Option<RawImage>,
        pub variants: Connection<RawVariant>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RawVariant {
        pub id: VariantId,
        pub title: String,
        pub available_for_sale: bool,
        pub price: Money,
        pub compare_at_price: Option<Money>,
        #[serde(default)]
        pub selected_options: Vec<SelectedOption>,
        pub image: Option<RawImage>,
    }
}

// =============================================================================
// Cart operations
// =============================================================================

pub mod get_cart {
    use super::{CartId, Deserialize, RawCart, Serialize};

    pub const OPERATION_NAME: &str = "GetCart";
    pub const QUERY: &str = concat!(
        r"
query GetCart($cartId: ID!) {
  cart(id: $cartId) { ...CartFields }
}
",
        cart_fields!()
    );

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub cart_id: CartId,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ResponseData {
        pub cart: Option<RawCart>,
    }
}

pub mod create_cart {
    use super::{CartLineInput, CartMutationPayload, Deserialize, Serialize};

    pub const OPERATION_NAME: &str = "CreateCart";
    pub const QUERY: &str = concat!(
        r"
mutation CreateCart($input: CartInput!) {
  cartCreate(input: $input) {
    cart { ...CartFields }
    userErrors { code field message }
  }
}
",
        cart_fields!()
    );

    #[derive(Debug, Clone, Serialize)]
    pub struct Variables {
        pub input: CartInput,
    }

    #[derive(Debug, Clone, Serialize)]
    pub struct CartInput {
        pub lines: Vec<CartLineInput>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub cart_create: Option<CartMutationPayload>,
    }
}

pub mod add_to_cart {
    use super::{CartId, CartLineInput, CartMutationPayload, Deserialize, Serialize};

    pub const OPERATION_NAME: &str = "AddToCart";
    pub const QUERY: &str = concat!(
        r"
mutation AddToCart($cartId: ID!, $lines: [CartLineInput!]!) {
  cartLinesAdd(cartId: $cartId, lines: $lines) {
    cart { ...CartFields }
    userErrors { code field message }
  }
}
",
        cart_fields!()
    );

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub cart_id: CartId,
        pub lines: Vec<CartLineInput>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub cart_lines_add: Option<CartMutationPayload>,
    }
}

pub mod update_cart_lines {
    use super::{CartId, CartLineUpdateInput, CartMutationPayload, Deserialize, Serialize};

    pub const OPERATION_NAME: &str = "UpdateCartLines";
    pub const QUERY: &str = concat!(
        r"
mutation UpdateCartLines($cartId: ID!, $lines: [CartLineUpdateInput!]!) {
  cartLinesUpdate(cartId: $cartId, lines: $lines) {
    cart { ...CartFields }
    userErrors { code field message }
  }
}
",
        cart_fields!()
    );

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub cart_id: CartId,
        pub lines: Vec<CartLineUpdateInput>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub cart_lines_update: Option<CartMutationPayload>,
    }
}

pub mod remove_from_cart {
    use super::{CartId, CartMutationPayload, Deserialize, LineId, Serialize};

    pub const OPERATION_NAME: &str = "RemoveFromCart";
    pub const QUERY: &str = concat!(
        r"
mutation RemoveFromCart($cartId: ID!, $lineIds: [ID!]!) {
  cartLinesRemove(cartId: $cartId, lineIds: $lineIds) {
    cart { ...CartFields }
    userErrors { code field message }
  }
}
",
        cart_fields!()
    );

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Variables {
        pub cart_id: CartId,
        pub line_ids: Vec<LineId>,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ResponseData {
        pub cart_lines_remove: Option<CartMutationPayload>,
    }
}
