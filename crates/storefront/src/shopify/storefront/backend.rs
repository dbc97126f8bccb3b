//! `CatalogSource` and `CartBackend` over the Storefront API.

use chargecart_core::{CartId, LineId, Money};
use rust_decimal::Decimal;

use crate::cart::remote::{
    CartBackend, CatalogProduct, CatalogSource, CatalogVariant, LineInput, RemoteCart,
    RemoteError, RemoteLine,
};
use crate::shopify::types::{Cart, CartLine, CartLineInput, CartLineUpdateInput, Product};
use crate::shopify::ShopifyError;

use super::StorefrontClient;

impl From<ShopifyError> for RemoteError {
    fn from(error: ShopifyError) -> Self {
        match error {
            ShopifyError::NotFound(message) => Self::NotFound(message),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

impl CatalogSource for StorefrontClient {
    async fn fetch_product_by_handle(
        &self,
        handle: &str,
    ) -> Result<Option<CatalogProduct>, RemoteError> {
        match self.get_product_by_handle(handle).await {
            Ok(product) => Ok(Some(catalog_product(&product))),
            Err(ShopifyError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl CartBackend for StorefrontClient {
    async fn create_cart(&self, lines: &[LineInput]) -> Result<RemoteCart, RemoteError> {
        let cart = StorefrontClient::create_cart(self, line_inputs(lines)).await?;
        Ok(remote_cart(cart))
    }

    async fn add_lines(
        &self,
        cart_id: &CartId,
        lines: &[LineInput],
    ) -> Result<RemoteCart, RemoteError> {
        let cart = self.add_to_cart(cart_id, line_inputs(lines)).await?;
        Ok(remote_cart(cart))
    }

    async fn update_line(
        &self,
        cart_id: &CartId,
        line_id: &LineId,
        quantity: u32,
    ) -> Result<RemoteCart, RemoteError> {
        let cart = self
            .update_cart(
                cart_id,
                vec![CartLineUpdateInput {
                    id: line_id.clone(),
                    quantity: i64::from(quantity),
                }],
            )
            .await?;
        Ok(remote_cart(cart))
    }

    async fn remove_line(
        &self,
        cart_id: &CartId,
        line_id: &LineId,
    ) -> Result<RemoteCart, RemoteError> {
        let cart = self.remove_from_cart(cart_id, vec![line_id.clone()]).await?;
        Ok(remote_cart(cart))
    }

    async fn get_cart(&self, cart_id: &CartId) -> Result<RemoteCart, RemoteError> {
        let cart = StorefrontClient::get_cart(self, cart_id).await?;
        Ok(remote_cart(cart))
    }
}

fn line_inputs(lines: &[LineInput]) -> Vec<CartLineInput> {
    lines
        .iter()
        .map(|line| CartLineInput {
            merchandise_id: line.variant_id.clone(),
            quantity: i64::from(line.quantity),
        })
        .collect()
}

fn catalog_product(product: &Product) -> CatalogProduct {
    CatalogProduct {
        product: product.to_ref(),
        variants: product
            .variants
            .iter()
            .map(|v| CatalogVariant {
                id: v.id.clone(),
                title: v.title.clone(),
                price: v.price,
                compare_at_price: v.compare_at_price,
                available_for_sale: v.available_for_sale,
                selected_options: v.selected_options.clone(),
            })
            .collect(),
    }
}

fn remote_cart(cart: Cart) -> RemoteCart {
    RemoteCart {
        id: cart.id,
        checkout_url: cart.checkout_url,
        lines: cart.lines.into_iter().filter_map(remote_line).collect(),
    }
}

/// Lines with a non-positive quantity are dropped.
fn remote_line(line: CartLine) -> Option<RemoteLine> {
    let quantity = u32::try_from(line.quantity).ok().filter(|q| *q > 0)?;
    let product = line.merchandise.product_ref();

    // Discounted total spread over the units; the total itself is kept
    // exact for line and cart totals
    let total = line.cost.total_amount;
    let unit_price = Money::new(
        (total.amount / Decimal::from(quantity)).round_dp(2),
        total.currency_code,
    );

    Some(RemoteLine {
        id: line.id,
        variant_id: line.merchandise.id,
        quantity,
        unit_price,
        line_total: total,
        available_for_sale: line.merchandise.available_for_sale,
        variant_title: line.merchandise.title,
        product,
        selected_options: line.merchandise.selected_options,
    })
}
