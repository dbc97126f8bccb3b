//! Cart commands.
//!
//! Every command works on the cart persisted under `CHARGECART_STATE_DIR`,
//! so consecutive invocations see the same cart.

use chargecart_core::{BundleTier, CableType, VariantId};
use chargecart_storefront::cart::{AddItemInput, CatalogSource};
use chargecart_storefront::upsell::{FreeAccessory, detect_bundle_tier, free_accessory_offer};
use tracing::warn;

use super::{CommandError, Context};

/// Sync, then print the cart.
#[allow(clippy::print_stdout)]
pub async fn show(ctx: &Context) -> Result<(), CommandError> {
    ctx.store.sync_cart().await;
    let state = ctx.store.state();

    if state.items.is_empty() {
        println!("Cart is empty");
        return Ok(());
    }

    for item in &state.items {
        let pending = if item.is_pending() { " (not yet synced)" } else { "" };
        let stock = if item.available_for_sale { "" } else { " (sold out)" };
        println!(
            "{:>3} x {} - {}  {}{pending}{stock}",
            item.quantity,
            item.product.title,
            item.variant_title,
            item.line_total().display(),
        );
        println!("        {}", item.variant_id);
    }

    println!("Items:    {}", state.item_count());
    println!("Subtotal: {}", state.subtotal().display());
    println!("Bundle:   {}", detect_bundle_tier(&state.items));
    if let Some(url) = state.checkout_url() {
        println!("Checkout: {url}");
    }

    Ok(())
}

/// Add `quantity` of a product's first variant.
pub async fn add(ctx: &Context, handle: &str, quantity: u32) -> Result<(), CommandError> {
    let product = ctx
        .client
        .fetch_product_by_handle(handle)
        .await?
        .ok_or_else(|| CommandError::ProductNotFound(handle.to_string()))?;
    let variant = product
        .first_variant()
        .ok_or_else(|| CommandError::ProductNotFound(handle.to_string()))?;

    ctx.store
        .add_item(AddItemInput {
            product: product.product.clone(),
            variant_id: variant.id.clone(),
            variant_title: variant.title.clone(),
            price: variant.price,
            quantity,
            selected_options: variant.selected_options.clone(),
        })
        .await?;

    show(ctx).await
}

/// Add a bundle tier, plus the free accessory for the family pack.
pub async fn add_bundle(
    ctx: &Context,
    cable: CableType,
    tier: BundleTier,
    quantity: u32,
) -> Result<(), CommandError> {
    let resolution = ctx.resolver.resolve(cable).await;
    let option = resolution
        .option(tier)
        .ok_or(CommandError::BundleUnavailable { cable, tier })?;

    ctx.store.add_item(option.to_add_input(quantity)).await?;

    if tier == BundleTier::Family {
        add_free_accessory(ctx).await?;
    }

    show(ctx).await
}

/// The accessory promotion never blocks the bundle that triggered it.
async fn add_free_accessory(ctx: &Context) -> Result<(), CommandError> {
    let handle = ctx.free_accessory_handle.as_str();
    if handle.is_empty() {
        return Ok(());
    }

    let accessory = match FreeAccessory::load(&ctx.client, handle).await {
        Ok(Some(accessory)) => accessory,
        Ok(None) => {
            warn!(handle, "Free accessory product not found");
            return Ok(());
        }
        Err(e) => {
            warn!(handle, error = %e, "Free accessory lookup failed");
            return Ok(());
        }
    };

    if let Some(offer) = free_accessory_offer(&ctx.store.state().items, &accessory) {
        ctx.store.add_item(offer).await?;
    }
    Ok(())
}

/// Set a line's quantity.
pub async fn update(ctx: &Context, variant: &str, quantity: i64) -> Result<(), CommandError> {
    ctx.store
        .update_quantity(&VariantId::new(variant), quantity)
        .await?;
    show(ctx).await
}

/// Remove a line.
pub async fn remove(ctx: &Context, variant: &str) -> Result<(), CommandError> {
    ctx.store.remove_item(&VariantId::new(variant)).await?;
    show(ctx).await
}

/// Refresh from Shopify.
#[allow(clippy::print_stdout)]
pub async fn sync(ctx: &Context) -> Result<(), CommandError> {
    ctx.store.sync_cart().await;
    let state = ctx.store.state();
    match &state.remote_cart_id {
        Some(id) => println!("Synced cart {id} ({} items)", state.item_count()),
        None => println!("No Shopify cart yet"),
    }
    Ok(())
}

/// Print the checkout URL.
#[allow(clippy::print_stdout)]
pub async fn checkout(ctx: &Context) -> Result<(), CommandError> {
    ctx.store.sync_cart().await;
    let url = ctx
        .store
        .begin_checkout()
        .ok_or(CommandError::CheckoutUnavailable)?;
    println!("{url}");
    Ok(())
}
