//! Raw GraphQL response to domain type conversions.

use crate::shopify::types::{
    Cart, CartCost, CartLine, CartLineCost, CartMerchandise, CartMerchandiseProduct,
    CartUserError, Image, Product, ProductVariant,
};

use super::queries::{RawCart, RawCartLine, RawImage, RawUserError, get_product_by_handle};

fn convert_image(image: RawImage) -> Image {
    Image {
        url: image.url,
        alt_text: image.alt_text,
    }
}

// =============================================================================
// Products
// =============================================================================

pub fn convert_product(product: get_product_by_handle::RawProduct) -> Product {
    Product {
        id: product.id,
        handle: product.handle,
        title: product.title,
        description: product.description,
        product_type: product.product_type,
        tags: product.tags,
        featured_image: product.featured_image.map(convert_image),
        variants: product
            .variants
            .edges
            .into_iter()
            .map(|e| convert_variant(e.node))
            .collect(),
    }
}

fn convert_variant(variant: get_product_by_handle::RawVariant) -> ProductVariant {
    ProductVariant {
        id: variant.id,
        title: variant.title,
        available_for_sale: variant.available_for_sale,
        price: variant.price,
        compare_at_price: variant.compare_at_price,
        selected_options: variant.selected_options,
        image: variant.image.map(convert_image),
    }
}

// =============================================================================
// Carts
// =============================================================================

pub fn convert_cart(cart: RawCart) -> Cart {
    Cart {
        id: cart.id,
        checkout_url: cart.checkout_url,
        total_quantity: cart.total_quantity,
        cost: CartCost {
            subtotal: cart.cost.subtotal_amount,
            total: cart.cost.total_amount,
        },
        lines: cart
            .lines
            .edges
            .into_iter()
            .map(|e| convert_cart_line(e.node))
            .collect(),
    }
}

fn convert_cart_line(line: RawCartLine) -> CartLine {
    let merchandise = line.merchandise;
    CartLine {
        id: line.id,
        quantity: line.quantity,
        cost: CartLineCost {
            amount_per_quantity: line.cost.amount_per_quantity,
            total_amount: line.cost.total_amount,
        },
        merchandise: CartMerchandise {
            id: merchandise.id,
            title: merchandise.title,
            available_for_sale: merchandise.available_for_sale,
            price: merchandise.price,
            selected_options: merchandise.selected_options,
            image: merchandise.image.map(convert_image),
            product: CartMerchandiseProduct {
                id: merchandise.product.id,
                handle: merchandise.product.handle,
                title: merchandise.product.title,
                tags: merchandise.product.tags,
                featured_image: merchandise.product.featured_image.map(convert_image),
            },
        },
    }
}

pub fn convert_user_error(error: RawUserError) -> CartUserError {
    CartUserError {
        code: error.code,
        field: error.field,
        message: error.message,
    }
}
