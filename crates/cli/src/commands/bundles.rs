//! Bundle listing.

use chargecart_core::CableType;

use super::{CommandError, Context};

/// Print every bundle tier for `cable`.
#[allow(clippy::print_stdout)]
pub async fn list(ctx: &Context, cable: CableType) -> Result<(), CommandError> {
    let resolution = ctx.resolver.resolve(cable).await;

    println!("{} bundles", cable.label());
    for option in &resolution.options {
        let badge = option.badge.map(|b| format!(" [{b}]")).unwrap_or_default();
        let stock = if option.available { "" } else { " (sold out)" };
        println!(
            "  {:<12} {:>10}  was {:>10}  save {:>3}%{badge}{stock}",
            option.name,
            option.price.display(),
            option.compare_price.display(),
            option.discount_percent(),
        );
        println!("  {:<12} {}", "", option.variant_id);
    }

    for tier in &resolution.missing {
        println!("  {:<12} unavailable", tier.as_str());
    }

    Ok(())
}
