//! Charge Cart CLI - drive the cart store against a live Shopify store.
//!
//! # Usage
//!
//! ```bash
//! # Show the bundle tiers for USB-C cables
//! chargecart bundles usbc
//!
//! # Add a family pack (the free accessory comes with it)
//! chargecart cart add-bundle usbc family
//!
//! # Adjust or remove a line
//! chargecart cart update gid://shopify/ProductVariant/123 2
//! chargecart cart remove gid://shopify/ProductVariant/123
//!
//! # Print the checkout URL
//! chargecart checkout
//! ```
//!
//! # Commands
//!
//! - `bundles` - List bundle options for a cable type
//! - `cart` - Show and change the persisted cart
//! - `checkout` - Print the Shopify checkout URL
//!
//! Configuration comes from the environment; see
//! `chargecart_storefront::config`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;
use std::time::Duration;

use chargecart_core::{BundleTier, CableType};
use chargecart_storefront::cart::{CartOptions, CartStore, JsonFileStorage};
use chargecart_storefront::catalog::BundleResolver;
use chargecart_storefront::config::ChargeCartConfig;
use chargecart_storefront::events::EventBus;
use chargecart_storefront::services::{HttpAnalyticsSink, TracingSink, spawn_analytics_forwarder};
use chargecart_storefront::shopify::StorefrontClient;
use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{CommandError, Context};

/// How long pending analytics events get to drain on exit.
const ANALYTICS_DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Parser)]
#[command(name = "chargecart")]
#[command(author, version, about = "Charge Cart storefront cart client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the bundle tiers for a cable type
    Bundles {
        /// Cable type (`usbc` or `lightning`)
        cable: CableType,
    },
    /// Show and change the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Print the checkout URL for the current cart
    Checkout,
}

#[derive(Subcommand)]
enum CartAction {
    /// Sync with Shopify and print the cart
    Show,
    /// Add a product by handle
    Add {
        /// Product handle
        handle: String,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Add a bundle tier for a cable type
    AddBundle {
        /// Cable type (`usbc` or `lightning`)
        cable: CableType,

        /// Bundle tier (`single`, `duo`, `family`)
        tier: BundleTier,

        /// Bundles to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set the quantity of a line; zero or less removes it
    #[command(allow_negative_numbers = true)]
    Update {
        /// Variant ID of the line
        variant: String,

        /// New quantity
        quantity: i64,
    },
    /// Remove a line
    Remove {
        /// Variant ID of the line
        variant: String,
    },
    /// Refresh the cart from Shopify
    Sync,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ChargeCartConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Configuration is needed before tracing for Sentry init
    let config = ChargeCartConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    // Defaults to warn so command output stays readable
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warn,chargecart_storefront=warn".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(CommandError::from(e)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: ChargeCartConfig) -> Result<(), CommandError> {
    let client = StorefrontClient::new(&config.shopify, config.cart.remote_timeout)?;
    let events = EventBus::default();

    let forwarder = match &config.analytics {
        Some(analytics) => spawn_analytics_forwarder(&events, HttpAnalyticsSink::new(analytics)?),
        None => spawn_analytics_forwarder(&events, TracingSink),
    };

    let store = CartStore::hydrate(
        client.clone(),
        JsonFileStorage::new(&config.cart.state_dir),
        events.clone(),
        CartOptions {
            remote_timeout: config.cart.remote_timeout,
        },
    );
    let ctx = Context {
        resolver: BundleResolver::new(client.clone(), config.cart.catalog_ttl),
        client,
        store,
        free_accessory_handle: config.cart.free_accessory_handle,
    };

    let result = dispatch(&ctx, cli.command).await;

    // The forwarder stops once every bus handle is gone
    drop(ctx);
    drop(events);
    if tokio::time::timeout(ANALYTICS_DRAIN_TIMEOUT, forwarder)
        .await
        .is_err()
    {
        tracing::warn!("Analytics events still pending at exit were dropped");
    }

    result
}

async fn dispatch(ctx: &Context, command: Commands) -> Result<(), CommandError> {
    match command {
        Commands::Bundles { cable } => commands::bundles::list(ctx, cable).await,
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(ctx).await,
            CartAction::Add { handle, quantity } => {
                commands::cart::add(ctx, &handle, quantity).await
            }
            CartAction::AddBundle {
                cable,
                tier,
                quantity,
            } => commands::cart::add_bundle(ctx, cable, tier, quantity).await,
            CartAction::Update { variant, quantity } => {
                commands::cart::update(ctx, &variant, quantity).await
            }
            CartAction::Remove { variant } => commands::cart::remove(ctx, &variant).await,
            CartAction::Sync => commands::cart::sync(ctx).await,
        },
        Commands::Checkout => commands::cart::checkout(ctx).await,
    }
}
