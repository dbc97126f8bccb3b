//! Side services attached to the cart.
//!
//! # Services
//!
//! - `analytics` - Forwards cart events to an analytics backend

pub mod analytics;

pub use analytics::{
    AnalyticsError, AnalyticsEvent, AnalyticsSink, HttpAnalyticsSink, TracingSink,
    spawn_analytics_forwarder,
};
