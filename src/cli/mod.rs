//! Terminal front-end over [`PricingService`](crate::core::PricingService)

pub mod batch;
pub mod cost;
pub mod margin;
pub mod setup;
pub mod target;
pub mod ui;
pub mod validate;
