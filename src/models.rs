pub mod api_keys;
pub mod audit;
pub mod auth;
pub mod connectors;
pub mod preview;
pub mod tenancy;
