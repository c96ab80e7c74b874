pub mod api_key_service;
pub mod audit_service;
pub mod auth;
pub mod connector_service;
pub mod preview_service;
pub mod rbac_service;
pub mod tenancy_service;
