pub mod user_repo;
pub use user_repo::{PgUserRepository, UserRepository};
pub mod tenancy_repo;
pub use tenancy_repo::{PgTenantRepository, TenantRepository};
pub mod api_key_repo;
pub use api_key_repo::{ApiKeyRepository, PgApiKeyRepository};
pub mod preview_repo;
pub use preview_repo::{PgPreviewRepository, PreviewRepository};
pub mod audit_repo;
pub use audit_repo::{AuditRepository, PgAuditRepository};
pub mod connector_repo;
pub use connector_repo::{ConnectorSecretRepository, PgConnectorSecretRepository};

pub mod memory;
pub use memory::MemoryStore;
