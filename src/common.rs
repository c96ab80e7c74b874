pub mod crypto;
pub mod error;
pub mod safe_mode;
