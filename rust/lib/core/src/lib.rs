pub mod config;
pub mod error;
pub mod module;
pub mod types;

pub use config::ServiceConfig;
pub use error::{FieldError, FieldErrors, ServiceError};
pub use module::Module;
pub use types::{new_id, now_rfc3339, today};
