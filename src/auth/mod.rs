//! Admin access-control core: permission tables, session store, error
//! taxonomy, and the orchestrating auth service.

pub mod error;
pub mod permissions;
pub mod service;
pub mod session;
pub mod utils;

pub use error::AuthError;
pub use permissions::{Permission, PermissionSet, Role};
pub use service::AdminAuthService;
pub use session::{Session, SessionStore};
