// Local authorization evaluation

pub mod permissions;
pub mod schema;
pub mod session;

pub use permissions::{Permissions, PermissionsBuilder};
pub use schema::{Registration, Schema, ServiceRegistration};
pub use session::Session;
