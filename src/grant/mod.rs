// Client for the Pecan grant API

pub mod resource;
pub mod results;
pub mod service;
pub mod types;

pub use resource::{GrantResource, Link};
pub use results::ResultSet;
pub use service::GrantService;
