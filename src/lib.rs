#![doc = include_str!("../README.md")]

// Pecan IAM client library

pub mod authz;
pub mod config;
pub mod crypto;
pub mod domain;
pub mod errors;
pub mod grant;
pub mod http;
pub mod observability;
pub mod pecan;

pub use authz::{Permissions, Session};
pub use config::Config;
pub use domain::{Claim, ClaimResponse, Principal};
pub use errors::{PecanError, Result};
pub use pecan::Pecan;

/// Name the package is distributed under
pub const PACKAGE_NAME: &str = env!("CARGO_PKG_NAME");

/// Released version of the package
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Long description shipped with the package
pub const LONG_DESCRIPTION: &str = include_str!("../README.md");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_metadata() {
        assert_eq!(PACKAGE_NAME, "pecanhq");
        assert_eq!(VERSION, "0.0.3");
        assert!(!LONG_DESCRIPTION.trim().is_empty());
    }
}
