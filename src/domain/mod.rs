pub mod claims;
pub mod state;

pub use claims::{Claim, ClaimResponse, Principal};
pub use state::ServiceState;
