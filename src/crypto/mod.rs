pub mod signing;

pub use signing::{http_date, RequestSigner};
