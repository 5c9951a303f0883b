//! Transport layer for reaching the platform
//!
//! [`PlatformTransport`] is the seam between the client and the network.
//! Production uses HTTPS; tests script replies in memory.

pub mod http;
#[cfg(test)]
pub mod mock;
pub mod traits;

pub use http::{HttpTransport, USER_AGENT};
pub use traits::{PlatformResponse, PlatformTransport};
