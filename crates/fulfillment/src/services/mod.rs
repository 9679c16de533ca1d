//! External service clients.
//!
//! Each integration is a trait with a live `reqwest` implementation and
//! an in-memory double for testing.

pub mod shipping;
pub mod source;
