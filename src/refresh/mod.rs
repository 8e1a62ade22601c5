//! Token Refresh
//!
//! Refresh endpoint client and the coordinator that keeps at most one
//! refresh in flight.

pub mod coordinator;
pub mod refresher;

pub use coordinator::{RefreshCoordinator, RefreshStats};
pub use refresher::{create_mock_refresher, HttpTokenRefresher, MockTokenRefresher, TokenRefresher};
