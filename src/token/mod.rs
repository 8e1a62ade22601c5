//! Token Management
//!
//! In-memory token store, persisted credentials and the session context
//! tying them together.

pub mod credentials;
pub mod session;
pub mod store;

pub use credentials::{CredentialStore, InMemoryCredentialStore};
pub use session::{ClientSession, ExecutionContext, ServerSession, SessionContext, SessionSettings};
pub use store::TokenStore;
