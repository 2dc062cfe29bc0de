// Crunchyroll Beta API Client
//
// Pure HTTP client for the Crunchyroll Beta streaming API. One stateful
// client object performs authenticated requests and maps error responses to
// typed failures; responses are returned as raw JSON, no domain modeling.
//
// Architecture:
// - client: CrunchyrollClient with the request primitive and operations
// - session: session config accumulated during login + typed accessors
// - endpoints: remote endpoint URL construction
// - error: shared error enum and body utilities

pub mod client;
pub mod endpoints;
pub mod error;
pub mod session;

// Re-export the main types for convenience
pub use client::{CrunchyrollClient, DEFAULT_RESULT_LIMIT};
pub use error::CrunchyrollError;
pub use session::{CmsSigning, SessionConfig};
