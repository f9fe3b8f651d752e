//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → dispatcher.rs (chaos, selection, retry loop)
//!     → request.rs (upstream URI, header rewriting)
//!     → [backend]
//!     → response.rs (strip hop-by-hop, add x-lb-attempts)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::Dispatcher;
pub use server::HttpServer;
