//! `mso-http` is an async HTTP client for the Multi-Site Orchestrator REST API.
//!
//! It handles the session login handshake, routes calls through the Nexus
//! Dashboard gateway when configured, and retries transient failures with
//! jittered exponential backoff:
//! - [`MsoClient::authenticate`]
//! - [`MsoClient::execute`] / [`MsoClient::execute_until`]
//! - [`MsoClient::compare_version`]

mod auth;
mod backoff;
mod client;
mod error;
mod options;
mod platform;
mod registry;
mod request;
mod retry;
mod session;
mod version;
mod wire;

pub use backoff::{BackoffPolicy, Sleeper, TokioSleeper};
pub use client::MsoClient;
pub use error::MsoError;
pub use options::ClientOptions;
pub use platform::Platform;
pub use registry::ClientRegistry;
pub use request::{ApiRequest, PreparedRequest};
pub use retry::{ApiResponse, RetryPredicate};
pub use session::SessionToken;
pub use version::PlatformVersion;

pub use reqwest::{Method, StatusCode};

pub type Result<T> = std::result::Result<T, MsoError>;
