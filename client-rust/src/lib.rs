mod client;
mod client_utils;
pub mod client_test;
mod errors;
mod opentelemetry;
pub mod payloads;
mod session;
pub mod transport;
mod types;

pub use client::{
    ApiClient, ApiClientOptions, PageStream, RequestOptions, UnauthenticatedHandler,
    DEFAULT_AUTH_SCHEME, DEFAULT_BASE_URL,
};
pub use errors::*;
pub use session::{
    require_role, AuthGuard, FileSessionStore, MemorySessionStore, Role, Session, SessionStore,
};
pub use reqwest::Method;
pub use transport::{HttpTransport, ReqwestTransport};
pub use types::*;
