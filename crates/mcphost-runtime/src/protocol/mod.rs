//! Remote protocol client: JSON-RPC 2.0 over HTTP POST with JSON or SSE replies

pub mod auth;
mod client;
pub mod jsonrpc;
pub mod sse;

pub use auth::{auth_headers, API_KEY_HEADER, AUTHORIZATION, CLOUD_ID_HEADER};
pub use client::{ClientContext, ClientState, RemoteClient, RemoteTarget, SESSION_HEADER};
pub use jsonrpc::RequestIdGenerator;
