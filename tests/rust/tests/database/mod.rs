//! Database integration tests
//!
//! Schema, persistence across reopen and the session repository.

mod repositories;
