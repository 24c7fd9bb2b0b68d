//! EATMS backend client library.
//!
//! Implements the collaborator traits from `common` over the EATMS REST API.

pub mod rest;

pub use rest::EatmsRestClient;
