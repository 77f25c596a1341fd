//! Connection Pool Integration Tests
//!
//! Exercises the pool against the in-process fake backend:
//! - Registry semantics (add, get, remove, switch default, list, describe)
//! - Cluster auto-detection
//! - Entra ID credentials and background re-authentication

mod registry;
mod topology;
