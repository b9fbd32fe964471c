//! Integration tests for the outline cache

mod backends;
mod cache_roundtrip;
mod clone_conflicts;
mod migration;
