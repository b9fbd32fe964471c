//! Source composition for `CacheConfig`.

pub mod merge_policy;
pub mod service;
