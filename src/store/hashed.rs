//! Hashed categories
//!
//! Many small values under one category are spread across at most 256 bucket
//! entries (`<category>/<2 hex digits>`) instead of one key each. `compress`
//! folds every bucket into a single `xx` bucket.

use crate::codec::CacheCodec;
use crate::error::ApiError;
use crate::store::KeyValueStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

const COMPRESSED_BUCKET: &str = "xx";

/// A bucketed namespace inside a store.
pub struct HashedCategory<'a> {
    store: &'a dyn KeyValueStore,
    category: String,
}

impl<'a> HashedCategory<'a> {
    pub fn new(store: &'a dyn KeyValueStore, category: impl Into<String>) -> Self {
        HashedCategory {
            store,
            category: category.into().trim_end_matches('/').to_string(),
        }
    }

    fn bucket_key(&self, key: &str) -> String {
        let digest = blake3::hash(key.as_bytes());
        format!("{}/{}", self.category, hex::encode(&digest.as_bytes()[..1]))
    }

    fn compressed_key(&self) -> String {
        format!("{}/{}", self.category, COMPRESSED_BUCKET)
    }

    fn bucket_keys(&self) -> Result<Vec<String>, ApiError> {
        let pattern = format!("{}/*", globset::escape(&self.category));
        let mut keys = self.store.keys(Some(&pattern))?;
        let compressed = self.compressed_key();
        let prefix = format!("{}/", self.category);
        keys.retain(|k| {
            k != &compressed
                && k.strip_prefix(&prefix)
                    .is_some_and(|bucket| !bucket.contains('/'))
        });
        keys.sort();
        Ok(keys)
    }

    fn read_bucket<T: DeserializeOwned>(&self, key: &str) -> Result<Option<BTreeMap<String, T>>, ApiError> {
        match self.store.get(key)? {
            Some(bytes) => match CacheCodec::decode(&bytes) {
                Ok(bucket) => Ok(Some(bucket)),
                Err(e) => {
                    warn!("Ignoring corrupt bucket {}: {}", key, e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Store `value` under `key` in this category.
    pub fn set<T: Serialize + DeserializeOwned>(&self, key: &str, value: T) -> Result<(), ApiError> {
        let bucket_key = self.bucket_key(key);
        let mut bucket: BTreeMap<String, T> = self.read_bucket(&bucket_key)?.unwrap_or_default();
        bucket.insert(key.to_string(), value);
        self.store.set(&bucket_key, &CacheCodec::encode(&bucket)?)?;
        Ok(())
    }

    /// Look `key` up in its bucket, then in the compressed bucket.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ApiError> {
        if let Some(mut bucket) = self.read_bucket::<T>(&self.bucket_key(key))? {
            if let Some(value) = bucket.remove(key) {
                return Ok(Some(value));
            }
        }
        Ok(self
            .read_bucket::<T>(&self.compressed_key())?
            .and_then(|mut bucket| bucket.remove(key)))
    }

    /// Remove `key` from its bucket and from the compressed bucket.
    pub fn remove<T: Serialize + DeserializeOwned>(&self, key: &str) -> Result<(), ApiError> {
        for bucket_key in [self.bucket_key(key), self.compressed_key()] {
            if let Some(mut bucket) = self.read_bucket::<T>(&bucket_key)? {
                if bucket.remove(key).is_some() {
                    self.store.set(&bucket_key, &CacheCodec::encode(&bucket)?)?;
                }
            }
        }
        Ok(())
    }

    /// Every value in the category; bucket entries override compressed ones.
    pub fn all<T: DeserializeOwned>(&self) -> Result<BTreeMap<String, T>, ApiError> {
        let mut merged = self.read_bucket(&self.compressed_key())?.unwrap_or_default();
        for key in self.bucket_keys()? {
            if let Some(bucket) = self.read_bucket::<T>(&key)? {
                merged.extend(bucket);
            }
            self.store.uncache(&[key.as_str()]);
        }
        Ok(merged)
    }

    /// Fold all buckets into the compressed bucket.
    pub fn compress<T: Serialize + DeserializeOwned>(&self) -> Result<(), ApiError> {
        let merged: BTreeMap<String, T> = self.all()?;
        self.store
            .set(&self.compressed_key(), &CacheCodec::encode(&merged)?)?;
        for key in self.bucket_keys()? {
            self.store.delete(&key)?;
        }
        Ok(())
    }
}
