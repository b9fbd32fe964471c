//! Protocol migration
//!
//! Rewrites every entry of a store into the current envelope protocol. Entries
//! are visited in key order, one fixed-size page at a time, each page inside a
//! single batch. The last migrated key is persisted after every page so an
//! interrupted run resumes where it stopped. The protocol sentinel is only
//! written once the whole pass has completed.

use crate::codec::{CacheCodec, LEGACY_PROTOCOL, PROTOCOL_VERSION};
use crate::error::StorageError;
use crate::store::{KeyValueStore, META_PREFIX};
use tracing::{debug, info, warn};

/// Key recording the protocol version of the store's entries.
pub const PROTOCOL_KEY: &str = "_meta/protocol";

/// Key recording the last key rewritten by an unfinished migration.
pub const CURSOR_KEY: &str = "_meta/migration-cursor";

/// Default number of entries per page.
pub const DEFAULT_PAGE_SIZE: usize = 200;

/// Outcome of a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Pages processed by this run.
    pub pages: usize,
    /// Entries re-encoded into the current protocol.
    pub reencoded: usize,
    /// Entries already on the current protocol.
    pub skipped: usize,
    /// Entries that could not be decoded; left in place.
    pub undecodable: usize,
    /// Whether the full pass finished and the sentinel was written.
    pub completed: bool,
}

/// Runs protocol migration over one store.
pub struct Migrator<'a> {
    store: &'a dyn KeyValueStore,
    page_size: usize,
    max_pages: Option<usize>,
}

impl<'a> Migrator<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Migrator {
            store,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: None,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Stop after `max_pages` pages, leaving the cursor in place.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Protocol recorded by the sentinel.
    ///
    /// A store without a sentinel is on the legacy protocol unless it is
    /// empty.
    pub fn stored_protocol(store: &dyn KeyValueStore) -> Result<u8, StorageError> {
        if let Some(bytes) = store.get(PROTOCOL_KEY)? {
            if let Some(version) = std::str::from_utf8(&bytes)
                .ok()
                .and_then(|s| s.trim().parse::<u8>().ok())
            {
                return Ok(version);
            }
            warn!("Unreadable protocol sentinel in {}", store.describe());
        }
        let has_entries = store
            .keys(None)?
            .iter()
            .any(|k| !k.starts_with(META_PREFIX));
        Ok(if has_entries {
            LEGACY_PROTOCOL
        } else {
            PROTOCOL_VERSION
        })
    }

    /// Record the current protocol in the sentinel.
    pub fn mark_current(store: &dyn KeyValueStore) -> Result<(), StorageError> {
        store.set(PROTOCOL_KEY, PROTOCOL_VERSION.to_string().as_bytes())
    }

    pub fn needs_migration(store: &dyn KeyValueStore) -> Result<bool, StorageError> {
        Ok(Self::stored_protocol(store)? < PROTOCOL_VERSION)
    }

    /// Run (or resume) the migration.
    pub fn run(&self) -> Result<MigrationReport, StorageError> {
        let mut report = MigrationReport::default();
        if !Self::needs_migration(self.store)? {
            report.completed = true;
            return Ok(report);
        }

        let mut cursor = self
            .store
            .get(CURSOR_KEY)?
            .and_then(|bytes| String::from_utf8(bytes).ok());
        if let Some(c) = &cursor {
            info!("Resuming cache migration after key {}", c);
        }

        loop {
            if self.max_pages.is_some_and(|max| report.pages >= max) {
                info!(
                    "Cache migration paused after {} pages ({} entries re-encoded)",
                    report.pages, report.reencoded
                );
                return Ok(report);
            }

            let page = self.store.keys_after(cursor.as_deref(), self.page_size)?;
            let Some(last) = page.last().cloned() else {
                break;
            };

            self.store.begin_batch()?;
            let result = self.migrate_page(&page, &last, &mut report);
            // Restore per-call durability even when the page failed.
            let ended = self.store.end_batch();
            result?;
            ended?;

            cursor = Some(last);
            report.pages += 1;
            debug!(
                "Migrated cache page {} ({} entries re-encoded so far)",
                report.pages, report.reencoded
            );
        }

        Self::mark_current(self.store)?;
        self.store.delete(CURSOR_KEY)?;
        report.completed = true;
        info!(
            "Cache migration complete: {} re-encoded, {} already current, {} undecodable",
            report.reencoded, report.skipped, report.undecodable
        );
        Ok(report)
    }

    fn migrate_page(
        &self,
        page: &[String],
        last: &str,
        report: &mut MigrationReport,
    ) -> Result<(), StorageError> {
        for key in page {
            if key.starts_with(META_PREFIX) {
                continue;
            }
            let Some(bytes) = self.store.get(key)? else {
                continue;
            };
            match CacheCodec::protocol_of(&bytes) {
                Ok(PROTOCOL_VERSION) => report.skipped += 1,
                Ok(_) => match CacheCodec::upgrade(&bytes) {
                    Ok(upgraded) => {
                        self.store.set(key, &upgraded)?;
                        report.reencoded += 1;
                    }
                    Err(e) => {
                        warn!("Leaving undecodable cache entry {}: {}", key, e);
                        report.undecodable += 1;
                    }
                },
                Err(e) => {
                    warn!("Leaving undecodable cache entry {}: {}", key, e);
                    report.undecodable += 1;
                }
            }
        }
        self.store.set(CURSOR_KEY, last.as_bytes())
    }
}
