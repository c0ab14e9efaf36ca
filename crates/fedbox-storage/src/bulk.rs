//! Recursive copy and move of items into a collection.
//!
//! Each source IRI is loaded; a collection is walked depth-first and every
//! non-collection member is handed to the transfer step. A collection seen
//! twice during one walk is reported as [`StorageError::CyclicCollection`].

use std::collections::HashSet;

use tracing::{debug, warn};

use fedbox_filters::Filters;
use fedbox_vocab::{collections::is_valid_collection_iri, Item};

use crate::error::{StorageError, StorageResult};
use crate::membership;
use crate::traits::Repository;

/// Outcome of a bulk transfer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// IRIs added to the destination.
    pub transferred: Vec<String>,
    /// IRIs that failed, with the reason. Only copies collect failures.
    pub failed: Vec<(String, String)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Copy,
    Move,
}

/// Add every source item, recursively through collections, to
/// `destination`. Per-item failures are logged and collected; the batch
/// carries on.
pub fn copy_to_collection(repo: &dyn Repository, destination: &str, sources: &[String]) -> StorageResult<TransferReport> {
    transfer(repo, destination, sources, Mode::Copy)
}

/// Add every source item to `destination` and delete the original. Stops
/// at the first failure; items moved before it stay moved.
pub fn move_to_collection(repo: &dyn Repository, destination: &str, sources: &[String]) -> StorageResult<TransferReport> {
    transfer(repo, destination, sources, Mode::Move)
}

fn transfer(repo: &dyn Repository, destination: &str, sources: &[String], mode: Mode) -> StorageResult<TransferReport> {
    if membership::check_local_collection(repo.base_url(), destination).is_err() {
        return Err(StorageError::NotValid("destination is not a valid collection".into()));
    }
    let mut walker = Walker {
        repo,
        destination,
        mode,
        visited: HashSet::new(),
        report: TransferReport::default(),
    };
    for source in sources {
        walker.visit(source)?;
    }
    debug!(
        destination,
        transferred = walker.report.transferred.len(),
        failed = walker.report.failed.len(),
        "bulk transfer finished"
    );
    Ok(walker.report)
}

struct Walker<'a> {
    repo: &'a dyn Repository,
    destination: &'a str,
    mode: Mode,
    visited: HashSet<String>,
    report: TransferReport,
}

impl Walker<'_> {
    fn visit(&mut self, source: &str) -> StorageResult<()> {
        let page = match self.repo.load(&Filters::new(source)) {
            Ok(page) => page,
            Err(e) => return self.fail(source, e),
        };
        if page.is_collection() {
            if !self.visited.insert(source.to_string()) {
                return Err(StorageError::CyclicCollection { iri: source.to_string() });
            }
            debug!(collection = source, members = page.total_items, "descending into collection");
            for member in page.items {
                self.visit_member(member)?;
            }
            self.visited.remove(source);
            return Ok(());
        }
        match page.items.into_iter().next() {
            Some(item) => self.apply(item),
            None => self.fail(source, StorageError::not_found(source)),
        }
    }

    fn visit_member(&mut self, member: Item) -> StorageResult<()> {
        let nested = member.is_collection() || (member.is_link() && member.id().is_some_and(is_valid_collection_iri));
        match member.id() {
            Some(iri) if nested => self.visit(&iri.to_string()),
            _ => self.apply(member),
        }
    }

    fn apply(&mut self, item: Item) -> StorageResult<()> {
        let Some(iri) = item.id().map(str::to_string) else {
            return self.fail("<anonymous>", StorageError::NotValid("item has no id".into()));
        };
        let result = self.repo.add_to_collection(self.destination, &item).and_then(|()| {
            if self.mode == Mode::Move {
                self.repo.delete(&item).map(|_| ())
            } else {
                Ok(())
            }
        });
        match result {
            Ok(()) => {
                debug!(iri = %iri, destination = self.destination, mode = ?self.mode, "transferred");
                self.report.transferred.push(iri);
                Ok(())
            }
            Err(e) => self.fail(&iri, e),
        }
    }

    fn fail(&mut self, iri: &str, err: StorageError) -> StorageResult<()> {
        match self.mode {
            Mode::Move => Err(err),
            Mode::Copy => {
                warn!(iri, error = %err, "copy failed, continuing");
                self.report.failed.push((iri.to_string(), err.to_string()));
                Ok(())
            }
        }
    }
}
