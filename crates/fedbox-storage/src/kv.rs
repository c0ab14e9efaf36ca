//! Embedded key-value backend on redb.
//!
//! Every document lives in the `docs` table under its location's raw key
//! (`host/seg/.../__raw`), metadata in the `metadata` table under the
//! matching `__meta_data` key. Because keys are ordered, the direct children
//! of a location are a contiguous range starting at `host/seg/.../`.
//!
//! Relationship collections are ordinary documents whose `orderedItems`
//! hold member IRIs. Membership changes are read-modify-write cycles inside
//! one redb write transaction, which redb serializes.

use std::collections::HashSet;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::{debug, warn};
use url::Url;

use fedbox_filters::{Filters, Page};
use fedbox_vocab::{tombstone, CollectionType, Item};

use crate::addressing::{Location, RAW};
use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use crate::membership;
use crate::metadata::{self, Metadata};
use crate::traits::{MetadataStore, PasswordStore, Repository};

const DOCS: TableDefinition<&str, &[u8]> = TableDefinition::new("docs");
const METADATA: TableDefinition<&str, &[u8]> = TableDefinition::new("metadata");

/// Wrap a redb error with the operation and key it hit.
fn fail<E: Display>(op: &'static str, at: &str) -> impl FnOnce(E) -> StorageError {
    let at = at.to_string();
    move |e| StorageError::backend(op, at, e)
}

/// Where the database lives.
enum Backing {
    File(PathBuf),
    /// Kept resident for the repository's lifetime; there is nothing to
    /// reopen once the last handle goes away.
    Memory(Arc<Database>),
}

#[derive(Default)]
struct Slot {
    /// Pinned by an explicit [`Repository::open`].
    pinned: Option<Arc<Database>>,
    /// Shared with operations currently running.
    live: Weak<Database>,
}

/// redb-backed [`Repository`].
///
/// Each operation takes a handle for its own duration. A handle pinned by
/// [`Repository::open`] is reused until [`Repository::close`]; otherwise the
/// database file is opened on demand and released when the last concurrent
/// operation finishes.
pub struct KvRepository {
    base: Url,
    bcrypt_cost: u32,
    backing: Backing,
    slot: Mutex<Slot>,
}

impl KvRepository {
    /// A repository over `{config.path}/fedbox.redb`. Nothing is opened yet.
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        Ok(Self {
            base: config.base()?,
            bcrypt_cost: config.bcrypt_cost,
            backing: Backing::File(config.kv_file()),
            slot: Mutex::new(Slot::default()),
        })
    }

    /// A repository over a fresh in-memory database.
    pub fn in_memory(config: &StorageConfig) -> StorageResult<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(fail("create", "memory"))?;
        init_tables(&db, "memory")?;
        Ok(Self {
            base: config.base()?,
            bcrypt_cost: config.bcrypt_cost,
            backing: Backing::Memory(Arc::new(db)),
            slot: Mutex::new(Slot::default()),
        })
    }

    fn describe(&self) -> String {
        match &self.backing {
            Backing::File(path) => path.display().to_string(),
            Backing::Memory(_) => "memory".into(),
        }
    }

    fn handle(&self) -> StorageResult<Arc<Database>> {
        let path = match &self.backing {
            Backing::Memory(db) => return Ok(Arc::clone(db)),
            Backing::File(path) => path,
        };
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(db) = &slot.pinned {
            return Ok(Arc::clone(db));
        }
        if let Some(db) = slot.live.upgrade() {
            return Ok(db);
        }
        let db = Arc::new(connect(path)?);
        slot.live = Arc::downgrade(&db);
        Ok(db)
    }

    /// Run `op` against a database handle. The handle is released while the
    /// slot is locked, so the last one out closes the file before anyone can
    /// try to reopen it.
    fn with_db<T>(&self, op: impl FnOnce(&Database) -> StorageResult<T>) -> StorageResult<T> {
        let db = self.handle()?;
        let result = op(&db);
        let _slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        drop(db);
        result
    }

    fn location(&self, iri: &str) -> StorageResult<Location> {
        Location::from_iri(iri).ok_or_else(|| StorageError::not_found(iri))
    }

    /// Children documents stored directly below `loc`.
    fn children(
        &self,
        docs: &impl ReadableTable<&'static str, &'static [u8]>,
        loc: &Location,
    ) -> StorageResult<Vec<Item>> {
        let prefix = loc.children_prefix();
        let suffix = format!("/{RAW}");
        let mut children = Vec::new();
        let range = docs.range(prefix.as_str()..).map_err(fail("scan", &prefix))?;
        for entry in range {
            let (key, value) = entry.map_err(fail("scan", &prefix))?;
            let key = key.value();
            let Some(rest) = key.strip_prefix(prefix.as_str()) else {
                break;
            };
            let Some(child) = rest.strip_suffix(suffix.as_str()) else {
                continue;
            };
            if child.contains('/') {
                continue;
            }
            match Item::from_slice(value.value()) {
                Ok(item) => children.push(item),
                Err(e) => warn!(key, error = %e, "skipping unreadable document"),
            }
        }
        Ok(children)
    }

    /// Members of the collection at `loc`: partition children plus
    /// explicitly referenced IRIs, each listed once.
    fn members(
        &self,
        docs: &impl ReadableTable<&'static str, &'static [u8]>,
        loc: &Location,
        kind: Option<CollectionType>,
        doc: Option<&Item>,
    ) -> StorageResult<Vec<Item>> {
        let mut members = Vec::new();
        let mut seen = HashSet::new();
        if kind.is_some_and(|k| k.is_partition()) {
            for child in self.children(docs, loc)? {
                if let Some(id) = child.id() {
                    seen.insert(id.to_string());
                }
                members.push(child);
            }
        }
        for member in doc.map(membership::member_refs).unwrap_or_default() {
            if !seen.insert(member.clone()) {
                continue;
            }
            let resolved = match Location::from_iri(&member) {
                Some(mloc) => read_doc(docs, &mloc)?,
                None => None,
            };
            members.push(resolved.unwrap_or_else(|| Item::link(member)));
        }
        Ok(members)
    }
}

impl Repository for KvRepository {
    fn open(&self) -> StorageResult<()> {
        let Backing::File(path) = &self.backing else {
            return Ok(());
        };
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.pinned.is_some() {
            return Ok(());
        }
        let db = match slot.live.upgrade() {
            Some(db) => db,
            None => Arc::new(connect(path)?),
        };
        slot.live = Arc::downgrade(&db);
        slot.pinned = Some(db);
        debug!(path = %path.display(), "kv storage opened");
        Ok(())
    }

    fn close(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(db) = slot.pinned.take() {
            drop(db);
            debug!(path = %self.describe(), "kv storage closed");
        }
    }

    fn base_url(&self) -> &Url {
        &self.base
    }

    fn load(&self, filters: &Filters) -> StorageResult<Page> {
        let loc = self.location(&filters.target)?;
        self.with_db(|db| {
            let txn = db.begin_read().map_err(fail("begin read", &loc.key()))?;
            let docs = txn.open_table(DOCS).map_err(fail("open table", &loc.key()))?;

            let doc = read_doc(&docs, &loc)?;
            let kind = CollectionType::of_iri(&filters.target);
            let page = match doc {
                Some(doc) if doc.is_collection() => {
                    let members = self.members(&docs, &loc, kind, Some(&doc))?;
                    Page::from_members(filters, &filters.target, members)
                }
                Some(doc) => Page::from_item(filters, doc),
                None if kind.is_some() => {
                    let members = self.members(&docs, &loc, kind, None)?;
                    Page::from_members(filters, &filters.target, members)
                }
                None => return Err(StorageError::not_found(&filters.target)),
            };
            debug!(target = %filters.target, total = page.total_items, "loaded");
            Ok(page)
        })
    }

    fn save(&self, item: Item) -> StorageResult<Item> {
        let iri = membership::document_iri(&item)?.to_string();
        let loc = Location::from_iri(&iri)
            .ok_or_else(|| StorageError::NotValid(format!("{iri} is not a storable IRI")))?;
        let (item, ensure) = membership::prepare_for_save(item, &self.base);
        let raw = item.to_vec()?;

        self.with_db(|db| {
            let key = loc.raw_key();
            let txn = db.begin_write().map_err(fail("begin write", &key))?;
            {
                let mut docs = txn.open_table(DOCS).map_err(fail("open table", &key))?;
                for collection in &ensure {
                    let Some(cloc) = Location::from_iri(collection) else {
                        continue;
                    };
                    let ckey = cloc.raw_key();
                    let exists = docs.get(ckey.as_str()).map_err(fail("read", &ckey))?.is_some();
                    if !exists {
                        let doc = membership::new_collection(collection).to_vec()?;
                        docs.insert(ckey.as_str(), doc.as_slice()).map_err(fail("write", &ckey))?;
                        debug!(collection = %collection, "created collection");
                    }
                }
                docs.insert(key.as_str(), raw.as_slice()).map_err(fail("write", &key))?;
            }
            txn.commit().map_err(fail("commit", &key))?;
            debug!(iri = %iri, kind = item.kind().unwrap_or_default(), "saved");
            Ok(item)
        })
    }

    fn delete(&self, item: &Item) -> StorageResult<Item> {
        let iri = membership::member_iri(item)?.to_string();
        let loc = self.location(&iri)?;
        self.with_db(|db| {
            let key = loc.raw_key();
            let txn = db.begin_write().map_err(fail("begin write", &key))?;
            let tomb = {
                let mut docs = txn.open_table(DOCS).map_err(fail("open table", &key))?;
                let prior = read_doc(&docs, &loc)?.ok_or_else(|| StorageError::not_found(&iri))?;
                let tomb = tombstone(&iri, &prior, Utc::now());
                if !prior.is_tombstone() {
                    for collection in membership::teardown_collections(&prior, &self.base) {
                        let Some(cloc) = Location::from_iri(&collection) else {
                            continue;
                        };
                        let ckey = cloc.raw_key();
                        docs.remove(ckey.as_str()).map_err(fail("remove", &ckey))?;
                        debug!(collection = %collection, "removed collection");
                    }
                }
                docs.insert(key.as_str(), tomb.to_vec()?.as_slice()).map_err(fail("write", &key))?;
                tomb
            };
            txn.commit().map_err(fail("commit", &key))?;
            debug!(iri = %iri, "deleted");
            Ok(tomb)
        })
    }

    fn add_to_collection(&self, collection: &str, item: &Item) -> StorageResult<()> {
        let kind = membership::check_local_collection(&self.base, collection)?;
        let member = membership::member_iri(item)?;
        let cloc = Location::from_iri(collection)
            .ok_or_else(|| StorageError::NotValid(format!("{collection} is not a collection")))?;
        if membership::stored_in_partition(kind, collection, member) {
            debug!(collection, member, "already stored in partition");
            return Ok(());
        }

        self.with_db(|db| {
            let key = cloc.raw_key();
            let txn = db.begin_write().map_err(fail("begin write", &key))?;
            {
                let mut docs = txn.open_table(DOCS).map_err(fail("open table", &key))?;
                let mut doc = read_doc(&docs, &cloc)?.unwrap_or_else(|| membership::new_collection(collection));
                if !doc.is_collection() {
                    return Err(StorageError::NotValid(format!("{collection} is not a collection")));
                }
                if !membership::add_ref(&mut doc, member) {
                    debug!(collection, member, "already a member");
                    return Ok(());
                }
                docs.insert(key.as_str(), doc.to_vec()?.as_slice()).map_err(fail("write", &key))?;
            }
            txn.commit().map_err(fail("commit", &key))?;
            debug!(collection, member, "added to collection");
            Ok(())
        })
    }

    fn remove_from_collection(&self, collection: &str, item: &Item) -> StorageResult<()> {
        let kind = membership::check_local_collection(&self.base, collection)?;
        let member = membership::member_iri(item)?;
        if membership::stored_in_partition(kind, collection, member) {
            return Err(StorageError::NotValid(format!(
                "{member} is stored in {collection}; partition membership follows storage"
            )));
        }
        let cloc = Location::from_iri(collection)
            .ok_or_else(|| StorageError::NotValid(format!("{collection} is not a collection")))?;

        self.with_db(|db| {
            let key = cloc.raw_key();
            let txn = db.begin_write().map_err(fail("begin write", &key))?;
            {
                let mut docs = txn.open_table(DOCS).map_err(fail("open table", &key))?;
                let Some(mut doc) = read_doc(&docs, &cloc)? else {
                    debug!(collection, member, "collection does not exist");
                    return Ok(());
                };
                if !membership::remove_ref(&mut doc, member) {
                    debug!(collection, member, "not a member");
                    return Ok(());
                }
                docs.insert(key.as_str(), doc.to_vec()?.as_slice()).map_err(fail("write", &key))?;
            }
            txn.commit().map_err(fail("commit", &key))?;
            debug!(collection, member, "removed from collection");
            Ok(())
        })
    }

    fn as_password_store(&self) -> Option<&dyn PasswordStore> {
        Some(self)
    }

    fn as_metadata_store(&self) -> Option<&dyn MetadataStore> {
        Some(self)
    }
}

impl PasswordStore for KvRepository {
    fn password_set(&self, iri: &str, password: &[u8]) -> StorageResult<()> {
        let hash = metadata::hash_password(password, self.bcrypt_cost)?;
        self.update_metadata(iri, |meta| meta.password = Some(hash))?;
        debug!(iri, "password set");
        Ok(())
    }

    fn password_check(&self, iri: &str, password: &[u8]) -> StorageResult<()> {
        let meta = match self.load_metadata(iri) {
            Ok(meta) => meta,
            Err(e) if e.is_not_found() => Metadata::default(),
            Err(e) => return Err(e),
        };
        metadata::verify_password(iri, &meta, password)
    }
}

impl MetadataStore for KvRepository {
    fn load_metadata(&self, iri: &str) -> StorageResult<Metadata> {
        let loc = self.location(iri)?;
        let key = loc.meta_key();
        self.with_db(|db| {
            let txn = db.begin_read().map_err(fail("begin read", &key))?;
            let table = txn.open_table(METADATA).map_err(fail("open table", &key))?;
            let guard = table.get(key.as_str()).map_err(fail("read", &key))?;
            let guard = guard.ok_or_else(|| StorageError::not_found(iri))?;
            metadata::decode(guard.value())
        })
    }

    fn save_metadata(&self, iri: &str, meta: &Metadata) -> StorageResult<()> {
        let meta = meta.clone();
        self.update_metadata(iri, move |current| *current = meta)?;
        debug!(iri, "metadata saved");
        Ok(())
    }
}

impl KvRepository {
    /// Read-modify-write the metadata record of an existing document.
    fn update_metadata(&self, iri: &str, change: impl FnOnce(&mut Metadata)) -> StorageResult<()> {
        let loc = self.location(iri)?;
        let key = loc.meta_key();
        self.with_db(|db| {
            let txn = db.begin_write().map_err(fail("begin write", &key))?;
            {
                let docs = txn.open_table(DOCS).map_err(fail("open table", &key))?;
                if read_doc(&docs, &loc)?.is_none() {
                    return Err(StorageError::not_found(iri));
                }
                let mut table = txn.open_table(METADATA).map_err(fail("open table", &key))?;
                let current = table.get(key.as_str()).map_err(fail("read", &key))?.map(|g| metadata::decode(g.value()));
                let mut meta = current.transpose()?.unwrap_or_default();
                change(&mut meta);
                table
                    .insert(key.as_str(), metadata::encode(&meta)?.as_slice())
                    .map_err(fail("write", &key))?;
            }
            txn.commit().map_err(fail("commit", &key))?;
            Ok(())
        })
    }
}

impl std::fmt::Debug for KvRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvRepository")
            .field("base", &self.base.as_str())
            .field("storage", &self.describe())
            .finish()
    }
}

fn connect(path: &Path) -> StorageResult<Database> {
    let display = path.display().to_string();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let db = Database::create(path).map_err(fail("open", &display))?;
    init_tables(&db, &display)?;
    Ok(db)
}

fn init_tables(db: &Database, at: &str) -> StorageResult<()> {
    let txn = db.begin_write().map_err(fail("begin write", at))?;
    txn.open_table(DOCS).map_err(fail("create table", at))?;
    txn.open_table(METADATA).map_err(fail("create table", at))?;
    txn.commit().map_err(fail("commit", at))?;
    Ok(())
}

fn read_doc(
    docs: &impl ReadableTable<&'static str, &'static [u8]>,
    loc: &Location,
) -> StorageResult<Option<Item>> {
    let key = loc.raw_key();
    let guard = docs.get(key.as_str()).map_err(fail("read", &key))?;
    guard.map(|g| Item::from_slice(g.value()).map_err(StorageError::from)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{load_item, metadata_store, password_store};
    use fedbox_filters::CompStr;
    use serde_json::json;

    const BASE: &str = "https://example.com";

    fn config(dir: &Path) -> StorageConfig {
        StorageConfig {
            path: dir.to_path_buf(),
            base_url: BASE.into(),
            bcrypt_cost: 4,
            ..StorageConfig::default()
        }
    }

    fn memory() -> KvRepository {
        KvRepository::in_memory(&config(Path::new("unused"))).unwrap()
    }

    fn item(doc: serde_json::Value) -> Item {
        Item::try_from(doc).unwrap()
    }

    fn actor() -> Item {
        item(json!({
            "id": "https://example.com/actors/a",
            "type": "Person",
            "preferredUsername": "a",
            "inbox": "https://example.com/actors/a/inbox",
            "outbox": "https://example.com/actors/a/outbox",
            "liked": "https://example.com/actors/a/liked",
        }))
    }

    fn note(n: u32, name: &str, published: &str) -> Item {
        item(json!({
            "id": format!("https://example.com/objects/{n}"),
            "type": "Note",
            "name": name,
            "published": published,
            "to": ["https://www.w3.org/ns/activitystreams#Public"],
        }))
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    #[test]
    fn save_then_load_roundtrip() {
        let repo = memory();
        let n = note(1, "hello", "2024-01-01T00:00:00Z");
        let saved = repo.save(n.clone()).unwrap();
        assert_eq!(saved, n);
        assert_eq!(load_item(&repo, "https://example.com/objects/1").unwrap(), n);
    }

    #[test]
    fn resave_overwrites() {
        let repo = memory();
        repo.save(note(1, "first", "2024-01-01T00:00:00Z")).unwrap();
        repo.save(note(1, "second", "2024-01-01T00:00:00Z")).unwrap();
        let loaded = load_item(&repo, "https://example.com/objects/1").unwrap();
        assert_eq!(loaded.get("name"), Some(&json!("second")));
        let page = repo.load(&Filters::new("https://example.com/objects")).unwrap();
        assert_eq!(page.total_items, 1);
    }

    #[test]
    fn scheme_does_not_change_identity() {
        let repo = memory();
        repo.save(note(1, "hello", "2024-01-01T00:00:00Z")).unwrap();
        assert!(load_item(&repo, "http://example.com/objects/1").is_ok());
    }

    #[test]
    fn missing_item_is_not_found() {
        let repo = memory();
        let err = repo.load(&Filters::new("https://example.com/objects/missing")).unwrap_err();
        assert!(err.is_not_found());
        let err = repo.load(&Filters::new("not an iri")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn save_requires_an_id() {
        let repo = memory();
        let err = repo.save(Item::new("Note", None)).unwrap_err();
        assert!(matches!(err, StorageError::NotValid(_)));
    }

    #[test]
    fn links_cannot_be_saved() {
        let repo = memory();
        let err = repo.save(Item::link("https://example.com/objects/1")).unwrap_err();
        assert!(matches!(err, StorageError::NotValid(_)));
        assert!(load_item(&repo, "https://example.com/objects/1").unwrap_err().is_not_found());
    }

    #[test]
    fn predicates_can_reject_a_single_item() {
        let repo = memory();
        repo.save(note(1, "hello", "2024-01-01T00:00:00Z")).unwrap();
        let filters = Filters::new("https://example.com/objects/1").with_type(CompStr::equals("Article"));
        assert!(repo.load(&filters).unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Collections
    // -----------------------------------------------------------------------

    #[test]
    fn actor_collections_exist_empty_after_save() {
        let repo = memory();
        repo.save(actor()).unwrap();
        let page = repo.load(&Filters::new("https://example.com/actors/a/outbox")).unwrap();
        assert!(page.is_collection());
        assert_eq!(page.total_items, 0);
    }

    #[test]
    fn like_lands_in_liked() {
        let repo = memory();
        let a = repo.save(actor()).unwrap();
        repo.save(note(1, "n", "2024-01-01T00:00:00Z")).unwrap();
        let like = item(json!({
            "id": "https://example.com/activities/1",
            "type": "Like",
            "actor": a.id(),
            "object": "https://example.com/objects/1",
        }));
        let like = repo.save(like).unwrap();
        repo.add_to_collection("https://example.com/actors/a/liked", &like).unwrap();

        let page = repo.load(&Filters::new("https://example.com/actors/a/liked")).unwrap();
        assert_eq!(page.total_items, 1);
        assert_eq!(page.items[0].id(), Some("https://example.com/activities/1"));
    }

    #[test]
    fn membership_is_never_duplicated() {
        let repo = memory();
        repo.save(actor()).unwrap();
        let n = repo.save(note(1, "n", "2024-01-01T00:00:00Z")).unwrap();
        let inbox = "https://example.com/actors/a/inbox";
        for _ in 0..3 {
            repo.add_to_collection(inbox, &n).unwrap();
        }
        assert_eq!(repo.load(&Filters::new(inbox)).unwrap().total_items, 1);

        repo.remove_from_collection(inbox, &n).unwrap();
        assert_eq!(repo.load(&Filters::new(inbox)).unwrap().total_items, 0);
        repo.remove_from_collection(inbox, &n).unwrap();
    }

    #[test]
    fn remote_and_unknown_collections_are_rejected() {
        let repo = memory();
        let n = note(1, "n", "2024-01-01T00:00:00Z");
        let err = repo.add_to_collection("https://remote.org/actors/b/inbox", &n).unwrap_err();
        assert!(matches!(err, StorageError::NotValid(_)));
        let err = repo.add_to_collection("https://example.com/actors/a/bogus", &n).unwrap_err();
        assert!(matches!(err, StorageError::NotValid(_)));
    }

    #[test]
    fn unresolved_members_come_back_as_links() {
        let repo = memory();
        repo.save(actor()).unwrap();
        let remote = Item::link("https://remote.org/objects/9");
        repo.add_to_collection("https://example.com/actors/a/inbox", &remote).unwrap();
        let page = repo.load(&Filters::new("https://example.com/actors/a/inbox")).unwrap();
        assert_eq!(page.items, vec![remote]);
    }

    #[test]
    fn partition_lists_direct_children_only() {
        let repo = memory();
        repo.save(actor()).unwrap();
        repo.save(note(1, "a", "2024-01-01T00:00:00Z")).unwrap();
        repo.save(note(2, "b", "2024-01-02T00:00:00Z")).unwrap();
        let page = repo.load(&Filters::new("https://example.com/actors")).unwrap();
        assert_eq!(page.total_items, 1);
        let page = repo.load(&Filters::new("https://example.com/objects")).unwrap();
        let ids: Vec<_> = page.items.iter().filter_map(Item::id).collect();
        assert_eq!(ids, vec!["https://example.com/objects/2", "https://example.com/objects/1"]);
    }

    #[test]
    fn partition_children_cannot_be_removed() {
        let repo = memory();
        let n = repo.save(note(1, "n", "2024-01-01T00:00:00Z")).unwrap();
        let err = repo.remove_from_collection("https://example.com/objects", &n).unwrap_err();
        assert!(matches!(err, StorageError::NotValid(_)));
        let page = repo.load(&Filters::new("https://example.com/objects")).unwrap();
        assert_eq!(page.total_items, 1);
    }

    #[test]
    fn filter_conjunction() {
        let repo = memory();
        repo.save(note(1, "a", "2024-01-01T00:00:00Z")).unwrap();
        repo.save(note(2, "b", "2024-01-02T00:00:00Z")).unwrap();
        let mut article = note(3, "a", "2024-01-03T00:00:00Z");
        article.set("type", json!("Article"));
        repo.save(article).unwrap();

        let filters = Filters::new("https://example.com/objects")
            .with_type(CompStr::equals("Note"))
            .with_name(CompStr::equals("a"));
        let page = repo.load(&filters).unwrap();
        assert_eq!(page.total_items, 1);
        assert_eq!(page.items[0].id(), Some("https://example.com/objects/1"));
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    #[test]
    fn delete_is_idempotent_and_keeps_audience() {
        let repo = memory();
        let mut n = note(1, "n", "2024-01-01T00:00:00Z");
        n.set(
            "to",
            json!(["https://www.w3.org/ns/activitystreams#Public", "https://example.com/actors/a/followers"]),
        );
        repo.save(n.clone()).unwrap();

        let first = repo.delete(&n).unwrap();
        let second = repo.delete(&n).unwrap();
        assert!(first.is_tombstone());
        assert_eq!(first.get("formerType"), Some(&json!("Note")));
        assert_eq!(second.get("formerType"), Some(&json!("Note")));
        assert_eq!(first.get("to"), n.get("to"));

        let loaded = load_item(&repo, "https://example.com/objects/1").unwrap();
        assert!(loaded.is_tombstone());
    }

    #[test]
    fn delete_keeps_references_and_tears_down_owned_collections() {
        let repo = memory();
        let a = repo.save(actor()).unwrap();
        let n = repo.save(note(1, "n", "2024-01-01T00:00:00Z")).unwrap();
        repo.add_to_collection("https://example.com/actors/a/outbox", &n).unwrap();
        repo.add_to_collection("https://example.com/actors/a/liked", &n).unwrap();

        repo.delete(&n).unwrap();
        let page = repo.load(&Filters::new("https://example.com/actors/a/liked")).unwrap();
        assert_eq!(page.total_items, 1);
        assert!(page.items[0].is_tombstone());

        repo.delete(&a).unwrap();
        let page = repo.load(&Filters::new("https://example.com/actors/a/outbox")).unwrap();
        assert_eq!(page.total_items, 0);
    }

    #[test]
    fn delete_missing_is_not_found() {
        let repo = memory();
        let err = repo.delete(&Item::link("https://example.com/objects/404")).unwrap_err();
        assert!(err.is_not_found());
    }

    // -----------------------------------------------------------------------
    // Passwords and metadata
    // -----------------------------------------------------------------------

    #[test]
    fn password_set_and_check() {
        let repo = memory();
        repo.save(actor()).unwrap();
        let store = password_store(&repo).unwrap();
        store.password_set("https://example.com/actors/a", b"hunter2").unwrap();
        store.password_check("https://example.com/actors/a", b"hunter2").unwrap();
        let err = store.password_check("https://example.com/actors/a", b"nope").unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[test]
    fn metadata_requires_document_and_is_not_found_when_missing() {
        let repo = memory();
        let store = metadata_store(&repo).unwrap();
        let err = store.load_metadata("https://example.com/actors/a").unwrap_err();
        assert!(err.is_not_found());
        let meta = Metadata {
            private_key: Some("pem".into()),
            ..Metadata::default()
        };
        assert!(store.save_metadata("https://example.com/actors/a", &meta).unwrap_err().is_not_found());

        repo.save(actor()).unwrap();
        store.save_metadata("https://example.com/actors/a", &meta).unwrap();
        assert_eq!(store.load_metadata("https://example.com/actors/a").unwrap(), meta);
        let loaded = load_item(&repo, "https://example.com/actors/a").unwrap();
        assert!(loaded.get("private_key").is_none());
    }

    // -----------------------------------------------------------------------
    // Handles
    // -----------------------------------------------------------------------

    #[test]
    fn file_backed_open_close_are_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let repo = KvRepository::new(&config(dir.path())).unwrap();
        repo.open().unwrap();
        repo.open().unwrap();
        repo.save(note(1, "n", "2024-01-01T00:00:00Z")).unwrap();
        repo.close();
        repo.close();
        // Operations reopen on demand.
        assert!(load_item(&repo, "https://example.com/objects/1").is_ok());
        assert!(dir.path().join(StorageConfig::KV_FILE_NAME).exists());
    }

    #[test]
    fn data_survives_a_new_repository() {
        let dir = tempfile::tempdir().unwrap();
        {
            let repo = KvRepository::new(&config(dir.path())).unwrap();
            repo.save(note(1, "n", "2024-01-01T00:00:00Z")).unwrap();
        }
        let repo = KvRepository::new(&config(dir.path())).unwrap();
        assert!(load_item(&repo, "https://example.com/objects/1").is_ok());
    }

    #[test]
    fn concurrent_loads_share_the_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(KvRepository::new(&config(dir.path())).unwrap());
        repo.save(note(1, "n", "2024-01-01T00:00:00Z")).unwrap();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let repo = Arc::clone(&repo);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        repo.load(&Filters::new("https://example.com/objects/1")).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn concurrent_adds_keep_every_member() {
        let repo = Arc::new(memory());
        repo.save(actor()).unwrap();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let repo = Arc::clone(&repo);
                std::thread::spawn(move || {
                    let member = Item::link(format!("https://remote.org/objects/{i}"));
                    repo.add_to_collection("https://example.com/actors/a/inbox", &member).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let page = repo.load(&Filters::new("https://example.com/actors/a/inbox")).unwrap();
        assert_eq!(page.total_items, 8);
    }
}
