//! Filesystem backend.
//!
//! The directory tree mirrors IRI structure: `{root}/{host}/{seg}/...`
//! holds the document in `__raw.json` and metadata in `__meta_data.json`.
//! Collection membership is a symlink inside the collection directory
//! pointing at the member's `__raw.json`. The link may dangle when the
//! member is not stored locally; the target path still identifies it.
//!
//! One mutex serializes every operation of a repository. Several processes
//! sharing one storage directory are not supported.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, warn};
use url::Url;

use fedbox_filters::{Filters, Page};
use fedbox_vocab::{tombstone, CollectionType, Item};

use crate::addressing::{Location, RAW_FILE};
use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use crate::membership;
use crate::metadata::{self, Metadata};
use crate::traits::{MetadataStore, PasswordStore, Repository};

#[derive(Debug, Default)]
struct Session {
    pinned: bool,
}

/// Directory-tree [`Repository`].
#[derive(Debug)]
pub struct FsRepository {
    root: PathBuf,
    base: Url,
    bcrypt_cost: u32,
    session: Mutex<Session>,
}

impl FsRepository {
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        Ok(Self {
            root: std::path::absolute(&config.path)?,
            base: config.base()?,
            bcrypt_cost: config.bcrypt_cost,
            session: Mutex::new(Session::default()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Take the process-wide handle for one operation. Released on drop.
    fn acquire(&self) -> StorageResult<MutexGuard<'_, Session>> {
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if !session.pinned {
            fs::create_dir_all(&self.root).map_err(|e| self.fail("open", &self.root, e))?;
        }
        Ok(session)
    }

    fn fail(&self, op: &'static str, path: &Path, err: io::Error) -> StorageError {
        StorageError::backend(op, path.display().to_string(), err)
    }

    fn location(&self, iri: &str) -> StorageResult<Location> {
        Location::from_iri(iri).ok_or_else(|| StorageError::not_found(iri))
    }

    fn read_doc(&self, loc: &Location) -> StorageResult<Option<Item>> {
        self.read_file(&loc.raw_path(&self.root))
    }

    fn read_file(&self, path: &Path) -> StorageResult<Option<Item>> {
        match fs::read(path) {
            Ok(data) => Ok(Some(Item::from_slice(&data)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.fail("read", path, e)),
        }
    }

    /// Write through a temporary file in the same directory, then rename.
    fn write_atomic(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let dir = path
            .parent()
            .ok_or_else(|| StorageError::NotValid(format!("{} has no parent", path.display())))?;
        fs::create_dir_all(dir).map_err(|e| self.fail("create dir", dir, e))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.fail("create temp", dir, e))?;
        tmp.write_all(data).map_err(|e| self.fail("write", path, e))?;
        tmp.persist(path).map_err(|e| self.fail("persist", path, e.error))?;
        Ok(())
    }

    fn write_doc(&self, loc: &Location, item: &Item) -> StorageResult<()> {
        self.write_atomic(&loc.raw_path(&self.root), &item.to_vec()?)
    }

    /// Documents in the immediate subdirectories of `loc`.
    fn children(&self, loc: &Location) -> StorageResult<Vec<Item>> {
        let dir = loc.dir(&self.root);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.fail("list", &dir, e)),
        };
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| self.fail("list", &dir, e))?;
            let kind = entry.file_type().map_err(|e| self.fail("stat", &entry.path(), e))?;
            if kind.is_dir() && !kind.is_symlink() {
                paths.push(entry.path().join(RAW_FILE));
            }
        }
        paths.sort();
        let mut children = Vec::new();
        for path in paths {
            match self.read_file(&path) {
                Ok(Some(item)) => children.push(item),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable document"),
            }
        }
        Ok(children)
    }

    /// Partition children, linked members and IRIs listed on the collection
    /// document, each listed once.
    fn members(&self, loc: &Location, kind: Option<CollectionType>, doc: Option<&Item>) -> StorageResult<Vec<Item>> {
        let mut members = Vec::new();
        let mut seen = HashSet::new();
        if kind.is_some_and(|k| k.is_partition()) {
            for child in self.children(loc)? {
                if let Some(id) = child.id() {
                    seen.insert(id.to_string());
                }
                members.push(child);
            }
        }
        let dir = loc.dir(&self.root);
        for target in links::list(&dir).map_err(|e| self.fail("list members", &dir, e))? {
            let Some(mloc) = Location::from_path(&self.root, &target) else {
                warn!(link = %target.display(), "member link points outside storage");
                continue;
            };
            let iri = mloc.to_iri(self.base.scheme());
            let member = self.read_file(&target)?.unwrap_or_else(|| Item::link(iri.clone()));
            if seen.insert(member.id().map_or(iri, str::to_string)) {
                members.push(member);
            }
        }
        for iri in doc.map(membership::member_refs).unwrap_or_default() {
            if !seen.insert(iri.clone()) {
                continue;
            }
            let resolved = match Location::from_iri(&iri) {
                Some(mloc) => self.read_doc(&mloc)?,
                None => None,
            };
            members.push(resolved.unwrap_or_else(|| Item::link(iri)));
        }
        Ok(members)
    }

    /// Remove a collection's document and membership links. Directories
    /// below it belong to other documents and are left in place.
    fn teardown(&self, loc: &Location) -> StorageResult<()> {
        let dir = loc.dir(&self.root);
        links::clear(&dir).map_err(|e| self.fail("clear members", &dir, e))?;
        let raw = loc.raw_path(&self.root);
        match fs::remove_file(&raw) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(self.fail("remove", &raw, e)),
        }
        if let Err(e) = fs::remove_dir(&dir) {
            debug!(dir = %dir.display(), error = %e, "collection directory kept");
        }
        Ok(())
    }

    fn collection_location(&self, collection: &str) -> StorageResult<Location> {
        Location::from_iri(collection).ok_or_else(|| StorageError::NotValid(format!("{collection} is not a collection")))
    }

    fn update_metadata(&self, iri: &str, change: impl FnOnce(&mut Metadata)) -> StorageResult<()> {
        let loc = self.location(iri)?;
        let _session = self.acquire()?;
        if !loc.raw_path(&self.root).exists() {
            return Err(StorageError::not_found(iri));
        }
        let mut meta = self.read_metadata(&loc)?.unwrap_or_default();
        change(&mut meta);
        let data = serde_json::to_vec(&meta).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.write_atomic(&loc.meta_path(&self.root), &data)
    }

    fn read_metadata(&self, loc: &Location) -> StorageResult<Option<Metadata>> {
        let path = loc.meta_path(&self.root);
        match fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data)
                .map(Some)
                .map_err(|e| StorageError::Serialization(e.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.fail("read", &path, e)),
        }
    }
}

impl Repository for FsRepository {
    fn open(&self) -> StorageResult<()> {
        let mut session = self.acquire()?;
        if !session.pinned {
            session.pinned = true;
            debug!(root = %self.root.display(), "fs storage opened");
        }
        Ok(())
    }

    fn close(&self) {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if session.pinned {
            session.pinned = false;
            debug!(root = %self.root.display(), "fs storage closed");
        }
    }

    fn base_url(&self) -> &Url {
        &self.base
    }

    fn load(&self, filters: &Filters) -> StorageResult<Page> {
        let loc = self.location(&filters.target)?;
        let _session = self.acquire()?;
        let kind = CollectionType::of_iri(&filters.target);
        let page = match self.read_doc(&loc)? {
            Some(doc) if doc.is_collection() => {
                let members = self.members(&loc, kind, Some(&doc))?;
                Page::from_members(filters, &filters.target, members)
            }
            Some(doc) => Page::from_item(filters, doc),
            None if kind.is_some() => {
                let members = self.members(&loc, kind, None)?;
                Page::from_members(filters, &filters.target, members)
            }
            None => return Err(StorageError::not_found(&filters.target)),
        };
        debug!(target = %filters.target, total = page.total_items, "loaded");
        Ok(page)
    }

    fn save(&self, item: Item) -> StorageResult<Item> {
        let iri = membership::document_iri(&item)?.to_string();
        let loc = Location::from_iri(&iri)
            .ok_or_else(|| StorageError::NotValid(format!("{iri} is not a storable IRI")))?;
        let (item, ensure) = membership::prepare_for_save(item, &self.base);

        let _session = self.acquire()?;
        for collection in &ensure {
            let Some(cloc) = Location::from_iri(collection) else {
                continue;
            };
            if !cloc.raw_path(&self.root).exists() {
                self.write_doc(&cloc, &membership::new_collection(collection))?;
                debug!(collection = %collection, "created collection");
            }
        }
        self.write_doc(&loc, &item)?;
        debug!(iri = %iri, kind = item.kind().unwrap_or_default(), "saved");
        Ok(item)
    }

    fn delete(&self, item: &Item) -> StorageResult<Item> {
        let iri = membership::member_iri(item)?.to_string();
        let loc = self.location(&iri)?;
        let _session = self.acquire()?;
        let prior = self.read_doc(&loc)?.ok_or_else(|| StorageError::not_found(&iri))?;
        let tomb = tombstone(&iri, &prior, Utc::now());
        if !prior.is_tombstone() {
            for collection in membership::teardown_collections(&prior, &self.base) {
                if let Some(cloc) = Location::from_iri(&collection) {
                    self.teardown(&cloc)?;
                    debug!(collection = %collection, "removed collection");
                }
            }
        }
        self.write_doc(&loc, &tomb)?;
        debug!(iri = %iri, "deleted");
        Ok(tomb)
    }

    fn add_to_collection(&self, collection: &str, item: &Item) -> StorageResult<()> {
        let kind = membership::check_local_collection(&self.base, collection)?;
        let member = membership::member_iri(item)?;
        let cloc = self.collection_location(collection)?;
        if membership::stored_in_partition(kind, collection, member) {
            debug!(collection, member, "already stored in partition");
            return Ok(());
        }

        let _session = self.acquire()?;
        let mut doc = match self.read_doc(&cloc)? {
            Some(doc) if !doc.is_collection() => {
                return Err(StorageError::NotValid(format!("{collection} is not a collection")));
            }
            Some(doc) => doc,
            None => {
                let doc = membership::new_collection(collection);
                self.write_doc(&cloc, &doc)?;
                doc
            }
        };
        // Local members are linked to their stored document; remote IRIs are
        // listed on the collection document exactly as given.
        let added = if membership::is_local(&self.base, member) {
            let mloc = Location::from_iri(member)
                .ok_or_else(|| StorageError::NotValid(format!("{member} is not a storable IRI")))?;
            let dir = cloc.dir(&self.root);
            links::add(&dir, &mloc.raw_path(&self.root)).map_err(|e| self.fail("link member", &dir, e))?
        } else if membership::add_ref(&mut doc, member) {
            self.write_doc(&cloc, &doc)?;
            true
        } else {
            false
        };
        if added {
            debug!(collection, member, "added to collection");
        } else {
            debug!(collection, member, "already a member");
        }
        Ok(())
    }

    fn remove_from_collection(&self, collection: &str, item: &Item) -> StorageResult<()> {
        let kind = membership::check_local_collection(&self.base, collection)?;
        let member = membership::member_iri(item)?;
        let cloc = self.collection_location(collection)?;
        if membership::stored_in_partition(kind, collection, member) {
            return Err(StorageError::NotValid(format!(
                "{member} is stored in {collection}; partition membership follows storage"
            )));
        }

        let _session = self.acquire()?;
        let dir = cloc.dir(&self.root);
        let mut removed = match Location::from_iri(member) {
            Some(mloc) if membership::is_local(&self.base, member) => links::remove(&dir, &mloc.raw_path(&self.root))
                .map_err(|e| self.fail("unlink member", &dir, e))?,
            _ => false,
        };
        if let Some(mut doc) = self.read_doc(&cloc)? {
            if membership::remove_ref(&mut doc, member) {
                self.write_doc(&cloc, &doc)?;
                removed = true;
            }
        }
        if removed {
            debug!(collection, member, "removed from collection");
        } else {
            debug!(collection, member, "not a member");
        }
        Ok(())
    }

    fn as_password_store(&self) -> Option<&dyn PasswordStore> {
        Some(self)
    }

    fn as_metadata_store(&self) -> Option<&dyn MetadataStore> {
        Some(self)
    }
}

impl PasswordStore for FsRepository {
    fn password_set(&self, iri: &str, password: &[u8]) -> StorageResult<()> {
        let hash = metadata::hash_password(password, self.bcrypt_cost)?;
        self.update_metadata(iri, |meta| meta.password = Some(hash))?;
        debug!(iri, "password set");
        Ok(())
    }

    fn password_check(&self, iri: &str, password: &[u8]) -> StorageResult<()> {
        let loc = self.location(iri)?;
        let meta = {
            let _session = self.acquire()?;
            self.read_metadata(&loc)?.unwrap_or_default()
        };
        metadata::verify_password(iri, &meta, password)
    }
}

impl MetadataStore for FsRepository {
    fn load_metadata(&self, iri: &str) -> StorageResult<Metadata> {
        let loc = self.location(iri)?;
        let _session = self.acquire()?;
        self.read_metadata(&loc)?.ok_or_else(|| StorageError::not_found(iri))
    }

    fn save_metadata(&self, iri: &str, meta: &Metadata) -> StorageResult<()> {
        let meta = meta.clone();
        self.update_metadata(iri, move |current| *current = meta)?;
        debug!(iri, "metadata saved");
        Ok(())
    }
}

/// Membership links as symlinks named `__m{seq}`, ordered by sequence.
#[cfg(unix)]
mod links {
    use std::fs;
    use std::io;
    use std::path::{Path, PathBuf};

    const PREFIX: &str = "__m";

    fn entries(dir: &Path) -> io::Result<Vec<(String, PathBuf)>> {
        let read = match fs::read_dir(dir) {
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut links = Vec::new();
        for entry in read {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(PREFIX) && entry.file_type()?.is_symlink() {
                links.push((name, fs::read_link(entry.path())?));
            }
        }
        links.sort();
        Ok(links)
    }

    pub fn list(dir: &Path) -> io::Result<Vec<PathBuf>> {
        Ok(entries(dir)?.into_iter().map(|(_, target)| target).collect())
    }

    pub fn add(dir: &Path, target: &Path) -> io::Result<bool> {
        let existing = entries(dir)?;
        if existing.iter().any(|(_, t)| t == target) {
            return Ok(false);
        }
        let next = existing
            .iter()
            .filter_map(|(name, _)| name.strip_prefix(PREFIX)?.parse::<u64>().ok())
            .max()
            .map_or(0, |n| n + 1);
        fs::create_dir_all(dir)?;
        std::os::unix::fs::symlink(target, dir.join(format!("{PREFIX}{next:010}")))?;
        Ok(true)
    }

    pub fn remove(dir: &Path, target: &Path) -> io::Result<bool> {
        let mut removed = false;
        for (name, t) in entries(dir)? {
            if t == target {
                fs::remove_file(dir.join(name))?;
                removed = true;
            }
        }
        Ok(removed)
    }

    pub fn clear(dir: &Path) -> io::Result<()> {
        for (name, _) in entries(dir)? {
            fs::remove_file(dir.join(name))?;
        }
        Ok(())
    }
}

/// Membership as a `__members.json` index of target paths, for platforms
/// without symlinks.
#[cfg(not(unix))]
mod links {
    use std::fs;
    use std::io;
    use std::path::{Path, PathBuf};

    const INDEX: &str = "__members.json";

    fn read(dir: &Path) -> io::Result<Vec<PathBuf>> {
        match fs::read(dir.join(INDEX)) {
            Ok(data) => serde_json::from_slice(&data).map_err(io::Error::other),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn write(dir: &Path, members: &[PathBuf]) -> io::Result<()> {
        fs::create_dir_all(dir)?;
        fs::write(dir.join(INDEX), serde_json::to_vec(members).map_err(io::Error::other)?)
    }

    pub fn list(dir: &Path) -> io::Result<Vec<PathBuf>> {
        read(dir)
    }

    pub fn add(dir: &Path, target: &Path) -> io::Result<bool> {
        let mut members = read(dir)?;
        if members.iter().any(|m| m == target) {
            return Ok(false);
        }
        members.push(target.to_path_buf());
        write(dir, &members)?;
        Ok(true)
    }

    pub fn remove(dir: &Path, target: &Path) -> io::Result<bool> {
        let mut members = read(dir)?;
        let before = members.len();
        members.retain(|m| m != target);
        if members.len() == before {
            return Ok(false);
        }
        write(dir, &members)?;
        Ok(true)
    }

    pub fn clear(dir: &Path) -> io::Result<()> {
        match fs::remove_file(dir.join(INDEX)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{load_item, metadata_store, password_store};
    use fedbox_filters::CompStr;
    use serde_json::json;
    use tempfile::TempDir;

    fn repo() -> (TempDir, FsRepository) {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            backend: crate::config::BackendKind::Fs,
            path: dir.path().to_path_buf(),
            base_url: "https://example.com".into(),
            bcrypt_cost: 4,
        };
        let repo = FsRepository::new(&config).unwrap();
        (dir, repo)
    }

    fn item(doc: serde_json::Value) -> Item {
        Item::try_from(doc).unwrap()
    }

    fn actor() -> Item {
        item(json!({
            "id": "https://example.com/actors/a",
            "type": "Person",
            "inbox": "https://example.com/actors/a/inbox",
            "outbox": "https://example.com/actors/a/outbox",
            "liked": "https://example.com/actors/a/liked",
        }))
    }

    fn note(n: u32, published: &str) -> Item {
        item(json!({
            "id": format!("https://example.com/objects/{n}"),
            "type": "Note",
            "name": format!("note {n}"),
            "published": published,
        }))
    }

    // -----------------------------------------------------------------------
    // Layout
    // -----------------------------------------------------------------------

    #[test]
    fn documents_land_in_raw_json() {
        let (dir, repo) = repo();
        repo.save(note(1, "2024-01-01T00:00:00Z")).unwrap();
        let raw = dir.path().join("example.com/objects/1/__raw.json");
        let stored: serde_json::Value = serde_json::from_slice(&fs::read(raw).unwrap()).unwrap();
        assert_eq!(stored["type"], "Note");
    }

    #[test]
    fn actor_save_creates_collection_directories() {
        let (dir, repo) = repo();
        repo.save(actor()).unwrap();
        assert!(dir.path().join("example.com/actors/a/outbox/__raw.json").exists());
        let page = repo.load(&Filters::new("https://example.com/actors/a/outbox")).unwrap();
        assert!(page.is_collection());
        assert_eq!(page.total_items, 0);
    }

    #[cfg(unix)]
    #[test]
    fn membership_is_a_symlink_to_the_member_document() {
        let (dir, repo) = repo();
        repo.save(actor()).unwrap();
        let n = repo.save(note(1, "2024-01-01T00:00:00Z")).unwrap();
        repo.add_to_collection("https://example.com/actors/a/inbox", &n).unwrap();

        let inbox = dir.path().join("example.com/actors/a/inbox");
        let links: Vec<_> = fs::read_dir(&inbox)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().unwrap().is_symlink())
            .collect();
        assert_eq!(links.len(), 1);
        let target = fs::read_link(links[0].path()).unwrap();
        assert_eq!(target, repo.root().join("example.com/objects/1/__raw.json"));
    }

    // -----------------------------------------------------------------------
    // Repository behavior
    // -----------------------------------------------------------------------

    #[test]
    fn roundtrip_and_not_found() {
        let (_dir, repo) = repo();
        let n = note(1, "2024-01-01T00:00:00Z");
        repo.save(n.clone()).unwrap();
        assert_eq!(load_item(&repo, "https://example.com/objects/1").unwrap(), n);
        assert!(repo.load(&Filters::new("https://example.com/objects/2")).unwrap_err().is_not_found());
    }

    #[test]
    fn containment_holds_across_repeated_adds() {
        let (_dir, repo) = repo();
        repo.save(actor()).unwrap();
        let n = repo.save(note(1, "2024-01-01T00:00:00Z")).unwrap();
        let liked = "https://example.com/actors/a/liked";
        repo.add_to_collection(liked, &n).unwrap();
        repo.add_to_collection(liked, &n).unwrap();
        let page = repo.load(&Filters::new(liked)).unwrap();
        assert_eq!(page.total_items, 1);
        assert_eq!(page.items[0], n);

        repo.remove_from_collection(liked, &n).unwrap();
        assert_eq!(repo.load(&Filters::new(liked)).unwrap().total_items, 0);
    }

    #[test]
    fn remote_members_resolve_to_links() {
        let (_dir, repo) = repo();
        repo.save(actor()).unwrap();
        let remote = Item::link("https://remote.org/objects/9");
        repo.add_to_collection("https://example.com/actors/a/inbox", &remote).unwrap();
        let page = repo.load(&Filters::new("https://example.com/actors/a/inbox")).unwrap();
        assert_eq!(page.items, vec![remote]);
    }

    #[test]
    fn remote_members_are_listed_on_the_collection_document() {
        let (dir, repo) = repo();
        repo.save(actor()).unwrap();
        let remote = Item::link("http://remote.org/objects/9");
        repo.add_to_collection("https://example.com/actors/a/inbox", &remote).unwrap();
        repo.add_to_collection("https://example.com/actors/a/inbox", &remote).unwrap();

        let raw = dir.path().join("example.com/actors/a/inbox/__raw.json");
        let stored: serde_json::Value = serde_json::from_slice(&fs::read(raw).unwrap()).unwrap();
        assert_eq!(stored["orderedItems"], json!(["http://remote.org/objects/9"]));
        let page = repo.load(&Filters::new("https://example.com/actors/a/inbox")).unwrap();
        assert_eq!(page.items, vec![remote]);
    }

    #[test]
    fn partition_lists_children_newest_first() {
        let (_dir, repo) = repo();
        repo.save(note(1, "2024-01-01T00:00:00Z")).unwrap();
        repo.save(note(2, "2024-03-01T00:00:00Z")).unwrap();
        repo.save(note(3, "2024-02-01T00:00:00Z")).unwrap();
        let page = repo.load(&Filters::new("https://example.com/objects").paged(1, 2)).unwrap();
        assert_eq!(page.total_items, 3);
        let ids: Vec<_> = page.items.iter().filter_map(Item::id).collect();
        assert_eq!(ids, vec!["https://example.com/objects/2", "https://example.com/objects/3"]);

        let filters = Filters::new("https://example.com/objects").with_name(CompStr::like("3"));
        assert_eq!(repo.load(&filters).unwrap().total_items, 1);
    }

    #[test]
    fn delete_leaves_tombstone_and_member_reference() {
        let (_dir, repo) = repo();
        let a = repo.save(actor()).unwrap();
        let n = repo.save(note(1, "2024-01-01T00:00:00Z")).unwrap();
        repo.add_to_collection("https://example.com/actors/a/liked", &n).unwrap();

        let first = repo.delete(&n).unwrap();
        let second = repo.delete(&n).unwrap();
        assert_eq!(first.get("formerType"), second.get("formerType"));

        let page = repo.load(&Filters::new("https://example.com/actors/a/liked")).unwrap();
        assert_eq!(page.total_items, 1);
        assert!(page.items[0].is_tombstone());

        repo.delete(&a).unwrap();
        let page = repo.load(&Filters::new("https://example.com/actors/a/liked")).unwrap();
        assert_eq!(page.total_items, 0);
        assert!(load_item(&repo, "https://example.com/actors/a").unwrap().is_tombstone());
    }

    #[test]
    fn password_and_metadata() {
        let (dir, repo) = repo();
        let iri = "https://example.com/actors/a";
        assert!(password_store(&repo).unwrap().password_set(iri, b"pw").unwrap_err().is_not_found());

        repo.save(actor()).unwrap();
        let passwords = password_store(&repo).unwrap();
        passwords.password_set(iri, b"pw").unwrap();
        passwords.password_check(iri, b"pw").unwrap();
        assert!(passwords.password_check(iri, b"other").unwrap_err().is_unauthorized());

        let meta = metadata_store(&repo).unwrap().load_metadata(iri).unwrap();
        assert!(meta.password.is_some());
        assert!(dir.path().join("example.com/actors/a/__meta_data.json").exists());
        let raw = fs::read_to_string(dir.path().join("example.com/actors/a/__raw.json")).unwrap();
        assert!(!raw.contains("$2"));
    }

    #[test]
    fn open_close_are_repeatable() {
        let (_dir, repo) = repo();
        repo.open().unwrap();
        repo.open().unwrap();
        repo.close();
        repo.close();
        repo.save(note(1, "2024-01-01T00:00:00Z")).unwrap();
    }
}
