//! Key-value persistence for collections, profiles, teams, the market and
//! trivia scores. Missing keys load as empty defaults.

use crate::creature::{Creature, OwnerId};
use crate::errors::{CollectorError, CollectorResult};
use crate::market::Market;
use crate::profile::Profile;
use crate::team::Team;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use strum::{AsRefStr, EnumIter};
use tracing::trace;

const MARKET_KEY: &str = "listings";
const SCORES_KEY: &str = "trivia";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Bucket {
    Collections,
    Profiles,
    Teams,
    Market,
    Scores,
    ExpeditionLevels,
}

/// Synchronous document store. Implementors only move JSON text around;
/// the typed accessors are provided.
pub trait Store {
    fn read(&self, bucket: Bucket, key: &str) -> CollectorResult<Option<String>>;
    fn write(&mut self, bucket: Bucket, key: &str, document: &str) -> CollectorResult<()>;
    fn remove(&mut self, bucket: Bucket, key: &str) -> CollectorResult<()>;
    fn keys(&self, bucket: Bucket) -> CollectorResult<Vec<String>>;

    fn load_collection(&self, owner: &str) -> CollectorResult<Vec<Creature>> {
        load_or_default(self, Bucket::Collections, owner)
    }

    fn save_collection(&mut self, owner: &str, creatures: &[Creature]) -> CollectorResult<()> {
        save(self, Bucket::Collections, owner, &creatures)
    }

    fn load_profile(&self, user: &str) -> CollectorResult<Option<Profile>> {
        load(self, Bucket::Profiles, user)
    }

    fn save_profile(&mut self, profile: &Profile) -> CollectorResult<()> {
        save(self, Bucket::Profiles, &profile.user_id, profile)
    }

    fn load_team(&self, owner: &str) -> CollectorResult<Team> {
        Ok(load(self, Bucket::Teams, owner)?.unwrap_or_else(|| Team::new(owner)))
    }

    fn save_team(&mut self, team: &Team) -> CollectorResult<()> {
        save(self, Bucket::Teams, &team.owner_id, team)
    }

    fn load_market(&self) -> CollectorResult<Market> {
        load_or_default(self, Bucket::Market, MARKET_KEY)
    }

    fn save_market(&mut self, market: &Market) -> CollectorResult<()> {
        save(self, Bucket::Market, MARKET_KEY, market)
    }

    fn load_scores(&self) -> CollectorResult<BTreeMap<OwnerId, u32>> {
        load_or_default(self, Bucket::Scores, SCORES_KEY)
    }

    fn save_scores(&mut self, scores: &BTreeMap<OwnerId, u32>) -> CollectorResult<()> {
        save(self, Bucket::Scores, SCORES_KEY, scores)
    }

    fn load_expedition_level(&self, user: &str) -> CollectorResult<Option<u8>> {
        load(self, Bucket::ExpeditionLevels, user)
    }

    fn save_expedition_level(&mut self, user: &str, level: u8) -> CollectorResult<()> {
        save(self, Bucket::ExpeditionLevels, user, &level)
    }

    /// Remove everything stored for `user`.
    fn delete_user(&mut self, user: &str) -> CollectorResult<()> {
        for bucket in [
            Bucket::Collections,
            Bucket::Profiles,
            Bucket::Teams,
            Bucket::ExpeditionLevels,
        ] {
            self.remove(bucket, user)?;
        }
        Ok(())
    }
}

fn load<S, T>(store: &S, bucket: Bucket, key: &str) -> CollectorResult<Option<T>>
where
    S: Store + ?Sized,
    T: DeserializeOwned,
{
    match store.read(bucket, key)? {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

fn load_or_default<S, T>(store: &S, bucket: Bucket, key: &str) -> CollectorResult<T>
where
    S: Store + ?Sized,
    T: DeserializeOwned + Default,
{
    Ok(load(store, bucket, key)?.unwrap_or_default())
}

fn save<S, T>(store: &mut S, bucket: Bucket, key: &str, value: &T) -> CollectorResult<()>
where
    S: Store + ?Sized,
    T: Serialize + ?Sized,
{
    let text = serde_json::to_string_pretty(value)?;
    store.write(bucket, key, &text)
}

/// Keeps documents in memory. Used by tests and short-lived games.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: HashMap<(Bucket, String), String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn read(&self, bucket: Bucket, key: &str) -> CollectorResult<Option<String>> {
        Ok(self.documents.get(&(bucket, key.to_string())).cloned())
    }

    fn write(&mut self, bucket: Bucket, key: &str, document: &str) -> CollectorResult<()> {
        self.documents
            .insert((bucket, key.to_string()), document.to_string());
        Ok(())
    }

    fn remove(&mut self, bucket: Bucket, key: &str) -> CollectorResult<()> {
        self.documents.remove(&(bucket, key.to_string()));
        Ok(())
    }

    fn keys(&self, bucket: Bucket) -> CollectorResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .documents
            .keys()
            .filter(|(b, _)| *b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// One JSON file per entity at `<root>/<bucket>/<key>.json`.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn open(root: impl Into<PathBuf>) -> CollectorResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(JsonDirStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, bucket: Bucket, key: &str) -> CollectorResult<PathBuf> {
        let safe = !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(['/', '\\', '\0']);
        if !safe {
            return Err(CollectorError::invalid(format!("unusable storage key '{}'", key)));
        }
        Ok(self.root.join(bucket.as_ref()).join(format!("{}.json", key)))
    }
}

impl Store for JsonDirStore {
    fn read(&self, bucket: Bucket, key: &str) -> CollectorResult<Option<String>> {
        let path = self.path_for(bucket, key)?;
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, bucket: Bucket, key: &str, document: &str) -> CollectorResult<()> {
        let path = self.path_for(bucket, key)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        // Write then rename so a crash never leaves half a document
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, document)?;
        fs::rename(&tmp, &path)?;
        trace!(path = %path.display(), "document written");
        Ok(())
    }

    fn remove(&mut self, bucket: Bucket, key: &str) -> CollectorResult<()> {
        let path = self.path_for(bucket, key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self, bucket: Bucket) -> CollectorResult<Vec<String>> {
        let dir = self.root.join(bucket.as_ref());
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creature::test_support::sample_creature;
    use crate::species::SpeciesCatalog;
    use pretty_assertions::assert_eq;

    fn exercise_store<S: Store>(store: &mut S) {
        let catalog = SpeciesCatalog::builtin().unwrap();

        assert!(store.load_collection("ash").unwrap().is_empty());
        assert_eq!(store.load_profile("ash").unwrap(), None);
        assert_eq!(store.load_team("ash").unwrap(), Team::new("ash"));
        assert!(store.load_market().unwrap().is_empty());

        let mut pikachu = sample_creature(&catalog, "Pikachu", "ash");
        pikachu.id = 1;
        store.save_collection("ash", &[pikachu.clone()]).unwrap();
        assert_eq!(store.load_collection("ash").unwrap(), vec![pikachu]);

        let profile = Profile::new("ash", "Ash", "Kanto");
        store.save_profile(&profile).unwrap();
        assert_eq!(store.load_profile("ash").unwrap(), Some(profile));

        let scores = BTreeMap::from([("ash".to_string(), 4)]);
        store.save_scores(&scores).unwrap();
        assert_eq!(store.load_scores().unwrap(), scores);

        store.save_expedition_level("ash", 2).unwrap();
        assert_eq!(store.load_expedition_level("ash").unwrap(), Some(2));

        assert_eq!(store.keys(Bucket::Collections).unwrap(), vec!["ash".to_string()]);

        store.delete_user("ash").unwrap();
        assert!(store.load_collection("ash").unwrap().is_empty());
        assert_eq!(store.load_profile("ash").unwrap(), None);
        assert_eq!(store.load_expedition_level("ash").unwrap(), None);
        // scores live under a shared key and are left to the caller
        assert_eq!(store.load_scores().unwrap(), scores);
    }

    #[test]
    fn test_memory_store() {
        exercise_store(&mut MemoryStore::new());
    }

    #[test]
    fn test_json_dir_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonDirStore::open(dir.path()).unwrap();
        exercise_store(&mut store);
    }

    #[test]
    fn test_json_dir_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonDirStore::open(dir.path()).unwrap();
        store.save_team(&Team::new("42")).unwrap();

        let path = dir.path().join("teams").join("42.json");
        let text = fs::read_to_string(path).unwrap();
        let team: Team = serde_json::from_str(&text).unwrap();
        assert_eq!(team.owner_id, "42");
    }

    #[test]
    fn test_bad_keys_and_documents() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonDirStore::open(dir.path()).unwrap();

        assert!(matches!(
            store.write(Bucket::Profiles, "../escape", "{}"),
            Err(CollectorError::InvalidArgument(_))
        ));

        store.write(Bucket::Profiles, "ash", "not json").unwrap();
        assert!(matches!(
            store.load_profile("ash"),
            Err(CollectorError::Storage(_))
        ));
    }
}
