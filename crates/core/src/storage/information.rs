use crate::storage::JsonArrayFile;
use crate::types::{normalize_tags, now_millis, InfoId, NewInformation, StoredInformation};
use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// File-backed store for saved information (notes, fetched pages, summaries)
pub struct InformationStore {
    file: JsonArrayFile<StoredInformation>,
    lock: Mutex<()>,
}

impl InformationStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            file: JsonArrayFile::open(path)?,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Save a new entry
    pub async fn save(&self, new: NewInformation) -> Result<StoredInformation> {
        let _guard = self.lock.lock().await;
        let mut entries = self.file.load().await?;

        let info = StoredInformation {
            id: InfoId::generate(),
            title: new.title,
            content: new.content,
            source: new.source,
            summary: new.summary,
            tags: new.tags.into_iter().collect(),
            metadata: new.metadata,
            created_at: now_millis(),
        };

        entries.push(info.clone());
        self.file.save(&entries).await?;

        tracing::info!("Saved information {} ({})", info.id, info.title);
        Ok(info)
    }

    pub async fn get(&self, id: &InfoId) -> Result<Option<StoredInformation>> {
        let _guard = self.lock.lock().await;
        let entries = self.file.load().await?;
        Ok(entries.into_iter().find(|i| &i.id == id))
    }

    /// Case-insensitive substring search over title, content and summary
    pub async fn search(&self, query: &str) -> Result<Vec<StoredInformation>> {
        let _guard = self.lock.lock().await;
        let entries = self.file.load().await?;
        Ok(entries.into_iter().filter(|i| i.matches_query(query)).collect())
    }

    /// Entries carrying every requested tag
    pub async fn search_by_tags<I, S>(&self, tags: I) -> Result<Vec<StoredInformation>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let wanted = normalize_tags(tags);
        let _guard = self.lock.lock().await;
        let entries = self.file.load().await?;
        Ok(entries
            .into_iter()
            .filter(|i| i.has_all_tags(&wanted))
            .collect())
    }

    /// Newest first, optionally truncated
    pub async fn list(&self, limit: Option<usize>) -> Result<Vec<StoredInformation>> {
        let _guard = self.lock.lock().await;
        let mut entries = self.file.load().await?;

        // Ties on created_at keep the latest insertion first
        entries.reverse();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    pub async fn delete(&self, id: &InfoId) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut entries = self.file.load().await?;

        let before = entries.len();
        entries.retain(|i| &i.id != id);
        if entries.len() == before {
            return Ok(false);
        }

        self.file.save(&entries).await?;
        tracing::info!("Deleted information {}", id);
        Ok(true)
    }

    pub async fn stats(&self) -> Result<InformationStats> {
        let _guard = self.lock.lock().await;
        let entries = self.file.load().await?;
        Ok(InformationStats::compute(&entries))
    }
}

/// Aggregate view over saved information
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InformationStats {
    pub total: usize,
    pub tags: BTreeMap<String, usize>,
    pub sources: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest: Option<StoredInformation>,
}

impl InformationStats {
    pub fn compute(entries: &[StoredInformation]) -> Self {
        let mut tags = BTreeMap::new();
        let mut sources = BTreeMap::new();

        for entry in entries {
            for tag in &entry.tags {
                *tags.entry(tag.clone()).or_insert(0) += 1;
            }
            if let Some(source) = &entry.source {
                *sources.entry(source.clone()).or_insert(0) += 1;
            }
        }

        Self {
            total: entries.len(),
            tags,
            sources,
            newest: entries.iter().max_by_key(|e| e.created_at).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn store(temp_dir: &TempDir) -> InformationStore {
        InformationStore::new(temp_dir.path().join("information.json")).unwrap()
    }

    #[tokio::test]
    async fn test_save_and_get_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        let saved = store
            .save(
                NewInformation::new("Rust async", "Futures are lazy")
                    .with_source("https://example.com/async")
                    .with_tags(["Rust", "async"]),
            )
            .await
            .unwrap();
        assert!(saved.id.0.starts_with("info_"));
        assert!(saved.tags.contains("Rust"));

        let reopened = InformationStore::new(store.path()).unwrap();
        let fetched = reopened.get(&saved.id).await.unwrap().unwrap();
        assert_eq!(fetched, saved);
        let expected: BTreeSet<String> = ["Rust".to_string(), "async".to_string()].into();
        assert_eq!(fetched.tags, expected);
    }

    #[tokio::test]
    async fn test_tags_keep_their_case() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let saved = store
            .save(NewInformation::new("Borrowing", "").with_tags(["Rust"]))
            .await
            .unwrap();

        let fetched = store.get(&saved.id).await.unwrap().unwrap();
        assert_eq!(fetched.tags, BTreeSet::from(["Rust".to_string()]));

        let hits = store.search_by_tags(["rust"]).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].tags.contains("Rust"));
        assert_eq!(store.search_by_tags(["RUST"]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        store
            .save(NewInformation::new("Tokio notes", "Runtime internals"))
            .await
            .unwrap();
        store
            .save(NewInformation::new("Cooking", "Pasta recipe"))
            .await
            .unwrap();

        let hits = store.search("RUNTIME").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Tokio notes");
        assert!(store.search("nothing here").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_by_tags_requires_all() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        store
            .save(NewInformation::new("a", "").with_tags(["rust", "web"]))
            .await
            .unwrap();
        store
            .save(NewInformation::new("b", "").with_tags(["rust"]))
            .await
            .unwrap();

        assert_eq!(store.search_by_tags(["Rust"]).await.unwrap().len(), 2);
        let both = store.search_by_tags(["rust", "web"]).await.unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].title, "a");
    }

    #[tokio::test]
    async fn test_list_newest_first_with_limit() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        for title in ["first", "second", "third"] {
            store.save(NewInformation::new(title, "")).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let all = store.list(None).await.unwrap();
        let titles: Vec<_> = all.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["third", "second", "first"]);

        assert_eq!(store.list(Some(2)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let saved = store.save(NewInformation::new("x", "y")).await.unwrap();

        assert!(store.delete(&saved.id).await.unwrap());
        assert!(!store.delete(&saved.id).await.unwrap());
        assert!(store.get(&saved.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stats() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        store
            .save(
                NewInformation::new("a", "")
                    .with_source("web")
                    .with_tags(["rust"]),
            )
            .await
            .unwrap();
        store
            .save(NewInformation::new("b", "").with_tags(["rust", "db"]))
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.tags.get("rust"), Some(&2));
        assert_eq!(stats.tags.get("db"), Some(&1));
        assert_eq!(stats.sources.get("web"), Some(&1));
        assert!(stats.newest.is_some());
    }
}
