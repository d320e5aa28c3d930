use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::domain::cache::EmployeeCountCache;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntry {
    employees_required: u32,
    saved_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    entries: BTreeMap<String, CacheEntry>,
}

/// Disk-backed cache of preprocessor employee counts.
///
/// Read-mostly; writes serialise the whole file to a sibling temp path and
/// atomically rename it over the old one, so concurrent workers never see a
/// torn file. Corrupt or missing files behave as an empty cache.
pub struct DiskRatioCache {
    path: PathBuf,
    lock: Mutex<()>,
}

impl DiskRatioCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> CacheFile {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(path = %self.path.display(), "corrupt ratio cache, starting fresh: {e}");
                CacheFile::default()
            }),
            Err(_) => CacheFile::default(),
        }
    }

    fn store(&self, file: &CacheFile) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let body = serde_json::to_string_pretty(file)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        let tmp = temp_path(&self.path);
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

impl EmployeeCountCache for DiskRatioCache {
    fn get(&self, key: &str) -> Option<u32> {
        let _guard = self.lock.lock().ok()?;
        let file = self.load();
        let hit = file.entries.get(key).map(|e| e.employees_required);
        if hit.is_some() {
            tracing::debug!(key, "ratio cache hit");
        }
        hit
    }

    fn put(&self, key: &str, employees_required: u32) {
        let Ok(_guard) = self.lock.lock() else {
            return;
        };
        let mut file = self.load();
        file.entries.insert(
            key.to_string(),
            CacheEntry {
                employees_required,
                saved_at: chrono::Utc::now(),
            },
        );
        if let Err(e) = self.store(&file) {
            tracing::warn!(path = %self.path.display(), "ratio cache write failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratio_cache.json");
        let cache = DiskRatioCache::new(&path);

        assert_eq!(cache.get("k1"), None);
        cache.put("k1", 7);
        assert_eq!(cache.get("k1"), Some(7));

        // a second handle sees the persisted value
        let reopened = DiskRatioCache::new(&path);
        assert_eq!(reopened.get("k1"), Some(7));

        // overwrite updates in place
        cache.put("k1", 9);
        assert_eq!(reopened.get("k1"), Some(9));
    }

    #[test]
    fn corrupt_files_reset_instead_of_failing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratio_cache.json");
        std::fs::write(&path, "not json at all").unwrap();

        let cache = DiskRatioCache::new(&path);
        assert_eq!(cache.get("k1"), None);
        cache.put("k1", 3);
        assert_eq!(cache.get("k1"), Some(3));
    }

    #[test]
    fn no_stray_temp_files_after_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratio_cache.json");
        let cache = DiskRatioCache::new(&path);
        cache.put("k1", 1);
        cache.put("k2", 2);

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["ratio_cache.json"]);
    }
}
