//! Catalog listing cache.
//!
//! List responses are written as JSON files in the cache directory so the
//! CLI can answer listing commands offline. Only public catalog data lands
//! here, never credentials.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::models::{ApiUser, Category, Product};

/// Consider cached listings stale after 1 hour.
const CACHE_STALE_MINUTES: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() > CACHE_STALE_MINUTES
    }

    /// Human-readable age for listing headers.
    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}

pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<CachedData<T>>> {
        let path = self.cache_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", name))?;
        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", name))?;

        debug!(name, age_minutes = cached.age_minutes(), "cache hit");
        Ok(Some(cached))
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let cached = CachedData::new(data);
        let contents = serde_json::to_string_pretty(&cached)?;
        std::fs::write(self.cache_path(name), contents)
            .with_context(|| format!("Failed to write cache file: {}", name))?;
        Ok(())
    }

    // ===== Products =====

    pub fn load_products(&self) -> Result<Option<CachedData<Vec<Product>>>> {
        self.load("products")
    }

    pub fn save_products(&self, products: &[Product]) -> Result<()> {
        self.save("products", &products)
    }

    // ===== Users =====

    pub fn load_users(&self) -> Result<Option<CachedData<Vec<ApiUser>>>> {
        self.load("users")
    }

    pub fn save_users(&self, users: &[ApiUser]) -> Result<()> {
        self.save("users", &users)
    }

    // ===== Categories =====

    pub fn load_categories(&self) -> Result<Option<CachedData<Vec<Category>>>> {
        self.load("categories")
    }

    pub fn save_categories(&self, categories: &[Category]) -> Result<()> {
        self.save("categories", &categories)
    }

    /// Drop every cached listing.
    pub fn clear(&self) -> Result<()> {
        for name in ["products", "users", "categories"] {
            let path = self.cache_path(name);
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove cache file: {}", name))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_category() -> Category {
        serde_json::from_str(r#"{"id":1,"name":"Clothes"}"#).expect("Failed to parse category")
    }

    #[test]
    fn test_round_trip_categories() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let cache = CacheManager::new(dir.path().to_path_buf()).expect("Failed to create cache");

        assert!(cache.load_categories().unwrap().is_none());

        cache.save_categories(&[sample_category()]).unwrap();
        let cached = cache.load_categories().unwrap().expect("cache miss");
        assert_eq!(cached.data.len(), 1);
        assert!(!cached.is_stale());

        cache.clear().unwrap();
        assert!(cache.load_categories().unwrap().is_none());
    }

    #[test]
    fn test_staleness_threshold() {
        let fresh = CachedData::new(vec![sample_category()]);
        assert!(!fresh.is_stale());

        let old = CachedData {
            data: vec![sample_category()],
            cached_at: Utc::now() - Duration::minutes(CACHE_STALE_MINUTES + 5),
        };
        assert!(old.is_stale());
    }

    #[test]
    fn test_age_display() {
        let mut cached = CachedData::new(());
        assert_eq!(cached.age_display(), "just now");

        cached.cached_at = Utc::now() - Duration::minutes(5);
        assert_eq!(cached.age_display(), "5m ago");

        cached.cached_at = Utc::now() - Duration::hours(3);
        assert_eq!(cached.age_display(), "3h ago");
    }
}
