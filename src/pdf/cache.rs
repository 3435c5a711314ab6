//! LRU cache for rendered page rasters

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use super::types::RenderedPage;

/// Cache key for rendered pages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Page number
    pub page: usize,
    /// Scale factor (stored as millionths for stable hashing)
    pub scale_millionths: u32,
}

impl CacheKey {
    #[must_use]
    pub fn new(page: usize, scale: f32) -> Self {
        Self {
            page,
            scale_millionths: (scale * 1_000_000.0).round() as u32,
        }
    }
}

/// LRU cache for rendered page data.
///
/// Only rasters and raw runs are cached; text layers are rebuilt on every
/// display.
pub struct PageCache {
    cache: LruCache<CacheKey, Arc<RenderedPage>>,
}

impl PageCache {
    /// Create a new cache with the given capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Get a cached page, promoting it in the LRU order
    #[must_use]
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<RenderedPage>> {
        self.cache.get(key).cloned()
    }

    /// Check if a key is in the cache without promoting it
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.cache.contains(key)
    }

    /// Insert a page into the cache, returning an Arc to the data
    pub fn insert(&mut self, key: CacheKey, data: RenderedPage) -> Arc<RenderedPage> {
        let arc = Arc::new(data);
        self.cache.put(key, Arc::clone(&arc));
        arc
    }

    /// Clear all cached pages
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::types::{RasterSurface, Viewport};

    fn page(n: usize, scale: f32) -> RenderedPage {
        RenderedPage {
            viewport: Viewport::new(n, 10.0, 10.0, scale),
            surface: RasterSurface::blank(1, 1),
            runs: Vec::new(),
        }
    }

    #[test]
    fn scale_is_part_of_the_key() {
        let mut cache = PageCache::new(4);
        cache.insert(CacheKey::new(0, 1.0), page(0, 1.0));

        assert!(cache.contains(&CacheKey::new(0, 1.0)));
        assert!(!cache.contains(&CacheKey::new(0, 1.5)));
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = PageCache::new(2);
        cache.insert(CacheKey::new(0, 1.0), page(0, 1.0));
        cache.insert(CacheKey::new(1, 1.0), page(1, 1.0));
        let _ = cache.get(&CacheKey::new(0, 1.0));
        cache.insert(CacheKey::new(2, 1.0), page(2, 1.0));

        assert!(cache.contains(&CacheKey::new(0, 1.0)));
        assert!(!cache.contains(&CacheKey::new(1, 1.0)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn invalidate_all_drops_every_scale() {
        let mut cache = PageCache::new(8);
        cache.insert(CacheKey::new(0, 1.0), page(0, 1.0));
        cache.insert(CacheKey::new(0, 2.0), page(0, 2.0));
        cache.insert(CacheKey::new(1, 1.0), page(1, 1.0));

        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_capacity_falls_back_to_one() {
        let mut cache = PageCache::new(0);
        cache.insert(CacheKey::new(0, 1.0), page(0, 1.0));
        assert_eq!(cache.len(), 1);
    }
}
