//! Bounded page cache and model cache at the collaborator boundary

use crate::Result;
use crate::template::TrainedModel;
use crate::traits::{ModelStore, Rasterizer};
use opencv::core::Mat;
use parking_lot::{Mutex, RwLock};
use pidscan_core::Error;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Default number of rendered pages kept
pub const DEFAULT_PAGE_CACHE_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PageKey {
    path: PathBuf,
    page: usize,
    dpi: u32,
}

#[derive(Default)]
struct PageEntries {
    pages: HashMap<PageKey, Mat>,
    order: VecDeque<PageKey>,
}

/// Rasterizer decorator keeping the most recently inserted pages
///
/// Evicts the oldest inserted page once `capacity` is reached.
pub struct PageCache<R> {
    inner: R,
    capacity: usize,
    entries: Mutex<PageEntries>,
}

impl<R: Rasterizer> PageCache<R> {
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_PAGE_CACHE_SIZE)
    }

    pub fn with_capacity(inner: R, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            entries: Mutex::new(PageEntries::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.pages.clear();
        entries.order.clear();
    }

    fn key(path: &Path, page: usize, dpi: u32) -> PageKey {
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        PageKey { path, page, dpi }
    }
}

impl<R: Rasterizer> Rasterizer for PageCache<R> {
    fn render_page(&self, path: &Path, page_index: usize, dpi: u32) -> Result<Mat> {
        let key = Self::key(path, page_index, dpi);

        if let Some(page) = self.entries.lock().pages.get(&key) {
            return Ok(page.clone());
        }

        // render outside the lock; a concurrent miss may render twice
        let page = self.inner.render_page(path, page_index, dpi)?;

        let mut entries = self.entries.lock();
        if !entries.pages.contains_key(&key) {
            while entries.pages.len() >= self.capacity {
                let Some(oldest) = entries.order.pop_front() else { break };
                entries.pages.remove(&oldest);
                debug!("Evicted page {} of {:?}", oldest.page, oldest.path);
            }
            entries.order.push_back(key.clone());
            entries.pages.insert(key, page.clone());
        }

        Ok(page)
    }
}

/// Loaded-model cache over a [`ModelStore`]
pub struct ModelCache {
    store: Arc<dyn ModelStore>,
    models: RwLock<HashMap<String, Arc<TrainedModel>>>,
}

impl ModelCache {
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self {
            store,
            models: RwLock::new(HashMap::new()),
        }
    }

    /// Cached model, loading it from the store on first use
    pub fn get(&self, model_id: &str) -> Result<Arc<TrainedModel>> {
        if let Some(model) = self.models.read().get(model_id) {
            return Ok(Arc::clone(model));
        }

        let model = self
            .store
            .load(model_id)?
            .ok_or_else(|| Error::ModelUnavailable(model_id.to_string()))?;
        let model = Arc::new(model);

        info!(
            "Loaded model {} ({} templates)",
            model_id,
            model.template_count()
        );

        let mut models = self.models.write();
        Ok(Arc::clone(
            models.entry(model_id.to_string()).or_insert(model),
        ))
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.models.read().contains_key(model_id)
    }

    /// Drop every cached model; call when the backing files change
    pub fn invalidate_all(&self) {
        let mut models = self.models.write();
        let count = models.len();
        models.clear();
        debug!("Invalidated {} cached models", count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{CV_8UC1, Scalar};
    use opencv::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingRasterizer {
        renders: AtomicUsize,
    }

    impl Rasterizer for CountingRasterizer {
        fn render_page(&self, _path: &Path, page_index: usize, _dpi: u32) -> Result<Mat> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            let value = page_index as f64;
            Ok(Mat::new_rows_cols_with_default(4, 4, CV_8UC1, Scalar::all(value))?)
        }
    }

    #[derive(Default)]
    struct CountingStore {
        loads: AtomicUsize,
    }

    impl ModelStore for CountingStore {
        fn load(&self, model_id: &str) -> Result<Option<TrainedModel>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok((model_id != "missing").then(|| TrainedModel::new(model_id)))
        }
    }

    #[test]
    fn test_page_cache_hits_and_evicts_oldest() -> Result<()> {
        let cache = PageCache::with_capacity(CountingRasterizer::default(), 2);
        let path = Path::new("drawing.pdf");

        cache.render_page(path, 0, 150)?;
        cache.render_page(path, 0, 150)?;
        assert_eq!(cache.inner.renders.load(Ordering::SeqCst), 1);

        // different dpi is a different page
        cache.render_page(path, 0, 300)?;
        cache.render_page(path, 1, 150)?;
        assert_eq!(cache.len(), 2);

        // page 0 @150 was the oldest and is gone
        cache.render_page(path, 0, 150)?;
        assert_eq!(cache.inner.renders.load(Ordering::SeqCst), 4);

        let page = cache.render_page(path, 1, 150)?;
        assert_eq!(*page.at_2d::<u8>(0, 0)?, 1);

        cache.clear();
        assert!(cache.is_empty());
        Ok(())
    }

    #[test]
    fn test_model_cache_loads_once_until_invalidated() -> Result<()> {
        let store = Arc::new(CountingStore::default());
        let cache = ModelCache::new(store.clone());

        let a = cache.get("flow_1")?;
        let b = cache.get("flow_1")?;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);

        cache.invalidate_all();
        assert!(!cache.contains("flow_1"));
        cache.get("flow_1")?;
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[test]
    fn test_missing_model_is_unavailable() {
        let cache = ModelCache::new(Arc::new(CountingStore::default()));
        let err = cache.get("missing").unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::ModelUnavailable("missing".into()))
        );
    }
}
