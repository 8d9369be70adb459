//! Icon rasterization and the memoized, request-coalescing icon cache.
//!
//! Rendering never waits on an icon: [`IconCache::lookup`] returns what is ready and
//! schedules the rest on the tokio runtime, and callers draw a plain disc meanwhile.

use crate::LocationType;
use crate::colors::Rgb;
use resvg::{tiny_skia, usvg};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::OnceCell;

/// Smallest and largest icon edge, in pixels.
const MIN_ICON_SIZE: u32 = 4;
const MAX_ICON_SIZE: u32 = 128;

/// Errors that can occur while rasterizing an icon.
#[derive(Error, Debug, Clone)]
pub enum IconError {
    #[error("failed to parse glyph for {location_type:?}: {message}")]
    Svg {
        location_type: LocationType,
        message: String,
    },
    #[error("failed to allocate {0}x{0} icon pixmap")]
    Allocation(u32),
    #[error("icon rasterization task failed: {0}")]
    Task(String),
}

/// Identity of a rasterized icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IconKey {
    pub location_type: LocationType,
    /// Edge length in pixels, quantized to even values
    pub size: u32,
    pub color: Rgb,
}

impl IconKey {
    /// Builds a key for an icon drawn `size_px` wide, quantizing the size so zooming
    /// does not create a new bitmap per frame.
    pub fn new(location_type: LocationType, size_px: f32, color: Rgb) -> Self {
        let size = if size_px.is_finite() {
            (size_px.round().max(0.0) as u32).clamp(MIN_ICON_SIZE, MAX_ICON_SIZE)
        } else {
            MIN_ICON_SIZE
        };
        Self {
            location_type,
            size: size + size % 2,
            color,
        }
    }
}

/// Turns an icon key into a bitmap. Implementations must be cheap to share across threads.
pub trait IconRasterizer: Send + Sync + 'static {
    fn rasterize(&self, key: &IconKey) -> Result<tiny_skia::Pixmap, IconError>;
}

/// Rasterizes one fixed vector glyph per location type through `resvg`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SvgIconRasterizer;

/// Glyph outlines on a 24x24 canvas.
pub fn glyph_path(location_type: LocationType) -> &'static str {
    match location_type {
        LocationType::Town => "M3 11 L12 3 L21 11 V21 H15 V15 H9 V21 H3 Z",
        LocationType::City => "M3 21 V9 H8 V3 H16 V12 H21 V21 Z",
        LocationType::Village => "M2 21 V13 L7 8 L12 13 V21 Z M13 21 V11 L18 6 L23 11 V21 Z",
        LocationType::Dungeon => "M4 21 V11 A8 8 0 0 1 20 11 V21 H15 V15 H9 V21 Z",
        LocationType::Forest => "M12 2 L20 13 H15 L19 19 H13 V22 H11 V19 H5 L9 13 H4 Z",
        LocationType::Mountain => "M1 21 L9 6 L13 13 L16 9 L23 21 Z",
        LocationType::Cave => {
            "M2 21 C2 10 7 4 12 4 C17 4 22 10 22 21 H16 C16 16 14 13 12 13 C10 13 8 16 8 21 Z"
        }
        LocationType::Ruins => "M3 21 V8 H7 V21 Z M10 21 V12 H14 V21 Z M17 21 V4 H21 V21 Z",
        LocationType::Shrine => {
            "M12 2 L15 9 L22 9 L16.5 13.5 L18.5 21 L12 16.5 L5.5 21 L7.5 13.5 L2 9 L9 9 Z"
        }
        LocationType::Landmark => "M5 22 V2 H7 V3 H20 L17 7.5 L20 12 H7 V22 Z",
        LocationType::Unknown => "M12 3 A9 9 0 1 1 11.99 3 Z",
    }
}

impl IconRasterizer for SvgIconRasterizer {
    fn rasterize(&self, key: &IconKey) -> Result<tiny_skia::Pixmap, IconError> {
        let svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{size}" height="{size}" viewBox="0 0 24 24"><path d="{path}" fill="{color}"/></svg>"#,
            size = key.size,
            path = glyph_path(key.location_type),
            color = key.color,
        );
        let tree = usvg::Tree::from_str(&svg, &usvg::Options::default()).map_err(|err| {
            IconError::Svg {
                location_type: key.location_type,
                message: err.to_string(),
            }
        })?;
        let mut pixmap =
            tiny_skia::Pixmap::new(key.size, key.size).ok_or(IconError::Allocation(key.size))?;
        resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());
        Ok(pixmap)
    }
}

type Slot = Arc<OnceCell<Arc<tiny_skia::Pixmap>>>;

struct IconCacheInner {
    rasterizer: Arc<dyn IconRasterizer>,
    slots: Mutex<HashMap<IconKey, Slot>>,
    failed: Mutex<HashSet<IconKey>>,
    runtime: Option<Handle>,
}

/// Append-only cache of rasterized icons, cheap to clone and share with tasks.
#[derive(Clone)]
pub struct IconCache {
    inner: Arc<IconCacheInner>,
}

impl std::fmt::Debug for IconCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IconCache")
            .field("entries", &self.len())
            .field("has_runtime", &self.inner.runtime.is_some())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl IconCache {
    /// A cache that never schedules work on its own; only [`IconCache::get`] fills it.
    pub fn new(rasterizer: impl IconRasterizer) -> Self {
        Self::build(Arc::new(rasterizer), None)
    }

    /// A cache that rasterizes missing icons on `runtime` when looked up.
    pub fn with_runtime(rasterizer: impl IconRasterizer, runtime: Handle) -> Self {
        Self::build(Arc::new(rasterizer), Some(runtime))
    }

    fn build(rasterizer: Arc<dyn IconRasterizer>, runtime: Option<Handle>) -> Self {
        Self {
            inner: Arc::new(IconCacheInner {
                rasterizer,
                slots: Mutex::new(HashMap::new()),
                failed: Mutex::new(HashSet::new()),
                runtime,
            }),
        }
    }

    fn slot(&self, key: &IconKey) -> Slot {
        Arc::clone(lock(&self.inner.slots).entry(*key).or_default())
    }

    /// Resolves an icon, rasterizing it at most once no matter how many callers ask
    /// concurrently.
    pub async fn get(&self, key: IconKey) -> Result<Arc<tiny_skia::Pixmap>, IconError> {
        let slot = self.slot(&key);
        let rasterizer = Arc::clone(&self.inner.rasterizer);
        let result = slot
            .get_or_try_init(|| async move {
                log::debug!(
                    "Rasterizing {:?} icon at {}px in {}",
                    key.location_type,
                    key.size,
                    key.color
                );
                let pixmap = tokio::task::spawn_blocking(move || rasterizer.rasterize(&key))
                    .await
                    .map_err(|err| IconError::Task(err.to_string()))??;
                Ok::<_, IconError>(Arc::new(pixmap))
            })
            .await;

        match result {
            Ok(pixmap) => Ok(Arc::clone(pixmap)),
            Err(err) => {
                log::warn!("Icon rasterization failed, using fallback shape: {err}");
                lock(&self.inner.failed).insert(key);
                Err(err)
            }
        }
    }

    /// Non-blocking lookup for the render loop.
    ///
    /// Returns the bitmap if it is ready. Otherwise schedules rasterization (once) and
    /// returns `None`; failed keys are never rescheduled.
    pub fn lookup(&self, key: &IconKey) -> Option<Arc<tiny_skia::Pixmap>> {
        {
            let mut slots = lock(&self.inner.slots);
            if let Some(slot) = slots.get(key) {
                return slot.get().cloned();
            }
            if lock(&self.inner.failed).contains(key) {
                return None;
            }
            let Some(runtime) = &self.inner.runtime else {
                return None;
            };
            slots.insert(*key, Slot::default());
            let cache = self.clone();
            let key = *key;
            runtime.spawn(async move {
                let _ = cache.get(key).await;
            });
        }
        None
    }

    pub fn is_failed(&self, key: &IconKey) -> bool {
        lock(&self.inner.failed).contains(key)
    }

    /// Whether `key` has been scheduled but has neither resolved nor failed yet.
    pub fn is_pending(&self, key: &IconKey) -> bool {
        let in_flight = lock(&self.inner.slots)
            .get(key)
            .is_some_and(|slot| !slot.initialized());
        in_flight && !self.is_failed(key)
    }

    /// Number of keys that have been requested, ready or not.
    pub fn len(&self) -> usize {
        lock(&self.inner.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evicts entries rejected by `keep`. In-flight work for an evicted key still
    /// completes but its result is dropped with the slot.
    pub fn retain(&self, mut keep: impl FnMut(&IconKey) -> bool) {
        lock(&self.inner.slots).retain(|key, _| keep(key));
        lock(&self.inner.failed).retain(|key| keep(key));
    }

    pub fn clear(&self) {
        lock(&self.inner.slots).clear();
        lock(&self.inner.failed).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingRasterizer {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl IconRasterizer for CountingRasterizer {
        fn rasterize(&self, key: &IconKey) -> Result<tiny_skia::Pixmap, IconError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            if self.fail {
                return Err(IconError::Allocation(key.size));
            }
            tiny_skia::Pixmap::new(key.size, key.size).ok_or(IconError::Allocation(key.size))
        }
    }

    fn counting(fail: bool) -> (CountingRasterizer, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            CountingRasterizer {
                calls: Arc::clone(&calls),
                fail,
            },
            calls,
        )
    }

    fn key() -> IconKey {
        IconKey::new(LocationType::Town, 16.0, Rgb::new(255, 0, 0))
    }

    #[test]
    fn key_size_is_quantized() {
        let k = IconKey::new(LocationType::Cave, 12.6, Rgb::new(0, 0, 0));
        assert_eq!(k.size, 14);
        assert_eq!(IconKey::new(LocationType::Cave, 0.0, Rgb::new(0, 0, 0)).size, 4);
        assert_eq!(IconKey::new(LocationType::Cave, 1e9, Rgb::new(0, 0, 0)).size, 128);
        assert_eq!(IconKey::new(LocationType::Cave, f32::NAN, Rgb::new(0, 0, 0)).size, 4);
    }

    #[test]
    fn svg_rasterizer_draws_every_glyph() {
        for location_type in LocationType::ALL {
            let key = IconKey::new(location_type, 24.0, Rgb::new(255, 255, 255));
            let pixmap = SvgIconRasterizer.rasterize(&key).unwrap();
            assert_eq!((pixmap.width(), pixmap.height()), (24, 24));
            assert!(
                pixmap.pixels().iter().any(|px| px.alpha() > 0),
                "{location_type:?} glyph is empty"
            );
        }
    }

    #[tokio::test]
    async fn concurrent_requests_coalesce() {
        let (rasterizer, calls) = counting(false);
        let cache = IconCache::new(rasterizer);
        let (a, b) = tokio::join!(cache.get(key()), cache.get(key()));
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.get(key()).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lookup_without_runtime_never_blocks_or_rasterizes() {
        let (rasterizer, calls) = counting(false);
        let cache = IconCache::new(rasterizer);
        assert!(cache.lookup(&key()).is_none());
        assert!(cache.lookup(&key()).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn lookup_schedules_once_then_serves_cached() {
        let (rasterizer, calls) = counting(false);
        let cache = IconCache::with_runtime(rasterizer, Handle::current());
        assert!(cache.lookup(&key()).is_none());
        assert!(cache.lookup(&key()).is_none());

        cache.get(key()).await.unwrap();
        assert!(cache.lookup(&key()).is_some());
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn failures_fall_back_and_are_not_retried() {
        let (rasterizer, calls) = counting(true);
        let cache = IconCache::with_runtime(rasterizer, Handle::current());
        assert!(cache.get(key()).await.is_err());
        assert!(cache.is_failed(&key()));
        assert!(cache.lookup(&key()).is_none());
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retain_evicts_keys() {
        let cache = IconCache::new(SvgIconRasterizer);
        let handle = tokio::runtime::Runtime::new().unwrap();
        handle.block_on(cache.get(key())).unwrap();
        assert_eq!(cache.len(), 1);
        cache.retain(|k| k.location_type != LocationType::Town);
        assert!(cache.is_empty());
    }
}
