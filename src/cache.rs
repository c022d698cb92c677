use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::SystemTime;

use log::{debug, warn};
use lru::LruCache;

use crate::streamable::{StreamableResource, StreamableResourceProcessing};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    path: String,
    processing: StreamableResourceProcessing,
}

impl CacheKey {
    pub fn new(path: &str, processing: StreamableResourceProcessing) -> Self {
        Self {
            path: path.to_string(),
            processing,
        }
    }
}

struct CacheEntry {
    resource: Arc<StreamableResource>,
    modified_time: SystemTime,
}

// 每个键一个槽位：槽位锁只在计算期间持有，
// 同一资源同时只会计算一次，不同资源之间互不阻塞
type Slot = Arc<Mutex<Option<CacheEntry>>>;

struct Slots {
    lru: LruCache<CacheKey, Slot>,
    // 仍被请求持有的槽位。LRU 淘汰只影响 `lru`，
    // 正在计算的槽位通过这里继续被同键的请求找到
    live: HashMap<CacheKey, Weak<Mutex<Option<CacheEntry>>>>,
}

impl Slots {
    fn acquire(&mut self, key: &CacheKey) -> Slot {
        if let Some(slot) = self.lru.get(key) {
            return Arc::clone(slot);
        }

        if let Some(slot) = self.live.get(key).and_then(Weak::upgrade) {
            debug!("槽位已被淘汰但仍在使用，重新放入缓存：{:?}", key);
            self.lru.put(key.clone(), Arc::clone(&slot));
            return slot;
        }

        self.live.retain(|_, slot| slot.strong_count() > 0);
        let slot: Slot = Arc::new(Mutex::new(None));
        self.live.insert(key.clone(), Arc::downgrade(&slot));
        self.lru.put(key.clone(), Arc::clone(&slot));
        slot
    }
}

/// 以 (资源, 处理模式) 为键的 LRU 缓存，供多个请求线程共享。
pub struct StreamableCache {
    slots: Mutex<Slots>,
}

impl StreamableCache {
    // 根据容量构造
    pub fn from_capacity(capacity: usize) -> Self {
        let capacity = match NonZeroUsize::new(capacity) {
            Some(c) => c,
            None => panic!("调用from_capacity时指定的大小是0。如果需要自动设置大小，请在调用处进行处理，而不是传入0"),
        };
        Self {
            slots: Mutex::new(Slots {
                lru: LruCache::new(capacity),
                live: HashMap::new(),
            }),
        }
    }

    /// 查询有效缓存，未命中或资源已修改时调用 `compute` 重新计算并放入。
    ///
    /// 同一个键同时最多只有一次计算，即使槽位在计算期间被淘汰。
    pub fn get_or_compute<F>(
        &self,
        key: CacheKey,
        modified_time: SystemTime,
        compute: F,
    ) -> std::io::Result<Arc<StreamableResource>>
    where
        F: FnOnce() -> std::io::Result<StreamableResource>,
    {
        let slot = lock(&self.slots).acquire(&key);

        let mut entry = lock(&slot);
        if let Some(cached) = entry.as_ref() {
            if cached.modified_time == modified_time {
                debug!("缓存命中：{:?}", key);
                return Ok(Arc::clone(&cached.resource));
            }
            debug!("资源已修改，缓存失效：{:?}", key);
        }

        let resource = Arc::new(compute()?);
        *entry = Some(CacheEntry {
            resource: Arc::clone(&resource),
            modified_time,
        });
        Ok(resource)
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        lock(&self.slots).lru.cap().get()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("缓存锁被污染，恢复并继续");
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streamable::CompressionStatus;
    use bytes::Bytes;
    use chrono::Utc;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn streamable(content: &str) -> StreamableResource {
        StreamableResource::new(
            "test.txt",
            "text/plain",
            CompressionStatus::Compressable,
            Utc::now(),
            Bytes::from(content.to_string()),
        )
    }

    fn key(path: &str) -> CacheKey {
        CacheKey::new(path, StreamableResourceProcessing::CompressionDisabled)
    }

    #[test]
    fn test_cache_creation() {
        let cache = StreamableCache::from_capacity(10);
        assert_eq!(cache.capacity(), 10);
        assert!(cache.is_empty());
    }

    #[test]
    #[should_panic(expected = "调用from_capacity时指定的大小是0")]
    fn test_cache_zero_capacity_panics() {
        StreamableCache::from_capacity(0);
    }

    #[test]
    fn test_cache_hit_skips_computation() {
        let cache = StreamableCache::from_capacity(3);
        let time = SystemTime::now();

        let first = cache
            .get_or_compute(key("a.txt"), time, || Ok(streamable("one")))
            .unwrap();
        let second = cache
            .get_or_compute(key("a.txt"), time, || panic!("should be cached"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_processing_mode_is_part_of_key() {
        let cache = StreamableCache::from_capacity(3);
        let time = SystemTime::now();

        cache
            .get_or_compute(key("a.txt"), time, || Ok(streamable("plain")))
            .unwrap();
        let compressed = cache
            .get_or_compute(
                CacheKey::new("a.txt", StreamableResourceProcessing::CompressionEnabled),
                time,
                || Ok(streamable("compressed")),
            )
            .unwrap();
        assert_eq!(compressed.size(), "compressed".len() as u64);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cache_modified_time_invalidation() {
        let cache = StreamableCache::from_capacity(3);
        let time1 = SystemTime::now();
        let time2 = time1 + Duration::from_secs(10);

        cache
            .get_or_compute(key("a.txt"), time1, || Ok(streamable("old")))
            .unwrap();
        let updated = cache
            .get_or_compute(key("a.txt"), time2, || Ok(streamable("new content")))
            .unwrap();
        assert_eq!(updated.size(), 11);
    }

    #[test]
    fn test_cache_lru_eviction() {
        let cache = StreamableCache::from_capacity(2);
        let time = SystemTime::now();
        let computed = AtomicUsize::new(0);
        let compute = |content: &'static str| -> io::Result<StreamableResource> {
            computed.fetch_add(1, Ordering::SeqCst);
            Ok(streamable(content))
        };

        cache.get_or_compute(key("1"), time, || compute("1")).unwrap();
        cache.get_or_compute(key("2"), time, || compute("2")).unwrap();
        cache.get_or_compute(key("1"), time, || compute("1")).unwrap();
        cache.get_or_compute(key("3"), time, || compute("3")).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(computed.load(Ordering::SeqCst), 3);

        // "2" 最久未使用，已被淘汰
        cache.get_or_compute(key("2"), time, || compute("2")).unwrap();
        assert_eq!(computed.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_failed_computation_is_not_cached() {
        let cache = StreamableCache::from_capacity(2);
        let time = SystemTime::now();

        let result = cache.get_or_compute(key("a"), time, || {
            Err(io::Error::new(io::ErrorKind::Other, "boom"))
        });
        assert!(result.is_err());

        let result = cache.get_or_compute(key("a"), time, || Ok(streamable("ok")));
        assert!(result.is_ok());
    }

    #[test]
    fn test_concurrent_requests_compute_once() {
        let cache = Arc::new(StreamableCache::from_capacity(4));
        let computed = Arc::new(AtomicUsize::new(0));
        let time = SystemTime::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let computed = Arc::clone(&computed);
                thread::spawn(move || {
                    cache
                        .get_or_compute(key("shared.js"), time, || {
                            computed.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            Ok(streamable("shared"))
                        })
                        .unwrap()
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(computed.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_eviction_during_computation_does_not_compute_twice() {
        let cache = Arc::new(StreamableCache::from_capacity(1));
        let time = SystemTime::now();
        let computed = Arc::new(AtomicUsize::new(0));
        let running = Arc::new(AtomicUsize::new(0));
        let max_running = Arc::new(AtomicUsize::new(0));

        let spawn = |delay: Duration| {
            let cache = Arc::clone(&cache);
            let computed = Arc::clone(&computed);
            let running = Arc::clone(&running);
            let max_running = Arc::clone(&max_running);
            thread::spawn(move || {
                thread::sleep(delay);
                cache
                    .get_or_compute(key("a.js"), time, || {
                        computed.fetch_add(1, Ordering::SeqCst);
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        max_running.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(200));
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok(streamable("a"))
                    })
                    .unwrap()
            })
        };

        let first = spawn(Duration::ZERO);
        thread::sleep(Duration::from_millis(50));

        // 容量为 1，放入 b.js 会淘汰正在计算的 a.js
        cache
            .get_or_compute(key("b.js"), time, || Ok(streamable("b")))
            .unwrap();
        let second = spawn(Duration::ZERO);

        let first = first.join().unwrap();
        let second = second.join().unwrap();
        assert_eq!(max_running.load(Ordering::SeqCst), 1);
        assert_eq!(computed.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }
}
