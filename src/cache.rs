//! Memoization of model runs.
//!
//! The key covers every input that affects a model run: the full request, the
//! seed image content, the checkpoint, the device and the output format.

use std::{
    num::NonZeroUsize,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
};

use lru::LruCache;

use crate::{
    audio::AudioFormat,
    config::Device,
    model::{InferenceContext, InferenceResult},
    prompt::{InterpolationRequest, PromptEndpoint},
    seed::SeedImage,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EndpointKey {
    text: String,
    negative_text: Option<String>,
    seed: u64,
    denoising: u32,
    guidance: u32,
}

impl From<&PromptEndpoint> for EndpointKey {
    fn from(endpoint: &PromptEndpoint) -> Self {
        Self {
            text: endpoint.text.clone(),
            negative_text: endpoint.negative_text.clone(),
            seed: endpoint.seed,
            denoising: float_bits32(endpoint.denoising),
            guidance: float_bits32(endpoint.guidance),
        }
    }
}

/// Structural key of one model run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    alpha: u64,
    num_inference_steps: u32,
    seed_image_id: String,
    start: EndpointKey,
    end: EndpointKey,
    seed_image: [u8; 32],
    checkpoint: String,
    device: Device,
    output_format: AudioFormat,
}

impl CacheKey {
    pub fn new(
        request: &InterpolationRequest,
        seed_image: &SeedImage,
        context: &InferenceContext,
    ) -> Self {
        Self {
            alpha: float_bits64(request.alpha),
            num_inference_steps: request.num_inference_steps,
            seed_image_id: request.seed_image_id.clone(),
            start: EndpointKey::from(&request.start),
            end: EndpointKey::from(&request.end),
            seed_image: *seed_image.fingerprint(),
            checkpoint: context.checkpoint.clone(),
            device: context.device,
            output_format: context.output_format,
        }
    }
}

// -0.0 and 0.0 share a key
fn float_bits64(value: f64) -> u64 {
    (value + 0.0).to_bits()
}

fn float_bits32(value: f32) -> u32 {
    (value + 0.0).to_bits()
}

/// Hit and miss counters of a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Bounded LRU cache of model results, shareable between threads.
///
/// Model runs happen outside the lock. When two callers compute the same key
/// concurrently the first stored result wins and both get it back.
pub struct InferenceCache {
    entries: Mutex<LruCache<CacheKey, Arc<InferenceResult>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InferenceCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Like [`InferenceCache::new`], a zero capacity is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN))
    }

    fn entries(&self) -> MutexGuard<'_, LruCache<CacheKey, Arc<InferenceResult>>> {
        // a poisoned memo table is still a valid memo table
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<InferenceResult>> {
        self.entries().get(key).cloned()
    }

    /// Stores `result` unless the key is already present, returns the stored value.
    pub fn insert(&self, key: CacheKey, result: InferenceResult) -> Arc<InferenceResult> {
        let mut entries = self.entries();
        if let Some(existing) = entries.get(&key) {
            return existing.clone();
        }
        let result = Arc::new(result);
        entries.put(key, result.clone());
        result
    }

    /// Returns the cached result for `key`, or computes and stores it.
    ///
    /// The boolean is true on a cache hit. Errors from `compute` are not cached.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: CacheKey,
        compute: impl FnOnce() -> Result<InferenceResult, E>,
    ) -> Result<(Arc<InferenceResult>, bool), E> {
        if let Some(result) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok((result, true));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let result = compute()?;
        Ok((self.insert(key, result), false))
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Drops every entry and resets the counters.
    pub fn clear(&self) {
        self.entries().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{audio::AudioBuffer, seed::RgbImage};
    use kornia_image::{Image, ImageSize, allocator::CpuAllocator};

    fn rgb(value: u8) -> RgbImage {
        Image::new(
            ImageSize {
                width: 2,
                height: 2,
            },
            vec![value; 12],
            CpuAllocator,
        )
        .unwrap()
    }

    fn seed(value: u8) -> SeedImage {
        SeedImage::new("test", rgb(value))
    }

    fn result(tag: u8) -> InferenceResult {
        InferenceResult {
            image: rgb(tag),
            audio: AudioBuffer::new(AudioFormat::Wav, vec![tag]),
        }
    }

    fn request(alpha: f64) -> InterpolationRequest {
        InterpolationRequest::new(
            alpha,
            50,
            PromptEndpoint::new("church bells"),
            PromptEndpoint::new("jazz"),
        )
    }

    fn context() -> InferenceContext {
        InferenceContext {
            checkpoint: "ckpt".to_string(),
            device: Device::Cpu,
            output_format: AudioFormat::Wav,
        }
    }

    #[test]
    fn test_hit_skips_compute() {
        let cache = InferenceCache::with_capacity(4);
        let key = CacheKey::new(&request(0.5), &seed(0), &context());
        let mut calls = 0;

        for _ in 0..2 {
            let (stored, _) = cache
                .get_or_try_insert_with(key.clone(), || {
                    calls += 1;
                    Ok::<_, std::io::Error>(result(7))
                })
                .unwrap();
            assert_eq!(stored.audio.as_bytes(), &[7]);
        }

        assert_eq!(calls, 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn test_key_covers_inputs() {
        let base = CacheKey::new(&request(0.5), &seed(0), &context());
        assert_eq!(base, CacheKey::new(&request(0.5), &seed(0), &context()));
        assert_ne!(base, CacheKey::new(&request(0.25), &seed(0), &context()));
        assert_ne!(base, CacheKey::new(&request(0.5), &seed(1), &context()));

        let mut other_device = context();
        other_device.device = Device::Cuda;
        assert_ne!(base, CacheKey::new(&request(0.5), &seed(0), &other_device));

        let mut other_format = context();
        other_format.output_format = AudioFormat::Mp3;
        assert_ne!(base, CacheKey::new(&request(0.5), &seed(0), &other_format));

        let mut other_prompt = request(0.5);
        other_prompt.end.seed = 43;
        assert_ne!(base, CacheKey::new(&other_prompt, &seed(0), &context()));
    }

    #[test]
    fn test_first_write_wins() {
        let cache = InferenceCache::with_capacity(4);
        let key = CacheKey::new(&request(0.0), &seed(0), &context());
        cache.insert(key.clone(), result(1));
        let stored = cache.insert(key.clone(), result(2));
        assert_eq!(stored.audio.as_bytes(), &[1]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_errors_not_cached() {
        let cache = InferenceCache::with_capacity(4);
        let key = CacheKey::new(&request(1.0), &seed(0), &context());
        let failed = cache.get_or_try_insert_with(key.clone(), || {
            Err(std::io::Error::other("engine down"))
        });
        assert!(failed.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_lru_eviction_and_clear() {
        let cache = InferenceCache::with_capacity(2);
        for alpha in [0.0, 0.5, 1.0] {
            cache.insert(CacheKey::new(&request(alpha), &seed(0), &context()), result(0));
        }
        assert_eq!(cache.len(), 2);
        assert!(cache
            .get(&CacheKey::new(&request(0.0), &seed(0), &context()))
            .is_none());

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_concurrent_population() {
        let cache = Arc::new(InferenceCache::with_capacity(8));
        let handles = (0..4)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    let key = CacheKey::new(&request(0.5), &seed(0), &context());
                    cache
                        .get_or_try_insert_with(key, || Ok::<_, std::io::Error>(result(3)))
                        .unwrap()
                        .0
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            assert_eq!(handle.join().unwrap().audio.as_bytes(), &[3]);
        }
        assert_eq!(cache.len(), 1);
    }
}
