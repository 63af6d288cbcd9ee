//! Driver memory accounting.
//!
//! Sizes are estimates computed from the dimensions and formats handed to the
//! driver; the driver is free to pad or compress them.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;

/// The kind of storage an allocation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Buffer object storage.
    Buffer,
    /// Texture storage, all levels and layers.
    Texture,
    /// Renderbuffer storage, all samples.
    Renderbuffer,
}

#[derive(Default)]
struct Counter {
    objects: AtomicU64,
    bytes: AtomicU64,
}

impl Counter {
    fn load(&self) -> (u64, u64) {
        (
            self.objects.load(Ordering::Relaxed),
            self.bytes.load(Ordering::Relaxed),
        )
    }
}

/// Subtract without wrapping below zero.
fn saturating_sub(counter: &AtomicU64, amount: u64) {
    // The closure always returns `Some`, so the update cannot fail.
    let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        Some(current.saturating_sub(amount))
    });
}

/// Live object counts and estimated bytes, shared by every wrapper created
/// from the same [`GpuContext`](crate::GpuContext).
#[derive(Default)]
pub struct MemoryStats {
    buffers: Counter,
    textures: Counter,
    renderbuffers: Counter,
}

/// A point-in-time copy of [`MemoryStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    /// Live buffer objects.
    pub buffers: u64,
    /// Bytes of buffer storage.
    pub buffer_bytes: u64,
    /// Live texture objects.
    pub textures: u64,
    /// Bytes of texture storage.
    pub texture_bytes: u64,
    /// Live renderbuffer objects.
    pub renderbuffers: u64,
    /// Bytes of renderbuffer storage.
    pub renderbuffer_bytes: u64,
}

impl MemoryUsage {
    /// Sum of all storage.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.buffer_bytes + self.texture_bytes + self.renderbuffer_bytes
    }
}

impl MemoryStats {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, kind: ResourceKind) -> &Counter {
        match kind {
            ResourceKind::Buffer => &self.buffers,
            ResourceKind::Texture => &self.textures,
            ResourceKind::Renderbuffer => &self.renderbuffers,
        }
    }

    /// Record a newly created object.
    pub fn record_object(&self, kind: ResourceKind) {
        self.counter(kind).objects.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a deleted object, releasing `bytes` of its storage.
    pub fn release_object(&self, kind: ResourceKind, bytes: u64) {
        let counter = self.counter(kind);
        saturating_sub(&counter.objects, 1);
        saturating_sub(&counter.bytes, bytes);
    }

    /// Record storage replacing `old` bytes with `new` bytes on one object.
    pub fn resize(&self, kind: ResourceKind, old: u64, new: u64) {
        let counter = self.counter(kind);
        if new >= old {
            counter.bytes.fetch_add(new - old, Ordering::Relaxed);
        } else {
            saturating_sub(&counter.bytes, old - new);
        }
    }

    /// Record a storage change the driver was asked for, but only if
    /// `outcome` says it succeeded. The outcome is passed through.
    pub(crate) fn resize_checked(
        &self,
        kind: ResourceKind,
        old: u64,
        new: u64,
        outcome: Result<()>,
    ) -> Result<()> {
        outcome?;
        self.resize(kind, old, new);
        Ok(())
    }

    /// Copy the current counters.
    #[must_use]
    pub fn snapshot(&self) -> MemoryUsage {
        let (buffers, buffer_bytes) = self.buffers.load();
        let (textures, texture_bytes) = self.textures.load();
        let (renderbuffers, renderbuffer_bytes) = self.renderbuffers.load();
        MemoryUsage {
            buffers,
            buffer_bytes,
            textures,
            texture_bytes,
            renderbuffers,
            renderbuffer_bytes,
        }
    }

    /// Total estimated bytes across all kinds.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.snapshot().total_bytes()
    }
}

impl std::fmt::Debug for MemoryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.snapshot(), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_resize_release() {
        let stats = MemoryStats::new();
        stats.record_object(ResourceKind::Buffer);
        stats.resize(ResourceKind::Buffer, 0, 1024);
        stats.record_object(ResourceKind::Texture);
        stats.resize(ResourceKind::Texture, 0, 4096);

        let usage = stats.snapshot();
        assert_eq!(usage.buffers, 1);
        assert_eq!(usage.buffer_bytes, 1024);
        assert_eq!(usage.textures, 1);
        assert_eq!(usage.total_bytes(), 5120);

        stats.resize(ResourceKind::Buffer, 1024, 256);
        assert_eq!(stats.snapshot().buffer_bytes, 256);

        stats.release_object(ResourceKind::Buffer, 256);
        let usage = stats.snapshot();
        assert_eq!(usage.buffers, 0);
        assert_eq!(usage.buffer_bytes, 0);
        assert_eq!(stats.total_bytes(), 4096);
    }

    #[test]
    fn failed_storage_is_not_counted() {
        let stats = MemoryStats::new();
        stats.record_object(ResourceKind::Buffer);
        let failed = stats.resize_checked(
            ResourceKind::Buffer,
            0,
            1 << 30,
            Err(crate::Error::Driver {
                operation: "buffer allocation",
                code: glow::OUT_OF_MEMORY,
                name: "GL_OUT_OF_MEMORY",
            }),
        );
        assert!(matches!(failed, Err(crate::Error::Driver { .. })));
        assert_eq!(stats.snapshot().buffer_bytes, 0);

        assert!(stats.resize_checked(ResourceKind::Buffer, 0, 64, Ok(())).is_ok());
        assert_eq!(stats.snapshot().buffer_bytes, 64);
    }

    #[test]
    fn release_saturates_at_zero() {
        let stats = MemoryStats::new();
        stats.release_object(ResourceKind::Renderbuffer, 100);
        let usage = stats.snapshot();
        assert_eq!(usage.renderbuffers, 0);
        assert_eq!(usage.renderbuffer_bytes, 0);
    }

    #[test]
    fn counters_are_shared_across_threads() {
        let stats = std::sync::Arc::new(MemoryStats::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        stats.record_object(ResourceKind::Texture);
                        stats.resize(ResourceKind::Texture, 0, 4);
                    }
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().is_ok());
        }
        let usage = stats.snapshot();
        assert_eq!(usage.textures, 400);
        assert_eq!(usage.texture_bytes, 1600);
    }
}
