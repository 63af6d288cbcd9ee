//! Buffer objects.

use bytemuck::Pod;
use glow::HasContext;

use crate::{
    context::GpuContext,
    error::{gl_len, Error, Result},
    stats::ResourceKind,
};

/// Buffer binding targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// `GL_ARRAY_BUFFER`, vertex attributes.
    Array,
    /// `GL_ELEMENT_ARRAY_BUFFER`, indices. Bound per vertex array object.
    ElementArray,
    /// `GL_UNIFORM_BUFFER`.
    Uniform,
    /// `GL_PIXEL_PACK_BUFFER`, pixel read-back.
    PixelPack,
    /// `GL_PIXEL_UNPACK_BUFFER`, texture uploads.
    PixelUnpack,
    /// `GL_COPY_READ_BUFFER`.
    CopyRead,
    /// `GL_COPY_WRITE_BUFFER`.
    CopyWrite,
    /// `GL_TRANSFORM_FEEDBACK_BUFFER`.
    TransformFeedback,
}

impl BufferTarget {
    /// Number of targets, for per-target tables.
    pub const COUNT: usize = 8;

    /// The GL enum.
    #[must_use]
    pub const fn gl(self) -> u32 {
        match self {
            Self::Array => glow::ARRAY_BUFFER,
            Self::ElementArray => glow::ELEMENT_ARRAY_BUFFER,
            Self::Uniform => glow::UNIFORM_BUFFER,
            Self::PixelPack => glow::PIXEL_PACK_BUFFER,
            Self::PixelUnpack => glow::PIXEL_UNPACK_BUFFER,
            Self::CopyRead => glow::COPY_READ_BUFFER,
            Self::CopyWrite => glow::COPY_WRITE_BUFFER,
            Self::TransformFeedback => glow::TRANSFORM_FEEDBACK_BUFFER,
        }
    }

    /// Position in per-target tables.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether the target has indexed binding points (`glBindBufferBase`).
    #[must_use]
    pub const fn is_indexed(self) -> bool {
        matches!(self, Self::Uniform | Self::TransformFeedback)
    }

    /// The target data is uploaded through for buffers of this target.
    ///
    /// The element binding belongs to whichever vertex array is bound, and a
    /// bound pixel buffer turns later texture transfers into buffer offsets,
    /// so those buffers are written through `GL_COPY_WRITE_BUFFER` instead.
    #[must_use]
    pub const fn upload_target(self) -> Self {
        match self {
            Self::ElementArray | Self::PixelPack | Self::PixelUnpack => Self::CopyWrite,
            other => other,
        }
    }
}

/// Usage hint passed to `glBufferData`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BufferUsage {
    /// Written once, drawn many times.
    #[default]
    StaticDraw,
    /// Rewritten occasionally, drawn many times.
    DynamicDraw,
    /// Rewritten every frame.
    StreamDraw,
    /// Written by GL once, read by the application many times.
    StaticRead,
    /// Written by GL occasionally, read many times.
    DynamicRead,
    /// Written by GL and read once.
    StreamRead,
    /// Written by GL once, used by GL many times.
    StaticCopy,
    /// Written by GL occasionally, used by GL many times.
    DynamicCopy,
    /// Written by GL and used once.
    StreamCopy,
}

impl BufferUsage {
    /// The GL enum.
    #[must_use]
    pub const fn gl(self) -> u32 {
        match self {
            Self::StaticDraw => glow::STATIC_DRAW,
            Self::DynamicDraw => glow::DYNAMIC_DRAW,
            Self::StreamDraw => glow::STREAM_DRAW,
            Self::StaticRead => glow::STATIC_READ,
            Self::DynamicRead => glow::DYNAMIC_READ,
            Self::StreamRead => glow::STREAM_READ,
            Self::StaticCopy => glow::STATIC_COPY,
            Self::DynamicCopy => glow::DYNAMIC_COPY,
            Self::StreamCopy => glow::STREAM_COPY,
        }
    }
}

/// Check that `len` bytes at `offset` fit in a store of `size` bytes.
fn check_range(offset: usize, len: usize, size: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        end => Err(Error::OutOfBounds {
            offset,
            end: end.unwrap_or(usize::MAX),
            size,
        }),
    }
}

/// A GL buffer object with a fixed default target.
///
/// The buffer remembers its store size so sub-uploads can be bounds checked
/// and memory statistics kept current.
pub struct Buffer {
    ctx: GpuContext,
    raw: glow::Buffer,
    target: BufferTarget,
    usage: BufferUsage,
    size: usize,
}

impl Buffer {
    /// Create a buffer with no storage.
    ///
    /// # Safety
    ///
    /// Requires `ctx` to be current.
    pub unsafe fn new(ctx: &GpuContext, target: BufferTarget, usage: BufferUsage) -> Result<Self> {
        let raw = unsafe { ctx.gl().create_buffer() }.map_err(Error::create("buffer"))?;
        ctx.stats().record_object(ResourceKind::Buffer);
        log::debug!("created {target:?} buffer {raw:?}");
        Ok(Self {
            ctx: ctx.clone(),
            raw,
            target,
            usage,
            size: 0,
        })
    }

    /// Create a buffer and upload `data` into it.
    ///
    /// # Safety
    ///
    /// Requires `ctx` to be current.
    pub unsafe fn with_data<T: Pod>(
        ctx: &GpuContext,
        target: BufferTarget,
        usage: BufferUsage,
        data: &[T],
    ) -> Result<Self> {
        let mut buffer = unsafe { Self::new(ctx, target, usage) }?;
        if let Err(err) = unsafe { buffer.set_data(data) } {
            unsafe { buffer.destroy() };
            return Err(err);
        }
        Ok(buffer)
    }

    /// Bind to the buffer's target.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn bind(&self) {
        unsafe { self.ctx.bind_buffer(self.target, Some(self.raw)) };
    }

    /// Unbind whatever is bound to this buffer's target.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn unbind(&self) {
        unsafe { self.ctx.bind_buffer(self.target, None) };
    }

    /// Whether the binding cache has this buffer bound to its target.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.ctx.bound_buffer(self.target) == Some(self.raw)
    }

    /// Bind to indexed binding point `index` of the buffer's target.
    ///
    /// # Safety
    ///
    /// Requires the context to be current and the target to be indexed.
    pub unsafe fn bind_base(&self, index: u32) {
        debug_assert!(self.target.is_indexed(), "{:?} has no indexed bindings", self.target);
        unsafe { self.ctx.gl().bind_buffer_base(self.target.gl(), index, Some(self.raw)) };
        // glBindBufferBase also replaces the generic binding.
        let _ = self.ctx.state().bind_buffer(self.target, Some(self.raw));
    }

    /// Allocate `size` bytes of uninitialized storage, replacing any
    /// previous store.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn allocate(&mut self, size: usize) -> Result<()> {
        let len = gl_len(size)?;
        unsafe {
            let target = self.bind_for_upload();
            self.ctx.gl().buffer_data_size(target, len, self.usage.gl());
        }
        let outcome = unsafe { self.ctx.check_error("buffer allocation") };
        self.set_size(size, outcome)
    }

    /// Replace the store with the contents of `data`.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn set_data<T: Pod>(&mut self, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        gl_len(bytes.len())?;
        unsafe {
            let target = self.bind_for_upload();
            self.ctx
                .gl()
                .buffer_data_u8_slice(target, bytes, self.usage.gl());
        }
        let outcome = unsafe { self.ctx.check_error("buffer upload") };
        self.set_size(bytes.len(), outcome)
    }

    /// Overwrite part of the store starting at byte `offset`.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfBounds`] if the write would run past the end of
    /// the store; nothing is uploaded in that case.
    pub unsafe fn update<T: Pod>(&self, offset: usize, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        check_range(offset, bytes.len(), self.size)?;
        let offset = gl_len(offset)?;
        unsafe {
            let target = self.bind_for_upload();
            self.ctx.gl().buffer_sub_data_u8_slice(target, offset, bytes);
        }
        unsafe { self.ctx.check_error("buffer sub-upload") }
    }

    /// Overwrite the whole store with zero bytes.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn clear(&self) -> Result<()> {
        if self.size == 0 {
            return Ok(());
        }
        let zeros = vec![0u8; self.size];
        unsafe { self.update(0, &zeros) }
    }

    /// Copy `len` bytes from `src` at `src_offset` into this buffer at
    /// `dst_offset`, entirely on the GPU.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn copy_from(
        &self,
        src: &Buffer,
        src_offset: usize,
        dst_offset: usize,
        len: usize,
    ) -> Result<()> {
        check_range(src_offset, len, src.size)?;
        check_range(dst_offset, len, self.size)?;
        let (read, write, size) = (gl_len(src_offset)?, gl_len(dst_offset)?, gl_len(len)?);
        unsafe {
            self.ctx.bind_buffer(BufferTarget::CopyRead, Some(src.raw));
            self.ctx.bind_buffer(BufferTarget::CopyWrite, Some(self.raw));
            self.ctx.gl().copy_buffer_sub_data(
                glow::COPY_READ_BUFFER,
                glow::COPY_WRITE_BUFFER,
                read,
                write,
                size,
            );
        }
        unsafe { self.ctx.check_error("buffer copy") }
    }

    /// Bind to the upload target and return its GL enum.
    unsafe fn bind_for_upload(&self) -> u32 {
        let target = self.target.upload_target();
        unsafe { self.ctx.bind_buffer(target, Some(self.raw)) };
        target.gl()
    }

    /// Commit a new store size once the driver has accepted it.
    fn set_size(&mut self, size: usize, outcome: Result<()>) -> Result<()> {
        self.ctx.stats().resize_checked(
            ResourceKind::Buffer,
            self.size as u64,
            size as u64,
            outcome,
        )?;
        self.size = size;
        Ok(())
    }

    /// Store size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Default binding target.
    #[must_use]
    pub fn target(&self) -> BufferTarget {
        self.target
    }

    /// Usage hint given to the driver.
    #[must_use]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// The raw glow handle.
    #[must_use]
    pub fn raw(&self) -> glow::Buffer {
        self.raw
    }

    /// Delete the buffer.
    ///
    /// # Safety
    ///
    /// Must be called with the context current, and the buffer must not be
    /// referenced by any vertex array that is still drawn.
    pub unsafe fn destroy(self) {
        unsafe { self.ctx.gl().delete_buffer(self.raw) };
        self.ctx.state().forget_buffer(self.raw);
        self.ctx
            .stats()
            .release_object(ResourceKind::Buffer, self.size as u64);
        log::debug!("deleted buffer {:?} ({} bytes)", self.raw, self.size);
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("raw", &self.raw)
            .field("target", &self.target)
            .field("usage", &self.usage)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_index_their_table() {
        let targets = [
            BufferTarget::Array,
            BufferTarget::ElementArray,
            BufferTarget::Uniform,
            BufferTarget::PixelPack,
            BufferTarget::PixelUnpack,
            BufferTarget::CopyRead,
            BufferTarget::CopyWrite,
            BufferTarget::TransformFeedback,
        ];
        assert_eq!(targets.len(), BufferTarget::COUNT);
        for (i, target) in targets.into_iter().enumerate() {
            assert_eq!(target.index(), i);
        }
        assert_eq!(BufferTarget::ElementArray.gl(), glow::ELEMENT_ARRAY_BUFFER);
    }

    #[test]
    fn indexed_targets() {
        assert!(BufferTarget::Uniform.is_indexed());
        assert!(BufferTarget::TransformFeedback.is_indexed());
        assert!(!BufferTarget::Array.is_indexed());
    }

    #[test]
    fn uploads_avoid_stateful_targets() {
        assert_eq!(BufferTarget::ElementArray.upload_target(), BufferTarget::CopyWrite);
        assert_eq!(BufferTarget::PixelUnpack.upload_target(), BufferTarget::CopyWrite);
        assert_eq!(BufferTarget::PixelPack.upload_target(), BufferTarget::CopyWrite);
        assert_eq!(BufferTarget::Array.upload_target(), BufferTarget::Array);
        assert_eq!(BufferTarget::Uniform.upload_target(), BufferTarget::Uniform);
    }

    #[test]
    fn usage_enums() {
        assert_eq!(BufferUsage::default().gl(), glow::STATIC_DRAW);
        assert_eq!(BufferUsage::StreamDraw.gl(), glow::STREAM_DRAW);
        assert_eq!(BufferUsage::DynamicCopy.gl(), glow::DYNAMIC_COPY);
    }

    #[test]
    fn range_checks() {
        assert!(check_range(0, 16, 16).is_ok());
        assert!(check_range(16, 0, 16).is_ok());
        assert!(matches!(
            check_range(8, 16, 16),
            Err(Error::OutOfBounds {
                offset: 8,
                end: 24,
                size: 16
            })
        ));
        assert!(matches!(
            check_range(usize::MAX, 1, 16),
            Err(Error::OutOfBounds { end: usize::MAX, .. })
        ));
    }
}
