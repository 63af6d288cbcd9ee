//! Renderbuffer objects, optionally multisampled.

use glow::HasContext;

use crate::{
    context::{GpuContext, Limits},
    error::{gl_int, Error, Result},
    format::TextureFormat,
    stats::ResourceKind,
};

/// Estimated storage of a renderbuffer. Single-sampled storage counts as one
/// sample.
#[must_use]
pub fn renderbuffer_memory(width: u32, height: u32, format: TextureFormat, samples: u32) -> u64 {
    format.image_size(width, height) * u64::from(samples.max(1))
}

/// A renderbuffer, used as a framebuffer attachment that is never sampled.
pub struct Renderbuffer {
    ctx: GpuContext,
    raw: glow::Renderbuffer,
    format: TextureFormat,
    width: u32,
    height: u32,
    samples: u32,
}

impl Renderbuffer {
    /// Create a renderbuffer. `samples > 0` allocates multisampled storage,
    /// clamped to the driver's `GL_MAX_SAMPLES`.
    ///
    /// # Safety
    ///
    /// Requires `ctx` to be current.
    pub unsafe fn new(
        ctx: &GpuContext,
        width: u32,
        height: u32,
        format: TextureFormat,
        samples: u32,
    ) -> Result<Self> {
        Limits::check_size(width, height, ctx.limits().max_renderbuffer_size)?;
        let raw = unsafe { ctx.gl().create_renderbuffer() }.map_err(Error::create("renderbuffer"))?;
        ctx.stats().record_object(ResourceKind::Renderbuffer);

        let mut renderbuffer = Self {
            ctx: ctx.clone(),
            raw,
            format,
            width: 0,
            height: 0,
            samples: ctx.limits().clamp_samples(samples),
        };
        if let Err(err) = unsafe { renderbuffer.storage(width, height) } {
            unsafe { renderbuffer.destroy() };
            return Err(err);
        }
        log::debug!(
            "created renderbuffer {raw:?} {width}x{height} {format:?} x{}",
            renderbuffer.samples
        );
        Ok(renderbuffer)
    }

    unsafe fn storage(&mut self, width: u32, height: u32) -> Result<()> {
        let (w, h) = (gl_int(width)?, gl_int(height)?);
        let internal_format = self.format.internal_format();
        unsafe {
            self.bind();
            if self.samples > 0 {
                self.ctx.gl().renderbuffer_storage_multisample(
                    glow::RENDERBUFFER,
                    gl_int(self.samples)?,
                    internal_format,
                    w,
                    h,
                );
            } else {
                self.ctx
                    .gl()
                    .renderbuffer_storage(glow::RENDERBUFFER, internal_format, w, h);
            }
        }

        let outcome = unsafe { self.ctx.check_error("renderbuffer storage") };
        let old = renderbuffer_memory(self.width, self.height, self.format, self.samples);
        let new = renderbuffer_memory(width, height, self.format, self.samples);
        self.ctx
            .stats()
            .resize_checked(ResourceKind::Renderbuffer, old, new, outcome)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Reallocate storage at a new size. Contents are discarded.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        Limits::check_size(width, height, self.ctx.limits().max_renderbuffer_size)?;
        unsafe { self.storage(width, height) }
    }

    /// Bind to `GL_RENDERBUFFER`.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn bind(&self) {
        unsafe { self.ctx.bind_renderbuffer(Some(self.raw)) };
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Storage format.
    #[must_use]
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Samples per pixel; 0 for single-sampled storage.
    #[must_use]
    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// The raw glow handle.
    #[must_use]
    pub fn raw(&self) -> glow::Renderbuffer {
        self.raw
    }

    /// Delete the renderbuffer.
    ///
    /// # Safety
    ///
    /// Must be called with the context current.
    pub unsafe fn destroy(self) {
        unsafe { self.ctx.gl().delete_renderbuffer(self.raw) };
        self.ctx.state().forget_renderbuffer(self.raw);
        let bytes = renderbuffer_memory(self.width, self.height, self.format, self.samples);
        self.ctx
            .stats()
            .release_object(ResourceKind::Renderbuffer, bytes);
        log::debug!("deleted renderbuffer {:?}", self.raw);
    }
}

impl std::fmt::Debug for Renderbuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderbuffer")
            .field("raw", &self.raw)
            .field("format", &self.format)
            .field("size", &[self.width, self.height])
            .field("samples", &self.samples)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_scales_with_samples() {
        let single = renderbuffer_memory(800, 600, TextureFormat::Rgba8, 0);
        assert_eq!(single, 800 * 600 * 4);
        assert_eq!(renderbuffer_memory(800, 600, TextureFormat::Rgba8, 1), single);
        assert_eq!(
            renderbuffer_memory(800, 600, TextureFormat::Rgba8, 4),
            single * 4
        );
        assert_eq!(
            renderbuffer_memory(16, 16, TextureFormat::Depth32FStencil8, 0),
            16 * 16 * 8
        );
    }
}
