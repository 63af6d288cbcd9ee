//! An off-screen render target: an optional MSAA color renderbuffer resolved
//! into a sampleable texture.
//!
//! ```text
//!   draw ──► msaa framebuffer ──(resolve blit)──► resolve framebuffer
//!            (renderbuffer, N samples)             (texture, sampleable)
//! ```
//!
//! With zero samples, drawing goes straight into the resolve framebuffer and
//! [`RenderTarget::resolve`] is a no-op.

use crate::{
    context::{GpuContext, Limits},
    error::Result,
    format::TextureFormat,
    framebuffer::{Attachment, ClearFlags, ClearValues, Framebuffer, FramebufferTarget, Rect},
    renderbuffer::Renderbuffer,
    sampler::{FilterMode, SamplerDesc},
    texture::Texture,
};

/// Samples per pixel for the draw half; 0 means no MSAA half at all.
fn draw_samples(limits: &Limits, requested: u32) -> u32 {
    limits.clamp_samples(requested)
}

/// Same-size copies take texels as-is; scaled copies filter.
fn present_filter(size: (u32, u32), dst: Rect) -> FilterMode {
    if (dst.width, dst.height) == size {
        FilterMode::Nearest
    } else {
        FilterMode::Linear
    }
}

/// Create a framebuffer with `attach` applied, deleting it if that fails.
unsafe fn complete_framebuffer(
    ctx: &GpuContext,
    attach: impl FnOnce(&mut Framebuffer) -> Result<()>,
) -> Result<Framebuffer> {
    let mut framebuffer = unsafe { Framebuffer::new(ctx) }?;
    let attached =
        attach(&mut framebuffer).and_then(|()| unsafe { framebuffer.check_complete() });
    match attached {
        Ok(()) => Ok(framebuffer),
        Err(err) => {
            unsafe { framebuffer.destroy() };
            Err(err)
        }
    }
}

/// The multisampled half of a [`RenderTarget`].
struct Msaa {
    framebuffer: Framebuffer,
    color: Renderbuffer,
}

impl Msaa {
    unsafe fn new(
        ctx: &GpuContext,
        width: u32,
        height: u32,
        format: TextureFormat,
        samples: u32,
    ) -> Result<Self> {
        let color = unsafe { Renderbuffer::new(ctx, width, height, format, samples) }?;
        let framebuffer = unsafe {
            complete_framebuffer(ctx, |fb| fb.attach_renderbuffer(Attachment::Color(0), &color))
        };
        match framebuffer {
            Ok(framebuffer) => Ok(Self { framebuffer, color }),
            Err(err) => {
                unsafe { color.destroy() };
                Err(err)
            }
        }
    }
}

/// A color render target with optional multisampling.
pub struct RenderTarget {
    ctx: GpuContext,
    resolve: Framebuffer,
    texture: Texture,
    msaa: Option<Msaa>,
    size: (u32, u32),
}

impl RenderTarget {
    /// Create a `width` x `height` target. `samples == 0` disables
    /// multisampling.
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
        let texture = unsafe {
            Texture::new_2d(ctx, width, height, format, Some(SamplerDesc::LINEAR_CLAMP), None)
        }?;
        let resolve = unsafe {
            complete_framebuffer(ctx, |fb| fb.attach_texture(Attachment::Color(0), &texture, 0))
        };
        let resolve = match resolve {
            Ok(resolve) => resolve,
            Err(err) => {
                unsafe { texture.destroy() };
                return Err(err);
            }
        };

        let samples = draw_samples(ctx.limits(), samples);
        let msaa = if samples > 0 {
            match unsafe { Msaa::new(ctx, width, height, format, samples) } {
                Ok(msaa) => Some(msaa),
                Err(err) => {
                    unsafe {
                        resolve.destroy();
                        texture.destroy();
                    }
                    return Err(err);
                }
            }
        } else {
            None
        };

        log::debug!("created {width}x{height} render target, {samples} samples");
        Ok(Self {
            ctx: ctx.clone(),
            resolve,
            texture,
            msaa,
            size: (width, height),
        })
    }

    /// The framebuffer draws should go to.
    fn draw_framebuffer(&self) -> &Framebuffer {
        self.msaa
            .as_ref()
            .map_or(&self.resolve, |msaa| &msaa.framebuffer)
    }

    /// Whether both halves already have the given size.
    fn has_size(&self, width: u32, height: u32) -> bool {
        let texture = (self.texture.width(), self.texture.height());
        let msaa = self
            .msaa
            .as_ref()
            .map_or((width, height), |msaa| (msaa.color.width(), msaa.color.height()));
        texture == (width, height) && msaa == (width, height)
    }

    /// Resize both halves. Contents are discarded.
    ///
    /// If resizing fails partway, [`size`](Self::size) reports the resolve
    /// texture's size and calling `resize` again retries the remaining half.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if self.has_size(width, height) {
            return Ok(());
        }
        let result = unsafe { self.resize_halves(width, height) };
        self.size = (self.texture.width(), self.texture.height());
        result
    }

    unsafe fn resize_halves(&mut self, width: u32, height: u32) -> Result<()> {
        unsafe {
            self.texture.resize(width, height)?;
            // Re-attaching picks up the new storage on drivers that cache
            // attachment dimensions.
            self.resolve.attach_texture(Attachment::Color(0), &self.texture, 0)?;
            if let Some(msaa) = &mut self.msaa {
                msaa.color.resize(width, height)?;
                msaa.framebuffer
                    .attach_renderbuffer(Attachment::Color(0), &msaa.color)?;
            }
        }
        Ok(())
    }

    /// Bind for drawing, set the viewport to the whole target and clear it.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn begin(&self, clear: Option<[f32; 4]>) -> Result<()> {
        let framebuffer = self.draw_framebuffer();
        unsafe {
            framebuffer.bind(FramebufferTarget::Both);
            self.ctx.set_viewport(0, 0, self.size.0, self.size.1)?;
            if let Some(color) = clear {
                framebuffer.clear(
                    ClearFlags::COLOR,
                    &ClearValues {
                        color,
                        ..ClearValues::default()
                    },
                );
            }
        }
        Ok(())
    }

    /// Resolve multisampled content into [`texture`](Self::texture).
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn resolve(&self) -> Result<()> {
        let Some(msaa) = &self.msaa else {
            return Ok(());
        };
        let rect = Rect::from_size(self.size.0, self.size.1);
        unsafe {
            msaa.framebuffer.blit_to(
                Some(&self.resolve),
                rect,
                rect,
                ClearFlags::COLOR,
                FilterMode::Nearest,
            )
        }
    }

    /// Resolve (if needed) and copy the result to the default framebuffer at
    /// `dst`.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn present(&self, dst: Rect) -> Result<()> {
        unsafe { self.resolve() }?;
        let src = Rect::from_size(self.size.0, self.size.1);
        let filter = present_filter(self.size, dst);
        unsafe {
            self.resolve
                .blit_to(None, src, dst, ClearFlags::COLOR, filter)
        }
    }

    /// The resolved color texture.
    #[must_use]
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    /// Current size.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Samples per pixel of the draw framebuffer; 0 without multisampling.
    #[must_use]
    pub fn samples(&self) -> u32 {
        self.msaa.as_ref().map_or(0, |msaa| msaa.color.samples())
    }

    /// Delete every object the target owns.
    ///
    /// # Safety
    ///
    /// Must be called with the context current.
    pub unsafe fn destroy(self) {
        unsafe {
            if let Some(msaa) = self.msaa {
                msaa.framebuffer.destroy();
                msaa.color.destroy();
            }
            self.resolve.destroy();
            self.texture.destroy();
        }
    }
}

impl std::fmt::Debug for RenderTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTarget")
            .field("size", &self.size)
            .field("samples", &self.samples())
            .field("texture", &self.texture)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_samples_disables_msaa() {
        let limits = Limits::GL33_MINIMUM;
        assert_eq!(draw_samples(&limits, 0), 0);
        assert_eq!(draw_samples(&limits, 2), 2);
        assert_eq!(draw_samples(&limits, 16), limits.max_samples);
    }

    #[test]
    fn present_filters_only_when_scaling() {
        let same = Rect {
            x: 20,
            y: 10,
            width: 640,
            height: 480,
        };
        assert_eq!(present_filter((640, 480), same), FilterMode::Nearest);
        assert_eq!(present_filter((640, 480), Rect::from_size(1280, 960)), FilterMode::Linear);
        assert_eq!(present_filter((640, 480), Rect::from_size(640, 479)), FilterMode::Linear);
    }
}
