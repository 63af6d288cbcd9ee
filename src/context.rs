//! The shared GL context handle every wrapper holds.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glow::HasContext;

use crate::{
    buffer::BufferTarget,
    config::ContextConfig,
    error::{error_name, Error, Result},
    framebuffer::FramebufferTarget,
    state::BindState,
    stats::MemoryStats,
    texture::TextureTarget,
};

/// `GL_MAX_TEXTURE_MAX_ANISOTROPY_EXT`.
const MAX_TEXTURE_MAX_ANISOTROPY: u32 = 0x84FF;

/// Extension providing anisotropic filtering.
const ANISOTROPIC_EXTENSION: &str = "GL_EXT_texture_filter_anisotropic";

/// Number of `glGetError` calls before giving up. A lost context can report
/// errors forever.
const MAX_ERROR_DRAIN: usize = 16;

/// Implementation limits queried once at context creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    /// `GL_MAX_TEXTURE_SIZE`.
    pub max_texture_size: u32,
    /// `GL_MAX_CUBE_MAP_TEXTURE_SIZE`.
    pub max_cube_map_size: u32,
    /// `GL_MAX_RENDERBUFFER_SIZE`.
    pub max_renderbuffer_size: u32,
    /// `GL_MAX_SAMPLES`.
    pub max_samples: u32,
    /// `GL_MAX_COLOR_ATTACHMENTS`.
    pub max_color_attachments: u32,
    /// `GL_MAX_DRAW_BUFFERS`.
    pub max_draw_buffers: u32,
    /// `GL_MAX_VERTEX_ATTRIBS`.
    pub max_vertex_attribs: u32,
    /// `GL_MAX_COMBINED_TEXTURE_IMAGE_UNITS`.
    pub max_texture_units: u32,
    /// `GL_MAX_TEXTURE_MAX_ANISOTROPY_EXT`, or `None` without the extension.
    pub max_anisotropy: Option<f32>,
}

impl Limits {
    /// The minimums every OpenGL 3.3 implementation guarantees.
    pub const GL33_MINIMUM: Self = Self {
        max_texture_size: 1024,
        max_cube_map_size: 1024,
        max_renderbuffer_size: 1024,
        max_samples: 4,
        max_color_attachments: 8,
        max_draw_buffers: 8,
        max_vertex_attribs: 16,
        max_texture_units: 48,
        max_anisotropy: None,
    };

    /// Query the limits of the current context.
    ///
    /// # Safety
    ///
    /// Requires a valid, current OpenGL context.
    unsafe fn query(gl: &glow::Context) -> Self {
        let get = |parameter| unsafe { gl.get_parameter_i32(parameter) }.max(0).unsigned_abs();
        let max_anisotropy = gl
            .supported_extensions()
            .contains(ANISOTROPIC_EXTENSION)
            .then(|| unsafe { gl.get_parameter_f32(MAX_TEXTURE_MAX_ANISOTROPY) });
        Self {
            max_texture_size: get(glow::MAX_TEXTURE_SIZE),
            max_cube_map_size: get(glow::MAX_CUBE_MAP_TEXTURE_SIZE),
            max_renderbuffer_size: get(glow::MAX_RENDERBUFFER_SIZE),
            max_samples: get(glow::MAX_SAMPLES),
            max_color_attachments: get(glow::MAX_COLOR_ATTACHMENTS),
            max_draw_buffers: get(glow::MAX_DRAW_BUFFERS),
            max_vertex_attribs: get(glow::MAX_VERTEX_ATTRIBS),
            max_texture_units: get(glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS),
            max_anisotropy,
        }
    }

    /// Reject zero sizes and sizes above `limit`.
    pub fn check_size(width: u32, height: u32, limit: u32) -> Result<()> {
        if width == 0 || height == 0 || width > limit || height > limit {
            Err(Error::InvalidSize {
                width,
                height,
                limit,
            })
        } else {
            Ok(())
        }
    }

    /// Clamp a requested MSAA sample count to what the driver supports.
    #[must_use]
    pub fn clamp_samples(&self, requested: u32) -> u32 {
        if requested > self.max_samples {
            log::warn!(
                "requested {requested} MSAA samples, clamping to {}",
                self.max_samples
            );
            self.max_samples
        } else {
            requested
        }
    }

    /// The anisotropy level to write for a `requested` level: clamped to the
    /// driver maximum and the configured cap, never below 1.0 so a previous
    /// level is always overwritten. `None` when the extension is missing.
    #[must_use]
    pub fn clamp_anisotropy(&self, requested: f32, cap: f32) -> Option<f32> {
        let max = self.max_anisotropy?;
        Some(requested.min(cap).min(max).max(1.0))
    }
}

/// A bind reaches the driver when the cache saw a change, or always when
/// caching is off.
fn needs_bind(changed: bool, cache_bindings: bool) -> bool {
    changed || !cache_bindings
}

struct Inner {
    gl: Arc<glow::Context>,
    state: Mutex<BindState>,
    stats: MemoryStats,
    config: ContextConfig,
    limits: Limits,
}

/// A GL context plus the binding cache and memory counters shared by all
/// wrapper objects created from it.
///
/// Cloning is cheap; clones share the same cache and counters.
///
/// # Example
///
/// ```no_run
/// # use glow_objects::{Buffer, BufferTarget, BufferUsage, ContextConfig, GpuContext};
/// # use std::sync::Arc;
/// # fn example(gl: Arc<glow::Context>) -> glow_objects::Result<()> {
/// let ctx = unsafe { GpuContext::new(gl, ContextConfig::default()) };
/// let vertices: [f32; 6] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
/// let vbo = unsafe {
///     Buffer::with_data(&ctx, BufferTarget::Array, BufferUsage::StaticDraw, &vertices)?
/// };
/// println!("{:?}", ctx.stats().snapshot());
/// unsafe { vbo.destroy() };
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GpuContext {
    inner: Arc<Inner>,
}

impl GpuContext {
    /// Wrap a glow context.
    ///
    /// # Safety
    ///
    /// `gl` must be current on the calling thread.
    pub unsafe fn new(gl: Arc<glow::Context>, config: ContextConfig) -> Self {
        let limits = unsafe { Limits::query(&gl) };
        let version = gl.version();
        log::info!(
            "GL {}.{}{} ({}), max texture {}, max samples {}",
            version.major,
            version.minor,
            if version.is_embedded { " ES" } else { "" },
            version.vendor_info,
            limits.max_texture_size,
            limits.max_samples,
        );
        if config.max_anisotropy > 1.0 && limits.max_anisotropy.is_none() {
            log::warn!("{ANISOTROPIC_EXTENSION} unavailable, anisotropic filtering disabled");
        }

        Self {
            inner: Arc::new(Inner {
                gl,
                state: Mutex::new(BindState::default()),
                stats: MemoryStats::new(),
                config,
                limits,
            }),
        }
    }

    /// The underlying glow context, for calls the wrappers don't cover.
    ///
    /// Binds issued directly through it bypass the binding cache; call
    /// [`invalidate_bindings`](Self::invalidate_bindings) afterwards.
    #[must_use]
    pub fn gl(&self) -> &glow::Context {
        &self.inner.gl
    }

    /// Settings this context was created with.
    #[must_use]
    pub fn config(&self) -> &ContextConfig {
        &self.inner.config
    }

    /// Implementation limits.
    #[must_use]
    pub fn limits(&self) -> &Limits {
        &self.inner.limits
    }

    /// Memory counters shared by all objects of this context.
    #[must_use]
    pub fn stats(&self) -> &MemoryStats {
        &self.inner.stats
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, BindState> {
        // The cache holds no invariants a panic could break.
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a bind recorded by the cache still needs a driver call.
    fn must_bind(&self, changed: bool, what: &str) -> bool {
        let bind = needs_bind(changed, self.inner.config.cache_bindings);
        if !bind {
            log::trace!("elided redundant {what} bind");
        }
        bind
    }

    /// Forget every cached binding so the next bind of each kind reaches the
    /// driver.
    pub fn invalidate_bindings(&self) {
        self.state().reset();
    }

    /// Bind `buffer` to `target`, skipping the call if already bound.
    ///
    /// # Safety
    ///
    /// Requires this context to be current.
    pub unsafe fn bind_buffer(&self, target: BufferTarget, buffer: Option<glow::Buffer>) {
        let changed = self.state().bind_buffer(target, buffer);
        if self.must_bind(changed, "buffer") {
            unsafe { self.gl().bind_buffer(target.gl(), buffer) };
        }
    }

    /// The buffer last bound to `target` through this context.
    #[must_use]
    pub fn bound_buffer(&self, target: BufferTarget) -> Option<glow::Buffer> {
        self.state().buffer(target)
    }

    /// Bind `texture` to `target` on texture unit `unit`.
    ///
    /// # Safety
    ///
    /// Requires this context to be current.
    pub unsafe fn bind_texture(
        &self,
        unit: u32,
        target: TextureTarget,
        texture: Option<glow::Texture>,
    ) {
        let mut state = self.state();
        let unit_changed = state.set_active_unit(unit);
        let changed = state.bind_texture(unit, target, texture);
        drop(state);

        let gl = self.gl();
        if self.must_bind(unit_changed, "active texture unit") {
            unsafe { gl.active_texture(glow::TEXTURE0 + unit) };
        }
        if self.must_bind(changed, "texture") {
            unsafe { gl.bind_texture(target.gl(), texture) };
        }
    }

    /// The texture last bound to `target` on `unit`.
    #[must_use]
    pub fn bound_texture(&self, unit: u32, target: TextureTarget) -> Option<glow::Texture> {
        self.state().texture(unit, target)
    }

    /// Bind a framebuffer. `None` selects the default framebuffer.
    ///
    /// # Safety
    ///
    /// Requires this context to be current.
    pub unsafe fn bind_framebuffer(
        &self,
        target: FramebufferTarget,
        framebuffer: Option<glow::Framebuffer>,
    ) {
        let changed = self.state().bind_framebuffer(target, framebuffer);
        if self.must_bind(changed, "framebuffer") {
            unsafe { self.gl().bind_framebuffer(target.gl(), framebuffer) };
        }
    }

    /// The framebuffer last bound to `target`.
    #[must_use]
    pub fn bound_framebuffer(&self, target: FramebufferTarget) -> Option<glow::Framebuffer> {
        self.state().framebuffer(target)
    }

    /// Bind a renderbuffer to `GL_RENDERBUFFER`.
    ///
    /// # Safety
    ///
    /// Requires this context to be current.
    pub unsafe fn bind_renderbuffer(&self, renderbuffer: Option<glow::Renderbuffer>) {
        let changed = self.state().bind_renderbuffer(renderbuffer);
        if self.must_bind(changed, "renderbuffer") {
            unsafe { self.gl().bind_renderbuffer(glow::RENDERBUFFER, renderbuffer) };
        }
    }

    /// Bind a vertex array object.
    ///
    /// # Safety
    ///
    /// Requires this context to be current.
    pub unsafe fn bind_vertex_array(&self, vertex_array: Option<glow::VertexArray>) {
        let changed = self.state().bind_vertex_array(vertex_array);
        if self.must_bind(changed, "vertex array") {
            unsafe { self.gl().bind_vertex_array(vertex_array) };
        }
    }

    /// The vertex array last bound.
    #[must_use]
    pub fn bound_vertex_array(&self) -> Option<glow::VertexArray> {
        self.state().vertex_array()
    }

    /// Make `program` current.
    ///
    /// # Safety
    ///
    /// Requires this context to be current.
    pub unsafe fn use_program(&self, program: Option<glow::Program>) {
        let changed = self.state().use_program(program);
        if self.must_bind(changed, "program") {
            unsafe { self.gl().use_program(program) };
        }
    }

    /// The program last made current.
    #[must_use]
    pub fn current_program(&self) -> Option<glow::Program> {
        self.state().program()
    }

    /// Set the viewport rectangle.
    ///
    /// # Safety
    ///
    /// Requires this context to be current.
    pub unsafe fn set_viewport(&self, x: i32, y: i32, width: u32, height: u32) -> Result<()> {
        let (w, h) = (crate::error::gl_int(width)?, crate::error::gl_int(height)?);
        unsafe { self.gl().viewport(x, y, w, h) };
        Ok(())
    }

    /// Drain `glGetError` and report the first error, if error checks are
    /// enabled in the [`ContextConfig`].
    ///
    /// # Safety
    ///
    /// Requires this context to be current.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Driver`] naming `operation` when the driver flagged
    /// an error.
    pub unsafe fn check_error(&self, operation: &'static str) -> Result<()> {
        if !self.inner.config.check_errors {
            return Ok(());
        }

        let mut first = None;
        for _ in 0..MAX_ERROR_DRAIN {
            let code = unsafe { self.gl().get_error() };
            if code == glow::NO_ERROR {
                break;
            }
            log::error!("{} ({code:#x}) after {operation}", error_name(code));
            first.get_or_insert(code);
        }

        match first {
            Some(code) => Err(Error::Driver {
                operation,
                code,
                name: error_name(code),
            }),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("config", &self.inner.config)
            .field("limits", &self.inner.limits)
            .field("stats", &self.inner.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::SamplerDesc;

    #[test]
    fn check_size_rejects_zero_and_oversize() {
        assert!(Limits::check_size(256, 256, 1024).is_ok());
        assert!(Limits::check_size(1024, 1, 1024).is_ok());
        assert!(matches!(
            Limits::check_size(0, 16, 1024),
            Err(Error::InvalidSize { width: 0, .. })
        ));
        assert!(matches!(
            Limits::check_size(16, 2048, 1024),
            Err(Error::InvalidSize { limit: 1024, .. })
        ));
    }

    #[test]
    fn clamp_samples() {
        let limits = Limits::GL33_MINIMUM;
        assert_eq!(limits.clamp_samples(0), 0);
        assert_eq!(limits.clamp_samples(4), 4);
        assert_eq!(limits.clamp_samples(16), 4);
    }

    #[test]
    fn clamp_anisotropy() {
        let without = Limits::GL33_MINIMUM;
        assert_eq!(without.clamp_anisotropy(8.0, 16.0), None);

        let with = Limits {
            max_anisotropy: Some(16.0),
            ..Limits::GL33_MINIMUM
        };
        assert_eq!(with.clamp_anisotropy(8.0, 16.0), Some(8.0));
        assert_eq!(with.clamp_anisotropy(8.0, 4.0), Some(4.0));
        assert_eq!(with.clamp_anisotropy(32.0, 32.0), Some(16.0));
        assert_eq!(with.clamp_anisotropy(1.0, 16.0), Some(1.0));
    }

    #[test]
    fn switching_to_plain_sampler_resets_anisotropy() {
        let limits = Limits {
            max_anisotropy: Some(16.0),
            ..Limits::GL33_MINIMUM
        };
        let trilinear = SamplerDesc::TRILINEAR_REPEAT.with_anisotropy(8.0);
        assert_eq!(limits.clamp_anisotropy(trilinear.max_anisotropy, 16.0), Some(8.0));
        let plain = SamplerDesc::LINEAR_CLAMP;
        assert_eq!(limits.clamp_anisotropy(plain.max_anisotropy, 16.0), Some(1.0));
        assert_eq!(limits.clamp_anisotropy(0.0, 16.0), Some(1.0));
    }

    #[test]
    fn disabled_cache_always_binds() {
        assert!(needs_bind(true, true));
        assert!(!needs_bind(false, true));
        assert!(needs_bind(true, false));
        assert!(needs_bind(false, false));
    }
}
