//! Framebuffer objects: attachments, completeness, clearing and blitting.

use bitflags::bitflags;
use glow::HasContext;

use crate::{
    context::GpuContext,
    error::{gl_int, Error, Result},
    format::TextureFormat,
    renderbuffer::Renderbuffer,
    sampler::FilterMode,
    texture::{level_size, CubeFace, Texture, TextureTarget},
};

bitflags! {
    /// Which buffers a clear or blit touches.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ClearFlags: u32 {
        /// Color attachments.
        const COLOR   = glow::COLOR_BUFFER_BIT;
        /// The depth attachment.
        const DEPTH   = glow::DEPTH_BUFFER_BIT;
        /// The stencil attachment.
        const STENCIL = glow::STENCIL_BUFFER_BIT;
    }
}

/// Framebuffer binding targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferTarget {
    /// `GL_READ_FRAMEBUFFER`, source of reads and blits.
    Read,
    /// `GL_DRAW_FRAMEBUFFER`, destination of draws, clears and blits.
    Draw,
    /// `GL_FRAMEBUFFER`, both of the above.
    Both,
}

impl FramebufferTarget {
    /// The GL enum.
    #[must_use]
    pub const fn gl(self) -> u32 {
        match self {
            Self::Read => glow::READ_FRAMEBUFFER,
            Self::Draw => glow::DRAW_FRAMEBUFFER,
            Self::Both => glow::FRAMEBUFFER,
        }
    }
}

/// A framebuffer attachment point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    /// `GL_COLOR_ATTACHMENTi`.
    Color(u32),
    /// `GL_DEPTH_ATTACHMENT`.
    Depth,
    /// `GL_STENCIL_ATTACHMENT`.
    Stencil,
    /// `GL_DEPTH_STENCIL_ATTACHMENT`.
    DepthStencil,
}

impl Attachment {
    /// The GL enum.
    #[must_use]
    pub const fn gl(self) -> u32 {
        match self {
            Self::Color(index) => glow::COLOR_ATTACHMENT0 + index,
            Self::Depth => glow::DEPTH_ATTACHMENT,
            Self::Stencil => glow::STENCIL_ATTACHMENT,
            Self::DepthStencil => glow::DEPTH_STENCIL_ATTACHMENT,
        }
    }
}

/// Reject formats that cannot back `attachment`.
pub fn check_attachment_format(attachment: Attachment, format: TextureFormat) -> Result<()> {
    let ok = match attachment {
        Attachment::Color(_) => format.is_color(),
        Attachment::Depth => format.is_depth(),
        Attachment::Stencil | Attachment::DepthStencil => format.has_stencil(),
    };
    if ok {
        Ok(())
    } else {
        Err(Error::UnsupportedFormat {
            format: format_name(format),
            usage: match attachment {
                Attachment::Color(_) => "color attachment",
                Attachment::Depth => "depth attachment",
                Attachment::Stencil => "stencil attachment",
                Attachment::DepthStencil => "depth-stencil attachment",
            },
        })
    }
}

fn format_name(format: TextureFormat) -> &'static str {
    if format.is_depth() {
        "depth format"
    } else {
        "color format"
    }
}

/// Symbolic name for a `glCheckFramebufferStatus` result.
#[must_use]
pub fn status_name(status: u32) -> &'static str {
    match status {
        glow::FRAMEBUFFER_COMPLETE => "GL_FRAMEBUFFER_COMPLETE",
        glow::FRAMEBUFFER_UNDEFINED => "GL_FRAMEBUFFER_UNDEFINED",
        glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => "GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT",
        glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => {
            "GL_FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT"
        }
        glow::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER => "GL_FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER",
        glow::FRAMEBUFFER_INCOMPLETE_READ_BUFFER => "GL_FRAMEBUFFER_INCOMPLETE_READ_BUFFER",
        glow::FRAMEBUFFER_UNSUPPORTED => "GL_FRAMEBUFFER_UNSUPPORTED",
        glow::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => "GL_FRAMEBUFFER_INCOMPLETE_MULTISAMPLE",
        glow::FRAMEBUFFER_INCOMPLETE_LAYER_TARGETS => "GL_FRAMEBUFFER_INCOMPLETE_LAYER_TARGETS",
        _ => "unknown framebuffer status",
    }
}

/// Depth and stencil can only be blitted with nearest filtering.
pub fn check_blit(flags: ClearFlags, filter: FilterMode) -> Result<()> {
    if filter == FilterMode::Linear && flags.intersects(ClearFlags::DEPTH | ClearFlags::STENCIL) {
        Err(Error::UnsupportedFormat {
            format: "depth/stencil",
            usage: "linear blit",
        })
    } else {
        Ok(())
    }
}

/// A pixel rectangle with the origin at the lower left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Bottom edge.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// A rectangle at the origin.
    #[must_use]
    pub const fn from_size(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// `[x0, y0, x1, y1]` as `glBlitFramebuffer` takes them.
    fn corners(self) -> Result<[i32; 4]> {
        let (w, h) = (gl_int(self.width)?, gl_int(self.height)?);
        Ok([self.x, self.y, self.x.saturating_add(w), self.y.saturating_add(h)])
    }
}

/// Values written by [`Framebuffer::clear`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearValues {
    /// RGBA color.
    pub color: [f32; 4],
    /// Depth value.
    pub depth: f32,
    /// Stencil value.
    pub stencil: i32,
}

impl Default for ClearValues {
    fn default() -> Self {
        Self {
            color: [0.0, 0.0, 0.0, 0.0],
            depth: 1.0,
            stencil: 0,
        }
    }
}

/// Clear the currently bound draw framebuffer.
///
/// # Safety
///
/// Requires `ctx` to be current.
pub unsafe fn clear_bound(ctx: &GpuContext, flags: ClearFlags, values: &ClearValues) {
    let gl = ctx.gl();
    let [r, g, b, a] = values.color;
    unsafe {
        if flags.contains(ClearFlags::COLOR) {
            gl.clear_color(r, g, b, a);
        }
        if flags.contains(ClearFlags::DEPTH) {
            gl.clear_depth_f32(values.depth);
        }
        if flags.contains(ClearFlags::STENCIL) {
            gl.clear_stencil(values.stencil);
        }
        gl.clear(flags.bits());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AttachedImage {
    attachment: Attachment,
    width: u32,
    height: u32,
    samples: u32,
}

/// Drop `attachment` from the recorded images the way GL does.
///
/// `DepthStencil` names both the depth and stencil points. Replacing or
/// detaching one of them on a combined image leaves the other one attached.
fn release_attachment(attached: &mut Vec<AttachedImage>, attachment: Attachment) {
    attached.retain_mut(|image| match (image.attachment, attachment) {
        (held, released) if held == released => false,
        (Attachment::Depth | Attachment::Stencil, Attachment::DepthStencil) => false,
        (Attachment::DepthStencil, Attachment::Depth) => {
            image.attachment = Attachment::Stencil;
            true
        }
        (Attachment::DepthStencil, Attachment::Stencil) => {
            image.attachment = Attachment::Depth;
            true
        }
        _ => true,
    });
}

/// A framebuffer object.
///
/// Attachments are borrowed only for the duration of the attach call; the
/// caller keeps ownership of textures and renderbuffers and must keep them
/// alive while the framebuffer is used.
pub struct Framebuffer {
    ctx: GpuContext,
    raw: glow::Framebuffer,
    attached: Vec<AttachedImage>,
}

impl Framebuffer {
    /// Create a framebuffer with no attachments.
    ///
    /// # Safety
    ///
    /// Requires `ctx` to be current.
    pub unsafe fn new(ctx: &GpuContext) -> Result<Self> {
        let raw = unsafe { ctx.gl().create_framebuffer() }.map_err(Error::create("framebuffer"))?;
        log::debug!("created framebuffer {raw:?}");
        Ok(Self {
            ctx: ctx.clone(),
            raw,
            attached: Vec::new(),
        })
    }

    /// Bind to `target`.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn bind(&self, target: FramebufferTarget) {
        unsafe { self.ctx.bind_framebuffer(target, Some(self.raw)) };
    }

    /// Bind the default framebuffer to `target`.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn unbind(&self, target: FramebufferTarget) {
        unsafe { self.ctx.bind_framebuffer(target, None) };
    }

    fn check_color_index(&self, attachment: Attachment) -> Result<()> {
        match attachment {
            Attachment::Color(index) if index >= self.ctx.limits().max_color_attachments => {
                Err(Error::UnsupportedFormat {
                    format: "color attachment index",
                    usage: "framebuffer attachment",
                })
            }
            _ => Ok(()),
        }
    }

    fn record(&mut self, image: AttachedImage) {
        release_attachment(&mut self.attached, image.attachment);
        self.attached.push(image);
    }

    /// Attach mip `level` of a 2D texture.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn attach_texture(
        &mut self,
        attachment: Attachment,
        texture: &Texture,
        level: u32,
    ) -> Result<()> {
        if texture.target() != TextureTarget::Texture2D {
            return Err(Error::UnsupportedFormat {
                format: "cube map",
                usage: "2D framebuffer attachment",
            });
        }
        unsafe { self.attach_image(attachment, texture, glow::TEXTURE_2D, level) }
    }

    /// Attach mip `level` of one cube map face.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn attach_cube_face(
        &mut self,
        attachment: Attachment,
        texture: &Texture,
        face: CubeFace,
        level: u32,
    ) -> Result<()> {
        if texture.target() != TextureTarget::CubeMap {
            return Err(Error::UnsupportedFormat {
                format: "2D texture",
                usage: "cube face attachment",
            });
        }
        unsafe { self.attach_image(attachment, texture, face.gl(), level) }
    }

    unsafe fn attach_image(
        &mut self,
        attachment: Attachment,
        texture: &Texture,
        image_target: u32,
        level: u32,
    ) -> Result<()> {
        check_attachment_format(attachment, texture.format())?;
        self.check_color_index(attachment)?;
        let gl_level = gl_int(level)?;
        unsafe {
            self.bind(FramebufferTarget::Draw);
            self.ctx.gl().framebuffer_texture_2d(
                glow::DRAW_FRAMEBUFFER,
                attachment.gl(),
                image_target,
                Some(texture.raw()),
                gl_level,
            );
        }
        let (width, height) = level_size(texture.width(), texture.height(), level);
        self.record(AttachedImage {
            attachment,
            width,
            height,
            samples: 0,
        });
        unsafe { self.ctx.check_error("framebuffer texture attachment") }
    }

    /// Attach a renderbuffer.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn attach_renderbuffer(
        &mut self,
        attachment: Attachment,
        renderbuffer: &Renderbuffer,
    ) -> Result<()> {
        check_attachment_format(attachment, renderbuffer.format())?;
        self.check_color_index(attachment)?;
        unsafe {
            self.bind(FramebufferTarget::Draw);
            self.ctx.gl().framebuffer_renderbuffer(
                glow::DRAW_FRAMEBUFFER,
                attachment.gl(),
                glow::RENDERBUFFER,
                Some(renderbuffer.raw()),
            );
        }
        self.record(AttachedImage {
            attachment,
            width: renderbuffer.width(),
            height: renderbuffer.height(),
            samples: renderbuffer.samples(),
        });
        unsafe { self.ctx.check_error("framebuffer renderbuffer attachment") }
    }

    /// Remove whatever is attached at `attachment`. Detaching `Depth` from a
    /// combined depth-stencil image keeps it attached as stencil, and the
    /// other way round.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn detach(&mut self, attachment: Attachment) {
        unsafe {
            self.bind(FramebufferTarget::Draw);
            self.ctx.gl().framebuffer_renderbuffer(
                glow::DRAW_FRAMEBUFFER,
                attachment.gl(),
                glow::RENDERBUFFER,
                None,
            );
        }
        release_attachment(&mut self.attached, attachment);
    }

    /// Route fragment outputs `0..n` to the given color attachment indices.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn set_draw_buffers(&self, color_indices: &[u32]) -> Result<()> {
        if color_indices.len() > self.ctx.limits().max_draw_buffers as usize {
            return Err(Error::UnsupportedFormat {
                format: "draw buffer count",
                usage: "glDrawBuffers",
            });
        }
        let buffers: Vec<u32> = color_indices
            .iter()
            .map(|&i| Attachment::Color(i).gl())
            .collect();
        unsafe {
            self.bind(FramebufferTarget::Draw);
            self.ctx.gl().draw_buffers(&buffers);
        }
        unsafe { self.ctx.check_error("draw buffer selection") }
    }

    /// The raw completeness status.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn status(&self) -> u32 {
        unsafe {
            self.bind(FramebufferTarget::Draw);
            self.ctx.gl().check_framebuffer_status(glow::DRAW_FRAMEBUFFER)
        }
    }

    /// Check completeness.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompleteFramebuffer`] with the status name.
    pub unsafe fn check_complete(&self) -> Result<()> {
        match unsafe { self.status() } {
            glow::FRAMEBUFFER_COMPLETE => Ok(()),
            status => {
                let status = status_name(status);
                log::warn!("framebuffer {:?} incomplete: {status}", self.raw);
                Err(Error::IncompleteFramebuffer { status })
            }
        }
    }

    /// Clear the selected buffers of this framebuffer.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn clear(&self, flags: ClearFlags, values: &ClearValues) {
        unsafe {
            self.bind(FramebufferTarget::Draw);
            clear_bound(&self.ctx, flags, values);
        }
    }

    /// Clear a single color attachment, leaving the others untouched.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn clear_color_attachment(&self, draw_buffer: u32, color: [f32; 4]) {
        unsafe {
            self.bind(FramebufferTarget::Draw);
            self.ctx
                .gl()
                .clear_buffer_f32_slice(glow::COLOR, draw_buffer, &color);
        }
    }

    /// Copy `src` of this framebuffer into `dst` of `target`, or of the
    /// default framebuffer when `target` is `None`.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn blit_to(
        &self,
        target: Option<&Framebuffer>,
        src: Rect,
        dst: Rect,
        flags: ClearFlags,
        filter: FilterMode,
    ) -> Result<()> {
        check_blit(flags, filter)?;
        let [sx0, sy0, sx1, sy1] = src.corners()?;
        let [dx0, dy0, dx1, dy1] = dst.corners()?;
        unsafe {
            self.bind(FramebufferTarget::Read);
            self.ctx
                .bind_framebuffer(FramebufferTarget::Draw, target.map(|fb| fb.raw));
            self.ctx.gl().blit_framebuffer(
                sx0,
                sy0,
                sx1,
                sy1,
                dx0,
                dy0,
                dx1,
                dy1,
                flags.bits(),
                filter.gl(),
            );
        }
        unsafe { self.ctx.check_error("framebuffer blit") }
    }

    /// The drawable size: the intersection of all attachments, or `None`
    /// with nothing attached.
    #[must_use]
    pub fn size(&self) -> Option<(u32, u32)> {
        self.attached
            .iter()
            .map(|a| (a.width, a.height))
            .reduce(|(w0, h0), (w1, h1)| (w0.min(w1), h0.min(h1)))
    }

    /// Sample count of the attachments (0 when single-sampled).
    #[must_use]
    pub fn samples(&self) -> u32 {
        self.attached.iter().map(|a| a.samples).max().unwrap_or(0)
    }

    /// The attachment points currently in use.
    pub fn attachments(&self) -> impl Iterator<Item = Attachment> + '_ {
        self.attached.iter().map(|a| a.attachment)
    }

    /// The raw glow handle.
    #[must_use]
    pub fn raw(&self) -> glow::Framebuffer {
        self.raw
    }

    /// Delete the framebuffer. Attached images are not deleted.
    ///
    /// # Safety
    ///
    /// Must be called with the context current.
    pub unsafe fn destroy(self) {
        unsafe { self.ctx.gl().delete_framebuffer(self.raw) };
        self.ctx.state().forget_framebuffer(self.raw);
        log::debug!("deleted framebuffer {:?}", self.raw);
    }
}

impl std::fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framebuffer")
            .field("raw", &self.raw)
            .field("attached", &self.attached)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_enums() {
        assert_eq!(Attachment::Color(0).gl(), glow::COLOR_ATTACHMENT0);
        assert_eq!(Attachment::Color(3).gl(), glow::COLOR_ATTACHMENT3);
        assert_eq!(Attachment::DepthStencil.gl(), glow::DEPTH_STENCIL_ATTACHMENT);
        assert_eq!(FramebufferTarget::Both.gl(), glow::FRAMEBUFFER);
    }

    #[test]
    fn attachment_format_rules() {
        assert!(check_attachment_format(Attachment::Color(0), TextureFormat::Rgba8).is_ok());
        assert!(check_attachment_format(Attachment::Depth, TextureFormat::Depth24).is_ok());
        assert!(check_attachment_format(Attachment::Depth, TextureFormat::Depth24Stencil8).is_ok());
        assert!(
            check_attachment_format(Attachment::DepthStencil, TextureFormat::Depth24Stencil8)
                .is_ok()
        );
        assert!(matches!(
            check_attachment_format(Attachment::Color(0), TextureFormat::Depth16),
            Err(Error::UnsupportedFormat {
                usage: "color attachment",
                ..
            })
        ));
        assert!(check_attachment_format(Attachment::DepthStencil, TextureFormat::Depth32F).is_err());
        assert!(check_attachment_format(Attachment::Depth, TextureFormat::R32F).is_err());
    }

    #[test]
    fn status_names() {
        assert_eq!(
            status_name(glow::FRAMEBUFFER_COMPLETE),
            "GL_FRAMEBUFFER_COMPLETE"
        );
        assert_eq!(
            status_name(glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT),
            "GL_FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT"
        );
        assert_eq!(status_name(0), "unknown framebuffer status");
    }

    #[test]
    fn blit_filter_rules() {
        assert!(check_blit(ClearFlags::COLOR, FilterMode::Linear).is_ok());
        assert!(check_blit(ClearFlags::all(), FilterMode::Nearest).is_ok());
        assert!(check_blit(ClearFlags::COLOR | ClearFlags::DEPTH, FilterMode::Linear).is_err());
    }

    #[test]
    fn clear_flags_are_gl_bits() {
        assert_eq!(
            (ClearFlags::COLOR | ClearFlags::DEPTH).bits(),
            glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT
        );
        assert!(ClearFlags::default().is_empty());
    }

    #[test]
    fn rect_corners() {
        let rect = Rect {
            x: 10,
            y: 20,
            width: 100,
            height: 50,
        };
        assert!(matches!(rect.corners(), Ok([10, 20, 110, 70])));
        assert!(matches!(Rect::from_size(8, 4).corners(), Ok([0, 0, 8, 4])));
        assert!(Rect::from_size(u32::MAX, 1).corners().is_err());
    }

    fn image(attachment: Attachment, size: u32) -> AttachedImage {
        AttachedImage {
            attachment,
            width: size,
            height: size,
            samples: 0,
        }
    }

    #[test]
    fn depth_stencil_replaces_separate_points() {
        let mut attached = vec![
            image(Attachment::Color(0), 64),
            image(Attachment::Depth, 32),
            image(Attachment::Stencil, 16),
        ];
        release_attachment(&mut attached, Attachment::DepthStencil);
        assert_eq!(attached, [image(Attachment::Color(0), 64)]);
    }

    #[test]
    fn depth_over_depth_stencil_keeps_stencil() {
        let mut attached = vec![image(Attachment::DepthStencil, 32)];
        release_attachment(&mut attached, Attachment::Depth);
        assert_eq!(attached, [image(Attachment::Stencil, 32)]);

        let mut attached = vec![image(Attachment::DepthStencil, 32)];
        release_attachment(&mut attached, Attachment::Stencil);
        assert_eq!(attached, [image(Attachment::Depth, 32)]);

        release_attachment(&mut attached, Attachment::Depth);
        assert!(attached.is_empty());
    }

    #[test]
    fn release_leaves_other_colors() {
        let mut attached = vec![image(Attachment::Color(0), 8), image(Attachment::Color(1), 8)];
        release_attachment(&mut attached, Attachment::Color(1));
        assert_eq!(attached, [image(Attachment::Color(0), 8)]);
    }

    #[test]
    fn clear_values_default_to_far_depth() {
        let values = ClearValues::default();
        assert!((values.depth - 1.0).abs() < f32::EPSILON);
        assert_eq!(values.stencil, 0);
    }
}
