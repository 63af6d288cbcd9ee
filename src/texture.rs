//! Texture objects: 2D textures and cube maps.

use glow::{HasContext, PixelUnpackData};

use crate::{
    buffer::BufferTarget,
    context::{GpuContext, Limits},
    error::{gl_int, Error, Result},
    format::TextureFormat,
    sampler::{FilterMode, MipmapMode, SamplerDesc, WrapMode},
    stats::ResourceKind,
};

/// `GL_TEXTURE_MAX_ANISOTROPY_EXT`.
const TEXTURE_MAX_ANISOTROPY: u32 = 0x84FE;

/// Unit used while creating and configuring textures.
const SETUP_UNIT: u32 = 0;

/// GL enums are passed to `glTexParameteri` as `GLint`. Enum values are small
/// enough that the cast is always safe.
#[expect(clippy::cast_possible_wrap)]
const fn gl_enum(value: u32) -> i32 {
    value as i32
}

/// Texture binding targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    /// `GL_TEXTURE_2D`.
    Texture2D,
    /// `GL_TEXTURE_CUBE_MAP`.
    CubeMap,
}

impl TextureTarget {
    /// The GL enum.
    #[must_use]
    pub const fn gl(self) -> u32 {
        match self {
            Self::Texture2D => glow::TEXTURE_2D,
            Self::CubeMap => glow::TEXTURE_CUBE_MAP,
        }
    }

    /// Number of image layers (faces) per mip level.
    #[must_use]
    pub const fn layers(self) -> u32 {
        match self {
            Self::Texture2D => 1,
            Self::CubeMap => 6,
        }
    }
}

/// One face of a cube map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    /// +X.
    PositiveX,
    /// -X.
    NegativeX,
    /// +Y.
    PositiveY,
    /// -Y.
    NegativeY,
    /// +Z.
    PositiveZ,
    /// -Z.
    NegativeZ,
}

impl CubeFace {
    /// All faces in GL enum order.
    pub const ALL: [CubeFace; 6] = [
        Self::PositiveX,
        Self::NegativeX,
        Self::PositiveY,
        Self::NegativeY,
        Self::PositiveZ,
        Self::NegativeZ,
    ];

    /// The `GL_TEXTURE_CUBE_MAP_*` image target.
    #[must_use]
    pub const fn gl(self) -> u32 {
        glow::TEXTURE_CUBE_MAP_POSITIVE_X + self as u32
    }
}

/// Number of levels in a full mip chain for a `width` x `height` image.
#[must_use]
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    u32::BITS - width.max(height).max(1).leading_zeros()
}

/// Dimensions of mip `level`.
#[must_use]
pub fn level_size(width: u32, height: u32, level: u32) -> (u32, u32) {
    let shrink = |v: u32| v.checked_shr(level).unwrap_or(0).max(1);
    (shrink(width), shrink(height))
}

/// Estimated bytes of storage for `levels` mip levels of `layers` images.
#[must_use]
pub fn texture_memory(
    width: u32,
    height: u32,
    format: TextureFormat,
    levels: u32,
    layers: u32,
) -> u64 {
    (0..levels)
        .map(|level| {
            let (w, h) = level_size(width, height, level);
            format.image_size(w, h)
        })
        .sum::<u64>()
        * u64::from(layers)
}

/// `GL_TEXTURE_MAX_LEVEL` for a texture with `levels` defined levels.
fn max_level(levels: u32) -> u32 {
    levels.max(1) - 1
}

/// Check that `data` holds exactly one tightly packed image.
fn check_data_len(format: TextureFormat, width: u32, height: u32, data: &[u8]) -> Result<()> {
    let expected = format.image_size(width, height);
    if data.len() as u64 == expected {
        Ok(())
    } else {
        Err(Error::OutOfBounds {
            offset: 0,
            end: data.len(),
            size: usize::try_from(expected).unwrap_or(usize::MAX),
        })
    }
}

/// A 2D texture or cube map.
pub struct Texture {
    ctx: GpuContext,
    raw: glow::Texture,
    target: TextureTarget,
    format: TextureFormat,
    width: u32,
    height: u32,
    levels: u32,
    sampler: SamplerDesc,
}

impl Texture {
    /// Create a 2D texture, optionally filled with tightly packed `data`.
    ///
    /// When `sampler` is `None` the context's default preset is used. If the
    /// sampler reads mipmaps and `data` is given, the mip chain is generated.
    /// Without `data` only level 0 exists and the level range is limited to
    /// it, so mipmapping samplers read level 0 until
    /// [`generate_mipmaps`](Self::generate_mipmaps) is called.
    ///
    /// # Safety
    ///
    /// Requires `ctx` to be current.
    ///
    /// # Errors
    ///
    /// Fails on zero or oversized dimensions, on `data` of the wrong length,
    /// or if the driver cannot create the texture.
    pub unsafe fn new_2d(
        ctx: &GpuContext,
        width: u32,
        height: u32,
        format: TextureFormat,
        sampler: Option<SamplerDesc>,
        data: Option<&[u8]>,
    ) -> Result<Self> {
        Limits::check_size(width, height, ctx.limits().max_texture_size)?;
        if let Some(data) = data {
            check_data_len(format, width, height, data)?;
        }

        let mut texture = unsafe { Self::create(ctx, TextureTarget::Texture2D, format, sampler) }?;
        match unsafe { texture.init_2d(width, height, data) } {
            Ok(()) => Ok(texture),
            Err(err) => {
                unsafe { texture.destroy() };
                Err(err)
            }
        }
    }

    unsafe fn init_2d(&mut self, width: u32, height: u32, data: Option<&[u8]>) -> Result<()> {
        unsafe {
            self.bind(SETUP_UNIT);
            self.specify(glow::TEXTURE_2D, width, height, data)?;
            self.set_level_range(1)?;
        }
        self.set_dimensions(width, height, 1);
        unsafe { self.set_sampler(self.sampler) }?;
        if data.is_some() && self.sampler.uses_mipmaps() {
            unsafe { self.generate_mipmaps() }?;
        }
        unsafe { self.ctx.check_error("texture upload") }
    }

    /// Create a cube map with `size` x `size` faces and undefined contents.
    /// Only level 0 exists until [`generate_mipmaps`](Self::generate_mipmaps)
    /// is called.
    ///
    /// # Safety
    ///
    /// Requires `ctx` to be current.
    pub unsafe fn new_cube(
        ctx: &GpuContext,
        size: u32,
        format: TextureFormat,
        sampler: Option<SamplerDesc>,
    ) -> Result<Self> {
        Limits::check_size(size, size, ctx.limits().max_cube_map_size)?;

        let mut texture = unsafe { Self::create(ctx, TextureTarget::CubeMap, format, sampler) }?;
        match unsafe { texture.init_cube(size) } {
            Ok(()) => Ok(texture),
            Err(err) => {
                unsafe { texture.destroy() };
                Err(err)
            }
        }
    }

    unsafe fn init_cube(&mut self, size: u32) -> Result<()> {
        unsafe { self.bind(SETUP_UNIT) };
        for face in CubeFace::ALL {
            unsafe { self.specify(face.gl(), size, size, None) }?;
        }
        unsafe { self.set_level_range(1) }?;
        self.set_dimensions(size, size, 1);
        unsafe { self.set_sampler(self.sampler) }?;
        unsafe { self.ctx.check_error("cube map allocation") }
    }

    /// Decode an encoded image (PNG or JPEG) and upload it as a 2D texture.
    ///
    /// RGB and RGBA images are uploaded as-is; other color types, including
    /// grayscale, are converted to RGBA8 so they sample as gray.
    ///
    /// # Safety
    ///
    /// Requires `ctx` to be current.
    pub unsafe fn from_encoded(
        ctx: &GpuContext,
        bytes: &[u8],
        sampler: Option<SamplerDesc>,
    ) -> Result<Self> {
        let image = image::load_from_memory(bytes)?;
        let (width, height) = (image.width(), image.height());
        if let Some(format) = TextureFormat::from_image_color(image.color()) {
            unsafe { Self::new_2d(ctx, width, height, format, sampler, Some(image.as_bytes())) }
        } else {
            let rgba = image.to_rgba8();
            unsafe {
                Self::new_2d(
                    ctx,
                    width,
                    height,
                    TextureFormat::Rgba8,
                    sampler,
                    Some(rgba.as_raw().as_slice()),
                )
            }
        }
    }

    unsafe fn create(
        ctx: &GpuContext,
        target: TextureTarget,
        format: TextureFormat,
        sampler: Option<SamplerDesc>,
    ) -> Result<Self> {
        let raw = unsafe { ctx.gl().create_texture() }.map_err(Error::create("texture"))?;
        ctx.stats().record_object(ResourceKind::Texture);
        log::debug!("created {target:?} texture {raw:?} ({format:?})");
        Ok(Self {
            ctx: ctx.clone(),
            raw,
            target,
            format,
            width: 0,
            height: 0,
            levels: 0,
            sampler: sampler.unwrap_or_else(|| ctx.config().default_sampler.sampler()),
        })
    }

    /// Prepare to read client memory: no pixel unpack buffer bound, row
    /// alignment matching this format.
    unsafe fn prepare_unpack(&self) {
        let alignment = if self.format.bytes_per_pixel() % 4 == 0 { 4 } else { 1 };
        unsafe {
            self.ctx.bind_buffer(BufferTarget::PixelUnpack, None);
            self.ctx.gl().pixel_store_i32(glow::UNPACK_ALIGNMENT, alignment);
        }
    }

    /// Specify level 0 of `image_target`. The texture must be bound.
    unsafe fn specify(
        &self,
        image_target: u32,
        width: u32,
        height: u32,
        data: Option<&[u8]>,
    ) -> Result<()> {
        let d = self.format.descriptor();
        let (w, h) = (gl_int(width)?, gl_int(height)?);
        unsafe {
            self.prepare_unpack();
            self.ctx.gl().tex_image_2d(
                image_target,
                0,
                gl_enum(d.internal_format),
                w,
                h,
                0,
                d.pixel_format,
                d.pixel_type,
                PixelUnpackData::Slice(data),
            );
        }
        Ok(())
    }

    /// Limit sampling to the first `levels` levels. The texture must be
    /// bound.
    unsafe fn set_level_range(&self, levels: u32) -> Result<()> {
        let max = gl_int(max_level(levels))?;
        unsafe {
            self.ctx
                .gl()
                .tex_parameter_i32(self.target.gl(), glow::TEXTURE_MAX_LEVEL, max);
        }
        Ok(())
    }

    fn set_dimensions(&mut self, width: u32, height: u32, levels: u32) {
        let layers = self.target.layers();
        let old = texture_memory(self.width, self.height, self.format, self.levels, layers);
        let new = texture_memory(width, height, self.format, levels, layers);
        self.ctx.stats().resize(ResourceKind::Texture, old, new);
        self.width = width;
        self.height = height;
        self.levels = levels;
    }

    /// Upload a rectangle of tightly packed pixels into mip `level`.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    ///
    /// # Errors
    ///
    /// Fails if the rectangle does not fit in the level, if `data` has the
    /// wrong length, or if the texture is a cube map.
    pub unsafe fn upload_region(
        &self,
        level: u32,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Result<()> {
        if self.target != TextureTarget::Texture2D {
            return Err(Error::UnsupportedFormat {
                format: "cube map",
                usage: "2D region upload",
            });
        }
        let (level_w, level_h) = level_size(self.width, self.height, level);
        if level >= self.levels
            || x.checked_add(width).is_none_or(|end| end > level_w)
            || y.checked_add(height).is_none_or(|end| end > level_h)
        {
            return Err(Error::InvalidSize {
                width: x.saturating_add(width),
                height: y.saturating_add(height),
                limit: level_w.max(level_h),
            });
        }
        check_data_len(self.format, width, height, data)?;

        let d = self.format.descriptor();
        let level = gl_int(level)?;
        let (x, y, w, h) = (gl_int(x)?, gl_int(y)?, gl_int(width)?, gl_int(height)?);
        unsafe {
            self.bind(SETUP_UNIT);
            self.prepare_unpack();
            self.ctx.gl().tex_sub_image_2d(
                glow::TEXTURE_2D,
                level,
                x,
                y,
                w,
                h,
                d.pixel_format,
                d.pixel_type,
                PixelUnpackData::Slice(Some(data)),
            );
        }
        unsafe { self.ctx.check_error("texture region upload") }
    }

    /// Replace level 0 of one cube face.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn upload_face(&self, face: CubeFace, data: &[u8]) -> Result<()> {
        if self.target != TextureTarget::CubeMap {
            return Err(Error::UnsupportedFormat {
                format: "2D texture",
                usage: "cube face upload",
            });
        }
        check_data_len(self.format, self.width, self.height, data)?;
        unsafe {
            self.bind(SETUP_UNIT);
            self.specify(face.gl(), self.width, self.height, Some(data))?;
        }
        unsafe { self.ctx.check_error("cube face upload") }
    }

    /// Reallocate level 0 at a new size. Previous contents are discarded. A
    /// texture that had a mip chain gets a new one at the new size, with
    /// undefined contents.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        let limit = match self.target {
            TextureTarget::Texture2D => self.ctx.limits().max_texture_size,
            TextureTarget::CubeMap => {
                if width != height {
                    return Err(Error::InvalidSize {
                        width,
                        height,
                        limit: width.min(height),
                    });
                }
                self.ctx.limits().max_cube_map_size
            }
        };
        Limits::check_size(width, height, limit)?;

        unsafe { self.bind(SETUP_UNIT) };
        match self.target {
            TextureTarget::Texture2D => unsafe {
                self.specify(glow::TEXTURE_2D, width, height, None)?;
            },
            TextureTarget::CubeMap => {
                for face in CubeFace::ALL {
                    unsafe { self.specify(face.gl(), width, height, None) }?;
                }
            }
        }
        unsafe { self.ctx.check_error("texture resize") }?;
        log::debug!(
            "resized texture {:?} {}x{} -> {width}x{height}",
            self.raw,
            self.width,
            self.height
        );

        let had_mips = self.levels > 1;
        self.set_dimensions(width, height, 1);
        if had_mips {
            unsafe { self.generate_mipmaps() }
        } else {
            unsafe { self.set_level_range(1) }
        }
    }

    /// Apply filtering, wrapping and anisotropy.
    ///
    /// Integer formats cannot be filtered; linear filters are replaced by
    /// nearest for them.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn set_sampler(&mut self, mut desc: SamplerDesc) -> Result<()> {
        if self.format.is_integer()
            && (desc.min, desc.mag) != (FilterMode::Nearest, FilterMode::Nearest)
        {
            log::warn!("{:?} cannot be filtered, using nearest", self.format);
            desc.min = FilterMode::Nearest;
            desc.mag = FilterMode::Nearest;
        }

        let target = self.target.gl();
        let gl = self.ctx.gl();
        unsafe {
            self.bind(SETUP_UNIT);
            gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, gl_enum(desc.gl_min_filter()));
            gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, gl_enum(desc.gl_mag_filter()));
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, gl_enum(desc.wrap_s.gl()));
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, gl_enum(desc.wrap_t.gl()));
            if self.target == TextureTarget::CubeMap {
                gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_R, gl_enum(desc.wrap_r.gl()));
            }
        }

        let cap = self.ctx.config().max_anisotropy;
        if let Some(level) = self.ctx.limits().clamp_anisotropy(desc.max_anisotropy, cap) {
            unsafe { gl.tex_parameter_f32(target, TEXTURE_MAX_ANISOTROPY, level) };
        }

        self.sampler = desc;
        unsafe { self.ctx.check_error("texture sampler state") }
    }

    /// Change the filters, keeping wrapping.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn set_filter(
        &mut self,
        min: FilterMode,
        mag: FilterMode,
        mipmap: MipmapMode,
    ) -> Result<()> {
        let desc = SamplerDesc {
            min,
            mag,
            mipmap,
            ..self.sampler
        };
        unsafe { self.set_sampler(desc) }
    }

    /// Change the S and T wrap modes, keeping filtering.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn set_wrap(&mut self, wrap_s: WrapMode, wrap_t: WrapMode) -> Result<()> {
        let desc = SamplerDesc {
            wrap_s,
            wrap_t,
            ..self.sampler
        };
        unsafe { self.set_sampler(desc) }
    }

    /// Generate the full mip chain from level 0.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn generate_mipmaps(&mut self) -> Result<()> {
        if self.format.is_integer() || self.format.is_depth() {
            return Err(Error::UnsupportedFormat {
                format: if self.format.is_depth() { "depth" } else { "integer" },
                usage: "mipmap generation",
            });
        }
        let levels = mip_level_count(self.width, self.height);
        unsafe {
            self.bind(SETUP_UNIT);
            // Generation stops at the max level, so open the range first.
            self.set_level_range(levels)?;
            self.ctx.gl().generate_mipmap(self.target.gl());
            self.ctx.check_error("mipmap generation")?;
        }
        self.set_dimensions(self.width, self.height, levels);
        Ok(())
    }

    /// Bind to texture unit `unit`.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn bind(&self, unit: u32) {
        unsafe { self.ctx.bind_texture(unit, self.target, Some(self.raw)) };
    }

    /// Unbind this texture's target on `unit`.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn unbind(&self, unit: u32) {
        unsafe { self.ctx.bind_texture(unit, self.target, None) };
    }

    /// Width of level 0.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of level 0.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Storage format.
    #[must_use]
    pub fn format(&self) -> TextureFormat {
        self.format
    }

    /// Binding target.
    #[must_use]
    pub fn target(&self) -> TextureTarget {
        self.target
    }

    /// Current sampler state.
    #[must_use]
    pub fn sampler(&self) -> SamplerDesc {
        self.sampler
    }

    /// Number of mip levels with defined storage.
    #[must_use]
    pub fn mip_levels(&self) -> u32 {
        self.levels
    }

    /// Estimated storage in bytes.
    #[must_use]
    pub fn memory(&self) -> u64 {
        texture_memory(
            self.width,
            self.height,
            self.format,
            self.levels,
            self.target.layers(),
        )
    }

    /// The raw glow handle.
    #[must_use]
    pub fn raw(&self) -> glow::Texture {
        self.raw
    }

    /// Delete the texture.
    ///
    /// # Safety
    ///
    /// Must be called with the context current.
    pub unsafe fn destroy(self) {
        unsafe { self.ctx.gl().delete_texture(self.raw) };
        self.ctx.state().forget_texture(self.raw);
        self.ctx
            .stats()
            .release_object(ResourceKind::Texture, self.memory());
        log::debug!("deleted texture {:?}", self.raw);
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("raw", &self.raw)
            .field("target", &self.target)
            .field("format", &self.format)
            .field("size", &[self.width, self.height])
            .field("levels", &self.levels)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_length() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 1), 2);
        assert_eq!(mip_level_count(256, 256), 9);
        assert_eq!(mip_level_count(300, 17), 9);
        assert_eq!(mip_level_count(0, 0), 1);
    }

    #[test]
    fn level_sizes_clamp_to_one() {
        assert_eq!(level_size(256, 64, 0), (256, 64));
        assert_eq!(level_size(256, 64, 3), (32, 8));
        assert_eq!(level_size(256, 64, 7), (2, 1));
        assert_eq!(level_size(256, 64, 40), (1, 1));
    }

    #[test]
    fn memory_of_full_chain() {
        // 4x4 + 2x2 + 1x1 texels at 4 bytes each.
        assert_eq!(texture_memory(4, 4, TextureFormat::Rgba8, 3, 1), 84);
        assert_eq!(texture_memory(4, 4, TextureFormat::Rgba8, 1, 6), 384);
        assert_eq!(texture_memory(4, 4, TextureFormat::Rgba8, 0, 1), 0);
    }

    #[test]
    fn level_range_covers_defined_levels() {
        assert_eq!(max_level(1), 0);
        assert_eq!(max_level(0), 0);
        assert_eq!(max_level(mip_level_count(256, 256)), 8);
        assert_eq!(max_level(mip_level_count(300, 17)), 8);
    }

    #[test]
    fn data_length_must_match() {
        assert!(check_data_len(TextureFormat::Rgb8, 2, 2, &[0; 12]).is_ok());
        assert!(matches!(
            check_data_len(TextureFormat::Rgb8, 2, 2, &[0; 16]),
            Err(Error::OutOfBounds { end: 16, size: 12, .. })
        ));
    }

    #[test]
    fn cube_faces_follow_gl_order() {
        assert_eq!(CubeFace::PositiveX.gl(), glow::TEXTURE_CUBE_MAP_POSITIVE_X);
        assert_eq!(CubeFace::NegativeX.gl(), glow::TEXTURE_CUBE_MAP_NEGATIVE_X);
        assert_eq!(CubeFace::PositiveY.gl(), glow::TEXTURE_CUBE_MAP_POSITIVE_Y);
        assert_eq!(CubeFace::NegativeZ.gl(), glow::TEXTURE_CUBE_MAP_NEGATIVE_Z);
    }

    #[test]
    fn targets() {
        assert_eq!(TextureTarget::Texture2D.gl(), glow::TEXTURE_2D);
        assert_eq!(TextureTarget::CubeMap.layers(), 6);
    }
}
