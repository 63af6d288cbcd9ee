//! Texture filtering and wrapping presets.

/// Texel filter for magnification, or the base filter for minification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FilterMode {
    /// Nearest texel.
    Nearest,
    /// Bilinear interpolation.
    Linear,
}

/// How minification picks between mip levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MipmapMode {
    /// Sample level 0 only.
    None,
    /// Nearest mip level.
    Nearest,
    /// Blend the two nearest levels.
    Linear,
}

/// Texture coordinate wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WrapMode {
    /// Tile.
    Repeat,
    /// Tile, mirroring every other repetition.
    MirroredRepeat,
    /// Clamp to the edge texel.
    ClampToEdge,
    /// Clamp to the border color.
    ClampToBorder,
}

impl FilterMode {
    /// The `GL_TEXTURE_MAG_FILTER` value.
    #[must_use]
    pub const fn gl(self) -> u32 {
        match self {
            Self::Nearest => glow::NEAREST,
            Self::Linear => glow::LINEAR,
        }
    }
}

impl WrapMode {
    /// The `GL_TEXTURE_WRAP_*` value.
    #[must_use]
    pub const fn gl(self) -> u32 {
        match self {
            Self::Repeat => glow::REPEAT,
            Self::MirroredRepeat => glow::MIRRORED_REPEAT,
            Self::ClampToEdge => glow::CLAMP_TO_EDGE,
            Self::ClampToBorder => glow::CLAMP_TO_BORDER,
        }
    }
}

/// Combine a base filter and a mipmap mode into the single
/// `GL_TEXTURE_MIN_FILTER` enum.
#[must_use]
pub const fn min_filter(filter: FilterMode, mipmap: MipmapMode) -> u32 {
    match (filter, mipmap) {
        (FilterMode::Nearest, MipmapMode::None) => glow::NEAREST,
        (FilterMode::Linear, MipmapMode::None) => glow::LINEAR,
        (FilterMode::Nearest, MipmapMode::Nearest) => glow::NEAREST_MIPMAP_NEAREST,
        (FilterMode::Linear, MipmapMode::Nearest) => glow::LINEAR_MIPMAP_NEAREST,
        (FilterMode::Nearest, MipmapMode::Linear) => glow::NEAREST_MIPMAP_LINEAR,
        (FilterMode::Linear, MipmapMode::Linear) => glow::LINEAR_MIPMAP_LINEAR,
    }
}

/// Full sampling state applied to a texture object.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SamplerDesc {
    /// Minification base filter.
    pub min: FilterMode,
    /// Magnification filter.
    pub mag: FilterMode,
    /// Mip level selection.
    pub mipmap: MipmapMode,
    /// Wrapping along S.
    pub wrap_s: WrapMode,
    /// Wrapping along T.
    pub wrap_t: WrapMode,
    /// Wrapping along R (cube maps).
    pub wrap_r: WrapMode,
    /// Anisotropic filtering level; `1.0` disables it.
    pub max_anisotropy: f32,
}

impl SamplerDesc {
    /// Point sampling, clamped. Used for lookup tables and render targets
    /// read texel-for-texel.
    pub const NEAREST_CLAMP: Self = Self::uniform(
        FilterMode::Nearest,
        FilterMode::Nearest,
        MipmapMode::None,
        WrapMode::ClampToEdge,
    );

    /// Bilinear, clamped. The default for UI images and resolve targets.
    pub const LINEAR_CLAMP: Self = Self::uniform(
        FilterMode::Linear,
        FilterMode::Linear,
        MipmapMode::None,
        WrapMode::ClampToEdge,
    );

    /// Bilinear, tiled.
    pub const LINEAR_REPEAT: Self = Self::uniform(
        FilterMode::Linear,
        FilterMode::Linear,
        MipmapMode::None,
        WrapMode::Repeat,
    );

    /// Trilinear, tiled. Requires mipmaps.
    pub const TRILINEAR_REPEAT: Self = Self::uniform(
        FilterMode::Linear,
        FilterMode::Linear,
        MipmapMode::Linear,
        WrapMode::Repeat,
    );

    /// Nearest magnification with smooth minification, for upscaled
    /// pixel art.
    pub const PIXEL_ART: Self = Self::uniform(
        FilterMode::Linear,
        FilterMode::Nearest,
        MipmapMode::Nearest,
        WrapMode::ClampToEdge,
    );

    const fn uniform(min: FilterMode, mag: FilterMode, mipmap: MipmapMode, wrap: WrapMode) -> Self {
        Self {
            min,
            mag,
            mipmap,
            wrap_s: wrap,
            wrap_t: wrap,
            wrap_r: wrap,
            max_anisotropy: 1.0,
        }
    }

    /// Same state with anisotropic filtering set to `level`.
    #[must_use]
    pub const fn with_anisotropy(mut self, level: f32) -> Self {
        self.max_anisotropy = level;
        self
    }

    /// Same state with one wrap mode on every axis.
    #[must_use]
    pub const fn with_wrap(mut self, wrap: WrapMode) -> Self {
        self.wrap_s = wrap;
        self.wrap_t = wrap;
        self.wrap_r = wrap;
        self
    }

    /// Whether sampling reads levels other than 0, so the texture needs a
    /// complete mip chain.
    #[must_use]
    pub const fn uses_mipmaps(&self) -> bool {
        !matches!(self.mipmap, MipmapMode::None)
    }

    /// The `GL_TEXTURE_MIN_FILTER` value.
    #[must_use]
    pub const fn gl_min_filter(&self) -> u32 {
        min_filter(self.min, self.mipmap)
    }

    /// The `GL_TEXTURE_MAG_FILTER` value.
    #[must_use]
    pub const fn gl_mag_filter(&self) -> u32 {
        self.mag.gl()
    }
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self::LINEAR_CLAMP
    }
}

/// Named sampler presets, for configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TexturePreset {
    /// [`SamplerDesc::NEAREST_CLAMP`].
    NearestClamp,
    /// [`SamplerDesc::LINEAR_CLAMP`].
    #[default]
    LinearClamp,
    /// [`SamplerDesc::LINEAR_REPEAT`].
    LinearRepeat,
    /// [`SamplerDesc::TRILINEAR_REPEAT`].
    TrilinearRepeat,
    /// [`SamplerDesc::PIXEL_ART`].
    PixelArt,
}

impl TexturePreset {
    /// The sampler state this preset names.
    #[must_use]
    pub const fn sampler(self) -> SamplerDesc {
        match self {
            Self::NearestClamp => SamplerDesc::NEAREST_CLAMP,
            Self::LinearClamp => SamplerDesc::LINEAR_CLAMP,
            Self::LinearRepeat => SamplerDesc::LINEAR_REPEAT,
            Self::TrilinearRepeat => SamplerDesc::TRILINEAR_REPEAT,
            Self::PixelArt => SamplerDesc::PIXEL_ART,
        }
    }
}

impl From<TexturePreset> for SamplerDesc {
    fn from(preset: TexturePreset) -> Self {
        preset.sampler()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_filter_table() {
        assert_eq!(min_filter(FilterMode::Nearest, MipmapMode::None), glow::NEAREST);
        assert_eq!(min_filter(FilterMode::Linear, MipmapMode::None), glow::LINEAR);
        assert_eq!(
            min_filter(FilterMode::Linear, MipmapMode::Nearest),
            glow::LINEAR_MIPMAP_NEAREST
        );
        assert_eq!(
            min_filter(FilterMode::Nearest, MipmapMode::Linear),
            glow::NEAREST_MIPMAP_LINEAR
        );
        assert_eq!(
            min_filter(FilterMode::Linear, MipmapMode::Linear),
            glow::LINEAR_MIPMAP_LINEAR
        );
    }

    #[test]
    fn wrap_table() {
        assert_eq!(WrapMode::Repeat.gl(), glow::REPEAT);
        assert_eq!(WrapMode::MirroredRepeat.gl(), glow::MIRRORED_REPEAT);
        assert_eq!(WrapMode::ClampToEdge.gl(), glow::CLAMP_TO_EDGE);
        assert_eq!(WrapMode::ClampToBorder.gl(), glow::CLAMP_TO_BORDER);
    }

    #[test]
    fn presets() {
        let linear = SamplerDesc::LINEAR_CLAMP;
        assert_eq!(linear.gl_min_filter(), glow::LINEAR);
        assert_eq!(linear.gl_mag_filter(), glow::LINEAR);
        assert!(!linear.uses_mipmaps());

        let trilinear = SamplerDesc::TRILINEAR_REPEAT;
        assert_eq!(trilinear.gl_min_filter(), glow::LINEAR_MIPMAP_LINEAR);
        assert_eq!(trilinear.wrap_t, WrapMode::Repeat);
        assert!(trilinear.uses_mipmaps());

        let pixel = SamplerDesc::PIXEL_ART;
        assert_eq!(pixel.gl_mag_filter(), glow::NEAREST);
        assert_eq!(pixel.gl_min_filter(), glow::LINEAR_MIPMAP_NEAREST);
    }

    #[test]
    fn preset_enum_matches_constants() {
        assert_eq!(SamplerDesc::default(), TexturePreset::default().sampler());
        assert_eq!(
            SamplerDesc::from(TexturePreset::NearestClamp),
            SamplerDesc::NEAREST_CLAMP
        );
    }

    #[test]
    fn builders() {
        let desc = SamplerDesc::LINEAR_CLAMP
            .with_wrap(WrapMode::MirroredRepeat)
            .with_anisotropy(8.0);
        assert_eq!(desc.wrap_s, WrapMode::MirroredRepeat);
        assert_eq!(desc.wrap_r, WrapMode::MirroredRepeat);
        assert!((desc.max_anisotropy - 8.0).abs() < f32::EPSILON);
    }
}
