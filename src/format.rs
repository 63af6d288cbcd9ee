//! Texture and renderbuffer formats.
//!
//! Each [`TextureFormat`] is a row in a static table of
//! `(internal format, pixel format, pixel type)` tuples that are handed
//! straight to `glTexImage2D` / `glRenderbufferStorage`.

use image::ColorType;

/// The GL enums describing one storage format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDescriptor {
    /// Sized internal format, e.g. `GL_RGBA8`.
    pub internal_format: u32,
    /// Client pixel format, e.g. `GL_RGBA`.
    pub pixel_format: u32,
    /// Client component type, e.g. `GL_UNSIGNED_BYTE`.
    pub pixel_type: u32,
    /// Bytes one texel occupies, both in client memory and (estimated) on
    /// the GPU.
    pub bytes_per_pixel: u32,
}

const fn desc(
    internal_format: u32,
    pixel_format: u32,
    pixel_type: u32,
    bytes_per_pixel: u32,
) -> FormatDescriptor {
    FormatDescriptor {
        internal_format,
        pixel_format,
        pixel_type,
        bytes_per_pixel,
    }
}

/// Sized storage formats supported by the wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TextureFormat {
    /// One 8-bit normalized channel.
    R8,
    /// Two 8-bit normalized channels.
    Rg8,
    /// Three 8-bit normalized channels.
    Rgb8,
    /// Four 8-bit normalized channels.
    Rgba8,
    /// sRGB-encoded RGB.
    Srgb8,
    /// sRGB-encoded RGB with linear alpha.
    Srgb8Alpha8,
    /// One half-float channel.
    R16F,
    /// Two half-float channels.
    Rg16F,
    /// Four half-float channels.
    Rgba16F,
    /// One float channel.
    R32F,
    /// Two float channels.
    Rg32F,
    /// Four float channels.
    Rgba32F,
    /// Packed unsigned floats, 11/11/10 bits.
    R11G11B10F,
    /// One unsigned integer channel.
    R32Ui,
    /// 16-bit depth.
    Depth16,
    /// 24-bit depth.
    Depth24,
    /// 32-bit float depth.
    Depth32F,
    /// 24-bit depth with 8-bit stencil.
    Depth24Stencil8,
    /// 32-bit float depth with 8-bit stencil.
    Depth32FStencil8,
}

impl TextureFormat {
    /// Every format, in declaration order.
    pub const ALL: [TextureFormat; 19] = [
        Self::R8,
        Self::Rg8,
        Self::Rgb8,
        Self::Rgba8,
        Self::Srgb8,
        Self::Srgb8Alpha8,
        Self::R16F,
        Self::Rg16F,
        Self::Rgba16F,
        Self::R32F,
        Self::Rg32F,
        Self::Rgba32F,
        Self::R11G11B10F,
        Self::R32Ui,
        Self::Depth16,
        Self::Depth24,
        Self::Depth32F,
        Self::Depth24Stencil8,
        Self::Depth32FStencil8,
    ];

    /// The descriptor tuple for this format.
    #[must_use]
    pub const fn descriptor(self) -> FormatDescriptor {
        match self {
            Self::R8 => desc(glow::R8, glow::RED, glow::UNSIGNED_BYTE, 1),
            Self::Rg8 => desc(glow::RG8, glow::RG, glow::UNSIGNED_BYTE, 2),
            Self::Rgb8 => desc(glow::RGB8, glow::RGB, glow::UNSIGNED_BYTE, 3),
            Self::Rgba8 => desc(glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE, 4),
            Self::Srgb8 => desc(glow::SRGB8, glow::RGB, glow::UNSIGNED_BYTE, 3),
            Self::Srgb8Alpha8 => desc(glow::SRGB8_ALPHA8, glow::RGBA, glow::UNSIGNED_BYTE, 4),
            Self::R16F => desc(glow::R16F, glow::RED, glow::HALF_FLOAT, 2),
            Self::Rg16F => desc(glow::RG16F, glow::RG, glow::HALF_FLOAT, 4),
            Self::Rgba16F => desc(glow::RGBA16F, glow::RGBA, glow::HALF_FLOAT, 8),
            Self::R32F => desc(glow::R32F, glow::RED, glow::FLOAT, 4),
            Self::Rg32F => desc(glow::RG32F, glow::RG, glow::FLOAT, 8),
            Self::Rgba32F => desc(glow::RGBA32F, glow::RGBA, glow::FLOAT, 16),
            Self::R11G11B10F => desc(
                glow::R11F_G11F_B10F,
                glow::RGB,
                glow::UNSIGNED_INT_10F_11F_11F_REV,
                4,
            ),
            Self::R32Ui => desc(glow::R32UI, glow::RED_INTEGER, glow::UNSIGNED_INT, 4),
            Self::Depth16 => desc(
                glow::DEPTH_COMPONENT16,
                glow::DEPTH_COMPONENT,
                glow::UNSIGNED_SHORT,
                2,
            ),
            Self::Depth24 => desc(
                glow::DEPTH_COMPONENT24,
                glow::DEPTH_COMPONENT,
                glow::UNSIGNED_INT,
                4,
            ),
            Self::Depth32F => desc(
                glow::DEPTH_COMPONENT32F,
                glow::DEPTH_COMPONENT,
                glow::FLOAT,
                4,
            ),
            Self::Depth24Stencil8 => desc(
                glow::DEPTH24_STENCIL8,
                glow::DEPTH_STENCIL,
                glow::UNSIGNED_INT_24_8,
                4,
            ),
            Self::Depth32FStencil8 => desc(
                glow::DEPTH32F_STENCIL8,
                glow::DEPTH_STENCIL,
                glow::FLOAT_32_UNSIGNED_INT_24_8_REV,
                8,
            ),
        }
    }

    /// Sized internal format enum.
    #[must_use]
    pub const fn internal_format(self) -> u32 {
        self.descriptor().internal_format
    }

    /// Bytes per texel.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> u32 {
        self.descriptor().bytes_per_pixel
    }

    /// Whether the format has a depth component.
    #[must_use]
    pub const fn is_depth(self) -> bool {
        matches!(
            self,
            Self::Depth16
                | Self::Depth24
                | Self::Depth32F
                | Self::Depth24Stencil8
                | Self::Depth32FStencil8
        )
    }

    /// Whether the format has a stencil component.
    #[must_use]
    pub const fn has_stencil(self) -> bool {
        matches!(self, Self::Depth24Stencil8 | Self::Depth32FStencil8)
    }

    /// Whether the format can be attached as a color attachment.
    #[must_use]
    pub const fn is_color(self) -> bool {
        !self.is_depth()
    }

    /// Whether the color channels are sRGB encoded.
    #[must_use]
    pub const fn is_srgb(self) -> bool {
        matches!(self, Self::Srgb8 | Self::Srgb8Alpha8)
    }

    /// Whether the format is sampled as an integer (no filtering allowed).
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::R32Ui)
    }

    /// Bytes needed for a tightly packed `width` x `height` image.
    #[must_use]
    pub fn image_size(self, width: u32, height: u32) -> u64 {
        u64::from(width) * u64::from(height) * u64::from(self.bytes_per_pixel())
    }

    /// The format to upload decoded pixels of `color` without conversion,
    /// if there is one.
    ///
    /// Luminance images have no direct match: an `R8` upload would sample
    /// as red, so they go through RGBA8 conversion like everything else.
    #[must_use]
    pub fn from_image_color(color: ColorType) -> Option<Self> {
        match color {
            ColorType::Rgb8 => Some(Self::Rgb8),
            ColorType::Rgba8 => Some(Self::Rgba8),
            ColorType::Rgba32F => Some(Self::Rgba32F),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rgba8_descriptor() {
        let d = TextureFormat::Rgba8.descriptor();
        assert_eq!(d.internal_format, glow::RGBA8);
        assert_eq!(d.pixel_format, glow::RGBA);
        assert_eq!(d.pixel_type, glow::UNSIGNED_BYTE);
        assert_eq!(d.bytes_per_pixel, 4);
    }

    #[test]
    fn depth_and_stencil_flags() {
        for format in TextureFormat::ALL {
            let d = format.descriptor();
            if format.is_depth() {
                assert!(
                    d.pixel_format == glow::DEPTH_COMPONENT || d.pixel_format == glow::DEPTH_STENCIL,
                    "{format:?}"
                );
                assert!(!format.is_color());
            }
            assert_eq!(format.has_stencil(), d.pixel_format == glow::DEPTH_STENCIL);
        }
    }

    #[test]
    fn internal_formats_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for format in TextureFormat::ALL {
            assert!(seen.insert(format.internal_format()), "{format:?}");
        }
    }

    #[test]
    fn image_size_uses_bytes_per_pixel() {
        assert_eq!(TextureFormat::Rgba16F.image_size(4, 2), 64);
        assert_eq!(TextureFormat::R8.image_size(3, 3), 9);
        assert_eq!(TextureFormat::Rgb8.image_size(0, 100), 0);
    }

    #[test]
    fn image_color_mapping() {
        assert_eq!(
            TextureFormat::from_image_color(ColorType::Rgba8),
            Some(TextureFormat::Rgba8)
        );
        assert_eq!(
            TextureFormat::from_image_color(ColorType::Rgb8),
            Some(TextureFormat::Rgb8)
        );
        assert_eq!(TextureFormat::from_image_color(ColorType::L8), None);
        assert_eq!(TextureFormat::from_image_color(ColorType::La8), None);
        assert_eq!(TextureFormat::from_image_color(ColorType::Rgb16), None);
    }

    #[test]
    fn srgb_and_integer_flags() {
        assert!(TextureFormat::Srgb8Alpha8.is_srgb());
        assert!(!TextureFormat::Rgba8.is_srgb());
        assert!(TextureFormat::R32Ui.is_integer());
        assert!(TextureFormat::R32Ui.is_color());
    }

    #[test]
    fn decoded_grayscale_uploads_as_rgba() {
        let gray = image::GrayImage::from_raw(2, 2, vec![0, 64, 128, 255]).unwrap();
        let mut png = std::io::Cursor::new(Vec::new());
        gray.write_to(&mut png, image::ImageFormat::Png).unwrap();

        let decoded = image::load_from_memory(png.get_ref()).unwrap();
        assert_eq!(decoded.color(), ColorType::L8);
        assert_eq!(TextureFormat::from_image_color(decoded.color()), None);

        let rgba = decoded.to_rgba8();
        assert_eq!(rgba.get_pixel(1, 0).0, [64, 64, 64, 255]);
    }
}
