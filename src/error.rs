//! Error type shared by every wrapper.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the wrapper objects.
#[derive(Debug, Error)]
pub enum Error {
    /// The driver refused to create an object (`glGen*` / `glCreate*`).
    #[error("failed to create {kind}: {message}")]
    Create {
        /// Kind of object, e.g. `"buffer"`.
        kind: &'static str,
        /// Message returned by glow.
        message: String,
    },

    /// A shader stage failed to compile.
    #[error("{stage} shader compile error: {log}")]
    ShaderCompile {
        /// Name of the stage.
        stage: &'static str,
        /// Driver info log.
        log: String,
    },

    /// A program failed to link.
    #[error("program link error: {log}")]
    ProgramLink {
        /// Driver info log.
        log: String,
    },

    /// `glCheckFramebufferStatus` returned something other than complete.
    #[error("framebuffer incomplete: {status}")]
    IncompleteFramebuffer {
        /// Symbolic name of the status enum.
        status: &'static str,
    },

    /// `glGetError` reported an error after an operation.
    #[error("GL error {name} ({code:#x}) after {operation}")]
    Driver {
        /// The operation that was just issued.
        operation: &'static str,
        /// Raw error enum.
        code: u32,
        /// Symbolic name of the error enum.
        name: &'static str,
    },

    /// A dimension was zero, negative after conversion, or above a limit.
    #[error("invalid size {width}x{height} (limit {limit})")]
    InvalidSize {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
        /// The limit that was exceeded.
        limit: u32,
    },

    /// A sub-upload would write past the end of a store.
    #[error("range {offset}..{end} out of bounds for store of {size} bytes")]
    OutOfBounds {
        /// First byte written.
        offset: usize,
        /// One past the last byte written.
        end: usize,
        /// Size of the store.
        size: usize,
    },

    /// A format cannot be used for the requested operation.
    #[error("unsupported format {format} for {usage}")]
    UnsupportedFormat {
        /// Debug name of the format.
        format: &'static str,
        /// What it was used for.
        usage: &'static str,
    },

    /// An encoded image could not be decoded.
    #[error("image decode error: {0}")]
    Decode(#[from] image::ImageError),
}

impl Error {
    pub(crate) fn create(kind: &'static str) -> impl FnOnce(String) -> Self {
        move |message| Self::Create { kind, message }
    }
}

/// Convert a `u32` dimension to the `i32` that GL entry points take.
pub(crate) fn gl_int(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::InvalidSize {
        width: value,
        height: value,
        limit: i32::MAX.unsigned_abs(),
    })
}

/// Convert a byte count or offset to `i32`.
pub(crate) fn gl_len(value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::OutOfBounds {
        offset: 0,
        end: value,
        size: i32::MAX.unsigned_abs() as usize,
    })
}

/// Symbolic name for a `glGetError` code.
#[must_use]
pub fn error_name(code: u32) -> &'static str {
    match code {
        glow::NO_ERROR => "GL_NO_ERROR",
        glow::INVALID_ENUM => "GL_INVALID_ENUM",
        glow::INVALID_VALUE => "GL_INVALID_VALUE",
        glow::INVALID_OPERATION => "GL_INVALID_OPERATION",
        glow::INVALID_FRAMEBUFFER_OPERATION => "GL_INVALID_FRAMEBUFFER_OPERATION",
        glow::OUT_OF_MEMORY => "GL_OUT_OF_MEMORY",
        glow::STACK_UNDERFLOW => "GL_STACK_UNDERFLOW",
        glow::STACK_OVERFLOW => "GL_STACK_OVERFLOW",
        _ => "unknown GL error",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn error_names() {
        assert_eq!(error_name(glow::INVALID_ENUM), "GL_INVALID_ENUM");
        assert_eq!(error_name(glow::OUT_OF_MEMORY), "GL_OUT_OF_MEMORY");
        assert_eq!(error_name(0xdead), "unknown GL error");
    }

    #[test]
    fn gl_int_rejects_overflow() {
        assert_eq!(gl_int(640).unwrap(), 640);
        assert!(matches!(gl_int(u32::MAX), Err(Error::InvalidSize { .. })));
    }

    #[test]
    fn gl_len_rejects_overflow() {
        assert_eq!(gl_len(16).unwrap(), 16);
        assert!(matches!(gl_len(usize::MAX), Err(Error::OutOfBounds { .. })));
    }

    #[test]
    fn display_includes_driver_error_name() {
        let err = Error::Driver {
            operation: "buffer upload",
            code: glow::INVALID_VALUE,
            name: error_name(glow::INVALID_VALUE),
        };
        assert_eq!(
            err.to_string(),
            "GL error GL_INVALID_VALUE (0x501) after buffer upload"
        );
    }
}
