//! Typed wrapper objects over OpenGL, built on [glow].
//!
//! Every wrapper owns one GL object handle and forwards to the driver:
//! [`Buffer`], [`Texture`], [`Renderbuffer`], [`Framebuffer`],
//! [`VertexArray`], [`Shader`] and [`Program`]. They are created from a
//! [`GpuContext`], which carries the glow context together with
//!
//! - a **binding cache** recording what is bound to each target, so
//!   redundant `glBind*` calls are skipped,
//! - [`MemoryStats`], atomic counters of live objects and estimated driver
//!   memory,
//! - the implementation [`Limits`] and the [`ContextConfig`].
//!
//! Formats, filters and wrap modes are static lookup tables: see
//! [`TextureFormat`] and [`SamplerDesc`].
//!
//! # Safety
//!
//! All methods that issue GL calls are `unsafe`: the context the object was
//! created from must be current on the calling thread. Objects are not
//! deleted on drop; call `destroy` on each before the context goes away.
//!
//! [glow]: https://docs.rs/glow

mod buffer;
mod config;
mod context;
mod error;
mod format;
mod framebuffer;
mod renderbuffer;
mod sampler;
mod shader;
mod state;
mod stats;
mod target;
mod texture;
mod vertex_array;

pub use buffer::{Buffer, BufferTarget, BufferUsage};
pub use config::ContextConfig;
pub use context::{GpuContext, Limits};
pub use error::{error_name, Error, Result};
pub use format::{FormatDescriptor, TextureFormat};
pub use framebuffer::{
    check_attachment_format, clear_bound, status_name, Attachment, ClearFlags, ClearValues,
    Framebuffer, FramebufferTarget, Rect,
};
pub use renderbuffer::{renderbuffer_memory, Renderbuffer};
pub use sampler::{min_filter, FilterMode, MipmapMode, SamplerDesc, TexturePreset, WrapMode};
pub use shader::{Program, Shader, ShaderStage, Uniform};
pub use stats::{MemoryStats, MemoryUsage, ResourceKind};
pub use target::RenderTarget;
pub use texture::{
    level_size, mip_level_count, texture_memory, CubeFace, Texture, TextureTarget,
};
pub use vertex_array::{
    AttributeType, IndexType, Primitive, VertexArray, VertexAttribute, VertexLayout,
};

/// Re-exported so callers can name the handle types without depending on
/// glow directly.
pub use glow;
