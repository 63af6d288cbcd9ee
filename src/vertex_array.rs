//! Vertex array objects and vertex layouts.

use glow::HasContext;

use crate::{
    buffer::{Buffer, BufferTarget},
    context::GpuContext,
    error::{gl_len, Error, Result},
};

/// Component type of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// `GL_FLOAT`.
    F32,
    /// `GL_INT`.
    I32,
    /// `GL_UNSIGNED_INT`.
    U32,
    /// `GL_SHORT`.
    I16,
    /// `GL_UNSIGNED_SHORT`.
    U16,
    /// `GL_BYTE`.
    I8,
    /// `GL_UNSIGNED_BYTE`.
    U8,
}

impl AttributeType {
    /// The GL enum.
    #[must_use]
    pub const fn gl(self) -> u32 {
        match self {
            Self::F32 => glow::FLOAT,
            Self::I32 => glow::INT,
            Self::U32 => glow::UNSIGNED_INT,
            Self::I16 => glow::SHORT,
            Self::U16 => glow::UNSIGNED_SHORT,
            Self::I8 => glow::BYTE,
            Self::U8 => glow::UNSIGNED_BYTE,
        }
    }

    /// Size of one component in bytes.
    #[must_use]
    pub const fn size(self) -> u32 {
        match self {
            Self::F32 | Self::I32 | Self::U32 => 4,
            Self::I16 | Self::U16 => 2,
            Self::I8 | Self::U8 => 1,
        }
    }
}

/// Element type of an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    /// `GL_UNSIGNED_BYTE`.
    U8,
    /// `GL_UNSIGNED_SHORT`.
    U16,
    /// `GL_UNSIGNED_INT`.
    U32,
}

impl IndexType {
    /// The GL enum.
    #[must_use]
    pub const fn gl(self) -> u32 {
        match self {
            Self::U8 => glow::UNSIGNED_BYTE,
            Self::U16 => glow::UNSIGNED_SHORT,
            Self::U32 => glow::UNSIGNED_INT,
        }
    }

    /// Size of one index in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

/// Primitive assembly mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Primitive {
    /// `GL_POINTS`.
    Points,
    /// `GL_LINES`.
    Lines,
    /// `GL_LINE_STRIP`.
    LineStrip,
    /// `GL_TRIANGLES`.
    #[default]
    Triangles,
    /// `GL_TRIANGLE_STRIP`.
    TriangleStrip,
    /// `GL_TRIANGLE_FAN`.
    TriangleFan,
}

impl Primitive {
    /// The GL enum.
    #[must_use]
    pub const fn gl(self) -> u32 {
        match self {
            Self::Points => glow::POINTS,
            Self::Lines => glow::LINES,
            Self::LineStrip => glow::LINE_STRIP,
            Self::Triangles => glow::TRIANGLES,
            Self::TriangleStrip => glow::TRIANGLE_STRIP,
            Self::TriangleFan => glow::TRIANGLE_FAN,
        }
    }
}

/// One attribute within an interleaved vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader attribute location.
    pub location: u32,
    /// Number of components, 1 to 4.
    pub components: u32,
    /// Component type.
    pub kind: AttributeType,
    /// Map integer components to `[0, 1]` / `[-1, 1]` floats.
    pub normalized: bool,
    /// Pass components to the shader as integers (`glVertexAttribIPointer`).
    pub integer: bool,
    /// Byte offset within the vertex.
    pub offset: u32,
    /// Instance divisor; 0 advances per vertex.
    pub divisor: u32,
}

impl VertexAttribute {
    /// Bytes the attribute occupies.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.components.saturating_mul(self.kind.size())
    }
}

/// An interleaved vertex format. Offsets are assigned in push order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
    stride: u32,
    divisor: u32,
}

impl VertexLayout {
    /// An empty layout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push_attribute(
        mut self,
        location: u32,
        components: u32,
        kind: AttributeType,
        normalized: bool,
        integer: bool,
    ) -> Self {
        let attribute = VertexAttribute {
            location,
            components,
            kind,
            normalized,
            integer,
            offset: self.stride,
            divisor: self.divisor,
        };
        self.stride = self.stride.saturating_add(attribute.size());
        self.attributes.push(attribute);
        self
    }

    /// Append a float attribute.
    #[must_use]
    pub fn push(self, location: u32, components: u32, kind: AttributeType) -> Self {
        self.push_attribute(location, components, kind, false, false)
    }

    /// Append an integer attribute read as normalized floats.
    #[must_use]
    pub fn push_normalized(self, location: u32, components: u32, kind: AttributeType) -> Self {
        self.push_attribute(location, components, kind, true, false)
    }

    /// Append an attribute read as integers by the shader.
    #[must_use]
    pub fn push_integer(self, location: u32, components: u32, kind: AttributeType) -> Self {
        self.push_attribute(location, components, kind, false, true)
    }

    /// Advance the whole layout once per `divisor` instances instead of per
    /// vertex.
    #[must_use]
    pub fn instanced(mut self, divisor: u32) -> Self {
        self.divisor = divisor;
        for attribute in &mut self.attributes {
            attribute.divisor = divisor;
        }
        self
    }

    /// Override the stride, for vertices with padding after the last
    /// attribute.
    #[must_use]
    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }

    /// Bytes from one vertex to the next.
    #[must_use]
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// The attributes in push order.
    #[must_use]
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Check component counts, integer flags and that every attribute fits
    /// in the stride.
    pub fn validate(&self, max_attribs: u32) -> Result<()> {
        for a in &self.attributes {
            let bad = if !(1..=4).contains(&a.components) {
                Some("component count")
            } else if a.location >= max_attribs {
                Some("attribute location")
            } else if a.integer && a.kind == AttributeType::F32 {
                Some("integer float attribute")
            } else if a.offset.saturating_add(a.size()) > self.stride {
                Some("attribute past stride")
            } else {
                None
            };
            if let Some(format) = bad {
                return Err(Error::UnsupportedFormat {
                    format,
                    usage: "vertex layout",
                });
            }
        }
        Ok(())
    }
}

/// Convert a count to `GLsizei`.
fn gl_count(value: u32) -> Result<i32> {
    gl_len(value as usize)
}

/// A vertex array object.
pub struct VertexArray {
    ctx: GpuContext,
    raw: glow::VertexArray,
    index_type: Option<IndexType>,
}

impl VertexArray {
    /// Create an empty vertex array.
    ///
    /// # Safety
    ///
    /// Requires `ctx` to be current.
    pub unsafe fn new(ctx: &GpuContext) -> Result<Self> {
        let raw = unsafe { ctx.gl().create_vertex_array() }.map_err(Error::create("vertex array"))?;
        log::debug!("created vertex array {raw:?}");
        Ok(Self {
            ctx: ctx.clone(),
            raw,
            index_type: None,
        })
    }

    /// Bind the vertex array.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn bind(&self) {
        unsafe { self.ctx.bind_vertex_array(Some(self.raw)) };
    }

    /// Unbind any vertex array.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn unbind(&self) {
        unsafe { self.ctx.bind_vertex_array(None) };
    }

    /// Source the attributes of `layout` from `buffer`.
    ///
    /// # Safety
    ///
    /// Requires the context to be current. `buffer` must outlive its use by
    /// this vertex array.
    pub unsafe fn set_vertex_buffer(&self, buffer: &Buffer, layout: &VertexLayout) -> Result<()> {
        layout.validate(self.ctx.limits().max_vertex_attribs)?;
        let stride = gl_count(layout.stride())?;
        let gl = self.ctx.gl();
        unsafe {
            self.bind();
            self.ctx.bind_buffer(BufferTarget::Array, Some(buffer.raw()));
        }
        for a in layout.attributes() {
            let (components, offset) = (gl_count(a.components)?, gl_count(a.offset)?);
            unsafe {
                gl.enable_vertex_attrib_array(a.location);
                if a.integer {
                    gl.vertex_attrib_pointer_i32(a.location, components, a.kind.gl(), stride, offset);
                } else {
                    gl.vertex_attrib_pointer_f32(
                        a.location,
                        components,
                        a.kind.gl(),
                        a.normalized,
                        stride,
                        offset,
                    );
                }
                gl.vertex_attrib_divisor(a.location, a.divisor);
            }
        }
        unsafe { self.ctx.check_error("vertex attribute setup") }
    }

    /// Use `buffer` as the element buffer of this vertex array.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn set_index_buffer(&mut self, buffer: &Buffer, index_type: IndexType) {
        unsafe {
            self.bind();
            self.ctx
                .bind_buffer(BufferTarget::ElementArray, Some(buffer.raw()));
        }
        self.index_type = Some(index_type);
    }

    /// The index type set by [`set_index_buffer`](Self::set_index_buffer).
    #[must_use]
    pub fn index_type(&self) -> Option<IndexType> {
        self.index_type
    }

    fn require_indices(&self) -> Result<IndexType> {
        self.index_type.ok_or(Error::UnsupportedFormat {
            format: "vertex array without index buffer",
            usage: "indexed draw",
        })
    }

    /// Draw `count` vertices starting at `first`.
    ///
    /// # Safety
    ///
    /// Requires the context to be current with a program in use.
    pub unsafe fn draw(&self, mode: Primitive, first: u32, count: u32) -> Result<()> {
        let (first, count) = (gl_count(first)?, gl_count(count)?);
        unsafe {
            self.bind();
            self.ctx.gl().draw_arrays(mode.gl(), first, count);
        }
        Ok(())
    }

    /// Draw `count` indices starting at index `first`.
    ///
    /// # Safety
    ///
    /// Requires the context to be current with a program in use.
    pub unsafe fn draw_indexed(&self, mode: Primitive, first: u32, count: u32) -> Result<()> {
        let index_type = self.require_indices()?;
        let offset = gl_len(first as usize * index_type.size())?;
        let count = gl_count(count)?;
        unsafe {
            self.bind();
            self.ctx
                .gl()
                .draw_elements(mode.gl(), count, index_type.gl(), offset);
        }
        Ok(())
    }

    /// Draw `instances` copies of `count` vertices.
    ///
    /// # Safety
    ///
    /// Requires the context to be current with a program in use.
    pub unsafe fn draw_instanced(
        &self,
        mode: Primitive,
        first: u32,
        count: u32,
        instances: u32,
    ) -> Result<()> {
        let (first, count, instances) = (gl_count(first)?, gl_count(count)?, gl_count(instances)?);
        unsafe {
            self.bind();
            self.ctx
                .gl()
                .draw_arrays_instanced(mode.gl(), first, count, instances);
        }
        Ok(())
    }

    /// Draw `instances` copies of `count` indices.
    ///
    /// # Safety
    ///
    /// Requires the context to be current with a program in use.
    pub unsafe fn draw_indexed_instanced(
        &self,
        mode: Primitive,
        first: u32,
        count: u32,
        instances: u32,
    ) -> Result<()> {
        let index_type = self.require_indices()?;
        let offset = gl_len(first as usize * index_type.size())?;
        let (count, instances) = (gl_count(count)?, gl_count(instances)?);
        unsafe {
            self.bind();
            self.ctx.gl().draw_elements_instanced(
                mode.gl(),
                count,
                index_type.gl(),
                offset,
                instances,
            );
        }
        Ok(())
    }

    /// The raw glow handle.
    #[must_use]
    pub fn raw(&self) -> glow::VertexArray {
        self.raw
    }

    /// Delete the vertex array. Its buffers are not deleted.
    ///
    /// # Safety
    ///
    /// Must be called with the context current.
    pub unsafe fn destroy(self) {
        unsafe { self.ctx.gl().delete_vertex_array(self.raw) };
        self.ctx.state().forget_vertex_array(self.raw);
        log::debug!("deleted vertex array {:?}", self.raw);
    }
}

impl std::fmt::Debug for VertexArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexArray")
            .field("raw", &self.raw)
            .field("index_type", &self.index_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleaved_layout_offsets() {
        let layout = VertexLayout::new()
            .push(0, 3, AttributeType::F32)
            .push(1, 2, AttributeType::F32)
            .push_normalized(2, 4, AttributeType::U8);
        let offsets: Vec<u32> = layout.attributes().iter().map(|a| a.offset).collect();
        assert_eq!(offsets, [0, 12, 20]);
        assert_eq!(layout.stride(), 24);
        assert!(layout.attributes()[2].normalized);
        assert!(layout.validate(16).is_ok());
    }

    #[test]
    fn instanced_layout_sets_divisor() {
        let layout = VertexLayout::new()
            .push(4, 4, AttributeType::F32)
            .instanced(1)
            .push_integer(5, 1, AttributeType::U32);
        assert!(layout.attributes().iter().all(|a| a.divisor == 1));
        assert!(layout.attributes()[1].integer);
        assert_eq!(layout.stride(), 20);
    }

    #[test]
    fn padded_stride() {
        let layout = VertexLayout::new().push(0, 2, AttributeType::F32).with_stride(16);
        assert_eq!(layout.stride(), 16);
        assert!(layout.validate(16).is_ok());
    }

    #[test]
    fn validation_failures() {
        let too_many = VertexLayout::new().push(0, 5, AttributeType::F32);
        assert!(too_many.validate(16).is_err());

        let huge = VertexLayout::new()
            .push(0, u32::MAX, AttributeType::F32)
            .push(1, 4, AttributeType::F32);
        assert_eq!(huge.stride(), u32::MAX);
        assert!(huge.validate(16).is_err());

        let bad_location = VertexLayout::new().push(16, 1, AttributeType::F32);
        assert!(bad_location.validate(16).is_err());

        let float_integer = VertexLayout::new().push_integer(0, 1, AttributeType::F32);
        assert!(float_integer.validate(16).is_err());

        let short_stride = VertexLayout::new().push(0, 4, AttributeType::F32).with_stride(8);
        assert!(short_stride.validate(16).is_err());
    }

    #[test]
    fn type_tables() {
        assert_eq!(AttributeType::U16.size(), 2);
        assert_eq!(AttributeType::I32.gl(), glow::INT);
        assert_eq!(IndexType::U16.size(), 2);
        assert_eq!(IndexType::U32.gl(), glow::UNSIGNED_INT);
        assert_eq!(Primitive::default().gl(), glow::TRIANGLES);
    }
}
