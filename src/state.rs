//! Cache of the driver's current bindings.
//!
//! Every slot records the last object bound through a [`GpuContext`]. A bind
//! that matches the slot is skipped. Last bind wins; there is no conflict
//! resolution beyond that.
//!
//! [`GpuContext`]: crate::GpuContext

use std::collections::HashMap;

use crate::buffer::BufferTarget;
use crate::framebuffer::FramebufferTarget;
use crate::texture::TextureTarget;

/// One cached binding point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot<T> {
    /// The driver state is not known; the next bind must be issued.
    Unknown,
    /// The driver has this object (or nothing) bound.
    Bound(Option<T>),
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot::Unknown
    }
}

impl<T: Copy + PartialEq> Slot<T> {
    /// Record a bind. Returns `true` if the driver call must be issued.
    pub fn update(&mut self, value: Option<T>) -> bool {
        let next = Slot::Bound(value);
        if *self == next {
            false
        } else {
            *self = next;
            true
        }
    }

    /// The cached object, if known and bound.
    pub fn get(&self) -> Option<T> {
        match self {
            Slot::Bound(value) => *value,
            Slot::Unknown => None,
        }
    }

    /// Reset the slot to unbound if it holds `value`.
    pub fn forget(&mut self, value: T) {
        if *self == Slot::Bound(Some(value)) {
            *self = Slot::Bound(None);
        }
    }
}

/// All binding points the wrappers touch.
#[derive(Debug, Default)]
pub(crate) struct BindState {
    buffers: [Slot<glow::Buffer>; BufferTarget::COUNT],
    active_unit: Slot<u32>,
    textures: HashMap<(u32, TextureTarget), Slot<glow::Texture>>,
    read_framebuffer: Slot<glow::Framebuffer>,
    draw_framebuffer: Slot<glow::Framebuffer>,
    renderbuffer: Slot<glow::Renderbuffer>,
    vertex_array: Slot<glow::VertexArray>,
    program: Slot<glow::Program>,
}

impl BindState {
    pub fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<glow::Buffer>) -> bool {
        self.buffers[target.index()].update(buffer)
    }

    pub fn buffer(&self, target: BufferTarget) -> Option<glow::Buffer> {
        self.buffers[target.index()].get()
    }

    pub fn set_active_unit(&mut self, unit: u32) -> bool {
        self.active_unit.update(Some(unit))
    }

    pub fn bind_texture(
        &mut self,
        unit: u32,
        target: TextureTarget,
        texture: Option<glow::Texture>,
    ) -> bool {
        self.textures.entry((unit, target)).or_default().update(texture)
    }

    pub fn texture(&self, unit: u32, target: TextureTarget) -> Option<glow::Texture> {
        self.textures
            .get(&(unit, target))
            .and_then(Slot::get)
    }

    pub fn bind_framebuffer(
        &mut self,
        target: FramebufferTarget,
        framebuffer: Option<glow::Framebuffer>,
    ) -> bool {
        match target {
            FramebufferTarget::Read => self.read_framebuffer.update(framebuffer),
            FramebufferTarget::Draw => self.draw_framebuffer.update(framebuffer),
            FramebufferTarget::Both => {
                // Both slots must be updated, so no short-circuit.
                let read = self.read_framebuffer.update(framebuffer);
                let draw = self.draw_framebuffer.update(framebuffer);
                read | draw
            }
        }
    }

    pub fn framebuffer(&self, target: FramebufferTarget) -> Option<glow::Framebuffer> {
        match target {
            FramebufferTarget::Read => self.read_framebuffer.get(),
            FramebufferTarget::Draw | FramebufferTarget::Both => self.draw_framebuffer.get(),
        }
    }

    pub fn bind_renderbuffer(&mut self, renderbuffer: Option<glow::Renderbuffer>) -> bool {
        self.renderbuffer.update(renderbuffer)
    }

    pub fn bind_vertex_array(&mut self, vertex_array: Option<glow::VertexArray>) -> bool {
        let changed = self.vertex_array.update(vertex_array);
        if changed {
            // The element buffer binding lives in the vertex array object.
            self.buffers[BufferTarget::ElementArray.index()] = Slot::Unknown;
        }
        changed
    }

    pub fn vertex_array(&self) -> Option<glow::VertexArray> {
        self.vertex_array.get()
    }

    pub fn use_program(&mut self, program: Option<glow::Program>) -> bool {
        self.program.update(program)
    }

    pub fn program(&self) -> Option<glow::Program> {
        self.program.get()
    }

    pub fn forget_buffer(&mut self, buffer: glow::Buffer) {
        for slot in &mut self.buffers {
            slot.forget(buffer);
        }
    }

    pub fn forget_texture(&mut self, texture: glow::Texture) {
        for slot in self.textures.values_mut() {
            slot.forget(texture);
        }
    }

    pub fn forget_framebuffer(&mut self, framebuffer: glow::Framebuffer) {
        self.read_framebuffer.forget(framebuffer);
        self.draw_framebuffer.forget(framebuffer);
    }

    pub fn forget_renderbuffer(&mut self, renderbuffer: glow::Renderbuffer) {
        self.renderbuffer.forget(renderbuffer);
    }

    pub fn forget_vertex_array(&mut self, vertex_array: glow::VertexArray) {
        if self.vertex_array == Slot::Bound(Some(vertex_array)) {
            self.vertex_array = Slot::Bound(None);
            self.buffers[BufferTarget::ElementArray.index()] = Slot::Unknown;
        }
    }

    pub fn forget_program(&mut self, program: glow::Program) {
        self.program.forget(program);
    }

    /// Forget everything, forcing the next bind on every slot.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;

    fn id(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    fn buffer(n: u32) -> glow::Buffer {
        glow::NativeBuffer(id(n))
    }

    fn texture(n: u32) -> glow::Texture {
        glow::NativeTexture(id(n))
    }

    fn framebuffer(n: u32) -> glow::Framebuffer {
        glow::NativeFramebuffer(id(n))
    }

    fn vertex_array(n: u32) -> glow::VertexArray {
        glow::NativeVertexArray(id(n))
    }

    #[test]
    fn slot_starts_unknown_and_elides_repeats() {
        let mut slot = Slot::<u32>::default();
        assert_eq!(slot.get(), None);
        // Unbinding from an unknown state must still reach the driver.
        assert!(slot.update(None));
        assert!(!slot.update(None));
        assert!(slot.update(Some(3)));
        assert!(!slot.update(Some(3)));
        assert_eq!(slot.get(), Some(3));
        assert!(slot.update(Some(4)));
    }

    #[test]
    fn slot_forget_only_matches_same_object() {
        let mut slot = Slot::Bound(Some(7));
        slot.forget(8);
        assert_eq!(slot.get(), Some(7));
        slot.forget(7);
        assert_eq!(slot, Slot::Bound(None));
    }

    #[test]
    fn buffers_are_tracked_per_target() {
        let mut state = BindState::default();
        assert!(state.bind_buffer(BufferTarget::Array, Some(buffer(1))));
        assert!(state.bind_buffer(BufferTarget::Uniform, Some(buffer(1))));
        assert!(!state.bind_buffer(BufferTarget::Array, Some(buffer(1))));
        assert_eq!(state.buffer(BufferTarget::Array), Some(buffer(1)));
        assert_eq!(state.buffer(BufferTarget::CopyRead), None);

        state.forget_buffer(buffer(1));
        assert_eq!(state.buffer(BufferTarget::Array), None);
        assert_eq!(state.buffer(BufferTarget::Uniform), None);
        // A deleted buffer leaves the slot known-unbound, not unknown.
        assert!(!state.bind_buffer(BufferTarget::Array, None));
    }

    #[test]
    fn vertex_array_bind_invalidates_element_buffer() {
        let mut state = BindState::default();
        assert!(state.bind_vertex_array(Some(vertex_array(1))));
        assert!(state.bind_buffer(BufferTarget::ElementArray, Some(buffer(5))));
        assert!(!state.bind_buffer(BufferTarget::ElementArray, Some(buffer(5))));

        assert!(state.bind_vertex_array(Some(vertex_array(2))));
        assert_eq!(state.buffer(BufferTarget::ElementArray), None);
        assert!(state.bind_buffer(BufferTarget::ElementArray, Some(buffer(5))));

        // Re-binding the same vertex array keeps the element slot.
        assert!(!state.bind_vertex_array(Some(vertex_array(2))));
        assert_eq!(state.buffer(BufferTarget::ElementArray), Some(buffer(5)));
    }

    #[test]
    fn index_upload_leaves_bound_vertex_array_alone() {
        let mut state = BindState::default();
        state.bind_vertex_array(Some(vertex_array(1)));
        state.bind_buffer(BufferTarget::ElementArray, Some(buffer(1)));

        // A second mesh's index data is written through COPY_WRITE.
        let upload = BufferTarget::ElementArray.upload_target();
        assert!(state.bind_buffer(upload, Some(buffer(2))));
        assert_eq!(state.vertex_array(), Some(vertex_array(1)));
        assert_eq!(state.buffer(BufferTarget::ElementArray), Some(buffer(1)));
        assert_eq!(state.buffer(BufferTarget::CopyWrite), Some(buffer(2)));
    }

    #[test]
    fn pixel_buffer_upload_keeps_unpack_binding_clear() {
        let mut state = BindState::default();
        assert!(state.bind_buffer(BufferTarget::PixelUnpack, None));
        let upload = BufferTarget::PixelUnpack.upload_target();
        state.bind_buffer(upload, Some(buffer(3)));
        // Texture uploads find nothing bound and need no extra unbind.
        assert!(!state.bind_buffer(BufferTarget::PixelUnpack, None));
    }

    #[test]
    fn deleting_bound_vertex_array_unbinds_it() {
        let mut state = BindState::default();
        state.bind_vertex_array(Some(vertex_array(3)));
        state.forget_vertex_array(vertex_array(3));
        assert_eq!(state.vertex_array(), None);
        assert!(!state.bind_vertex_array(None));
    }

    #[test]
    fn framebuffer_both_updates_read_and_draw() {
        let mut state = BindState::default();
        assert!(state.bind_framebuffer(FramebufferTarget::Both, Some(framebuffer(2))));
        assert_eq!(state.framebuffer(FramebufferTarget::Read), Some(framebuffer(2)));
        assert_eq!(state.framebuffer(FramebufferTarget::Draw), Some(framebuffer(2)));
        assert!(!state.bind_framebuffer(FramebufferTarget::Read, Some(framebuffer(2))));

        // Changing only the read side still requires the combined bind.
        assert!(state.bind_framebuffer(FramebufferTarget::Read, None));
        assert!(state.bind_framebuffer(FramebufferTarget::Both, Some(framebuffer(2))));

        state.forget_framebuffer(framebuffer(2));
        assert_eq!(state.framebuffer(FramebufferTarget::Draw), None);
    }

    #[test]
    fn textures_are_tracked_per_unit_and_target() {
        let mut state = BindState::default();
        assert!(state.set_active_unit(0));
        assert!(!state.set_active_unit(0));
        assert!(state.bind_texture(0, TextureTarget::Texture2D, Some(texture(9))));
        assert!(state.bind_texture(1, TextureTarget::Texture2D, Some(texture(9))));
        assert!(state.bind_texture(0, TextureTarget::CubeMap, Some(texture(10))));
        assert!(!state.bind_texture(0, TextureTarget::Texture2D, Some(texture(9))));

        state.forget_texture(texture(9));
        assert_eq!(state.texture(0, TextureTarget::Texture2D), None);
        assert_eq!(state.texture(1, TextureTarget::Texture2D), None);
        assert_eq!(state.texture(0, TextureTarget::CubeMap), Some(texture(10)));
    }

    #[test]
    fn reset_forces_rebinds() {
        let mut state = BindState::default();
        state.bind_buffer(BufferTarget::Array, Some(buffer(1)));
        state.set_active_unit(2);
        state.reset();
        assert!(state.bind_buffer(BufferTarget::Array, Some(buffer(1))));
        assert!(state.set_active_unit(2));
    }
}
