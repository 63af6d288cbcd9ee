//! Shader stages and linked programs.

use std::cell::RefCell;
use std::collections::HashMap;

use glow::HasContext;

use crate::{
    context::GpuContext,
    error::{Error, Result},
};

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// `GL_VERTEX_SHADER`.
    Vertex,
    /// `GL_FRAGMENT_SHADER`.
    Fragment,
    /// `GL_GEOMETRY_SHADER`.
    Geometry,
}

impl ShaderStage {
    /// The GL enum.
    #[must_use]
    pub const fn gl(self) -> u32 {
        match self {
            Self::Vertex => glow::VERTEX_SHADER,
            Self::Fragment => glow::FRAGMENT_SHADER,
            Self::Geometry => glow::GEOMETRY_SHADER,
        }
    }

    /// Lowercase name used in error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
            Self::Geometry => "geometry",
        }
    }
}

/// A compiled shader stage.
pub struct Shader {
    ctx: GpuContext,
    raw: glow::Shader,
    stage: ShaderStage,
}

impl Shader {
    /// Compile a single stage from GLSL source.
    ///
    /// # Safety
    ///
    /// Requires `ctx` to be current.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShaderCompile`] with the driver's info log.
    pub unsafe fn compile(ctx: &GpuContext, stage: ShaderStage, source: &str) -> Result<Self> {
        let gl = ctx.gl();
        unsafe {
            let raw = gl.create_shader(stage.gl()).map_err(Error::create("shader"))?;
            gl.shader_source(raw, source);
            gl.compile_shader(raw);

            if !gl.get_shader_compile_status(raw) {
                let log = gl.get_shader_info_log(raw);
                gl.delete_shader(raw);
                log::error!("{} shader failed to compile: {log}", stage.name());
                return Err(Error::ShaderCompile {
                    stage: stage.name(),
                    log,
                });
            }

            Ok(Self {
                ctx: ctx.clone(),
                raw,
                stage,
            })
        }
    }

    /// The stage this shader was compiled for.
    #[must_use]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// The raw glow handle.
    #[must_use]
    pub fn raw(&self) -> glow::Shader {
        self.raw
    }

    /// Delete the shader object. Programs it was linked into keep working.
    ///
    /// # Safety
    ///
    /// Must be called with the context current.
    pub unsafe fn destroy(self) {
        unsafe { self.ctx.gl().delete_shader(self.raw) };
    }
}

/// A value to upload to a uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Uniform {
    /// `float`.
    F32(f32),
    /// `vec2`.
    Vec2([f32; 2]),
    /// `vec3`.
    Vec3([f32; 3]),
    /// `vec4`.
    Vec4([f32; 4]),
    /// `int` or `bool`.
    I32(i32),
    /// `uint`.
    U32(u32),
    /// Column-major `mat3`.
    Mat3([f32; 9]),
    /// Column-major `mat4`.
    Mat4([f32; 16]),
    /// A sampler bound to texture unit `n`.
    Sampler(u32),
}

/// A linked shader program.
///
/// Uniform locations are looked up once per name and cached.
pub struct Program {
    ctx: GpuContext,
    raw: glow::Program,
    uniforms: RefCell<HashMap<String, Option<glow::UniformLocation>>>,
}

impl Program {
    /// Link `shaders` into a program. The shaders are detached afterwards
    /// and can be destroyed by the caller.
    ///
    /// # Safety
    ///
    /// Requires `ctx` to be current.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProgramLink`] with the driver's info log.
    pub unsafe fn link(ctx: &GpuContext, shaders: &[&Shader]) -> Result<Self> {
        let gl = ctx.gl();
        let raw = unsafe { gl.create_program() }.map_err(Error::create("program"))?;

        unsafe {
            for shader in shaders {
                gl.attach_shader(raw, shader.raw);
            }
            gl.link_program(raw);
            for shader in shaders {
                gl.detach_shader(raw, shader.raw);
            }

            if !gl.get_program_link_status(raw) {
                let log = gl.get_program_info_log(raw);
                gl.delete_program(raw);
                log::error!("program failed to link: {log}");
                return Err(Error::ProgramLink { log });
            }
        }

        log::debug!("linked program {raw:?} from {} stages", shaders.len());
        Ok(Self {
            ctx: ctx.clone(),
            raw,
            uniforms: RefCell::new(HashMap::new()),
        })
    }

    /// Compile a vertex and fragment stage and link them. The compiled
    /// stages are deleted once linking finishes, so only the program needs to
    /// be cleaned up by the caller.
    ///
    /// # Safety
    ///
    /// Requires `ctx` to be current.
    pub unsafe fn from_sources(
        ctx: &GpuContext,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<Self> {
        let vs = unsafe { Shader::compile(ctx, ShaderStage::Vertex, vertex_src) }?;
        let fs = match unsafe { Shader::compile(ctx, ShaderStage::Fragment, fragment_src) } {
            Ok(fs) => fs,
            Err(err) => {
                unsafe { vs.destroy() };
                return Err(err);
            }
        };

        let program = unsafe { Self::link(ctx, &[&vs, &fs]) };
        unsafe {
            vs.destroy();
            fs.destroy();
        }
        program
    }

    /// Make this program current.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn bind(&self) {
        unsafe { self.ctx.use_program(Some(self.raw)) };
    }

    /// The location of uniform `name`, or `None` if the program has no
    /// active uniform by that name.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn uniform_location(&self, name: &str) -> Option<glow::UniformLocation> {
        if let Some(location) = self.uniforms.borrow().get(name) {
            return location.clone();
        }
        let location = unsafe { self.ctx.gl().get_uniform_location(self.raw, name) };
        self.uniforms
            .borrow_mut()
            .insert(name.to_owned(), location.clone());
        location
    }

    /// The location of vertex attribute `name`.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn attribute_location(&self, name: &str) -> Option<u32> {
        unsafe { self.ctx.gl().get_attrib_location(self.raw, name) }
    }

    /// Bind the program and upload `value` to uniform `name`.
    ///
    /// Names that are not active in the program (for example because the
    /// compiler optimized them out) are skipped.
    ///
    /// # Safety
    ///
    /// Requires the context to be current.
    pub unsafe fn set_uniform(&self, name: &str, value: Uniform) {
        let Some(location) = (unsafe { self.uniform_location(name) }) else {
            log::debug!("uniform {name} is not active in program {:?}", self.raw);
            return;
        };
        let loc = Some(&location);
        let gl = self.ctx.gl();
        unsafe {
            self.bind();
            match value {
                Uniform::F32(v) => gl.uniform_1_f32(loc, v),
                Uniform::Vec2([x, y]) => gl.uniform_2_f32(loc, x, y),
                Uniform::Vec3([x, y, z]) => gl.uniform_3_f32(loc, x, y, z),
                Uniform::Vec4([x, y, z, w]) => gl.uniform_4_f32(loc, x, y, z, w),
                Uniform::I32(v) => gl.uniform_1_i32(loc, v),
                Uniform::U32(v) => gl.uniform_1_u32(loc, v),
                Uniform::Mat3(m) => gl.uniform_matrix_3_f32_slice(loc, false, &m),
                Uniform::Mat4(m) => gl.uniform_matrix_4_f32_slice(loc, false, &m),
                Uniform::Sampler(unit) => match i32::try_from(unit) {
                    Ok(unit) => gl.uniform_1_i32(loc, unit),
                    Err(_) => log::warn!("texture unit {unit} out of range for {name}"),
                },
            }
        }
    }

    /// The raw glow handle.
    #[must_use]
    pub fn raw(&self) -> glow::Program {
        self.raw
    }

    /// Delete the program.
    ///
    /// # Safety
    ///
    /// Must be called with the context current.
    pub unsafe fn destroy(self) {
        unsafe { self.ctx.gl().delete_program(self.raw) };
        self.ctx.state().forget_program(self.raw);
        log::debug!("deleted program {:?}", self.raw);
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("raw", &self.raw)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_enums() {
        assert_eq!(ShaderStage::Vertex.gl(), glow::VERTEX_SHADER);
        assert_eq!(ShaderStage::Fragment.gl(), glow::FRAGMENT_SHADER);
        assert_eq!(ShaderStage::Geometry.gl(), glow::GEOMETRY_SHADER);
    }

    #[test]
    fn compile_error_names_stage() {
        let err = Error::ShaderCompile {
            stage: ShaderStage::Fragment.name(),
            log: "0:3: 'frag_colour' undeclared".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "fragment shader compile error: 0:3: 'frag_colour' undeclared"
        );
    }
}
