use std::borrow::Cow;

use tracing::debug;
use wgpu::naga::front::glsl;
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};
use wgpu::naga::{self, ShaderStage};

use crate::error::RenderError;
use crate::transpile::{CanonicalProgram, StandardUniform};

/// Which standard uniforms the fragment entry point actually reads.
///
/// Resolved once at compile time; uniforms the shader never touches are
/// skipped on every frame update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UniformUsage {
    time: bool,
    resolution: bool,
    mouse: bool,
}

impl UniformUsage {
    pub fn uses(&self, uniform: StandardUniform) -> bool {
        match uniform {
            StandardUniform::Time => self.time,
            StandardUniform::Resolution => self.resolution,
            StandardUniform::Mouse => self.mouse,
        }
    }

    fn mark(&mut self, uniform: StandardUniform) {
        match uniform {
            StandardUniform::Time => self.time = true,
            StandardUniform::Resolution => self.resolution = true,
            StandardUniform::Mouse => self.mouse = true,
        }
    }
}

/// A canonical program that parsed and validated as a fragment shader.
pub struct CompiledProgram {
    canonical: CanonicalProgram,
    module: naga::Module,
    usage: UniformUsage,
}

impl CompiledProgram {
    pub fn canonical(&self) -> &CanonicalProgram {
        &self.canonical
    }

    pub fn uniform_usage(&self) -> UniformUsage {
        self.usage
    }

    /// Builds the compile error reported for this program.
    pub(crate) fn error(&self, message: impl Into<String>) -> RenderError {
        compile_error(&self.canonical, message)
    }
}

impl std::fmt::Debug for CompiledProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledProgram")
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}

/// Parses and validates `program` with naga's GLSL frontend.
///
/// This runs entirely on the CPU, so a broken shader is rejected before a GPU
/// context exists or an encoder process is spawned.
pub fn compile(program: &CanonicalProgram) -> Result<CompiledProgram, RenderError> {
    let source = program.text();
    let mut frontend = glsl::Frontend::default();
    let module = frontend
        .parse(&glsl::Options::from(ShaderStage::Fragment), source)
        .map_err(|errors| compile_error(program, errors.emit_to_string(source)))?;

    let info = Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|err| compile_error(program, err.emit_to_string(source)))?;

    let entry_index = module
        .entry_points
        .iter()
        .position(|entry| entry.stage == ShaderStage::Fragment)
        .ok_or_else(|| compile_error(program, "no fragment entry point `main` was found"))?;
    let entry_info = info.get_entry_point(entry_index);

    let mut usage = UniformUsage::default();
    for (handle, variable) in module.global_variables.iter() {
        let Some(binding) = variable.binding.as_ref() else {
            continue;
        };
        if binding.group != 0 {
            continue;
        }
        let standard = StandardUniform::ALL
            .into_iter()
            .find(|uniform| uniform.binding() == binding.binding);
        if let Some(uniform) = standard {
            if !entry_info[handle].is_empty() {
                usage.mark(uniform);
            }
        }
    }

    debug!(
        time = usage.time,
        resolution = usage.resolution,
        mouse = usage.mouse,
        inserted_output = program.inserted_output(),
        inserted_entry = program.inserted_entry(),
        "compiled canonical fragment shader"
    );

    Ok(CompiledProgram {
        canonical: program.clone(),
        module,
        usage,
    })
}

fn compile_error(program: &CanonicalProgram, message: impl Into<String>) -> RenderError {
    RenderError::ShaderCompile {
        message: message.into(),
        canonical_source: program.numbered(),
    }
}

/// Compiles the fixed pass-through vertex shader for the fullscreen strip.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("shadereel quad vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    })
}

/// Hands the already validated naga module to wgpu.
pub(crate) fn create_fragment_module(
    device: &wgpu::Device,
    program: &CompiledProgram,
) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("shadereel fragment"),
        source: wgpu::ShaderSource::Naga(Cow::Owned(program.module.clone())),
    })
}

/// Maps each corner of the triangle strip straight to clip space.
const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 in_position;

void main() {
    gl_Position = vec4(in_position, 0.0, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transpile::{transpile, ShaderSource};

    fn compile_text(source: &str) -> Result<CompiledProgram, RenderError> {
        compile(&transpile(&ShaderSource::from_text(source)))
    }

    #[test]
    fn compiles_legacy_shader() {
        let compiled = compile_text(
            r#"
#ifdef GL_ES
precision mediump float;
#endif
uniform float u_time;
uniform vec2 u_resolution;
void main() {
    vec2 st = gl_FragCoord.xy / u_resolution;
    gl_FragColor = vec4(st, abs(sin(u_time)), 1.0);
}
"#,
        )
        .expect("legacy shader compiles");
        let usage = compiled.uniform_usage();
        assert!(usage.uses(StandardUniform::Time));
        assert!(usage.uses(StandardUniform::Resolution));
        assert!(!usage.uses(StandardUniform::Mouse));
    }

    #[test]
    fn compiles_main_image_shader() {
        let compiled = compile_text(
            r#"
void mainImage(out vec4 color, in vec2 fragCoord) {
    color = vec4(fragCoord / u_resolution, 0.0, 1.0);
}
"#,
        )
        .expect("mainImage shader compiles");
        let usage = compiled.uniform_usage();
        assert!(!usage.uses(StandardUniform::Time));
        assert!(usage.uses(StandardUniform::Resolution));
    }

    #[test]
    fn unused_uniforms_are_not_reported() {
        let compiled = compile_text("void main() { gl_FragColor = vec4(1.0, 0.0, 0.0, 1.0); }\n")
            .expect("solid shader compiles");
        for uniform in StandardUniform::ALL {
            assert!(!compiled.uniform_usage().uses(uniform));
        }
    }

    #[test]
    fn syntax_error_reports_generated_source() {
        let err = compile_text("void main() { gl_FragColor = vec4(1.0 }\n").unwrap_err();
        match err {
            RenderError::ShaderCompile {
                message,
                canonical_source,
            } => {
                assert!(!message.is_empty());
                assert!(canonical_source.contains("#version 450"));
                assert!(canonical_source.contains("fragColor = vec4(1.0 }"));
            }
            other => panic!("expected ShaderCompile, got {other:?}"),
        }
    }

    #[test]
    fn missing_entry_point_is_a_compile_error() {
        let err = compile_text("float helper(float x) { return x * 2.0; }\n").unwrap_err();
        assert!(err.is_shader_compile());
    }
}
