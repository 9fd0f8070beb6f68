//! Normalises user fragment shaders into one canonical GLSL 450 program.
//!
//! Shaders arrive in a few dialects: legacy GLSL ES 1.0 code writing
//! `gl_FragColor`, ES 3.0 code declaring its own `out vec4`, and
//! ShaderToy-style code that only provides `mainImage`. A single lexical pass
//! strips the lines we provide ourselves (version, precision, `GL_ES` guards,
//! standard uniforms) and renames the legacy output, then the canonical
//! header, an output declaration (when missing), and a `main()` shim (when
//! only `mainImage` exists) are stitched around the body.
//!
//! The pass never fails; malformed code surfaces when [`crate::compile`]
//! hands the result to the GLSL frontend.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RenderError;

/// Identifier every canonical program writes its color to.
pub const OUTPUT_IDENT: &str = "fragColor";

/// Pre-ES 3.0 implicit output rewritten to [`OUTPUT_IDENT`].
pub const LEGACY_OUTPUT_IDENT: &str = "gl_FragColor";

/// The three uniforms the renderer feeds every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StandardUniform {
    /// Elapsed time in seconds (`float u_time`).
    Time,
    /// Frame size in pixels (`vec2 u_resolution`).
    Resolution,
    /// Pointer position (`vec2 u_mouse`), pinned to the origin.
    Mouse,
}

impl StandardUniform {
    pub const ALL: [StandardUniform; 3] = [
        StandardUniform::Time,
        StandardUniform::Resolution,
        StandardUniform::Mouse,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StandardUniform::Time => "u_time",
            StandardUniform::Resolution => "u_resolution",
            StandardUniform::Mouse => "u_mouse",
        }
    }

    /// Binding slot inside descriptor set 0.
    pub fn binding(self) -> u32 {
        match self {
            StandardUniform::Time => 0,
            StandardUniform::Resolution => 1,
            StandardUniform::Mouse => 2,
        }
    }

    fn glsl_type(self) -> &'static str {
        match self {
            StandardUniform::Time => "float",
            StandardUniform::Resolution | StandardUniform::Mouse => "vec2",
        }
    }

    fn block_name(self) -> &'static str {
        match self {
            StandardUniform::Time => "ShadereelTime",
            StandardUniform::Resolution => "ShadereelResolution",
            StandardUniform::Mouse => "ShadereelMouse",
        }
    }
}

/// Raw text of the user's shader, read once and never mutated.
#[derive(Clone, Debug)]
pub struct ShaderSource {
    path: Option<PathBuf>,
    text: String,
}

impl ShaderSource {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(RenderError::InputNotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path).map_err(|source| RenderError::ReadInput {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            text,
        })
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            path: None,
            text: text.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Compilable shader text derived from a [`ShaderSource`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanonicalProgram {
    text: String,
    output_ident: String,
    inserted_output: bool,
    inserted_entry: bool,
}

impl CanonicalProgram {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Name of the fragment output the program writes.
    pub fn output_ident(&self) -> &str {
        &self.output_ident
    }

    /// Whether the output declaration came from the canonical header.
    pub fn inserted_output(&self) -> bool {
        self.inserted_output
    }

    /// Whether a `main()` calling `mainImage` was appended.
    pub fn inserted_entry(&self) -> bool {
        self.inserted_entry
    }

    /// The program text with 1-based line numbers, for compiler diagnostics.
    pub fn numbered(&self) -> String {
        let mut out = String::with_capacity(self.text.len() + self.text.len() / 4);
        for (index, line) in self.text.lines().enumerate() {
            let _ = writeln!(out, "{:>4} | {line}", index + 1);
        }
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LineKind {
    Version,
    EsGuard,
    OpenConditional,
    CloseConditional,
    Precision,
    StandardUniform,
    Body,
}

/// Produces the canonical program for `source`.
pub fn transpile(source: &ShaderSource) -> CanonicalProgram {
    let mut body = String::with_capacity(source.text().len());
    // One entry per open conditional; `true` marks a `GL_ES` guard we dropped.
    let mut conditionals: Vec<bool> = Vec::new();

    for line in source.text().lines() {
        match classify(line) {
            LineKind::Version | LineKind::Precision | LineKind::StandardUniform => continue,
            LineKind::EsGuard => {
                conditionals.push(true);
                continue;
            }
            LineKind::OpenConditional => conditionals.push(false),
            LineKind::CloseConditional => {
                if conditionals.pop() == Some(true) {
                    continue;
                }
            }
            LineKind::Body => {}
        }
        body.push_str(&line.replace(LEGACY_OUTPUT_IDENT, OUTPUT_IDENT));
        body.push('\n');
    }

    let declared_output = body
        .lines()
        .find_map(output_declaration)
        .map(str::to_string);
    let inserted_output = declared_output.is_none();
    let output_ident = declared_output.unwrap_or_else(|| OUTPUT_IDENT.to_string());
    let inserted_entry = defines_function(&body, "mainImage") && !defines_function(&body, "main");

    let mut text = canonical_header();
    if inserted_output {
        let _ = writeln!(text, "layout(location = 0) out vec4 {OUTPUT_IDENT};");
    }
    text.push('\n');
    text.push_str(&body);
    if inserted_entry {
        let _ = write!(
            text,
            "\nvoid main() {{\n    vec4 shadereel_color = vec4(0.0, 0.0, 0.0, 1.0);\n    mainImage(shadereel_color, gl_FragCoord.xy);\n    {output_ident} = shadereel_color;\n}}\n"
        );
    }

    CanonicalProgram {
        text,
        output_ident,
        inserted_output,
        inserted_entry,
    }
}

fn canonical_header() -> String {
    let mut header = String::from("#version 450\n\n");
    for uniform in StandardUniform::ALL {
        let _ = writeln!(
            header,
            "layout(std140, set = 0, binding = {binding}) uniform {block} {{ {ty} {name}; }};",
            binding = uniform.binding(),
            block = uniform.block_name(),
            ty = uniform.glsl_type(),
            name = uniform.name(),
        );
    }
    header
}

fn classify(line: &str) -> LineKind {
    let trimmed = line.trim_start();
    if let Some(directive) = trimmed.strip_prefix('#') {
        let directive = directive.trim_start();
        let (keyword, rest) = directive
            .split_once(char::is_whitespace)
            .unwrap_or((directive, ""));
        let rest = rest.trim();
        return match keyword {
            "version" => LineKind::Version,
            "ifdef" if rest == "GL_ES" => LineKind::EsGuard,
            "if" if is_es_condition(rest) => LineKind::EsGuard,
            "if" | "ifdef" | "ifndef" => LineKind::OpenConditional,
            "endif" => LineKind::CloseConditional,
            _ => LineKind::Body,
        };
    }

    match first_word(trimmed) {
        "precision" => LineKind::Precision,
        "uniform"
            if StandardUniform::ALL
                .iter()
                .any(|uniform| find_word(trimmed, uniform.name()).is_some()) =>
        {
            LineKind::StandardUniform
        }
        _ => LineKind::Body,
    }
}

fn is_es_condition(condition: &str) -> bool {
    let compact: String = condition.chars().filter(|ch| !ch.is_whitespace()).collect();
    compact == "defined(GL_ES)" || compact == "definedGL_ES"
}

fn first_word(text: &str) -> &str {
    let end = text
        .find(|ch: char| !is_ident_char(ch))
        .unwrap_or(text.len());
    &text[..end]
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Byte offset of `word` in `haystack` where it is not part of a longer identifier.
fn find_word(haystack: &str, word: &str) -> Option<usize> {
    haystack.match_indices(word).map(|(pos, _)| pos).find(|&pos| {
        let before = haystack[..pos].chars().next_back();
        let after = haystack[pos + word.len()..].chars().next();
        !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char)
    })
}

fn strip_line_comment(line: &str) -> &str {
    line.split_once("//").map_or(line, |(code, _)| code)
}

/// Returns the identifier of a global `[layout(...)] out <type> <name>;` line.
///
/// Function parameters such as `mainImage(out vec4 color, ...)` never match
/// because they are not standalone statements.
fn output_declaration(line: &str) -> Option<&str> {
    let mut rest = strip_line_comment(line).trim();
    if first_word(rest) == "layout" {
        let close = rest.find(')')?;
        rest = rest[close + 1..].trim_start();
    }
    if first_word(rest) != "out" {
        return None;
    }
    let (statement, _) = rest["out".len()..].split_once(';')?;
    if statement.contains(['(', ')', ',', '{', '=']) {
        return None;
    }
    let name = statement.split_whitespace().last()?;
    (!name.is_empty() && name.chars().all(is_ident_char)).then_some(name)
}

fn defines_function(body: &str, name: &str) -> bool {
    body.lines().any(|line| {
        let code = strip_line_comment(line);
        let mut offset = 0;
        while let Some(pos) = find_word(&code[offset..], name) {
            let start = offset + pos;
            let end = start + name.len();
            let before = code[..start].trim_end();
            if code[end..].trim_start().starts_with('(') && before.ends_with("void") {
                return true;
            }
            offset = end;
        }
        false
    })
}
