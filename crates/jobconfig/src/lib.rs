//! Render job files.
//!
//! A job file captures the flags of one `shadereel` invocation so a render can
//! be repeated without retyping them. Every field is optional; the command line
//! overrides whatever the file sets.
//!
//! ```toml
//! version = 1
//! shader = "plasma.frag"
//! output = "plasma.mov"
//! duration = "4s"
//! fps = 60
//!
//! [encoder]
//! program = "ffmpeg"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read job file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse job file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid job file: {0}")]
    Invalid(String),
}

pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuPower {
    Low,
    High,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncoderSection {
    pub program: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GpuSection {
    pub power: Option<GpuPower>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    pub version: u32,
    pub shader: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub duration: Option<Duration>,
    pub fps: Option<u32>,
    /// Shader time of the first frame, in seconds.
    pub start: Option<f64>,
    #[serde(default)]
    pub encoder: EncoderSection,
    #[serde(default)]
    pub gpu: GpuSection,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            shader: None,
            output: None,
            width: None,
            height: None,
            duration: None,
            fps: None,
            start: None,
            encoder: EncoderSection::default(),
            gpu: GpuSection::default(),
        }
    }
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if let Ok(seconds) = v.trim().parse::<f64>() {
                return from_seconds(seconds);
            }
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            from_seconds(v)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn from_seconds<E: de::Error>(seconds: f64) -> Result<Option<Duration>, E> {
    Duration::try_from_secs_f64(seconds)
        .map(Some)
        .map_err(|_| E::custom("duration must be a non-negative, finite number of seconds"))
}

impl JobConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: JobConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads a job file. Relative `shader` and `output` paths are resolved
    /// against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            config.shader = config.shader.map(|p| rebase(base, p));
            config.output = config.output.map(|p| rebase(base, p));
        }
        Ok(config)
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.duration.map(|d| d.as_secs_f64())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CURRENT_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported job file version {}; expected {CURRENT_VERSION}",
                self.version
            )));
        }

        for (name, value) in [("width", self.width), ("height", self.height), ("fps", self.fps)] {
            if value == Some(0) {
                return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
            }
        }

        for (name, value) in [("shader", &self.shader), ("output", &self.output)] {
            if value.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
                return Err(ConfigError::Invalid(format!("{name} path may not be empty")));
            }
        }

        if let Some(start) = self.start {
            if !start.is_finite() {
                return Err(ConfigError::Invalid("start must be a finite number".into()));
            }
        }

        if let Some(program) = &self.encoder.program {
            if program.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "encoder.program may not be empty".into(),
                ));
            }
        }

        Ok(())
    }
}

fn rebase(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_relative() && !base.as_os_str().is_empty() {
        base.join(path)
    } else {
        path
    }
}
