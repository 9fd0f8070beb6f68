//! Codec settings chosen from the output file name.
//!
//! Two profiles exist. `.mov` targets editing workflows with ProRes 422 HQ;
//! every other extension gets an H.264 file that plays everywhere.

use std::fmt;
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProfileKind {
    /// ProRes in a QuickTime container.
    Mezzanine,
    /// H.264 for playback and upload.
    Delivery,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodingProfile {
    pub kind: ProfileKind,
    pub codec: &'static str,
    pub pixel_format: &'static str,
    pub codec_args: &'static [&'static str],
}

const MEZZANINE: EncodingProfile = EncodingProfile {
    kind: ProfileKind::Mezzanine,
    codec: "prores_ks",
    pixel_format: "yuv422p10le",
    codec_args: &["-profile:v", "3"],
};

const DELIVERY: EncodingProfile = EncodingProfile {
    kind: ProfileKind::Delivery,
    codec: "libx264",
    pixel_format: "yuv420p",
    codec_args: &["-crf", "18", "-preset", "medium", "-movflags", "+faststart"],
};

impl EncodingProfile {
    /// Picks the profile for `path` from its extension, ignoring case.
    pub fn for_output(path: &Path) -> Self {
        let is_mov = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mov"));
        if is_mov {
            MEZZANINE
        } else {
            DELIVERY
        }
    }

    /// Horizontal and vertical chroma subsampling requires even dimensions.
    pub fn requires_even_width(&self) -> bool {
        self.pixel_format.starts_with("yuv420") || self.pixel_format.starts_with("yuv422")
    }

    pub fn requires_even_height(&self) -> bool {
        self.pixel_format.starts_with("yuv420")
    }
}

impl fmt::Display for EncodingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ProfileKind::Mezzanine => "mezzanine",
            ProfileKind::Delivery => "delivery",
        };
        write!(f, "{kind} ({} / {})", self.codec, self.pixel_format)
    }
}
