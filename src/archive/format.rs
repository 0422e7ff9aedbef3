// src/archive/format.rs
//! Archive format identification
//!
//! Five container/codec combinations are supported. Format selection is
//! always by file suffix; names that match nothing fall back to tar+zstd.

use crate::error::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ArchiveFormat {
    /// tar stream compressed with zstd (.tar.zst)
    #[default]
    TarZst,
    /// tar stream compressed with an LZ4 frame (.tar.lz4)
    TarLz4,
    /// tar stream compressed with xz (.tar.xz)
    TarXz,
    /// tar stream compressed with gzip (.tar.gz, .tgz)
    TarGz,
    /// zip container with per-entry deflate (.zip)
    Zip,
}

impl ArchiveFormat {
    /// All formats, in preference order
    pub const ALL: [ArchiveFormat; 5] = [
        ArchiveFormat::TarZst,
        ArchiveFormat::TarLz4,
        ArchiveFormat::TarXz,
        ArchiveFormat::TarGz,
        ArchiveFormat::Zip,
    ];

    /// Detect the format from a file name
    ///
    /// # Examples
    /// ```
    /// use criage::archive::ArchiveFormat;
    ///
    /// assert_eq!(ArchiveFormat::detect("pkg-1.0.tar.xz"), ArchiveFormat::TarXz);
    /// assert_eq!(ArchiveFormat::detect("pkg-1.0.tgz"), ArchiveFormat::TarGz);
    /// assert_eq!(ArchiveFormat::detect("pkg.unknownext"), ArchiveFormat::TarZst);
    /// ```
    pub fn detect(filename: &str) -> Self {
        Self::from_suffix(filename).unwrap_or_default()
    }

    /// Strict suffix match, `None` when nothing matches
    pub fn from_suffix(filename: &str) -> Option<Self> {
        let lower = filename.to_ascii_lowercase();
        if lower.ends_with(".tar.zst") {
            Some(Self::TarZst)
        } else if lower.ends_with(".tar.lz4") {
            Some(Self::TarLz4)
        } else if lower.ends_with(".tar.xz") {
            Some(Self::TarXz)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }

    /// Parse a format name such as `tar.zst`
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().trim_start_matches('.').to_ascii_lowercase();
        match name.as_str() {
            "tar.zst" => Some(Self::TarZst),
            "tar.lz4" => Some(Self::TarLz4),
            "tar.xz" => Some(Self::TarXz),
            "tar.gz" | "tgz" => Some(Self::TarGz),
            "zip" => Some(Self::Zip),
            _ => None,
        }
    }

    /// Canonical name, also the file suffix without the leading dot
    pub fn name(&self) -> &'static str {
        match self {
            Self::TarZst => "tar.zst",
            Self::TarLz4 => "tar.lz4",
            Self::TarXz => "tar.xz",
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
        }
    }

    /// File suffix including the leading dot
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::TarZst => ".tar.zst",
            Self::TarLz4 => ".tar.lz4",
            Self::TarXz => ".tar.xz",
            Self::TarGz => ".tar.gz",
            Self::Zip => ".zip",
        }
    }

    /// True for the formats that wrap a tar stream
    pub fn is_tar(&self) -> bool {
        !matches!(self, Self::Zip)
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ArchiveFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| Error::UnsupportedFormat(s.to_string()))
    }
}

impl Serialize for ArchiveFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for ArchiveFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Self::from_name(&name)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown archive format: {name}")))
    }
}

/// Classify a file name, defaulting to tar+zstd
pub fn detect_format(filename: &str) -> ArchiveFormat {
    ArchiveFormat::detect(filename)
}
