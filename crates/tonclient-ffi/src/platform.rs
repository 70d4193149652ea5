//! Platform-specific library artifact resolution

use std::path::{Path, PathBuf};
use tonclient_kernel::{ClientError, ClientResult};

/// Version of the native engine artifact this binding targets.
pub const LIB_VERSION: &str = "0.25.0";

/// Environment variable naming the directory that holds the artifact.
pub const LIB_DIR_ENV: &str = "TONCLIENT_LIB_DIR";

const DEFAULT_LIB_DIR: &str = "bin";

/// Platforms with a published engine artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Darwin,
    Linux,
}

impl Platform {
    /// Resolve a platform by name. Accepts `windows`, `darwin` (or `macos`)
    /// and `linux`, in any case.
    pub fn from_name(name: &str) -> ClientResult<Self> {
        match name.to_lowercase().as_str() {
            "windows" => Ok(Self::Windows),
            "darwin" | "macos" => Ok(Self::Darwin),
            "linux" => Ok(Self::Linux),
            _ => Err(ClientError::PlatformUnsupported {
                platform: capitalize(name),
            }),
        }
    }

    pub fn current() -> ClientResult<Self> {
        Self::from_name(std::env::consts::OS)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Darwin => "darwin",
            Self::Linux => "linux",
        }
    }

    pub fn library_extension(&self) -> &'static str {
        match self {
            Self::Windows => "dll",
            Self::Darwin => "dylib",
            Self::Linux => "so",
        }
    }

    /// `ton-rust-client-<version>.<ext>`
    pub fn library_file_name(&self) -> String {
        format!("ton-rust-client-{}.{}", LIB_VERSION, self.library_extension())
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Artifact path for `platform_name` inside `dir`.
pub fn library_path_in(dir: impl AsRef<Path>, platform_name: &str) -> ClientResult<PathBuf> {
    let platform = Platform::from_name(platform_name)?;
    Ok(dir.as_ref().join(platform.library_file_name()))
}

/// `$TONCLIENT_LIB_DIR`, or `./bin` when unset.
pub fn default_library_dir() -> PathBuf {
    std::env::var_os(LIB_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LIB_DIR))
}

/// Artifact path for the current platform in the default directory.
pub fn default_library_path() -> ClientResult<PathBuf> {
    library_path_in(default_library_dir(), std::env::consts::OS)
}
