use std::path::{Path, PathBuf};

/// Resolves the directory video coprocessor init files (register dumps,
/// palettes, VRAM images) and other runtime assets are loaded from.
///
/// Resolution order, matching the original front panel's asset lookup:
/// 1. An explicit `-A` CLI override, if given.
/// 2. The `BEASTEM_ASSETS` environment variable, if set.
/// 3. The current working directory.
pub struct AssetPaths {
    root: PathBuf,
}

impl AssetPaths {
    pub fn resolve(cli_override: Option<&str>) -> Self {
        let root = match cli_override {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => match std::env::var("BEASTEM_ASSETS") {
                Ok(path) if !path.is_empty() => PathBuf::from(path),
                _ => PathBuf::new(),
            },
        };
        Self { root }
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.root.join(name)
    }
}
