//! Reading and writing `config.yaml`

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use super::Config;

impl Config {
    /// Load and validate the config at `path`
    ///
    /// A missing file is the normal first-run case and yields defaults. An
    /// unreadable or malformed file is logged and also yields defaults, so a
    /// bad edit never keeps the tool from starting. Out-of-range values are
    /// clamped rather than rejected.
    pub fn load(path: &Path) -> Self {
        match Self::read(path) {
            Ok(Some(mut config)) => {
                let parsed = config.clone();
                config.validate();
                if config != parsed {
                    log::warn!("config: clamped out-of-range values in {}", path.display());
                }
                log::info!("config: loaded {}", path.display());
                config
            }
            Ok(None) => {
                log::info!("config: {} not found, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                log::warn!("config: {:#}; using defaults", e);
                Self::default()
            }
        }
    }

    /// Parsed contents of `path`, `None` if the file doesn't exist
    fn read(path: &Path) -> Result<Option<Self>> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };
        let config = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(config))
    }

    /// Write the config to `path`, creating its directory
    ///
    /// The file is replaced in one rename, so a reader never sees a partial
    /// document.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating config directory {}", dir.display()))?;

        let yaml = serde_yaml::to_string(self).context("serializing config")?;
        let mut staged = NamedTempFile::new_in(dir)
            .with_context(|| format!("staging config in {}", dir.display()))?;
        staged
            .write_all(yaml.as_bytes())
            .context("writing staged config")?;
        staged
            .persist(path)
            .with_context(|| format!("replacing {}", path.display()))?;

        log::info!("config: saved {}", path.display());
        Ok(())
    }
}
