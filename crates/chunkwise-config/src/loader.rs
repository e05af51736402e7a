use std::path::{Path, PathBuf};

use chunkwise_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

pub struct ConfigLoader;

impl ConfigLoader {
    /// `~/.chunkwise`
    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".chunkwise")
    }

    pub fn default_path() -> PathBuf {
        Self::default_dir().join("config.yml")
    }

    /// Load an explicit config file, or the default one if it exists.
    /// Without either, the built-in defaults are used.
    pub fn load_or_default(path: Option<&Path>) -> Result<AppConfig> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::load(&default)
                } else {
                    debug!("no config at {}, using defaults", default.display());
                    let config = AppConfig::default();
                    config.validate()?;
                    Ok(config)
                }
            }
        }
    }

    /// Parse `path`, inline every `sql_file`/`rollback_file` it references
    /// and validate the result.
    pub fn load(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        let mut config = parse(path, &contents)?;
        config.validate()?;

        let base_dir = path.parent().unwrap_or(Path::new("."));
        resolve_sql_files(&mut config, base_dir)?;

        info!(
            "loaded config from {} ({} custom migrations)",
            path.display(),
            config.migrations.len()
        );
        Ok(config)
    }
}

fn parse(path: &Path, contents: &str) -> Result<AppConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "yml" | "yaml" => serde_yaml::from_str(contents)
            .map_err(|e| Error::Config(format!("YAML parse error: {e}"))),
        "toml" => {
            toml::from_str(contents).map_err(|e| Error::Config(format!("TOML parse error: {e}")))
        }
        other => Err(Error::Config(format!(
            "unsupported config extension: {other}"
        ))),
    }
}

fn resolve_sql_files(config: &mut AppConfig, base_dir: &Path) -> Result<()> {
    for migration in &mut config.migrations {
        for chunk in &mut migration.chunks {
            if let Some(file) = chunk.sql_file.take() {
                chunk.sql = Some(read_sql(base_dir, &file)?);
            }
        }
        if let Some(file) = migration.rollback_file.take() {
            migration.rollback_sql = Some(read_sql(base_dir, &file)?);
        }
    }
    Ok(())
}

fn read_sql(base_dir: &Path, file: &Path) -> Result<String> {
    let path = if file.is_absolute() {
        file.to_path_buf()
    } else {
        base_dir.join(file)
    };
    std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("failed to read sql file {}: {e}", path.display())))
}
