use anyhow::{Context, Result, bail};
use converge::{
    ControllerOptions, ExecuteOptions, ForceRefresh, Mutability, ReplaceOrder, registry,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the config directory path (~/.config/gatecfg)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("gatecfg"))
}

fn default_state_path() -> String {
    "~/.local/state/gatecfg/state.json".to_string()
}

fn default_jobs() -> usize {
    4
}

/// User settings, loaded from `config.toml`
///
/// `jobs`, `replace_order` and `force_refresh` are handed to orchestrators
/// that embed `converge` through [`Settings::controller_options`] and
/// [`Settings::execute_options`]. The `gatecfg` binary itself never calls
/// the remote service, so it only validates and reports them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Recorded state file; `~` is expanded
    #[serde(default = "default_state_path")]
    pub state_path: String,

    /// Instances processed at once
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    #[serde(default)]
    pub replace_order: ReplaceOrder,

    /// `kind.attribute` entries that always adopt the remote value on refresh
    #[serde(default)]
    pub force_refresh: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            jobs: default_jobs(),
            replace_order: ReplaceOrder::default(),
            force_refresh: Vec::new(),
        }
    }
}

/// Split `kind.attribute` and look up the attribute's class
fn parse_force_refresh(entry: &str) -> Result<(&str, &str, Mutability)> {
    let Some((kind, attribute)) = entry.split_once('.') else {
        bail!("Invalid force_refresh entry '{entry}': expected kind.attribute");
    };
    let schema = registry()
        .require(kind)
        .with_context(|| format!("Invalid force_refresh entry '{entry}'"))?;
    let Some(spec) = schema.get(attribute) else {
        bail!("Invalid force_refresh entry '{entry}': {kind} has no attribute `{attribute}`");
    };
    Ok((kind, attribute, spec.mutability))
}

impl Settings {
    /// Load settings from `path`, or from the default location
    ///
    /// A missing file at the default location yields defaults; an explicit
    /// path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (config_dir()?.join("config.toml"), false),
        };

        if !path.exists() {
            if explicit {
                bail!("Settings file not found: {}", path.display());
            }
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read settings file: {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))?;
        settings.validate()?;

        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            bail!("jobs must be at least 1");
        }
        for (entry, mutability) in self.ineffective_force_refresh()? {
            log::warn!(
                "force_refresh entry '{entry}' has no effect: {mutability} attributes always adopt the remote value"
            );
        }
        Ok(())
    }

    /// Get expanded state file path
    pub fn state_file(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.state_path).as_ref())
    }

    /// Parse `force_refresh` entries, checking them against the registry
    pub fn force_refresh(&self) -> Result<ForceRefresh> {
        let mut force = ForceRefresh::new();
        for entry in &self.force_refresh {
            let (kind, attribute, _) = parse_force_refresh(entry)?;
            force.insert(kind, attribute);
        }
        Ok(force)
    }

    /// Entries naming attributes that adopt the remote value anyway
    fn ineffective_force_refresh(&self) -> Result<Vec<(&str, Mutability)>> {
        let mut ineffective = Vec::new();
        for entry in &self.force_refresh {
            let (_, _, mutability) = parse_force_refresh(entry)?;
            if !mutability.preserves_prior() {
                ineffective.push((entry.as_str(), mutability));
            }
        }
        Ok(ineffective)
    }

    pub fn controller_options(&self) -> Result<ControllerOptions> {
        Ok(ControllerOptions {
            replace_order: self.replace_order,
            force_refresh: self.force_refresh()?,
        })
    }

    pub fn execute_options(&self) -> ExecuteOptions {
        ExecuteOptions { jobs: self.jobs }
    }
}
