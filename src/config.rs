use crate::rules::{ExcludeSet, IncludeSet, PathPattern};
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) const CONFIG_FILE_NAMES: [&str; 2] = ["sitesync.toml", "sitesync.json"];

/// Path excludes added to every run so neither the repository metadata nor
/// the settings file itself is ever transferred.
pub(crate) const ALWAYS_EXCLUDED: [&str; 3] = [".git/", ".gitignore", ".gitmodules"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Operation {
    Pull,
    Push,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub(crate) struct SiteConfig {
    pub(crate) ssh_host: Option<String>,
    #[serde(default)]
    pub(crate) path: SitePaths,
    pub(crate) domain: Option<Domains>,
    #[serde(default)]
    pub(crate) rsync: RsyncRules,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub(crate) struct SitePaths {
    pub(crate) remote: Option<String>,
    pub(crate) local: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub(crate) struct Domains {
    pub(crate) remote: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub(crate) struct RsyncRules {
    #[serde(default)]
    pub(crate) excludes: ExcludeSet,
    #[serde(default)]
    pub(crate) includes: IncludeSet,
    #[serde(default)]
    pub(crate) on_pull: RuleOverrides,
    #[serde(default)]
    pub(crate) on_push: RuleOverrides,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub(crate) struct RuleOverrides {
    #[serde(default)]
    pub(crate) excludes: ExcludeSet,
    #[serde(default)]
    pub(crate) includes: IncludeSet,
}

impl SiteConfig {
    pub(crate) fn load_nearest(root: &Path) -> Result<(Option<PathBuf>, SiteConfig)> {
        let Some(path) = find_nearest_config_path(root) else {
            return Ok((None, SiteConfig::default()));
        };
        let cfg = SiteConfig::load_file(&path)?;
        Ok((Some(path), cfg))
    }

    /// Reads a settings file, choosing the format by extension. The local
    /// site root defaults to the directory holding the file.
    pub(crate) fn load_file(path: &Path) -> Result<SiteConfig> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        let mut cfg: SiteConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&s)
                .with_context(|| format!("failed to parse config: {}", path.display()))?,
            _ => toml::from_str(&s)
                .with_context(|| format!("failed to parse config: {}", path.display()))?,
        };

        let base = path.parent().unwrap_or(Path::new("."));
        cfg.path.local = Some(match cfg.path.local.take() {
            Some(local) if local.is_absolute() => local,
            Some(local) => base.join(local),
            None => base.to_path_buf(),
        });

        tracing::debug!(config = %path.display(), "loaded site config");
        Ok(cfg)
    }

    /// Base rules with the operation's own lists appended, followed by the
    /// always-excluded paths.
    pub(crate) fn rule_sets(
        &self,
        operation: Option<Operation>,
    ) -> Result<(ExcludeSet, IncludeSet)> {
        let mut excludes = self.rsync.excludes.clone();
        let mut includes = self.rsync.includes.clone();

        let overrides = match operation {
            Some(Operation::Pull) => Some(&self.rsync.on_pull),
            Some(Operation::Push) => Some(&self.rsync.on_push),
            None => None,
        };
        if let Some(o) = overrides {
            excludes.extend(&o.excludes);
            includes.extend(&o.includes);
        }

        for p in ALWAYS_EXCLUDED.iter().chain(CONFIG_FILE_NAMES.iter()) {
            excludes
                .paths
                .push(PathPattern::new(*p).context("invalid built-in exclude")?);
        }

        Ok((excludes, includes))
    }

    pub(crate) fn ssh_host(&self) -> Result<&str> {
        self.ssh_host
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .context("config is missing `ssh_host`")
    }

    pub(crate) fn remote_path(&self) -> Result<&str> {
        self.path
            .remote
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .context("config is missing `path.remote`")
    }

    pub(crate) fn local_path(&self) -> &Path {
        self.path.local.as_deref().unwrap_or(Path::new("."))
    }

    /// Name shown in progress headers.
    pub(crate) fn site_name(&self) -> &str {
        match (&self.domain, &self.ssh_host) {
            (Some(d), _) => d.remote.as_str(),
            (None, Some(host)) => host.as_str(),
            (None, None) => "site",
        }
    }
}

fn find_nearest_config_path(root: &Path) -> Option<PathBuf> {
    for dir in root.ancestors() {
        for name in CONFIG_FILE_NAMES {
            let p = dir.join(name);
            if p.is_file() {
                return Some(p);
            }
        }
    }
    None
}
