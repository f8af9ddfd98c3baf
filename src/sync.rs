use crate::config::{Operation, SiteConfig};
use crate::format as fmt;
use crate::preview::Preview;
use crate::rsync::{trailing_slash, RsyncCommand};
use crate::rules::{compile, Directive};
use crate::{FiltersArgs, PreviewArgs, SyncArgs};
use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

fn load_config(explicit: Option<&Path>) -> Result<SiteConfig> {
    if let Some(path) = explicit {
        return SiteConfig::load_file(path);
    }

    let cwd = std::env::current_dir().context("failed to read current directory")?;
    match SiteConfig::load_nearest(&cwd)? {
        (Some(_), cfg) => Ok(cfg),
        (None, _) => anyhow::bail!(
            "no sitesync.toml or sitesync.json found in {} or its parents",
            cwd.display()
        ),
    }
}

fn directives_for(cfg: &SiteConfig, operation: Option<Operation>) -> Result<Vec<Directive>> {
    let (excludes, includes) = cfg.rule_sets(operation)?;
    let directives = compile(&excludes, &includes);
    tracing::debug!(
        global = excludes.global.len(),
        paths = excludes.paths.len(),
        includes = includes.0.len(),
        directives = directives.len(),
        "compiled filter rules"
    );
    Ok(directives)
}

pub(crate) fn run_filters(config: Option<&Path>, args: FiltersArgs) -> Result<()> {
    let cfg = load_config(config)?;
    let directives = directives_for(&cfg, args.operation)?;

    let mut out = io::stdout().lock();
    for d in &directives {
        writeln!(out, "{}", fmt::directive_line(d, args.args)).context("failed writing to stdout")?;
    }
    Ok(())
}

pub(crate) fn run_preview(config: Option<&Path>, args: PreviewArgs) -> Result<()> {
    let cfg = load_config(config)?;
    let preview = Preview::new(&directives_for(&cfg, args.operation)?)?;

    let mut out = io::stdout().lock();
    if args.paths.is_empty() {
        let root = cfg.local_path();
        for rel in preview.walk(root) {
            writeln!(out, "{}", rel.display()).context("failed writing to stdout")?;
        }
        return Ok(());
    }

    for rel in &args.paths {
        let is_dir = rel.ends_with('/');
        let line = fmt::decision_line(rel, preview.transfers(rel, is_dir));
        writeln!(out, "{line}").context("failed writing to stdout")?;
    }
    Ok(())
}

pub(crate) fn run_sync(config: Option<&Path>, operation: Operation, args: SyncArgs) -> Result<()> {
    let cfg = load_config(config)?;
    let host = cfg.ssh_host()?;
    let remote = format!("{host}:{}", trailing_slash(cfg.remote_path()?));
    let local = local_operand(cfg.local_path())?;

    let (source, destination, title) = match operation {
        Operation::Pull => (remote, local, format!("Pulling {}", cfg.site_name())),
        Operation::Push => (local, remote, format!("Pushing files to {}", cfg.site_name())),
    };

    let cmd = RsyncCommand::new(source, destination, directives_for(&cfg, Some(operation))?)
        .dry_run(args.dry_run);

    if args.print {
        println!("{}", cmd.display());
        return Ok(());
    }

    println!("{}", fmt::header(&title));
    cmd.run()
}

fn local_operand(local: &Path) -> Result<String> {
    let local: PathBuf = if local.exists() {
        local
            .canonicalize()
            .with_context(|| format!("failed to canonicalize path: {}", local.display()))?
    } else {
        local.to_path_buf()
    };
    Ok(trailing_slash(&local.to_string_lossy()))
}
