use crate::rules::Directive;
use anyhow::{Context, Result};
use std::process::{Command, Stdio};

pub(crate) const BASE_FLAGS: [&str; 5] = [
    "-avz",
    "--delete",
    "--progress",
    "--human-readable",
    "--no-links",
];

#[derive(Debug, Clone)]
pub(crate) struct RsyncCommand {
    source: String,
    destination: String,
    directives: Vec<Directive>,
    dry_run: bool,
}

impl RsyncCommand {
    pub(crate) fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        directives: Vec<Directive>,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            directives,
            dry_run: false,
        }
    }

    pub(crate) fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Filters keep their compiled order; rsync stops at the first match.
    pub(crate) fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = BASE_FLAGS.iter().map(|f| f.to_string()).collect();
        args.extend(self.directives.iter().map(Directive::to_arg));
        if self.dry_run {
            args.push("--dry-run".to_string());
        }
        args.push(self.source.clone());
        args.push(self.destination.clone());
        args
    }

    /// Shell-pasteable rendering of the invocation.
    pub(crate) fn display(&self) -> String {
        let mut line = String::from("rsync");
        for arg in self.args() {
            line.push(' ');
            line.push_str(&shell_quote(&arg));
        }
        line
    }

    pub(crate) fn run(&self) -> Result<()> {
        tracing::info!(source = %self.source, destination = %self.destination, "running rsync");
        tracing::debug!(command = %self.display());

        let status = Command::new("rsync")
            .args(self.args())
            .stdin(Stdio::null())
            .status()
            .context("failed to spawn rsync")?;

        if !status.success() {
            anyhow::bail!("rsync failed ({status})");
        }

        Ok(())
    }
}

pub(crate) fn trailing_slash(path: &str) -> String {
    format!("{}/", path.trim_end_matches('/'))
}

fn shell_quote(arg: &str) -> String {
    let plain = arg
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_./:=@+,".contains(c));
    if plain && !arg.is_empty() {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
