//! Compiles exclude/include path lists into an ordered list of rsync filter
//! directives.
//!
//! rsync evaluates `--filter` rules first-match-wins and never descends into
//! an excluded directory, so carving an include out of an excluded directory
//! takes a small cluster of rules: the include itself, every directory on the
//! way down to it, and only then the broad exclude.

use crate::error::PatternError;
use serde::de::value::{MapAccessDeserializer, SeqAccessDeserializer};
use serde::de::{Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use std::fmt;

pub(crate) const SEPARATOR: char = '/';

/// A path fragment from the settings. A trailing `/` makes it a directory
/// pattern, anything else names a single file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub(crate) struct PathPattern(String);

impl PathPattern {
    pub(crate) fn new(pattern: impl Into<String>) -> Result<Self, PatternError> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }
        if pattern.chars().all(|c| c == SEPARATOR) {
            return Err(PatternError::NoPathComponent(pattern));
        }
        Ok(Self(pattern))
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn is_dir(&self) -> bool {
        self.0.ends_with(SEPARATOR)
    }
}

impl TryFrom<String> for PathPattern {
    type Error = PatternError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deserializes from a `{ global, paths }` table, or from a bare list that
/// is read as path excludes only.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct ExcludeSet {
    /// Matched anywhere in a path; never overridden by an include.
    pub(crate) global: Vec<PathPattern>,
    /// Matched as a path prefix; includes may carve paths back out.
    pub(crate) paths: Vec<PathPattern>,
}

#[derive(Deserialize)]
struct SplitExcludes {
    #[serde(default)]
    global: Vec<PathPattern>,
    #[serde(default)]
    paths: Vec<PathPattern>,
}

impl<'de> Deserialize<'de> for ExcludeSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ExcludeSetVisitor;

        impl<'de> Visitor<'de> for ExcludeSetVisitor {
            type Value = ExcludeSet;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of path excludes or a table with `global` and `paths`")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<ExcludeSet, A::Error> {
                let paths = Vec::<PathPattern>::deserialize(SeqAccessDeserializer::new(seq))?;
                Ok(ExcludeSet {
                    global: Vec::new(),
                    paths,
                })
            }

            fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<ExcludeSet, A::Error> {
                let split = SplitExcludes::deserialize(MapAccessDeserializer::new(map))?;
                Ok(ExcludeSet {
                    global: split.global,
                    paths: split.paths,
                })
            }
        }

        deserializer.deserialize_any(ExcludeSetVisitor)
    }
}

impl ExcludeSet {
    pub(crate) fn extend(&mut self, other: &ExcludeSet) {
        self.global.extend(other.global.iter().cloned());
        self.paths.extend(other.paths.iter().cloned());
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub(crate) struct IncludeSet(pub(crate) Vec<PathPattern>);

impl IncludeSet {
    pub(crate) fn iter(&self) -> impl Iterator<Item = &PathPattern> {
        self.0.iter()
    }

    pub(crate) fn extend(&mut self, other: &IncludeSet) {
        self.0.extend(other.0.iter().cloned());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sign {
    Include,
    Exclude,
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sign::Include => f.write_str("+"),
            Sign::Exclude => f.write_str("-"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Directive {
    pub(crate) sign: Sign,
    pub(crate) pattern: String,
}

impl Directive {
    pub(crate) fn include(pattern: impl Into<String>) -> Self {
        Self {
            sign: Sign::Include,
            pattern: pattern.into(),
        }
    }

    pub(crate) fn exclude(pattern: impl Into<String>) -> Self {
        Self {
            sign: Sign::Exclude,
            pattern: pattern.into(),
        }
    }

    /// Renders the directive as a single rsync `--filter=` argument.
    pub(crate) fn to_arg(&self) -> String {
        format!("--filter={self}")
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.sign, self.pattern)
    }
}

/// Rules carved out of one boundary exclude.
struct Cluster<'a> {
    boundary: &'a PathPattern,
    includes: Vec<String>,
    levels: Vec<String>,
}

impl Cluster<'_> {
    fn into_directives(self) -> impl Iterator<Item = Directive> {
        let boundary_dir = dir_form(self.boundary.as_str());
        let terminal = Directive::exclude(format!("{}***", self.boundary));

        self.includes
            .into_iter()
            .map(Directive::include)
            .chain(std::iter::once(Directive::include(boundary_dir)))
            .chain(self.levels.into_iter().map(Directive::include))
            .chain(std::iter::once(terminal))
    }
}

/// Output order: global excludes, path excludes no include falls under, then
/// one cluster per consumed boundary in the order includes first reached it.
pub(crate) fn compile(excludes: &ExcludeSet, includes: &IncludeSet) -> Vec<Directive> {
    let mut out: Vec<Directive> = excludes
        .global
        .iter()
        .map(|g| Directive::exclude(format!("**{g}**")))
        .collect();

    let mut consumed = vec![false; excludes.paths.len()];
    let mut clusters: Vec<Cluster<'_>> = Vec::new();

    for include in includes.iter() {
        let Some(idx) = boundary_for(include.as_str(), &excludes.paths) else {
            tracing::debug!(%include, "no path exclude covers include, dropping it");
            continue;
        };
        let boundary = &excludes.paths[idx];

        for (flag, exclude) in consumed.iter_mut().zip(&excludes.paths) {
            if exclude == boundary {
                *flag = true;
            }
        }

        let pos = match clusters.iter().position(|c| c.boundary == boundary) {
            Some(pos) => pos,
            None => {
                clusters.push(Cluster {
                    boundary,
                    includes: Vec::new(),
                    levels: Vec::new(),
                });
                clusters.len() - 1
            }
        };
        let cluster = &mut clusters[pos];

        let own = if include.is_dir() {
            format!("{include}***")
        } else {
            include.to_string()
        };
        if !cluster.includes.contains(&own) {
            cluster.includes.push(own);
        }

        for level in intermediate_levels(boundary.as_str(), include.as_str()) {
            if !cluster.levels.contains(&level) {
                cluster.levels.push(level);
            }
        }

        tracing::debug!(%include, %boundary, "include carved out of path exclude");
    }

    out.extend(
        excludes
            .paths
            .iter()
            .zip(&consumed)
            .filter(|(_, used)| !**used)
            .map(|(exclude, _)| Directive::exclude(format!("{exclude}***"))),
    );

    for cluster in clusters {
        out.extend(cluster.into_directives());
    }

    out
}

/// Index of the longest path exclude that `include` starts with. Equal
/// lengths resolve to the first declared.
fn boundary_for(include: &str, paths: &[PathPattern]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (idx, exclude) in paths.iter().enumerate() {
        if !include.starts_with(exclude.as_str()) {
            continue;
        }
        match best {
            Some(b) if paths[b].as_str().len() >= exclude.as_str().len() => {}
            _ => best = Some(idx),
        }
    }
    best
}

/// Every `/`-terminated prefix of `include` deeper than the boundary
/// directory, shallowest first. A file include contributes its parents only.
fn intermediate_levels(boundary: &str, include: &str) -> Vec<String> {
    let floor = dir_form(boundary).len();
    include
        .match_indices(SEPARATOR)
        .map(|(idx, _)| &include[..=idx])
        .filter(|prefix| prefix.len() > floor)
        .map(str::to_string)
        .collect()
}

fn dir_form(pattern: &str) -> String {
    format!("{}{SEPARATOR}", pattern.trim_end_matches(SEPARATOR))
}
