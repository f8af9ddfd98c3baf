use crate::error::PreviewError;
use crate::rules::{Directive, Sign, SEPARATOR};
use globset::{GlobBuilder, GlobMatcher};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Dry-run model of how rsync applies a compiled directive list: the first
/// matching directive decides, and an excluded directory is never entered.
#[derive(Debug, Clone)]
pub(crate) struct Preview {
    rules: Vec<MatchRule>,
}

#[derive(Debug, Clone)]
struct MatchRule {
    sign: Sign,
    directory_only: bool,
    direct: Vec<GlobMatcher>,
    descendants: Vec<GlobMatcher>,
}

impl Preview {
    pub(crate) fn new(directives: &[Directive]) -> Result<Self, PreviewError> {
        let rules = directives
            .iter()
            .map(MatchRule::new)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Sign of the first directive matching `rel`, if any.
    pub(crate) fn decide(&self, rel: &str, is_dir: bool) -> Option<Sign> {
        self.rules
            .iter()
            .find(|r| r.matches(rel, is_dir))
            .map(|r| r.sign)
    }

    /// Whether rsync would transfer `rel`, given that each of its parent
    /// directories must have been entered first.
    pub(crate) fn transfers(&self, rel: &str, is_dir: bool) -> bool {
        let rel = rel.trim_matches(SEPARATOR);
        let parents_allowed = rel
            .match_indices(SEPARATOR)
            .all(|(idx, _)| self.decide(&rel[..idx], true) != Some(Sign::Exclude));

        parents_allowed && self.decide(rel, is_dir) != Some(Sign::Exclude)
    }

    /// Files under `root` that would be transferred, sorted, as `/`-separated
    /// relative paths.
    pub(crate) fn walk(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for entry in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || !e.file_type().is_dir() || self.admits(root, e.path(), true)
            })
        {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }

            if self.admits(root, entry.path(), false) {
                let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
                files.push(rel.to_path_buf());
            }
        }

        files.sort();
        files
    }

    fn admits(&self, root: &Path, path: &Path, is_dir: bool) -> bool {
        let rel = path.strip_prefix(root).unwrap_or(path);
        let rel_slash = rel.to_string_lossy().replace('\\', "/");
        self.decide(&rel_slash, is_dir) != Some(Sign::Exclude)
    }
}

impl MatchRule {
    fn new(directive: &Directive) -> Result<Self, PreviewError> {
        let pattern = directive.pattern.as_str();
        let anchored = pattern.starts_with(SEPARATOR);
        let pattern = pattern.trim_start_matches(SEPARATOR);

        // `dir/***` matches the directory itself and everything below it.
        let (core, directory_only, with_descendants) = match pattern.strip_suffix("/***") {
            Some(dir) => (dir.to_string(), true, true),
            None => match pattern.strip_suffix(SEPARATOR) {
                Some(dir) => (dir.to_string(), true, false),
                None => (pattern.to_string(), false, false),
            },
        };

        // rsync's `**` crosses separators; globset only does that for whole
        // components, so collapse to `*` and let it span separators instead.
        let crosses_separators = core.contains("**");
        let core = if crosses_separators {
            collapse_stars(&core)
        } else {
            core
        };

        let core = escape_braces(&core);

        let mut direct = vec![core.clone()];
        if !anchored {
            direct.push(format!("**/{core}"));
        }

        let mut descendants = Vec::new();
        if with_descendants {
            descendants.push(format!("{core}/**"));
            if !anchored {
                descendants.push(format!("**/{core}/**"));
            }
        }

        Ok(Self {
            sign: directive.sign,
            directory_only,
            direct: compile_globs(&direct, &directive.pattern, !crosses_separators)?,
            descendants: compile_globs(&descendants, &directive.pattern, !crosses_separators)?,
        })
    }

    fn matches(&self, rel: &str, is_dir: bool) -> bool {
        if (!self.directory_only || is_dir) && self.direct.iter().any(|m| m.is_match(rel)) {
            return true;
        }
        self.descendants.iter().any(|m| m.is_match(rel))
    }
}

/// rsync has no `{a,b}` alternation; braces are literal there.
fn escape_braces(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if c == '{' || c == '}' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn collapse_stars(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if c == '*' && out.ends_with('*') {
            continue;
        }
        out.push(c);
    }
    out
}

fn compile_globs(
    patterns: &[String],
    original: &str,
    literal_separator: bool,
) -> Result<Vec<GlobMatcher>, PreviewError> {
    patterns
        .iter()
        .map(|p| {
            GlobBuilder::new(p)
                .literal_separator(literal_separator)
                .backslash_escape(true)
                .build()
                .map(|g| g.compile_matcher())
                .map_err(|e| PreviewError::new(original, e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::compile;
    use crate::rules::tests::rule_sets;
    use crate::testutil::TempSite;

    fn preview(global: &[&str], paths: &[&str], includes: &[&str]) -> Preview {
        let (excludes, includes) = rule_sets(global, paths, includes);
        Preview::new(&compile(&excludes, &includes)).unwrap()
    }

    #[test]
    fn empty_directive_list_transfers_everything() {
        let p = Preview::new(&[]).unwrap();
        assert!(p.transfers("a/b/c.txt", false));
        assert_eq!(p.decide("a", true), None);
    }

    #[test]
    fn first_matching_directive_decides() {
        let p = Preview::new(&[
            Directive::include("keep.log"),
            Directive::exclude("*.log"),
        ])
        .unwrap();
        assert_eq!(p.decide("keep.log", false), Some(Sign::Include));
        assert_eq!(p.decide("other.log", false), Some(Sign::Exclude));
        assert_eq!(p.decide("sub/other.log", false), Some(Sign::Exclude));
    }

    #[test]
    fn trailing_separator_is_directory_only() {
        let p = Preview::new(&[Directive::exclude("cache/")]).unwrap();
        assert_eq!(p.decide("cache", true), Some(Sign::Exclude));
        assert_eq!(p.decide("cache", false), None);
    }

    #[test]
    fn triple_star_covers_directory_and_contents() {
        let p = Preview::new(&[Directive::exclude("a/b/***")]).unwrap();
        assert_eq!(p.decide("a/b", true), Some(Sign::Exclude));
        assert_eq!(p.decide("a/b/c/d.txt", false), Some(Sign::Exclude));
        assert_eq!(p.decide("a/bc", true), None);
    }

    #[test]
    fn double_star_matches_across_separators() {
        let p = Preview::new(&[Directive::exclude("**node_modules**")]).unwrap();
        assert!(!p.transfers("node_modules", true));
        assert!(!p.transfers("web/node_modules/x/y.js", false));
        assert!(p.transfers("web/src/y.js", false));
    }

    #[test]
    fn carved_out_directory_survives_its_excluded_parent() {
        let p = preview(&[], &["a/b/c/"], &["a/b/c/d/"]);
        assert!(p.transfers("a/b/c/d/e.txt", false));
        assert!(p.transfers("a/b/c/d/e/f.txt", false));
        assert!(!p.transfers("a/b/c/other.txt", false));
        assert!(!p.transfers("a/b/c/x/d/e.txt", false));
        assert!(p.transfers("a/b/sibling.txt", false));
    }

    #[test]
    fn carved_out_file_leaves_its_neighbours_excluded() {
        let p = preview(&[], &["a/b/c/"], &["a/b/c/d/e/f.html"]);
        assert!(p.transfers("a/b/c/d/e/f.html", false));
        assert!(!p.transfers("a/b/c/d/e/g.html", false));
        assert!(!p.transfers("a/b/c/d/other/f.html", false));
    }

    #[test]
    fn parent_exclusion_hides_children() {
        let p = Preview::new(&[
            Directive::exclude("a/"),
            Directive::include("a/b.txt"),
        ])
        .unwrap();
        assert_eq!(p.decide("a/b.txt", false), Some(Sign::Include));
        assert!(!p.transfers("a/b.txt", false));
    }

    #[test]
    fn walk_prunes_excluded_directories() {
        let site = TempSite::new();
        site.write("index.php", "<?php");
        site.write("wp-content/uploads/2023/a.jpg", "x");
        site.write("wp-content/uploads/2024/b.jpg", "x");
        site.write("wp-content/themes/t/style.css", "x");
        site.write("node_modules/pkg/index.js", "x");

        let p = preview(
            &["node_modules"],
            &["wp-content/uploads/"],
            &["wp-content/uploads/2024/"],
        );
        let files: Vec<String> = p
            .walk(site.path())
            .iter()
            .map(|f| f.to_string_lossy().replace('\\', "/"))
            .collect();

        assert_eq!(
            files,
            [
                "index.php",
                "wp-content/themes/t/style.css",
                "wp-content/uploads/2024/b.jpg",
            ]
        );
    }

    #[test]
    fn braces_in_patterns_are_literal() {
        let p = preview(&[], &["assets/{old}/"], &[]);
        assert!(!p.transfers("assets/{old}/x.css", false));
        assert!(p.transfers("assets/old/x.css", false));

        let p = preview(&[], &["assets/{a,b}/"], &[]);
        assert!(p.transfers("assets/a/x.css", false));
        assert!(!p.transfers("assets/{a,b}/x.css", false));
    }

    #[test]
    fn unbalanced_brace_still_compiles() {
        let p = preview(&["cache{"], &["tmp{1/"], &[]);
        assert!(!p.transfers("tmp{1/a.txt", false));
        assert!(p.transfers("tmp1/a.txt", false));
        assert!(!p.transfers("web/cache{old/a.txt", false));
    }

    #[test]
    fn escape_braces_leaves_other_characters() {
        assert_eq!(escape_braces("a/{b}*"), "a/\\{b\\}*");
    }

    #[test]
    fn collapse_stars_keeps_single_stars() {
        assert_eq!(collapse_stars("**a**"), "*a*");
        assert_eq!(collapse_stars("a*b"), "a*b");
        assert_eq!(collapse_stars("a***"), "a*");
    }
}
