// Walks the configured roots and finds project directories
//
// A directory counts as a project when it contains a known marker
// (VCS metadata, a package manifest, a build file). Once a project is
// found we stop descending into it, so a repo vendoring another repo
// shows up once, not twice.

use crate::core::classifier::LanguageClassifier;
use crate::db::models::{DiscoveredProject, ScanWarning};
use crate::error::{ProjdexError, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use walkdir::WalkDir;

/// Markers that make a directory a project root
const PROJECT_MARKERS: &[&str] = &[
    ".git",
    "package.json",
    "Cargo.toml",
    "pyproject.toml",
    "setup.py",
    "requirements.txt",
    "go.mod",
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "Makefile",
    "CMakeLists.txt",
    "Gemfile",
    "composer.json",
    "pubspec.yaml",
    "mix.exs",
    "stack.yaml",
    "Package.swift",
];

// .sln / .csproj have no fixed file name, so they get an extension check
const PROJECT_MARKER_EXTENSIONS: &[&str] = &["sln", "csproj"];

/// Directories never worth descending into
const SKIP_DIRECTORIES: &[&str] = &[
    "node_modules",
    "venv",
    "env",
    "__pycache__",
    "target",
    "build",
    "dist",
    "out",
    "bin",
    "obj",
    "vendor",
    "packages",
    "coverage",
    "htmlcov",
    "sdk",
    "lib",
    "libs",
    "third_party",
    "external",
    "deps",
    "dependencies",
    "_build",
];

// Files whose mtime is a decent "last worked on" signal
const LAST_MODIFIED_PROBES: &[&str] = &[
    ".git/FETCH_HEAD",
    ".git/index",
    "package.json",
    "Cargo.toml",
    "pyproject.toml",
    "go.mod",
];

/// Options consumed (not owned) by a scan
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// How deep below each root to look for project boundaries
    pub max_depth: usize,
    /// How deep the classifier looks below a found project
    pub classify_depth: usize,
    /// Languages below this share of mapped files are dropped
    pub min_language_share: f64,
    /// Extra directory-name patterns to prune, as regexes
    pub exclude_patterns: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_depth: 5,
            classify_depth: 5,
            min_language_share: 0.05,
            exclude_patterns: Vec::new(),
        }
    }
}

/// Cooperative cancellation handle, checked between directory visits
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything one scan produced
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub descriptors: Vec<DiscoveredProject>,
    pub warnings: Vec<ScanWarning>,
}

/// Walks root directories and emits a descriptor per discovered project
pub struct ProjectScanner {
    options: ScanOptions,
    exclude: Vec<Regex>,
    classifier: LanguageClassifier,
}

impl ProjectScanner {
    pub fn new(options: ScanOptions) -> Self {
        // Compile the user patterns once; a broken pattern is dropped
        // rather than killing the whole scan
        let exclude = options
            .exclude_patterns
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect();

        let classifier =
            LanguageClassifier::new(options.classify_depth, options.min_language_share);

        Self {
            options,
            exclude,
            classifier,
        }
    }

    /// Scan every root and collect descriptors plus non-fatal warnings
    ///
    /// Each call is a fresh walk. An unreadable root is fatal for that
    /// root only; the others still scan. Returns `Err(ScanCancelled)`
    /// as soon as the flag is observed.
    pub fn scan(&self, roots: &[PathBuf], cancel: &CancelFlag) -> Result<ScanOutcome> {
        let mut outcome = ScanOutcome::default();
        // Realpaths already visited, shared across roots so overlapping
        // roots and symlink aliases emit a project once
        let mut visited: HashSet<PathBuf> = HashSet::new();

        for root in roots {
            if cancel.is_cancelled() {
                return Err(ProjdexError::ScanCancelled);
            }

            if let Err(e) = std::fs::read_dir(root) {
                tracing::warn!(root = %root.display(), error = %e, "scan root unavailable");
                outcome.warnings.push(ScanWarning::RootUnavailable {
                    root: root.display().to_string(),
                    detail: e.to_string(),
                });
                continue;
            }

            self.scan_root(root, cancel, &mut visited, &mut outcome)?;
        }

        tracing::debug!(
            projects = outcome.descriptors.len(),
            warnings = outcome.warnings.len(),
            "scan finished"
        );
        Ok(outcome)
    }

    fn scan_root(
        &self,
        root: &Path,
        cancel: &CancelFlag,
        visited: &mut HashSet<PathBuf>,
        outcome: &mut ScanOutcome,
    ) -> Result<()> {
        let mut walker = WalkDir::new(root)
            .max_depth(self.options.max_depth)
            .follow_links(true)
            .into_iter();

        loop {
            if cancel.is_cancelled() {
                return Err(ProjdexError::ScanCancelled);
            }

            let entry = match walker.next() {
                None => break,
                Some(Ok(entry)) => entry,
                Some(Err(e)) => {
                    // Permission problems and symlink loops land here.
                    // Skip the subtree, remember that we did.
                    outcome.warnings.push(ScanWarning::Unreadable {
                        path: e
                            .path()
                            .map(|p| p.display().to_string())
                            .unwrap_or_else(|| root.display().to_string()),
                        detail: e.to_string(),
                    });
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();

            // Prune before any marker check, both for speed and so a
            // project buried in a dependency cache never surfaces
            if entry.depth() > 0 && self.should_prune(entry.file_name().to_str()) {
                walker.skip_current_dir();
                continue;
            }

            // Follow each symlink target at most once per scan
            let real = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
            if !visited.insert(real.clone()) {
                walker.skip_current_dir();
                continue;
            }

            if is_project_boundary(path) {
                // The realpath is the merge key, so a root reached through
                // a symlink still lands on the same record every scan
                let (descriptor, mut warnings) = self.describe(&real);
                outcome.descriptors.push(descriptor);
                outcome.warnings.append(&mut warnings);
                // First boundary wins; nested projects are not reported
                walker.skip_current_dir();
            }
        }

        Ok(())
    }

    fn should_prune(&self, name: Option<&str>) -> bool {
        let Some(name) = name else {
            return true;
        };

        if name.starts_with('.') {
            return true;
        }

        let lowered = name.to_lowercase();
        if SKIP_DIRECTORIES.contains(&lowered.as_str()) {
            return true;
        }

        self.exclude.iter().any(|pattern| pattern.is_match(name))
    }

    /// Build the descriptor for one found project
    fn describe(&self, path: &Path) -> (DiscoveredProject, Vec<ScanWarning>) {
        let (languages, warnings) = self.classifier.classify(path);

        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.to_string())
            .unwrap_or_else(|| path.display().to_string());

        let descriptor = DiscoveredProject {
            path: path.display().to_string(),
            name,
            languages,
            git_branch: current_branch(path),
            last_modified: last_modified(path),
            discovered_at: Utc::now().to_rfc3339(),
        };

        (descriptor, warnings)
    }
}

/// True when the directory carries any project marker
fn is_project_boundary(path: &Path) -> bool {
    for marker in PROJECT_MARKERS {
        if path.join(marker).exists() {
            return true;
        }
    }

    // Extension-based markers need a directory listing
    let Ok(entries) = std::fs::read_dir(path) else {
        return false;
    };

    for entry in entries.flatten() {
        let entry_path = entry.path();
        if entry_path.is_file() {
            if let Some(ext) = entry_path.extension().and_then(|e| e.to_str()) {
                if PROJECT_MARKER_EXTENSIONS.contains(&ext) {
                    return true;
                }
            }
        }
    }

    false
}

/// Checked-out branch name, if the project is a git repository
fn current_branch(path: &Path) -> Option<String> {
    let repo = git2::Repository::open(path).ok()?;
    let head = repo.head().ok()?;
    head.shorthand().map(|branch| branch.to_string())
}

/// Best-effort "last worked on" timestamp from key file mtimes,
/// falling back to the directory itself
fn last_modified(path: &Path) -> Option<String> {
    let mut most_recent: Option<std::time::SystemTime> = None;

    for probe in LAST_MODIFIED_PROBES {
        if let Ok(meta) = path.join(probe).metadata() {
            if let Ok(mtime) = meta.modified() {
                if most_recent.map_or(true, |current| mtime > current) {
                    most_recent = Some(mtime);
                }
            }
        }
    }

    let mtime = match most_recent {
        Some(mtime) => mtime,
        None => path.metadata().ok()?.modified().ok()?,
    };

    Some(DateTime::<Utc>::from(mtime).to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn scanner() -> ProjectScanner {
        ProjectScanner::new(ScanOptions::default())
    }

    /// Helper to create a file with content, ensuring parent dirs exist
    fn create_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn paths_of(outcome: &ScanOutcome) -> Vec<String> {
        let mut paths: Vec<String> = outcome
            .descriptors
            .iter()
            .map(|d| d.path.clone())
            .collect();
        paths.sort();
        paths
    }

    #[test]
    fn test_finds_marker_projects() {
        let temp = TempDir::new().unwrap();
        create_file(&temp.path().join("api").join("Cargo.toml"), "[package]");
        create_file(&temp.path().join("site").join("package.json"), "{}");
        fs::create_dir_all(temp.path().join("scratch")).unwrap();

        let outcome = scanner()
            .scan(&[temp.path().to_path_buf()], &CancelFlag::new())
            .unwrap();

        let paths = paths_of(&outcome);
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("api"));
        assert!(paths[1].ends_with("site"));
    }

    #[test]
    fn test_nested_project_is_not_reported() {
        let temp = TempDir::new().unwrap();
        let outer = temp.path().join("outer");
        create_file(&outer.join("Cargo.toml"), "[package]");
        create_file(&outer.join("plugins").join("inner").join("Cargo.toml"), "[package]");

        let outcome = scanner()
            .scan(&[temp.path().to_path_buf()], &CancelFlag::new())
            .unwrap();

        assert_eq!(outcome.descriptors.len(), 1);
        assert!(outcome.descriptors[0].path.ends_with("outer"));
    }

    #[test]
    fn test_projects_inside_caches_are_pruned() {
        let temp = TempDir::new().unwrap();
        create_file(
            &temp.path().join("node_modules").join("dep").join("package.json"),
            "{}",
        );
        create_file(
            &temp.path().join(".config").join("tool").join("Cargo.toml"),
            "[package]",
        );
        create_file(&temp.path().join("real").join("go.mod"), "module real");

        let outcome = scanner()
            .scan(&[temp.path().to_path_buf()], &CancelFlag::new())
            .unwrap();

        assert_eq!(outcome.descriptors.len(), 1);
        assert!(outcome.descriptors[0].path.ends_with("real"));
    }

    #[test]
    fn test_extension_markers() {
        let temp = TempDir::new().unwrap();
        create_file(&temp.path().join("legacy").join("Thing.csproj"), "<Project/>");

        let outcome = scanner()
            .scan(&[temp.path().to_path_buf()], &CancelFlag::new())
            .unwrap();

        assert_eq!(outcome.descriptors.len(), 1);
        assert_eq!(outcome.descriptors[0].name, "legacy");
    }

    #[test]
    fn test_unavailable_root_warns_but_other_roots_scan() {
        let temp = TempDir::new().unwrap();
        create_file(&temp.path().join("proj").join("Cargo.toml"), "[package]");
        let missing = temp.path().join("does-not-exist");

        let outcome = scanner()
            .scan(
                &[missing.clone(), temp.path().to_path_buf()],
                &CancelFlag::new(),
            )
            .unwrap();

        assert_eq!(outcome.descriptors.len(), 1);
        assert!(outcome.warnings.iter().any(|w| matches!(
            w,
            ScanWarning::RootUnavailable { root, .. } if root.contains("does-not-exist")
        )));
    }

    #[test]
    fn test_depth_limit() {
        let temp = TempDir::new().unwrap();
        create_file(
            &temp.path().join("a").join("b").join("c").join("Cargo.toml"),
            "[package]",
        );

        let shallow = ProjectScanner::new(ScanOptions {
            max_depth: 2,
            ..ScanOptions::default()
        });
        let outcome = shallow
            .scan(&[temp.path().to_path_buf()], &CancelFlag::new())
            .unwrap();
        assert!(outcome.descriptors.is_empty());

        let outcome = scanner()
            .scan(&[temp.path().to_path_buf()], &CancelFlag::new())
            .unwrap();
        assert_eq!(outcome.descriptors.len(), 1);
    }

    #[test]
    fn test_overlapping_roots_emit_once() {
        let temp = TempDir::new().unwrap();
        create_file(&temp.path().join("proj").join("Cargo.toml"), "[package]");

        let root = temp.path().to_path_buf();
        let outcome = scanner()
            .scan(&[root.clone(), root], &CancelFlag::new())
            .unwrap();

        assert_eq!(outcome.descriptors.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_alias_emits_once() {
        let temp = TempDir::new().unwrap();
        create_file(&temp.path().join("proj").join("Cargo.toml"), "[package]");
        std::os::unix::fs::symlink(temp.path().join("proj"), temp.path().join("alias"))
            .unwrap();

        let outcome = scanner()
            .scan(&[temp.path().to_path_buf()], &CancelFlag::new())
            .unwrap();

        assert_eq!(outcome.descriptors.len(), 1);
    }

    #[test]
    fn test_cancelled_scan_stops() {
        let temp = TempDir::new().unwrap();
        create_file(&temp.path().join("proj").join("Cargo.toml"), "[package]");

        let cancel = CancelFlag::new();
        cancel.cancel();

        let result = scanner().scan(&[temp.path().to_path_buf()], &cancel);
        assert!(matches!(result, Err(ProjdexError::ScanCancelled)));
    }

    #[test]
    fn test_descriptor_fields() {
        let temp = TempDir::new().unwrap();
        let proj = temp.path().join("ml-stuff");
        create_file(&proj.join("requirements.txt"), "torch");
        for i in 0..4 {
            create_file(&proj.join(format!("train{}.py", i)), "pass");
        }

        let outcome = scanner()
            .scan(&[temp.path().to_path_buf()], &CancelFlag::new())
            .unwrap();

        assert_eq!(outcome.descriptors.len(), 1);
        let descriptor = &outcome.descriptors[0];
        assert_eq!(descriptor.name, "ml-stuff");
        assert_eq!(descriptor.languages.len(), 1);
        assert_eq!(descriptor.languages[0].tag, "python");
        assert!(descriptor.last_modified.is_some());
        assert!(!descriptor.discovered_at.is_empty());
        // Not a git repo, so no branch
        assert!(descriptor.git_branch.is_none());
    }

    #[test]
    fn test_git_branch_is_read() {
        let temp = TempDir::new().unwrap();
        let proj = temp.path().join("repo");
        fs::create_dir_all(&proj).unwrap();

        let repo = git2::Repository::init(&proj).unwrap();
        let sig = git2::Signature::now("tester", "tester@example.com").unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[])
            .unwrap();

        let outcome = scanner()
            .scan(&[temp.path().to_path_buf()], &CancelFlag::new())
            .unwrap();

        assert_eq!(outcome.descriptors.len(), 1);
        assert!(outcome.descriptors[0].git_branch.is_some());
    }

    #[test]
    fn test_user_exclude_patterns() {
        let temp = TempDir::new().unwrap();
        create_file(&temp.path().join("keep").join("Cargo.toml"), "[package]");
        create_file(&temp.path().join("archive-2020").join("Cargo.toml"), "[package]");

        let scanner = ProjectScanner::new(ScanOptions {
            exclude_patterns: vec!["^archive-".to_string()],
            ..ScanOptions::default()
        });
        let outcome = scanner
            .scan(&[temp.path().to_path_buf()], &CancelFlag::new())
            .unwrap();

        assert_eq!(outcome.descriptors.len(), 1);
        assert_eq!(outcome.descriptors[0].name, "keep");
    }
}
