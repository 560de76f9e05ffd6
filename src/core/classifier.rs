/// Language classification for project directories
///
/// Counts source files by extension, bounded in depth, and turns the
/// counts into weighted language shares. A cheap heuristic on purpose:
/// no parsing, no build-system awareness.

use crate::db::models::{LanguageShare, ScanWarning};
use std::collections::HashMap;
use std::path::Path;
use walkdir::WalkDir;

/// How deep below the project root the classifier looks
const DEFAULT_CLASSIFY_DEPTH: usize = 5;

/// Languages below this share of mapped files are dropped
const DEFAULT_MIN_SHARE: f64 = 0.05;

/// Extension to language tag lookup. Extensions with no entry are
/// ignored entirely, not counted as unknown.
const EXTENSION_TABLE: &[(&str, &str)] = &[
    ("py", "python"),
    ("pyi", "python"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("mjs", "javascript"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("rs", "rust"),
    ("go", "go"),
    ("java", "java"),
    ("kt", "kotlin"),
    ("kts", "kotlin"),
    ("cs", "csharp"),
    ("cpp", "cpp"),
    ("cxx", "cpp"),
    ("cc", "cpp"),
    ("hpp", "cpp"),
    ("hxx", "cpp"),
    ("c", "c"),
    ("h", "c"),
    ("rb", "ruby"),
    ("php", "php"),
    ("swift", "swift"),
    ("dart", "dart"),
    ("ex", "elixir"),
    ("exs", "elixir"),
    ("hs", "haskell"),
    ("scala", "scala"),
    ("lua", "lua"),
    ("sh", "shell"),
    ("bash", "shell"),
    ("zsh", "shell"),
];

// Dependency and output trees would dominate the counts with noise
const NOISE_DIRECTORIES: &[&str] = &[
    "node_modules",
    "venv",
    "env",
    "__pycache__",
    "target",
    "build",
    "dist",
    "out",
    "vendor",
    "_build",
];

/// Classifies a directory by counting mapped file extensions
pub struct LanguageClassifier {
    max_depth: usize,
    min_share: f64,
}

impl Default for LanguageClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_CLASSIFY_DEPTH, DEFAULT_MIN_SHARE)
    }
}

impl LanguageClassifier {
    pub fn new(max_depth: usize, min_share: f64) -> Self {
        Self {
            max_depth,
            min_share,
        }
    }

    /// Classify a directory into an ordered set of language shares
    ///
    /// # Returns
    /// Shares sorted by descending weight, ties broken by tag name for
    /// determinism. Empty when no file maps to a language. Unreadable
    /// subtrees are skipped and reported as warnings, never errors.
    pub fn classify(&self, directory: &Path) -> (Vec<LanguageShare>, Vec<ScanWarning>) {
        let mut counts: HashMap<&'static str, u64> = HashMap::new();
        let mut warnings = Vec::new();

        let mut walker = WalkDir::new(directory).max_depth(self.max_depth).into_iter();

        loop {
            let entry = match walker.next() {
                None => break,
                Some(Ok(entry)) => entry,
                Some(Err(e)) => {
                    warnings.push(ScanWarning::Unreadable {
                        path: e
                            .path()
                            .map(|p| p.display().to_string())
                            .unwrap_or_else(|| directory.display().to_string()),
                        detail: e.to_string(),
                    });
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                if entry.depth() > 0 && should_skip(entry.file_name().to_str()) {
                    walker.skip_current_dir();
                }
                continue;
            }

            let tag = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(|ext| lookup_language(&ext.to_lowercase()));

            if let Some(tag) = tag {
                *counts.entry(tag).or_insert(0) += 1;
            }
        }

        let total: u64 = counts.values().sum();
        if total == 0 {
            return (Vec::new(), warnings);
        }

        let mut shares: Vec<LanguageShare> = counts
            .into_iter()
            .map(|(tag, count)| LanguageShare {
                tag: tag.to_string(),
                weight: count as f64 / total as f64,
            })
            .filter(|share| share.weight >= self.min_share)
            .collect();

        shares.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| a.tag.cmp(&b.tag))
        });

        (shares, warnings)
    }
}

fn lookup_language(extension: &str) -> Option<&'static str> {
    EXTENSION_TABLE
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, tag)| *tag)
}

fn should_skip(name: Option<&str>) -> bool {
    match name {
        Some(name) => name.starts_with('.') || NOISE_DIRECTORIES.contains(&name),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch_many(dir: &Path, stem: &str, ext: &str, count: usize) {
        fs::create_dir_all(dir).unwrap();
        for i in 0..count {
            fs::write(dir.join(format!("{}{}.{}", stem, i, ext)), "x").unwrap();
        }
    }

    #[test]
    fn test_weights_follow_file_ratio() {
        let temp = TempDir::new().unwrap();
        touch_many(temp.path(), "mod", "py", 8);
        touch_many(temp.path(), "util", "ts", 2);

        let (shares, warnings) = LanguageClassifier::default().classify(temp.path());

        assert!(warnings.is_empty());
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].tag, "python");
        assert!((shares[0].weight - 0.8).abs() < f64::EPSILON);
        assert_eq!(shares[1].tag, "typescript");
        assert!((shares[1].weight - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_small_shares_are_dropped() {
        let temp = TempDir::new().unwrap();
        touch_many(temp.path(), "lib", "rs", 19);
        touch_many(temp.path(), "run", "sh", 1);

        let classifier = LanguageClassifier::new(DEFAULT_CLASSIFY_DEPTH, 0.1);
        let (shares, _) = classifier.classify(temp.path());

        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].tag, "rust");
    }

    #[test]
    fn test_ties_break_by_tag_name() {
        let temp = TempDir::new().unwrap();
        touch_many(temp.path(), "a", "rs", 2);
        touch_many(temp.path(), "b", "py", 2);

        let (shares, _) = LanguageClassifier::default().classify(temp.path());

        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].tag, "python");
        assert_eq!(shares[1].tag, "rust");
    }

    #[test]
    fn test_unmapped_extensions_are_ignored() {
        let temp = TempDir::new().unwrap();
        touch_many(temp.path(), "readme", "txt", 5);
        touch_many(temp.path(), "data", "csv", 3);

        let (shares, _) = LanguageClassifier::default().classify(temp.path());
        assert!(shares.is_empty());
    }

    #[test]
    fn test_noise_directories_do_not_count() {
        let temp = TempDir::new().unwrap();
        touch_many(temp.path(), "app", "py", 3);
        // A vendored tree that would otherwise swamp the project itself
        touch_many(&temp.path().join("node_modules").join("leftpad"), "index", "js", 50);
        touch_many(&temp.path().join(".venv").join("lib"), "site", "py", 40);

        let (shares, _) = LanguageClassifier::default().classify(temp.path());

        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].tag, "python");
        assert!((shares[0].weight - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_depth_is_bounded() {
        let temp = TempDir::new().unwrap();
        touch_many(temp.path(), "top", "go", 1);

        let mut deep = temp.path().to_path_buf();
        for i in 0..4 {
            deep = deep.join(format!("level{}", i));
        }
        touch_many(&deep, "buried", "rb", 10);

        let classifier = LanguageClassifier::new(2, DEFAULT_MIN_SHARE);
        let (shares, _) = classifier.classify(temp.path());

        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].tag, "go");
    }

    #[test]
    fn test_extension_case_insensitive() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Main.PY"), "x").unwrap();

        let (shares, _) = LanguageClassifier::default().classify(temp.path());
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].tag, "python");
    }
}
