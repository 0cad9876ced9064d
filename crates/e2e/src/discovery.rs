//! Locating and loading test files

use globset::GlobBuilder;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use aiqa_common::AiqaConfig;

use crate::error::{E2eError, E2eResult};
use crate::spec::load_test_file;
use crate::suite::TestFile;

/// File name suffixes recognised as test files when walking a directory
pub const TEST_FILE_SUFFIXES: &[&str] = &[".test.yaml", ".test.yml"];

/// Resolve the configured selector to a sorted list of test file paths
pub fn discover(config: &AiqaConfig) -> E2eResult<Vec<PathBuf>> {
    let paths = match (&config.test_pattern, &config.test_dir) {
        (Some(pattern), _) => {
            let paths = find_by_pattern(pattern)?;
            if paths.is_empty() {
                return Err(E2eError::Discovery(format!("no files match pattern {}", pattern)));
            }
            paths
        }
        (None, Some(dir)) => {
            let paths = find_in_dir(dir);
            if paths.is_empty() {
                return Err(E2eError::Discovery(format!(
                    "no *.test.yaml files in directory {}",
                    dir.display()
                )));
            }
            paths
        }
        (None, None) => {
            return Err(E2eError::Discovery("no test selector configured".to_string()))
        }
    };
    Ok(paths)
}

/// Discover, load, and filter every test file for a run
pub fn load_test_files(config: &AiqaConfig) -> E2eResult<Vec<TestFile>> {
    let grep = config.grep.as_deref().map(Regex::new).transpose()?;

    let mut files = Vec::new();
    for path in discover(config)? {
        let mut file = load_test_file(&path)?;
        if let Some(filter) = &grep {
            file.suite = file.suite.retain_matching(filter);
        }
        debug!("Imported {} test(s) from {}", file.suite.tests().len(), path.display());
        files.push(file);
    }
    Ok(files)
}

/// Every `*.test.yaml` / `*.test.yml` below `dir`, sorted
pub fn find_in_dir(dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let name = e.file_name().to_string_lossy();
            TEST_FILE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
        })
        .map(|e| e.into_path())
        .collect();
    paths.sort();
    paths
}

/// Every file matching a glob (`*`, `?`, `**`, `[ab]`, `{a,b}`), sorted
pub fn find_by_pattern(pattern: &str) -> E2eResult<Vec<PathBuf>> {
    let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| E2eError::Discovery(format!("invalid pattern {}: {}", pattern, e)))?
        .compile_matcher();
    let root = literal_prefix(pattern);

    let mut paths: Vec<PathBuf> = WalkDir::new(&root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| matcher.is_match(p.strip_prefix(".").unwrap_or(p.as_path())))
        .collect();
    paths.sort();
    Ok(paths)
}

fn is_wildcard(c: char) -> bool {
    matches!(c, '*' | '?' | '[' | '{')
}

/// Leading path components that contain no wildcard
fn literal_prefix(pattern: &str) -> PathBuf {
    let components: Vec<&str> = pattern
        .split('/')
        .take_while(|part| !part.chars().any(is_wildcard))
        .collect();

    if components.is_empty() {
        return PathBuf::from(".");
    }
    let joined = components.join("/");
    if joined.is_empty() {
        // Pattern starts at the filesystem root
        PathBuf::from("/")
    } else {
        PathBuf::from(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "tests: []\n").unwrap();
    }

    #[test]
    fn test_literal_prefix() {
        assert_eq!(literal_prefix("tests/**/*.yaml"), PathBuf::from("tests"));
        assert_eq!(literal_prefix("*.yaml"), PathBuf::from("."));
        assert_eq!(literal_prefix("/srv/e2e/*.yaml"), PathBuf::from("/srv/e2e"));
    }

    #[test]
    fn test_find_in_dir_recurses_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "b.test.yaml");
        touch(tmp.path(), "nested/a.test.yml");
        touch(tmp.path(), "helpers.yaml");

        let found = find_in_dir(tmp.path());
        assert_eq!(
            found,
            vec![tmp.path().join("b.test.yaml"), tmp.path().join("nested/a.test.yml")]
        );
    }

    #[test]
    fn test_find_by_absolute_pattern() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "suite/one.test.yaml");
        touch(tmp.path(), "suite/deep/two.test.yaml");
        touch(tmp.path(), "suite/skip.yaml");

        let pattern = format!("{}/suite/**/*.test.yaml", tmp.path().display());
        let found = find_by_pattern(&pattern).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_find_by_brace_and_class_patterns() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "suite/a.test.yaml");
        touch(tmp.path(), "suite/b.test.yml");
        touch(tmp.path(), "suite/c.test.yaml");

        let braces = format!("{}/suite/*.test.{{yaml,yml}}", tmp.path().display());
        assert_eq!(find_by_pattern(&braces).unwrap().len(), 3);

        let class = format!("{}/suite/[ab].test.yaml", tmp.path().display());
        assert_eq!(
            find_by_pattern(&class).unwrap(),
            vec![tmp.path().join("suite/a.test.yaml")]
        );
    }

    #[test]
    fn test_invalid_pattern_is_a_discovery_error() {
        assert!(matches!(
            find_by_pattern("suite/[a.test.yaml"),
            Err(E2eError::Discovery(_))
        ));
    }

    #[test]
    fn test_discover_reports_empty_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AiqaConfig {
            test_dir: Some(tmp.path().to_path_buf()),
            ..Default::default()
        };
        assert!(matches!(discover(&config), Err(E2eError::Discovery(_))));
    }

    #[test]
    fn test_load_applies_grep() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("tabs.test.yaml"),
            "tests:\n  - Open the Projects tab\n  - Open the People tab\n",
        )
        .unwrap();
        let config = AiqaConfig {
            test_dir: Some(tmp.path().to_path_buf()),
            grep: Some("People".to_string()),
            ..Default::default()
        };

        let files = load_test_files(&config).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].suite.tests().len(), 1);
        assert_eq!(files[0].suite.tests()[0].instruction, "Open the People tab");
    }
}
