//! [`TestHub`] builder for sync scenarios.
//!
//! Layout inside the temp dir:
//!
//! ```text
//! templates/catalog.yaml
//! templates/project_mapping.yaml
//! templates/<set>/<path>
//! projects/<name>/
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary hub with helpers for test setup and assertion.
///
/// # Example
///
/// ```rust,no_run
/// use hub_test_utils::TestHub;
///
/// let mut hub = TestHub::new();
/// hub.with_set("shell", &[(".bashrc", "export A=1\n"), (".vimrc", "set nu\n")]);
/// let project = hub.project("api");
/// hub.write(&project, ".bashrc", "local\n");
/// ```
pub struct TestHub {
    temp_dir: TempDir,
    /// Sets written to the catalog so far, in declaration order
    sets: Vec<(String, Vec<String>)>,
}

impl Default for TestHub {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHub {
    /// Create an empty hub with a `templates/` directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("templates")).unwrap();
        Self {
            temp_dir,
            sets: Vec::new(),
        }
    }

    /// Root of the temporary directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root().join("templates")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.templates_dir().join("catalog.yaml")
    }

    /// Where the registry lands by default, next to the catalog.
    pub fn registry_path(&self) -> PathBuf {
        self.templates_dir().join("project_mapping.yaml")
    }

    /// Template file for `path` in `set` (the default `<set>/<path>` source).
    pub fn template_path(&self, set: &str, path: &str) -> PathBuf {
        self.templates_dir().join(set).join(path)
    }

    /// Add a set whose files have the given template contents, then rewrite
    /// the catalog.
    pub fn with_set(&mut self, name: &str, files: &[(&str, &str)]) -> &mut Self {
        for (path, content) in files {
            write_file(&self.template_path(name, path), content);
        }
        let paths = files.iter().map(|(path, _)| path.to_string()).collect();
        self.sets.push((name.to_string(), paths));
        self.write_catalog(&self.render_catalog());
        self
    }

    /// Overwrite the catalog with raw text.
    pub fn write_catalog(&self, content: &str) {
        write_file(&self.catalog_path(), content);
    }

    /// Overwrite the template content of one file.
    pub fn write_template(&self, set: &str, path: &str, content: &str) {
        write_file(&self.template_path(set, path), content);
    }

    /// Create (or reuse) `projects/<name>` and return its path.
    pub fn project(&self, name: &str) -> PathBuf {
        let dir = self.root().join("projects").join(name);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Write `content` to `path` under `dir`, creating parents.
    pub fn write(&self, dir: &Path, path: &str, content: &str) {
        write_file(&dir.join(path), content);
    }

    /// Read `path` under `dir`, or `None` if it does not exist.
    pub fn read(&self, dir: &Path, path: &str) -> Option<String> {
        fs::read_to_string(dir.join(path)).ok()
    }

    /// Raw bytes of the registry file, or `None` before the first write.
    pub fn registry_bytes(&self) -> Option<Vec<u8>> {
        fs::read(self.registry_path()).ok()
    }

    /// Assert that `path` under `dir` holds exactly `expected`.
    ///
    /// # Panics
    /// Panics if the file is missing or differs.
    pub fn assert_content(&self, dir: &Path, path: &str, expected: &str) {
        let full_path = dir.join(path);
        let actual = fs::read_to_string(&full_path)
            .unwrap_or_else(|_| panic!("Could not read file: {}", full_path.display()));
        assert_eq!(
            actual,
            expected,
            "Unexpected content in {}",
            full_path.display()
        );
    }

    /// Assert that `path` under `dir` does **not** exist.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path exists.
    pub fn assert_missing(&self, dir: &Path, path: &str) {
        let full_path = dir.join(path);
        assert!(
            !full_path.exists(),
            "Expected file NOT to exist: {}",
            full_path.display()
        );
    }

    fn render_catalog(&self) -> String {
        let mut out = String::from("environment_sets:\n");
        for (name, paths) in &self.sets {
            out.push_str(&format!("  - name: {name}\n    files:\n"));
            for path in paths {
                out.push_str(&format!("      - path: \"{path}\"\n"));
            }
        }
        out
    }
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}
