//! Deterministic fixture workspace generator for tests.
//!
//! Generates synthetic PHP workspaces with controlled characteristics:
//! source file count, functions and classes per file, a composer manifest,
//! and a populated vendor tree (including `tests/` directories that
//! discovery must skip).
//!
//! All output is deterministic, with no randomness, so assertions on file
//! and symbol counts are reproducible.

use std::fmt::Write;
use std::path::Path;

use tempfile::TempDir;

/// Configuration for generating a fixture workspace.
#[derive(Debug, Clone)]
pub struct FixtureConfig {
    /// Source files written at the workspace root
    pub file_count: usize,
    /// Free functions per source file
    pub functions_per_file: usize,
    /// Classes per source file (each with a single method)
    pub classes_per_file: usize,
    /// Vendor packages, as `vendor/name` pairs
    pub vendor_packages: Vec<String>,
    /// Library files per vendor package (plus one test file each)
    pub files_per_package: usize,
    /// Whether to write a composer.json declaring `vendor_packages`
    pub write_manifest: bool,
}

impl FixtureConfig {
    /// Plain workspace: 5 source files, no composer integration.
    pub fn plain() -> Self {
        Self {
            file_count: 5,
            functions_per_file: 3,
            classes_per_file: 1,
            vendor_packages: Vec::new(),
            files_per_package: 0,
            write_manifest: false,
        }
    }

    /// Workspace with a manifest and two declared vendor packages.
    pub fn with_vendor() -> Self {
        Self {
            file_count: 3,
            functions_per_file: 2,
            classes_per_file: 1,
            vendor_packages: vec!["acme/util".to_string(), "monolog/monolog".to_string()],
            files_per_package: 2,
            write_manifest: true,
        }
    }

    /// Symbols a single generated source file declares, using the
    /// one-declaration-per-`function`-keyword convention the mock engine
    /// counts by.
    pub fn symbols_per_file(&self) -> usize {
        self.functions_per_file + self.classes_per_file
    }
}

/// Generate the content of a single PHP source file deterministically.
fn generate_php_file_content(index: usize, config: &FixtureConfig) -> String {
    let mut content = String::from("<?php\n\nnamespace Fixture;\n\n");

    for func_i in 0..config.functions_per_file {
        writeln!(content, "function helper_{}_{}(int $x): int", index, func_i).unwrap();
        writeln!(content, "{{").unwrap();
        writeln!(content, "    return $x + {};", func_i + 1).unwrap();
        writeln!(content, "}}\n").unwrap();
    }

    for class_i in 0..config.classes_per_file {
        writeln!(content, "class Widget{}_{}", index, class_i).unwrap();
        writeln!(content, "{{").unwrap();
        writeln!(content, "    public function render(): string").unwrap();
        writeln!(content, "    {{").unwrap();
        writeln!(content, "        return 'widget-{}-{}';", index, class_i).unwrap();
        writeln!(content, "    }}").unwrap();
        writeln!(content, "}}\n").unwrap();
    }

    content
}

/// Generate the content of one vendor library file.
fn generate_vendor_file_content(package: &str, index: usize) -> String {
    let ident: String = package.replace(['/', '-'], "_");
    format!(
        "<?php\n\nnamespace Vendor;\n\nfunction {}_{}(): void\n{{\n}}\n",
        ident, index
    )
}

/// Create a temporary fixture workspace from the given configuration.
///
/// Returns a `TempDir` whose path contains the generated workspace. The
/// directory is cleaned up when the `TempDir` is dropped.
pub fn create_fixture_workspace(config: &FixtureConfig) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory for fixture workspace");
    write_fixture_workspace(temp_dir.path(), config);
    temp_dir
}

/// Write fixture files into an existing directory.
pub fn write_fixture_workspace(dir: &Path, config: &FixtureConfig) {
    for i in 0..config.file_count {
        let filename = format!("file_{}.php", i);
        std::fs::write(dir.join(&filename), generate_php_file_content(i, config))
            .unwrap_or_else(|e| panic!("Failed to write fixture file {}: {}", filename, e));
    }

    if config.write_manifest {
        let require: Vec<String> = config
            .vendor_packages
            .iter()
            .map(|pkg| format!("\"{}\": \"^1.0\"", pkg))
            .collect();
        let manifest = format!(
            "{{\n  \"name\": \"fixture/workspace\",\n  \"require\": {{ {} }}\n}}\n",
            require.join(", ")
        );
        std::fs::write(dir.join("composer.json"), manifest)
            .expect("Failed to write fixture composer.json");
    }

    for package in &config.vendor_packages {
        let package_dir = dir.join("vendor").join(package);
        let test_dir = package_dir.join("tests");
        std::fs::create_dir_all(&test_dir)
            .unwrap_or_else(|e| panic!("Failed to create vendor dirs for {}: {}", package, e));

        for j in 0..config.files_per_package {
            std::fs::write(
                package_dir.join(format!("lib_{}.php", j)),
                generate_vendor_file_content(package, j),
            )
            .expect("Failed to write vendor fixture file");
            // files under tests/ must never be discovered
            std::fs::write(
                test_dir.join(format!("LibTest_{}.php", j)),
                generate_vendor_file_content(package, j),
            )
            .expect("Failed to write vendor test fixture file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_preset_values() {
        let config = FixtureConfig::plain();
        assert_eq!(config.file_count, 5);
        assert!(config.vendor_packages.is_empty());
        assert!(!config.write_manifest);
    }

    #[test]
    fn test_file_count_matches_config() {
        let config = FixtureConfig::plain();
        let workspace = create_fixture_workspace(&config);
        let php_files = std::fs::read_dir(workspace.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|ext| ext == "php").unwrap_or(false))
            .count();
        assert_eq!(php_files, config.file_count);
    }

    #[test]
    fn test_deterministic_output() {
        let config = FixtureConfig::plain();
        let ws1 = create_fixture_workspace(&config);
        let ws2 = create_fixture_workspace(&config);

        for i in 0..config.file_count {
            let filename = format!("file_{}.php", i);
            let content1 = std::fs::read_to_string(ws1.path().join(&filename)).unwrap();
            let content2 = std::fs::read_to_string(ws2.path().join(&filename)).unwrap();
            assert_eq!(content1, content2);
        }
    }

    #[test]
    fn test_symbol_convention_matches_generated_content() {
        let config = FixtureConfig::plain();
        let workspace = create_fixture_workspace(&config);
        let content = std::fs::read_to_string(workspace.path().join("file_0.php")).unwrap();
        assert_eq!(
            content.matches("function ").count(),
            config.symbols_per_file()
        );
    }

    #[test]
    fn test_vendor_layout() {
        let config = FixtureConfig::with_vendor();
        let workspace = create_fixture_workspace(&config);

        assert!(workspace.path().join("composer.json").exists());
        let lib = workspace.path().join("vendor/acme/util/lib_0.php");
        assert!(lib.exists());
        let test_file = workspace.path().join("vendor/acme/util/tests/LibTest_0.php");
        assert!(test_file.exists());
    }
}
