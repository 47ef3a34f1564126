//! Configuration loading and precedence tests

use atlas_config::loader::{CONFIG_FILE_NAME, ENV_CACHE_SIGNATURES, ENV_ISOLATE, ENV_LAZY_BINDING};
use atlas_config::{ConfigLoader, NfiConfig};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn create_config_file(dir: &Path, content: &str) -> PathBuf {
    let config_path = dir.join(CONFIG_FILE_NAME);
    fs::write(&config_path, content).unwrap();
    config_path
}

fn loader_without_global(temp_dir: &TempDir) -> ConfigLoader {
    ConfigLoader::with_global_config_path(temp_dir.path().join("missing-global.toml"))
}

// ============================================================================
// Config Loading Tests
// ============================================================================

#[test]
#[serial]
fn test_load_when_no_config_exists() {
    let temp_dir = TempDir::new().unwrap();

    let mut loader = loader_without_global(&temp_dir);
    let config = loader.load_from_directory(temp_dir.path()).unwrap();

    assert!(!config.is_project());
    assert!(config.nfi.cache_signatures());
    assert!(config.nfi.lazy_binding());
}

#[test]
#[serial]
fn test_load_with_empty_config() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "");

    let mut loader = loader_without_global(&temp_dir);
    let config = loader.load_from_directory(temp_dir.path()).unwrap();

    // Empty config is valid (all fields optional)
    assert!(config.is_project());
    assert_eq!(config.nfi, NfiConfig::default());
}

#[test]
#[serial]
fn test_load_from_nested_subdirectory() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "[signatures]\ncache = false\n");

    let nested = temp_dir.path().join("a").join("b");
    fs::create_dir_all(&nested).unwrap();

    let mut loader = loader_without_global(&temp_dir);
    let config = loader.load_from_directory(&nested).unwrap();

    assert!(!config.nfi.cache_signatures());
    assert_eq!(config.project_root(), Some(temp_dir.path()));
}

#[test]
#[serial]
fn test_load_from_specific_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(temp_dir.path(), "[loader]\nlazy_binding = false\n");

    let mut loader = loader_without_global(&temp_dir);
    let config = loader.load_from_file(&path).unwrap();

    assert!(!config.nfi.lazy_binding());
}

// ============================================================================
// Invalid Config Tests
// ============================================================================

#[test]
#[serial]
fn test_invalid_toml_syntax() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "[signatures\ncache = ");

    let mut loader = loader_without_global(&temp_dir);
    assert!(loader.load_from_directory(temp_dir.path()).is_err());
}

#[test]
#[serial]
fn test_unknown_section_rejected() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "[closures]\npool = 4\n");

    let mut loader = loader_without_global(&temp_dir);
    assert!(loader.load_from_directory(temp_dir.path()).is_err());
}

#[test]
#[serial]
fn test_wrong_value_type_rejected() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "[signatures]\ncache = \"sometimes\"\n");

    let mut loader = loader_without_global(&temp_dir);
    assert!(loader.load_from_directory(temp_dir.path()).is_err());
}

#[test]
fn test_missing_specific_file() {
    let temp_dir = TempDir::new().unwrap();
    let result = NfiConfig::load_from_file(&temp_dir.path().join("absent.toml"));
    assert!(matches!(result, Err(atlas_config::ConfigError::NotFound(_))));
}

// ============================================================================
// Precedence Tests
// ============================================================================

#[rstest]
#[case::true_word("true", true)]
#[case::one("1", true)]
#[case::yes_upper("YES", true)]
#[case::false_word("false", false)]
#[case::garbage("maybe", false)]
#[serial]
fn test_env_override_cache_signatures(#[case] raw: &str, #[case] expected: bool) {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "[signatures]\ncache = true\n");

    env::set_var(ENV_CACHE_SIGNATURES, raw);
    let mut loader = loader_without_global(&temp_dir);
    let config = loader.load_from_directory(temp_dir.path()).unwrap();
    env::remove_var(ENV_CACHE_SIGNATURES);

    assert_eq!(config.nfi.cache_signatures(), expected);
}

#[test]
#[serial]
fn test_env_override_loader_flags() {
    let temp_dir = TempDir::new().unwrap();

    env::set_var(ENV_ISOLATE, "1");
    env::set_var(ENV_LAZY_BINDING, "no");
    let mut loader = loader_without_global(&temp_dir);
    let config = loader.load_from_directory(temp_dir.path()).unwrap();
    env::remove_var(ENV_ISOLATE);
    env::remove_var(ENV_LAZY_BINDING);

    assert!(config.nfi.isolate_libraries());
    assert!(!config.nfi.lazy_binding());
}

#[test]
#[serial]
fn test_global_then_project_precedence() {
    let temp_dir = TempDir::new().unwrap();
    let global = temp_dir.path().join("global.toml");
    fs::write(
        &global,
        "[signatures]\ncache = false\n[loader]\nsearch_paths = [\"/g\"]\n",
    )
    .unwrap();

    let project = temp_dir.path().join("project");
    fs::create_dir(&project).unwrap();
    create_config_file(&project, "[loader]\nsearch_paths = [\"/p\"]\n");

    let mut loader = ConfigLoader::with_global_config_path(global);
    let config = loader.load_from_directory(&project).unwrap();

    assert!(!config.nfi.cache_signatures());
    assert_eq!(
        config.nfi.search_paths(),
        &[PathBuf::from("/p"), PathBuf::from("/g")]
    );
}
