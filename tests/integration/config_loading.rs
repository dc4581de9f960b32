//! Layered configuration loading

use crate::integration::test_utils::with_isolated_env;
use movetree::cli::{CliError, RunContext};
use movetree::config::ConfigLoader;
use movetree::error::TreeError;
use movetree::types::PeerId;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_global_file_from_xdg_config_home() {
    let test_dir = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        let global = test_dir.path().join("xdg").join("movetree");
        fs::create_dir_all(&global).unwrap();
        fs::write(
            global.join("config.toml"),
            "[replica]\npeer_id = 12\npeers = [13]\n\n[logging]\nlevel = \"warn\"\n",
        )
        .unwrap();

        let workspace = test_dir.path().join("ws");
        fs::create_dir_all(&workspace).unwrap();
        let config = ConfigLoader::load(&workspace).unwrap();

        assert_eq!(config.replica.peer(), PeerId(12));
        assert_eq!(config.replica.peer_ids(), vec![PeerId(13)]);
        assert_eq!(config.logging.level, "warn");
    });
}

#[test]
fn test_environment_specific_workspace_file() {
    let test_dir = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        let workspace = test_dir.path().join("ws");
        let config_dir = workspace.join("config");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(
            config_dir.join("config.toml"),
            "[replica]\npeer_id = 2\npush_batch_limit = 10\n",
        )
        .unwrap();
        fs::write(config_dir.join("staging.toml"), "[replica]\npeer_id = 3\n").unwrap();

        std::env::set_var("MOVETREE_ENV", "staging");
        let config = ConfigLoader::load(&workspace);
        std::env::remove_var("MOVETREE_ENV");
        let config = config.unwrap();

        assert_eq!(config.replica.peer_id, 3);
        assert_eq!(config.replica.push_batch_limit, 10);
    });
}

#[test]
fn test_explicit_file_ignores_workspace() {
    let test_dir = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        let workspace = test_dir.path().join("ws");
        fs::create_dir_all(workspace.join("config")).unwrap();
        fs::write(
            workspace.join("config").join("config.toml"),
            "[replica]\npeer_id = 2\n",
        )
        .unwrap();

        let explicit = test_dir.path().join("replica.toml");
        fs::write(&explicit, "[replica]\npeers = [1]\n").unwrap();

        let config = ConfigLoader::load_from_file(&explicit).unwrap();
        assert_eq!(config.replica.peer_id, 1);
        assert_eq!(config.replica.peers, vec![1]);
    });
}

#[test]
fn test_invalid_replica_config_refuses_to_open() {
    let test_dir = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        let workspace = test_dir.path().join("ws");
        fs::create_dir_all(workspace.join("config")).unwrap();
        fs::write(
            workspace.join("config").join("config.toml"),
            "[replica]\npeer_id = 0\n",
        )
        .unwrap();

        let result = RunContext::new(workspace.clone(), None);
        assert!(matches!(result, Err(CliError::Tree(TreeError::Config(ref msg))) if msg.contains("peer_id")));
        assert!(!workspace.join(".movetree").exists());
    });
}
