//! CLI route: single route table and run context.

use crate::cli::output::CliError;
use crate::cli::parse::Commands;
use crate::cli::presentation::{format_log, format_ls, format_status, PeerStatus, StatusReport};
use crate::config::{ConfigLoader, MovetreeConfig};
use crate::error::TreeError;
use crate::op::{LogRecord, NodeMeta};
use crate::peers::{PeerDirectory, StaticPeers};
use crate::store::SledNodeStore;
use crate::tree::engine::{ApplyOutcome, TreeEngine};
use crate::tree::shared::SharedTree;
use crate::types::{NodeId, PeerId};
use crate::wire::{decode_lines, WireMessage};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

type Engine = TreeEngine<SledNodeStore, StaticPeers>;

/// Command name for logging (e.g. "mkdir", "export").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Mkdir { .. } => "mkdir",
        Commands::Touch { .. } => "touch",
        Commands::Ln { .. } => "ln",
        Commands::Mv { .. } => "mv",
        Commands::Rm { .. } => "rm",
        Commands::Ls { .. } => "ls",
        Commands::Log { .. } => "log",
        Commands::Export { .. } => "export",
        Commands::Import { .. } => "import",
        Commands::Ack { .. } => "ack",
        Commands::Bootstrap { .. } => "bootstrap",
        Commands::Status { .. } => "status",
    }
}

/// Runtime context for CLI execution: config and the replica's shared tree.
pub struct RunContext {
    tree: SharedTree<SledNodeStore, StaticPeers>,
    config: MovetreeConfig,
    workspace_root: PathBuf,
}

impl RunContext {
    /// Load config (from `config_path` alone if given), open the store and the engine.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, CliError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Self::with_config(workspace_root, config)
    }

    pub fn with_config(workspace_root: PathBuf, config: MovetreeConfig) -> Result<Self, CliError> {
        config.ensure_valid()?;

        let store_path = config.replica.resolve_store_path(&workspace_root);
        std::fs::create_dir_all(&store_path)?;
        let store = SledNodeStore::open(&store_path, config.replica.peer())?;
        let peers = StaticPeers::new(config.replica.peer(), config.replica.peer_ids());
        let engine = TreeEngine::new(store, peers)?;

        debug!(store = %store_path.display(), peer = %config.replica.peer(), "Opened replica");

        Ok(Self {
            tree: SharedTree::new(engine),
            config,
            workspace_root,
        })
    }

    pub fn tree(&self) -> &SharedTree<SledNodeStore, StaticPeers> {
        &self.tree
    }

    pub fn config(&self) -> &MovetreeConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, CliError> {
        info!(command = command_name(command), "Executing command");
        match command {
            Commands::Mkdir { path } => self.create(path, |name| NodeMeta::directory(name)),
            Commands::Touch { path, file_ref } => {
                self.create(path, |name| NodeMeta::file(name, *file_ref))
            }
            Commands::Ln { path, target } => {
                self.create(path, |name| NodeMeta::symlink(name, target.as_str()))
            }
            Commands::Mv { from, to } => self.handle_mv(from, to),
            Commands::Rm { path } => self.handle_rm(path),
            Commands::Ls {
                path,
                trash,
                format,
            } => self.handle_ls(path, *trash, format),
            Commands::Log { format } => {
                let engine = self.tree.global_r_lock();
                let records: Vec<LogRecord> = engine.log_records().cloned().collect();
                format_log(&records, format)
            }
            Commands::Export { peer, limit } => self.handle_export(PeerId(*peer), *limit),
            Commands::Import { input } => self.handle_import(input),
            Commands::Ack { peer, count } => self.handle_ack(PeerId(*peer), *count),
            Commands::Bootstrap { peer } => {
                let queued = self.tree.global_rw_lock().record_bootstrap_for(PeerId(*peer))?;
                self.save()?;
                Ok(format!("Queued {} ops for peer {}", queued, peer))
            }
            Commands::Status { format } => self.handle_status(format),
        }
    }

    fn save(&self) -> Result<(), CliError> {
        let mut engine = self.tree.global_rw_lock();
        engine.persist()?;
        engine.store().flush()?;
        Ok(())
    }

    fn create<F>(&self, path: &str, meta: F) -> Result<String, CliError>
    where
        F: FnOnce(&str) -> NodeMeta,
    {
        let id = {
            let mut engine = self.tree.global_rw_lock();
            let (parent, name) = resolve_parent(&engine, path)?;
            let id = engine.new_node_id()?;
            engine.move_node(parent, meta(&name), id)?;
            id
        };
        self.save()?;
        Ok(format!("Created /{} ({})", path.trim_matches('/'), id))
    }

    fn handle_mv(&self, from: &str, to: &str) -> Result<String, CliError> {
        {
            let mut engine = self.tree.global_rw_lock();
            let id = resolve(&engine, from)?;
            let meta = existing_meta(&engine, id, from)?;
            let (parent, name) = resolve_parent(&engine, to)?;
            engine.move_node(parent, meta.with_name(name), id)?;
        }
        self.save()?;
        Ok(format!(
            "Moved /{} to /{}",
            from.trim_matches('/'),
            to.trim_matches('/')
        ))
    }

    fn handle_rm(&self, path: &str) -> Result<String, CliError> {
        {
            let mut engine = self.tree.global_rw_lock();
            let id = resolve(&engine, path)?;
            let meta = existing_meta(&engine, id, path)?;
            engine.trash(meta, id)?;
        }
        self.save()?;
        Ok(format!("Removed /{}", path.trim_matches('/')))
    }

    fn handle_ls(&self, path: &str, trash: bool, format: &str) -> Result<String, CliError> {
        let engine = self.tree.global_r_lock();
        let start = if trash {
            NodeId::TRASH
        } else {
            resolve(&engine, path)?
        };
        let entries = engine.walk(start)?;
        format_ls(&entries, format)
    }

    fn handle_export(&self, peer: PeerId, limit: Option<usize>) -> Result<String, CliError> {
        let limit = limit.unwrap_or(self.config.replica.push_batch_limit);
        let engine = self.tree.global_r_lock();
        let from = engine.self_id();

        let pending = self.tree.outbox().pending_for(peer, limit);
        let messages: Vec<WireMessage> = if pending.is_empty() {
            engine.periodic_push(peer).into_iter().map(WireMessage::Push).collect()
        } else {
            pending
                .into_iter()
                .map(|op| WireMessage::Op { from, op })
                .collect()
        };

        let lines = messages
            .iter()
            .map(WireMessage::encode_line)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CliError::InvalidInput(e.to_string()))?;
        Ok(lines.join("\n"))
    }

    fn handle_import(&self, input: &Path) -> Result<String, CliError> {
        let text = if input == Path::new("-") {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        } else {
            std::fs::read_to_string(input)?
        };
        let messages = decode_lines(&text)
            .map_err(|(line, e)| CliError::InvalidInput(format!("line {}: {}", line, e)))?;

        let (mut applied, mut duplicates, mut pushes) = (0usize, 0usize, 0usize);
        {
            let mut engine = self.tree.global_rw_lock();
            for message in messages {
                match message {
                    WireMessage::Op { from, op } => match engine.apply_external_op(from, op)? {
                        ApplyOutcome::Applied => applied += 1,
                        ApplyOutcome::Duplicate => duplicates += 1,
                    },
                    WireMessage::Push(push) => {
                        engine.update_external_timestamp(push.from, push.timestamp)?;
                        pushes += 1;
                    }
                }
            }
        }
        self.save()?;
        Ok(format!(
            "Applied {} ops ({} duplicates, {} clock pushes)",
            applied, duplicates, pushes
        ))
    }

    fn handle_ack(&self, peer: PeerId, count: usize) -> Result<String, CliError> {
        let outbox = self.tree.outbox();
        let pending = outbox.pending_for(peer, count);
        for op in &pending {
            outbox.commit(peer, op)?;
        }
        self.save()?;
        Ok(format!(
            "Acknowledged {} ops for peer {} ({} still pending)",
            pending.len(),
            peer,
            outbox.pending_count(peer)
        ))
    }

    fn handle_status(&self, format: &str) -> Result<String, CliError> {
        let engine = self.tree.global_r_lock();
        let outbox = engine.outbox();
        let peers = engine
            .peers()
            .peers()
            .into_iter()
            .map(|p| PeerStatus {
                peer_id: p.0,
                high_water: engine.peer_timestamp(p),
                pending: outbox.pending_count(p),
            })
            .collect();
        let report = StatusReport {
            peer_id: engine.self_id().0,
            clock: engine.clock().current(),
            log_len: engine.log_len(),
            peers,
        };
        format_status(&report, format)
    }
}

/// Non-empty components of a slash-separated path.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

fn resolve(engine: &Engine, path: &str) -> Result<NodeId, CliError> {
    let names = split_path(path);
    engine
        .traverse(&names)?
        .ok_or_else(|| CliError::PathNotFound(names.join("/")))
}

/// Existing parent of `path` plus the final component.
fn resolve_parent(engine: &Engine, path: &str) -> Result<(NodeId, String), CliError> {
    let names = split_path(path);
    let (name, parents) = names
        .split_last()
        .ok_or_else(|| CliError::InvalidPath(path.to_string()))?;
    let parent = engine
        .traverse(parents)?
        .ok_or_else(|| CliError::PathNotFound(parents.join("/")))?;
    Ok((parent, name.to_string()))
}

fn existing_meta(engine: &Engine, id: NodeId, path: &str) -> Result<NodeMeta, CliError> {
    engine
        .get_node(id)?
        .and_then(|n| n.meta)
        .ok_or_else(|| {
            if id.is_reserved() {
                CliError::Tree(TreeError::ReservedNode(id))
            } else {
                CliError::InvalidPath(path.to_string())
            }
        })
}
