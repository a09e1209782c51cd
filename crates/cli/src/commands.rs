//! Subcommands and their results.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Args, Subcommand};
use corelib::{Node, PlacementPolicy};
use placement::{validate_policy, Netmap, SelectionConfig};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve the nodes holding a container.
    Place(PlaceArgs),
    /// Resolve a container, then order its nodes for one object.
    Vectors(VectorsArgs),
    /// Check a policy for structural errors.
    Check(CheckArgs),
}

#[derive(Args, Debug)]
pub struct PlaceArgs {
    /// JSON array of node descriptors.
    #[arg(short, long)]
    pub netmap: PathBuf,

    /// JSON placement policy.
    #[arg(short, long)]
    pub policy: PathBuf,

    /// Container pivot.
    #[arg(short, long, default_value = "")]
    pub container: String,

    /// Decode pivots as hex instead of taking their UTF-8 bytes.
    #[arg(long)]
    pub hex: bool,
}

#[derive(Args, Debug)]
pub struct VectorsArgs {
    #[command(flatten)]
    pub place: PlaceArgs,

    /// Object pivot.
    #[arg(short, long)]
    pub object: String,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// JSON placement policy.
    #[arg(short, long)]
    pub policy: PathBuf,
}

/// One node in command output.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NodeView {
    pub index: usize,
    pub public_key: String,
}

impl From<&Arc<Node>> for NodeView {
    fn from(node: &Arc<Node>) -> Self {
        Self {
            index: node.index,
            public_key: hex::encode(node.public_key()),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CommandResult {
    /// Node lists, one per replica.
    Placement { replicas: Vec<Vec<NodeView>> },
    Valid,
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandResult::Placement { replicas } => {
                for (i, replica) in replicas.iter().enumerate() {
                    write!(f, "replica {i}:")?;
                    for node in replica {
                        write!(f, " #{} {}", node.index, node.public_key)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            }
            CommandResult::Valid => writeln!(f, "policy is valid"),
        }
    }
}

impl Command {
    pub fn execute(&self, config: &SelectionConfig) -> anyhow::Result<CommandResult> {
        match self {
            Command::Place(args) => {
                let (netmap, policy) = args.load()?;
                let pivot = decode_pivot(&args.container, args.hex)?;
                let nodes = netmap.get_container_nodes_with(config, &policy, &pivot)?;
                info!(replicas = nodes.replicas().len(), "container placed");
                Ok(placement_result(nodes.replicas()))
            }
            Command::Vectors(args) => {
                let (netmap, policy) = args.place.load()?;
                let container = decode_pivot(&args.place.container, args.place.hex)?;
                let object = decode_pivot(&args.object, args.place.hex)?;
                let nodes = netmap.get_container_nodes_with(config, &policy, &container)?;
                let vectors = netmap.get_placement_vectors(&nodes, &object);
                Ok(placement_result(&vectors))
            }
            Command::Check(args) => {
                let policy = read_policy(&args.policy)?;
                validate_policy(&policy)?;
                Ok(CommandResult::Valid)
            }
        }
    }
}

impl PlaceArgs {
    fn load(&self) -> anyhow::Result<(Netmap, PlacementPolicy)> {
        let json = fs::read_to_string(&self.netmap)
            .with_context(|| format!("reading netmap {}", self.netmap.display()))?;
        let netmap = Netmap::from_json(&json)
            .with_context(|| format!("decoding netmap {}", self.netmap.display()))?;
        debug!(nodes = netmap.len(), "netmap loaded");
        Ok((netmap, read_policy(&self.policy)?))
    }
}

fn read_policy(path: &Path) -> anyhow::Result<PlacementPolicy> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("reading policy {}", path.display()))?;
    PlacementPolicy::from_json(&json).with_context(|| format!("decoding policy {}", path.display()))
}

fn decode_pivot(pivot: &str, as_hex: bool) -> anyhow::Result<Vec<u8>> {
    if as_hex {
        hex::decode(pivot).with_context(|| format!("invalid hex pivot '{pivot}'"))
    } else {
        Ok(pivot.as_bytes().to_vec())
    }
}

fn placement_result(replicas: &[corelib::Nodes]) -> CommandResult {
    CommandResult::Placement {
        replicas: replicas
            .iter()
            .map(|replica| replica.iter().map(NodeView::from).collect())
            .collect(),
    }
}
