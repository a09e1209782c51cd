//! Storage node model.
//!
//! `NodeInfo` is the decoded network-map entry. `Node` is the read-only view
//! the placement engine works on: identity hash, stable index, the numeric
//! attributes it weights by and a string attribute map for filters.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::aggregator::WeightFunc;
use crate::error::Result;
use crate::hrw::{self, HrwHash};

/// Well-known attribute holding the node capacity.
pub const CAPACITY_ATTR: &str = "Capacity";
/// Well-known attribute holding the node storage price.
pub const PRICE_ATTR: &str = "Price";

/// Ordered group of nodes shared between selections.
pub type Nodes = Vec<Arc<Node>>;

/// Network state announced by a node.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    #[default]
    #[serde(rename = "UNSPECIFIED")]
    Unspecified,
    #[serde(rename = "ONLINE")]
    Online,
    #[serde(rename = "OFFLINE")]
    Offline,
}

/// A single `key = value` node attribute.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAttribute {
    pub key: String,
    pub value: String,
    /// Keys of the attributes this one is derived from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

impl NodeAttribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            parents: Vec::new(),
        }
    }
}

/// Node description as announced in the network map.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub state: NodeState,
    #[serde(default)]
    pub attributes: Vec<NodeAttribute>,
}

impl NodeInfo {
    /// Construct an online node with no addresses or attributes.
    pub fn new(public_key: impl Into<Vec<u8>>) -> Self {
        Self {
            public_key: public_key.into(),
            addresses: Vec::new(),
            state: NodeState::Online,
            attributes: Vec::new(),
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.addresses.push(address.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(NodeAttribute::new(key, value));
        self
    }

    /// Decode a JSON network-map snapshot (a list of node descriptions).
    pub fn decode_list(json: &str) -> Result<Vec<NodeInfo>> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Node as seen by the placement algorithm.
///
/// Built once per evaluation and read-only thereafter.
#[derive(Clone, Debug)]
pub struct Node {
    /// Hash of the public key, the node identity for HRW ranking.
    pub id: u64,
    /// Position in the source node list.
    pub index: usize,
    pub capacity: u64,
    pub price: u64,
    attrs: HashMap<String, String>,
    info: NodeInfo,
}

impl Node {
    /// Build the algorithm view of a decoded node.
    ///
    /// `Capacity` and `Price` that fail to parse read as zero; the raw
    /// strings stay in the attribute map either way.
    pub fn from_info(index: usize, info: NodeInfo) -> Self {
        let mut node = Self {
            id: hrw::hash(&info.public_key),
            index,
            capacity: 0,
            price: 0,
            attrs: HashMap::with_capacity(info.attributes.len()),
            info: NodeInfo::default(),
        };

        for attr in &info.attributes {
            match attr.key.as_str() {
                CAPACITY_ATTR => node.capacity = attr.value.parse().unwrap_or(0),
                PRICE_ATTR => node.price = attr.value.parse().unwrap_or(0),
                _ => {}
            }
            node.attrs.insert(attr.key.clone(), attr.value.clone());
        }

        node.info = info;
        node
    }

    /// Attribute value, or an empty string when the node lacks it.
    pub fn attribute(&self, key: &str) -> &str {
        self.attrs.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attrs
    }

    pub fn public_key(&self) -> &[u8] {
        &self.info.public_key
    }

    pub fn info(&self) -> &NodeInfo {
        &self.info
    }
}

impl HrwHash for Node {
    fn hrw_hash(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.index, hex::encode(&self.info.public_key))
    }
}

/// Convert decoded node descriptions, assigning indices in list order.
pub fn nodes_from_info(infos: impl IntoIterator<Item = NodeInfo>) -> Nodes {
    infos
        .into_iter()
        .enumerate()
        .map(|(index, info)| Arc::new(Node::from_info(index, info)))
        .collect()
}

/// Weight of every node, in order.
pub fn weights(nodes: &[Arc<Node>], wf: &WeightFunc) -> Vec<f64> {
    nodes.iter().map(|n| wf.weight(n)).collect()
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
