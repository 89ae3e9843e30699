use serde::{Deserialize, Serialize};

use crate::ids::{EntityRef, NodeId};
use crate::timeline::Interval;
use crate::value::Data;

/// A resolved link fact: the leaf node plus every entity on its chain,
/// root first. This is what a link segment stores per qualifying fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkComposition {
    pub node: NodeId,
    pub entities: Vec<EntityRef>,
    pub begin: i64,
    pub end: i64,
    pub timestamp: i64,
    pub actor: String,
    pub data: Option<Data>,
}

impl LinkComposition {
    pub fn interval(&self) -> Interval {
        Interval::new(self.begin, self.end)
    }
}

pub fn encode_compositions(
    compositions: &[LinkComposition],
) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec(compositions)
}

pub fn decode_compositions(
    bytes: &[u8],
) -> Result<Vec<LinkComposition>, rmp_serde::decode::Error> {
    rmp_serde::from_slice(bytes)
}
