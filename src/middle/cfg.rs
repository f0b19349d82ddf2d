//! The control-flow graph shape shared by the source CFG ([`super::source_cfg`])
//! and the target CFG ([`super::ir`]).
//!
//! A [`Cfg`] is generic over its block payload so the same block/edge
//! bookkeeping (deterministic ids, out-edges labeled by [`EdgeLabel`], a
//! unique entry and exit) serves both the pre-translation source graph and
//! the post-translation virtual-register graph. Block ids are assigned in
//! creation order by [`CfgBuilder`], which is what makes every later phase's
//! iteration order (and hence its output) deterministic.

use crate::common::Map;

/// A block identifier, stable for the lifetime of a single [`Cfg`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BlockId(pub usize);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The label on a control-flow edge.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EdgeLabel {
    Unconditional,
    True,
    False,
}

/// A control-flow graph: blocks keyed by id, with labeled out-edges, a
/// unique entry block, and a unique exit block.
#[derive(Clone, Debug)]
pub struct Cfg<B> {
    pub blocks: Map<BlockId, B>,
    pub edges: Map<BlockId, Vec<(BlockId, EdgeLabel)>>,
    pub entry: BlockId,
    pub exit: BlockId,
}

impl<B> Cfg<B> {
    /// Out-edges of `id`, in the order they were added.
    pub fn successors(&self, id: BlockId) -> &[(BlockId, EdgeLabel)] {
        self.edges.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every block that has an edge into `id`.
    ///
    /// Not indexed: the CFGs this compiler builds are small enough (tens of
    /// blocks for any program that fits in one file) that a linear scan per
    /// caller is simpler than keeping a second, invertible edge map in sync.
    pub fn predecessors(&self, id: BlockId) -> Vec<BlockId> {
        self.edges
            .iter()
            .filter(|(_, outs)| outs.iter().any(|&(to, _)| to == id))
            .map(|(&from, _)| from)
            .collect()
    }

    /// Block ids in ascending (creation) order.
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.blocks.keys().copied().collect()
    }
}

/// Accumulates blocks and edges while the CFG is being constructed.
/// Block ids are handed out in the order `add_block` is called.
pub struct CfgBuilder<B> {
    blocks: Map<BlockId, B>,
    edges: Map<BlockId, Vec<(BlockId, EdgeLabel)>>,
    next_id: usize,
}

impl<B> Default for CfgBuilder<B> {
    fn default() -> Self {
        CfgBuilder {
            blocks: Map::new(),
            edges: Map::new(),
            next_id: 0,
        }
    }
}

impl<B> CfgBuilder<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_block(&mut self, data: B) -> BlockId {
        let id = BlockId(self.next_id);
        self.next_id += 1;
        self.blocks.insert(id, data);
        id
    }

    pub fn add_edge(&mut self, from: BlockId, label: EdgeLabel, to: BlockId) {
        self.edges.entry(from).or_default().push((to, label));
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut B {
        self.blocks.get_mut(&id).expect("block id must exist")
    }

    pub fn finish(self, entry: BlockId, exit: BlockId) -> Cfg<B> {
        Cfg {
            blocks: self.blocks,
            edges: self.edges,
            entry,
            exit,
        }
    }
}
