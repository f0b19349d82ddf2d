//! A single generic fixpoint solver serving both the forward "must"
//! analysis (definite assignment) and the backward "may" analysis
//! (liveness). Both are monotone dataflow problems over a lattice with a
//! meet operator; the only differences are the direction of flow, the
//! meet itself, and which value sits at the fixed boundary block.

use crate::common::Map;

use super::cfg::{BlockId, Cfg};

pub enum Direction {
    Forward,
    Backward,
}

/// A dataflow problem: the lattice value type `V`, how to meet two facts,
/// how a block transforms an incoming fact into an outgoing one, and the
/// boundary conditions that make the fixpoint well-defined.
pub trait Problem<B> {
    type Value: Clone + PartialEq;

    fn direction(&self) -> Direction;

    /// The value fixed at the unique boundary block (`entry` for a forward
    /// problem, `exit` for a backward one).
    fn boundary_value(&self) -> Self::Value;

    /// The value assigned to every non-boundary block before the first
    /// iteration. This doubles as the meet-of-zero-operands identity: a
    /// block with no predecessors (forward) or successors (backward) other
    /// than none at all still needs a well-defined input fact, and this is
    /// it.
    fn non_boundary_init(&self) -> Self::Value;

    fn meet(&self, values: &[&Self::Value]) -> Self::Value;

    /// Compute the outgoing fact for `block` given its incoming fact.
    fn transfer(&self, block: &B, input: &Self::Value) -> Self::Value;
}

/// The solved facts for a single block: the fact flowing in, and the fact
/// flowing out, relative to the problem's direction (for a forward
/// problem, "in" is the entry-of-block fact; for a backward problem, "in"
/// is still named `in_fact`/`out_fact` but `out_fact` is the one nearer
/// the block's entry in program order — callers index by `BlockId` and
/// pick the field they mean by name, so this never needs to be explained
/// at the call site).
#[derive(Clone)]
pub struct BlockFacts<V> {
    pub in_fact: V,
    pub out_fact: V,
}

/// Iterate `transfer`/`meet` to a fixpoint. `P::Value` must have no
/// infinite strictly-ascending/descending chains for this to terminate;
/// both analyses in this compiler use finite power-set lattices, so it
/// always does.
pub fn solve<B, P: Problem<B>>(cfg: &Cfg<B>, problem: &P) -> Map<BlockId, BlockFacts<P::Value>> {
    let ids = cfg.block_ids();
    let boundary = match problem.direction() {
        Direction::Forward => cfg.entry,
        Direction::Backward => cfg.exit,
    };

    let mut facts: Map<BlockId, BlockFacts<P::Value>> = Map::new();
    for &id in &ids {
        let init = if id == boundary {
            problem.boundary_value()
        } else {
            problem.non_boundary_init()
        };
        facts.insert(
            id,
            BlockFacts {
                in_fact: init.clone(),
                out_fact: init,
            },
        );
    }

    let mut changed = true;
    while changed {
        changed = false;
        for &id in &ids {
            let incoming_facts = incoming(cfg, problem, &facts, id, boundary);
            let new_in = if id == boundary {
                problem.boundary_value()
            } else if incoming_facts.is_empty() {
                problem.non_boundary_init()
            } else {
                let refs: Vec<&P::Value> = incoming_facts.iter().collect();
                problem.meet(&refs)
            };

            let new_out = problem.transfer(&cfg.blocks[&id], &new_in);

            let entry = facts.get_mut(&id).expect("every block has facts");
            if entry.in_fact != new_in || entry.out_fact != new_out {
                changed = true;
            }
            entry.in_fact = new_in;
            entry.out_fact = new_out;
        }
    }

    facts
}

/// The facts flowing into `id` from its upstream neighbors (predecessors
/// for a forward problem, successors for a backward one), read from each
/// neighbor's relevant previously-solved fact.
fn incoming<B, P: Problem<B>>(
    cfg: &Cfg<B>,
    problem: &P,
    facts: &Map<BlockId, BlockFacts<P::Value>>,
    id: BlockId,
    boundary: BlockId,
) -> Vec<P::Value> {
    if id == boundary {
        return Vec::new();
    }
    match problem.direction() {
        Direction::Forward => cfg
            .predecessors(id)
            .into_iter()
            .map(|p| facts[&p].out_fact.clone())
            .collect(),
        Direction::Backward => cfg
            .successors(id)
            .iter()
            .map(|&(s, _)| facts[&s].out_fact.clone())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Set;
    use crate::middle::cfg::{CfgBuilder, EdgeLabel};

    /// A minimal forward "must be >= n" counting problem used only to
    /// exercise the solver's plumbing independent of the real analyses.
    struct Reaches;

    impl Problem<u32> for Reaches {
        type Value = Set<u32>;

        fn direction(&self) -> Direction {
            Direction::Forward
        }
        fn boundary_value(&self) -> Set<u32> {
            Set::from([0])
        }
        fn non_boundary_init(&self) -> Set<u32> {
            Set::new()
        }
        fn meet(&self, values: &[&Set<u32>]) -> Set<u32> {
            values.iter().fold(Set::new(), |mut acc, v| {
                acc.extend(v.iter().copied());
                acc
            })
        }
        fn transfer(&self, block: &u32, input: &Set<u32>) -> Set<u32> {
            let mut out = input.clone();
            out.insert(*block);
            out
        }
    }

    #[test]
    fn linear_chain_propagates_forward() {
        let mut b: CfgBuilder<u32> = CfgBuilder::new();
        let n0 = b.add_block(10);
        let n1 = b.add_block(11);
        let n2 = b.add_block(12);
        b.add_edge(n0, EdgeLabel::Unconditional, n1);
        b.add_edge(n1, EdgeLabel::Unconditional, n2);
        let cfg = b.finish(n0, n2);

        let facts = solve(&cfg, &Reaches);
        assert_eq!(facts[&n2].out_fact, Set::from([0, 10, 11, 12]));
        assert_eq!(facts[&n0].in_fact, Set::from([0]));
    }

    #[test]
    fn diamond_meets_both_branches() {
        let mut b: CfgBuilder<u32> = CfgBuilder::new();
        let n0 = b.add_block(1);
        let n1 = b.add_block(2);
        let n2 = b.add_block(3);
        let n3 = b.add_block(4);
        b.add_edge(n0, EdgeLabel::True, n1);
        b.add_edge(n0, EdgeLabel::False, n2);
        b.add_edge(n1, EdgeLabel::Unconditional, n3);
        b.add_edge(n2, EdgeLabel::Unconditional, n3);
        let cfg = b.finish(n0, n3);

        let facts = solve(&cfg, &Reaches);
        assert!(facts[&n3].in_fact.contains(&1));
        assert!(facts[&n3].in_fact.contains(&2));
    }
}
