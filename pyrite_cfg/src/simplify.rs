//! Trivial-chain fusion.
//!
//! The builder freely creates single-purpose blocks (trampolines, branch
//! arms that immediately jump on). Whenever a block ends in a plain jump
//! to a block with no other predecessors, the two are straight-line code
//! and can be fused. This is the only cleanup the pass performs; it is
//! not an optimizer.

use crate::graph::Cfg;
use crate::lowered::LowStmtKind;

/// Fuse every `B -> B2` where the edge is a jump and `B2` has exactly one
/// predecessor. Returns the number of fusions performed; a second run on
/// the same graph performs none.
///
/// Surviving blocks are renumbered afterwards so indices stay equal to
/// positions in the block order.
pub fn simplify(cfg: &mut Cfg) -> usize {
    let mut fused = 0;
    let mut i = 0;
    while i < cfg.order().len() {
        let b = cfg.order()[i];
        loop {
            if cfg.block(b).successors().len() != 1 {
                break;
            }
            let b2 = cfg.block(b).successors()[0];
            if b2 == b || cfg.block(b2).predecessors().len() != 1 {
                break;
            }

            match &cfg
                .block(b)
                .body()
                .last()
                .expect("placed block has an empty body")
                .kind
            {
                LowStmtKind::Jump { .. } => {}
                LowStmtKind::Invoke { normal, exc, .. } => {
                    // A wrapped raise has both edges pointing at the same
                    // block; the invoke must stay a terminator.
                    debug_assert_eq!(normal, exc);
                    break;
                }
                other => unreachable!("single-successor block ends in {other:?}"),
            }

            cfg.fuse(b, b2);
            fused += 1;
        }
        i += 1;
    }

    cfg.renumber();
    fused
}
