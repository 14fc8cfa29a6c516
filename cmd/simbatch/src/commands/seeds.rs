//! Seeds command implementation.

use anyhow::{Context, Result};
use simbatch_random::BatchRandomState;
use tracing::info;

/// Runs the seeds command.
pub fn run(seed: u64, span: u64, count: u64) -> Result<()> {
    info!("Deriving sub-seeds for master seed {} over {} batches", seed, span);

    for (batch_index, sub_seed) in sub_seeds(seed, span, count)? {
        println!("{batch_index}\t{sub_seed}");
    }
    Ok(())
}

/// Sub-seeds of the first `count` batches, capped at `span`.
fn sub_seeds(seed: u64, span: u64, count: u64) -> Result<Vec<(u64, u32)>> {
    let states = BatchRandomState::new(Some(seed), span)
        .with_context(|| format!("Invalid span: {span}"))?;

    (0..count.min(span))
        .map(|batch_index| -> Result<(u64, u32)> {
            let sub_seed = states
                .sub_seed(batch_index)?
                .with_context(|| "Seeded state has no sub-seed")?;
            Ok((batch_index, sub_seed))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use simbatch_random::{derive_sub_seeds, StreamState};

    #[test]
    fn matches_direct_derivation() {
        let listed = sub_seeds(123, 100, 100).unwrap();
        let direct = derive_sub_seeds(&StreamState::from_seed(123), 100).unwrap();
        assert_eq!(
            listed.iter().map(|(_, s)| *s).collect::<Vec<_>>(),
            direct
        );
    }

    #[test]
    fn count_is_capped_at_span() {
        assert_eq!(sub_seeds(1, 3, 10).unwrap().len(), 3);
    }

    #[test]
    fn zero_span_is_rejected() {
        assert!(sub_seeds(1, 0, 1).is_err());
    }
}
