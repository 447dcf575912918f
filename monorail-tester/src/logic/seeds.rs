use anyhow::{Context, Result, bail};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Resolve CLI seed tokens into concrete seeds.
///
/// Supports literal integers and `sweep:N`, which expands to `N` seeds drawn
/// from a stream keyed on `N` so the same sweep always yields the same seeds.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<u64>> {
    let mut seeds = Vec::new();
    for token in tokens {
        if token.is_empty() {
            continue;
        }

        if let Some(count) = token.strip_prefix("sweep:") {
            let count: u64 = count
                .parse()
                .with_context(|| format!("invalid sweep size in '{token}'"))?;
            let mut rng = ChaCha8Rng::seed_from_u64(count);
            seeds.extend((0..count).map(|_| rng.r#gen::<u64>()));
            continue;
        }

        if let Ok(value) = token.parse::<u64>() {
            seeds.push(value);
            continue;
        }

        if let Ok(value) = token.parse::<i64>() {
            seeds.push(value.unsigned_abs());
            continue;
        }

        bail!("unrecognised seed '{token}'");
    }

    if seeds.is_empty() {
        bail!("no seeds given");
    }
    Ok(seeds)
}
