use anyhow::{anyhow, Result};
use rand::distributions::Distribution;
use rand::Rng;
use zipf::ZipfDistribution;

/// An iterator that draws from *[0, n)* with a Zipfian distribution.
///
/// This iterator returns integers from *[0, n)*, where the probability of
/// each integer follows a Zipfian distribution.
///
/// This generator can be used to draw words from a vocabulary sorted by
/// descending frequency. Since the token frequencies (presumably) have a
/// Zipfian distribution, this will pick a token with a probability that
/// is proportional to its frequency.
#[derive(Clone)]
pub struct ZipfRangeGenerator<R> {
    rng: R,
    dist: ZipfDistribution,
}

impl<R> ZipfRangeGenerator<R>
where
    R: Rng,
{
    /// Construct a generator with the given Zipf exponent.
    ///
    /// This is s in *f(k) = 1 / (k^s H_{N, s})*.
    pub fn new_with_exponent(rng: R, upper: usize, exponent: f64) -> Result<Self> {
        let dist = ZipfDistribution::new(upper, exponent).map_err(|_| {
            anyhow!(
                "Cannot create Zipf distribution with {} elements and exponent {}",
                upper,
                exponent
            )
        })?;

        Ok(ZipfRangeGenerator { rng, dist })
    }
}

impl<R> Iterator for ZipfRangeGenerator<R>
where
    R: Rng,
{
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let r = self.dist.sample(&mut self.rng);
        Some(r - 1)
    }
}
