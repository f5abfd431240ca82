//! Seeded noise source for synthetic sample buffers

use rand::prelude::*;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, Normal};

/// Thermal noise and burst decisions for the simulated radio
///
/// Seed 0 draws from OS entropy; any other seed replays the same buffers.
#[derive(Clone)]
pub struct NoiseGenerator {
    rng: SmallRng,
}

impl NoiseGenerator {
    pub fn new(seed: u64) -> Self {
        let rng = match seed {
            0 => SmallRng::from_entropy(),
            s => SmallRng::seed_from_u64(s),
        };
        Self { rng }
    }

    /// Bernoulli draw; `probability` is clamped to [0, 1]
    #[inline]
    pub fn chance(&mut self, probability: f32) -> bool {
        self.rng.gen_bool(probability.clamp(0.0, 1.0) as f64)
    }

    /// Overwrite `buf` with little-endian i16 samples of N(0, stddev)
    pub fn fill_i16(&mut self, buf: &mut [u8], stddev: f32) {
        let normal = match Normal::new(0.0f32, stddev) {
            Ok(normal) if stddev > 0.0 => normal,
            _ => {
                buf.fill(0);
                return;
            }
        };
        for chunk in buf.chunks_exact_mut(2) {
            let v = saturate(normal.sample(&mut self.rng));
            chunk.copy_from_slice(&v.to_le_bytes());
        }
    }
}

/// Round and clamp to the i16 ADC range
#[inline]
pub fn saturate(v: f32) -> i16 {
    v.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(seed: u64) -> Vec<u8> {
        let mut noise = NoiseGenerator::new(seed);
        let mut buf = vec![0u8; 256];
        noise.fill_i16(&mut buf, 100.0);
        buf
    }

    #[test]
    fn test_same_seed_same_buffer() {
        assert_eq!(buffer(7), buffer(7));
        assert_ne!(buffer(7), buffer(8));
    }

    #[test]
    fn test_zero_stddev_fills_zeros() {
        let mut noise = NoiseGenerator::new(42);
        let mut buf = vec![0xAAu8; 64];
        noise.fill_i16(&mut buf, 0.0);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_chance_probability() {
        let mut noise = NoiseGenerator::new(42);
        let hits = (0..10_000).filter(|_| noise.chance(0.3)).count();
        assert!((2_500..3_500).contains(&hits));

        assert!(!noise.chance(0.0));
        assert!(noise.chance(1.5));
    }

    #[test]
    fn test_saturate_clamps() {
        assert_eq!(saturate(1e9), i16::MAX);
        assert_eq!(saturate(-1e9), i16::MIN);
        assert_eq!(saturate(12.4), 12);
    }
}
