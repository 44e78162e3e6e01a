use perimetry_core::{Eye, LuminanceLabel, SizeClass};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::config::PerimetryConfig;

/// One meridian with its normative threshold eccentricity per eye.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestVector {
    pub longitude_deg: u16,
    pub normative_right: f64,
    pub normative_left: f64,
}

impl TestVector {
    pub fn new(longitude_deg: u16, normative_right: f64, normative_left: f64) -> Self {
        Self {
            longitude_deg,
            normative_right,
            normative_left,
        }
    }

    pub fn normative(&self, eye: Eye) -> f64 {
        match eye {
            Eye::Right => self.normative_right,
            Eye::Left => self.normative_left,
        }
    }

    /// Copy of this vector labelled for one scheduling pass.
    pub fn tagged(&self, size: SizeClass, luminance: LuminanceLabel) -> SequenceEntry {
        SequenceEntry {
            vector: *self,
            size,
            luminance,
        }
    }
}

/// A single sweep in the test sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceEntry {
    pub vector: TestVector,
    pub size: SizeClass,
    pub luminance: LuminanceLabel,
}

impl SequenceEntry {
    pub fn longitude(&self) -> u16 {
        self.vector.longitude_deg
    }

    pub fn same_stimulus(&self, size: SizeClass, luminance: LuminanceLabel) -> bool {
        self.size == size && self.luminance == luminance
    }
}

/// Builds the flat sweep order: sizes largest first, configured luminances in
/// order, `iterations_per_size` repetitions, each block holding every meridian
/// (shuffled per block when randomization is on).
pub fn build_sequence<R: Rng + ?Sized>(
    config: &PerimetryConfig,
    rng: &mut R,
) -> Vec<SequenceEntry> {
    let mut sequence = Vec::new();
    for size in config.enabled_sizes() {
        for &luminance in config.luminances_for(size) {
            for _ in 0..config.iterations_per_size {
                let mut block = config.vectors.clone();
                if config.randomize {
                    block.shuffle(rng);
                }
                sequence.extend(block.iter().map(|v| v.tagged(size, luminance)));
            }
        }
    }
    sequence
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::BTreeMap;

    fn l(s: &str) -> LuminanceLabel {
        s.parse().unwrap()
    }

    fn config(randomize: bool) -> PerimetryConfig {
        PerimetryConfig {
            randomize,
            iterations_per_size: 2,
            luminances: BTreeMap::from([
                (SizeClass::I, vec![l("3e"), l("2e")]),
                (SizeClass::V, vec![l("4e")]),
            ]),
            vectors: vec![
                TestVector::new(0, 80.0, 70.0),
                TestVector::new(90, 60.0, 55.0),
                TestVector::new(180, 70.0, 85.0),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_deterministic_order_without_randomization() {
        let config = config(false);
        let a = build_sequence(&config, &mut StdRng::seed_from_u64(1));
        let b = build_sequence(&config, &mut StdRng::seed_from_u64(2));
        assert_eq!(a, b);
        // 1 + 2 (size, luminance) blocks × 2 repetitions × 3 meridians
        assert_eq!(a.len(), 18);

        let stimuli: Vec<(SizeClass, String)> = a
            .iter()
            .step_by(3)
            .map(|e| (e.size, e.luminance.to_string()))
            .collect();
        assert_eq!(
            stimuli,
            vec![
                (SizeClass::V, "4e".to_string()),
                (SizeClass::V, "4e".to_string()),
                (SizeClass::I, "3e".to_string()),
                (SizeClass::I, "3e".to_string()),
                (SizeClass::I, "2e".to_string()),
                (SizeClass::I, "2e".to_string()),
            ]
        );
        for block in a.chunks(3) {
            let longitudes: Vec<u16> = block.iter().map(SequenceEntry::longitude).collect();
            assert_eq!(longitudes, vec![0, 90, 180]);
        }
    }

    #[test]
    fn test_shuffle_stays_inside_blocks() {
        let config = config(true);
        let sequence = build_sequence(&config, &mut StdRng::seed_from_u64(7));
        assert_eq!(sequence.len(), 18);
        for block in sequence.chunks(3) {
            let mut longitudes: Vec<u16> = block.iter().map(SequenceEntry::longitude).collect();
            longitudes.sort();
            assert_eq!(longitudes, vec![0, 90, 180]);
            assert!(block.iter().all(|e| e.same_stimulus(block[0].size, block[0].luminance)));
        }
    }

    #[test]
    fn test_normative_per_eye() {
        let vector = TestVector::new(30, 80.0, 70.0);
        assert_eq!(vector.normative(Eye::Right), 80.0);
        assert_eq!(vector.normative(Eye::Left), 70.0);
        let entry = vector.tagged(SizeClass::III, l("3e"));
        assert_eq!(entry.longitude(), 30);
        assert_eq!(entry.size, SizeClass::III);
    }
}
