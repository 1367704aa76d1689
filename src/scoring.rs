//! Interface to an audio aesthetics scorer.
//!
//! The scorer itself (a WavLM encoder with one projection head per axis)
//! lives outside this crate; only batch validation, the axis set and the
//! target normalisation are defined here.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Aesthetic axes predicted per clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Axis {
    /// Content enjoyment.
    CE,
    /// Content usefulness.
    CU,
    /// Production complexity.
    PC,
    /// Production quality.
    PQ,
}

impl Axis {
    pub const ALL: [Axis; 4] = [Axis::CE, Axis::CU, Axis::PC, Axis::PQ];

    pub fn code(self) -> &'static str {
        match self {
            Axis::CE => "CE",
            Axis::CU => "CU",
            Axis::PC => "PC",
            Axis::PQ => "PQ",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Axis::CE => "content enjoyment",
            Axis::CU => "content usefulness",
            Axis::PC => "production complexity",
            Axis::PQ => "production quality",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One score per axis for a single clip.
pub type AxisScores = BTreeMap<Axis, f32>;

#[derive(Debug, Error, PartialEq)]
pub enum ScoringError {
    #[error("empty batch")]
    EmptyBatch,
    #[error("mask has {masks} rows for {waves} waveforms")]
    MaskCount { masks: usize, waves: usize },
    #[error("item {item}: mask length {mask} does not match {samples} samples")]
    MaskLength {
        item: usize,
        mask: usize,
        samples: usize,
    },
    #[error("item {item}: waveform length {len} differs from batch length {expected}")]
    Ragged {
        item: usize,
        len: usize,
        expected: usize,
    },
    #[error("scorer failed: {0}")]
    Model(String),
}

/// Mono waveforms of equal length with an optional validity mask.
///
/// `mask[i][t]` is `true` where sample `t` of item `i` is real audio and
/// `false` where it is padding.
#[derive(Debug, Clone)]
pub struct WaveformBatch {
    waves: Vec<Vec<f32>>,
    mask: Option<Vec<Vec<bool>>>,
}

impl WaveformBatch {
    pub fn new(waves: Vec<Vec<f32>>, mask: Option<Vec<Vec<bool>>>) -> Result<Self, ScoringError> {
        let expected = waves.first().ok_or(ScoringError::EmptyBatch)?.len();
        for (item, wave) in waves.iter().enumerate() {
            if wave.len() != expected {
                return Err(ScoringError::Ragged {
                    item,
                    len: wave.len(),
                    expected,
                });
            }
        }
        if let Some(mask) = &mask {
            if mask.len() != waves.len() {
                return Err(ScoringError::MaskCount {
                    masks: mask.len(),
                    waves: waves.len(),
                });
            }
            for (item, row) in mask.iter().enumerate() {
                if row.len() != expected {
                    return Err(ScoringError::MaskLength {
                        item,
                        mask: row.len(),
                        samples: expected,
                    });
                }
            }
        }
        Ok(Self { waves, mask })
    }

    /// Zero-pad clips of different lengths to the longest one, masking the
    /// padding.
    pub fn padded(clips: Vec<Vec<f32>>) -> Result<Self, ScoringError> {
        let longest = clips.iter().map(Vec::len).max().ok_or(ScoringError::EmptyBatch)?;
        let mut waves = Vec::with_capacity(clips.len());
        let mut mask = Vec::with_capacity(clips.len());
        for mut clip in clips {
            let len = clip.len();
            clip.resize(longest, 0.0);
            waves.push(clip);
            mask.push((0..longest).map(|t| t < len).collect());
        }
        Self::new(waves, Some(mask))
    }

    pub fn len(&self) -> usize {
        self.waves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waves.is_empty()
    }

    pub fn waves(&self) -> &[Vec<f32>] {
        &self.waves
    }

    pub fn mask(&self) -> Option<&[Vec<bool>]> {
        self.mask.as_deref()
    }

    /// Number of real samples in item `i`.
    pub fn valid_len(&self, i: usize) -> usize {
        match &self.mask {
            Some(mask) => mask[i].iter().filter(|v| **v).count(),
            None => self.waves[i].len(),
        }
    }
}

/// Affine normalisation applied to training targets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetTransform {
    pub mean: f32,
    pub std: f32,
}

impl TargetTransform {
    pub fn transform(&self, x: f32) -> f32 {
        (x - self.mean) / self.std
    }

    pub fn inverse(&self, x: f32) -> f32 {
        x * self.std + self.mean
    }
}

/// Map raw model outputs back to the target scale, leaving axes without a
/// transform untouched.
pub fn denormalize(scores: &AxisScores, transforms: &BTreeMap<Axis, TargetTransform>) -> AxisScores {
    scores
        .iter()
        .map(|(axis, value)| {
            let value = transforms.get(axis).map_or(*value, |t| t.inverse(*value));
            (*axis, value)
        })
        .collect()
}

/// Scores batches of waveforms on every [`Axis`].
pub trait AestheticsScorer {
    /// One [`AxisScores`] per batch item, in batch order.
    fn score(&self, batch: &WaveformBatch) -> Result<Vec<AxisScores>, ScoringError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scores every axis with the mean absolute amplitude of the valid samples.
    struct LoudnessScorer;

    impl AestheticsScorer for LoudnessScorer {
        fn score(&self, batch: &WaveformBatch) -> Result<Vec<AxisScores>, ScoringError> {
            Ok((0..batch.len())
                .map(|i| {
                    let n = batch.valid_len(i).max(1);
                    let sum: f32 = batch.waves()[i][..batch.valid_len(i)]
                        .iter()
                        .map(|s| s.abs())
                        .sum();
                    Axis::ALL.iter().map(|a| (*a, sum / n as f32)).collect()
                })
                .collect())
        }
    }

    #[test]
    fn padding_masks_short_clips() {
        let batch = WaveformBatch::padded(vec![vec![1.0; 4], vec![1.0; 2]]).unwrap();
        assert_eq!(batch.waves()[1], vec![1.0, 1.0, 0.0, 0.0]);
        assert_eq!(batch.valid_len(0), 4);
        assert_eq!(batch.valid_len(1), 2);

        let scores = LoudnessScorer.score(&batch).unwrap();
        assert_eq!(scores[1][&Axis::PQ], 1.0);
    }

    #[test]
    fn rejects_malformed_batches() {
        assert_eq!(WaveformBatch::new(vec![], None).unwrap_err(), ScoringError::EmptyBatch);
        assert!(matches!(
            WaveformBatch::new(vec![vec![0.0; 3], vec![0.0; 2]], None),
            Err(ScoringError::Ragged { item: 1, .. })
        ));
        assert!(matches!(
            WaveformBatch::new(vec![vec![0.0; 3]], Some(vec![vec![true; 2]])),
            Err(ScoringError::MaskLength { item: 0, .. })
        ));
    }

    #[test]
    fn transform_round_trip_and_denormalize() {
        let t = TargetTransform { mean: 5.0, std: 2.0 };
        assert_eq!(t.transform(7.0), 1.0);
        assert_eq!(t.inverse(1.0), 7.0);

        let raw: AxisScores = [(Axis::CE, 1.0), (Axis::PQ, 0.5)].into_iter().collect();
        let transforms = [(Axis::CE, t)].into_iter().collect();
        let scores = denormalize(&raw, &transforms);
        assert_eq!(scores[&Axis::CE], 7.0);
        assert_eq!(scores[&Axis::PQ], 0.5);
    }

    #[test]
    fn axis_codes() {
        let codes: Vec<String> = Axis::ALL.iter().map(Axis::to_string).collect();
        assert_eq!(codes, vec!["CE", "CU", "PC", "PQ"]);
        assert_eq!(Axis::PQ.description(), "production quality");
    }
}
