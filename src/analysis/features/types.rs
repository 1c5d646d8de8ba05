// Types module - the fixed-layout feature vector
//
// Slot layout (changing it invalidates every trained model):
//
// | Slots | Meaning                                   |
// |-------|-------------------------------------------|
// | 0-12  | mean of each cepstral coefficient         |
// | 13-25 | standard deviation of each coefficient    |
// | 26-37 | mean chroma energy per pitch class        |
// | 38-44 | mean spectral contrast per sub-band       |
// | 45-50 | mean tonal centroid per axis              |
// | 51    | mean RMS energy                           |
// | 52    | mean zero-crossing rate                   |

use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::error::FeatureError;

pub const MFCC_MEAN: Range<usize> = 0..13;
pub const MFCC_STD: Range<usize> = 13..26;
pub const CHROMA_MEAN: Range<usize> = 26..38;
pub const CONTRAST_MEAN: Range<usize> = 38..45;
pub const TONNETZ_MEAN: Range<usize> = 45..51;
pub const RMS_MEAN: usize = 51;
pub const ZCR_MEAN: usize = 52;

/// Total number of slots
pub const FEATURE_LEN: usize = 53;

/// Acoustic summary of one clip
///
/// The length is always `FEATURE_LEN`; deserializing any other length fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub(crate) fn from_parts(
        mfcc_mean: &[f64],
        mfcc_std: &[f64],
        chroma_mean: &[f64],
        contrast_mean: &[f64],
        tonnetz_mean: &[f64],
        rms_mean: f64,
        zcr_mean: f64,
    ) -> Self {
        let mut values = Vec::with_capacity(FEATURE_LEN);
        values.extend_from_slice(mfcc_mean);
        values.extend_from_slice(mfcc_std);
        values.extend_from_slice(chroma_mean);
        values.extend_from_slice(contrast_mean);
        values.extend_from_slice(tonnetz_mean);
        values.push(rms_mean);
        values.push(zcr_mean);
        debug_assert_eq!(values.len(), FEATURE_LEN);
        Self(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }

    pub fn mfcc_mean(&self) -> &[f64] {
        &self.0[MFCC_MEAN]
    }

    pub fn mfcc_std(&self) -> &[f64] {
        &self.0[MFCC_STD]
    }

    pub fn chroma_mean(&self) -> &[f64] {
        &self.0[CHROMA_MEAN]
    }

    pub fn contrast_mean(&self) -> &[f64] {
        &self.0[CONTRAST_MEAN]
    }

    pub fn tonnetz_mean(&self) -> &[f64] {
        &self.0[TONNETZ_MEAN]
    }

    pub fn rms_mean(&self) -> f64 {
        self.0[RMS_MEAN]
    }

    pub fn zcr_mean(&self) -> f64 {
        self.0[ZCR_MEAN]
    }
}

impl AsRef<[f64]> for FeatureVector {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

impl TryFrom<Vec<f64>> for FeatureVector {
    type Error = FeatureError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        if values.len() != FEATURE_LEN {
            return Err(FeatureError::InvalidInput {
                reason: format!(
                    "feature vector has {} values, expected {}",
                    values.len(),
                    FEATURE_LEN
                ),
            });
        }
        Ok(Self(values))
    }
}

impl From<FeatureVector> for Vec<f64> {
    fn from(features: FeatureVector) -> Self {
        features.0
    }
}
