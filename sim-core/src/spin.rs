use rand::Rng;

use crate::error::SimError;

/// Feature vector attached to a particle, used only to decide whether two
/// particles attract or repel.
///
/// Every component lies in `[0, 1]` and the length is fixed at creation.
/// Operations across spins of different lengths fail with
/// [`SimError::DimensionMismatch`].
#[derive(Clone, Debug, PartialEq)]
pub struct Spin {
    values: Vec<f32>,
}

impl Spin {
    /// Validates and wraps `values`.
    ///
    /// ### Errors
    /// - [`SimError::EmptySpin`] if `values` is empty.
    /// - [`SimError::SpinOutOfRange`] if a component is outside `[0, 1]`
    ///   or not finite.
    pub fn new(values: Vec<f32>) -> Result<Self, SimError> {
        if values.is_empty() {
            return Err(SimError::EmptySpin);
        }
        if let Some((index, &value)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !(0.0..=1.0).contains(*v))
        {
            return Err(SimError::SpinOutOfRange { index, value });
        }
        Ok(Self { values })
    }

    /// A spin with `dims` components all set to `value`.
    pub fn uniform(value: f32, dims: usize) -> Result<Self, SimError> {
        Self::new(vec![value; dims])
    }

    /// A spin with `dims` uniformly random components.
    pub fn random(dims: usize, rng: &mut impl Rng) -> Result<Self, SimError> {
        Self::new((0..dims).map(|_| rng.random::<f32>()).collect())
    }

    #[inline]
    pub fn dims(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Fails fast when `other` has a different number of components.
    pub fn check_dims(&self, other: &Spin) -> Result<(), SimError> {
        if self.dims() == other.dims() {
            Ok(())
        } else {
            Err(SimError::DimensionMismatch {
                left: self.dims(),
                right: other.dims(),
            })
        }
    }

    /// Mean absolute difference of corresponding components, in `[0, 1]`.
    ///
    /// `0` means identical spins, `1` means every component is opposite.
    pub fn mean_abs_difference(&self, other: &Spin) -> Result<f32, SimError> {
        self.check_dims(other)?;
        let sum: f32 = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| (a - b).abs())
            .sum();
        Ok(sum / self.dims() as f32)
    }

    /// Display colour: the first three components as RGB bytes, missing
    /// channels are black.
    pub fn color(&self) -> [u8; 3] {
        let mut rgb = [0u8; 3];
        for (channel, value) in rgb.iter_mut().zip(&self.values) {
            *channel = (value * 255.0).floor() as u8;
        }
        rgb
    }
}
