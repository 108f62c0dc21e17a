//! The bootstrap sample set: a point estimate plus its B replicas.
//!
//! Every statistic in the pipeline is derived by applying the same function
//! to the mean and to each replica independently. The combinators here
//! ([`BootstrapSampleSet::map`], [`BootstrapSampleSet::zip_with`] and the
//! arithmetic operators) are the only way sets are transformed, which keeps
//! replicas from ever being mixed implicitly.

use std::ops::{Add, Div, Mul, Neg, Sub};

use nalgebra::{DMatrix, DVector};

use crate::error::{AnalysisError, Result};

use super::aggregate::{nan_mean, nan_std};

/// Point estimate and bootstrap replicas of one observable.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapSampleSet<T> {
    mean: T,
    samples: Vec<T>,
}

impl<T> BootstrapSampleSet<T> {
    /// Create a set from its full-data estimate and its replicas.
    pub fn new(mean: T, samples: Vec<T>) -> Self {
        Self { mean, samples }
    }

    /// Full-data point estimate.
    pub fn mean(&self) -> &T {
        &self.mean
    }

    /// The bootstrap replicas, in replica order.
    pub fn samples(&self) -> &[T] {
        &self.samples
    }

    /// Number of bootstrap replicas (B).
    pub fn replica_count(&self) -> usize {
        self.samples.len()
    }

    /// Split into (mean, samples).
    pub fn into_parts(self) -> (T, Vec<T>) {
        (self.mean, self.samples)
    }

    /// Apply `f` to the mean and to each replica.
    pub fn map<U, F>(&self, f: F) -> BootstrapSampleSet<U>
    where
        F: Fn(&T) -> U,
    {
        BootstrapSampleSet {
            mean: f(&self.mean),
            samples: self.samples.iter().map(&f).collect(),
        }
    }

    /// Fallible [`map`](Self::map); the first error aborts the whole set.
    pub fn try_map<U, F>(&self, f: F) -> Result<BootstrapSampleSet<U>>
    where
        F: Fn(&T) -> Result<U>,
    {
        Ok(BootstrapSampleSet {
            mean: f(&self.mean)?,
            samples: self.samples.iter().map(&f).collect::<Result<Vec<_>>>()?,
        })
    }

    /// Combine two sets replica by replica.
    ///
    /// # Panics
    ///
    /// Panics if the replica counts differ. Use
    /// [`try_zip_with`](Self::try_zip_with) for the checked form.
    pub fn zip_with<U, V, F>(&self, other: &BootstrapSampleSet<U>, f: F) -> BootstrapSampleSet<V>
    where
        F: Fn(&T, &U) -> V,
    {
        assert_eq!(
            self.replica_count(),
            other.replica_count(),
            "bootstrap sets must have the same replica count"
        );
        BootstrapSampleSet {
            mean: f(&self.mean, &other.mean),
            samples: self
                .samples
                .iter()
                .zip(other.samples.iter())
                .map(|(a, b)| f(a, b))
                .collect(),
        }
    }

    /// Checked [`zip_with`](Self::zip_with).
    pub fn try_zip_with<U, V, F>(
        &self,
        other: &BootstrapSampleSet<U>,
        f: F,
    ) -> Result<BootstrapSampleSet<V>>
    where
        F: Fn(&T, &U) -> V,
    {
        if self.replica_count() != other.replica_count() {
            return Err(AnalysisError::shape(
                "bootstrap set combination",
                format!("{} replicas", self.replica_count()),
                format!("{} replicas", other.replica_count()),
            ));
        }
        Ok(self.zip_with(other, f))
    }
}

impl BootstrapSampleSet<f64> {
    /// NaN-aware average of the replicas.
    pub fn replica_mean(&self) -> f64 {
        nan_mean(&self.samples)
    }

    /// NaN-aware spread of the replicas: the bootstrap uncertainty.
    pub fn std_error(&self) -> f64 {
        nan_std(&self.samples)
    }

    /// A set where the mean and every replica are NaN.
    pub fn nan(replicas: usize) -> Self {
        Self::new(f64::NAN, vec![f64::NAN; replicas])
    }
}

impl BootstrapSampleSet<DVector<f64>> {
    /// Build a set whose point estimate is the replica average.
    ///
    /// Used for inputs that arrive already resampled (no full-data estimate
    /// is available).
    pub fn from_replicas(samples: Vec<DVector<f64>>) -> Result<Self> {
        let first = samples.first().ok_or_else(|| AnalysisError::InsufficientData {
            context: "replica set".to_string(),
            available: 0,
            required: 1,
        })?;
        let len = first.len();
        let mut mean = DVector::zeros(len);
        for sample in &samples {
            if sample.len() != len {
                return Err(AnalysisError::shape("replica set", len, sample.len()));
            }
            mean += sample;
        }
        mean /= samples.len() as f64;
        Ok(Self::new(mean, samples))
    }

    /// Number of time slices (or energy points).
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    /// True if the series is empty.
    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// The scalar set at one index.
    pub fn at(&self, index: usize) -> BootstrapSampleSet<f64> {
        self.map(|series| series[index])
    }

    /// Restrict every series to `start..end`.
    pub fn window(&self, start: usize, end: usize) -> Result<Self> {
        if start >= end || end > self.len() {
            return Err(AnalysisError::shape(
                "correlator window",
                format!("start < end <= {}", self.len()),
                format!("{start}..{end}"),
            ));
        }
        Ok(self.map(|series| series.rows(start, end - start).into_owned()))
    }

    /// Concatenate two series sets replica by replica.
    pub fn concat(&self, other: &Self) -> Result<Self> {
        self.try_zip_with(other, |a, b| {
            DVector::from_iterator(a.len() + b.len(), a.iter().chain(b.iter()).copied())
        })
    }

    /// Replicas as the rows of a (B x T) matrix.
    pub fn sample_matrix(&self) -> DMatrix<f64> {
        let rows = self.replica_count();
        let cols = self.len();
        DMatrix::from_fn(rows, cols, |b, t| self.samples[b][t])
    }

    /// Per-slice NaN-aware replica spread.
    pub fn std_error(&self) -> DVector<f64> {
        let mut column = Vec::with_capacity(self.replica_count());
        DVector::from_fn(self.len(), |t, _| {
            column.clear();
            column.extend(self.samples.iter().map(|s| s[t]));
            nan_std(&column)
        })
    }
}

impl<'a, 'b, T> Add<&'b BootstrapSampleSet<T>> for &'a BootstrapSampleSet<T>
where
    for<'x> &'x T: Add<&'x T, Output = T>,
{
    type Output = BootstrapSampleSet<T>;

    fn add(self, rhs: &'b BootstrapSampleSet<T>) -> Self::Output {
        self.zip_with(rhs, |a, b| a + b)
    }
}

impl<T> Add for BootstrapSampleSet<T>
where
    for<'x> &'x T: Add<&'x T, Output = T>,
{
    type Output = BootstrapSampleSet<T>;

    fn add(self, rhs: Self) -> Self::Output {
        &self + &rhs
    }
}

impl<'a, 'b, T> Sub<&'b BootstrapSampleSet<T>> for &'a BootstrapSampleSet<T>
where
    for<'x> &'x T: Sub<&'x T, Output = T>,
{
    type Output = BootstrapSampleSet<T>;

    fn sub(self, rhs: &'b BootstrapSampleSet<T>) -> Self::Output {
        self.zip_with(rhs, |a, b| a - b)
    }
}

impl<T> Sub for BootstrapSampleSet<T>
where
    for<'x> &'x T: Sub<&'x T, Output = T>,
{
    type Output = BootstrapSampleSet<T>;

    fn sub(self, rhs: Self) -> Self::Output {
        &self - &rhs
    }
}

impl<'a, T> Mul<f64> for &'a BootstrapSampleSet<T>
where
    for<'x> &'x T: Mul<f64, Output = T>,
{
    type Output = BootstrapSampleSet<T>;

    fn mul(self, rhs: f64) -> Self::Output {
        self.map(|a| a * rhs)
    }
}

impl<T> Mul<f64> for BootstrapSampleSet<T>
where
    for<'x> &'x T: Mul<f64, Output = T>,
{
    type Output = BootstrapSampleSet<T>;

    fn mul(self, rhs: f64) -> Self::Output {
        &self * rhs
    }
}

impl<'a, T> Div<f64> for &'a BootstrapSampleSet<T>
where
    for<'x> &'x T: Div<f64, Output = T>,
{
    type Output = BootstrapSampleSet<T>;

    fn div(self, rhs: f64) -> Self::Output {
        self.map(|a| a / rhs)
    }
}

impl<T> Div<f64> for BootstrapSampleSet<T>
where
    for<'x> &'x T: Div<f64, Output = T>,
{
    type Output = BootstrapSampleSet<T>;

    fn div(self, rhs: f64) -> Self::Output {
        &self / rhs
    }
}

impl<'a, T> Neg for &'a BootstrapSampleSet<T>
where
    for<'x> &'x T: Neg<Output = T>,
{
    type Output = BootstrapSampleSet<T>;

    fn neg(self) -> Self::Output {
        self.map(|a| -a)
    }
}

impl<T> Neg for BootstrapSampleSet<T>
where
    for<'x> &'x T: Neg<Output = T>,
{
    type Output = BootstrapSampleSet<T>;

    fn neg(self) -> Self::Output {
        -&self
    }
}
