//! Probability fusion for the multi-model ensemble

use crate::error::{PipelineError, PipelineResult};

/// Combines per-model class distributions into one.
pub struct ProbabilityAggregator;

impl ProbabilityAggregator {
    /// Arithmetic mean of the distributions, one equal vote per model.
    pub fn average(distributions: &[Vec<f64>]) -> PipelineResult<Vec<f64>> {
        let first = distributions
            .first()
            .ok_or_else(|| PipelineError::scoring("no model distributions to aggregate"))?;

        let n_classes = first.len();
        if distributions.iter().any(|d| d.len() != n_classes) {
            return Err(PipelineError::scoring(
                "models disagree on the number of classes",
            ));
        }

        let mut mean = vec![0.0; n_classes];
        for distribution in distributions {
            for (m, p) in mean.iter_mut().zip(distribution) {
                *m += p;
            }
        }

        let n = distributions.len() as f64;
        mean.iter_mut().for_each(|m| *m /= n);
        Ok(mean)
    }

    /// Index and value of the largest entry. Ties resolve to the lowest index.
    pub fn argmax(distribution: &[f64]) -> Option<(usize, f64)> {
        distribution
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best, (i, p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((i, p)),
            })
    }

    /// Fraction of models whose arg-max class matches the majority class.
    pub fn agreement(distributions: &[Vec<f64>]) -> f64 {
        if distributions.is_empty() {
            return 0.0;
        }

        let picks: Vec<usize> = distributions
            .iter()
            .filter_map(|d| Self::argmax(d).map(|(i, _)| i))
            .collect();

        let top = picks
            .iter()
            .map(|c| picks.iter().filter(|o| *o == c).count())
            .max()
            .unwrap_or(0);

        top as f64 / distributions.len() as f64
    }
}
