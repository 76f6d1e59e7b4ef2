//! Performance metrics and statistics tracking for the sleep disorder pipeline.

use crate::error::PipelineError;
use crate::models::aggregator::ProbabilityAggregator;
use crate::pipeline::Prediction;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

const MAX_SAMPLES: usize = 10_000;

/// Metrics collector for pipeline performance
pub struct PipelineMetrics {
    /// Requests answered with a prediction
    pub predictions_processed: AtomicU64,
    /// Requests rejected as invalid input (400)
    pub client_failures: AtomicU64,
    /// Requests that failed during scoring (500)
    pub server_failures: AtomicU64,
    /// Unseen categorical values replaced by the fallback code
    pub encoding_fallbacks: AtomicU64,
    /// Predictions where the reference model's top class differs from the ensemble's
    pub reference_disagreements: AtomicU64,
    predictions_by_class: RwLock<BTreeMap<String, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Ensemble confidence distribution, 10-point buckets
    confidence_buckets: RwLock<[u64; 10]>,
    /// Agreement between per-model distributions
    model_agreements: RwLock<Vec<f64>>,
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            predictions_processed: AtomicU64::new(0),
            client_failures: AtomicU64::new(0),
            server_failures: AtomicU64::new(0),
            encoding_fallbacks: AtomicU64::new(0),
            reference_disagreements: AtomicU64::new(0),
            predictions_by_class: RwLock::new(BTreeMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            confidence_buckets: RwLock::new([0; 10]),
            model_agreements: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a successful prediction
    pub fn record_prediction(&self, prediction: &Prediction, processing_time: Duration) {
        self.predictions_processed.fetch_add(1, Ordering::Relaxed);
        self.encoding_fallbacks
            .fetch_add(prediction.fallbacks.len() as u64, Ordering::Relaxed);
        if prediction.decision.reference_disagrees() {
            self.reference_disagreements.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut by_class) = self.predictions_by_class.write() {
            *by_class
                .entry(prediction.result.predicted_class.clone())
                .or_insert(0) += 1;
        }

        self.record_time(processing_time);

        let bucket = (prediction.result.ensemble_confidence / 10.0).clamp(0.0, 9.0) as usize;
        if let Ok(mut buckets) = self.confidence_buckets.write() {
            buckets[bucket] += 1;
        }

        let distributions: Vec<Vec<f64>> = prediction
            .scores
            .model_probabilities
            .iter()
            .map(|(_, p)| p.clone())
            .collect();
        if distributions.len() >= 2 {
            if let Ok(mut agreements) = self.model_agreements.write() {
                agreements.push(ProbabilityAggregator::agreement(&distributions));
                if agreements.len() > MAX_SAMPLES {
                    agreements.drain(0..MAX_SAMPLES / 2);
                }
            }
        }
    }

    /// Record a failed request by its error class
    pub fn record_failure(&self, error: &PipelineError, processing_time: Duration) {
        if error.is_client_error() {
            self.client_failures.fetch_add(1, Ordering::Relaxed);
        } else {
            self.server_failures.fetch_add(1, Ordering::Relaxed);
        }
        self.record_time(processing_time);
    }

    /// Request body could not be read as a record
    pub fn record_rejected(&self) {
        self.client_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_time(&self, processing_time: Duration) {
        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            if times.len() > MAX_SAMPLES {
                times.drain(0..MAX_SAMPLES / 2);
            }
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let mut sorted = match self.processing_times.read() {
            Ok(times) if !times.is_empty() => times.clone(),
            _ => return ProcessingStats::default(),
        };
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: at(0.5),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Get average agreement between models
    pub fn get_avg_agreement(&self) -> f64 {
        match self.model_agreements.read() {
            Ok(agreements) if !agreements.is_empty() => {
                agreements.iter().sum::<f64>() / agreements.len() as f64
            }
            _ => 0.0,
        }
    }

    /// Get current throughput (predictions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_confidence_distribution(&self) -> [u64; 10] {
        self.confidence_buckets
            .read()
            .map(|buckets| *buckets)
            .unwrap_or([0; 10])
    }

    pub fn get_predictions_by_class(&self) -> BTreeMap<String, u64> {
        self.predictions_by_class
            .read()
            .map(|by_class| by_class.clone())
            .unwrap_or_default()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let predictions = self.predictions_processed.load(Ordering::Relaxed);
        let client_failures = self.client_failures.load(Ordering::Relaxed);
        let server_failures = self.server_failures.load(Ordering::Relaxed);
        let fallbacks = self.encoding_fallbacks.load(Ordering::Relaxed);
        let disagreements = self.reference_disagreements.load(Ordering::Relaxed);

        let processing = self.get_processing_stats();
        let throughput = self.get_throughput();
        let agreement = self.get_avg_agreement();
        let by_class = self.get_predictions_by_class();
        let confidence = self.get_confidence_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║          SLEEP DISORDER PIPELINE - METRICS SUMMARY           ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Predictions:       {:>8}  │  Throughput: {:>6.1} req/s      ║",
            predictions, throughput
        );
        info!(
            "║ Invalid input:     {:>8}  │  Scoring failures: {:>8}    ║",
            client_failures, server_failures
        );
        info!(
            "║ Fallback encodings:{:>8}  │  Reference disagrees: {:>6}   ║",
            fallbacks, disagreements
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!(
            "║ Model Agreement: {:>5.1}% (higher = models agree more)        ║",
            agreement * 100.0
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Predictions by Class:                                        ║");
        for (class, count) in &by_class {
            let pct = if predictions > 0 {
                (*count as f64 / predictions as f64) * 100.0
            } else {
                0.0
            };
            info!("║   {:12}: {:>6} ({:>5.1}%)                              ║", class, count, pct);
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Ensemble Confidence Distribution:                            ║");
        let total: u64 = confidence.iter().sum();
        for (i, &count) in confidence.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:>3}-{:<3}%: {:>6} ({:>5.1}%) {}",
                i * 10,
                (i + 1) * 10,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Real-time metrics reporter that prints periodic summaries
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs: interval_secs.max(1),
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::decision::Decision;
    use crate::models::inference::EnsembleScores;
    use crate::preprocessing::EncodingFallback;
    use crate::types::PredictionResult;

    fn prediction(class: &str, confidence: f64, reference_class_index: usize) -> Prediction {
        let scores = EnsembleScores {
            model_probabilities: vec![
                ("random_forest".to_string(), vec![0.8, 0.1, 0.1]),
                ("xgboost".to_string(), vec![0.7, 0.2, 0.1]),
            ],
            reference_raw: vec![0.8, 0.1, 0.1],
            ensemble_raw: vec![0.75, 0.15, 0.1],
            reference_calibrated: vec![0.8, 0.1, 0.1],
            ensemble_calibrated: vec![0.75, 0.15, 0.1],
        };
        Prediction {
            result: PredictionResult::new(class.to_string(), confidence, 0.8),
            decision: Decision {
                predicted_class: class.to_string(),
                class_index: 0,
                ensemble_confidence: confidence,
                reference_class_index,
                reference_confidence: 0.8,
            },
            scores,
            fallbacks: Vec::new(),
        }
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = PipelineMetrics::new();

        metrics.record_prediction(&prediction("Healthy", 0.95, 0), Duration::from_micros(100));
        metrics.record_prediction(&prediction("Healthy", 0.55, 1), Duration::from_micros(200));
        metrics.record_failure(&PipelineError::preprocessing("bad"), Duration::from_micros(10));
        metrics.record_failure(&PipelineError::scoring("boom"), Duration::from_micros(10));
        metrics.record_rejected();

        assert_eq!(metrics.predictions_processed.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.client_failures.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.server_failures.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.reference_disagreements.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.get_predictions_by_class().get("Healthy"), Some(&2));

        let confidence = metrics.get_confidence_distribution();
        assert_eq!(confidence[9], 1);
        assert_eq!(confidence[5], 1);

        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.max_us, 200);
    }

    #[test]
    fn test_fallbacks_counted() {
        let metrics = PipelineMetrics::new();
        let mut p = prediction("Insomnia", 0.7, 0);
        p.fallbacks.push(EncodingFallback {
            column: "Occupation".to_string(),
            value: "Astronaut".to_string(),
            substituted_code: 0,
        });

        metrics.record_prediction(&p, Duration::from_micros(50));

        assert_eq!(metrics.encoding_fallbacks.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_model_agreement() {
        let metrics = PipelineMetrics::new();
        metrics.record_prediction(&prediction("Healthy", 0.9, 0), Duration::from_micros(1));

        assert!(metrics.get_avg_agreement() > 0.9);
    }

    #[test]
    fn test_empty_stats() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.get_processing_stats().count, 0);
        assert_eq!(metrics.get_avg_agreement(), 0.0);
    }
}
