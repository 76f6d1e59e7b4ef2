//! Sleep Disorder Pipeline - Main Entry Point
//!
//! Loads the artifact bundle, answers prediction requests over NATS
//! request/reply and reports readiness on a health subject.

use anyhow::{Context, Result};
use futures::StreamExt;
use sleep_disorder_pipeline::{
    config::{AppConfig, LoggingConfig},
    consumer::RequestConsumer,
    metrics::{MetricsReporter, PipelineMetrics},
    producer::ReplyProducer,
    ArtifactBundle, PipelineError, RawRecord, SleepPipeline,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => tracing_subscriber::EnvFilter::try_new(format!(
            "sleep_disorder_pipeline={}",
            logging.level
        ))
        .context("Invalid logging.level")?,
    };

    if logging.format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    info!("Starting Sleep Disorder Pipeline");
    info!(
        artifacts = %config.artifacts.dir,
        models = config.artifacts.models.len(),
        "Configuration loaded successfully"
    );

    // No partial service: a bundle that fails to load stops the process
    let bundle = match ArtifactBundle::load(&config.artifacts) {
        Ok(bundle) => Arc::new(bundle),
        Err(e) => {
            error!(error = %e, "Failed to load model artifacts");
            return Err(e).context("Artifact bundle could not be loaded");
        }
    };
    let pipeline = SleepPipeline::new(bundle.clone());
    info!(
        "Inference engine initialized with {} models: {:?}",
        bundle.engine().model_count(),
        bundle.engine().model_names()
    );

    let metrics = Arc::new(PipelineMetrics::new());

    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = RequestConsumer::new(
        client.clone(),
        &config.nats.predict_subject,
        &config.nats.health_subject,
    );
    let producer = ReplyProducer::new(client.clone());

    // Health checks are answered outside the worker pool
    let mut health_requests = consumer.subscribe_health().await?;
    let health_bundle = bundle.clone();
    let health_producer = producer.clone();
    tokio::spawn(async move {
        while let Some(message) = health_requests.next().await {
            if let Err(e) = health_producer
                .reply(message.reply, &health_bundle.health())
                .await
            {
                warn!(error = %e, "Failed to answer health check");
            }
        }
    });

    if config.pipeline.metrics_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.pipeline.metrics_interval_secs);
        tokio::spawn(reporter.start());
    }

    let num_workers = config.pipeline.workers.max(1);
    info!(
        "Starting request processing loop with {} parallel workers",
        num_workers
    );
    info!("Listening on subject: {}", consumer.predict_subject());

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    let mut requests = consumer.subscribe_predictions().await?;

    while let Some(message) = requests.next().await {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        let pipeline = pipeline.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();
            let request_id = Uuid::new_v4();

            let sent = match serde_json::from_slice::<RawRecord>(&message.payload) {
                Ok(record) => match pipeline.predict(&record) {
                    Ok(prediction) => {
                        let processing_time = start_time.elapsed();
                        metrics.record_prediction(&prediction, processing_time);

                        debug!(
                            request_id = %request_id,
                            predicted_class = %prediction.result.predicted_class,
                            ensemble_confidence = prediction.result.ensemble_confidence,
                            fallbacks = prediction.fallbacks.len(),
                            processing_time_us = processing_time.as_micros(),
                            "Request processed"
                        );

                        let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
                        if count % 100 == 0 {
                            let processing_stats = metrics.get_processing_stats();
                            info!(
                                processed = count,
                                throughput = format!("{:.1} req/s", metrics.get_throughput()),
                                avg_latency_us = processing_stats.mean_us,
                                "Processing milestone"
                            );
                        }

                        producer.reply(message.reply, &prediction.result).await
                    }
                    Err(e) => {
                        metrics.record_failure(&e, start_time.elapsed());
                        if e.is_client_error() {
                            warn!(request_id = %request_id, error = %e, "Invalid input data");
                        } else {
                            error!(request_id = %request_id, error = %e, "Prediction failed");
                        }
                        producer.reply(message.reply, &e.to_response()).await
                    }
                },
                Err(e) => {
                    metrics.record_rejected();
                    warn!(request_id = %request_id, error = %e, "Failed to deserialize record");
                    let body = PipelineError::preprocessing(format!("malformed record: {}", e))
                        .to_response();
                    producer.reply(message.reply, &body).await
                }
            };

            if let Err(e) = sent {
                error!(request_id = %request_id, error = %e, "Failed to publish reply");
            }

            drop(permit);
        });
    }

    info!("Pipeline shutting down...");
    metrics.print_summary();

    Ok(())
}
