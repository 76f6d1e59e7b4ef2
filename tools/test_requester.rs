//! Test Prediction Requester
//!
//! Generates patient records and sends them to the pipeline over NATS
//! request/reply, logging each reply.

use rand::seq::SliceRandom;
use rand::Rng;
use sleep_disorder_pipeline::{ErrorResponse, PredictionResult, RawRecord};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

const OCCUPATIONS: &[&str] = &[
    "Accountant",
    "Doctor",
    "Engineer",
    "Lawyer",
    "Manager",
    "Nurse",
    "Sales Representative",
    "Salesperson",
    "Scientist",
    "Software Engineer",
    "Teacher",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Profile {
    Healthy,
    Insomnia,
    Apnea,
}

/// Record generator for testing
struct RecordGenerator {
    rng: rand::rngs::ThreadRng,
}

impl RecordGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    fn generate(&mut self, profile: Profile) -> RawRecord {
        match profile {
            Profile::Healthy => self.generate_healthy(),
            Profile::Insomnia => self.generate_insomnia(),
            Profile::Apnea => self.generate_apnea(),
        }
    }

    /// Well-rested, active, low stress
    fn generate_healthy(&mut self) -> RawRecord {
        RawRecord {
            age: self.rng.gen_range(20..=50),
            gender: self.random_choice(&["Female", "Male"]).to_string(),
            occupation: self.random_choice(OCCUPATIONS).to_string(),
            bmi_category: "Normal".to_string(),
            sleep_duration: self.sleep_hours(7.0, 9.0),
            quality_of_sleep: self.weighted(&[(3, 0.1), (4, 0.4), (5, 0.5)]),
            stress_level: self.weighted(&[(1, 0.6), (2, 0.3), (4, 0.1)]),
            physical_activity_level: self.weighted(&[(5, 0.2), (8, 0.4), (10, 0.4)]),
            heart_rate: self.rng.gen_range(55..=70),
            daily_steps: self.rng.gen_range(7000..=12000),
            systolic_bp: self.rng.gen_range(110..=125),
            diastolic_bp: self.rng.gen_range(70..=80),
        }
    }

    /// Short, poor sleep under high stress
    fn generate_insomnia(&mut self) -> RawRecord {
        RawRecord {
            age: self.rng.gen_range(25..=55),
            gender: self.random_choice(&["Female", "Male"]).to_string(),
            occupation: self.random_choice(OCCUPATIONS).to_string(),
            bmi_category: self.random_choice(&["Normal", "Overweight"]).to_string(),
            sleep_duration: self.sleep_hours(2.0, 5.0),
            quality_of_sleep: self.weighted(&[(1, 0.7), (2, 0.3)]),
            stress_level: self.weighted(&[(9, 0.4), (10, 0.6)]),
            physical_activity_level: self.weighted(&[(1, 0.7), (3, 0.3)]),
            heart_rate: self.rng.gen_range(80..=100),
            daily_steps: self.rng.gen_range(2000..=5000),
            systolic_bp: self.rng.gen_range(120..=140),
            diastolic_bp: self.rng.gen_range(80..=95),
        }
    }

    /// Older, heavier, hypertensive, sedentary
    fn generate_apnea(&mut self) -> RawRecord {
        RawRecord {
            age: self.rng.gen_range(45..=70),
            gender: self.random_choice(&["Female", "Male"]).to_string(),
            occupation: self.random_choice(OCCUPATIONS).to_string(),
            bmi_category: self.random_choice(&["Obese", "Overweight"]).to_string(),
            sleep_duration: self.sleep_hours(6.0, 8.5),
            quality_of_sleep: self.weighted(&[(2, 0.3), (3, 0.5), (4, 0.2)]),
            stress_level: self.weighted(&[(2, 0.4), (4, 0.4), (9, 0.2)]),
            physical_activity_level: self.weighted(&[(1, 0.8), (3, 0.2)]),
            heart_rate: self.rng.gen_range(90..=110),
            daily_steps: self.rng.gen_range(1000..=3000),
            systolic_bp: self.rng.gen_range(140..=170),
            diastolic_bp: self.rng.gen_range(90..=110),
        }
    }

    fn pick_profile(&mut self, anomaly_rate: f64) -> Profile {
        if !self.rng.gen_bool(anomaly_rate) {
            Profile::Healthy
        } else if self.rng.gen_bool(0.5) {
            Profile::Insomnia
        } else {
            Profile::Apnea
        }
    }

    /// One-decimal sleep duration
    fn sleep_hours(&mut self, low: f64, high: f64) -> f64 {
        (self.rng.gen_range(low..high) * 10.0).round() / 10.0
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }

    /// Pick a level from `(value, weight)` pairs
    fn weighted(&mut self, choices: &[(i32, f64)]) -> i32 {
        choices
            .choose_weighted(&mut self.rng, |c| c.1)
            .map(|c| c.0)
            .unwrap_or(choices[0].0)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_requester=info".parse()?),
        )
        .init();

    info!("Starting Test Prediction Requester");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("sleep.predict");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let anomaly_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.5);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        anomaly_rate = anomaly_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, anomaly_rate, delay_ms).await;
        }
    };

    let mut generator = RecordGenerator::new();
    let mut sent: BTreeMap<Profile, u64> = BTreeMap::new();
    let mut predicted: BTreeMap<String, u64> = BTreeMap::new();
    let mut failed = 0u64;

    info!("Starting to send {} requests...", count);

    for i in 0..count {
        let profile = generator.pick_profile(anomaly_rate);
        let record = generator.generate(profile);
        *sent.entry(profile).or_insert(0) += 1;

        let payload = serde_json::to_vec(&record)?;

        match client.request(subject.to_string(), payload.into()).await {
            Ok(reply) => {
                if let Ok(result) = serde_json::from_slice::<PredictionResult>(&reply.payload) {
                    info!(
                        profile = ?profile,
                        predicted_class = %result.predicted_class,
                        ensemble_confidence = result.ensemble_confidence,
                        rf_confidence = result.rf_confidence,
                        "Prediction received"
                    );
                    *predicted.entry(result.predicted_class).or_insert(0) += 1;
                } else if let Ok(err) = serde_json::from_slice::<ErrorResponse>(&reply.payload) {
                    failed += 1;
                    warn!(profile = ?profile, status = err.status, error = %err.error, "Request rejected");
                } else {
                    failed += 1;
                    warn!(profile = ?profile, "Unrecognized reply");
                }
            }
            Err(e) => {
                failed += 1;
                warn!(profile = ?profile, error = %e, "Request failed");
            }
        }

        if (i + 1) % 10 == 0 {
            info!("Sent {}/{} requests ({} failed)", i + 1, count, failed);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(sent = ?sent, predicted = ?predicted, failed = failed, "Completed!");

    Ok(())
}

async fn run_dry_mode(count: u64, anomaly_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = RecordGenerator::new();

    for i in 0..count {
        let profile = generator.pick_profile(anomaly_rate);
        let record = generator.generate(profile);

        let json = serde_json::to_string_pretty(&record)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample {:?} record {}:\n{}", profile, i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_levels_stay_on_scale() {
        let mut generator = RecordGenerator::new();

        for profile in [Profile::Healthy, Profile::Insomnia, Profile::Apnea] {
            for _ in 0..200 {
                let record = generator.generate(profile);
                assert!((1..=5).contains(&record.quality_of_sleep), "{:?}", record);
                assert!((1..=10).contains(&record.stress_level), "{:?}", record);
                assert!((1..=10).contains(&record.physical_activity_level), "{:?}", record);
                assert!(record.stress_level * (6 - record.quality_of_sleep) > 0);
                assert!(record.systolic_bp > record.diastolic_bp);
            }
        }
    }

    #[test]
    fn test_profile_shapes() {
        let mut generator = RecordGenerator::new();

        let healthy = generator.generate(Profile::Healthy);
        assert_eq!(healthy.bmi_category, "Normal");
        assert!(healthy.sleep_duration >= 7.0);

        let insomnia = generator.generate(Profile::Insomnia);
        assert!(insomnia.quality_of_sleep <= 2 && insomnia.stress_level >= 9);
        assert!(insomnia.sleep_duration <= 5.0);
    }
}
