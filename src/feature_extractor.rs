//! Feature derivation for sleep disorder model inference.
//!
//! Turns a [`RawRecord`] into a named column frame using the column names the
//! models were trained with, and appends the engineered clinical indices.
//! Derivation always runs on the raw values, before any encoding or scaling.

use crate::error::{PipelineError, PipelineResult};
use crate::types::record::RawRecord;

pub const AGE: &str = "Age";
pub const GENDER: &str = "Gender";
pub const OCCUPATION: &str = "Occupation";
pub const BMI_CATEGORY: &str = "BMI Category";
pub const SLEEP_DURATION: &str = "Sleep Duration";
pub const QUALITY_OF_SLEEP: &str = "Quality of Sleep";
pub const STRESS_LEVEL: &str = "Stress Level";
pub const PHYSICAL_ACTIVITY_LEVEL: &str = "Physical Activity Level";
pub const HEART_RATE: &str = "Heart Rate";
pub const DAILY_STEPS: &str = "Daily Steps";
pub const SYSTOLIC_BP: &str = "Systolic_BP";
pub const DIASTOLIC_BP: &str = "Diastolic_BP";
pub const CARDIO_LOAD_INDEX: &str = "Cardio_Load_Index";
pub const STRESS_SLEEP_INDEX: &str = "Stress_Sleep_Index";

/// Raw columns, in the order they are inserted into the frame
pub const RAW_COLUMNS: [&str; 12] = [
    AGE,
    GENDER,
    OCCUPATION,
    BMI_CATEGORY,
    SLEEP_DURATION,
    QUALITY_OF_SLEEP,
    STRESS_LEVEL,
    PHYSICAL_ACTIVITY_LEVEL,
    HEART_RATE,
    DAILY_STEPS,
    SYSTOLIC_BP,
    DIASTOLIC_BP,
];

pub const DERIVED_COLUMNS: [&str; 2] = [CARDIO_LOAD_INDEX, STRESS_SLEEP_INDEX];

/// Raw columns the frame carries as text, to be label-encoded
pub const CATEGORICAL_COLUMNS: [&str; 3] = [GENDER, OCCUPATION, BMI_CATEGORY];

/// Engineered columns that reach the models unscaled. They always sit at the
/// tail of the canonical feature order.
pub const PASSTHROUGH_COLUMNS: [&str; 1] = [STRESS_SLEEP_INDEX];

/// Canonical column order of the shipped artifact bundles
pub const DEFAULT_FEATURE_ORDER: [&str; 14] = [
    GENDER,
    AGE,
    OCCUPATION,
    SLEEP_DURATION,
    QUALITY_OF_SLEEP,
    PHYSICAL_ACTIVITY_LEVEL,
    STRESS_LEVEL,
    BMI_CATEGORY,
    HEART_RATE,
    DAILY_STEPS,
    SYSTOLIC_BP,
    DIASTOLIC_BP,
    CARDIO_LOAD_INDEX,
    STRESS_SLEEP_INDEX,
];

/// True if the frame produced by [`FeatureExtractor`] has a column of this name.
pub fn is_known_column(name: &str) -> bool {
    RAW_COLUMNS.contains(&name) || DERIVED_COLUMNS.contains(&name)
}

/// Value of one frame column
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Numeric(f64),
    Categorical(String),
}

/// Single-row table of named columns, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureFrame {
    columns: Vec<(String, FeatureValue)>,
}

impl FeatureFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a column, replacing the value if it already exists.
    pub fn set(&mut self, name: &str, value: FeatureValue) {
        match self.columns.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => self.columns.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Numeric value of a column; categorical or missing columns are an error.
    pub fn numeric(&self, name: &str) -> PipelineResult<f64> {
        match self.get(name) {
            Some(FeatureValue::Numeric(v)) => Ok(*v),
            Some(FeatureValue::Categorical(v)) => Err(PipelineError::preprocessing(format!(
                "column '{}' still holds category '{}' where a number is required",
                name, v
            ))),
            None => Err(PipelineError::preprocessing(format!(
                "column '{}' is missing",
                name
            ))),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Engineered clinical indices
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedFeatures {
    pub cardio_load_index: f64,
    pub stress_sleep_index: f64,
}

impl DerivedFeatures {
    /// Compute both indices from raw, unencoded values.
    pub fn from_record(record: &RawRecord) -> Self {
        let systolic = f64::from(record.systolic_bp);
        let diastolic = f64::from(record.diastolic_bp);

        let pulse_pressure = systolic - diastolic;
        let mean_arterial_pressure = diastolic + pulse_pressure / 3.0;
        let cardio_load_index = f64::from(record.heart_rate) * mean_arterial_pressure;

        // Higher stress and worse sleep push the index up
        let stress_sleep_index =
            f64::from(record.stress_level) * (6.0 - f64::from(record.quality_of_sleep));

        Self {
            cardio_load_index,
            stress_sleep_index,
        }
    }
}

/// Feature extractor that turns raw records into model-ready column frames.
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Build the frame: twelve raw columns followed by the derived indices.
    pub fn extract(&self, record: &RawRecord) -> PipelineResult<FeatureFrame> {
        if !record.sleep_duration.is_finite() {
            return Err(PipelineError::preprocessing(format!(
                "Sleep_Duration must be a finite number, got {}",
                record.sleep_duration
            )));
        }

        let derived = DerivedFeatures::from_record(record);

        let mut frame = FeatureFrame::new();
        frame.set(AGE, FeatureValue::Numeric(f64::from(record.age)));
        frame.set(GENDER, FeatureValue::Categorical(record.gender.clone()));
        frame.set(OCCUPATION, FeatureValue::Categorical(record.occupation.clone()));
        frame.set(BMI_CATEGORY, FeatureValue::Categorical(record.bmi_category.clone()));
        frame.set(SLEEP_DURATION, FeatureValue::Numeric(record.sleep_duration));
        frame.set(QUALITY_OF_SLEEP, FeatureValue::Numeric(f64::from(record.quality_of_sleep)));
        frame.set(STRESS_LEVEL, FeatureValue::Numeric(f64::from(record.stress_level)));
        frame.set(
            PHYSICAL_ACTIVITY_LEVEL,
            FeatureValue::Numeric(f64::from(record.physical_activity_level)),
        );
        frame.set(HEART_RATE, FeatureValue::Numeric(f64::from(record.heart_rate)));
        frame.set(DAILY_STEPS, FeatureValue::Numeric(f64::from(record.daily_steps)));
        frame.set(SYSTOLIC_BP, FeatureValue::Numeric(f64::from(record.systolic_bp)));
        frame.set(DIASTOLIC_BP, FeatureValue::Numeric(f64::from(record.diastolic_bp)));
        frame.set(CARDIO_LOAD_INDEX, FeatureValue::Numeric(derived.cardio_load_index));
        frame.set(STRESS_SLEEP_INDEX, FeatureValue::Numeric(derived.stress_sleep_index));

        Ok(frame)
    }

    /// Number of columns in an extracted frame.
    pub fn feature_count(&self) -> usize {
        RAW_COLUMNS.len() + DERIVED_COLUMNS.len()
    }

    /// Column names in extraction order.
    pub fn feature_names(&self) -> Vec<&'static str> {
        RAW_COLUMNS.iter().chain(DERIVED_COLUMNS.iter()).copied().collect()
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}
