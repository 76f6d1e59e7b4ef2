//! Raw patient observation as received from a requester

use serde::{Deserialize, Serialize};

/// Twelve raw observation fields for one patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Age in years
    #[serde(rename = "Age")]
    pub age: u32,

    #[serde(rename = "Gender")]
    pub gender: String,

    #[serde(rename = "Occupation")]
    pub occupation: String,

    /// Normal, Overweight, Obese, ...
    #[serde(rename = "BMI_Category", alias = "BMI Category")]
    pub bmi_category: String,

    /// Hours of sleep per night
    #[serde(rename = "Sleep_Duration", alias = "Sleep Duration")]
    pub sleep_duration: f64,

    /// Self-reported quality, 1 (poor) to 5 (excellent)
    #[serde(rename = "Quality_of_Sleep", alias = "Quality of Sleep")]
    pub quality_of_sleep: i32,

    #[serde(rename = "Stress_Level", alias = "Stress Level")]
    pub stress_level: i32,

    #[serde(rename = "Physical_Activity_Level", alias = "Physical Activity Level")]
    pub physical_activity_level: i32,

    /// Resting heart rate (bpm)
    #[serde(rename = "Heart_Rate", alias = "Heart Rate")]
    pub heart_rate: i32,

    #[serde(rename = "Daily_Steps", alias = "Daily Steps")]
    pub daily_steps: i32,

    /// mmHg
    #[serde(rename = "Systolic_BP")]
    pub systolic_bp: i32,

    /// mmHg
    #[serde(rename = "Diastolic_BP")]
    pub diastolic_bp: i32,
}

impl RawRecord {
    /// Record of a well-rested, active adult. Handy base for building cases.
    pub fn healthy_baseline() -> Self {
        Self {
            age: 25,
            gender: "Female".to_string(),
            occupation: "Engineer".to_string(),
            bmi_category: "Normal".to_string(),
            sleep_duration: 8.0,
            quality_of_sleep: 5,
            stress_level: 1,
            physical_activity_level: 10,
            heart_rate: 60,
            daily_steps: 10000,
            systolic_bp: 110,
            diastolic_bp: 70,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_field_names() {
        let json = r#"{
            "Age": 25, "Gender": "Female", "Occupation": "Engineer",
            "BMI_Category": "Normal", "Sleep_Duration": 8.0, "Quality_of_Sleep": 5,
            "Stress_Level": 1, "Physical_Activity_Level": 10, "Heart_Rate": 60,
            "Daily_Steps": 10000, "Systolic_BP": 110, "Diastolic_BP": 70
        }"#;

        let record: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record, RawRecord::healthy_baseline());
    }

    #[test]
    fn test_record_rejects_wrong_types() {
        let json = r#"{
            "Age": "old", "Gender": "Female", "Occupation": "Engineer",
            "BMI_Category": "Normal", "Sleep_Duration": 8.0, "Quality_of_Sleep": 5,
            "Stress_Level": 1, "Physical_Activity_Level": 10, "Heart_Rate": 60,
            "Daily_Steps": 10000, "Systolic_BP": 110, "Diastolic_BP": 70
        }"#;

        assert!(serde_json::from_str::<RawRecord>(json).is_err());
    }

    #[test]
    fn test_record_rejects_negative_age() {
        let json = r#"{
            "Age": -3, "Gender": "Female", "Occupation": "Engineer",
            "BMI_Category": "Normal", "Sleep_Duration": 8.0, "Quality_of_Sleep": 5,
            "Stress_Level": 1, "Physical_Activity_Level": 10, "Heart_Rate": 60,
            "Daily_Steps": 10000, "Systolic_BP": 110, "Diastolic_BP": 70
        }"#;

        assert!(serde_json::from_str::<RawRecord>(json).is_err());
    }
}
