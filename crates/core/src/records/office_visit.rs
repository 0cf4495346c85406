use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A clinical encounter between a patient and a clinician.
///
/// Every clinical measurement is independently optional: `None` means "not
/// recorded", which is different from a recorded zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OfficeVisit {
    pub visit_id: Option<i64>,
    pub patient_mid: Option<i64>,
    pub date: Option<NaiveDateTime>,
    pub location_id: Option<String>,
    pub appt_type_id: Option<i64>,
    pub notes: Option<String>,
    pub send_bill: Option<bool>,
    pub height: Option<f32>,
    pub length: Option<f32>,
    pub weight: Option<f32>,
    pub head_circumference: Option<f32>,
    pub blood_pressure: Option<String>,
    pub hdl: Option<i32>,
    pub triglyceride: Option<i32>,
    pub ldl: Option<i32>,
    pub household_smoking_status: Option<i32>,
    pub patient_smoking_status: Option<i32>,
}

impl Default for OfficeVisit {
    fn default() -> Self {
        Self {
            visit_id: None,
            patient_mid: None,
            date: None,
            location_id: None,
            appt_type_id: None,
            notes: None,
            send_bill: Some(true),
            height: None,
            length: None,
            weight: None,
            head_circumference: None,
            blood_pressure: None,
            hdl: None,
            triglyceride: None,
            ldl: None,
            household_smoking_status: None,
            patient_smoking_status: None,
        }
    }
}

impl OfficeVisit {
    /// Creates a visit for `patient_mid` with billing enabled.
    pub fn new(
        patient_mid: i64,
        date: NaiveDateTime,
        location_id: impl Into<String>,
        appt_type_id: i64,
    ) -> Self {
        Self {
            patient_mid: Some(patient_mid),
            date: Some(date),
            location_id: Some(location_id.into()),
            appt_type_id: Some(appt_type_id),
            ..Self::default()
        }
    }

    /// Billing flag as persisted; an unset flag is stored as `true`.
    pub fn sends_bill(&self) -> bool {
        self.send_bill.unwrap_or(true)
    }
}
