//! Record validation.
//!
//! Every repository write runs the matching validator first. A validator has no
//! side effects and never touches the store; it checks field formats and ranges
//! and reports every failed rule at once in a [`ValidationError`].

use crate::constants::{LOWEST_LAB_PRIORITY, MAX_FREE_TEXT_LEN};
use crate::error::{ErrorList, ValidationError};
use crate::records::{LabProcedure, OfficeVisit, Prescription};
use clinrec_types::NonEmptyText;
use once_cell::sync::Lazy;
use regex::Regex;

/// Patient MIDs: one to ten digits, leading digit 1-8 (MIDs starting with 9 belong to staff).
static PATIENT_MID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[1-8][0-9]{0,9}$").expect("patient MID pattern is valid"));

/// National drug codes: up to five digits, optionally followed by `-` and up to four digits.
static NDC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{1,5}(-[0-9]{1,4})?$").expect("NDC pattern is valid"));

/// Systolic/diastolic reading such as `120/80`.
static BLOOD_PRESSURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{1,3}/[0-9]{1,3}$").expect("blood pressure pattern is valid"));

/// Returns true if `mid` has the platform's patient MID format.
///
/// Lookups keyed by a patient MID call this before issuing a query so that a
/// malformed identifier never reaches the store.
pub fn is_patient_mid(mid: i64) -> bool {
    PATIENT_MID.is_match(&mid.to_string())
}

/// Returns true if `code` is a well-formed national drug code.
pub fn is_drug_code(code: &str) -> bool {
    NDC.is_match(code)
}

fn check_free_text(errors: &mut ErrorList, field: &'static str, value: Option<&str>) {
    // Blank free text is allowed; only the stored length is bounded.
    if value.is_some_and(|v| v.chars().count() > MAX_FREE_TEXT_LEN) {
        errors.push(
            field,
            format!("must be at most {MAX_FREE_TEXT_LEN} characters"),
        );
    }
}

fn check_measurement(errors: &mut ErrorList, field: &'static str, value: Option<f32>) {
    if let Some(v) = value {
        if !(v > 0.0 && v <= 999.9) {
            errors.push(field, "must be greater than 0 and at most 999.9");
        }
    }
}

fn check_range(
    errors: &mut ErrorList,
    field: &'static str,
    value: Option<i32>,
    range: std::ops::RangeInclusive<i32>,
) {
    if let Some(v) = value {
        if !range.contains(&v) {
            errors.push(
                field,
                format!("must be between {} and {}", range.start(), range.end()),
            );
        }
    }
}

/// Validates an office visit before it is added or updated.
///
/// # Errors
///
/// Returns a [`ValidationError`] listing every rule the visit breaks:
/// - patient MID missing or not in patient MID format,
/// - date missing,
/// - location missing or blank,
/// - appointment type missing,
/// - notes longer than the free-text limit,
/// - a recorded measurement outside its clinical range.
pub fn validate_office_visit(visit: &OfficeVisit) -> Result<(), ValidationError> {
    let mut errors = ErrorList::default();

    match visit.patient_mid {
        None => errors.push("patientMID", "is required"),
        Some(mid) if !is_patient_mid(mid) => {
            errors.push("patientMID", "must be a patient MID (1-10 digits, not starting with 0 or 9)")
        }
        Some(_) => {}
    }

    if visit.date.is_none() {
        errors.push("date", "is required");
    }

    match visit.location_id.as_deref().map(NonEmptyText::new) {
        None | Some(Err(_)) => errors.push("locationID", "is required"),
        Some(Ok(_)) => {}
    }

    if visit.appt_type_id.is_none() {
        errors.push("apptTypeID", "is required");
    }

    check_free_text(&mut errors, "notes", visit.notes.as_deref());

    check_measurement(&mut errors, "height", visit.height);
    check_measurement(&mut errors, "length", visit.length);
    check_measurement(&mut errors, "weight", visit.weight);
    check_measurement(&mut errors, "headCircumference", visit.head_circumference);

    if let Some(bp) = visit.blood_pressure.as_deref() {
        if !BLOOD_PRESSURE.is_match(bp) {
            errors.push("bloodPressure", "must be systolic/diastolic, e.g. 120/80");
        }
    }

    check_range(&mut errors, "hdl", visit.hdl, 0..=89);
    check_range(&mut errors, "ldl", visit.ldl, 0..=600);
    check_range(&mut errors, "triglyceride", visit.triglyceride, 100..=600);
    check_range(
        &mut errors,
        "householdSmokingStatus",
        visit.household_smoking_status,
        0..=3,
    );
    check_range(
        &mut errors,
        "patientSmokingStatus",
        visit.patient_smoking_status,
        0..=10,
    );

    errors.into_result()
}

/// Validates a lab procedure before it is added or updated.
///
/// Status is a closed enum and cannot be invalid here.
///
/// # Errors
///
/// Returns a [`ValidationError`] if the office visit id or a present technician id is not
/// positive, the priority is missing or outside `1..=3`, or commentary/results exceed the
/// free-text limit.
pub fn validate_lab_procedure(procedure: &LabProcedure) -> Result<(), ValidationError> {
    let mut errors = ErrorList::default();

    if procedure.office_visit_id <= 0 {
        errors.push("officeVisitID", "must be a positive visit id");
    }

    if matches!(procedure.lab_technician_id, Some(id) if id <= 0) {
        errors.push("labTechnicianID", "must be a positive technician id");
    }

    match procedure.priority {
        None => errors.push("priority", "is required"),
        Some(p) if !(1..=LOWEST_LAB_PRIORITY).contains(&p) => errors.push(
            "priority",
            format!("must be between 1 and {LOWEST_LAB_PRIORITY}"),
        ),
        Some(_) => {}
    }

    check_free_text(&mut errors, "commentary", procedure.commentary.as_deref());
    check_free_text(&mut errors, "results", procedure.results.as_deref());

    errors.into_result()
}

/// Validates a prescription before it is added or updated.
///
/// The start/end date ordering is not checked.
///
/// # Errors
///
/// Returns a [`ValidationError`] if the patient MID or drug code is malformed, or the
/// office visit id is not positive.
pub fn validate_prescription(prescription: &Prescription) -> Result<(), ValidationError> {
    let mut errors = ErrorList::default();

    if !is_patient_mid(prescription.patient_mid) {
        errors.push("patientMID", "must be a patient MID");
    }

    if !is_drug_code(prescription.code()) {
        errors.push("drugCode", "must be a national drug code, e.g. 00904-2407");
    }

    if prescription.office_visit_id <= 0 {
        errors.push("officeVisitId", "must be a positive visit id");
    }

    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::DrugCode;
    use chrono::NaiveDate;

    fn valid_visit() -> OfficeVisit {
        let date = NaiveDate::from_ymd_opt(2020, 3, 14)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        OfficeVisit::new(1, date, "1", 1)
    }

    fn valid_procedure() -> LabProcedure {
        LabProcedure {
            priority: Some(2),
            ..LabProcedure::new(1)
        }
    }

    #[test]
    fn patient_mid_format() {
        assert!(is_patient_mid(1));
        assert!(is_patient_mid(42));
        assert!(is_patient_mid(8_999_999_999));
        assert!(!is_patient_mid(0));
        assert!(!is_patient_mid(-1));
        assert!(!is_patient_mid(9_000_000_000));
        assert!(!is_patient_mid(11_111_111_111));
    }

    #[test]
    fn drug_code_format() {
        assert!(is_drug_code("00904-2407"));
        assert!(is_drug_code("64764"));
        assert!(!is_drug_code("649764-1"));
        assert!(!is_drug_code("abc"));
        assert!(!is_drug_code(""));
    }

    #[test]
    fn valid_visit_passes() {
        assert!(validate_office_visit(&valid_visit()).is_ok());
    }

    #[test]
    fn visit_reports_every_failed_rule() {
        let visit = OfficeVisit {
            location_id: Some("   ".into()),
            hdl: Some(90),
            blood_pressure: Some("120-80".into()),
            ..OfficeVisit::default()
        };
        let err = validate_office_visit(&visit).unwrap_err();
        for field in ["patientMID", "date", "locationID", "apptTypeID", "hdl", "bloodPressure"] {
            assert!(err.has_field(field), "expected failure on {field}: {err}");
        }
        assert_eq!(err.errors().len(), 6);
    }

    #[test]
    fn visit_rejects_staff_mid() {
        let visit = OfficeVisit {
            patient_mid: Some(9_000_000_000),
            ..valid_visit()
        };
        let err = validate_office_visit(&visit).unwrap_err();
        assert!(err.has_field("patientMID"));
    }

    #[test]
    fn visit_measurement_bounds() {
        let visit = OfficeVisit {
            height: Some(0.0),
            weight: Some(1000.0),
            ldl: Some(600),
            triglyceride: Some(99),
            patient_smoking_status: Some(11),
            ..valid_visit()
        };
        let err = validate_office_visit(&visit).unwrap_err();
        assert!(err.has_field("height"));
        assert!(err.has_field("weight"));
        assert!(!err.has_field("ldl"));
        assert!(err.has_field("triglyceride"));
        assert!(err.has_field("patientSmokingStatus"));
    }

    #[test]
    fn visit_notes_length_is_bounded() {
        let visit = OfficeVisit {
            notes: Some("x".repeat(MAX_FREE_TEXT_LEN + 1)),
            ..valid_visit()
        };
        assert!(validate_office_visit(&visit).unwrap_err().has_field("notes"));

        let visit = OfficeVisit {
            notes: Some(String::new()),
            ..valid_visit()
        };
        assert!(validate_office_visit(&visit).is_ok());

        // Trailing whitespace is stored, so it counts towards the limit.
        let visit = OfficeVisit {
            notes: Some(format!("{}  ", "x".repeat(MAX_FREE_TEXT_LEN))),
            ..valid_visit()
        };
        assert!(validate_office_visit(&visit).unwrap_err().has_field("notes"));

        let visit = OfficeVisit {
            notes: Some("é".repeat(MAX_FREE_TEXT_LEN)),
            ..valid_visit()
        };
        assert!(validate_office_visit(&visit).is_ok());
    }

    #[test]
    fn lab_procedure_rules() {
        assert!(validate_lab_procedure(&valid_procedure()).is_ok());

        let proc = LabProcedure {
            priority: Some(4),
            lab_technician_id: Some(0),
            office_visit_id: 0,
            ..LabProcedure::new(0)
        };
        let err = validate_lab_procedure(&proc).unwrap_err();
        assert!(err.has_field("priority"));
        assert!(err.has_field("labTechnicianID"));
        assert!(err.has_field("officeVisitID"));

        let proc = LabProcedure {
            priority: None,
            ..valid_procedure()
        };
        assert!(validate_lab_procedure(&proc).unwrap_err().has_field("priority"));
    }

    #[test]
    fn prescription_dates_are_not_checked() {
        let p = Prescription {
            id: None,
            patient_mid: 1,
            drug_code: DrugCode::new("00904-2407", ""),
            start_date: NaiveDate::from_ymd_opt(2020, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            office_visit_id: 1,
        };
        assert!(validate_prescription(&p).is_ok());

        let bad = Prescription {
            patient_mid: 9_000_000_001,
            drug_code: DrugCode::new("not-a-code", ""),
            ..p
        };
        let err = validate_prescription(&bad).unwrap_err();
        assert!(err.has_field("patientMID"));
        assert!(err.has_field("drugCode"));
    }
}
