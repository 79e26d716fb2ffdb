//! Input validation for dispatch data.
//!
//! Checks structural integrity of jobs and technician pools before they
//! enter the pipeline. Detects:
//! - Empty or duplicate IDs
//! - Missing or out-of-range job coordinates
//! - Skill levels outside 1..=3
//! - Completion rates outside 0..=1
//! - Skill levels recorded for tags the technician does not carry
//! - Technicians that can never take a job (zero capacity)
//!
//! Technician findings are advisory: the eligibility rules already reject
//! or penalize bad records, so the dispatcher only logs them.

use std::collections::HashSet;

use crate::models::{Job, Technician, MAX_SKILL_LEVEL};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// An ID is empty.
    EmptyId,
    /// Two entities share the same ID.
    DuplicateId,
    /// Job coordinates are missing, non-finite, or out of range.
    MissingCoordinates,
    /// A skill level is outside 1..=3.
    SkillLevelOutOfRange,
    /// A completion rate is outside 0..=1 or not finite.
    CompletionRateOutOfRange,
    /// A skill level is recorded for a tag the technician lacks.
    LevelWithoutTag,
    /// A technician can never hold a job.
    ZeroCapacity,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates a job before dispatch.
///
/// Checks:
/// 1. Non-empty job and company IDs
/// 2. Valid coordinates
/// 3. Minimum skill level within 1..=3
pub fn validate_job(job: &Job) -> ValidationResult {
    let mut errors = Vec::new();

    if job.id.is_empty() {
        errors.push(ValidationError::new(ValidationErrorKind::EmptyId, "Job has an empty ID"));
    }
    if job.company_id.is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::EmptyId,
            format!("Job '{}' has an empty company ID", job.id),
        ));
    }
    if job.valid_location().is_none() {
        errors.push(ValidationError::new(
            ValidationErrorKind::MissingCoordinates,
            format!("Job '{}' has no valid coordinates", job.id),
        ));
    }
    if job.minimum_skill_level == 0 || job.minimum_skill_level > MAX_SKILL_LEVEL {
        errors.push(ValidationError::new(
            ValidationErrorKind::SkillLevelOutOfRange,
            format!(
                "Job '{}' requires skill level {} (expected 1..={MAX_SKILL_LEVEL})",
                job.id, job.minimum_skill_level
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validates a technician pool.
///
/// Checks:
/// 1. No empty or duplicate technician IDs
/// 2. Every recorded skill level within 1..=3 and backed by a tag
/// 3. Completion rate within 0..=1
/// 4. Non-zero concurrent job limit
pub fn validate_technicians(technicians: &[Technician]) -> ValidationResult {
    let mut errors = Vec::new();
    let mut ids = HashSet::new();

    for tech in technicians {
        if tech.id.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::EmptyId,
                "Technician has an empty ID",
            ));
        } else if !ids.insert(tech.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate technician ID: {}", tech.id),
            ));
        }

        let mut tags: Vec<_> = tech.skill_levels.iter().collect();
        tags.sort();
        for (tag, level) in tags {
            if *level == 0 || *level > MAX_SKILL_LEVEL {
                errors.push(ValidationError::new(
                    ValidationErrorKind::SkillLevelOutOfRange,
                    format!("Technician '{}' has {tag} at level {level}", tech.id),
                ));
            }
            if !tech.has_skill(tag) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::LevelWithoutTag,
                    format!("Technician '{}' has a level for {tag} but not the tag", tech.id),
                ));
            }
        }

        let rate = tech.recent_completion_rate;
        if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
            errors.push(ValidationError::new(
                ValidationErrorKind::CompletionRateOutOfRange,
                format!("Technician '{}' has completion rate {rate}", tech.id),
            ));
        }

        if tech.max_concurrent_jobs == 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::ZeroCapacity,
                format!("Technician '{}' has a concurrent job limit of 0", tech.id),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(result: ValidationResult) -> Vec<ValidationErrorKind> {
        result.unwrap_err().into_iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_valid_job() {
        let job = Job::new("J1", "C1").with_location(33.7, -84.4);
        assert!(validate_job(&job).is_ok());
    }

    #[test]
    fn test_job_without_coordinates() {
        let job = Job::new("J1", "C1");
        assert_eq!(kinds(validate_job(&job)), vec![ValidationErrorKind::MissingCoordinates]);
    }

    #[test]
    fn test_job_out_of_range_coordinates() {
        let job = Job::new("J1", "C1").with_location(91.0, 0.0);
        assert_eq!(kinds(validate_job(&job)), vec![ValidationErrorKind::MissingCoordinates]);
    }

    #[test]
    fn test_job_bad_skill_level_and_ids() {
        let mut job = Job::new("", "").with_location(0.0, 0.0);
        job.minimum_skill_level = 4;
        let k = kinds(validate_job(&job));
        assert_eq!(k.iter().filter(|k| **k == ValidationErrorKind::EmptyId).count(), 2);
        assert!(k.contains(&ValidationErrorKind::SkillLevelOutOfRange));
    }

    #[test]
    fn test_valid_technicians() {
        let techs = vec![
            Technician::new("T1", "C1").with_skill("hvac", 2).with_performance(0.9, 12),
            Technician::new("T2", "C1").with_skill_tag("plumbing"),
        ];
        assert!(validate_technicians(&techs).is_ok());
    }

    #[test]
    fn test_duplicate_technician_ids() {
        let techs = vec![Technician::new("T1", "C1"), Technician::new("T1", "C1")];
        assert_eq!(kinds(validate_technicians(&techs)), vec![ValidationErrorKind::DuplicateId]);
    }

    #[test]
    fn test_technician_data_issues() {
        let mut tech = Technician::new("T1", "C1").with_jobs(0, 0);
        tech.skill_levels.insert("hvac".into(), 2);
        tech.skill_levels.insert("elec".into(), 0);
        tech.skills.insert("elec".into());
        tech.recent_completion_rate = 1.4;

        let k = kinds(validate_technicians(&[tech]));
        assert!(k.contains(&ValidationErrorKind::LevelWithoutTag));
        assert!(k.contains(&ValidationErrorKind::SkillLevelOutOfRange));
        assert!(k.contains(&ValidationErrorKind::CompletionRateOutOfRange));
        assert!(k.contains(&ValidationErrorKind::ZeroCapacity));
    }

    #[test]
    fn test_empty_pool_is_valid() {
        assert!(validate_technicians(&[]).is_ok());
    }
}
