use serde::Deserialize;

use crate::models::posting::JobPosting;
use crate::models::profile::UserProfile;
use crate::pipeline::error::PipelineError;

/// Request body for `POST /api/v1/runs`.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationRequest {
    pub profile: UserProfile,
    pub posting: JobPosting,
}

impl GenerationRequest {
    /// Checks every required field and reports all problems at once.
    /// A posting needs only its description.
    /// On success the profile's skills are normalised.
    pub fn validate(mut self) -> Result<(UserProfile, JobPosting), PipelineError> {
        let mut problems = Vec::new();
        let profile = &mut self.profile;
        let posting = &self.posting;

        if profile.name.trim().is_empty() {
            problems.push("name is required".to_string());
        }
        let email = profile.contact.email.trim();
        if email.is_empty() {
            problems.push("contact email is required".to_string());
        } else if !email.contains('@') {
            problems.push(format!("contact email '{email}' is not a valid address"));
        }
        if profile.work_experiences.is_empty() {
            problems.push("at least one work experience is required".to_string());
        }
        for (i, exp) in profile.work_experiences.iter().enumerate() {
            if exp.company.trim().is_empty() || exp.position.trim().is_empty() {
                problems.push(format!(
                    "work experience #{} needs both company and position",
                    i + 1
                ));
            }
        }

        profile.normalize_skills();
        if profile.skills.is_empty() {
            problems.push("at least one skill is required".to_string());
        }

        // Title and company name are optional; the posting text alone is enough.
        if posting.description.trim().is_empty() {
            problems.push("job posting description is required".to_string());
        }

        if problems.is_empty() {
            Ok((self.profile, self.posting))
        } else {
            Err(PipelineError::IncompleteInput(problems))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::{backend_posting, jane_doe};

    #[test]
    fn test_complete_request_passes_and_normalises_skills() {
        let mut profile = jane_doe();
        profile.skills.push("go".to_string());
        let (profile, _) = GenerationRequest {
            profile,
            posting: backend_posting(),
        }
        .validate()
        .unwrap();
        assert_eq!(profile.skills, vec!["Go", "SQL"]);
    }

    #[test]
    fn test_every_missing_field_is_reported() {
        let request = GenerationRequest {
            profile: UserProfile {
                name: " ".to_string(),
                ..jane_doe()
            },
            posting: JobPosting::default(),
        };
        let Err(PipelineError::IncompleteInput(problems)) = request.validate() else {
            panic!("expected IncompleteInput");
        };
        assert_eq!(
            problems,
            vec!["name is required", "job posting description is required"]
        );
    }

    #[test]
    fn test_text_only_posting_is_accepted() {
        let posting = JobPosting {
            title: None,
            company_name: None,
            ..backend_posting()
        };
        let (_, posting) = GenerationRequest {
            profile: jane_doe(),
            posting,
        }
        .validate()
        .unwrap();
        assert!(posting.title.is_none());
        assert!(posting.company_name.is_none());
    }

    #[test]
    fn test_invalid_email_and_empty_skills_are_rejected() {
        let mut profile = jane_doe();
        profile.contact.email = "jane.example.com".to_string();
        profile.skills = vec!["  ".to_string()];
        profile.work_experiences.clear();

        let Err(PipelineError::IncompleteInput(problems)) = GenerationRequest {
            profile,
            posting: backend_posting(),
        }
        .validate() else {
            panic!("expected IncompleteInput");
        };
        assert_eq!(problems.len(), 3);
        assert!(problems[0].contains("not a valid address"));
        assert!(problems.iter().any(|p| p.contains("work experience")));
        assert!(problems.iter().any(|p| p.contains("skill")));
    }
}
