use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// How to reach the candidate. Only `email` is mandatory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl ContactInfo {
    /// Single-line contact header used at the top of a resume.
    pub fn header_line(&self, portfolio_url: Option<&str>) -> String {
        [
            Some(self.email.as_str()),
            self.phone.as_deref(),
            self.location.as_deref(),
            portfolio_url,
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkExperience {
    pub company: String,
    pub position: String,
    /// Free-form period, e.g. "2019-04 – 2023-01".
    pub period: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EducationEntry {
    pub institution: String,
    pub degree: String,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalProject {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

/// The candidate's career history as submitted for one generation run.
///
/// Never mutated after submission: the orchestrator moves it into the run's
/// `StageContext` and only reads it from there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub contact: ContactInfo,
    #[serde(default)]
    pub residence: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub years_of_experience: Option<String>,
    #[serde(default)]
    pub work_experiences: Vec<WorkExperience>,
    #[serde(default)]
    pub education: Vec<EducationEntry>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub personal_projects: Vec<PersonalProject>,
    #[serde(default)]
    pub portfolio_url: Option<String>,
}

impl UserProfile {
    /// Collapses case-insensitive duplicate skills and blank entries.
    /// The first spelling of a skill wins.
    pub fn normalize_skills(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.skills = self
            .skills
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .filter(|s| seen.insert(s.to_lowercase()))
            .collect();
    }

    /// Returns the profile's own spelling of `skill`, matched case-insensitively.
    pub fn canonical_skill(&self, skill: &str) -> Option<&str> {
        let needle = skill.trim();
        self.skills
            .iter()
            .find(|s| s.eq_ignore_ascii_case(needle))
            .map(String::as_str)
    }

    pub fn contact_line(&self) -> String {
        self.contact.header_line(self.portfolio_url.as_deref())
    }

    /// Plain-text rendering handed to the stage prompts.
    pub fn to_prompt_text(&self) -> String {
        let mut out = format!("Name: {}\n", self.name);
        if let Some(title) = &self.job_title {
            let _ = writeln!(out, "Current title: {title}");
        }
        if let Some(years) = &self.years_of_experience {
            let _ = writeln!(out, "Years of experience: {years}");
        }
        if let Some(residence) = &self.residence {
            let _ = writeln!(out, "Residence: {residence}");
        }
        let _ = writeln!(out, "Skills: {}", self.skills.join(", "));

        out.push_str("\nWork experience:\n");
        for exp in &self.work_experiences {
            let _ = writeln!(out, "- {} at {} ({})", exp.position, exp.company, exp.period);
            if !exp.description.trim().is_empty() {
                let _ = writeln!(out, "  {}", exp.description.trim());
            }
        }

        if !self.education.is_empty() {
            out.push_str("\nEducation:\n");
            for edu in &self.education {
                let field = edu.field.as_deref().map(|f| format!(", {f}")).unwrap_or_default();
                let period = edu.period.as_deref().map(|p| format!(" ({p})")).unwrap_or_default();
                let _ = writeln!(out, "- {}{field}, {}{period}", edu.degree, edu.institution);
            }
        }

        if !self.personal_projects.is_empty() {
            out.push_str("\nPersonal projects:\n");
            for proj in &self.personal_projects {
                let _ = writeln!(out, "- {}: {}", proj.title, proj.description.trim());
                if !proj.technologies.is_empty() {
                    let _ = writeln!(out, "  Technologies: {}", proj.technologies.join(", "));
                }
            }
        }

        if let Some(url) = &self.portfolio_url {
            let _ = writeln!(out, "\nPortfolio: {url}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_with_skills(skills: &[&str]) -> UserProfile {
        UserProfile {
            name: "Jane Doe".to_string(),
            contact: ContactInfo {
                email: "jane@example.com".to_string(),
                ..Default::default()
            },
            residence: None,
            job_title: None,
            years_of_experience: None,
            work_experiences: vec![],
            education: vec![],
            skills: skills.iter().map(|s| s.to_string()).collect(),
            personal_projects: vec![],
            portfolio_url: None,
        }
    }

    #[test]
    fn test_normalize_skills_dedups_case_insensitively() {
        let mut profile = profile_with_skills(&["Go", " go ", "SQL", "", "sql", "Rust"]);
        profile.normalize_skills();
        assert_eq!(profile.skills, vec!["Go", "SQL", "Rust"]);
    }

    #[test]
    fn test_canonical_skill_returns_profile_spelling() {
        let profile = profile_with_skills(&["PostgreSQL"]);
        assert_eq!(profile.canonical_skill("postgresql"), Some("PostgreSQL"));
        assert_eq!(profile.canonical_skill("MySQL"), None);
    }

    #[test]
    fn test_contact_line_skips_missing_parts() {
        let mut profile = profile_with_skills(&[]);
        profile.contact.location = Some("Berlin".to_string());
        profile.portfolio_url = Some("https://github.com/jane".to_string());
        assert_eq!(
            profile.contact_line(),
            "jane@example.com | Berlin | https://github.com/jane"
        );
    }

    #[test]
    fn test_profile_deserializes_with_defaults() {
        let json = r#"{"name": "Jane Doe", "contact": {"email": "jane@example.com"}}"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert!(profile.work_experiences.is_empty());
        assert!(profile.skills.is_empty());
        assert!(profile.contact.phone.is_none());
    }
}
