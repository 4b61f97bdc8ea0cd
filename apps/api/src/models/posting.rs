use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// Structured company details that travel with a posting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub culture: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
}

/// The target role. `description` is the raw posting text and the source of truth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub company: CompanyProfile,
}

impl JobPosting {
    pub fn to_prompt_text(&self) -> String {
        let mut out = String::new();
        if let Some(title) = &self.title {
            let _ = writeln!(out, "Title: {title}");
        }
        if let Some(company) = &self.company_name {
            let _ = writeln!(out, "Company: {company}");
        }
        out.push('\n');
        out.push_str(self.description.trim());
        out
    }

    /// Company-profile block. Falls back to the company name alone when no
    /// structured details were submitted.
    pub fn company_profile_text(&self) -> String {
        let mut out = format!(
            "Company name: {}\n",
            self.company_name.as_deref().unwrap_or("(unknown)")
        );
        let c = &self.company;
        if let Some(industry) = &c.industry {
            let _ = writeln!(out, "Industry: {industry}");
        }
        if let Some(size) = &c.size {
            let _ = writeln!(out, "Size: {size}");
        }
        if let Some(culture) = &c.culture {
            let _ = writeln!(out, "Culture: {culture}");
        }
        if !c.values.is_empty() {
            let _ = writeln!(out, "Values: {}", c.values.join(", "));
        }
        out
    }

    /// Text used to query the retrieval store for similar postings.
    pub fn retrieval_query(&self) -> String {
        [
            self.title.as_deref().unwrap_or_default(),
            self.company_name.as_deref().unwrap_or_default(),
            self.description.trim(),
        ]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
    }

    /// Lowercased, underscore-joined company name used as a source-id prefix.
    pub fn company_slug(&self) -> String {
        self.company_name
            .as_deref()
            .unwrap_or("unknown")
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
    }
}
