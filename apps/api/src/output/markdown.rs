use crate::pipeline::stage::ResumeDraft;

/// Renders a draft as a Markdown document:
///
/// ```text
/// # {name}
///
/// {contact line}
///
/// ---
///
/// ## {section}
///
/// {content}
/// ```
///
/// Sections keep the draft's order. A `Skills` section listing the referenced skills
/// is appended when the draft has no section about skills.
pub fn to_markdown(draft: &ResumeDraft) -> String {
    let mut out = format!("# {}\n\n", draft.candidate_name.trim());
    if !draft.contact_line.trim().is_empty() {
        out.push_str(draft.contact_line.trim());
        out.push_str("\n\n");
    }
    out.push_str("---\n");

    for section in &draft.sections {
        out.push_str(&format!(
            "\n## {}\n\n{}\n",
            section.title.trim(),
            section.content.trim()
        ));
    }

    let has_skills_section = draft
        .sections
        .iter()
        .any(|s| s.title.to_lowercase().contains("skill"));
    if !has_skills_section && !draft.skills.is_empty() {
        out.push_str(&format!("\n## Skills\n\n{}\n", draft.skills.join(", ")));
    }

    out
}

/// File name offered for downloads, e.g. `jane_doe_resume_v2.md`.
pub fn file_stem(draft: &ResumeDraft) -> String {
    let name: String = draft
        .candidate_name
        .split_whitespace()
        .map(|part| {
            part.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    let name = if name.is_empty() { "candidate".to_string() } else { name };
    format!("{name}_resume_v{}", draft.version)
}
