// Shared prompt fragments used by more than one stage.
// Each stage's own template lives in pipeline::prompts.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Appended to every prompt that writes resume text.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Every claim must be traceable to the candidate profile provided below. \
    Do NOT infer, interpolate, or invent employers, dates, metrics, or skills. \
    If the profile does not support a claim, omit it entirely.";

/// Restricts which skills a draft may name.
pub const SKILL_BOUNDARY_INSTRUCTION: &str = "\
    CRITICAL: `skills_referenced` and the resume text may only name skills from the \
    ALLOWED SKILLS list. Requirements the candidate does not meet must NOT be claimed, \
    not even as familiarity.";
