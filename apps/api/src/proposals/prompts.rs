// LLM prompt constants for the Proposals module.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::llm_client::prompts::{TRUTHFULNESS_INSTRUCTION, VERBATIM_INSTRUCTION};

/// System prompt for keyword extraction.
pub const KEYWORD_SYSTEM: &str = "You are an Applicant Tracking System analyst. \
    You identify the skills, tools and qualifications a job description screens for. \
    You MUST respond with valid JSON only: a JSON array of strings. \
    Do NOT include any text outside the JSON array. \
    Do NOT use markdown code fences.";

/// Keyword extraction prompt. Replace `{jd_text}` and `{resume_text}` before sending.
pub const KEYWORD_PROMPT_TEMPLATE: &str = r#"List the keywords an Applicant Tracking System would screen for in the job description below.

Rules:
- Prefer concrete skills, tools, languages, frameworks, certifications and domain terms.
- Use the spelling from the job description.
- At most 25 keywords, most important first.
- Include keywords whether or not the resume already mentions them.

Return a JSON array, for example: ["Rust", "Kubernetes", "distributed systems"]

JOB DESCRIPTION:
{jd_text}

RESUME:
{resume_text}"#;

/// System prompt for change proposals.
pub const PROPOSAL_SYSTEM: &str = "You are an expert resume editor tailoring a resume \
    to a job description with small, targeted edits. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Change proposal prompt.
/// Replace: {verbatim_instruction}, {truthfulness_instruction}, {keywords_json},
///          {jd_text}, {resume_text}
pub const PROPOSAL_PROMPT_TEMPLATE: &str = r#"{verbatim_instruction}

{truthfulness_instruction}

Propose edits that work the target keywords into the resume where they fit naturally.
Each edit replaces one fragment of the resume with an improved version of similar length.

Return a JSON object with this EXACT schema:
{
  "changes": [
    {
      "id": "change-1",
      "originalText": "Used SQL for reporting.",
      "modifiedText": "Used PostgreSQL for reporting.",
      "context": "Experience > Data Analyst",
      "changeType": "keyword",
      "keywords": ["PostgreSQL"]
    }
  ]
}

changeType is one of:
- "keyword": adds a target keyword with minimal rewording
- "phrasing": rewords for clarity or impact without new keywords
- "enhancement": strengthens the line with detail already implied by the resume

Propose at most 12 changes. Never propose two changes for the same originalText.

TARGET KEYWORDS:
{keywords_json}

JOB DESCRIPTION:
{jd_text}

RESUME:
{resume_text}"#;

pub fn build_keyword_prompt(resume_text: &str, job_description: &str) -> String {
    KEYWORD_PROMPT_TEMPLATE
        .replace("{jd_text}", job_description)
        .replace("{resume_text}", resume_text)
}

pub fn build_proposal_prompt(resume_text: &str, job_description: &str, keywords: &[String]) -> String {
    let keywords_json = serde_json::to_string(keywords).unwrap_or_else(|_| "[]".to_string());
    PROPOSAL_PROMPT_TEMPLATE
        .replace("{verbatim_instruction}", VERBATIM_INSTRUCTION)
        .replace("{truthfulness_instruction}", TRUTHFULNESS_INSTRUCTION)
        .replace("{keywords_json}", &keywords_json)
        .replace("{jd_text}", job_description)
        .replace("{resume_text}", resume_text)
}
