// Shared prompt fragments. Each service keeps its own prompts.rs alongside it.

/// Proposed edits are located by substring search, so the source text must be quoted exactly.
pub const VERBATIM_INSTRUCTION: &str = "\
    CRITICAL: Every `originalText` you return must be copied character for character \
    from the resume, including punctuation and capitalisation. \
    Never paraphrase, merge or abbreviate the source text. \
    Keep each `originalText` to a single line of the resume.";

/// Keeps rewrites honest about the candidate's experience.
pub const TRUTHFULNESS_INSTRUCTION: &str = "\
    CRITICAL: Only rephrase what the resume already supports. \
    Do NOT invent employers, titles, dates, metrics or technologies. \
    A keyword may only be added where the surrounding text already implies it.";
