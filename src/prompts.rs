//! Prompts sent to the LLM by each transformer.
//!
//! Every prompt lives here so unit tests can inspect them without a model,
//! and so the wording can change without touching parsing or retry logic.

/// The six compliance rules every Act is checked against, in report order.
pub const LEGAL_DOCUMENT_RULES: [&str; 6] = [
    "Act must define key terms",
    "Act must specify eligibility criteria",
    "Act must specify what the authority (government) must do",
    "Act must list penalties or enforcement methods",
    "Act must explain how to calculate payments",
    "Act must require records or reporting",
];

/// Section keys requested from the section extractor, in report order.
pub const SECTION_KEYS: [&str; 7] = [
    "definitions",
    "obligations",
    "responsibilities",
    "eligibility",
    "payments",
    "penalties",
    "record_keeping",
];

/// Separator placed between chunk summaries before they are combined.
pub const SUMMARY_SEPARATOR: &str = "\n\n";

/// Ask for a short bullet summary of one chunk.
pub fn chunk_summary_prompt(chunk: &str) -> String {
    format!("Summarize the following text in 3–4 bullet points:\n\n{chunk}\n")
}

/// Ask for the executive summary built from the chunk summaries.
pub fn combine_prompt(chunk_summaries: &[String]) -> String {
    let combined = chunk_summaries.join(SUMMARY_SEPARATOR);
    format!(
        "Using these sub-summaries, create one final summary (5–10 bullet points) covering:\n\
         - Purpose\n\
         - Definitions\n\
         - Eligibility\n\
         - Obligations\n\
         - Enforcement\n\
         \n\
         Sub-summaries:\n\
         {combined}\n"
    )
}

/// Ask for the seven named sections as a JSON object.
pub fn section_prompt(text: &str) -> String {
    format!(
        r#"Extract the following from the Act text:

- Definitions
- Obligations
- Responsibilities
- Eligibility
- Payments
- Penalties
- Record-keeping

Return JSON exactly in this format:
{{
  "definitions": "...",
  "obligations": "...",
  "responsibilities": "...",
  "eligibility": "...",
  "payments": "...",
  "penalties": "...",
  "record_keeping": "..."
}}

Act text:
{text}
"#
    )
}

/// Ask for one verdict per fixed rule as a JSON array.
pub fn rule_check_prompt(text: &str) -> String {
    let numbered = LEGAL_DOCUMENT_RULES
        .iter()
        .enumerate()
        .map(|(i, rule)| format!("{}. {}", i + 1, rule))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Analyze the following legal document/Act text and check if it follows these {count} specific rules:

{numbered}

For each rule, determine if it 'passes' or 'fails', extract the specific text snippet (evidence) that proves it, and give a confidence score (0-100).

Return the results as a JSON array exactly in this format, with one object per rule in the order listed above:
[
  {{
    "rule": "Act must define key terms",
    "status": "pass",
    "evidence": "Section 2 - Definitions: 'In this Act, unless the context otherwise requires...'",
    "confidence": 95
  }},
  {{
    "rule": "Act must specify eligibility criteria",
    "status": "pass",
    "evidence": "Section 4 - Eligibility: 'A person is eligible if they are over 18...'",
    "confidence": 90
  }}
]

Legal document/Act text:
{text}
"#,
        count = LEGAL_DOCUMENT_RULES.len(),
    )
}
