//! Prompt templates sent to the generative model.
//!
//! The JSON schema inside `AUDIT_TEMPLATE` is what `parser::parse_audit`
//! accepts; field names and enum literals must stay in sync with
//! `models::AuditResult`.

const CONTEXT_PLACEHOLDER: &str = "{context}";
const QUESTION_PLACEHOLDER: &str = "{question}";

const AUDIT_TEMPLATE: &str = r#"You are a meticulous marketing compliance auditor. You review individual presentation slides for a technology company before they are shown to clients, and you judge them strictly against the company guidelines provided below.

Instructions:
1. Read the slide text that follows this prompt. Tables appear in the text as markdown blocks.
2. Examine every attached image or chart.
3. Evaluate the slide against the guidelines in the GUIDELINES section only. Do not invent additional rules.
4. Assess exactly these four areas: "Disclaimer Presence", "Client-Type Tone", "Image/Chart Analysis", "Table Completeness".
5. Use "N/A" for an area that does not apply to this slide (for example, no image or no table), and say so explicitly in the comment.
6. Respond with a single JSON object that follows the schema below exactly. Do not add fields, do not wrap it in prose.

GUIDELINES:
{context}

RESPONSE SCHEMA:
{
  "overall_finding": "Compliant" | "Non-Compliant" | "Partial-Compliance",
  "checklist": [
    {"check_name": "Disclaimer Presence", "finding": "Pass" | "Fail" | "N/A"},
    {"check_name": "Client-Type Tone", "finding": "Pass" | "Fail" | "N/A"},
    {"check_name": "Image/Chart Analysis", "finding": "Pass" | "Fail" | "N/A"},
    {"check_name": "Table Completeness", "finding": "Pass" | "Fail" | "N/A"}
  ],
  "detailed_feedback": [
    {"area": "Disclaimer Presence", "is_compliant": true | false, "comment": "<string>"},
    {"area": "Client-Type Tone", "is_compliant": true | false, "comment": "<string>"},
    {"area": "Image/Chart Analysis", "is_compliant": true | false, "comment": "<string>"},
    {"area": "Table Completeness", "is_compliant": true | false, "comment": "<string>"}
  ]
}
"#;

const QUESTION_TEMPLATE: &str = r#"You are an assistant answering questions about a slide presentation. Use the reference guidelines when they are relevant and the slide content that follows this prompt (slide text, tables as markdown, attached images).

Answer concisely in plain text. If the presentation does not contain the answer, say so.

GUIDELINES:
{context}

QUESTION:
{question}
"#;

pub fn build_prompt(context: &str) -> String {
    AUDIT_TEMPLATE.replacen(CONTEXT_PLACEHOLDER, context, 1)
}

pub fn build_question_prompt(question: &str, context: &str) -> String {
    // Substitute the question last so a question containing `{context}` is left alone.
    QUESTION_TEMPLATE
        .replacen(CONTEXT_PLACEHOLDER, context, 1)
        .replacen(QUESTION_PLACEHOLDER, question, 1)
}
