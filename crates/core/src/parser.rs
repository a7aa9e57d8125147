use crate::error::AuditError;
use crate::models::{AuditResult, CheckArea};
use std::collections::HashSet;

/// Removes surrounding whitespace and markdown code fences from a model reply.
pub fn strip_fences(raw: &str) -> String {
    raw.trim()
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Parses a model reply into an `AuditResult`, rejecting replies that do not
/// cover exactly the four check areas.
pub fn parse_audit(raw: &str) -> Result<AuditResult, AuditError> {
    let cleaned = strip_fences(raw);
    let result: AuditResult =
        serde_json::from_str(&cleaned).map_err(|e| AuditError::Parse(e.to_string()))?;

    check_areas("checklist", result.checklist.iter().map(|c| c.check_name.as_str()))?;
    check_areas("detailed_feedback", result.detailed_feedback.iter().map(|f| f.area.as_str()))?;
    Ok(result)
}

fn check_areas<'a>(field: &str, labels: impl Iterator<Item = &'a str>) -> Result<(), AuditError> {
    let mut seen = HashSet::new();
    for label in labels {
        let area = CheckArea::from_label(label)
            .ok_or_else(|| AuditError::Parse(format!("{field}: unknown check area {label:?}")))?;
        if !seen.insert(area) {
            return Err(AuditError::Parse(format!(
                "{field}: duplicate check area {label:?}"
            )));
        }
    }
    if let Some(missing) = CheckArea::ALL.iter().find(|a| !seen.contains(a)) {
        return Err(AuditError::Parse(format!(
            "{field}: missing check area {:?}",
            missing.label()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CheckFinding, OverallFinding};

    const VALID: &str = r#"{
      "overall_finding": "Partial-Compliance",
      "checklist": [
        {"check_name": "Disclaimer Presence", "finding": "Fail"},
        {"check_name": "Client-Type Tone", "finding": "Pass"},
        {"check_name": "Image/Chart Analysis", "finding": "N/A"},
        {"check_name": "Table Completeness", "finding": "N/A"}
      ],
      "detailed_feedback": [
        {"area": "Disclaimer Presence", "is_compliant": false, "comment": "No disclaimer."},
        {"area": "Client-Type Tone", "is_compliant": true, "comment": "Neutral tone."},
        {"area": "Image/Chart Analysis", "is_compliant": true, "comment": "No image on slide."},
        {"area": "Table Completeness", "is_compliant": true, "comment": "No table on slide."}
      ]
    }"#;

    #[test]
    fn parses_plain_json() {
        let result = parse_audit(VALID).unwrap();
        assert_eq!(result.overall_finding, OverallFinding::PartialCompliance);
        assert_eq!(
            result.finding_for(CheckArea::ImageChartAnalysis),
            Some(CheckFinding::NotApplicable)
        );
        assert!(!result.feedback_for(CheckArea::DisclaimerPresence).unwrap().is_compliant);
    }

    #[test]
    fn fenced_reply_parses_like_unfenced() {
        let fenced = format!("\n  ```json\n{}\n```  \n", VALID);
        assert_eq!(parse_audit(&fenced).unwrap(), parse_audit(VALID).unwrap());
        let bare_fence = format!("```\n{}\n```", VALID);
        assert_eq!(parse_audit(&bare_fence).unwrap(), parse_audit(VALID).unwrap());
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(parse_audit("not json"), Err(AuditError::Parse(_))));
        assert!(matches!(
            parse_audit(r#"{"overall_finding": "Compliant"}"#),
            Err(AuditError::Parse(_))
        ));
    }

    #[test]
    fn unknown_enum_literal_is_rejected() {
        let bad = VALID.replace("\"Partial-Compliance\"", "\"Mostly Fine\"");
        assert!(matches!(parse_audit(&bad), Err(AuditError::Parse(_))));
    }

    #[test]
    fn area_set_must_be_exact() {
        let missing = VALID.replace(
            "        {\"check_name\": \"Table Completeness\", \"finding\": \"N/A\"}\n",
            "",
        );
        let missing = missing.replace(
            "{\"check_name\": \"Image/Chart Analysis\", \"finding\": \"N/A\"},",
            "{\"check_name\": \"Image/Chart Analysis\", \"finding\": \"N/A\"}",
        );
        let err = parse_audit(&missing).unwrap_err().to_string();
        assert!(err.contains("missing check area"), "{err}");

        let duplicate = VALID.replace("\"check_name\": \"Client-Type Tone\"", "\"check_name\": \"Disclaimer Presence\"");
        let err = parse_audit(&duplicate).unwrap_err().to_string();
        assert!(err.contains("duplicate"), "{err}");

        let extra = VALID.replace("\"area\": \"Client-Type Tone\"", "\"area\": \"Font Size\"");
        let err = parse_audit(&extra).unwrap_err().to_string();
        assert!(err.contains("unknown check area"), "{err}");
    }
}
