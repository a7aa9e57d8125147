use crate::error::AuditError;
use crate::models::{slide_key, AuditResult, OverallFinding};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlideFailure {
    pub stage: String,
    pub message: String,
}

impl From<&AuditError> for SlideFailure {
    fn from(e: &AuditError) -> Self {
        Self {
            stage: e.stage().to_string(),
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SlideEntry {
    Audited(AuditResult),
    Failed { error: SlideFailure },
}

/// Per-slide results keyed `slide_N`, in the order slides were added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditReport {
    entries: Vec<(String, SlideEntry)>,
}

impl AuditReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_result(&mut self, slide_number: usize, result: AuditResult) {
        self.entries
            .push((slide_key(slide_number), SlideEntry::Audited(result)));
    }

    pub fn insert_failure(&mut self, slide_number: usize, failure: SlideFailure) {
        self.entries
            .push((slide_key(slide_number), SlideEntry::Failed { error: failure }));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&SlideEntry> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, e)| e)
    }

    pub fn result(&self, key: &str) -> Option<&AuditResult> {
        match self.get(key)? {
            SlideEntry::Audited(result) => Some(result),
            SlideEntry::Failed { .. } => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SlideEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    pub fn summary(&self, total_slides: usize) -> ReportSummary {
        let mut summary = ReportSummary {
            total_slides,
            ..Default::default()
        };
        for (_, entry) in &self.entries {
            match entry {
                SlideEntry::Audited(r) => match r.overall_finding {
                    OverallFinding::Compliant => summary.compliant += 1,
                    OverallFinding::NonCompliant => summary.non_compliant += 1,
                    OverallFinding::PartialCompliance => summary.partial += 1,
                },
                SlideEntry::Failed { .. } => summary.failed += 1,
            }
        }
        summary.not_reported = total_slides.saturating_sub(self.entries.len());
        summary
    }

    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for AuditReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, entry) in &self.entries {
            map.serialize_entry(key, entry)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total_slides: usize,
    pub compliant: usize,
    pub non_compliant: usize,
    pub partial: usize,
    pub failed: usize,
    /// Slides with no entry: skipped, or failed under the omit policy.
    pub not_reported: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CheckArea, CheckFinding, ChecklistItem, FeedbackItem};

    fn result(finding: OverallFinding) -> AuditResult {
        AuditResult {
            overall_finding: finding,
            checklist: CheckArea::ALL
                .iter()
                .map(|a| ChecklistItem {
                    check_name: a.label().into(),
                    finding: CheckFinding::Pass,
                })
                .collect(),
            detailed_feedback: CheckArea::ALL
                .iter()
                .map(|a| FeedbackItem {
                    area: a.label().into(),
                    is_compliant: true,
                    comment: "ok".into(),
                })
                .collect(),
        }
    }

    #[test]
    fn serializes_in_insertion_order() {
        let mut report = AuditReport::new();
        report.insert_result(2, result(OverallFinding::Compliant));
        report.insert_result(10, result(OverallFinding::NonCompliant));
        let json = report.to_pretty_json().unwrap();
        assert!(json.find("slide_2").unwrap() < json.find("slide_10").unwrap());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["slide_10"]["overall_finding"], "Non-Compliant");
        assert_eq!(value["slide_2"]["checklist"][0]["check_name"], "Disclaimer Presence");
    }

    #[test]
    fn failures_render_as_error_marker() {
        let mut report = AuditReport::new();
        let err = AuditError::Parse("bad".into());
        report.insert_failure(1, SlideFailure::from(&err));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["slide_1"]["error"]["stage"], "parse");
        assert!(report.result("slide_1").is_none());
    }

    #[test]
    fn summary_counts_findings() {
        let mut report = AuditReport::new();
        report.insert_result(1, result(OverallFinding::Compliant));
        report.insert_result(2, result(OverallFinding::PartialCompliance));
        report.insert_failure(
            3,
            SlideFailure {
                stage: "generation".into(),
                message: "quota".into(),
            },
        );
        let summary = report.summary(5);
        assert_eq!(summary.compliant, 1);
        assert_eq!(summary.partial, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.not_reported, 2);
    }
}
