use serde::{Deserialize, Serialize};
use std::fmt;

/// One unit of guideline text stored in the knowledge store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencePassage {
    pub id: String,
    pub text: String,
}

impl ReferencePassage {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SlideImage {
    /// Archive part the image was read from, e.g. `ppt/media/image1.png`.
    pub name: String,
    pub mime: String,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip)]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlideContent {
    /// 1-based position in the deck.
    pub slide_number: usize,
    pub text: String,
    pub images: Vec<SlideImage>,
}

impl SlideContent {
    pub fn new(slide_number: usize) -> Self {
        Self {
            slide_number,
            text: String::new(),
            images: Vec::new(),
        }
    }

    pub fn key(&self) -> String {
        slide_key(self.slide_number)
    }

    pub(crate) fn push_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(text);
    }
}

pub fn slide_key(slide_number: usize) -> String {
    format!("slide_{}", slide_number)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallFinding {
    Compliant,
    #[serde(rename = "Non-Compliant")]
    NonCompliant,
    #[serde(rename = "Partial-Compliance")]
    PartialCompliance,
}

impl OverallFinding {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallFinding::Compliant => "Compliant",
            OverallFinding::NonCompliant => "Non-Compliant",
            OverallFinding::PartialCompliance => "Partial-Compliance",
        }
    }
}

impl fmt::Display for OverallFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckFinding {
    Pass,
    Fail,
    #[serde(rename = "N/A")]
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub check_name: String,
    pub finding: CheckFinding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub area: String,
    pub is_compliant: bool,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditResult {
    pub overall_finding: OverallFinding,
    pub checklist: Vec<ChecklistItem>,
    pub detailed_feedback: Vec<FeedbackItem>,
}

impl AuditResult {
    pub fn finding_for(&self, area: CheckArea) -> Option<CheckFinding> {
        self.checklist
            .iter()
            .find(|c| CheckArea::from_label(&c.check_name) == Some(area))
            .map(|c| c.finding)
    }

    pub fn feedback_for(&self, area: CheckArea) -> Option<&FeedbackItem> {
        self.detailed_feedback
            .iter()
            .find(|f| CheckArea::from_label(&f.area) == Some(area))
    }
}

/// The fixed set of checks every audit covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CheckArea {
    DisclaimerPresence,
    ClientTypeTone,
    ImageChartAnalysis,
    TableCompleteness,
}

impl CheckArea {
    pub const ALL: [CheckArea; 4] = [
        CheckArea::DisclaimerPresence,
        CheckArea::ClientTypeTone,
        CheckArea::ImageChartAnalysis,
        CheckArea::TableCompleteness,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CheckArea::DisclaimerPresence => "Disclaimer Presence",
            CheckArea::ClientTypeTone => "Client-Type Tone",
            CheckArea::ImageChartAnalysis => "Image/Chart Analysis",
            CheckArea::TableCompleteness => "Table Completeness",
        }
    }

    /// Case-insensitive match on the label, ignoring surrounding whitespace.
    pub fn from_label(label: &str) -> Option<CheckArea> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|a| a.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for CheckArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_literals_match_wire_format() {
        assert_eq!(
            serde_json::to_value(OverallFinding::PartialCompliance).unwrap(),
            "Partial-Compliance"
        );
        assert_eq!(
            serde_json::to_value(OverallFinding::NonCompliant).unwrap(),
            "Non-Compliant"
        );
        assert_eq!(serde_json::to_value(CheckFinding::NotApplicable).unwrap(), "N/A");
        let f: CheckFinding = serde_json::from_str("\"Pass\"").unwrap();
        assert_eq!(f, CheckFinding::Pass);
    }

    #[test]
    fn check_area_labels_round_trip() {
        for area in CheckArea::ALL {
            assert_eq!(CheckArea::from_label(area.label()), Some(area));
        }
        assert_eq!(
            CheckArea::from_label(" disclaimer presence "),
            Some(CheckArea::DisclaimerPresence)
        );
        assert_eq!(CheckArea::from_label("Font Size"), None);
    }

    #[test]
    fn push_text_uses_single_separator() {
        let mut slide = SlideContent::new(1);
        slide.push_text("Title");
        slide.push_text("   ");
        slide.push_text("Body");
        assert_eq!(slide.text, "Title\nBody");
        assert_eq!(slide.key(), "slide_1");
    }
}
