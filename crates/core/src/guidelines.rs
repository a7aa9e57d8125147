//! Guideline sets: the reference passages a knowledge store is populated from.

use crate::models::ReferencePassage;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Legal disclaimer every client-facing deck is expected to carry.
pub const STANDARD_DISCLAIMER: &str = "This presentation is for informational purposes only \
and does not constitute an offer or commitment. Product specifications and performance \
figures are subject to change without notice. Benchmark results depend on system \
configuration and may vary.";

const DEFAULT_PASSAGES: &[(&str, &str)] = &[
    (
        "disclaimer-required",
        "Disclaimer rule: every client-facing slide deck must display the standard legal \
         disclaimer verbatim. Required text: \"This presentation is for informational purposes \
         only and does not constitute an offer or commitment. Product specifications and \
         performance figures are subject to change without notice. Benchmark results depend on \
         system configuration and may vary.\" Paraphrased or truncated disclaimers do not satisfy \
         the rule.",
    ),
    (
        "disclaimer-performance-claims",
        "Any slide stating performance figures, throughput, speed-ups or benchmark comparisons \
         must be covered by the standard disclaimer, and the benchmark configuration must be \
         identified on the slide or in a footnote.",
    ),
    (
        "tone-retail",
        "Client-type tone for retail and general audiences: use plain language, avoid \
         superlatives such as 'best', 'guaranteed' or 'unbeatable', do not promise outcomes, and \
         explain technical terms on first use.",
    ),
    (
        "tone-institutional",
        "Client-type tone for institutional and enterprise audiences: technical terminology is \
         acceptable, but claims must remain factual and verifiable. Marketing hyperbole and \
         unqualified competitive claims are not permitted.",
    ),
    (
        "charts-sourcing",
        "Image and chart analysis: every chart must have labelled axes with units, a visible data \
         source and an as-of date. Truncated or non-zero-based axes that exaggerate differences \
         are misleading and non-compliant.",
    ),
    (
        "charts-competitor",
        "Charts or images comparing against competitor products must name the competitor product \
         version, the test methodology, and must not use selectively chosen data points.",
    ),
    (
        "tables-completeness",
        "Table completeness: comparison tables must have a header row, no empty cells, units for \
         every numeric value, and a source for competitor figures. Missing values must be marked \
         explicitly as 'not available' rather than left blank.",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuidelineSet {
    pub name: String,
    pub passages: Vec<ReferencePassage>,
}

impl Default for GuidelineSet {
    fn default() -> Self {
        Self {
            name: "builtin".to_string(),
            passages: DEFAULT_PASSAGES
                .iter()
                .map(|(id, text)| ReferencePassage::new(*id, *text))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GuidelineFile {
    #[serde(default)]
    passages: Vec<PassageEntry>,
}

#[derive(Debug, Deserialize)]
struct PassageEntry {
    id: Option<String>,
    text: String,
}

impl GuidelineSet {
    pub fn new(name: impl Into<String>, passages: Vec<ReferencePassage>) -> Self {
        Self {
            name: name.into(),
            passages,
        }
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Parses a TOML document of `[[passages]]` tables. Entries without an
    /// `id` get one derived from their text, so reloading the same file
    /// produces the same ids.
    pub fn from_toml_str(name: &str, content: &str) -> anyhow::Result<Self> {
        let file: GuidelineFile = toml::from_str(content)?;
        let passages = file
            .passages
            .into_iter()
            .filter(|p| !p.text.trim().is_empty())
            .map(|p| {
                let id = p.id.unwrap_or_else(|| content_id(&p.text));
                ReferencePassage::new(id, p.text.trim())
            })
            .collect();
        Ok(Self::new(name, passages))
    }
}

/// Loads a guideline set from a TOML file, or from every `.toml` file in a
/// directory (sorted by file name).
pub fn load_guidelines(path: &Path) -> anyhow::Result<GuidelineSet> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "guidelines".into());
    if path.is_file() {
        let content = fs::read_to_string(path)?;
        return GuidelineSet::from_toml_str(&name, &content);
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some("toml")
        {
            files.push(entry.path());
        }
    }
    files.sort();

    let mut passages = Vec::new();
    for file in files {
        let content = fs::read_to_string(&file)?;
        passages.extend(GuidelineSet::from_toml_str(&name, &content)?.passages);
    }
    Ok(GuidelineSet::new(name, passages))
}

fn content_id(text: &str) -> String {
    let hash = blake3::hash(text.trim().as_bytes()).to_hex();
    format!("passage-{}", &hash[..16])
}
