#![allow(dead_code)]

use auditor_core::config::AppConfig;
use auditor_core::guidelines::{GuidelineSet, STANDARD_DISCLAIMER};
use auditor_core::knowledge::{populate, EmbeddedKnowledgeStore, KnowledgeStore};
use auditor_core::models::ReferencePassage;
use auditor_core::vectorstore::LocalVectorStore;
use providers::hashing::HashingEmbedder;
use providers::{Attachment, LlmProvider, ProviderError};
use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zip::write::FileOptions;
use zip::ZipWriter;

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

/// 1x1 RGBA PNG.
pub const PNG_1X1: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0x64,
    0x60, 0xf8, 0x5f, 0x0f, 0x00, 0x02, 0x87, 0x01, 0x80, 0xeb, 0x47, 0xba, 0x92, 0x00, 0x00,
    0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

#[derive(Default)]
pub struct SlideFixture {
    shapes: Vec<String>,
    images: Vec<(String, Vec<u8>)>,
}

impl SlideFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text box with one paragraph per line.
    pub fn text(mut self, lines: &[&str]) -> Self {
        let paragraphs: String = lines
            .iter()
            .map(|l| format!("<a:p><a:r><a:rPr lang=\"en-US\"/><a:t>{}</a:t></a:r></a:p>", escape(l)))
            .collect();
        self.shapes.push(format!(
            "<p:sp><p:nvSpPr><p:cNvPr id=\"{}\" name=\"Text\"/></p:nvSpPr><p:txBody><a:bodyPr/>{}</p:txBody></p:sp>",
            self.shapes.len() + 2,
            paragraphs
        ));
        self
    }

    pub fn table(mut self, rows: &[&[&str]]) -> Self {
        let body: String = rows
            .iter()
            .map(|row| {
                let cells: String = row
                    .iter()
                    .map(|c| {
                        if c.is_empty() {
                            "<a:tc><a:txBody><a:bodyPr/><a:p/></a:txBody></a:tc>".to_string()
                        } else {
                            format!(
                                "<a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>{}</a:t></a:r></a:p></a:txBody></a:tc>",
                                escape(c)
                            )
                        }
                    })
                    .collect();
                format!("<a:tr h=\"370840\">{}</a:tr>", cells)
            })
            .collect();
        self.shapes.push(format!(
            "<p:graphicFrame><a:graphic><a:graphicData><a:tbl><a:tblGrid/>{}</a:tbl></a:graphicData></a:graphic></p:graphicFrame>",
            body
        ));
        self
    }

    pub fn image(mut self, file_name: &str, data: &[u8]) -> Self {
        let rel_id = format!("rId{}", self.images.len() + 10);
        self.shapes.push(format!(
            "<p:pic><p:blipFill><a:blip r:embed=\"{}\"/></p:blipFill></p:pic>",
            rel_id
        ));
        self.images.push((file_name.to_string(), data.to_vec()));
        self
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Writes a minimal presentation with the given slides to `path`.
pub fn write_deck(path: &Path, slides: &[SlideFixture]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let opts = FileOptions::default();

    let ids: String = (1..=slides.len())
        .map(|n| format!("<p:sldId id=\"{}\" r:id=\"rId{}\"/>", 255 + n, n + 1))
        .collect();
    zip.start_file("ppt/presentation.xml", opts).unwrap();
    write!(
        zip,
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?><p:presentation {}><p:sldIdLst>{}</p:sldIdLst></p:presentation>",
        NS, ids
    )
    .unwrap();

    let rels: String = (1..=slides.len())
        .map(|n| {
            format!(
                "<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide\" Target=\"slides/slide{}.xml\"/>",
                n + 1,
                n
            )
        })
        .collect();
    zip.start_file("ppt/_rels/presentation.xml.rels", opts).unwrap();
    write!(
        zip,
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">{}</Relationships>",
        rels
    )
    .unwrap();

    for (idx, slide) in slides.iter().enumerate() {
        let n = idx + 1;
        zip.start_file(format!("ppt/slides/slide{}.xml", n), opts).unwrap();
        write!(
            zip,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><p:sld {}><p:cSld><p:spTree><p:nvGrpSpPr/>{}</p:spTree></p:cSld></p:sld>",
            NS,
            slide.shapes.concat()
        )
        .unwrap();

        if slide.images.is_empty() {
            continue;
        }
        let image_rels: String = slide
            .images
            .iter()
            .enumerate()
            .map(|(i, (name, _))| {
                format!(
                    "<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/image\" Target=\"../media/{}\"/>",
                    i + 10,
                    name
                )
            })
            .collect();
        zip.start_file(format!("ppt/slides/_rels/slide{}.xml.rels", n), opts).unwrap();
        write!(
            zip,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">{}</Relationships>",
            image_rels
        )
        .unwrap();
        for (name, data) in &slide.images {
            zip.start_file(format!("ppt/media/{}", name), opts).unwrap();
            zip.write_all(data).unwrap();
        }
    }
    zip.finish().unwrap();
}

/// Three slides: plain text, chart image plus 3x3 table, legal disclaimer.
pub fn three_slide_deck(dir: &Path) -> PathBuf {
    let path = dir.join("quarterly.pptx");
    write_deck(
        &path,
        &[
            SlideFixture::new().text(&["Our Platform", "Built for every team"]),
            SlideFixture::new()
                .text(&["Revenue growth"])
                .image("image1.png", PNG_1X1)
                .table(&[
                    &["Region", "Q1", "Q2"],
                    &["EMEA", "1.2", "1.4"],
                    &["APAC", "0.9", "1.1"],
                ]),
            SlideFixture::new().text(&["Thank you", STANDARD_DISCLAIMER]),
        ],
    );
    path
}

pub async fn knowledge_store(dir: &Path) -> Arc<dyn KnowledgeStore> {
    let db = dir.join("knowledge.db");
    let vectors = LocalVectorStore::open(db.to_str().unwrap()).await.unwrap();
    let store: Arc<dyn KnowledgeStore> = Arc::new(EmbeddedKnowledgeStore::new(
        Arc::new(HashingEmbedder::default()),
        Box::new(vectors),
        8,
    ));
    populate(store.as_ref(), &GuidelineSet::default()).await.unwrap();
    store
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.embeddings.provider = "hashing".into();
    cfg.generation.timeout_secs = 5;
    cfg
}

pub fn audit_json(overall: &str, disclaimer: &str, image: &str, table: &str) -> String {
    format!(
        r#"{{
  "overall_finding": "{overall}",
  "checklist": [
    {{"check_name": "Disclaimer Presence", "finding": "{disclaimer}"}},
    {{"check_name": "Client-Type Tone", "finding": "Pass"}},
    {{"check_name": "Image/Chart Analysis", "finding": "{image}"}},
    {{"check_name": "Table Completeness", "finding": "{table}"}}
  ],
  "detailed_feedback": [
    {{"area": "Disclaimer Presence", "is_compliant": {d}, "comment": "Disclaimer check."}},
    {{"area": "Client-Type Tone", "is_compliant": true, "comment": "Tone is neutral."}},
    {{"area": "Image/Chart Analysis", "is_compliant": true, "comment": "No image on this slide."}},
    {{"area": "Table Completeness", "is_compliant": true, "comment": "No table on this slide."}}
  ]
}}"#,
        d = disclaimer != "Fail"
    )
}

/// One recorded `generate` call.
#[derive(Debug, Clone)]
pub struct Call {
    pub prompt: String,
    pub texts: Vec<String>,
    pub images: usize,
}

pub enum Reply {
    Text(String),
    Fail(String),
    Hang,
}

/// Scripted generator: pops one reply per call, records what it was sent.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Reply>>,
    pub calls: Mutex<Vec<Call>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedLlm {
    async fn generate(&self, prompt: &str, attachments: &[Attachment]) -> Result<String, ProviderError> {
        let mut texts = Vec::new();
        let mut images = 0;
        for a in attachments {
            match a {
                Attachment::Text(t) => texts.push(t.clone()),
                Attachment::Image { .. } => images += 1,
            }
        }
        self.calls.lock().unwrap().push(Call {
            prompt: prompt.to_string(),
            texts,
            images,
        });
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Text(t)) => Ok(t),
            Some(Reply::Fail(msg)) => Err(ProviderError::RequestFailed(msg)),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProviderError::RequestFailed("unreachable".into()))
            }
            None => Err(ProviderError::RequestFailed("no scripted reply".into())),
        }
    }
}

/// Knowledge store whose queries never complete or always fail.
pub enum BrokenStore {
    Stalled,
    Failing(&'static str),
}

#[async_trait::async_trait]
impl KnowledgeStore for BrokenStore {
    async fn upsert(&self, _passages: &[ReferencePassage]) -> anyhow::Result<usize> {
        Ok(0)
    }

    async fn query(&self, _text: &str, _k: usize) -> anyhow::Result<Vec<String>> {
        match self {
            BrokenStore::Stalled => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
            BrokenStore::Failing(msg) => anyhow::bail!("{msg}"),
        }
    }

    async fn count(&self) -> anyhow::Result<u64> {
        Ok(8)
    }
}
