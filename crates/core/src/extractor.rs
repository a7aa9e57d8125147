//! Slide-deck extraction for Office Open XML presentations (`.pptx`).
//!
//! A deck is a zip archive. Slide order comes from `ppt/presentation.xml`
//! (`p:sldIdLst`) resolved through the presentation relationships; each
//! slide's shape tree is then walked in document order, collecting shape
//! text, serialized tables and embedded raster images.

use crate::error::AuditError;
use crate::models::{SlideContent, SlideImage};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};
use zip::ZipArchive;

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS: &str = "ppt/_rels/presentation.xml.rels";

const RASTER_MIME: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/bmp",
    "image/tiff",
    "image/webp",
];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("not a zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("missing part {0}")]
    MissingPart(String),
    #[error("slide relationship {0} missing from ppt/_rels/presentation.xml.rels")]
    MissingRelationship(String),
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("part {0} is not valid UTF-8")]
    Encoding(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Extracts every slide of the deck at `path`, in presentation order.
pub fn extract_deck(path: &Path) -> Result<Vec<SlideContent>, AuditError> {
    let open_error = |reason: String| AuditError::DocumentOpen {
        path: path.to_path_buf(),
        reason,
    };
    let file = fs::File::open(path).map_err(|e| open_error(e.to_string()))?;
    extract_from_reader(BufReader::new(file)).map_err(|e| open_error(e.to_string()))
}

pub fn extract_from_reader<R: Read + Seek>(reader: R) -> Result<Vec<SlideContent>, ExtractError> {
    let mut archive = ZipArchive::new(reader)?;
    let slide_parts = slide_order(&mut archive)?;
    debug!(slides = slide_parts.len(), "resolved slide order");

    let mut slides = Vec::with_capacity(slide_parts.len());
    for (idx, part) in slide_parts.iter().enumerate() {
        slides.push(extract_slide(&mut archive, part, idx + 1)?);
    }
    Ok(slides)
}

fn slide_order<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<String>, ExtractError> {
    let presentation = read_text_part(archive, PRESENTATION_PART)?;
    let rels = parse_relationships(&read_text_part(archive, PRESENTATION_RELS)?)?;

    let mut reader = Reader::from_str(&presentation);
    let mut parts = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sldId" => {
                let Some(rel_id) = prefixed_attr(&e, b"id") else {
                    continue;
                };
                let target = rels
                    .get(&rel_id)
                    .ok_or(ExtractError::MissingRelationship(rel_id))?;
                parts.push(resolve_target("ppt", target));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(parts)
}

fn extract_slide<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    part: &str,
    slide_number: usize,
) -> Result<SlideContent, ExtractError> {
    let xml = read_text_part(archive, part)?;
    let walked = walk_slide(&xml)?;

    let mut slide = SlideContent::new(slide_number);
    for text in &walked.texts {
        slide.push_text(text);
    }

    if walked.image_rels.is_empty() {
        return Ok(slide);
    }
    let (dir, file) = part.rsplit_once('/').unwrap_or(("", part));
    let rels_part = format!("{}/_rels/{}.rels", dir, file);
    let rels = match read_text_part(archive, &rels_part) {
        Ok(xml) => parse_relationships(&xml)?,
        Err(e) => {
            warn!(slide = slide_number, error = %e, "slide has images but no relationships");
            return Ok(slide);
        }
    };
    for rel_id in &walked.image_rels {
        let Some(target) = rels.get(rel_id) else {
            debug!(slide = slide_number, rel_id = %rel_id, "image relationship not found");
            continue;
        };
        let media = resolve_target(dir, target);
        let data = match read_part(archive, &media) {
            Ok(data) => data,
            Err(e) => {
                warn!(slide = slide_number, part = %media, error = %e, "cannot read image");
                continue;
            }
        };
        if let Some(image) = load_image(&media, data) {
            slide.images.push(image);
        }
    }
    Ok(slide)
}

fn load_image(name: &str, data: Vec<u8>) -> Option<SlideImage> {
    let mime = infer::get(&data).map(|k| k.mime_type().to_string());
    let Some(mime) = mime.filter(|m| RASTER_MIME.contains(&m.as_str())) else {
        debug!(part = %name, "skipping non-raster image");
        return None;
    };
    let (width, height) = if cfg!(feature = "image-meta") {
        match decode_dimensions(&data) {
            Some((w, h)) => (Some(w), Some(h)),
            None => {
                warn!(part = %name, "image could not be decoded, skipping");
                return None;
            }
        }
    } else {
        (None, None)
    };
    Some(SlideImage {
        name: name.to_string(),
        mime,
        size: data.len(),
        width,
        height,
        data,
    })
}

#[cfg(feature = "image-meta")]
fn decode_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let img = image::load_from_memory(data).ok()?;
    Some(image::GenericImageView::dimensions(&img))
}

#[cfg(not(feature = "image-meta"))]
fn decode_dimensions(_data: &[u8]) -> Option<(u32, u32)> {
    None
}

#[derive(Debug, Default)]
struct WalkedSlide {
    /// Shape texts and serialized tables, in document order.
    texts: Vec<String>,
    /// Relationship ids of embedded pictures, in document order.
    image_rels: Vec<String>,
}

#[derive(Debug, Default)]
struct TableBuilder {
    rows: Vec<Vec<String>>,
    row: Option<Vec<String>>,
    cell: Option<String>,
}

impl TableBuilder {
    fn start_row(&mut self) {
        self.row = Some(Vec::new());
    }

    fn end_row(&mut self) {
        if let Some(row) = self.row.take() {
            self.rows.push(row);
        }
    }

    fn start_cell(&mut self) {
        self.cell = Some(String::new());
    }

    fn end_cell(&mut self) {
        if let (Some(cell), Some(row)) = (self.cell.take(), self.row.as_mut()) {
            row.push(cell);
        }
    }

    fn in_cell(&self) -> bool {
        self.cell.is_some()
    }

    fn push_paragraph(&mut self, text: &str) {
        let text = text.trim();
        if let Some(cell) = self.cell.as_mut() {
            if text.is_empty() {
                return;
            }
            if !cell.is_empty() {
                cell.push(' ');
            }
            cell.push_str(text);
        }
    }
}

fn walk_slide(xml: &str) -> Result<WalkedSlide, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut walked = WalkedSlide::default();
    let mut shape: Option<Vec<String>> = None;
    let mut table: Option<TableBuilder> = None;
    let mut paragraph: Option<String> = None;
    let mut in_run = false;
    // Depth inside an `mc:Fallback` subtree, which repeats its `mc:Choice`.
    let mut skip_depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if skip_depth > 0 {
                    skip_depth += 1;
                    continue;
                }
                match e.local_name().as_ref() {
                    b"Fallback" => skip_depth = 1,
                    b"sp" => shape = Some(Vec::new()),
                    b"tbl" => table = Some(TableBuilder::default()),
                    b"tr" => {
                        if let Some(t) = table.as_mut() {
                            t.start_row();
                        }
                    }
                    b"tc" => {
                        if let Some(t) = table.as_mut() {
                            t.start_cell();
                        }
                    }
                    b"p" => paragraph = Some(String::new()),
                    b"t" => in_run = paragraph.is_some(),
                    b"blip" => push_blip(&e, &mut walked),
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if skip_depth > 0 {
                    continue;
                }
                match e.local_name().as_ref() {
                    b"blip" => push_blip(&e, &mut walked),
                    b"br" => {
                        if let Some(p) = paragraph.as_mut() {
                            p.push('\n');
                        }
                    }
                    b"tc" => {
                        if let Some(t) = table.as_mut() {
                            t.start_cell();
                            t.end_cell();
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(t) => {
                if in_run && skip_depth == 0 {
                    if let Some(p) = paragraph.as_mut() {
                        p.push_str(&t.unescape()?);
                    }
                }
            }
            Event::End(e) => {
                if skip_depth > 0 {
                    skip_depth -= 1;
                    continue;
                }
                match e.local_name().as_ref() {
                    b"t" => in_run = false,
                    b"p" => {
                        let Some(text) = paragraph.take() else {
                            continue;
                        };
                        match table.as_mut() {
                            Some(t) if t.in_cell() => t.push_paragraph(&text),
                            _ => {
                                if let Some(lines) = shape.as_mut() {
                                    let text = text.trim();
                                    if !text.is_empty() {
                                        lines.push(text.to_string());
                                    }
                                }
                            }
                        }
                    }
                    b"tc" => {
                        if let Some(t) = table.as_mut() {
                            t.end_cell();
                        }
                    }
                    b"tr" => {
                        if let Some(t) = table.as_mut() {
                            t.end_row();
                        }
                    }
                    b"tbl" => {
                        if let Some(t) = table.take() {
                            let block = serialize_table(&t.rows);
                            if !block.is_empty() {
                                walked.texts.push(block);
                            }
                        }
                    }
                    b"sp" => {
                        if let Some(lines) = shape.take() {
                            if !lines.is_empty() {
                                walked.texts.push(lines.join("\n"));
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(walked)
}

fn push_blip(e: &BytesStart<'_>, walked: &mut WalkedSlide) {
    if let Some(rel_id) = prefixed_attr(e, b"embed") {
        walked.image_rels.push(rel_id);
    }
}

/// Serializes table rows as a markdown block: the first row is the header,
/// followed by a separator line and one line per remaining row. Short rows
/// are padded so every line has the same column count.
pub fn serialize_table(rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    if columns == 0 {
        return String::new();
    }
    let line = |cells: &[String]| {
        let padded: Vec<String> = (0..columns)
            .map(|i| cells.get(i).map(|c| escape_cell(c)).unwrap_or_default())
            .collect();
        format!("| {} |", padded.join(" | "))
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(line(&rows[0]));
    lines.push(format!("|{}", " --- |".repeat(columns)));
    for row in &rows[1..] {
        lines.push(line(row));
    }
    lines.join("\n")
}

fn escape_cell(cell: &str) -> String {
    cell.replace('\n', " ").replace('|', "\\|").trim().to_string()
}

/// Maps relationship id to target, skipping external targets.
fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut rels = HashMap::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = None;
                let mut target = None;
                let mut external = false;
                for attr in e.attributes().flatten() {
                    let value = attr.unescape_value()?.into_owned();
                    match attr.key.as_ref() {
                        b"Id" => id = Some(value),
                        b"Target" => target = Some(value),
                        b"TargetMode" => external = value.eq_ignore_ascii_case("External"),
                        _ => {}
                    }
                }
                if let (Some(id), Some(target), false) = (id, target, external) {
                    rels.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rels)
}

/// Value of a namespaced attribute (e.g. `r:id`, `r:embed`) by local name.
fn prefixed_attr(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes().flatten().find_map(|attr| {
        if attr.key.prefix().is_some() && attr.key.local_name().as_ref() == local {
            attr.unescape_value().ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}

/// Resolves a relationship target against the directory of its source part.
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>, ExtractError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(ExtractError::MissingPart(name.to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    let mut data = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut data)?;
    Ok(data)
}

fn read_text_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String, ExtractError> {
    String::from_utf8(read_part(archive, name)?).map_err(|_| ExtractError::Encoding(name.to_string()))
}
