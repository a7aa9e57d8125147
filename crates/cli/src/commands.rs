use crate::args::{Cli, Commands};
use anyhow::Context;
use auditor_core::config::{self, AppConfig};
use auditor_core::discover::find_decks;
use auditor_core::knowledge::populate;
use auditor_core::models::SlideContent;
use auditor_core::pipeline::{self, read_deck};
use auditor_core::report::{AuditReport, ReportSummary};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub async fn run(cli: Cli, out: &mut dyn Write) -> anyhow::Result<()> {
    let mut cfg = config::load(cli.config.as_deref()).context("load configuration")?;
    match cli.command {
        Commands::Audit {
            decks,
            json,
            failure_policy,
            concurrency,
        } => {
            if let Some(policy) = failure_policy {
                cfg.audit.failure_policy = policy;
            }
            if let Some(n) = concurrency {
                cfg.audit.concurrency = n;
            }
            run_audit(&cfg, &decks, json, out).await
        }
        Commands::Ask { deck, question } => run_ask(&cfg, &deck, &question, out).await,
        Commands::Extract { deck, json } => run_extract(&deck, json, out).await,
        Commands::Search { query, top_k } => run_search(&cfg, &query, top_k, out).await,
        Commands::Ingest { json } => run_ingest(&cfg, json, out).await,
    }
}

#[derive(Debug, Serialize)]
struct DeckOutcome {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ReportSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<AuditReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn run_audit(
    cfg: &AppConfig,
    inputs: &[PathBuf],
    json: bool,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    // Credentials are checked before any deck is touched.
    pipeline::require_api_key(cfg)?;
    let decks = find_decks(inputs)?;
    if decks.is_empty() {
        anyhow::bail!("no .pptx decks found");
    }
    let auditor = pipeline::prepare(cfg).await?;

    let mut outcomes = Vec::with_capacity(decks.len());
    for deck in &decks {
        let path = deck.display().to_string();
        match read_deck(deck).await {
            Ok(slides) => {
                info!(deck = %path, slides = slides.len(), "auditing deck");
                let report = auditor.audit_slides(&slides).await;
                let summary = report.summary(slides.len());
                info!(
                    deck = %path,
                    compliant = summary.compliant,
                    non_compliant = summary.non_compliant,
                    partial = summary.partial,
                    failed = summary.failed,
                    not_reported = summary.not_reported,
                    "deck audited"
                );
                outcomes.push(DeckOutcome {
                    path,
                    summary: Some(summary),
                    report: Some(report),
                    error: None,
                });
            }
            Err(e) => {
                error!(deck = %path, error = %e, "deck skipped");
                outcomes.push(DeckOutcome {
                    path,
                    summary: None,
                    report: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    if json {
        let envelope = serde_json::json!({
            "status": "ok",
            "generated_at": chrono::Utc::now().to_rfc3339(),
            "decks": &outcomes,
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&envelope)?)?;
    } else {
        let audited: Vec<&DeckOutcome> = outcomes.iter().filter(|o| o.report.is_some()).collect();
        match audited.as_slice() {
            [] => {}
            [single] if decks.len() == 1 => {
                if let Some(report) = &single.report {
                    writeln!(out, "{}", report.to_pretty_json()?)?;
                }
            }
            many => {
                let mut by_deck = serde_json::Map::new();
                for outcome in many {
                    by_deck.insert(outcome.path.clone(), serde_json::to_value(&outcome.report)?);
                }
                writeln!(out, "{}", serde_json::to_string_pretty(&by_deck)?)?;
            }
        }
    }

    if outcomes.iter().all(|o| o.error.is_some()) {
        anyhow::bail!("none of the {} deck(s) could be opened", outcomes.len());
    }
    Ok(())
}

pub async fn run_ask(
    cfg: &AppConfig,
    deck: &Path,
    question: &str,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let auditor = pipeline::prepare(cfg).await?;
    let slides = read_deck(deck).await?;
    let answer = auditor.answer(&slides, question).await?;
    writeln!(out, "{}", answer.trim())?;
    Ok(())
}

pub async fn run_extract(deck: &Path, json: bool, out: &mut dyn Write) -> anyhow::Result<()> {
    let slides = read_deck(deck).await?;
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&slides)?)?;
        return Ok(());
    }
    for slide in &slides {
        write_slide(slide, out)?;
    }
    Ok(())
}

fn write_slide(slide: &SlideContent, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "--- {} ---", slide.key())?;
    if !slide.text.is_empty() {
        writeln!(out, "{}", slide.text)?;
    }
    for image in &slide.images {
        match (image.width, image.height) {
            (Some(w), Some(h)) => writeln!(
                out,
                "[image] {} {} {} bytes {}x{}",
                image.name, image.mime, image.size, w, h
            )?,
            _ => writeln!(out, "[image] {} {} {} bytes", image.name, image.mime, image.size)?,
        }
    }
    Ok(())
}

pub async fn run_search(
    cfg: &AppConfig,
    query: &str,
    top_k: usize,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let store = pipeline::open_knowledge(cfg).await?;
    if store.count().await? == 0 {
        let guidelines = pipeline::load_guideline_set(cfg)?;
        populate(store.as_ref(), &guidelines).await?;
    }
    let passages = store.query(query, top_k).await?;
    if passages.is_empty() {
        writeln!(out, "no passages")?;
    }
    for (i, passage) in passages.iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, passage)?;
    }
    Ok(())
}

pub async fn run_ingest(cfg: &AppConfig, json: bool, out: &mut dyn Write) -> anyhow::Result<()> {
    let store = pipeline::open_knowledge(cfg).await?;
    let guidelines = pipeline::load_guideline_set(cfg)?;
    let added = populate(store.as_ref(), &guidelines).await?;
    let total = store.count().await?;
    if json {
        let summary = serde_json::json!({
            "status": "ok",
            "set": guidelines.name,
            "added": added,
            "total": total,
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
    } else {
        writeln!(
            out,
            "{}: added {} passages, {} stored",
            guidelines.name, added, total
        )?;
    }
    Ok(())
}
