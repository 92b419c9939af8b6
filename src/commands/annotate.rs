use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::anchors::{AnchorEngine, ColorPalette, EngineConfig};
use crate::catalog::load_shared;
use crate::cli::AnnotateArgs;
use crate::dom::Document;
use crate::model::{
    AnchorCounts, AnchorRecord, AnchorReport, AnnotateRunManifest, DocumentSummary,
    EngineConfigFile,
};
use crate::util::{
    now_utc_string, sha256_bytes, sha256_file, utc_compact_string, write_json_pretty, write_text,
};

const REPORT_VERSION: u32 = 1;
const MANIFEST_VERSION: u32 = 1;
const HTML_EXTENSIONS: &[&str] = &["html", "htm"];

struct OutputOptions {
    output_dir: PathBuf,
    write_html: bool,
    dry_run: bool,
}

pub fn run(args: AnnotateArgs) -> Result<()> {
    let started = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("annotate-{}", utc_compact_string(started));

    let catalog = load_shared(&args.catalog)?;
    let catalog_summary = catalog.summary(&args.catalog, sha256_file(&args.catalog)?);

    let engine = AnchorEngine::new(Arc::clone(&catalog), engine_config(&args)?)?;

    let inputs = discover_inputs(&args.inputs)?;
    if inputs.is_empty() {
        bail!("no HTML documents found in the given inputs");
    }

    let jobs = args.jobs.clamp(1, inputs.len());
    info!(
        run_id = %run_id,
        documents = inputs.len(),
        jobs,
        dry_run = args.dry_run,
        "annotate started"
    );

    let options = OutputOptions {
        output_dir: args.output_dir.clone(),
        write_html: args.write_html,
        dry_run: args.dry_run,
    };
    let documents = process_documents(&engine, &inputs, &options, jobs)?;

    let mut totals = AnchorCounts::default();
    let mut warnings = Vec::new();
    for document in &documents {
        if let Some(counts) = &document.counts {
            totals.add(counts);
        }
        if let Some(error) = &document.error {
            warnings.push(format!("{}: {error}", document.source_path));
        }
    }
    if catalog.is_empty() {
        warnings.push("catalog has no entries; every anchor was dropped".to_string());
    }

    let failed_document_count = documents
        .iter()
        .filter(|document| document.error.is_some())
        .count();
    let status = if failed_document_count == 0 {
        "completed"
    } else {
        "completed_with_failures"
    };

    info!(
        documents = documents.len(),
        failed = failed_document_count,
        linked = totals.linked,
        dropped = totals.dropped,
        fuzzy = totals.fuzzy,
        "annotate finished"
    );

    if args.dry_run {
        info!("dry-run: skipped writing run manifest");
        return Ok(());
    }

    let manifest = AnnotateRunManifest {
        manifest_version: MANIFEST_VERSION,
        run_id,
        status: status.to_string(),
        started_at,
        completed_at: now_utc_string(),
        command: "annotate".to_string(),
        catalog: catalog_summary,
        fuzzy_threshold: engine.config().fuzzy_threshold,
        similarity: engine.config().similarity,
        document_count: documents.len(),
        failed_document_count,
        totals,
        documents,
        warnings,
    };

    let manifest_path = args
        .manifest_path
        .unwrap_or_else(|| args.output_dir.join("manifests").join("annotate_run.json"));
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), status, "wrote annotate run manifest");

    Ok(())
}

fn engine_config(args: &AnnotateArgs) -> Result<EngineConfig> {
    let file = match &args.engine_config {
        Some(path) => read_engine_config(path)?,
        None => EngineConfigFile::default(),
    };
    merge_engine_config(file, args)
}

fn read_engine_config(path: &Path) -> Result<EngineConfigFile> {
    let raw = fs::read(path)
        .with_context(|| format!("failed to read engine config {}", path.display()))?;
    serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse engine config {}", path.display()))
}

fn merge_engine_config(file: EngineConfigFile, args: &AnnotateArgs) -> Result<EngineConfig> {
    let mut config = EngineConfig::default();

    if let Some(threshold) = args.fuzzy_threshold.or(file.fuzzy_threshold) {
        if !(0.0..=1.0).contains(&threshold) {
            bail!("fuzzy threshold must be within [0, 1], got {threshold}");
        }
        config.fuzzy_threshold = threshold;
    }
    if let Some(similarity) = args.similarity.or(file.similarity) {
        config.similarity = similarity;
    }
    if let Some(colors) = file.colors {
        config.palette = ColorPalette::new(colors.schemes, colors.fallback);
        if config.palette.scheme_count() == 0 {
            warn!("engine config defines no color schemes; every anchor gets the fallback colors");
        }
    }

    Ok(config)
}

fn discover_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut found = BTreeSet::new();
    let mut ordered = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut entries = Vec::new();
            let listing = fs::read_dir(input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            for entry in listing {
                let entry =
                    entry.with_context(|| format!("failed to read entry in {}", input.display()))?;
                let path = entry.path();
                let is_file = entry
                    .file_type()
                    .with_context(|| format!("failed to inspect file type: {}", path.display()))?
                    .is_file();
                if is_file && is_html_path(&path) {
                    entries.push(path);
                }
            }
            entries.sort();
            for path in entries {
                if found.insert(path.clone()) {
                    ordered.push(path);
                }
            }
        } else if input.is_file() {
            if found.insert(input.clone()) {
                ordered.push(input.clone());
            }
        } else {
            bail!("input not found: {}", input.display());
        }
    }

    Ok(ordered)
}

fn is_html_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| HTML_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

fn process_documents(
    engine: &AnchorEngine,
    inputs: &[PathBuf],
    options: &OutputOptions,
    jobs: usize,
) -> Result<Vec<DocumentSummary>> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(jobs)
        .thread_name(|index| format!("annotate-{index}"))
        .build()
        .context("failed to build annotate worker pool")?;

    Ok(pool.install(|| {
        inputs
            .par_iter()
            .map(|path| process_document(engine, path, options))
            .collect()
    }))
}

fn process_document(engine: &AnchorEngine, path: &Path, options: &OutputOptions) -> DocumentSummary {
    match annotate_document(engine, path, options) {
        Ok(summary) => summary,
        Err(err) => {
            warn!(path = %path.display(), error = %format!("{err:#}"), "failed to annotate document");
            failed_summary(path, &format!("{err:#}"))
        }
    }
}

fn failed_summary(path: &Path, error: &str) -> DocumentSummary {
    DocumentSummary {
        source_path: path.display().to_string(),
        status: "failed".to_string(),
        report_path: None,
        annotated_html_path: None,
        counts: None,
        error: Some(error.to_string()),
    }
}

fn annotate_document(
    engine: &AnchorEngine,
    path: &Path,
    options: &OutputOptions,
) -> Result<DocumentSummary> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let (report, doc) = annotate_source(engine, &path.display().to_string(), &raw);

    info!(
        path = %path.display(),
        linked = report.counts.linked,
        dropped = report.counts.dropped,
        "annotated document"
    );

    let mut summary = DocumentSummary {
        source_path: report.source_path.clone(),
        status: "annotated".to_string(),
        report_path: None,
        annotated_html_path: None,
        counts: Some(report.counts.clone()),
        error: None,
    };
    if options.dry_run {
        return Ok(summary);
    }

    let stem = output_stem(path)?;
    let report_path = options.output_dir.join(format!("{stem}.anchors.json"));
    write_json_pretty(&report_path, &report)?;
    summary.report_path = Some(report_path.display().to_string());

    if options.write_html {
        let html_path = options.output_dir.join(format!("{stem}.annotated.html"));
        write_text(&html_path, &doc.to_html())?;
        summary.annotated_html_path = Some(html_path.display().to_string());
    }

    Ok(summary)
}

fn annotate_source(engine: &AnchorEngine, source_path: &str, raw: &[u8]) -> (AnchorReport, Document) {
    let mut doc = Document::parse_html(&String::from_utf8_lossy(raw));
    let anchors = engine.find_anchors(&mut doc);

    let report = AnchorReport {
        report_version: REPORT_VERSION,
        generated_at: now_utc_string(),
        source_path: source_path.to_string(),
        source_sha256: sha256_bytes(raw),
        counts: AnchorCounts::from_set(&anchors),
        linked: anchors
            .linked
            .iter()
            .map(|anchor| AnchorRecord::from_anchor(&doc, anchor))
            .collect(),
        dropped: anchors
            .dropped
            .iter()
            .map(|anchor| AnchorRecord::from_anchor(&doc, anchor))
            .collect(),
    };
    (report, doc)
}

fn output_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(ToOwned::to_owned)
        .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))
}
