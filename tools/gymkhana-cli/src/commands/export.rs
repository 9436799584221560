//! Export a composited clip of the comparison.

use std::io::Write;
use std::path::{Path, PathBuf};

use gymkhana_common::config::AppConfig;
use gymkhana_media::backend::MediaBackend;
use gymkhana_render_engine::export::{ExportEvent, ExportPipeline, ExportRequest};
use gymkhana_sync_model::metadata::SourceMetadata;
use gymkhana_sync_model::range::{ExportRange, QuickRange};

use crate::SyncArgs;

/// Seconds either side of `--around`.
const AROUND_RADIUS_SECS: f64 = 5.0;

/// How the user picked the export range.
#[derive(Debug, Clone, Copy)]
pub enum RangeSelection {
    Explicit { start: f64, end: f64 },
    Quick(QuickRange),
    Around(f64),
}

impl RangeSelection {
    pub fn from_args(
        start: Option<f64>,
        end: Option<f64>,
        quick: Option<QuickRange>,
        around: Option<f64>,
    ) -> anyhow::Result<Self> {
        match (start, end, quick, around) {
            (Some(start), Some(end), None, None) => Ok(Self::Explicit { start, end }),
            (None, None, Some(quick), None) => Ok(Self::Quick(quick)),
            (None, None, None, Some(center)) => Ok(Self::Around(center)),
            _ => anyhow::bail!("choose one of --start/--end, --range, or --around"),
        }
    }

    fn resolve(self, primary: &SourceMetadata) -> anyhow::Result<ExportRange> {
        let range = match self {
            Self::Explicit { start, end } => ExportRange::new(start, end)?,
            Self::Quick(quick) => quick.range(),
            Self::Around(center) => {
                ExportRange::around(center, AROUND_RADIUS_SECS, primary.duration_secs())?
            }
        };
        Ok(range)
    }
}

pub fn run(
    config: &AppConfig,
    primary: PathBuf,
    shadow: PathBuf,
    selection: RangeSelection,
    sync: SyncArgs,
    output: PathBuf,
    report: bool,
) -> anyhow::Result<()> {
    let backend = super::backend(config)?;
    let sync = super::sync_state(config, sync)?;

    let primary_meta = probe(backend.as_ref(), &primary)?;
    let shadow_meta = probe(backend.as_ref(), &shadow)?;
    let range = selection.resolve(&primary_meta)?;

    println!("Exporting {} over {}", primary_meta.display_name(), range);
    println!("  Shadow: {}", shadow_meta.display_name());
    println!(
        "  Offset: {:+.1}s, opacity: {:.2}",
        sync.offset_secs(),
        sync.opacity()
    );

    let pipeline = ExportPipeline::new(backend)
        .with_default_extension(config.export.default_extension.clone());
    let mut handle = pipeline.start(ExportRequest {
        primary: primary_meta,
        shadow: shadow_meta,
        range,
        offset_secs: sync.offset_secs(),
        opacity: sync.opacity(),
        output_path: output,
    })?;
    println!("  Output: {}", handle.output_path().display());

    while let Some(event) = handle.next_event() {
        match event {
            ExportEvent::Progress(p) => {
                print!(
                    "\r  Progress: {:.1}% ({}/{} frames, ETA: {:.0}s, {:?})  ",
                    p.percent, p.frames_written, p.total_frames, p.eta_secs, p.stage
                );
                let _ = std::io::stdout().flush();
            }
            ExportEvent::Completed(summary) => {
                println!("\nExport complete: {}", summary.output_path.display());
                println!(
                    "  {} frames written, {} skipped, {} without shadow, max drift {} frames",
                    summary.frames_written,
                    summary.frames_skipped,
                    summary.primary_only_frames,
                    summary.max_drift_frames
                );
                if report {
                    let report_path = summary.output_path.with_extension("report.json");
                    summary.write_json(&report_path)?;
                    println!("  Report: {}", report_path.display());
                }
            }
            ExportEvent::Failed(failure) => {
                println!();
                anyhow::bail!("Export failed: {failure}");
            }
        }
    }
    Ok(())
}

fn probe(backend: &dyn MediaBackend, path: &Path) -> anyhow::Result<SourceMetadata> {
    let mut source = backend.open_source(path)?;
    let meta = source.metadata().clone();
    source.close();
    Ok(meta)
}
