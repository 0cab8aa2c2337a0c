//! Export a project to video.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use reframe_common::config::AppConfig;
use reframe_project_model::{ExportQuality, ProjectStore, VideoCodec};
use reframe_render_engine::{
    output_file_name, CancellationToken, ExportJob, ExportOptions, ExportPipeline, ExportProgress,
    FfmpegSink, FfmpegSource, ProgressCallback,
};

pub struct ExportArgs {
    pub quality: Option<String>,
    pub speed: Option<f64>,
    pub codec: Option<String>,
    pub out_dir: Option<PathBuf>,
    pub seek_timeout: Option<f64>,
    pub json: bool,
}

pub async fn run(
    store: &ProjectStore,
    config: &AppConfig,
    id: &str,
    args: ExportArgs,
) -> anyhow::Result<()> {
    let loaded = store
        .load(id)
        .map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;
    let saved = &loaded.project.export;

    let quality = match args.quality {
        Some(q) => q.parse::<ExportQuality>().map_err(anyhow::Error::msg)?,
        None => saved.quality,
    };
    let codec = match args.codec {
        Some(c) => c.parse::<VideoCodec>().map_err(anyhow::Error::msg)?,
        None => saved.codec,
    };
    let seek_timeout = args
        .seek_timeout
        .or(config.export.seek_timeout_secs)
        .filter(|s| s.is_finite() && *s > 0.0)
        .map(Duration::from_secs_f64);
    let options = ExportOptions {
        quality,
        speed: args.speed.unwrap_or(saved.speed),
        codec,
        seek_timeout,
    };
    options.validate()?;

    let out_dir = args.out_dir.unwrap_or_else(|| loaded.exports_dir());
    let output_path = out_dir.join(output_file_name(Utc::now(), codec));

    if !args.json {
        println!("Exporting project: {}", loaded.project.name);
        println!("  Output: {}", output_path.display());
        println!(
            "  Quality: {}, speed {}x, codec {}",
            quality.as_str(),
            options.speed,
            codec.tag()
        );
    }

    let job = ExportJob {
        segment: loaded.project.segment.clone(),
        background: loaded.project.background.clone(),
        cursor: loaded.cursor.clone(),
        output_path,
    };

    let mut source = FfmpegSource::open(loaded.media_path())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open media: {e}"))?;
    let mut sink = FfmpegSink::new();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let json = args.json;
    let progress_cb: ProgressCallback = Box::new(move |p: ExportProgress| {
        if json {
            if let Ok(line) = serde_json::to_string(&p) {
                println!("{line}");
            }
        } else {
            print!(
                "\r  Progress: {:.1}% ({}/{} frames, ETA: {:.0}s)  ",
                p.progress * 100.0,
                p.frames_rendered,
                p.total_frames,
                p.eta_secs,
            );
        }
    });

    let pipeline = ExportPipeline::new();
    match pipeline
        .export(&mut source, &mut sink, job, &options, &cancel, Some(progress_cb))
        .await
    {
        Ok(outcome) => {
            if json {
                println!("{}", serde_json::to_string(&outcome)?);
            } else {
                println!(
                    "\nExport complete: {} ({} frames, {}x{}, {:.1}s)",
                    outcome.output.display(),
                    outcome.frames,
                    outcome.size.width,
                    outcome.size.height,
                    outcome.elapsed_secs
                );
            }
            Ok(())
        }
        Err(e) => {
            if !json {
                println!();
            }
            let hint = if e.is_retryable() { " (retryable)" } else { "" };
            anyhow::bail!("Export failed{hint}: {e}")
        }
    }
}
