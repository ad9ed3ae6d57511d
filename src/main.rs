// src/main.rs

use anyhow::Result;
use pose_analyzer::export::ExportFormat;
use pose_analyzer::pipeline::PoseAnalyzer;
use pose_analyzer::recording::RecordingProcessor;
use pose_analyzer::types::Config;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Logging level comes from the config, so report a load failure only
    // once the subscriber is up.
    let (config, load_error) = match Config::load("config.yaml") {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("🏋️ Pose Analysis System Starting");
    match load_error {
        None => info!("✓ Configuration loaded"),
        Some(e) => warn!("Using default configuration: {:#}", e),
    }
    info!(
        "Thresholds: iou={:.2}, visibility={:.2}, feedback_expiry={:.1}s",
        config.tracker.iou_threshold,
        config.metrics.visibility_threshold,
        config.feedback.expiry_seconds
    );

    let export_format: ExportFormat = config.recording.export_format.parse()?;

    let processor = RecordingProcessor::new(config.clone());
    let recordings = processor.find_recording_files()?;

    if recordings.is_empty() {
        error!("No recordings found in {}", config.recording.input_dir);
        return Ok(());
    }

    info!("Found {} recording(s) to process", recordings.len());

    for (idx, path) in recordings.iter().enumerate() {
        info!("\n========================================");
        info!(
            "Processing recording {}/{}: {}",
            idx + 1,
            recordings.len(),
            path.display()
        );
        info!("========================================\n");

        if let Err(e) = process_recording(&processor, &config, path, export_format) {
            error!("Failed to process recording: {:#}", e);
        }
    }

    Ok(())
}

fn process_recording(
    processor: &RecordingProcessor,
    config: &Config,
    path: &Path,
    export_format: ExportFormat,
) -> Result<()> {
    let mut analyzer = PoseAnalyzer::new(config.clone());
    let summary = processor.analyze_recording(path, &mut analyzer)?;

    info!("\n✓ {}", summary.status.as_str());
    info!("  Frames analysed: {}", summary.frame_count);
    info!("  Duration: {:.2}s", summary.duration);
    info!("  Mean accuracy: {:.1}%", summary.accuracy);
    for (joint, angle) in &summary.joint_angles {
        info!("  📐 {}: {:.1}°", joint, angle);
    }
    if summary.feedback.is_empty() {
        info!("  💬 No active feedback");
    } else {
        for item in &summary.feedback {
            info!("  💬 [{:.2}s] {}", item.timestamp, item.message);
        }
    }

    let stats = analyzer.metrics().summary();
    let still_tracked = analyzer.session().map_or(0, |s| s.person_count());
    info!(
        "  Persons tracked: {} (evicted {}, {} at end), feedback issued: {}",
        stats.persons_created, stats.persons_evicted, still_tracked, stats.feedback_issued
    );
    info!("  Processing Speed: {:.1} FPS", stats.fps);
    info!("  Metrics: {}", serde_json::to_string(&stats)?);

    if analyzer.records().is_empty() {
        warn!("  Nothing to export for {}", path.display());
        return Ok(());
    }

    // One directory per recording keeps same-second exports apart.
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "recording".to_string());
    let out_dir = Path::new(&config.recording.output_dir).join(stem);
    let exported = analyzer.export_to_dir(&out_dir, export_format)?;
    info!("  💾 Results written to {}", exported.display());
    Ok(())
}
