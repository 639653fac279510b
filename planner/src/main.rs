use anyhow::Context;
use bridge::{ReportBridge, ReportModel};
use clap::Parser;
use mission::config::MissionConfig;
use mission::runner::{MissionReport, Runner};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use viscore::overlay::{GeoJsonOverlay, MapOverlayRenderer};
use viscore::ElevationCache;

mod bridge;
mod mission;
mod terrain;

#[derive(Parser)]
#[command(author, version, about = "Line-of-sight planner for drone flight paths")]
struct Args {
    /// Mission YAML; the built-in ridge demo runs when omitted
    #[arg(long)]
    mission: Option<PathBuf>,
    /// Override the path sample interval in meters
    #[arg(long)]
    sample_interval: Option<f64>,
    /// Override the minimum LOS clearance in meters
    #[arg(long)]
    clearance: Option<f64>,
    /// Write the full JSON report here
    #[arg(long)]
    output: Option<PathBuf>,
    /// Write the segment overlay as GeoJSON here
    #[arg(long)]
    overlay: Option<PathBuf>,
    /// Keep the HTTP report bridge alive for further missions
    #[arg(long, default_value_t = false)]
    serve: bool,
}

fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}

fn print_summary(report: &MissionReport) {
    let analysis = &report.analysis;
    println!(
        "Mission {} -> coverage {:.1}% ({:.0} of {:.0} m visible), {} segments, {} dropped samples, {:.0} ms",
        report.name,
        analysis.coverage_percentage,
        analysis.visible_length,
        analysis.total_length,
        analysis.segments.len(),
        analysis.dropped_sample_points,
        analysis.elapsed_ms
    );
    for (stats, station) in analysis.per_station_stats.iter().zip(&analysis.stations) {
        println!(
            "  station {} ({:?}): {:.1}% / {:.0} m visible",
            stats.station_index, station.kind, stats.coverage_percentage, stats.visible_length
        );
    }
    for link in &report.station_links {
        match link.obstruction_distance_m {
            Some(distance) => println!(
                "  link {} <-> {}: blocked {:.0} m from station {}",
                link.from, link.to, distance, link.from
            ),
            None => println!("  link {} <-> {}: clear", link.from, link.to),
        }
    }
    if let Some(grid) = &report.grid {
        println!(
            "  grid {}x{} at {:.0} m -> {:.1}% of cells visible",
            grid.rows(),
            grid.cols(),
            grid.cell_size,
            grid.coverage_percentage
        );
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mission = match &args.mission {
        Some(path) => MissionConfig::load(path)?,
        None => MissionConfig::demo(),
    }
    .with_overrides(args.sample_interval, args.clearance);

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating analysis runtime")?;

    let runner = Runner::new(Arc::new(ElevationCache::default()));
    let bridge = ReportBridge::new();
    if args.serve {
        bridge.serve(runner.clone(), bridge::server::default_bind_address());
    }

    let report = runtime.block_on(runner.execute(&mission))?;
    print_summary(&report);
    bridge.publish(ReportModel::from_report(&report));

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&report).context("serializing report")?;
        write_file(path, &json)?;
    }
    if let Some(path) = &args.overlay {
        let mut overlay = GeoJsonOverlay::new();
        overlay.draw_segments(&report.name, &report.analysis.segments);
        let layer = overlay
            .layer(&report.name)
            .context("overlay layer missing after drawing")?;
        let json = serde_json::to_string_pretty(layer).context("serializing overlay")?;
        write_file(path, &json)?;
    }

    if args.serve {
        bridge.publish_status("HTTP bridge running (Ctrl+C to stop)...");
        runtime.block_on(async {
            signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
            Ok::<(), anyhow::Error>(())
        })?;
    }

    Ok(())
}
