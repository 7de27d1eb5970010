//! CLI tool for inspecting saved maps.
//!
//! Displays the header, extent and confidence distribution of a `.bhmap`
//! file.
//!
//! # Usage
//!
//! ```bash
//! bhitti_info maps/raw.bhmap
//! bhitti_info --bins 5 --show 20 maps/partial.bhmap
//! ```

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use bhitti_map::io::{HEADER_SIZE, RECORD_SIZE, read_header, read_points};
use bhitti_map::{Bounds3, CellKey};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "bhitti_info")]
#[command(about = "Display information about a saved bhitti map")]
struct Args {
    /// Map file (.bhmap)
    map: PathBuf,

    /// Confidence histogram buckets
    #[arg(short, long, default_value = "10")]
    bins: usize,

    /// Print the first N points
    #[arg(short, long, default_value = "0")]
    show: usize,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::open(&args.map)?;
    let file_size = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let header = read_header(&mut reader)?;
    let points = read_points(&mut reader, &header)?;

    println!("Map File Information");
    println!("====================");
    println!("File: {}", args.map.display());
    println!(
        "Size: {} bytes ({} header + {} x {} records)",
        file_size, HEADER_SIZE, header.point_count, RECORD_SIZE
    );
    println!();

    println!("Header Information:");
    println!("  Format version: {}", header.format_version);
    println!("  Map version: {}", header.map_version);
    println!("  Eviction: {:?}", header.eviction);
    println!("  Resolution: {:.3} m", header.resolution);
    println!(
        "  Points: {} / {} ({:.1}% full)",
        header.point_count,
        header.max_points,
        percent(header.point_count as usize, header.max_points as usize)
    );
    println!();

    let Some(bounds) = Bounds3::from_points(&points) else {
        println!("Map is empty");
        return Ok(());
    };
    let size = bounds.size();
    println!("Extent:");
    println!(
        "  Min: ({:.2}, {:.2}, {:.2})",
        bounds.min[0], bounds.min[1], bounds.min[2]
    );
    println!(
        "  Max: ({:.2}, {:.2}, {:.2})",
        bounds.max[0], bounds.max[1], bounds.max[2]
    );
    println!("  Size: {:.2} x {:.2} x {:.2} m", size[0], size[1], size[2]);

    let columns: HashSet<(i32, i32)> = points
        .iter()
        .filter_map(|p| CellKey::of(p, header.resolution))
        .map(|key| key.column())
        .collect();
    let cell_area = header.resolution * header.resolution;
    println!(
        "  Footprint: {} columns ({:.2} m^2)",
        columns.len(),
        columns.len() as f32 * cell_area
    );
    println!();

    let bins = args.bins.max(1);
    let mut histogram = vec![0usize; bins];
    let mut sum = 0.0f64;
    for point in &points {
        let bin = ((point.confidence * bins as f32) as usize).min(bins - 1);
        histogram[bin] += 1;
        sum += point.confidence as f64;
    }
    println!(
        "Confidence (mean {:.3}):",
        sum / points.len() as f64
    );
    for (i, count) in histogram.iter().enumerate() {
        let low = i as f32 / bins as f32;
        let high = (i + 1) as f32 / bins as f32;
        println!(
            "  [{:.2}, {:.2}{} {:>8} {}",
            low,
            high,
            if i + 1 == bins { "]" } else { ")" },
            count,
            bar(*count, points.len())
        );
    }

    if args.show > 0 {
        println!();
        println!("First {} points (oldest first):", args.show.min(points.len()));
        for point in points.iter().take(args.show) {
            println!(
                "  ({:>8.3}, {:>8.3}, {:>8.3})  conf {:.3}",
                point.x, point.y, point.z, point.confidence
            );
        }
    }

    Ok(())
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

fn bar(count: usize, total: usize) -> String {
    const WIDTH: f64 = 40.0;
    "#".repeat((percent(count, total) / 100.0 * WIDTH).round() as usize)
}
