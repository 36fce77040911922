// src/main.rs
// Command-line application for GDF Reader

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use gdf_reader::{ControlBlock, GdfFile, Measurement, VariableData};
use log::{error, LevelFilter};

#[derive(Parser, Debug)]
#[command(
    name = "gdf_reader",
    version = env!("CARGO_PKG_VERSION"),
    about = "Inspect .gdf scan probe microscopy files",
    long_about = None,
)]
struct Cli {
    /// More log output (-v debug, -vv trace of the block walk)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Display header and block summary
    Info { file: PathBuf },
    /// Print the block tree with variable types and values
    Tree { file: PathBuf },
    /// List the measurements found in the file
    Measurements { file: PathBuf },
    /// Print one measurement image as whitespace separated rows
    Extract { file: PathBuf, index: usize },
}

fn main() {
    let cli = Cli::parse();
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .format_target(false)
        .format_timestamp_secs()
        .init();

    let input_file = match &cli.command {
        Command::Info { file }
        | Command::Tree { file }
        | Command::Measurements { file }
        | Command::Extract { file, .. } => file,
    };

    // Load the GDF file
    let mut gdf = GdfFile::new();
    if let Err(e) = gdf.load_file(input_file) {
        error!("Error loading GDF file '{}': {}", input_file.display(), e);
        process::exit(1);
    }

    match &cli.command {
        Command::Info { .. } => print_file_info(&gdf),
        Command::Tree { .. } => {
            for block in &gdf.base_blocks {
                print_block(block);
            }
        }
        Command::Measurements { .. } => {
            let measurements = load_measurements(&gdf);
            if measurements.is_empty() {
                println!("No measurements found");
            }
            for (i, measurement) in measurements.iter().enumerate() {
                print_measurement(i, measurement);
            }
        }
        Command::Extract { index, .. } => {
            let measurements = load_measurements(&gdf);
            let measurement = match measurements.get(*index) {
                Some(m) => m,
                None => {
                    error!(
                        "Measurement {} not found (file has {} measurements)",
                        index,
                        measurements.len()
                    );
                    process::exit(1);
                }
            };
            match &measurement.image {
                Some(image) => {
                    println!(
                        "# Measurement {} (block {}) from {}",
                        index,
                        measurement.block_id,
                        input_file.display()
                    );
                    println!("# {} rows x {} columns", image.rows(), image.columns());
                    for row in image.iter_rows() {
                        let line: Vec<String> = row.iter().map(|v| format!("{:.6e}", v)).collect();
                        println!("{}", line.join(" "));
                    }
                }
                None => {
                    error!("Measurement {} has no image matching its settings", index);
                    process::exit(1);
                }
            }
        }
    }
}

fn load_measurements(gdf: &GdfFile) -> Vec<Measurement> {
    match gdf.export_measurements() {
        Ok(measurements) => measurements,
        Err(e) => {
            error!("Error extracting measurements: {}", e);
            process::exit(1);
        }
    }
}

fn print_file_info(gdf: &GdfFile) {
    println!("GDF File Information");
    println!("====================");
    println!();
    println!("File: {}", gdf.file_path);
    println!("Magic: {}", String::from_utf8_lossy(&gdf.file_header.magic));
    println!("Version: 0x{:04x}", gdf.file_header.version);
    println!("Created: {} (unix time)", gdf.file_header.creation_time);
    println!("Description: {}", gdf.file_header.description);
    println!();

    let blocks = gdf.blocks();
    let max_depth = blocks.iter().map(|b| b.depth).max().unwrap_or(0);
    println!("Block Structure:");
    println!("  Top-level blocks: {}", gdf.base_blocks.len());
    println!("  Total blocks: {}", blocks.len());
    println!("  Maximum nesting depth: {}", max_depth);
    println!();

    match gdf.export_measurements() {
        Ok(measurements) => {
            println!("Measurements: {}", measurements.len());
            for (i, m) in measurements.iter().enumerate() {
                let (rows, columns) = m.settings.shape();
                let (width, height) = m.settings.size_in_um();
                println!(
                    "  {}: block {}, {}x{} pixels, {:.2} x {:.2} um{}",
                    i,
                    m.block_id,
                    rows,
                    columns,
                    width,
                    height,
                    if m.image.is_some() { "" } else { " (no image)" }
                );
            }
        }
        Err(e) => println!("Measurements: unavailable ({})", e),
    }
}

fn print_block(block: &ControlBlock) {
    let pad = "    ".repeat(block.depth);
    println!(
        "{}block {} [{} variables, {} data]",
        pad, block.id, block.n_variables, block.n_data
    );
    for (i, variable) in block.variables.iter().enumerate() {
        println!(
            "{}  {:>2} {:<24} {:<9} {}",
            pad,
            i,
            variable.name,
            variable.var_type.name(),
            variable.data
        );
        if let VariableData::Blocks(children) = &variable.data {
            for child in children {
                print_block(child);
            }
        }
    }
}

fn print_measurement(index: usize, m: &Measurement) {
    let s = &m.settings;
    let (rows, columns) = s.shape();
    println!("Measurement {} (block {})", index, m.block_id);
    println!("  Comment: {:?}", m.comment);
    println!("  Shape: {} rows x {} columns", rows, columns);
    println!("  Pixel width: {:.3e} m", s.pixel_width());
    println!("  Scan size: {:.3e} m x {:.3e} m", s.max_width, s.max_height);
    println!("  Scan speed: {}", s.scan_speed);
    println!("  Set point: {}", s.set_point);
    println!("  Bias voltage: {} V", s.bias_voltage);
    println!("  Calibration x/y/z: {} / {} / {}", s.x_calib, s.y_calib, s.z_calib);
    println!("  Preview: {}", m.preview);
    match &m.image {
        Some(image) => {
            if let Some((min, max)) = image.min_max() {
                println!("  Height range: {:.3e} to {:.3e} (span {:.3e})", min, max, max - min);
            }
        }
        None => println!("  Image: absent (value count does not match shape)"),
    }
    println!();
}
