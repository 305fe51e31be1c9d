//! Chitra CLI - Pull-based Frame Filtering
//!
//! This is a demonstration CLI for the chitra library.

use anyhow::{anyhow, Context};
use chitra::prelude::*;
use image::RgbImage;
use log::info;

fn main() {
    env_logger::init();

    println!("Chitra - Pull-based Frame Filtering v{}", chitra::VERSION);
    println!();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        return;
    }

    let result = match args[1].as_str() {
        "list" => {
            list_filters();
            Ok(())
        }
        "info" => {
            if args.len() < 3 {
                Err(anyhow!("please specify a filter ID"))
            } else {
                filter_info(&args[2])
            }
        }
        "process" => {
            if args.len() < 4 {
                eprintln!("Usage: {} process <input> <output>", args[0]);
                return;
            }
            process_image(&args[2], &args[3])
        }
        "help" | "--help" | "-h" => {
            print_usage(&args[0]);
            Ok(())
        }
        other => {
            print_usage(&args[0]);
            Err(anyhow!("unknown command: {other}"))
        }
    };

    if let Err(error) = result {
        eprintln!("Error: {error:#}");
        std::process::exit(1);
    }
}

fn print_usage(program: &str) {
    println!("Usage: {} <command> [options]", program);
    println!();
    println!("Commands:");
    println!("  list              List all available filters");
    println!("  info <filter>     Show a filter's descriptor as JSON");
    println!("  process <in> <out>  Convert an image to RGB through a pipeline");
    println!("  help              Show this help message");
    println!();
    println!("Set RUST_LOG=debug to watch negotiation and program binding.");
}

fn list_filters() {
    let registry = FilterRegistry::with_builtins();

    println!("Available filters ({} total):", registry.len());
    println!();

    for (id, entry) in registry.filters() {
        let ports = format!(
            "{} -> {}",
            entry.descriptor.inputs.join(", "),
            if entry.descriptor.outputs.is_empty() {
                "(sink)".to_string()
            } else {
                entry.descriptor.outputs.join(", ")
            }
        );
        println!("  {:<12} {:<32} [{}]", id, entry.descriptor.description, ports);
    }
}

fn filter_info(filter_id: &str) -> anyhow::Result<()> {
    let registry = FilterRegistry::with_builtins();

    let descriptor = registry
        .descriptor(filter_id)
        .ok_or_else(|| anyhow!("filter not found: {filter_id} (use 'list' to see available filters)"))?;

    let json = serde_json::to_string_pretty(descriptor)?;
    println!("{json}");
    Ok(())
}

/// Decode an image, drive it through a `to_rgb` stage into a tap, and
/// encode the converted frame.
fn process_image(input_path: &str, output_path: &str) -> anyhow::Result<()> {
    let registry = FilterRegistry::with_builtins();
    let context = FilterContext::builder().frame_budget(256 << 20).build();

    let decoded = image::open(input_path).with_context(|| format!("opening {input_path}"))?;
    let (width, height) = (decoded.width(), decoded.height());

    // Feed gray images as one-byte samples and everything else as RGBA,
    // the two widths the converter's routines cover.
    let (format, payload) = match decoded {
        image::DynamicImage::ImageLuma8(gray) => (
            FrameFormat::binary(1, StorageTarget::Native).with_dimensions(width, height),
            gray.into_raw(),
        ),
        other => (
            FrameFormat::binary(4, StorageTarget::Native).with_dimensions(width, height),
            other.to_rgba8().into_raw(),
        ),
    };
    info!("decoded {input_path} as {format}");

    let mut convert = Stage::new(
        registry
            .create("to_rgb")
            .ok_or_else(|| anyhow!("to_rgb is not registered"))?,
    );
    convert.negotiate_input("image", &format)?;
    convert.prepare(&context)?;
    let tap = convert.tap_output("image")?;

    convert.feed("image", context.frames().allocate_from(format, payload)?)?;

    // Single-shot scheduler: one frame in, run until the stage asks to
    // wait on inputs again.
    let status = convert.process(&context)?;
    info!("to_rgb reported {status}");

    let frame = tap
        .pop()
        .ok_or_else(|| anyhow!("pipeline produced no output frame"))?;
    let rgb = RgbImage::from_raw(width, height, frame.data().to_vec())
        .ok_or_else(|| anyhow!("output frame size does not match {width}x{height}"))?;
    rgb.save(output_path)
        .with_context(|| format!("saving {output_path}"))?;

    println!(
        "Converted {} -> {} ({}x{}, {} bytes in flight at peak)",
        input_path,
        output_path,
        width,
        height,
        frame.len()
    );
    Ok(())
}
