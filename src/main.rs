//! Filterworks CLI
//!
//! Lists the filter catalog and runs filters over image files on the host
//! device.

use anyhow::{anyhow, bail, Context as _, Result};
use filterworks::config::EngineConfig;
use filterworks::execution::{describe, device_count};
use filterworks::logging::{self, LoggerConfig};
use filterworks::prelude::*;
use serde::Deserialize;
use std::path::Path;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("filterworks");

    if let Err(e) = run(program, &args[1.min(args.len())..]) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(program: &str, args: &[String]) -> Result<()> {
    let config = EngineConfig::load(None)?;
    let logger = LoggerConfig::with_level_name(&config.log_level)?;
    logging::attach(&logger)?;

    let Some(command) = args.first() else {
        print_usage(program);
        return Ok(());
    };

    match command.as_str() {
        "list" => list_filters(),
        "info" => {
            let id = args.get(1).ok_or_else(|| anyhow!("please specify a filter id"))?;
            filter_info(id)
        }
        "devices" => list_devices(),
        "blur" => {
            if args.len() < 3 {
                bail!("usage: {} blur <in> <out> [--radius N] [--sigma S]", program);
            }
            blur(&config, &args[1], &args[2], &args[3..])
        }
        "run" => {
            if args.len() < 4 {
                bail!("usage: {} run <pipeline.json> <in> <out>", program);
            }
            run_pipeline(&config, &args[1], &args[2], &args[3])
        }
        "help" | "--help" | "-h" => {
            print_usage(program);
            Ok(())
        }
        other => {
            print_usage(program);
            bail!("unknown command: {}", other)
        }
    }
}

fn print_usage(program: &str) {
    println!("Filterworks v{} (API {})", filterworks::VERSION, filterworks::API_VERSION_STRING);
    println!();
    println!("Usage: {} <command> [options]", program);
    println!();
    println!("Commands:");
    println!("  list                               List all available filters");
    println!("  info <filter>                      Show a filter's parameters");
    println!("  devices                            List devices per backend");
    println!("  blur <in> <out> [options]          Gaussian blur an image");
    println!("  run <pipeline.json> <in> <out>     Run a JSON pipeline over an image");
    println!("  help                               Show this help message");
    println!();
    println!("Blur options:");
    println!("  --radius <n>    Neighborhood radius in pixels (default: 3)");
    println!("  --sigma <s>     Standard deviation (default: 2.0)");
    println!();
    println!("Environment: FILTERWORKS_BACKEND, FILTERWORKS_DEVICE,");
    println!("             FILTERWORKS_CACHE_DIR, FILTERWORKS_LOG");
}

fn list_filters() -> Result<()> {
    let catalog = FilterCatalog::shared();
    println!("Available filters ({} total):", catalog.len());
    println!();
    for (category, filters) in catalog.grouped_by_category() {
        println!("  {:?}", category);
        for metadata in filters {
            println!("      {} - {}", metadata.filter_type, metadata.description);
        }
        println!();
    }
    Ok(())
}

fn filter_info(id: &str) -> Result<()> {
    let filter_type =
        FilterType::from_id(id).ok_or_else(|| anyhow!("unknown filter type: {}", id))?;
    let catalog = FilterCatalog::shared();
    let metadata = catalog.entry(filter_type)?.metadata.clone();

    println!("Filter: {}", metadata.name);
    println!("Type: {} ({:#x})", filter_type, filter_type.code());
    println!("Category: {:?}", filter_type.category());
    println!("Joinable: {}", metadata.joinable);
    println!();
    println!("Description:");
    println!("  {}", metadata.description);
    if !metadata.parameters.is_empty() {
        println!();
        println!("Parameters:");
        for param in metadata.parameters.iter() {
            match &param.default_value {
                Some(value) => println!("  {} [{}] = {:?}", param.name, param.ty, value),
                None => println!("  {} [{}]", param.name, param.ty),
            }
            if !param.description.is_empty() {
                println!("    {}", param.description);
            }
        }
    }
    Ok(())
}

fn list_devices() -> Result<()> {
    for backend in BackendApi::ALL {
        println!("{}:", backend);
        for index in 0..device_count(backend) {
            let device = describe(backend, index)?;
            println!(
                "  [{}] {} ({}, {} MiB)",
                index,
                device.name,
                device.vendor,
                device.memory_size / (1024 * 1024)
            );
        }
    }
    Ok(())
}

/// Open a context from the configuration.
fn open_context(config: &EngineConfig) -> Result<Context> {
    Context::from_config(config).context("opening context")
}

fn load_image(ctx: &mut Context, path: &str) -> Result<(ImageId, ImageDescriptor)> {
    let rgba = image::open(path)
        .with_context(|| format!("reading {}", path))?
        .to_rgba8();
    let desc = ImageDescriptor::new(rgba.width(), rgba.height(), 4, ComponentType::Uint8);
    let id = ctx.create_image(&desc, Some(rgba.as_raw()))?;
    Ok((id, desc))
}

fn save_image(ctx: &mut Context, image: ImageId, path: &str) -> Result<()> {
    let desc = ctx.image_descriptor(image)?;
    let bytes = ctx.map_image(image, MapAccess::Read)?.as_slice().to_vec();
    let rgba = image::RgbaImage::from_raw(desc.width, desc.height, bytes)
        .ok_or_else(|| anyhow!("output buffer does not match {}x{}", desc.width, desc.height))?;
    rgba.save(path).with_context(|| format!("writing {}", path))?;
    Ok(())
}

fn blur(config: &EngineConfig, input: &str, output: &str, options: &[String]) -> Result<()> {
    let mut radius = 3u32;
    let mut sigma = 2.0f32;
    let mut i = 0;
    while i < options.len() {
        let value = options.get(i + 1);
        match (options[i].as_str(), value) {
            ("--radius", Some(v)) => radius = v.parse().context("--radius expects an integer")?,
            ("--sigma", Some(v)) => sigma = v.parse().context("--sigma expects a number")?,
            (other, _) => bail!("unknown or incomplete option: {}", other),
        }
        i += 2;
    }

    let mut ctx = open_context(config)?;
    let (src, desc) = load_image(&mut ctx, input)?;
    let dst = ctx.create_image(&desc, None)?;
    let filter = ctx.create_filter(FilterType::GaussianBlur)?;
    ctx.set_parameter_1u(filter, "radius", radius)?;
    ctx.set_parameter_1f(filter, "sigma", sigma)?;

    let queue = ctx.create_command_queue();
    ctx.attach(queue, filter, src, dst, None)?;
    let mut stats = PerformanceStatistic::measure_all();
    ctx.execute(queue, None, Some(&mut stats))?;
    ctx.synchronize(queue)?;
    save_image(&mut ctx, dst, output)?;

    println!(
        "{} -> {} in {} us (prepare {:.2} ms)",
        input, output, stats.execution_time, stats.compile_time
    );
    Ok(())
}

/// A pipeline file: filters applied in order.
#[derive(Debug, Deserialize)]
struct PipelineFile {
    filters: Vec<PipelineStage>,
}

#[derive(Debug, Deserialize)]
struct PipelineStage {
    #[serde(rename = "type")]
    filter_type: String,
    #[serde(default)]
    compute: ComputeType,
    #[serde(default)]
    parameters: serde_json::Map<String, serde_json::Value>,
}

/// Convert a JSON value to the parameter type the schema declares.
fn json_parameter(ty: ParameterType, value: &serde_json::Value) -> Result<ParameterValue> {
    let numbers = |value: &serde_json::Value| -> Result<Vec<f64>> {
        match value {
            serde_json::Value::Number(n) => Ok(vec![n.as_f64().unwrap_or_default()]),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|v| v.as_f64().ok_or_else(|| anyhow!("expected a number, got {}", v)))
                .collect(),
            other => bail!("expected a number or an array of numbers, got {}", other),
        }
    };
    let value = match ty {
        ParameterType::String => ParameterValue::String(
            value
                .as_str()
                .ok_or_else(|| anyhow!("expected a string, got {}", value))?
                .to_string(),
        ),
        ParameterType::FloatArray => {
            ParameterValue::FloatArray(numbers(value)?.into_iter().map(|v| v as f32).collect())
        }
        ParameterType::UIntArray => {
            ParameterValue::UIntArray(numbers(value)?.into_iter().map(|v| v as u32).collect())
        }
        ParameterType::IntArray => {
            ParameterValue::IntArray(numbers(value)?.into_iter().map(|v| v as i32).collect())
        }
        ParameterType::LocalMemory => ParameterValue::LocalMemory(
            value
                .as_u64()
                .ok_or_else(|| anyhow!("expected a byte count, got {}", value))? as u32,
        ),
        ParameterType::Image | ParameterType::ImageArray => {
            bail!("image parameters cannot be set from a pipeline file")
        }
        ParameterType::Float1
        | ParameterType::Float2
        | ParameterType::Float3
        | ParameterType::Float4
        | ParameterType::Float8
        | ParameterType::Float16 => {
            ParameterValue::Float(numbers(value)?.into_iter().map(|v| v as f32).collect())
        }
        ParameterType::UInt1
        | ParameterType::UInt2
        | ParameterType::UInt3
        | ParameterType::UInt4
        | ParameterType::UInt8
        | ParameterType::UInt16 => {
            ParameterValue::UInt(numbers(value)?.into_iter().map(|v| v as u32).collect())
        }
        ParameterType::Int1
        | ParameterType::Int2
        | ParameterType::Int3
        | ParameterType::Int4
        | ParameterType::Int8
        | ParameterType::Int16 => {
            ParameterValue::Int(numbers(value)?.into_iter().map(|v| v as i32).collect())
        }
    };
    Ok(value)
}

fn run_pipeline(config: &EngineConfig, pipeline: &str, input: &str, output: &str) -> Result<()> {
    let text = std::fs::read_to_string(Path::new(pipeline))
        .with_context(|| format!("reading {}", pipeline))?;
    let pipeline: PipelineFile =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", pipeline))?;
    if pipeline.filters.is_empty() {
        bail!("pipeline has no filters");
    }

    let mut ctx = open_context(config)?;
    let queue = ctx.create_command_queue();
    let (mut current, mut desc) = load_image(&mut ctx, input)?;

    for stage in &pipeline.filters {
        let filter_type = FilterType::from_id(&stage.filter_type)
            .ok_or_else(|| anyhow!("unknown filter type: {}", stage.filter_type))?;
        let filter = ctx.create_filter(filter_type)?;
        ctx.set_compute_type(filter, stage.compute)?;

        let metadata = ctx
            .get_filter(filter)
            .map(|f| f.metadata().clone())
            .ok_or_else(|| anyhow!("filter vanished"))?;
        for (name, value) in &stage.parameters {
            let def = metadata
                .get_parameter(name)
                .ok_or_else(|| anyhow!("{} has no parameter '{}'", filter_type, name))?;
            let value = json_parameter(def.ty, value)
                .with_context(|| format!("{}.{}", filter_type, name))?;
            ctx.set_parameter(filter, name, value)?;
        }

        if filter_type == FilterType::Resample {
            if let Some(size) = ctx
                .get_filter(filter)
                .and_then(|f| f.parameter("out_size"))
                .and_then(ParameterValue::as_uints)
            {
                desc = ImageDescriptor::new(size[0], size[1], 4, ComponentType::Uint8);
            }
        }
        let next = ctx.create_image(&desc, None)?;
        ctx.attach(queue, filter, current, next, None)?;
        current = next;
    }

    let started = std::time::Instant::now();
    let on_submitted = |s: &Submission| log::info!("submitted job {}", s.ticket());
    ctx.execute(queue, Some(Box::new(on_submitted)), None)?;
    ctx.synchronize(queue)?;
    save_image(&mut ctx, current, output)?;
    println!(
        "{} -> {} through {} filter(s) in {:?}",
        input,
        output,
        pipeline.filters.len(),
        started.elapsed()
    );
    Ok(())
}
