//! vk-gpu-info: print Vulkan capability information per GPU
//!
//! Usage:
//!   vk-gpu-info
//!   vk-gpu-info --device 0
//!   vk-gpu-info --json
//!
//! Prints, per matched device, its name, id, supported extensions,
//! flattened limits mapping, and subgroup-properties mapping. Exits
//! non-zero when the driver context cannot be created.

use clap::Parser;

use vulkan_caps::{get_gpu_info, DeviceCapabilities, Flat};

/// Print Vulkan capability information for any or all GPUs
#[derive(Parser)]
#[command(name = "vk-gpu-info")]
#[command(version)]
#[command(about = "Query Vulkan device limits, extensions, and subgroup properties")]
struct Cli {
    /// Only report the device whose numeric id or enumeration index
    /// matches
    #[arg(long)]
    device: Option<u32>,

    /// Emit machine-readable JSON instead of the human-readable listing
    #[arg(long)]
    json: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let gpu_info = match get_gpu_info(cli.device) {
        Ok(info) => info,
        Err(e) => {
            eprintln!("vk-gpu-info: {e}");
            std::process::exit(1);
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&gpu_info) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                eprintln!("vk-gpu-info: failed to render JSON: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    for (index, device) in &gpu_info {
        print_device(*index, device);
        println!("---------------------------------------------");
    }
}

fn print_device(index: usize, device: &DeviceCapabilities) {
    println!("GPU {index}:");
    println!("  Device Name: {}", device.device_name);
    println!("  Device ID: {:#x}", device.device_id);

    println!("  Extensions:");
    for extension in &device.extensions {
        println!("    {} (version {})", extension.name, extension.version);
    }

    println!("  Limits:");
    print_mapping(&device.limits, 4);

    println!("  Subgroup Properties:");
    print_mapping(&device.subgroup_properties, 4);
}

fn print_mapping(value: &Flat, indent: usize) {
    let pad = " ".repeat(indent);
    match value {
        Flat::Map(map) => {
            for (key, entry) in map {
                println!("{pad}{key}: {}", render_value(entry));
            }
        }
        other => println!("{pad}{}", render_value(other)),
    }
}

fn render_value(value: &Flat) -> String {
    match value {
        Flat::Null => "null".to_string(),
        Flat::Bool(v) => v.to_string(),
        Flat::UInt(v) => v.to_string(),
        Flat::Int(v) => v.to_string(),
        Flat::Float(v) => v.to_string(),
        Flat::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        Flat::Text(v) | Flat::Address(v) => v.clone(),
        Flat::List(items) => {
            let rendered: Vec<String> = items.iter().map(render_value).collect();
            format!("[{}]", rendered.join(", "))
        }
        Flat::Map(map) => {
            let rendered: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{k}: {}", render_value(v)))
                .collect();
            format!("{{{}}}", rendered.join(", "))
        }
    }
}
