//! Radio emulator
//! Runs an emulated radio on a serial port (e.g. one end of a virtual null
//! modem) and prints every codeplug image the programming software writes.

use codeplug_rs::drivers::{create_device, list_device_classes, serve, CodeplugImage, ImageCollector};
use codeplug_rs::formats::ModelDefinition;
use codeplug_rs::pattern::{decode_from_rom, PatternKind, PatternTree};
use codeplug_rs::serial::{list_ports, SerialConfig, SerialPort};
use std::env;
use tracing_subscriber::{fmt::format::FmtSpan, prelude::*, EnvFilter};

fn print_image(image: &CodeplugImage, pattern: Option<&PatternTree>) {
    println!("=== {} ({} bytes) ===", image.label, image.rom.stored_bytes());
    print!("{}", image.rom.dump());

    let Some((tree, root)) = pattern.and_then(|tree| tree.root().map(|root| (tree, root))) else {
        return;
    };
    for id in tree.descendants(root) {
        if !matches!(tree[id].kind(), PatternKind::Field(_)) {
            continue;
        }
        match decode_from_rom(tree, id, &image.rom) {
            Ok(decoded) => {
                println!("{} = {}", tree.describe(id), decoded.value);
                for issue in decoded.issues {
                    println!("    {}", issue);
                }
            }
            Err(err) => tracing::debug!("Cannot decode {}: {}", tree.describe(id), err),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let format_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(format_layer)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 4 || args.len() > 5 {
        eprintln!("Usage: {} <definition.json> <firmware|-> <port> [pattern.xml]", args[0]);
        eprintln!("Example: {} d878uv.json 3.04 /dev/pts/4", args[0]);
        eprintln!("\nDevice classes:");
        for class in list_device_classes() {
            eprintln!("  {:10} {}", class.name, class.description);
        }
        if let Ok(ports) = list_ports() {
            eprintln!("\nSerial ports:");
            for port in ports {
                eprintln!("  {}", port);
            }
        }
        std::process::exit(1);
    }

    let definition = ModelDefinition::load(&args[1])?;
    let firmware = match args[2].as_str() {
        "-" => None,
        name => Some(name),
    };
    if let Some(name) = firmware {
        if definition.firmware(name).is_none() {
            anyhow::bail!(
                "Unknown firmware {} for {}, known: {}",
                name,
                definition.name,
                definition.firmware_names().join(", ")
            );
        }
    }
    let port_name = &args[3];

    let pattern = match args.get(4) {
        Some(path) => Some(PatternTree::load(path)?),
        None => match definition.codeplug_path(firmware)? {
            Some(path) => Some(PatternTree::load(path)?),
            None => None,
        },
    };
    if let Some(Err(err)) = pattern.as_ref().map(|tree| tree.verify_root()) {
        tracing::warn!("Codeplug pattern does not verify: {}", err);
    }

    let decode_pattern = pattern.clone();
    let collector = ImageCollector::new().with_listener(Box::new(move |image| {
        print_image(image, decode_pattern.as_ref());
    }));
    let mut device = create_device(&definition, firmware, pattern, collector)?;

    tracing::info!("Opening serial port {}...", port_name);
    let mut port = SerialPort::open(port_name, SerialConfig::default())?;
    port.clear_all()?;

    serve(&mut port, device.as_mut()).await?;

    tracing::info!(
        "Received {} image(s) from {}",
        device.collector().count(),
        port.port_name()
    );
    port.close()?;
    Ok(())
}
