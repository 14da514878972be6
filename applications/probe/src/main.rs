/// AHAL Probe - USB capability and device lifecycle diagnostics
use ahal_core::{
    CapabilityReader, DeviceAddress, DeviceAttributes, DeviceId, Direction, HalError,
    StreamAttributes, StreamHandle,
};
use ahal_device::{DefaultBackendFactory, DeviceRegistry};
use ahal_probe::{ProbeConfig, ProbeError, ProbeResources};
use ahal_usb::{CapabilityCache, ProcfsReader, StaticReader, UsbDevice};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::{path::PathBuf, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ahal-probe")]
#[command(about = "Inspect USB audio capabilities and exercise device lifecycles", long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./ahal.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump the capabilities of a USB card
    Caps {
        #[command(flatten)]
        source: DescriptorArgs,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Negotiate a stream request against a USB card
    Negotiate {
        #[command(flatten)]
        source: DescriptorArgs,

        #[arg(long, value_enum, default_value_t = DirectionArg::Playback)]
        direction: DirectionArg,

        /// Requested sample rate in Hz
        #[arg(long, default_value_t = 48000)]
        rate: u32,

        /// Requested bits per sample
        #[arg(long, default_value_t = 16)]
        bits: u32,

        /// Requested channel count
        #[arg(long, default_value_t = 2)]
        channels: u16,
    },
    /// Open, start and stop a codec device from several streams
    Exercise {
        /// Device id (e.g. out_speaker, in_handset_mic)
        #[arg(long, default_value = "out_speaker")]
        device: String,

        /// Number of streams sharing the device
        #[arg(long, default_value_t = 2)]
        streams: u32,
    },
}

#[derive(Args)]
struct DescriptorArgs {
    /// Read the descriptor from this file instead of the procfs tree
    #[arg(long)]
    descriptor: Option<PathBuf>,

    /// Card number
    #[arg(long, default_value_t = 0)]
    card: u32,

    /// Device (stream) number on the card
    #[arg(long, default_value_t = 0)]
    device: u32,
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    Playback,
    Capture,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Playback => Direction::Playback,
            DirectionArg::Capture => Direction::Capture,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ProbeConfig::load(cli.config.as_deref())?;
    config.validate()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::debug!("Backend: {}", config.backend.name());

    match cli.command {
        Commands::Caps { source, json } => caps(&config, &source, json)?,
        Commands::Negotiate {
            source,
            direction,
            rate,
            bits,
            channels,
        } => {
            let request = StreamAttributes::new(direction.into(), rate, bits, channels);
            negotiate(&config, &source, &request)?;
        }
        Commands::Exercise { device, streams } => exercise(&config, &device, streams)?,
    }

    Ok(())
}

/// Connect the addressed card through the configured descriptor source
fn connect(
    config: &ProbeConfig,
    source: &DescriptorArgs,
) -> Result<(UsbDevice, DeviceAddress), ProbeError> {
    let address = DeviceAddress::new(source.card, source.device);

    let reader: Arc<dyn CapabilityReader> = match &source.descriptor {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            let reader = StaticReader::new();
            reader.insert(address.clone(), text);
            Arc::new(reader)
        }
        None => Arc::new(ProcfsReader::new(&config.capability_root)),
    };

    let usb = UsbDevice::new(Arc::new(CapabilityCache::new()), reader);
    usb.connect(&address)?;
    Ok((usb, address))
}

fn caps(config: &ProbeConfig, source: &DescriptorArgs, json: bool) -> anyhow::Result<()> {
    let (usb, address) = connect(config, source)?;

    for direction in Direction::ALL {
        let caps = match usb.default_config(&address, direction) {
            Ok(caps) => caps,
            Err(HalError::NoDevice(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        if json {
            println!("{}", serde_json::to_string_pretty(&caps)?);
            continue;
        }

        println!("{} ({}):", address, direction);
        println!("  default format:   {:?}", caps.format);
        println!("  default rate:     {} Hz", caps.sample_rate);
        println!("  default channels: {}", caps.channel_mask.channel_count());
        println!("  rates:            {:?}", caps.supported.sample_rates);
        println!("  formats:          {:?}", caps.supported.formats);
        println!("  max channels:     {}", caps.supported.max_channels);
        println!("  max bit width:    {}", caps.supported.max_bit_width);
    }

    Ok(())
}

fn negotiate(
    config: &ProbeConfig,
    source: &DescriptorArgs,
    request: &StreamAttributes,
) -> anyhow::Result<()> {
    let (usb, address) = connect(config, source)?;

    let id = match request.direction {
        Direction::Playback => DeviceId::OutUsbDevice,
        Direction::Capture => DeviceId::InUsbDevice,
    };
    let mut device = DeviceAttributes::new(id).with_address(address);
    usb.select_best_config(&mut device, request, request.direction)?;

    println!("{}", serde_json::to_string_pretty(&device.config)?);
    Ok(())
}

fn exercise(config: &ProbeConfig, device: &str, streams: u32) -> anyhow::Result<()> {
    let id = DeviceId::from_str(device)
        .ok_or_else(|| ProbeError::BadArgument(format!("unknown device id '{device}'")))?;

    let resources = Arc::new(ProbeResources::from_config(config));
    let registry = DeviceRegistry::new(resources.clone(), Arc::new(DefaultBackendFactory));
    let lifecycle = registry.get_or_create(&DeviceAttributes::new(id))?;

    lifecycle.open()?;
    println!("open:  {:?}", lifecycle.state());

    for n in 0..streams {
        resources.register_stream(id, StreamHandle(u64::from(n)));
        lifecycle.start()?;
        println!(
            "start: {:?} routes={:?}",
            lifecycle.state(),
            resources.route().enabled_paths()
        );
    }

    for n in 0..streams {
        lifecycle.stop()?;
        resources.unregister_stream(id, StreamHandle(u64::from(n)));
        println!(
            "stop:  {:?} routes={:?}",
            lifecycle.state(),
            resources.route().enabled_paths()
        );
    }

    lifecycle.close()?;
    println!("close: {:?}", lifecycle.state());
    registry.release(id)?;

    Ok(())
}
