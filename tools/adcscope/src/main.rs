use adcscope::{run, BufferFormatter, ChannelArg, ScopeOptions, WaveKind};
use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Builder, Env};
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run a buffered ADC session on the simulated backend")]
struct Opts {
    /// Analog input and sample count, e.g. `A3:64`; repeat for more channels
    #[arg(long = "channel", value_name = "INPUT:COUNT", required = true)]
    channels: Vec<ChannelArg>,

    /// Sampling frequency in Hz
    #[arg(long, default_value_t = 1_000)]
    frequency: u32,

    /// Keep sampling with callback delivery instead of one blocking shot
    #[arg(long)]
    continuous: bool,

    /// Bank fills to collect in continuous mode
    #[arg(long, default_value_t = 8)]
    fills: usize,

    /// Bank length in continuous mode
    #[arg(long, default_value_t = 32)]
    bank: usize,

    /// Blocking timeout in milliseconds
    #[arg(long, default_value_t = 2_000)]
    timeout: u32,

    #[arg(long, value_enum, default_value_t = WaveKind::Sine)]
    waveform: WaveKind,

    /// Print one JSON object per buffer
    #[arg(long)]
    json: bool,
}

impl From<Opts> for ScopeOptions {
    fn from(opts: Opts) -> Self {
        Self {
            channels: opts.channels,
            frequency_hz: opts.frequency,
            continuous: opts.continuous,
            fills: opts.fills,
            bank_len: opts.bank,
            waveform: opts.waveform,
            timeout_ticks: opts.timeout,
        }
    }
}

fn main() -> Result<()> {
    Builder::from_env(Env::default().default_filter_or("adcscope=info")).init();

    let opts = Opts::parse();
    let formatter = BufferFormatter::new(opts.json);
    let options = ScopeOptions::from(opts);

    let records = run(&options)?;
    info!(
        "{} buffers from {} channels",
        records.len(),
        options.channels.len()
    );
    for record in &records {
        let line = formatter
            .format_record(record)
            .context("failed to encode buffer")?;
        println!("{line}");
    }

    Ok(())
}
