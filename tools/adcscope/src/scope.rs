//! Simulated session runner

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

use adcbuf::{
    AdcBuf, AdcError, Bank, ChannelSetting, ConversionRequest, DriverConfig, ReadyBuffer,
    SessionParams,
};
use anyhow::{ensure, Context, Result};
use hal::{AdcChannelId, PinConfig, ReferenceSource};
use hal_sim::{SimProbe, SimulatedBackend, SimulatedPower, Waveform};
use log::{debug, warn};
use serde::Serialize;

use crate::args::{ChannelArg, WaveKind};

const REFERENCE_UV: u32 = 2_500_000;

type SimAdc<'a> = AdcBuf<'a, SimulatedBackend, SimulatedPower>;

/// What to sample and how
#[derive(Debug, Clone)]
pub struct ScopeOptions {
    pub channels: Vec<ChannelArg>,
    pub frequency_hz: u32,
    /// Continuous callback session instead of one-shot blocking
    pub continuous: bool,
    /// Bank fills to collect before stopping a continuous session
    pub fills: usize,
    /// Bank length for continuous sessions; one-shot banks hold the whole
    /// request
    pub bank_len: usize,
    pub waveform: WaveKind,
    pub timeout_ticks: u32,
}

/// One delivered bank, converted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BufferRecord {
    /// Analog input (A-number)
    pub input: AdcChannelId,
    /// Position in the channel table
    pub channel: usize,
    pub bank: Bank,
    pub sequence: u32,
    pub is_final: bool,
    pub samples: Vec<u16>,
    pub microvolts: Vec<u32>,
}

/// Run one session on the simulated backend and return every delivered bank
/// in arrival order.
pub fn run(options: &ScopeOptions) -> Result<Vec<BufferRecord>> {
    ensure!(!options.channels.is_empty(), "at least one channel is required");
    ensure!(
        !options.continuous || options.bank_len > 0,
        "bank length must be positive"
    );

    let config = driver_config(options);
    let full_scale = ((1u64 << config.resolution_bits) - 1).min(u64::from(u16::MAX)) as u16;
    let mut inputs = Inputs::new(options, full_scale);
    let mut storage: Vec<(Vec<u16>, Vec<u16>)> = options
        .channels
        .iter()
        .map(|arg| {
            let len = if options.continuous {
                options.bank_len
            } else {
                arg.count as usize
            };
            (vec![0; len], vec![0; len])
        })
        .collect();
    let (tx, rx) = mpsc::channel();

    let (backend, probe) = SimulatedBackend::new();
    let (power, _) = SimulatedPower::new();
    let adc = AdcBuf::open(config, backend, power).context("failed to open driver")?;

    let params = if options.continuous {
        let target = options.fills;
        let mut seen = 0;
        adc.set_callback(move |_, result: Result<ReadyBuffer<'_>, AdcError>| {
            let buffer = match result {
                Ok(buffer) => buffer,
                Err(err) => {
                    warn!("session ended early: {err}");
                    return ControlFlow::Break(());
                }
            };
            // The receiver outlives the session.
            let _ = tx.send(BufferRecord {
                input: 0,
                channel: buffer.channel,
                bank: buffer.bank,
                sequence: buffer.sequence,
                is_final: buffer.is_final,
                samples: buffer.samples.to_vec(),
                microvolts: Vec::new(),
            });
            seen += 1;
            if seen >= target {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        SessionParams::continuous(options.frequency_hz)
    } else {
        SessionParams::one_shot_blocking(options.frequency_hz, options.timeout_ticks)
    };

    let requests = storage
        .iter_mut()
        .zip(&options.channels)
        .enumerate()
        .map(|(index, ((ping, pong), arg))| ConversionRequest::new(index, arg.count, ping, pong))
        .collect();

    let abort = AtomicBool::new(false);
    let started = thread::scope(|s| {
        s.spawn(|| play_interrupts(&adc, &probe, &mut inputs, &abort));
        let started = adc.start(requests, &params);
        if started.is_err() {
            abort.store(true, Ordering::Release);
            if let Err(err) = adc.cancel() {
                debug!("nothing to cancel after failed start: {err}");
            }
        }
        started
    });
    let handle = started.context("conversion session failed")?;
    debug!("{handle} done, {} backend calls", probe.calls().len());

    let mut records: Vec<BufferRecord> = if options.continuous {
        rx.try_iter().collect()
    } else {
        adc.reclaim()
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(channel, request)| BufferRecord {
                input: 0,
                channel,
                bank: Bank::Ping,
                sequence: request.fills(),
                is_final: true,
                samples: request.bank(Bank::Ping)[..request.delivered() as usize].to_vec(),
                microvolts: Vec::new(),
            })
            .collect()
    };

    for record in &mut records {
        record.input = options
            .channels
            .get(record.channel)
            .map_or(0, |arg| arg.input);
        let mut adjusted = vec![0; record.samples.len()];
        adc.adjust_raw_values(record.channel, &record.samples, &mut adjusted)?;
        record.microvolts = vec![0; adjusted.len()];
        adc.adjusted_to_microvolts(record.channel, &adjusted, &mut record.microvolts)?;
    }
    Ok(records)
}

fn driver_config(options: &ScopeOptions) -> DriverConfig {
    options
        .channels
        .iter()
        .fold(DriverConfig::builder().name("adcscope"), |builder, arg| {
            builder.channel(ChannelSetting::new(
                PinConfig::new(arg.input, 5, 5),
                ReferenceSource::InternalBufferedVss,
                REFERENCE_UV,
            ))
        })
        .build()
}

/// Act as the conversion interrupt: one sample per completion from whichever
/// input the backend is routed to, until the session lock is released.
fn play_interrupts(adc: &SimAdc<'_>, probe: &SimProbe, inputs: &mut Inputs, abort: &AtomicBool) {
    while probe.arm_count() == 0 {
        if abort.load(Ordering::Acquire) {
            return;
        }
        thread::yield_now();
    }

    let mut sample = [0u16; 1];
    while adc.is_busy() {
        match probe.current_channel() {
            Some(input) => {
                inputs.next(input, &mut sample);
                adc.on_hardware_complete(&sample);
            }
            None => thread::yield_now(),
        }
    }
}

/// Signal generator per analog input
struct Inputs {
    waves: HashMap<AdcChannelId, (Waveform, u64)>,
}

impl Inputs {
    fn new(options: &ScopeOptions, max: u16) -> Self {
        let waves = options
            .channels
            .iter()
            .enumerate()
            .map(|(position, arg)| (arg.input, (options.waveform.waveform(position, max), 0)))
            .collect();
        Self { waves }
    }

    fn next(&mut self, input: AdcChannelId, out: &mut [u16]) {
        match self.waves.get_mut(&input) {
            Some((wave, cursor)) => *cursor = wave.fill(*cursor, out),
            None => out.fill(0),
        }
    }
}
