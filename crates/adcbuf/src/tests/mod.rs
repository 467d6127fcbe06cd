use core::ops::ControlFlow;
use std::sync::Mutex;
use std::time::Duration;

use hal::{PinConfig, ReferenceSource};
use hal_sim::{PowerProbe, SimProbe, SimulatedBackend, SimulatedPower};

use crate::adjust::Gain;
use crate::config::{ChannelSetting, DispatchMode, DriverConfig};
use crate::controller::{AdcBuf, SessionHandle};
use crate::dispatch::ReadyBuffer;
use crate::error::AdcError;

mod session;

/// Channel index, samples and final flag of one delivered bank.
pub(crate) type Delivery = Result<(usize, Vec<u16>, bool), AdcError>;

pub(crate) type SimAdc<'a> = AdcBuf<'a, SimulatedBackend, SimulatedPower>;

/// Channel 0 on A0 against the 2.5 V internal reference, channel 1 on A1
/// against 3.3 V AVCC with a gain of 2 and an offset of -4.
pub(crate) fn two_channel_config(dispatch: DispatchMode) -> DriverConfig {
    DriverConfig::builder()
        .name("test")
        .channel(ChannelSetting::new(
            PinConfig::new(0, 5, 5),
            ReferenceSource::InternalBufferedVss,
            2_500_000,
        ))
        .channel(
            ChannelSetting::new(PinConfig::new(1, 5, 4), ReferenceSource::AvccVss, 3_300_000)
                .with_calibration(Gain::new(2, 1).unwrap(), -4),
        )
        .tick_period(Duration::from_millis(1))
        .dispatch(dispatch)
        .build()
}

pub(crate) fn open<'a>(dispatch: DispatchMode) -> (SimAdc<'a>, SimProbe, PowerProbe) {
    let (backend, probe) = SimulatedBackend::new();
    let (power, power_probe) = SimulatedPower::new();
    let adc = AdcBuf::open(two_channel_config(dispatch), backend, power).unwrap();
    (adc, probe, power_probe)
}

/// Callback that appends every notification to `seen` and keeps going.
pub(crate) fn recorder<'a>(
    seen: &'a Mutex<Vec<Delivery>>,
) -> impl for<'s> FnMut(SessionHandle, Result<ReadyBuffer<'s>, AdcError>) -> ControlFlow<()> + Send + 'a
{
    move |_handle: SessionHandle, result: Result<ReadyBuffer<'_>, AdcError>| {
        let entry = result.map(|buffer| (buffer.channel, buffer.samples.to_vec(), buffer.is_final));
        seen.lock().unwrap().push(entry);
        ControlFlow::Continue(())
    }
}
