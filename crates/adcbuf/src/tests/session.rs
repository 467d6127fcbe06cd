use core::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;

use hal::{HalError, PowerConstraint};
use hal_sim::{SimulatedBackend, SimulatedPower};

use super::{open, recorder, two_channel_config, Delivery};
use crate::config::{DispatchMode, SessionParams};
use crate::controller::{AdcBuf, SessionState};
use crate::error::AdcError;
use crate::request::{Bank, ConversionRequest};

const DEEP_SLEEP: PowerConstraint = PowerConstraint::DisallowDeepSleep;

fn start_err(requests: Vec<ConversionRequest<'_>>, params: SessionParams) -> AdcError {
    let (backend, _) = SimulatedBackend::new();
    let (power, _) = SimulatedPower::new();
    let adc = AdcBuf::open(two_channel_config(DispatchMode::Immediate), backend, power).unwrap();
    adc.start(requests, &params).unwrap_err()
}

#[test]
fn one_shot_callback_round_robins_channels() {
    let (mut a0, mut a1) = ([0u16; 4], [0u16; 4]);
    let (mut b0, mut b1) = ([0u16; 4], [0u16; 4]);
    let seen = Mutex::new(Vec::<Delivery>::new());
    let (adc, probe, power) = open(DispatchMode::Immediate);
    adc.set_callback(recorder(&seen)).unwrap();

    let requests = vec![
        ConversionRequest::new(0, 6, &mut a0, &mut a1),
        ConversionRequest::new(1, 4, &mut b0, &mut b1),
    ];
    adc.start(requests, &SessionParams::one_shot_callback(1_000))
        .unwrap();
    assert_eq!(adc.state(), SessionState::Armed);
    assert!(adc.is_busy());
    assert_eq!(power.outstanding(DEEP_SLEEP), 1);

    adc.on_hardware_complete(&[1, 2, 3, 4]);
    assert_eq!(adc.state(), SessionState::Delivering);
    adc.on_hardware_complete(&[5, 6, 7, 8]);
    adc.on_hardware_complete(&[9, 10, 11, 12]);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            Ok((0, vec![1, 2, 3, 4], false)),
            Ok((1, vec![5, 6, 7, 8], true)),
            Ok((0, vec![9, 10], true)),
        ]
    );
    assert_eq!(adc.state(), SessionState::Idle);
    assert!(!adc.is_busy());
    assert_eq!(power.outstanding(DEEP_SLEEP), 0);
    assert_eq!(probe.configured_channels(), vec![0, 1, 0]);
    assert_eq!(probe.arm_count(), 1);
    assert_eq!(probe.disarm_count(), 1);
    assert!(!probe.is_armed());

    let requests = adc.reclaim().unwrap();
    assert_eq!(requests[0].delivered(), 6);
    assert_eq!(&requests[0].bank(Bank::Pong)[..2], &[9, 10]);
    assert_eq!(requests[1].delivered(), 4);
    assert!(adc.reclaim().is_none());
}

#[test]
fn invalid_requests_are_rejected_synchronously() {
    let (mut a, mut b) = ([0u16; 4], [0u16; 4]);
    let mut short = [0u16; 3];
    let mut empty: [u16; 0] = [];
    let blocking = SessionParams::one_shot_blocking(1_000, 100);

    let cases = [
        (start_err(Vec::new(), blocking), "no requests"),
        (
            start_err(vec![ConversionRequest::new(0, 0, &mut a, &mut b)], blocking),
            "zero count",
        ),
        (
            start_err(vec![ConversionRequest::new(7, 4, &mut a, &mut b)], blocking),
            "unknown channel",
        ),
        (
            start_err(vec![ConversionRequest::new(0, 3, &mut a, &mut short)], blocking),
            "unequal banks",
        ),
        (
            start_err(vec![ConversionRequest::new(0, 1, &mut empty, &mut [])], blocking),
            "empty banks",
        ),
        (
            start_err(vec![ConversionRequest::new(0, 5, &mut a, &mut b)], blocking),
            "blocking overflow",
        ),
        (
            start_err(
                vec![ConversionRequest::new(0, 4, &mut a, &mut b)],
                SessionParams::one_shot_callback(1_000),
            ),
            "no callback",
        ),
        (
            start_err(
                vec![ConversionRequest::new(0, 4, &mut a, &mut b)],
                SessionParams::one_shot_blocking(0, 100),
            ),
            "zero frequency",
        ),
    ];
    for (err, case) in cases {
        assert!(matches!(err, AdcError::InvalidRequest(_)), "{case}: {err:?}");
    }
}

#[test]
fn rejected_start_never_shows_busy() {
    let (adc, _probe, power) = open(DispatchMode::Immediate);
    let stop = AtomicBool::new(false);

    let saw_busy = thread::scope(|s| {
        let observer = s.spawn(|| {
            let mut saw_busy = false;
            while !stop.load(Ordering::Acquire) {
                saw_busy |= adc.is_busy();
            }
            saw_busy
        });
        for _ in 0..500 {
            assert!(matches!(
                adc.start(Vec::new(), &SessionParams::one_shot_blocking(1_000, 100)),
                Err(AdcError::InvalidRequest(_))
            ));
        }
        stop.store(true, Ordering::Release);
        observer.join().unwrap()
    });
    assert!(!saw_busy);
    assert_eq!(power.acquired(), 0);
}

#[test]
fn second_start_is_already_in_progress() {
    let (mut a0, mut a1) = ([0u16; 4], [0u16; 4]);
    let (mut b0, mut b1) = ([0u16; 4], [0u16; 4]);
    let seen = Mutex::new(Vec::<Delivery>::new());
    let (adc, _probe, power) = open(DispatchMode::Immediate);
    adc.set_callback(recorder(&seen)).unwrap();

    let handle = adc
        .start(
            vec![ConversionRequest::new(0, 4, &mut a0, &mut a1)],
            &SessionParams::continuous(1_000),
        )
        .unwrap();
    assert_eq!(
        adc.start(
            vec![ConversionRequest::new(1, 4, &mut b0, &mut b1)],
            &SessionParams::continuous(1_000),
        ),
        Err(AdcError::AlreadyInProgress)
    );
    assert_eq!(adc.status().unwrap().handle, handle);
    assert_eq!(
        adc.set_callback(recorder(&seen)),
        Err(AdcError::AlreadyInProgress)
    );

    adc.cancel().unwrap();
    assert_eq!(power.acquired(), 1);
    assert_eq!(power.released(), 1);
}

#[test]
fn cancel_notifies_callback_once() {
    let (mut a0, mut a1) = ([0u16; 2], [0u16; 2]);
    let seen = Mutex::new(Vec::<Delivery>::new());
    let (adc, probe, power) = open(DispatchMode::Immediate);
    adc.set_callback(recorder(&seen)).unwrap();

    assert_eq!(adc.cancel(), Err(AdcError::NotInProgress));
    adc.start(
        vec![ConversionRequest::new(0, 2, &mut a0, &mut a1)],
        &SessionParams::continuous(8_000),
    )
    .unwrap();
    adc.on_hardware_complete(&[3, 4]);
    adc.cancel().unwrap();
    assert_eq!(adc.cancel(), Err(AdcError::NotInProgress));

    // Late completion after the teardown is ignored.
    adc.on_hardware_complete(&[5, 6]);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![Ok((0, vec![3, 4], false)), Err(AdcError::Cancelled)]
    );
    assert!(!adc.is_busy());
    assert!(!probe.is_armed());
    assert_eq!(power.outstanding(DEEP_SLEEP), 0);
}

#[test]
fn break_stops_without_cancel_notification() {
    let (mut a0, mut a1) = ([0u16; 2], [0u16; 2]);
    let calls = Mutex::new(0u32);
    let (adc, probe, power) = open(DispatchMode::Immediate);
    adc.set_callback(|_, result: Result<crate::ReadyBuffer<'_>, AdcError>| {
        assert!(result.is_ok());
        *calls.lock().unwrap() += 1;
        ControlFlow::Break(())
    })
    .unwrap();

    adc.start(
        vec![ConversionRequest::new(0, 2, &mut a0, &mut a1)],
        &SessionParams::continuous(8_000),
    )
    .unwrap();
    adc.on_hardware_complete(&[1, 2]);

    assert_eq!(*calls.lock().unwrap(), 1);
    assert_eq!(adc.state(), SessionState::Idle);
    assert!(!adc.is_busy());
    assert_eq!(probe.disarm_count(), 1);
    assert_eq!(power.outstanding(DEEP_SLEEP), 0);
}

#[test]
fn arm_failure_releases_everything() {
    let (mut a0, mut a1) = ([0u16; 4], [0u16; 4]);
    let (adc, probe, power) = open(DispatchMode::Immediate);
    probe.fail_next_arm(HalError::TimingError);

    let result = adc.start(
        vec![ConversionRequest::new(0, 4, &mut a0, &mut a1)],
        &SessionParams::one_shot_blocking(1_000, 100),
    );
    assert_eq!(result, Err(AdcError::HardwareFault(HalError::TimingError)));
    assert!(!adc.is_busy());
    assert_eq!(adc.state(), SessionState::Idle);
    assert_eq!(power.acquired(), 1);
    assert_eq!(power.outstanding(DEEP_SLEEP), 0);
    assert_eq!(adc.reclaim().map(|r| r.len()), Some(1));
}

#[test]
fn channel_switch_failure_is_a_fault() {
    let (mut a0, mut a1) = ([0u16; 2], [0u16; 2]);
    let (mut b0, mut b1) = ([0u16; 2], [0u16; 2]);
    let seen = Mutex::new(Vec::<Delivery>::new());
    let (adc, probe, power) = open(DispatchMode::Immediate);
    adc.set_callback(recorder(&seen)).unwrap();

    adc.start(
        vec![
            ConversionRequest::new(0, 2, &mut a0, &mut a1),
            ConversionRequest::new(1, 2, &mut b0, &mut b1),
        ],
        &SessionParams::continuous(1_000),
    )
    .unwrap();
    probe.fail_next_configure(HalError::HardwareError);
    adc.on_hardware_complete(&[1, 1]);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            Ok((0, vec![1, 1], false)),
            Err(AdcError::HardwareFault(HalError::HardwareError)),
        ]
    );
    assert!(!adc.is_busy());
    assert_eq!(power.outstanding(DEEP_SLEEP), 0);
}

#[test]
fn hardware_fault_tears_down_callback_session() {
    let (mut a0, mut a1) = ([0u16; 4], [0u16; 4]);
    let seen = Mutex::new(Vec::<Delivery>::new());
    let (adc, probe, power) = open(DispatchMode::Immediate);
    adc.set_callback(recorder(&seen)).unwrap();

    adc.on_hardware_fault(HalError::Overflow);
    adc.start(
        vec![ConversionRequest::new(0, 8, &mut a0, &mut a1)],
        &SessionParams::one_shot_callback(1_000),
    )
    .unwrap();
    adc.on_hardware_complete(&[1, 2]);
    adc.on_hardware_fault(HalError::Overflow);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![Err(AdcError::HardwareFault(HalError::Overflow))]
    );
    assert!(!adc.is_busy());
    assert!(!probe.is_armed());
    assert_eq!(power.outstanding(DEEP_SLEEP), 0);
    assert_eq!(adc.reclaim().unwrap()[0].delivered(), 2);
}

#[test]
fn status_tracks_progress() {
    let (mut a0, mut a1) = ([0u16; 3], [0u16; 3]);
    let (mut b0, mut b1) = ([0u16; 3], [0u16; 3]);
    let seen = Mutex::new(Vec::<Delivery>::new());
    let (adc, _probe, _power) = open(DispatchMode::Immediate);
    adc.set_callback(recorder(&seen)).unwrap();
    assert!(adc.status().is_none());

    adc.start(
        vec![
            ConversionRequest::new(0, 3, &mut a0, &mut a1),
            ConversionRequest::new(1, 3, &mut b0, &mut b1),
        ],
        &SessionParams::continuous(1_000),
    )
    .unwrap();
    adc.on_hardware_complete(&[1, 2, 3]);
    adc.on_hardware_complete(&[4]);

    let status = adc.status().unwrap();
    assert_eq!(status.state, SessionState::Delivering);
    assert_eq!(status.active_request, 1);
    assert_eq!(status.delivered, vec![0, 1]);
    assert_eq!(status.fills, vec![1, 0]);
    assert_eq!(status.toggles, 1);
    adc.cancel().unwrap();
}

#[test]
fn channel_helpers_use_the_channel_table() {
    let (adc, _probe, _power) = open(DispatchMode::Immediate);
    assert_eq!(adc.resolution_bits(), 14);

    let mut adjusted = [0u16; 2];
    assert_eq!(adc.adjust_raw_values(1, &[10, 100], &mut adjusted), Ok(2));
    assert_eq!(adjusted, [16, 196]);

    let mut uv = [0u32; 2];
    assert_eq!(adc.adjusted_to_microvolts(0, &[0, 16_383], &mut uv), Ok(2));
    assert_eq!(uv, [0, 2_500_000]);

    assert!(matches!(
        adc.adjust_raw_values(2, &[1], &mut adjusted),
        Err(AdcError::InvalidRequest(_))
    ));
}

#[test]
fn close_cancels_a_live_session() {
    let (mut a0, mut a1) = ([0u16; 2], [0u16; 2]);
    let seen = Mutex::new(Vec::<Delivery>::new());
    let (adc, probe, power) = open(DispatchMode::Immediate);
    adc.set_callback(recorder(&seen)).unwrap();
    adc.start(
        vec![ConversionRequest::new(0, 2, &mut a0, &mut a1)],
        &SessionParams::continuous(1_000),
    )
    .unwrap();

    let (_backend, _power) = adc.close();
    assert!(!probe.is_armed());
    assert_eq!(power.outstanding(DEEP_SLEEP), 0);
    assert_eq!(*seen.lock().unwrap(), vec![Err(AdcError::Cancelled)]);
}
