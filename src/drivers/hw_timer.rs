//! Hardware timer module using ESP-IDF's esp_timer API.
//!
//! Two periodic timers feed the foreground:
//!
//! - the system tick, advancing [`SYSTEM_CLOCK`](crate::clock::SYSTEM_CLOCK)
//!   at the configured tick frequency;
//! - the rangefinder sweep, reading the four ranks and publishing them
//!   through [`SENSOR_PIPELINE`](crate::sensors::SENSOR_PIPELINE).
//!
//! Callbacks run in the esp_timer task, never concurrently with each other.
//! The tick callback also wakes the task blocked in [`wait_for_tick`], so
//! the foreground paces itself without starving the idle task.
//! On simulation targets there are no timers; host tests drive the clock
//! and the pipeline directly.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::info;

use super::hw_init::HwInitError;
#[cfg(target_os = "espidf")]
use super::hw_init::SweepAdc;
#[cfg(target_os = "espidf")]
use crate::clock::SYSTEM_CLOCK;
#[cfg(target_os = "espidf")]
use crate::pins;
use crate::sensors::ChannelMap;
#[cfg(target_os = "espidf")]
use crate::sensors::SENSOR_PIPELINE;

/// Task blocked in [`wait_for_tick`], or null.
#[cfg(target_os = "espidf")]
static TICK_WAITER: core::sync::atomic::AtomicPtr<core::ffi::c_void> =
    core::sync::atomic::AtomicPtr::new(core::ptr::null_mut());

/// Longest a waiter blocks before re-checking the clock (FreeRTOS ticks).
#[cfg(target_os = "espidf")]
const TICK_WAIT_TIMEOUT: TickType_t = 10;

#[cfg(target_os = "espidf")]
static mut TICK_TIMER: esp_timer_handle_t = core::ptr::null_mut();
#[cfg(target_os = "espidf")]
static mut SWEEP_TIMER: esp_timer_handle_t = core::ptr::null_mut();

/// State handed to the sweep callback through its `arg` pointer.
#[cfg(target_os = "espidf")]
struct SweepContext {
    adc: SweepAdc,
    map: ChannelMap,
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn tick_cb(_arg: *mut core::ffi::c_void) {
    SYSTEM_CLOCK.tick();
    let waiter = TICK_WAITER.load(core::sync::atomic::Ordering::Acquire);
    if !waiter.is_null() {
        // SAFETY: the handle was registered by a live task in
        // wait_for_tick(); the esp_timer task may notify it.
        unsafe {
            xTaskGenericNotify(
                waiter.cast(),
                0,
                0,
                eNotifyAction_eIncrement,
                core::ptr::null_mut(),
            );
        }
    }
}

/// Block the calling task until the next system tick (or a short timeout).
#[cfg(target_os = "espidf")]
pub fn wait_for_tick() {
    // SAFETY: the current task handle is always valid inside a task, and
    // notification index 0 is reserved for this wake-up.
    unsafe {
        TICK_WAITER.store(
            xTaskGetCurrentTaskHandle().cast(),
            core::sync::atomic::Ordering::Release,
        );
        ulTaskGenericNotifyTake(0, 1, TICK_WAIT_TIMEOUT);
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn sweep_cb(arg: *mut core::ffi::c_void) {
    // SAFETY: arg is the leaked SweepContext from start_timers(); only
    // this callback dereferences it.
    let ctx = unsafe { &mut *arg.cast::<SweepContext>() };
    SENSOR_PIPELINE.on_conversion_complete(&mut ctx.adc, &ctx.map);
}

/// Period of one system tick in microseconds.
pub fn tick_period_us(tick_frequency_hz: u32) -> u64 {
    1_000_000 / u64::from(tick_frequency_hz.max(1))
}

/// Start the system tick and the rangefinder sweep.
#[cfg(target_os = "espidf")]
pub fn start_timers(
    tick_frequency_hz: u32,
    adc: SweepAdc,
    map: ChannelMap,
) -> Result<(), HwInitError> {
    let ctx: &'static mut SweepContext = Box::leak(Box::new(SweepContext { adc, map }));

    // SAFETY: TICK_TIMER and SWEEP_TIMER are written here once at boot
    // from the main task before any callback fires.
    unsafe {
        let tick_args = esp_timer_create_args_t {
            callback: Some(tick_cb),
            arg: core::ptr::null_mut(),
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: c"tick".as_ptr(),
            skip_unhandled_events: false,
        };
        let ret = esp_timer_create(&tick_args, &raw mut TICK_TIMER);
        if ret != ESP_OK as esp_err_t {
            return Err(HwInitError::TimerFailed(ret));
        }
        let ret = esp_timer_start_periodic(TICK_TIMER, tick_period_us(tick_frequency_hz));
        if ret != ESP_OK as esp_err_t {
            return Err(HwInitError::TimerFailed(ret));
        }

        let sweep_args = esp_timer_create_args_t {
            callback: Some(sweep_cb),
            arg: core::ptr::from_mut(ctx).cast(),
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: c"sweep".as_ptr(),
            skip_unhandled_events: true,
        };
        let ret = esp_timer_create(&sweep_args, &raw mut SWEEP_TIMER);
        if ret != ESP_OK as esp_err_t {
            return Err(HwInitError::TimerFailed(ret));
        }
        let ret = esp_timer_start_periodic(SWEEP_TIMER, pins::SENSOR_SWEEP_PERIOD_US);
        if ret != ESP_OK as esp_err_t {
            return Err(HwInitError::TimerFailed(ret));
        }
    }

    info!(
        "hw_timer: tick@{}Hz + sweep@{}us started",
        tick_frequency_hz,
        pins::SENSOR_SWEEP_PERIOD_US
    );
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn start_timers(tick_frequency_hz: u32, map: ChannelMap) -> Result<(), HwInitError> {
    log::info!(
        "hw_timer(sim): tick@{}Hz not started, {:?} sweeps come from the test harness",
        tick_frequency_hz,
        map
    );
    Ok(())
}

/// Stop both timers.  The motors are stopped separately.
#[cfg(target_os = "espidf")]
pub fn stop_timers() {
    // SAFETY: handles are valid if start_timers() succeeded; the null
    // checks cover a partial start.
    unsafe {
        let tick = TICK_TIMER;
        if !tick.is_null() {
            esp_timer_stop(tick);
        }
        let sweep = SWEEP_TIMER;
        if !sweep.is_null() {
            esp_timer_stop(sweep);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn stop_timers() {}
