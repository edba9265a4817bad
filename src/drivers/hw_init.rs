//! One-shot hardware peripheral initialization.
//!
//! Configures the rangefinder ADC channels, the PCNT quadrature counters
//! and the LEDC motor outputs using raw ESP-IDF sys calls.  Called once
//! from `main()` before the timers start; each init hands back the small
//! handle types the rest of the firmware drives through port traits.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::app::ports::EncoderPort;
#[cfg(target_os = "espidf")]
use crate::pins;
#[cfg(target_os = "espidf")]
use crate::sensors::InjectedAdc;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    PcntInitFailed(i32),
    GpioConfigFailed(i32),
    LedcInitFailed(i32),
    TimerFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::PcntInitFailed(rc) => write!(f, "PCNT init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::LedcInitFailed(rc) => write!(f, "LEDC timer/channel config failed (rc={})", rc),
            Self::TimerFailed(rc) => write!(f, "esp_timer setup failed (rc={})", rc),
        }
    }
}

impl std::error::Error for HwInitError {}

#[cfg(target_os = "espidf")]
fn check(ret: esp_err_t, err: fn(i32) -> HwInitError) -> Result<(), HwInitError> {
    if ret == ESP_OK as esp_err_t {
        Ok(())
    } else {
        Err(err(ret))
    }
}

// ── ADC (oneshot sweep) ───────────────────────────────────────

/// Four-rank rangefinder sweep over ADC1 oneshot reads.
///
/// The S3 has no injected-conversion group, so the sweep timer reads the
/// ranks back to back; acknowledging the end of conversion is a no-op.
#[cfg(target_os = "espidf")]
pub struct SweepAdc {
    handle: adc_oneshot_unit_handle_t,
}

// SAFETY: the oneshot handle is only used from the sweep timer callback
// after `init_adc` returns.
#[cfg(target_os = "espidf")]
unsafe impl Send for SweepAdc {}

#[cfg(target_os = "espidf")]
impl InjectedAdc for SweepAdc {
    fn clear_end_of_conversion(&mut self) {}

    fn read_injected(&mut self, rank: u8) -> u16 {
        let Some(&channel) = pins::RANGEFINDER_ADC_CHANNELS.get(usize::from(rank.saturating_sub(1)))
        else {
            return 0;
        };
        let mut raw: i32 = 0;
        // SAFETY: handle was created in init_adc(); one reader at a time.
        let ret = unsafe { adc_oneshot_read(self.handle, channel, &mut raw) };
        if ret != ESP_OK as esp_err_t {
            return 0;
        }
        raw.clamp(0, i32::from(u16::MAX)) as u16
    }
}

#[cfg(target_os = "espidf")]
pub fn init_adc() -> Result<SweepAdc, HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    let mut handle: adc_oneshot_unit_handle_t = core::ptr::null_mut();
    // SAFETY: called once from main before the sweep timer starts.
    check(
        unsafe { adc_oneshot_new_unit(&init_cfg, &mut handle) },
        HwInitError::AdcInitFailed,
    )?;

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    for &channel in &pins::RANGEFINDER_ADC_CHANNELS {
        // SAFETY: handle is valid; channel config is a plain struct.
        check(
            unsafe { adc_oneshot_config_channel(handle, channel, &chan_cfg) },
            HwInitError::AdcInitFailed,
        )?;
    }

    info!("hw_init: ADC1 configured (rangefinder channels {:?})", pins::RANGEFINDER_ADC_CHANNELS);
    Ok(SweepAdc { handle })
}

// ── PCNT quadrature encoders ──────────────────────────────────

/// Hardware counter limits.  With `accum_count` the driver extends the
/// count past these, so the low 16 bits wrap modulo 2^16 like a plain
/// timer counter.
#[cfg(target_os = "espidf")]
const PCNT_HIGH_LIMIT: i32 = 30_000;
#[cfg(target_os = "espidf")]
const PCNT_LOW_LIMIT: i32 = -30_000;

/// Both wheel counters.
#[cfg(target_os = "espidf")]
pub struct PcntEncoders {
    left: pcnt_unit_handle_t,
    right: pcnt_unit_handle_t,
}

#[cfg(target_os = "espidf")]
impl PcntEncoders {
    fn read(unit: pcnt_unit_handle_t) -> u16 {
        let mut count: i32 = 0;
        // SAFETY: unit was started in init_encoders(); reading is lock-free.
        let ret = unsafe { pcnt_unit_get_count(unit, &mut count) };
        if ret != ESP_OK as esp_err_t {
            return 0;
        }
        count as u16
    }
}

#[cfg(target_os = "espidf")]
impl EncoderPort for PcntEncoders {
    fn left_count(&self) -> u16 {
        Self::read(self.left)
    }

    fn right_count(&self) -> u16 {
        Self::read(self.right)
    }
}

#[cfg(target_os = "espidf")]
fn init_quadrature_unit(a_gpio: i32, b_gpio: i32) -> Result<pcnt_unit_handle_t, HwInitError> {
    let mut unit_cfg = pcnt_unit_config_t {
        low_limit: PCNT_LOW_LIMIT,
        high_limit: PCNT_HIGH_LIMIT,
        ..Default::default()
    };
    unit_cfg.flags.set_accum_count(1);

    let mut unit: pcnt_unit_handle_t = core::ptr::null_mut();
    // SAFETY: all pointers are to locals that outlive the calls; the unit
    // handle is leaked into PcntEncoders for the life of the firmware.
    unsafe {
        check(pcnt_new_unit(&unit_cfg, &mut unit), HwInitError::PcntInitFailed)?;

        let glitch = pcnt_glitch_filter_config_t { max_glitch_ns: 1_000 };
        check(pcnt_unit_set_glitch_filter(unit, &glitch), HwInitError::PcntInitFailed)?;

        // x4 decoding: two channels, each counting edges of one phase
        // gated by the level of the other.
        for (edge, level) in [(a_gpio, b_gpio), (b_gpio, a_gpio)] {
            let chan_cfg = pcnt_chan_config_t {
                edge_gpio_num: edge,
                level_gpio_num: level,
                ..Default::default()
            };
            let mut chan: pcnt_channel_handle_t = core::ptr::null_mut();
            check(pcnt_new_channel(unit, &chan_cfg, &mut chan), HwInitError::PcntInitFailed)?;
            let (rise, fall) = if edge == a_gpio {
                (
                    pcnt_channel_edge_action_t_PCNT_CHANNEL_EDGE_ACTION_DECREASE,
                    pcnt_channel_edge_action_t_PCNT_CHANNEL_EDGE_ACTION_INCREASE,
                )
            } else {
                (
                    pcnt_channel_edge_action_t_PCNT_CHANNEL_EDGE_ACTION_INCREASE,
                    pcnt_channel_edge_action_t_PCNT_CHANNEL_EDGE_ACTION_DECREASE,
                )
            };
            check(pcnt_channel_set_edge_action(chan, rise, fall), HwInitError::PcntInitFailed)?;
            check(
                pcnt_channel_set_level_action(
                    chan,
                    pcnt_channel_level_action_t_PCNT_CHANNEL_LEVEL_ACTION_KEEP,
                    pcnt_channel_level_action_t_PCNT_CHANNEL_LEVEL_ACTION_INVERSE,
                ),
                HwInitError::PcntInitFailed,
            )?;
        }

        // Accumulation needs watch points on both limits.
        check(pcnt_unit_add_watch_point(unit, PCNT_HIGH_LIMIT), HwInitError::PcntInitFailed)?;
        check(pcnt_unit_add_watch_point(unit, PCNT_LOW_LIMIT), HwInitError::PcntInitFailed)?;

        check(pcnt_unit_enable(unit), HwInitError::PcntInitFailed)?;
        check(pcnt_unit_clear_count(unit), HwInitError::PcntInitFailed)?;
        check(pcnt_unit_start(unit), HwInitError::PcntInitFailed)?;
    }
    Ok(unit)
}

#[cfg(target_os = "espidf")]
pub fn init_encoders() -> Result<PcntEncoders, HwInitError> {
    let left = init_quadrature_unit(pins::LEFT_ENCODER_A_GPIO, pins::LEFT_ENCODER_B_GPIO)?;
    let right = init_quadrature_unit(pins::RIGHT_ENCODER_A_GPIO, pins::RIGHT_ENCODER_B_GPIO)?;
    info!("hw_init: PCNT encoders running (x4, accumulating)");
    Ok(PcntEncoders { left, right })
}

// ── LEDC PWM + direction GPIO ─────────────────────────────────

/// One LEDC channel as an `embedded-hal` PWM output.
#[cfg(target_os = "espidf")]
pub struct LedcChannel {
    channel: ledc_channel_t,
}

#[cfg(target_os = "espidf")]
impl embedded_hal::pwm::ErrorType for LedcChannel {
    type Error = embedded_hal::pwm::ErrorKind;
}

#[cfg(target_os = "espidf")]
impl embedded_hal::pwm::SetDutyCycle for LedcChannel {
    fn max_duty_cycle(&self) -> u16 {
        ((1u32 << pins::MOTOR_PWM_RESOLUTION_BITS) - 1) as u16
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        // SAFETY: channel was configured in init_motor_outputs(); only the
        // foreground loop writes duty.
        let ret = unsafe {
            let ret = ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, self.channel, u32::from(duty));
            if ret == ESP_OK as esp_err_t {
                ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, self.channel)
            } else {
                ret
            }
        };
        if ret == ESP_OK as esp_err_t {
            Ok(())
        } else {
            Err(embedded_hal::pwm::ErrorKind::Other)
        }
    }
}

/// A configured push-pull output as an `embedded-hal` pin.
#[cfg(target_os = "espidf")]
pub struct GpioOutput {
    gpio: i32,
}

#[cfg(target_os = "espidf")]
impl embedded_hal::digital::ErrorType for GpioOutput {
    type Error = embedded_hal::digital::ErrorKind;
}

#[cfg(target_os = "espidf")]
impl embedded_hal::digital::OutputPin for GpioOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        // SAFETY: pin configured as output in init_motor_outputs().
        if unsafe { gpio_set_level(self.gpio, 0) } == ESP_OK as esp_err_t {
            Ok(())
        } else {
            Err(embedded_hal::digital::ErrorKind::Other)
        }
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        // SAFETY: as above.
        if unsafe { gpio_set_level(self.gpio, 1) } == ESP_OK as esp_err_t {
            Ok(())
        } else {
            Err(embedded_hal::digital::ErrorKind::Other)
        }
    }
}

/// PWM + direction outputs for both wheels.
#[cfg(target_os = "espidf")]
pub struct MotorOutputs {
    pub left_pwm: LedcChannel,
    pub left_dir: GpioOutput,
    pub right_pwm: LedcChannel,
    pub right_dir: GpioOutput,
}

#[cfg(target_os = "espidf")]
pub fn init_motor_outputs() -> Result<MotorOutputs, HwInitError> {
    for gpio in [pins::LEFT_MOTOR_DIR_GPIO, pins::RIGHT_MOTOR_DIR_GPIO] {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << gpio,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        // SAFETY: single-threaded init path.
        check(unsafe { gpio_config(&cfg) }, HwInitError::GpioConfigFailed)?;
        check(unsafe { gpio_set_level(gpio, 0) }, HwInitError::GpioConfigFailed)?;
    }

    let timer = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        duty_resolution: ledc_timer_bit_t_LEDC_TIMER_10_BIT,
        freq_hz: pins::MOTOR_PWM_FREQ_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    // SAFETY: single-threaded init path.
    check(unsafe { ledc_timer_config(&timer) }, HwInitError::LedcInitFailed)?;

    let channels = [
        (ledc_channel_t_LEDC_CHANNEL_0, pins::LEFT_MOTOR_PWM_GPIO),
        (ledc_channel_t_LEDC_CHANNEL_1, pins::RIGHT_MOTOR_PWM_GPIO),
    ];
    for (channel, gpio) in channels {
        let cfg = ledc_channel_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel,
            timer_sel: ledc_timer_t_LEDC_TIMER_0,
            gpio_num: gpio,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        };
        // SAFETY: single-threaded init path.
        check(unsafe { ledc_channel_config(&cfg) }, HwInitError::LedcInitFailed)?;
    }

    info!("hw_init: LEDC motors configured (L=CH0, R=CH1 @ {} Hz)", pins::MOTOR_PWM_FREQ_HZ);
    Ok(MotorOutputs {
        left_pwm: LedcChannel { channel: ledc_channel_t_LEDC_CHANNEL_0 },
        left_dir: GpioOutput { gpio: pins::LEFT_MOTOR_DIR_GPIO },
        right_pwm: LedcChannel { channel: ledc_channel_t_LEDC_CHANNEL_1 },
        right_dir: GpioOutput { gpio: pins::RIGHT_MOTOR_DIR_GPIO },
    })
}
