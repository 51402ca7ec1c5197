//! Timer utilities for the 9600 Hz sampling interrupt.
//!
//! The modem itself never touches a timer peripheral; the platform
//! layer configures one interrupt that fires once per sample for the
//! ADC and (while transmitting) once per sample for the DAC. The
//! helpers here compute the compare/reload value for a CTC-style timer
//! from the CPU clock and prescaler, in runtime and `const` flavours.
//!
//! With the `timer-isr` feature the module also provides the
//! `critical-section` singleton helpers and the blocking byte-stream
//! endpoint (`global_afsk_setup`, `afsk_read`, `afsk_write` and
//! friends).
//!
//! Common prescalers at 16 MHz:
//!
//! | PRESCALER | RELOAD | Sample interval |
//! |-----------|--------|-----------------|
//! |         1 |   1667 |       104.17 µs |
//! |         8 |    208 |       104.17 µs |
//! |        64 |     26 |       104.17 µs |

use libm::round;

use crate::consts::SAMPLE_RATE;

#[cfg(feature = "timer-isr")]
mod isr;
#[cfg_attr(feature = "timer-isr", allow(unused_imports))]
#[cfg(feature = "timer-isr")]
pub use isr::*;

#[cfg(feature = "timer-isr")]
mod macros;

/// Duration of one ADC/DAC sample in microseconds.
pub const SAMPLE_PERIOD_US: f32 = 1_000_000.0 / SAMPLE_RATE as f32;

/// Computes the compare value for a CTC timer driving the sample
/// interrupt.
///
/// # Arguments
/// - `f_cpu`: CPU frequency in Hz
/// - `prescaler`: timer prescaler (e.g., 1, 8, 64)
///
/// # Returns
/// The compare/reload value producing [`SAMPLE_RATE`] interrupts per
/// second, rounded to the nearest integer.
///
/// # Example
/// ```rust
/// use afsk1200::timer::sample_timer_reload;
///
/// assert_eq!(sample_timer_reload(16_000_000, 8), 208);
/// ```
pub fn sample_timer_reload(f_cpu: u32, prescaler: u32) -> u16 {
    let ticks_per_second = f_cpu as f64 / prescaler as f64;
    round(ticks_per_second / SAMPLE_RATE as f64) as u16
}

/// Compile-time variant of [`sample_timer_reload`].
pub const fn const_sample_timer_reload(f_cpu: u32, prescaler: u32) -> u16 {
    let ticks_per_second = f_cpu / prescaler;
    ((ticks_per_second + SAMPLE_RATE / 2) / SAMPLE_RATE) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_for_common_clocks() {
        assert_eq!(sample_timer_reload(16_000_000, 8), 208);
        assert_eq!(sample_timer_reload(16_000_000, 1), 1667);
        assert_eq!(sample_timer_reload(20_000_000, 8), 260);
    }

    #[test]
    fn const_variant_agrees_with_runtime() {
        for (f_cpu, prescaler) in [
            (16_000_000, 1),
            (16_000_000, 8),
            (16_000_000, 64),
            (20_000_000, 8),
            (8_000_000, 1),
        ] {
            assert_eq!(
                const_sample_timer_reload(f_cpu, prescaler),
                sample_timer_reload(f_cpu, prescaler),
                "f_cpu {f_cpu} prescaler {prescaler}"
            );
        }
    }

    #[test]
    fn sample_period_matches_rate() {
        assert!((SAMPLE_PERIOD_US - 104.166_67).abs() < 0.01);
    }
}
