//! # afsk1200
//!
//! A portable, no_std software AFSK1200 modem: AX.25 HDLC frames over
//! Bell 202 tones (1200 Hz mark, 2200 Hz space) at 1200 bit/s, built
//! for small controllers whose only signal I/O is a byte-wide DAC and a
//! signed 8-bit ADC, each driven by a 9600 Hz sampling interrupt.
//!
//! The modem implements:
//! - a receive chain made of a frequency discriminator, a fixed-point
//!   600 Hz IIR low-pass, a zero-crossing bit slicer and a software
//!   phase-locked bit sampler,
//! - an HDLC deframer with flag detection, bit de-stuffing, NRZI
//!   decoding and in-band escaping of reserved bytes,
//! - a transmit modulator built on a quarter-wave sine DDS with NRZI
//!   encoding and bit stuffing,
//! - a byte-stream endpoint with back-pressure, timeouts and overrun
//!   reporting.
//!
//! ## Crate features
//! | Feature               | Description |
//! |-----------------------|-------------|
//! | `std`                 | Host-side testing support (std `critical-section` implementation) |
//! | `timer-isr` (default) | `critical_section`-protected global singleton, ISR helpers and the blocking byte-stream endpoint |
//! | `defmt-0-3`           | `defmt` logging |
//! | `log`                 | `log` logging |
//!
//! ## Usage
//!
//! ```rust
//! use afsk1200::driver::{Afsk, Config, DacInterrupt};
//! # use embedded_hal_mock::eh1::digital::Mock as Pin;
//!
//! #[derive(Debug, Default)]
//! struct DacIrq(bool);
//!
//! impl DacInterrupt for DacIrq {
//!     fn start(&mut self) { self.0 = true; }
//!     fn stop(&mut self) { self.0 = false; }
//! }
//!
//! let mut modem: Afsk<DacIrq, Pin> =
//!     Afsk::new(DacIrq::default(), None, Config::default());
//!
//! // Bytes written here come out of the DAC as an HDLC frame wrapped
//! // in flags; the platform's ISRs drive the sample flow.
//! modem.write_byte(0x41).unwrap();
//! assert!(modem.is_sending());
//! let _sample = modem.dac_isr();
//! ```
//!
//! In a real firmware the modem lives in a `critical_section` global
//! and the ISRs go through [`timer::global_adc_isr`] /
//! [`timer::global_dac_isr`] (or the `afsk_adc_isr!` /
//! `afsk_dac_isr!` macros), while the application uses
//! [`timer::afsk_read`] and [`timer::afsk_write`].
//!
//! ## Integration Notes
//!
//! - The ADC and DAC must share the 9600 Hz sample clock; see
//!   [`timer::sample_timer_reload`] for deriving the timer reload.
//! - Both ISR bodies are integer add/subtract/shift plus small table
//!   lookups and finish in a fraction of the 104 µs sample period.
//! - Frames carried through the byte queues delimit with
//!   [`consts::HDLC_FLAG`]; a literal flag, reset or escape byte
//!   travels behind a literal [`consts::AX25_ESC`]. The modem computes
//!   no CRC; that belongs to the AX.25 layer above.
//!
//! --
//! Designed for `#![no_std]` use in resource-constrained embedded
//! environments.

#![deny(
    nonstandard_style,
    improper_ctypes,
    no_mangle_generic_items,
    non_shorthand_field_patterns,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    while_true
)]
#![warn(
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications
)]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "timer-isr")]
pub use critical_section;

pub mod consts;
pub mod demod;
pub mod driver;
pub mod filter;
pub mod hdlc;
pub mod modulator;
pub mod sine;
pub mod timer;
