//! The modem context: ISR entry points, byte queues and configuration.
//!
//! [`Afsk`] owns every piece of modem state: the receive DSP chain,
//! the transmit modulator, both byte queues and the status word. It
//! exposes exactly two interrupt entry points:
//!
//! - [`adc_isr`](Afsk::adc_isr), called by the ADC driver with each
//!   signed 8-bit sample,
//! - [`dac_isr`](Afsk::dac_isr), called by the DAC driver when it wants
//!   the next unsigned output sample.
//!
//! The foreground talks to the modem through the non-blocking byte
//! primitives ([`read_byte`](Afsk::read_byte),
//! [`write_byte`](Afsk::write_byte), [`poll_flush`](Afsk::poll_flush))
//! or, when the `timer-isr` feature is active, through the blocking
//! endpoint in [`crate::timer`] that wraps a shared instance in
//! critical sections.
//!
//! Both halves of the modem run from independent interrupts and share
//! no mutable state beyond the queues and the status word; it is the
//! caller's job (normally the [`crate::timer`] helpers) to bracket
//! foreground access in a critical section.
//!
//! ## Example
//!
//! ```rust
//! use afsk1200::driver::{Afsk, Config, DacInterrupt};
//! use embedded_hal_mock::eh1::digital::Mock as Pin;
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
//! modem.write_byte(0x41).unwrap();
//! assert!(modem.is_sending());
//! let _sample = modem.dac_isr();
//! ```

use core::convert::Infallible;

use embedded_hal::digital::OutputPin;
use heapless::Deque;

use crate::consts::{
    BITRATE, RX_FIFO_LEN, STATUS_RX_FIFO_OVERRUN, TX_FIFO_LEN, div_round,
};
use crate::demod::Demodulator;
use crate::filter::{Butterworth, LowPass};
use crate::modulator::Modulator;

/// Control over the DAC sample-request interrupt.
///
/// Implemented by the platform layer that owns the DAC peripheral. The
/// modem starts the interrupt when a transmission is armed and stops it
/// once the trailer has drained; channel bring-up belongs to the
/// implementor, before the modem is constructed.
pub trait DacInterrupt {
    /// Enables the DAC sample-request interrupt.
    fn start(&mut self);
    /// Disables the DAC sample-request interrupt.
    fn stop(&mut self);
}

/// Timeout policy of the blocking read endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RxTimeout {
    /// Return immediately with whatever is available.
    #[default]
    NonBlocking,
    /// Wait indefinitely for each requested byte.
    Infinite,
    /// Wait up to this many milliseconds per byte, then return a short
    /// count.
    Ms(u32),
}

/// Modem configuration.
///
/// `preamble_ms` and `trailer_ms` are converted to whole flag bytes
/// when a transmission starts; the trailer is re-armed on every write
/// so that back-to-back writes extend the closing flag stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Duration of the leading flag stream in milliseconds.
    pub preamble_ms: u16,
    /// Duration of the trailing flag stream in milliseconds.
    pub trailer_ms: u16,
    /// Timeout policy for the blocking reader.
    pub rx_timeout: RxTimeout,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preamble_ms: 300,
            trailer_ms: 50,
            rx_timeout: RxTimeout::NonBlocking,
        }
    }
}

/// An AFSK1200 modem context.
///
/// Generic over the DAC interrupt hook `D`, an optional debug strobe
/// pin `S` toggled around each ISR body, and the receive filter `F`
/// fixed at construction time.
#[derive(Debug)]
pub struct Afsk<D, S, F = Butterworth>
where
    D: DacInterrupt,
    S: OutputPin,
    F: LowPass,
{
    pub(crate) demod: Demodulator<F>,
    pub(crate) modulator: Modulator,
    pub(crate) rx_fifo: Deque<u8, RX_FIFO_LEN>,
    pub(crate) tx_fifo: Deque<u8, TX_FIFO_LEN>,
    status: u8,
    dac: D,
    strobe: Option<S>,
    config: Config,
}

impl<D, S, F> Afsk<D, S, F>
where
    D: DacInterrupt,
    S: OutputPin,
    F: LowPass,
{
    /// Creates an idle modem.
    ///
    /// The ADC and DAC channels must already be configured; `dac` only
    /// gates the sample-request interrupt. Pass a strobe pin to get a
    /// level toggle around every ISR body for timing measurements.
    pub fn new(dac: D, strobe: Option<S>, config: Config) -> Self {
        Self {
            demod: Demodulator::new(),
            modulator: Modulator::new(),
            rx_fifo: Deque::new(),
            tx_fifo: Deque::new(),
            status: 0,
            dac,
            strobe,
            config,
        }
    }

    fn strobe_on(&mut self) {
        if let Some(strobe) = self.strobe.as_mut() {
            let _ = strobe.set_high();
        }
    }

    fn strobe_off(&mut self) {
        if let Some(strobe) = self.strobe.as_mut() {
            let _ = strobe.set_low();
        }
    }

    /// ADC ISR callback. Call once per converted sample.
    ///
    /// Runs the whole receive pipeline for one sample; a queue overrun
    /// in the deframer sets [`STATUS_RX_FIFO_OVERRUN`] and abandons the
    /// frame in progress.
    pub fn adc_isr(&mut self, sample: i8) {
        self.strobe_on();

        if self.demod.process(sample, &mut self.rx_fifo).is_err() {
            #[cfg(feature = "log")]
            if self.status & STATUS_RX_FIFO_OVERRUN == 0 {
                log::warn!("rx fifo overrun, abandoning frame");
            }
            #[cfg(feature = "defmt-0-3")]
            if self.status & STATUS_RX_FIFO_OVERRUN == 0 {
                defmt::warn!("rx fifo overrun, abandoning frame");
            }
            self.status |= STATUS_RX_FIFO_OVERRUN;
        }

        self.strobe_off();
    }

    /// DAC ISR callback. Call when the previous sample has been
    /// converted; returns the next output sample.
    ///
    /// Returns 0 once the transmission has drained; the DAC interrupt
    /// is stopped through the [`DacInterrupt`] hook at that point.
    pub fn dac_isr(&mut self) -> u8 {
        self.strobe_on();

        let was_sending = self.modulator.is_sending();
        let sample = self.modulator.next_sample(&mut self.tx_fifo);
        if was_sending && !self.modulator.is_sending() {
            self.dac.stop();
            #[cfg(feature = "log")]
            log::debug!("tx drained, dac interrupt stopped");
            #[cfg(feature = "defmt-0-3")]
            defmt::debug!("tx drained, dac interrupt stopped");
        }

        self.strobe_off();
        sample
    }

    /// Arms a transmission, starting the DAC interrupt if it is not
    /// already running. Idempotent while sending; always re-arms the
    /// trailer.
    pub fn tx_start(&mut self) {
        let preamble = div_round(self.config.preamble_ms as u32 * BITRATE, 8000) as u16;
        let trailer = div_round(self.config.trailer_ms as u32 * BITRATE, 8000) as u16;
        if self.modulator.start(preamble, trailer) {
            #[cfg(feature = "log")]
            log::debug!("tx start: {preamble} preamble, {trailer} trailer flags");
            #[cfg(feature = "defmt-0-3")]
            defmt::debug!("tx start: {} preamble, {} trailer flags", preamble, trailer);
            self.dac.start();
        }
    }

    /// Pops one byte from the receive queue.
    ///
    /// Returns [`nb::Error::WouldBlock`] while the queue is empty.
    pub fn read_byte(&mut self) -> nb::Result<u8, Infallible> {
        self.rx_fifo.pop_front().ok_or(nb::Error::WouldBlock)
    }

    /// Pushes one byte into the transmit queue and arms transmission.
    ///
    /// Returns [`nb::Error::WouldBlock`] while the queue is full.
    pub fn write_byte(&mut self, byte: u8) -> nb::Result<(), Infallible> {
        if self.tx_fifo.push_back(byte).is_err() {
            return Err(nb::Error::WouldBlock);
        }
        self.tx_start();
        Ok(())
    }

    /// Completes once the transmitter has fallen idle.
    pub fn poll_flush(&self) -> nb::Result<(), Infallible> {
        if self.modulator.is_sending() {
            Err(nb::Error::WouldBlock)
        } else {
            Ok(())
        }
    }

    /// Whether the DAC interrupt is currently producing samples.
    pub fn is_sending(&self) -> bool {
        self.modulator.is_sending()
    }

    /// Returns the status word. Bits are defined in [`crate::consts`].
    pub fn status(&self) -> u8 {
        self.status
    }

    /// Clears the status word.
    pub fn clear_status(&mut self) {
        self.status = 0;
    }

    /// Returns the active configuration.
    pub fn config(&self) -> Config {
        self.config
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::DacSpy;
    use super::*;
    use crate::consts::{HDLC_FLAG, SAMPLES_PER_BIT};
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };

    fn modem(config: Config) -> Afsk<DacSpy, PinMock> {
        Afsk::new(DacSpy::default(), None, config)
    }

    /// Feeds the modem its own DAC output, recentred to the signed ADC
    /// range.
    fn loopback_sample(af: &mut Afsk<DacSpy, PinMock>) {
        let sample = af.dac_isr();
        af.adc_isr((sample as i16 - 128) as i8);
    }

    fn drain_rx(af: &mut Afsk<DacSpy, PinMock>) -> Vec<u8> {
        let mut out = Vec::new();
        while let Ok(b) = af.read_byte() {
            out.push(b);
        }
        out
    }

    #[test]
    fn fresh_modem_is_idle() {
        let af = modem(Config::default());
        assert!(!af.is_sending());
        assert_eq!(af.status(), 0);
        assert_eq!(af.config().preamble_ms, 300);
    }

    #[test]
    fn write_byte_starts_the_dac_interrupt_once() {
        let mut af = modem(Config::default());
        af.write_byte(0x41).unwrap();
        af.write_byte(0x42).unwrap();
        assert!(af.is_sending());
        assert_eq!(af.dac.started, 1);
        assert_eq!(af.tx_fifo.len(), 2);
    }

    #[test]
    fn dac_interrupt_stops_when_tx_drains() {
        let mut af = modem(Config {
            preamble_ms: 7,
            trailer_ms: 7,
            ..Config::default()
        });
        af.write_byte(0x41).unwrap();

        // 3 bytes x 8 symbols x 8 samples, plus the closing call.
        for _ in 0..(3 * 8 * SAMPLES_PER_BIT) {
            let _ = af.dac_isr();
        }
        assert!(af.is_sending());
        assert_eq!(af.dac_isr(), 0);
        assert!(!af.is_sending());
        assert_eq!(af.dac.stopped, 1);
        assert!(!af.dac.running);
    }

    #[test]
    fn tx_start_rearms_trailer_only_while_sending() {
        let mut af = modem(Config {
            preamble_ms: 30,
            trailer_ms: 30,
            ..Config::default()
        });
        af.write_byte(0x41).unwrap();
        for _ in 0..40 {
            let _ = af.dac_isr();
        }

        let snapshot = (
            af.modulator.phase_inc,
            af.modulator.phase_acc,
            af.modulator.stuff_cnt,
        );
        af.modulator.trailer_len = 1;
        af.tx_start();
        assert_eq!(
            snapshot,
            (
                af.modulator.phase_inc,
                af.modulator.phase_acc,
                af.modulator.stuff_cnt,
            )
        );
        // round(30 * 1200 / 8000)
        assert_eq!(af.modulator.trailer_len, 5);
        assert_eq!(af.dac.started, 1);
    }

    #[test]
    fn loopback_survives_an_unaligned_initial_phase() {
        let mut af = modem(Config {
            preamble_ms: 30,
            trailer_ms: 10,
            ..Config::default()
        });
        af.demod.curr_phase = 37;
        af.write_byte(0x41).unwrap();

        while af.is_sending() {
            loopback_sample(&mut af);
        }
        let rx = drain_rx(&mut af);

        // The PLL re-centres during the preamble: the payload arrives
        // intact, delimited by flags.
        let payload_at = rx.iter().position(|&b| b == 0x41).expect("payload seen");
        assert!(payload_at > 0);
        assert!(rx[..payload_at].iter().all(|&b| b == HDLC_FLAG));
        assert_eq!(rx[payload_at + 1], HDLC_FLAG);
        assert_eq!(af.status(), 0);
    }

    #[test]
    fn overrun_sets_status_and_resyncs_on_the_next_flag() {
        let mut af = modem(Config {
            preamble_ms: 60,
            trailer_ms: 10,
            ..Config::default()
        });
        while af.rx_fifo.push_back(0xaa).is_ok() {}

        // Transmit flags into a full receive queue until the deframer
        // trips.
        af.write_byte(0x41).unwrap();
        while af.is_sending() && af.status() == 0 {
            loopback_sample(&mut af);
        }
        assert_eq!(af.status(), STATUS_RX_FIFO_OVERRUN);
        assert!(!af.demod.hdlc.rxstart);

        // Drain the queue; the remaining preamble re-establishes
        // framing.
        while af.rx_fifo.pop_front().is_some() {}
        af.clear_status();
        while af.is_sending() {
            loopback_sample(&mut af);
        }
        let rx = drain_rx(&mut af);
        assert!(rx.contains(&HDLC_FLAG));
        assert!(rx.contains(&0x41));
        assert_eq!(af.status(), 0);
    }

    #[test]
    fn status_is_read_and_clear() {
        let mut af = modem(Config::default());
        af.adc_isr(0);
        assert_eq!(af.status(), 0);
        while af.rx_fifo.push_back(0xaa).is_ok() {}
        af.write_byte(HDLC_FLAG).unwrap();
        while af.is_sending() && af.status() == 0 {
            loopback_sample(&mut af);
        }
        assert_ne!(af.status(), 0);
        af.clear_status();
        assert_eq!(af.status(), 0);
    }

    #[test]
    fn strobe_toggles_around_each_isr() {
        let strobe = PinMock::new(&[
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
        ]);
        let mut af: Afsk<DacSpy, PinMock> =
            Afsk::new(DacSpy::default(), Some(strobe), Config::default());

        af.adc_isr(0);
        let _ = af.dac_isr();

        af.strobe.as_mut().unwrap().done();
    }

    #[test]
    fn read_byte_reports_would_block_when_empty() {
        let mut af = modem(Config::default());
        assert_eq!(af.read_byte(), Err(nb::Error::WouldBlock));
    }

    #[test]
    fn write_byte_reports_would_block_when_full() {
        let mut af = modem(Config::default());
        while af.tx_fifo.push_back(0).is_ok() {}
        assert_eq!(af.write_byte(0x41), Err(nb::Error::WouldBlock));
    }

    #[test]
    fn poll_flush_tracks_sending() {
        let mut af = modem(Config {
            preamble_ms: 0,
            trailer_ms: 0,
            ..Config::default()
        });
        assert_eq!(af.poll_flush(), Ok(()));
        af.write_byte(0x41).unwrap();
        assert_eq!(af.poll_flush(), Err(nb::Error::WouldBlock));
        for _ in 0..(8 * SAMPLES_PER_BIT + 1) {
            let _ = af.dac_isr();
        }
        assert_eq!(af.poll_flush(), Ok(()));
    }
}
