//! Receive DSP chain: discriminator, low-pass, slicer and bit sampler.
//!
//! Every ADC sample runs the same fixed-cost pipeline:
//!
//! 1. **Discriminate**: multiply the sample with the one from half a
//!    symbol ago. The product's sign depends on the tone, because the
//!    half-symbol delay is close to 180° of the mark tone and 330° of
//!    the space tone.
//! 2. **Filter**: first-order 600 Hz low-pass ([`crate::filter`]),
//!    leaving a tone-dependent DC level.
//! 3. **Slice**: threshold at zero into a rolling bit register.
//! 4. **Phase-lock**: transitions in the sliced bits nudge the sample
//!    phase towards the centre of the symbol window.
//! 5. **Decide**: once per symbol, majority-vote the last three sliced
//!    bits, NRZI-decode against the previous symbol and hand the result
//!    to the HDLC deframer.
//!
//! The whole pipeline is integer add/subtract/shift plus one 8x8
//! multiply; it is meant to run inside the ADC interrupt.

use heapless::Deque;

use crate::consts::{DELAY_LINE_LEN, PHASE_BIT, PHASE_INC, PHASE_MAX, PHASE_THRESHOLD};
use crate::filter::{Butterworth, LowPass};
use crate::hdlc::{Hdlc, RxError};

const fn bits_differ(bits1: u8, bits2: u8) -> bool {
    (bits1 ^ bits2) & 0x01 != 0
}

/// True when the two newest bits of the register differ.
const fn edge_found(bits: u8) -> bool {
    bits_differ(bits, bits >> 1)
}

/// Demodulator state, from raw ADC samples down to deframed bytes.
///
/// The filter variant is fixed by the type parameter so that the
/// per-sample path carries no branch on the filter kind.
#[derive(Debug)]
pub struct Demodulator<F = Butterworth> {
    /// The last half symbol of input samples, preloaded with zeros.
    /// Holds exactly [`DELAY_LINE_LEN`] entries at every step boundary.
    delay_line: Deque<i8, DELAY_LINE_LEN>,
    filter: F,
    /// Rolling register of sliced bits, newest in the LSB.
    sampled_bits: u8,
    /// Sample phase in `[0, PHASE_MAX)`.
    pub(crate) curr_phase: i16,
    /// Rolling register of decided symbols, the NRZI reference.
    found_bits: u8,
    pub(crate) hdlc: Hdlc,
}

impl<F: LowPass> Demodulator<F> {
    /// Creates a demodulator with a zeroed delay line.
    pub fn new() -> Self {
        let mut delay_line = Deque::new();
        while delay_line.push_back(0).is_ok() {}
        Self {
            delay_line,
            filter: F::default(),
            sampled_bits: 0,
            curr_phase: 0,
            found_bits: 0,
            hdlc: Hdlc::new(),
        }
    }

    /// Runs the pipeline for one ADC sample.
    ///
    /// At most one symbol is decided and handed to the deframer per
    /// call. An overrun from the deframer propagates out so the caller
    /// can set the status bit.
    pub fn process<const N: usize>(
        &mut self,
        sample: i8,
        rx_fifo: &mut Deque<u8, N>,
    ) -> Result<(), RxError> {
        // Frequency discriminator: multiply with the sample from half a
        // symbol ago, then attenuate into the filter's input range.
        let delayed = self.delay_line.pop_front().unwrap_or(0);
        let x = (delayed as i16 * sample as i16) >> 2;
        let y = self.filter.step(x);

        self.sampled_bits <<= 1;
        self.sampled_bits |= (y > 0) as u8;

        let _ = self.delay_line.push_back(sample);

        // A transition off the window centre nudges the sample phase.
        if edge_found(self.sampled_bits) {
            if self.curr_phase < PHASE_THRESHOLD {
                self.curr_phase += PHASE_INC;
            } else {
                self.curr_phase -= PHASE_INC;
            }
        }
        self.curr_phase += PHASE_BIT;

        if self.curr_phase >= PHASE_MAX {
            self.curr_phase %= PHASE_MAX;

            self.found_bits <<= 1;

            // Majority vote over the last three sliced bits. Assumes
            // eight samples per symbol.
            let bits = self.sampled_bits & 0x07;
            if bits == 0x07 || bits == 0x06 || bits == 0x05 || bits == 0x03 {
                self.found_bits |= 1;
            }

            // NRZI: two equal symbols decode as 1, a transition as 0.
            return self.hdlc.feed(!edge_found(self.found_bits), rx_fifo);
        }

        Ok(())
    }
}

impl<F: LowPass> Default for Demodulator<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Chebyshev;

    #[test]
    fn delay_line_is_preloaded_with_half_a_symbol() {
        let d = Demodulator::<Butterworth>::new();
        assert_eq!(d.delay_line.len(), DELAY_LINE_LEN);
        assert!(d.delay_line.iter().all(|&s| s == 0));
    }

    #[test]
    fn delay_line_length_is_invariant() {
        let mut d = Demodulator::<Chebyshev>::new();
        let mut fifo = Deque::<u8, 16>::new();
        for s in [5, -5, 90, -90, 127, -128, 0, 1] {
            d.process(s, &mut fifo).unwrap();
            assert_eq!(d.delay_line.len(), DELAY_LINE_LEN);
        }
    }

    #[test]
    fn phase_free_runs_without_edges() {
        let mut d = Demodulator::<Butterworth>::new();
        let mut fifo = Deque::<u8, 16>::new();
        // Zero input produces no slicer edges; the phase advances by
        // PHASE_BIT per sample and wraps every eight samples.
        for _ in 0..8 {
            d.process(0, &mut fifo).unwrap();
        }
        assert_eq!(d.curr_phase, 0);
        for _ in 0..4 {
            d.process(0, &mut fifo).unwrap();
        }
        assert_eq!(d.curr_phase, 4 * PHASE_BIT);
    }

    #[test]
    fn early_edge_advances_phase() {
        let mut d = Demodulator::<Butterworth>::new();
        let mut fifo = Deque::<u8, 16>::new();
        // Four zeros flush the preload, four positive samples fill the
        // delay line; the ninth sample is the first with a positive
        // product, which flips the sliced bit and makes an edge.
        for s in [0, 0, 0, 0, 100, 100, 100, 100] {
            d.process(s, &mut fifo).unwrap();
        }
        d.curr_phase = 10;
        d.process(100, &mut fifo).unwrap();
        // Below the threshold the edge adds PHASE_INC: 10 + 1 + 8.
        assert_eq!(d.curr_phase, 10 + PHASE_INC + PHASE_BIT);
    }

    #[test]
    fn late_edge_retards_phase() {
        let mut d = Demodulator::<Butterworth>::new();
        let mut fifo = Deque::<u8, 16>::new();
        for s in [0, 0, 0, 0, 100, 100, 100, 100] {
            d.process(s, &mut fifo).unwrap();
        }
        d.curr_phase = 40;
        d.process(100, &mut fifo).unwrap();
        // At or above the threshold the edge subtracts PHASE_INC.
        assert_eq!(d.curr_phase, 40 - PHASE_INC + PHASE_BIT);
    }

    #[test]
    fn overrun_propagates_from_the_deframer() {
        let mut d = Demodulator::<Butterworth>::new();
        let mut fifo = Deque::<u8, 1>::new();
        fifo.push_back(0xaa).unwrap();
        // Force a flag byte through the deframer directly under a full
        // queue via the public pipeline: constant alternating tones are
        // slow to set up, so drive the deframer state instead.
        let mut err = Ok(());
        for bit in [false, true, true, true, true, true, true, false] {
            if let Err(e) = d.hdlc.feed(bit, &mut fifo) {
                err = Err(e);
            }
        }
        assert_eq!(err, Err(RxError::Overrun));
    }
}
