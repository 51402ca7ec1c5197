use core::cell::RefCell;
use core::hint::spin_loop;

use critical_section::Mutex;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::driver::{Afsk, DacInterrupt, RxTimeout};
use crate::filter::LowPass;

/// Poll interval of the blocking reader, roughly one sample period.
const RX_POLL_US: u32 = 100;

/// Initializes the global static modem cell for use with
/// `critical_section`.
///
/// # Returns
/// * An empty mutable ref-cell
///
/// # Example
/// ```rust
/// use afsk1200::driver::Afsk;
/// use afsk1200::filter::Butterworth;
/// use afsk1200::timer::global_afsk_init;
/// use core::cell::RefCell;
/// use critical_section::Mutex;
/// # use embedded_hal_mock::eh1::digital::Mock as Pin;
/// # #[derive(Debug, Default)]
/// # struct DacIrq;
/// # impl afsk1200::driver::DacInterrupt for DacIrq {
/// #     fn start(&mut self) {}
/// #     fn stop(&mut self) {}
/// # }
///
/// static MODEM: Mutex<RefCell<Option<Afsk<DacIrq, Pin, Butterworth>>>> =
///     global_afsk_init::<DacIrq, Pin, Butterworth>();
/// ```
pub const fn global_afsk_init<D: DacInterrupt, S: OutputPin, F: LowPass>()
-> Mutex<RefCell<Option<Afsk<D, S, F>>>> {
    Mutex::new(RefCell::new(None))
}

/// Stores a freshly constructed modem in the global cell.
///
/// # Arguments
/// * The global static modem cell
/// * The DAC interrupt hook
/// * The optional debug strobe pin
/// * The modem [`Config`](crate::driver::Config)
///
/// # Notes
/// - Must be called before the sampling interrupts are enabled.
pub fn global_afsk_setup<D: DacInterrupt, S: OutputPin, F: LowPass>(
    global_modem: &'static Mutex<RefCell<Option<Afsk<D, S, F>>>>,
    dac: D,
    strobe: Option<S>,
    config: crate::driver::Config,
) {
    critical_section::with(|cs| {
        let _ = global_modem
            .borrow(cs)
            .replace(Some(Afsk::new(dac, strobe, config)));
    });
}

/// Runs the receive pipeline for one ADC sample.
///
/// Call from the ADC sample-ready ISR. Does nothing if the modem has
/// not been set up yet.
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn ADC() {
///     let sample = read_adc_sample();
///     global_adc_isr(&MODEM, sample);
/// }
/// ```
pub fn global_adc_isr<D: DacInterrupt, S: OutputPin, F: LowPass>(
    global_modem: &'static Mutex<RefCell<Option<Afsk<D, S, F>>>>,
    sample: i8,
) {
    critical_section::with(|cs| {
        if let Some(modem) = global_modem.borrow(cs).borrow_mut().as_mut() {
            modem.adc_isr(sample);
        }
    });
}

/// Produces the next DAC output sample.
///
/// Call from the DAC sample-request ISR. Returns the idle level 0 if
/// the modem has not been set up yet.
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn DAC() {
///     write_dac_sample(global_dac_isr(&MODEM));
/// }
/// ```
pub fn global_dac_isr<D: DacInterrupt, S: OutputPin, F: LowPass>(
    global_modem: &'static Mutex<RefCell<Option<Afsk<D, S, F>>>>,
) -> u8 {
    critical_section::with(|cs| {
        match global_modem.borrow(cs).borrow_mut().as_mut() {
            Some(modem) => modem.dac_isr(),
            None => 0,
        }
    })
}

/// Drains up to `buf.len()` bytes from the receive queue.
///
/// The configured [`RxTimeout`] decides how long each byte may be
/// waited for:
///
/// - [`RxTimeout::NonBlocking`]: return whatever is immediately
///   available.
/// - [`RxTimeout::Infinite`]: wait until every requested byte has
///   arrived.
/// - [`RxTimeout::Ms`]: wait up to the given time per byte, then return
///   the count delivered so far.
///
/// Each poll enters its own critical section, so the sampling
/// interrupts keep running between polls; `delay` paces the polls and
/// provides the time base for the timeout accounting.
///
/// # Returns
/// The number of bytes written into `buf`.
pub fn afsk_read<D: DacInterrupt, S: OutputPin, F: LowPass, T: DelayNs>(
    global_modem: &'static Mutex<RefCell<Option<Afsk<D, S, F>>>>,
    buf: &mut [u8],
    delay: &mut T,
) -> usize {
    let timeout = critical_section::with(|cs| {
        global_modem
            .borrow(cs)
            .borrow()
            .as_ref()
            .map(|modem| modem.config().rx_timeout)
    });
    let Some(timeout) = timeout else {
        return 0;
    };

    let mut count = 0;
    for slot in buf.iter_mut() {
        let mut waited_us: u32 = 0;
        loop {
            let byte = critical_section::with(|cs| {
                global_modem
                    .borrow(cs)
                    .borrow_mut()
                    .as_mut()
                    .and_then(|modem| modem.read_byte().ok())
            });

            match byte {
                Some(b) => {
                    *slot = b;
                    count += 1;
                    break;
                }
                None => match timeout {
                    RxTimeout::NonBlocking => return count,
                    RxTimeout::Infinite => delay.delay_us(RX_POLL_US),
                    RxTimeout::Ms(ms) => {
                        if waited_us >= ms.saturating_mul(1000) {
                            return count;
                        }
                        delay.delay_us(RX_POLL_US);
                        waited_us += RX_POLL_US;
                    }
                },
            }
        }
    }

    count
}

/// Pushes `buf` into the transmit queue, arming transmission for every
/// byte.
///
/// Blocks (spin hint between critical sections) while the queue is
/// full; the DAC interrupt drains it concurrently. The trailer is
/// re-armed per byte, so writes issued while a transmission is running
/// extend its closing flag stream.
///
/// # Returns
/// `buf.len()`, or a short count if the modem has not been set up.
pub fn afsk_write<D: DacInterrupt, S: OutputPin, F: LowPass>(
    global_modem: &'static Mutex<RefCell<Option<Afsk<D, S, F>>>>,
    buf: &[u8],
) -> usize {
    for (i, &byte) in buf.iter().enumerate() {
        loop {
            let pushed = critical_section::with(|cs| {
                global_modem
                    .borrow(cs)
                    .borrow_mut()
                    .as_mut()
                    .map(|modem| modem.write_byte(byte).is_ok())
            });

            match pushed {
                None => return i,
                Some(true) => break,
                Some(false) => spin_loop(),
            }
        }
    }

    buf.len()
}

/// Spins until the transmitter has fallen idle.
///
/// Must not be called from an ISR.
pub fn afsk_flush<D: DacInterrupt, S: OutputPin, F: LowPass>(
    global_modem: &'static Mutex<RefCell<Option<Afsk<D, S, F>>>>,
) {
    loop {
        let sending = critical_section::with(|cs| {
            global_modem
                .borrow(cs)
                .borrow()
                .as_ref()
                .map(|modem| modem.is_sending())
        });
        match sending {
            Some(true) => spin_loop(),
            _ => return,
        }
    }
}

/// Returns the status word, 0 if the modem has not been set up.
pub fn afsk_error<D: DacInterrupt, S: OutputPin, F: LowPass>(
    global_modem: &'static Mutex<RefCell<Option<Afsk<D, S, F>>>>,
) -> u8 {
    critical_section::with(|cs| {
        global_modem
            .borrow(cs)
            .borrow()
            .as_ref()
            .map(|modem| modem.status())
            .unwrap_or(0)
    })
}

/// Clears the status word.
pub fn afsk_clearerr<D: DacInterrupt, S: OutputPin, F: LowPass>(
    global_modem: &'static Mutex<RefCell<Option<Afsk<D, S, F>>>>,
) {
    critical_section::with(|cs| {
        if let Some(modem) = global_modem.borrow(cs).borrow_mut().as_mut() {
            modem.clear_status();
        }
    });
}
