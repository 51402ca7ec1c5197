/// Declares a static global `AFSK_MODEM` cell protected by a
/// `critical_section` mutex.
///
/// Creates a `static` singleton suitable for interrupt-based use, where
/// both the foreground and the two sample ISRs need access to the same
/// modem state.
///
/// # Arguments
/// - `$dac`: concrete type of the DAC interrupt hook
///   (implements [`DacInterrupt`](crate::driver::DacInterrupt))
/// - `$strobe`: concrete type of the debug strobe pin
///   (implements `embedded_hal::digital::OutputPin`)
/// - `$filter`: receive filter type
///   (implements [`LowPass`](crate::filter::LowPass))
///
/// # Example
/// ```rust,ignore
/// init_afsk_modem!(MyDacIrq, MyStrobePin, Butterworth);
/// ```
#[macro_export]
macro_rules! init_afsk_modem {
    ( $dac:ty, $strobe:ty, $filter:ty ) => {
        pub static AFSK_MODEM: $crate::critical_section::Mutex<
            core::cell::RefCell<Option<$crate::driver::Afsk<$dac, $strobe, $filter>>>,
        > = $crate::critical_section::Mutex::new(core::cell::RefCell::new(None));
    };
}

/// Initializes the global `AFSK_MODEM` singleton with a new modem
/// instance.
///
/// # Arguments
/// - `$dac`: the DAC interrupt hook value
/// - `$strobe`: `Option` of the debug strobe pin
/// - `$config`: a [`Config`](crate::driver::Config) value
///
/// # Notes
/// - Requires `init_afsk_modem!` to have been used earlier.
/// - Call before enabling the sampling interrupts.
///
/// # Example
/// ```rust,ignore
/// fn main() {
///     setup_afsk_modem!(dac, None, Config::default());
/// }
/// ```
#[macro_export]
macro_rules! setup_afsk_modem {
    ( $dac:expr, $strobe:expr, $config:expr ) => {
        $crate::critical_section::with(|cs| {
            let _ = AFSK_MODEM
                .borrow(cs)
                .replace(Some($crate::driver::Afsk::new($dac, $strobe, $config)));
        });
    };
}

/// Runs the receive pipeline on the global `AFSK_MODEM` for one ADC
/// sample.
///
/// Intended as the body of the ADC sample-ready ISR. Does nothing if
/// the modem has not been set up yet.
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn ADC() {
///     afsk_adc_isr!(read_adc_sample());
/// }
/// ```
#[macro_export]
macro_rules! afsk_adc_isr {
    ( $sample:expr ) => {
        $crate::critical_section::with(|cs| {
            if let Some(modem) = AFSK_MODEM.borrow(cs).borrow_mut().as_mut() {
                modem.adc_isr($sample);
            }
        });
    };
}

/// Produces the next DAC output sample from the global `AFSK_MODEM`.
///
/// Intended as the body of the DAC sample-request ISR. Evaluates to the
/// idle level 0 if the modem has not been set up yet.
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn DAC() {
///     write_dac_sample(afsk_dac_isr!());
/// }
/// ```
#[macro_export]
macro_rules! afsk_dac_isr {
    () => {
        $crate::critical_section::with(|cs| {
            match AFSK_MODEM.borrow(cs).borrow_mut().as_mut() {
                Some(modem) => modem.dac_isr(),
                None => 0,
            }
        })
    };
}
