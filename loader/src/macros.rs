#![macro_use]

// select the register of the core this code is running on
#[cfg(not(feature = "stm32wl5x_cm0p"))]
#[allow(unused_macros)]
macro_rules! c1_c2 {
    ($c1:expr, $c2:expr $(,)?) => {
        $c1
    };
}

#[cfg(feature = "stm32wl5x_cm0p")]
#[allow(unused_macros)]
macro_rules! c1_c2 {
    ($c1:expr, $c2:expr $(,)?) => {
        $c2
    };
}

macro_rules! trace {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        defmt::trace!($fmt $(, $arg)*);
        #[cfg(not(feature = "defmt"))]
        let _ = ($(&$arg,)*);
    }};
}

macro_rules! debug {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        defmt::debug!($fmt $(, $arg)*);
        #[cfg(not(feature = "defmt"))]
        let _ = ($(&$arg,)*);
    }};
}
