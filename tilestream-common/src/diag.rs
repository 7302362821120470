// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Diagnostic logging.
//!
//! Messages are for application developers looking at an RTT console, never
//! parsed by firmware. Without the `defmt` feature they compile away; the
//! arguments are still borrowed so call sites don't trip unused warnings.

macro_rules! diag {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        defmt::warn!($fmt $(, $arg)*);
        #[cfg(not(feature = "defmt"))]
        {
            $(let _ = &$arg;)*
        }
    }};
}
