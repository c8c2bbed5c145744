//! Process wide setup of the container libraries.
use std::sync::Once;

static INIT: Once = Once::new();

/// Run one-time backend setup. Safe to call any number of times.
pub fn initialize() {
    INIT.call_once(|| {
        // Errors are reported through `log` instead of HDF5's own stderr
        // error stack.
        #[cfg(feature = "hdf5")]
        hdf5::silence_errors(true);
        log::debug!("Read loader backends initialized");
    });
}
