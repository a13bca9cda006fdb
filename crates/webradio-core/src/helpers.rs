//! Formatting helpers shared by the station list and the CLI.

use crate::band::Band;

/// Format an FM frequency (10 kHz units) as megahertz.
///
/// Uses the shortest decimal form that keeps at least one fractional
/// digit: `8810` becomes `"88.1"`, `8800` becomes `"88.0"`, `8815`
/// becomes `"88.15"`.
pub fn format_fm_mhz(freq: u16) -> String {
    let whole = freq / 100;
    let frac = freq % 100;
    if frac % 10 == 0 {
        format!("{whole}.{}", frac / 10)
    } else {
        format!("{whole}.{frac:02}")
    }
}

/// Human-readable station name: `"99.9 FM"` or `"1010 AM"`.
pub fn station_name(band: Band, freq: u16) -> String {
    match band {
        Band::Fm => format!("{} FM", format_fm_mhz(freq)),
        Band::Am => format!("{freq} AM"),
    }
}
