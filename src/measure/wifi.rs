// Wi-Fi reading normalization
//
// Submissions may carry a raw frequency instead of a channel number. The
// frequency never reaches storage; it only fills in a missing channel.

use super::WifiReading;

/// Channel number for a frequency in MHz, if it falls in the 2.4 or 5 GHz band.
pub fn channel_from_frequency(freq: i32) -> Option<i32> {
    if 2411 < freq && freq < 2473 {
        Some((freq - 2407) / 5)
    } else if 5169 < freq && freq < 5826 {
        Some((freq - 5000) / 5)
    } else {
        None
    }
}

/// Remove `frequency` from every reading, deriving `channel` when none was given.
///
/// A channel of `0` counts as absent. Running this twice is harmless.
pub fn normalize_wifi(readings: &mut [WifiReading]) {
    for entry in readings.iter_mut() {
        let Some(freq) = entry.frequency.take() else {
            continue;
        };
        let has_channel = matches!(entry.channel, Some(ch) if ch != 0);
        if !has_channel {
            entry.channel = channel_from_frequency(freq);
        }
    }
}
