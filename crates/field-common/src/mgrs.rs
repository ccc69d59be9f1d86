//! MGRS tile helpers.

/// UTM zone of an MGRS tile id (`"10SFH"` -> `10`).
///
/// Only two digit zones are recognised; the conterminous U.S. spans 10-19.
pub fn utm_zone(mgrs_tile: &str) -> Option<u8> {
    let zone = mgrs_tile.trim().get(..2)?;
    if !zone.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    zone.parse::<u8>().ok().filter(|z| (1..=60).contains(z))
}
