/// Convert a media-server rating (0-10, half stars allowed) to a MAL score (0-10 integer)
///
/// Half stars round up; out-of-range and non-finite values are clamped into range.
pub fn to_mal_score(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(0.0, 10.0) as u8
}
