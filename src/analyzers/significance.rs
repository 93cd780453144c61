/// Converts a two-sided p-value into the conventional significance marker.
///
/// | Range          | Marker |
/// |----------------|--------|
/// | p < 0.001      | `***`  |
/// | p < 0.01       | `**`   |
/// | p < 0.05       | `*`    |
/// | p < 0.1        | `.`    |
/// | otherwise, NaN | (none) |
pub fn significance_marker(p: f64) -> &'static str {
    match p {
        p if p < 0.001 => "***",
        p if p < 0.01 => "**",
        p if p < 0.05 => "*",
        p if p < 0.1 => ".",
        _ => "",
    }
}

/// Whether `p` clears the given two-sided level.
pub fn is_significant(p: f64, level: f64) -> bool {
    p < level
}
