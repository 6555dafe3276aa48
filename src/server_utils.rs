use crate::constants::{MAX_MAZE_SIZE, MIN_MAZE_SIZE};

pub fn normalize_seed(value: i64) -> u32 {
    value as u32
}

/// Clamps a client-requested maze size; generation makes it odd.
pub fn normalize_maze_size(value: Option<i64>, current: i32) -> i32 {
    match value {
        None => current,
        Some(size) => size.clamp(MIN_MAZE_SIZE as i64, MAX_MAZE_SIZE as i64) as i32,
    }
}

pub fn parse_port(raw: Option<&str>, default: u16) -> u16 {
    raw.and_then(|value| value.trim().parse::<u16>().ok())
        .filter(|port| *port != 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_seed_wraps_into_u32() {
        assert_eq!(normalize_seed(42), 42);
        assert_eq!(normalize_seed(-1), u32::MAX);
        assert_eq!(normalize_seed(1 << 32), 0);
    }

    #[test]
    fn normalize_maze_size_clamps_range() {
        assert_eq!(normalize_maze_size(None, 21), 21);
        assert_eq!(normalize_maze_size(Some(-10), 21), MIN_MAZE_SIZE);
        assert_eq!(normalize_maze_size(Some(15), 21), 15);
        assert_eq!(normalize_maze_size(Some(999), 21), MAX_MAZE_SIZE);
    }

    #[test]
    fn parse_port_is_lenient_for_invalid_values() {
        assert_eq!(parse_port(Some("8080"), 3000), 8080);
        assert_eq!(parse_port(Some(" 9000 "), 3000), 9000);
        assert_eq!(parse_port(Some("abc"), 3000), 3000);
        assert_eq!(parse_port(Some("0"), 3000), 3000);
        assert_eq!(parse_port(None, 3000), 3000);
    }
}
