//! Small helpers shared across the crate.

/// Size bound on a solib's name fields, in bytes, including room for the
/// terminator a C debugger core would append.
pub const SO_NAME_MAX_PATH_SIZE: usize = 512;

/// Copy `name` into a fresh `String` holding at most
/// [`SO_NAME_MAX_PATH_SIZE`]` - 1` bytes.
///
/// Names that fit are copied exactly. Longer names are truncated, backing up
/// to a UTF-8 character boundary so the result is always valid; the
/// reserved final byte mirrors the NUL terminator of the fixed-size buffers
/// this replaces.
pub fn bounded_so_name(name: &str) -> String {
    let max = SO_NAME_MAX_PATH_SIZE - 1;
    if name.len() <= max {
        return name.to_owned();
    }

    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_copied_exactly() {
        assert_eq!(bounded_so_name("libfoo.so"), "libfoo.so");
        assert_eq!(bounded_so_name(""), "");
    }

    #[test]
    fn boundary_name_fits() {
        let name = "x".repeat(SO_NAME_MAX_PATH_SIZE - 1);
        assert_eq!(bounded_so_name(&name), name);
    }

    #[test]
    fn long_names_truncated() {
        let name = "y".repeat(SO_NAME_MAX_PATH_SIZE + 100);
        let bounded = bounded_so_name(&name);
        assert_eq!(bounded.len(), SO_NAME_MAX_PATH_SIZE - 1);
        assert!(name.starts_with(&bounded));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        // 2-byte characters, one of which straddles the bound
        let name = "é".repeat(SO_NAME_MAX_PATH_SIZE);
        let bounded = bounded_so_name(&name);
        assert!(bounded.len() <= SO_NAME_MAX_PATH_SIZE - 1);
        assert!(bounded.chars().all(|c| c == 'é'));
    }
}
