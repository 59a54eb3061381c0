//! Small shared helpers

use rand::RngCore;

/// Random lowercase hex string of `n_bytes * 2` characters.
///
/// Used to key tmux session names and handoff paths so independent relay
/// runs never collide in the shared filesystem namespace.
pub fn random_hex(n_bytes: usize) -> String {
    let mut bytes = vec![0u8; n_bytes];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// First `n` lines of a string, for content previews.
pub fn first_lines(text: &str, n: usize) -> Vec<&str> {
    text.lines().take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_hex_length_and_charset() {
        let token = random_hex(3);
        assert_eq!(token.len(), 6);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_random_hex_is_unique_enough() {
        // Two draws colliding would mean a broken RNG, not bad luck.
        assert_ne!(random_hex(8), random_hex(8));
    }

    #[test]
    fn test_first_lines() {
        let text = "a\nb\nc\nd";
        assert_eq!(first_lines(text, 2), vec!["a", "b"]);
        assert_eq!(first_lines("", 3), Vec::<&str>::new());
    }
}
