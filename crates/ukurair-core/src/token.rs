// ── Device token generator ──

use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const TOKEN_LEN: usize = 8;

/// A fresh 8-character `A-Z0-9` token, never equal to `previous`.
pub fn generate_device_token(previous: Option<&str>) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let token: String = (0..TOKEN_LEN)
            .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
            .collect();
        if previous != Some(token.as_str()) {
            return token;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape() {
        for _ in 0..100 {
            let token = generate_device_token(None);
            assert_eq!(token.len(), 8);
            assert!(token.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn differs_from_previous() {
        let previous = generate_device_token(None);
        for _ in 0..100 {
            assert_ne!(generate_device_token(Some(&previous)), previous);
        }
    }
}
