use uuid::Uuid;

/// Alphabet for referral codes. Excludes `0/O` and `1/I` so codes survive
/// being read over the phone.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 8;

/// Mint a new referral code.
///
/// Uniqueness is enforced by the vault's unique index; callers regenerate
/// on the rare collision.
pub fn generate_referral_code() -> String {
    let raw = Uuid::new_v4();
    raw.as_bytes()
        .iter()
        .take(CODE_LEN)
        .map(|byte| CODE_ALPHABET[(byte % CODE_ALPHABET.len() as u8) as usize] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_use_the_restricted_alphabet() {
        for _ in 0..64 {
            let code = generate_referral_code();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)), "{code}");
        }
    }

    #[test]
    fn codes_are_not_obviously_colliding() {
        let a = generate_referral_code();
        let b = generate_referral_code();
        assert_ne!(a, b);
    }
}
