/// Invitation tokens
///
/// - **Format**: `inv_{43_chars}`, the random part base62 (`[A-Za-z0-9]`)
/// - **Entropy**: 43 base62 characters from the OS CSPRNG, just over 256 bits
/// - **Storage**: only the SHA-256 hex digest is stored; lookups hash the
///   presented token and match on the digest
///
/// # Example
///
/// ```
/// use hearth_shared::invitations::token::{generate_token, hash_token, is_valid_format};
///
/// let (token, hash) = generate_token();
/// assert!(token.starts_with("inv_"));
/// assert!(is_valid_format(&token));
/// assert_eq!(hash, hash_token(&token));
/// assert_eq!(hash.len(), 64);
/// ```

use rand::rngs::OsRng;
use rand::Rng;
use sha2::{Digest, Sha256};

const TOKEN_PREFIX: &str = "inv_";

/// ceil(256 / log2(62))
const TOKEN_RANDOM_LENGTH: usize = 43;

pub const TOKEN_LENGTH: usize = TOKEN_PREFIX.len() + TOKEN_RANDOM_LENGTH;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generates a token and its hash
///
/// Returns `(plaintext, sha256_hex)`.
pub fn generate_token() -> (String, String) {
    let random_part: String = (0..TOKEN_RANDOM_LENGTH)
        .map(|_| CHARSET[OsRng.gen_range(0..CHARSET.len())] as char)
        .collect();

    let token = format!("{TOKEN_PREFIX}{random_part}");
    let hash = hash_token(&token);

    (token, hash)
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Cheap shape check before touching the database
pub fn is_valid_format(token: &str) -> bool {
    token.len() == TOKEN_LENGTH
        && token
            .strip_prefix(TOKEN_PREFIX)
            .is_some_and(|rest| rest.bytes().all(|b| b.is_ascii_alphanumeric()))
}
