/// Wrappers for secret material that is zeroized on drop.
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A 32-byte signing key that is zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SensitiveBytes32([u8; 32]);

impl SensitiveBytes32 {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != 32 {
            return None;
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Some(Self(bytes))
    }
}

impl std::fmt::Debug for SensitiveBytes32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SensitiveBytes32(..)")
    }
}

/// A secret string (signing secret, ledger private key) handed out by the
/// secret provider. Zeroized on drop and redacted from `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensitive_bytes32() {
        let key = SensitiveBytes32::new([0xAA; 32]);
        assert_eq!(key.as_bytes(), &[0xAA; 32]);
    }

    #[test]
    fn test_sensitive_bytes32_from_slice() {
        assert!(SensitiveBytes32::from_slice(&[0u8; 32]).is_some());
        assert!(SensitiveBytes32::from_slice(&[0u8; 16]).is_none());
    }

    #[test]
    fn test_secret_string_redacted() {
        let s = SecretString::new("hunter2");
        assert_eq!(s.expose(), "hunter2");
        assert!(!format!("{s:?}").contains("hunter2"));
    }
}
