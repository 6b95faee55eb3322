//! Secret wrapper for credentials that must never reach logs

use std::fmt;
use zeroize::Zeroize;

/// A sensitive value such as an OAuth client secret or the session signing key.
///
/// Redacted in `Debug` and `Display` so it cannot leak through structured
/// logging, and zeroized on drop.
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the inner value. Call sites should hand the reference straight
    /// to the consumer (signer, HTTP client) rather than copying it around.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T: Zeroize> From<T> for Secret<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_and_display_redact() {
        let secret = Secret::new(String::from("hmac-signing-key"));
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert_eq!(format!("{}", secret), "[REDACTED]");
    }

    #[test]
    fn expose_returns_the_value() {
        let secret: Secret<String> = String::from("client-secret-value").into();
        assert_eq!(secret.expose(), "client-secret-value");
    }

    #[test]
    fn clone_preserves_the_value() {
        let secret = Secret::new(String::from("abc"));
        let copy = secret.clone();
        assert_eq!(copy.expose(), secret.expose());
    }
}
