//! The process-wide pseudonymization secret.

use std::fmt;
use std::str::FromStr;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::error::{ConfigError, Result};

/// Minimum secret length in bytes.
const MIN_PEPPER_BYTES: usize = 16;

/// Shown in place of the secret whenever it is printed or serialized.
pub const REDACTED: &str = "<redacted>";

/// Secret bytes mixed into every pseudonym.
///
/// Accepted as a UUID, a hex string of at least 32 characters or base64 text
/// decoding to at least 16 bytes.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Pepper(Vec<u8>);

impl Pepper {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() < MIN_PEPPER_BYTES {
            return Err(ConfigError::secret(format!(
                "pepper must be at least {MIN_PEPPER_BYTES} bytes"
            )));
        }
        Ok(Self(bytes))
    }

    pub fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Pepper {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConfigError::secret("pepper must not be empty"));
        }
        if let Ok(id) = Uuid::parse_str(s) {
            return Self::from_bytes(id.as_bytes().to_vec());
        }
        if s.len() >= MIN_PEPPER_BYTES * 2 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            let bytes =
                hex::decode(s).map_err(|e| ConfigError::secret(format!("invalid hex pepper: {e}")))?;
            return Self::from_bytes(bytes);
        }
        let bytes = BASE64
            .decode(s)
            .map_err(|_| ConfigError::secret("pepper must be a UUID, hex or base64 string"))?;
        Self::from_bytes(bytes)
    }
}

impl TryFrom<String> for Pepper {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Debug for Pepper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pepper").field(&REDACTED).finish()
    }
}

impl Serialize for Pepper {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}
