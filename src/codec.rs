//! Binary field codec.
//!
//! Opaque byte fields (raw certificates, banners, ...) cross the backend
//! boundary as standard padded base64. The alphabet is `A-Z a-z 0-9 + / =`,
//! which every text column and search index accepts unchanged.

use base64::Engine;

use crate::error_handling::DatabaseError;

/// Encodes bytes as base64 text. The empty slice encodes to the empty string.
pub fn encode(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// Decodes base64 text produced by [`encode`].
pub fn decode(text: &str) -> Result<Vec<u8>, DatabaseError> {
    base64::engine::general_purpose::STANDARD
        .decode(text)
        .map_err(DatabaseError::from)
}

/// Serde adapter storing a `name -> bytes` map as `name -> base64 text`.
///
/// Use with `#[serde(with = "crate::codec::base64_map")]`.
pub mod base64_map {
    use std::collections::BTreeMap;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(map: &BTreeMap<String, Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded: BTreeMap<&str, String> = map
            .iter()
            .map(|(name, bytes)| (name.as_str(), super::encode(bytes)))
            .collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = BTreeMap::<String, String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|(name, text)| {
                super::decode(&text)
                    .map(|bytes| (name.clone(), bytes))
                    .map_err(|e| D::Error::custom(format!("binary field {name}: {e}")))
            })
            .collect()
    }
}
