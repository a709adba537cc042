// Versioned permission bitsets carried in permission claims

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// Bits reserved at the start of every claim for the schema version
pub const VERSION_BITS: usize = 32;

/// An indexable, versioned permissions bitset
///
/// Bits are stored least-significant first within each byte. The first 32
/// bits hold the claim version as a little-endian `i32`; resources occupy
/// ranges after that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    version: i32,
    len: usize,
    bits: Vec<u8>,
}

impl Permissions {
    /// Decode a claim from its raw bytes; `None` if it cannot hold a version
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let head: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        Some(Self {
            version: i32::from_le_bytes(head),
            len: bytes.len() * 8,
            bits: bytes.to_vec(),
        })
    }

    /// Decode a base64 claim value
    pub fn from_base64(encoded: &str) -> Option<Self> {
        let bytes = STANDARD.decode(encoded).ok()?;
        Self::from_bytes(&bytes)
    }

    /// Start an empty claim for a service version spanning `hwm` bits
    pub fn builder(version: i32, hwm: i32) -> PermissionsBuilder {
        let len = usize::try_from(hwm).unwrap_or(0).max(VERSION_BITS);
        let mut permissions = Self {
            version,
            len,
            bits: vec![0; (len - 1) / 8 + 1],
        };
        for (i, byte) in version.to_le_bytes().iter().enumerate() {
            permissions.bits[i] = *byte;
        }
        PermissionsBuilder { permissions }
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    /// Number of addressable bits
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn bit(&self, index: usize) -> bool {
        index < self.len
            && self
                .bits
                .get(index / 8)
                .is_some_and(|byte| (byte >> (index % 8)) & 1 == 1)
    }

    fn set(&mut self, index: usize) {
        if index < self.len {
            if let Some(byte) = self.bits.get_mut(index / 8) {
                *byte |= 1 << (index % 8);
            }
        }
    }

    /// Whether every bit of `mask` is set at `position` for a matching version
    ///
    /// A mask that is zero or negative only checks the version.
    pub fn has_permissions(&self, version: i32, position: i32, mask: i32) -> bool {
        if version != self.version {
            return false;
        }
        if mask <= 0 {
            return true;
        }
        let Ok(position) = usize::try_from(position) else {
            return false;
        };
        (0..i32::BITS as usize)
            .filter(|i| (mask >> i) & 1 == 1)
            .all(|i| self.bit(position + i))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// Encode the claim the way it is carried in tokens
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bits)
    }
}

/// Builder used when compiling a manifest into claims
#[derive(Debug, Clone)]
pub struct PermissionsBuilder {
    permissions: Permissions,
}

impl PermissionsBuilder {
    /// Set the bits of `mask` starting at `position`, ignoring bits past the end
    ///
    /// Masks that are zero or negative grant nothing.
    pub fn grant(&mut self, position: i32, mask: i32) -> &mut Self {
        if mask <= 0 {
            return self;
        }
        if let Ok(position) = usize::try_from(position) {
            for i in (0..i32::BITS as usize).filter(|i| (mask >> i) & 1 == 1) {
                self.permissions.set(position + i);
            }
        }
        self
    }

    pub fn build(self) -> Permissions {
        self.permissions
    }
}

/// The base64 prefix identifying a claim version
///
/// Six base64 characters cover the first 36 bits, enough for the version.
pub fn version_prefix(version: i32) -> String {
    let mut encoded = STANDARD.encode(version.to_le_bytes());
    encoded.truncate(6);
    encoded
}

/// Recover the version from a six character prefix
pub fn version_from_prefix(prefix: &str) -> Option<i32> {
    use base64::engine::{GeneralPurpose, GeneralPurposeConfig};

    // The sixth character also carries bits of the fifth byte
    const LENIENT: GeneralPurpose = GeneralPurpose::new(
        &base64::alphabet::STANDARD,
        GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
    );

    let bytes = LENIENT.decode(format!("{}==", prefix)).ok()?;
    let head: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    Some(i32::from_le_bytes(head))
}
