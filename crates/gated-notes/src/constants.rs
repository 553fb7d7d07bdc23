/// Version of the gating protocol implemented by this crate.
///
/// Version 1 fixes the tag vocabulary below, hex encoding for `iv` and
/// ciphertext, SHA-256 key derivation and AES-256-CBC with PKCS#7 padding.
pub const PROTOCOL_VERSION: u32 = 1;

/// Plain text note. Announcements use this kind with a `g` tag.
pub const KIND_ANNOUNCEMENT: u32 = 1;

/// Gated (encrypted) note.
pub const KIND_GATED_NOTE: u32 = 42;

/// Key note carrying a wrapped gating secret.
pub const KIND_KEY_NOTE: u32 = 43;

/// Hex-encoded initialization vector.
pub const TAG_IV: &str = "iv";

/// Decimal price in millisatoshis.
pub const TAG_COST: &str = "cost";

/// Base URL of the gate that can unlock the note.
pub const TAG_ENDPOINT: &str = "endpoint";

/// Id of the referenced gated note.
pub const TAG_GATE: &str = "g";

/// Gate reference used by the first key note draft. Read, never written.
pub const TAG_GATE_LEGACY: &str = "gate";

/// Key wrapping scheme of a key note.
pub const TAG_WRAP: &str = "wrap";

/// `wrap` value: secret encrypted under a key derived from the holder's own credential.
pub const WRAP_SELF: &str = "self-v1";

/// `wrap` value: secret encrypted with a buyer/publisher shared secret.
pub const WRAP_SHARED: &str = "shared-v1";
