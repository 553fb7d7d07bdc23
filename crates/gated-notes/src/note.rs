//! Building and reading the three gated-content event shapes.

use crate::codec::{self, Key};
use crate::constants::*;
use crate::error::GatingError;
use crate::event::{Event, Tag, UnsignedEvent};
use crate::signer::Signer;

/// Parsed view of a gated note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatedNote {
    pub event: Event,
    pub iv: String,
    /// Price in millisatoshis, always positive.
    pub cost: u64,
    pub endpoint: String,
}

impl GatedNote {
    /// Read the `iv`, `cost` and `endpoint` tags. All three are required.
    pub fn parse(event: &Event) -> Result<Self, GatingError> {
        let iv = required_tag(event, TAG_IV)?;
        let cost = parse_cost(required_tag(event, TAG_COST)?)?;
        let endpoint = required_tag(event, TAG_ENDPOINT)?;

        Ok(Self {
            event: event.clone(),
            iv: iv.to_string(),
            cost,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.event.id
    }

    /// Gate URL that issues invoices for this note.
    pub fn invoice_url(&self) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), self.event.id)
    }
}

/// How the secret inside a key note is wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapScheme {
    /// Encrypted under a key derived from the holder's own credential.
    SelfStorage,
    /// Encrypted with the shared secret between buyer and publisher keys.
    Shared,
}

impl WrapScheme {
    pub fn as_tag(self) -> &'static str {
        match self {
            WrapScheme::SelfStorage => WRAP_SELF,
            WrapScheme::Shared => WRAP_SHARED,
        }
    }

    pub fn from_tag(value: &str) -> Option<Self> {
        match value {
            WRAP_SELF => Some(WrapScheme::SelfStorage),
            WRAP_SHARED => Some(WrapScheme::Shared),
            _ => None,
        }
    }
}

/// Parsed view of a key note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNote {
    pub event: Event,
    /// Id of the gated note this key opens.
    pub gate: String,
    /// Present for self-storage wrapping, absent for shared wrapping.
    pub iv: Option<String>,
    /// `None` when the note predates the `wrap` tag.
    pub scheme: Option<WrapScheme>,
}

impl KeyNote {
    pub fn parse(event: &Event) -> Result<Self, GatingError> {
        let gate = event
            .tag_value(TAG_GATE)
            .or_else(|| event.tag_value(TAG_GATE_LEGACY))
            .filter(|g| !g.is_empty())
            .ok_or_else(|| {
                GatingError::MalformedEvent(format!("missing '{TAG_GATE}' tag in {}", event.id))
            })?;

        let scheme = match event.tag_value(TAG_WRAP) {
            Some(value) => Some(WrapScheme::from_tag(value).ok_or_else(|| {
                GatingError::MalformedEvent(format!("unknown wrap scheme '{value}'"))
            })?),
            None => None,
        };

        Ok(Self {
            event: event.clone(),
            gate: gate.to_string(),
            iv: event.tag_value(TAG_IV).map(String::from),
            scheme,
        })
    }
}

/// Parsed view of an announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementNote {
    pub event: Event,
    pub gate: String,
}

impl AnnouncementNote {
    pub fn parse(event: &Event) -> Result<Self, GatingError> {
        let gate = required_tag(event, TAG_GATE)?;
        Ok(Self {
            event: event.clone(),
            gate: gate.to_string(),
        })
    }

    pub fn teaser(&self) -> &str {
        &self.event.content
    }
}

/// Encrypt `inner` under `secret` and sign the resulting gated note.
pub fn create_gated_note(
    signer: &impl Signer,
    secret: &str,
    cost: u64,
    endpoint: &str,
    inner: &Event,
) -> Result<Event, GatingError> {
    if secret.is_empty() {
        return Err(GatingError::Validation("secret needs to exist".into()));
    }
    if cost == 0 {
        return Err(GatingError::Validation("cost needs to be at least 1 msat".into()));
    }

    let payload = serde_json::to_string(inner)?;
    let sealed = codec::encrypt(&payload, &codec::derive_key(secret));

    signer.sign(UnsignedEvent::new(
        signer.public_key(),
        KIND_GATED_NOTE,
        vec![
            Tag::new(TAG_IV, sealed.iv),
            Tag::new(TAG_COST, cost.to_string()),
            Tag::new(TAG_ENDPOINT, endpoint),
        ],
        sealed.content,
    ))
}

/// Decrypt a gated note with its secret and return the inner event.
pub fn unlock_gated_note(gated: &Event, secret: &str) -> Result<Event, GatingError> {
    let iv = gated.tag_value(TAG_IV).ok_or_else(|| {
        GatingError::MalformedEvent(format!("iv not found in gated note {}", gated.id))
    })?;

    let plaintext = codec::decrypt(iv, &gated.content, &codec::derive_key(secret))?;

    let inner: Event = serde_json::from_str(&plaintext)
        .map_err(|_| GatingError::Decryption("plaintext is not an event".into()))?;
    if !inner.is_well_formed() {
        return Err(GatingError::Decryption(
            "plaintext is not a well-formed event".into(),
        ));
    }

    Ok(inner)
}

/// Wrap `secret` under `wrapping_key` in a self-storage key note.
pub fn create_key_note(
    signer: &impl Signer,
    wrapping_key: &Key,
    secret: &str,
    gated_note_id: &str,
) -> Result<Event, GatingError> {
    let sealed = codec::encrypt(secret, wrapping_key);

    signer.sign(UnsignedEvent::new(
        signer.public_key(),
        KIND_KEY_NOTE,
        vec![
            Tag::new(TAG_IV, sealed.iv),
            Tag::new(TAG_GATE, gated_note_id),
            Tag::new(TAG_WRAP, WRAP_SELF),
        ],
        sealed.content,
    ))
}

/// Key note whose content was already wrapped with a buyer/publisher
/// shared secret by the signer's wallet.
pub fn create_shared_key_note(
    signer: &impl Signer,
    wrapped_secret: &str,
    gated_note_id: &str,
) -> Result<Event, GatingError> {
    if wrapped_secret.is_empty() {
        return Err(GatingError::Validation("wrapped secret is empty".into()));
    }

    signer.sign(UnsignedEvent::new(
        signer.public_key(),
        KIND_KEY_NOTE,
        vec![
            Tag::new(TAG_GATE, gated_note_id),
            Tag::new(TAG_WRAP, WRAP_SHARED),
        ],
        wrapped_secret,
    ))
}

/// Recover the secret from a self-storage key note.
pub fn unwrap_secret(wrapping_key: &Key, key_note: &Event) -> Result<String, GatingError> {
    let parsed = KeyNote::parse(key_note)?;
    if parsed.scheme == Some(WrapScheme::Shared) {
        return Err(GatingError::Validation(format!(
            "key note {} uses shared wrapping",
            key_note.id
        )));
    }

    let iv = parsed.iv.as_deref().ok_or_else(|| {
        GatingError::MalformedEvent(format!("iv not found in key note {}", key_note.id))
    })?;

    codec::decrypt(iv, &key_note.content, wrapping_key)
}

/// Recover the secret from `key_note` and unlock `gated` with it.
///
/// The key note must reference `gated` by id.
pub fn unlock_gated_note_from_key_note(
    wrapping_key: &Key,
    key_note: &Event,
    gated: &Event,
) -> Result<Event, GatingError> {
    let parsed = KeyNote::parse(key_note)?;
    if parsed.gate != gated.id {
        return Err(GatingError::Validation(format!(
            "key note references {}, not {}",
            parsed.gate, gated.id
        )));
    }

    let secret = unwrap_secret(wrapping_key, key_note)?;
    unlock_gated_note(gated, &secret)
}

/// Sign a public teaser pointing at a gated note.
pub fn create_announcement_note(
    signer: &impl Signer,
    teaser: &str,
    gated_note_id: &str,
) -> Result<Event, GatingError> {
    signer.sign(UnsignedEvent::new(
        signer.public_key(),
        KIND_ANNOUNCEMENT,
        vec![Tag::new(TAG_GATE, gated_note_id)],
        teaser,
    ))
}

/// Structural checks a gate runs before accepting a publication.
///
/// Returns the decrypted inner event, which proves the publisher sealed the
/// note with the secret they declared. Payee address checks are left to
/// the caller since they need network access.
pub fn check_publication(
    candidate: &Event,
    secret: &str,
    cost: i64,
    expected_endpoint: &str,
) -> Result<Event, GatingError> {
    if secret.is_empty() {
        return Err(GatingError::Validation("secret needs to exist".into()));
    }
    if cost <= 0 {
        return Err(GatingError::Validation("cost needs to be at least 1 msat".into()));
    }

    if candidate.kind != KIND_GATED_NOTE {
        return Err(GatingError::Validation(format!(
            "expected kind {KIND_GATED_NOTE}, got {}",
            candidate.kind
        )));
    }
    if !candidate.is_well_formed() || candidate.content.is_empty() {
        return Err(GatingError::Validation(format!(
            "gated note {} is missing id, pubkey, created_at or content",
            candidate.id
        )));
    }

    for tag in [TAG_IV, TAG_COST, TAG_ENDPOINT] {
        if !candidate.has_tag(tag) {
            return Err(GatingError::Validation(format!("missing '{tag}' tag")));
        }
    }

    let gated = GatedNote::parse(candidate).map_err(|e| GatingError::Validation(e.to_string()))?;
    if gated.endpoint != expected_endpoint {
        return Err(GatingError::Validation(format!(
            "expected endpoint {expected_endpoint}, got {}",
            gated.endpoint
        )));
    }
    if i64::try_from(gated.cost).ok() != Some(cost) {
        return Err(GatingError::Validation(format!(
            "declared cost {cost} does not match cost tag {}",
            gated.cost
        )));
    }

    unlock_gated_note(candidate, secret).map_err(|e| match e {
        GatingError::Decryption(reason) => GatingError::Validation(format!(
            "secret does not decrypt the note: {reason}"
        )),
        other => other,
    })
}

fn required_tag<'a>(event: &'a Event, name: &str) -> Result<&'a str, GatingError> {
    event
        .tag_value(name)
        .ok_or_else(|| GatingError::MalformedEvent(format!("missing '{name}' tag in {}", event.id)))
}

fn parse_cost(value: &str) -> Result<u64, GatingError> {
    match value.parse::<u64>() {
        Ok(cost) if cost > 0 => Ok(cost),
        _ => Err(GatingError::MalformedEvent(format!(
            "cost '{value}' is not a positive integer"
        ))),
    }
}
