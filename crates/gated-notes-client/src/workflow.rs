//! Buyer and publisher sequences.
//!
//! Buying a note:
//!
//! 1. read the announcement and fetch the gated note it points at
//! 2. request an invoice from the note's gate
//! 3. pay it through the injected [`Capability`]
//! 4. poll the release endpoint for the secret
//! 5. decrypt the note locally
//! 6. publish a key note so the buyer can reopen it later
//!
//! The first failing step aborts the sequence. Nothing is published until
//! the secret has been shown to decrypt the note.

use std::time::Duration;

use gated_notes::{
    note, AnnouncementNote, CreateNoteRequest, CreateNoteResponse, Event, GatedNote, GatingError,
    Key, KeyNote, WrapScheme, KIND_GATED_NOTE,
};

use crate::capability::Capability;
use crate::error::WorkflowError;
use crate::event_log::{EventLog, Filter};
use crate::event_set::EventSet;
use crate::gate_client::{GateApi, ReleaseOutcome};

/// How a buyer stores the secret they paid for.
///
/// There is no default: the two schemes recover differently and are not
/// interchangeable.
#[derive(Debug, Clone)]
pub enum KeyWrap {
    /// Encrypt under a key only the buyer holds. Only the buyer can reopen.
    SelfStorage(Key),
    /// Encrypt with the buyer/publisher shared secret via the capability.
    Shared,
}

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub key_wrap: KeyWrap,
    /// Release checks after paying, at least one.
    pub poll_attempts: u32,
    pub poll_interval: Duration,
}

impl WorkflowConfig {
    pub fn new(key_wrap: KeyWrap) -> Self {
        Self {
            key_wrap,
            poll_attempts: 10,
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn with_polling(mut self, attempts: u32, interval: Duration) -> Self {
        self.poll_attempts = attempts;
        self.poll_interval = interval;
        self
    }
}

/// Result of a successful purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unlocked {
    pub gated: Event,
    /// The decrypted content.
    pub inner: Event,
    /// Key note published for later recovery.
    pub key_note: Event,
    pub payment_hash: String,
}

/// Runs purchases and restores for one principal.
pub struct UnlockWorkflow<C, G, L> {
    capability: C,
    gate: G,
    log: L,
    config: WorkflowConfig,
    cache: EventSet,
}

impl<C, G, L> UnlockWorkflow<C, G, L>
where
    C: Capability,
    G: GateApi,
    L: EventLog,
{
    pub fn new(capability: C, gate: G, log: L, config: WorkflowConfig) -> Self {
        Self {
            capability,
            gate,
            log,
            config,
            cache: EventSet::new(),
        }
    }

    pub fn capability(&self) -> &C {
        &self.capability
    }

    pub fn gate(&self) -> &G {
        &self.gate
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Events seen so far, merged by id.
    pub fn events(&self) -> &EventSet {
        &self.cache
    }

    async fn gated_note(&self, id: &str) -> Result<Event, WorkflowError> {
        if let Some(event) = self.cache.gated_note(id) {
            return Ok(event);
        }

        let found = self
            .log
            .fetch(&Filter::new().id(id).kind(KIND_GATED_NOTE))
            .await?;
        let event = found
            .into_iter()
            .find(|e| e.id == id)
            .ok_or_else(|| WorkflowError::MissingEvent(id.to_string()))?;
        self.cache.upsert(event.clone());
        Ok(event)
    }

    /// Buy the note an announcement points at.
    pub async fn unlock(&self, announcement: &Event) -> Result<Unlocked, WorkflowError> {
        let announcement = AnnouncementNote::parse(announcement)?;
        self.cache.upsert(announcement.event.clone());

        let gated = self.gated_note(&announcement.gate).await?;
        let parsed = GatedNote::parse(&gated)?;

        let invoice = self
            .gate
            .request_invoice(&parsed.endpoint, parsed.id())
            .await?;
        if invoice.note_id != parsed.id() {
            return Err(WorkflowError::WrongNote {
                expected: parsed.id().to_string(),
                got: invoice.note_id,
            });
        }
        tracing::info!(
            note_id = %parsed.id(),
            payment_hash = %invoice.payment_hash,
            cost = parsed.cost,
            "paying for gated note"
        );

        self.capability.pay(&invoice.invoice).await?;

        let released = self
            .await_release(&parsed.endpoint, parsed.id(), &invoice.payment_hash)
            .await?;
        if released.note_id != parsed.id() {
            return Err(WorkflowError::WrongNote {
                expected: parsed.id().to_string(),
                got: released.note_id,
            });
        }

        let inner = note::unlock_gated_note(&gated, &released.secret)?;

        let key_note = match &self.config.key_wrap {
            KeyWrap::SelfStorage(key) => {
                note::create_key_note(&self.capability, key, &released.secret, &gated.id)?
            }
            KeyWrap::Shared => {
                let wrapped = self
                    .capability
                    .encrypt_shared(&gated.pubkey, &released.secret)?;
                note::create_shared_key_note(&self.capability, &wrapped, &gated.id)?
            }
        };
        self.log.publish(&key_note).await?;
        self.cache.upsert(key_note.clone());

        tracing::info!(note_id = %gated.id, key_note = %key_note.id, "unlocked gated note");
        Ok(Unlocked {
            gated,
            inner,
            key_note,
            payment_hash: invoice.payment_hash,
        })
    }

    async fn await_release(
        &self,
        endpoint: &str,
        note_id: &str,
        payment_hash: &str,
    ) -> Result<gated_notes::NoteEntry, WorkflowError> {
        let attempts = self.config.poll_attempts.max(1);
        for attempt in 1..=attempts {
            match self.gate.fetch_release(endpoint, note_id, payment_hash).await? {
                ReleaseOutcome::Released(entry) => return Ok(entry),
                ReleaseOutcome::Pending(_) => {
                    tracing::debug!(payment_hash = %payment_hash, attempt, "payment pending");
                    if attempt < attempts {
                        tokio::time::sleep(self.config.poll_interval).await;
                    }
                }
            }
        }
        Err(WorkflowError::Pending {
            payment_hash: payment_hash.to_string(),
            attempts,
        })
    }

    /// Reopen a note from a key note this principal published earlier.
    pub async fn restore(&self, key_note: &Event) -> Result<Event, WorkflowError> {
        let parsed = KeyNote::parse(key_note)?;
        let gated = self.gated_note(&parsed.gate).await?;

        match (parsed.scheme, &self.config.key_wrap) {
            (Some(WrapScheme::Shared), _) => {
                let secret = self
                    .capability
                    .decrypt_shared(&gated.pubkey, &key_note.content)?;
                Ok(note::unlock_gated_note(&gated, &secret)?)
            }
            (_, KeyWrap::SelfStorage(key)) => {
                Ok(note::unlock_gated_note_from_key_note(key, key_note, &gated)?)
            }
            (_, KeyWrap::Shared) => Err(GatingError::Validation(format!(
                "key note {} is self-wrapped but no self-storage key is configured",
                key_note.id
            ))
            .into()),
        }
    }
}

/// What a publisher wants to sell.
#[derive(Debug, Clone)]
pub struct Draft {
    /// Gate base URL the note will name.
    pub endpoint: String,
    pub lud16: String,
    pub secret: String,
    /// Price in millisatoshis.
    pub cost: u64,
    /// Public text for the announcement.
    pub teaser: String,
    /// The event being sold.
    pub inner: Event,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub gated: Event,
    pub announcement: Event,
    pub registration: CreateNoteResponse,
}

/// Seal, register and announce a note.
///
/// The gate validates and stores the note first; nothing reaches the event
/// log unless it accepted.
pub async fn publish_gated_note<C, G, L>(
    capability: &C,
    gate: &G,
    log: &L,
    draft: &Draft,
) -> Result<Published, WorkflowError>
where
    C: Capability,
    G: GateApi,
    L: EventLog,
{
    let cost = i64::try_from(draft.cost)
        .map_err(|_| GatingError::Validation(format!("cost {} is out of range", draft.cost)))?;
    let gated = note::create_gated_note(
        capability,
        &draft.secret,
        draft.cost,
        &draft.endpoint,
        &draft.inner,
    )?;

    let registration = gate
        .publish(
            &draft.endpoint,
            &CreateNoteRequest {
                gated_event: gated.clone(),
                lud16: draft.lud16.clone(),
                secret: draft.secret.clone(),
                cost,
            },
        )
        .await?;

    let announcement = note::create_announcement_note(capability, &draft.teaser, &gated.id)?;
    log.publish(&gated).await?;
    log.publish(&announcement).await?;

    tracing::info!(
        note_id = %gated.id,
        announcement = %announcement.id,
        price = registration.price,
        "published gated note"
    );
    Ok(Published {
        gated,
        announcement,
        registration,
    })
}
