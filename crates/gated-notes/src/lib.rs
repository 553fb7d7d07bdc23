//! Lightning-gated notes.
//!
//! Locks arbitrary content behind a Lightning micropayment and publishes the
//! locked content, its unlock key and a public teaser as signed events.
//!
//! # Three event shapes
//!
//! - **Gated note** (kind 42): body is the AES-256-CBC ciphertext of a JSON
//!   serialized inner event, tagged with `iv`, `cost` and `endpoint`
//! - **Key note** (kind 43): a wrapped copy of the gating secret, tagged
//!   with `g` pointing at the gated note
//! - **Announcement note** (kind 1): plain teaser text, tagged with `g`
//!
//! # Quick example
//!
//! ```no_run
//! use gated_notes::{note, Signer};
//! # fn demo(
//! #     signer: &impl Signer,
//! #     inner: &gated_notes::Event,
//! # ) -> Result<(), gated_notes::GatingError> {
//! let gated = note::create_gated_note(signer, "s3cret", 5000, "https://gate.example.com", inner)?;
//! let unlocked = note::unlock_gated_note(&gated, "s3cret")?;
//! assert_eq!(unlocked.id, inner.id);
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod constants;
pub mod error;
pub mod event;
pub mod lud16;
pub mod note;
pub mod signer;
pub mod wire;

pub use codec::{derive_key, Ciphertext, Key};
pub use constants::*;
pub use error::GatingError;
pub use event::{Event, Tag, UnsignedEvent};
pub use lud16::Lud16;
pub use note::{AnnouncementNote, GatedNote, KeyNote, WrapScheme};
pub use signer::Signer;
pub use wire::*;
