//! Buyer and publisher side of Lightning-gated notes.
//!
//! A buyer follows announcements, pays the gate named by the gated note and
//! keeps a key note so the content can be reopened without paying again.
//! A publisher seals content, registers it with a gate and announces it.
//!
//! All outside effects go through injected seams:
//!
//! - [`Capability`]: signing, paying and peer encryption
//! - [`GateApi`]: the gate's HTTP contract ([`HttpGateClient`])
//! - [`EventLog`]: publish/subscribe ([`MemoryEventLog`] for tests)
//!
//! # Quick example
//!
//! ```no_run
//! use gated_notes_client::{
//!     HttpGateClient, KeyWrap, MemoryEventLog, UnlockWorkflow, WorkflowConfig,
//! };
//! # async fn demo(wallet: impl gated_notes_client::Capability, announcement: gated_notes::Event)
//! #     -> Result<(), gated_notes_client::WorkflowError> {
//! let key = gated_notes::derive_key("my credential");
//! let config = WorkflowConfig::new(KeyWrap::SelfStorage(key));
//! let gate = HttpGateClient::new()?;
//! let workflow = UnlockWorkflow::new(wallet, gate, MemoryEventLog::new(), config);
//!
//! let unlocked = workflow.unlock(&announcement).await?;
//! println!("{}", unlocked.inner.content);
//! # Ok(())
//! # }
//! ```

pub mod capability;
pub mod error;
pub mod event_log;
pub mod event_set;
pub mod gate_client;
pub mod workflow;

pub use capability::{Capability, CapabilityError};
pub use error::WorkflowError;
pub use event_log::{EventLog, Filter, MemoryEventLog, Subscription};
pub use event_set::EventSet;
pub use gate_client::{GateApi, HttpGateClient, ReleaseOutcome};
pub use workflow::{
    publish_gated_note, Draft, KeyWrap, Published, UnlockWorkflow, Unlocked, WorkflowConfig,
};
