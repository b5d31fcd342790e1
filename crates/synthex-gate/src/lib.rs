//! # synthex-gate
//!
//! **Collaborator seams for the Synthex engine.**
//!
//! Everything the engine does not own sits behind a `Send + Sync` trait
//! here, with an in-memory implementation for tests and embedding:
//!
//! | Concern | Trait | In-memory |
//! |---|---|---|
//! | Balances | [`SynthLedger`] | [`InMemoryLedger`] |
//! | Prices | [`RateOracle`] | [`InMemoryOracle`] |
//! | Suspension flags | [`SuspensionRegistry`] | [`InMemorySuspensionRegistry`] |
//! | Delegated exchange rights | [`DelegationRegistry`] | [`InMemoryDelegations`] |
//! | Tunables | [`SystemSettings`] | [`InMemorySettings`] |
//! | Fees | [`FeeSink`] | [`InMemoryFeePool`] |
//! | Events | [`EventSink`] | [`RecordingEventSink`], [`TracingEventSink`] |
//! | Time | [`Clock`] | [`ManualClock`], [`SystemClock`] |
//!
//! On top of those sit the pure precondition checks:
//! [`AuthorizationGate`], [`SuspensionGuard`] and [`RateOracleClient`].

pub mod authorization;
pub mod clock;
pub mod collaborators;
pub mod events;
pub mod fee_sink;
pub mod ledger;
pub mod oracle;
pub mod settings;
pub mod suspension;

pub use authorization::{AuthorizationGate, DelegationRegistry, InMemoryDelegations};
pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborators::{Collaborators, InMemoryCollaborators};
pub use events::{EventSink, RecordingEventSink, TracingEventSink};
pub use fee_sink::{FeeSink, InMemoryFeePool};
pub use ledger::{InMemoryLedger, SynthLedger};
pub use oracle::{InMemoryOracle, OracleRound, RateOracle, RateOracleClient};
pub use settings::{InMemorySettings, SystemSettings};
pub use suspension::{InMemorySuspensionRegistry, SuspensionGuard, SuspensionRegistry};
