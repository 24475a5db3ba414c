// orderflow/src/sync/mod.rs

//! Order mirroring: the ledger row codec, the ledger itself and the outbox
//! relay that feeds it.

pub mod event;
pub mod mirror;
pub mod outbox;
pub mod row;

pub use event::{SyncEvent, SyncEventKind};
pub use mirror::{latest_by_id, MemoryMirror, OrderMirror, SheetsMirror};
pub use outbox::{DrainReport, OutboxRelay, RetryPolicy};
pub use row::{MirrorItem, MirrorRow};
