//! Port contracts for dispatch persistence.

mod store;

pub use store::{
    DispatchStore, DispatchStoreError, DispatchStoreResult, HeartbeatRecord, TransitionOutcome,
};
