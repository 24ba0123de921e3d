// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

//! Cross-process locking and safe read-modify-write of DNS record sub-elements
//!
//! A DNS record holds answers and regions, but the record store can only read
//! and replace whole records. Two processes adding an answer to the same record
//! at the same time would each write back their own copy and one answer would
//! be lost. This crate serializes such changes with a lock that lives in the
//! record store itself: a token record whose existence means "a change to this
//! record is in flight".
//!
//! - [RecordMutex] creates and deletes tokens and lets several holders in one
//!   process share a token without deadlocking on it.
//! - [Reconciler] applies one create, update or delete of an answer or region
//!   under that lock, always against a freshly fetched record.
//!
//! The store must reject creating a token that already exists; see
//! [Provider::exclusive_create]. Tokens have no expiry: a process that dies
//! while holding one blocks the record until [RecordMutex::force_unlock] is
//! called.
//!
//! # Examples
//!
//! ## Reconciling an answer
//! ```rust,no_run
//! use record_lock::{AnswerFields, AnswerReconciler, MemoryProvider, Meta, Operation, RecordMutex};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     // or `Ns1Provider::from_env()` with the `ns1` feature
//!     let provider = MemoryProvider::default();
//!     let mutex = Arc::new(RecordMutex::new());
//!
//!     let answers = AnswerReconciler::builder()
//!         .provider(provider)
//!         .mutex(mutex)
//!         .build();
//!
//!     let fields = AnswerFields::builder()
//!         .answer("1.2.3.4")
//!         .region("east")
//!         .meta(Meta::from_iter([("up", "true")]))
//!         .build();
//!
//!     let observed = answers
//!         .apply("a.example.com", Operation::Create(fields))
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Locking a record directly
//! ```rust,no_run
//! use record_lock::{MemoryProvider, RecordMutex};
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider = MemoryProvider::default();
//!     let mutex = RecordMutex::new();
//!
//!     let result = mutex
//!         .with(&provider, "a.example.com", "example.com", async |_holder| {
//!             // do synchronized work!
//!             Ok(())
//!         })
//!         .await;
//! }
//! ```

pub mod error;
pub mod identity;
pub mod meta;
pub mod model;
pub mod mutex;
pub mod providers;
pub mod reconcile;

pub use error::{RecordLockError, Result, ValidationErrors};
pub use identity::HolderId;
pub use meta::Meta;
pub use model::{Answer, Record, Region, RegionEntry};
pub use mutex::RecordMutex;
#[cfg(feature = "memory")]
pub use providers::memory::MemoryProvider;
#[cfg(feature = "ns1")]
pub use providers::ns1::Ns1Provider;
pub use providers::Provider;
pub use reconcile::{
    ImportSeed, Observed, Operation, Reconciler, SubElementKind,
    answer::{AnswerFields, AnswerReconciler, Answers},
    find_record,
    region::{RegionFields, RegionReconciler, Regions},
};
