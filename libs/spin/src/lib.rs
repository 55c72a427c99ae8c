// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The per-task spinlock used to guard [`depgraph`](../depgraph/index.html)'s
//! access structures.
//!
//! Trimmed down from the teacher's original `spin` crate to just the
//! primitive the dependency engine actually needs: a spinning mutex. The
//! other lock flavors (`RwLock`, `Once`, reentrant mutexes, ...) are not
//! used anywhere in this workspace and were dropped rather than carried
//! along unused.

#![cfg_attr(not(test), no_std)]

mod backoff;
mod loom;
mod mutex;

pub use backoff::Backoff;
pub use mutex::{Mutex, MutexGuard};
