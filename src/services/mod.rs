// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - external providers behind trait seams.

pub mod identity;
pub mod storage;

pub use identity::{AuthError, IdentityProvider, MemoryIdentity, SupabaseAuth};
pub use storage::{
    Bucket, MemoryObjectStore, ObjectStore, StorageError, StorageService, StoredObject,
    SupabaseStorage,
};
