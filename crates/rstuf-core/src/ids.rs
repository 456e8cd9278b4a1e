//! Task id generation.

use std::fmt::Debug;

use uuid::Uuid;

use crate::types::TaskId;

/// Source of fresh task ids.
pub trait IdGenerator: Debug + Send + Sync + 'static {
    fn next_id(&self) -> TaskId;
}

/// Random UUID v4 ids in simple (hyphen-less) form.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> TaskId {
        Uuid::new_v4().simple().to_string()
    }
}
