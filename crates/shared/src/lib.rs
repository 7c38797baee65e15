pub mod domain;
pub mod error;
pub mod protocol;
pub mod sequence;

pub use domain::{
    Category, Entity, EntityId, SelectOption, SequenceEntry, SequenceItem, SequenceRecord,
    UNKNOWN_LABEL,
};
pub use sequence::Sequence;

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod protocol_tests;
