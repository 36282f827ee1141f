pub mod error;
pub mod models;
pub mod normalizer;
pub mod output;
pub mod parsers;
pub mod pipeline;
pub mod settings;

pub use models::{Axis, CoordinateRecord, CoordinateValue, Failure, FailureReason, RecordId};
pub use normalizer::{normalize, Normalized};
