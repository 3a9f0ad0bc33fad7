//! Data module - CSV loading, cleaning and normalization

pub mod cleaner;
pub mod loader;
pub mod record;
pub mod vocabulary;

pub use cleaner::{CleanOutput, Cleaner, DataQualityWarning, Rejection};
pub use loader::{DataLoader, LoaderError};
pub use record::Record;
pub use vocabulary::{VocabularyError, VocabularySet};
