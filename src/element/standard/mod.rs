//! Standard element implementations: splitting, normalizing, saving, and
//! named import slots.

pub mod import;
pub mod normalizing;
pub mod saving;
pub mod splitting;

pub use import::ImportElement;
pub use normalizing::NormalizingElement;
pub use saving::SavingElement;
pub use splitting::SplittingElement;
