pub mod collaborators;
pub mod config;
pub mod controller;
pub mod creators;
pub mod error;
pub mod file_set;
pub mod layout;
pub mod metadata;
pub mod metadata_file;
pub mod overwrite;
pub mod sensorinfo;
pub mod spreadsheet;
pub mod steps;
pub mod visual_qc;

pub use controller::SveaController;
pub use error::{Result, SveaError};
pub use file_set::{FileCategory, FileSet, FileSource, RelocationReport};
pub use layout::{LayoutDir, WorkingDirectoryLayout};
pub use overwrite::OverwritePolicy;
