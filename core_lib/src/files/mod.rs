pub mod blob;
pub mod manager;
pub mod models;
pub mod repository;
pub mod validation;

pub use blob::{BlobStore, LocalBlobStore};
pub use manager::{suffixed_name, FileManager, MAX_NAME_ATTEMPTS};
pub use models::{ConsistencyReport, Download, FileRecord, FileUpload, NewFileRecord, Preview, ResolvedFile};
pub use repository::{FileRepositoryTrait, MemoryFileRepository, SqliteFileRepository};
pub use validation::{
    extension_of, FileValidator, ValidationError, ALLOWED_EXTENSIONS, MAX_FILENAME_LENGTH,
};
