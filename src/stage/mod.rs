mod key;
mod stager;
mod store;

pub use key::cache_key;
pub use stager::{MediaStager, StagedMedia};
pub use store::{FsStore, MediaStore, MemoryStore, StagingWriter};
