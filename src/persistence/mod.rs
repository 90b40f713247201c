pub mod gateway;
pub mod json_dir;
pub mod writer;

pub use gateway::{PersistenceGateway, SharedGateway};
pub use json_dir::JsonDirectoryGateway;
pub use writer::PersistenceWriter;
