// Infrastructure adapters: CSV input and output ports

pub mod csv_source;
pub mod memory_output_adapter;
pub mod sqlite_output_adapter;

pub use csv_source::{load_csv, load_csv_from_reader};
pub use memory_output_adapter::InMemoryOutputAdapter;
pub use sqlite_output_adapter::SqliteOutputAdapter;
