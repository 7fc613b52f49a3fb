mod atomic;
mod ome;
mod table;

pub use atomic::copy_atomic;
pub use atomic::write_atomic;
pub use atomic::write_bytes_atomic;

pub use ome::OmeMetadata;

pub use table::write_table_csv;
