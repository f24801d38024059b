pub mod rows;
pub mod csv_writer;
pub mod xlsx_writer;
pub mod raw_serializer;

pub use rows::{entity_column, shots_column, ExportHeader, ExportRow, ExportTable, RowGenerator};
pub use csv_writer::{save_csv, to_csv};
pub use xlsx_writer::{save_xlsx, to_xlsx, xlsx_base64};
pub use raw_serializer::serialize_script;
