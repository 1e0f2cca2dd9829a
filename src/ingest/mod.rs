/// Source ingestion.
///
/// Submodules:
/// - `sources` decodes one row's band fields into a typed per-source reading.
/// - `reader` resolves regions and dates, de-duplicates and counts rejections.

pub mod reader;
pub mod sources;
