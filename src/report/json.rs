//! JSON report renderer

use crate::engine::ScanMap;
use crate::{PlagiError, PlagiResult};

/// Render a result map as pretty-printed JSON, keys in sorted order.
pub fn render(results: &ScanMap) -> PlagiResult<String> {
    serde_json::to_string_pretty(results).map_err(PlagiError::Serde)
}
