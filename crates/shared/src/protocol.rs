use serde::{Deserialize, Serialize};

use crate::domain::ImageKind;

pub const PROCESS_ROUTE: &str = "/process";
pub const IMAGE_FIELD: &str = "image";
pub const SATURATION_FIELD: &str = "saturation";

const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Query string of `POST /process`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
}

/// Successful analysis result. Image fields are base64 PNG without a data-URI prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub average_length: f64,
    pub grain_count: u64,
    pub binary_image: String,
    pub contours_image: String,
    pub ellipses_image: String,
    pub histogram_image: String,
}

impl ProcessResponse {
    pub fn image_b64(&self, kind: ImageKind) -> &str {
        match kind {
            ImageKind::Binary => &self.binary_image,
            ImageKind::Contours => &self.contours_image,
            ImageKind::Ellipses => &self.ellipses_image,
            ImageKind::Histogram => &self.histogram_image,
        }
    }
}

pub fn png_data_uri(b64: &str) -> String {
    format!("{PNG_DATA_URI_PREFIX}{b64}")
}

/// Returns the base64 payload of a PNG data URI.
pub fn strip_png_data_uri(src: &str) -> Option<&str> {
    src.strip_prefix(PNG_DATA_URI_PREFIX)
}
