use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::UnknownAlgorithm;

/// Element identifiers of the upload page. Shells key their widgets by these.
pub mod ids {
    pub const SATURATION_CONTROLS: &str = "saturation-controls";
    pub const SATURATION_SLIDER: &str = "saturation-slider";
    pub const SATURATION_VALUE: &str = "saturation-value";
    pub const FILE_INPUT: &str = "image";
    pub const UPLOAD_FORM: &str = "upload-form";
    pub const MODAL: &str = "modal";
    pub const MODAL_IMAGE: &str = "modal-image";
    pub const LOADER_MODAL: &str = "loader-modal";
}

/// Analysis pipeline run by the processing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    ColorAlg,
    ContourAlg,
}

impl Algorithm {
    pub const ALL: [Algorithm; 2] = [Algorithm::ColorAlg, Algorithm::ContourAlg];

    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::ColorAlg => "coloralg",
            Algorithm::ContourAlg => "contouralg",
        }
    }

    /// Id of the panel results for this algorithm are rendered into.
    pub fn results_panel_id(self) -> &'static str {
        match self {
            Algorithm::ColorAlg => "results-coloralg",
            Algorithm::ContourAlg => "results-contouralg",
        }
    }

    /// Only the color pipeline takes a saturation factor.
    pub fn uses_saturation(self) -> bool {
        matches!(self, Algorithm::ColorAlg)
    }

    /// The form tab that selects this algorithm.
    pub fn tab(self) -> AlgorithmTab {
        match self {
            Algorithm::ColorAlg => AlgorithmTab::ColorAlg,
            Algorithm::ContourAlg => AlgorithmTab::ContourAlg,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = UnknownAlgorithm;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "coloralg" => Ok(Algorithm::ColorAlg),
            "contouralg" => Ok(Algorithm::ContourAlg),
            other => Err(UnknownAlgorithm(other.to_string())),
        }
    }
}

/// A tab of the upload form. Each tab names the content panel it activates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlgorithmTab {
    #[serde(rename = "coloralg-tab")]
    ColorAlg,
    #[serde(rename = "contouralg-tab")]
    ContourAlg,
}

impl AlgorithmTab {
    pub const ALL: [AlgorithmTab; 2] = [AlgorithmTab::ColorAlg, AlgorithmTab::ContourAlg];

    /// Id of the content panel this tab targets.
    pub fn target(self) -> &'static str {
        match self {
            AlgorithmTab::ColorAlg => "coloralg-tab",
            AlgorithmTab::ContourAlg => "contouralg-tab",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AlgorithmTab::ColorAlg => "Color Algorithm",
            AlgorithmTab::ContourAlg => "Contour Algorithm",
        }
    }

    pub fn algorithm(self) -> Algorithm {
        match self {
            AlgorithmTab::ColorAlg => Algorithm::ColorAlg,
            AlgorithmTab::ContourAlg => Algorithm::ContourAlg,
        }
    }

    pub fn from_target(target: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tab| tab.target() == target)
    }
}

/// The four images returned for every analysis, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Binary,
    Contours,
    Ellipses,
    Histogram,
}

impl ImageKind {
    pub const ORDER: [ImageKind; 4] = [
        ImageKind::Binary,
        ImageKind::Contours,
        ImageKind::Ellipses,
        ImageKind::Histogram,
    ];

    /// Name of the JSON field carrying this image.
    pub fn field_name(self) -> &'static str {
        match self {
            ImageKind::Binary => "binary_image",
            ImageKind::Contours => "contours_image",
            ImageKind::Ellipses => "ellipses_image",
            ImageKind::Histogram => "histogram_image",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ImageKind::Binary => "Binary",
            ImageKind::Contours => "Contours",
            ImageKind::Ellipses => "Ellipses",
            ImageKind::Histogram => "Histogram",
        }
    }
}
