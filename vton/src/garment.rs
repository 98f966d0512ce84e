use std::path::PathBuf;
use std::str::FromStr;

/// Part of the body a garment is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyRegion {
    #[default]
    UpperBody,
    LowerBody,
    Dresses,
}

impl BodyRegion {
    pub fn as_str(self) -> &'static str {
        match self {
            BodyRegion::UpperBody => "upper_body",
            BodyRegion::LowerBody => "lower_body",
            BodyRegion::Dresses => "dresses",
        }
    }

    /// Short label used in artifact names.
    pub fn label(self) -> &'static str {
        match self {
            BodyRegion::UpperBody => "shirt",
            BodyRegion::LowerBody => "pants",
            BodyRegion::Dresses => "dress",
        }
    }
}

impl std::fmt::Display for BodyRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BodyRegion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "upper_body" | "upper" => Ok(BodyRegion::UpperBody),
            "lower_body" | "lower" => Ok(BodyRegion::LowerBody),
            "dresses" | "dress" => Ok(BodyRegion::Dresses),
            other => Err(format!(
                "unknown body region `{other}` (expected upper_body, lower_body or dresses)"
            )),
        }
    }
}

/// A garment chosen for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct GarmentSelection {
    pub path: PathBuf,
    pub description: String,
    pub region: BodyRegion,
}

impl GarmentSelection {
    pub fn new(path: impl Into<PathBuf>, description: impl Into<String>, region: BodyRegion) -> Self {
        Self {
            path: path.into(),
            description: description.into(),
            region,
        }
    }
}
