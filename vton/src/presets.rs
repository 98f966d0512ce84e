use std::path::{Path, PathBuf};

use crate::garment::{BodyRegion, GarmentSelection};

/// A ready-made single-garment run, paths relative to the catalog root.
#[derive(Debug, Clone, Copy)]
pub struct Preset {
    pub person: &'static str,
    pub garment: &'static str,
    pub description: &'static str,
    pub region: BodyRegion,
}

impl Preset {
    pub fn resolve(&self, root: &Path) -> (PathBuf, GarmentSelection) {
        (
            root.join(self.person),
            GarmentSelection::new(root.join(self.garment), self.description, self.region),
        )
    }

    /// `person + garment` by file stem.
    pub fn title(&self) -> String {
        format!("{} + {}", stem(self.person), stem(self.garment))
    }
}

/// A ready-made shirt and pants combination.
#[derive(Debug, Clone, Copy)]
pub struct OutfitPreset {
    pub person: &'static str,
    pub shirt: &'static str,
    pub pants: &'static str,
    pub description: &'static str,
}

impl OutfitPreset {
    /// Pants first, then the shirt on top of the pants result.
    pub fn resolve(&self, root: &Path) -> (PathBuf, Vec<GarmentSelection>) {
        (
            root.join(self.person),
            vec![
                GarmentSelection::new(root.join(self.pants), self.description, BodyRegion::LowerBody),
                GarmentSelection::new(root.join(self.shirt), self.description, BodyRegion::UpperBody),
            ],
        )
    }

    /// `person → pants + shirt`, in application order.
    pub fn title(&self) -> String {
        format!(
            "{} → {} + {}",
            stem(self.person),
            stem(self.pants),
            stem(self.shirt)
        )
    }
}

fn stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

const ARNAV: &str = "person_images/Arnav_A.jpg";
const KOREAN_GIRL: &str = "person_images/korean girl.png";
const WILL_SMITH: &str = "person_images/will_smith.jpg";
const FULL_MAN: &str = "person_images/Full Man.jpg";
const GUCCI_UPPER: &str = "garment_images/shirts/gucci upper.jpg";
const UPPER_2: &str = "garment_images/shirts/upper_2.jpg";
const UPPER_3: &str = "garment_images/shirts/upper_3.jpg";
const CARGO_PANTS: &str = "garment_images/pants/pants.jpg";

pub const PRESETS: &[Preset] = &[
    Preset {
        person: ARNAV,
        garment: GUCCI_UPPER,
        description: "Gucci upper garment refined with IDM-VTON",
        region: BodyRegion::UpperBody,
    },
    Preset {
        person: KOREAN_GIRL,
        garment: GUCCI_UPPER,
        description: "Gucci upper garment for Korean girl",
        region: BodyRegion::UpperBody,
    },
    Preset {
        person: WILL_SMITH,
        garment: GUCCI_UPPER,
        description: "Gucci upper garment for Will Smith",
        region: BodyRegion::UpperBody,
    },
    Preset {
        person: ARNAV,
        garment: UPPER_2,
        description: "Alternative upper garment for Arnav",
        region: BodyRegion::UpperBody,
    },
    Preset {
        person: FULL_MAN,
        garment: UPPER_3,
        description: "Red checkered upper garment for Full Man",
        region: BodyRegion::UpperBody,
    },
    Preset {
        person: FULL_MAN,
        garment: CARGO_PANTS,
        description: "Dark cargo pants for Full Man",
        region: BodyRegion::LowerBody,
    },
    Preset {
        person: ARNAV,
        garment: CARGO_PANTS,
        description: "Dark cargo pants for Arnav",
        region: BodyRegion::LowerBody,
    },
    Preset {
        person: KOREAN_GIRL,
        garment: UPPER_3,
        description: "Red checkered shirt for Korean girl",
        region: BodyRegion::UpperBody,
    },
];

pub const OUTFIT_PRESETS: &[OutfitPreset] = &[
    OutfitPreset {
        person: FULL_MAN,
        shirt: GUCCI_UPPER,
        pants: CARGO_PANTS,
        description: "Complete outfit: Dark cargo pants + Gucci upper",
    },
    OutfitPreset {
        person: ARNAV,
        shirt: UPPER_3,
        pants: CARGO_PANTS,
        description: "Complete outfit: Dark cargo pants + Red checkered shirt",
    },
    OutfitPreset {
        person: FULL_MAN,
        shirt: UPPER_2,
        pants: CARGO_PANTS,
        description: "Complete outfit: Dark cargo pants + Alternative upper",
    },
    OutfitPreset {
        person: WILL_SMITH,
        shirt: GUCCI_UPPER,
        pants: CARGO_PANTS,
        description: "Complete outfit: Dark cargo pants + Gucci upper for Will Smith",
    },
    OutfitPreset {
        person: KOREAN_GIRL,
        shirt: UPPER_3,
        pants: CARGO_PANTS,
        description: "Complete outfit: Dark cargo pants + Red checkered shirt for Korean girl",
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Category;

    #[test]
    fn presets_point_into_catalog_folders() {
        for preset in PRESETS {
            assert!(preset.person.starts_with(Category::Person.dir()));
            let folder = match preset.region {
                BodyRegion::LowerBody => Category::Pants.dir(),
                _ => Category::Shirt.dir(),
            };
            assert!(preset.garment.starts_with(folder), "{}", preset.garment);
        }
    }

    #[test]
    fn outfit_applies_pants_before_shirt() {
        let (person, garments) = OUTFIT_PRESETS[0].resolve(Path::new("/catalog"));
        assert_eq!(person, PathBuf::from("/catalog/person_images/Full Man.jpg"));
        assert_eq!(garments[0].region, BodyRegion::LowerBody);
        assert_eq!(
            garments[0].path,
            PathBuf::from("/catalog/garment_images/pants/pants.jpg")
        );
        assert_eq!(garments[1].region, BodyRegion::UpperBody);
        assert_eq!(OUTFIT_PRESETS[0].title(), "Full Man → pants + gucci upper");
    }

    #[test]
    fn outfit_descriptions_name_pants_first() {
        for preset in OUTFIT_PRESETS {
            assert!(
                preset.description.starts_with("Complete outfit: Dark cargo pants + "),
                "{}",
                preset.description
            );
        }
    }

    #[test]
    fn title_uses_stems() {
        assert_eq!(PRESETS[1].title(), "korean girl + gucci upper");
    }
}
