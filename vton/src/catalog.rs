use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, VtonError};
use crate::garment::BodyRegion;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Person,
    Shirt,
    Pants,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Person, Category::Shirt, Category::Pants];

    /// Directory relative to the catalog root.
    pub fn dir(self) -> &'static str {
        match self {
            Category::Person => "person_images",
            Category::Shirt => "garment_images/shirts",
            Category::Pants => "garment_images/pants",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Person => "person",
            Category::Shirt => "shirt",
            Category::Pants => "pants",
        }
    }

    /// Region a garment of this category is applied to.
    pub fn region(self) -> Option<BodyRegion> {
        match self {
            Category::Person => None,
            Category::Shirt => Some(BodyRegion::UpperBody),
            Category::Pants => Some(BodyRegion::LowerBody),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "person" | "people" | "persons" => Ok(Category::Person),
            "shirt" | "shirts" | "upper" => Ok(Category::Shirt),
            "pants" | "pant" | "lower" => Ok(Category::Pants),
            other => Err(format!("unknown category `{other}`")),
        }
    }
}

/// An image in one of the catalog folders.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    /// File stem, used for display.
    pub name: String,
    pub category: Category,
    pub path: PathBuf,
}

impl Asset {
    fn from_path(path: PathBuf, category: Category) -> Self {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            category,
            path,
        }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
}

impl Catalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, category: Category) -> PathBuf {
        self.root.join(category.dir())
    }

    /// Images of `category` in directory order. A missing directory is empty.
    pub fn list(&self, category: Category) -> Result<Vec<Asset>> {
        let dir = self.dir(category);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut assets = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && is_image(&path) {
                assets.push(Asset::from_path(path, category));
            }
        }

        Ok(assets)
    }

    /// Copies `source` into the category folder under its own file name.
    /// A file of the same name already there is reused as-is.
    pub fn add(&self, source: &Path, category: Category) -> Result<Asset> {
        if !source.is_file() {
            return Err(VtonError::MissingAsset {
                role: "Source",
                path: source.to_path_buf(),
            });
        }
        let Some(file_name) = source.file_name() else {
            return Err(VtonError::MissingAsset {
                role: "Source",
                path: source.to_path_buf(),
            });
        };

        let dir = self.dir(category);
        fs::create_dir_all(&dir)?;

        let target = dir.join(file_name);
        if target.exists() {
            tracing::info!("{} already in {} catalog, reusing it", target.display(), category);
        } else {
            fs::copy(source, &target)?;
            tracing::info!("Added {} to {} catalog", target.display(), category);
        }

        Ok(Asset::from_path(target, category))
    }

    /// Number of images per category.
    pub fn summary(&self) -> Result<Vec<(Category, usize)>> {
        Category::ALL
            .iter()
            .map(|&category| Ok((category, self.list(category)?.len())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(dir.path().join("nowhere"));
        assert!(catalog.list(Category::Shirt).unwrap().is_empty());
    }

    #[test]
    fn list_keeps_only_allowed_images() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(dir.path());
        let people = catalog.dir(Category::Person);
        fs::create_dir_all(people.join("nested.png")).unwrap();
        fs::write(people.join("korean girl.PNG"), b"img").unwrap();
        fs::write(people.join("notes.txt"), b"txt").unwrap();
        fs::write(people.join("Full Man.jpg"), b"img").unwrap();

        let mut names: Vec<_> = catalog
            .list(Category::Person)
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["Full Man", "korean girl"]);
    }

    #[test]
    fn add_is_idempotent_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("cargo.jpg");
        fs::write(&source, b"pants").unwrap();
        let catalog = Catalog::new(dir.path().join("catalog"));

        let first = catalog.add(&source, Category::Pants).unwrap();
        let second = catalog.add(&source, Category::Pants).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.name, "cargo");
        assert!(first.exists());
        assert_eq!(fs::read_dir(catalog.dir(Category::Pants)).unwrap().count(), 1);
    }

    #[test]
    fn add_reuses_existing_file_without_copying() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(dir.path());
        let shirts = catalog.dir(Category::Shirt);
        fs::create_dir_all(&shirts).unwrap();
        fs::write(shirts.join("tee.png"), b"original").unwrap();

        let source = dir.path().join("tee.png");
        fs::write(&source, b"replacement").unwrap();
        let asset = catalog.add(&source, Category::Shirt).unwrap();

        assert_eq!(fs::read(asset.path).unwrap(), b"original");
    }

    #[test]
    fn add_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(dir.path());
        let err = catalog
            .add(&dir.path().join("ghost.jpg"), Category::Shirt)
            .unwrap_err();
        assert!(matches!(err, VtonError::MissingAsset { .. }));
        assert!(!catalog.dir(Category::Shirt).exists());
    }

    #[test]
    fn summary_counts_each_category() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(dir.path());
        let source = dir.path().join("a.jpg");
        fs::write(&source, b"x").unwrap();
        catalog.add(&source, Category::Shirt).unwrap();

        assert_eq!(
            catalog.summary().unwrap(),
            vec![(Category::Person, 0), (Category::Shirt, 1), (Category::Pants, 0)]
        );
    }
}
