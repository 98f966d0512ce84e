use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::{Result, Stage, VtonError};
use crate::garment::GarmentSelection;
use crate::remote::{CoarseTryOn, RefineRequest, RefineTryOn};

type Clock = Box<dyn Fn() -> i64 + Send + Sync>;

/// Artifacts of one completed two-step run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub stamp: i64,
    pub step1: PathBuf,
    pub image: PathBuf,
    pub mask: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutfitArtifacts {
    pub image: PathBuf,
    pub mask: PathBuf,
}

/// Outcome of a chained outfit run. Garments completed before a failure keep
/// their artifacts.
#[derive(Debug)]
pub struct OutfitReport {
    pub stamp: i64,
    pub completed: Vec<RunReport>,
    pub outfit: Option<OutfitArtifacts>,
    pub failure: Option<VtonError>,
}

impl OutfitReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.outfit.is_some()
    }
}

/// File names of one two-step run inside the results directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactNames {
    pub step1: String,
    pub image: String,
    pub mask: String,
}

impl ArtifactNames {
    pub fn single(stamp: i64) -> Self {
        Self {
            step1: format!("step1_result_{stamp}.png"),
            image: format!("final_result_{stamp}.png"),
            mask: format!("final_mask_{stamp}.png"),
        }
    }

    pub fn garment(label: &str, stamp: i64) -> Self {
        Self {
            step1: format!("step1_{label}_{stamp}.png"),
            image: format!("{label}_result_{stamp}.png"),
            mask: format!("{label}_mask_{stamp}.png"),
        }
    }
}

/// Coarse try-on followed by refinement, with results copied to disk.
pub struct Pipeline<C, R> {
    coarse: C,
    refine: R,
    results_dir: PathBuf,
    clock: Clock,
}

impl<C, R> std::fmt::Debug for Pipeline<C, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("results_dir", &self.results_dir)
            .finish_non_exhaustive()
    }
}

impl<C: CoarseTryOn, R: RefineTryOn> Pipeline<C, R> {
    pub fn new(coarse: C, refine: R, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            coarse,
            refine,
            results_dir: results_dir.into(),
            clock: Box::new(|| chrono::Utc::now().timestamp()),
        }
    }

    /// Replaces the timestamp source used for artifact names.
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// One garment on one person.
    pub async fn run(&self, person: &Path, garment: &GarmentSelection) -> Result<RunReport> {
        tracing::info!(
            "Two-step run: person={}, garment={}, type={}, description={:?}",
            person.display(),
            garment.path.display(),
            garment.region,
            garment.description
        );

        ensure_exists("Person", person)?;
        ensure_exists("Garment", &garment.path)?;

        let stamp = (self.clock)();
        let report = self
            .two_step(person, garment, &ArtifactNames::single(stamp), stamp)
            .await?;

        tracing::info!("Two-step pipeline completed successfully");
        Ok(report)
    }

    /// Applies `garments` in order, each on top of the previous result.
    pub async fn run_outfit(
        &self,
        person: &Path,
        garments: &[GarmentSelection],
    ) -> Result<OutfitReport> {
        if garments.is_empty() {
            return Err(VtonError::NoGarment);
        }
        ensure_exists("Person", person)?;
        for garment in garments {
            ensure_exists("Garment", &garment.path)?;
        }

        let stamp = (self.clock)();
        let mut report = OutfitReport {
            stamp,
            completed: Vec::with_capacity(garments.len()),
            outfit: None,
            failure: None,
        };
        let mut labels: Vec<String> = Vec::with_capacity(garments.len());
        let mut current = person.to_path_buf();

        for (index, garment) in garments.iter().enumerate() {
            let mut label = garment.region.label().to_string();
            if labels.contains(&label) {
                label = format!("{label}{}", index + 1);
            }
            tracing::info!(
                "Outfit layer {}/{}: {} ({})",
                index + 1,
                garments.len(),
                label,
                garment.path.display()
            );

            match self
                .two_step(&current, garment, &ArtifactNames::garment(&label, stamp), stamp)
                .await
            {
                Ok(run) => {
                    current = run.image.clone();
                    report.completed.push(run);
                    labels.push(label);
                }
                Err(e) => {
                    tracing::error!("Outfit stopped at {}: {}", label, e);
                    report.failure = Some(e);
                    return Ok(report);
                }
            }
        }

        if let Some(last) = report.completed.last() {
            let image = self
                .persist(&last.image, &format!("complete_outfit_{stamp}.png"))
                .await;
            let mask = self
                .persist(&last.mask, &format!("outfit_mask_{stamp}.png"))
                .await;
            match (image, mask) {
                (Ok(image), Ok(mask)) => report.outfit = Some(OutfitArtifacts { image, mask }),
                (Err(e), _) | (_, Err(e)) => report.failure = Some(e),
            }
        }

        Ok(report)
    }

    async fn two_step(
        &self,
        person: &Path,
        garment: &GarmentSelection,
        names: &ArtifactNames,
        stamp: i64,
    ) -> Result<RunReport> {
        tracing::info!("Step 1: coarse try-on");
        let start = Instant::now();
        let coarse = self
            .coarse
            .apply(person, &garment.path, garment.region)
            .await
            .map_err(|source| {
                tracing::error!("Step 1 failed: {}", source);
                VtonError::Stage {
                    stage: Stage::Coarse,
                    step1: None,
                    source,
                }
            })?;
        tracing::info!("✓ Step 1 completed in {:.1}s", start.elapsed().as_secs_f64());

        let step1 = self.persist(&coarse, &names.step1).await?;
        tracing::info!("Step 1 result saved: {}", step1.display());

        tracing::info!("Step 2: refinement");
        let start = Instant::now();
        let refined = self
            .refine
            .refine(&RefineRequest {
                background: &step1,
                garment: &garment.path,
                description: &garment.description,
            })
            .await
            .map_err(|source| {
                tracing::error!("Step 2 failed: {}", source);
                VtonError::Stage {
                    stage: Stage::Refine,
                    step1: Some(step1.clone()),
                    source,
                }
            })?;
        tracing::info!("✓ Step 2 completed in {:.1}s", start.elapsed().as_secs_f64());

        let image = self.persist(&refined.image, &names.image).await?;
        let mask = self.persist(&refined.mask, &names.mask).await?;
        tracing::info!("Final results saved: {} / {}", image.display(), mask.display());

        Ok(RunReport {
            stamp,
            step1,
            image,
            mask,
        })
    }

    async fn persist(&self, source: &Path, name: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.results_dir).await?;
        let target = self.results_dir.join(name);
        tokio::fs::copy(source, &target).await?;
        Ok(target)
    }
}

fn ensure_exists(role: &'static str, path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        tracing::error!("{} image not found: {}", role, path.display());
        Err(VtonError::MissingAsset {
            role,
            path: path.to_path_buf(),
        })
    }
}
