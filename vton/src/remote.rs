use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use gradio_space::{Client, Input, Options};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::credentials::Credentials;
use crate::garment::BodyRegion;
use crate::settings::{ModelEndpoint, RefineParams};

#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network failure or an exception raised by the Space.
    #[error("{0:#}")]
    Call(anyhow::Error),

    #[error("Unexpected result format: {0}")]
    Malformed(String),
}

impl From<anyhow::Error> for RemoteError {
    fn from(err: anyhow::Error) -> Self {
        RemoteError::Call(err)
    }
}

/// Result shapes a Space may hand back for an image output.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RemoteOutput {
    Path(String),
    Record { path: String },
    Sequence(Vec<RemoteOutput>),
}

impl RemoteOutput {
    pub fn from_value(value: Value) -> Result<Self, RemoteError> {
        let shown = preview(&value);
        serde_json::from_value(value)
            .map_err(|_| RemoteError::Malformed(format!("no image path in {shown}")))
    }

    /// The image path: the value itself, its `path` field, or the first
    /// element of a sequence.
    pub fn into_path(self) -> Result<PathBuf, RemoteError> {
        match self {
            RemoteOutput::Path(path) | RemoteOutput::Record { path } => Ok(PathBuf::from(path)),
            RemoteOutput::Sequence(items) => items
                .into_iter()
                .next()
                .ok_or_else(|| RemoteError::Malformed("empty result sequence".to_string()))?
                .into_path(),
        }
    }

    /// The (composite, mask) pair of a refinement result.
    pub fn into_pair(self) -> Result<RefineOutput, RemoteError> {
        let RemoteOutput::Sequence(items) = self else {
            return Err(RemoteError::Malformed(
                "expected an image and a mask, got a single value".to_string(),
            ));
        };

        let count = items.len();
        let mut items = items.into_iter();
        match (items.next(), items.next()) {
            (Some(image), Some(mask)) => Ok(RefineOutput {
                image: image.into_path()?,
                mask: mask.into_path()?,
            }),
            _ => Err(RemoteError::Malformed(format!(
                "expected an image and a mask, got {count} element(s)"
            ))),
        }
    }
}

fn preview(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > 120 {
        format!("{}...", text.chars().take(120).collect::<String>())
    } else {
        text
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefineOutput {
    pub image: PathBuf,
    pub mask: PathBuf,
}

#[derive(Debug, Clone, Copy)]
pub struct RefineRequest<'a> {
    /// Image the garment is painted onto (the coarse result).
    pub background: &'a Path,
    pub garment: &'a Path,
    pub description: &'a str,
}

/// First-stage model: rough garment overlay.
#[async_trait]
pub trait CoarseTryOn: Send + Sync {
    async fn apply(
        &self,
        person: &Path,
        garment: &Path,
        region: BodyRegion,
    ) -> Result<PathBuf, RemoteError>;
}

/// Second-stage model: refined composite plus mask.
#[async_trait]
pub trait RefineTryOn: Send + Sync {
    async fn refine(&self, request: &RefineRequest<'_>) -> Result<RefineOutput, RemoteError>;
}

#[async_trait]
impl<T: CoarseTryOn + ?Sized> CoarseTryOn for &T {
    async fn apply(
        &self,
        person: &Path,
        garment: &Path,
        region: BodyRegion,
    ) -> Result<PathBuf, RemoteError> {
        (**self).apply(person, garment, region).await
    }
}

#[async_trait]
impl<T: RefineTryOn + ?Sized> RefineTryOn for &T {
    async fn refine(&self, request: &RefineRequest<'_>) -> Result<RefineOutput, RemoteError> {
        (**self).refine(request).await
    }
}

/// A Space connected on first use and reused afterwards.
#[derive(Debug)]
struct SpaceHandle {
    endpoint: ModelEndpoint,
    options: Options,
    client: OnceCell<Client>,
}

impl SpaceHandle {
    fn new(endpoint: ModelEndpoint, credentials: &Credentials, download_dir: &Path) -> Self {
        Self {
            endpoint,
            options: Options {
                token: credentials.token().map(str::to_string),
                download_dir: download_dir.to_path_buf(),
            },
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&Client, RemoteError> {
        self.client
            .get_or_try_init(|| async {
                tracing::info!("Connecting to {}...", self.endpoint.space);
                let client = Client::connect(&self.endpoint.space, self.options.clone()).await?;
                tracing::info!("✓ Connected to {}", self.endpoint.space);
                Ok::<_, anyhow::Error>(client)
            })
            .await
            .map_err(RemoteError::Call)
    }

    async fn predict(&self, inputs: Vec<(&str, Input)>) -> Result<Value, RemoteError> {
        let client = self.client().await?;
        let start = Instant::now();
        let value = client.predict(&self.endpoint.api, inputs).await?;
        tracing::info!(
            "{}{} answered in {:.1}s",
            self.endpoint.space,
            self.endpoint.api,
            start.elapsed().as_secs_f64()
        );
        Ok(value)
    }
}

#[derive(Debug)]
pub struct GradioCoarse {
    space: SpaceHandle,
}

impl GradioCoarse {
    pub fn new(endpoint: ModelEndpoint, credentials: &Credentials, download_dir: &Path) -> Self {
        Self {
            space: SpaceHandle::new(endpoint, credentials, download_dir),
        }
    }
}

#[async_trait]
impl CoarseTryOn for GradioCoarse {
    async fn apply(
        &self,
        person: &Path,
        garment: &Path,
        region: BodyRegion,
    ) -> Result<PathBuf, RemoteError> {
        let value = self
            .space
            .predict(vec![
                ("person_path", Input::File(person.to_path_buf())),
                ("garment_path", Input::File(garment.to_path_buf())),
                ("garment_type", Input::Value(json!(region.as_str()))),
            ])
            .await?;

        RemoteOutput::from_value(value)?.into_path()
    }
}

#[derive(Debug)]
pub struct GradioRefine {
    space: SpaceHandle,
    params: RefineParams,
}

impl GradioRefine {
    pub fn new(
        endpoint: ModelEndpoint,
        params: RefineParams,
        credentials: &Credentials,
        download_dir: &Path,
    ) -> Self {
        Self {
            space: SpaceHandle::new(endpoint, credentials, download_dir),
            params,
        }
    }
}

#[async_trait]
impl RefineTryOn for GradioRefine {
    async fn refine(&self, request: &RefineRequest<'_>) -> Result<RefineOutput, RemoteError> {
        let value = self
            .space
            .predict(vec![
                (
                    "dict",
                    Input::Editor {
                        background: request.background.to_path_buf(),
                        layers: Vec::new(),
                        composite: None,
                    },
                ),
                ("garm_img", Input::File(request.garment.to_path_buf())),
                ("garment_des", Input::Value(json!(request.description))),
                ("is_checked", Input::Value(json!(self.params.auto_mask))),
                ("is_checked_crop", Input::Value(json!(self.params.auto_crop))),
                ("denoise_steps", Input::Value(json!(self.params.denoise_steps))),
                ("seed", Input::Value(json!(self.params.seed))),
            ])
            .await?;

        RemoteOutput::from_value(value)?.into_pair()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_three_shapes_normalize_to_the_same_path() {
        let shapes = [
            json!("/tmp/out1.png"),
            json!({ "path": "/tmp/out1.png", "url": null, "orig_name": "out1.png" }),
            json!(["/tmp/out1.png", "/tmp/ignored.png"]),
        ];
        for shape in shapes {
            let path = RemoteOutput::from_value(shape).unwrap().into_path().unwrap();
            assert_eq!(path, PathBuf::from("/tmp/out1.png"));
        }
    }

    #[test]
    fn nested_sequence_takes_first_leaf() {
        let output = RemoteOutput::from_value(json!([[{ "path": "/a.png" }], "/b.png"])).unwrap();
        assert_eq!(output.into_path().unwrap(), PathBuf::from("/a.png"));
    }

    #[test]
    fn empty_sequence_is_malformed() {
        let output = RemoteOutput::from_value(json!([])).unwrap();
        assert!(matches!(output.into_path(), Err(RemoteError::Malformed(_))));
    }

    #[test]
    fn unknown_shape_is_malformed() {
        assert!(matches!(
            RemoteOutput::from_value(json!(42)),
            Err(RemoteError::Malformed(_))
        ));
        assert!(matches!(
            RemoteOutput::from_value(json!({ "url": "x" })),
            Err(RemoteError::Malformed(_))
        ));
    }

    #[test]
    fn pair_needs_two_elements() {
        let pair = RemoteOutput::from_value(json!(["/final.png", { "path": "/mask.png" }]))
            .unwrap()
            .into_pair()
            .unwrap();
        assert_eq!(
            pair,
            RefineOutput {
                image: "/final.png".into(),
                mask: "/mask.png".into()
            }
        );

        let single = RemoteOutput::from_value(json!(["/final.png"])).unwrap();
        assert!(matches!(single.into_pair(), Err(RemoteError::Malformed(_))));

        let bare = RemoteOutput::from_value(json!("/final.png")).unwrap();
        assert!(matches!(bare.into_pair(), Err(RemoteError::Malformed(_))));
    }
}
