pub mod events;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::{Value, json};

const HUB_ENDPOINT: &str = "https://huggingface.co";
const FILE_DATA_TYPE: &str = "gradio.FileData";

#[derive(Debug, Clone)]
pub struct Options {
    /// Bearer token sent with every request (Hugging Face access token).
    pub token: Option<String>,
    /// Where returned files are downloaded to.
    pub download_dir: PathBuf,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            token: None,
            download_dir: std::env::temp_dir().join("gradio-space"),
        }
    }
}

/// A positional argument of a Space operation.
#[derive(Debug, Clone)]
pub enum Input {
    Value(Value),
    /// A local file, uploaded before the call.
    File(PathBuf),
    /// Image editor payload: a background plus optional mask layers and
    /// composite, all uploaded before the call.
    Editor {
        background: PathBuf,
        layers: Vec<PathBuf>,
        composite: Option<PathBuf>,
    },
}

#[derive(Debug, Deserialize)]
struct HostInfo {
    host: String,
}

#[derive(Debug, Deserialize)]
struct Queued {
    event_id: String,
}

#[derive(Debug)]
pub struct Client {
    space: String,
    root: String,
    http: reqwest::Client,
    options: Options,
}

impl Client {
    /// Connects to a Space given as `owner/name` or as a full base URL.
    pub async fn connect(space: &str, options: Options) -> Result<Self> {
        let http = reqwest::Client::builder()
            .default_headers(auth_headers(options.token.as_deref())?)
            .build()
            .context("Failed to build HTTP client")?;

        let host = if space.starts_with("http://") || space.starts_with("https://") {
            space.trim_end_matches('/').to_string()
        } else {
            resolve_host(&http, space).await
        };

        let config: Value = http
            .get(format!("{host}/config"))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to reach Space {space} at {host}"))?
            .json()
            .await
            .with_context(|| format!("Failed to parse config of Space {space}"))?;
        let api_prefix = config
            .get("api_prefix")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim_end_matches('/');

        tracing::debug!("Space {} resolved to {}{}", space, host, api_prefix);

        Ok(Self {
            space: space.to_string(),
            root: format!("{host}{api_prefix}"),
            http,
            options,
        })
    }

    /// Runs `api_name` with positional `inputs` and waits for the result.
    ///
    /// Returned files are downloaded and replaced by their local path. A
    /// single output is returned as-is; several outputs come back as an array.
    pub async fn predict(&self, api_name: &str, inputs: Vec<(&str, Input)>) -> Result<Value> {
        let api = api_name.trim_start_matches('/');

        let mut data = Vec::with_capacity(inputs.len());
        for (name, input) in inputs {
            let value = self
                .prepare(input)
                .await
                .with_context(|| format!("Failed to prepare input `{name}`"))?;
            data.push(value);
        }

        let call_url = format!("{}/call/{api}", self.root);
        let queued: Queued = self
            .http
            .post(&call_url)
            .json(&json!({ "data": data }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to queue /{api} on {}", self.space))?
            .json()
            .await
            .context("Failed to parse queue response")?;

        tracing::debug!("/{} queued as {}", api, queued.event_id);

        let response = self
            .http
            .get(format!("{call_url}/{}", queued.event_id))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to read result stream of /{api}"))?;

        let outputs = events::await_completion(response.bytes_stream()).await?;

        let dir = self.options.download_dir.join(&queued.event_id);
        let mut downloaded = 0;
        let mut resolved = Vec::with_capacity(outputs.len());
        for output in outputs {
            resolved.push(self.download_files(output, &dir, &mut downloaded).await?);
        }

        Ok(if resolved.len() == 1 {
            resolved.remove(0)
        } else {
            Value::Array(resolved)
        })
    }

    async fn prepare(&self, input: Input) -> Result<Value> {
        match input {
            Input::Value(value) => Ok(value),
            Input::File(path) => self.upload(&path).await,
            Input::Editor {
                background,
                layers,
                composite,
            } => {
                let background = self.upload(&background).await?;
                let mut uploaded = Vec::with_capacity(layers.len());
                for layer in &layers {
                    uploaded.push(self.upload(layer).await?);
                }
                let composite = match composite {
                    Some(path) => self.upload(&path).await?,
                    None => Value::Null,
                };
                Ok(json!({
                    "background": background,
                    "layers": uploaded,
                    "composite": composite,
                }))
            }
        }
    }

    async fn upload(&self, path: &Path) -> Result<Value> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = file_name(path);

        let form = reqwest::multipart::Form::new().part(
            "files",
            reqwest::multipart::Part::bytes(bytes).file_name(name.clone()),
        );
        let paths: Vec<String> = self
            .http
            .post(format!("{}/upload", self.root))
            .multipart(form)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to upload {}", path.display()))?
            .json()
            .await
            .context("Failed to parse upload response")?;

        let server_path = paths
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Upload of {} returned no path", path.display()))?;

        Ok(file_data(&server_path, &name))
    }

    /// Downloads every file payload in `value`, numbering files from `counter`.
    async fn download_files(
        &self,
        mut value: Value,
        dir: &Path,
        counter: &mut usize,
    ) -> Result<Value> {
        let mut found = Vec::new();
        collect_files(&value, String::new(), &mut found);

        for (pointer, file) in found {
            let local = self.download(&file, dir, *counter).await?;
            *counter += 1;
            let local = Value::String(local.to_string_lossy().into_owned());
            if pointer.is_empty() {
                value = local;
            } else if let Some(slot) = value.pointer_mut(&pointer) {
                *slot = local;
            }
        }

        Ok(value)
    }

    async fn download(&self, file: &RemoteFile, dir: &Path, index: usize) -> Result<PathBuf> {
        let url = match &file.url {
            Some(url) => url.clone(),
            None => format!("{}/file={}", self.root, file.path),
        };

        let bytes = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to download {url}"))?
            .bytes()
            .await
            .with_context(|| format!("Failed to read {url}"))?;

        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let target = dir.join(local_name(index, &file.name));
        tokio::fs::write(&target, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", target.display()))?;

        tracing::debug!("Downloaded {} ({} bytes)", target.display(), bytes.len());
        Ok(target)
    }
}

/// `owner/name` to the conventional `https://owner-name.hf.space` host.
pub fn space_subdomain_url(space: &str) -> String {
    let subdomain = space.to_lowercase().replace(['/', '_', '.'], "-");
    format!("https://{subdomain}.hf.space")
}

async fn resolve_host(http: &reqwest::Client, space: &str) -> String {
    let lookup = async {
        http.get(format!("{HUB_ENDPOINT}/api/spaces/{space}/host"))
            .send()
            .await?
            .error_for_status()?
            .json::<HostInfo>()
            .await
    };

    match lookup.await {
        Ok(info) => info.host.trim_end_matches('/').to_string(),
        Err(e) => {
            let host = space_subdomain_url(space);
            tracing::warn!("Host lookup for {} failed ({}), using {}", space, e, host);
            host
        }
    }
}

fn auth_headers(token: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .context("Token contains characters not allowed in a header")?;
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}

/// `{index}_{name}` keeping only the last component of a server-supplied name.
fn local_name(index: usize, name: &str) -> String {
    let name = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    format!("{index}_{name}")
}

/// File payload understood by Gradio components.
pub fn file_data(server_path: &str, orig_name: &str) -> Value {
    json!({
        "path": server_path,
        "orig_name": orig_name,
        "meta": { "_type": FILE_DATA_TYPE },
    })
}

#[derive(Debug, Clone, PartialEq)]
struct RemoteFile {
    path: String,
    url: Option<String>,
    name: String,
}

impl RemoteFile {
    fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let path = object.get("path")?.as_str()?;
        let url = object.get("url").and_then(Value::as_str);
        let tagged = object
            .get("meta")
            .and_then(|m| m.get("_type"))
            .and_then(Value::as_str)
            == Some(FILE_DATA_TYPE);
        if !tagged && url.is_none() {
            return None;
        }

        let name = object
            .get("orig_name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| file_name(Path::new(path)));

        Some(Self {
            path: path.to_string(),
            url: url.map(str::to_string),
            name,
        })
    }
}

/// Collects every file payload in `value` with its JSON pointer.
fn collect_files(value: &Value, pointer: String, out: &mut Vec<(String, RemoteFile)>) {
    if let Some(file) = RemoteFile::from_value(value) {
        out.push((pointer, file));
        return;
    }
    match value {
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_files(item, format!("{pointer}/{i}"), out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                let key = key.replace('~', "~0").replace('/', "~1");
                collect_files(item, format!("{pointer}/{key}"), out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdomain_follows_hf_convention() {
        assert_eq!(
            space_subdomain_url("blackmamba2408/IDM-VTON"),
            "https://blackmamba2408-idm-vton.hf.space"
        );
        assert_eq!(
            space_subdomain_url("blackmamba2408/virtual_try.on"),
            "https://blackmamba2408-virtual-try-on.hf.space"
        );
    }

    #[test]
    fn file_payloads_are_found_by_pointer() {
        let value = json!([
            {"path": "/tmp/a.png", "url": "https://x/file=/tmp/a.png", "orig_name": "a.png"},
            {"background": file_data("/tmp/b.png", "b.png"), "layers": [], "composite": null},
            "plain string",
        ]);

        let mut found = Vec::new();
        collect_files(&value, String::new(), &mut found);

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].0, "/0");
        assert_eq!(found[0].1.name, "a.png");
        assert_eq!(found[1].0, "/1/background");
        assert_eq!(found[1].1.url, None);
    }

    #[test]
    fn untagged_record_without_url_is_not_a_file() {
        assert!(RemoteFile::from_value(&json!({"path": "/tmp/a.png"})).is_none());
    }

    #[test]
    fn name_falls_back_to_path_file_name() {
        let file =
            RemoteFile::from_value(&json!({"path": "/tmp/gradio/abc/image.webp", "url": "u"}))
                .unwrap();
        assert_eq!(file.name, "image.webp");
    }

    #[test]
    fn downloads_stay_inside_the_event_directory() {
        assert_eq!(local_name(0, "image.webp"), "0_image.webp");
        assert_eq!(local_name(3, "nested/dir/result.png"), "3_result.png");
        assert_eq!(local_name(1, "../../etc/passwd"), "1_passwd");
        assert_eq!(local_name(2, ".."), "2_download");
        assert_eq!(local_name(4, ""), "4_download");
    }

    #[test]
    fn empty_token_sends_no_header() {
        assert!(auth_headers(Some("")).unwrap().is_empty());
        let headers = auth_headers(Some("hf_abc")).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer hf_abc");
    }
}
