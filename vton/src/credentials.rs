use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::error::{Result, VtonError};

pub const TOKEN_KEY: &str = "HUGGINGFACE_TOKEN";

/// `KEY=VALUE` pairs read from a `.env` style file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvFile {
    vars: Vec<(String, String)>,
}

impl EnvFile {
    /// Blank lines and `#` comments are skipped, the line is split at the
    /// first `=` and one layer of matching quotes is removed from the value.
    pub fn parse(contents: &str) -> Self {
        let mut vars = Vec::new();

        for (number, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                tracing::warn!("Ignoring line {} without `=`", number + 1);
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            vars.push((key.to_string(), unquote(value.trim()).to_string()));
        }

        Self { vars }
    }

    /// `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(Self::parse(&contents)))
    }

    /// Later lines win over earlier ones.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[derive(Debug, Clone, PartialEq)]
pub enum CredentialSource {
    File(PathBuf),
    Environment,
    Missing,
}

/// The resolved bearer credential handed to remote clients.
#[derive(Clone, PartialEq)]
pub struct Credentials {
    token: Option<String>,
    source: CredentialSource,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.masked())
            .field("source", &self.source)
            .finish()
    }
}

impl Credentials {
    /// A key present in the file overrides the ambient environment; keys the
    /// file lacks, or leaves empty, are taken from `ambient`.
    pub fn resolve(
        file: Option<(&Path, &EnvFile)>,
        ambient: impl Fn(&str) -> Option<String>,
    ) -> Self {
        if let Some((path, env)) = file {
            if let Some(token) = env.get(TOKEN_KEY).filter(|t| !t.trim().is_empty()) {
                return Self {
                    token: Some(token.to_string()),
                    source: CredentialSource::File(path.to_path_buf()),
                };
            }
        }

        match ambient(TOKEN_KEY).filter(|t| !t.trim().is_empty()) {
            Some(token) => Self {
                token: Some(token),
                source: CredentialSource::Environment,
            },
            None => Self {
                token: None,
                source: CredentialSource::Missing,
            },
        }
    }

    pub fn from_process(file: Option<(&Path, &EnvFile)>) -> Self {
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// The token, treating an empty value as absent.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.trim().is_empty())
    }

    pub fn require_token(&self) -> Result<&str> {
        self.token()
            .ok_or(VtonError::MissingCredential { key: TOKEN_KEY })
    }

    pub fn source(&self) -> &CredentialSource {
        &self.source
    }

    /// First ten characters followed by `...`.
    pub fn masked(&self) -> String {
        match self.token() {
            Some(token) => format!("{}...", token.chars().take(10).collect::<String>()),
            None => "<unset>".to_string(),
        }
    }
}

pub fn remediation(env_file: &Path) -> String {
    format!(
        "Please set your Hugging Face token!\n\
         You can either:\n\
         1. Create {} with: {TOKEN_KEY}=your_token_here\n\
         2. Set environment variable: export {TOKEN_KEY}=your_token_here",
        env_file.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ambient_with(token: &'static str) -> impl Fn(&str) -> Option<String> {
        move |key: &str| (key == TOKEN_KEY).then(|| token.to_string())
    }

    fn no_ambient(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn parse_skips_comments_and_blank_lines() {
        let env = EnvFile::parse("# token\n\nHUGGINGFACE_TOKEN=\"hf_abc\"\nOTHER='x=y'\nbroken line\n");
        assert_eq!(env.len(), 2);
        assert_eq!(env.get(TOKEN_KEY), Some("hf_abc"));
        assert_eq!(env.get("OTHER"), Some("x=y"));
    }

    #[test]
    fn only_one_layer_of_quotes_is_removed() {
        let env = EnvFile::parse("A=\"\"quoted\"\"\nB=\"unbalanced\nC=plain");
        assert_eq!(env.get("A"), Some("\"quoted\""));
        assert_eq!(env.get("B"), Some("\"unbalanced"));
        assert_eq!(env.get("C"), Some("plain"));
    }

    #[test]
    fn last_duplicate_wins() {
        let env = EnvFile::parse("K=1\nK=2");
        assert_eq!(env.get("K"), Some("2"));
    }

    #[test]
    fn file_overrides_ambient() {
        let env = EnvFile::parse("HUGGINGFACE_TOKEN=from_file");
        let path = Path::new(".env");
        let creds = Credentials::resolve(Some((path, &env)), ambient_with("from_env"));
        assert_eq!(creds.token(), Some("from_file"));
        assert_eq!(creds.source(), &CredentialSource::File(path.to_path_buf()));
    }

    #[test]
    fn ambient_fills_keys_missing_from_file() {
        let env = EnvFile::parse("UNRELATED=1");
        let creds = Credentials::resolve(Some((Path::new(".env"), &env)), ambient_with("from_env"));
        assert_eq!(creds.token(), Some("from_env"));
        assert_eq!(creds.source(), &CredentialSource::Environment);

        let creds = Credentials::resolve(None, ambient_with("from_env"));
        assert_eq!(creds.token(), Some("from_env"));
    }

    #[test]
    fn empty_token_is_missing() {
        let env = EnvFile::parse("HUGGINGFACE_TOKEN=\"\"");
        let creds = Credentials::resolve(Some((Path::new(".env"), &env)), no_ambient);
        assert!(matches!(
            creds.require_token(),
            Err(VtonError::MissingCredential { key: TOKEN_KEY })
        ));

        let creds = Credentials::resolve(Some((Path::new(".env"), &env)), |_: &str| {
            Some("hf_env".to_string())
        });
        assert_eq!(creds.token(), Some("hf_env"));

        let creds = Credentials::resolve(None, no_ambient);
        assert!(creds.require_token().is_err());
        assert_eq!(creds.source(), &CredentialSource::Missing);
    }

    #[test]
    fn load_reports_missing_file_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(EnvFile::load(&dir.path().join(".env")).unwrap(), None);

        let path = dir.path().join(".env");
        std::fs::write(&path, "HUGGINGFACE_TOKEN=hf_1234567890abcdef\n").unwrap();
        let env = EnvFile::load(&path).unwrap().unwrap();
        let creds = Credentials::resolve(Some((path.as_path(), &env)), no_ambient);
        assert_eq!(creds.masked(), "hf_1234567...");
        assert!(!format!("{creds:?}").contains("abcdef"));
    }
}
