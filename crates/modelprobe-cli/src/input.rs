//! Loading model configs and prompt suites from disk.
//!
//! Both accept JSON or TOML, chosen by file extension. Model files hold either
//! a bare list of configs or an object with a `models` list.

use std::path::Path;

use anyhow::{bail, Context, Result};
use modelprobe_core::{ModelConfig, PromptSuite};
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum ModelsFile {
    List(Vec<ModelConfig>),
    Wrapped { models: Vec<ModelConfig> },
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("toml") => toml::from_str(&raw).with_context(|| format!("parse TOML {:?}", path)),
        Some("json") | None => {
            serde_json::from_str(&raw).with_context(|| format!("parse JSON {:?}", path))
        }
        Some(other) => bail!("unsupported file type '.{other}' for {:?} (use .json or .toml)", path),
    }
}

pub fn load_models(path: &Path) -> Result<Vec<ModelConfig>> {
    let models = match read_document::<ModelsFile>(path)? {
        ModelsFile::List(models) | ModelsFile::Wrapped { models } => models,
    };
    if models.is_empty() {
        bail!("no model configs in {:?}", path);
    }
    Ok(models)
}

pub fn load_suite(path: &Path) -> Result<PromptSuite> {
    let suite: PromptSuite = read_document(path)?;
    suite
        .validate()
        .with_context(|| format!("invalid suite {:?}", path))?;
    Ok(suite)
}

pub fn load_suites(paths: &[impl AsRef<Path>]) -> Result<Vec<PromptSuite>> {
    paths.iter().map(|p| load_suite(p.as_ref())).collect()
}

/// Suites for a single run: one suite as is, several combined under `name`.
pub fn combined_suite(name: &str, suites: Vec<PromptSuite>) -> Result<PromptSuite> {
    match suites.len() {
        0 => bail!("at least one --suite is required"),
        1 => Ok(suites.into_iter().next().context("suite list is empty")?),
        _ => Ok(PromptSuite::combine(name, &suites)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelprobe_core::ProbeCategory;

    #[test]
    fn models_load_from_list_or_wrapper() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("list.json");
        std::fs::write(
            &list,
            r#"[{"model_name": "gpt-4o", "provider": "openai", "api_key": "sk-x"}]"#,
        )
        .unwrap();
        let wrapped = dir.path().join("wrapped.json");
        std::fs::write(
            &wrapped,
            r#"{"models": [{"model_name": "Opus 4.6", "provider": "suspect", "aliases": ["claude-opus-4-6"]}]}"#,
        )
        .unwrap();

        let a = load_models(&list).unwrap();
        assert_eq!(a[0].api_key.as_deref(), Some("sk-x"));
        let b = load_models(&wrapped).unwrap();
        assert_eq!(b[0].aliases, vec!["claude-opus-4-6".to_string()]);
    }

    #[test]
    fn toml_suites_are_supported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.toml");
        std::fs::write(
            &path,
            r#"
name = "identity"

[[probes]]
probe_id = "who"
category = "identity"
prompt_text = "Which model are you?"
"#,
        )
        .unwrap();

        let suite = load_suite(&path).unwrap();
        assert_eq!(suite.probes[0].category, ProbeCategory::Identity);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.json");
        std::fs::write(&empty, r#"{"name": "empty", "probes": []}"#).unwrap();
        assert!(load_suite(&empty).is_err());

        let yaml = dir.path().join("models.yaml");
        std::fs::write(&yaml, "models: []").unwrap();
        assert!(load_models(&yaml).is_err());

        assert!(load_models(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn several_suites_are_combined() {
        let a = PromptSuite::new("a").with_probe(modelprobe_core::Probe::new(
            "p",
            ProbeCategory::Identity,
            "x",
        ));
        let b = PromptSuite::new("b").with_probe(modelprobe_core::Probe::new(
            "p",
            ProbeCategory::Capability,
            "y",
        ));
        assert_eq!(combined_suite("run", vec![a.clone()]).unwrap(), a);
        let combined = combined_suite("run", vec![a, b]).unwrap();
        assert_eq!(combined.name, "run");
        assert_eq!(combined.len(), 2);
        assert!(combined_suite("run", vec![]).is_err());
    }

    #[test]
    fn bundled_suites_and_models_load() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
        let suites = load_suites(&[
            root.join("suites/identity.json"),
            root.join("suites/capability.json"),
            root.join("suites/fingerprint.json"),
        ])
        .unwrap();
        assert!(suites.iter().all(|s| !s.is_empty()));
        assert!(suites[0]
            .probes
            .iter()
            .all(|p| p.category == ProbeCategory::Identity));

        let models = load_models(&root.join("models.example.json")).unwrap();
        assert!(models.iter().all(|m| m.validate().is_ok()));
    }
}
