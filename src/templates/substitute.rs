use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::{SubstitutionMap, TemplateTarget};

/// Minimum Jaro-Winkler score to consider a placeholder a close match.
const PLACEHOLDER_SUGGESTION_THRESHOLD: f64 = 0.8;

/// Compiled pattern matching `{{ name }}` placeholders.
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([\w.]+)\s*\}\}").expect("placeholder regex must compile"));

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to read template {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} still contains {token}", path.display())]
    TokenStillPresent { path: PathBuf, token: String },
}

impl TemplateError {
    /// Only a verify miss can heal on a second pass; I/O failures cannot.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TemplateError::TokenStillPresent { .. })
    }
}

/// A placeholder left in rendered content that no token in the map covers.
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedPlaceholder {
    pub name: String,
    pub suggestion: Option<String>,
}

/// Renders one template target and checks the result.
pub trait Substitute: Send + Sync + 'static {
    fn apply(&self, target: &TemplateTarget, map: &SubstitutionMap) -> Result<(), TemplateError>;

    fn verify(&self, target: &TemplateTarget) -> Result<(), TemplateError>;
}

/// The real substitutor: plain file I/O with atomic writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSubstitutor;

impl Substitute for FileSubstitutor {
    fn apply(&self, target: &TemplateTarget, map: &SubstitutionMap) -> Result<(), TemplateError> {
        let read_path = target.read_path();
        let content = std::fs::read_to_string(read_path).map_err(|source| TemplateError::Read {
            path: read_path.to_path_buf(),
            source,
        })?;

        let rendered = map.render(&content);
        for leftover in unresolved_placeholders(&rendered, map) {
            tracing::warn!(
                template = %target.label,
                placeholder = %leftover.name,
                suggestion = leftover.suggestion.as_deref().unwrap_or("-"),
                "placeholder has no value"
            );
        }

        write_atomic(&target.path, &rendered)
    }

    fn verify(&self, target: &TemplateTarget) -> Result<(), TemplateError> {
        let content = std::fs::read_to_string(&target.path).map_err(|source| TemplateError::Read {
            path: target.path.clone(),
            source,
        })?;
        match target.tokens.iter().find(|t| content.contains(t.as_str())) {
            Some(token) => Err(TemplateError::TokenStillPresent {
                path: target.path.clone(),
                token: token.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Write `content` to `path` through a sibling temp file and a rename, so a
/// reader never sees a half-written file.
pub fn write_atomic(path: &Path, content: &str) -> Result<(), TemplateError> {
    let write_err = |source| TemplateError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, content).map_err(write_err)?;
    std::fs::rename(&tmp_path, path).map_err(write_err)?;
    Ok(())
}

/// Find `{{ name }}` placeholders in `content` that `map` has no token for.
pub fn unresolved_placeholders(content: &str, map: &SubstitutionMap) -> Vec<UnresolvedPlaceholder> {
    let mut found: Vec<UnresolvedPlaceholder> = Vec::new();
    for cap in PLACEHOLDER_RE.captures_iter(content) {
        let name = cap[1].to_string();
        if map.get(&super::token(&name)).is_some() || found.iter().any(|f| f.name == name) {
            continue;
        }
        let suggestion = closest_key(&name, map);
        found.push(UnresolvedPlaceholder { name, suggestion });
    }
    found
}

fn closest_key(name: &str, map: &SubstitutionMap) -> Option<String> {
    let mut best: Option<(&str, f64)> = None;
    for token in map.tokens() {
        let key = token.trim_start_matches("{{").trim_end_matches("}}");
        let score = strsim::jaro_winkler(name, key);
        if score >= PLACEHOLDER_SUGGESTION_THRESHOLD && best.is_none_or(|(_, s)| score > s) {
            best = Some((key, score));
        }
    }
    best.map(|(key, _)| key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn map() -> SubstitutionMap {
        SubstitutionMap::builder()
            .insert("main_port", 9000)
            .insert("server_port", 8000)
            .insert("war_name", "billing-web")
            .build()
    }

    #[test]
    fn apply_then_verify_in_place() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("server.xml");
        std::fs::write(
            &path,
            r#"<Server port="{{server_port}}"><Connector port="{{main_port}}"/><Connector port="{{main_port}}"/></Server>"#,
        )
        .unwrap();
        let target = TemplateTarget::in_place("server", &path, &["main_port", "server_port"]);

        FileSubstitutor.apply(&target, &map()).unwrap();
        FileSubstitutor.verify(&target).unwrap();

        let out = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            out,
            r#"<Server port="8000"><Connector port="9000"/><Connector port="9000"/></Server>"#
        );
        assert!(!tmp.path().join("server.xml.tmp").exists());
    }

    #[test]
    fn apply_copies_from_source_and_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("contexts").join("billing.xml");
        std::fs::create_dir_all(source.parent().unwrap()).unwrap();
        std::fs::write(&source, "<Context docBase=\"{{war_name}}\"/>").unwrap();
        let dest = tmp.path().join("conf/Catalina/localhost/billing.xml");
        let target = TemplateTarget::copied("app context", &source, &dest, &["war_name"]);

        FileSubstitutor.apply(&target, &map()).unwrap();
        FileSubstitutor.verify(&target).unwrap();

        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "<Context docBase=\"billing-web\"/>");
        // The shared source template is left untouched.
        assert!(std::fs::read_to_string(&source).unwrap().contains("{{war_name}}"));
    }

    #[test]
    fn verify_reports_remaining_token() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("context.xml");
        std::fs::write(&path, "{{db_context}}").unwrap();
        let target = TemplateTarget::in_place("context", &path, &["db_context"]);

        let err = FileSubstitutor.verify(&target).unwrap_err();
        assert!(err.is_retryable());
        match err {
            TemplateError::TokenStillPresent { token, .. } => assert_eq!(token, "{{db_context}}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_template_is_not_retryable() {
        let tmp = TempDir::new().unwrap();
        let target = TemplateTarget::in_place("server", tmp.path().join("absent.xml"), &["main_port"]);
        let err = FileSubstitutor.apply(&target, &map()).unwrap_err();
        assert!(matches!(err, TemplateError::Read { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn unresolved_placeholders_suggest_close_keys() {
        let found = unresolved_placeholders("{{main_prot}} {{ other }} {{main_prot}} {{war_name}}", &map());
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "main_prot");
        assert_eq!(found[0].suggestion.as_deref(), Some("main_port"));
        assert_eq!(found[1].name, "other");
        assert_eq!(found[1].suggestion, None);
    }
}
