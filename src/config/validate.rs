// The miette/thiserror derive macros generate code that triggers false
// positive unused_assignments warnings on enum variant fields.
#![allow(unused_assignments)]

use std::collections::BTreeMap;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::config::model::SrvrigConfig;

// ---------------------------------------------------------------------------
// ConfigDiagnostic: miette-powered validation error
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigDiagnostic {
    #[error("unknown app `{app}`")]
    #[diagnostic(code(srvrig::unknown_app))]
    UnknownApp {
        #[help]
        advice: String,
        app: String,
    },

    #[error("app `{app}` has an empty `{field}`")]
    #[diagnostic(code(srvrig::empty_field))]
    EmptyField {
        #[source_code]
        src: NamedSource<String>,
        #[label("must not be empty")]
        span: SourceSpan,
        app: String,
        field: String,
    },

    #[error("port range start {port} is shared by {categories:?}")]
    #[diagnostic(
        code(srvrig::duplicate_port_start),
        help("give every port category its own starting value")
    )]
    DuplicatePortStart {
        #[source_code]
        src: NamedSource<String>,
        #[label("duplicate start")]
        span: SourceSpan,
        port: u16,
        categories: Vec<String>,
    },

    #[error("port range start for `{category}` is 0")]
    #[diagnostic(code(srvrig::zero_port_start))]
    ZeroPortStart {
        #[source_code]
        src: NamedSource<String>,
        #[label("port 0 asks the OS for a random port")]
        span: SourceSpan,
        category: String,
    },

    #[error("ports.scan_limit must be at least 1")]
    #[diagnostic(code(srvrig::zero_scan_limit))]
    ZeroScanLimit {
        #[source_code]
        src: NamedSource<String>,
        #[label("scan limit is 0")]
        span: SourceSpan,
    },
}

/// Build the diagnostic for an app name that is not in the config.
pub fn unknown_app(app: &str, known: &[String]) -> ConfigDiagnostic {
    let advice = match find_closest_match(app, known) {
        Some(s) => format!("did you mean `{}`?", s),
        None => format!("available apps: {:?}", known),
    };
    ConfigDiagnostic::UnknownApp {
        advice,
        app: app.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Source span helpers
// ---------------------------------------------------------------------------

/// Find the byte span of `field`'s value inside the TOML table `header`.
fn find_field_span(source: &str, header: &str, field: &str) -> SourceSpan {
    let search_start = source.find(header).unwrap_or(0);
    let after_header = &source[search_start..];

    for prefix in [format!("{} =", field), format!("{}=", field)] {
        if let Some(rel_pos) = after_header.find(&prefix) {
            let abs_pos = search_start + rel_pos;
            if let Some(eq) = source[abs_pos..].find('=') {
                let val_start = abs_pos + eq + 1;
                let val_trimmed = source[val_start..].trim_start();
                let trim_offset = val_start + (source[val_start..].len() - val_trimmed.len());
                let val_end = val_trimmed.find('\n').unwrap_or(val_trimmed.len());
                return (trim_offset, val_end).into();
            }
        }
    }

    match source.find(header) {
        Some(pos) => (pos, header.len()).into(),
        None => (0, 0).into(),
    }
}

// ---------------------------------------------------------------------------
// Similarity suggestions
// ---------------------------------------------------------------------------

fn find_closest_match<'a>(name: &str, candidates: &'a [String]) -> Option<&'a str> {
    let mut best: Option<(&str, f64)> = None;
    for candidate in candidates {
        let score = strsim::jaro_winkler(name, candidate);
        if score >= 0.8 && best.is_none_or(|(_, s)| score > s) {
            best = Some((candidate.as_str(), score));
        }
    }
    best.map(|(name, _)| name)
}

// ---------------------------------------------------------------------------
// Main validation function
// ---------------------------------------------------------------------------

pub fn validate(
    config: &SrvrigConfig,
    source: &str,
    filename: &str,
) -> Result<(), Vec<ConfigDiagnostic>> {
    let mut errors = Vec::new();
    let src = NamedSource::new(filename, source.to_string());

    for (name, app) in &config.apps {
        let header = format!("[apps.{}]", name);
        for (field, value) in [
            ("context_file_name", &app.context_file_name),
            ("war_name", &app.war_name),
            ("project_path", &app.project_path),
        ] {
            if value.trim().is_empty() {
                errors.push(ConfigDiagnostic::EmptyField {
                    src: src.clone(),
                    span: find_field_span(source, &header, field),
                    app: name.clone(),
                    field: field.to_string(),
                });
            }
        }
    }

    let ports = &config.ports;
    let starts = [
        ("main", ports.main),
        ("server", ports.server),
        ("debug", ports.debug),
        ("connector", ports.connector),
        ("redirect", ports.redirect),
    ];

    let mut by_port: BTreeMap<u16, Vec<String>> = BTreeMap::new();
    for (category, port) in starts {
        if port == 0 {
            errors.push(ConfigDiagnostic::ZeroPortStart {
                src: src.clone(),
                span: find_field_span(source, "[ports]", category),
                category: category.to_string(),
            });
            continue;
        }
        by_port.entry(port).or_default().push(category.to_string());
    }
    for (port, categories) in by_port {
        if categories.len() > 1 {
            errors.push(ConfigDiagnostic::DuplicatePortStart {
                src: src.clone(),
                span: find_field_span(source, "[ports]", &categories[1]),
                port,
                categories,
            });
        }
    }

    if ports.scan_limit == 0 {
        errors.push(ConfigDiagnostic::ZeroScanLimit {
            src: src.clone(),
            span: find_field_span(source, "[ports]", "scan_limit"),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
