use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use backon::{BlockingRetryable, ConstantBuilder};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::substitute::{FileSubstitutor, Substitute, TemplateError};
use super::{SubstitutionMap, TemplateTarget};

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("templates '{first}' and '{second}' both write {}", path.display())]
    SharedTarget {
        path: PathBuf,
        first: String,
        second: String,
    },
    #[error("failed to generate mandatory configuration: {}", targets.join(", "))]
    Failed { targets: Vec<String> },
    #[error("template task aborted: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// What happened to one target.
#[derive(Debug)]
pub enum TargetOutcome {
    Verified { attempts: u32 },
    Skipped,
    Failed(TemplateError),
}

#[derive(Debug)]
pub struct TargetReport {
    pub label: String,
    pub path: PathBuf,
    pub mandatory: bool,
    pub outcome: TargetOutcome,
}

/// Per-target outcomes, in the order the targets were given.
#[derive(Debug, Default)]
pub struct GenerationReport {
    pub targets: Vec<TargetReport>,
}

impl GenerationReport {
    pub fn get(&self, label: &str) -> Option<&TargetReport> {
        self.targets.iter().find(|t| t.label == label)
    }

    pub fn failed(&self) -> impl Iterator<Item = &TargetReport> {
        self.targets
            .iter()
            .filter(|t| matches!(t.outcome, TargetOutcome::Failed(_)))
    }
}

/// Applies one [`SubstitutionMap`] to every target of an instance. Targets
/// run concurrently; each gets one retry when verification finds a token.
pub struct ConfigGenerator<S = FileSubstitutor> {
    substitutor: Arc<S>,
    retry_delay: Duration,
}

impl ConfigGenerator {
    pub fn new(retry_delay: Duration) -> Self {
        Self::with_substitutor(FileSubstitutor, retry_delay)
    }
}

impl<S: Substitute> ConfigGenerator<S> {
    pub fn with_substitutor(substitutor: S, retry_delay: Duration) -> Self {
        Self {
            substitutor: Arc::new(substitutor),
            retry_delay,
        }
    }

    pub async fn generate(
        &self,
        targets: Vec<TemplateTarget>,
        map: Arc<SubstitutionMap>,
    ) -> Result<GenerationReport, GenerateError> {
        reject_shared_paths(&targets)?;

        let total = targets.len();
        let mut set = JoinSet::new();
        for (index, target) in targets.into_iter().enumerate() {
            let substitutor = Arc::clone(&self.substitutor);
            let map = Arc::clone(&map);
            let delay = self.retry_delay;
            set.spawn_blocking(move || {
                let outcome = render_target(substitutor.as_ref(), &target, &map, delay);
                (
                    index,
                    TargetReport {
                        mandatory: target.is_mandatory(),
                        label: target.label,
                        path: target.path,
                        outcome,
                    },
                )
            });
        }

        let mut slots: Vec<Option<TargetReport>> = (0..total).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            let (index, report) = joined?;
            slots[index] = Some(report);
        }
        let report = GenerationReport {
            targets: slots.into_iter().flatten().collect(),
        };

        let mut fatal = Vec::new();
        for target in report.failed() {
            if let TargetOutcome::Failed(err) = &target.outcome {
                error!(template = %target.label, mandatory = target.mandatory, "{err}");
            }
            if target.mandatory {
                fatal.push(target.label.clone());
            }
        }
        if !fatal.is_empty() {
            return Err(GenerateError::Failed { targets: fatal });
        }

        info!(targets = report.targets.len(), "configuration generated");
        Ok(report)
    }
}

fn reject_shared_paths(targets: &[TemplateTarget]) -> Result<(), GenerateError> {
    let mut owners: HashMap<&PathBuf, &str> = HashMap::new();
    for target in targets {
        if let Some(first) = owners.insert(&target.path, &target.label) {
            return Err(GenerateError::SharedTarget {
                path: target.path.clone(),
                first: first.to_string(),
                second: target.label.clone(),
            });
        }
    }
    Ok(())
}

fn render_target<S: Substitute>(
    substitutor: &S,
    target: &TemplateTarget,
    map: &SubstitutionMap,
    retry_delay: Duration,
) -> TargetOutcome {
    if target.is_disabled() {
        return match std::fs::remove_file(&target.path) {
            Ok(()) => {
                debug!(template = %target.label, "disabled, removed");
                TargetOutcome::Skipped
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => TargetOutcome::Skipped,
            Err(source) => TargetOutcome::Failed(TemplateError::Write {
                path: target.path.clone(),
                source,
            }),
        };
    }

    let mut attempts = 0u32;
    let result = (|| {
        attempts += 1;
        substitutor.apply(target, map)?;
        substitutor.verify(target)
    })
    .retry(
        ConstantBuilder::default()
            .with_delay(retry_delay)
            .with_max_times(1),
    )
    .sleep(std::thread::sleep)
    .when(TemplateError::is_retryable)
    .notify(|err: &TemplateError, dur: Duration| {
        warn!(template = %target.label, "{err}, retrying in {dur:?}");
    })
    .call();

    match result {
        Ok(()) => TargetOutcome::Verified { attempts },
        Err(err) => TargetOutcome::Failed(err),
    }
}
