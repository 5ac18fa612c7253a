//! Static task graph and its executor.

use chrono::{DateTime, Utc};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::artifact::{ArtifactRef, ArtifactStore};
use super::steps::{PipelineStep, StepContext, StepResult};
use crate::error::{EltError, Result};
use crate::metrics::PipelineMetrics;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Succeeded,
    Failed(String),
    /// Not started because `upstream` failed or was itself skipped.
    Skipped { upstream: String },
}

#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub unit: &'static str,
    pub state: TaskState,
    pub duration: Duration,
    pub artifact: Option<ArtifactRef>,
    pub rows: usize,
    pub message: String,
    /// Position in completion order; skipped units have none.
    pub finished: Option<usize>,
}

/// Outcome of one run of the graph.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// One entry per unit, in topological order.
    pub outcomes: Vec<TaskOutcome>,
    failures: Vec<(&'static str, EltError)>,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn outcome(&self, unit: &str) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| o.unit == unit)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }

    /// Units that failed, with their errors, in failure order.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &EltError)> {
        self.failures.iter().map(|(unit, e)| (*unit, e))
    }

    /// The first failure as `EltError::Task`, naming the originating unit.
    pub fn into_result(mut self) -> Result<RunReport> {
        if self.failures.is_empty() {
            return Ok(self);
        }
        let (task, source) = self.failures.remove(0);
        Err(EltError::Task {
            task: task.to_string(),
            source: Box::new(source),
        })
    }
}

/// A validated DAG of pipeline steps.
pub struct TaskGraph {
    steps: Vec<Arc<dyn PipelineStep>>,
    deps: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
    order: Vec<usize>,
}

impl TaskGraph {
    /// Validate names, dependencies and acyclicity.
    pub fn new(steps: Vec<Arc<dyn PipelineStep>>) -> Result<Self> {
        let mut index: HashMap<&'static str, usize> = HashMap::new();
        for (i, step) in steps.iter().enumerate() {
            if index.insert(step.step_name(), i).is_some() {
                return Err(EltError::Graph(format!("duplicate unit '{}'", step.step_name())));
            }
        }

        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..steps.len()).map(|i| graph.add_node(i)).collect();
        let mut deps = vec![Vec::new(); steps.len()];
        let mut dependents = vec![Vec::new(); steps.len()];
        for (i, step) in steps.iter().enumerate() {
            for dep in step.dependencies() {
                let d = *index.get(dep).ok_or_else(|| {
                    EltError::Graph(format!(
                        "unit '{}' depends on unknown unit '{}'",
                        step.step_name(),
                        dep
                    ))
                })?;
                if !deps[i].contains(&d) {
                    deps[i].push(d);
                    dependents[d].push(i);
                    graph.add_edge(nodes[d], nodes[i], ());
                }
            }
        }

        let order = toposort(&graph, None)
            .map_err(|cycle| {
                let unit = steps[graph[cycle.node_id()]].step_name();
                EltError::Graph(format!("dependency cycle through unit '{unit}'"))
            })?
            .into_iter()
            .map(|node| graph[node])
            .collect();

        Ok(Self {
            steps,
            deps,
            dependents,
            order,
        })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Units in a valid execution order, each with its dependencies.
    pub fn units(&self) -> Vec<(&'static str, Vec<&'static str>)> {
        self.order
            .iter()
            .map(|&i| {
                let deps = self.deps[i].iter().map(|&d| self.steps[d].step_name()).collect();
                (self.steps[i].step_name(), deps)
            })
            .collect()
    }

    /// Execute every unit once. Independent units run concurrently; a failure
    /// skips everything downstream of it while unrelated branches continue.
    pub async fn run(&self, store: Arc<dyn ArtifactStore>) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        info!(%run_id, units = self.len(), "🚀 Starting pipeline run");

        let n = self.steps.len();
        let mut waiting_on: Vec<usize> = self.deps.iter().map(Vec::len).collect();
        let mut consumers_left: Vec<usize> = self.dependents.iter().map(Vec::len).collect();
        let mut produced: Vec<Option<ArtifactRef>> = vec![None; n];
        let mut outcomes: Vec<Option<TaskOutcome>> = vec![None; n];
        let mut failures = Vec::new();
        let mut finished = 0usize;
        let mut running: JoinSet<(usize, Result<StepResult>, Duration)> = JoinSet::new();
        // Units whose supervisor has not reported back yet.
        let mut in_flight = vec![false; n];
        let mut lost = Vec::new();

        for &i in &self.order {
            if waiting_on[i] == 0 {
                self.spawn_unit(&mut running, i, run_id, &produced, &store);
                in_flight[i] = true;
            }
        }

        while let Some(joined) = running.join_next().await {
            let (i, result, duration) = match joined {
                Ok(done) => done,
                Err(e) => {
                    error!(%run_id, error = %e, "Unit supervisor ended unexpectedly");
                    lost.push(e.to_string());
                    continue;
                }
            };
            in_flight[i] = false;
            let unit = self.steps[i].step_name();

            let result = match result {
                Ok(step) => self.store_output(i, step, consumers_left[i], &store).await,
                Err(e) => Err(e),
            };

            // This unit no longer needs its inputs.
            for &d in &self.deps[i] {
                self.consume(d, &mut consumers_left, &mut produced, &store).await;
            }

            match result {
                Ok((step, artifact)) => {
                    info!(%run_id, unit, rows = step.processed_count, ?duration, "✅ {}", step.message);
                    PipelineMetrics::record_unit_success(unit, step.processed_count, duration);
                    produced[i] = artifact.clone();
                    outcomes[i] = Some(TaskOutcome {
                        unit,
                        state: TaskState::Succeeded,
                        duration,
                        artifact,
                        rows: step.processed_count,
                        message: step.message,
                        finished: Some(finished),
                    });
                    finished += 1;

                    for &j in &self.dependents[i] {
                        waiting_on[j] -= 1;
                        if waiting_on[j] == 0 && outcomes[j].is_none() {
                            self.spawn_unit(&mut running, j, run_id, &produced, &store);
                            in_flight[j] = true;
                        }
                    }
                }
                Err(e) => {
                    error!(%run_id, unit, error = %e, "❌ Unit failed");
                    PipelineMetrics::record_unit_failure(unit, duration);
                    outcomes[i] = Some(TaskOutcome {
                        unit,
                        state: TaskState::Failed(e.to_string()),
                        duration,
                        artifact: None,
                        rows: 0,
                        message: e.to_string(),
                        finished: Some(finished),
                    });
                    finished += 1;
                    failures.push((unit, e));
                    self.skip_downstream(i, run_id, &mut outcomes, &mut consumers_left, &mut produced, &store)
                        .await;
                }
            }
        }

        // A supervisor that never reported back counts as a failure of its unit.
        for i in (0..n).filter(|&i| in_flight[i]) {
            let unit = self.steps[i].step_name();
            let e = EltError::Aborted(format!("unit supervisor ended unexpectedly: {}", lost.join("; ")));
            error!(%run_id, unit, error = %e, "❌ Unit failed");
            PipelineMetrics::record_unit_failure(unit, Duration::ZERO);
            outcomes[i] = Some(TaskOutcome {
                unit,
                state: TaskState::Failed(e.to_string()),
                duration: Duration::ZERO,
                artifact: None,
                rows: 0,
                message: e.to_string(),
                finished: Some(finished),
            });
            finished += 1;
            failures.push((unit, e));
            for &d in &self.deps[i] {
                self.consume(d, &mut consumers_left, &mut produced, &store).await;
            }
            self.skip_downstream(i, run_id, &mut outcomes, &mut consumers_left, &mut produced, &store)
                .await;
        }

        // Anything never started lost its supervisor upstream.
        for &i in &self.order {
            if outcomes[i].is_none() {
                outcomes[i] = Some(TaskOutcome {
                    unit: self.steps[i].step_name(),
                    state: TaskState::Skipped {
                        upstream: "aborted".to_string(),
                    },
                    duration: Duration::ZERO,
                    artifact: None,
                    rows: 0,
                    message: "skipped: run aborted".to_string(),
                    finished: None,
                });
            }
        }
        for reference in produced.iter_mut().filter_map(Option::take) {
            if let Err(e) = store.release(&reference).await {
                warn!(%run_id, artifact = %reference, error = %e, "Failed to release artifact");
            }
        }

        let report = RunReport {
            run_id,
            started_at,
            completed_at: Utc::now(),
            outcomes: self
                .order
                .iter()
                .filter_map(|&i| outcomes[i].take())
                .collect(),
            failures,
        };
        PipelineMetrics::record_run(report.success(), clock.elapsed());
        if report.success() {
            info!(%run_id, elapsed = ?clock.elapsed(), "🎉 Pipeline run completed successfully");
        } else {
            error!(%run_id, failed = report.failures.len(), "💥 Pipeline run failed");
        }
        report
    }

    fn spawn_unit(
        &self,
        running: &mut JoinSet<(usize, Result<StepResult>, Duration)>,
        i: usize,
        run_id: Uuid,
        produced: &[Option<ArtifactRef>],
        store: &Arc<dyn ArtifactStore>,
    ) {
        let step = Arc::clone(&self.steps[i]);
        let unit = step.step_name();
        let inputs: Vec<(&'static str, ArtifactRef)> = self.deps[i]
            .iter()
            .filter_map(|&d| produced[d].clone().map(|r| (self.steps[d].step_name(), r)))
            .collect();
        let store = Arc::clone(store);
        let span = info_span!("unit", unit, %run_id);

        running.spawn(
            async move {
                let clock = Instant::now();
                let mut loaded = BTreeMap::new();
                for (upstream, reference) in inputs {
                    match store.get(&reference).await {
                        Ok(artifact) => {
                            loaded.insert(upstream, artifact);
                        }
                        Err(e) => return (i, Err(e), clock.elapsed()),
                    }
                }
                let ctx = StepContext::new(run_id, loaded);
                info!("🔄 Executing unit {}", unit);
                let handle = tokio::spawn(async move { step.execute(&ctx).await }.in_current_span());
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(EltError::Aborted(e.to_string())),
                };
                (i, result, clock.elapsed())
            }
            .instrument(span),
        );
    }

    /// Mark every not-yet-settled transitive dependent of `i` as skipped and
    /// drop its claims on upstream artifacts.
    async fn skip_downstream(
        &self,
        i: usize,
        run_id: Uuid,
        outcomes: &mut [Option<TaskOutcome>],
        consumers_left: &mut [usize],
        produced: &mut [Option<ArtifactRef>],
        store: &Arc<dyn ArtifactStore>,
    ) {
        for (k, upstream) in self.downstream_of(i) {
            if outcomes[k].is_some() {
                continue;
            }
            let skipped = self.steps[k].step_name();
            warn!(%run_id, unit = skipped, upstream, "⏭️ Skipping unit");
            PipelineMetrics::record_unit_skipped(skipped);
            outcomes[k] = Some(TaskOutcome {
                unit: skipped,
                state: TaskState::Skipped {
                    upstream: upstream.to_string(),
                },
                duration: Duration::ZERO,
                artifact: None,
                rows: 0,
                message: format!("skipped: upstream unit '{upstream}' did not succeed"),
                finished: None,
            });
            for &d in &self.deps[k] {
                self.consume(d, consumers_left, produced, store).await;
            }
        }
    }

    /// Put a step's artifact in the store if anyone downstream still wants it.
    async fn store_output(
        &self,
        i: usize,
        step: StepResult,
        consumers: usize,
        store: &Arc<dyn ArtifactStore>,
    ) -> Result<(StepResult, Option<ArtifactRef>)> {
        let reference = match (&step.artifact, consumers) {
            (Some(artifact), c) if c > 0 => Some(store.put(artifact.clone()).await?),
            _ => None,
        };
        if step.artifact.is_some() && reference.is_none() {
            info!(unit = self.steps[i].step_name(), "Artifact has no remaining consumers, not stored");
        }
        Ok((step, reference))
    }

    async fn consume(
        &self,
        d: usize,
        consumers_left: &mut [usize],
        produced: &mut [Option<ArtifactRef>],
        store: &Arc<dyn ArtifactStore>,
    ) {
        consumers_left[d] = consumers_left[d].saturating_sub(1);
        if consumers_left[d] == 0 {
            if let Some(reference) = produced[d].take() {
                if let Err(e) = store.release(&reference).await {
                    warn!(artifact = %reference, error = %e, "Failed to release artifact");
                }
            }
        }
    }

    /// Transitive dependents of `i`, breadth first, each paired with the
    /// upstream unit that blocks it.
    fn downstream_of(&self, i: usize) -> Vec<(usize, &'static str)> {
        let mut seen = vec![false; self.steps.len()];
        let mut queue = VecDeque::from([i]);
        let mut out = Vec::new();
        while let Some(u) = queue.pop_front() {
            for &k in &self.dependents[u] {
                if !seen[k] {
                    seen[k] = true;
                    out.push((k, self.steps[u].step_name()));
                    queue.push_back(k);
                }
            }
        }
        out
    }
}
