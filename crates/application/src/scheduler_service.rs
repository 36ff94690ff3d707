use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use strata_core::AppResult;
use strata_domain::LifecycleSettings;
use tracing::{info, warn};

use crate::evaluation_service::{EvaluationService, EvaluationSummary};
use crate::execution_service::{ExecutionReport, ExecutionService};
use crate::lifecycle_ports::{
    ExecutionScope, SettingsRepository, TaskRun, TaskRunRepository, TaskRunStatus,
};
use crate::tracking_service::{RefreshSummary, TrackingService};

/// Task name of the access refresh step.
pub const REFRESH_TASK: &str = "refresh_access";
/// Task name of the policy evaluation step.
pub const EVALUATE_TASK: &str = "evaluate_policies";
/// Task name of the execution step.
pub const EXECUTE_TASK: &str = "execute_actions";

/// Outcome of one scheduled cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    /// Refresh counters, when the step succeeded.
    pub refresh: Option<RefreshSummary>,
    /// Evaluation counters, when the step succeeded.
    pub evaluation: Option<EvaluationSummary>,
    /// Execution report, when the step ran.
    pub execution: Option<ExecutionReport>,
    /// Whether execution was skipped because of the emergency stop.
    pub halted: bool,
}

/// Runs refresh, evaluation and execution as one cycle and administers settings.
#[derive(Clone)]
pub struct SchedulerService {
    tracking: TrackingService,
    evaluation: EvaluationService,
    execution: ExecutionService,
    settings: Arc<dyn SettingsRepository>,
    task_runs: Arc<dyn TaskRunRepository>,
}

impl SchedulerService {
    /// Creates a scheduler service.
    #[must_use]
    pub fn new(
        tracking: TrackingService,
        evaluation: EvaluationService,
        execution: ExecutionService,
        settings: Arc<dyn SettingsRepository>,
        task_runs: Arc<dyn TaskRunRepository>,
    ) -> Self {
        Self {
            tracking,
            evaluation,
            execution,
            settings,
            task_runs,
        }
    }

    /// Runs one refresh, evaluate, execute cycle.
    ///
    /// A failing step is recorded and does not prevent later steps.
    pub async fn run_cycle(&self, max_actions: usize) -> AppResult<CycleReport> {
        let refresh = self
            .track(REFRESH_TASK, self.tracking.refresh_all(), |summary| {
                format!(
                    "objects={} refreshed={} skipped={}",
                    summary.objects, summary.refreshed, summary.skipped
                )
            })
            .await?;

        let evaluation = self
            .track(EVALUATE_TASK, self.evaluation.evaluate_all(), |summary| {
                format!(
                    "policies={} queued={} marked_ineligible={}",
                    summary.policies, summary.queued, summary.marked_ineligible
                )
            })
            .await?;

        if self.settings.is_emergency_stopped().await? {
            let now = Utc::now();
            self.task_runs
                .save_task_run(TaskRun {
                    task_name: EXECUTE_TASK.to_owned(),
                    status: TaskRunStatus::Halted,
                    detail: Some("emergency stop is active".to_owned()),
                    started_at: now,
                    finished_at: Some(now),
                })
                .await?;
            warn!("scheduled execution skipped by emergency stop");

            return Ok(CycleReport {
                refresh,
                evaluation,
                execution: None,
                halted: true,
            });
        }

        let execution = self
            .track(
                EXECUTE_TASK,
                self.execution.execute(max_actions, false, ExecutionScope::All),
                |report| {
                    format!(
                        "planned={} succeeded={} failed={}",
                        report.planned.len(),
                        report.succeeded,
                        report.failed
                    )
                },
            )
            .await?;
        let halted = execution.as_ref().is_some_and(|report| report.halted);

        Ok(CycleReport {
            refresh,
            evaluation,
            execution,
            halted,
        })
    }

    /// Lists the latest run of every task.
    pub async fn list_task_runs(&self) -> AppResult<Vec<TaskRun>> {
        self.task_runs.list_task_runs().await
    }

    /// Returns the current settings.
    pub async fn settings(&self) -> AppResult<LifecycleSettings> {
        self.settings.load_settings().await
    }

    /// Replaces the settings.
    pub async fn update_settings(&self, settings: LifecycleSettings) -> AppResult<LifecycleSettings> {
        self.settings.save_settings(settings).await?;
        info!(
            auto_merge = settings.auto_merge(),
            frozen_split = settings.frozen_split(),
            emergency_stop = settings.emergency_stop(),
            "lifecycle settings updated"
        );
        Ok(settings)
    }

    /// Sets or clears the emergency stop.
    pub async fn set_emergency_stop(&self, stopped: bool) -> AppResult<LifecycleSettings> {
        let settings = self
            .settings
            .load_settings()
            .await?
            .with_emergency_stop(stopped);
        self.settings.save_settings(settings).await?;

        if stopped {
            warn!("emergency stop engaged");
        } else {
            info!("emergency stop released");
        }
        Ok(settings)
    }

    async fn track<T, F>(
        &self,
        task_name: &str,
        task: F,
        describe: impl FnOnce(&T) -> String,
    ) -> AppResult<Option<T>>
    where
        F: Future<Output = AppResult<T>>,
    {
        let started_at = Utc::now();
        self.task_runs
            .save_task_run(TaskRun {
                task_name: task_name.to_owned(),
                status: TaskRunStatus::Running,
                detail: None,
                started_at,
                finished_at: None,
            })
            .await?;

        let (status, detail, output) = match task.await {
            Ok(output) => (TaskRunStatus::Succeeded, describe(&output), Some(output)),
            Err(error) => {
                warn!(task = task_name, error = %error, "scheduled task failed");
                (TaskRunStatus::Failed, error.to_string(), None)
            }
        };

        self.task_runs
            .save_task_run(TaskRun {
                task_name: task_name.to_owned(),
                status,
                detail: Some(detail),
                started_at,
                finished_at: Some(Utc::now()),
            })
            .await?;

        Ok(output)
    }
}
