//! Fire-and-forget job dispatch.
//!
//! Each accepted push becomes a tokio task. Jobs for the same repository and
//! commit share a working directory and run one at a time; the total number
//! of running jobs is capped by a semaphore.

use buildhook_config::RunnerSettings;
use buildhook_core::{BuildJob, JobId, PushEvent};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::JobError;
use crate::runner::{JobReport, JobRunner};

/// Longest commit ref kept in a working directory name.
const MAX_REF_LEN: usize = 64;

type DirLocks = Arc<Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>>;

pub struct JobDispatcher {
    runner: Arc<JobRunner>,
    settings: RunnerSettings,
    permits: Arc<Semaphore>,
    dir_locks: DirLocks,
}

impl JobDispatcher {
    pub fn new(runner: Arc<JobRunner>, settings: RunnerSettings) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_jobs.max(1)));
        Self {
            runner,
            settings,
            permits,
            dir_locks: Arc::default(),
        }
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Stop starting jobs. Jobs still waiting for a slot end with
    /// [`JobError::Shutdown`]; running jobs are left to finish.
    pub fn shutdown(&self) {
        self.permits.close();
        info!("Job dispatcher closed");
    }

    /// Start a job for `event` in the background.
    ///
    /// Returns as soon as the task is spawned.
    pub fn dispatch(
        &self,
        event: PushEvent,
    ) -> (JobId, JoinHandle<Result<JobReport, JobError>>) {
        let working_dir = job_dir(&self.settings.working_dir, &event.clone_url, &event.commit_ref);
        let job =
            BuildJob::new(event, working_dir).with_deploy(self.settings.deploy_config_path.clone());
        let job_id = job.id;

        info!(
            job_id = %job_id,
            commit = %job.commit_ref,
            path = %job.working_dir.display(),
            "Dispatching build job"
        );

        let runner = self.runner.clone();
        let permits = self.permits.clone();
        let dir_locks = self.dir_locks.clone();

        let handle = tokio::spawn(async move {
            let dir_lock = lock_for(&dir_locks, &job.working_dir);
            let result = {
                let _dir_guard = dir_lock.lock().await;
                debug!(job_id = %job.id, "Acquired working directory");

                match permits.acquire_owned().await {
                    Ok(_permit) => runner.run(&job).await,
                    Err(_) => Err(JobError::Shutdown),
                }
            };
            release_lock(&dir_locks, &job.working_dir, dir_lock);
            result
        });

        (job_id, handle)
    }
}

fn lock_for(locks: &DirLocks, dir: &Path) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = locks.lock().unwrap_or_else(|e| e.into_inner());
    locks.entry(dir.to_path_buf()).or_default().clone()
}

/// Drop the map entry once no other job holds or waits on it.
fn release_lock(locks: &DirLocks, dir: &Path, lock: Arc<tokio::sync::Mutex<()>>) {
    let mut locks = locks.lock().unwrap_or_else(|e| e.into_inner());
    // One reference in the map, one here
    if Arc::strong_count(&lock) == 2 {
        locks.remove(dir);
    }
}

/// Working directory for a commit: `<base>/<md5(clone_url)>-<sanitized ref>`.
pub fn job_dir(base: &Path, clone_url: &str, commit_ref: &str) -> PathBuf {
    let url_hash = format!("{:x}", md5::compute(clone_url.as_bytes()));
    base.join(format!("{}-{}", url_hash, sanitize_ref(commit_ref)))
}

fn sanitize_ref(commit_ref: &str) -> String {
    commit_ref
        .chars()
        .take(MAX_REF_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
