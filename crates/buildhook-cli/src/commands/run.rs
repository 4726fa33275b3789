//! Foreground job run.

use anyhow::Result;
use buildhook_config::RunnerSettings;
use buildhook_config::settings::{
    DEFAULT_IMAGE_NAMESPACE, DEFAULT_WORKING_DIR, resolve_deploy_config,
};
use buildhook_core::{BuildJob, PushEvent};
use buildhook_scheduler::dispatcher::job_dir;
use buildhook_scheduler::{JobReport, JobRunner};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Repository to clone
    #[arg(long)]
    clone_url: String,

    /// Commit to check out
    #[arg(long)]
    commit: String,

    /// Publish and roll out after building
    #[arg(long)]
    deploy: bool,

    /// Deployment config file (searched for when omitted)
    #[arg(long, env = "DEPLOY_CONFIG")]
    config: Option<PathBuf>,

    /// Base directory for the checkout
    #[arg(long, env = "WORKING_DIR", default_value = DEFAULT_WORKING_DIR)]
    working_dir: PathBuf,

    /// Prefix of local image tags
    #[arg(long, env = "IMAGE_NAMESPACE", default_value = DEFAULT_IMAGE_NAMESPACE)]
    image_namespace: String,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let event = PushEvent::new(&args.clone_url, &args.commit)?;
    let settings = RunnerSettings {
        deploy_config_path: resolve_deploy_config(
            args.deploy,
            args.config,
            &std::env::current_dir()?,
        ),
        working_dir: args.working_dir,
        image_namespace: args.image_namespace,
        ..Default::default()
    };

    let dir = job_dir(&settings.working_dir, &event.clone_url, &event.commit_ref);
    let job = BuildJob::new(event, dir).with_deploy(settings.deploy_config_path.clone());

    let runner = JobRunner::from_settings(&settings);
    let report = runner.run(&job).await?;
    print!("{}", render(&report));

    Ok(())
}

fn render(report: &JobReport) -> String {
    let mut out = format!("job {}\n", report.job_id);

    if report.built.is_empty() {
        out.push_str("no images built\n");
    }
    for (service, image) in &report.built {
        out.push_str(&format!("built      {} {}\n", service, image));
    }
    for (service, image) in report.published.iter().flatten() {
        out.push_str(&format!("published  {} {}\n", service, image));
    }
    if let Some(rollout) = &report.rollout {
        for (service, arn) in &rollout.updated {
            out.push_str(&format!("rolled out {} {}\n", service, arn));
        }
        for service in &rollout.skipped {
            out.push_str(&format!("skipped    {} (no deployment config)\n", service));
        }
    }
    out
}
