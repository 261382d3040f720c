//! Analysis command handlers for the CLI.

use churnwatch_analysis::{Dashboard, JobOrchestrator, JobSnapshot, SpikeCheck};
use churnwatch_core::JobStatus;
use serde::Serialize;

/// `analyze --json` output: the finished job and, once it completed, its
/// spike check.
#[derive(Debug, Serialize)]
pub(crate) struct AnalyzeReport<'a> {
    pub job: &'a JobSnapshot,
    pub spike_check: Option<&'a SpikeCheck>,
}

/// Create a job, run it to completion in the foreground and print it.
///
/// A completed job is followed by a spike check so subscribers are alerted
/// the same way the server would. With `json` both are printed as one
/// [`AnalyzeReport`].
///
/// # Errors
///
/// Returns an error for an invalid product name, a store failure, or a job
/// that ends in `failed`.
pub(crate) async fn run_analyze(
    orchestrator: &JobOrchestrator,
    product: &str,
    json: bool,
) -> anyhow::Result<()> {
    let submitted = orchestrator.create(product).await?;
    tracing::info!(
        job_id = submitted.job_id,
        product = submitted.product_name.as_str(),
        "running analysis"
    );

    let status = orchestrator
        .run(submitted.job_id, &submitted.product_name)
        .await;

    let snapshot = orchestrator
        .get_status(submitted.job_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("job {} disappeared", submitted.job_id))?;

    if status != JobStatus::Completed {
        if json {
            println!("{}", format_analyze_json(&snapshot, None)?);
        } else {
            print!("{}", format_snapshot(&snapshot));
        }
        anyhow::bail!(
            "job {} failed: {}",
            submitted.job_id,
            snapshot.job.error_message.as_deref().unwrap_or("unknown error")
        );
    }

    let check = orchestrator.check_spike(submitted.job_id).await?;
    if json {
        println!("{}", format_analyze_json(&snapshot, Some(&check))?);
    } else {
        print!("{}", format_snapshot(&snapshot));
        print!("{}", format_spike_check(&check));
    }
    Ok(())
}

pub(crate) fn format_analyze_json(
    snapshot: &JobSnapshot,
    check: Option<&SpikeCheck>,
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&AnalyzeReport {
        job: snapshot,
        spike_check: check,
    })
}

/// # Errors
///
/// Returns an error if the job does not exist or the store fails.
pub(crate) async fn run_status(orchestrator: &JobOrchestrator, job_id: i64) -> anyhow::Result<()> {
    let snapshot = orchestrator
        .get_status(job_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("job {job_id} not found"))?;
    print!("{}", format_snapshot(&snapshot));
    Ok(())
}

/// # Errors
///
/// Returns an error for an invalid product name or a store failure.
pub(crate) async fn run_dashboard(
    orchestrator: &JobOrchestrator,
    product: &str,
    json: bool,
) -> anyhow::Result<()> {
    let dashboard = orchestrator.dashboard(product).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&dashboard)?);
    } else {
        print!("{}", format_dashboard(product, &dashboard));
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the job does not exist or the store fails.
pub(crate) async fn run_check_spike(
    orchestrator: &JobOrchestrator,
    job_id: i64,
) -> anyhow::Result<()> {
    let check = orchestrator.check_spike(job_id).await?;
    print!("{}", format_spike_check(&check));
    Ok(())
}

pub(crate) fn format_snapshot(snapshot: &JobSnapshot) -> String {
    let job = &snapshot.job;
    let mut out = format!(
        "job {} ({}): {}% {}\n",
        job.id,
        job.status,
        snapshot.progress.percent,
        snapshot.progress.stage.as_str()
    );

    if job.status == JobStatus::Completed {
        out.push_str(&format!(
            "  comments: {} (+{} / -{} / ={})\n",
            job.total_comments, job.positive_count, job.negative_count, job.neutral_count
        ));
        if let Some(avg) = job.avg_sentiment {
            out.push_str(&format!("  avg sentiment: {avg:.3}\n"));
        }
        if let Some(risk) = job.churn_risk {
            let band = churnwatch_core::RiskBand::from_probability(risk);
            out.push_str(&format!("  churn risk: {risk:.3} ({})\n", band.as_str()));
        }
    }
    if let Some(message) = &job.error_message {
        out.push_str(&format!("  error: {message}\n"));
    }
    out
}

fn format_dashboard(product: &str, dashboard: &Dashboard) -> String {
    let Some(job) = &dashboard.job else {
        return format!("no completed analysis for {product}\n");
    };

    let dist = dashboard.distribution;
    let mut out = format!(
        "{product}: job {} completed {}\n  positive {:.1}% / negative {:.1}% / neutral {:.1}%\n",
        job.id,
        job.completed_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_default(),
        dist.positive,
        dist.negative,
        dist.neutral,
    );
    if let Some(band) = dashboard.risk_band {
        out.push_str(&format!("  risk band: {}\n", band.as_str()));
    }
    for topic in &dashboard.topics {
        out.push_str(&format!(
            "  topic {}: {} mentions [{}]\n",
            topic.name,
            topic.mention_count,
            topic.keywords.join(", ")
        ));
    }
    out
}

fn format_spike_check(check: &SpikeCheck) -> String {
    match &check.spike {
        None => format!("job {}: no change\n", check.job_id),
        Some(spike) => format!(
            "job {}: {} of {:.1} points ({:.1}% -> {:.1}%); notified {}, failed {}\n",
            check.job_id,
            spike.kind.as_str(),
            spike.change_percentage,
            spike.previous_ratio,
            spike.current_ratio,
            check.notified,
            check.failed_notifications
        ),
    }
}
