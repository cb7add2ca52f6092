//! `xfer job add|edit|list|show`.

use anyhow::{Context, Result};
use xfer_core::job_db::{EndpointRef, Job, JobDb, JobRequest, TransferOptions};

use crate::cli::JobEndpoints;

pub async fn run_job_add(
    db: &JobDb,
    name: String,
    endpoints: JobEndpoints,
    transfers: u32,
    bwlimit: u32,
) -> Result<()> {
    let req = JobRequest {
        name,
        source: EndpointRef {
            remote_id: endpoints.source_remote,
            bucket: endpoints.source_bucket,
            path: endpoints.source_path,
        },
        target: EndpointRef {
            remote_id: endpoints.target_remote,
            bucket: endpoints.target_bucket,
            path: endpoints.target_path,
        },
        options: TransferOptions {
            transfers,
            bandwidth_limit_mib: bwlimit,
        },
    };
    let job = db.submit_job(&req).await?;
    println!(
        "Added job {}: {} -> {}",
        job.id, job.source_endpoint, job.target_endpoint
    );
    Ok(())
}

pub async fn run_job_edit(
    db: &JobDb,
    id: i64,
    transfers: Option<u32>,
    bwlimit: Option<u32>,
) -> Result<()> {
    let job = db
        .get_job(id)
        .await?
        .with_context(|| format!("job {id} not found"))?;
    let options = TransferOptions {
        transfers: transfers.unwrap_or(job.options.transfers),
        bandwidth_limit_mib: bwlimit.unwrap_or(job.options.bandwidth_limit_mib),
    };
    match db.update_options(id, &options).await? {
        Some(job) => println!(
            "Updated job {}: transfers={} bwlimit={}M",
            job.id, job.options.transfers, job.options.bandwidth_limit_mib
        ),
        None => anyhow::bail!("job {id} is {}; only NEW jobs can be edited", job.status),
    }
    Ok(())
}

fn size_column(job: &Job) -> String {
    job.total_bytes
        .map(|b| b.to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub async fn run_job_list(db: &JobDb) -> Result<()> {
    let jobs = db.list_jobs().await?;
    if jobs.is_empty() {
        println!("No jobs in database.");
        return Ok(());
    }
    println!("{:<6} {:<10} {:<12} {:<16} {}", "ID", "STATUS", "SIZE", "NAME", "ROUTE");
    for j in jobs {
        println!(
            "{:<6} {:<10} {:<12} {:<16} {} -> {}",
            j.id,
            j.status,
            size_column(&j),
            j.name,
            j.source_endpoint,
            j.target_endpoint
        );
    }
    Ok(())
}

pub async fn run_job_show(db: &JobDb, id: i64) -> Result<()> {
    let job = db
        .get_job(id)
        .await?
        .with_context(|| format!("job {id} not found"))?;
    let opt = |v: Option<i64>| v.map(|t| t.to_string()).unwrap_or_else(|| "-".into());

    println!("id:          {}", job.id);
    println!("name:        {}", job.name);
    println!("status:      {}", job.status);
    println!("source:      {}", job.source_endpoint);
    println!("target:      {}", job.target_endpoint);
    println!("transfers:   {}", job.options.transfers);
    println!("bwlimit:     {}M", job.options.bandwidth_limit_mib);
    println!("pid:         {}", opt(job.pid.map(i64::from)));
    println!("created_at:  {}", job.created_at);
    println!("started_at:  {}", opt(job.started_at));
    println!("ended_at:    {}", opt(job.ended_at));
    println!("total_bytes: {}", size_column(&job));
    Ok(())
}
