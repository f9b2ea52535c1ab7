use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use common::{JobDoneResponse, JobSnapshot, TaskState};
use reqwest::Client;
use std::{env, time::Duration};

/// Igual que en el worker:
/// - En Docker: MASTER_URL=http://master:8080
/// - Local: default http://localhost:8080
fn master_base_url() -> String {
    env::var("MASTER_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI simple para consultar al master")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Muestra fase, contadores y la tabla de tareas
    Status {
        /// Lista también cada tarea
        #[arg(long)]
        tasks: bool,
    },
    /// Imprime true/false según si el job terminó
    Done,
    /// Bloquea hasta que el job termine
    Wait {
        /// Intervalo de sondeo en milisegundos
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Tiempo máximo de espera en segundos (0 = sin límite)
        #[arg(long, default_value_t = 0)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base_url = master_base_url();

    match cli.command {
        Commands::Status { tasks } => {
            let url = format!("{}/api/v1/job", base_url);
            let resp = client.get(&url).send().await?;
            if !resp.status().is_success() {
                bail!("el master respondió {}", resp.status());
            }

            let job: JobSnapshot = resp.json().await?;
            print_snapshot(&job, tasks);
        }
        Commands::Done => {
            println!("{}", job_done(&client, &base_url).await?);
        }
        Commands::Wait {
            interval_ms,
            timeout_secs,
        } => {
            let started = std::time::Instant::now();
            loop {
                // el master puede estar reiniciando: seguimos sondeando
                match job_done(&client, &base_url).await {
                    Ok(true) => {
                        println!("job terminado");
                        break;
                    }
                    Ok(false) => {}
                    Err(e) => eprintln!("no se pudo consultar al master: {e}"),
                }

                if timeout_secs > 0 && started.elapsed() > Duration::from_secs(timeout_secs) {
                    bail!("el job no terminó en {}s", timeout_secs);
                }
                tokio::time::sleep(Duration::from_millis(interval_ms)).await;
            }
        }
    }

    Ok(())
}

async fn job_done(client: &Client, base_url: &str) -> Result<bool> {
    let url = format!("{}/api/v1/job/done", base_url);
    let resp = client.get(&url).send().await?.error_for_status()?;
    let body: JobDoneResponse = resp.json().await?;
    Ok(body.done)
}

fn print_snapshot(job: &JobSnapshot, with_tasks: bool) {
    println!("Job:");
    println!("  fase: {:?}", job.phase);
    println!(
        "  maps: {}/{} pendientes",
        job.map_tasks_remaining, job.num_map_tasks
    );
    println!(
        "  reduces: {}/{} pendientes",
        job.reduce_tasks_remaining, job.num_reduce_tasks
    );
    println!("  reasignaciones: {}", job.reassignments);
    println!("  reportes stale: {}", job.stale_reports);
    println!("  enviado: {}", job.submitted_at);
    if let Some(finished) = job.finished_at {
        println!("  terminado: {}", finished);
    }

    if with_tasks {
        println!("Tareas:");
        for t in &job.tasks {
            let owner = match t.state {
                TaskState::InProgress => t.assigned_worker.as_deref().unwrap_or("?"),
                _ => "-",
            };
            println!(
                "  {:?} #{:<4} {:<11} epoch={:<3} worker={}",
                t.phase,
                t.index,
                format!("{:?}", t.state),
                t.epoch,
                owner
            );
        }
    }
}
