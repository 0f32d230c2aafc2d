use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use shared::domain::{BloodRequest, OwnerId, RequestId};
use storage::{ReviewDecision, ReviewOutcome, Storage};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/requests.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Approve or reject a pending request.
    Review { request_id: RequestId, decision: Decision },
    /// List an owner's requests, newest first.
    List {
        #[arg(long)]
        owner: String,
    },
    Show { request_id: RequestId },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Decision {
    Approve,
    Reject,
}

impl From<Decision> for ReviewDecision {
    fn from(value: Decision) -> Self {
        match value {
            Decision::Approve => ReviewDecision::Approve,
            Decision::Reject => ReviewDecision::Reject,
        }
    }
}

fn print_request(request: &BloodRequest) {
    let hospitals = request
        .selected_hospitals
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|hospital| hospital.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    println!(
        "{} {} status={} patient={} blood_type={} urgency={} hospitals=[{}]",
        request.id,
        request.created_at.to_rfc3339(),
        request.status,
        request.details.patient_name,
        request.details.blood_type,
        request.details.urgency,
        hospitals
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::Review {
            request_id,
            decision,
        } => match storage
            .review_blood_request(request_id, decision.into())
            .await?
        {
            ReviewOutcome::Reviewed(request) => print_request(&request),
            ReviewOutcome::AlreadyReviewed(status) => {
                bail!("request {request_id} was already reviewed (status={status})")
            }
            ReviewOutcome::NotFound => bail!("request {request_id} not found"),
        },
        Command::List { owner } => {
            let requests = storage
                .list_blood_requests_for_owner(&OwnerId::new(owner))
                .await?;
            if requests.is_empty() {
                println!("no requests");
            }
            for request in &requests {
                print_request(request);
            }
        }
        Command::Show { request_id } => match storage.get_blood_request(request_id).await? {
            Some(request) => print_request(&request),
            None => bail!("request {request_id} not found"),
        },
    }

    Ok(())
}
