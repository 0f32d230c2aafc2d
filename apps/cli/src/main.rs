use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use client_core::{
    Collaborators, DashboardReader, DashboardView, HospitalDirectory, HttpRequestRepository,
    MemorySessionStorage, SessionDraftStore, StaticIdentity, SubmitOutcome, TracingNotifier,
    WorkflowController, WorkflowState,
};
use shared::domain::{BloodType, HospitalId, Urgency};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bloodreq", about = "Send blood requests to nearby hospitals")]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:8443")]
    server_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the hospitals a request can be sent to.
    Hospitals,
    /// Compose a request and send it to the chosen hospitals.
    Request(RequestArgs),
    /// Show the requests sent by a user.
    Dashboard(UserArgs),
}

#[derive(Args, Debug)]
struct UserArgs {
    #[arg(long)]
    owner: String,
    #[arg(long)]
    name: Option<String>,
}

#[derive(Args, Debug)]
struct RequestArgs {
    #[command(flatten)]
    user: UserArgs,
    #[arg(long)]
    patient_name: String,
    #[arg(long)]
    age: Option<u32>,
    /// One of A+, A-, B+, B-, AB+, AB-, O+, O-.
    #[arg(long)]
    blood_type: BloodType,
    /// critical, urgent or routine.
    #[arg(long)]
    urgency: Urgency,
    #[arg(long)]
    units_needed: Option<u32>,
    #[arg(long)]
    contact: String,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    medical_notes: Option<String>,
    /// Hospital id; repeat to send to several hospitals.
    #[arg(long = "hospital", required = true)]
    hospitals: Vec<i64>,
}

fn identity(user: &UserArgs) -> StaticIdentity {
    StaticIdentity::signed_in(user.owner.clone(), user.name.clone())
}

fn print_hospitals(directory: &HospitalDirectory) {
    for hospital in directory.list_all() {
        println!(
            "{:>2}  {:<30} {:<28} {:>7}  {:<16} {:?}",
            hospital.id.0,
            hospital.name,
            hospital.location,
            hospital.distance,
            hospital.phone,
            hospital.availability
        );
    }
}

async fn send_request(server_url: &str, args: RequestArgs) -> Result<()> {
    let controller = WorkflowController::new(Collaborators {
        draft_store: Arc::new(SessionDraftStore::new(MemorySessionStorage::new())),
        repository: Arc::new(HttpRequestRepository::new(server_url)?),
        directory: Arc::new(HospitalDirectory::builtin()),
        identity: Arc::new(identity(&args.user)),
        notifier: Arc::new(TracingNotifier),
    });

    controller.edit_draft(|draft| {
        draft.patient_name = args.patient_name;
        draft.age = args.age;
        draft.blood_type = Some(args.blood_type);
        draft.urgency = Some(args.urgency);
        draft.units_needed = args.units_needed;
        draft.contact_number = args.contact;
        draft.address = args.address;
        draft.medical_notes = args.medical_notes;
    });
    if controller.submit_compose() != WorkflowState::Selecting {
        bail!("the request form is incomplete");
    }

    for id in args.hospitals {
        if !controller.select_hospital(HospitalId(id)) {
            bail!("unknown hospital id {id}; run `bloodreq hospitals` for the list");
        }
    }

    match controller.submit_selection().await {
        SubmitOutcome::Sent {
            request_id,
            hospital_count,
        } => {
            println!("sent request_id={request_id} to {hospital_count} hospital(s)");
            Ok(())
        }
        outcome => bail!("request was not sent ({outcome:?})"),
    }
}

async fn show_dashboard(server_url: &str, user: UserArgs) -> Result<()> {
    let reader = DashboardReader::new(
        Arc::new(HttpRequestRepository::new(server_url)?),
        Arc::new(identity(&user)),
        Arc::new(TracingNotifier),
    );
    let Some(page) = reader.load_for_current_user().await else {
        bail!("not signed in");
    };

    println!("Welcome back, {}", page.greeting);
    match page.view {
        DashboardView::Loaded(rows) => {
            for row in rows {
                let details = &row.request.details;
                println!(
                    "{}  {:<20} {:<4} {:<9} {:<9} {:?}/{:?}  hospitals={}  id={}",
                    row.requested_on,
                    details.patient_name,
                    details.blood_type.label(),
                    details.urgency.label(),
                    row.request.status.label(),
                    row.severity,
                    row.status_icon,
                    row.hospital_count,
                    row.request.id
                );
            }
        }
        DashboardView::Empty => println!("No blood requests yet."),
        DashboardView::Unavailable => bail!("requests could not be loaded"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let cli = Cli::parse();

    match cli.command {
        Command::Hospitals => print_hospitals(&HospitalDirectory::builtin()),
        Command::Request(args) => send_request(&cli.server_url, args).await?,
        Command::Dashboard(user) => show_dashboard(&cli.server_url, user).await?,
    }

    Ok(())
}
