use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::{Local, NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinrec_core::config::{
    connect_timeout_from_env_value, database_path_from_env_value, pool_size_from_env_value,
    transition_policy_from_env_value,
};
use clinrec_core::{
    CoreConfig, Database, DrugCode, DrugCodeRepository, LabProcedure, LabProcedureRepository,
    LabProcedureStatus, LabProcedureWorkflow, NonEmptyText, OfficeVisit, OfficeVisitRepository,
    Prescription, PrescriptionRepository,
};

#[derive(Parser)]
#[command(name = "clinrec")]
#[command(about = "Clinical records: office visits, prescriptions and lab procedures")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create any missing tables in the configured database
    InitDb,
    /// Lab procedure workflow
    #[command(subcommand)]
    Lab(LabCommand),
    /// Office visits
    #[command(subcommand)]
    Visit(VisitCommand),
    /// Prescriptions
    #[command(subcommand)]
    Prescription(PrescriptionCommand),
    /// Drug code reference data
    #[command(subcommand)]
    Drug(DrugCommand),
}

#[derive(Subcommand)]
enum LabCommand {
    /// Show one lab procedure
    Show { id: String },
    /// List lab procedures, optionally for one visit or technician
    List {
        #[arg(long)]
        visit: Option<i64>,
        #[arg(long)]
        technician: Option<i64>,
    },
    /// Order a lab procedure on an office visit
    Order {
        #[arg(long)]
        visit: i64,
        /// 1 (high) to 3 (low)
        #[arg(long)]
        priority: i32,
        #[arg(long)]
        technician: Option<i64>,
        #[arg(long)]
        restricted: bool,
        #[arg(long)]
        commentary: Option<String>,
    },
    /// Set the status of a lab procedure (e.g. "In transit")
    Status { id: i64, status: String },
    /// Record results for a lab procedure
    Results { id: i64, results: String },
    /// Whether the procedure may be handed to another technician
    Reassignable { id: String },
    /// Whether the procedure may be removed
    Removable { id: String },
    /// Hand the procedure to another technician
    Reassign { id: String, technician: i64 },
    /// Remove the procedure if it is removable
    Remove { id: String },
}

#[derive(Subcommand)]
enum VisitCommand {
    /// Record an office visit
    Add {
        #[arg(long)]
        patient: i64,
        /// Visit time, YYYY-MM-DDTHH:MM:SS (defaults to now)
        #[arg(long)]
        date: Option<NaiveDateTime>,
        #[arg(long)]
        location: String,
        #[arg(long)]
        appt_type: i64,
        #[arg(long)]
        notes: Option<String>,
        /// Do not bill the patient for this visit
        #[arg(long)]
        no_bill: bool,
    },
    /// Show one office visit
    Show { id: i64 },
    /// List office visits for a patient
    List { patient: i64 },
}

#[derive(Subcommand)]
enum PrescriptionCommand {
    /// Prescribe a drug during an office visit
    Add {
        #[arg(long)]
        patient: i64,
        #[arg(long)]
        code: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        #[arg(long)]
        visit: i64,
    },
    /// Prescriptions written during an office visit
    ForVisit { visit: i64 },
    /// Prescriptions still running on a date, latest ending first
    Emergency {
        patient: i64,
        /// Defaults to today
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Delete a prescription by id
    Remove { id: i64 },
}

#[derive(Subcommand)]
enum DrugCommand {
    /// Register a national drug code
    Add { code: String, description: String },
    /// List registered drug codes
    List,
}

/// Entry point for the clinical records command line.
///
/// # Environment Variables
/// - `CLINREC_DATABASE`: SQLite database file (default: "clinrec.db")
/// - `CLINREC_POOL_SIZE`: maximum pooled connections (default: 8)
/// - `CLINREC_CONNECT_TIMEOUT_SECS`: connection and busy timeout (default: 5)
/// - `CLINREC_ENFORCE_TRANSITIONS`: reject out-of-order lab status writes (default: false)
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinrec=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = Arc::new(load_config()?);
    let db = Database::open(&cfg)?;
    tracing::debug!(
        database = %cfg.database_path().display(),
        policy = ?cfg.transition_policy(),
        "database opened"
    );

    match cli.command {
        Commands::InitDb => {
            db.ensure_schema()?;
            println!("Schema ready in {}", cfg.database_path().display());
        }
        Commands::Lab(cmd) => run_lab(cmd, db, &cfg)?,
        Commands::Visit(cmd) => run_visit(cmd, db)?,
        Commands::Prescription(cmd) => run_prescription(cmd, db)?,
        Commands::Drug(cmd) => run_drug(cmd, db)?,
    }

    Ok(())
}

fn load_config() -> anyhow::Result<CoreConfig> {
    let env = |key: &str| std::env::var(key).ok();

    let cfg = CoreConfig::new(
        database_path_from_env_value(env("CLINREC_DATABASE")),
        pool_size_from_env_value(env("CLINREC_POOL_SIZE"))?,
        connect_timeout_from_env_value(env("CLINREC_CONNECT_TIMEOUT_SECS"))?,
        transition_policy_from_env_value(env("CLINREC_ENFORCE_TRANSITIONS"))?,
    )?;
    Ok(cfg)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report(action: &str, done: bool) {
    if done {
        println!("{action}: ok");
    } else {
        println!("{action}: no change");
    }
}

fn run_lab(cmd: LabCommand, db: Database, cfg: &CoreConfig) -> anyhow::Result<()> {
    let repo = LabProcedureRepository::new(db, cfg);
    let workflow = LabProcedureWorkflow::new(repo.clone());

    match cmd {
        LabCommand::Show { id } => match workflow.get(&id)? {
            Some(procedure) => print_json(&procedure)?,
            None => println!("No lab procedure {id}"),
        },
        LabCommand::List { visit, technician } => {
            let procedures = match (visit, technician) {
                (Some(_), Some(_)) => bail!("use either --visit or --technician, not both"),
                (Some(visit), None) => repo.get_by_office_visit(visit)?,
                (None, Some(technician)) => repo.get_for_lab_technician(technician)?,
                (None, None) => repo.get_all()?,
            };
            print_json(&procedures)?;
        }
        LabCommand::Order {
            visit,
            priority,
            technician,
            restricted,
            commentary,
        } => {
            let procedure = LabProcedure {
                lab_technician_id: technician,
                priority: Some(priority),
                is_restricted: restricted,
                commentary,
                ..LabProcedure::new(visit)
            };
            match repo.add_returning_id(&procedure)? {
                Some(id) => println!("Ordered lab procedure {id}"),
                None => println!("Lab procedure was not stored"),
            }
        }
        LabCommand::Status { id, status } => {
            let status: LabProcedureStatus = status.parse()?;
            let mut procedure = repo
                .get_by_id(id)?
                .with_context(|| format!("no lab procedure {id}"))?;
            procedure.status = status;
            report("set status", repo.update(&procedure)?);
        }
        LabCommand::Results { id, results } => {
            let mut procedure = repo
                .get_by_id(id)?
                .with_context(|| format!("no lab procedure {id}"))?;
            procedure.results = Some(results);
            report("record results", repo.update(&procedure)?);
        }
        LabCommand::Reassignable { id } => println!("{}", workflow.is_reassignable(&id)),
        LabCommand::Removable { id } => println!("{}", workflow.is_removable(&id)),
        LabCommand::Reassign { id, technician } => {
            report("reassign", workflow.reassign(&id, technician)?)
        }
        LabCommand::Remove { id } => report("remove", workflow.remove(&id)?),
    }

    Ok(())
}

fn run_visit(cmd: VisitCommand, db: Database) -> anyhow::Result<()> {
    let repo = OfficeVisitRepository::new(db);

    match cmd {
        VisitCommand::Add {
            patient,
            date,
            location,
            appt_type,
            notes,
            no_bill,
        } => {
            let location = NonEmptyText::new(location).context("location must not be blank")?;
            let date = date.unwrap_or_else(|| Local::now().naive_local());
            let visit = OfficeVisit {
                notes,
                send_bill: Some(!no_bill),
                ..OfficeVisit::new(patient, date, location.into_inner(), appt_type)
            };
            match repo.add_returning_id(&visit)? {
                Some(id) => println!("Recorded office visit {id}"),
                None => println!("Office visit was not stored"),
            }
        }
        VisitCommand::Show { id } => match repo.get_by_id(id)? {
            Some(visit) => print_json(&visit)?,
            None => println!("No office visit {id}"),
        },
        VisitCommand::List { patient } => print_json(&repo.get_visits_for_patient(patient)?)?,
    }

    Ok(())
}

fn run_prescription(cmd: PrescriptionCommand, db: Database) -> anyhow::Result<()> {
    let repo = PrescriptionRepository::new(db);

    match cmd {
        PrescriptionCommand::Add {
            patient,
            code,
            start,
            end,
            visit,
        } => {
            let prescription = Prescription {
                id: None,
                patient_mid: patient,
                drug_code: DrugCode::new(code, ""),
                start_date: start,
                end_date: end,
                office_visit_id: visit,
            };
            report("prescribe", repo.add(&prescription)?);
        }
        PrescriptionCommand::ForVisit { visit } => {
            print_json(&repo.get_prescriptions_for_office_visit(visit)?)?
        }
        PrescriptionCommand::Emergency { patient, as_of } => {
            let as_of = as_of.unwrap_or_else(|| Local::now().date_naive());
            print_json(&repo.get_prescriptions_for_patient_ending_after(patient, as_of)?)?;
        }
        PrescriptionCommand::Remove { id } => {
            let Some(prescription) = repo.get_by_id(id)? else {
                bail!("no prescription {id}");
            };
            report("remove", repo.remove(&prescription)?);
        }
    }

    Ok(())
}

fn run_drug(cmd: DrugCommand, db: Database) -> anyhow::Result<()> {
    let repo = DrugCodeRepository::new(db);

    match cmd {
        DrugCommand::Add { code, description } => {
            let description =
                NonEmptyText::new(description).context("description must not be blank")?;
            report("register drug code", repo.add(&code, &description)?);
        }
        DrugCommand::List => print_json(&repo.get_all()?)?,
    }

    Ok(())
}
