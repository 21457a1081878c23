use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::Instrument;

use front_desk::booking::{Booking, BookingStatus, UpiApp};
use front_desk::config::FrontDeskConfig;
use front_desk::remote::HttpStatusCommitter;
use front_desk::workflow::{ReconciliationController, WorkflowError};

#[derive(Parser)]
#[command(name = "front-desk")]
#[command(about = "Appointment status and payment reconciliation")]
#[command(
    long_about = "front-desk drives the status reconciliation workflow for bookings: \
                  it computes which status changes are legal for a booking, records the \
                  real-world UPI channel for cash payments, and commits the change through \
                  the dashboard API. Start with 'front-desk targets' to see what a booking \
                  can move to."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter front-desk.toml with the default settings
    Init {
        /// Overwrite an existing front-desk.toml
        #[arg(long)]
        force: bool,
    },
    /// Show which statuses a booking may legally transition to
    Targets {
        /// Booking identifier
        #[arg(long)]
        booking: String,
        /// Current status as reported by the dashboard (synonyms accepted)
        #[arg(long)]
        status: String,
        /// Payment method recorded on the booking
        #[arg(long)]
        method: String,
    },
    /// Drive a status transition through confirmation and commit
    Transition {
        /// Booking identifier
        #[arg(long)]
        booking: String,
        /// Current status as reported by the dashboard (synonyms accepted)
        #[arg(long)]
        status: String,
        /// Payment method recorded on the booking
        #[arg(long)]
        method: String,
        /// Target status to move the booking to
        #[arg(long)]
        target: String,
        /// UPI app the customer paid through (required when marking a
        /// cash-class booking paid): gpay, paytm, phonepe or others
        #[arg(long)]
        upi_app: Option<String>,
        /// Confirm the transition without prompting
        #[arg(long, help = "Skip the confirmation prompt and commit immediately")]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    FrontDeskConfig::load_env_file()?;
    let config = FrontDeskConfig::load()?;
    if config.observability.tracing_enabled {
        front_desk::telemetry::init_telemetry()?;
    }

    let outcome = match cli.command {
        Commands::Init { force } => init_command(force),
        Commands::Targets {
            booking,
            status,
            method,
        } => {
            let booking = parse_booking(&booking, &status, &method)?;
            targets_command(&booking)
        }
        Commands::Transition {
            booking,
            status,
            method,
            target,
            upi_app,
            yes,
        } => {
            let booking = parse_booking(&booking, &status, &method)?;
            let target = BookingStatus::from_wire(&target)?;
            let upi_app = upi_app.as_deref().map(str::parse::<UpiApp>).transpose()?;

            let correlation_id = front_desk::telemetry::generate_correlation_id();
            let span = front_desk::telemetry::create_reconciliation_span(
                "transition",
                Some(booking.id.as_str()),
                Some(&correlation_id),
            );
            tokio::runtime::Runtime::new()?.block_on(
                transition_command(&config, &booking, target, upi_app, yes).instrument(span),
            )
        }
    };

    if config.observability.tracing_enabled {
        front_desk::telemetry::shutdown_telemetry();
    }
    outcome
}

fn init_command(force: bool) -> Result<()> {
    let path = "front-desk.toml";
    if std::path::Path::new(path).exists() && !force {
        bail!("{path} already exists; pass --force to overwrite it.");
    }
    FrontDeskConfig::default().save_to_file(path)?;
    println!("Wrote {path} with default settings.");
    Ok(())
}

fn parse_booking(id: &str, status: &str, method: &str) -> Result<Booking> {
    Ok(Booking::new(id, BookingStatus::from_wire(status)?, method))
}

fn targets_command(booking: &Booking) -> Result<()> {
    if front_desk::policy::is_locked(booking) {
        println!(
            "Booking {} is locked: no status change is allowed from {}.",
            booking.id,
            booking.status.label()
        );
        return Ok(());
    }

    println!("Booking {} ({}) may move to:", booking.id, booking.status.label());
    for target in front_desk::policy::allowed_targets_for(booking) {
        println!("  {} ({})", target.label(), target.as_wire_str());
    }
    Ok(())
}

async fn transition_command(
    config: &FrontDeskConfig,
    booking: &Booking,
    target: BookingStatus,
    upi_app: Option<UpiApp>,
    yes: bool,
) -> Result<()> {
    let committer = Arc::new(HttpStatusCommitter::new(&config.api)?);
    let controller = ReconciliationController::new(committer);

    let mut handle = match controller.propose(booking, target) {
        Ok(handle) => handle,
        Err(WorkflowError::ConcurrentProposalIgnored { .. }) => {
            // Not a user-visible error; already logged by the controller.
            return Ok(());
        }
        Err(WorkflowError::InvalidTransition { from, target, .. }) => {
            bail!(
                "Booking {} cannot move from {} to {}. Run 'front-desk targets' to see \
                 what is allowed.",
                booking.id,
                from.label(),
                target.label()
            );
        }
        Err(e) => return Err(e.into()),
    };

    if handle.needs_disambiguation() {
        match upi_app {
            Some(app) => handle.choose_upi_app(app)?,
            None => {
                handle.cancel();
                bail!(
                    "Marking this cash-class booking paid needs the UPI channel. \
                     Re-run with --upi-app gpay|paytm|phonepe|others."
                );
            }
        }
    }

    println!("{}", handle.confirmation_prompt());
    if !yes {
        handle.cancel();
        println!("Aborted: pass --yes to commit the change. Nothing was modified.");
        return Ok(());
    }

    match handle.confirm().await {
        Ok(updated) => {
            println!(
                "Committed: booking {} is now {}.",
                updated.id,
                updated.status.label()
            );
            if let Some(detail) = &updated.payment_method_detail {
                println!("Payment recorded as {}.", detail.to_legacy_string());
            }
            Ok(())
        }
        Err(WorkflowError::CommitFailed { message }) => {
            bail!("Commit failed, booking left unchanged: {message}");
        }
        Err(e) => Err(e.into()),
    }
}
