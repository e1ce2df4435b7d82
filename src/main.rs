// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use gradebook::{export_csv, Config, GradebookService, Outcome};

#[derive(Parser)]
#[command(name = "gradebook")]
#[command(about = "Track student grades, averages and rankings", long_about = None)]
#[command(version)]
struct Cli {
    /// Defaults to the terminal browser
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse reports, rankings and subject averages
    Tui,
    /// Add a student with no grades
    AddStudent { name: String },
    /// Append one or more grades to a subject (creates the student if needed)
    AddGrades {
        name: String,
        subject: String,
        #[arg(required = true, allow_negative_numbers = true)]
        grades: Vec<f64>,
    },
    /// Remove the first matching grade from a subject
    RemoveGrade {
        name: String,
        subject: String,
        #[arg(allow_negative_numbers = true)]
        grade: f64,
    },
    /// Remove one or more students
    RemoveStudents {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Show one student's report
    Report { name: String },
    /// Show every student's report
    Reports,
    /// Rank students by overall average
    Rankings,
    /// Class-wide average for a subject
    SubjectAverage { subject: String },
    /// Find students whose name contains the query
    Search { query: String },
    /// Write all reports to a CSV file
    Export {
        #[arg(short, long, default_value = "reports.csv")]
        output: PathBuf,
    },
    /// List backup files, oldest first
    Backups,
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable JSON
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("Environment misconfigured")?;
    let mut service = GradebookService::open(config.storage());

    let outcome = match cli.command.unwrap_or(Commands::Tui) {
        Commands::Tui => return run_ui_mode(&service),
        Commands::AddStudent { name } => service.add_student(&name),
        Commands::AddGrades { name, subject, grades } => service.set_grades(&name, &subject, &grades),
        Commands::RemoveGrade { name, subject, grade } => service.remove_grade(&name, &subject, grade),
        Commands::RemoveStudents { names } => service.remove_students(&names),
        Commands::Report { name } => service.student_report(&name),
        Commands::Reports => service.all_reports(),
        Commands::Rankings => service.rankings(),
        Commands::SubjectAverage { subject } => service.subject_average(&subject),
        Commands::Search { query } => service.search(&query),
        Commands::Export { output } => {
            let rows = export_csv(service.book(), &output)?;
            info!(rows, output = %output.display(), "Exported reports");
            Outcome::ok(format!("Exported {} row(s) to {}", rows, output.display()))
        }
        Commands::Backups => {
            let backups = service.storage().list_backups()?;
            let paths: Vec<String> = backups.iter().map(|p| p.display().to_string()).collect();
            Outcome::ok(format!("{} backup(s)", paths.len())).with_field("backups", &paths)
        }
    };

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if !outcome.success {
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(service: &GradebookService) -> Result<()> {
    let mut app = ui::App::new(service.book());
    ui::run_ui(&mut app)
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_service: &GradebookService) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use a subcommand, e.g.: gradebook rankings");
    std::process::exit(1);
}
