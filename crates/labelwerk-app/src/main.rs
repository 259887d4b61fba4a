// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labelwerk: per-printer label print queues over raw TCP.
//
// Entry point. Loads configuration, initialises logging, opens the label
// store and runs one subcommand.

mod api;
mod services;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use labelwerk_core::AppConfig;
use labelwerk_core::error::{LabelwerkError, Result};
use labelwerk_core::types::{LabelId, Placeholder, PrinterId, TemplateId};

use services::app_services::{AppServices, NewLabel, NewPrinter, PrintRequest};
use services::logging::init_logging;

const DEFAULT_CONFIG: &str = "./config.json";

#[derive(Parser)]
#[command(name = "labelwerk", about = "Label print dispatcher for raw TCP printers", version)]
struct Cli {
    /// Configuration file (JSON).
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API and keep a queue open for every registered
    /// printer until Ctrl-C.
    Serve,
    /// Manage printers.
    #[command(subcommand)]
    Printer(PrinterCommand),
    /// Manage labels.
    #[command(subcommand)]
    Label(LabelCommand),
    /// Manage label templates.
    #[command(subcommand)]
    Template(TemplateCommand),
    /// Print a label once and wait until it has been sent.
    Print(PrintArgs),
}

#[derive(Subcommand)]
enum PrinterCommand {
    Add {
        /// host:port of the raw print service, e.g. 10.0.0.5:9100.
        #[arg(long)]
        addr: String,
        /// Command language of the printer, e.g. ZPL.
        #[arg(long)]
        format_type: String,
        #[arg(long, default_value = "")]
        comment: String,
    },
    List,
    Remove { id: i64 },
}

#[derive(Subcommand)]
enum LabelCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        comment: String,
    },
    List,
    /// Delete a label together with its templates.
    Remove { id: i64 },
}

#[derive(Subcommand)]
enum TemplateCommand {
    Add {
        #[arg(long)]
        label: i64,
        #[arg(long)]
        format_type: String,
        /// File holding the raw template body.
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
    },
    List {
        #[arg(long)]
        label: i64,
    },
    /// Print the raw body of one template.
    Show {
        #[arg(long)]
        label: i64,
        id: i64,
    },
    Remove {
        #[arg(long)]
        label: i64,
        id: i64,
    },
}

#[derive(Args)]
struct PrintArgs {
    #[arg(long)]
    label: i64,
    #[arg(long)]
    printer: i64,
    #[arg(long, default_value_t = 1)]
    quantity: u32,
    /// Pause between copies.
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,
    /// Placeholder value, e.g. -p _name_=Ada. Repeatable.
    #[arg(short = 'p', long = "placeholder", value_name = "NAME=VALUE", value_parser = parse_placeholder)]
    placeholders: Vec<Placeholder>,
}

fn parse_placeholder(s: &str) -> std::result::Result<Placeholder, String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {s:?}"))?;
    Ok(Placeholder::new(name, value))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("labelwerk: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_logging(&config.logger) {
        eprintln!("labelwerk: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("labelwerk: {e}");
            ExitCode::FAILURE
        }
    }
}

/// An explicit path must exist; the default one may be absent.
fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_file(path),
        None if Path::new(DEFAULT_CONFIG).exists() => AppConfig::load_file(DEFAULT_CONFIG),
        None => Ok(AppConfig::default()),
    }
}

async fn run(command: Commands, config: AppConfig) -> Result<()> {
    let store = AppServices::open_store(&config)?;
    let listen_addr = config.server.addr.clone();
    let svc = Arc::new(AppServices::new(config, store));

    match command {
        Commands::Serve => {
            svc.start().await?;
            tracing::info!("labelwerk serving, press Ctrl-C to stop");
            let served = api::serve(Arc::clone(&svc), &listen_addr, shutdown_signal()).await;
            svc.shutdown().await;
            served?;
        }
        Commands::Printer(PrinterCommand::Add { addr, format_type, comment }) => {
            let printer = svc
                .register_printer(NewPrinter { addr, format_type, comment })
                .await?;
            println!("{}", printer.id);
        }
        Commands::Printer(PrinterCommand::List) => {
            for p in svc.printers()? {
                println!("{}\t{}\t{}\t{}", p.id, p.addr, p.format_type, p.comment);
            }
        }
        Commands::Printer(PrinterCommand::Remove { id }) => {
            svc.remove_printer(PrinterId(id)).await?;
        }
        Commands::Label(LabelCommand::Add { name, comment }) => {
            let label = svc.create_label(NewLabel { name, comment })?;
            println!("{}", label.id);
        }
        Commands::Label(LabelCommand::List) => {
            for label in svc.labels()? {
                println!("{}\t{}\t{}", label.id, label.name, label.comment);
            }
        }
        Commands::Label(LabelCommand::Remove { id }) => {
            svc.delete_label(LabelId(id))?;
        }
        Commands::Template(TemplateCommand::Add { label, format_type, file }) => {
            let body = std::fs::read(&file).map_err(|e| {
                LabelwerkError::Validation(format!("read {}: {e}", file.display()))
            })?;
            let template = svc.create_template(LabelId(label), &format_type, &body)?;
            println!("{}\t{}", template.id, template.placeholders().join(" "));
        }
        Commands::Template(TemplateCommand::List { label }) => {
            for template in svc.templates(LabelId(label))? {
                println!(
                    "{}\t{}\t{}",
                    template.id,
                    template.format_type,
                    template.placeholders().join(" ")
                );
            }
        }
        Commands::Template(TemplateCommand::Show { label, id }) => {
            let template = svc.template(LabelId(label), TemplateId(id))?;
            println!("{}", String::from_utf8_lossy(&template.raw_body()));
        }
        Commands::Template(TemplateCommand::Remove { label, id }) => {
            svc.delete_template(LabelId(label), TemplateId(id))?;
        }
        Commands::Print(args) => {
            let request = PrintRequest {
                printer_id: PrinterId(args.printer),
                quantity: args.quantity,
                delay: Duration::from_millis(args.delay_ms),
                placeholders: args.placeholders,
            };
            svc.print_once(LabelId(args.label), request).await?;
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for Ctrl-C");
    }
    tracing::info!("shutting down");
}
