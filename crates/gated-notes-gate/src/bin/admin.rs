//! Store maintenance for a gate's database.
//!
//! Notes are only ever created through `POST /create`; this tool inspects,
//! reprices and removes them.

use clap::{Parser, Subcommand};
use serde::Serialize;

use gated_notes_gate::{GateStore, SqliteGateStore, StoreError};

#[derive(Parser)]
#[command(name = "gated-notes-admin")]
#[command(about = "Inspect and maintain a gated-notes gate database")]
struct Cli {
    /// Path to the gate database
    #[arg(long, env = "DB_PATH", default_value = "./gated-notes.db")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set a new price (msat) for a note
    ChangePrice { note_id: String, price: u64 },
    /// Show one note
    Get { note_id: String },
    /// List all notes, newest first
    List,
    /// Show one payment request
    GetPr { payment_hash: String },
    /// List all payment requests, newest first
    ListPr,
    /// Delete a note and its payment requests
    Delete { note_id: String },
    /// Delete every note and payment request
    DeleteAll {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), StoreError> {
    let out = serde_json::to_string_pretty(value).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    println!("{out}");
    Ok(())
}

fn run(store: &dyn GateStore, command: Commands) -> Result<(), StoreError> {
    match command {
        Commands::ChangePrice { note_id, price } => {
            if price == 0 {
                return Err(StoreError::OutOfRange("price must be at least 1 msat".to_string()));
            }
            print_json(&store.change_price(&note_id, price)?)
        }
        Commands::Get { note_id } => {
            let note = store
                .note(&note_id)?
                .ok_or(StoreError::NotFound(note_id))?;
            print_json(&note)
        }
        Commands::List => print_json(&store.notes()?),
        Commands::GetPr { payment_hash } => {
            let entry = store
                .payment_request(&payment_hash)?
                .ok_or(StoreError::NotFound(payment_hash))?;
            print_json(&entry)
        }
        Commands::ListPr => print_json(&store.payment_requests()?),
        Commands::Delete { note_id } => {
            let removed = store.delete_note(&note_id)?;
            println!("deleted {note_id} and {removed} payment request(s)");
            Ok(())
        }
        Commands::DeleteAll { yes } => {
            if !yes {
                eprintln!("refusing to delete everything without --yes");
                std::process::exit(2);
            }
            let removed = store.delete_all()?;
            println!("deleted {removed} note(s)");
            Ok(())
        }
    }
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let store = match SqliteGateStore::open(&cli.db) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("failed to open {}: {e}", cli.db);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&store, cli.command) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
