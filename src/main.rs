//! Library Catalog CLI
//!
//! Command line front end over the catalog API. Every write goes through the
//! same form controllers a UI would use.

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use library_catalog::{
    config::{AppConfig, LoggingConfig},
    forms::{BookForm, BorrowForm, FormError},
    models::{BookQuery, BorrowQuery, Genre, SortOrder},
    Catalog,
};

#[derive(Parser, Debug)]
#[command(name = "catalog")]
#[command(about = "Browse and manage a library catalog", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List books
    Books {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
        /// Only this genre (FICTION, NON_FICTION, ...)
        #[arg(long)]
        genre: Option<Genre>,
        #[arg(long)]
        sort_by: Option<String>,
        /// asc or desc
        #[arg(long)]
        sort: Option<SortOrder>,
    },
    /// Show one book
    Book { id: String },
    /// Add a book
    Add {
        #[command(flatten)]
        fields: BookFields,
    },
    /// Update a book; omitted fields keep their current value
    Update {
        id: String,
        #[command(flatten)]
        fields: BookFields,
    },
    /// Delete a book
    Delete { id: String },
    /// List borrow records
    Borrows {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Borrow copies of a book
    Borrow {
        book_id: String,
        #[arg(short, long)]
        quantity: Option<String>,
        /// YYYY-MM-DD, defaults to two weeks from today
        #[arg(short, long)]
        due_date: Option<String>,
    },
    /// Borrowed totals per book
    Summary,
}

/// Raw field input, validated by the form
#[derive(clap::Args, Debug, Default)]
struct BookFields {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    author: Option<String>,
    #[arg(long)]
    genre: Option<String>,
    #[arg(long)]
    isbn: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    copies: Option<String>,
    #[arg(long)]
    available: Option<String>,
}

impl BookFields {
    fn apply(self, form: &mut BookForm) -> Result<(), FormError> {
        let pairs = [
            ("title", self.title),
            ("author", self.author),
            ("genre", self.genre),
            ("isbn", self.isbn),
            ("description", self.description),
            ("copies", self.copies),
            ("available", self.available),
        ];
        for (name, value) in pairs {
            if let Some(value) = value {
                keep_editing(form.set_field(name, value))?;
            }
        }
        Ok(())
    }
}

/// Live field errors are reported again, all together, on submit
fn keep_editing(result: Result<(), FormError>) -> Result<(), FormError> {
    match result {
        Err(FormError::Invalid(_)) | Ok(()) => Ok(()),
        Err(error) => Err(error),
    }
}

fn set_borrow_field(form: &mut BorrowForm, name: &str, value: Option<String>) -> Result<(), FormError> {
    match value {
        Some(value) => keep_editing(form.set_field(name, value)),
        None => Ok(()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load()?;
    let _guard = init_tracing(&config.logging);

    tracing::info!("Starting Library Catalog v{}", env!("CARGO_PKG_VERSION"));

    let catalog = Catalog::new(config)?;
    run(&catalog, cli.command).await
}

fn init_tracing(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("library_catalog={},catalog={}", logging.level, logging.level).into());

    let (file_layer, guard) = match &logging.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "catalog.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if logging.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }

    guard
}

async fn run(catalog: &Catalog, command: Command) -> anyhow::Result<()> {
    let client = &catalog.client;
    match command {
        Command::Books {
            page,
            limit,
            genre,
            sort_by,
            sort,
        } => {
            let query = BookQuery {
                page,
                limit,
                filter: genre,
                sort_by,
                sort,
            };
            print(&client.list_books(&query).await?)
        }
        Command::Book { id } => print(&client.get_book(&id).await?),
        Command::Add { fields } => {
            let mut form = catalog.add_book();
            fields.apply(&mut form).map_err(report)?;
            let book = form.submit().await.map_err(report)?;
            println!("{}", form.action().success_message());
            print(&book)
        }
        Command::Update { id, fields } => {
            let mut form = catalog.patch_book(&id);
            fields.apply(&mut form).map_err(report)?;
            let book = form.submit().await.map_err(report)?;
            println!("{}", form.action().success_message());
            print(&book)
        }
        Command::Delete { id } => {
            let mut form = catalog.delete_book(&id);
            let deleted = form.submit().await.map_err(report)?;
            print(&deleted)
        }
        Command::Borrows { page, limit } => print(&client.list_borrows(&BorrowQuery { page, limit }).await?),
        Command::Borrow {
            book_id,
            quantity,
            due_date,
        } => {
            let book = client.get_book(&book_id).await?;
            let mut form = catalog.borrow_book(&book);
            set_borrow_field(&mut form, "quantity", quantity).map_err(report)?;
            set_borrow_field(&mut form, "dueDate", due_date).map_err(report)?;
            let borrow = form.submit().await.map_err(report)?;
            print(&borrow)
        }
        Command::Summary => print(&client.borrow_summary().await?),
    }
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print what the user should see and turn it into the process error
fn report(error: FormError) -> anyhow::Error {
    if let FormError::Invalid(errors) = &error {
        for (field, message) in errors.iter() {
            eprintln!("  {}: {}", field, message);
        }
        return anyhow::anyhow!("Please correct the fields above");
    }
    anyhow::anyhow!(error.to_string())
}
