use clap::{Parser, Subcommand};
use edufin::{Catalog, SchemaFactory};
use std::path::PathBuf;

mod cmd;

#[derive(Parser, Debug)]
#[command(name = "edufin")]
#[command(version, about = "Year-scoped extraction schemas for university financial statements")]
struct Cli {
    /// Directory of <category>.json files replacing the built-in catalogs
    #[arg(long, global = true)]
    catalog_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the schema generated for a category and fiscal year
    Schema(cmd::schema::SchemaCommand),
    /// Compute residual fields for extracted records
    Finalize(cmd::finalize::FinalizeCommand),
    /// Check extracted records against their schemas
    Validate(cmd::validate::ValidateCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let overrides;
    let catalog = match &cli.catalog_dir {
        Some(dir) => {
            log::info!("Loading catalog overrides from {}", dir.display());
            overrides = Catalog::with_overrides(dir)?;
            &overrides
        }
        None => Catalog::builtin(),
    };
    let factory = SchemaFactory::new(catalog);

    match cli.command {
        Command::Schema(schema) => schema.exec(&factory),
        Command::Finalize(finalize) => finalize.exec(&factory),
        Command::Validate(validate) => validate.exec(&factory),
    }
}
