use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use topology_client::filter::ALL_CONTACT_TYPES;
use topology_client::{filter_contacts, ClientOptions, ContactFilters, ResultSet, TopologyClient};

/// Query VO or resource contact lists from the OSG topology service.
#[derive(Parser, Debug)]
#[command(name = "topology-contacts", version)]
struct Cli {
    /// Alternate topology host (optionally host:port).
    #[arg(long)]
    host: Option<String>,
    /// Explicit client certificate path.
    #[arg(long)]
    cert: Option<PathBuf>,
    /// Explicit client key path.
    #[arg(long)]
    key: Option<PathBuf>,
    /// Comma-separated service names resources must provide.
    #[arg(long = "provides-service")]
    provides_service: Option<String>,
    /// Comma-separated owning-VO names.
    #[arg(long = "owner-vo")]
    owner_vo: Option<String>,
    /// Glob-or-substring filter on entity names.
    #[arg(long = "name-filter")]
    name_filter: Option<String>,
    /// Glob-or-substring filter on resource FQDNs.
    #[arg(long = "fqdn-filter")]
    fqdn_filter: Option<String>,
    /// Contact-type prefixes to keep ("all" keeps everything).
    #[arg(long = "contact-type", default_value = ALL_CONTACT_TYPES)]
    contact_type: Vec<String>,
    /// Keep only contacts with one of these email addresses.
    #[arg(long = "contact-email")]
    contact_email: Vec<String>,
    /// Emit JSON instead of plain text.
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Contact lists per virtual organization.
    Vos,
    /// Contact lists per resource.
    Resources {
        /// Key results by resource FQDN instead of resource name.
        #[arg(long)]
        by_fqdn: bool,
    },
}

fn initialize_tracing() {
    let default_directives = "topology_client=info,hyper=warn";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));
    let layer = fmt::layer().with_target(true).with_level(true);
    tracing_subscriber::registry().with(env_filter).with(layer).init();
}

fn print_results(results: &ResultSet, json: bool) -> color_eyre::eyre::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }
    for (entity, contacts) in results {
        println!("{entity}");
        for contact in contacts {
            let name = contact.get("Name").map(String::as_str).unwrap_or("");
            let email = contact.get("Email").map(String::as_str).unwrap_or("");
            let contact_type = contact
                .get("ContactType")
                .map(String::as_str)
                .unwrap_or("");
            println!("  {name} <{email}> ({contact_type})");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<ExitCode> {
    color_eyre::install().expect("Failed to install `color_eyre::install`");
    initialize_tracing();

    let cli = Cli::parse();
    let options = ClientOptions {
        host: cli.host.clone(),
        cert: cli.cert.clone(),
        key: cli.key.clone(),
        provides_service: cli.provides_service.clone(),
        owner_vo: cli.owner_vo.clone(),
        ..ClientOptions::default()
    };
    let filters = ContactFilters {
        name_pattern: cli.name_filter.clone(),
        fqdn_pattern: cli.fqdn_filter.clone(),
        contact_types: cli.contact_type.clone(),
        contact_emails: if cli.contact_email.is_empty() {
            None
        } else {
            Some(cli.contact_email.iter().cloned().collect::<HashSet<_>>())
        },
    };

    let mut client = TopologyClient::new(options);
    let results = match cli.command {
        Command::Vos => client.vo_contacts().await?,
        Command::Resources { by_fqdn: false } => client.resource_contacts().await?,
        Command::Resources { by_fqdn: true } => client.resource_contacts_by_fqdn().await?,
    };

    // The fetch layer already logged protocol failures; the sentinel maps to
    // a non-zero exit without a second report.
    let Some(results) = results else {
        return Ok(ExitCode::FAILURE);
    };
    let results = filter_contacts(&filters, &results);
    print_results(&results, cli.json)?;
    Ok(ExitCode::SUCCESS)
}
