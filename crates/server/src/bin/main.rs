use clap::{Parser, Subcommand};
use tessera_common::config::AppConfig;
use tessera_common::events::ChangeBus;
use tessera_common::logging::init_logging;
use tessera_common::models::QueryCondition;
use tessera_server::{build_gateway, QueryPayload, ShardServer, DEFAULT_APP_CONFIG_PATH};

#[derive(Parser)]
#[command(name = "tessera", version, about = "Template-driven SQL execution")]
struct Args {
    /// Application config file (YAML). TESSERA_* environment variables override it.
    #[arg(long, global = true, env = "TESSERA_CONFIG", default_value = DEFAULT_APP_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one execution shard.
    Shard {
        /// Overrides server.listen_addr, e.g. 0.0.0.0:9091.
        #[arg(long)]
        listen: Option<String>,
    },
    /// Run a template through the gateway and print the result payload.
    Query {
        #[arg(long)]
        template: String,
        /// Connection config id.
        #[arg(long)]
        connection: String,
        /// JSON array of conditions replacing the template's WHERE conditions.
        #[arg(long)]
        overrides: Option<String>,
    },
    /// Print the catalog columns of a table.
    Schema {
        #[arg(long)]
        connection: String,
        #[arg(long)]
        table: Option<String>,
        /// Resolve the table from this template instead.
        #[arg(long)]
        template: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Shard { listen } => {
            ShardServer::new()
                .with_app_config(&args.config)
                .with_listen_addr(listen)
                .run()
                .await
        }
        Command::Query {
            template,
            connection,
            overrides,
        } => {
            let overrides: Vec<QueryCondition> = match overrides {
                Some(json) => serde_json::from_str(&json)?,
                None => Vec::new(),
            };
            let app = AppConfig::from_file(&args.config)?;
            init_logging(&app.logging)?;
            let (gateway, _consumer) = build_gateway(&app, &ChangeBus::default())?;
            print_payload(&gateway.run_query(&template, &connection, overrides).await)
        }
        Command::Schema {
            connection,
            table,
            template,
        } => {
            let app = AppConfig::from_file(&args.config)?;
            init_logging(&app.logging)?;
            let (gateway, _consumer) = build_gateway(&app, &ChangeBus::default())?;
            let payload = gateway
                .get_table_schema(&connection, table.as_deref(), template.as_deref())
                .await;
            print_payload(&payload)
        }
    }
}

fn print_payload(payload: &QueryPayload) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(payload)?);
    if !payload.success {
        std::process::exit(1);
    }
    Ok(())
}
