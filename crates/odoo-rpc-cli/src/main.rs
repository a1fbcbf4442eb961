use clap::{Parser, Subcommand};
use odoo_rpc::config::{ENV_DATABASE, ENV_PASSWORD, ENV_URL, ENV_USERNAME};
use odoo_rpc::{
    ConnectionOptions, DEFAULT_ODOO_URL, Domain, Endpoint, ExternalId, Fields, HttpGateway,
    OdooClient, RpcGateway, SearchReadOptions,
};
use serde_json::Value;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "odoo-rpc")]
#[command(about = "Record operations against an Odoo server over XML-RPC")]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,
    #[command(subcommand)]
    command: Commands,
}

/// Flags override `ODOO_*` variables (also read from `.env`).
#[derive(clap::Args, Debug)]
struct ConnectionArgs {
    #[arg(long, global = true)]
    url: Option<String>,
    #[arg(long = "db", global = true)]
    database: Option<String>,
    #[arg(long, global = true)]
    username: Option<String>,
    #[arg(long, global = true)]
    password: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Server version; does not authenticate.
    Version,
    Search(SearchArgs),
    SearchRead(SearchReadArgs),
    Read(ReadArgs),
    Fields(FieldsArgs),
    Create(CreateArgs),
    Update(UpdateArgs),
    Delete(DeleteArgs),
    /// Resolve an external id to its model and record id.
    Resolve(ResolveArgs),
}

#[derive(clap::Args, Debug)]
struct SearchArgs {
    #[arg(long)]
    model: String,
    /// JSON domain: an equality object, one `[field, op, value]` filter, or a list of filters.
    #[arg(long)]
    domain: Option<String>,
    #[arg(long)]
    count: bool,
}

#[derive(clap::Args, Debug)]
struct SearchReadArgs {
    #[arg(long)]
    model: String,
    #[arg(long)]
    domain: Option<String>,
    #[arg(long, value_delimiter = ',')]
    fields: Vec<String>,
    #[arg(long)]
    offset: Option<u32>,
    #[arg(long)]
    limit: Option<u32>,
    #[arg(long)]
    order: Option<String>,
}

#[derive(clap::Args, Debug)]
struct ReadArgs {
    #[arg(long)]
    model: String,
    #[arg(long = "id", required = true, value_delimiter = ',')]
    ids: Vec<i64>,
    #[arg(long, value_delimiter = ',')]
    fields: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct FieldsArgs {
    #[arg(long)]
    model: String,
    #[arg(long, value_delimiter = ',')]
    attributes: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct CreateArgs {
    #[arg(long)]
    model: String,
    /// JSON object of field values; relation fields accept `{"action": ..., "value": ...}`.
    #[arg(long)]
    values: String,
    /// `name` in the `__api__` module, or `module.name`.
    #[arg(long)]
    external_id: Option<String>,
}

#[derive(clap::Args, Debug)]
struct UpdateArgs {
    #[arg(long)]
    model: String,
    #[arg(long = "id", required = true, value_delimiter = ',')]
    ids: Vec<i64>,
    #[arg(long)]
    values: String,
}

#[derive(clap::Args, Debug)]
struct DeleteArgs {
    #[arg(long)]
    model: String,
    #[arg(long = "id", required = true, value_delimiter = ',')]
    ids: Vec<i64>,
}

#[derive(clap::Args, Debug)]
struct ResolveArgs {
    external_id: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<String, String> {
    let connection = cli.connection;
    let output = match cli.command {
        Commands::Version => {
            let url = connection
                .url
                .or_else(|| non_blank_env(ENV_URL))
                .unwrap_or_else(|| DEFAULT_ODOO_URL.to_string());
            HttpGateway::new(url)
                .call(Endpoint::Common, "version", Vec::new())
                .await
                .map_err(|error| error.to_string())?
        }
        Commands::Search(args) => {
            let domain = parse_domain(args.domain.as_deref())?;
            let client = connect(&connection).await?;
            if args.count {
                Value::from(
                    client
                        .search_count(&args.model, Some(&domain))
                        .await
                        .map_err(|error| error.to_string())?,
                )
            } else {
                Value::from(
                    client
                        .search(&args.model, Some(&domain))
                        .await
                        .map_err(|error| error.to_string())?,
                )
            }
        }
        Commands::SearchRead(args) => {
            let domain = parse_domain(args.domain.as_deref())?;
            let options = SearchReadOptions {
                offset: args.offset,
                limit: args.limit,
                order: args.order,
            };
            let client = connect(&connection).await?;
            let rows = client
                .search_read(&args.model, Some(&domain), &as_strs(&args.fields), &options)
                .await
                .map_err(|error| error.to_string())?;
            Value::Array(rows.into_iter().map(Value::Object).collect())
        }
        Commands::Read(args) => {
            let client = connect(&connection).await?;
            let rows = client
                .read(&args.model, args.ids, &as_strs(&args.fields))
                .await
                .map_err(|error| error.to_string())?;
            Value::Array(rows.into_iter().map(Value::Object).collect())
        }
        Commands::Fields(args) => {
            let client = connect(&connection).await?;
            Value::Object(
                client
                    .get_fields(&args.model, &as_strs(&args.attributes))
                    .await
                    .map_err(|error| error.to_string())?,
            )
        }
        Commands::Create(args) => {
            let values = parse_fields(&args.values)?;
            let external_id = args.external_id.as_deref().map(parse_external_id);
            let client = connect(&connection).await?;
            Value::from(
                client
                    .create(&args.model, &values, external_id.as_ref())
                    .await
                    .map_err(|error| error.to_string())?,
            )
        }
        Commands::Update(args) => {
            let values = parse_fields(&args.values)?;
            let client = connect(&connection).await?;
            Value::from(
                client
                    .update(&args.model, args.ids, &values)
                    .await
                    .map_err(|error| error.to_string())?,
            )
        }
        Commands::Delete(args) => {
            let client = connect(&connection).await?;
            Value::from(
                client
                    .delete(&args.model, args.ids)
                    .await
                    .map_err(|error| error.to_string())?,
            )
        }
        Commands::Resolve(args) => {
            let external_id = parse_external_id(&args.external_id);
            let client = connect(&connection).await?;
            let target = client
                .resolve_external_id(&external_id)
                .await
                .map_err(|error| error.to_string())?;
            serde_json::json!({"model": target.model, "res_id": target.res_id})
        }
    };

    serde_json::to_string_pretty(&output).map_err(|error| error.to_string())
}

async fn connect(args: &ConnectionArgs) -> Result<OdooClient<HttpGateway>, String> {
    let options = ConnectionOptions::from_lookup(|key| {
        let flag = match key {
            ENV_URL => args.url.clone(),
            ENV_DATABASE => args.database.clone(),
            ENV_USERNAME => args.username.clone(),
            ENV_PASSWORD => args.password.clone(),
            _ => None,
        };
        flag.or_else(|| std::env::var(key).ok())
    })
    .map_err(|error| error.to_string())?;
    tracing::debug!(?options, "connecting");

    OdooClient::connect_http(&options)
        .await
        .map_err(|error| error.to_string())
}

fn non_blank_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn parse_json(flag: &str, raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|error| format!("--{flag} is not valid JSON: {error}"))
}

fn parse_domain(raw: Option<&str>) -> Result<Domain, String> {
    let Some(raw) = raw else {
        return Ok(Domain::all());
    };
    let domain = Domain::try_from(parse_json("domain", raw)?).map_err(|error| error.to_string())?;
    domain.normalize().map_err(|error| error.to_string())?;
    Ok(domain)
}

fn parse_fields(raw: &str) -> Result<Fields, String> {
    Fields::from_json(parse_json("values", raw)?).map_err(|error| error.to_string())
}

fn parse_external_id(raw: &str) -> ExternalId {
    ExternalId::parse_qualified(raw).unwrap_or_else(|| ExternalId::new(raw))
}

fn as_strs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}
