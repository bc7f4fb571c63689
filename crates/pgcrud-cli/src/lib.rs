mod cli;

use cli::{Action, Command, Invocation};
use pgcrud::{
    CancellationToken, ConnectionConfig, ConnectionManager, CrudRequest, CrudService,
};
use serde_json::{Value, json};

pub async fn run(args: Vec<String>) -> anyhow::Result<()> {
    let inv = match cli::parse_args(&args)? {
        Command::Help => {
            cli::print_help();
            return Ok(());
        }
        Command::Run(inv) => inv,
    };

    dotenvy::dotenv().ok();
    init_tracing();

    let service = CrudService::new(ConnectionManager::new(ConnectionConfig::from_env()));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling");
            trigger.cancel();
        }
    });

    let result = execute(&service, inv, &cancel).await;
    service.provider().close();

    let output = result?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    if output.get("success") == Some(&Value::Bool(false)) {
        anyhow::bail!("connection test failed");
    }
    Ok(())
}

async fn execute(
    service: &CrudService,
    inv: Invocation,
    cancel: &CancellationToken,
) -> anyhow::Result<Value> {
    let request = request_for(&inv);
    let output = match inv.action {
        Action::TestConnection => serde_json::to_value(service.test_connection(cancel).await)?,
        Action::CreateDatabase => {
            let name = inv.name.as_deref().unwrap_or_default();
            serde_json::to_value(service.create_database(name, cancel).await?)?
        }
        Action::CreateTable => {
            let columns = inv.columns.as_deref().unwrap_or_default();
            serde_json::to_value(service.create_table(&request, columns, cancel).await?)?
        }
        Action::DropTable => serde_json::to_value(service.drop_table(&request, cancel).await?)?,
        Action::ShowCreateTable => {
            json!({ "createTableSql": service.get_create_table_sql(&request, cancel).await? })
        }
        Action::Insert => serde_json::to_value(service.insert(&request, cancel).await?)?,
        Action::Select => serde_json::to_value(service.select(&request, cancel).await?)?,
        Action::Update => serde_json::to_value(service.update(&request, cancel).await?)?,
        Action::Delete => serde_json::to_value(service.delete(&request, cancel).await?)?,
    };
    Ok(output)
}

fn request_for(inv: &Invocation) -> CrudRequest {
    let mut request = CrudRequest::new(
        inv.database.clone().unwrap_or_default(),
        inv.table.clone().unwrap_or_default(),
    );
    request.schema = inv.schema.clone();
    request.values = inv.data.clone().unwrap_or_default();
    request.condition = inv.condition.clone();
    request
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
