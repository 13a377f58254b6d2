use std::time::Duration;

use channel::{ChannelConfig, SyncChannel};
use clap::{Args, Parser, Subcommand};
use graph::PriceSeries;
use messages::{CommandResult, GraphPoint, GraphUpdate, HealthReport, Message};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("sync channel failed: {0}")]
    Channel(#[from] channel::ChannelError),
    #[error("invalid payload: {0}")]
    Codec(#[from] messages::CodecError),
    #[error("timed out waiting for `{0}` reply")]
    Timeout(String),
    #[error("server returned error for {action}: {message}")]
    ServerError { action: String, message: String },
}

#[derive(Parser, Debug)]
#[command(name = "tradesync", about = "Trading dashboard sync CLI")]
struct Cli {
    #[arg(long, env = "TRADESYNC_BASE_URL", default_value = "http://127.0.0.1:8000")]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe the server health endpoint once.
    Health,
    /// Poll the health endpoint every second.
    Watch,
    /// Start or stop trading.
    Trading(TradingCommand),
    /// Sync and print a ticker's price graph.
    Graph(GraphArgs),
}

#[derive(Args, Debug)]
struct TradingCommand {
    #[command(subcommand)]
    command: TradingSubcommand,
}

#[derive(Subcommand, Debug)]
enum TradingSubcommand {
    Start,
    Stop,
}

#[derive(Args, Debug)]
struct GraphArgs {
    ticker: String,

    /// History window passed through to the server, e.g. 1d, 7d, 1mo.
    #[arg(long, default_value = "7d")]
    sync_time: String,

    /// Keep following live graph updates after the initial sync.
    #[arg(long, default_value_t = false)]
    follow: bool,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Health => run_health(&cli.base_url).await,
        Command::Watch => run_watch(&cli.base_url).await,
        Command::Trading(trading) => run_trading(&cli.base_url, trading).await,
        Command::Graph(args) => run_graph(&cli.base_url, args).await,
    }
}

async fn run_health(base_url: &str) -> Result<(), CliError> {
    let report = fetch_health(base_url).await?;
    print_health(&report);

    if report.all_passing() {
        Ok(())
    } else {
        Err(CliError::ServerError {
            action: "healthcheck".to_owned(),
            message: "one or more checks failed".to_owned(),
        })
    }
}

async fn run_watch(base_url: &str) -> Result<(), CliError> {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;
        match fetch_health(base_url).await {
            Ok(report) => print_health(&report),
            // A transport failure leaves every sub-check unverifiable.
            Err(error) => eprintln!("healthcheck unreachable: {error}"),
        }
    }
}

async fn run_trading(base_url: &str, trading: TradingCommand) -> Result<(), CliError> {
    let action = match trading.command {
        TradingSubcommand::Start => "start_trading",
        TradingSubcommand::Stop => "stop_trading",
    };

    let channel = open_channel(base_url)?;
    let reply = request_with_deadline(&channel, Message::new(action)).await?;
    let result = reply.parse_data::<CommandResult>()?;
    channel.close();

    if result.is_ok() {
        println!("{action}: ok");
        Ok(())
    } else {
        Err(CliError::ServerError {
            action: action.to_owned(),
            message: result.result,
        })
    }
}

async fn run_graph(base_url: &str, args: GraphArgs) -> Result<(), CliError> {
    let channel = open_channel(base_url)?;

    // Subscribe before syncing so no live update slips between the two.
    let mut updates = channel.subscribe("update_graph");

    let request = Message::new("graph_sync")
        .with_field("ticker", json!(args.ticker))
        .with_field("sync_time", json!(args.sync_time));
    let reply = request_with_deadline(&channel, request).await?;
    let points = reply.parse_data::<Vec<GraphPoint>>()?;

    let mut series = PriceSeries::new(args.ticker.clone());
    series.replace(points);
    for point in &series.points {
        print_point(point);
    }

    if !args.follow {
        channel.close();
        return Ok(());
    }

    eprintln!("following live updates for {}", args.ticker);
    while let Some(message) = updates.recv().await {
        let update = match message.parse_data::<GraphUpdate>() {
            Ok(update) => update,
            Err(error) => {
                tracing::warn!(error = %error, "dropping malformed graph update");
                continue;
            }
        };
        if series.apply_update(&update) {
            if let Some(point) = series.points.last() {
                print_point(point);
            }
        }
    }

    channel.close();
    Ok(())
}

fn open_channel(base_url: &str) -> Result<SyncChannel, CliError> {
    let endpoint = sync_url(base_url)?;
    Ok(SyncChannel::open(ChannelConfig::new(endpoint)))
}

async fn request_with_deadline(
    channel: &SyncChannel,
    message: Message,
) -> Result<Message, CliError> {
    let action = message.action.clone();
    tokio::time::timeout(Duration::from_secs(15), channel.request(message))
        .await
        .map_err(|_| CliError::Timeout(action))?
        .map_err(CliError::from)
}

fn sync_url(base_url: &str) -> Result<String, CliError> {
    if let Some(rest) = base_url.strip_prefix("http://") {
        return Ok(format!("ws://{}/sync", rest.trim_end_matches('/')));
    }
    if let Some(rest) = base_url.strip_prefix("https://") {
        return Ok(format!("wss://{}/sync", rest.trim_end_matches('/')));
    }

    Err(CliError::InvalidBaseUrl(base_url.to_owned()))
}

async fn fetch_health(base_url: &str) -> Result<HealthReport, CliError> {
    let url = format!("{}/healthcheck", base_url.trim_end_matches('/'));
    let report = reqwest::Client::new()
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json::<HealthReport>()
        .await?;
    Ok(report)
}

fn print_health(report: &HealthReport) {
    print_check("trade_node_check", report.trade_node_check);
    print_check("broker_api_check", report.broker_api_check);
    if let Some(internet) = report.internet_check {
        print_check("internet_check", internet);
    }
}

fn print_check(name: &str, passed: bool) {
    if passed {
        println!("{name}: OK");
    } else {
        println!("{name}: FAILED");
    }
}

fn print_point(point: &GraphPoint) {
    println!("{}\t{:.2}\t{}", point.timestamp, point.price, point.state.as_str());
}
