//! SurveyKit CLI - run and inspect SurveyKit tasks from the terminal.

mod demo;

use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use surveykit_core::{
    AnswerType, AnswerValue, AuthorizationStatus, BaseKind, BaseType, CachedAuthorization,
    CollectionKind, DataType, InMemoryPermissionCache, ItemGroup, PermissionCache, RunConfig,
    StepChange, TableItemKind, TaskRun,
};

/// SurveyKit CLI - task runner and answer codec
#[derive(Parser)]
#[command(name = "surveykit")]
#[command(about = "Run and inspect SurveyKit tasks", long_about = None)]
struct Cli {
    /// Log filter directive, overriding RUST_LOG for the surveykit crates
    #[arg(long, default_value = "surveykit=info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demo survey, reading commands from stdin
    Demo {
        /// Deny every sensor permission prompt
        #[arg(long)]
        deny_permissions: bool,

        /// Disallow going back
        #[arg(long)]
        one_way: bool,
    },

    /// Validate and print the demo task graph
    Outline,

    /// Decode a JSON answer and encode it again
    Codec {
        /// Base type of the answer
        #[arg(short, long, value_enum)]
        base: BaseArg,

        /// Answer is an ordered list
        #[arg(long)]
        sequence: bool,

        /// Separator accepted when a sequence arrives as a string
        #[arg(long)]
        separator: Option<String>,

        /// Decimals are fractions
        #[arg(long)]
        fraction: bool,

        /// strftime pattern for dates
        #[arg(long)]
        date_format: Option<String>,

        /// JSON value to decode
        json: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BaseArg {
    String,
    Boolean,
    Integer,
    Decimal,
    Date,
    Data,
}

impl From<BaseArg> for BaseType {
    fn from(arg: BaseArg) -> Self {
        match arg {
            BaseArg::String => BaseType::String,
            BaseArg::Boolean => BaseType::Boolean,
            BaseArg::Integer => BaseType::Integer,
            BaseArg::Decimal => BaseType::Decimal,
            BaseArg::Date => BaseType::Date,
            BaseArg::Data => BaseType::Data,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(cli.log_level.parse()?))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Demo {
            deny_permissions,
            one_way,
        } => {
            run_demo(deny_permissions, one_way).await?;
        }
        Commands::Outline => {
            let task = demo::demo_task()?;
            let revision = task.schema_info.get("revision").map(String::as_str).unwrap_or("-");
            println!("{} (revision {revision})", task.identifier);
            demo::print_outline(&task.navigator, 1);
            for action in task.coordinator.actions() {
                let start = action.start_step_identifier.as_ref().map(|s| s.as_str()).unwrap_or("<first step>");
                let stop = action.stop_step_identifier.as_ref().map(|s| s.as_str()).unwrap_or("<end>");
                println!("  action {}: {start} .. {stop}", action.identifier);
            }
        }
        Commands::Codec {
            base,
            sequence,
            separator,
            fraction,
            date_format,
            json,
        } => {
            codec(base, sequence, separator, fraction, date_format, &json)?;
        }
    }

    Ok(())
}

fn codec(
    base: BaseArg,
    sequence: bool,
    separator: Option<String>,
    fraction: bool,
    date_format: Option<String>,
    json: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut answer_type = AnswerType::new(base.into());
    if sequence {
        answer_type = answer_type.with_sequence();
    }
    if let Some(separator) = separator {
        answer_type = answer_type.with_separator(separator);
    }
    if let Some(format) = date_format {
        answer_type = answer_type.with_date_format(format);
    }
    if fraction {
        let data_type = if sequence {
            DataType::Collection(CollectionKind::MultipleChoice, BaseKind::Fraction)
        } else {
            DataType::Base(BaseKind::Fraction)
        };
        answer_type = answer_type.with_form_data_type(data_type);
    }

    let input: serde_json::Value = serde_json::from_str(json)?;
    let decoded = answer_type.decode(&input)?;
    let encoded = answer_type.encode_answer(decoded.as_ref())?;

    println!("type:    {answer_type}");
    println!("decoded: {decoded:?}");
    println!("encoded: {encoded}");
    Ok(())
}

async fn run_demo(deny_permissions: bool, one_way: bool) -> Result<(), Box<dyn std::error::Error>> {
    let task = Arc::new(demo::demo_task()?);
    let config = if one_way {
        RunConfig::default().one_way()
    } else {
        RunConfig::default()
    };
    let cache: Arc<dyn PermissionCache> = Arc::new(InMemoryPermissionCache::new());
    let requester = Arc::new(demo::FixedRequester {
        grant: !deny_permissions,
    });

    let mut run = TaskRun::new(Arc::clone(&task), config);
    info!(run_id = %run.run_id(), "Demo run created");

    println!("Commands: <text> answer, #n toggle choice, next, skip, back, quit");
    let change = run.start()?;
    report(&change, &cache, &requester).await?;
    demo::print_step(&run);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while !run.status().is_terminal() {
        let Some(line) = lines.next_line().await? else {
            report(&run.cancel(), &cache, &requester).await?;
            break;
        };
        let line = line.trim();

        let outcome = match line {
            "" => continue,
            "next" => run.go_forward().map(Some),
            "skip" => run.skip_forward().map(Some),
            "back" => run.go_back().map(Some),
            "quit" => Ok(Some(run.cancel())),
            command => match command.strip_prefix('#').map(str::parse::<usize>) {
                Some(Ok(row)) => toggle(&mut run, row).map(|()| None),
                Some(Err(_)) => {
                    println!("Expected a row number after '#'");
                    continue;
                }
                None => answer_text(&mut run, command).map(|()| None),
            },
        };

        match outcome {
            Ok(Some(change)) => report(&change, &cache, &requester).await?,
            Ok(None) => {}
            Err(e) if e.is_recoverable() => println!("! {e}"),
            Err(e) => {
                warn!(error = %e, "Command failed");
                println!("! {e}");
            }
        }
        demo::print_step(&run);
    }

    println!();
    println!("{}", serde_json::to_string_pretty(run.result())?);
    Ok(())
}

/// Toggle the choice row with absolute index `row`.
fn toggle(run: &mut TaskRun, row: usize) -> Result<(), surveykit_core::CoreError> {
    let identifier = run
        .item_groups()
        .iter()
        .find(|g| row >= g.beginning_row_index() && row < g.beginning_row_index() + g.items().len())
        .map(|g| g.identifier().to_string());
    let Some(group) = identifier.as_deref().and_then(|id| run.item_group_mut(id)) else {
        println!("No row #{row} on this step");
        return Ok(());
    };
    group.select(row)
}

/// Set a typed answer on the first text row of the step.
fn answer_text(run: &mut TaskRun, text: &str) -> Result<(), surveykit_core::CoreError> {
    let identifier = run
        .item_groups()
        .iter()
        .find(|g| g.items().iter().any(|i| matches!(i.kind, TableItemKind::Text(_))))
        .map(|g| g.identifier().to_string());
    let Some(group) = identifier.as_deref().and_then(|id| run.item_group_mut(id)) else {
        println!("This step has no text entry");
        return Ok(());
    };
    group.set_answer(Some(AnswerValue::from(text)))
}

/// Print action deltas, asking for permission before starting an action
/// that needs one.
async fn report(
    change: &StepChange,
    cache: &Arc<dyn PermissionCache>,
    requester: &Arc<demo::FixedRequester>,
) -> Result<(), Box<dyn std::error::Error>> {
    for action in &change.actions_to_start {
        if let Some(permission) = action.permission {
            let authorization = CachedAuthorization::new(permission, Arc::clone(cache), requester.clone());
            let status = match authorization.status() {
                AuthorizationStatus::NotDetermined => authorization.request().await?,
                status => status,
            };
            if !status.is_authorized() {
                println!("~ {} not started: {permission} permission {status:?}", action.identifier);
                continue;
            }
        }
        println!("~ start {}", action.identifier);
    }
    for action in &change.actions_to_stop {
        println!("~ stop {}", action.identifier);
    }
    if change.is_finished {
        println!("~ finished");
    }
    Ok(())
}
