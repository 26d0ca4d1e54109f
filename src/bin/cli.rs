use analyst::core::cache::TtlCache;
use analyst::core::config::AnalystConfig;
use analyst::market::BybitClient;
use analyst::report;
use analyst::sec::SecClient;
use analyst::tools::{register_builtin_tools, ToolContext, ToolRegistry};
use analyst::trades::TradeStore;
use analyst::{eval, repl};
use colored::*;
use rustyline::error::ReadlineError;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "analyst-cli", about = "Investment research assistant")]
struct Opt {
    /// Analyze a single report file and print the digest
    #[structopt(long)]
    analyze: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    env_logger::init();
    log::debug!("Logger initialized");

    let opt = Opt::from_args();

    if let Some(path) = opt.analyze {
        match report::analyze_report(&path) {
            Ok(analysis) => println!("{}", report::summarize_report(&analysis)),
            Err(e) => {
                eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let config = AnalystConfig::from_env()?;

    // Ctrl+C leaves the loop instead of killing the process mid-write.
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        println!("\nReceived Ctrl+C!");
        r.store(false, Ordering::SeqCst);
    })?;

    let cache = Arc::new(TtlCache::new());
    let ctx = ToolContext {
        sec: Arc::new(SecClient::new(&config)?.with_cache(cache.clone())),
        market: Arc::new(BybitClient::new(&config)?),
        trades: Arc::new(TradeStore::connect(&config.database_url).await?),
    };

    let mut registry = ToolRegistry::new();
    register_builtin_tools(&mut registry, ctx);
    log::info!("{} tools registered", registry.len());

    println!("{}", "Investment research assistant".green().bold());
    println!("Type '/tools' for the tool list, 'quit' to exit");

    let mut rl = repl::create_editor()?;
    let prompt = format!("{}", "> ".green().bold());

    while running.load(Ordering::SeqCst) {
        match rl.readline(&prompt) {
            Ok(line) => {
                let input = line.trim().to_string();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&input);

                if input == "quit" {
                    break;
                }

                if input == "/tools" {
                    println!("{}", eval::tool_listing(&registry));
                    continue;
                }

                match eval::eval(&input, &registry).await {
                    Ok(result) => println!("{}", result),
                    Err(e) => eprintln!("{} {}", "Error:".red(), e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    println!("\nGoodbye!");
    repl::save_history(&mut rl)?;

    Ok(())
}
