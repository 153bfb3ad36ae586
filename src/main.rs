//! Demo CLI for the trading core.
//!
//! Runs a deterministic simulation, a short live session against the mock
//! venue, and browses archived sessions. All data is synthetic; the point is
//! to exercise the library end to end.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use riskdesk::db::Database;
use riskdesk::market::{FixturePrices, MarketData, ScriptedSignals};
use riskdesk::models::{SignalAction, TradingSignal};
use riskdesk::session::{SessionConfig, SessionManager, SessionStore};
use riskdesk::sim::{SimulationConfig, SimulationStepper};

const DEMO_SYMBOLS: [&str; 4] = ["AAPL", "MSFT", "NVDA", "XOM"];

/// Trading core demo CLI.
#[derive(Parser)]
#[command(name = "riskdesk")]
#[command(about = "Portfolio and risk trading core demo", long_about = None)]
struct Cli {
    /// Database file path
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:./riskdesk.db?mode=rwc")]
    database: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a deterministic simulation over synthetic prices
    Simulate {
        /// Initial capital
        #[arg(short, long, default_value = "100000")]
        capital: f64,

        /// First trading date (YYYY-MM-DD)
        #[arg(long, default_value = "2024-01-02")]
        start: NaiveDate,

        /// Last trading date (YYYY-MM-DD)
        #[arg(long, default_value = "2024-03-28")]
        end: NaiveDate,

        /// Model identifier stamped on the run
        #[arg(short, long, default_value = "demo-momentum")]
        model: String,
    },

    /// Run a short live session against the mock venue and archive it
    Demo {
        /// Initial capital
        #[arg(short, long, default_value = "100000")]
        capital: f64,
    },

    /// List archived sessions
    History,

    /// Show the trades of one archived session
    Trades {
        /// Session identifier
        session_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Simulate {
            capital,
            start,
            end,
            model,
        } => {
            info!(capital, %start, %end, "starting simulation");

            let market = Arc::new(demo_prices(start, end));
            let signals = Arc::new(demo_signals(&market, start, end));

            let config = SimulationConfig {
                model_id: model,
                start_date: start,
                end_date: end,
                initial_capital: Decimal::try_from(capital)?,
                universe: DEMO_SYMBOLS.iter().map(|s| s.to_string()).collect(),
                top_n: 10,
                session: SessionConfig::default(),
            };
            let mut stepper = SimulationStepper::new(config, market, signals)?;
            let report = stepper.run();
            println!("{report}");

            println!("\n--- Final Positions ---");
            for position in stepper.portfolio().positions.values() {
                println!(
                    "  {:<6} {:>8} @ {:>10.2} (P&L {:>+10.2})",
                    position.symbol,
                    position.quantity,
                    position.current_price,
                    position.unrealized_pnl()
                );
            }
        }

        Commands::Demo { capital } => {
            info!(capital, "starting mock live session");

            let db = Database::new(&cli.database).await?;
            let store = Arc::new(SessionStore::with_database(db));

            let today = chrono::Utc::now().date_naive();
            let mut prices = FixturePrices::new();
            for (i, symbol) in DEMO_SYMBOLS.iter().enumerate() {
                prices.set(symbol, today, dec!(50) + Decimal::from(i as u32) * dec!(25));
            }

            let venue = Arc::new(riskdesk::venue::MockVenue::new(dec!(1000000)));
            for symbol in DEMO_SYMBOLS {
                if let Some(price) = prices.get_price(symbol, today) {
                    venue.set_fill_price(symbol, price);
                }
            }
            let manager = SessionManager::new(store, venue, Arc::new(prices.clone()));

            let session = manager
                .start_session("demo-momentum", Decimal::try_from(capital)?, SessionConfig::default())
                .await?;
            let id = session.session_id.clone();
            println!("Started session {id}");

            let signals: Vec<TradingSignal> = DEMO_SYMBOLS
                .iter()
                .map(|s| TradingSignal::new(*s, SignalAction::Buy))
                .collect();
            let results = manager.execute_batch(&id, &signals).await?;
            for result in &results {
                println!("  {:<6} {:?} {:?}", result.symbol, result.outcome, result.reasons);
            }

            // Mark positions up 2% and record the period return.
            let marks: HashMap<String, Decimal> = DEMO_SYMBOLS
                .iter()
                .filter_map(|s| prices.get_price(s, today).map(|p| (s.to_string(), p * dec!(1.02))))
                .collect();
            let snapshot = manager.mark_to_market(&id, &marks).await?;
            println!("\n{snapshot}");

            if let Some(alert) = manager.check_risk_alerts(&id).await? {
                println!("ALERT [{}]: {}", alert.severity.as_str(), alert.message);
            }

            let summary = manager.stop_session(&id).await?;
            println!("\n{summary}");
        }

        Commands::History => {
            let db = Database::new(&cli.database).await?;
            let sessions = db.list_sessions().await?;

            if sessions.is_empty() {
                println!("No archived sessions. Run 'riskdesk demo' to create one.");
                return Ok(());
            }

            println!(
                "\n{:<38} {:<16} {:>12} {:>9} {:>7}",
                "SESSION", "MODEL", "FINAL VALUE", "RETURN", "TRADES"
            );
            println!("{}", "-".repeat(88));
            for session in sessions {
                println!(
                    "{:<38} {:<16} {:>12.2} {:>8.2}% {:>7}",
                    session.session_id,
                    session.model_id,
                    session.final_value,
                    session.total_return_pct,
                    session.num_trades
                );
            }
        }

        Commands::Trades { session_id } => {
            let db = Database::new(&cli.database).await?;
            let trades = db.session_trades(&session_id).await?;

            if trades.is_empty() {
                println!("No trades recorded for session {session_id}.");
                return Ok(());
            }

            println!(
                "\n{:<20} {:<6} {:<5} {:>10} {:>10} {:>12}",
                "TIMESTAMP", "SYMBOL", "SIDE", "QTY", "PRICE", "TOTAL COST"
            );
            println!("{}", "-".repeat(70));
            for trade in trades {
                println!(
                    "{:<20} {:<6} {:<5} {:>10.0} {:>10.2} {:>12.2}",
                    &trade.timestamp[..19.min(trade.timestamp.len())],
                    trade.symbol,
                    trade.action,
                    trade.quantity,
                    trade.price,
                    trade.total_cost
                );
            }
        }
    }

    Ok(())
}

/// Deterministic synthetic prices: each symbol starts at its own level and
/// cycles a fixed pattern of daily moves.
fn demo_prices(start: NaiveDate, end: NaiveDate) -> FixturePrices {
    let moves = [
        dec!(0.004),
        dec!(-0.002),
        dec!(0.006),
        dec!(-0.005),
        dec!(0.003),
        dec!(-0.001),
        dec!(0.002),
    ];
    let starts = [dec!(185), dec!(370), dec!(480), dec!(102)];

    let mut prices = FixturePrices::new();
    let calendar = prices.get_calendar(start, end);
    for (i, symbol) in DEMO_SYMBOLS.iter().enumerate() {
        let mut price = starts[i];
        for (day, date) in calendar.iter().enumerate() {
            prices.set(symbol, *date, price.round_dp(4));
            let step = moves[(day + i) % moves.len()];
            price *= Decimal::ONE + step;
        }
    }
    prices
}

/// Buy the whole universe on the first day, rotate one symbol weekly, and
/// liquidate everything on the last day.
fn demo_signals(market: &FixturePrices, start: NaiveDate, end: NaiveDate) -> ScriptedSignals {
    let calendar = market.get_calendar(start, end);
    let mut scripted = ScriptedSignals::new();

    if let Some(first) = calendar.first() {
        scripted.on(
            *first,
            DEMO_SYMBOLS
                .iter()
                .map(|s| TradingSignal::new(*s, SignalAction::Buy))
                .collect(),
        );
    }
    for (week, chunk) in calendar.chunks(5).enumerate().skip(1) {
        if let Some(date) = chunk.first() {
            let symbol = DEMO_SYMBOLS[week % DEMO_SYMBOLS.len()];
            scripted.on(
                *date,
                vec![
                    TradingSignal::new(symbol, SignalAction::Sell),
                    TradingSignal::new(symbol, SignalAction::Buy),
                ],
            );
        }
    }
    if let Some(last) = calendar.last() {
        scripted.on(
            *last,
            DEMO_SYMBOLS
                .iter()
                .map(|s| TradingSignal::new(*s, SignalAction::Sell))
                .collect(),
        );
    }
    scripted
}
