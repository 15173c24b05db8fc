//! Terminal dashboard.
//!
//! Commands, one per line: `r` retry, `s <column>` sort by rank, name,
//! price, change, cap or volume (repeat to flip), `q` quit.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use crypto_dashboard::{
    config::DashboardConfig,
    dashboard::{
        HttpDashboardApi, mount,
        render::{SortKey, TableSort, render},
    },
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing("warn");

    let config = DashboardConfig::from_env()?;
    let api = Arc::new(HttpDashboardApi::new(&config)?);

    let handle = mount(api, config.refresh_interval);
    let mut updates = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sort = TableSort::default();

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                redraw(&handle.current(), sort);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let mut parts = line.split_whitespace();
                match (parts.next(), parts.next()) {
                    (Some("q"), _) => break,
                    (Some("r"), _) => {
                        if !handle.retry() {
                            println!("Retry is only available after an error");
                        }
                    }
                    (Some("s"), Some(column)) => match SortKey::parse(column) {
                        Some(key) => {
                            sort = sort.select(key);
                            redraw(&handle.current(), sort);
                        }
                        None => println!("Unknown column '{}'", column),
                    },
                    _ => println!("Commands: r | s <rank|name|price|change|cap|volume> | q"),
                }
            }
        }
    }

    Ok(())
}

fn redraw(state: &crypto_dashboard::dashboard::DashboardState, sort: TableSort) {
    // Clear screen, cursor home
    print!("\x1B[2J\x1B[H");
    println!("{}", render(state, sort));
}
