//! CLI tool for rolling portfolio statistics
//! Usage: rolling_stats <window> [svg_path] < input.json > output.json
//!
//! Input is either a JSON array of portfolio values or an object
//! `{"dates": ["2022-04-05", ...], "values": [...]}`. A bare array is dated
//! one day apart starting at 1970-01-01.

use std::io::{self, Read, Write};
use std::path::PathBuf;

use backtest_analytics::{render_rolling_stats, AnalyticsError, PortfolioValueSeries};
use chrono::NaiveDate;
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum Input {
    Values(Vec<f64>),
    Dated { dates: Vec<NaiveDate>, values: Vec<f64> },
}

fn into_series(input: Input) -> backtest_analytics::Result<PortfolioValueSeries> {
    match input {
        Input::Dated { dates, values } => PortfolioValueSeries::new(dates, values),
        Input::Values(values) => {
            let dates = NaiveDate::default().iter_days().take(values.len()).collect();
            PortfolioValueSeries::new(dates, values)
        }
    }
}

fn run(window: usize, svg_path: Option<PathBuf>) -> backtest_analytics::Result<()> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    let series = into_series(serde_json::from_str(&input)?)?;

    let rendered = render_rolling_stats(&series, window, &mut io::stderr())?;

    if let Some(path) = svg_path {
        std::fs::write(&path, &rendered.svg)?;
    }

    let output = serde_json::json!({
        "result": rendered.result,
        "summary": rendered.summary,
    });
    io::stdout().write_all(serde_json::to_string(&output)?.as_bytes())?;
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: rolling_stats <window> [svg_path]");
        eprintln!("Input: JSON array of portfolio values, or {{\"dates\": [...], \"values\": [...]}} on stdin");
        eprintln!("Output: JSON rolling result and summary on stdout, summary lines on stderr");
        std::process::exit(1);
    }

    let window: usize = match args[1].parse() {
        Ok(w) => w,
        Err(_) => {
            eprintln!("Invalid window: {}", args[1]);
            std::process::exit(1);
        }
    };
    let svg_path = args.get(2).map(PathBuf::from);

    if let Err(e) = run(window, svg_path) {
        match e {
            AnalyticsError::Json(_) => eprintln!("Invalid JSON input: {}", e),
            _ => eprintln!("Error: {}", e),
        }
        std::process::exit(1);
    }
}
