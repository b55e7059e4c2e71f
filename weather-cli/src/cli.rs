use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use district_weather_core::{
    Config, ForecastService, Ranking, TravelQuery, model::parse_travel_date,
};
use inquire::Text;

use crate::server;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "district-weather",
    version,
    about = "Coolest districts and travel advice from weather forecasts"
)]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP API.
    Serve {
        /// Listen address, e.g. "0.0.0.0:8000". Overrides `server.bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Show the coolest districts for the coming week.
    Top,

    /// Decide whether traveling between two districts is advisable.
    Decide {
        /// Id of the district you are in.
        current: String,

        /// Id of the district you want to visit.
        destination: String,

        /// Travel date as YYYY-MM-DD.
        #[arg(long)]
        date: String,
    },

    /// Interactively write the config file.
    Configure,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let Cli { config: config_path, command } = self;

        let config = match &config_path {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };

        match command {
            Command::Serve { bind } => {
                let bind = bind.unwrap_or_else(|| config.server.bind.clone());
                let service = ForecastService::from_config(&config)?;
                server::serve(&bind, service).await?;
            }
            Command::Top => {
                let service = ForecastService::from_config(&config)?;
                let ranking = service
                    .top_districts()
                    .await
                    .context("Failed to rank districts")?;
                print!("{}", format_ranking(&ranking));
            }
            Command::Decide {
                current,
                destination,
                date,
            } => {
                let query = TravelQuery::new(
                    current.parse()?,
                    destination.parse()?,
                    parse_travel_date(&date)?,
                );
                let service = ForecastService::from_config(&config)?;
                let decision = service
                    .travel_decision(&query)
                    .await
                    .context("Failed to make a travel decision")?;
                println!("{}: {}", decision.travel_date, decision.decision);
            }
            Command::Configure => configure(config, config_path.as_deref())?,
        }

        Ok(())
    }
}

fn ask(message: &str, current: &str) -> anyhow::Result<String> {
    let answer = Text::new(message).with_default(current).prompt()?;
    Ok(answer.trim().to_string())
}

fn configure(mut config: Config, path: Option<&Path>) -> anyhow::Result<()> {
    let url = ask("District directory URL:", &config.directory.url)?;
    config.directory.url = url;

    let base_url = ask("Weather API base URL:", &config.weather.base_url)?;
    config.weather.base_url = base_url;

    let bind = ask("HTTP listen address:", &config.server.bind)?;
    config.server.bind = bind;

    config.validate()?;

    let saved = match path {
        Some(path) => {
            config.save_to(path)?;
            path.to_path_buf()
        }
        None => config.save()?,
    };

    println!("Configuration saved to {}", saved.display());
    Ok(())
}

fn format_ranking(ranking: &Ranking) -> String {
    let width = ranking
        .districts
        .iter()
        .map(|r| r.district_name.chars().count())
        .max()
        .unwrap_or(0)
        .max("District".len());

    let mut out = format!("{:>3}  {:<width$}  Avg °C\n", "#", "District");
    for (i, result) in ranking.districts.iter().enumerate() {
        out.push_str(&format!(
            "{:>3}  {:<width$}  {:>6.2}\n",
            i + 1,
            result.district_name,
            result.average_temperature
        ));
    }
    if ranking.failed > 0 {
        out.push_str(&format!(
            "({} districts left out: forecast unavailable)\n",
            ranking.failed
        ));
    }
    out
}
