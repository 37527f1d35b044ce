use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use peer_portal::chart::{ChartData, ChartKind};
use peer_portal::data::export;
use peer_portal::data::filter::{EmptySelection, Facet};
use peer_portal::data::pipeline::Statistic;
use peer_portal::{Grouping, PortalConfig, Session};

/// Load PEER datasets, filter them and write the resulting table or chart data.
#[derive(Debug, Parser)]
#[command(name = "peer-portal", version)]
struct Cli {
    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory auto-loaded at start (overrides the config).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Extra files to add, as if uploaded.
    #[arg(long = "file")]
    files: Vec<PathBuf>,

    /// Theme to query; without it the available themes are listed.
    #[arg(long)]
    theme: Option<String>,

    #[arg(long = "region")]
    regions: Vec<String>,

    #[arg(long = "income")]
    incomes: Vec<String>,

    #[arg(long = "country")]
    countries: Vec<String>,

    /// Indicator columns (default: the first one of the theme).
    #[arg(long = "indicator")]
    indicators: Vec<String>,

    #[arg(long, default_value = "mean")]
    statistic: Statistic,

    /// Country, Region or Income (default: Country if countries are given, else Region).
    #[arg(long)]
    group_by: Option<Facet>,

    /// Emit chart data for bar, line, scatter, radar, funnel or map instead of the table.
    #[arg(long)]
    chart: Option<ChartKind>,

    /// Write the aggregated table instead of the filtered rows.
    #[arg(long)]
    aggregate: bool,

    /// match_all or reject (overrides the config).
    #[arg(long)]
    empty_selection: Option<EmptySelection>,

    /// Print the snapshot link of this country and exit.
    #[arg(long)]
    snapshot: Option<String>,

    /// Write JSON instead of CSV.
    #[arg(long)]
    json: bool,

    /// Output file (default: stdout).
    #[arg(long, short)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PortalConfig::load(path)?,
        None => PortalConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(policy) = cli.empty_selection {
        config.empty_selection = policy;
    }

    let mut session = Session::start(config);
    session.load_files(&cli.files);
    for warning in &session.warnings {
        eprintln!("warning: {warning}");
    }

    if session.store().is_empty() {
        bail!(
            "No data. Pass --file or place files in {}",
            session.config().data_dir.display()
        );
    }

    let Some(theme) = &cli.theme else {
        for theme in session.themes() {
            println!("{theme}");
        }
        return Ok(());
    };
    session.select_theme(theme)?;
    apply_selection(&mut session, &cli);

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };

    if let Some(country) = &cli.snapshot {
        match session.snapshot_url(country)? {
            Some(url) => writeln!(out, "{url}")?,
            None => eprintln!("no snapshot for {country}"),
        }
        return Ok(());
    }

    if cli.chart.is_some() {
        let data = session.chart_data()?;
        match &data {
            ChartData::Empty => eprintln!("No data to plot."),
            ChartData::Map(map) => {
                if let Some(notice) = map.unmapped_notice() {
                    eprintln!("{notice}");
                }
            }
            _ => {}
        }
        serde_json::to_writer_pretty(&mut out, &data)?;
        writeln!(out)?;
        return Ok(());
    }

    let table = if cli.aggregate {
        session.plot_table(true)?.0
    } else {
        session.filtered_table()?
    };
    if table.is_empty() {
        eprintln!("Nothing to show for this selection.");
    }
    if cli.json {
        export::write_json(&table, &mut out)?;
        writeln!(out)?;
    } else {
        export::write_csv(&table, &mut out)?;
    }
    Ok(())
}

/// Layer the command-line choices over the theme defaults.
fn apply_selection(session: &mut Session, cli: &Cli) {
    let selection = &mut session.selection;
    if !cli.regions.is_empty() {
        selection.filters.regions = cli.regions.iter().cloned().collect();
    }
    if !cli.incomes.is_empty() {
        selection.filters.incomes = cli.incomes.iter().cloned().collect();
    }
    selection.filters.countries = cli.countries.iter().cloned().collect();
    if !cli.indicators.is_empty() {
        selection.indicators = cli.indicators.clone();
    }
    selection.statistic = cli.statistic;
    if let Some(facet) = cli.group_by {
        selection.grouping = Grouping::By(facet);
    }
    if let Some(chart) = cli.chart {
        selection.chart = chart;
    }
    log::debug!("selection: {selection:?}");
}
