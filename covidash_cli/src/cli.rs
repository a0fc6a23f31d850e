use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use clap::{command, Args, Parser, Subcommand};
use covidash::{
    config::Config,
    formatters::{CSVFormatter, JsonFormatter, OutputFormatter, OutputGenerator},
    selection::{parse_mode, CaseDataset, CaseMode, MapMode, VaccinationMode},
    Covidash,
};
use enum_dispatch::enum_dispatch;
use itertools::Itertools;
use log::{debug, info};
use polars::frame::DataFrame;
use serde::{Deserialize, Serialize};
use spinners::{Spinner, Spinners};
use strum_macros::EnumString;

use crate::display::{display_countries, display_sources, display_summary};
use crate::error::CovidashCliResult;

const DEFAULT_PROGRESS_SPINNER: Spinners = Spinners::Dots;
const COMPLETE_PROGRESS_STRING: &str = "✔";
const RUNNING_TAIL_STRING: &str = "...";
const DOWNLOADING_STRING: &str = "Downloading datasets";

/// Defines the output formats we are able to produce tables in.
#[derive(Clone, Debug, Deserialize, Serialize, EnumString, PartialEq, Eq)]
#[strum(ascii_case_insensitive)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl From<&OutputFormat> for OutputFormatter {
    fn from(value: &OutputFormat) -> Self {
        match value {
            OutputFormat::Csv => OutputFormatter::Csv(CSVFormatter),
            OutputFormat::Json => OutputFormatter::Json(JsonFormatter),
        }
    }
}

impl From<OutputFormat> for OutputFormatter {
    fn from(value: OutputFormat) -> Self {
        Self::from(&value)
    }
}

fn output_writer<U: AsRef<Path>>(output_file: Option<U>) -> CovidashCliResult<Box<dyn Write>> {
    Ok(match output_file {
        Some(output_file) => {
            Box::new(File::create(output_file).context("Failed to write output")?)
        }
        None => Box::new(std::io::stdout().lock()),
    })
}

fn write_output<T, U>(
    output_generator: T,
    mut data: DataFrame,
    output_file: Option<U>,
) -> CovidashCliResult<()>
where
    T: OutputGenerator,
    U: AsRef<Path>,
{
    let mut writer = output_writer(output_file)?;
    output_generator.save(&mut writer, &mut data)?;
    Ok(())
}

/// Download every dataset behind a spinner unless `quiet` is set.
async fn load(config: Config, quiet: bool) -> CovidashCliResult<Covidash> {
    let sp = (!quiet).then(|| {
        Spinner::with_timer(
            DEFAULT_PROGRESS_SPINNER,
            DOWNLOADING_STRING.to_string() + RUNNING_TAIL_STRING,
        )
    });
    let covidash = Covidash::new_with_config(config).await;
    if let Some(mut s) = sp {
        s.stop_with_symbol(COMPLETE_PROGRESS_STRING)
    }
    Ok(covidash?)
}

/// Trait that defines what to run when a given subcommand is invoked.
#[enum_dispatch]
pub trait RunCommand {
    async fn run(&self, config: Config) -> CovidashCliResult<()>;
}

/// The `countries` command lists the supported countries and their population.
#[derive(Args, Debug)]
pub struct CountriesCommand {
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for CountriesCommand {
    async fn run(&self, config: Config) -> CovidashCliResult<()> {
        info!("Running `countries` subcommand");
        let covidash = load(config, self.quiet).await?;
        display_countries(&covidash)?;
        Ok(())
    }
}

/// The `summary` command shows the derived metrics of every country.
#[derive(Args, Debug)]
pub struct SummaryCommand {
    #[arg(
        short = 'f',
        long,
        value_name = "csv|json",
        help = "Write the table in this format instead of displaying it"
    )]
    output_format: Option<OutputFormat>,
    #[arg(short = 'o', long, help = "Output file to place the results")]
    output_file: Option<String>,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for SummaryCommand {
    async fn run(&self, config: Config) -> CovidashCliResult<()> {
        info!("Running `summary` subcommand");
        let covidash = load(config, self.quiet).await?;
        match (&self.output_format, &self.output_file) {
            (None, None) => display_summary(&covidash)?,
            (format, output_file) => {
                let formatter: OutputFormatter =
                    format.clone().unwrap_or(OutputFormat::Csv).into();
                write_output(formatter, covidash.metrics().to_frame()?, output_file.as_deref())?;
            }
        }
        Ok(())
    }
}

/// The `map` command outputs the overview map values, as GeoJSON when a geometry reference is
/// configured, or as a plain table when a format is requested.
#[derive(Args, Debug)]
pub struct MapCommand {
    #[arg(
        short = 'm',
        long,
        default_value_t = MapMode::default(),
        value_parser = parse_mode::<MapMode>,
        help = "Metric to colour countries by"
    )]
    mode: MapMode,
    #[arg(
        short = 'f',
        long,
        value_name = "csv|json",
        help = "Write the map values as a table in this format"
    )]
    output_format: Option<OutputFormat>,
    #[arg(short = 'o', long, help = "Output file to place the results")]
    output_file: Option<String>,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for MapCommand {
    async fn run(&self, config: Config) -> CovidashCliResult<()> {
        info!("Running `map` subcommand");
        let covidash = load(config, self.quiet).await?;
        if let Some(format) = &self.output_format {
            let data = covidash.choropleth(self.mode).to_frame(self.mode.column())?;
            write_output(OutputFormatter::from(format), data, self.output_file.as_deref())?;
            return Ok(());
        }
        let output = match covidash.choropleth_features(self.mode) {
            Some(features) => features.to_string(),
            None => serde_json::to_string(&covidash.choropleth(self.mode))?,
        };
        let mut writer = output_writer(self.output_file.as_deref())?;
        writeln!(writer, "{output}")?;
        Ok(())
    }
}

/// The `cases` command outputs infection or recovery series for the selected countries.
#[derive(Args, Debug)]
pub struct CasesCommand {
    #[arg(
        short = 'd',
        long,
        default_value_t = CaseDataset::Infections,
        value_parser = parse_mode::<CaseDataset>,
        help = "Case series to show"
    )]
    dataset: CaseDataset,
    #[arg(
        short = 'm',
        long,
        default_value_t = CaseMode::default(),
        value_parser = parse_mode::<CaseMode>,
        help = "How to transform the cumulative counts"
    )]
    mode: CaseMode,
    #[command(flatten)]
    chart_args: ChartArgs,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for CasesCommand {
    async fn run(&self, config: Config) -> CovidashCliResult<()> {
        info!("Running `cases` subcommand");
        debug!("{:#?}", self);
        let covidash = load(config, self.quiet).await?;
        let chart = covidash.case_chart(self.dataset, self.mode, &self.chart_args.countries)?;
        info!("{}", chart.title);
        self.chart_args.write(chart.to_frame()?)
    }
}

/// The `vaccinations` command outputs vaccination series for the selected countries.
#[derive(Args, Debug)]
pub struct VaccinationsCommand {
    #[arg(
        short = 'm',
        long,
        default_value_t = VaccinationMode::default(),
        value_parser = parse_mode::<VaccinationMode>,
        help = "Counts or share of population, partial or full"
    )]
    mode: VaccinationMode,
    #[command(flatten)]
    chart_args: ChartArgs,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for VaccinationsCommand {
    async fn run(&self, config: Config) -> CovidashCliResult<()> {
        info!("Running `vaccinations` subcommand");
        debug!("{:#?}", self);
        let covidash = load(config, self.quiet).await?;
        let chart = covidash.vaccination_chart(self.mode, &self.chart_args.countries)?;
        info!("{}", chart.title);
        self.chart_args.write(chart.to_frame()?)
    }
}

/// Arguments shared by the chart commands.
#[derive(Args, Debug, Clone)]
struct ChartArgs {
    #[arg(
        short = 'c',
        long = "country",
        required = true,
        num_args = 1..,
        help = "Countries to include, e.g. `-c Austria -c \"Czech Republic\"`"
    )]
    countries: Vec<String>,
    #[arg(
        short = 'f',
        long,
        value_name = "csv|json",
        default_value = "csv",
        help = "Output format for the results"
    )]
    output_format: OutputFormat,
    #[arg(short = 'o', long, help = "Output file to place the results")]
    output_file: Option<String>,
}

impl ChartArgs {
    fn write(&self, data: DataFrame) -> CovidashCliResult<()> {
        debug!(
            "Writing {} for {}",
            data.shape().0,
            self.countries.iter().join(", ")
        );
        write_output(
            OutputFormatter::from(&self.output_format),
            data,
            self.output_file.as_deref(),
        )
    }
}

/// The `sources` command credits the institutions behind each dataset.
#[derive(Args, Debug)]
pub struct SourcesCommand {}

impl RunCommand for SourcesCommand {
    async fn run(&self, config: Config) -> CovidashCliResult<()> {
        info!("Running `sources` subcommand");
        display_sources(&config.sources())?;
        Ok(())
    }
}

/// The entrypoint for the CLI.
#[derive(Parser, Debug)]
#[command(version, about="Covidash summarises the pandemic across Europe", long_about = None, name="covidash")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    #[arg(
        long = "config",
        help = "Configuration file to use instead of the one in the platform config directory",
        global = true
    )]
    pub config: Option<String>,
    #[arg(
        short = 'q',
        long = "quiet",
        help = "\
            Do not print progress bar to stdout. Results and logs (when `RUST_LOG`\n\
            is set) will still be printed.",
        global = true
    )]
    quiet: bool,
}

/// Commands contains the list of subcommands avaliable for use in the CLI.
/// Each command should implmement the RunCommand trait and specify the list
/// of required args for that command.
#[derive(Subcommand, Debug)]
#[enum_dispatch(RunCommand)]
pub enum Commands {
    /// List supported countries and their population
    Countries(CountriesCommand),
    /// Summary metrics for every country
    Summary(SummaryCommand),
    /// Overview map values for one metric
    Map(MapCommand),
    /// Infection or recovery series for selected countries
    Cases(CasesCommand),
    /// Vaccination series for selected countries
    Vaccinations(VaccinationsCommand),
    /// Where the data comes from
    Sources(SourcesCommand),
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use tempfile::TempDir;

    use super::*;

    const CONFIRMED: &str = "\
Province/State,Country/Region,Lat,Long,1/1/21,1/2/21,1/3/21,1/4/21
,Austria,47.5,14.5,0,100,200,300
";

    const VACCINATIONS: &str = "\
Country_Region,Date,People_partially_vaccinated,People_fully_vaccinated
Austria,2021-01-04,600000,450000
";

    const POPULATION: &str = "\
Location,Variant,Time,PopMale,PopFemale,PopTotal
Austria,Medium,2020,500.0,500.0,1000.0
";

    fn local_config(dir: &TempDir) -> Config {
        let write = |name: &str, contents: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, contents).unwrap();
            path.to_string_lossy().to_string()
        };
        let mut config = Config {
            countries: vec!["Austria".into()],
            cache_dir: Some(dir.path().join("cache")),
            ..Config::default()
        };
        config.infections.data_url = write("confirmed.csv", CONFIRMED);
        config.recoveries.data_url = write("recovered.csv", CONFIRMED);
        config.vaccinations.data_url = write("vaccinations.csv", VACCINATIONS);
        config.population.data_url = write("population.csv", POPULATION);
        config
    }

    #[tokio::test]
    async fn cases_command_writes_csv() {
        let dir = TempDir::new().unwrap();
        let output_file = dir.path().join("cases.csv");
        let command = Cli::parse_from([
            "covidash",
            "-q",
            "cases",
            "--mode",
            "daily",
            "-c",
            "Austria",
            "-o",
            output_file.to_str().unwrap(),
        ]);
        command
            .command
            .unwrap()
            .run(local_config(&dir))
            .await
            .unwrap();
        let written = std::fs::read_to_string(&output_file).unwrap();
        assert_eq!(
            written,
            "Date,Austria\n01/01/21,0.0\n02/01/21,100.0\n03/01/21,100.0\n04/01/21,100.0\n"
        );
    }

    #[tokio::test]
    async fn map_command_writes_choropleth_json() {
        let dir = TempDir::new().unwrap();
        let output_file = dir.path().join("map.json");
        let command = MapCommand {
            mode: MapMode::FullyVaccinated,
            output_format: None,
            output_file: Some(output_file.to_string_lossy().to_string()),
            quiet: true,
        };
        command.run(local_config(&dir)).await.unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output_file).unwrap()).unwrap();
        assert_eq!(written["locations"], serde_json::json!(["Austria"]));
        assert_eq!(written["z"], serde_json::json!([45.0]));
        assert_eq!(written["feature_id_key"], "properties.name_long");
    }

    #[tokio::test]
    async fn map_command_writes_metric_table() {
        let dir = TempDir::new().unwrap();
        let output_file = dir.path().join("map.csv");
        let command = Cli::parse_from([
            "covidash",
            "-q",
            "map",
            "-m",
            "fully_vaccinated",
            "-f",
            "csv",
            "-o",
            output_file.to_str().unwrap(),
        ]);
        command
            .command
            .unwrap()
            .run(local_config(&dir))
            .await
            .unwrap();
        let written = std::fs::read_to_string(&output_file).unwrap();
        assert_eq!(written, "Country,full_vaccination_percentage\nAustria,45.0\n");
    }

    #[test]
    fn unknown_modes_are_rejected_by_the_parser() {
        let result = Cli::try_parse_from(["covidash", "map", "--mode", "weekly"]);
        assert!(result.is_err());
        let result = Cli::try_parse_from(["covidash", "cases", "--mode", "3_day_average"]);
        assert!(result.is_err(), "at least one country is required");
        let result = Cli::try_parse_from([
            "covidash",
            "vaccinations",
            "--mode",
            "partial_percentage",
            "-c",
            "Austria",
        ]);
        assert!(result.is_ok());
    }

    #[test]
    fn output_type_should_deserialize_properly() {
        let output_format = OutputFormat::from_str("csv");
        assert_eq!(
            output_format.unwrap(),
            OutputFormat::Csv,
            "csv format should be parsed correctly"
        );
        let output_format = OutputFormat::from_str("JSON");
        assert_eq!(
            output_format.unwrap(),
            OutputFormat::Json,
            "parsing should be case insensitive"
        );
        let output_format = OutputFormat::from_str("geojson");
        assert!(output_format.is_err(), "non listed formats should fail");
    }

    #[test]
    fn cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
