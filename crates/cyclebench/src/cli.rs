use clap::Parser;
use std::path::PathBuf;

use libcyclebench_core::config::parse_cycles;
use libcyclebench_core::ConfigOverrides;

#[derive(Parser)]
#[command(name = "cyclebench", about = "Cycle-based load generator", version)]
pub struct Cli {
    /// Suite configuration file (TOML)
    pub config: PathBuf,

    /// Workload to bench, as <Class>.<method> (e.g. Http.get)
    pub workload: String,

    /// Base URL under test, overrides [main] url
    #[arg(short = 'u', long)]
    pub url: Option<String>,

    /// Concurrency of each cycle, colon separated (e.g. 10:20:40)
    #[arg(short = 'c', long, value_parser = cycles_arg)]
    pub cycles: Option<::std::vec::Vec<usize>>,

    /// Recording window of each cycle, in seconds
    #[arg(short = 'D', long)]
    pub duration: Option<f64>,

    /// Minimum think time inside a workload, in seconds
    #[arg(short = 'm', long)]
    pub sleep_time_min: Option<f64>,

    /// Maximum think time inside a workload, in seconds
    #[arg(short = 'M', long)]
    pub sleep_time_max: Option<f64>,

    /// Delay between two virtual-user spawns, in seconds
    #[arg(short = 's', long)]
    pub startup_delay: Option<f64>,

    /// Run log path, overrides [main] log_xml
    #[arg(long)]
    pub log_xml: Option<PathBuf>,

    /// Write the final report as JSON to this file
    #[arg(long)]
    pub json_report: Option<PathBuf>,

    /// Disable colours in the summary
    #[arg(long)]
    pub no_color: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Values that take precedence over the suite file
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            url: self.url.clone(),
            cycles: self.cycles.clone(),
            duration: self.duration,
            sleep_time_min: self.sleep_time_min,
            sleep_time_max: self.sleep_time_max,
            startup_delay: self.startup_delay,
            log_xml: self.log_xml.clone(),
        }
    }
}

fn cycles_arg(s: &str) -> Result<Vec<usize>, String> {
    parse_cycles(s).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::try_parse_from([
            "cyclebench",
            "simple.toml",
            "Http.get",
            "-u",
            "http://localhost:8080",
            "-c",
            "10:20",
            "-D",
            "30",
            "-m",
            "0.1",
            "-M",
            "0.5",
            "-s",
            "0.2",
            "--no-color",
        ])
        .unwrap();

        assert_eq!(cli.workload, "Http.get");
        assert_eq!(cli.cycles, Some(vec![10, 20]));
        assert!(cli.no_color);

        let overrides = cli.overrides();
        assert_eq!(overrides.url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(overrides.duration, Some(30.0));
        assert_eq!(overrides.sleep_time_max, Some(0.5));
        assert_eq!(overrides.startup_delay, Some(0.2));
    }

    #[test]
    fn test_rejects_bad_cycles() {
        assert!(Cli::try_parse_from(["cyclebench", "s.toml", "Noop.pass", "-c", "1:x"]).is_err());
    }
}
