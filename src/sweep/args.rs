//! Command-line arguments passed to the benchmark client.

use crate::config::SweepConfig;

use super::rate::RatePoint;

/// Flags shared by every run of a sweep, built once from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct BaseArgs {
    args: Vec<String>,
}

impl BaseArgs {
    pub fn from_config(config: &SweepConfig) -> Self {
        let mut args = vec![
            flag("host", &config.ip),
            flag("port", config.port),
            flag("dataset", &config.dataset),
            flag("tokenizer", &config.tokenizer),
            flag("backend", &config.backend),
            flag("max-input-length", config.max_input_length),
            flag("max-output-length", config.max_output_length),
            flag("file-prefix", &config.file_prefix),
            flag("models", config.models.join(",")),
            flag("pm-namespace", &config.pm_namespace),
            flag("pm-job", &config.pm_job),
        ];

        // Optional values are left out entirely when unset
        if let Some(split) = config.traffic_split_arg() {
            args.push(flag("traffic-split", split));
        }
        if let Some(bucket) = &config.output_bucket {
            args.push(flag("output-bucket", bucket));
            if let Some(path) = &config.output_bucket_filepath {
                args.push(flag("output-bucket-filepath", path));
            }
        }

        let toggles = [
            ("save-json-results", config.save_json_results),
            ("scrape-server-metrics", config.scrape_server_metrics),
            ("save-aggregated-result", config.save_aggregated_result),
            ("stream-request", config.stream_request),
        ];
        for (name, enabled) in toggles {
            if enabled {
                args.push(format!("--{}", name));
            }
        }

        Self { args }
    }

    /// Full argument list for one rate point
    pub fn for_rate(&self, rate: RatePoint, prompt_count: u64) -> Vec<String> {
        let mut args = self.args.clone();
        args.push(flag("request-rate", rate));
        args.push(flag("num-prompts", prompt_count));
        args
    }

    pub fn as_slice(&self) -> &[String] {
        &self.args
    }
}

fn flag(name: &str, value: impl std::fmt::Display) -> String {
    format!("--{}={}", name, value)
}
