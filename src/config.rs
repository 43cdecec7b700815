use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::model::{ConfigError, DescriptionFormat, JobType, ScraperInput};

#[derive(Debug, Deserialize)]
pub struct SearchConfig {
    pub search_term: String,
    pub location: Option<String>,
    pub country: Option<String>,
    pub distance: Option<u32>,
    pub job_type: Option<JobType>,
    #[serde(default)]
    pub is_remote: bool,
    pub easy_apply: Option<bool>,
    pub experience_level: Option<u8>,
    pub company_ids: Option<Vec<u64>>,
    pub results_wanted: usize,
    pub hours_old: Option<u32>,
    pub offset: Option<usize>,
    #[serde(default)]
    pub fetch_description: bool,
    #[serde(default)]
    pub description_format: DescriptionFormat,
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub searches: Vec<SearchConfig>,
    #[serde(default)]
    pub proxies: Vec<String>,
    pub output_file: Option<String>,
}

impl AppConfig {
    /// Each configured search becomes one validated `ScraperInput`.
    pub fn scraper_inputs(&self) -> Result<Vec<ScraperInput>, ConfigError> {
        self.searches
            .iter()
            .map(|search| {
                let input = ScraperInput {
                    search_term: search.search_term.clone(),
                    location: search.location.clone(),
                    country: search.country.clone(),
                    distance: search.distance,
                    job_type: search.job_type,
                    is_remote: search.is_remote,
                    easy_apply: search.easy_apply,
                    experience_level: search.experience_level,
                    company_ids: search.company_ids.clone(),
                    results_wanted: search.results_wanted,
                    hours_old: search.hours_old,
                    offset: search.offset,
                    fetch_description: search.fetch_description,
                    description_format: search.description_format,
                    proxies: self.proxies.clone(),
                };
                input.validate()?;
                Ok(input)
            })
            .collect()
    }
}

pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}
