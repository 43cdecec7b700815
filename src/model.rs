// Core structs: ScraperInput, JobPost, JobResponse
use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SITE_ID_PREFIX: &str = "li";

/// Job categories the site exposes as a search filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    FullTime,
    PartTime,
    Contract,
    Temporary,
    Internship,
    Volunteer,
    PerDiem,
}

impl JobType {
    /// Single-letter code the site expects in the `f_JT` query parameter.
    pub fn filter_code(&self) -> &'static str {
        match self {
            JobType::FullTime => "F",
            JobType::PartTime => "P",
            JobType::Contract => "C",
            JobType::Temporary => "T",
            JobType::Internship => "I",
            JobType::Volunteer => "V",
            JobType::PerDiem => "P",
        }
    }

    /// Matches the employment-type label printed on a job detail page,
    /// lowercased with spaces and hyphens removed ("Full-time" -> "fulltime").
    pub fn from_page_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalized.as_str() {
            "fulltime" => Some(JobType::FullTime),
            "parttime" => Some(JobType::PartTime),
            "contract" => Some(JobType::Contract),
            "temporary" => Some(JobType::Temporary),
            "internship" => Some(JobType::Internship),
            "volunteer" => Some(JobType::Volunteer),
            "perdiem" => Some(JobType::PerDiem),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayInterval {
    Yearly,
    Monthly,
    Weekly,
    Daily,
    Hourly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionFormat {
    #[default]
    Html,
    Plain,
}

/// Immutable search request. Built by the config layer, read-only here.
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperInput {
    pub search_term: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub distance: Option<u32>,
    #[serde(default)]
    pub job_type: Option<JobType>,
    #[serde(default)]
    pub is_remote: bool,
    #[serde(default)]
    pub easy_apply: Option<bool>,
    #[serde(default)]
    pub experience_level: Option<u8>,
    #[serde(default)]
    pub company_ids: Option<Vec<u64>>,
    pub results_wanted: usize,
    #[serde(default)]
    pub hours_old: Option<u32>,
    #[serde(default)]
    pub offset: Option<usize>,
    #[serde(default)]
    pub fetch_description: bool,
    #[serde(default)]
    pub description_format: DescriptionFormat,
    #[serde(default)]
    pub proxies: Vec<String>,
}

impl ScraperInput {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search_term.trim().is_empty() {
            return Err(ConfigError::EmptySearchTerm);
        }
        if self.results_wanted == 0 {
            return Err(ConfigError::InvalidResultsWanted);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Location {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

impl Location {
    /// Display string rebuilt from the available parts in
    /// city -> state -> country order, empty parts omitted.
    pub fn display(&self) -> String {
        [&self.city, &self.state, &self.country]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn is_empty(&self) -> bool {
        self.city.is_none() && self.state.is_none() && self.country.is_none()
    }
}

/// Stated compensation only; absent when the listing names no figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Compensation {
    pub min_amount: f64,
    pub max_amount: f64,
    pub currency: String,
    pub interval: Option<PayInterval>,
}

/// Company block. Only `name` and `url` are filled from the search card;
/// the rest exists for sources that publish richer employer data.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompanyInfo {
    pub name: Option<String>,
    pub url: Option<String>,
    pub url_direct: Option<String>,
    pub employee_count_range: Option<String>,
    pub revenue: Option<String>,
    pub description: Option<String>,
    pub rating: Option<f32>,
    pub review_count: Option<u32>,
}

/// One normalized listing. Everything past the id is best-effort:
/// a field the markup does not carry stays `None`, never a placeholder.
#[derive(Debug, Clone, Serialize)]
pub struct JobPost {
    pub id: String,
    pub title: String,
    pub job_url: String,
    pub job_url_direct: Option<String>,
    pub description: Option<String>,
    pub date_posted: Option<NaiveDate>,
    pub is_remote: bool,
    pub company: CompanyInfo,
    pub location: Location,
    pub job_type: Option<JobType>,
    pub job_level: Option<String>,
    pub job_function: Option<String>,
    pub company_industry: Option<String>,
    pub company_logo: Option<String>,
    pub compensation: Option<Compensation>,
    pub emails: BTreeSet<String>,
    pub listing_type: Option<String>,
    pub experience_range: Option<String>,
    pub vacancy_count: Option<u32>,
    pub skills: Option<Vec<String>>,
    pub work_from_home_type: Option<String>,
    pub banner_photo_url: Option<String>,
}

/// Non-fatal problems recorded while a scrape runs.
#[derive(Debug, Clone, Serialize)]
pub enum ScrapeWarning {
    EntrySkipped { page: usize, reason: String },
    DescriptionFetchFailed { job_id: String, reason: String },
}

/// Why a scrape stopped before exhausting the site.
#[derive(Debug, Clone, Serialize)]
pub enum ScrapeFailure {
    Network { page: usize, reason: String },
}

#[derive(Debug, Default, Serialize)]
pub struct JobResponse {
    pub jobs: Vec<JobPost>,
    pub total_results: Option<usize>,
    pub warnings: Vec<ScrapeWarning>,
    pub failure: Option<ScrapeFailure>,
}

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("request timed out")]
    Timeout,
    #[error("blocked by the site ({0})")]
    Blocked(String),
    #[error("server error: {0}")]
    ServerError(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("search_term must not be empty")]
    EmptySearchTerm,
    #[error("results_wanted must be greater than zero")]
    InvalidResultsWanted,
    #[error("invalid proxy endpoint {0}: {1}")]
    InvalidProxy(String, String),
    #[error("cannot build HTTP client: {0}")]
    ClientBuild(String),
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}
