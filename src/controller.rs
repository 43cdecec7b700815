// Pagination controller: drives page fetches in order, deduplicates by job
// id, fans out optional detail fetches, and turns terminal failures into
// partial results instead of losing collected work.
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::model::{
    ConfigError, JobPost, JobResponse, NetworkError, ScrapeFailure, ScrapeWarning, ScraperInput,
};
use crate::normalizer;
use crate::parser::job_page::{self, JobDetails};
use crate::parser::search_page::{self, PageContext, ParsedPage, SearchPageParser};
use crate::scraper::{PageFetcher, RateLimitedClient, RateLimiter};

pub const BASE_URL: &str = "https://www.linkedin.com";
const SEARCH_PATH: &str = "/jobs-guest/jobs/api/seeMoreJobPostings/search";

// The site stops serving guest results past this offset.
const MAX_OFFSET: usize = 1000;
const DETAIL_WORKERS: usize = 4;

/// Cooperative stop signal, checked between pages and between per-job
/// detail fetches. Stopping returns whatever was accumulated.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Why pagination ended.
#[derive(Debug)]
enum StopReason {
    EnoughResults,
    NoMorePages,
    Stalled,
    OffsetExhausted,
    Cancelled,
    Failed(NetworkError),
}

pub struct JobScraper<F: PageFetcher> {
    fetcher: Arc<F>,
    parser: SearchPageParser,
    base_url: String,
    detail_workers: usize,
}

impl JobScraper<RateLimitedClient> {
    pub fn new(input: &ScraperInput) -> Result<Self, ConfigError> {
        // 3-7s between calls, the spacing the site tolerates for guests.
        let limiter = RateLimiter::new(Duration::from_secs(3), Duration::from_secs(4));
        let client = RateLimitedClient::new(&input.proxies, limiter)?;
        Ok(Self::with_fetcher(Arc::new(client), BASE_URL))
    }
}

impl<F: PageFetcher> JobScraper<F> {
    pub fn with_fetcher(fetcher: Arc<F>, base_url: &str) -> Self {
        Self {
            fetcher,
            parser: SearchPageParser::new(base_url),
            base_url: base_url.trim_end_matches('/').to_string(),
            detail_workers: DETAIL_WORKERS,
        }
    }

    /// Runs one scrape to completion. Only an invalid input fails the call;
    /// network trouble mid-run degrades to a partial `JobResponse` with the
    /// failure recorded.
    pub async fn scrape(
        &self,
        input: &ScraperInput,
        stop: &StopToken,
    ) -> Result<JobResponse, ConfigError> {
        input.validate()?;

        let ctx = PageContext {
            country: input.country.clone(),
            today: Utc::now().date_naive(),
            remote_hint: input.is_remote,
        };
        let search_url = format!("{}{SEARCH_PATH}", self.base_url);

        let mut response = JobResponse::default();
        let mut seen_ids: HashSet<String> = HashSet::new();
        // The site pages in blocks of ten; an explicit offset snaps down.
        let mut start = input.offset.unwrap_or(0) / 10 * 10;
        let mut page_n = 0usize;

        let reason = loop {
            if stop.is_stopped() {
                break StopReason::Cancelled;
            }
            if response.jobs.len() >= input.results_wanted {
                break StopReason::EnoughResults;
            }
            if start >= MAX_OFFSET {
                break StopReason::OffsetExhausted;
            }

            page_n += 1;
            info!(page = page_n, offset = start, "fetching search page");
            let params = build_params(input, start);
            let body = match self.fetcher.fetch_page(&search_url, &params).await {
                Ok(body) => body,
                Err(err) => break StopReason::Failed(err),
            };

            let page = self.parser.parse(&body, &ctx);
            let more_pages = page.has_more(start + page.cards_seen);
            let ParsedPage { jobs, cards_seen, total_results, skipped } = page;

            for skip in skipped {
                warn!(page = page_n, "{skip}");
                response.warnings.push(ScrapeWarning::EntrySkipped {
                    page: page_n,
                    reason: skip,
                });
            }
            if total_results.is_some() {
                response.total_results = total_results;
            }
            if cards_seen == 0 {
                break StopReason::NoMorePages;
            }

            let mut new_jobs: Vec<JobPost> = jobs
                .into_iter()
                .filter(|job| seen_ids.insert(job.id.clone()))
                .collect();
            let stalled = new_jobs.is_empty();
            new_jobs.truncate(input.results_wanted - response.jobs.len());

            if input.fetch_description {
                new_jobs = self
                    .fetch_descriptions(new_jobs, input, stop, &mut response.warnings)
                    .await;
            }
            debug!(page = page_n, kept = new_jobs.len(), "page parsed");
            response.jobs.extend(new_jobs);

            if stalled {
                break StopReason::Stalled;
            }
            if !more_pages {
                break StopReason::NoMorePages;
            }
            start += cards_seen;
        };

        if let StopReason::Failed(err) = &reason {
            warn!(page = page_n, "scrape ended early: {err}");
            response.failure = Some(ScrapeFailure::Network {
                page: page_n,
                reason: err.to_string(),
            });
        }
        debug!(?reason, jobs = response.jobs.len(), "scrape finished");

        response.jobs.truncate(input.results_wanted);
        Ok(response)
    }

    /// Bounded fan-out over the detail pages of freshly discovered jobs.
    /// A failed detail fetch leaves its job untouched and records a warning;
    /// `buffered` keeps discovery order stable.
    async fn fetch_descriptions(
        &self,
        jobs: Vec<JobPost>,
        input: &ScraperInput,
        stop: &StopToken,
        warnings: &mut Vec<ScrapeWarning>,
    ) -> Vec<JobPost> {
        let outcomes: Vec<(Option<JobPost>, Option<ScrapeWarning>)> =
            futures::stream::iter(jobs.into_iter().map(|job| async move {
                if stop.is_stopped() {
                    return (Some(job), None);
                }
                let fetched = self.fetcher.fetch_page(&job.job_url, &[]).await;
                match fetched {
                    Ok(body) => {
                        let details = job_page::parse_job_page(&body, input.description_format);
                        if input.easy_apply == Some(false) && details.is_easy_apply {
                            debug!(id = %job.id, "dropping easy-apply job");
                            return (None, None);
                        }
                        (Some(apply_details(job, details)), None)
                    }
                    Err(err) => {
                        let warning = ScrapeWarning::DescriptionFetchFailed {
                            job_id: job.id.clone(),
                            reason: err.to_string(),
                        };
                        (Some(job), Some(warning))
                    }
                }
            }))
            .buffered(self.detail_workers)
            .collect()
            .await;

        let mut kept = Vec::with_capacity(outcomes.len());
        for (job, warning) in outcomes {
            if let Some(warning) = warning {
                warn!("{warning:?}");
                warnings.push(warning);
            }
            kept.extend(job);
        }
        kept
    }
}

/// Fills the detail-page fields on a search-card job. The card's own values
/// win only where the detail page had nothing.
fn apply_details(mut job: JobPost, details: JobDetails) -> JobPost {
    if let Some(description) = &details.description {
        job.emails = normalizer::extract_emails(description);
        job.is_remote = job.is_remote || search_page::text_mentions_remote(description);
    }
    job.description = details.description;
    job.job_level = details.job_level;
    job.job_type = details.job_type.or(job.job_type);
    job.job_function = details.job_function;
    job.company_industry = details.company_industry;
    job.company_logo = details.company_logo;
    job.job_url_direct = details.job_url_direct;
    job
}

/// Translates the input filters into the site's query parameters.
fn build_params(input: &ScraperInput, start: usize) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = vec![
        ("keywords".into(), input.search_term.clone()),
        ("pageNum".into(), "0".into()),
        ("start".into(), start.to_string()),
    ];
    if let Some(location) = &input.location {
        params.push(("location".into(), location.clone()));
    }
    if let Some(distance) = input.distance {
        params.push(("distance".into(), distance.to_string()));
    }
    if input.is_remote {
        params.push(("f_WT".into(), "2".into()));
    }
    if let Some(job_type) = input.job_type {
        params.push(("f_JT".into(), job_type.filter_code().into()));
    }
    if let Some(easy_apply) = input.easy_apply {
        params.push(("f_AL".into(), easy_apply.to_string()));
    }
    if let Some(ids) = &input.company_ids {
        let joined = ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",");
        params.push(("f_C".into(), joined));
    }
    if let Some(level) = input.experience_level {
        params.push(("f_E".into(), level.to_string()));
    }
    if let Some(hours) = input.hours_old {
        params.push(("f_TPR".into(), format!("r{}", u64::from(hours) * 3600)));
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use crate::model::DescriptionFormat;

    /// Scripted fetcher: search pages pop off a queue in order, detail pages
    /// resolve by URL. Every search call is counted.
    struct ScriptedFetcher {
        search_pages: Mutex<VecDeque<Result<String, NetworkError>>>,
        detail_pages: Mutex<HashMap<String, Result<String, NetworkError>>>,
        search_calls: AtomicUsize,
        last_params: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedFetcher {
        fn new(pages: Vec<Result<String, NetworkError>>) -> Self {
            Self {
                search_pages: Mutex::new(pages.into()),
                detail_pages: Mutex::new(HashMap::new()),
                search_calls: AtomicUsize::new(0),
                last_params: Mutex::new(Vec::new()),
            }
        }

        fn with_detail(self, url: &str, result: Result<String, NetworkError>) -> Self {
            self.detail_pages.lock().unwrap().insert(url.into(), result);
            self
        }

        fn search_calls(&self) -> usize {
            self.search_calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait::async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch_page(
            &self,
            url: &str,
            params: &[(String, String)],
        ) -> Result<String, NetworkError> {
            if url.contains("/jobs/view/") {
                return self
                    .detail_pages
                    .lock()
                    .unwrap()
                    .remove(url)
                    .unwrap_or(Ok(String::new()));
            }
            self.search_calls.fetch_add(1, Ordering::Relaxed);
            *self.last_params.lock().unwrap() = params.to_vec();
            self.search_pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(String::new()))
        }
    }

    fn card(id: u64) -> String {
        format!(
            r#"<div class="base-search-card">
                 <a class="base-card__full-link" href="https://example.org/jobs/view/role-{id}">
                   <span class="sr-only">Engineer {id}</span>
                 </a>
                 <h4 class="base-search-card__subtitle"><a href="https://example.org/company/c{id}">Company {id}</a></h4>
                 <div class="base-search-card__metadata">
                   <span class="job-search-card__location">Austin, TX</span>
                 </div>
               </div>"#
        )
    }

    fn page_of(ids: std::ops::Range<u64>) -> Result<String, NetworkError> {
        Ok(ids.map(card).collect())
    }

    fn input(results_wanted: usize) -> ScraperInput {
        ScraperInput {
            search_term: "engineer".into(),
            location: Some("Austin".into()),
            country: None,
            distance: None,
            job_type: None,
            is_remote: false,
            easy_apply: None,
            experience_level: None,
            company_ids: None,
            results_wanted,
            hours_old: None,
            offset: None,
            fetch_description: false,
            description_format: DescriptionFormat::default(),
            proxies: vec![],
        }
    }

    fn scraper(fetcher: ScriptedFetcher) -> (JobScraper<ScriptedFetcher>, Arc<ScriptedFetcher>) {
        let fetcher = Arc::new(fetcher);
        (
            JobScraper::with_fetcher(fetcher.clone(), "https://example.org"),
            fetcher,
        )
    }

    #[tokio::test]
    async fn fills_results_wanted_across_pages() {
        // 25 wanted at 10 per page: three fetches, third page truncated.
        let (scraper, fetcher) = scraper(ScriptedFetcher::new(vec![
            page_of(0..10),
            page_of(10..20),
            page_of(20..30),
        ]));
        let response = scraper.scrape(&input(25), &StopToken::new()).await.unwrap();

        assert_eq!(fetcher.search_calls(), 3);
        assert_eq!(response.jobs.len(), 25);
        assert!(response.failure.is_none());
        // discovery order preserved
        assert_eq!(response.jobs[0].id, "li-0");
        assert_eq!(response.jobs[24].id, "li-24");
    }

    #[tokio::test]
    async fn duplicate_ids_collapse_to_one_entry() {
        let (scraper, _) = scraper(ScriptedFetcher::new(vec![
            page_of(0..10),
            page_of(5..15),
            Ok(String::new()),
        ]));
        let response = scraper.scrape(&input(50), &StopToken::new()).await.unwrap();

        assert_eq!(response.jobs.len(), 15);
        let mut ids: Vec<_> = response.jobs.iter().map(|j| j.id.clone()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 15);
    }

    #[tokio::test]
    async fn stall_guard_terminates_on_repeated_page() {
        let (scraper, fetcher) = scraper(ScriptedFetcher::new(vec![
            page_of(0..10),
            page_of(0..10),
            page_of(0..10),
        ]));
        let response = scraper.scrape(&input(50), &StopToken::new()).await.unwrap();

        // one productive page plus the page that tripped the stall guard
        assert_eq!(fetcher.search_calls(), 2);
        assert_eq!(response.jobs.len(), 10);
    }

    #[tokio::test]
    async fn terminal_failure_keeps_prior_pages() {
        let (scraper, _) = scraper(ScriptedFetcher::new(vec![
            page_of(0..10),
            Err(NetworkError::Blocked("status 429".into())),
        ]));
        let response = scraper.scrape(&input(50), &StopToken::new()).await.unwrap();

        assert_eq!(response.jobs.len(), 10);
        assert!(matches!(
            response.failure,
            Some(ScrapeFailure::Network { page: 2, .. })
        ));
    }

    #[tokio::test]
    async fn empty_first_page_ends_clean() {
        let (scraper, fetcher) = scraper(ScriptedFetcher::new(vec![Ok(String::new())]));
        let response = scraper.scrape(&input(10), &StopToken::new()).await.unwrap();

        assert_eq!(fetcher.search_calls(), 1);
        assert!(response.jobs.is_empty());
        assert!(response.failure.is_none());
    }

    #[tokio::test]
    async fn offset_ceiling_stops_before_any_fetch() {
        let (scraper, fetcher) = scraper(ScriptedFetcher::new(vec![page_of(0..10)]));
        let mut input = input(10);
        input.offset = Some(1000);
        let response = scraper.scrape(&input, &StopToken::new()).await.unwrap();

        assert_eq!(fetcher.search_calls(), 0);
        assert!(response.jobs.is_empty());
        assert!(response.failure.is_none());
    }

    #[tokio::test]
    async fn short_page_ends_pagination() {
        let (scraper, fetcher) = scraper(ScriptedFetcher::new(vec![
            page_of(0..3),
            page_of(3..6),
        ]));
        let response = scraper.scrape(&input(50), &StopToken::new()).await.unwrap();

        assert_eq!(fetcher.search_calls(), 1);
        assert_eq!(response.jobs.len(), 3);
        assert!(response.failure.is_none());
    }

    #[tokio::test]
    async fn reported_total_keeps_paging_past_short_page() {
        let header = r#"<span class="results-context-header__job-count">30</span>"#;
        let first: String = (0..3).map(card).collect();
        let (scraper, fetcher) = scraper(ScriptedFetcher::new(vec![
            Ok(format!("{header}{first}")),
            Ok(String::new()),
        ]));
        let response = scraper.scrape(&input(50), &StopToken::new()).await.unwrap();

        assert_eq!(fetcher.search_calls(), 2);
        assert_eq!(response.jobs.len(), 3);
        assert_eq!(response.total_results, Some(30));
    }

    #[tokio::test]
    async fn invalid_input_fails_before_any_fetch() {
        let (scraper, fetcher) = scraper(ScriptedFetcher::new(vec![page_of(0..10)]));
        let result = scraper.scrape(&input(0), &StopToken::new()).await;

        assert!(matches!(result, Err(ConfigError::InvalidResultsWanted)));
        assert_eq!(fetcher.search_calls(), 0);
    }

    #[tokio::test]
    async fn stop_token_returns_accumulated_work() {
        let stop = StopToken::new();
        stop.stop();
        let (scraper, fetcher) = scraper(ScriptedFetcher::new(vec![page_of(0..10)]));
        let response = scraper.scrape(&input(10), &stop).await.unwrap();

        assert_eq!(fetcher.search_calls(), 0);
        assert!(response.jobs.is_empty());
        assert!(response.failure.is_none());
    }

    #[tokio::test]
    async fn filters_become_query_parameters() {
        let (scraper, fetcher) = scraper(ScriptedFetcher::new(vec![Ok(String::new())]));
        let mut input = input(10);
        input.is_remote = true;
        input.job_type = Some(crate::model::JobType::FullTime);
        input.hours_old = Some(24);
        input.company_ids = Some(vec![11, 22]);
        scraper.scrape(&input, &StopToken::new()).await.unwrap();

        let params = fetcher.last_params.lock().unwrap().clone();
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };
        assert_eq!(get("keywords").as_deref(), Some("engineer"));
        assert_eq!(get("f_WT").as_deref(), Some("2"));
        assert_eq!(get("f_JT").as_deref(), Some("F"));
        assert_eq!(get("f_TPR").as_deref(), Some("r86400"));
        assert_eq!(get("f_C").as_deref(), Some("11,22"));
        assert_eq!(get("start").as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn explicit_offset_snaps_to_block_boundary() {
        let (scraper, fetcher) = scraper(ScriptedFetcher::new(vec![Ok(String::new())]));
        let mut input = input(10);
        input.offset = Some(37);
        scraper.scrape(&input, &StopToken::new()).await.unwrap();

        let params = fetcher.last_params.lock().unwrap().clone();
        let start = params.iter().find(|(k, _)| k == "start").unwrap().1.clone();
        assert_eq!(start, "30");
    }

    #[tokio::test]
    async fn description_fetch_fills_job_and_extracts_emails() {
        let detail = r#"<html><body>
            <div class="show-more-less-html__markup">
              Fully remote role. Reach us at Hiring@Acme.example.
            </div>
            <li class="description__job-criteria-item">
              <h3 class="description__job-criteria-subheader">Seniority level</h3>
              <span class="description__job-criteria-text">Senior</span>
            </li>
          </body></html>"#;
        let fetcher = ScriptedFetcher::new(vec![page_of(0..1)])
            .with_detail("https://example.org/jobs/view/0", Ok(detail.into()));
        let (scraper, _) = scraper(fetcher);
        let mut input = input(1);
        input.fetch_description = true;
        input.description_format = DescriptionFormat::Plain;
        let response = scraper.scrape(&input, &StopToken::new()).await.unwrap();

        let job = &response.jobs[0];
        assert!(job.description.as_deref().unwrap().contains("Fully remote role"));
        assert_eq!(job.job_level.as_deref(), Some("Senior"));
        assert!(job.emails.contains("hiring@acme.example"));
        assert!(job.is_remote);
        assert!(response.warnings.is_empty());
    }

    #[tokio::test]
    async fn description_failure_keeps_job_and_warns() {
        let fetcher = ScriptedFetcher::new(vec![page_of(0..2), Ok(String::new())])
            .with_detail(
                "https://example.org/jobs/view/0",
                Err(NetworkError::Timeout),
            )
            .with_detail(
                "https://example.org/jobs/view/1",
                Ok(r#"<div class="show-more-less-html__markup">Fine</div>"#.into()),
            );
        let (scraper, _) = scraper(fetcher);
        let mut input = input(10);
        input.fetch_description = true;
        let response = scraper.scrape(&input, &StopToken::new()).await.unwrap();

        assert_eq!(response.jobs.len(), 2);
        assert!(response.jobs[0].description.is_none());
        assert!(response.jobs[1].description.is_some());
        assert!(matches!(
            response.warnings.as_slice(),
            [ScrapeWarning::DescriptionFetchFailed { .. }]
        ));
        assert!(response.failure.is_none());
    }

    #[tokio::test]
    async fn easy_apply_jobs_dropped_when_excluded() {
        let easy = r#"<html><body><button>Easy Apply</button>
            <div class="show-more-less-html__markup">Text</div></body></html>"#;
        let fetcher = ScriptedFetcher::new(vec![page_of(0..1)])
            .with_detail("https://example.org/jobs/view/0", Ok(easy.into()));
        let (scraper, _) = scraper(fetcher);
        let mut input = input(10);
        input.fetch_description = true;
        input.easy_apply = Some(false);
        let response = scraper.scrape(&input, &StopToken::new()).await.unwrap();

        assert!(response.jobs.is_empty());
    }
}
