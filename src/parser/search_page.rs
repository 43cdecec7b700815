// Search-results page parsing. One listing card -> one JobPost, best-effort:
// a card missing its identifier is skipped, any other missing field is absent.
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};

use crate::model::{CompanyInfo, JobPost, SITE_ID_PREFIX};
use crate::normalizer;

const REMOTE_KEYWORDS: &[&str] = &["remote", "work from home", "telecommute"];

/// Listings the site serves per results block.
pub const PAGE_SIZE: usize = 10;

/// Per-scrape context the parser needs to resolve card fields.
#[derive(Debug, Clone)]
pub struct PageContext {
    /// Country the search was scoped to, used when the card text has none.
    pub country: Option<String>,
    /// Reference date for relative "N days ago" labels.
    pub today: NaiveDate,
    /// Caller asked for remote work; marks every result remote.
    pub remote_hint: bool,
}

#[derive(Debug, Default)]
pub struct ParsedPage {
    pub jobs: Vec<JobPost>,
    /// Cards present in the markup, including skipped ones. Drives the
    /// pagination cursor, which advances by cards seen rather than jobs kept.
    pub cards_seen: usize,
    /// Total match count when the page header reports one.
    pub total_results: Option<usize>,
    /// Reasons for per-card skips, surfaced as warnings by the controller.
    pub skipped: Vec<String>,
}

impl ParsedPage {
    /// More results likely remain: either the page came back full, or the
    /// header total says `next_offset` has not walked the whole result set.
    /// A short page with no reported total is the last one.
    pub fn has_more(&self, next_offset: usize) -> bool {
        self.cards_seen >= PAGE_SIZE
            || self.total_results.is_some_and(|total| total > next_offset)
    }
}

pub struct SearchPageParser {
    base_url: String,
    card: Selector,
    link: Selector,
    title: Selector,
    company: Selector,
    company_link: Selector,
    metadata: Selector,
    location: Selector,
    time: Selector,
    salary: Selector,
    total: Selector,
}

impl SearchPageParser {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            card: Selector::parse("div.base-search-card").unwrap(),
            link: Selector::parse("a.base-card__full-link").unwrap(),
            title: Selector::parse("span.sr-only").unwrap(),
            company: Selector::parse("h4.base-search-card__subtitle").unwrap(),
            company_link: Selector::parse("a").unwrap(),
            metadata: Selector::parse("div.base-search-card__metadata").unwrap(),
            location: Selector::parse("span.job-search-card__location").unwrap(),
            time: Selector::parse("time").unwrap(),
            salary: Selector::parse("span.job-search-card__salary-info").unwrap(),
            total: Selector::parse("span.results-context-header__job-count").unwrap(),
        }
    }

    pub fn parse(&self, html: &str, ctx: &PageContext) -> ParsedPage {
        let document = Html::parse_document(html);
        let mut page = ParsedPage {
            total_results: self.parse_total(&document),
            ..ParsedPage::default()
        };

        for card in document.select(&self.card) {
            page.cards_seen += 1;
            match self.parse_card(card, ctx) {
                Ok(job) => page.jobs.push(job),
                Err(reason) => page.skipped.push(reason),
            }
        }
        page
    }

    fn parse_total(&self, document: &Html) -> Option<usize> {
        let text = element_text(document.select(&self.total).next()?);
        text.replace([',', '+'], "").trim().parse().ok()
    }

    fn parse_card(&self, card: ElementRef, ctx: &PageContext) -> Result<JobPost, String> {
        let href = card
            .select(&self.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .ok_or_else(|| "card without job link".to_string())?;
        let job_id = extract_job_id(href).ok_or_else(|| format!("no job id in href {href}"))?;

        let title = card
            .select(&self.title)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| format!("card {job_id} without title"))?;

        let company = self.parse_company(card);
        let metadata = card.select(&self.metadata).next();

        let location = metadata
            .and_then(|m| m.select(&self.location).next())
            .map(|el| normalizer::parse_location(&element_text(el), ctx.country.as_deref()))
            .unwrap_or_default();

        let date_posted = metadata.and_then(|m| {
            m.select(&self.time).find_map(|t| {
                let raw = t
                    .value()
                    .attr("datetime")
                    .map(str::to_string)
                    .unwrap_or_else(|| element_text(t));
                normalizer::parse_posted_date(&raw, ctx.today)
            })
        });

        let compensation = card
            .select(&self.salary)
            .next()
            .and_then(|el| normalizer::parse_compensation(&element_text(el)));

        let is_remote = ctx.remote_hint || text_mentions_remote(&title);

        Ok(JobPost {
            id: format!("{SITE_ID_PREFIX}-{job_id}"),
            job_url: format!("{}/jobs/view/{job_id}", self.base_url),
            job_url_direct: None,
            title,
            description: None,
            date_posted,
            is_remote,
            company,
            location,
            job_type: None,
            job_level: None,
            job_function: None,
            company_industry: None,
            company_logo: None,
            compensation,
            emails: Default::default(),
            listing_type: None,
            experience_range: None,
            vacancy_count: None,
            skills: None,
            work_from_home_type: None,
            banner_photo_url: None,
        })
    }

    fn parse_company(&self, card: ElementRef) -> CompanyInfo {
        let Some(subtitle) = card.select(&self.company).next() else {
            return CompanyInfo::default();
        };
        match subtitle.select(&self.company_link).next() {
            Some(a) => CompanyInfo {
                name: Some(element_text(a)).filter(|n| !n.is_empty()),
                url: a
                    .value()
                    .attr("href")
                    .map(|href| href.split('?').next().unwrap_or(href).to_string()),
                ..CompanyInfo::default()
            },
            None => CompanyInfo {
                name: Some(element_text(subtitle)).filter(|n| !n.is_empty()),
                ..CompanyInfo::default()
            },
        }
    }
}

/// The card href ends in "<slug>-<numeric id>", query string stripped.
fn extract_job_id(href: &str) -> Option<&str> {
    let path = href.split('?').next()?.trim_end_matches('/');
    let id = path.rsplit('-').next()?;
    (!id.is_empty() && id.chars().all(|c| c.is_ascii_digit())).then_some(id)
}

pub fn text_mentions_remote(text: &str) -> bool {
    let lower = text.to_lowercase();
    REMOTE_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}
