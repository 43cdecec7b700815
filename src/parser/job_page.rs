// Job detail page parsing: description markup, criteria list, company logo
// and the external apply URL tucked into the page.
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::model::{DescriptionFormat, JobType};

static ABSOLUTE_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^"'\s<>\\]+"#).unwrap());

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Default, PartialEq)]
pub struct JobDetails {
    pub description: Option<String>,
    pub job_level: Option<String>,
    pub job_type: Option<JobType>,
    pub job_function: Option<String>,
    pub company_industry: Option<String>,
    pub company_logo: Option<String>,
    pub job_url_direct: Option<String>,
    pub is_easy_apply: bool,
}

struct DetailSelectors {
    description: Selector,
    criteria_item: Selector,
    criteria_header: Selector,
    criteria_value: Selector,
    logo: Selector,
    apply_url: Selector,
    button: Selector,
}

static SELECTORS: LazyLock<DetailSelectors> = LazyLock::new(|| DetailSelectors {
    description: Selector::parse("div.show-more-less-html__markup").unwrap(),
    criteria_item: Selector::parse("li.description__job-criteria-item").unwrap(),
    criteria_header: Selector::parse("h3.description__job-criteria-subheader").unwrap(),
    criteria_value: Selector::parse("span.description__job-criteria-text").unwrap(),
    logo: Selector::parse("img.artdeco-entity-image").unwrap(),
    apply_url: Selector::parse("code#applyUrl").unwrap(),
    button: Selector::parse("button").unwrap(),
});

pub fn parse_job_page(html: &str, format: DescriptionFormat) -> JobDetails {
    let document = Html::parse_document(html);
    let mut details = JobDetails {
        description: parse_description(&document, format),
        company_logo: document
            .select(&SELECTORS.logo)
            .next()
            .and_then(|img| img.value().attr("data-delayed-url"))
            .map(str::to_string),
        job_url_direct: parse_direct_url(&document),
        ..JobDetails::default()
    };

    for item in document.select(&SELECTORS.criteria_item) {
        let Some(header) = item.select(&SELECTORS.criteria_header).next() else {
            continue;
        };
        let Some(value) = item
            .select(&SELECTORS.criteria_value)
            .next()
            .map(element_text)
            .filter(|v| !v.is_empty())
        else {
            continue;
        };
        let header = element_text(header);
        if header.contains("Seniority level") {
            details.job_level = Some(value);
        } else if header.contains("Employment type") {
            details.job_type = JobType::from_page_label(&value);
        } else if header.contains("Industries") {
            details.company_industry = Some(value);
        } else if header.contains("Job function") {
            details.job_function = Some(value);
        }
    }

    details.is_easy_apply = detect_easy_apply(&document, details.job_url_direct.is_some());
    details
}

fn parse_description(document: &Html, format: DescriptionFormat) -> Option<String> {
    let markup = document.select(&SELECTORS.description).next()?;
    let text = match format {
        DescriptionFormat::Html => markup.inner_html().trim().to_string(),
        DescriptionFormat::Plain => {
            let joined = markup.text().collect::<Vec<_>>().join(" ");
            WHITESPACE_RE.replace_all(&joined, " ").trim().to_string()
        }
    };
    (!text.is_empty()).then_some(text)
}

/// The apply element carries a redirect URL whose `url` query parameter is
/// the percent-encoded external application page. Site-internal URLs are
/// never a direct apply target.
fn parse_direct_url(document: &Html) -> Option<String> {
    let code = document.select(&SELECTORS.apply_url).next()?;
    // The payload is usually wrapped in an HTML comment, so read the raw
    // serialization rather than decoded children.
    let content = code.html();
    for candidate in ABSOLUTE_URL_RE.find_iter(&content) {
        let Ok(parsed) = Url::parse(candidate.as_str()) else {
            continue;
        };
        if let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == "url") {
            if !is_site_internal(&target) {
                return Some(target.into_owned());
            }
        }
        if !is_site_internal(candidate.as_str()) {
            return Some(candidate.as_str().to_string());
        }
    }
    None
}

fn is_site_internal(url: &str) -> bool {
    let lower = url.to_lowercase();
    ["linkedin.com", "signup", "login", "licdn.com"]
        .iter()
        .any(|marker| lower.contains(marker))
}

/// In-page application is only signalled by the apply button itself; a
/// description merely mentioning the phrase must not count.
fn detect_easy_apply(document: &Html, has_direct_url: bool) -> bool {
    if has_direct_url {
        return false;
    }
    document.select(&SELECTORS.button).any(|button| {
        let text = element_text(button).to_lowercase();
        ["easy apply", "quick apply", "one-click apply"]
            .iter()
            .any(|marker| text.contains(marker))
    })
}

fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}
