// Site-specific HTML parsing: search results and job detail pages.

pub mod job_page;
pub mod search_page;

pub use job_page::{JobDetails, parse_job_page};
pub use search_page::{PageContext, ParsedPage, SearchPageParser};
