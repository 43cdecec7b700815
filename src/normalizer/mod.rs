// Normalizer module: converts raw page substrings into canonical typed values.

pub mod dates;
pub mod email;
pub mod location;
pub mod salary;

pub use dates::parse_posted_date;
pub use email::extract_emails;
pub use location::parse_location;
pub use salary::parse_compensation;
