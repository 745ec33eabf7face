pub mod changelog_parser;
pub mod changelog_serializer;
pub mod dep3;
pub mod mail_header;
pub mod series_parser;
pub mod source_format;
pub mod spec_parser;

pub use changelog_parser::{ChangelogPolicy, parse_changelog};
pub use changelog_serializer::serialize_changelog;
pub use series_parser::{parse_series, write_series};
pub use spec_parser::parse_spec;
