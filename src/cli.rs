use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use lettre::message::Mailbox;

use crate::app::Mode;
use crate::config::TransportKind;
use crate::select::{OrderBy, SelectOptions};

/// Fetch articles and feeds, bundle them into EPUBs and mail them
#[derive(Parser, Debug)]
#[command(name = "epubcast", version, about, long_about = None)]
pub struct Args {
    /// Feed or article URLs to sync before compiling
    #[arg(value_name = "URL")]
    pub urls: Vec<String>,

    /// Email the books to this address
    #[arg(long, value_name = "EMAIL")]
    pub to: Option<String>,

    /// Mail transport to use with --to
    #[arg(long, value_enum, default_value_t = TransportKind::Smtp)]
    pub transport: TransportKind,

    /// JSON file with mail transport settings
    #[arg(long, value_name = "FILE")]
    pub transport_config: Option<PathBuf>,

    /// Directory holding the cache and generated books
    #[arg(short, long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Sort selected articles
    #[arg(long, value_enum, value_name = "ORDER")]
    pub order: Option<OrderBy>,

    /// Only articles published before this date (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_name = "DATE", value_parser = parse_date)]
    pub before: Option<DateTime<Utc>>,

    /// Only articles published after this date (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_name = "DATE", value_parser = parse_date)]
    pub after: Option<DateTime<Utc>>,

    /// Reverse the order of selected articles
    #[arg(long)]
    pub reverse: bool,

    /// Maximum number of articles to compile
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub max: Option<u64>,

    /// One book per article, or one book for all of them
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Config file (default: platform config dir)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Cross-option checks clap cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if let (Some(after), Some(before)) = (self.after, self.before) {
            if after >= before {
                return Err(format!(
                    "--after ({}) must be earlier than --before ({})",
                    after.date_naive(),
                    before.date_naive()
                ));
            }
        }
        if let Some(to) = &self.to {
            to.parse::<Mailbox>()
                .map_err(|e| format!("--to '{}' is not a valid email address: {}", to, e))?;
        }
        Ok(())
    }

    pub fn selection(&self) -> SelectOptions {
        SelectOptions {
            before: self.before,
            after: self.after,
            order_by: self.order,
            reverse: self.reverse,
            max: self.max.map(|n| n as usize),
        }
    }
}

/// Parse an RFC 3339 timestamp or a bare date (midnight UTC).
pub fn parse_date(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    Err(format!("invalid date '{}': expected RFC 3339 or YYYY-MM-DD", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_invocation() {
        let args = Args::try_parse_from([
            "epubcast",
            "https://example.com/feed.xml",
            "--to",
            "kindle@example.com",
            "--order",
            "date",
            "--after",
            "2024-01-01",
            "--before",
            "2024-03-01T12:00:00+02:00",
            "--reverse",
            "--max",
            "2",
            "--mode",
            "individual",
        ])
        .unwrap();

        assert!(args.validate().is_ok());
        assert_eq!(args.mode, Some(Mode::Individual));
        let selection = args.selection();
        assert_eq!(selection.order_by, Some(OrderBy::Date));
        assert_eq!(selection.max, Some(2));
        assert!(selection.reverse);
        assert_eq!(selection.before.unwrap().to_rfc3339(), "2024-03-01T10:00:00+00:00");
    }

    #[test]
    fn test_rejects_zero_max() {
        assert!(Args::try_parse_from(["epubcast", "--max", "0"]).is_err());
    }

    #[test]
    fn test_rejects_unknown_order() {
        assert!(Args::try_parse_from(["epubcast", "--order", "random"]).is_err());
    }

    #[test]
    fn test_inverted_date_range_fails_validation() {
        let args = Args::try_parse_from(["epubcast", "--after", "2024-03-01", "--before", "2024-01-01"]).unwrap();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_malformed_recipient_fails_validation() {
        for to in ["kindle-at-example.com", "", "kindle@"] {
            let args = Args::try_parse_from(["epubcast", "--to", to]).unwrap();
            assert!(args.validate().is_err(), "accepted {:?}", to);
        }
        let args = Args::try_parse_from(["epubcast", "--to", "Reader <kindle@example.com>"]).unwrap();
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(parse_date("yesterday").is_err());
        assert_eq!(parse_date("2024-02-01").unwrap().to_rfc3339(), "2024-02-01T00:00:00+00:00");
    }
}
