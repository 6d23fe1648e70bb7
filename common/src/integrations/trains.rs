// Train disruption check against the National Rail departure board

use crate::errors::ScrapeError;
use regex::Regex;
use reqwest::Client;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, instrument};

const BOARD_URL: &str = "https://ojp.nationalrail.co.uk/service/ldbboard/dep";
const RESULTS_MARKER: &str = "results trains";
const ROUTE_POSSIBLY_DISRUPTED: usize = 2;
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

static DIV_TAG: OnceLock<Regex> = OnceLock::new();
static ANY_TAG: OnceLock<Regex> = OnceLock::new();
static BAD_STATUS: OnceLock<Regex> = OnceLock::new();

fn div_tag() -> &'static Regex {
    DIV_TAG.get_or_init(|| Regex::new(r"(?i)</?div\b[^>]*>").expect("Invalid regex pattern"))
}

fn any_tag() -> &'static Regex {
    ANY_TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("Invalid regex pattern"))
}

fn bad_status() -> &'static Regex {
    BAD_STATUS.get_or_init(|| Regex::new(r"\b(Cancelled|Delayed)\b").expect("Invalid regex pattern"))
}

/// Departures between two stations, identified by their CRS codes
#[derive(Debug, Clone)]
pub struct TrainRoute {
    url: String,
    client: Client,
}

/// HTTP client for departure board requests
///
/// The board serves its results only to browser-like clients.
pub fn http_client(timeout: Duration) -> Result<Client, ScrapeError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ScrapeError::HttpRequestFailed(format!("Failed to create HTTP client: {}", e)))
}

impl TrainRoute {
    /// Create a route check sharing an existing HTTP client
    pub fn with_client(client: Client, from: &str, to: &str) -> Self {
        Self {
            url: board_url(from, to),
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// True when enough departures are cancelled or delayed to call the route disrupted
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn is_service_disrupted(&self) -> Result<bool, ScrapeError> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::UnexpectedStatus {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        let page = response.text().await?;
        let bad_trains = count_disrupted_services(&page)?;
        debug!(bad_trains, "Departure board scraped");

        Ok(bad_trains >= ROUTE_POSSIBLY_DISRUPTED)
    }
}

/// Departure board URL for a route
pub fn board_url(from: &str, to: &str) -> String {
    format!("{}/{}/{}/To", BOARD_URL, from, to)
}

/// Count cancelled or delayed services in the results section of a board page
pub fn count_disrupted_services(page: &str) -> Result<usize, ScrapeError> {
    let section = results_section(page).ok_or_else(|| {
        ScrapeError::UnexpectedLayout(format!("no '{}' section found", RESULTS_MARKER))
    })?;
    let text = any_tag().replace_all(section, " ");
    Ok(bad_status().find_iter(&text).count())
}

/// The `<div>` whose class contains the results marker, including nested divs
fn results_section(page: &str) -> Option<&str> {
    let marker = page.find(RESULTS_MARKER)?;
    let start = page[..marker].rfind("<div")?;
    let rest = &page[start..];

    let mut depth = 0usize;
    for tag in div_tag().find_iter(rest) {
        if tag.as_str().starts_with("</") {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(&rest[..tag.end()]);
            }
        } else {
            depth += 1;
        }
    }

    // Unterminated markup: take everything after the marker
    Some(rest)
}
