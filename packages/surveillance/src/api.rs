//! The alert API: weekly surveillance records over HTTP.

use arbo_map_fetch::FetchClient;
use arbo_map_surveillance_models::Disease;
use arbo_map_table::Frame;

use crate::{SurveillanceError, WeeklySource};

/// Client for the surveillance alert endpoint.
///
/// One GET per fetch, parameterized by disease, geocode, format, and the
/// epidemiological week/year span. Retry and backoff behavior comes from
/// the wrapped [`FetchClient`].
#[derive(Debug, Clone)]
pub struct AlertApi {
    client: FetchClient,
    base_url: String,
}

impl AlertApi {
    /// Creates an alert client for `base_url`.
    #[must_use]
    pub fn new(client: FetchClient, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_owned(),
        }
    }

    fn build_url(
        &self,
        disease: Disease,
        geocode: i64,
        ew_start: u32,
        ew_end: u32,
        year: i32,
    ) -> String {
        format!(
            "{}?disease={disease}&geocode={geocode}&format={}&ew_start={ew_start}&ew_end={ew_end}&ey_start={year}&ey_end={year}",
            self.base_url,
            self.client.format(),
        )
    }
}

impl WeeklySource for AlertApi {
    async fn fetch_weeks(
        &self,
        disease: Disease,
        geocode: i64,
        ew_start: u32,
        ew_end: u32,
        year: i32,
    ) -> Result<Frame, SurveillanceError> {
        let url = self.build_url(disease, geocode, ew_start, ew_end, year);
        log::debug!("[{disease}] Requesting {url}");
        Ok(self.client.get_table(&url).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbo_map_fetch::ResponseFormat;

    #[test]
    fn builds_query_url() {
        let client = FetchClient::new(ResponseFormat::Json, 0, 0).unwrap();
        let api = AlertApi::new(client, "https://info.dengue.mat.br/api/alertcity");

        let url = api.build_url(Disease::Dengue, 3_106_200, 1, 53, 2024);

        assert_eq!(
            url,
            "https://info.dengue.mat.br/api/alertcity?disease=dengue&geocode=3106200\
             &format=json&ew_start=1&ew_end=53&ey_start=2024&ey_end=2024"
        );
    }
}
