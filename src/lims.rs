use std::time::Duration;

use chrono::NaiveDate;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::config::ApiConfig;
use crate::error::SeqvaultError;

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveredService {
    #[serde(rename = "service_request_number")]
    pub id: String,
    #[serde(rename = "service_delivered_date")]
    pub delivered_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDetail {
    #[serde(default)]
    pub resolutions: Vec<Resolution>,
    pub service_user_id: ServiceUser,
}

impl ServiceDetail {
    /// Folder name of the first (canonical) resolution.
    pub fn resolution_folder(&self) -> Option<&str> {
        self.resolutions
            .first()
            .map(|res| res.resolution_full_number.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Resolution {
    pub resolution_full_number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceUser {
    #[serde(default)]
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub profile_center: Option<String>,
    #[serde(default)]
    pub profile_classification_area: Option<String>,
}

/// Metadata service boundary. Not-found is a per-service verdict (`Ok(None)`),
/// transport or auth failure is fatal to the whole run.
pub trait LimsClient {
    fn delivered_services(
        &self,
        date_from: NaiveDate,
        date_until: NaiveDate,
    ) -> Result<Vec<DeliveredService>, SeqvaultError>;

    fn service_detail(&self, id: &str) -> Result<Option<ServiceDetail>, SeqvaultError>;
}

#[derive(Clone)]
pub struct LimsHttpClient {
    client: Client,
    base_url: String,
    auth: Option<(String, String)>,
}

impl LimsHttpClient {
    pub fn new(conf: &ApiConfig) -> Result<Self, SeqvaultError> {
        let client = Client::builder()
            .user_agent(format!("seqvault/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| SeqvaultError::LimsHttp(err.to_string()))?;

        let auth = match (&conf.user, &conf.password) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            _ => None,
        };

        Ok(Self {
            client,
            base_url: format!(
                "{}{}",
                conf.server.trim_end_matches('/'),
                conf.base_path.as_str()
            ),
            auth,
        })
    }

    fn get(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::blocking::Response, SeqvaultError> {
        let url = format!("{}{endpoint}", self.base_url);
        let mut request = self.client.get(&url).query(query);
        if let Some((user, password)) = &self.auth {
            request = request.basic_auth(user, Some(password));
        }
        request
            .send()
            .map_err(|err| SeqvaultError::LimsHttp(err.to_string()))
    }
}

impl LimsClient for LimsHttpClient {
    fn delivered_services(
        &self,
        date_from: NaiveDate,
        date_until: NaiveDate,
    ) -> Result<Vec<DeliveredService>, SeqvaultError> {
        let response = self.get(
            "services",
            &[
                ("state", "delivered".to_string()),
                ("date_from", date_from.to_string()),
                ("date_until", date_until.to_string()),
            ],
        )?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "LIMS request failed".to_string());
            return Err(SeqvaultError::LimsStatus {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<Vec<DeliveredService>>()
            .map_err(|err| SeqvaultError::LimsHttp(err.to_string()))
    }

    fn service_detail(&self, id: &str) -> Result<Option<ServiceDetail>, SeqvaultError> {
        let response = self.get("service-data", &[("service", id.to_string())])?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SeqvaultError::LimsStatus {
                status: status.as_u16(),
                message: "authentication against the LIMS failed".to_string(),
            });
        }
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "LIMS request failed".to_string());
            return Err(SeqvaultError::LimsStatus {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<ServiceDetail>()
            .map(Some)
            .map_err(|err| SeqvaultError::LimsHttp(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_service_detail_payload() {
        let raw = r#"{
            "resolutions": [{"resolution_full_number": "SRVCNM001.1"}],
            "service_user_id": {
                "profile": {
                    "profile_center": "CNM",
                    "profile_classification_area": "Virology"
                }
            }
        }"#;
        let detail: ServiceDetail = serde_json::from_str(raw).unwrap();
        assert_eq!(detail.resolution_folder(), Some("SRVCNM001.1"));
        assert_eq!(
            detail
                .service_user_id
                .profile
                .as_ref()
                .and_then(|profile| profile.profile_center.as_deref()),
            Some("CNM")
        );
    }

    #[test]
    fn parse_delivered_services_payload() {
        let raw = r#"[
            {"service_request_number": "SRVCNM001", "service_delivered_date": "2024-03-01"},
            {"service_request_number": "SRVCNM002", "service_delivered_date": null}
        ]"#;
        let services: Vec<DeliveredService> = serde_json::from_str(raw).unwrap();
        assert_eq!(services.len(), 2);
        assert_eq!(
            services[0].delivered_date,
            Some(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
        assert!(services[1].delivered_date.is_none());
    }
}
