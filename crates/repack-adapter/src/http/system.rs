/*
[INPUT]:  API configuration updates
[OUTPUT]: System status, API config, health and version reports
[POS]:    HTTP layer - system endpoints under /api/v1/system
[UPDATE]: When adding system endpoints or changing report shapes
*/

use reqwest::Method;

use crate::http::{RepackClient, Result};
use crate::types::{ApiConfig, ConfigUpdateResponse, HealthReport, SystemStatus, VersionInfo};

impl RepackClient {
    /// GET /system/status
    pub async fn system_status(&self) -> Result<SystemStatus> {
        let builder = self.request(Method::GET, &["system", "status"])?;
        self.send_json(builder).await
    }

    /// GET /system/config
    pub async fn api_config(&self) -> Result<ApiConfig> {
        let builder = self.request(Method::GET, &["system", "config"])?;
        self.send_json(builder).await
    }

    /// PUT /system/config
    pub async fn update_api_config(&self, config: &ApiConfig) -> Result<ConfigUpdateResponse> {
        let builder = self.request(Method::PUT, &["system", "config"])?.json(config);
        self.send_json(builder).await
    }

    /// GET /system/health
    pub async fn health_check(&self) -> Result<HealthReport> {
        let builder = self.request(Method::GET, &["system", "health"])?;
        self.send_json(builder).await
    }

    /// GET /system/version
    pub async fn version(&self) -> Result<VersionInfo> {
        let builder = self.request(Method::GET, &["system", "version"])?;
        self.send_json(builder).await
    }
}

#[cfg(test)]
mod tests {
    use crate::http::{ClientConfig, RepackClient};
    use crate::types::ApiConfig;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_update_api_config_roundtrip() {
        let server = MockServer::start().await;
        let config = ApiConfig {
            github_api_url: "https://api.github.com".to_string(),
            marketplace_api_url: "https://marketplace.dify.ai".to_string(),
            pip_mirror_url: "https://pypi.org/simple".to_string(),
        };

        Mock::given(method("PUT"))
            .and(path("/api/v1/system/config"))
            .and(body_json(&config))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "updated",
                "config": config,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            RepackClient::with_config_and_base_url(ClientConfig::default(), &server.uri())
                .expect("client init");
        let response = client
            .update_api_config(&config)
            .await
            .expect("update_api_config failed");
        assert_eq!(response.config, config);
    }

    #[tokio::test]
    async fn test_version_tolerates_partial_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/system/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "app_name": "difypkg-repack",
                "version": "1.2.0",
                "git": { "commit": "abcd1234", "branch": "main" }
            })))
            .mount(&server)
            .await;

        let client =
            RepackClient::with_config_and_base_url(ClientConfig::default(), &server.uri())
                .expect("client init");
        let version = client.version().await.expect("version failed");
        assert_eq!(version.version.as_deref(), Some("1.2.0"));
        assert_eq!(version.git.commit.as_deref(), Some("abcd1234"));
        assert_eq!(version.platform, None);
    }
}
