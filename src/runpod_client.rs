//! `RunPod` GraphQL client.
//!
//! Unique responsibility: interact with the `RunPod` GraphQL API for pod
//! lifecycle operations.
//!
//! API endpoint:
//! - POST <https://api.runpod.io/graphql>
//! - Header: Authorization: Bearer <token>
//!
//! This module encapsulates:
//! - Pod creation (on-demand and spot)
//! - Pod lifecycle (stop, terminate, resume, bid-resume)
//! - Pod queries (list)
//!
//! Every method issues exactly one request and returns the server's answer
//! as-is. Nothing is retried or cached; the remote service owns all pod
//! state.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// GraphQL client for the `RunPod` API.
pub struct RunpodClient {
    graphql_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl RunpodClient {
    /// Create a new `RunPod` GraphQL client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        graphql_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, RunpodClientError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(RunpodClientError::Http)?;

        Ok(Self {
            graphql_url: graphql_url.into(),
            api_key: api_key.into(),
            http,
        })
    }

    /// List all pods for the current user.
    ///
    /// Uses the `myself` query.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_pods(&self) -> Result<Vec<PodSummary>, RunpodClientError> {
        let query = r"
            query myPods {
                myself {
                    pods {
                        id
                        name
                        podType
                        gpuCount
                        vcpuCount
                        memoryInGb
                        imageName
                        costPerHr
                        desiredStatus
                        machineId
                        machine {
                            podHostId
                            gpuDisplayName
                            secureCloud
                        }
                    }
                }
            }
        ";

        let resp: GraphQLResponse<MyselfData> = self.execute(query, serde_json::json!({})).await?;

        Ok(resp
            .data
            .and_then(|d| d.myself)
            .map(|m| m.pods)
            .unwrap_or_default())
    }

    /// Stop a running pod.
    ///
    /// Uses the `podStop` mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn stop_pod(&self, pod_id: &str) -> Result<PodStatusUpdate, RunpodClientError> {
        let query = r"
            mutation podStop($input: PodStopInput!) {
                podStop(input: $input) {
                    id
                    desiredStatus
                }
            }
        ";

        let variables = serde_json::json!({
            "input": { "podId": pod_id }
        });
        let resp: GraphQLResponse<PodStopData> = self.execute(query, variables).await?;

        resp.data
            .and_then(|d| d.podStop)
            .ok_or(RunpodClientError::EmptyResponse)
    }

    /// Terminate a pod (delete it and its storage).
    ///
    /// Uses the `podTerminate` mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn terminate_pod(&self, pod_id: &str) -> Result<(), RunpodClientError> {
        let query = r"
            mutation podTerminate($input: PodTerminateInput!) {
                podTerminate(input: $input)
            }
        ";

        let variables = serde_json::json!({
            "input": { "podId": pod_id }
        });
        let _resp: GraphQLResponse<PodTerminateData> = self.execute(query, variables).await?;

        Ok(())
    }

    /// Resume a stopped on-demand pod.
    ///
    /// Uses the `podResume` mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn resume_pod(
        &self,
        pod_id: &str,
        gpu_count: u32,
    ) -> Result<PodStatusUpdate, RunpodClientError> {
        let query = r"
            mutation podResume($input: PodResumeInput!) {
                podResume(input: $input) {
                    id
                    desiredStatus
                }
            }
        ";

        let variables = serde_json::json!({
            "input": {
                "podId": pod_id,
                "gpuCount": gpu_count
            }
        });
        let resp: GraphQLResponse<PodResumeData> = self.execute(query, variables).await?;

        resp.data
            .and_then(|d| d.podResume)
            .ok_or(RunpodClientError::EmptyResponse)
    }

    /// Resume a stopped spot pod with a bid per GPU.
    ///
    /// Uses the `podBidResume` mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn bid_resume_pod(
        &self,
        pod_id: &str,
        gpu_count: u32,
        bid_per_gpu: f64,
    ) -> Result<PodStatusUpdate, RunpodClientError> {
        let query = r"
            mutation podBidResume($input: PodBidResumeInput!) {
                podBidResume(input: $input) {
                    id
                    desiredStatus
                }
            }
        ";

        let variables = serde_json::json!({
            "input": {
                "podId": pod_id,
                "gpuCount": gpu_count,
                "bidPerGpu": bid_per_gpu
            }
        });
        let resp: GraphQLResponse<PodBidResumeData> = self.execute(query, variables).await?;

        resp.data
            .and_then(|d| d.podBidResume)
            .ok_or(RunpodClientError::EmptyResponse)
    }

    /// Create an on-demand pod.
    ///
    /// Uses the `podFindAndDeployOnDemand` mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn deploy_on_demand(
        &self,
        input: DeployPodInput,
    ) -> Result<PodSummary, RunpodClientError> {
        let query = r"
            mutation podFindAndDeployOnDemand($input: PodFindAndDeployOnDemandInput!) {
                podFindAndDeployOnDemand(input: $input) {
                    id
                    name
                    podType
                    gpuCount
                    vcpuCount
                    memoryInGb
                    imageName
                    costPerHr
                    desiredStatus
                    machineId
                    machine {
                        podHostId
                        gpuDisplayName
                        secureCloud
                    }
                }
            }
        ";

        let variables = serde_json::json!({ "input": input });
        let resp: GraphQLResponse<DeployOnDemandData> = self.execute(query, variables).await?;

        resp.data
            .and_then(|d| d.podFindAndDeployOnDemand)
            .ok_or(RunpodClientError::EmptyResponse)
    }

    /// Create a spot (interruptible) pod. The input must carry `bidPerGpu`.
    ///
    /// Uses the `podRentInterruptable` mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn deploy_spot(
        &self,
        input: DeployPodInput,
    ) -> Result<PodSummary, RunpodClientError> {
        let query = r"
            mutation podRentInterruptable($input: PodRentInterruptableInput!) {
                podRentInterruptable(input: $input) {
                    id
                    name
                    podType
                    gpuCount
                    vcpuCount
                    memoryInGb
                    imageName
                    costPerHr
                    desiredStatus
                    machineId
                    machine {
                        podHostId
                        gpuDisplayName
                        secureCloud
                    }
                }
            }
        ";

        let variables = serde_json::json!({ "input": input });
        let resp: GraphQLResponse<DeploySpotData> = self.execute(query, variables).await?;

        resp.data
            .and_then(|d| d.podRentInterruptable)
            .ok_or(RunpodClientError::EmptyResponse)
    }

    /// Execute a GraphQL query/mutation. One request, no retry.
    async fn execute<T: for<'de> Deserialize<'de>>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<GraphQLResponse<T>, RunpodClientError> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables
        });

        debug!(url = %self.graphql_url, "sending GraphQL request");

        let resp = self
            .http
            .post(&self.graphql_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(RunpodClientError::Http)?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(RunpodClientError::Api {
                status,
                body: body_text,
            });
        }

        let gql_resp: GraphQLResponse<T> = resp
            .json()
            .await
            .map_err(|e| RunpodClientError::Json(e.to_string()))?;

        // Check for GraphQL errors
        if let Some(errors) = &gql_resp.errors
            && !errors.is_empty()
        {
            let msg = errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RunpodClientError::GraphQL(msg));
        }

        Ok(gql_resp)
    }
}

// ============================================================================
// Input/Output types
// ============================================================================

/// Input for creating a pod (on-demand or spot).
#[derive(Debug, Clone, Serialize)]
#[allow(non_snake_case)]
pub struct DeployPodInput {
    /// Cloud type ("SECURE" or "COMMUNITY").
    pub cloudType: String,
    /// GPU count.
    pub gpuCount: u32,
    /// Volume size in GB.
    pub volumeInGb: u32,
    /// Container disk size in GB.
    pub containerDiskInGb: u32,
    /// Minimum vCPU count.
    pub minVcpuCount: u32,
    /// Minimum RAM in GB.
    pub minMemoryInGb: u32,
    /// GPU type ID (e.g., "NVIDIA A40").
    pub gpuTypeId: String,
    /// Pod name.
    pub name: String,
    /// Container image name. Omitted when creating from a template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imageName: Option<String>,
    /// Docker arguments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dockerArgs: Option<String>,
    /// Volume mount path.
    pub volumeMountPath: String,
    /// Template ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub templateId: Option<String>,
    /// Bid per GPU in $/hr. Spot creates only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidPerGpu: Option<f64>,
}

/// Pod attributes returned by list and create operations.
#[derive(Debug, Clone, Deserialize)]
#[allow(non_snake_case)]
pub struct PodSummary {
    /// Pod ID.
    pub id: String,
    /// Pod name.
    pub name: Option<String>,
    /// Pod type ("INTERRUPTABLE" for spot; the spelling is the API's).
    pub podType: Option<String>,
    /// GPU count.
    pub gpuCount: Option<u32>,
    /// vCPU count.
    pub vcpuCount: Option<f64>,
    /// RAM in GB.
    pub memoryInGb: Option<f64>,
    /// Image name.
    pub imageName: Option<String>,
    /// Cost per hour in $.
    pub costPerHr: Option<f64>,
    /// Desired status.
    pub desiredStatus: Option<String>,
    /// Machine ID.
    pub machineId: Option<String>,
    /// Machine details.
    pub machine: Option<MachineInfo>,
}

/// Machine information nested in pod responses.
#[derive(Debug, Clone, Deserialize)]
#[allow(non_snake_case)]
pub struct MachineInfo {
    /// Pod host ID.
    pub podHostId: Option<String>,
    /// GPU display name.
    pub gpuDisplayName: Option<String>,
    /// Whether the host is in the secure cloud.
    pub secureCloud: Option<bool>,
}

/// Result of a stop/resume transition.
#[derive(Debug, Clone, Deserialize)]
#[allow(non_snake_case)]
pub struct PodStatusUpdate {
    /// Pod ID.
    pub id: String,
    /// Desired status after the transition.
    pub desiredStatus: Option<String>,
}

// ============================================================================
// GraphQL response types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQLError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct MyselfData {
    myself: Option<MyselfInfo>,
}

#[derive(Debug, Deserialize)]
struct MyselfInfo {
    #[serde(default)]
    pods: Vec<PodSummary>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct PodStopData {
    podStop: Option<PodStatusUpdate>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct PodTerminateData {
    #[allow(dead_code)]
    podTerminate: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct PodResumeData {
    podResume: Option<PodStatusUpdate>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct PodBidResumeData {
    podBidResume: Option<PodStatusUpdate>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct DeployOnDemandData {
    podFindAndDeployOnDemand: Option<PodSummary>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct DeploySpotData {
    podRentInterruptable: Option<PodSummary>,
}

// ============================================================================
// Error type
// ============================================================================

/// Error type for `RunPod` remote operations.
#[derive(Debug)]
pub enum RunpodClientError {
    /// HTTP client error.
    Http(reqwest::Error),
    /// JSON parsing error.
    Json(String),
    /// GraphQL error from server.
    GraphQL(String),
    /// API error response.
    Api {
        /// HTTP status code.
        status: reqwest::StatusCode,
        /// Response body.
        body: String,
    },
    /// Empty response from server.
    EmptyResponse,
}

impl fmt::Display for RunpodClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "http error: {e}"),
            Self::Json(e) => write!(f, "json error: {e}"),
            Self::GraphQL(e) => write!(f, "graphql error: {e}"),
            Self::Api { status, body } => {
                write!(f, "api error: status={status}, body={body}")
            }
            Self::EmptyResponse => write!(f, "empty response from server"),
        }
    }
}

impl std::error::Error for RunpodClientError {}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> RunpodClient {
        RunpodClient::new(server.uri(), "test-key").unwrap()
    }

    #[tokio::test]
    async fn list_pods_issues_one_query_and_parses_pods() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_string_contains("myself"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "myself": { "pods": [{
                    "id": "abc123",
                    "name": "trainer",
                    "podType": "INTERRUPTABLE",
                    "gpuCount": 2,
                    "vcpuCount": 16.0,
                    "memoryInGb": 62.0,
                    "imageName": "pytorch/pytorch:latest",
                    "costPerHr": 0.39,
                    "desiredStatus": "RUNNING",
                    "machineId": "m-1",
                    "machine": {
                        "podHostId": "host-1",
                        "gpuDisplayName": "NVIDIA A40",
                        "secureCloud": false
                    }
                }]}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let pods = client_for(&server).list_pods().await.unwrap();

        assert_eq!(pods.len(), 1);
        let pod = &pods[0];
        assert_eq!(pod.id, "abc123");
        assert_eq!(pod.name.as_deref(), Some("trainer"));
        assert_eq!(pod.podType.as_deref(), Some("INTERRUPTABLE"));
        assert_eq!(pod.gpuCount, Some(2));
        assert_eq!(pod.costPerHr, Some(0.39));
        let machine = pod.machine.as_ref().unwrap();
        assert_eq!(machine.gpuDisplayName.as_deref(), Some("NVIDIA A40"));
        assert_eq!(machine.secureCloud, Some(false));
    }

    #[tokio::test]
    async fn list_pods_with_no_pods_is_empty() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "myself": { "pods": [] } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let pods = client_for(&server).list_pods().await.unwrap();
        assert!(pods.is_empty());
    }

    #[tokio::test]
    async fn list_pods_tolerates_absent_myself() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "data": { "myself": null } })),
            )
            .mount(&server)
            .await;

        let pods = client_for(&server).list_pods().await.unwrap();
        assert!(pods.is_empty());
    }

    #[tokio::test]
    async fn list_pods_tolerates_absent_pods_field() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "data": { "myself": {} } })),
            )
            .mount(&server)
            .await;

        let pods = client_for(&server).list_pods().await.unwrap();
        assert!(pods.is_empty());
    }

    #[tokio::test]
    async fn stop_pod_sends_one_mutation() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_string_contains("podStop"))
            .and(body_string_contains("abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "podStop": { "id": "abc123", "desiredStatus": "EXITED" } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let update = client_for(&server).stop_pod("abc123").await.unwrap();
        assert_eq!(update.id, "abc123");
        assert_eq!(update.desiredStatus.as_deref(), Some("EXITED"));
    }

    #[tokio::test]
    async fn terminate_pod_accepts_null_payload() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_string_contains("podTerminate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": { "podTerminate": null } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).terminate_pod("abc123").await.unwrap();
    }

    #[tokio::test]
    async fn resume_pod_surfaces_graphql_error_for_bad_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_string_contains("podResume"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "errors": [{ "message": "Cannot resume a pod that is not in exited state" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).resume_pod("nope", 1).await.unwrap_err();
        match err {
            RunpodClientError::GraphQL(msg) => {
                assert!(msg.contains("Cannot resume a pod"));
            }
            other => panic!("expected GraphQL error, got {other}"),
        }
    }

    #[tokio::test]
    async fn bid_resume_sends_bid_per_gpu() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_string_contains("podBidResume"))
            .and(body_string_contains("bidPerGpu"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "podBidResume": { "id": "abc123", "desiredStatus": "RUNNING" } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let update = client_for(&server)
            .bid_resume_pod("abc123", 1, 0.2)
            .await
            .unwrap();
        assert_eq!(update.desiredStatus.as_deref(), Some("RUNNING"));
    }

    #[tokio::test]
    async fn deploy_on_demand_parses_created_pod() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_string_contains("podFindAndDeployOnDemand"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "podFindAndDeployOnDemand": {
                    "id": "new-pod",
                    "name": "NVIDIA_A40",
                    "podType": "RESERVED",
                    "gpuCount": 1,
                    "costPerHr": 0.79,
                    "desiredStatus": "RUNNING",
                    "machine": { "podHostId": "host-9" }
                }}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let input = DeployPodInput {
            cloudType: "COMMUNITY".to_string(),
            gpuCount: 1,
            volumeInGb: 20,
            containerDiskInGb: 10,
            minVcpuCount: 1,
            minMemoryInGb: 1,
            gpuTypeId: "NVIDIA A40".to_string(),
            name: "NVIDIA_A40".to_string(),
            imageName: Some("pytorch/pytorch:latest".to_string()),
            dockerArgs: None,
            volumeMountPath: "/workspace".to_string(),
            templateId: None,
            bidPerGpu: None,
        };

        let pod = client_for(&server).deploy_on_demand(input).await.unwrap();
        assert_eq!(pod.id, "new-pod");
        assert_eq!(pod.costPerHr, Some(0.79));
    }

    #[tokio::test]
    async fn deploy_spot_sends_one_mutation_with_bid() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_string_contains("podRentInterruptable"))
            .and(body_string_contains("bidPerGpu"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "podRentInterruptable": {
                    "id": "spot-pod",
                    "name": "NVIDIA_A40",
                    "podType": "INTERRUPTABLE",
                    "gpuCount": 1,
                    "costPerHr": 0.21,
                    "desiredStatus": "RUNNING",
                    "machine": { "podHostId": "host-3", "secureCloud": false }
                }}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let input = DeployPodInput {
            cloudType: "COMMUNITY".to_string(),
            gpuCount: 1,
            volumeInGb: 20,
            containerDiskInGb: 10,
            minVcpuCount: 1,
            minMemoryInGb: 1,
            gpuTypeId: "NVIDIA A40".to_string(),
            name: "NVIDIA_A40".to_string(),
            imageName: Some("pytorch/pytorch:latest".to_string()),
            dockerArgs: None,
            volumeMountPath: "/workspace".to_string(),
            templateId: None,
            bidPerGpu: Some(0.21),
        };

        let pod = client_for(&server).deploy_spot(input).await.unwrap();
        assert_eq!(pod.id, "spot-pod");
        assert_eq!(pod.podType.as_deref(), Some("INTERRUPTABLE"));
    }

    #[tokio::test]
    async fn http_failure_status_becomes_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let err = client_for(&server).list_pods().await.unwrap_err();
        match err {
            RunpodClientError::Api { status, body } => {
                assert_eq!(status.as_u16(), 401);
                assert_eq!(body, "unauthorized");
            }
            other => panic!("expected Api error, got {other}"),
        }
    }

    #[tokio::test]
    async fn null_data_without_errors_is_empty_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": null })))
            .mount(&server)
            .await;

        let err = client_for(&server).stop_pod("abc123").await.unwrap_err();
        assert!(matches!(err, RunpodClientError::EmptyResponse));
    }
}
