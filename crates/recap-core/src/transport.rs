use std::fmt;
use std::time::{Duration, SystemTime};

use crate::error::TransportError;
use crate::http::{classify_error, classify_status, default_agent, error_message};
use crate::request::InferenceRequest;
use crate::response::InferenceResponse;
use crate::signing::{AwsKeys, DEFAULT_SIGNING_REGION, sign_post};

const JSON: &str = "application/json";

/// Performs one authenticated inference call. Implementations do not retry.
pub trait InferenceTransport: Send + Sync {
    fn name(&self) -> &'static str;
    fn invoke(
        &self,
        model_id: &str,
        request: &InferenceRequest,
    ) -> Result<InferenceResponse, TransportError>;
}

/// Where inference requests are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Regional Bedrock runtime endpoint.
    Region(String),
    /// Explicit base URL, e.g. a gateway or a local stub.
    Url(String),
}

impl Endpoint {
    pub fn base_url(&self) -> String {
        match self {
            Endpoint::Region(region) => {
                format!("https://bedrock-runtime.{}.amazonaws.com", region.trim())
            }
            Endpoint::Url(url) => url.trim().trim_end_matches('/').to_string(),
        }
    }
}

/// Credentials attached to every call.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Bedrock API key, sent as a bearer token.
    ApiKey(String),
    /// Static AWS keys; requests are SigV4 signed.
    Aws {
        access_key_id: String,
        secret_access_key: String,
        session_token: Option<String>,
    },
    Anonymous,
}

impl Credentials {
    pub fn from_api_key(value: Option<&str>) -> Self {
        match value.map(str::trim).filter(|value| !value.is_empty()) {
            Some(key) => Credentials::ApiKey(key.to_string()),
            None => Credentials::Anonymous,
        }
    }

    /// AWS keys from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and the
    /// optional `AWS_SESSION_TOKEN`. Both keys must be present.
    pub fn from_aws_env(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Some(Credentials::Aws {
            access_key_id: var("AWS_ACCESS_KEY_ID")?,
            secret_access_key: var("AWS_SECRET_ACCESS_KEY")?,
            session_token: var("AWS_SESSION_TOKEN"),
        })
    }

    /// The API key when one is set, then AWS keys from the environment.
    pub fn resolve(api_key: Option<&str>, lookup: impl Fn(&str) -> Option<String>) -> Self {
        match Self::from_api_key(api_key) {
            Credentials::Anonymous => Self::from_aws_env(lookup).unwrap_or(Credentials::Anonymous),
            credentials => credentials,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Credentials::Aws { access_key_id, .. } => write!(f, "Aws({access_key_id}, <redacted>)"),
            Credentials::Anonymous => f.write_str("Anonymous"),
        }
    }
}

/// HTTP transport for the Bedrock runtime `InvokeModel` API.
pub struct BedrockTransport {
    base_url: String,
    signing_region: String,
    credentials: Credentials,
    agent: ureq::Agent,
}

impl BedrockTransport {
    pub fn new(endpoint: &Endpoint, credentials: Credentials, timeout: Duration) -> Self {
        let signing_region = match endpoint {
            Endpoint::Region(region) => region.trim().to_string(),
            Endpoint::Url(_) => DEFAULT_SIGNING_REGION.to_string(),
        };
        Self {
            base_url: endpoint.base_url(),
            signing_region,
            credentials,
            agent: default_agent(timeout),
        }
    }

    /// Region used in the SigV4 scope when the endpoint is an explicit URL.
    pub fn with_signing_region(mut self, region: &str) -> Self {
        if !region.trim().is_empty() {
            self.signing_region = region.trim().to_string();
        }
        self
    }

    fn invoke_url(&self, model_id: &str) -> String {
        format!(
            "{}/model/{}/invoke",
            self.base_url,
            encode_path_segment(model_id.trim())
        )
    }

    fn auth_headers(
        &self,
        url: &str,
        body: &[u8],
    ) -> Result<Vec<(String, String)>, TransportError> {
        match &self.credentials {
            Credentials::ApiKey(key) => {
                Ok(vec![("Authorization".to_string(), format!("Bearer {key}"))])
            }
            Credentials::Aws {
                access_key_id,
                secret_access_key,
                session_token,
            } => {
                let keys = AwsKeys {
                    access_key_id,
                    secret_access_key,
                    session_token: session_token.as_deref(),
                };
                sign_post(
                    keys,
                    &self.signing_region,
                    url,
                    &[("accept", JSON), ("content-type", JSON)],
                    body,
                    SystemTime::now(),
                )
            }
            Credentials::Anonymous => Ok(Vec::new()),
        }
    }
}

impl InferenceTransport for BedrockTransport {
    fn name(&self) -> &'static str {
        "bedrock"
    }

    fn invoke(
        &self,
        model_id: &str,
        request: &InferenceRequest,
    ) -> Result<InferenceResponse, TransportError> {
        let url = self.invoke_url(model_id);
        let body = serde_json::to_vec(request)
            .map_err(|e| TransportError::Validation(format!("request encoding failed: {e}")))?;

        let mut builder = self
            .agent
            .post(&url)
            .header("Accept", JSON)
            .header("Content-Type", JSON);
        for (name, value) in self.auth_headers(&url, &body)? {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send(body).map_err(|e| classify_error(&e))?;
        let status = response.status().as_u16();
        let body = response
            .into_body()
            .read_to_string()
            .map_err(|e| classify_error(&e))?;

        if !(200..300).contains(&status) {
            return Err(classify_status(status, error_message(&body)));
        }
        Ok(InferenceResponse::new(body))
    }
}

fn encode_path_segment(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{BedrockTransport, Credentials, Endpoint, InferenceTransport, encode_path_segment};
    use crate::error::TransportError;
    use crate::family::ModelFamily;
    use crate::request::{GenerationConfig, build};
    use serde_json::Value;
    use std::collections::HashMap;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
            request
        });
        (format!("http://{addr}"), handle)
    }

    fn read_request(stream: &mut impl Read) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0_u8; 1024];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            let Some(header_end) = text.find("\r\n\r\n") else {
                continue;
            };
            let headers = text[..header_end].to_ascii_lowercase();
            if headers.contains("transfer-encoding: chunked") {
                if text.ends_with("0\r\n\r\n") {
                    break;
                }
                continue;
            }
            let length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + length {
                break;
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn llama_request() -> crate::request::InferenceRequest {
        build(
            ModelFamily::Llama,
            "meta.llama3-1-8b-instruct-v1:0",
            "summarize",
            &GenerationConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn region_endpoint_sets_signing_region() {
        let transport = BedrockTransport::new(
            &Endpoint::Region(" eu-west-3 ".into()),
            Credentials::Anonymous,
            Duration::from_secs(5),
        );
        assert_eq!(transport.signing_region, "eu-west-3");
        let transport = anonymous("http://localhost:1".into()).with_signing_region("  ");
        assert_eq!(transport.signing_region, "us-east-1");
    }

    #[test]
    fn region_endpoint_url() {
        assert_eq!(
            Endpoint::Region("us-east-1".into()).base_url(),
            "https://bedrock-runtime.us-east-1.amazonaws.com"
        );
        assert_eq!(
            Endpoint::Url("http://localhost:8080/".into()).base_url(),
            "http://localhost:8080"
        );
    }

    #[test]
    fn model_id_is_percent_encoded() {
        assert_eq!(
            encode_path_segment("meta.llama3-1-8b-instruct-v1:0"),
            "meta.llama3-1-8b-instruct-v1%3A0"
        );
    }

    fn request_body(request: &str) -> Value {
        let (_, body) = request.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }

    fn anonymous(base: String) -> BedrockTransport {
        BedrockTransport::new(
            &Endpoint::Url(base),
            Credentials::Anonymous,
            Duration::from_secs(5),
        )
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials::from_api_key(Some(" secret "));
        assert_eq!(format!("{creds:?}"), "ApiKey(<redacted>)");
        let blank = Credentials::from_api_key(Some("  "));
        assert_eq!(blank, Credentials::Anonymous);

        let aws = Credentials::Aws {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "very-secret".into(),
            session_token: None,
        };
        let debug = format!("{aws:?}");
        assert!(debug.contains("AKIDEXAMPLE"));
        assert!(!debug.contains("very-secret"));
    }

    #[test]
    fn aws_credentials_come_from_env() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("AWS_SESSION_TOKEN", " "),
        ]);
        let lookup = |key: &str| env.get(key).map(|value| value.to_string());

        assert_eq!(
            Credentials::from_aws_env(lookup),
            Some(Credentials::Aws {
                access_key_id: "AKIDEXAMPLE".into(),
                secret_access_key: "secret".into(),
                session_token: None,
            })
        );
        assert!(matches!(
            Credentials::resolve(Some(""), lookup),
            Credentials::Aws { .. }
        ));
        assert!(matches!(
            Credentials::resolve(Some("api-key"), lookup),
            Credentials::ApiKey(_)
        ));
        let only_id = |key: &str| (key == "AWS_ACCESS_KEY_ID").then(|| "AKID".to_string());
        assert_eq!(Credentials::resolve(None, only_id), Credentials::Anonymous);
    }

    #[test]
    fn invoke_posts_json_with_bearer_token() {
        let (base, server) = serve_once("200 OK", r#"{"generation":"done"}"#);
        let transport = BedrockTransport::new(
            &Endpoint::Url(base),
            Credentials::ApiKey("test-key".into()),
            Duration::from_secs(5),
        );
        let response = transport
            .invoke("meta.llama3-1-8b-instruct-v1:0", &llama_request())
            .unwrap();
        assert_eq!(response.body(), br#"{"generation":"done"}"#);

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /model/meta.llama3-1-8b-instruct-v1%3A0/invoke"));
        let lowered = request.to_ascii_lowercase();
        assert!(lowered.contains("authorization: bearer test-key"));
        assert!(lowered.contains("content-type: application/json"));
        let body = request_body(&request);
        assert_eq!(body["max_gen_len"], 2048);
        assert_eq!(body["prompt"], "summarize");
    }

    #[test]
    fn invoke_signs_requests_with_aws_keys() {
        let (base, server) = serve_once("200 OK", r#"{"generation":"done"}"#);
        let transport = BedrockTransport::new(
            &Endpoint::Url(base),
            Credentials::Aws {
                access_key_id: "AKIDEXAMPLE".into(),
                secret_access_key: "secret".into(),
                session_token: Some("token".into()),
            },
            Duration::from_secs(5),
        )
        .with_signing_region("eu-central-1");
        transport
            .invoke("meta.llama3-1-8b-instruct-v1:0", &llama_request())
            .unwrap();

        let request = server.join().unwrap();
        let lowered = request.to_ascii_lowercase();
        assert!(lowered.contains("authorization: aws4-hmac-sha256 credential=akidexample/"));
        assert!(lowered.contains("/eu-central-1/bedrock/aws4_request"));
        assert!(lowered.contains("x-amz-date: "));
        assert!(lowered.contains("x-amz-security-token: token"));
        assert!(!lowered.contains("bearer"));
        assert_eq!(request_body(&request)["max_gen_len"], 2048);
    }

    #[test]
    fn invoke_classifies_forbidden() {
        let (base, server) = serve_once(
            "403 Forbidden",
            r#"{"message":"The security token included in the request is invalid."}"#,
        );
        let err = anonymous(base)
            .invoke("meta.llama3-1-8b-instruct-v1:0", &llama_request())
            .unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, TransportError::Unauthorized(ref m) if m.contains("security token")));
    }

    #[test]
    fn invoke_classifies_throttling() {
        let (base, server) = serve_once("429 Too Many Requests", r#"{"message":"slow down"}"#);
        let err = anonymous(base)
            .invoke("meta.llama3-1-8b-instruct-v1:0", &llama_request())
            .unwrap_err();
        server.join().unwrap();
        assert!(err.is_retryable());
    }

    #[test]
    fn invoke_reports_connection_failure_as_network() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let transport = BedrockTransport::new(
            &Endpoint::Url(format!("http://{addr}")),
            Credentials::Anonymous,
            Duration::from_secs(2),
        );
        let err = transport
            .invoke("meta.llama3-1-8b-instruct-v1:0", &llama_request())
            .unwrap_err();
        assert_eq!(err.kind(), "network");
    }
}
