use std::fmt::Display;
use std::time::SystemTime;

use aws_credential_types::Credentials as AwsCredentials;
use aws_sigv4::http_request::{SignableBody, SignableRequest, SigningParams, SigningSettings, sign};
use aws_sigv4::sign::v4;

use crate::error::TransportError;

/// Service name Bedrock runtime requests are signed for.
pub const SIGNING_SERVICE: &str = "bedrock";
pub const DEFAULT_SIGNING_REGION: &str = "us-east-1";

/// Static AWS keys used for SigV4.
#[derive(Clone, Copy)]
pub struct AwsKeys<'a> {
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub session_token: Option<&'a str>,
}

/// SigV4 headers (`authorization`, `x-amz-date`, and the session token when
/// present) for a POST of `body` to `url` with the given `headers`.
pub fn sign_post(
    keys: AwsKeys<'_>,
    region: &str,
    url: &str,
    headers: &[(&str, &str)],
    body: &[u8],
    time: SystemTime,
) -> Result<Vec<(String, String)>, TransportError> {
    let identity = AwsCredentials::new(
        keys.access_key_id,
        keys.secret_access_key,
        keys.session_token.map(str::to_string),
        None,
        "recap",
    )
    .into();
    let params: SigningParams<'_> = v4::SigningParams::builder()
        .identity(&identity)
        .region(region)
        .name(SIGNING_SERVICE)
        .time(time)
        .settings(SigningSettings::default())
        .build()
        .map_err(signing_failed)?
        .into();

    let signable = SignableRequest::new(
        "POST",
        url,
        headers.iter().copied(),
        SignableBody::Bytes(body),
    )
    .map_err(signing_failed)?;
    let (instructions, _signature) = sign(signable, &params)
        .map_err(signing_failed)?
        .into_parts();

    Ok(instructions
        .headers()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect())
}

fn signing_failed(err: impl Display) -> TransportError {
    TransportError::Unknown(format!("request signing failed: {err}"))
}
