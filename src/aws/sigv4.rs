//! AWS Signature Version 4 for the POST requests the relay makes.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use sha2::{Digest, Sha256};

use crate::aws::AwsError;
use crate::config::AwsConfig;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

#[derive(Clone, Copy)]
pub struct RequestArgs<'a> {
    /// Signing name of the service, e.g. `sns` or `ses`.
    pub service: &'a str,
    pub host: &'a str,
    pub path: &'a str,
    pub content_type: &'a str,
    pub body: &'a [u8],
    pub time: DateTime<Utc>,
    pub x_amz_target: Option<&'a str>,
}

pub fn build_signed_headers(
    aws_config: &AwsConfig,
    args: &RequestArgs,
) -> Result<HeaderMap, AwsError> {
    let amz_date = args.time.format("%Y%m%dT%H%M%SZ").to_string();
    let date_stamp = args.time.format("%Y%m%d").to_string();

    // Header names must stay sorted.
    let mut canonical: Vec<(&str, &str)> = vec![
        ("content-type", args.content_type),
        ("host", args.host),
        ("x-amz-date", amz_date.as_str()),
    ];
    if !aws_config.aws_session_token.is_empty() {
        canonical.push((
            "x-amz-security-token",
            aws_config.aws_session_token.as_str(),
        ));
    }
    if let Some(target) = args.x_amz_target {
        canonical.push(("x-amz-target", target));
    }

    let canonical_headers: String = canonical
        .iter()
        .map(|(name, value)| format!("{name}:{}\n", value.trim()))
        .collect();
    let signed_headers = canonical
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");

    let payload_hash_hex = hex::encode(Sha256::digest(args.body));
    let canonical_request = format!(
        "POST\n{}\n\n{canonical_headers}\n{signed_headers}\n{payload_hash_hex}",
        args.path
    );
    let credential_scope = format!(
        "{}/{}/{}/aws4_request",
        date_stamp, aws_config.region, args.service
    );
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        credential_scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let signing_key = get_aws4_signature_key(
        &aws_config.aws_secret_access_key,
        &date_stamp,
        aws_config.region.as_str(),
        args.service,
    )?;
    let signature = hex::encode(sign(&signing_key, &string_to_sign)?);

    let authorization_header = format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, aws_config.aws_access_key_id, credential_scope, signed_headers, signature
    );

    let mut headers = HeaderMap::new();
    headers.insert("Authorization", header_value(&authorization_header)?);
    for (name, value) in canonical {
        headers.insert(name, header_value(value)?);
    }
    Ok(headers)
}

fn header_value(value: &str) -> Result<HeaderValue, AwsError> {
    HeaderValue::from_str(value).map_err(|err| AwsError::Signing(err.to_string()))
}

fn sign(key: &[u8], msg: &str) -> Result<Vec<u8>, AwsError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|err| AwsError::Signing(format!("Error creating HMAC: {err}")))?;
    mac.update(msg.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

fn get_aws4_signature_key(
    key: &str,
    date_stamp: &str,
    region_name: &str,
    service_name: &str,
) -> Result<Vec<u8>, AwsError> {
    let k_date = sign(format!("AWS4{key}").as_bytes(), date_stamp)?;
    let k_region = sign(&k_date, region_name)?;
    let k_service = sign(&k_region, service_name)?;
    sign(&k_service, "aws4_request")
}
