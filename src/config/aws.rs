use std::env;

const AWS_REGION: &str = "AWS_REGION";
const AWS_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
const AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
const AWS_LAMBDA_FUNCTION_NAME: &str = "AWS_LAMBDA_FUNCTION_NAME";
const AWS_ENDPOINT_URL: &str = "AWS_ENDPOINT_URL";

#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Clone, PartialEq)]
pub struct AwsConfig {
    pub region: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub aws_session_token: String,
    pub function_name: String,
    /// Overrides `<service>.<region>.amazonaws.com` for every service.
    pub endpoint_url: Option<String>,
}

impl AwsConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            region: env::var(AWS_REGION)
                .or_else(|_| env::var(AWS_DEFAULT_REGION))
                .unwrap_or("us-east-1".to_string()),
            aws_access_key_id: env::var(AWS_ACCESS_KEY_ID).unwrap_or_default(),
            aws_secret_access_key: env::var(AWS_SECRET_ACCESS_KEY).unwrap_or_default(),
            aws_session_token: env::var(AWS_SESSION_TOKEN).unwrap_or_default(),
            function_name: env::var(AWS_LAMBDA_FUNCTION_NAME).unwrap_or_default(),
            endpoint_url: env::var(AWS_ENDPOINT_URL)
                .ok()
                .filter(|url| !url.trim().is_empty()),
        }
    }
}

#[must_use]
pub fn get_aws_domain_by_region(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "amazonaws.com.cn"
    } else {
        "amazonaws.com"
    }
}
