//! Crate for the `logrelay` project
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_copy_implementations)]
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod aws;
pub mod awslogs;
pub mod config;
pub mod dispatch;
pub mod http_client;
pub mod logger;
pub mod relay;
pub mod runtime;

use std::{env, io};

pub const RUNTIME_ROUTE: &str = "2018-06-01/runtime";
pub const REQUEST_ID_HEADER: &str = "Lambda-Runtime-Aws-Request-Id";
pub const INVOKED_FUNCTION_ARN_HEADER: &str = "Lambda-Runtime-Invoked-Function-Arn";
pub const DEADLINE_MS_HEADER: &str = "Lambda-Runtime-Deadline-Ms";
pub const FUNCTION_ERROR_TYPE_HEADER: &str = "Lambda-Runtime-Function-Error-Type";

/// Name of the optional YAML file looked up in the function's task root.
pub const CONFIG_FILE_NAME: &str = "logrelay.yaml";

/// Return the base URL for the lambda runtime API
///
/// # Errors
///
/// Function will error if the envar `AWS_LAMBDA_RUNTIME_API` is not set in the
/// environment.
pub fn base_url(route: &str) -> io::Result<String> {
    Ok(format!(
        "http://{}/{}",
        env::var("AWS_LAMBDA_RUNTIME_API")
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?,
        route
    ))
}
