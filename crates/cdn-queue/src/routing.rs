//! Retry destination routing
//!
//! A retry goes back to the queue the message came from. The source route is the
//! queue ARN (`arn:<partition>:sqs:<region>:<account>:<name>`), which carries
//! everything needed to rebuild the queue URL.

use std::fmt;

use crate::{QueueError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRoute {
    pub region: String,
    pub account_id: String,
    pub queue_name: String,
}

impl QueueRoute {
    pub fn from_arn(arn: &str) -> Result<Self> {
        let parts: Vec<&str> = arn.splitn(6, ':').collect();

        match parts.as_slice() {
            ["arn", _partition, "sqs", region, account_id, queue_name]
                if !region.is_empty() && !account_id.is_empty() && !queue_name.is_empty() =>
            {
                Ok(Self {
                    region: region.to_string(),
                    account_id: account_id.to_string(),
                    queue_name: queue_name.to_string(),
                })
            }
            _ => Err(QueueError::InvalidRoute(format!("not an SQS queue ARN: {}", arn))),
        }
    }

    /// Queue URL for this route. With an endpoint override (LocalStack) the URL is
    /// `<endpoint>/<account>/<name>`, otherwise the regional AWS endpoint is used.
    pub fn queue_url(&self, endpoint_override: Option<&str>) -> String {
        match endpoint_override {
            Some(endpoint) => format!(
                "{}/{}/{}",
                endpoint.trim_end_matches('/'),
                self.account_id,
                self.queue_name
            ),
            None => format!(
                "https://sqs.{}.amazonaws.com/{}/{}",
                self.region, self.account_id, self.queue_name
            ),
        }
    }
}

impl fmt::Display for QueueRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.region, self.account_id, self.queue_name)
    }
}
