// src/store/dynamo.rs
use std::collections::HashMap;
use std::error::Error as StdError;
use std::io;

use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::config::{Credentials, Region};
use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

use crate::config::DynamoSettings;
use crate::error::PersistError;
use crate::ingest::types::TrendRecord;
use crate::store::SnapshotStore;

/// Service error codes worth waiting out; everything else from the service is a
/// configuration or permission problem.
const TRANSIENT_CODES: &[&str] = &[
    "ProvisionedThroughputExceededException",
    "ThrottlingException",
    "RequestLimitExceeded",
    "InternalServerError",
    "InternalFailure",
    "ServiceUnavailable",
    "TransactionConflictException",
];

/// Builds the SDK client for `settings`. Static credentials win over the default chain.
///
/// Every call is bounded by `settings.timeout`; the SDK has no operation timeout of
/// its own and would otherwise wait on a silent connection forever.
pub async fn build_client(settings: &DynamoSettings) -> Client {
    let timeouts = TimeoutConfig::builder()
        .connect_timeout(settings.timeout)
        .operation_attempt_timeout(settings.timeout)
        .operation_timeout(settings.timeout)
        .build();
    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(settings.region.clone()))
        .timeout_config(timeouts);
    if let Some(endpoint) = &settings.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }
    if let Some(creds) = &settings.credentials {
        loader = loader.credentials_provider(Credentials::new(
            creds.access_key_id.clone(),
            creds.secret_access_key.clone(),
            creds.session_token.clone(),
            None,
            "trend-aggregator-env",
        ));
    }
    let sdk_config = loader.load().await;
    Client::new(&sdk_config)
}

/// `PutItem`-based gateway. The SDK client is cheap to clone and safe to share.
#[derive(Clone)]
pub struct DynamoStore {
    client: Client,
    table: String,
}

impl DynamoStore {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    pub async fn connect(settings: &DynamoSettings) -> Self {
        let client = build_client(settings).await;
        info!(
            region = %settings.region,
            table = %settings.table,
            endpoint = ?settings.endpoint_url,
            timeout_ms = settings.timeout.as_millis() as u64,
            static_credentials = settings.credentials.is_some(),
            "dynamodb client initialized"
        );
        Self::new(client, settings.table.clone())
    }
}

#[async_trait]
impl SnapshotStore for DynamoStore {
    async fn upsert(&self, record: &TrendRecord) -> Result<(), PersistError> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(row_for(record)))
            .send()
            .await
            .map_err(classify_sdk_error)?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "dynamodb"
    }
}

/// `{source: S, data: L<M>, updated_at: S}`
pub fn row_for(record: &TrendRecord) -> HashMap<String, AttributeValue> {
    let data = record
        .items
        .iter()
        .map(|item| {
            AttributeValue::M(
                item.iter()
                    .map(|(k, v)| (k.clone(), to_attribute(v)))
                    .collect(),
            )
        })
        .collect();

    HashMap::from([
        (
            "source".to_string(),
            AttributeValue::S(record.source.as_str().to_string()),
        ),
        ("data".to_string(), AttributeValue::L(data)),
        (
            "updated_at".to_string(),
            AttributeValue::S(updated_at_string(record.fetched_at)),
        ),
    ])
}

pub fn to_attribute(v: &Value) -> AttributeValue {
    match v {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(arr) => AttributeValue::L(arr.iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), to_attribute(v)))
                .collect(),
        ),
    }
}

/// Unix seconds with a fractional part, e.g. `1718000000.123456`.
pub fn updated_at_string(ts: DateTime<Utc>) -> String {
    format!("{}.{:06}", ts.timestamp(), ts.timestamp_subsec_micros())
}

fn classify_sdk_error<E, R>(err: SdkError<E, R>) -> PersistError
where
    E: ProvideErrorMetadata + StdError + 'static,
    R: std::fmt::Debug + 'static,
{
    let message = format!("{}", aws_sdk_dynamodb::error::DisplayErrorContext(&err));
    match &err {
        SdkError::TimeoutError(_) | SdkError::ResponseError(_) => PersistError::Transient(message),
        // Refused or unresolvable endpoint: wrong region/endpoint, not a blip.
        SdkError::DispatchFailure(df) if df.is_user() || is_connect_failure(&err) => {
            PersistError::Fatal(message)
        }
        SdkError::DispatchFailure(df) if df.is_io() || df.is_timeout() => {
            PersistError::Transient(message)
        }
        SdkError::DispatchFailure(_) | SdkError::ConstructionFailure(_) => {
            PersistError::Fatal(message)
        }
        SdkError::ServiceError(_) => classify_code(err.code(), message),
        _ => PersistError::Fatal(message),
    }
}

/// True when the error chain shows the connection was never established.
pub fn is_connect_failure(err: &(dyn StdError + 'static)) -> bool {
    let mut cur = Some(err);
    while let Some(e) = cur {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionRefused | io::ErrorKind::AddrNotAvailable
            ) {
                return true;
            }
        }
        let text = e.to_string();
        if text.starts_with("tcp connect error") || text.starts_with("dns error") {
            return true;
        }
        cur = e.source();
    }
    false
}

pub fn classify_code(code: Option<&str>, message: String) -> PersistError {
    match code {
        Some(c) if TRANSIENT_CODES.contains(&c) => PersistError::Transient(message),
        _ => PersistError::Fatal(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{Source, TrendItem};
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn json_values_map_to_attribute_values() {
        let v = json!({"n": 3, "f": 1.5, "s": "x", "b": true, "z": null, "l": [1, "a"]});
        let AttributeValue::M(m) = to_attribute(&v) else {
            panic!("expected map");
        };
        assert_eq!(m["n"], AttributeValue::N("3".into()));
        assert_eq!(m["f"], AttributeValue::N("1.5".into()));
        assert_eq!(m["s"], AttributeValue::S("x".into()));
        assert_eq!(m["b"], AttributeValue::Bool(true));
        assert_eq!(m["z"], AttributeValue::Null(true));
        assert_eq!(
            m["l"],
            AttributeValue::L(vec![
                AttributeValue::N("1".into()),
                AttributeValue::S("a".into())
            ])
        );
    }

    #[test]
    fn row_has_partition_key_data_and_timestamp() {
        let items: Vec<TrendItem> =
            serde_json::from_value(json!([{"x": 1}, {"x": 2}])).unwrap();
        let mut rec = TrendRecord::new(Source::GoogleTrends, items);
        rec.fetched_at = Utc.timestamp_opt(1_700_000_000, 250_000_000).unwrap();

        let row = row_for(&rec);
        assert_eq!(row.len(), 3);
        assert_eq!(row["source"], AttributeValue::S("google_trends".into()));
        assert_eq!(
            row["updated_at"],
            AttributeValue::S("1700000000.250000".into())
        );
        match &row["data"] {
            AttributeValue::L(list) => assert_eq!(list.len(), 2),
            other => panic!("data should be a list, got {other:?}"),
        }
    }

    #[test]
    fn empty_items_still_produce_a_row() {
        let row = row_for(&TrendRecord::new(Source::Tiktok, vec![]));
        assert_eq!(row["data"], AttributeValue::L(vec![]));
    }

    #[test]
    fn throttling_is_transient_and_missing_table_is_fatal() {
        let t = classify_code(Some("ProvisionedThroughputExceededException"), "x".into());
        assert!(!t.is_fatal());
        let f = classify_code(Some("ResourceNotFoundException"), "x".into());
        assert!(f.is_fatal());
        assert!(classify_code(None, "x".into()).is_fatal());
    }

    #[derive(Debug)]
    struct Wrapped(&'static str, Option<io::Error>);

    impl std::fmt::Display for Wrapped {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.0)
        }
    }

    impl StdError for Wrapped {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            self.1.as_ref().map(|e| e as &(dyn StdError + 'static))
        }
    }

    #[test]
    fn refused_and_dns_failures_are_connect_failures() {
        let refused = Wrapped(
            "client error (Connect)",
            Some(io::Error::from(io::ErrorKind::ConnectionRefused)),
        );
        assert!(is_connect_failure(&refused));
        assert!(is_connect_failure(&Wrapped("dns error: no such host", None)));
    }

    #[test]
    fn reset_mid_request_is_not_a_connect_failure() {
        let reset = Wrapped(
            "connection closed before message completed",
            Some(io::Error::from(io::ErrorKind::ConnectionReset)),
        );
        assert!(!is_connect_failure(&reset));
    }
}
