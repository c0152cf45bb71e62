//! Request and response shapes at the HTTP boundary.
//!
//! Every response carries `isError` and `errorMessage`; the remaining
//! fields are only meaningful when `isError` is false.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{LabelStatus, PooledLabel, UploadStatus};
use crate::status::ProcessingStatus;

/// Physical label size in inches.
pub const LABEL_WIDTH: u32 = 4;
pub const LABEL_HEIGHT: u32 = 6;

/// A bulk document as received by the upload endpoint.
#[derive(Debug, Clone)]
pub struct UploadBulkLabelsRequest {
    pub owner_id: String,
    pub courier_service_id: String,
    pub file_name: String,
    pub document: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadBulkLabelsResponse {
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bulk_upload_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<UploadStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
    /// Seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_processing_time: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_check_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStatusResponse {
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(flatten)]
    pub progress: Option<ProcessingStatus>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolLabelSummary {
    pub pool_label_id: String,
    pub order_reference: String,
    pub tracking_number: String,
    pub courier_service_id: String,
    pub status: LabelStatus,
    pub upload_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
}

impl From<PooledLabel> for PoolLabelSummary {
    fn from(label: PooledLabel) -> Self {
        Self {
            pool_label_id: label.id,
            order_reference: label.order_reference,
            tracking_number: label.tracking_number,
            courier_service_id: label.courier_service_id,
            status: label.status,
            upload_date: label.created_at,
            expiry_date: label.expires_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatusResponse {
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub total_labels_in_pool: u32,
    pub available_labels: u32,
    pub claimed_labels: u32,
    pub expired_labels: u32,
    pub cancelled_labels: u32,
    pub labels: Vec<PoolLabelSummary>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateLabelRequest {
    pub order_reference: String,
    pub courier_service_id: String,
    /// External order that will hold the claim. Defaults to the order
    /// reference.
    #[serde(default)]
    pub consumer_order_id: Option<String>,
    #[serde(default = "default_package_count")]
    pub package_count: u32,
}

fn default_package_count() -> u32 {
    1
}

impl GenerateLabelRequest {
    pub fn new(order_reference: &str, courier_service_id: &str) -> Self {
        Self {
            order_reference: order_reference.to_string(),
            courier_service_id: courier_service_id.to_string(),
            consumer_order_id: None,
            package_count: default_package_count(),
        }
    }

    pub fn consumer(&self) -> &str {
        self.consumer_order_id
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(&self.order_reference)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelPackage {
    pub sequence_number: u32,
    pub tracking_number: String,
    pub png_label_data_base64: String,
    pub label_width: u32,
    pub label_height: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateLabelResponse {
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub lead_tracking_number: String,
    pub packages: Vec<LabelPackage>,
    /// Order references that could be claimed instead, filled when no label
    /// matched.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available_references: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelLabelRequest {
    /// Order reference printed on the label, or the consumer order holding
    /// the claim.
    pub order_reference: String,
    /// Restricts the release to a claim held by this consumer order.
    #[serde(default)]
    pub consumer_order_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelLabelResponse {
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released_label_id: Option<String>,
}

/// Implemented by every response so failures can be built uniformly.
pub trait ErrorResponse: Default {
    fn from_error(message: String) -> Self;
}

macro_rules! error_response {
    ($($ty:ty),+) => {
        $(
            impl ErrorResponse for $ty {
                fn from_error(message: String) -> Self {
                    Self {
                        is_error: true,
                        error_message: Some(message),
                        ..Self::default()
                    }
                }
            }
        )+
    };
}

error_response!(
    UploadBulkLabelsResponse,
    ProcessingStatusResponse,
    PoolStatusResponse,
    GenerateLabelResponse,
    CancelLabelResponse
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_shape() {
        let json = serde_json::to_value(CancelLabelResponse::from_error("nope".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"isError": true, "errorMessage": "nope"}));
    }

    #[test]
    fn test_generate_request_defaults() {
        let req: GenerateLabelRequest =
            serde_json::from_str(r#"{"orderReference": "123", "courierServiceId": "fedex"}"#)
                .unwrap();
        assert_eq!(req.package_count, 1);
        assert_eq!(req.consumer(), "123");

        let req: GenerateLabelRequest = serde_json::from_str(
            r#"{"orderReference": "123", "courierServiceId": "fedex", "consumerOrderId": "ORD-9"}"#,
        )
        .unwrap();
        assert_eq!(req.consumer(), "ORD-9");
    }

    #[test]
    fn test_package_field_names() {
        let package = LabelPackage {
            sequence_number: 1,
            tracking_number: "111122223333".to_string(),
            png_label_data_base64: "AAAA".to_string(),
            label_width: LABEL_WIDTH,
            label_height: LABEL_HEIGHT,
        };
        let json = serde_json::to_value(&package).unwrap();
        assert_eq!(json["pngLabelDataBase64"], "AAAA");
        assert_eq!(json["labelWidth"], 4);
        assert_eq!(json["labelHeight"], 6);
    }
}
