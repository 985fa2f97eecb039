use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Envelope shared by every JSON endpoint.
///
/// List endpoints fill `total`; everything else leaves it out of the payload.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub total: Option<i64>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            total: None,
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
            total: None,
        }
    }

    pub fn paginated(data: T, total: i64) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            total: Some(total),
        }
    }

    /// A successful response that only carries a message (deletes, status changes)
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            total: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginated_includes_total() {
        let json = serde_json::to_value(ApiResponse::paginated(vec![1, 2], 7)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["total"], 7);
        assert_eq!(json["data"], serde_json::json!([1, 2]));
    }

    #[test]
    fn plain_success_omits_total() {
        let json = serde_json::to_value(ApiResponse::success("ok")).unwrap();
        assert!(json.get("total").is_none());
        assert!(json["message"].is_null());
    }

    #[test]
    fn message_only_has_no_data() {
        let json = serde_json::to_value(ApiResponse::<()>::message("Obra eliminada")).unwrap();
        assert_eq!(json["message"], "Obra eliminada");
        assert!(json["data"].is_null());
    }
}
