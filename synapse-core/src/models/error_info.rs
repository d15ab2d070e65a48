//! 结构化错误模型（ErrorInfo / ErrorDetails）
//!
//! 供处理器与发布者在不抛出异常的前提下上报结构化失败原因，
//! 线上格式为 camelCase JSON，`None` 字段与空 `details` 省略。
//!
use crate::error::{SynapseError, SynapseResult};
use bon::Builder;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// 附加的结构化错误细节
#[derive(Debug, Clone, Default, PartialEq, Builder, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    /// 出错字段
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    field: Option<String>,
    /// 问题描述
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    issue: Option<String>,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_path: Option<String>,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stack_trace: Option<String>,
    /// 后端自定义的其它键
    #[builder(default)]
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl ErrorDetails {
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn issue(&self) -> Option<&str> {
        self.issue.as_deref()
    }

    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

/// 结构化错误信息
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    /// 错误码（validation_error、handler_error 等），兼容旧格式的 `type`
    #[builder(into)]
    #[serde(alias = "type")]
    code: String,
    #[builder(into)]
    message: String,
    #[builder(default)]
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    details: Vec<ErrorDetails>,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn with_detail(mut self, detail: ErrorDetails) -> Self {
        self.details.push(detail);
        self
    }

    /// 由处理器返回的错误构造，错误链写入 `stack_trace`
    pub fn from_handler_error(err: &anyhow::Error) -> Self {
        Self::new("handler_error", err.to_string()).with_detail(
            ErrorDetails::builder()
                .stack_trace(format!("{err:#}"))
                .build(),
        )
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &[ErrorDetails] {
        &self.details
    }

    pub fn to_json_vec(&self) -> SynapseResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json_slice(bytes: &[u8]) -> SynapseResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl From<&SynapseError> for ErrorInfo {
    fn from(err: &SynapseError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

// 旧格式中 details 是单个对象，新格式是数组，两者都接受
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<ErrorDetails>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(ErrorDetails),
        Many(Vec<ErrorDetails>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(detail)) => vec![detail],
        Some(OneOrMany::Many(details)) => details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn details_serialize_to_camel_case_and_skip_none() {
        let details = ErrorDetails::builder()
            .file_path("/test.pdf")
            .error_code("ERR_001")
            .build();

        assert_eq!(
            serde_json::to_value(&details).unwrap(),
            json!({ "filePath": "/test.pdf", "errorCode": "ERR_001" })
        );
    }

    #[test]
    fn minimal_error_info_omits_details() {
        let info = ErrorInfo::new("timeout", "Request timed out");
        assert_eq!(
            serde_json::to_value(&info).unwrap(),
            json!({ "code": "timeout", "message": "Request timed out" })
        );
    }

    #[test]
    fn parses_legacy_shape_with_type_and_single_details_object() {
        let raw = br#"{
            "type": "file_error",
            "message": "Could not read file",
            "details": { "filePath": "/missing.pdf", "errorCode": "404" }
        }"#;

        let info = ErrorInfo::from_json_slice(raw).unwrap();
        assert_eq!(info.code(), "file_error");
        assert_eq!(info.details().len(), 1);
        assert_eq!(info.details()[0].file_path(), Some("/missing.pdf"));
        assert_eq!(info.details()[0].error_code(), Some("404"));
        assert_eq!(info.details()[0].stack_trace(), None);
    }

    #[test]
    fn unknown_detail_keys_are_kept_as_extra() {
        let raw = br#"{
            "code": "validation_error",
            "message": "bad request",
            "details": [{ "field": "requestId", "issue": "missing", "schema": "v2" }]
        }"#;

        let info = ErrorInfo::from_json_slice(raw).unwrap();
        let detail = &info.details()[0];
        assert_eq!(detail.field(), Some("requestId"));
        assert_eq!(detail.issue(), Some("missing"));
        assert_eq!(detail.extra().get("schema"), Some(&json!("v2")));

        let back: Value = serde_json::from_slice(&info.to_json_vec().unwrap()).unwrap();
        assert_eq!(back["details"][0]["schema"], json!("v2"));
    }

    #[test]
    fn multi_line_stack_trace_survives_json() {
        let stack = "Traceback:\n  File \"main.py\", line 10\nValueError: Bad value";
        let info = ErrorInfo::new("runtime_error", "Unexpected error")
            .with_detail(ErrorDetails::builder().stack_trace(stack).build());

        let restored = ErrorInfo::from_json_slice(&info.to_json_vec().unwrap()).unwrap();
        assert_eq!(restored.details()[0].stack_trace(), Some(stack));
    }

    #[test]
    fn handler_error_keeps_context_chain() {
        let err = anyhow::anyhow!("disk full").context("saving report");
        let info = ErrorInfo::from_handler_error(&err);

        assert_eq!(info.code(), "handler_error");
        assert_eq!(info.message(), "saving report");
        assert_eq!(
            info.details()[0].stack_trace(),
            Some("saving report: disk full")
        );
    }

    #[test]
    fn built_from_synapse_error_uses_stable_code() {
        let info = ErrorInfo::from(&SynapseError::validation("data is required"));
        assert_eq!(info.code(), "validation_error");
        assert_eq!(info.message(), "validation error: data is required");
    }
}
