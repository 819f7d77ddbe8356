/*!
 * 线路帧定义
 *
 * 每一帧在线路上是一个有序数组：第 0 个元素为通道名，其余为参数。
 * 命令通道的参数只有一个元素，即 CommandEnvelope。
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 多路复用帧
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<Value>", try_from = "Vec<Value>")]
pub struct Frame {
    pub channel: String,
    pub args: Vec<Value>,
}

impl Frame {
    pub fn new<S: Into<String>>(channel: S, args: Vec<Value>) -> Self {
        Self {
            channel: channel.into(),
            args,
        }
    }
}

impl From<Frame> for Vec<Value> {
    fn from(frame: Frame) -> Self {
        let mut values = Vec::with_capacity(frame.args.len() + 1);
        values.push(Value::String(frame.channel));
        values.extend(frame.args);
        values
    }
}

impl TryFrom<Vec<Value>> for Frame {
    type Error = String;

    fn try_from(values: Vec<Value>) -> Result<Self, Self::Error> {
        let mut values = values.into_iter();
        match values.next() {
            Some(Value::String(channel)) => Ok(Self {
                channel,
                args: values.collect(),
            }),
            Some(other) => Err(format!("通道名必须是字符串, 实际为: {}", other)),
            None => Err("空帧缺少通道名".to_string()),
        }
    }
}

/// 错误响应载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
    /// 机器可识别的错误类别，例如 `CommandNotFound`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// 命令通道信封
///
/// 线路上不带类型字段，靠 `commandName` 区分请求与响应，
/// 因此 Request 必须排在前面先尝试解析
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandEnvelope {
    #[serde(rename_all = "camelCase")]
    Request {
        correlation_id: String,
        command_name: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    #[serde(rename_all = "camelCase")]
    Response {
        correlation_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorPayload>,
    },
}

impl CommandEnvelope {
    pub fn request<S1: Into<String>, S2: Into<String>>(
        correlation_id: S1,
        command_name: S2,
        args: Vec<Value>,
    ) -> Self {
        Self::Request {
            correlation_id: correlation_id.into(),
            command_name: command_name.into(),
            args,
        }
    }

    pub fn success<S: Into<String>>(correlation_id: S, result: Value) -> Self {
        Self::Response {
            correlation_id: correlation_id.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure<S: Into<String>>(correlation_id: S, error: ErrorPayload) -> Self {
        Self::Response {
            correlation_id: correlation_id.into(),
            result: None,
            error: Some(error),
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Request { correlation_id, .. } | Self::Response { correlation_id, .. } => {
                correlation_id
            }
        }
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}
