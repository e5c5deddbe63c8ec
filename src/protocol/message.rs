//! Application-level RTMP message types decoded from AMF0 command payloads.

use crate::amf::AmfValue;

/// Parameters carried in the `connect` command object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectParams {
    /// The application name the client is connecting to (e.g. `"live"`).
    pub app: String,
    /// `tcUrl`: the full RTMP URL the client used to connect.
    pub tc_url: Option<String>,
    /// `pageUrl`: referring web page, if the client is a Flash plugin.
    pub page_url: Option<String>,
    /// `swfUrl`: URL of the connecting SWF, if any.
    pub swf_url: Option<String>,
    /// `flashVer`: client software identifier, used for encoder detection.
    pub flash_ver: Option<String>,
    /// Object encoding requested by the client (0 = AMF0, 3 = AMF3).
    pub object_encoding: f64,
    /// Whether the client advertised Enhanced RTMP support via `fourCcList`.
    pub supports_enhanced_rtmp: bool,
}

impl ConnectParams {
    /// Parse connect parameters out of the AMF0 command object sent with the
    /// `connect` command.
    pub fn from_command_object(obj: &AmfValue) -> Self {
        let get_str = |k: &str| obj.get_string(k).map(|s| s.to_string());

        Self {
            app: get_str("app").unwrap_or_default(),
            tc_url: get_str("tcUrl"),
            page_url: get_str("pageUrl"),
            swf_url: get_str("swfUrl"),
            flash_ver: get_str("flashVer"),
            object_encoding: obj.get_number("objectEncoding").unwrap_or(0.0),
            supports_enhanced_rtmp: obj
                .get("fourCcList")
                .map(|v| !matches!(v, AmfValue::Null | AmfValue::Undefined))
                .unwrap_or(false),
        }
    }
}

/// A decoded AMF0/AMF3 command message (`connect`, `createStream`, `play`,
/// `publish`, `onStatus`, …).
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Command name, e.g. `"connect"`.
    pub name: String,
    /// Transaction id echoed back in the response.
    pub transaction_id: f64,
    /// The command object (often `Null` for streaming commands).
    pub command_object: AmfValue,
    /// Positional arguments following the command object.
    pub arguments: Vec<AmfValue>,
    /// Message stream id the command arrived on (0 for `NetConnection`).
    pub stream_id: u32,
}

impl Command {
    /// Convenience accessor for the Nth positional argument.
    pub fn arg(&self, index: usize) -> Option<&AmfValue> {
        self.arguments.get(index)
    }

    /// The stream/media path argument most play/publish commands carry as
    /// their first argument.
    pub fn stream_name(&self) -> Option<&str> {
        self.arg(0).and_then(|v| v.as_str())
    }
}

/// Status levels used in `onStatus`/`_result`/`_error` replies.
pub mod status {
    pub const LEVEL_STATUS: &str = "status";
    pub const LEVEL_ERROR: &str = "error";
    pub const LEVEL_WARNING: &str = "warning";

    pub const NET_STREAM_PUBLISH_START: &str = "NetStream.Publish.Start";
    pub const NET_STREAM_PUBLISH_BAD_NAME: &str = "NetStream.Publish.BadName";
    pub const NET_STREAM_PLAY_START: &str = "NetStream.Play.Start";
    pub const NET_STREAM_PLAY_STREAM_NOT_FOUND: &str = "NetStream.Play.StreamNotFound";
    pub const NET_STREAM_PLAY_RESET: &str = "NetStream.Play.Reset";
    pub const NET_STREAM_PAUSE_NOTIFY: &str = "NetStream.Pause.Notify";
    pub const NET_STREAM_UNPAUSE_NOTIFY: &str = "NetStream.Unpause.Notify";
    pub const NET_CONNECTION_CONNECT_SUCCESS: &str = "NetConnection.Connect.Success";
    pub const NET_CONNECTION_CONNECT_REJECTED: &str = "NetConnection.Connect.Rejected";
    pub const NET_STREAM_FAILED: &str = "NetStream.Failed";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parses_connect_params_from_object() {
        let mut obj = HashMap::new();
        obj.insert("app".to_string(), AmfValue::String("live".into()));
        obj.insert(
            "tcUrl".to_string(),
            AmfValue::String("rtmp://localhost/live".into()),
        );
        obj.insert("flashVer".to_string(), AmfValue::String("FMLE/3.0".into()));
        obj.insert("objectEncoding".to_string(), AmfValue::Number(0.0));

        let params = ConnectParams::from_command_object(&AmfValue::Object(obj));
        assert_eq!(params.app, "live");
        assert_eq!(params.tc_url.as_deref(), Some("rtmp://localhost/live"));
        assert_eq!(params.flash_ver.as_deref(), Some("FMLE/3.0"));
        assert!(!params.supports_enhanced_rtmp);
    }

    #[test]
    fn stream_name_reads_first_argument() {
        let cmd = Command {
            name: "play".to_string(),
            transaction_id: 0.0,
            command_object: AmfValue::Null,
            arguments: vec![AmfValue::String("my_stream".into())],
            stream_id: 1,
        };
        assert_eq!(cmd.stream_name(), Some("my_stream"));
    }
}
