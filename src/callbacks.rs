//! Callback listing and updates.

use serde::Serialize;

use crate::error::{MythicError, Result};
use crate::graphql::queries;
use crate::graphql::types::{CallbackFragment, CallbackListData, UpdateCallbackData};
use crate::graphql::GraphqlRequest;
use crate::session::Mythic;

/// Fields to change on a callback. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallbackUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ips: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity_level: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// Every callback of the current operation, oldest first.
pub async fn get_all_callbacks(mythic: &Mythic) -> Result<Vec<CallbackFragment>> {
    let data: CallbackListData = mythic
        .query(GraphqlRequest::new(queries::get_all_callbacks()))
        .await?;
    Ok(data.callback)
}

/// Callbacks still marked active, oldest first.
pub async fn get_all_active_callbacks(mythic: &Mythic) -> Result<Vec<CallbackFragment>> {
    let data: CallbackListData = mythic
        .query(GraphqlRequest::new(queries::get_all_active_callbacks()))
        .await?;
    Ok(data.callback)
}

/// Apply `update` to the callback with `callback_display_id`.
///
/// Only the fields set on `update` are sent. A non-success reply from the
/// server comes back as [`MythicError::Graphql`] carrying its message.
pub async fn update_callback(
    mythic: &Mythic,
    callback_display_id: i64,
    update: &CallbackUpdate,
) -> Result<()> {
    let request = GraphqlRequest::new(queries::UPDATE_CALLBACK)
        .var("callback_display_id", callback_display_id)
        .vars(update)?;
    let data: UpdateCallbackData = mythic.mutate(request).await?;
    let result = data.update_callback;
    if result.status != "success" {
        return Err(MythicError::Graphql(result.error.unwrap_or_else(|| {
            format!("failed to update callback {}", callback_display_id)
        })));
    }
    tracing::debug!(callback = callback_display_id, "Updated callback");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::testing::session;
    use crate::transport::mock::MockTransport;
    use serde_json::{json, Value};

    fn callback(display_id: i64) -> Value {
        json!({
            "architecture": "x64",
            "description": "Created by mythic_admin",
            "domain": "",
            "external_ip": "",
            "host": "WORKSTATION1",
            "id": display_id + 20,
            "display_id": display_id,
            "integrity_level": 2,
            "ip": "[\"10.0.0.5\"]",
            "extra_info": "",
            "sleep_info": "",
            "pid": 4412,
            "os": "Windows 10",
            "user": "alice",
            "agent_callback_id": "3c1b8f2e",
            "operation_id": 1,
            "process_name": "explorer.exe",
            "payload": {
                "os": "Windows",
                "payloadtype": {"name": "apollo"},
                "description": null,
                "uuid": "a5d1c3"
            }
        })
    }

    #[tokio::test]
    async fn test_list_callbacks() {
        let transport = MockTransport::new()
            .on("GetAllCallbacks", |_| Ok(json!({"callback": [callback(1), callback(2)]})))
            .on("GetAllActiveCallbacks", |_| Ok(json!({"callback": [callback(2)]})));
        let (mythic, _) = session(transport);

        let all = get_all_callbacks(&mythic).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].payload.payloadtype.name, "apollo");

        let active = get_all_active_callbacks(&mythic).await.unwrap();
        assert_eq!(active[0].display_id, 2);
    }

    #[tokio::test]
    async fn test_update_sends_only_set_fields() {
        let transport = MockTransport::new().on("updateCallbackInformation", |_| {
            Ok(json!({"updateCallback": {"status": "success", "error": null}}))
        });
        let (mythic, transport) = session(transport);

        let update = CallbackUpdate {
            active: Some(false),
            description: Some("parked".to_string()),
            ..Default::default()
        };
        update_callback(&mythic, 4, &update).await.unwrap();

        let vars = &transport.requests_for("updateCallbackInformation")[0].variables;
        assert_eq!(vars.len(), 3);
        assert_eq!(vars["callback_display_id"], json!(4));
        assert_eq!(vars["active"], json!(false));
        assert_eq!(vars["description"], json!("parked"));
    }

    #[tokio::test]
    async fn test_update_rejected() {
        let transport = MockTransport::new().on("updateCallbackInformation", |_| {
            Ok(json!({"updateCallback": {"status": "error", "error": "callback not found"}}))
        });
        let (mythic, _) = session(transport);

        let err = update_callback(&mythic, 99, &CallbackUpdate::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "GraphQL error: callback not found");
    }
}
