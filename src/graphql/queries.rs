//! GraphQL documents sent to the Mythic server.
//!
//! These are fixed request contracts. Fields requested here must stay in
//! sync with the shapes in [`super::types`].

pub const TASK_FRAGMENT: &str = r#"
fragment task_fragment on task {
    callback {
        id
        display_id
    }
    id
    display_id
    operator {
        username
    }
    status
    completed
    original_params
    display_params
    timestamp
    command_name
    tasks {
        id
    }
    token {
        token_id
    }
}
"#;

pub const CALLBACK_FRAGMENT: &str = r#"
fragment callback_fragment on callback {
    architecture
    description
    domain
    external_ip
    host
    id
    display_id
    integrity_level
    ip
    extra_info
    sleep_info
    pid
    os
    user
    agent_callback_id
    operation_id
    process_name
    payload {
        os
        payloadtype {
            name
        }
        description
        uuid
    }
}
"#;

pub const CREATE_TASK: &str = r#"
mutation createTasking(
    $callback_id: Int!,
    $command: String!,
    $params: String!,
    $token_id: Int,
    $tasking_location: String,
    $original_params: String,
    $parameter_group_name: String
) {
    createTask(
        callback_id: $callback_id,
        command: $command,
        params: $params,
        token_id: $token_id,
        tasking_location: $tasking_location,
        original_params: $original_params,
        parameter_group_name: $parameter_group_name
    ) {
        status
        id
        display_id
        error
    }
}
"#;

/// Fields always requested by the status subscription.
pub const TASK_STATUS_FIELDS: &str = "id display_id status completed";

/// Status subscription for one task, optionally requesting extra fields.
pub fn task_wait_for_status(custom_attributes: Option<&str>) -> String {
    let extra = custom_attributes.unwrap_or("").trim();
    format!(
        r#"
subscription TaskWaitForStatus($display_id: Int!) {{
    task_stream(
        cursor: {{initial_value: {{timestamp: "1970-01-01"}}}},
        batch_size: 1,
        where: {{display_id: {{_eq: $display_id}}}}
    ) {{
        {} {}
    }}
}}
"#,
        TASK_STATUS_FIELDS, extra
    )
}

pub const TASK_WAIT_FOR_OUTPUT: &str = r#"
subscription TaskWaitForOutput($display_id: Int!) {
    task_stream(
        cursor: {initial_value: {timestamp: "1970-01-01"}},
        batch_size: 1,
        where: {display_id: {_eq: $display_id}}
    ) {
        id
        display_id
        status
        completed
        responses(order_by: {id: asc}) {
            id
            response_text
            timestamp
        }
    }
}
"#;

pub const TASK_OUTPUT: &str = r#"
query TaskOutput($task_display_id: Int!) {
    response(order_by: {id: asc}, where: {task: {display_id: {_eq: $task_display_id}}}) {
        id
        response_text
        timestamp
    }
}
"#;

pub const SUBTASKS_BY_PARENT_DISPLAY_ID: &str = r#"
query SubtasksByParentDisplayId($task_display_id: Int!) {
    task(where: {parent_task: {display_id: {_eq: $task_display_id}}}, order_by: {id: asc}) {
        id
        display_id
    }
}
"#;

pub const SUBTASKS_BY_PARENT_ID: &str = r#"
query SubtasksByParentId($task_id: Int!) {
    task(where: {parent_task_id: {_eq: $task_id}}, order_by: {id: asc}) {
        id
        display_id
    }
}
"#;

pub fn get_all_tasks() -> String {
    format!(
        r#"
query GetAllTasks {{
    task(order_by: {{id: desc}}) {{
        ...task_fragment
    }}
}}
{}"#,
        TASK_FRAGMENT
    )
}

pub fn get_all_tasks_for_callback() -> String {
    format!(
        r#"
query GetAllTasksForCallback($callback_display_id: Int!) {{
    task(where: {{callback: {{display_id: {{_eq: $callback_display_id}}}}}}, order_by: {{id: asc}}) {{
        ...task_fragment
    }}
}}
{}"#,
        TASK_FRAGMENT
    )
}

pub fn get_all_callbacks() -> String {
    format!(
        r#"
query GetAllCallbacks {{
    callback(order_by: {{id: asc}}) {{
        ...callback_fragment
    }}
}}
{}"#,
        CALLBACK_FRAGMENT
    )
}

pub fn get_all_active_callbacks() -> String {
    format!(
        r#"
query GetAllActiveCallbacks {{
    callback(where: {{active: {{_eq: true}}}}, order_by: {{id: asc}}) {{
        ...callback_fragment
    }}
}}
{}"#,
        CALLBACK_FRAGMENT
    )
}

pub const UPDATE_CALLBACK: &str = r#"
mutation updateCallbackInformation(
    $callback_display_id: Int!,
    $active: Boolean,
    $locked: Boolean,
    $description: String,
    $ips: [String],
    $user: String,
    $host: String,
    $os: String,
    $architecture: String,
    $extra_info: String,
    $sleep_info: String,
    $pid: Int,
    $process_name: String,
    $integrity_level: Int,
    $domain: String
) {
    updateCallback(
        input: {
            callback_display_id: $callback_display_id,
            active: $active,
            locked: $locked,
            description: $description,
            ips: $ips,
            user: $user,
            host: $host,
            os: $os,
            architecture: $architecture,
            extra_info: $extra_info,
            sleep_info: $sleep_info,
            pid: $pid,
            process_name: $process_name,
            integrity_level: $integrity_level,
            domain: $domain
        }
    ) {
        status
        error
    }
}
"#;
