use serde_json::{json, Value};

/// Standard service envelope around a task-status payload.
pub fn task_envelope(task_id: &str, status: &str, progress: u8, output: Value) -> Value {
    json!({
        "code": 0,
        "data": {
            "task_id": task_id,
            "status": status,
            "progress": progress,
            "output": output
        }
    })
}
