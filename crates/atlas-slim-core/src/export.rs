use crate::model::{OptimizationTask, PlanSummary};
use serde_json::{Value, json};

/// Serialize a planned task list as `{ tasks, summary }`.
/// Per-task fields use camelCase; source bytes are left out, only their length is reported.
pub fn plan_to_json(tasks: &[OptimizationTask]) -> Value {
    let tasks_val: Vec<Value> = tasks
        .iter()
        .map(|t| {
            json!({
                "fileName": t.file_name,
                "relativePath": t.relative_path,
                "original": {"w": t.original_width, "h": t.original_height},
                "target": {"w": t.target_width, "h": t.target_height},
                "maxScaleUsed": t.max_scale_used,
                "isResize": t.is_resize,
                "overridePercentage": t.override_percentage,
                "sourceBytes": t.blob.len(),
            })
        })
        .collect();
    let summary = PlanSummary::from_tasks(tasks);
    json!({
        "tasks": tasks_val,
        "summary": summary,
        "pixelReductionPercent": summary.pixel_reduction_percentage(),
    })
}
