use axum::Router;
use axum::routing::{get, post, put};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(app_state: AppState) -> Router {
    let policy_routes = Router::new()
        .route(
            "/api/policies",
            get(handlers::policies::list_policies_handler)
                .post(handlers::policies::create_policy_handler),
        )
        .route(
            "/api/policies/{policy_id}",
            get(handlers::policies::get_policy_handler)
                .put(handlers::policies::update_policy_handler)
                .delete(handlers::policies::delete_policy_handler),
        )
        .route(
            "/api/policies/{policy_id}/enabled",
            put(handlers::policies::set_policy_enabled_handler),
        )
        .route(
            "/api/threshold-profiles",
            get(handlers::policies::list_profiles_handler),
        )
        .route(
            "/api/threshold-profiles/{profile_name}",
            put(handlers::policies::save_profile_handler)
                .delete(handlers::policies::delete_profile_handler),
        )
        .route(
            "/api/policy-templates",
            get(handlers::policies::list_templates_handler),
        )
        .route(
            "/api/policy-templates/apply",
            post(handlers::policies::apply_template_handler),
        )
        .route(
            "/api/policy-templates/{template_name}",
            put(handlers::policies::save_template_handler)
                .delete(handlers::policies::delete_template_handler),
        );

    let lifecycle_routes = Router::new()
        .route(
            "/api/lifecycle/refresh",
            post(handlers::lifecycle::refresh_handler),
        )
        .route(
            "/api/lifecycle/evaluate",
            post(handlers::lifecycle::evaluate_handler),
        )
        .route(
            "/api/lifecycle/execute",
            post(handlers::lifecycle::execute_handler),
        )
        .route("/api/lifecycle/merge", post(handlers::lifecycle::merge_handler))
        .route(
            "/api/lifecycle/cycle",
            post(handlers::lifecycle::run_cycle_handler),
        )
        .route(
            "/api/lifecycle/queue",
            get(handlers::lifecycle::list_queue_handler),
        )
        .route(
            "/api/lifecycle/boundaries/preview",
            post(handlers::lifecycle::preview_boundaries_handler),
        )
        .route(
            "/api/objects/{owner}/{object}/partitions",
            get(handlers::lifecycle::list_object_partitions_handler),
        );

    let report_routes = Router::new()
        .route(
            "/api/reports/summary",
            get(handlers::reports::summary_report_handler),
        )
        .route(
            "/api/reports/effectiveness",
            get(handlers::reports::policy_effectiveness_handler),
        )
        .route(
            "/api/reports/executions",
            get(handlers::reports::list_executions_handler),
        )
        .route(
            "/api/reports/merges",
            get(handlers::reports::list_merges_handler),
        );

    let settings_routes = Router::new()
        .route(
            "/api/settings",
            get(handlers::settings::get_settings_handler)
                .put(handlers::settings::update_settings_handler),
        )
        .route(
            "/api/settings/emergency-stop",
            put(handlers::settings::emergency_stop_handler),
        )
        .route(
            "/api/task-runs",
            get(handlers::settings::list_task_runs_handler),
        );

    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(policy_routes)
        .merge(lifecycle_routes)
        .merge(report_routes)
        .merge(settings_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
