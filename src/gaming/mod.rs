//! Game Servers snippets
//!
//! Deployments, their Agones fleet configs and the rollout that picks which
//! config each realm runs. All resources live in the `global` location.

pub mod configs;
pub mod deployments;
pub mod rollout;

pub use configs::{
    create_game_server_config, delete_game_server_config, get_game_server_config,
    list_game_server_configs,
};
pub use deployments::{
    create_game_server_deployment, delete_game_server_deployment, get_game_server_deployment,
    list_game_server_deployments,
};
pub use rollout::{
    get_game_server_deployment_rollout, update_rollout_clear_default_config,
    update_rollout_clear_override_config, update_rollout_default_config,
    update_rollout_override_config,
};

/// `projects/{project}/locations/global/gameServerDeployments/{deployment}`
pub fn deployment_name(project: &str, deployment_id: &str) -> String {
    format!(
        "projects/{}/locations/global/gameServerDeployments/{}",
        project, deployment_id
    )
}

/// `{deployment}/configs/{config}`
pub fn config_name(project: &str, deployment_id: &str, config_id: &str) -> String {
    format!("{}/configs/{}", deployment_name(project, deployment_id), config_id)
}

/// `projects/{project}/locations/{location}/realms/{realm}`
pub fn realm_name(project: &str, location: &str, realm_id: &str) -> String {
    format!("projects/{}/locations/{}/realms/{}", project, location, realm_id)
}
