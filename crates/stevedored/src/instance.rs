use tracing::debug;

use stevedore_core::runtime::{ContainerFilter, ContainerRuntime, RuntimeResult};
use stevedore_model::{ContainerStatus, IMAGE_TITLE_LABELS};

/// Statuses of containers that count as a live daemon (everything but created and exited).
const LIVE: [ContainerStatus; 5] = [
    ContainerStatus::Running,
    ContainerStatus::Paused,
    ContainerStatus::Restarting,
    ContainerStatus::Removing,
    ContainerStatus::Dead,
];

/// Whether more than one live container runs an image titled `title`.
///
/// The daemon's own container is one of them when it runs containerized.
pub async fn another_instance_running(runtime: &dyn ContainerRuntime, title: &str) -> RuntimeResult<bool> {
    let filter = ContainerFilter {
        statuses: LIVE.to_vec(),
        labels: Vec::new(),
    };

    let mut matched = 0;
    for container in runtime.list_containers(&filter).await? {
        let labels = match runtime.image_labels(&container.id).await {
            Ok(labels) => labels,
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e),
        };
        let image_title = IMAGE_TITLE_LABELS.iter().find_map(|key| labels.get(key));
        if image_title == Some(title) {
            debug!(container = %container.id, "found daemon container");
            matched += 1;
            if matched > 1 {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
