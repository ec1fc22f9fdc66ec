use bevy::prelude::*;

/// Session lifecycle. `Initializing` covers the first frames while the
/// render surface and camera come up; everything interactive runs in
/// `Running`.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, States)]
pub enum SessionState {
    #[default]
    Initializing,
    Running,
}

/// Move to `Running` once the camera entity exists. If the render surface
/// never appeared this stays in `Initializing` and the failure has
/// already been reported through `on_error`.
pub fn transition_to_running(
    cameras: Query<(), With<Camera3d>>,
    mut next_state: ResMut<NextState<SessionState>>,
) {
    if !cameras.is_empty() {
        info!("→ Scene session running");
        next_state.set(SessionState::Running);
    }
}
