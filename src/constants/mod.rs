/// Fixed engine tunables: LOD thresholds, highlight styling, camera fit.
pub mod render_settings;
