//! Default value functions for serde deserialization.

pub fn min_confidence() -> f32 {
    0.45
}

pub fn map_scale() -> f32 {
    100.0
}

pub fn max_render_points() -> usize {
    20_000
}

pub fn marker_size() -> f32 {
    20.0
}

pub fn enabled() -> bool {
    true
}

pub fn maps_dir() -> String {
    "./maps".to_string()
}

pub fn raw_policy() -> crate::config::MapPolicy {
    crate::config::MapPolicy::raw()
}

pub fn partial_policy() -> crate::config::MapPolicy {
    crate::config::MapPolicy::partial()
}
