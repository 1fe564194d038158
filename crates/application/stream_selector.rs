use tracing::debug;

use crate::domain::{
    errors::PipelineError,
    value_objects::streams::{Resolution, ResolutionTieBreak, SelectionPolicy, StreamDescriptor},
};

/// Picks the stream to download.
///
/// Preference ladder, first match wins:
/// 1. progressive at the target resolution
/// 2. progressive at the closest resolution, on the tie-break side first
/// 3. non-progressive at the target resolution
/// 4. whatever comes first in the catalog
///
/// Inside a step a stream in the preferred container beats one that isn't;
/// remaining ties keep catalog order. The returned reference always points
/// into `streams`.
pub fn select<'a>(
    streams: &'a [StreamDescriptor],
    policy: &SelectionPolicy,
) -> Result<&'a StreamDescriptor, PipelineError> {
    if streams.is_empty() {
        return Err(PipelineError::NoStreamAvailable);
    }

    let target = policy.target;

    if let Some(stream) = best_container_match(
        streams
            .iter()
            .filter(|s| s.is_progressive && s.resolution == Some(target)),
        policy,
    ) {
        debug!(format_id = %stream.format_id, %target, "stream_selector: progressive at target");
        return Ok(stream);
    }

    if let Some(stream) = streams
        .iter()
        .filter(|s| s.is_progressive)
        .min_by_key(|s| {
            (
                resolution_rank(s.resolution, target, policy.tie_break),
                container_mismatch(s, policy),
            )
        })
    {
        debug!(
            format_id = %stream.format_id,
            resolution = ?stream.resolution,
            %target,
            "stream_selector: closest progressive"
        );
        return Ok(stream);
    }

    if let Some(stream) = best_container_match(
        streams.iter().filter(|s| s.resolution == Some(target)),
        policy,
    ) {
        debug!(format_id = %stream.format_id, %target, "stream_selector: non-progressive at target");
        return Ok(stream);
    }

    let stream = &streams[0];
    debug!(format_id = %stream.format_id, %target, "stream_selector: first available stream");
    Ok(stream)
}

fn best_container_match<'a>(
    candidates: impl Iterator<Item = &'a StreamDescriptor>,
    policy: &SelectionPolicy,
) -> Option<&'a StreamDescriptor> {
    // min_by_key keeps the first of equal elements, which preserves catalog order.
    candidates.min_by_key(|s| container_mismatch(s, policy))
}

fn container_mismatch(stream: &StreamDescriptor, policy: &SelectionPolicy) -> bool {
    match &policy.preferred_container {
        Some(preferred) => !stream.container_format.eq_ignore_ascii_case(preferred),
        None => false,
    }
}

/// Lower is better: (side, distance). Unknown resolutions rank last.
fn resolution_rank(
    resolution: Option<Resolution>,
    target: Resolution,
    tie_break: ResolutionTieBreak,
) -> (u8, u32) {
    let Some(resolution) = resolution else {
        return (3, 0);
    };

    if resolution == target {
        return (0, 0);
    }

    let below = resolution < target;
    let side = match (tie_break, below) {
        (ResolutionTieBreak::PreferBelow, true) | (ResolutionTieBreak::PreferAbove, false) => 1,
        _ => 2,
    };

    (side, resolution.distance(target))
}
