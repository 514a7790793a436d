//! Luminance extraction and mask building shared by the mask features.

use serde_json::json;

use deepsky_config::debug_ln;
use deepsky_engine::{unique_view_name, EngineError, JobError, OperationContext, ProcessingJob, ViewHandle};

use crate::transfer::AutoStretch;

/// Auto-stretch target background for masks.
pub const MASK_TARGET_BACKGROUND: f64 = 0.25;
/// Auto-stretch shadows clipping for masks, in MAD units.
pub const MASK_SHADOWS_CLIPPING: f64 = -2.8;

/// Extract the CIELab luminance of `view` into a new grayscale view named
/// `<view><suffix>`.
pub fn extract_luminance(
    cx: &mut OperationContext<'_>,
    view: &ViewHandle,
    suffix: &str,
) -> Result<ViewHandle, EngineError> {
    let lum = ViewHandle::new(unique_view_name(&*cx.host, &view.id, suffix), 1);
    let job = ProcessingJob::new("ChannelExtraction")
        .with("colorSpace", "CIELab")
        .with("channels", json!([[true, lum.id], [false, ""], [false, ""]]))
        .with("sampleFormat", "SameAsSource")
        .output(lum.clone());
    cx.execute(&job, view)?;
    Ok(lum)
}

/// Copy `source` into a new view named `<source><suffix>`.
pub fn clone_view(
    cx: &mut OperationContext<'_>,
    source: &ViewHandle,
    suffix: &str,
) -> Result<ViewHandle, EngineError> {
    let copy = ViewHandle::new(unique_view_name(&*cx.host, &source.id, suffix), source.channels);
    let job = ProcessingJob::new("PixelMath")
        .with("expression", "$T")
        .with("useSingleExpression", true)
        .with("createNewImage", true)
        .with("newImageId", copy.id.clone())
        .output(copy.clone());
    cx.execute(&job, source)?;
    Ok(copy)
}

/// Auto-stretch `view` with the mask parameters and make the stretch
/// permanent.
pub fn stretch_mask(cx: &mut OperationContext<'_>, view: &ViewHandle) -> Result<(), EngineError> {
    let stretch = display_stretch(cx, view)?;
    cx.execute(&stretch.histogram_job(view.is_grayscale()), view)
}

/// Compute the mask auto-stretch of `view` and apply it as a screen
/// transfer function only.
pub fn display_stretch(cx: &mut OperationContext<'_>, view: &ViewHandle) -> Result<AutoStretch, EngineError> {
    let statistics = cx.host.statistics(view)?;
    let (median, mad) = statistics
        .channel(0)
        .ok_or_else(|| JobError::new("Statistics", format!("no statistics for {}", view.id)))?;
    let stretch = AutoStretch::compute(median, mad, MASK_TARGET_BACKGROUND, MASK_SHADOWS_CLIPPING);
    debug_ln!(cx.debug, "Stretch of {} {:?}", view.id, stretch);

    cx.execute(&stretch.stf_job(view.is_grayscale()), view)?;
    Ok(stretch)
}

/// Luminance of `view`, stretched in place into a mask named `<view><suffix>`.
pub fn luminance_mask(
    cx: &mut OperationContext<'_>,
    view: &ViewHandle,
    suffix: &str,
) -> Result<ViewHandle, EngineError> {
    let lum = extract_luminance(cx, view, suffix)?;
    stretch_mask(cx, &lum)?;
    Ok(lum)
}
