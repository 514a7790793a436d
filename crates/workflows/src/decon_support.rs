//! Generate Decon Support: the masks and process instances a deconvolution
//! session needs.
//!
//! 1. Extract luminance, or use a luminance view the user picked.
//! 2. Clone it into a stretched luminance mask, or use a picked mask.
//! 3. Remove stars from a copy of the mask with StarNet, keeping the star
//!    mask; optionally dilate and blur it.
//! 4. Binarize a copy of the mask at the saturation limit.
//! 5. Build a deconvolution support mask from the target view.
//! 6. Open Deconvolution preloaded with the support mask.
//! 7. Open DynamicPSF with the saturation mask protecting luminance.
//!
//! Every generated view is a result: the run ends by taking them out of
//! scratch without closing them.

use serde_json::json;

use deepsky_core::SettingDescriptor;
use deepsky_engine::{
    unique_view_name, EngineError, Feature, MaskBinding, OperationContext, ProcessingJob,
    ValidationFailure, ViewHandle,
};

use crate::luminance;

pub const FEATURE: &str = "generateDeconSupport";
pub const TITLE: &str = "Generate Decon Support";

/// Extras key naming an existing luminance view, used when `extractLum` is off.
pub const LUM_VIEW: &str = "lumView";
/// Extras key naming an existing luminance mask, used when `generateLumMask` is off.
pub const LUM_MASK_VIEW: &str = "lumMaskView";

const LUM: &str = "lum";
const LUM_MASK: &str = "lum_mask";
const NO_STARS: &str = "no_stars";
const STAR_MASK: &str = "star_mask";
const SATURATION_MASK: &str = "saturation_mask";
const DECON_SUPPORT: &str = "decon_support";

/// Result slots, in the order they are reported.
const RESULTS: [&str; 6] = [LUM, LUM_MASK, NO_STARS, STAR_MASK, SATURATION_MASK, DECON_SUPPORT];

#[derive(Debug, Default)]
pub struct DeconSupport;

impl DeconSupport {
    pub fn new() -> Self {
        Self
    }

    /// Number of progress steps for the current settings.
    fn steps(&self, cx: &OperationContext<'_>) -> Result<u32, EngineError> {
        let mut steps = 7;
        if !cx.setting_bool("generateSaturationMask")? {
            steps -= 2;
        } else if !cx.setting_bool("launchDynamicPSF")? {
            steps -= 1;
        }
        if !cx.setting_bool("generateDeconSupport")? {
            steps -= 1;
        }
        if !cx.setting_bool("launchDeconProcess")? {
            steps -= 1;
        }
        Ok(steps)
    }

    fn luminance(&self, cx: &mut OperationContext<'_>, view: &ViewHandle) -> Result<ViewHandle, EngineError> {
        cx.show_step("Extracting luminance....");

        if !cx.setting_bool("extractLum")? {
            if let Some(lum) = picked_view(cx, LUM_VIEW) {
                cx.write_line(&format!("Using existing luminance channel: {}", lum.id));
                return Ok(lum);
            }
        }

        let lum = luminance::extract_luminance(cx, view, "_Lum")?;
        cx.write_line(&format!("Luminance extracted as {}", lum.id));
        cx.create_scratch(LUM, lum.clone(), "extract_luminance")?;
        Ok(lum)
    }

    fn luminance_mask(&self, cx: &mut OperationContext<'_>, lum: &ViewHandle) -> Result<ViewHandle, EngineError> {
        cx.show_step("Creating luminance mask....");

        if !cx.setting_bool("generateLumMask")? {
            if let Some(mask) = picked_view(cx, LUM_MASK_VIEW) {
                cx.write_line(&format!("Using existing luminance mask: {}", mask.id));
                return Ok(mask);
            }
        }

        let mask = luminance::clone_view(cx, lum, "_Mask")?;
        cx.create_scratch(LUM_MASK, mask.clone(), "generate_lum_mask")?;
        luminance::stretch_mask(cx, &mask)?;
        Ok(mask)
    }

    fn star_mask(&self, cx: &mut OperationContext<'_>, lum_mask: &ViewHandle) -> Result<(), EngineError> {
        cx.show_step("Generating the star mask...");

        let no_stars = luminance::clone_view(cx, lum_mask, "_NoStars")?;
        cx.create_scratch(NO_STARS, no_stars.clone(), "generate_star_mask")?;

        let stars = ViewHandle::new(unique_view_name(&*cx.host, &no_stars.id, "_Stars"), no_stars.channels);
        let starnet = ProcessingJob::new("StarNet")
            .with("stride", "Stride_128")
            .with("mask", true)
            .output(stars.clone());
        cx.execute(&starnet, &no_stars)?;
        cx.create_scratch(STAR_MASK, stars.clone(), "generate_star_mask")?;

        let iterations = cx.setting_i64("growIterations")?;
        if iterations > 0 {
            cx.write_line("Applying morphological transformation...");
            let dilation = ProcessingJob::new("MorphologicalTransformation")
                .with("operator", "Dilation")
                .with("interlacingDistance", 1)
                .with("numberOfIterations", iterations)
                .with("amount", 1.0)
                .with("selectionPoint", 0.5)
                .with("structureSize", 3)
                .with("structureWayTable", json!([[[1, 1, 1, 1, 1, 1, 1, 1, 1]]]));
            cx.execute(&dilation, &stars)?;
        }

        if cx.setting_bool("blurStars")? {
            cx.write_line("Applying convolution...");
            let blur = ProcessingJob::new("Convolution")
                .with("mode", "Parametric")
                .with("sigma", 2.40)
                .with("shape", 1.45)
                .with("aspectRatio", 1.0)
                .with("rotationAngle", 0.0);
            cx.execute(&blur, &stars)?;
        }
        Ok(())
    }

    fn saturation_mask(&self, cx: &mut OperationContext<'_>, lum_mask: &ViewHandle) -> Result<(), EngineError> {
        if !cx.setting_bool("generateSaturationMask")? {
            return Ok(());
        }
        cx.show_step("Generating saturation mask...");

        let saturated = luminance::clone_view(cx, lum_mask, "_Saturated")?;
        cx.create_scratch(SATURATION_MASK, saturated.clone(), "generate_saturation_mask")?;

        let limit = cx.setting_f64("saturationLimit")?;
        let binarize = ProcessingJob::new("Binarize")
            .with("thresholdRK", limit)
            .with("thresholdG", limit)
            .with("thresholdB", limit)
            .with("isGlobal", true);
        cx.execute(&binarize, &saturated)
    }

    fn decon_support(&self, cx: &mut OperationContext<'_>, view: &ViewHandle) -> Result<(), EngineError> {
        if !cx.setting_bool("generateDeconSupport")? {
            return Ok(());
        }
        cx.show_step("Generating decon support mask....");

        let support = ViewHandle::new(unique_view_name(&*cx.host, &view.id, "_Decon"), 1);
        let job = ProcessingJob::new("StarMask")
            .with("shadowsClipping", 0.0)
            .with("midtonesBalance", 0.5)
            .with("highlightsClipping", 1.0)
            .with("waveletLayers", 6)
            .with("noiseThreshold", 0.5)
            .with("largeScaleGrowth", 2)
            .with("smallScaleGrowth", 1)
            .with("growthCompensation", 2)
            .with("smoothness", 16)
            .with("truncation", 1.0)
            .with("limit", 1.0)
            .with("mode", "StarMask")
            .output(support.clone());
        cx.execute(&job, view)?;
        cx.create_scratch(DECON_SUPPORT, support, "generate_decon_support")
    }

    fn decon_process(&self, cx: &mut OperationContext<'_>) -> Result<(), EngineError> {
        if !cx.setting_bool("launchDeconProcess")? {
            return Ok(());
        }
        cx.show_step("Configuring Deconvolution process instance....");

        let support_id = cx.state.scratch.get(DECON_SUPPORT).map(|v| v.id.clone()).unwrap_or_default();
        cx.launch(&deconvolution(&support_id))
    }

    fn dynamic_psf(&self, cx: &mut OperationContext<'_>, lum: &ViewHandle) -> Result<(), EngineError> {
        if !cx.setting_bool("launchDynamicPSF")? || !cx.state.scratch.contains(SATURATION_MASK) {
            return Ok(());
        }
        cx.show_step("Launching dynamic PSF...");

        let saturated = cx.scratch(SATURATION_MASK)?;
        cx.set_mask(lum, Some(MaskBinding::inverted(&saturated)));

        let job = ProcessingJob::new("DynamicPSF")
            .with("autoPSF", true)
            .with("circularPSF", false)
            .with("gaussianPSF", true)
            .with("moffatPSF", false)
            .with("signedAngles", true)
            .with("regenerate", true)
            .with("astrometry", true)
            .with("searchRadius", 8)
            .with("threshold", 1.0)
            .with("autoAperture", true)
            .with("scaleMode", "Scale_Pixels");
        cx.launch(&job)?;

        luminance::display_stretch(cx, lum)?;
        Ok(())
    }
}

/// Deconvolution preloaded for Richardson-Lucy with deringing against
/// `support_id`, or global deringing when it is empty.
pub fn deconvolution(support_id: &str) -> ProcessingJob {
    ProcessingJob::new("Deconvolution")
        .with("algorithm", "RichardsonLucy")
        .with("numberOfIterations", 25)
        .with("deringing", true)
        .with("deringingDark", 0.002)
        .with("deringingBright", 0.0)
        .with("deringingSupport", true)
        .with("deringingSupportAmount", 0.2)
        .with("deringingSupportViewId", support_id)
        .with("toLuminance", true)
        .with("psfMode", "External")
        .with("psfViewId", "")
        .with("useRegularization", false)
}

/// The open view named by extras entry `key`.
fn picked_view(cx: &OperationContext<'_>, key: &str) -> Option<ViewHandle> {
    cx.extra(key)
        .and_then(|value| value.as_str())
        .and_then(|id| cx.host.find_view(id))
}

impl Feature for DeconSupport {
    fn name(&self) -> &str {
        FEATURE
    }

    fn title(&self) -> &str {
        TITLE
    }

    fn descriptors(&self) -> Vec<SettingDescriptor> {
        vec![
            SettingDescriptor::boolean("generateDeconSupport", true)
                .label("Generate deconvolution support mask")
                .tooltip("Choose whether or not to generate the support mask."),
            SettingDescriptor::boolean("generateSaturationMask", true)
                .label("Generate saturation mask")
                .tooltip("Choose whether or not to generate the mask for PSF support. Disable if you use a script."),
            SettingDescriptor::boolean("launchDeconProcess", true)
                .label("Launch deconvolution process")
                .tooltip("Choose whether or not to launch deconvolution with defaults."),
            SettingDescriptor::boolean("launchDynamicPSF", true)
                .label("Launch dynamic PSF process")
                .tooltip("Choose whether or not to launch dynamic PSF."),
            SettingDescriptor::boolean("blurStars", true)
                .label("Blur star mask")
                .tooltip("Choose whether or not to apply convolution to the star mask."),
            SettingDescriptor::boolean("extractLum", true)
                .label("Extract luminance")
                .tooltip("Extract luminance or select existing view."),
            SettingDescriptor::boolean("generateLumMask", true)
                .label("Generate luminance mask")
                .tooltip("Generate the luminance mask or select existing view."),
            SettingDescriptor::double("saturationLimit", 0.8)
                .precision(3)
                .label("Saturation limit:")
                .tooltip("Choose the saturation limit for generating the PSF model.")
                .range(0.4, 0.999),
            SettingDescriptor::int16("growIterations", 3)
                .label("Iterations to grow star mask:")
                .tooltip("Choose how many times to dilate the star mask. 0 for none.")
                .range(0.0, 5.0),
        ]
    }

    fn validate(&self, cx: &OperationContext<'_>) -> Result<(), ValidationFailure> {
        let view = cx.view().ok_or_else(|| ValidationFailure::new("No active view!"))?;
        if !view.is_color() {
            return Err(ValidationFailure::new("Active view is not color."));
        }

        let extract = cx.config().get_bool("extractLum").unwrap_or(true);
        if !extract && picked_view(cx, LUM_VIEW).is_none() {
            return Err(ValidationFailure::new("Luminance channel is required"));
        }
        let generate = cx.config().get_bool("generateLumMask").unwrap_or(true);
        if !generate && picked_view(cx, LUM_MASK_VIEW).is_none() {
            return Err(ValidationFailure::new("Luminance mask is required"));
        }
        Ok(())
    }

    fn run(&self, cx: &mut OperationContext<'_>) -> Result<(), EngineError> {
        let view = cx.require_view()?;
        let steps = self.steps(cx)?;
        cx.state.progress.begin(steps);

        let lum = self.luminance(cx, &view)?;
        let lum_mask = self.luminance_mask(cx, &lum)?;
        self.star_mask(cx, &lum_mask)?;
        self.saturation_mask(cx, &lum_mask)?;
        self.decon_support(cx, &view)?;
        self.decon_process(cx)?;
        self.dynamic_psf(cx, &lum)?;

        for slot in RESULTS {
            if cx.state.scratch.contains(slot) {
                let mask = cx.keep_scratch(slot, "finish")?;
                cx.write_line(&format!("Generated mask {}: {}", slot, mask.id));
            }
        }
        cx.write_line("Done.");
        Ok(())
    }
}
